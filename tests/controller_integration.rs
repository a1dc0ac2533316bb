//! End-to-end controller scenarios against a mock backend
//!
//! Every test drives the real controller + HTTP client + SSE decoder
//! against a wiremock server, asserting the exact call sequences and
//! bodies the backend sees: partial-save routing on cancellation, the
//! unchanged-content no-op, reload-after-mutation, 404 eviction, and the
//! reload-free branch switch.

use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use weft::api::ApiClient;
use weft::chat::{ChatSessionController, StreamEnd};
use weft::config::Config;
use weft::prefs::Prefs;

fn controller_for(server: &MockServer) -> ChatSessionController {
    let api = ApiClient::new(server.uri()).unwrap();
    ChatSessionController::new(api, &Config::default(), &Prefs::default())
}

fn sse_body(frames: &[serde_json::Value], done: bool) -> String {
    let mut body = String::new();
    for frame in frames {
        body.push_str(&format!("data: {}\n\n", frame));
    }
    if done {
        body.push_str("data: [DONE]\n\n");
    }
    body
}

fn user_wire(id: &str, parent: Option<&str>, text: &str, ts: f64) -> serde_json::Value {
    json!({
        "message_id": id,
        "role": "user",
        "parent_id": parent,
        "message": text,
        "timestamp": ts,
    })
}

fn assistant_wire(id: &str, parent: &str, text: &str, ts: f64) -> serde_json::Value {
    json!({
        "message_id": id,
        "role": "assistant",
        "parent_id": parent,
        "message": text,
        "timestamp": ts,
    })
}

fn chat_payload(messages: Vec<serde_json::Value>) -> serde_json::Value {
    json!({ "messages": messages, "character_id": null })
}

async fn mount_stop(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/stop"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn cancelled_generation_saves_partial_under_parent_then_reloads() {
    let server = MockServer::start().await;
    mount_stop(&server).await;

    // Initial load plus the reload after cancellation
    Mock::given(method("GET"))
        .and(path("/chat/c1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_payload(vec![user_wire("m1", None, "Hi", 1.0)])),
        )
        .expect(2)
        .mount(&server)
        .await;

    // The backend acknowledges the stop with a cancelled status frame
    Mock::given(method("POST"))
        .and(path("/chat/c1/generate/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse_body(
                &[
                    json!({"content": "Hel"}),
                    json!({"content": "lo"}),
                    json!({"status": "cancelled"}),
                ],
                false,
            ),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/c1/save_generation_result/m1"))
        .and(body_json(json!({"message": "Hello"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.load_chat("c1").await.unwrap();

    let mut chunks = Vec::new();
    let end = controller
        .generate(&mut |text| chunks.push(text.to_string()))
        .await
        .unwrap();

    assert_eq!(end, StreamEnd::Cancelled);
    assert!(!controller.is_streaming());
    assert_eq!(chunks.last().map(String::as_str), Some("Hello"));
}

#[tokio::test]
async fn cancelled_continuation_with_unchanged_text_skips_save_but_reloads() {
    let server = MockServer::start().await;
    mount_stop(&server).await;

    Mock::given(method("GET"))
        .and(path("/chat/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_payload(vec![
            user_wire("m1", None, "Hello", 1.0),
            assistant_wire("m2", "m1", "Hi", 2.0),
        ])))
        .expect(2)
        .mount(&server)
        .await;

    // The continue call goes out, but cancellation lands before any frame
    // is consumed
    Mock::given(method("POST"))
        .and(path("/chat/c1/continue/m2"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse_body(&[json!({"content": "XYZ"})], true),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    // Unchanged content: no needless write
    Mock::given(method("POST"))
        .and(path("/chat/c1/save_edit_result/m2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.load_chat("c1").await.unwrap();
    controller.interrupt_token().cancel();

    let mut called = false;
    let end = controller
        .continue_message("m2", &mut |_| called = true)
        .await
        .unwrap();

    assert_eq!(end, StreamEnd::Cancelled);
    assert!(!called);
    assert!(!controller.is_streaming());
}

#[tokio::test]
async fn cancelled_branching_regeneration_routes_to_generation_save() {
    let server = MockServer::start().await;
    mount_stop(&server).await;

    Mock::given(method("GET"))
        .and(path("/chat/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_payload(vec![
            user_wire("m1", None, "Hello", 1.0),
            assistant_wire("m2", "m1", "old answer", 2.0),
        ])))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/c1/regenerate/m2"))
        .and(body_partial_json(json!({"new_branch": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse_body(
                &[json!({"content": "X"}), json!({"status": "cancelled"})],
                false,
            ),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    // Branch creation under the parent, not replacement of the target
    Mock::given(method("POST"))
        .and(path("/chat/c1/save_generation_result/m1"))
        .and(body_json(json!({"message": "X"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/c1/save_edit_result/m2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.load_chat("c1").await.unwrap();

    let end = controller
        .regenerate_message("m2", true, &mut |_| {})
        .await
        .unwrap();
    assert_eq!(end, StreamEnd::Cancelled);
}

#[tokio::test]
async fn cancelled_overwriting_regeneration_routes_to_edit_save() {
    let server = MockServer::start().await;
    mount_stop(&server).await;

    Mock::given(method("GET"))
        .and(path("/chat/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_payload(vec![
            user_wire("m1", None, "Hello", 1.0),
            assistant_wire("m2", "m1", "old answer", 2.0),
        ])))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/c1/regenerate/m2"))
        .and(body_partial_json(json!({"new_branch": false})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse_body(
                &[json!({"content": "X"}), json!({"status": "cancelled"})],
                false,
            ),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/c1/save_edit_result/m2"))
        .and(body_json(json!({"message": "X"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/c1/save_generation_result/m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.load_chat("c1").await.unwrap();

    let end = controller
        .regenerate_message("m2", false, &mut |_| {})
        .await
        .unwrap();
    assert_eq!(end, StreamEnd::Cancelled);
}

#[tokio::test]
async fn send_message_creates_chat_streams_and_reconciles() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/new_chat"))
        .and(body_partial_json(json!({"message": "Hi"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"chat_id": "c1"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/chat/get_chats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"chat_id": "c1", "preview": "Hi", "timestamp_updated": 10.0}
        ])))
        .mount(&server)
        .await;

    // First fetch: only the user message. Reload after the stream: the
    // confirmed assistant message has replaced the placeholder.
    Mock::given(method("GET"))
        .and(path("/chat/c1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_payload(vec![user_wire("m1", None, "Hi", 1.0)])),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chat/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_payload(vec![
            user_wire("m1", None, "Hi", 1.0),
            assistant_wire("m2", "m1", "Hello", 2.0),
        ])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/c1/generate/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse_body(
                &[
                    json!({"content": "Hello"}),
                    json!({"complete": true, "message_id": "m2"}),
                ],
                true,
            ),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    let mut chunks = Vec::new();
    let end = controller
        .send_message("Hi", Vec::new(), &mut |text| chunks.push(text.to_string()))
        .await
        .unwrap();

    assert_eq!(end, StreamEnd::Completed);
    assert_eq!(controller.chat_id(), Some("c1"));
    assert_eq!(chunks, vec!["Hello".to_string()]);

    let path_ids: Vec<String> = controller.active_path().iter().map(|m| m.id.clone()).collect();
    assert_eq!(path_ids, vec!["m1".to_string(), "m2".to_string()]);
    assert!(controller.messages().iter().all(|m| !m.is_placeholder()));
}

#[tokio::test]
async fn send_message_to_existing_chat_appends_then_generates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/chat/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_payload(vec![
            user_wire("m1", None, "Hi", 1.0),
            assistant_wire("m2", "m1", "Hello", 2.0),
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chat/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_payload(vec![
            user_wire("m1", None, "Hi", 1.0),
            assistant_wire("m2", "m1", "Hello", 2.0),
            user_wire("m3", Some("m2"), "More please", 3.0),
            assistant_wire("m4", "m3", "Sure", 4.0),
        ])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/c1/add_message"))
        .and(body_partial_json(json!({"message": "More please", "role": "user"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message_id": "m3"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/c1/generate/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse_body(
                &[
                    json!({"content": "Sure"}),
                    json!({"complete": true, "message_id": "m4"}),
                ],
                true,
            ),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.load_chat("c1").await.unwrap();

    let end = controller
        .send_message("More please", Vec::new(), &mut |_| {})
        .await
        .unwrap();

    assert_eq!(end, StreamEnd::Completed);
    let path_ids: Vec<String> = controller.active_path().iter().map(|m| m.id.clone()).collect();
    assert_eq!(path_ids, vec!["m1", "m2", "m3", "m4"]);
}

#[tokio::test]
async fn branch_switch_updates_cache_without_reload() {
    let server = MockServer::start().await;

    // Exactly one fetch: the branch switch must not reload
    Mock::given(method("GET"))
        .and(path("/chat/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_payload(vec![
            user_wire("m1", None, "Hello", 1.0),
            assistant_wire("m2", "m1", "first answer", 2.0),
            assistant_wire("m3", "m1", "second answer", 3.0),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/c1/set_active_branch/m1"))
        .and(body_json(json!({"child_index": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.load_chat("c1").await.unwrap();

    let before: Vec<String> = controller.active_path().iter().map(|m| m.id.clone()).collect();
    assert_eq!(before, vec!["m1", "m2"]);

    controller.set_active_branch("m1", 1).await.unwrap();

    let after: Vec<String> = controller.active_path().iter().map(|m| m.id.clone()).collect();
    assert_eq!(after, vec!["m1", "m3"]);
}

#[tokio::test]
async fn failed_branch_switch_leaves_cache_untouched() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/chat/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_payload(vec![
            user_wire("m1", None, "Hello", 1.0),
            assistant_wire("m2", "m1", "first answer", 2.0),
            assistant_wire("m3", "m1", "second answer", 3.0),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/c1/set_active_branch/m1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.load_chat("c1").await.unwrap();

    assert!(controller.set_active_branch("m1", 1).await.is_err());

    let after: Vec<String> = controller.active_path().iter().map(|m| m.id.clone()).collect();
    assert_eq!(after, vec!["m1", "m2"]);
}

#[tokio::test]
async fn vanished_chat_evicts_and_falls_back_to_next() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/chat/get_chats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"chat_id": "gone", "preview": "stale", "timestamp_updated": 20.0},
            {"chat_id": "c2", "preview": "alive", "timestamp_updated": 10.0}
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/chat/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/chat/c2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_payload(vec![user_wire("m1", None, "hey", 1.0)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.refresh_chats().await.unwrap();
    controller.load_chat("gone").await.unwrap();

    assert_eq!(controller.chat_id(), Some("c2"));
    assert!(controller.chats().iter().all(|c| c.chat_id != "gone"));
}

#[tokio::test]
async fn vanished_chat_with_no_fallback_ends_in_empty_state() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/chat/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.load_chat("gone").await.unwrap();

    assert_eq!(controller.chat_id(), None);
    assert!(controller.messages().is_empty());
}

#[tokio::test]
async fn failed_stream_annotates_and_resynchronizes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/chat/c1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_payload(vec![user_wire("m1", None, "Hi", 1.0)])),
        )
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/c1/generate/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse_body(
                &[json!({"content": "par"}), json!({"error": "overloaded"})],
                false,
            ),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.load_chat("c1").await.unwrap();

    let mut chunks = Vec::new();
    let end = controller
        .generate(&mut |text| chunks.push(text.to_string()))
        .await
        .unwrap();

    assert_eq!(end, StreamEnd::Failed("overloaded".to_string()));
    // The last callback carries the inline annotation
    let last = chunks.last().unwrap();
    assert!(last.starts_with("par"));
    assert!(last.contains("overloaded"));
    // The reload removed the placeholder
    assert!(controller.messages().iter().all(|m| !m.is_placeholder()));
}

#[tokio::test]
async fn edit_waits_for_confirmed_reload() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/chat/c1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_payload(vec![user_wire("m1", None, "Hi", 1.0)])),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chat/c1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_payload(vec![user_wire("m1", None, "Edited", 1.0)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/c1/edit_message/m1"))
        .and(body_partial_json(json!({"message": "Edited", "role": "user"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.load_chat("c1").await.unwrap();
    controller.edit_message("m1", "Edited").await.unwrap();

    assert_eq!(controller.messages()[0].content, "Edited");
}

#[tokio::test]
async fn delete_message_reloads_chat_and_list() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/chat/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_payload(vec![
            user_wire("m1", None, "Hi", 1.0),
            assistant_wire("m2", "m1", "Hello", 2.0),
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chat/c1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_payload(vec![user_wire("m1", None, "Hi", 1.0)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/c1/delete_message/m2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/chat/get_chats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"chat_id": "c1", "preview": "Hi", "timestamp_updated": 5.0}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.load_chat("c1").await.unwrap();
    controller.delete_message("m2").await.unwrap();

    assert_eq!(controller.messages().len(), 1);
}

#[tokio::test]
async fn character_change_on_open_chat_posts_then_reloads() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/chat/c1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_payload(vec![user_wire("m1", None, "Hi", 1.0)])),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chat/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [user_wire("m1", None, "Hi", 1.0)],
            "character_id": "librarian"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/c1/set_active_character"))
        .and(body_json(json!({"character_id": "librarian"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.load_chat("c1").await.unwrap();
    controller
        .set_active_character(Some("librarian".to_string()))
        .await
        .unwrap();

    assert_eq!(controller.character_id(), Some("librarian"));
}

#[tokio::test]
async fn system_messages_never_reach_the_rendered_path() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/chat/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_payload(vec![
            json!({
                "message_id": "s1",
                "role": "system",
                "parent_id": null,
                "message": "You are a librarian.",
                "timestamp": 0.5,
            }),
            user_wire("m1", None, "Hi", 1.0),
            assistant_wire("m2", "m1", "Hello", 2.0),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.load_chat("c1").await.unwrap();

    let path_ids: Vec<String> = controller.active_path().iter().map(|m| m.id.clone()).collect();
    assert_eq!(path_ids, vec!["m1", "m2"]);
}
