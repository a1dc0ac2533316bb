//! HTTP client for the chat backend
//!
//! One method per backend endpoint. The backend owns all persistent state;
//! every mutation here is confirmed by a reload on the caller's side, so
//! these methods do nothing clever: issue the request, map the status, and
//! hand back the typed payload (or, for the generation endpoints, an SSE
//! decoder over the response body).

use crate::api::sse::SseDecoder;
use crate::api::types::{
    AddMessageRequest, AddMessageResponse, CharacterEntry, CharacterUpsertRequest, ChatPayload,
    ChatSummary, CreateCharacterResponse, EditMessageRequest, GenerateRequest, ModelEntry,
    NewChatRequest, NewChatResponse, RegenerateRequest, SaveResultRequest,
    SetActiveBranchRequest, SetActiveCharacterRequest,
};
use crate::error::{Result, WeftError};
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Boxed byte stream of a streaming response body
pub type HttpByteStream = BoxStream<'static, std::result::Result<Bytes, reqwest::Error>>;

/// SSE decoder over a live generation response
pub type GenerationStream = SseDecoder<HttpByteStream>;

/// Client for every backend endpoint
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Creates a client for the given base URL
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Maps a response status onto the error taxonomy
    ///
    /// 404 is distinguished so callers can treat it as eventual-consistency
    /// cleanup instead of a failure.
    async fn check(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(WeftError::NotFound(what.to_string()).into());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WeftError::Api(format!("{}: HTTP {}: {}", what, status, body)).into());
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let response = self.http.get(self.url(path)).send().await?;
        let response = Self::check(response, what).await?;
        Ok(response.json().await?)
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        what: &str,
    ) -> Result<T> {
        let response = self.http.post(self.url(path)).json(body).send().await?;
        let response = Self::check(response, what).await?;
        Ok(response.json().await?)
    }

    async fn post_unit<B: Serialize>(&self, path: &str, body: &B, what: &str) -> Result<()> {
        let response = self.http.post(self.url(path)).json(body).send().await?;
        Self::check(response, what).await?;
        Ok(())
    }

    async fn open_stream<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        what: &str,
    ) -> Result<GenerationStream> {
        let response = self.http.post(self.url(path)).json(body).send().await?;
        let response = Self::check(response, what).await?;
        Ok(SseDecoder::new(response.bytes_stream().boxed()))
    }

    /// `GET /models`
    pub async fn list_models(&self) -> Result<Vec<ModelEntry>> {
        self.get_json("/models", "models").await
    }

    /// `GET /chat/get_chats?limit=N`
    pub async fn get_chats(&self, limit: usize) -> Result<Vec<ChatSummary>> {
        self.get_json(&format!("/chat/get_chats?limit={}", limit), "chat list")
            .await
    }

    /// `GET /chat/{id}`
    pub async fn get_chat(&self, chat_id: &str) -> Result<ChatPayload> {
        self.get_json(&format!("/chat/{}", chat_id), &format!("chat {}", chat_id))
            .await
    }

    /// `POST /chat/new_chat`
    pub async fn new_chat(&self, request: &NewChatRequest) -> Result<NewChatResponse> {
        self.post_json("/chat/new_chat", request, "new chat").await
    }

    /// `DELETE /chat/{id}`
    pub async fn delete_chat(&self, chat_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("/chat/{}", chat_id)))
            .send()
            .await?;
        Self::check(response, &format!("delete chat {}", chat_id)).await?;
        Ok(())
    }

    /// `POST /chat/{id}/add_message`
    pub async fn add_message(
        &self,
        chat_id: &str,
        request: &AddMessageRequest,
    ) -> Result<AddMessageResponse> {
        self.post_json(
            &format!("/chat/{}/add_message", chat_id),
            request,
            "add message",
        )
        .await
    }

    /// `POST /chat/{id}/generate/`
    pub async fn generate(
        &self,
        chat_id: &str,
        request: &GenerateRequest,
    ) -> Result<GenerationStream> {
        self.open_stream(&format!("/chat/{}/generate/", chat_id), request, "generate")
            .await
    }

    /// `POST /chat/{id}/continue/{messageId}`
    pub async fn continue_message(
        &self,
        chat_id: &str,
        message_id: &str,
        request: &GenerateRequest,
    ) -> Result<GenerationStream> {
        self.open_stream(
            &format!("/chat/{}/continue/{}", chat_id, message_id),
            request,
            "continue",
        )
        .await
    }

    /// `POST /chat/{id}/regenerate/{messageId}`
    pub async fn regenerate(
        &self,
        chat_id: &str,
        message_id: &str,
        request: &RegenerateRequest,
    ) -> Result<GenerationStream> {
        self.open_stream(
            &format!("/chat/{}/regenerate/{}", chat_id, message_id),
            request,
            "regenerate",
        )
        .await
    }

    /// `POST /chat/{id}/save_generation_result/{parentId}`
    ///
    /// Persists partial text as a new message under `parent_id`. Used after
    /// cancelling a generation or a branching regeneration.
    pub async fn save_generation_result(
        &self,
        chat_id: &str,
        parent_id: &str,
        message: &str,
    ) -> Result<()> {
        self.post_unit(
            &format!("/chat/{}/save_generation_result/{}", chat_id, parent_id),
            &SaveResultRequest {
                message: message.to_string(),
            },
            "save generation result",
        )
        .await
    }

    /// `POST /chat/{id}/save_edit_result/{messageId}`
    ///
    /// Persists partial text as the replacement of an existing message.
    /// Used after cancelling a continuation or a non-branching
    /// regeneration.
    pub async fn save_edit_result(
        &self,
        chat_id: &str,
        message_id: &str,
        message: &str,
    ) -> Result<()> {
        self.post_unit(
            &format!("/chat/{}/save_edit_result/{}", chat_id, message_id),
            &SaveResultRequest {
                message: message.to_string(),
            },
            "save edit result",
        )
        .await
    }

    /// `POST /chat/{id}/set_active_branch/{parentId}`
    pub async fn set_active_branch(
        &self,
        chat_id: &str,
        parent_id: &str,
        child_index: usize,
    ) -> Result<()> {
        self.post_unit(
            &format!("/chat/{}/set_active_branch/{}", chat_id, parent_id),
            &SetActiveBranchRequest { child_index },
            "set active branch",
        )
        .await
    }

    /// `POST /chat/{id}/edit_message/{messageId}`
    pub async fn edit_message(
        &self,
        chat_id: &str,
        message_id: &str,
        request: &EditMessageRequest,
    ) -> Result<()> {
        self.post_unit(
            &format!("/chat/{}/edit_message/{}", chat_id, message_id),
            request,
            "edit message",
        )
        .await
    }

    /// `POST /chat/{id}/delete_message/{messageId}`
    ///
    /// Deletes the message and, server-side, all its descendants.
    pub async fn delete_message(&self, chat_id: &str, message_id: &str) -> Result<()> {
        self.post_unit(
            &format!("/chat/{}/delete_message/{}", chat_id, message_id),
            &serde_json::json!({}),
            "delete message",
        )
        .await
    }

    /// `POST /chat/{id}/set_active_character`
    pub async fn set_active_character(
        &self,
        chat_id: &str,
        character_id: Option<String>,
    ) -> Result<()> {
        self.post_unit(
            &format!("/chat/{}/set_active_character", chat_id),
            &SetActiveCharacterRequest { character_id },
            "set active character",
        )
        .await
    }

    /// `GET /chat/list_characters`
    pub async fn list_characters(&self) -> Result<Vec<CharacterEntry>> {
        self.get_json("/chat/list_characters", "characters").await
    }

    /// `GET /chat/get_character/{id}`
    pub async fn get_character(&self, character_id: &str) -> Result<CharacterEntry> {
        self.get_json(
            &format!("/chat/get_character/{}", character_id),
            &format!("character {}", character_id),
        )
        .await
    }

    /// `POST /chat/create_character`
    pub async fn create_character(
        &self,
        request: &CharacterUpsertRequest,
    ) -> Result<CreateCharacterResponse> {
        self.post_json("/chat/create_character", request, "create character")
            .await
    }

    /// `PUT /chat/update_character/{id}`
    pub async fn update_character(
        &self,
        character_id: &str,
        request: &CharacterUpsertRequest,
    ) -> Result<()> {
        let response = self
            .http
            .put(self.url(&format!("/chat/update_character/{}", character_id)))
            .json(request)
            .send()
            .await?;
        Self::check(response, "update character").await?;
        Ok(())
    }

    /// `DELETE /chat/delete_character/{id}`
    pub async fn delete_character(&self, character_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("/chat/delete_character/{}", character_id)))
            .send()
            .await?;
        Self::check(response, "delete character").await?;
        Ok(())
    }

    /// `POST /stop`
    ///
    /// Best-effort hint that the backend should abandon generation faster.
    /// Client-side cancellation is authoritative for the client's own
    /// state, so callers ignore the result.
    pub async fn stop_hint(&self) -> Result<()> {
        self.post_unit("/stop", &serde_json::json!({}), "stop hint")
            .await
    }
}
