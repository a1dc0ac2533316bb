//! Chat session orchestration
//!
//! [`ChatSessionController`] is the single authority coordinating the
//! cached message tree, the current chat identity, and streaming sessions
//! against backend calls. All UI-facing operations funnel through here.
//!
//! The backend owns branch/parent/id assignment and the partial-save
//! semantics of cancellation races, so the controller deliberately avoids
//! long-lived optimistic state: every mutation except the single
//! send-message append is followed by a full reload, trading a round trip
//! for the invariant that the client and backend trees never silently
//! diverge.

use crate::api::{
    AddMessageRequest, ApiClient, ChatSummary, EditMessageRequest, GenerateRequest,
    GenerationStream, NewChatRequest, RegenerateRequest,
};
use crate::chat::message::{now_timestamp, Attachment, Message, Role};
use crate::chat::stream::{GenerationKind, SaveRoute, SessionOutcome, StreamingSession};
use crate::chat::tree::{BranchInfo, ConversationTree};
use crate::config::{Config, GenerationConfig};
use crate::error::{is_not_found, Result, WeftError};
use crate::prefs::Prefs;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a streaming operation ended, for presentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// Stream completed and the chat was reloaded
    Completed,
    /// Stream was cancelled; partial text (if any) was saved and the chat
    /// reloaded
    Cancelled,
    /// Stream failed; the chat was reloaded to resynchronize
    Failed(String),
    /// Rejected synchronously before any network call (empty input,
    /// stream already active, or an unsuitable target message)
    Rejected,
}

/// Single authority over chat state and streaming sessions
///
/// Owns the message cache and current chat id as private fields; both are
/// mutated only on this controller's call stack. The active-session slot
/// doubles as the process-wide mutex: at most one stream runs at a time,
/// and attempts to start a second are rejected as no-ops.
pub struct ChatSessionController {
    api: ApiClient,
    model: String,
    provider: Option<String>,
    gen_args: GenerationConfig,
    chat_list_limit: usize,
    chats: Vec<ChatSummary>,
    chat_id: Option<String>,
    messages: Vec<Message>,
    character_id: Option<String>,
    pending_character: Option<String>,
    active: Option<CancellationToken>,
    interrupt: CancellationToken,
}

impl ChatSessionController {
    /// Creates a controller from configuration and saved preferences
    ///
    /// Preferences override config for model and generation arguments; the
    /// saved character becomes the pending character applied to the next
    /// new chat.
    pub fn new(api: ApiClient, config: &Config, prefs: &Prefs) -> Self {
        Self {
            api,
            model: prefs.model.clone().unwrap_or_else(|| config.chat.model.clone()),
            provider: config.chat.provider.clone(),
            gen_args: prefs
                .gen_args
                .clone()
                .unwrap_or_else(|| config.generation.clone()),
            chat_list_limit: config.chat.chat_list_limit,
            chats: Vec::new(),
            chat_id: None,
            messages: Vec::new(),
            character_id: None,
            pending_character: prefs.character_id.clone(),
            active: None,
            interrupt: CancellationToken::new(),
        }
    }

    // ------------------------------------------------------------------
    // Read accessors for the presentation layer
    // ------------------------------------------------------------------

    /// Currently open chat id
    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    /// Cached chat list, most recently updated first
    pub fn chats(&self) -> &[ChatSummary] {
        &self.chats
    }

    /// Cached flat message list of the open chat
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Active character of the open chat, or the pending selection
    pub fn character_id(&self) -> Option<&str> {
        if self.chat_id.is_some() {
            self.character_id.as_deref()
        } else {
            self.pending_character.as_deref()
        }
    }

    /// Model used for generation requests
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Switches the generation model
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    /// Generation arguments sent with every request
    pub fn gen_args(&self) -> &GenerationConfig {
        &self.gen_args
    }

    /// Whether a stream is currently active
    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    /// Token the presentation layer cancels to stop the current stream
    ///
    /// Cancellation is cooperative: the in-flight operation observes it at
    /// the next frame boundary, runs its partial-save-then-reload sequence,
    /// and only then returns.
    pub fn interrupt_token(&self) -> CancellationToken {
        self.interrupt.clone()
    }

    /// Resolved active path of the open chat
    pub fn active_path(&self) -> Vec<Message> {
        ConversationTree::build(&self.messages)
            .active_path()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Branch metadata for every fork in the open chat
    pub fn branch_info(&self) -> HashMap<String, BranchInfo> {
        ConversationTree::build(&self.messages).branch_info()
    }

    /// Last assistant message on the active path, the default target for
    /// continue and regenerate
    pub fn last_assistant_id(&self) -> Option<String> {
        self.active_path()
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.id.clone())
    }

    // ------------------------------------------------------------------
    // Chat lifecycle
    // ------------------------------------------------------------------

    /// Refreshes the cached chat list from the backend
    pub async fn refresh_chats(&mut self) -> Result<()> {
        self.chats = self.api.get_chats(self.chat_list_limit).await?;
        Ok(())
    }

    /// Loads a chat, replacing the local cache with backend state
    ///
    /// A 404 is eventual-consistency cleanup: the id is evicted from the
    /// cached list and the next available chat is loaded instead, down to
    /// a "no chat" state. Other errors clear the current chat id and
    /// propagate for inline display.
    pub async fn load_chat(&mut self, id: &str) -> Result<()> {
        let mut target = id.to_string();
        loop {
            match self.api.get_chat(&target).await {
                Ok(payload) => {
                    self.chat_id = Some(target.clone());
                    self.character_id = payload.character_id.clone();
                    self.messages = payload.into_messages();
                    debug!("Loaded chat {} ({} messages)", target, self.messages.len());
                    return Ok(());
                }
                Err(e) if is_not_found(&e) => {
                    warn!("Chat {} vanished server-side, evicting", target);
                    self.chats.retain(|c| c.chat_id != target);
                    self.chat_id = None;
                    self.messages.clear();
                    self.character_id = None;
                    match self.chats.first() {
                        Some(next) => target = next.chat_id.clone(),
                        None => return Ok(()),
                    }
                }
                Err(e) => {
                    self.chat_id = None;
                    self.messages.clear();
                    self.character_id = None;
                    return Err(e);
                }
            }
        }
    }

    /// Closes the open chat locally without touching the backend
    ///
    /// The pending character selection survives and applies to the next
    /// new chat.
    pub fn close_chat(&mut self) {
        self.chat_id = None;
        self.messages.clear();
        self.character_id = None;
    }

    /// Deletes a whole chat on the backend
    pub async fn delete_chat(&mut self, id: &str) -> Result<()> {
        if self.active.is_some() {
            return Err(WeftError::Validation("generation in progress".to_string()).into());
        }
        self.api.delete_chat(id).await?;
        self.chats.retain(|c| c.chat_id != id);
        if let Err(e) = self.refresh_chats().await {
            warn!("Chat list refresh after delete failed: {}", e);
        }
        if self.chat_id.as_deref() == Some(id) {
            self.close_chat();
            if let Some(next) = self.chats.first().map(|c| c.chat_id.clone()) {
                self.load_chat(&next).await?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Messaging operations
    // ------------------------------------------------------------------

    /// Sends a user message and generates the assistant reply
    ///
    /// With no chat open a new one is created first (the backend assigns
    /// the id and stores the message). Otherwise the message is posted and
    /// optimistically appended locally with its backend-confirmed id,
    /// parented at the end of the active path so non-default branches
    /// receive it correctly; generation then streams into a placeholder.
    pub async fn send_message(
        &mut self,
        text: &str,
        attachments: Vec<Attachment>,
        on_text: &mut dyn FnMut(&str),
    ) -> Result<StreamEnd> {
        if self.active.is_some() {
            debug!("send_message ignored: stream already active");
            return Ok(StreamEnd::Rejected);
        }
        if text.trim().is_empty() && attachments.is_empty() {
            return Ok(StreamEnd::Rejected);
        }

        match self.chat_id.clone() {
            None => {
                let response = self
                    .api
                    .new_chat(&NewChatRequest {
                        message: text.to_string(),
                        attachments: attachments.into_iter().map(Into::into).collect(),
                        character_id: self.pending_character.clone(),
                    })
                    .await?;
                info!("Created chat {}", response.chat_id);
                self.load_chat(&response.chat_id).await?;
                if let Err(e) = self.refresh_chats().await {
                    warn!("Chat list refresh after create failed: {}", e);
                }
            }
            Some(chat_id) => {
                let parent_id = ConversationTree::last_active_message_id(&self.messages);
                let response = self
                    .api
                    .add_message(
                        &chat_id,
                        &AddMessageRequest {
                            message: text.to_string(),
                            role: Role::User.as_wire().to_string(),
                            attachments: attachments.iter().cloned().map(Into::into).collect(),
                        },
                    )
                    .await?;
                // Optimistic append with the backend-confirmed id, purely
                // for perceived latency; the next reload re-derives it.
                self.messages.push(Message::user(
                    response.message_id,
                    parent_id,
                    text,
                    attachments,
                    now_timestamp(),
                ));
            }
        }

        self.generate(on_text).await
    }

    /// Generates a new assistant message at the end of the active path
    ///
    /// A transient placeholder renders the stream until the confirming
    /// reload replaces it with the backend's message. On setup failure the
    /// placeholder is removed; on stream failure the reload guarantees no
    /// stale placeholder survives.
    pub async fn generate(&mut self, on_text: &mut dyn FnMut(&str)) -> Result<StreamEnd> {
        if self.active.is_some() {
            debug!("generate ignored: stream already active");
            return Ok(StreamEnd::Rejected);
        }
        let Some(chat_id) = self.chat_id.clone() else {
            return Ok(StreamEnd::Rejected);
        };

        let parent_id = ConversationTree::last_active_message_id(&self.messages);
        let placeholder = Message::placeholder(parent_id.clone(), now_timestamp());
        let placeholder_id = placeholder.id.clone();
        self.messages.push(placeholder);

        let kind = GenerationKind::New { parent_id };
        match self
            .run_stream(&chat_id, kind, Some(placeholder_id.clone()), on_text)
            .await
        {
            Ok(end) => Ok(end),
            Err(e) => {
                self.messages.retain(|m| m.id != placeholder_id);
                Err(e)
            }
        }
    }

    /// Streams a continuation onto an existing assistant message
    ///
    /// Chunks are appended to the target's existing content rather than
    /// replacing it; on cancellation the partial text is saved only when
    /// it differs from the original.
    pub async fn continue_message(
        &mut self,
        message_id: &str,
        on_text: &mut dyn FnMut(&str),
    ) -> Result<StreamEnd> {
        if self.active.is_some() {
            debug!("continue_message ignored: stream already active");
            return Ok(StreamEnd::Rejected);
        }
        let Some(chat_id) = self.chat_id.clone() else {
            return Ok(StreamEnd::Rejected);
        };
        let Some(target) = self.messages.iter().find(|m| m.id == message_id) else {
            return Ok(StreamEnd::Rejected);
        };
        if target.role != Role::Assistant {
            return Ok(StreamEnd::Rejected);
        }

        let kind = GenerationKind::Continue {
            message_id: message_id.to_string(),
            original: target.content.clone(),
        };
        self.run_stream(&chat_id, kind, Some(message_id.to_string()), on_text)
            .await
    }

    /// Regenerates an assistant message, optionally as a sibling branch
    ///
    /// Without branching the target's displayed content is replaced as
    /// chunks arrive and the backend overwrites the message. With
    /// branching no cached message is touched; the backend creates a
    /// sibling under the same parent and the tree changes only at reload.
    pub async fn regenerate_message(
        &mut self,
        message_id: &str,
        as_new_branch: bool,
        on_text: &mut dyn FnMut(&str),
    ) -> Result<StreamEnd> {
        if self.active.is_some() {
            debug!("regenerate_message ignored: stream already active");
            return Ok(StreamEnd::Rejected);
        }
        let Some(chat_id) = self.chat_id.clone() else {
            return Ok(StreamEnd::Rejected);
        };
        let Some(target) = self.messages.iter().find(|m| m.id == message_id) else {
            return Ok(StreamEnd::Rejected);
        };
        if target.role != Role::Assistant {
            return Ok(StreamEnd::Rejected);
        }
        let Some(parent_id) = target.parent_id.clone() else {
            return Ok(StreamEnd::Rejected);
        };

        let display_target = if as_new_branch {
            None
        } else {
            Some(message_id.to_string())
        };
        let kind = GenerationKind::Regenerate {
            message_id: message_id.to_string(),
            parent_id,
            new_branch: as_new_branch,
        };
        self.run_stream(&chat_id, kind, display_target, on_text).await
    }

    /// Edits a message's content, preserving role, attachments, and model
    ///
    /// Unlike send there is no optimistic mutation: the edit waits for the
    /// confirmed reload.
    pub async fn edit_message(&mut self, message_id: &str, new_text: &str) -> Result<()> {
        let Some(chat_id) = self.chat_id.clone() else {
            return Err(WeftError::Validation("no chat open".to_string()).into());
        };
        let Some(target) = self.messages.iter().find(|m| m.id == message_id) else {
            return Err(
                WeftError::Validation(format!("no such message: {}", message_id)).into(),
            );
        };

        let request = EditMessageRequest {
            message: new_text.to_string(),
            role: target.role.as_wire().to_string(),
            model_name: target.model.clone(),
            attachments: target.attachments.iter().cloned().map(Into::into).collect(),
        };
        self.api.edit_message(&chat_id, message_id, &request).await?;
        self.load_chat(&chat_id).await
    }

    /// Deletes a message; the backend cascades to all descendants
    pub async fn delete_message(&mut self, message_id: &str) -> Result<()> {
        let Some(chat_id) = self.chat_id.clone() else {
            return Err(WeftError::Validation("no chat open".to_string()).into());
        };
        if !self.messages.iter().any(|m| m.id == message_id) {
            return Err(
                WeftError::Validation(format!("no such message: {}", message_id)).into(),
            );
        }

        self.api.delete_message(&chat_id, message_id).await?;
        self.load_chat(&chat_id).await?;
        if let Err(e) = self.refresh_chats().await {
            warn!("Chat list refresh after delete failed: {}", e);
        }
        Ok(())
    }

    /// Switches the active branch under a fork
    ///
    /// The one mutation that updates the local cache without a reload: on
    /// backend success the cached parent's index is changed in place and
    /// the path re-resolves from cache. On failure the cache is untouched.
    pub async fn set_active_branch(&mut self, parent_id: &str, new_index: usize) -> Result<()> {
        let Some(chat_id) = self.chat_id.clone() else {
            return Err(WeftError::Validation("no chat open".to_string()).into());
        };
        let info = self.branch_info();
        let Some(branch) = info.get(parent_id) else {
            return Err(WeftError::Validation(format!(
                "message {} has no branches",
                parent_id
            ))
            .into());
        };
        if new_index >= branch.total_branches {
            return Err(WeftError::Validation(format!(
                "branch index {} out of range (0..{})",
                new_index, branch.total_branches
            ))
            .into());
        }

        self.api
            .set_active_branch(&chat_id, parent_id, new_index)
            .await?;
        if let Some(parent) = self.messages.iter_mut().find(|m| m.id == parent_id) {
            parent.active_child_index = new_index;
        }
        Ok(())
    }

    /// Selects the active character
    ///
    /// With a chat open the change is posted and the chat reloaded to pick
    /// up the new system prompt. With no chat open only the pending
    /// selection for the next new chat changes. On backend failure local
    /// state is untouched, so the UI can revert to `character_id()`.
    pub async fn set_active_character(&mut self, character_id: Option<String>) -> Result<()> {
        match self.chat_id.clone() {
            Some(chat_id) => {
                self.api
                    .set_active_character(&chat_id, character_id)
                    .await?;
                self.load_chat(&chat_id).await
            }
            None => {
                self.pending_character = character_id;
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Stream driving
    // ------------------------------------------------------------------

    fn generate_request(&self) -> GenerateRequest {
        GenerateRequest {
            model_name: self.model.clone(),
            streaming: true,
            gen_args: self.gen_args.clone(),
            provider: self.provider.clone(),
        }
    }

    /// Opens the backend stream for `kind` and drives it to a terminal
    /// state, then reconciles
    ///
    /// Returns `Err` only when the stream could not be opened (the caller
    /// undoes its optimistic setup). Once streaming, every outcome is
    /// folded into a [`StreamEnd`] after the save-then-reload sequence:
    /// backend state is the single source of truth, not the accumulator.
    async fn run_stream(
        &mut self,
        chat_id: &str,
        kind: GenerationKind,
        display_target: Option<String>,
        on_text: &mut dyn FnMut(&str),
    ) -> Result<StreamEnd> {
        let frames: GenerationStream = match &kind {
            GenerationKind::New { .. } => {
                self.api.generate(chat_id, &self.generate_request()).await?
            }
            GenerationKind::Continue { message_id, .. } => {
                self.api
                    .continue_message(chat_id, message_id, &self.generate_request())
                    .await?
            }
            GenerationKind::Regenerate {
                message_id,
                new_branch,
                ..
            } => {
                self.api
                    .regenerate(
                        chat_id,
                        message_id,
                        &RegenerateRequest {
                            generate: self.generate_request(),
                            new_branch: *new_branch,
                        },
                    )
                    .await?
            }
        };

        let token = self.interrupt.child_token();
        self.active = Some(token.clone());
        let mut session = StreamingSession::new(kind, token);

        let outcome = {
            let messages = &mut self.messages;
            session
                .drive(frames, |text| {
                    if let Some(target) = &display_target {
                        if let Some(message) = messages.iter_mut().find(|m| m.id == *target) {
                            message.content = text.to_string();
                        }
                    }
                    on_text(text);
                })
                .await
        };

        // The active slot and interrupt token reset unconditionally,
        // whatever the outcome.
        self.active = None;
        if self.interrupt.is_cancelled() {
            self.interrupt = CancellationToken::new();
        }

        match outcome {
            SessionOutcome::Completed { message_id } => {
                debug!("Stream completed (confirmed id: {:?})", message_id);
                self.reload_after_stream(chat_id).await;
                Ok(StreamEnd::Completed)
            }
            SessionOutcome::Cancelled => {
                // Hint the backend to stop sooner; client-side state does
                // not depend on it.
                let api = self.api.clone();
                tokio::spawn(async move {
                    let _ = api.stop_hint().await;
                });

                if let Some((route, text)) = session.partial_save() {
                    let saved = match &route {
                        SaveRoute::NewMessage { parent_id } => {
                            self.api
                                .save_generation_result(chat_id, parent_id, text)
                                .await
                        }
                        SaveRoute::ReplaceMessage { message_id } => {
                            self.api.save_edit_result(chat_id, message_id, text).await
                        }
                    };
                    if let Err(e) = saved {
                        warn!("Partial save failed: {}", e);
                    }
                }
                self.reload_after_stream(chat_id).await;
                Ok(StreamEnd::Cancelled)
            }
            SessionOutcome::Failed(reason) => {
                warn!("Stream failed: {}", reason);
                let annotated = format!("{}\n[error: {}]", session.accumulated(), reason);
                if let Some(target) = &display_target {
                    if let Some(message) = self.messages.iter_mut().find(|m| m.id == *target) {
                        message.content = annotated.clone();
                    }
                }
                on_text(&annotated);
                self.reload_after_stream(chat_id).await;
                Ok(StreamEnd::Failed(reason))
            }
        }
    }

    /// Best-effort reload after a stream ends
    ///
    /// The reload is the reconciliation step; its own failure must not
    /// mask the stream outcome.
    async fn reload_after_stream(&mut self, chat_id: &str) {
        if let Err(e) = self.load_chat(chat_id).await {
            warn!("Reload after stream failed: {}", e);
        }
    }

    #[cfg(test)]
    pub(crate) fn lock_for_test(&mut self) {
        self.active = Some(CancellationToken::new());
    }
}
