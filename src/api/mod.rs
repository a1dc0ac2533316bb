//! Backend API layer
//!
//! Wire types, the SSE frame decoder, and the HTTP client for the chat
//! backend. Everything above this module works in domain terms; wire
//! shapes do not escape it except through explicit conversions.

pub mod client;
pub mod sse;
pub mod types;

pub use client::{ApiClient, GenerationStream, HttpByteStream};
pub use sse::{SseDecoder, StreamEvent, KEEP_ALIVE_TOKEN};
pub use types::{
    AddMessageRequest, AddMessageResponse, ApiAttachment, ApiMessage, CharacterEntry,
    CharacterUpsertRequest, ChatPayload, ChatSummary, CreateCharacterResponse,
    EditMessageRequest, GenerateRequest, ModelEntry, NewChatRequest, NewChatResponse,
    RegenerateRequest, SaveResultRequest, SetActiveBranchRequest, SetActiveCharacterRequest,
    StreamFrame,
};
