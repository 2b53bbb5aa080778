//! Core data types for the Reelforge generation orchestrator.
//!
//! Wire bodies (`ChatBody`, `GenerateBody`, ...) are lenient and mirror what the
//! web UI sends. They are validated exactly once into immutable types
//! (`GenerationRequest`, `QueueItem`) before any backend is touched.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod agent;
mod attachment;
mod lenient;
mod provider;
mod queue;
mod request;
mod story;

pub use agent::{CodexSession, CommandPlan, CommandPreset, CommandSettings};
pub use attachment::{AttachmentPayload, MediaAttachment, extension_for_mime};
pub use provider::{Provider, ProviderFamily};
pub use queue::{QueueItem, QueueRequest};
pub use request::{
    BackendSelection, ChatBody, DEFAULT_GPT4FREE_MODEL, DEFAULT_OLLAMA_URL, EndpointSettings,
    GenerateBody, GenerationRequest, Gpt4FreeSettings, ImageGenBody, ImageGenConfig,
    ProviderSettings, RequestPolicy, Task,
};
pub use story::{STRUCTURED_PROMPT_NAME, StoryFields, writer_instruction};
