//! External image generation: provider seam, retry/backoff discipline
//! and per-call cost tracking.

pub mod client;
pub mod prompt;
pub mod provider;

pub use client::{GeneratedImage, GenerationClient};
pub use prompt::PromptLibrary;
pub use provider::{GenerationRequest, ImageProvider, OpenAiImageProvider};
