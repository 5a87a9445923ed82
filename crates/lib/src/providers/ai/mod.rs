pub mod gemini;
pub mod local;
pub mod ollama;

use crate::errors::EndpointError;
use async_trait::async_trait;
use dyn_clone::DynClone;
use std::fmt::Debug;

/// A text-generation endpoint.
///
/// Implementations make one request per call and report every failure as an
/// `EndpointError`; retrying is the caller's concern.
#[async_trait]
pub trait Generator: Send + Sync + Debug + DynClone {
    /// Generates a response from a given system and user prompt.
    async fn generate(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, EndpointError>;
}

dyn_clone::clone_trait_object!(Generator);
