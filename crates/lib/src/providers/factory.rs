//! # Generator Factory
//!
//! Builds the configured generation endpoint client so every binary wires
//! providers the same way.

use crate::{
    config::GeneratorConfig,
    errors::{ConfigError, EndpointError, PipelineError},
    providers::ai::{
        gemini::GeminiGenerator, local::LocalAiGenerator, ollama::OllamaGenerator, Generator,
    },
};
use std::time::Duration;
use tracing::info;

/// Creates a `Generator` from configuration.
///
/// Every request made by the returned client times out after `timeout`.
pub fn build_generator(
    config: &GeneratorConfig,
    timeout: Duration,
) -> Result<Box<dyn Generator>, PipelineError> {
    info!(
        "Configuring '{}' generator with model '{}' at {}",
        config.provider, config.model_name, config.api_url
    );
    let generator: Box<dyn Generator> = match config.provider.as_str() {
        "ollama" => Box::new(
            OllamaGenerator::new(config.api_url.clone(), config.model_name.clone(), timeout)
                .map_err(client_build_error)?,
        ),
        "local" => Box::new(
            LocalAiGenerator::new(
                config.api_url.clone(),
                config.api_key.clone(),
                Some(config.model_name.clone()),
                timeout,
            )
            .map_err(client_build_error)?,
        ),
        "gemini" => {
            let api_key = config
                .api_key
                .clone()
                .filter(|key| !key.is_empty())
                .ok_or_else(|| {
                    ConfigError::Missing("generator.api_key is required for gemini".to_string())
                })?;
            Box::new(
                GeminiGenerator::new(config.api_url.clone(), api_key, timeout)
                    .map_err(client_build_error)?,
            )
        }
        other => {
            return Err(ConfigError::Invalid(format!("Unsupported generator provider: {other}")).into())
        }
    };
    Ok(generator)
}

fn client_build_error(e: EndpointError) -> PipelineError {
    ConfigError::Invalid(e.to_string()).into()
}
