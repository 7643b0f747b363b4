pub mod client;
pub mod config;
pub mod converter;
pub mod normalizer;
pub mod orchestrator;
pub mod session;
pub mod transport;

pub use client::{EditClient, RemoteEditClient};
pub use config::EngineConfig;
pub use converter::{convert_batch, convert_image, ConvertOptions, ConvertedFile, TargetFormat};
pub use orchestrator::{
    Applied, Orchestrator, OrchestratorConfig, Progress, RetryPolicy, SubmitRejected,
};
pub use session::{EnhancementSession, ProcessingState, SessionPhase, SubmitMode};
pub use transport::{EditTransport, GeminiTransport};

/// Gemini-backed client wired from environment configuration.
pub fn remote_client(config: &EngineConfig) -> RemoteEditClient<GeminiTransport> {
    RemoteEditClient::new(GeminiTransport::new(config), config.image_model.clone())
        .with_payload_ceiling(config.payload_ceiling_bytes)
}

/// Orchestrator over the Gemini client, carrying the configured normalizer.
pub fn remote_orchestrator(
    config: &EngineConfig,
    orchestrator: OrchestratorConfig,
) -> Orchestrator<RemoteEditClient<GeminiTransport>> {
    Orchestrator::new(remote_client(config), orchestrator).with_normalizer(config.normalizer)
}
