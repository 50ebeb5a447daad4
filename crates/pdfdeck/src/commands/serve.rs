use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Settings;
use crate::narration::ClaudeNarrator;
use crate::server::{self, AppState};
use crate::service::ConversionClient;

/// Run the upload/narration proxy until the process is stopped.
pub fn run(settings: Settings, bind: SocketAddr) -> Result<()> {
    if settings.api_key.is_none() {
        warn!("no API key configured; /api/narrate will answer with an error");
    }
    info!(service = %settings.service_url, "forwarding uploads to conversion service");

    let state = AppState {
        converter: Arc::new(ConversionClient::new(
            &settings.service_url,
            settings.timeout_secs,
        )),
        narrator: Arc::new(ClaudeNarrator::new(
            settings.api_key.clone(),
            &settings.model,
            settings.max_tokens,
        )),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(server::serve(bind, state, settings.max_upload_bytes))
}
