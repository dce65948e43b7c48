use std::sync::Arc;

use anyhow::{Context, Result};
use assistant_session::{
    ClientSecret, Config, ConversationManager, GrpcChannelFactory, OAuthToken,
    OAuthTokenProvider, TokenProvider,
};
use clap::Parser;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "assistant-session", about = "Send a text query to the assistant")]
struct Args {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/assistant-session")]
    config: String,

    /// Cached token JSON from a previous authorization
    #[arg(long)]
    token: Option<std::path::PathBuf>,

    /// Text query to send
    #[arg(default_value = "what time is it")]
    query: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("Loaded config: {}", cfg.service.name);
    info!(
        "Endpoint {} ({}), device {}",
        cfg.service.endpoint, cfg.service.revision, cfg.device.device_id
    );

    let secret_path = cfg
        .oauth
        .client_secret_path
        .clone()
        .context("oauth.client_secret_path is required")?;
    let secret = ClientSecret::from_file(&secret_path)?;

    let mut provider = OAuthTokenProvider::new(secret)?
        .with_scopes(cfg.oauth.scopes.clone())
        .with_token_callback(|token| info!(expires_at = ?token.expires_at, "Obtained OAuth token"));

    if let Some(path) = &args.token {
        match std::fs::read_to_string(path) {
            Ok(json) => {
                let token: OAuthToken =
                    serde_json::from_str(&json).context("Invalid cached token")?;
                provider = provider.with_token(token);
            }
            Err(e) => warn!("Cannot read cached token {}: {}", path.display(), e),
        }
    }
    let provider = Arc::new(provider);

    let auth_url = provider.auth_url();
    if !auth_url.is_empty() && !provider.is_authorized() {
        let addr = provider.start_callback_listener(cfg.callback_addr()?).await?;
        info!("Open this URL to authorize the device: {}", auth_url);
        info!("Waiting for the OAuth redirect on http://{}", addr);
        provider.wait_authorized().await?;
    }

    let manager = ConversationManager::new(
        Arc::new(GrpcChannelFactory::new()),
        provider.clone() as Arc<dyn TokenProvider>,
        cfg.channel_target(),
        cfg.audio_settings()?,
        cfg.device_identity(),
    )
    .with_dialog_state(cfg.dialog_state());

    let result = async {
        let conversation = manager.open_conversation(cfg.conversation_timeout()).await?;
        let mut transport = conversation.text_transport()?;
        let response = transport.query(&args.query).await?;
        conversation.close().await;
        Ok::<_, assistant_session::AssistantError>(response)
    }
    .await;

    manager.close().await;

    let response = result?;
    info!("Assistant: {}", response);

    Ok(())
}
