use anyhow::{Context, Result};
use mailbridge::{config, create_router, AppState, Secrets};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailbridge=info,tower_http=info".into()),
        )
        .init();

    info!("mailbridge starting...");

    let config = config::load_from_env().context("Failed to load configuration")?;
    let secrets = Secrets::from_env();
    info!(secrets = ?secrets, "Loaded secrets from environment");

    // Endpoints fail closed when secrets are missing; warn early as well
    for (name, missing) in [
        ("GOOGLE_CLIENT_ID", secrets.client_id().is_err()),
        ("GOOGLE_CLIENT_SECRET", secrets.google_client_secret.is_none()),
        ("GOOGLE_REDIRECT_URI", secrets.redirect_uri().is_err()),
        ("JWT_SECRET", secrets.jwt_secret().is_err()),
        ("ENCRYPTION_KEY", secrets.encryption_key().is_err()),
    ] {
        if missing {
            warn!(variable = name, "Required secret not set; affected endpoints will return configuration errors");
        }
    }

    let bind_addr = config.server.bind_addr.clone();
    let app = create_router(AppState::new(config, secrets));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!(addr = %bind_addr, "Listening");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
