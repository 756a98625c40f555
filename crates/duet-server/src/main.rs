use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use duet_api::media::MediaStore;
use duet_api::outbound::Outbound;
use duet_api::state::AppStateInner;
use duet_gateway::Relay;
use duet_server::{Config, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "duet_server=debug,duet_api=debug,duet_db=debug,duet_gateway=debug,tower_http=debug"
                        .into()
                }),
        )
        .init();

    let config = Config::from_env()?;

    let db = duet_db::Database::open(&PathBuf::from(&config.db_path))?;
    let media = MediaStore::new(config.public_dir.clone()).await?;
    let relay = Relay::new();

    let state = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        relay: relay.clone(),
        media,
        outbound: Outbound::new(config.mail_webhook.clone(), config.sms_webhook.clone()),
    });

    let app = build_router(state, relay, config.auth_rate_limit, config.api_rate_limit);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Duet server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
