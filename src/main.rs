use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use xraydesk::{
    api::{AppState, create_router},
    chat::OpenRouterService,
    config::Config,
    ingest::IngestService,
    logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            // Missing credentials are a startup-time configuration error, not
            // something to surface through the UI server.
            eprintln!("Configuration error: {err}");
            eprintln!("Set GROUNDX_API_KEY and OPENROUTER_API_KEY in the environment or .env file.");
            std::process::exit(1);
        }
    };
    logging::init_tracing();
    tracing::debug!(
        groundx_url = %config.groundx_base_url,
        openrouter_url = %config.openrouter_base_url,
        bucket = %config.bucket_name,
        model = %config.chat_model,
        server_port = ?config.server_port,
        "Loaded configuration"
    );

    let ingest = Arc::new(IngestService::new(Arc::clone(&config)).await?);
    let chat = Arc::new(OpenRouterService::new(&config)?);
    let app = create_router(AppState {
        ingest,
        chat,
        session: Arc::new(RwLock::new(None)),
        config: Arc::clone(&config),
    });

    let (listener, port) = bind_listener(config.server_port).await?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn bind_listener(configured_port: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = configured_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4700..=4799;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4700-4799",
    ))
}
