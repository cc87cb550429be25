//! rustmq - local SQS-compatible message queue
//!
//! Speaks the query protocol (form-urlencoded requests, XML responses) so
//! stock AWS SDK clients can point at it during development and testing.

mod router;

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rustmq_queue::Broker;

#[derive(Parser, Debug)]
#[command(name = "rustmq")]
#[command(about = "Local SQS-compatible message queue", long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "4576", env = "RUSTMQ_PORT")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0", env = "RUSTMQ_HOST")]
    host: String,

    /// External base URL queue URLs are rooted at
    /// (defaults to http://localhost:<port>)
    #[arg(long, env = "RUSTMQ_ENDPOINT")]
    endpoint: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUSTMQ_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("rustmq={},tower_http=debug", args.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let endpoint = args
        .endpoint
        .clone()
        .unwrap_or_else(|| format!("http://localhost:{}", args.port));

    info!("Starting rustmq...");
    info!("  Queue URLs rooted at {}", endpoint);

    let broker = Arc::new(Broker::new(endpoint));
    let app = router::create_router(broker);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
