use std::path::PathBuf;

use axum::http::{header, HeaderMap, HeaderValue, Method};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::net::TcpListener;

use service_router::config::{load_config, RouterConfig};
use service_router::http::HttpServer;
use service_router::lifecycle::{shutdown_signal, Shutdown};
use service_router::observability::init_logging;
use service_router::routing::{Classifier, QueryParams, Resolver};

#[derive(Parser)]
#[command(name = "service-router")]
#[command(about = "Reverse-proxy router fanning traffic out to backend services", long_about = None)]
struct Cli {
    /// TOML configuration file; environment variables override it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the router (default)
    Serve,
    /// Print how a request would be routed, without sending it
    Resolve {
        /// HTTP method of the inbound request
        #[arg(short, long, default_value = "GET")]
        method: String,
        /// Inbound path, e.g. /api/proxy/messages/42
        path: String,
        /// Query parameter as key=value; repeat for more
        #[arg(short, long = "query")]
        query: Vec<String>,
        /// Treat the request as a WebSocket upgrade
        #[arg(long)]
        websocket: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.observability);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Resolve {
            method,
            path,
            query,
            websocket,
        } => resolve(&config, &method, &path, &query, websocket),
    }
}

async fn serve(config: RouterConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        environment = ?config.environment,
        general = %config.services.general,
        group = %config.services.group,
        notification = %config.services.notification,
        file = %config.services.file,
        presence = %config.services.presence,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    shutdown_signal().await;
    shutdown.trigger();

    server_task.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn resolve(
    config: &RouterConfig,
    method: &str,
    path: &str,
    pairs: &[String],
    websocket: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())?;

    let mut query = QueryParams::default();
    for pair in pairs {
        let (key, value) = pair.split_once('=').unwrap_or((pair.as_str(), ""));
        query.insert(key, value);
    }

    let mut headers = HeaderMap::new();
    if websocket {
        headers.insert(header::CONNECTION, HeaderValue::from_static("Upgrade"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
    }

    let decision = Classifier::new().classify(&method, path, &headers);
    let mut url = Resolver::new(&config.services).resolve(&decision, &query)?;
    if decision.is_websocket {
        url = service_router::routing::resolver::websocket_url(&url);
    }

    let output = json!({
        "decision": decision,
        "url": url.as_str(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
