//! uiautodev-server: local backend for the uiautodev inspector
//!
//! Usage:
//!   uiautodev-server              Start the server (configuration from the environment)
//!   uiautodev-server version      Show version information
//!   uiautodev-server help         Show this help message

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use uiautodev::client::ChatService;
use uiautodev::server::{self, AppState};
use uiautodev::ServiceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match std::env::args().nth(1).as_deref() {
        None | Some("serve") => {}
        Some("version" | "--version" | "-V") => {
            println!("uiautodev-server {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some("help" | "--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(other) => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }

    let config = ServiceConfig::from_env().context("loading configuration")?;
    init_tracing(&config.log_level);

    if config.api_key.is_none() {
        tracing::warn!(
            provider = %config.provider,
            env = config.provider.api_key_env(),
            "no API key configured; chat requests will fail until it is set"
        );
    }
    if std::env::var_os("UIAUTODEV_RELOAD").is_some() {
        tracing::info!("UIAUTODEV_RELOAD is ignored");
    }

    let addr = format!("{}:{}", config.host, config.port);
    let service = ChatService::builder()
        .config(config)
        .build()
        .context("building chat service")?;
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    server::serve(listener, AppState::new(service)).await?;
    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_usage() {
    println!(
        r#"uiautodev-server - local uiautodev backend

USAGE:
    uiautodev-server [COMMAND]

COMMANDS:
    serve       Start the server (default)
    version     Show version information
    help        Show this help message

ENVIRONMENT:
    UIAUTODEV_LLM_PROVIDER      deepseek | openai (default deepseek)
    DEEPSEEK_API_KEY            API key for DeepSeek
    OPENAI_API_KEY              API key for OpenAI
    COCOINDEX_SEARCH_API_URL    Snippet search endpoint (default http://localhost:8000/search)
    UIAUTODEV_HOST              Bind address (default 127.0.0.1)
    UIAUTODEV_PORT              Bind port (default 20242)
    UIAUTODEV_LOG_LEVEL         Log level when RUST_LOG is unset (default info)"#
    );
}
