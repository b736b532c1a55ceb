use anyhow::Result;
use clap::Parser;
use gemini_fallback_gateway::app::App;
use gemini_fallback_gateway::config::Config;
use gemini_fallback_gateway::server;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "gemini-fallback-gateway")]
#[command(about = "Serve Gemini generateContent with model/endpoint fallback")]
struct CliArgs {
    /// Address to listen on; overrides GATEWAY_BIND_ADDR.
    #[arg(long, value_name = "ADDR")]
    bind: Option<SocketAddr>,

    /// Skip the list-models call and use the static fallback list only.
    #[arg(long)]
    no_discovery: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gemini_fallback_gateway=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if args.no_discovery {
        config.discovery_enabled = false;
    }

    info!("Starting gemini-fallback-gateway");
    let app = Arc::new(App::from_config(&config));

    if let Err(e) = server::serve(app, config.bind_addr).await {
        error!("Gateway stopped with error: {}", e);
        std::process::exit(1);
    }

    info!("Gateway shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::CliArgs;
    use clap::Parser;

    #[test]
    fn test_cli_defaults() {
        let args = CliArgs::try_parse_from(["gemini-fallback-gateway"]).unwrap();
        assert!(args.bind.is_none());
        assert!(!args.no_discovery);
    }

    #[test]
    fn test_cli_bind_and_no_discovery() {
        let args = CliArgs::try_parse_from([
            "gemini-fallback-gateway",
            "--bind",
            "127.0.0.1:8080",
            "--no-discovery",
        ])
        .unwrap();
        assert_eq!(args.bind, Some("127.0.0.1:8080".parse().unwrap()));
        assert!(args.no_discovery);
    }

    #[test]
    fn test_cli_rejects_bad_address() {
        assert!(CliArgs::try_parse_from(["gemini-fallback-gateway", "--bind", "nowhere"]).is_err());
    }
}
