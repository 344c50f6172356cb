use std::{net::SocketAddr, sync::Arc, time::Duration};

use clap::Parser;
use cowork_admission::{
    adapters::{activity::memory::MemoryActivityLog, database::memory::MemoryDatabase, http},
    commands::{DomainLogic, EngineConfig},
};
use tracing::info;

/// Coworking booking server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the server to
    #[arg(long, env = "COWORK_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind the server to
    #[arg(short, long, env = "COWORK_PORT", default_value_t = 3000)]
    port: u16,

    /// How long a booking command waits for a busy space, in milliseconds
    #[arg(long, env = "COWORK_LOCK_TIMEOUT_MS", default_value_t = 5_000)]
    lock_timeout_ms: u64,

    /// How long a mutation waits for the activity log, in milliseconds
    #[arg(long, env = "COWORK_ACTIVITY_TIMEOUT_MS", default_value_t = 500)]
    activity_timeout_ms: u64,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
            activity_timeout: Duration::from_millis(self.activity_timeout_ms),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = args.engine_config();
    info!(?config, "starting coworking booking server");

    let logic = DomainLogic::new(
        Arc::new(MemoryDatabase::default()),
        Arc::new(MemoryActivityLog::default()),
        config,
    );
    let app = http::router(logic);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use speculoos::prelude::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["cowork-server"]).unwrap();

        assert_that!(args.port).is_equal_to(3000);
        assert_that!(args.engine_config()).is_equal_to(EngineConfig::default());
    }

    #[test]
    fn test_args_timeouts() {
        let args =
            Args::try_parse_from(["cowork-server", "--lock-timeout-ms", "250", "-p", "8080"])
                .unwrap();

        assert_that!(args.port).is_equal_to(8080);
        assert_that!(args.engine_config().lock_timeout).is_equal_to(Duration::from_millis(250));
    }
}
