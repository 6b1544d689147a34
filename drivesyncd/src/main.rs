use drivesyncd::daemon::{DaemonConfig, DaemonRuntime};
use drivesyncd::sync::tracking::TrackingStore;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliMode {
    Run,
    Reset,
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut mode = CliMode::Run;
    for arg in args.into_iter().skip(1) {
        match arg.as_str() {
            "--reset" => mode = CliMode::Reset,
            "--help" | "-h" => mode = CliMode::Help,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(mode)
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();
    match parse_cli_mode(std::env::args())? {
        CliMode::Reset => {
            let config = DaemonConfig::from_env()?;
            let tracking = TrackingStore::open(config.tracking_path()).await?;
            tracking.reset().await?;
            info!("tracking data cleared");
            return Ok(());
        }
        CliMode::Help => {
            println!("Usage: drivesyncd [--reset]");
            println!("  --reset   Forget everything synced so far and exit");
            return Ok(());
        }
        CliMode::Run => {}
    }
    let config = DaemonConfig::from_env()?;
    let daemon = DaemonRuntime::bootstrap(config).await?;
    daemon.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cli_mode_defaults_to_run() {
        let mode = parse_cli_mode(vec!["drivesyncd".to_string()]).unwrap();
        assert_eq!(mode, CliMode::Run);
    }

    #[test]
    fn parse_cli_mode_supports_reset() {
        let mode = parse_cli_mode(vec!["drivesyncd".to_string(), "--reset".to_string()]).unwrap();
        assert_eq!(mode, CliMode::Reset);
    }

    #[test]
    fn parse_cli_mode_supports_help() {
        let mode = parse_cli_mode(vec!["drivesyncd".to_string(), "--help".to_string()]).unwrap();
        assert_eq!(mode, CliMode::Help);
    }

    #[test]
    fn parse_cli_mode_rejects_unknown_arguments() {
        let err = parse_cli_mode(vec!["drivesyncd".to_string(), "--frobnicate".to_string()]);
        assert!(err.is_err());
    }
}
