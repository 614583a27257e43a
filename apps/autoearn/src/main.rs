use autoearn::commands::{self, Feed};
use autoearn::obs;
use autoearn_application::config::load_config_with_source;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const CONFIG_ENV: &str = "AUTOEARN_CONFIG";

#[derive(Parser, Debug)]
#[command(name = "autoearn")]
#[command(about = "Candle-driven trading-signal engine with paper execution.", version)]
struct Cli {
    /// Config file path (TOML). If omitted, uses env AUTOEARN_CONFIG.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Prometheus exporter listen address (host:port). If omitted, uses env AUTOEARN_METRICS_ADDR.
    #[arg(long, global = true)]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream live candles from the exchange (requires feature realtime-okx).
    Run,
    /// Replay a capture file of raw exchange messages.
    Replay {
        /// Capture file; defaults to stream.replay_path from the config.
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Parse and validate the config, then print the effective settings.
    Validate,
}

fn main() {
    let cli = Cli::parse();
    let is_validate = matches!(cli.command, Command::Validate);

    let config_path = cli
        .config
        .or_else(|| {
            std::env::var(CONFIG_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| {
            eprintln!("error: missing --config and env {CONFIG_ENV} is not set");
            std::process::exit(1);
        });

    let (config, config_source) = match load_config_with_source(&config_path) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(if is_validate { 2 } else { 1 });
        }
    };

    if let Err(err) = obs::init_tracing(config.log_level(), config.log_format()) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    let metrics_addr = obs::metrics_addr(cli.metrics_addr.as_deref())
        .and_then(obs::init_metrics);
    if let Err(err) = metrics_addr {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    let result = match cli.command {
        Command::Validate => Ok(commands::run_validate(&config, &config_source)),
        Command::Run => commands::run_trading(config, config_source, Feed::Live),
        Command::Replay { data } => {
            let data = data.or_else(|| config.replay_path().map(PathBuf::from));
            match data {
                Some(path) => commands::run_trading(config, config_source, Feed::Replay(path)),
                None => Err("replay needs --data or stream.replay_path in the config".to_string()),
            }
        }
    };

    match result {
        Ok(summary) => {
            println!(
                "{}",
                serde_json::to_string(&summary)
                    .unwrap_or_else(|_| "{\"status\":\"error\",\"error\":\"json\"}".to_string())
            );
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}
