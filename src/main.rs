use std::time::Duration;

use chartfeed::cli::{Cli, Commands, InteractiveCommand};
use chartfeed::config::Config;
use chartfeed::sync::{SyncConfig, SyncController};
use chartfeed::ui::LogSink;
use chartfeed::{AppResult, init_logging};
use tokio::io::AsyncBufReadExt;

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse_args();

    if let Commands::Config { action } = cli.command() {
        Config::handle_command(&action, &cli.config_file)?;
        return Ok(());
    }

    // Load configuration
    let config = Config::load_or_default(&cli.config_file);

    // Initialize logging; the guard keeps the file writer alive.
    let _log_guard = init_logging(&cli.effective_log_level(), Some(&config.log.file_path))?;

    tracing::info!("ChartFeed starting...");
    tracing::debug!("CLI arguments: {:?}", cli);

    let symbol = cli
        .symbol
        .as_deref()
        .map(Config::normalize_symbol)
        .unwrap_or_else(|| config.symbol.clone());

    let sync_config = SyncConfig {
        rest_url: config.server.rest_url.clone(),
        ws_url: config.server.ws_url.clone(),
        request_timeout: Duration::from_secs(config.server.timeout_seconds),
        reconnect_delay: Duration::from_millis(config.server.reconnect_delay_ms),
    };

    let (controller, handle) = SyncController::new(sync_config, Box::new(LogSink::new()));
    let controller_task = tokio::spawn(controller.run());

    handle.select_symbol(symbol)?;

    // Interactive prompt on stdin; ctrl-c also exits.
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match InteractiveCommand::parse(trimmed) {
                        Ok(InteractiveCommand::Symbol(symbol)) => handle.select_symbol(symbol)?,
                        Ok(InteractiveCommand::Trade { side, quantity }) => {
                            handle.place_trade(side, quantity)?;
                        }
                        Ok(InteractiveCommand::Status) => handle.report_status()?,
                        Ok(InteractiveCommand::Help) => {
                            for message in InteractiveCommand::help_messages() {
                                println!("{message}");
                            }
                        }
                        Ok(InteractiveCommand::Quit) => break,
                        Err(message) => println!("{message}"),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("stdin error: {}", e);
                    break;
                }
            },
        }
    }

    handle.shutdown()?;
    let _ = controller_task.await;

    tracing::info!("ChartFeed stopped");
    Ok(())
}
