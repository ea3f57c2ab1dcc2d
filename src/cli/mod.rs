//! Command Line Interface module
//!
//! Implements the CLI commands and argument parsing for ChartFeed.

use clap::{Parser, Subcommand};

use crate::feed::trade::TradeSide;

#[derive(Parser, Debug, Clone)]
#[command(name = "chartfeed")]
#[command(about = "ChartFeed live chart synchronization client")]
#[command(
    long_about = "Synchronizes a live candlestick series from a data server and lets you place simulated trades against it"
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Symbol to watch at startup (overrides the configured one)
    #[arg(long)]
    pub symbol: Option<String>,

    /// Configuration file path
    #[arg(long, default_value = "config.toml")]
    pub config_file: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Watch a symbol interactively
    #[command(hide = true)]
    Watch,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Watch
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show default configuration
    Reset,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the actual command, using default if none provided
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or_default()
    }

    /// Adjust log level based on verbose flag
    pub fn effective_log_level(&self) -> String {
        if self.verbose {
            "debug".to_string()
        } else {
            self.log_level.clone()
        }
    }
}

/// Command entered on the interactive prompt
#[derive(Debug, Clone, PartialEq)]
pub enum InteractiveCommand {
    /// Switch the active symbol
    Symbol(String),
    /// Place a simulated trade
    Trade { side: TradeSide, quantity: f64 },
    /// Print current status and counters
    Status,
    /// Print available commands
    Help,
    /// Exit the session
    Quit,
}

impl InteractiveCommand {
    /// Parse one input line into a command.
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut parts = line.split_whitespace();
        let Some(head) = parts.next() else {
            return Err("empty command".to_string());
        };

        match head.to_lowercase().as_str() {
            "symbol" | "s" => match parts.next() {
                Some(symbol) => Ok(InteractiveCommand::Symbol(
                    crate::config::Config::normalize_symbol(symbol),
                )),
                None => Err("usage: symbol <SYMBOL>".to_string()),
            },
            "buy" | "b" => parse_trade(TradeSide::Buy, parts.next()),
            "sell" => parse_trade(TradeSide::Sell, parts.next()),
            "status" | "st" => Ok(InteractiveCommand::Status),
            "help" | "h" | "?" => Ok(InteractiveCommand::Help),
            "quit" | "q" | "exit" => Ok(InteractiveCommand::Quit),
            other => Err(format!("unknown command: {other}")),
        }
    }

    /// Help lines shown by the `help` command.
    pub fn help_messages() -> &'static [&'static str] {
        &[
            "symbol <SYMBOL>  switch the active symbol",
            "buy <QTY>        place a simulated buy at the last close",
            "sell <QTY>       place a simulated sell at the last close",
            "status           print sync status and counters",
            "quit             exit",
        ]
    }
}

fn parse_trade(side: TradeSide, quantity: Option<&str>) -> Result<InteractiveCommand, String> {
    let Some(raw) = quantity else {
        return Err(format!("usage: {side} <QUANTITY>"));
    };
    match raw.parse::<f64>() {
        Ok(quantity) if quantity.is_finite() && quantity > 0.0 => {
            Ok(InteractiveCommand::Trade { side, quantity })
        }
        _ => Err(format!("invalid quantity: {raw}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_symbol_switch() {
        assert_eq!(
            InteractiveCommand::parse("symbol eth-usdt"),
            Ok(InteractiveCommand::Symbol("ETHUSDT".to_string()))
        );
    }

    #[test]
    fn parses_trades() {
        assert_eq!(
            InteractiveCommand::parse("buy 0.5"),
            Ok(InteractiveCommand::Trade {
                side: TradeSide::Buy,
                quantity: 0.5
            })
        );
        assert_eq!(
            InteractiveCommand::parse("sell 2"),
            Ok(InteractiveCommand::Trade {
                side: TradeSide::Sell,
                quantity: 2.0
            })
        );
    }

    #[test]
    fn rejects_bad_quantity() {
        assert!(InteractiveCommand::parse("buy").is_err());
        assert!(InteractiveCommand::parse("buy zero").is_err());
        assert!(InteractiveCommand::parse("buy -1").is_err());
    }

    #[test]
    fn rejects_unknown_command() {
        assert!(InteractiveCommand::parse("dance").is_err());
        assert!(InteractiveCommand::parse("").is_err());
    }
}
