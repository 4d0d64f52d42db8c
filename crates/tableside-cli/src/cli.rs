//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tableside_core::events::OrderStatus;
use tableside_settings::{TablesideSettings, TransportKind};

#[derive(Debug, Parser)]
#[command(name = "tableside", version, about = "Live order board client for restaurant staff")]
pub struct Cli {
    /// Settings file (default: ~/.tableside/settings.json).
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Log level when `RUST_LOG` is unset.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Follow live order events and print alerts until Ctrl-C.
    Watch(WatchArgs),
    /// Print the dashboard snapshot as JSON.
    Dashboard,
    /// Change an order's status.
    SetStatus {
        /// Order to update.
        order_id: String,
        /// New status, e.g. `preparing` or `READY`.
        #[arg(value_parser = parse_status)]
        status: OrderStatus,
    },
}

#[derive(Debug, Default, Args)]
pub struct WatchArgs {
    /// Event endpoint URL.
    #[arg(long)]
    pub endpoint: Option<String>,

    /// `sse` or `websocket`.
    #[arg(long, value_parser = parse_transport)]
    pub transport: Option<TransportKind>,

    /// Restaurant whose events to follow.
    #[arg(long)]
    pub restaurant_id: Option<String>,
}

impl WatchArgs {
    /// Apply flags over loaded settings.
    pub fn apply(&self, settings: &mut TablesideSettings) {
        if let Some(endpoint) = &self.endpoint {
            settings.realtime.endpoint.clone_from(endpoint);
        }
        if let Some(transport) = self.transport {
            settings.realtime.transport = transport;
        }
        if let Some(restaurant_id) = &self.restaurant_id {
            settings.realtime.restaurant_id = Some(restaurant_id.clone());
        }
    }
}

fn parse_transport(value: &str) -> Result<TransportKind, String> {
    TransportKind::parse(value).ok_or_else(|| format!("unknown transport `{value}` (expected sse or websocket)"))
}

fn parse_status(value: &str) -> Result<OrderStatus, String> {
    serde_json::from_value(serde_json::Value::String(value.to_owned()))
        .map_err(|_| format!("unknown order status `{value}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("tableside").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn watch_flags_override_settings() {
        let cli = parse(&[
            "watch",
            "--endpoint",
            "wss://kds.example/ws",
            "--transport",
            "ws",
            "--restaurant-id",
            "r9",
        ]);
        let Command::Watch(args) = cli.command else {
            panic!("expected watch");
        };
        let mut settings = TablesideSettings::default();
        args.apply(&mut settings);
        assert_eq!(settings.realtime.endpoint, "wss://kds.example/ws");
        assert_eq!(settings.realtime.transport, TransportKind::WebSocket);
        assert_eq!(settings.realtime.restaurant_id.as_deref(), Some("r9"));
    }

    #[test]
    fn watch_without_flags_keeps_settings() {
        let cli = parse(&["watch"]);
        let Command::Watch(args) = cli.command else {
            panic!("expected watch");
        };
        let mut settings = TablesideSettings::default();
        args.apply(&mut settings);
        assert_eq!(settings, TablesideSettings::default());
    }

    #[test]
    fn set_status_accepts_kitchen_spelling() {
        let cli = parse(&["set-status", "o1", "IN_PROGRESS"]);
        assert!(matches!(
            cli.command,
            Command::SetStatus {
                status: OrderStatus::Preparing,
                ..
            }
        ));
        assert!(matches!(cli.command, Command::SetStatus { ref order_id, .. } if order_id == "o1"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Cli::try_parse_from(["tableside", "set-status", "o1", "eaten"]).is_err());
        assert!(Cli::try_parse_from(["tableside", "watch", "--transport", "carrier-pigeon"]).is_err());
        assert!(Cli::try_parse_from(["tableside"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = parse(&["dashboard", "--log-level", "debug", "--settings", "/tmp/s.json"]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.settings, Some(PathBuf::from("/tmp/s.json")));
        assert!(matches!(cli.command, Command::Dashboard));
    }

    #[test]
    fn command_tree_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
