//! `tableside`: live order board client.
//!
//! - `watch`: follow the realtime channel and print alerts as JSON lines
//! - `dashboard`: print the REST dashboard snapshot
//! - `set-status`: change an order's status

#![deny(unsafe_code)]

mod cli;
mod watch;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tableside_api::ApiClient;
use tableside_core::OrderId;
use tableside_settings::{TablesideSettings, load_settings, load_settings_from_path};

use crate::cli::{Cli, Command};

const ACCESS_TOKEN_ENV: &str = "TABLESIDE_ACCESS_TOKEN";
const REFRESH_TOKEN_ENV: &str = "TABLESIDE_REFRESH_TOKEN";

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut settings = match &cli.settings {
        Some(path) => load_settings_from_path(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => load_settings().context("failed to load settings")?,
    };

    let level = cli.log_level.as_deref().unwrap_or(&settings.logging.level);
    tableside_core::logging::init_subscriber(level);

    match cli.command {
        Command::Watch(args) => {
            args.apply(&mut settings);
            tableside_settings::loader::validate(&settings).context("invalid watch options")?;
            let api = api_client(&settings)?;
            let api = api.tokens().is_signed_in().then_some(api);
            watch::run(&settings, api).await
        }
        Command::Dashboard => {
            let snapshot = api_client(&settings)?
                .dashboard()
                .await
                .context("failed to fetch dashboard")?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::SetStatus { order_id, status } => {
            let order_id = OrderId::from(order_id.as_str());
            api_client(&settings)?
                .update_order_status(&order_id, status)
                .await
                .with_context(|| format!("failed to update order {order_id}"))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// REST client seeded with tokens from the environment.
fn api_client(settings: &TablesideSettings) -> Result<ApiClient> {
    let client = ApiClient::from_settings(&settings.api).context("invalid api settings")?;
    let access = std::env::var(ACCESS_TOKEN_ENV).ok().filter(|t| !t.is_empty());
    let refresh = std::env::var(REFRESH_TOKEN_ENV).ok().filter(|t| !t.is_empty());
    Ok(match access {
        Some(access) => client.with_tokens(access, refresh),
        None => client,
    })
}
