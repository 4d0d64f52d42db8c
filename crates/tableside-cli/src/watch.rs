//! `tableside watch`: the live board loop.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tableside_api::{ApiClient, ApiError};
use tableside_core::RestaurantId;
use tableside_core::events::OutboundMessage;
use tableside_realtime::{BearerSource, Channel, ChannelConfig, ChannelNotice, OrderBoard, connector_for};
use tableside_settings::TablesideSettings;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// How often pending alerts are flushed to stdout.
const ALERT_FLUSH: Duration = Duration::from_millis(250);

/// Run until Ctrl-C (success) or retry exhaustion (failure).
pub async fn run(settings: &TablesideSettings, api: Option<ApiClient>) -> Result<ExitCode> {
    // read per connect so a refreshed token is used on reconnect
    let bearer = api.as_ref().map(|api| {
        let tokens = api.shared_tokens();
        Arc::new(move || tokens.access_token()) as BearerSource
    });
    let connector = connector_for(&settings.realtime, bearer);
    let channel = Channel::new(ChannelConfig::from_settings(&settings.realtime), connector);
    let board = OrderBoard::new();
    let _subscriptions = board.attach(channel.dispatcher());
    let mut notices = channel.notices();

    let mut reconciler = Reconciler::new(api, board.clone());
    reconciler.start();

    info!(
        endpoint = %settings.realtime.endpoint,
        transport = %settings.realtime.transport,
        "watching order events"
    );
    let _ = channel.connect();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut flush = tokio::time::interval(ALERT_FLUSH);

    let code = loop {
        tokio::select! {
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for ctrl-c");
                }
                info!("shutting down");
                reconciler.stop();
                channel.disconnect();
                break ExitCode::SUCCESS;
            }
            notice = notices.recv() => match notice {
                Ok(ChannelNotice::Connected { connection_id, resumed }) => {
                    info!(%connection_id, resumed, "connected");
                    subscribe(&channel, settings);
                    if resumed {
                        reconciler.start();
                    }
                }
                Ok(ChannelNotice::Exhausted { attempts }) => {
                    error!(attempts, "gave up reconnecting");
                    break ExitCode::FAILURE;
                }
                Ok(ChannelNotice::Disconnected { reason }) => warn!(%reason, "connection lost"),
                Ok(ChannelNotice::Retrying { attempt, delay }) => {
                    info!(attempt, delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "reconnecting");
                }
                Ok(ChannelNotice::Closed) => break ExitCode::SUCCESS,
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed channel notices"),
                Err(RecvError::Closed) => break ExitCode::FAILURE,
            },
            _ = flush.tick() => print_alerts(&board),
        }
    };

    reconciler.stop();
    print_alerts(&board);
    Ok(code)
}

/// Runs dashboard reconciliation off the notice loop. At most one fetch
/// is in flight; a newer start supersedes it.
struct Reconciler {
    api: Option<ApiClient>,
    board: OrderBoard,
    task: Option<JoinHandle<()>>,
}

impl Reconciler {
    fn new(api: Option<ApiClient>, board: OrderBoard) -> Self {
        Self { api, board, task: None }
    }

    /// Start a fetch, aborting one still running. No-op when signed out.
    fn start(&mut self) {
        let Some(api) = self.api.clone() else {
            return;
        };
        self.stop();
        let board = self.board.clone();
        self.task = Some(tokio::spawn(async move { reconcile(&api, &board).await }));
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Ask a WebSocket backend for the configured restaurant's events.
fn subscribe(channel: &Channel, settings: &TablesideSettings) {
    if !settings.realtime.transport.is_bidirectional() {
        return;
    }
    if let Some(restaurant_id) = &settings.realtime.restaurant_id {
        let sent = channel.send(&OutboundMessage::Subscribe {
            restaurant_id: RestaurantId::from(restaurant_id.as_str()),
        });
        if !sent {
            warn!(%restaurant_id, "subscribe not sent");
        }
    }
}

/// Overwrite the board with the authoritative dashboard snapshot.
async fn reconcile(api: &ApiClient, board: &OrderBoard) {
    match api.dashboard().await {
        Ok(snapshot) => {
            info!(orders = snapshot.recent_orders.len(), "board reconciled");
            board.apply_dashboard(&snapshot);
        }
        Err(ApiError::SessionExpired) => error!("session expired, board will not be reconciled"),
        Err(e) => warn!(error = %e, category = %e.category(), "dashboard fetch failed"),
    }
}

fn print_alerts(board: &OrderBoard) {
    for alert in board.drain_alerts() {
        match serde_json::to_string(&alert) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "unprintable alert"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tableside_core::OrderId;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn slow_dashboard(delay: Duration) -> (MockServer, ApiClient) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/analytics/dashboard"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": {"recentOrders": [{"id": "o1", "status": "ready"}]}}))
                    .set_delay(delay),
            )
            .mount(&server)
            .await;
        let api = ApiClient::new(&format!("{}/api", server.uri()), Duration::from_secs(5))
            .unwrap()
            .with_tokens("a1", None);
        (server, api)
    }

    #[tokio::test]
    async fn start_returns_before_fetch_completes() {
        let (_server, api) = slow_dashboard(Duration::from_millis(200)).await;
        let board = OrderBoard::new();
        let mut reconciler = Reconciler::new(Some(api), board.clone());

        let started = tokio::time::timeout(Duration::from_millis(50), async { reconciler.start() }).await;
        assert!(started.is_ok());
        assert!(board.order(&OrderId::from("o1")).is_none());

        let task = reconciler.task.take().unwrap();
        task.await.unwrap();
        assert!(board.order(&OrderId::from("o1")).is_some());
    }

    #[tokio::test]
    async fn restart_aborts_fetch_in_flight() {
        let (_server, api) = slow_dashboard(Duration::from_secs(5)).await;
        let mut reconciler = Reconciler::new(Some(api), OrderBoard::new());

        reconciler.start();
        let first = reconciler.task.as_ref().unwrap().abort_handle();
        reconciler.start();
        let second = reconciler.task.as_ref().unwrap().abort_handle();
        assert_ne!(first.id(), second.id());

        reconciler.stop();
        assert!(reconciler.task.is_none());
        let aborted = tokio::time::timeout(Duration::from_secs(1), async {
            while !(first.is_finished() && second.is_finished()) {
                tokio::task::yield_now().await;
            }
        })
        .await;
        assert!(aborted.is_ok());
    }

    #[tokio::test]
    async fn signed_out_never_fetches() {
        let mut reconciler = Reconciler::new(None, OrderBoard::new());
        reconciler.start();
        assert!(reconciler.task.is_none());
    }
}
