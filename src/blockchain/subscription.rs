//! Supervised `NewBlock` websocket subscription.
//!
//! A notification for height H schedules H - [`FINALITY_DELAY`]. Pushed
//! blocks are kept until their height is scheduled and passed along as the
//! processing hint.

use crate::blockchain::client::ClientError;
use crate::blockchain::models::{NewBlockValue, RawBlock, RpcResponse};
use crate::blockchain::worker_pool::HeightJob;
use crate::models::Network;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const FINALITY_DELAY: u64 = 2;

const SUBSCRIBE_QUERY: &str = "tm.event='NewBlock'";
const NEW_BLOCK_EVENT: &str = "tendermint/event/NewBlock";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionState {
    Connecting,
    Connected,
    BackingOff,
    Stopped,
}

#[derive(Debug, Deserialize)]
struct SubscriptionResult {
    #[serde(default)]
    data: Option<EventData>,
}

#[derive(Debug, Deserialize)]
struct EventData {
    #[serde(rename = "type")]
    kind: String,
    value: serde_json::Value,
}

/// Parses one websocket frame. `Ok(None)` for frames that are not block
/// notifications, such as the subscribe acknowledgement.
pub fn parse_notification(text: &str) -> Result<Option<RawBlock>, ClientError> {
    let response: RpcResponse<SubscriptionResult> = serde_json::from_str(text)
        .map_err(|e| ClientError::Malformed(format!("websocket frame: {}", e)))?;

    if let Some(err) = response.error {
        return Err(ClientError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    let Some(data) = response.result.and_then(|r| r.data) else {
        return Ok(None);
    };
    if data.kind != NEW_BLOCK_EVENT {
        return Ok(None);
    }

    let value: NewBlockValue = serde_json::from_value(data.value)
        .map_err(|e| ClientError::Malformed(format!("NewBlock payload: {}", e)))?;
    RawBlock::from_notification(value).map(Some)
}

/// Blocks pushed ahead of being scheduled, keyed by height.
#[derive(Debug, Default)]
pub struct HintBuffer {
    pending: BTreeMap<u64, RawBlock>,
}

impl HintBuffer {
    /// Records a pushed block and returns the job it makes final, if any.
    pub fn push(&mut self, block: RawBlock) -> Option<HeightJob> {
        let height = block.height;
        self.pending.insert(height, block);

        let target = height.checked_sub(FINALITY_DELAY).filter(|h| *h > 0)?;
        let hint = self.pending.remove(&target);
        // Anything older was skipped by a reconnect; gap repair covers it
        self.pending = self.pending.split_off(&target);
        Some(HeightJob { height: target, hint })
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

pub struct LiveSubscription {
    network: Network,
    ws_url: String,
    reconnect_delay: Duration,
    state: watch::Sender<SubscriptionState>,
}

enum SessionEnd {
    Cancelled,
    Disconnected,
}

impl LiveSubscription {
    pub fn new(network: Network, ws_url: String, reconnect_delay: Duration) -> Self {
        let (state, _) = watch::channel(SubscriptionState::Stopped);
        Self {
            network,
            ws_url,
            reconnect_delay,
            state,
        }
    }

    pub fn state(&self) -> SubscriptionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SubscriptionState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: SubscriptionState) {
        self.state.send_replace(state);
        debug!("{} live subscription is {:?}", self.network, state);
    }

    /// Runs until cancelled, reconnecting after a fixed delay whenever the
    /// connection drops.
    pub async fn run(&self, jobs: mpsc::Sender<HeightJob>, shutdown: CancellationToken) {
        let mut buffer = HintBuffer::default();

        loop {
            self.set_state(SubscriptionState::Connecting);
            match self.session(&jobs, &mut buffer, &shutdown).await {
                Ok(SessionEnd::Cancelled) => break,
                Ok(SessionEnd::Disconnected) => {
                    warn!("{} websocket disconnected", self.network)
                }
                Err(e) => error!("{} websocket error: {}", self.network, e),
            }

            self.set_state(SubscriptionState::BackingOff);
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        self.set_state(SubscriptionState::Stopped);
        info!("{} live subscription stopped", self.network);
    }

    async fn session(
        &self,
        jobs: &mpsc::Sender<HeightJob>,
        buffer: &mut HintBuffer,
        shutdown: &CancellationToken,
    ) -> Result<SessionEnd, tokio_tungstenite::tungstenite::Error> {
        let connected = tokio::select! {
            result = connect_async(self.ws_url.as_str()) => result?,
            _ = shutdown.cancelled() => return Ok(SessionEnd::Cancelled),
        };
        let (ws_stream, _) = connected;
        let (mut write, mut read) = ws_stream.split();

        let subscribe = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "subscribe",
            "id": 1,
            "params": { "query": SUBSCRIBE_QUERY },
        });
        write.send(Message::Text(subscribe.to_string())).await?;

        self.set_state(SubscriptionState::Connected);
        info!("Subscribed to new blocks on {} via {}", self.network, self.ws_url);

        loop {
            let frame = tokio::select! {
                frame = read.next() => frame,
                _ = shutdown.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Cancelled);
                }
            };

            match frame {
                Some(Ok(Message::Text(text))) => match parse_notification(&text) {
                    Ok(Some(block)) => {
                        debug!("{} pushed block {}", self.network, block.height);
                        if let Some(job) = buffer.push(block) {
                            if jobs.send(job).await.is_err() {
                                warn!("{} worker queue closed", self.network);
                                return Ok(SessionEnd::Cancelled);
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Ignoring {} websocket frame: {}", self.network, e),
                },
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("{} websocket closed: {:?}", self.network, frame);
                    return Ok(SessionEnd::Disconnected);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => return Ok(SessionEnd::Disconnected),
            }
        }
    }
}
