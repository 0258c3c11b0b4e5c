//! Push subscription over the `graphql-ws` WebSocket sub-protocol.
//!
//! Frame flow: `connection_init` -> `connection_ack` -> `start` -> (`data` | `ka`)* and on
//! shutdown `stop` -> `connection_terminate`. Dropped connections are re-opened after
//! [`FeedConfig::reconnect_delay`] until the [`SubscriptionHandle`] is closed or dropped.

use crate::{
    config::FeedConfig,
    error::FeedError,
    graphql::{GraphQlRequest, GraphQlResponse, SPREAD_SUBSCRIPTION, SpreadSubscriptionData},
    timeout::TimeoutStream,
};
use futures::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use spread_engine::{ChannelStatus, PushEvent, SubscriptionParams};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        self, Message,
        client::IntoClientRequest,
        handshake::client::Request,
        http::{HeaderValue, header::SEC_WEBSOCKET_PROTOCOL},
    },
};
use tracing::{debug, error, info, trace, warn};
use url::Url;

/// WebSocket sub-protocol spoken by the spread server.
pub const GRAPHQL_WS_PROTOCOL: &str = "graphql-ws";

/// A single subscription is multiplexed per connection.
const OPERATION_ID: &str = "1";

/// Update delivered by a push subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum PushUpdate {
    Event(PushEvent),
    Status(ChannelStatus),
}

/// Opens push subscriptions.
pub trait PushChannel: Send + Sync {
    /// Open a subscription for `params`, delivering updates until the returned handle is
    /// closed or dropped.
    fn open(&self, params: SubscriptionParams, updates: mpsc::Sender<PushUpdate>)
    -> SubscriptionHandle;
}

/// Owner of a running push subscription. Dropping it shuts the subscription down.
#[derive(Debug)]
pub struct SubscriptionHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub fn new(shutdown: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
        Self { shutdown, task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the subscription, sending `stop` to the server if connected.
    pub fn close(self) {
        let _ = self.shutdown.send(());
    }
}

/// [`PushChannel`] over a `graphql-ws` WebSocket.
#[derive(Debug, Clone)]
pub struct WsPushChannel {
    config: FeedConfig,
}

impl WsPushChannel {
    pub fn new(config: FeedConfig) -> Self {
        Self { config }
    }
}

impl PushChannel for WsPushChannel {
    fn open(
        &self,
        params: SubscriptionParams,
        updates: mpsc::Sender<PushUpdate>,
    ) -> SubscriptionHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_subscription_loop(
            self.config.clone(),
            params,
            updates,
            shutdown_rx,
        ));
        SubscriptionHandle::new(shutdown_tx, task)
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame<'a> {
    ConnectionInit {
        payload: serde_json::Value,
    },
    Start {
        id: &'a str,
        payload: GraphQlRequest<'a, &'a SubscriptionParams>,
    },
    Stop {
        id: &'a str,
    },
    ConnectionTerminate,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    ConnectionAck,
    #[serde(rename = "ka")]
    KeepAlive,
    ConnectionError {
        #[serde(default)]
        payload: serde_json::Value,
    },
    Data {
        id: String,
        payload: GraphQlResponse<SpreadSubscriptionData>,
    },
    Error {
        id: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
    Complete {
        id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    ReceiverDropped,
}

/// Subscription loop with auto-reconnect
async fn run_subscription_loop(
    config: FeedConfig,
    params: SubscriptionParams,
    updates: mpsc::Sender<PushUpdate>,
    mut shutdown: oneshot::Receiver<()>,
) {
    info!(url = %config.ws_url, pairs = ?params.pair_ids, "starting push subscription");

    loop {
        if updates
            .send(PushUpdate::Status(ChannelStatus::Connecting))
            .await
            .is_err()
        {
            break;
        }

        let error = match run_session(&config, &params, &updates, &mut shutdown).await {
            Ok(SessionEnd::Shutdown) => {
                debug!("push subscription shut down");
                break;
            }
            Ok(SessionEnd::ReceiverDropped) => {
                warn!("push update receiver dropped, stopping subscription");
                break;
            }
            Err(error) => error,
        };

        error!(%error, url = %config.ws_url, "push subscription failed");
        let terminal = error.is_terminal();
        let status = PushUpdate::Status(ChannelStatus::Failed(error.into_channel_failure()));
        if updates.send(status).await.is_err() || terminal {
            break;
        }

        debug!(delay = ?config.reconnect_delay, "waiting before reconnecting push subscription");
        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(config.reconnect_delay) => {}
        }
    }
}

async fn run_session(
    config: &FeedConfig,
    params: &SubscriptionParams,
    updates: &mpsc::Sender<PushUpdate>,
    shutdown: &mut oneshot::Receiver<()>,
) -> Result<SessionEnd, FeedError> {
    let request = connect_request(&config.ws_url)?;
    let (ws_stream, _) = connect_async(request).await?;
    info!(url = %config.ws_url, "connected to push channel");

    let (mut write, read) = ws_stream.split();
    let mut read = TimeoutStream::new(read, config.idle_timeout);

    let mut ping = tokio::time::interval(config.ping_interval);
    ping.tick().await;

    send_frame(
        &mut write,
        &ClientFrame::ConnectionInit {
            payload: serde_json::json!({}),
        },
    )
    .await?;

    loop {
        let message = tokio::select! {
            _ = &mut *shutdown => {
                close_session(&mut write).await;
                return Ok(SessionEnd::Shutdown);
            }
            _ = ping.tick() => {
                write.send(Message::Ping(vec![].into())).await?;
                continue;
            }
            message = read.next() => message,
        };

        let Some(message) = message else {
            let reason = if read.timed_out() {
                format!("no frame received within {:?}", config.idle_timeout)
            } else {
                "push stream ended".to_string()
            };
            return Err(FeedError::Socket(reason));
        };

        let text = match message? {
            Message::Text(text) => text,
            Message::Close(frame) => {
                return Err(FeedError::Socket(format!(
                    "server closed push channel: {frame:?}"
                )));
            }
            // Heartbeat messages - tungstenite answers pings automatically
            _ => continue,
        };

        let frame = match serde_json::from_str::<ServerFrame>(text.as_str()) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(%error, "failed to parse push frame");
                debug!(raw = %text.as_str(), "unparsed push frame");
                continue;
            }
        };

        match frame {
            ServerFrame::ConnectionAck => {
                debug!("push connection acknowledged, starting subscription");
                send_frame(
                    &mut write,
                    &ClientFrame::Start {
                        id: OPERATION_ID,
                        payload: GraphQlRequest::new("Spread", SPREAD_SUBSCRIPTION, params),
                    },
                )
                .await?;

                if updates
                    .send(PushUpdate::Status(ChannelStatus::Connected))
                    .await
                    .is_err()
                {
                    return Ok(SessionEnd::ReceiverDropped);
                }
            }
            ServerFrame::KeepAlive => trace!("push keep-alive"),
            ServerFrame::Data { id, payload } if id == OPERATION_ID => match payload.into_data() {
                Ok(data) => {
                    if updates
                        .send(PushUpdate::Event(PushEvent::from(data)))
                        .await
                        .is_err()
                    {
                        return Ok(SessionEnd::ReceiverDropped);
                    }
                }
                Err(error) => warn!(%error, "skipping rejected push payload"),
            },
            ServerFrame::Data { id, .. } => debug!(%id, "ignoring push data for unknown operation"),
            ServerFrame::ConnectionError { payload } => {
                return Err(FeedError::Subscription(payload.to_string()));
            }
            ServerFrame::Error { id, payload } => {
                return Err(FeedError::Subscription(format!("operation {id}: {payload}")));
            }
            ServerFrame::Complete { id } => {
                return Err(FeedError::Subscription(format!(
                    "operation {id} completed by server"
                )));
            }
        }
    }
}

/// Build the upgrade request announcing the [`GRAPHQL_WS_PROTOCOL`] sub-protocol.
fn connect_request(ws_url: &str) -> Result<Request, FeedError> {
    let url = Url::parse(ws_url).map_err(|error| FeedError::InvalidUrl {
        url: ws_url.to_string(),
        reason: error.to_string(),
    })?;

    let mut request = url.as_str().into_client_request()?;
    request.headers_mut().insert(
        SEC_WEBSOCKET_PROTOCOL,
        HeaderValue::from_static(GRAPHQL_WS_PROTOCOL),
    );
    Ok(request)
}

async fn send_frame<S>(sink: &mut S, frame: &ClientFrame<'_>) -> Result<(), FeedError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(frame)?;
    sink.send(Message::Text(text.into())).await?;
    Ok(())
}

async fn close_session<S>(sink: &mut S)
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let frames = [
        ClientFrame::Stop { id: OPERATION_ID },
        ClientFrame::ConnectionTerminate,
    ];
    for frame in &frames {
        if let Err(error) = send_frame(sink, frame).await {
            debug!(%error, "failed to send push shutdown frame");
            return;
        }
    }
    if let Err(error) = sink.close().await {
        debug!(%error, "failed to close push channel");
    }
}
