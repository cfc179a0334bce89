//! Streaming price subscription over a combined WebSocket stream.
//!
//! One connection carries mini-ticker updates for every watched instrument.
//! Instrument-set changes are applied live with SUBSCRIBE / UNSUBSCRIBE
//! frames, so opening or closing a position never restarts the stream.

use std::collections::HashSet;

use chrono::{DateTime, TimeZone, Utc};
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use crate::domain::shared::Symbol;

use super::{FeedError, PriceTick};

/// Established streaming connection.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a streaming session ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Shutdown was requested.
    Shutdown,
    /// The instrument-set publisher went away; the engine is stopping.
    SymbolSourceClosed,
}

/// Connect to the combined stream for the given instrument set.
///
/// The initial subscriptions ride the connection URL; later changes are sent
/// as frames by [`run_session`].
///
/// # Errors
///
/// Returns [`FeedError::ConnectFailed`] when the connection cannot be
/// established.
pub async fn connect(ws_url: &str, symbols: &[Symbol]) -> Result<WsStream, FeedError> {
    let streams: Vec<String> = symbols.iter().map(stream_topic).collect();
    let url = format!("{ws_url}/stream?streams={}", streams.join("/"));

    tracing::info!(count = symbols.len(), "connecting to combined price stream");

    let (ws, _) = connect_async(&url)
        .await
        .map_err(|e| FeedError::ConnectFailed {
            message: e.to_string(),
        })?;

    Ok(ws)
}

/// Drive an established session until it fails or shutdown is requested.
///
/// Forwards decoded ticks into the tick channel and reconciles the server's
/// subscription set whenever the watched instrument set changes.
///
/// # Errors
///
/// Returns a [`FeedError`] when the connection drops or a frame cannot be
/// sent; the controller decides whether to reconnect or degrade.
pub async fn run_session(
    ws: WsStream,
    symbols_rx: &mut watch::Receiver<Vec<Symbol>>,
    ticks_tx: &mpsc::Sender<PriceTick>,
    shutdown: &CancellationToken,
) -> Result<SessionEnd, FeedError> {
    let (mut write, mut read) = ws.split();
    let mut subscribed: HashSet<Symbol> = symbols_rx.borrow_and_update().iter().cloned().collect();
    let mut request_id: u64 = 0;

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(tick) = decode_tick(text.as_str()) {
                            if ticks_tx.send(tick).await.is_err() {
                                return Err(FeedError::ChannelClosed);
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write
                            .send(Message::Pong(data))
                            .await
                            .map_err(|e| FeedError::SendFailed {
                                message: e.to_string(),
                            })?;
                    }
                    Some(Ok(Message::Close(_))) => {
                        return Err(FeedError::Closed {
                            reason: "server sent close frame".to_string(),
                        });
                    }
                    Some(Err(e)) => {
                        return Err(FeedError::Closed {
                            reason: e.to_string(),
                        });
                    }
                    None => {
                        return Err(FeedError::Closed {
                            reason: "stream ended".to_string(),
                        });
                    }
                    _ => {}
                }
            }
            changed = symbols_rx.changed() => {
                if changed.is_err() {
                    return Ok(SessionEnd::SymbolSourceClosed);
                }

                let target: HashSet<Symbol> =
                    symbols_rx.borrow_and_update().iter().cloned().collect();

                let added: Vec<Symbol> = target.difference(&subscribed).cloned().collect();
                let dropped: Vec<Symbol> = subscribed.difference(&target).cloned().collect();

                if !added.is_empty() {
                    request_id += 1;
                    send_subscription(&mut write, "SUBSCRIBE", &added, request_id).await?;
                }
                if !dropped.is_empty() {
                    request_id += 1;
                    send_subscription(&mut write, "UNSUBSCRIBE", &dropped, request_id).await?;
                }

                if !added.is_empty() || !dropped.is_empty() {
                    tracing::info!(
                        added = added.len(),
                        dropped = dropped.len(),
                        watched = target.len(),
                        "stream subscriptions adjusted"
                    );
                    subscribed = target;
                }
            }
            () = shutdown.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(SessionEnd::Shutdown);
            }
        }
    }
}

async fn send_subscription<S>(
    write: &mut S,
    method: &str,
    symbols: &[Symbol],
    request_id: u64,
) -> Result<(), FeedError>
where
    S: SinkExt<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let params: Vec<String> = symbols.iter().map(stream_topic).collect();
    let frame = serde_json::json!({
        "method": method,
        "params": params,
        "id": request_id,
    });

    write
        .send(Message::Text(frame.to_string().into()))
        .await
        .map_err(|e| FeedError::SendFailed {
            message: e.to_string(),
        })
}

fn stream_topic(symbol: &Symbol) -> String {
    format!("{}@miniTicker", symbol.stream_name())
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Combined-stream envelope: `{"stream": "...", "data": {...}}`.
#[derive(Debug, Deserialize)]
struct CombinedMessage {
    #[allow(dead_code)]
    stream: String,
    data: MiniTicker,
}

/// Mini-ticker payload; `c` is the latest close price.
#[derive(Debug, Deserialize)]
struct MiniTicker {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "E", default)]
    event_time_ms: Option<i64>,
}

/// Decode a text frame into a tick.
///
/// Non-ticker frames (subscription acks, unknown payloads) and unparsable
/// prices yield `None` and are skipped.
fn decode_tick(text: &str) -> Option<PriceTick> {
    let message: CombinedMessage = serde_json::from_str(text).ok()?;
    let price: Decimal = message.data.close.parse().ok()?;
    if price <= Decimal::ZERO {
        return None;
    }

    let at: DateTime<Utc> = message
        .data
        .event_time_ms
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now);

    Some(PriceTick {
        symbol: Symbol::new(message.data.symbol),
        price,
        at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn decodes_combined_mini_ticker() {
        let text = r#"{"stream":"btcusdt@miniTicker","data":{"e":"24hrMiniTicker","E":1700000000000,"s":"BTCUSDT","c":"42000.50","o":"41000","h":"43000","l":"40000","v":"1000","q":"42000000"}}"#;

        let tick = decode_tick(text).unwrap();
        assert_eq!(tick.symbol, Symbol::new("BTCUSDT"));
        assert_eq!(tick.price, dec!(42000.50));
        assert_eq!(tick.at.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn skips_subscription_acks() {
        assert!(decode_tick(r#"{"result":null,"id":1}"#).is_none());
    }

    #[test]
    fn skips_zero_and_garbage_prices() {
        let zero = r#"{"stream":"x@miniTicker","data":{"s":"X","c":"0"}}"#;
        assert!(decode_tick(zero).is_none());

        let garbage = r#"{"stream":"x@miniTicker","data":{"s":"X","c":"not-a-price"}}"#;
        assert!(decode_tick(garbage).is_none());
    }

    #[test]
    fn missing_event_time_falls_back_to_now() {
        let text = r#"{"stream":"ethusdt@miniTicker","data":{"s":"ETHUSDT","c":"2500"}}"#;
        let tick = decode_tick(text).unwrap();
        assert_eq!(tick.price, dec!(2500));
    }

    #[test]
    fn stream_topic_is_lowercase() {
        assert_eq!(stream_topic(&Symbol::new("BTCUSDT")), "btcusdt@miniTicker");
    }
}
