use super::okx_codec::{candle_channel, decode_message, subscribe_message, OkxMessage};
use autoearn_domain::repositories::market_stream::{CandleStream, StreamError};
use autoearn_domain::value_objects::candle::Candle;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::net::TcpStream;
use std::path::Path;
use std::time::{Duration, Instant};
use tungstenite::protocol::Message;
use tungstenite::stream::MaybeTlsStream;
use url::Url;

// OKX drops idle connections after 30s without traffic.
const PING_INTERVAL: Duration = Duration::from_secs(20);

/// Public index-candle subscription for one instrument.
#[derive(Debug)]
pub struct OkxCandleStream {
    inst_id: String,
    channel: String,
    socket: tungstenite::WebSocket<MaybeTlsStream<TcpStream>>,
    last_ping: Instant,
    pending: VecDeque<Candle>,
    capture: Option<File>,
}

impl OkxCandleStream {
    pub fn connect(ws_url: &str, inst_id: &str, interval: &str) -> Result<Self, String> {
        let url = Url::parse(ws_url).map_err(|e| format!("invalid ws url {ws_url}: {e}"))?;
        let (mut socket, _resp) =
            tungstenite::connect(url.as_str()).map_err(|e| format!("ws connect failed: {e}"))?;

        let channel = candle_channel(interval);
        socket
            .send(Message::text(subscribe_message(&channel, inst_id)))
            .map_err(|e| format!("ws subscribe failed: {e}"))?;
        tracing::info!(url = %url, channel = %channel, inst_id = %inst_id, "subscribed to candle channel");

        Ok(Self {
            inst_id: inst_id.to_string(),
            channel,
            socket,
            last_ping: Instant::now(),
            pending: VecDeque::new(),
            capture: None,
        })
    }

    /// Appends every raw text frame to `path`, producing a file the replay stream can read back.
    pub fn with_capture(mut self, path: &Path) -> Result<Self, String> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| format!("failed to open capture file {}: {}", path.display(), e))?;
        self.capture = Some(file);
        Ok(self)
    }

    fn record(&mut self, text: &str) {
        let Some(file) = self.capture.as_mut() else {
            return;
        };
        if let Err(err) = writeln!(file, "{text}") {
            tracing::warn!(error = %err, "failed to write capture file, disabling capture");
            self.capture = None;
        }
    }
}

fn disconnected(stage: &'static str) -> impl Fn(tungstenite::Error) -> StreamError {
    move |err| StreamError::Disconnected(format!("{stage}: {err}"))
}

impl CandleStream for OkxCandleStream {
    fn next_candle(&mut self) -> Result<Option<Candle>, StreamError> {
        loop {
            if let Some(candle) = self.pending.pop_front() {
                return Ok(Some(candle));
            }

            if self.last_ping.elapsed() >= PING_INTERVAL {
                self.socket
                    .send(Message::text("ping"))
                    .map_err(disconnected("ping failed"))?;
                self.last_ping = Instant::now();
            }

            let msg = self
                .socket
                .read()
                .map_err(|e| StreamError::Disconnected(e.to_string()))?;

            match msg {
                Message::Text(text) => {
                    let text = text.as_str();
                    self.record(text);
                    match decode_message(text)? {
                        OkxMessage::Candles(candles) => self.pending.extend(candles),
                        OkxMessage::Event {
                            event,
                            code,
                            message,
                        } => {
                            if event == "error" {
                                return Err(StreamError::Protocol(format!(
                                    "{} {}: code={} msg={}",
                                    self.channel,
                                    self.inst_id,
                                    code.unwrap_or_default(),
                                    message.unwrap_or_default()
                                )));
                            }
                            tracing::debug!(event = %event, "ws event");
                        }
                        OkxMessage::Pong | OkxMessage::Other => {}
                    }
                }
                Message::Ping(payload) => {
                    self.socket
                        .send(Message::Pong(payload))
                        .map_err(disconnected("pong failed"))?;
                }
                Message::Close(_) => {
                    return Err(StreamError::Disconnected("server closed".to_string()));
                }
                Message::Pong(_) | Message::Binary(_) | Message::Frame(_) => {}
            }
        }
    }
}
