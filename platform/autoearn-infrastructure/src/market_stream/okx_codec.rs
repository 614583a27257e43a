use autoearn_domain::repositories::market_stream::StreamError;
use autoearn_domain::value_objects::candle::Candle;
use serde::Deserialize;
use serde_json::Value;

pub const OKX_PUBLIC_BUSINESS_WS: &str = "wss://wspap.okx.com:8443/ws/v5/business";

/// Decoded OKX v5 public websocket frame.
#[derive(Debug, Clone, PartialEq)]
pub enum OkxMessage {
    /// Candle push. Usually a single entry; may be empty.
    Candles(Vec<Candle>),
    /// Subscription acks and errors.
    Event {
        event: String,
        code: Option<String>,
        message: Option<String>,
    },
    Pong,
    /// Anything else, including pushes without `data`.
    Other,
}

impl OkxMessage {
    pub fn is_error_event(&self) -> bool {
        matches!(self, OkxMessage::Event { event, .. } if event == "error")
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: Option<String>,
    code: Option<String>,
    msg: Option<String>,
    data: Option<Vec<Vec<Value>>>,
}

pub fn candle_channel(interval: &str) -> String {
    format!("index-candle{interval}")
}

pub fn subscribe_message(channel: &str, inst_id: &str) -> String {
    serde_json::json!({
        "op": "subscribe",
        "args": [{ "channel": channel, "instId": inst_id }]
    })
    .to_string()
}

pub fn decode_message(text: &str) -> Result<OkxMessage, StreamError> {
    let text = text.trim();
    if text == "pong" {
        return Ok(OkxMessage::Pong);
    }
    let envelope: Envelope = serde_json::from_str(text)
        .map_err(|e| StreamError::InvalidData(format!("bad json: {e}")))?;

    if let Some(event) = envelope.event {
        return Ok(OkxMessage::Event {
            event,
            code: envelope.code,
            message: envelope.msg,
        });
    }
    let Some(data) = envelope.data else {
        return Ok(OkxMessage::Other);
    };
    let candles = data
        .iter()
        .map(|raw| Candle::from_raw(raw).map_err(|e| StreamError::InvalidData(e.to_string())))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(OkxMessage::Candles(candles))
}
