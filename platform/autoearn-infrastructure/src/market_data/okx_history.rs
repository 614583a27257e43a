use autoearn_domain::repositories::market_stream::CandleHistory;
use autoearn_domain::value_objects::candle::Candle;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};

pub const OKX_REST_BASE: &str = "https://www.okx.com";
// Upper bound the index-candles endpoint accepts per request.
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<Vec<Value>>,
}

/// Public REST client for recent index candles, used to warm up the history
/// before a live session starts.
#[derive(Debug, Clone)]
pub struct OkxHistoryClient {
    client: reqwest::blocking::Client,
    base_url: String,
    bar: String,
}

impl OkxHistoryClient {
    pub fn new(base_url: impl Into<String>, bar: impl Into<String>) -> Result<Self, String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| format!("failed to build reqwest client: {e}"))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bar: bar.into(),
        })
    }
}

impl CandleHistory for OkxHistoryClient {
    fn recent_candles(&self, instrument: &str, limit: usize) -> Result<Vec<Candle>, String> {
        let start = Instant::now();
        let limit = limit.clamp(1, MAX_LIMIT);
        let url = format!(
            "{}/api/v5/market/index-candles?instId={}&bar={}&limit={}",
            self.base_url, instrument, self.bar, limit
        );
        let body = self
            .client
            .get(&url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| {
                metrics::counter!("autoearn.infra.okx.history.calls_total", "result" => "err")
                    .increment(1);
                format!("index-candles request failed: {e}")
            })?
            .text()
            .map_err(|e| format!("index-candles body read failed: {e}"))?;

        let candles = parse_history_response(&body)?;
        metrics::counter!("autoearn.infra.okx.history.calls_total", "result" => "ok").increment(1);
        metrics::histogram!("autoearn.infra.okx.history.request_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::debug!(instrument, bar = %self.bar, candles = candles.len(), "fetched candle history");
        Ok(candles)
    }
}

/// Parses an index-candles response. The exchange lists newest first; the
/// result is oldest first. The in-progress bar is kept with `finished = false`.
pub fn parse_history_response(body: &str) -> Result<Vec<Candle>, String> {
    let resp: HistoryResponse =
        serde_json::from_str(body).map_err(|e| format!("index-candles parse failed: {e}"))?;
    if resp.code != "0" {
        return Err(format!("index-candles error code={} msg={}", resp.code, resp.msg));
    }
    let mut candles = resp
        .data
        .iter()
        .map(|raw| Candle::from_raw(raw).map_err(|e| format!("bad history candle: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    candles.reverse();
    Ok(candles)
}
