use crate::errors::CandleError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleColor {
    Green,
    Red,
    Doji,
}

impl fmt::Display for CandleColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandleColor::Green => write!(f, "green"),
            CandleColor::Red => write!(f, "red"),
            CandleColor::Doji => write!(f, "doji"),
        }
    }
}

/// One OHLC bar. `finished` marks a closed bar; unfinished candles are partial
/// updates of the bar that is still accumulating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub finished: bool,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, finished: bool) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            finished,
        }
    }

    /// Builds a candle from the exchange 6-tuple
    /// `[timestamp, open, high, low, close, finished]`.
    ///
    /// Numeric fields may arrive as JSON numbers or as strings. The finished flag
    /// is true only for the literal string `"1"` or boolean `true`.
    pub fn from_raw(raw: &[Value]) -> Result<Self, CandleError> {
        let [timestamp, open, high, low, close, finished] = raw else {
            return Err(CandleError::Malformed(format!(
                "expected 6 fields, got {}",
                raw.len()
            )));
        };

        let candle = Self {
            timestamp: parse_timestamp(timestamp)?,
            open: parse_price("open", open)?,
            high: parse_price("high", high)?,
            low: parse_price("low", low)?,
            close: parse_price("close", close)?,
            finished: parse_finished(finished),
        };
        Ok(candle)
    }

    pub fn color(&self) -> CandleColor {
        if self.close > self.open {
            CandleColor::Green
        } else if self.close < self.open {
            CandleColor::Red
        } else {
            CandleColor::Doji
        }
    }

    pub fn percent_change(&self) -> Result<f64, CandleError> {
        if self.open == 0.0 {
            return Err(CandleError::DivisionByZero);
        }
        Ok((self.close - self.open) / self.open * 100.0)
    }

    /// Checks the invariants the engine relies on before folding a candle into history.
    pub fn validate(&self) -> Result<(), CandleError> {
        for (field, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            if !value.is_finite() {
                return Err(CandleError::InvalidNumber {
                    field,
                    value: value.to_string(),
                });
            }
        }
        if self.open <= 0.0 {
            return Err(CandleError::NonPositiveOpen(self.open));
        }
        Ok(())
    }
}

impl fmt::Display for Candle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ts={} open={} high={} low={} close={} finished={} color={}",
            self.timestamp,
            self.open,
            self.high,
            self.low,
            self.close,
            self.finished,
            self.color()
        )?;
        if let Ok(change) = self.percent_change() {
            write!(f, " change={change:.4}%")?;
        }
        Ok(())
    }
}

fn parse_timestamp(value: &Value) -> Result<i64, CandleError> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| CandleError::InvalidNumber {
        field: "timestamp",
        value: value.to_string(),
    })
}

fn parse_price(field: &'static str, value: &Value) -> Result<f64, CandleError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(CandleError::InvalidNumber {
            field,
            value: value.to_string(),
        }),
    }
}

fn parse_finished(value: &Value) -> bool {
    match value {
        Value::String(s) => s == "1",
        Value::Bool(b) => *b,
        _ => false,
    }
}
