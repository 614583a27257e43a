use autoearn_application::config::LogFormat;
use std::net::SocketAddr;

pub const LOG_ENV: &str = "AUTOEARN_LOG";
pub const METRICS_ADDR_ENV: &str = "AUTOEARN_METRICS_ADDR";

/// Installs the global subscriber. `AUTOEARN_LOG` overrides `level` when set.
/// Logs go to stderr so stdout carries only the JSON summary.
pub fn init_tracing(level: &str, format: LogFormat) -> Result<(), String> {
    let filter = std::env::var(LOG_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| level.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&filter)
        .map_err(|err| format!("invalid log filter '{filter}': {err}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|err| format!("failed to install tracing subscriber: {err}"))
}

/// Resolves the exporter address from the flag, then `AUTOEARN_METRICS_ADDR`.
pub fn metrics_addr(flag: Option<&str>) -> Result<Option<SocketAddr>, String> {
    let raw = match flag {
        Some(raw) => raw.to_string(),
        None => match std::env::var(METRICS_ADDR_ENV) {
            Ok(raw) => raw,
            Err(_) => return Ok(None),
        },
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    raw.trim()
        .parse::<SocketAddr>()
        .map(Some)
        .map_err(|err| format!("invalid metrics address '{raw}' (expected host:port): {err}"))
}

#[cfg(feature = "prometheus")]
pub fn init_metrics(addr: Option<SocketAddr>) -> Result<Option<SocketAddr>, String> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let Some(addr) = addr else {
        return Ok(None);
    };
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|err| format!("failed to install prometheus exporter: {err}"))?;

    tracing::info!(metrics_addr = %addr, "prometheus metrics exporter enabled");
    Ok(Some(addr))
}

#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(addr: Option<SocketAddr>) -> Result<Option<SocketAddr>, String> {
    if let Some(addr) = addr {
        tracing::warn!(metrics_addr = %addr, "built without feature prometheus, metrics are not exported");
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_flag_is_parsed_and_blank_disables() {
        assert_eq!(
            metrics_addr(Some("127.0.0.1:9000")).unwrap(),
            Some("127.0.0.1:9000".parse().unwrap())
        );
        assert_eq!(metrics_addr(Some("  ")).unwrap(), None);
        assert!(metrics_addr(Some("localhost")).is_err());
    }
}
