use sha2::{Digest, Sha256};

pub fn engine_name() -> &'static str {
    "autoearn"
}

pub fn engine_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Short hex digest of the raw config source, logged with every session so
/// trade logs can be matched to the parameters that produced them.
pub fn config_fingerprint(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    let mut out = String::with_capacity(12);
    for byte in digest.iter().take(6) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
