pub mod okx_codec;
pub mod replay;

#[cfg(feature = "realtime-okx")]
pub mod okx;
