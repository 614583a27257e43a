pub mod commands;
pub mod infra;
pub mod obs;
