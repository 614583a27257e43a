pub mod okx_history;
