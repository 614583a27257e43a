pub mod trading_account;
