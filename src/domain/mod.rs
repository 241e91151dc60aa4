//! Core domain types and trade-generation logic.

pub mod action;
pub mod bar;
pub mod trade;
pub mod ledger;
pub mod entry;
pub mod exit;
pub mod fixed_exit;
pub mod stop;
pub mod trail;
pub mod signal_eval;
pub mod config;
pub mod config_validation;
pub mod gen_trades;
pub mod backtest;
pub mod error;
