//! Configuration validation.
//!
//! Validates every recognised key before a run so errors point at the
//! offending section and key rather than surfacing mid-backtest.

use std::fmt::Display;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::domain::entry::EntryMethod;
use crate::domain::error::TradeGenError;
use crate::domain::exit::ExitMethod;
use crate::domain::signal_eval::SigEvalMethod;
use crate::domain::stop::StopMethod;
use crate::domain::trail::TrailMethod;
use crate::ports::config_port::ConfigPort;

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), TradeGenError> {
    match config.get_string("data", "data_dir") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(TradeGenError::ConfigMissing {
            section: "data".to_string(),
            key: "data_dir".to_string(),
        }),
    }
}

pub fn validate_trading_config(config: &dyn ConfigPort) -> Result<(), TradeGenError> {
    parse_value::<EntryMethod>(config, "trading", "entry_struct")?;
    parse_value::<ExitMethod>(config, "trading", "exit_struct")?;
    validate_num_lots(config)?;
    parse_bool(config, "trading", "monitor_close")?;
    Ok(())
}

pub fn validate_risk_config(config: &dyn ConfigPort) -> Result<(), TradeGenError> {
    parse_value::<SigEvalMethod>(config, "risk", "sig_eval_method")?;
    parse_value::<StopMethod>(config, "risk", "stop_method")?;
    parse_value::<TrailMethod>(config, "risk", "trail_method")?;
    validate_fraction(config, "trigger_percent", true)?;
    validate_fraction(config, "percent_loss", false)?;
    validate_fraction(config, "trigger_trail", false)?;
    validate_step(config)?;
    validate_time_period(config)?;
    Ok(())
}

/// Parse an optional key, reporting unparsable values as `ConfigInvalid`.
pub fn parse_value<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, TradeGenError>
where
    T: FromStr,
    T::Err: Display,
{
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| TradeGenError::ConfigInvalid {
                section: section.to_string(),
                key: key.to_string(),
                reason: e.to_string(),
            }),
    }
}

/// Parse an optional boolean (`true/false`, `yes/no`, `1/0`).
pub fn parse_bool(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<bool>, TradeGenError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    match raw.trim().to_lowercase().as_str() {
        "" => Ok(None),
        "true" | "yes" | "1" => Ok(Some(true)),
        "false" | "no" | "0" => Ok(Some(false)),
        other => Err(TradeGenError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}

fn validate_num_lots(config: &dyn ConfigPort) -> Result<(), TradeGenError> {
    if let Some(lots) = parse_value::<u32>(config, "trading", "num_lots")? {
        if lots == 0 {
            return Err(TradeGenError::ConfigInvalid {
                section: "trading".to_string(),
                key: "num_lots".to_string(),
                reason: "num_lots must be at least 1".to_string(),
            });
        }
    }
    Ok(())
}

/// `trigger_percent` may be zero; the other fractions must be strictly positive.
fn validate_fraction(
    config: &dyn ConfigPort,
    key: &str,
    allow_zero: bool,
) -> Result<(), TradeGenError> {
    let Some(value) = parse_value::<Decimal>(config, "risk", key)? else {
        return Ok(());
    };
    let above_floor = if allow_zero {
        value >= Decimal::ZERO
    } else {
        value > Decimal::ZERO
    };
    if !above_floor || value >= Decimal::ONE {
        return Err(TradeGenError::ConfigInvalid {
            section: "risk".to_string(),
            key: key.to_string(),
            reason: format!("{key} must be between 0 and 1"),
        });
    }
    Ok(())
}

fn validate_step(config: &dyn ConfigPort) -> Result<(), TradeGenError> {
    if let Some(step) = parse_value::<Decimal>(config, "risk", "step")? {
        if step <= Decimal::ZERO {
            return Err(TradeGenError::ConfigInvalid {
                section: "risk".to_string(),
                key: "step".to_string(),
                reason: "step must be positive".to_string(),
            });
        }
    }
    Ok(())
}

fn validate_time_period(config: &dyn ConfigPort) -> Result<(), TradeGenError> {
    if let Some(days) = parse_value::<i64>(config, "risk", "time_period")? {
        if days < 1 {
            return Err(TradeGenError::ConfigInvalid {
                section: "risk".to_string(),
                key: "time_period".to_string(),
                reason: "time_period must be at least 1 day".to_string(),
            });
        }
    }
    Ok(())
}
