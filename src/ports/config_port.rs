//! Configuration access port trait.

use std::str::FromStr;

use crate::domain::error::QuantError;

/// Sectioned key/value configuration.
///
/// Only `get_string` is required. The typed getters fall back to `default`
/// when a key is absent or blank and fail with `ConfigInvalid` when a value
/// is present but unparseable.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, QuantError> {
        parse_or(self.get_string(section, key), section, key, default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> Result<f64, QuantError> {
        parse_or(self.get_string(section, key), section, key, default)
    }

    fn get_optional_double(&self, section: &str, key: &str) -> Result<Option<f64>, QuantError> {
        match self.get_string(section, key) {
            Some(v) if !v.trim().is_empty() => parse_value(&v, section, key).map(Some),
            _ => Ok(None),
        }
    }
}

fn parse_or<T: FromStr>(
    value: Option<String>,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, QuantError> {
    match value {
        Some(v) if !v.trim().is_empty() => parse_value(&v, section, key),
        _ => Ok(default),
    }
}

fn parse_value<T: FromStr>(value: &str, section: &str, key: &str) -> Result<T, QuantError> {
    value.trim().parse().map_err(|_| QuantError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: format!("cannot parse '{}'", value.trim()),
    })
}
