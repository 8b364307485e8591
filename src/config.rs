use std::env;

use crate::{Error, Result};

/// Proto-max-bulk-len of a stock Redis server.
const DEFAULT_MAX_BULK_LENGTH: usize = 512 * 1024 * 1024;
const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;
const DEFAULT_BUFFER_CAPACITY: usize = 8 * 1024;
pub(crate) const DEFAULT_MAX_DEPTH: usize = 512;

/// Limits and buffer sizes of a [`Connection`](crate::connection::Connection).
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Largest bulk string a reply may declare. Checked before the payload is allocated.
    pub max_bulk_length: usize,
    /// Largest length, marker included, of a single line (simple string, error, integer or a
    /// length header).
    pub max_line_length: usize,
    /// Capacity of both the read and the write buffer wrapped around the stream.
    pub buffer_capacity: usize,
    /// Deepest nesting of arrays a reply may use.
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_bulk_length: DEFAULT_MAX_BULK_LENGTH,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Config {
    /// Defaults, overridden by `RESP_MAX_BULK_LENGTH`, `RESP_MAX_LINE_LENGTH`,
    /// `RESP_BUFFER_CAPACITY` and `RESP_MAX_DEPTH` when set.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            max_bulk_length: var_or("RESP_MAX_BULK_LENGTH", defaults.max_bulk_length)?,
            max_line_length: var_or("RESP_MAX_LINE_LENGTH", defaults.max_line_length)?,
            buffer_capacity: var_or("RESP_BUFFER_CAPACITY", defaults.buffer_capacity)?,
            max_depth: var_or("RESP_MAX_DEPTH", defaults.max_depth)?,
        })
    }
}

fn var_or(name: &str, default: usize) -> Result<usize> {
    match env::var(name) {
        Ok(value) => parse_size(name, &value),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(env::VarError::NotUnicode(_)) => {
            Err(Error::Config(format!("{} must be valid unicode", name)))
        }
    }
}

fn parse_size(name: &str, value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(size) if size > 0 => Ok(size),
        _ => Err(Error::Config(format!(
            "{} must be a positive number, got {:?}",
            name, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();

        assert_eq!(config.max_bulk_length, 512 * 1024 * 1024);
        assert_eq!(config.max_line_length, 64 * 1024);
        assert_eq!(config.buffer_capacity, 8 * 1024);
        assert_eq!(config.max_depth, 512);
    }

    #[test]
    fn parse_size_accepts_positive_numbers() {
        assert_eq!(parse_size("X", "1024").unwrap(), 1024);
        assert_eq!(parse_size("X", " 7 ").unwrap(), 7);
    }

    #[test]
    fn parse_size_rejects_garbage() {
        assert!(matches!(parse_size("X", "lots"), Err(Error::Config(_))));
        assert!(matches!(parse_size("X", "0"), Err(Error::Config(_))));
        assert!(matches!(parse_size("X", "-5"), Err(Error::Config(_))));
    }
}
