use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub(crate) fn parse_bool_env(key: &str, default: bool) -> Result<bool> {
    let Ok(raw) = env::var(key) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{key} must be a boolean, got '{raw}'"),
    }
}

pub(crate) fn parse_socket_addr(key: &str, default: &str) -> Result<SocketAddr> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .with_context(|| format!("{key} must be a valid socket address, got '{raw}'"))
}

pub(crate) fn parse_usize(key: &str, default: usize) -> Result<usize> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .with_context(|| format!("{key} must be a non-negative integer, got '{raw}'"))
}

pub(crate) fn parse_u64(key: &str, default: u64) -> Result<u64> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .with_context(|| format!("{key} must be a non-negative integer, got '{raw}'"))
}

pub(crate) fn parse_path(key: &str, default: &str) -> Result<PathBuf> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    if raw.trim().is_empty() {
        anyhow::bail!("{key} must not be empty");
    }
    Ok(PathBuf::from(raw))
}
