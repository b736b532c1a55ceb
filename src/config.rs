//! Process configuration loaded once at startup.

use crate::catalog::DEFAULT_FALLBACK_MODELS;
use crate::upstream::client::DEFAULT_BASE_URL;
use crate::{Error, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` when unset or blank; requests are then refused before any
    /// upstream call.
    pub api_key: Option<String>,
    pub base_url: String,
    pub bind_addr: SocketAddr,
    pub fallback_models: Vec<String>,
    pub deadline: Duration,
    pub attempt_timeout: Duration,
    pub discovery_enabled: bool,
    pub discovery_ttl: Duration,
    pub discovery_timeout: Duration,
    /// How long a failed discovery is remembered before trying again.
    pub discovery_retry: Duration,
    pub discovery_limit: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fallback_models = lookup("GEMINI_FALLBACK_MODELS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|models| !models.is_empty())
            .unwrap_or_else(|| DEFAULT_FALLBACK_MODELS.iter().map(|m| m.to_string()).collect());

        Ok(Self {
            api_key: lookup("GEMINI_API_KEY").and_then(|raw| sanitize_api_key(&raw)),
            base_url: lookup("GEMINI_BASE_URL")
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            bind_addr: parse_var(&lookup, "GATEWAY_BIND_ADDR", DEFAULT_BIND_ADDR.parse().ok())?,
            fallback_models,
            deadline: Duration::from_secs(parse_var(&lookup, "GATEWAY_DEADLINE_SECS", Some(60))?),
            attempt_timeout: Duration::from_secs(parse_var(
                &lookup,
                "GATEWAY_ATTEMPT_TIMEOUT_SECS",
                Some(30),
            )?),
            discovery_enabled: parse_bool(&lookup, "GATEWAY_DISCOVERY_ENABLED", true)?,
            discovery_ttl: Duration::from_secs(parse_var(
                &lookup,
                "GATEWAY_DISCOVERY_TTL_SECS",
                Some(300),
            )?),
            discovery_timeout: Duration::from_secs(parse_var(
                &lookup,
                "GATEWAY_DISCOVERY_TIMEOUT_SECS",
                Some(10),
            )?),
            discovery_retry: Duration::from_secs(parse_var(
                &lookup,
                "GATEWAY_DISCOVERY_RETRY_SECS",
                Some(30),
            )?),
            discovery_limit: parse_var(&lookup, "GATEWAY_DISCOVERY_LIMIT", Some(6))?,
        })
    }

    /// The credential, or [`Error::MissingApiKey`].
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or(Error::MissingApiKey)
    }
}

/// Strips surrounding whitespace and quote characters; blank means unset.
pub fn sanitize_api_key(raw: &str) -> Option<String> {
    let key = raw.trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'');
    (!key.is_empty()).then(|| key.to_string())
}

fn parse_var<F, T>(lookup: &F, key: &str, default: Option<T>) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).map(|raw| raw.trim().to_string()) {
        Some(raw) if !raw.is_empty() => raw
            .parse()
            .map_err(|e| Error::Config(format!("{} has invalid value '{}': {}", key, raw, e))),
        _ => default.ok_or_else(|| Error::Config(format!("{} not set", key))),
    }
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(default),
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!(
            "{} has invalid boolean value '{}'",
            key, other
        ))),
    }
}
