//! Process configuration, read from environment variables.

use std::net::SocketAddr;
use std::str::FromStr;

use devportal_core::{DomainError, DomainResult, Environment};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    /// `PORTAL_BIND_ADDR`
    pub bind_addr: SocketAddr,
    /// `JWT_SECRET`, HS256 key for bearer tokens.
    pub jwt_secret: String,
    /// `PORTAL_DEFAULT_PAGE_LIMIT`
    pub default_page_limit: u32,
    /// `PORTAL_MAX_PAGE_LIMIT`
    pub max_page_limit: u32,
    /// `PORTAL_CLIENT_SECRET_BYTES`
    pub client_secret_bytes: usize,
    /// `PORTAL_ENVIRONMENTS`, comma separated. Seeded at start-up.
    pub environments: Vec<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            default_page_limit: 50,
            max_page_limit: 1000,
            client_secret_bytes: 32,
            environments: vec![
                devportal_core::environment::DEVELOPMENT.to_string(),
                devportal_core::environment::PRODUCTION.to_string(),
            ],
        }
    }
}

impl PortalConfig {
    pub fn from_env() -> DomainResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DomainResult<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set; using the development secret");
                defaults.jwt_secret
            }
        };

        let environments = match var("PORTAL_ENVIRONMENTS") {
            Some(list) => {
                let mut names = Vec::new();
                for name in list.split(',').filter(|n| !n.trim().is_empty()) {
                    let name = Environment::normalize_name(name)?;
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
                names
            }
            None => defaults.environments,
        };

        let config = Self {
            bind_addr: parse_or(var("PORTAL_BIND_ADDR"), "PORTAL_BIND_ADDR", defaults.bind_addr)?,
            jwt_secret,
            default_page_limit: parse_or(
                var("PORTAL_DEFAULT_PAGE_LIMIT"),
                "PORTAL_DEFAULT_PAGE_LIMIT",
                defaults.default_page_limit,
            )?,
            max_page_limit: parse_or(
                var("PORTAL_MAX_PAGE_LIMIT"),
                "PORTAL_MAX_PAGE_LIMIT",
                defaults.max_page_limit,
            )?,
            client_secret_bytes: parse_or(
                var("PORTAL_CLIENT_SECRET_BYTES"),
                "PORTAL_CLIENT_SECRET_BYTES",
                defaults.client_secret_bytes,
            )?,
            environments,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.max_page_limit == 0 {
            return Err(DomainError::validation("PORTAL_MAX_PAGE_LIMIT must be positive"));
        }
        if self.default_page_limit == 0 || self.default_page_limit > self.max_page_limit {
            return Err(DomainError::validation(format!(
                "PORTAL_DEFAULT_PAGE_LIMIT must be in 1..={}",
                self.max_page_limit
            )));
        }
        if self.client_secret_bytes < 16 {
            return Err(DomainError::validation(
                "PORTAL_CLIENT_SECRET_BYTES must be at least 16",
            ));
        }
        Ok(())
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> DomainResult<T>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| DomainError::validation(format!("{key}='{raw}': {e}"))),
    }
}
