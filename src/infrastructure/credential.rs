//! Credential provider seam
//!
//! Token acquisition (browser automation, cookie capture) lives outside this
//! crate; the pipeline only consumes an opaque bearer token plus cookie jar
//! with an expiry. Consumers ask for a valid credential before each request
//! group and ask again after an authorization failure.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Safety margin applied before the reported expiry; a token this close to
/// expiring is treated as already expired.
const EXPIRY_MARGIN_SECONDS: i64 = 60;

#[derive(Debug, Clone)]
pub struct Credential {
    pub bearer_token: String,
    pub cookies: HashMap<String, String>,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn is_expired(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECONDS) >= self.expires_at
    }

    /// Cookie header value in `k=v; k=v` form.
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// A credential currently believed valid. Called again after an auth
    /// failure, at which point the provider should re-acquire if it can.
    async fn valid_credential(&self) -> Result<Credential>;
}

/// Fixed token sourced from the environment, for runs where the token is
/// captured externally and for tests. Cannot re-acquire: a rejected token
/// stays rejected.
pub struct StaticCredential {
    credential: Credential,
}

impl StaticCredential {
    pub fn new(bearer_token: String, cookies: HashMap<String, String>) -> Self {
        Self {
            credential: Credential {
                bearer_token,
                cookies,
                // Externally captured tokens carry no expiry metadata; far
                // future means "until the API says otherwise".
                expires_at: Utc::now() + Duration::hours(12),
            },
        }
    }

    /// Read the bearer token from `LAND_COLLECTOR_TOKEN` and optional
    /// `k=v; k=v` cookies from `LAND_COLLECTOR_COOKIES`.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("LAND_COLLECTOR_TOKEN")
            .context("LAND_COLLECTOR_TOKEN is not set; export a captured bearer token")?;
        let cookies = std::env::var("LAND_COLLECTOR_COOKIES")
            .map(|raw| parse_cookie_pairs(&raw))
            .unwrap_or_default();
        Ok(Self::new(token, cookies))
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn valid_credential(&self) -> Result<Credential> {
        Ok(self.credential.clone())
    }
}

fn parse_cookie_pairs(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            let k = k.trim();
            (!k.is_empty()).then(|| (k.to_string(), v.trim().to_string()))
        })
        .collect()
}
