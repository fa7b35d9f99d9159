//! Remote cone-search catalog over HTTP.
//!
//! The service is expected to answer
//! `GET {base_url}?ra=<deg>&dec=<deg>&radius=<arcsec>` with a JSON array of
//! [`CatalogRow`]s. Each request has a timeout; network failures, 429 and 5xx
//! responses are retried with bounded exponential backoff. Other statuses
//! fail immediately.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::catalog::{CatalogError, CatalogRow, Queryable};
use crate::error::AppError;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RETRIES: usize = 3;
const BACKOFF_BASE_MS: u64 = 250;
const BACKOFF_CAP_MS: u64 = 4_000;

pub struct HttpCatalog {
    name: String,
    base_url: String,
    client: Client,
    max_retries: usize,
}

impl HttpCatalog {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("kn-vet/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            name: name.into(),
            base_url: base_url.into(),
            client,
            max_retries,
        })
    }

    /// Build a catalog from `KNVET_<NAME>_URL` (plus the optional
    /// `KNVET_HTTP_TIMEOUT_SECS` and `KNVET_HTTP_RETRIES`), loading `.env`
    /// first.
    pub fn from_env(name: &str) -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let var = env_var_name(name);
        let base_url = std::env::var(&var)
            .map_err(|_| AppError::config(format!("Missing {var} in environment (.env).")))?;
        let timeout = parse_env_or("KNVET_HTTP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let retries = parse_env_or("KNVET_HTTP_RETRIES", DEFAULT_RETRIES)?;
        Self::new(name, base_url, Duration::from_secs(timeout), retries)
    }

    fn fetch_once(
        &self,
        ra: f64,
        dec: f64,
        radius_arcsec: f64,
    ) -> Result<Vec<CatalogRow>, Attempt> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("ra", ra.to_string()),
                ("dec", dec.to_string()),
                ("radius", radius_arcsec.to_string()),
            ])
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    Attempt::Retry(CatalogError::Timeout(1))
                } else {
                    Attempt::Retry(CatalogError::Network(e.to_string()))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let err = CatalogError::Status(status.as_u16());
            return Err(if is_retryable(status) {
                Attempt::Retry(err)
            } else {
                Attempt::Fatal(err)
            });
        }

        resp.json::<Vec<CatalogRow>>()
            .map_err(|e| Attempt::Fatal(CatalogError::Parse(e.to_string())))
    }
}

impl Queryable for HttpCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn query(
        &self,
        ra: f64,
        dec: f64,
        radius_arcsec: f64,
    ) -> Result<Vec<CatalogRow>, CatalogError> {
        let mut attempt = 0usize;
        loop {
            match self.fetch_once(ra, dec, radius_arcsec) {
                Ok(rows) => {
                    debug!(catalog = %self.name, rows = rows.len(), "cone search complete");
                    return Ok(rows);
                }
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retry(e)) => {
                    if attempt >= self.max_retries {
                        return Err(match e {
                            CatalogError::Timeout(_) => CatalogError::Timeout(attempt + 1),
                            other => other,
                        });
                    }
                    let wait = backoff_delay(attempt);
                    warn!(
                        catalog = %self.name,
                        attempt = attempt + 1,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "catalog request failed, retrying"
                    );
                    std::thread::sleep(wait);
                    attempt += 1;
                }
            }
        }
    }
}

enum Attempt {
    Retry(CatalogError),
    Fatal(CatalogError),
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Delay before retry number `attempt + 1`: `base · 2^attempt`, capped.
fn backoff_delay(attempt: usize) -> Duration {
    let factor = 1u64 << attempt.min(16);
    Duration::from_millis(BACKOFF_BASE_MS.saturating_mul(factor).min(BACKOFF_CAP_MS))
}

fn env_var_name(catalog: &str) -> String {
    let upper: String = catalog
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("KNVET_{upper}_URL")
}

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> Result<T, AppError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::config(format!("Invalid value for {var}: '{raw}'."))),
        Err(_) => Ok(default),
    }
}
