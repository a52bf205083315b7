//! Startup activation check.
//!
//! The check runs once, before any document is touched. Its only product is a
//! [`Capability`], which the extraction and reconciliation entry points take by
//! reference. There is no process-wide flag.

use reqwest::blocking::Client;
use std::time::Duration;

use crate::config::Config;
use crate::error::AppError;

/// Proof that the activation check passed (or was deliberately skipped).
#[derive(Debug, Clone)]
pub struct Capability {
    source: GrantSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantSource {
    Remote,
    NotConfigured,
    Offline,
}

impl Capability {
    pub fn source(&self) -> GrantSource {
        self.source
    }

    /// Capability for runs that explicitly opt out of the remote check.
    pub fn offline() -> Self {
        Self {
            source: GrantSource::Offline,
        }
    }
}

/// Performs the activation check described by `config`.
pub fn verify(config: &Config) -> Result<Capability, AppError> {
    let Some(url) = config.activation_url.as_deref() else {
        tracing::debug!("No activation URL configured, skipping check");
        return Ok(Capability {
            source: GrantSource::NotConfigured,
        });
    };

    let body = fetch(url, config.http_timeout)?;
    if is_granted(&body) {
        tracing::info!("Activation confirmed");
        Ok(Capability {
            source: GrantSource::Remote,
        })
    } else {
        tracing::warn!(response = %body.trim(), "Activation denied");
        Err(AppError::Activation(
            "this installation is not activated".to_string(),
        ))
    }
}

fn fetch(url: &str, timeout: Duration) -> Result<String, AppError> {
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Activation(e.to_string()))?;

    let response = client.get(url).send().map_err(|e| {
        AppError::Activation(
            if e.is_connect() || e.is_timeout() {
                "Check your internet connection and try again."
            } else {
                "Network error."
            }
            .to_string(),
        )
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::Activation(format!(
            "activation endpoint returned {}",
            status
        )));
    }

    response
        .text()
        .map_err(|e| AppError::Activation(format!("unreadable response: {}", e)))
}

fn is_granted(body: &str) -> bool {
    body.trim() == "true"
}
