//! Jira connection configuration
//!
//! Built once at startup from `JIRA_EMAIL`, `JIRA_API_TOKEN` and `JIRA_DOMAIN`
//! and handed to [`crate::jira::JiraClient::new`].

use crate::{FacadeError, Result};
use std::time::Duration;

pub const ENV_EMAIL: &str = "JIRA_EMAIL";
pub const ENV_API_TOKEN: &str = "JIRA_API_TOKEN";
pub const ENV_DOMAIN: &str = "JIRA_DOMAIN";

/// Per-request timeouts for remote calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Single issue / board / field fetches
    pub get: Duration,
    /// JQL searches (large result sets)
    pub search: Duration,
    /// Create, update, delete and uploads
    pub write: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            get: Duration::from_secs(10),
            search: Duration::from_secs(30),
            write: Duration::from_secs(15),
        }
    }
}

/// Credentials and endpoint of the Jira instance
#[derive(Clone)]
pub struct JiraConfig {
    pub email: String,
    pub api_token: String,
    /// Scheme + host, no trailing slash (e.g. `https://acme.atlassian.net`)
    pub base_url: String,
    pub timeouts: Timeouts,
}

impl std::fmt::Debug for JiraConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraConfig")
            .field("email", &self.email)
            .field("api_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl JiraConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    /// Returns [`FacadeError::Config`] naming every missing or blank variable.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(
            std::env::var(ENV_EMAIL).ok(),
            std::env::var(ENV_API_TOKEN).ok(),
            std::env::var(ENV_DOMAIN).ok(),
        )
    }

    /// Build the configuration from already-read values.
    pub fn from_vars(
        email: Option<String>,
        api_token: Option<String>,
        domain: Option<String>,
    ) -> Result<Self> {
        let mut missing = Vec::new();

        let email = non_blank(email).unwrap_or_else(|| {
            missing.push(ENV_EMAIL);
            String::new()
        });
        let api_token = non_blank(api_token).unwrap_or_else(|| {
            missing.push(ENV_API_TOKEN);
            String::new()
        });
        let domain = non_blank(domain).unwrap_or_else(|| {
            missing.push(ENV_DOMAIN);
            String::new()
        });

        if !missing.is_empty() {
            return Err(FacadeError::Config(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            email,
            api_token,
            base_url: base_url_for(&domain),
            timeouts: Timeouts::default(),
        })
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `acme.atlassian.net` becomes `https://acme.atlassian.net`; values that
/// already carry a scheme are kept as-is.
fn base_url_for(domain: &str) -> String {
    let domain = domain.trim_end_matches('/');
    if domain.starts_with("http://") || domain.starts_with("https://") {
        domain.to_string()
    } else {
        format!("https://{}", domain)
    }
}
