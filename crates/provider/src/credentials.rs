//! Typed provider credentials.
//!
//! Stored per tenant as a JSONB tagged union and decoded once at adapter
//! construction, so a malformed blob surfaces as a configuration error
//! before any sync work starts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported accounting providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Infakt,
    Wfirma,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Infakt => "infakt",
            ProviderKind::Wfirma => "wfirma",
        }
    }

    pub fn parse(s: &str) -> Option<ProviderKind> {
        match s {
            "infakt" => Some(ProviderKind::Infakt),
            "wfirma" => Some(ProviderKind::Wfirma),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-vendor credential sets, tagged by provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProviderCredentials {
    Infakt {
        api_key: String,
    },
    Wfirma {
        access_key: String,
        secret_key: String,
        app_key: String,
        company_id: String,
    },
}

impl ProviderCredentials {
    /// The provider this credential set belongs to.
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderCredentials::Infakt { .. } => ProviderKind::Infakt,
            ProviderCredentials::Wfirma { .. } => ProviderKind::Wfirma,
        }
    }
}
