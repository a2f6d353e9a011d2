use crate::credentials::{CallerCredentials, TokenValidator};
use crate::error::AuthError;

use common::RedactedToken;

use std::env;

use async_trait::async_trait;
use log::{info, warn};
use subtle::ConstantTimeEq;

/// Environment variable listing accepted caller tokens.
///
/// Comma separated; each entry is either `token` or `principal=token`.
pub const GATEWAY_TOKENS_ENV: &str = "HEADLAMP_GATEWAY_TOKENS";

const ANONYMOUS_PRINCIPAL: &str = "user:default/guest";

/// Validator accepting a fixed set of tokens.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenValidator {
    entries: Vec<(String, RedactedToken)>,
}

impl StaticTokenValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, principal: impl Into<String>, token: impl Into<String>) -> Self {
        self.entries
            .push((principal.into(), RedactedToken::new(token.into())));
        self
    }

    /// Parse `principal=token,token2,...`.
    pub fn parse(list: &str) -> Self {
        let mut validator = Self::new();

        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            validator = match entry.split_once('=') {
                Some((principal, token)) if !token.trim().is_empty() => {
                    validator.with_token(principal.trim(), token.trim())
                }
                Some((principal, _)) => {
                    warn!("Ignoring empty token for principal '{}'", principal.trim());
                    validator
                }
                None => validator.with_token(ANONYMOUS_PRINCIPAL, entry),
            };
        }

        validator
    }

    /// Load from [`GATEWAY_TOKENS_ENV`]. An unset variable yields a validator
    /// that rejects everything.
    pub fn from_env() -> Self {
        match env::var(GATEWAY_TOKENS_ENV) {
            Ok(list) => {
                let validator = Self::parse(&list);
                info!(
                    "Loaded {} gateway token(s) from {GATEWAY_TOKENS_ENV}",
                    validator.len()
                );
                validator
            }
            Err(_) => {
                warn!("{GATEWAY_TOKENS_ENV} not set - every authenticated route will return 401");
                Self::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    if a_bytes.len() == b_bytes.len() {
        a_bytes.ct_eq(b_bytes).into()
    } else {
        let _ = a_bytes.ct_eq(a_bytes);
        false
    }
}

#[async_trait]
impl TokenValidator for StaticTokenValidator {
    async fn validate(&self, token: &str) -> Result<CallerCredentials, AuthError> {
        // Every entry is compared so timing does not reveal which one matched.
        let mut matched: Option<&(String, RedactedToken)> = None;
        for entry in &self.entries {
            if constant_time_eq(token, entry.1.expose()) && matched.is_none() {
                matched = Some(entry);
            }
        }

        matched
            .map(|(principal, token)| CallerCredentials {
                principal: principal.clone(),
                token: token.clone(),
            })
            .ok_or_else(AuthError::invalid_token)
    }
}
