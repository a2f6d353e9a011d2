use crate::config::ClusterConfig;
use crate::credentials::{CallerCredentials, ClusterCredential, CredentialBundle, CredentialProvider};
use crate::error::CredentialError;

use common::RedactedToken;

use std::env;

use async_trait::async_trait;
use log::{debug, warn};

/// Environment variable holding the host identity token.
pub const IDENTITY_TOKEN_ENV: &str = "HEADLAMP_IDENTITY_TOKEN";

/// Credential provider backed by configured clusters and environment variables.
///
/// Each configured cluster names the env var that holds its bearer token. The
/// variables are read on every call, so rotating a token in the environment is
/// picked up by the next `/start` or `/refreshKubeconfig`.
#[derive(Debug, Clone)]
pub struct EnvCredentialProvider {
    clusters: Vec<ClusterConfig>,
    identity_env: String,
}

impl EnvCredentialProvider {
    pub fn new(clusters: Vec<ClusterConfig>) -> Self {
        Self {
            clusters,
            identity_env: IDENTITY_TOKEN_ENV.to_string(),
        }
    }

    pub fn with_identity_env(mut self, name: impl Into<String>) -> Self {
        self.identity_env = name.into();
        self
    }

    fn read_token(var: &str, subject: &str) -> Result<RedactedToken, CredentialError> {
        match env::var(var) {
            Ok(value) if value.trim().is_empty() => Err(CredentialError::missing(
                subject,
                format!("{var} is set but empty"),
            )),
            Ok(value) => Ok(RedactedToken::new(value.trim().to_string())),
            Err(env::VarError::NotPresent) => {
                Err(CredentialError::missing(subject, format!("{var} is not set")))
            }
            Err(env::VarError::NotUnicode(_)) => {
                warn!("Env var {var} contains invalid unicode");
                Err(CredentialError::missing(
                    subject,
                    format!("{var} contains invalid unicode"),
                ))
            }
        }
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn identity_token(&self) -> Result<RedactedToken, CredentialError> {
        Self::read_token(&self.identity_env, "identity")
    }

    async fn credential_bundle(
        &self,
        caller: &CallerCredentials,
    ) -> Result<CredentialBundle, CredentialError> {
        if self.clusters.is_empty() {
            return Err(CredentialError::lookup("No clusters configured"));
        }

        let mut bundle = CredentialBundle::new();

        for cluster in &self.clusters {
            let token = Self::read_token(&cluster.token_env, &cluster.name)?;

            debug!(
                "Loaded token for cluster '{}' ({} chars) on behalf of {}",
                cluster.name,
                token.len(),
                caller.principal
            );

            bundle.insert(
                cluster.name.clone(),
                ClusterCredential {
                    server: cluster.server.clone(),
                    token,
                    certificate_authority_data: cluster.certificate_authority_data.clone(),
                    insecure_skip_tls_verify: cluster.insecure_skip_tls_verify,
                },
            );
        }

        Ok(bundle)
    }
}
