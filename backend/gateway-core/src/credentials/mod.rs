//! Host credential capabilities consumed by the gateway and the handshake.
//!
//! The host application owns authentication. This module only defines the two
//! seams it plugs into:
//!
//! - [`TokenValidator`]: turns a caller-supplied token into [`CallerCredentials`]
//! - [`CredentialProvider`]: hands out the identity token and per-cluster
//!   [`CredentialBundle`]s on demand
//!
//! [`EnvCredentialProvider`] and [`StaticTokenValidator`] are the implementations
//! used by the standalone binary.
//!
//! # Security
//! - Every token is a [`RedactedToken`]
//! - Bundles are built per request and never cached

pub mod env;
pub mod validator;

pub use env::EnvCredentialProvider;
pub use validator::StaticTokenValidator;

use crate::error::{AuthError, CredentialError};

use common::RedactedToken;

use std::collections::BTreeMap;
use std::collections::btree_map::Iter;

use async_trait::async_trait;

/// Endpoint and bearer token for one cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterCredential {
    pub server: String,
    pub token: RedactedToken,
    pub certificate_authority_data: Option<String>,
    pub insecure_skip_tls_verify: bool,
}

impl ClusterCredential {
    pub fn new(server: impl Into<String>, token: RedactedToken) -> Self {
        Self {
            server: server.into(),
            token,
            certificate_authority_data: None,
            insecure_skip_tls_verify: false,
        }
    }
}

/// Cluster identifier → credential. Ordered so the rendered kubeconfig is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialBundle {
    clusters: BTreeMap<String, ClusterCredential>,
}

impl CredentialBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cluster(mut self, name: impl Into<String>, credential: ClusterCredential) -> Self {
        self.insert(name, credential);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, credential: ClusterCredential) {
        self.clusters.insert(name.into(), credential);
    }

    pub fn get(&self, name: &str) -> Option<&ClusterCredential> {
        self.clusters.get(name)
    }

    pub fn iter(&self) -> Iter<'_, String, ClusterCredential> {
        self.clusters.iter()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// First cluster by name; used as the kubeconfig's current context.
    pub fn first_cluster(&self) -> Option<&str> {
        self.clusters.keys().next().map(String::as_str)
    }
}

/// The authenticated caller of a gateway request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerCredentials {
    pub principal: String,
    pub token: RedactedToken,
}

/// Host credential-validation capability.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<CallerCredentials, AuthError>;
}

/// Host credential source.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current short-lived identity token of the signed-in user.
    async fn identity_token(&self) -> Result<RedactedToken, CredentialError>;

    /// Per-cluster credentials for `caller`, built fresh on every call.
    async fn credential_bundle(
        &self,
        caller: &CallerCredentials,
    ) -> Result<CredentialBundle, CredentialError>;
}
