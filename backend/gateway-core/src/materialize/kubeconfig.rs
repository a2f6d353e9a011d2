//! Kubeconfig document model.
//!
//! One cluster, user and context per bundle entry, all sharing the bundle's
//! cluster name. Field names follow the kubeconfig v1 schema.

use crate::credentials::CredentialBundle;
use crate::error::MaterializeError;

use serde::{Deserialize, Serialize};

const API_VERSION: &str = "v1";
const KIND: &str = "Config";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Kubeconfig {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub clusters: Vec<NamedCluster>,
    pub users: Vec<NamedUser>,
    pub contexts: Vec<NamedContext>,
    #[serde(rename = "current-context")]
    pub current_context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: ClusterEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterEntry {
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority_data: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub insecure_skip_tls_verify: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamedUser {
    pub name: String,
    pub user: UserEntry,
}

// Holds the plain token only between render and write.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntry {
    pub token: String,
}

impl std::fmt::Debug for UserEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserEntry {{ token: [REDACTED] }}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamedContext {
    pub name: String,
    pub context: ContextEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextEntry {
    pub cluster: String,
    pub user: String,
}

impl Kubeconfig {
    /// Build the document for `bundle`. Fails on an empty bundle.
    pub fn from_bundle(bundle: &CredentialBundle) -> Result<Self, MaterializeError> {
        let current_context = bundle
            .first_cluster()
            .ok_or_else(MaterializeError::empty_bundle)?
            .to_string();

        let mut clusters = Vec::with_capacity(bundle.len());
        let mut users = Vec::with_capacity(bundle.len());
        let mut contexts = Vec::with_capacity(bundle.len());

        for (name, credential) in bundle.iter() {
            clusters.push(NamedCluster {
                name: name.clone(),
                cluster: ClusterEntry {
                    server: credential.server.clone(),
                    certificate_authority_data: credential.certificate_authority_data.clone(),
                    insecure_skip_tls_verify: credential.insecure_skip_tls_verify,
                },
            });
            users.push(NamedUser {
                name: name.clone(),
                user: UserEntry {
                    token: credential.token.expose().to_string(),
                },
            });
            contexts.push(NamedContext {
                name: name.clone(),
                context: ContextEntry {
                    cluster: name.clone(),
                    user: name.clone(),
                },
            });
        }

        Ok(Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            clusters,
            users,
            contexts,
            current_context,
        })
    }

    pub fn to_yaml(&self) -> Result<String, MaterializeError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, MaterializeError> {
        Ok(serde_yaml::from_str(contents)?)
    }
}
