use crate::config::GatewayConfig;
use crate::credentials::{CredentialProvider, TokenValidator};
use crate::error::{GatewayError, ProxyError};
use crate::gateway::auth::StaticAllowList;
use crate::gateway::proxy::UpstreamProxy;
use crate::supervisor::ProcessSupervisor;

use std::sync::Arc;

use axum::http::HeaderName;

/// Shared state handed to every gateway handler.
///
/// Cheap to clone; every field is reference counted or small. The supervisor
/// is the only mutable resource and guards itself.
#[derive(Clone)]
pub struct GatewayState {
    pub(crate) supervisor: Arc<ProcessSupervisor>,
    pub(crate) validator: Arc<dyn TokenValidator>,
    pub(crate) provider: Arc<dyn CredentialProvider>,
    pub(crate) proxy: Arc<UpstreamProxy>,
    pub(crate) allow_list: Arc<StaticAllowList>,
    pub(crate) token_header: HeaderName,
}

impl GatewayState {
    pub fn new(
        config: &GatewayConfig,
        supervisor: Arc<ProcessSupervisor>,
        validator: Arc<dyn TokenValidator>,
        provider: Arc<dyn CredentialProvider>,
    ) -> Result<Self, GatewayError> {
        let token_header = HeaderName::try_from(config.proxy.token_header.as_str()).map_err(|e| {
            ProxyError::request(format!(
                "Invalid token header '{}': {e}",
                config.proxy.token_header
            ))
        })?;

        let proxy = UpstreamProxy::new(
            config.embedded.port,
            config.proxy.path_rewrite.clone(),
            token_header.clone(),
        )?;

        Ok(Self {
            supervisor,
            validator,
            provider,
            proxy: Arc::new(proxy),
            allow_list: Arc::new(StaticAllowList::new(config.proxy.static_paths.clone())),
            token_header,
        })
    }

    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    pub fn token_header(&self) -> &HeaderName {
        &self.token_header
    }
}
