//! Wiring for the gateway binary: config in, running gateway out.

use gateway_core::config::GatewayConfig;
use gateway_core::credentials::{
    CredentialProvider, EnvCredentialProvider, StaticTokenValidator, TokenValidator,
};
use gateway_core::error::CoreError;
use gateway_core::gateway::{GatewayHandle, GatewayState, start_gateway};
use gateway_core::materialize::ConfigMaterializer;
use gateway_core::supervisor::{LaunchSpec, ProcessSupervisor};

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

/// Load `{config_dir}/gateway.json`, apply env overrides and validate the result.
pub fn load_config(config_dir: &Path) -> Result<GatewayConfig, CoreError> {
    let mut config = GatewayConfig::load(config_dir)?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// A running gateway and the supervisor it fronts.
pub struct App {
    gateway: GatewayHandle,
    supervisor: Arc<ProcessSupervisor>,
}

impl App {
    /// Start with the environment-backed validator and credential provider.
    pub async fn start(config: GatewayConfig) -> Result<Self, CoreError> {
        let validator: Arc<dyn TokenValidator> = Arc::new(StaticTokenValidator::from_env());
        let provider: Arc<dyn CredentialProvider> =
            Arc::new(EnvCredentialProvider::new(config.clusters.clone()));

        Self::start_with(config, validator, provider).await
    }

    pub async fn start_with(
        config: GatewayConfig,
        validator: Arc<dyn TokenValidator>,
        provider: Arc<dyn CredentialProvider>,
    ) -> Result<Self, CoreError> {
        info!(
            "Embedded server: binary={} port={} kubeconfig={}",
            config.embedded.binary_path,
            config.embedded.port,
            config.embedded.kubeconfig_path.display()
        );

        let supervisor = Arc::new(ProcessSupervisor::new(
            LaunchSpec::from_config(&config.embedded),
            ConfigMaterializer::new(&config.embedded.kubeconfig_path),
        ));

        let state = GatewayState::new(&config, Arc::clone(&supervisor), validator, provider)?;
        let gateway = start_gateway(&config, state).await?;

        Ok(Self {
            gateway,
            supervisor,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.gateway.local_addr()
    }

    pub fn base_url(&self) -> String {
        self.gateway.base_url()
    }

    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    /// Stop the listener first so no request can respawn the server, then stop the server.
    pub async fn shutdown(self) -> Result<(), CoreError> {
        let served = self.gateway.shutdown().await;

        if self.supervisor.shutdown().await {
            info!("Embedded server stopped");
        }

        if let Err(e) = &served {
            warn!("Gateway exited with error: {e}");
        }
        served.map_err(CoreError::from)
    }
}
