//! Typed HTTP client for the gateway routes.
//!
//! Used by the client side to start the embedded server, keep its kubeconfig
//! fresh, fetch the kubeconfig for the surface, and wait for the surface to
//! come up before loading it.

use crate::error::{GatewayClientError, HandshakeError};
use crate::handshake::ConfigSource;

use common::RedactedToken;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use backoff::{ExponentialBackoff, backoff::Backoff};
use log::{debug, info, trace};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tokio::time::sleep as TokioSleep;
use url::Url;

const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_secs(30);
pub const READINESS_MAX_ELAPSED: Duration = Duration::from_secs(120);

const START_ENDPOINT: &str = "start";
const REFRESH_ENDPOINT: &str = "refreshKubeconfig";
const FETCH_ENDPOINT: &str = "fetchKubeconfig";
const HEALTH_ENDPOINT: &str = "health";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub running: bool,
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct KubeconfigBody {
    kubeconfig: String,
}

#[derive(Clone)]
pub struct GatewayClient {
    base_url: Url,
    client: Client,
    token: Arc<RwLock<Option<RedactedToken>>>,
}

impl GatewayClient {
    pub fn new(base_url_str: &str) -> Result<Self, GatewayClientError> {
        let mut base_url = Url::parse(base_url_str)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT_DURATION)
            .build()?;

        Ok(Self {
            base_url,
            client,
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn with_token(self, token: RedactedToken) -> Self {
        self.set_token(token);
        self
    }

    /// Replace the bearer token used for authenticated routes.
    pub fn set_token(&self, token: RedactedToken) {
        match self.token.write() {
            Ok(mut guard) => *guard = Some(token),
            Err(poisoned) => *poisoned.into_inner() = Some(token),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn prepare_request(&self, request: RequestBuilder) -> RequestBuilder {
        let token = match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };

        match token {
            Some(token) => request.bearer_auth(token.expose()),
            None => request,
        }
    }

    async fn check(response: Response) -> Result<Response, GatewayClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(GatewayClientError::from_status(status.as_u16(), body))
    }

    async fn post(&self, endpoint: &str) -> Result<Response, GatewayClientError> {
        let url = self.base_url.join(endpoint)?;
        debug!("POST {url}");

        let response = self.prepare_request(self.client.post(url)).send().await?;
        Self::check(response).await
    }

    /// Start the embedded server (or refresh its kubeconfig). Returns the gateway's message.
    pub async fn start(&self) -> Result<String, GatewayClientError> {
        let body: MessageBody = self.post(START_ENDPOINT).await?.json().await?;
        info!("{}", body.message);
        Ok(body.message)
    }

    pub async fn refresh_kubeconfig(&self) -> Result<(), GatewayClientError> {
        self.post(REFRESH_ENDPOINT).await?;
        Ok(())
    }

    pub async fn fetch_kubeconfig(&self) -> Result<String, GatewayClientError> {
        let body: KubeconfigBody = self.post(FETCH_ENDPOINT).await?.json().await?;
        Ok(body.kubeconfig)
    }

    pub async fn health(&self) -> Result<HealthStatus, GatewayClientError> {
        let url = self.base_url.join(HEALTH_ENDPOINT)?;
        let response = self.client.get(url).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Surface URL with the host page's query parameters appended.
    pub fn surface_url<'a, I>(&self, host_query: I) -> Url
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut url = self.base_url.clone();
        let mut pairs = host_query.into_iter().peekable();

        if pairs.peek().is_some() {
            url.query_pairs_mut().extend_pairs(pairs);
        }

        url
    }

    async fn surface_responds(&self) -> bool {
        match self.client.get(self.base_url.clone()).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                trace!("Surface not reachable yet: {e}");
                false
            }
        }
    }

    /// Poll the surface URL with exponential backoff until it answers 2xx.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayClientError::NotReady`] once `max_elapsed` has passed.
    pub async fn wait_until_ready(&self, max_elapsed: Duration) -> Result<(), GatewayClientError> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(max_elapsed),
            ..Default::default()
        };

        debug!("Waiting for surface at {}", self.base_url);

        loop {
            if self.surface_responds().await {
                info!("Surface is ready at {}", self.base_url);
                return Ok(());
            }

            match backoff.next_backoff() {
                Some(duration) => {
                    trace!("Surface not ready, retrying after {duration:?}");
                    TokioSleep(duration).await;
                }
                None => {
                    return Err(GatewayClientError::not_ready(format!(
                        "Surface at {} did not respond within {max_elapsed:?}",
                        self.base_url
                    )));
                }
            }
        }
    }
}

#[async_trait]
impl ConfigSource for GatewayClient {
    async fn kubeconfig(&self) -> Result<String, HandshakeError> {
        self.fetch_kubeconfig()
            .await
            .map_err(|e| HandshakeError::credential(e.to_string()))
    }

    async fn refresh_server(&self) -> Result<(), HandshakeError> {
        self.refresh_kubeconfig()
            .await
            .map_err(|e| HandshakeError::credential(e.to_string()))
    }
}
