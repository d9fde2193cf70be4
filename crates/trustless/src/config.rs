//! Retrieval configuration

use crate::gateway::{DEFAULT_GATEWAY, GatewayClient, GatewayError, GatewayStyle};
use crate::retrieval::Retrieval;
use cid::Cid as IpldCid;
use std::time::Duration;
use trustless_car::DEFAULT_MAX_FILE_SIZE;
use trustless_common::http_client::HttpClient;
use url::Url;

/// Environment variable overriding the default gateway
pub const GATEWAY_ENV: &str = "TRUSTLESS_GATEWAY";

/// Settings shared by retrievals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalConfig {
    /// Gateway base URL
    pub gateway: Url,
    /// How content is addressed on the gateway
    pub style: GatewayStyle,
    /// Largest declared file size that will be read
    pub max_file_size: u64,
    /// Deadline for a whole retrieval
    pub timeout: Option<Duration>,
}

impl RetrievalConfig {
    /// Configuration for `gateway` with default limits
    pub fn new(gateway: Url) -> Self {
        Self {
            gateway,
            style: GatewayStyle::Path,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            timeout: None,
        }
    }

    /// Configuration for the gateway named by `TRUSTLESS_GATEWAY`, or the
    /// public default
    pub fn from_env() -> Result<Self, GatewayError> {
        let gateway = std::env::var(GATEWAY_ENV).unwrap_or_else(|_| DEFAULT_GATEWAY.to_string());
        Self::parse(&gateway)
    }

    /// Configuration for a gateway given as text
    pub fn parse(gateway: &str) -> Result<Self, GatewayError> {
        Url::parse(gateway)
            .map(Self::new)
            .map_err(|e| GatewayError::InvalidUrl {
                message: format!("{gateway}: {e}"),
            })
    }

    /// Set the gateway style
    pub fn style(mut self, style: GatewayStyle) -> Self {
        self.style = style;
        self
    }

    /// Set the largest declared file size that will be read
    pub fn max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Set a deadline for each retrieval
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Gateway client over `client`
    pub fn gateway_client<C: HttpClient>(&self, client: C) -> GatewayClient<C> {
        GatewayClient::new(client, self.gateway.clone()).with_style(self.style)
    }

    /// Retrieval of `cid` over `client`
    pub fn retrieval<C: HttpClient>(&self, client: C, cid: IpldCid) -> Retrieval<C> {
        Retrieval::new(self.gateway_client(client), cid)
            .max_file_size(self.max_file_size)
            .timeout(self.timeout)
    }

    /// HTTP client for gateway requests
    #[cfg(feature = "reqwest-client")]
    pub fn http_client(&self) -> Result<reqwest::Client, GatewayError> {
        reqwest::Client::builder()
            .user_agent(concat!("trustless/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::Transport {
                source: Box::new(e),
            })
    }
}
