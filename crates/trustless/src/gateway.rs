//! Trustless gateway client
//!
//! One `GET` per CID asking for the CAR media type. The response body is
//! handed on as a stream; nothing is buffered and nothing is trusted here.

use crate::error::BoxError;
use cid::Cid as IpldCid;
use http::{Request, StatusCode, header};
use trustless_common::ByteStream;
use trustless_common::http_client::HttpClient;
use url::Url;

/// Media type of a CAR v1 response
pub const CAR_MEDIA_TYPE: &str = "application/vnd.ipld.car";

/// Public trustless gateway used when none is configured
pub const DEFAULT_GATEWAY: &str = "https://trustless-gateway.link";

/// How content is addressed on the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatewayStyle {
    /// `{gateway}/ipfs/{cid}`
    #[default]
    Path,
    /// `{scheme}://{cid}.ipfs.{host}/`
    Subdomain,
}

/// Gateway request failures
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum GatewayError {
    /// The gateway answered with an error status
    #[error("Gateway answered {status} for {url}")]
    #[diagnostic(
        code(gateway::status),
        help("Check that the gateway serves trustless CAR responses and has the content")
    )]
    Status {
        /// Response status
        status: StatusCode,
        /// Requested URL
        url: Url,
    },

    /// The response carried no body
    #[error("Gateway sent no body for {url}")]
    #[diagnostic(code(gateway::empty_body))]
    EmptyBody {
        /// Requested URL
        url: Url,
    },

    /// The request could not be sent or the response not received
    #[error("Gateway request failed")]
    #[diagnostic(code(gateway::transport))]
    Transport {
        /// Underlying client error
        #[source]
        source: BoxError,
    },

    /// No valid request URL could be built
    #[error("Cannot build gateway URL: {message}")]
    #[diagnostic(
        code(gateway::invalid_url),
        help("The gateway must be an absolute http(s) URL, e.g. https://trustless-gateway.link")
    )]
    InvalidUrl {
        /// What was wrong
        message: String,
    },
}

/// Client for one trustless gateway
#[derive(Debug, Clone)]
pub struct GatewayClient<C> {
    client: C,
    base: Url,
    style: GatewayStyle,
}

impl<C: HttpClient> GatewayClient<C> {
    /// Path-style client for `base`
    pub fn new(client: C, base: Url) -> Self {
        Self {
            client,
            base,
            style: GatewayStyle::Path,
        }
    }

    /// Choose how content is addressed
    pub fn with_style(mut self, style: GatewayStyle) -> Self {
        self.style = style;
        self
    }

    /// Gateway base URL
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// URL the CAR for `cid` is requested from
    pub fn car_url(&self, cid: &IpldCid) -> Result<Url, GatewayError> {
        let mut url = self.base.clone();
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(GatewayError::InvalidUrl {
                message: format!("{} has no host", self.base),
            });
        }

        match self.style {
            GatewayStyle::Path => {
                let mut path = url.path().trim_end_matches('/').to_owned();
                path.push_str("/ipfs/");
                path.push_str(&cid.to_string());
                url.set_path(&path);
            }
            GatewayStyle::Subdomain => {
                // DNS labels are case-insensitive, so v0 CIDs go out as base32 v1
                let label = cid.into_v1().map_err(|e| GatewayError::InvalidUrl {
                    message: format!("{cid} has no v1 form: {e}"),
                })?;
                let host = format!("{label}.ipfs.{}", url.host_str().unwrap_or_default());
                url.set_host(Some(&host))
                    .map_err(|e| GatewayError::InvalidUrl {
                        message: format!("invalid subdomain host {host}: {e}"),
                    })?;
                url.set_path("/");
            }
        }
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }

    /// Request the CAR for `cid`
    ///
    /// Fails with [`GatewayError::Status`] on a 4xx/5xx answer, before any of
    /// the body is looked at.
    pub async fn fetch_car(&self, cid: &IpldCid) -> Result<ByteStream, GatewayError> {
        let url = self.car_url(cid)?;
        let request = Request::get(url.as_str())
            .header(header::ACCEPT, CAR_MEDIA_TYPE)
            .body(Vec::new())
            .map_err(|e| GatewayError::InvalidUrl {
                message: e.to_string(),
            })?;

        tracing::debug!(%url, "requesting CAR");
        let response = self
            .client
            .send_http_streaming(request)
            .await
            .map_err(|e| GatewayError::Transport {
                source: Box::new(e),
            })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            tracing::warn!(%url, %status, "gateway error status");
            return Err(GatewayError::Status { status, url });
        }

        tracing::debug!(%url, %status, "gateway response");
        response
            .into_body()
            .ok_or(GatewayError::EmptyBody { url })
    }
}
