//! Minimal HTTP client abstraction for streaming gateway responses.

use crate::stream::ByteStream;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

/// HTTP client trait for sending requests and receiving streaming responses.
///
/// The response body is `None` when the transport has no body to hand over
/// (e.g. a zero-length response); callers decide whether that is an error.
#[trait_variant::make(Send)]
pub trait HttpClient {
    /// Error type returned by the HTTP client
    type Error: std::error::Error + Display + Send + Sync + 'static;

    /// Send an HTTP request and return the response with a streaming body.
    fn send_http_streaming(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> impl Future<Output = Result<http::Response<Option<ByteStream>>, Self::Error>>;
}

impl<T: HttpClient + Sync> HttpClient for Arc<T> {
    type Error = T::Error;

    fn send_http_streaming(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> impl Future<Output = Result<http::Response<Option<ByteStream>>, Self::Error>> + Send {
        self.as_ref().send_http_streaming(request)
    }
}

#[cfg(feature = "reqwest-client")]
impl HttpClient for reqwest::Client {
    type Error = reqwest::Error;

    async fn send_http_streaming(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> Result<http::Response<Option<ByteStream>>, Self::Error> {
        use crate::stream::StreamError;
        use n0_future::stream::StreamExt;

        // Convert http::Request to reqwest::Request
        let (parts, body) = request.into_parts();

        let mut req = self.request(parts.method, parts.uri.to_string()).body(body);

        // Copy headers
        for (name, value) in parts.headers.iter() {
            req = req.header(name.as_str(), value.as_bytes());
        }

        // Send request and get streaming response
        let resp = req.send().await?;

        // reqwest and http share the same status and header types
        let status = resp.status();
        let headers = resp.headers().clone();

        let body = if resp.content_length() == Some(0) {
            None
        } else {
            let stream = resp
                .bytes_stream()
                .map(|result| result.map_err(StreamError::transport));
            Some(ByteStream::new(stream))
        };

        let mut response = http::Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}
