use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{header, Method, StatusCode};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use url::Url;

use crate::model::Response;
use crate::Error;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("cannot send the response, invalid ResponseURL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to put the response to {url} status code {status}, {body}")]
    Rejected {
        url: Url,
        status: u16,
        body: String,
    },
}

/// Delivers the outcome of a request to the pre-signed `ResponseURL`.
pub trait ResponseTransport: Send + Sync {
    fn send(&self, url: &Url, response: &Response) -> Result<(), Error>;
}

/// PUTs the JSON response over HTTPS. Anything but `200 OK` is an error.
pub struct HttpTransport {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl HttpTransport {
    pub fn new() -> Self {
        HttpTransport {
            client: Client::builder(TokioExecutor::new()).build(HttpsConnector::new()),
        }
    }

    async fn put(&self, url: &Url, body: Vec<u8>) -> Result<(), Error> {
        let request = hyper::Request::builder()
            .method(Method::PUT)
            .uri(url.as_str())
            // The pre-signed URL is only valid for an empty content type.
            .header(header::CONTENT_TYPE, "")
            .header(header::CONTENT_LENGTH, body.len())
            .body(Full::new(Bytes::from(body)))?;
        let response = self.client.request(request).await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.into_body().collect().await?.to_bytes();
            let body = String::from_utf8_lossy(&body).into_owned();
            error!("S3 response: {} {}", status, body);

            Err(Box::new(DeliveryError::Rejected { url: url.clone(), status: status.as_u16(), body }))
        } else {
            Ok(())
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseTransport for HttpTransport {
    fn send(&self, url: &Url, response: &Response) -> Result<(), Error> {
        let response_json = serde_json::to_vec(response)?;
        crate::block_on(self.put(url, response_json))
    }
}
