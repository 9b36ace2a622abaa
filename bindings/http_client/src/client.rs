use std::fmt::Debug;

use async_trait::async_trait;
use gale_instruments::Method;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::error::TransportError;
use crate::types::{HttpRequest, HttpResponse};

/// Sends requests to the target service. The instrumented client wraps an implementation of this
/// trait, so tests can swap the network out for a mock.
#[async_trait]
pub trait HttpClient: Debug + Send + Sync {
    async fn send(&self, base: &Url, request: &HttpRequest)
        -> Result<HttpResponse, TransportError>;
}

/// [HttpClient] backed by a shared [reqwest::Client] connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("gale/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(
        &self,
        base: &Url,
        request: &HttpRequest,
    ) -> Result<HttpResponse, TransportError> {
        let url = base
            .join(&request.path)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", request.path)))?;

        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
