use bytes::Bytes;
use gale_instruments::{Method, OutcomeStatus};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A request relative to the target host.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Path and query, joined onto the target host. For example `/api/products/3`.
    pub path: String,
    /// Name to group outcomes under in summaries. Defaults to the path.
    pub name: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Statuses that count as a successful request. When unset, any 2xx status is a success.
    pub expected_statuses: Option<Vec<u16>>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            name: None,
            headers: Vec::new(),
            body: None,
            expected_statuses: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Group this request under `name` rather than its path. Use this when the path contains ids,
    /// so that `/api/products/1` and `/api/products/2` are summarised together.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Send `body` as JSON, with a `Content-Type: application/json` header.
    pub fn with_json<T: Serialize>(mut self, body: &T) -> serde_json::Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Count only these statuses as successful, for example `[200, 404]` for a lookup where a
    /// missing resource is a valid answer.
    pub fn with_expected_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.expected_statuses = Some(statuses.into_iter().collect());
        self
    }

    /// Whether a response with `status` is recorded as a failed request.
    pub fn is_failure(&self, status: u16) -> bool {
        match &self.expected_statuses {
            Some(expected) => !expected.contains(&status),
            None => OutcomeStatus::Status(status).is_default_failure(),
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.path)
    }
}

/// What the target sent back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: None,
            body: body.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_len(&self) -> u64 {
        self.body.len() as u64
    }

    /// Decode the body as untyped JSON.
    pub fn json_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn name_defaults_to_path() {
        let request = HttpRequest::get("/api/products/3");
        assert_eq!("/api/products/3", request.name());

        let request = request.with_name("/api/products/{id}");
        assert_eq!("/api/products/{id}", request.name());
    }

    #[test]
    fn expected_statuses_override_the_default_classification() {
        let request = HttpRequest::get("/api/products/99");
        assert!(!request.is_failure(200));
        assert!(!request.is_failure(204));
        assert!(request.is_failure(404));

        let request = request.with_expected_statuses([200, 404]);
        assert!(!request.is_failure(404));
        assert!(request.is_failure(204));
        assert!(request.is_failure(500));
    }

    #[test]
    fn json_body() {
        let request = HttpRequest::post("/api/products")
            .with_json(&json!({ "name": "Widget", "price": 120 }))
            .unwrap();
        assert_eq!(Some(json!({ "name": "Widget", "price": 120 })), request.body);
    }

    #[test]
    fn decode_response() {
        let response = HttpResponse::new(200, r#"{"id": 7}"#);

        #[derive(serde::Deserialize)]
        struct Created {
            id: u64,
        }

        assert_eq!(7, response.json::<Created>().unwrap().id);
        assert!(HttpResponse::new(200, "not json").json_value().is_err());
    }
}
