//! JSON-over-HTTP plumbing shared by the remote model providers.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Error bodies in the shapes the supported APIs return.
#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    /// `{"error": {"message": "..."}}`
    Nested { error: ErrorDetail },
    /// `{"error": "..."}`
    Flat { error: String },
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl ErrorBody {
    fn into_message(self) -> String {
        match self {
            Self::Nested { error } => error.message,
            Self::Flat { error } => error,
        }
    }
}

/// A `reqwest` client bound to one API base URL and optional bearer token.
#[derive(Clone)]
pub(crate) struct JsonClient {
    http: reqwest::Client,
    token: Option<String>,
    pub(crate) base_url: String,
}

impl JsonClient {
    pub(crate) fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.filter(|t| !t.is_empty()),
            base_url: base_url.into(),
        }
    }

    /// POST `body` to `path` and decode the JSON response.
    ///
    /// Failures come back as plain messages; callers wrap them in the error
    /// variant of their own component.
    pub(crate) async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, String>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let mut request = self.http.post(&url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("API returned {status}: {}", error_detail(body)));
        }

        response.json().await.map_err(|e| format!("failed to parse response: {e}"))
    }
}

fn error_detail(body: String) -> String {
    serde_json::from_str::<ErrorBody>(&body).map(ErrorBody::into_message).unwrap_or(body)
}
