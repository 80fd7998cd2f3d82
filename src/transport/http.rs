use std::time::Duration;

/// Thin reqwest wrapper shared by the provider and retrieval clients.
///
/// The provider client uses `connect_timeout` only; per-read ceilings for the
/// long-lived SSE body are enforced by the caller, so a slow but steady stream is
/// never cut off mid-answer.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl HttpTransport {
    /// Client for long-lived streaming calls.
    pub fn streaming(connect_timeout: Duration, api_key: Option<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self { client, api_key })
    }

    /// Client whose every request is bounded by `timeout` end to end.
    pub fn bounded(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self {
            client,
            api_key: None,
        })
    }

    /// POST a JSON body asking for an SSE response. The response is returned
    /// whatever its status; callers inspect it.
    pub async fn post_event_stream(
        &self,
        url: &str,
        body: &serde_json::Value,
        client_request_id: Option<&str>,
    ) -> Result<reqwest::Response, TransportError> {
        let mut req = self
            .client
            .post(url)
            .json(body)
            .header("accept", "text/event-stream");

        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        if let Some(id) = client_request_id {
            req = req.header("x-uiautodev-request-id", id);
        }

        req.send().await.map_err(TransportError::from)
    }

    /// GET `url` with query parameters and decode a JSON body. Non-success
    /// statuses are errors. Errors never carry the request URL, since the query
    /// string can be arbitrarily long.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, TransportError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| TransportError::Http(e.without_url()))?;
        response
            .json()
            .await
            .map_err(|e| TransportError::Http(e.without_url()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no data received for {0:?}")]
    ReadTimeout(Duration),

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Http(e) => e.is_timeout(),
            TransportError::ReadTimeout(_) => true,
            TransportError::Other(_) => false,
        }
    }
}
