use libs::{payload::ApiResponse, StoreError};
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

/// Service routes, resolved against one base url.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub signup: String,
    pub login: String,
    pub todo_all: String,
    pub todo_new: String,
    pub todo_update: String,
    pub todo_delete: String,
}

impl Endpoints {
    pub fn new(service_url: &str) -> Self {
        let base = service_url.trim_end_matches('/');
        Endpoints {
            signup: format!("{}{}", base, "/v1/user/new"),
            login: format!("{}{}", base, "/v1/user/login"),
            todo_all: format!("{}{}", base, "/v1/todo/all"),
            todo_new: format!("{}{}", base, "/v1/todo/new"),
            todo_update: format!("{}{}", base, "/v1/todo/update"),
            todo_delete: format!("{}{}", base, "/v1/todo/delete"),
        }
    }
}

/// Failure of one round trip, keeping the status the service answered with.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("{0}")]
    Transport(String),

    #[error("{message}")]
    Status { status: StatusCode, message: String },
}

impl RequestError {
    fn status(status: StatusCode, message: Option<String>) -> Self {
        let message = message.unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });
        RequestError::Status { status, message }
    }
}

impl From<RequestError> for StoreError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Transport(reason) => StoreError::Unavailable(reason),
            RequestError::Status { status, message } => status_error(status, Some(message)),
        }
    }
}

/// Sends one request and unwraps the `data` of the response envelope.
pub async fn make_request<B, T>(
    request_client: &Client,
    method: Method,
    url: &str,
    token: Option<&str>,
    body: Option<&B>,
) -> Result<T, RequestError>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let mut request = request_client.request(method, url);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    if let Some(body) = body {
        request = request.json(body);
    }

    let resp = request.send().await.map_err(|e| {
        tracing::debug!("request to {} failed: {:?}", url, e);
        RequestError::Transport(format!("could not reach the service ({})", e))
    })?;

    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| RequestError::Transport(format!("could not read the response ({})", e)))?;
    tracing::debug!("{} -> {}", url, status);

    let envelope = match serde_json::from_str::<ApiResponse<T>>(&text) {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => return Err(RequestError::status(status, None)),
        Err(e) => {
            tracing::debug!("unexpected body: {}", text);
            return Err(RequestError::Transport(format!(
                "unexpected response from the service ({})",
                e
            )));
        }
    };

    if !status.is_success() || !envelope.is_ok() {
        return Err(RequestError::status(status, envelope.message));
    }
    envelope
        .data
        .ok_or_else(|| RequestError::Transport("the service sent no data".to_string()))
}

/// Maps a failed response onto the adapter's error taxonomy.
pub fn status_error(status: StatusCode, message: Option<String>) -> StoreError {
    let message = message.unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    });
    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unavailable(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY | StatusCode::CONFLICT => {
            StoreError::Rejected(message)
        }
        _ => StoreError::Unavailable(message),
    }
}
