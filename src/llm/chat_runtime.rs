use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::llm::backend::{Provider, ProviderError};

#[derive(Debug)]
pub(crate) enum RequestFailure {
    Request(reqwest::Error),
    Api { status: StatusCode, body: String },
}

impl RequestFailure {
    pub(crate) fn into_provider_error(self, provider: Provider) -> ProviderError {
        match self {
            Self::Request(source) => ProviderError::Request { provider, source },
            Self::Api { status, body } => ProviderError::Api {
                provider,
                status,
                body,
            },
        }
    }
}

/// Posts one JSON request with bearer auth and decodes a successful body.
///
/// No retry and no client-side timeout: a failure is returned as-is.
pub(crate) async fn post_json<T, R>(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    payload: &T,
) -> Result<R, RequestFailure>
where
    T: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = client
        .post(url)
        .bearer_auth(api_key)
        .json(payload)
        .send()
        .await
        .map_err(RequestFailure::Request)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(%status, "chat request rejected");
        return Err(RequestFailure::Api { status, body });
    }

    response.json().await.map_err(RequestFailure::Request)
}
