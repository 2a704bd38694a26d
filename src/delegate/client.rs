use async_trait::async_trait;
use serde::Serialize;
use tracing::instrument;

use super::{config::DelegatorClientConfig, entity::DelegateInfo, error::DelegateError};
use crate::intent::{RegisterMessage, SignedIntent};

/// Submits delegations to a remote delegator service.
#[async_trait]
pub trait DelegatorTransport: Send + Sync + 'static {
    async fn get_delegate_info(&self) -> Result<DelegateInfo, DelegateError>;

    async fn delegate(
        &self,
        intent: &SignedIntent<RegisterMessage>,
        forfeits: &[String],
    ) -> Result<(), DelegateError>;
}

#[derive(Debug, Serialize)]
struct EncodedIntent<'a> {
    proof: &'a str,
    message: String,
}

#[derive(Debug, Serialize)]
struct DelegateRequest<'a> {
    intent: EncodedIntent<'a>,
    forfeits: &'a [String],
}

#[derive(Clone, Debug)]
pub struct RestDelegatorClient {
    url: String,
    config: DelegatorClientConfig,
}

impl RestDelegatorClient {
    pub fn new(url: impl Into<String>, config: DelegatorClientConfig) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            config,
        }
    }

    fn retrying_client(&self) -> Result<reqwest_middleware::ClientWithMiddleware, DelegateError> {
        let min_retry_interval = std::time::Duration::from_secs(1);
        let max_retry_interval = std::time::Duration::from_secs(30);
        let retry_policy = reqwest_retry::policies::ExponentialBackoff::builder()
            .retry_bounds(min_retry_interval, max_retry_interval)
            .build_with_max_retries(self.config.number_of_retries);
        Ok(reqwest_middleware::ClientBuilder::new(
            reqwest::Client::builder()
                .timeout(self.config.timeout)
                .build()?,
        )
        .with(reqwest_retry::RetryTransientMiddleware::new_with_policy(
            retry_policy,
        ))
        .build())
    }
}

#[async_trait]
impl DelegatorTransport for RestDelegatorClient {
    #[instrument(name = "rest_delegator_client.get_delegate_info", skip(self), err)]
    async fn get_delegate_info(&self) -> Result<DelegateInfo, DelegateError> {
        let url = format!("{}/v1/delegator/info", self.url);
        let resp = self.retrying_client()?.get(&url).send().await?;
        ensure_success(resp)
            .await?
            .json::<DelegateInfo>()
            .await
            .map_err(DelegateError::CouldNotDecodeResponseBody)
    }

    #[instrument(
        name = "rest_delegator_client.delegate",
        skip(self, intent, forfeits),
        fields(n_forfeits = forfeits.len()),
        err
    )]
    async fn delegate(
        &self,
        intent: &SignedIntent<RegisterMessage>,
        forfeits: &[String],
    ) -> Result<(), DelegateError> {
        let request = DelegateRequest {
            intent: EncodedIntent {
                proof: &intent.proof,
                message: serde_json::to_string(&intent.message)?,
            },
            forfeits,
        };
        let client = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .build()?;
        let resp = client
            .post(format!("{}/v1/delegate", self.url))
            .json(&request)
            .send()
            .await?;
        ensure_success(resp).await?;
        Ok(())
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, DelegateError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(DelegateError::Rejected(if body.is_empty() {
        status.to_string()
    } else {
        body
    }))
}
