//! Feature service adapter.
//!
//! Talks JSON over HTTP to a service that owns the language-model prompts:
//! `POST {base}/v1/features/propose`, `/score` and `/bootstrap`. Works with
//! any server implementing those three endpoints.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Entity, EvidenceEntity, Feature, ServiceConfig};
use crate::domain::ports::{EntityScorer, FeatureBootstrapper, FeatureProposer};

/// Configuration for the HTTP feature service.
#[derive(Debug, Clone)]
pub struct FeatureServiceConfig {
    /// Service base URL, without a trailing slash.
    pub base_url: String,
    /// Bearer token. Falls back to `REFLEXION_API_KEY` when unset.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl FeatureServiceConfig {
    fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("REFLEXION_API_KEY").ok())
            .filter(|key| !key.is_empty())
    }
}

impl From<&ServiceConfig> for FeatureServiceConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

#[derive(Debug, Serialize)]
struct ProposeRequest<'a> {
    active_features: &'a [Feature],
    worst_under_predicted: &'a [EvidenceEntity],
    worst_over_predicted: &'a [EvidenceEntity],
    rejected_features: &'a [Feature],
}

#[derive(Debug, Deserialize)]
struct ProposeResponse {
    feature: Feature,
}

#[derive(Debug, Serialize)]
struct ScoreEntity<'a> {
    id: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ScoreRequest<'a> {
    feature: &'a Feature,
    entities: Vec<ScoreEntity<'a>>,
}

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    scores: HashMap<String, f64>,
}

#[derive(Debug, Serialize)]
struct BootstrapRequest<'a> {
    entities: &'a [Entity],
    count: usize,
}

#[derive(Debug, Deserialize)]
struct BootstrapResponse {
    features: Vec<Feature>,
}

/// Reqwest-backed client for the feature service.
pub struct HttpFeatureService {
    config: FeatureServiceConfig,
    client: Client,
}

impl HttpFeatureService {
    pub fn new(config: FeatureServiceConfig) -> DomainResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DomainError::InvalidState(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn from_service_config(config: &ServiceConfig) -> DomainResult<Self> {
        Self::new(FeatureServiceConfig::from(config))
    }

    /// POST `body` to `path`, mapping every failure through `to_error`.
    async fn post<B, T>(&self, path: &str, body: &B, to_error: fn(String) -> DomainError) -> DomainResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}{path}", self.config.base_url);
        let mut request = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(body);
        if let Some(key) = self.config.api_key() {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| to_error(format!("request to {url} failed: {e}")))?;
        let response = check_status(response, to_error).await?;

        response
            .json()
            .await
            .map_err(|e| to_error(format!("malformed response from {url}: {e}")))
    }
}

async fn check_status(response: Response, to_error: fn(String) -> DomainError) -> DomainResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unable to read response body".to_string());
    Err(to_error(format!("feature service returned {status}: {body}")))
}

#[async_trait]
impl FeatureProposer for HttpFeatureService {
    async fn propose_feature(
        &self,
        active: &[Feature],
        worst_under: &[EvidenceEntity],
        worst_over: &[EvidenceEntity],
        rejected: &[Feature],
    ) -> DomainResult<Feature> {
        let request = ProposeRequest {
            active_features: active,
            worst_under_predicted: worst_under,
            worst_over_predicted: worst_over,
            rejected_features: rejected,
        };
        let response: ProposeResponse = self
            .post("/v1/features/propose", &request, DomainError::ProposalFailed)
            .await?;

        debug!(feature = %response.feature.name, "feature proposed");
        Ok(response.feature)
    }
}

#[async_trait]
impl EntityScorer for HttpFeatureService {
    async fn score_entities(&self, entities: &[Entity], feature: &Feature) -> DomainResult<HashMap<String, f64>> {
        if entities.is_empty() {
            return Ok(HashMap::new());
        }

        let request = ScoreRequest {
            feature,
            entities: entities
                .iter()
                .map(|e| ScoreEntity {
                    id: &e.id,
                    content: &e.content,
                })
                .collect(),
        };
        let response: ScoreResponse = self
            .post("/v1/features/score", &request, DomainError::ScoringFailed)
            .await?;

        debug!(feature = %feature.name, requested = entities.len(), returned = response.scores.len(), "batch scored");
        Ok(response.scores)
    }
}

#[async_trait]
impl FeatureBootstrapper for HttpFeatureService {
    async fn bootstrap_features(&self, entities: &[Entity], count: usize) -> DomainResult<Vec<Feature>> {
        let request = BootstrapRequest { entities, count };
        let response: BootstrapResponse = self
            .post("/v1/features/bootstrap", &request, DomainError::ProposalFailed)
            .await?;

        if response.features.len() != count {
            return Err(DomainError::ProposalFailed(format!(
                "bootstrap returned {} features, expected {count}",
                response.features.len()
            )));
        }
        Ok(response.features)
    }
}
