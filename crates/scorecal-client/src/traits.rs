//! Scoring client contract for the remote text-scoring service.
//!
//! This module defines the narrow interface the calibration layer consumes:
//! the [`ScoringClient`] trait, the request and response types of the
//! `select` scoring query, and the client error taxonomy. Implementations
//! live in [`crate::remote`] (reqwest transport) and [`crate::mock`]
//! (in-process test double).

use crate::api_key::ApiKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur in a scoring client.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// Client construction or configuration problem.
    #[error("configuration error: {0}")]
    Config(String),

    /// The connection to the scoring service could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The request exceeded the configured timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The scoring service reported a non-success status.
    ///
    /// Service-side input validation failures (empty text, text over the
    /// service's length limit) surface here verbatim; the client does not
    /// pre-validate locally.
    #[error("request failed with status {status}: {message}")]
    Request { status: u16, message: String },

    /// The response body could not be parsed into the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for scoring client operations.
pub type ClientResult<T> = Result<T, ClientError>;

fn default_api_key_header() -> String {
    "X-API-KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Configuration for a scoring client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Client name/identifier, used in logs.
    pub name: String,
    /// Base URL of the scoring service.
    pub base_url: String,
    /// Model used as the scoring engine, sent in the `X-Model` header.
    pub model: String,
    /// API key (zeroized on drop).
    pub api_key: ApiKey,
    /// Header name carrying the API key.
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Additional headers to include on every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl ClientConfig {
    /// Builds a configuration from the environment.
    ///
    /// Reads the API key from `SCORECAL_API_KEY` and the service base URL
    /// from `SCORECAL_BASE_URL`; both are required.
    pub fn from_env(model: impl Into<String>) -> ClientResult<Self> {
        let api_key = std::env::var("SCORECAL_API_KEY").map_err(|_| {
            ClientError::Config(
                "no API key was detected; set SCORECAL_API_KEY in the environment".to_string(),
            )
        })?;
        let base_url = std::env::var("SCORECAL_BASE_URL").map_err(|_| {
            ClientError::Config(
                "no service URL was detected; set SCORECAL_BASE_URL in the environment".to_string(),
            )
        })?;

        Ok(Self {
            name: "scorecal".to_string(),
            base_url,
            model: model.into(),
            api_key: ApiKey::new(api_key),
            api_key_header: default_api_key_header(),
            timeout_secs: default_timeout_secs(),
            headers: HashMap::new(),
        })
    }
}

/// A scoring query against the service's `select` endpoint.
///
/// The service builds one prompt per candidate with the structure
/// `reference + conjunction + candidate` and returns a log-likelihood
/// score for each.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRequest {
    /// Reference input to compute likelihood against.
    pub reference: String,
    /// Candidates compared to the reference and ranked by likelihood.
    pub candidates: Vec<String>,
    /// Scores candidate-given-reference instead of reference-given-candidate.
    /// Useful when candidates have very different lengths.
    pub evaluate_reference: bool,
    /// Expression linking `reference` and `candidates` in the prompt.
    pub conjunction: Option<String>,
    /// Conditions the model to perform a certain task.
    pub skill: Option<String>,
    /// Asks the service to include a `best` field with the selected choice.
    pub concat_best: bool,
}

impl ScoreRequest {
    /// Creates a scoring query for `reference` against `candidates`.
    pub fn new<R, I, S>(reference: R, candidates: I) -> Self
    where
        R: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reference: reference.into(),
            candidates: candidates.into_iter().map(Into::into).collect(),
            evaluate_reference: false,
            conjunction: None,
            skill: None,
            concat_best: false,
        }
    }

    /// Sets the conjunction linking reference and candidates.
    pub fn with_conjunction(mut self, conjunction: impl Into<String>) -> Self {
        self.conjunction = Some(conjunction.into());
        self
    }

    /// Sets the skill conditioning the model.
    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skill = Some(skill.into());
        self
    }

    /// Requests the `best` field in the response.
    pub fn with_concat_best(mut self, concat_best: bool) -> Self {
        self.concat_best = concat_best;
        self
    }
}

/// Log-likelihood scores for a single candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    /// Total log-likelihood of the candidate.
    pub logprob: f64,
    /// Log-likelihood divided by token count, comparable across candidates
    /// of different lengths.
    pub normalized_logprob: f64,
    /// Per-token log-likelihoods, in token order, when the service returns
    /// them.
    pub token_logprobs: Option<Vec<HashMap<String, f64>>>,
}

impl CandidateScore {
    /// Number of tokens in the candidate, when per-token scores are present.
    pub fn token_count(&self) -> Option<usize> {
        self.token_logprobs.as_ref().map(Vec::len)
    }
}

/// Per-candidate result of one scoring query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    /// The candidate text, as submitted.
    pub candidate: String,
    /// The candidate's scores.
    pub score: CandidateScore,
}

/// Token accounting for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    /// Total tokens consumed by the query.
    pub tokens_used: u64,
    /// Tokens in the input.
    pub tokens_input: u64,
    /// Tokens generated by the model.
    pub tokens_generated: u64,
    /// Kind of operation billed.
    pub cost_type: String,
    /// Number of prompts scored in the query.
    pub batch_size: u32,
}

/// Execution metadata attached to a scored output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    /// Cost of executing the query.
    pub cost: CostRecord,
}

/// Ranked result for one reference.
///
/// Rankings are returned in the same order as the query's candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectOutput {
    /// The reference text, echoed back.
    pub reference: String,
    /// Per-candidate scores, in query candidate order.
    pub rankings: Vec<ScoredCandidate>,
    /// The service's uncalibrated best choice, present when the query set
    /// `concat_best`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best: Option<String>,
    /// Execution metadata for this output.
    pub execution_metadata: ExecutionMetadata,
}

/// Response to one scoring query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResponse {
    /// ID string for the request.
    pub request_id: String,
    /// Costs keyed by `model@skill`.
    pub costs: HashMap<String, CostRecord>,
    /// One output per reference; `select` queries carry a single reference.
    pub outputs: Vec<SelectOutput>,
}

/// Narrow contract to the remote scoring service.
///
/// One `score` call performs one query; a failed call is a single reported
/// failure, with no retries.
#[async_trait]
pub trait ScoringClient: Send + Sync {
    /// Identifier used in logs and cost reporting.
    fn name(&self) -> &str;

    /// Issues one scoring query.
    async fn score(&self, request: &ScoreRequest) -> ClientResult<ScoreResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE_FIXTURE: &str = r#"{
        "request_id": "0f8a1c2e-53a7-4c2b-9f3d-0f4b8b0a1d2c",
        "costs": {
            "aldebaran-en@default": {
                "tokens_used": 18,
                "tokens_input": 18,
                "tokens_generated": 0,
                "cost_type": "select",
                "batch_size": 2
            }
        },
        "outputs": [
            {
                "reference": "Review: \"A dull, flavorless film.\"\n",
                "rankings": [
                    {
                        "candidate": "negative",
                        "score": {
                            "logprob": -3.2,
                            "normalized_logprob": -1.6,
                            "token_logprobs": [{"neg": -1.5}, {"ative": -1.7}]
                        }
                    },
                    {
                        "candidate": "positive",
                        "score": {
                            "logprob": -2.4,
                            "normalized_logprob": -1.2
                        }
                    }
                ],
                "execution_metadata": {
                    "cost": {
                        "tokens_used": 18,
                        "tokens_input": 18,
                        "tokens_generated": 0,
                        "cost_type": "select",
                        "batch_size": 2
                    }
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_score_response() {
        let response: ScoreResponse = serde_json::from_str(RESPONSE_FIXTURE).unwrap();

        assert_eq!(response.outputs.len(), 1);
        let output = &response.outputs[0];
        assert_eq!(output.rankings.len(), 2);
        assert_eq!(output.rankings[0].candidate, "negative");
        assert_eq!(output.rankings[0].score.logprob, -3.2);
        assert_eq!(output.rankings[0].score.token_count(), Some(2));
        assert_eq!(output.rankings[1].score.token_count(), None);
        assert!(output.best.is_none());
        assert_eq!(output.execution_metadata.cost.batch_size, 2);
        assert_eq!(response.costs["aldebaran-en@default"].tokens_used, 18);
    }

    #[test]
    fn test_score_request_serialization() {
        let request = ScoreRequest::new("Review:", vec!["negative", "positive"])
            .with_conjunction("This review is");

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["reference"], "Review:");
        assert_eq!(value["candidates"][1], "positive");
        assert_eq!(value["conjunction"], "This review is");
        // Absent options serialize as explicit nulls, as the service expects
        assert!(value["skill"].is_null());
        assert_eq!(value["evaluate_reference"], false);
        assert_eq!(value["concat_best"], false);
    }

    #[test]
    fn test_client_config_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{
                "name": "test",
                "base_url": "https://scoring.example.com/v1",
                "model": "aldebaran-en",
                "api_key": "test-key"
            }"#,
        )
        .unwrap();

        assert_eq!(config.api_key_header, "X-API-KEY");
        assert_eq!(config.timeout_secs, 30);
        assert!(config.headers.is_empty());
    }

    #[test]
    fn test_config_from_env() {
        std::env::set_var("SCORECAL_API_KEY", "env-key");
        std::env::set_var("SCORECAL_BASE_URL", "https://scoring.example.com/v1");

        let config = ClientConfig::from_env("aldebaran-en").unwrap();
        assert_eq!(config.api_key.expose_secret(), "env-key");
        assert_eq!(config.base_url, "https://scoring.example.com/v1");
        assert_eq!(config.model, "aldebaran-en");

        std::env::remove_var("SCORECAL_API_KEY");
        let err = ClientConfig::from_env("aldebaran-en").unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
        std::env::remove_var("SCORECAL_BASE_URL");
    }
}
