//! Mock scoring client for testing.
//!
//! Provides a configurable in-process stand-in for the remote scoring
//! service: preconfigured ranking stubs per reference, a deterministic
//! fallback for unstubbed inputs, failure injection, and a query history
//! for test verification. Service-side input validation (empty or oversized
//! text) is emulated so precondition paths can be exercised offline.

use crate::traits::{
    CandidateScore, ClientError, ClientResult, CostRecord, ExecutionMetadata, ScoreRequest,
    ScoreResponse, ScoredCandidate, ScoringClient, SelectOutput,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum input length accepted by the emulated service, in characters.
const MAX_INPUT_CHARS: usize = 8192;

/// Behavior configuration for failure injection.
#[derive(Debug, Clone, Default)]
pub enum MockBehavior {
    /// Return results normally.
    #[default]
    Normal,
    /// Always fail with the given error.
    AlwaysFail(ClientError),
    /// Fail with the given error after N successful calls.
    FailAfter { calls: u64, error: ClientError },
    /// Simulate latency before answering.
    WithLatency(Duration),
}

/// Record of one scoring query, for test verification.
#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub reference: String,
    pub candidates: Vec<String>,
    pub conjunction: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Mock scoring client.
///
/// Unstubbed (reference, candidate) pairs receive a deterministic
/// pseudo-score derived from a hash of both texts, always ≤ 0, so distinct
/// references produce distinct score profiles without any setup.
pub struct MockScoringClient {
    name: String,
    model: String,
    /// Stubbed normalized log-probabilities: reference -> [(candidate, score)].
    stubs: Arc<RwLock<HashMap<String, Vec<(String, f64)>>>>,
    behavior: Arc<RwLock<MockBehavior>>,
    call_count: AtomicU64,
    history: Arc<RwLock<Vec<QueryRecord>>>,
}

impl MockScoringClient {
    /// Creates a new mock scoring client.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            model: "mock".to_string(),
            stubs: Arc::new(RwLock::new(HashMap::new())),
            behavior: Arc::new(RwLock::new(MockBehavior::Normal)),
            call_count: AtomicU64::new(0),
            history: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Creates a mock reporting costs under the given model name.
    pub fn with_model(name: &str, model: &str) -> Self {
        let mut mock = Self::new(name);
        mock.model = model.to_string();
        mock
    }

    /// Stubs normalized log-probabilities for a reference.
    ///
    /// Stub values must be ≤ 0; candidates missing from the stub fall back
    /// to the deterministic pseudo-score.
    pub async fn stub_scores(&self, reference: &str, scores: &[(&str, f64)]) {
        debug_assert!(scores.iter().all(|(_, s)| *s <= 0.0));
        let mut stubs = self.stubs.write().await;
        stubs.insert(
            reference.to_string(),
            scores.iter().map(|(c, s)| (c.to_string(), *s)).collect(),
        );
    }

    /// Sets the behavior for failure injection.
    pub async fn set_behavior(&self, behavior: MockBehavior) {
        let mut b = self.behavior.write().await;
        *b = behavior;
    }

    /// Gets the query history for test verification.
    pub async fn query_history(&self) -> Vec<QueryRecord> {
        let history = self.history.read().await;
        history.clone()
    }

    /// Clears the query history.
    pub async fn clear_history(&self) {
        let mut history = self.history.write().await;
        history.clear();
    }

    /// Gets the current call count.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Records a query and applies the configured behavior.
    async fn record_and_check(&self, request: &ScoreRequest) -> ClientResult<()> {
        {
            let mut history = self.history.write().await;
            history.push(QueryRecord {
                reference: request.reference.clone(),
                candidates: request.candidates.clone(),
                conjunction: request.conjunction.clone(),
                timestamp: Utc::now(),
            });
        }

        let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;

        let behavior = self.behavior.read().await;
        match &*behavior {
            MockBehavior::Normal => Ok(()),
            MockBehavior::AlwaysFail(error) => Err(error.clone()),
            MockBehavior::FailAfter { calls, error } => {
                if count > *calls {
                    Err(error.clone())
                } else {
                    Ok(())
                }
            }
            MockBehavior::WithLatency(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(())
            }
        }
    }

    /// Emulates the service's input validation.
    fn validate(request: &ScoreRequest) -> ClientResult<()> {
        if request.reference.is_empty() {
            return Err(Self::rejection("reference must not be empty"));
        }
        if request.reference.len() > MAX_INPUT_CHARS {
            return Err(Self::rejection("reference exceeds the maximum input length"));
        }
        if request.candidates.len() < 2 {
            return Err(Self::rejection("at least two candidates are required"));
        }
        for candidate in &request.candidates {
            if candidate.is_empty() {
                return Err(Self::rejection("candidates must not be empty"));
            }
            if candidate.len() > MAX_INPUT_CHARS {
                return Err(Self::rejection("candidate exceeds the maximum input length"));
            }
        }
        Ok(())
    }

    fn rejection(message: &str) -> ClientError {
        ClientError::Request {
            status: 422,
            message: message.to_string(),
        }
    }

    async fn normalized_logprob(&self, reference: &str, candidate: &str) -> f64 {
        let stubs = self.stubs.read().await;
        if let Some(scores) = stubs.get(reference) {
            if let Some((_, score)) = scores.iter().find(|(c, _)| c == candidate) {
                return *score;
            }
        }
        pseudo_logprob(reference, candidate)
    }

    fn rank(candidate: &str, normalized_logprob: f64) -> ScoredCandidate {
        let tokens: Vec<&str> = candidate.split_whitespace().collect();
        let n_tokens = tokens.len().max(1);
        let token_logprobs = if tokens.is_empty() {
            vec![HashMap::from([(candidate.to_string(), normalized_logprob)])]
        } else {
            tokens
                .iter()
                .map(|t| HashMap::from([(t.to_string(), normalized_logprob)]))
                .collect()
        };

        ScoredCandidate {
            candidate: candidate.to_string(),
            score: CandidateScore {
                logprob: normalized_logprob * n_tokens as f64,
                normalized_logprob,
                token_logprobs: Some(token_logprobs),
            },
        }
    }

    fn cost(request: &ScoreRequest) -> CostRecord {
        let prompt_tokens = word_count(&request.reference)
            + request.conjunction.as_deref().map(word_count).unwrap_or(0);
        let tokens_input: u64 = request
            .candidates
            .iter()
            .map(|c| prompt_tokens + word_count(c))
            .sum();

        CostRecord {
            tokens_used: tokens_input,
            tokens_input,
            tokens_generated: 0,
            cost_type: "select".to_string(),
            batch_size: request.candidates.len() as u32,
        }
    }
}

fn word_count(text: &str) -> u64 {
    text.split_whitespace().count().max(1) as u64
}

fn pseudo_logprob(reference: &str, candidate: &str) -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    reference.hash(&mut hasher);
    candidate.hash(&mut hasher);
    let fraction = (hasher.finish() % 1_000) as f64 / 1_000.0;
    // Spread scores over [-3.0, -0.5] so they stay strictly negative
    -0.5 - 2.5 * fraction
}

#[async_trait]
impl ScoringClient for MockScoringClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score(&self, request: &ScoreRequest) -> ClientResult<ScoreResponse> {
        self.record_and_check(request).await?;
        Self::validate(request)?;

        let mut rankings = Vec::with_capacity(request.candidates.len());
        for candidate in &request.candidates {
            let score = self
                .normalized_logprob(&request.reference, candidate)
                .await;
            rankings.push(Self::rank(candidate, score));
        }

        let best = if request.concat_best {
            let best_idx = rankings
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| {
                    a.score
                        .normalized_logprob
                        .total_cmp(&b.score.normalized_logprob)
                })
                .map(|(i, _)| i)
                .unwrap_or(0);
            let choice = &rankings[best_idx].candidate;
            Some(match &request.conjunction {
                Some(conjunction) => {
                    format!("{} {} {}", request.reference, conjunction, choice)
                }
                None => format!("{} {}", request.reference, choice),
            })
        } else {
            None
        };

        let cost = Self::cost(request);
        let skill = request.skill.as_deref().unwrap_or("default");

        Ok(ScoreResponse {
            request_id: uuid::Uuid::new_v4().to_string(),
            costs: HashMap::from([(format!("{}@{}", self.model, skill), cost.clone())]),
            outputs: vec![SelectOutput {
                reference: request.reference.clone(),
                rankings,
                best,
                execution_metadata: ExecutionMetadata { cost },
            }],
        })
    }
}
