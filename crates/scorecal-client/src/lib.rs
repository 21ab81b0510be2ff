//! # scorecal-client
//!
//! Client for the remote text-scoring service.
//!
//! This crate provides the narrow contract the calibration layer consumes
//! ([`ScoringClient`]), a reqwest-backed implementation
//! ([`RemoteScoringClient`]), and a configurable in-process mock
//! ([`MockScoringClient`]) for testing without network access.

pub mod api_key;
pub mod http;
pub mod mock;
pub mod remote;
pub mod traits;

pub use api_key::ApiKey;
pub use http::HttpTransport;
pub use mock::{MockBehavior, MockScoringClient, QueryRecord};
pub use remote::RemoteScoringClient;
pub use traits::{
    CandidateScore, ClientConfig, ClientError, ClientResult, CostRecord, ExecutionMetadata,
    ScoreRequest, ScoreResponse, ScoredCandidate, ScoringClient, SelectOutput,
};
