//! Remote scoring client over HTTP.
//!
//! Issues `select` queries against the scoring service's REST API. All
//! payload construction and header handling lives here; score math belongs
//! to the calibration layer.

use crate::http::HttpTransport;
use crate::traits::{
    ClientConfig, ClientError, ClientResult, ScoreRequest, ScoreResponse, ScoringClient,
};
use async_trait::async_trait;
use tracing::{debug, info, instrument};

const SELECT_ENDPOINT: &str = "select";

/// Scoring client backed by the remote service.
pub struct RemoteScoringClient {
    transport: HttpTransport,
}

impl RemoteScoringClient {
    /// Creates a remote client from configuration.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        info!(
            name = %config.name,
            base_url = %config.base_url,
            model = %config.model,
            "scoring client initialized"
        );
        let transport = HttpTransport::new(config)?;
        Ok(Self { transport })
    }

    /// Creates a remote client configured from the environment.
    ///
    /// See [`ClientConfig::from_env`] for the variables read.
    pub fn from_env(model: impl Into<String>) -> ClientResult<Self> {
        Self::new(ClientConfig::from_env(model)?)
    }

    /// Gets the client configuration.
    pub fn config(&self) -> &ClientConfig {
        self.transport.config()
    }
}

#[async_trait]
impl ScoringClient for RemoteScoringClient {
    fn name(&self) -> &str {
        &self.transport.config().name
    }

    #[instrument(skip(self, request), fields(candidates = request.candidates.len()))]
    async fn score(&self, request: &ScoreRequest) -> ClientResult<ScoreResponse> {
        let response: ScoreResponse = self.transport.post_json(SELECT_ENDPOINT, request).await?;

        if response.outputs.is_empty() {
            return Err(ClientError::InvalidResponse(
                "scoring response contained no outputs".to_string(),
            ));
        }

        debug!(
            request_id = %response.request_id,
            rankings = response.outputs[0].rankings.len(),
            "scoring request completed"
        );
        Ok(response)
    }
}
