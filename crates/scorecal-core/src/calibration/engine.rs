//! Calibrated selection engine.
//!
//! `CalibratedSelect` wraps a scoring client and corrects its scores for
//! the model's content-free prior: `fit` estimates the prior from neutral
//! inputs and derives an affine transform, `apply` runs a live query and
//! ranks candidates by the transformed scores.

use crate::calibration::model::{
    Calibrated, CalibratedOutput, CalibratedResponse, CalibrationMode, ContentFreeInputs,
};
use crate::calibration::transform;
use scorecal_client::{ClientError, CostRecord, ScoreRequest, ScoreResponse, ScoringClient};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors that can occur during calibration.
#[derive(Error, Debug)]
pub enum CalibrationError {
    /// The calibration mode string is not recognized.
    #[error("calibration mode `{0}` is not valid; use one of `diagonal_W` or `identity_W`")]
    InvalidMode(String),

    /// `fit` was called without any content-free input.
    #[error("at least one content-free input is required")]
    EmptyContentFreeInputs,

    /// `fit` was called with fewer than two candidates.
    #[error("at least two candidates are required, got {0}")]
    TooFewCandidates(usize),

    /// `fit` was called with a repeated candidate.
    #[error("candidate `{0}` appears more than once")]
    DuplicateCandidate(String),

    /// `apply` was called before any successful `fit`.
    #[error("calibration has not been initialized; call `fit` before applying")]
    NotFitted,

    /// The candidate set differs from the one used at fit time.
    #[error("calibration was initialized with candidates {fitted:?}; change the candidates or refit")]
    CandidateMismatch { fitted: Vec<String> },

    /// The conjunction differs from the one used at fit time.
    #[error("calibration was initialized with conjunction {fitted:?}; change the conjunction or refit")]
    ConjunctionMismatch { fitted: Option<String> },

    /// The scoring service answered without any output.
    #[error("scoring response contained no outputs")]
    MissingOutput,

    /// The scoring service answered with the wrong number of rankings.
    #[error("scoring response contained {got} rankings for {expected} candidates")]
    RankingCountMismatch { expected: usize, got: usize },

    /// The underlying scoring query failed; propagated verbatim, no retry.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Result type for calibration operations.
pub type CalibrationResult<T> = Result<T, CalibrationError>;

/// Calibration state produced by one successful `fit`.
#[derive(Debug, Clone)]
struct FittedCalibration {
    /// Correction matrix, N×N row-major.
    w: Vec<Vec<f64>>,
    /// Offset vector, length N.
    b: Vec<f64>,
    mode: CalibrationMode,
    candidates: Vec<String>,
    conjunction: Option<String>,
    content_free_inputs: Vec<String>,
    /// Accumulated cost of the fitting queries.
    cost: CostRecord,
}

/// Scoring engine with content-free calibration.
///
/// Owns one scoring client and at most one fitted transform. `fit` replaces
/// the whole calibration state; `apply` is read-only. The state is not
/// synchronized; callers serialize concurrent use.
pub struct CalibratedSelect<C> {
    client: C,
    state: Option<FittedCalibration>,
}

impl<C: ScoringClient> CalibratedSelect<C> {
    /// Creates an engine with no calibration state.
    pub fn new(client: C) -> Self {
        Self {
            client,
            state: None,
        }
    }

    /// Returns true once `fit` has succeeded.
    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// The underlying scoring client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fits the calibration transform from content-free inputs.
    ///
    /// Issues one scoring query per content-free input against `candidates`,
    /// averages the renormalized probability estimates into the prior
    /// `p_cf`, and derives the transform for `mode`. On success the new
    /// state replaces any previous one; on failure the previous state is
    /// left untouched.
    #[instrument(skip_all, fields(client = self.client.name(), mode = %mode))]
    pub async fn fit(
        &mut self,
        content_free_inputs: impl Into<ContentFreeInputs>,
        candidates: &[String],
        conjunction: Option<&str>,
        mode: CalibrationMode,
    ) -> CalibrationResult<()> {
        let inputs = content_free_inputs.into();
        if inputs.is_empty() {
            return Err(CalibrationError::EmptyContentFreeInputs);
        }
        validate_candidates(candidates)?;

        let n = candidates.len();
        let mut probability_rows: Vec<Vec<f64>> = Vec::with_capacity(inputs.len());
        let mut tokens_used = 0u64;
        let mut last_cost: Option<CostRecord> = None;

        for input in inputs.as_slice() {
            let mut request = ScoreRequest::new(input.as_str(), candidates.iter().cloned());
            request.conjunction = conjunction.map(str::to_string);

            let response = self.client.score(&request).await?;
            let output = response
                .outputs
                .into_iter()
                .next()
                .ok_or(CalibrationError::MissingOutput)?;
            if output.rankings.len() != n {
                return Err(CalibrationError::RankingCountMismatch {
                    expected: n,
                    got: output.rankings.len(),
                });
            }

            probability_rows.push(
                output
                    .rankings
                    .iter()
                    .map(|r| r.score.normalized_logprob.exp())
                    .collect(),
            );
            tokens_used += output.execution_metadata.cost.tokens_used;
            last_cost = Some(output.execution_metadata.cost);
        }

        let Some(mut cost) = last_cost else {
            return Err(CalibrationError::EmptyContentFreeInputs);
        };
        cost.tokens_used = tokens_used;
        cost.tokens_input = tokens_used;

        // Estimated prior of the model toward each candidate, independent
        // of reference content
        let p_cf = transform::renormalize(&transform::mean_rows(&probability_rows));

        let (w, b) = match mode {
            CalibrationMode::DiagonalW => {
                (transform::diagonal_inverse(&p_cf), vec![0.0; n])
            }
            CalibrationMode::IdentityW => {
                (transform::identity(n), p_cf.iter().map(|p| -p).collect())
            }
        };

        debug!(
            inputs = inputs.len(),
            candidates = n,
            tokens_used,
            "fitted calibration transform"
        );

        self.state = Some(FittedCalibration {
            w,
            b,
            mode,
            candidates: candidates.to_vec(),
            conjunction: conjunction.map(str::to_string),
            content_free_inputs: inputs.into_vec(),
            cost,
        });
        Ok(())
    }

    /// Scores `reference` against the fitted candidates and returns the
    /// calibrated decision.
    ///
    /// Preconditions, checked in order: the engine is fitted; `candidates`
    /// is set-equal to the fitted candidates; `conjunction` matches the
    /// fitted one exactly. The query itself always uses the fitted
    /// candidate order, so a reordered `candidates` argument yields the
    /// same scores keyed by the same candidate strings.
    #[instrument(skip_all, fields(client = self.client.name(), concat_best = concat_best))]
    pub async fn apply(
        &self,
        reference: &str,
        candidates: &[String],
        conjunction: Option<&str>,
        concat_best: bool,
    ) -> CalibrationResult<CalibratedResponse> {
        let fitted = match &self.state {
            Some(fitted) => fitted,
            None => return Err(CalibrationError::NotFitted),
        };

        if !same_set(candidates, &fitted.candidates) {
            return Err(CalibrationError::CandidateMismatch {
                fitted: fitted.candidates.clone(),
            });
        }
        if conjunction != fitted.conjunction.as_deref() {
            return Err(CalibrationError::ConjunctionMismatch {
                fitted: fitted.conjunction.clone(),
            });
        }

        let mut request = ScoreRequest::new(reference, fitted.candidates.iter().cloned());
        request.conjunction = fitted.conjunction.clone();
        request.concat_best = concat_best;

        let ScoreResponse {
            request_id,
            costs,
            outputs,
        } = self.client.score(&request).await?;
        let output = outputs
            .into_iter()
            .next()
            .ok_or(CalibrationError::MissingOutput)?;
        let n = fitted.candidates.len();
        if output.rankings.len() != n {
            return Err(CalibrationError::RankingCountMismatch {
                expected: n,
                got: output.rankings.len(),
            });
        }

        let probabilities: Vec<f64> = output
            .rankings
            .iter()
            .map(|r| r.score.normalized_logprob.exp())
            .collect();
        let p_uncal = transform::renormalize(&probabilities);

        // Calibrated scores are ranking-only values, not probabilities
        let scores_cal = transform::affine(&fitted.w, &p_uncal, &fitted.b);
        let best_idx = transform::argmax(&scores_cal);

        let best = if concat_best {
            match &fitted.conjunction {
                Some(conjunction) => {
                    format!("{} {} {}", reference, conjunction, fitted.candidates[best_idx])
                }
                None => format!("{} {}", reference, fitted.candidates[best_idx]),
            }
        } else {
            fitted.candidates[best_idx].clone()
        };

        let scores: HashMap<String, f64> =
            fitted.candidates.iter().cloned().zip(scores_cal).collect();

        debug!(request_id = %request_id, best = %best, "applied calibration transform");

        Ok(CalibratedResponse {
            request_id,
            costs,
            output: CalibratedOutput {
                output,
                calibrated: Calibrated {
                    best,
                    scores,
                    content_free_inputs: fitted.content_free_inputs.clone(),
                    calibration_mode: fitted.mode,
                    calibration_cost: fitted.cost.clone(),
                },
            },
        })
    }
}

/// Order-independent equality of two candidate lists.
fn same_set(a: &[String], b: &[String]) -> bool {
    let mut a_sorted: Vec<&String> = a.iter().collect();
    let mut b_sorted: Vec<&String> = b.iter().collect();
    a_sorted.sort();
    b_sorted.sort();
    a_sorted == b_sorted
}

fn validate_candidates(candidates: &[String]) -> CalibrationResult<()> {
    if candidates.len() < 2 {
        return Err(CalibrationError::TooFewCandidates(candidates.len()));
    }
    let mut sorted: Vec<&String> = candidates.iter().collect();
    sorted.sort();
    for pair in sorted.windows(2) {
        if pair[0] == pair[1] {
            return Err(CalibrationError::DuplicateCandidate(pair[0].clone()));
        }
    }
    Ok(())
}
