//! Calibration data models.
//!
//! Defines the calibration mode tag, the content-free input collection, and
//! the calibrated result types attached to scoring outputs.

use super::engine::CalibrationError;
use scorecal_client::{CostRecord, SelectOutput};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// How the correction transform is built from the content-free prior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationMode {
    /// Multiplicative correction: rescale each candidate's probability by
    /// the inverse of its content-free prior.
    #[serde(rename = "diagonal_W")]
    DiagonalW,
    /// Additive correction: subtract the content-free prior from each
    /// candidate's probability.
    #[serde(rename = "identity_W")]
    IdentityW,
}

impl fmt::Display for CalibrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DiagonalW => f.write_str("diagonal_W"),
            Self::IdentityW => f.write_str("identity_W"),
        }
    }
}

impl FromStr for CalibrationMode {
    type Err = CalibrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "diagonal_W" => Ok(Self::DiagonalW),
            "identity_W" => Ok(Self::IdentityW),
            other => Err(CalibrationError::InvalidMode(other.to_string())),
        }
    }
}

/// Neutral reference inputs used to estimate the model's prior bias.
///
/// Content-free inputs share the template of real references but carry no
/// semantic content. A single string is accepted wherever a sequence is,
/// and normalizes to a one-element collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFreeInputs(Vec<String>);

impl ContentFreeInputs {
    /// Returns true if no inputs are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of content-free inputs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The inputs, in order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Consumes the collection, returning the inputs.
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for ContentFreeInputs {
    fn from(input: &str) -> Self {
        Self(vec![input.to_string()])
    }
}

impl From<String> for ContentFreeInputs {
    fn from(input: String) -> Self {
        Self(vec![input])
    }
}

impl From<Vec<String>> for ContentFreeInputs {
    fn from(inputs: Vec<String>) -> Self {
        Self(inputs)
    }
}

impl From<Vec<&str>> for ContentFreeInputs {
    fn from(inputs: Vec<&str>) -> Self {
        Self(inputs.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for ContentFreeInputs {
    fn from(inputs: &[&str]) -> Self {
        Self(inputs.iter().map(|s| s.to_string()).collect())
    }
}

/// Calibrated decision attached to a scoring output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calibrated {
    /// The calibrated best choice. With `concat_best`, the reference,
    /// conjunction, and best candidate joined; the bare candidate otherwise.
    pub best: String,
    /// Calibrated score per candidate. Ranking-only values: they are not a
    /// probability distribution and can be negative or exceed 1.
    pub scores: HashMap<String, f64>,
    /// The content-free inputs the transform was fitted on, verbatim.
    pub content_free_inputs: Vec<String>,
    /// The calibration mode used.
    pub calibration_mode: CalibrationMode,
    /// Accumulated cost of the fitting queries.
    pub calibration_cost: CostRecord,
}

/// A scoring output together with its calibrated decision.
///
/// Serializes with the uncalibrated fields untouched and the calibration
/// record under a `calibrated` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibratedOutput {
    /// The uncalibrated scoring output, as returned by the client.
    #[serde(flatten)]
    pub output: SelectOutput,
    /// The calibrated decision.
    pub calibrated: Calibrated,
}

/// Response of one calibrated scoring query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibratedResponse {
    /// ID string for the live scoring request.
    pub request_id: String,
    /// Costs of the live scoring request, keyed by `model@skill`.
    pub costs: HashMap<String, CostRecord>,
    /// The calibrated output.
    pub output: CalibratedOutput,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!(
            "diagonal_W".parse::<CalibrationMode>().unwrap(),
            CalibrationMode::DiagonalW
        );
        assert_eq!(
            "identity_W".parse::<CalibrationMode>().unwrap(),
            CalibrationMode::IdentityW
        );
    }

    #[test]
    fn test_invalid_mode_names_offending_value() {
        let err = "something".parse::<CalibrationMode>().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("something"));
        assert!(message.contains("diagonal_W"));
    }

    #[test]
    fn test_mode_serde_names() {
        assert_eq!(
            serde_json::to_string(&CalibrationMode::DiagonalW).unwrap(),
            "\"diagonal_W\""
        );
        assert_eq!(
            serde_json::from_str::<CalibrationMode>("\"identity_W\"").unwrap(),
            CalibrationMode::IdentityW
        );
    }

    #[test]
    fn test_single_input_normalizes_to_one_element() {
        let inputs: ContentFreeInputs = "Review: \"\" ".into();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs.as_slice()[0], "Review: \"\" ");
    }

    #[test]
    fn test_inputs_from_vec() {
        let inputs: ContentFreeInputs = vec!["a", "b"].into();
        assert_eq!(inputs.len(), 2);
        assert!(!inputs.is_empty());
    }
}
