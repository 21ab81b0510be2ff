//! Content-free calibration for candidate scoring.
//!
//! A language model prefers some surface forms over others regardless of
//! content, which biases raw likelihood scores. This module estimates that
//! prior from content-free inputs (neutral texts sharing the template of
//! real references) and corrects live scores with an affine transform.
//!
//! ## Key components
//!
//! - [`CalibratedSelect`]: the engine; `fit` once, `apply` many times
//! - [`CalibrationMode`]: multiplicative (`diagonal_W`) or additive
//!   (`identity_W`) correction
//! - [`Calibrated`]: the calibrated decision attached to a scoring output
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scorecal_client::RemoteScoringClient;
//! use scorecal_core::{CalibratedSelect, CalibrationMode};
//!
//! let client = RemoteScoringClient::from_env("aldebaran-en")?;
//! let mut engine = CalibratedSelect::new(client);
//!
//! let candidates = vec!["negative".to_string(), "positive".to_string()];
//! engine
//!     .fit(
//!         vec!["Review: \"\" ", "Review: \" \" "],
//!         &candidates,
//!         Some("This review is"),
//!         CalibrationMode::DiagonalW,
//!     )
//!     .await?;
//!
//! let response = engine
//!     .apply(
//!         "Review: \"A dull, flavorless film.\"\n",
//!         &candidates,
//!         Some("This review is"),
//!         false,
//!     )
//!     .await?;
//! println!("best: {}", response.output.calibrated.best);
//! ```

mod engine;
mod model;
mod transform;

pub use engine::{CalibratedSelect, CalibrationError, CalibrationResult};
pub use model::{
    Calibrated, CalibratedOutput, CalibratedResponse, CalibrationMode, ContentFreeInputs,
};
