//! # scorecal-core
//!
//! Content-free calibration engine for candidate scoring.
//!
//! This crate fits a linear correction transform from content-free
//! probability estimates and applies it to live scoring results, producing
//! calibrated per-candidate scores and a calibrated best-choice decision.
//! Network access goes through the [`scorecal_client::ScoringClient`]
//! contract, so any transport (or a mock) can back the engine.

pub mod calibration;

pub use calibration::{
    Calibrated, CalibratedOutput, CalibratedResponse, CalibratedSelect, CalibrationError,
    CalibrationMode, CalibrationResult, ContentFreeInputs,
};
