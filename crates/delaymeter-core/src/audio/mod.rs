//! Audio processing module
//!
//! This module contains the measurement pipeline, leaf-first:
//! - Fixed-capacity reference/target sample storage ([`ring`])
//! - Consistent extraction of the analysis window ([`snapshot`])
//! - Pre-emphasis and Hann tapering ([`condition`])
//! - Bounded-lag normalized cross-correlation ([`correlation`])
//! - Deterministic test noise for simulation and tests ([`signal`])

pub mod condition;
pub mod correlation;
pub mod ring;
pub mod signal;
pub mod snapshot;
