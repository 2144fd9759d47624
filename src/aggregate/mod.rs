//! Turns flat node and channel lists into chart-ready summaries.
//!
//! Everything here is pure: inputs are borrowed, results are fresh values, and no
//! function depends on the order of its input beyond what `ranking` documents.

pub mod geo;
pub mod histogram;
pub mod ranking;
pub mod rollup;
pub mod stats;
