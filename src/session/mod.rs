//! Analysis session state
//!
//! Tracks the three view states (home, loading, results) around one
//! inference round trip and enforces a single upload in flight.

mod analysis;

pub use analysis::{AnalysisSession, Predictor, ViewState};
