//! Transformation and scoring provider adapters.

pub mod http;
pub mod scripted;

pub use http::{HttpScoreProvider, HttpTransformProvider};
pub use scripted::{ScriptedScorer, ScriptedTransformer};
