//! Conversation quality pipeline
//!
//! Per-turn post-processing: persistence, embeddings, contradiction
//! detection, loop detection and health scoring. Everything here is
//! best-effort — failures become non-critical events and never stall the
//! token stream.

pub mod contradiction;
pub mod embedding;
pub mod health;
pub mod loops;
pub mod pipeline;

pub use contradiction::{ContradictionDetector, Severity};
pub use embedding::{cosine_similarity, EmbeddingService};
pub use health::{HealthScore, HealthScorer, HealthStatus};
pub use loops::LoopDetector;
pub use pipeline::{QualityEvent, QualityPipeline, TurnRecord};
