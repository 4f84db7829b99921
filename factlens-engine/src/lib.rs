//! Extraction orchestration: input validation, the render/probe/extract
//! pipeline, request-scoped cancellation, and the analysis worker pool.

pub mod analysis;
pub mod orchestrator;
pub mod result;

pub use analysis::{AnalysisPool, AnalysisRequest, AnalysisService, HttpAnalysisService};
pub use orchestrator::ExtractionOrchestrator;
pub use result::ExtractionResult;
