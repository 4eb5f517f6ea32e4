pub mod ai;
pub mod app_state;
pub mod browser;
pub mod config;
pub mod errors;
pub mod extractor;
pub mod fetcher;
pub mod formatter;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod parse;
pub mod pipeline;
pub mod retry;
pub mod routes;
pub mod safety;
pub mod share_text;

pub use errors::{ErrorCategory, ExtractError};
pub use extractor::{AiEnhancedContent, ExtractedContent, ExtractionOptions, Platform};
pub use pipeline::{ExtractionOrchestrator, OrchestratorBuilder};
