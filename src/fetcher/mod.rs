pub mod client;
pub mod decode;
pub mod errors;
pub mod extractor;
pub mod types;

pub use client::{FetchRequest, HttpFetcher, MAX_BODY_SIZE};
pub use errors::FetchError;
pub use extractor::FetchExtractor;
pub use types::{Charset, PageResponse};
