// ABOUTME: Main library entry point for the urlist link preview pipeline.
// ABOUTME: Re-exports the public API: MetadataService, ServiceBuilder, MetadataResult, Diagnostics, PreviewError.

//! urlist-preview - title, description and image lookup for curated links.
//!
//! Pages are fetched with browser-like headers, bounded redirects, a per-attempt
//! timeout and exponential-backoff retries. Metadata is read from Open Graph,
//! Twitter Card and plain HTML tags. Whenever a field cannot be extracted (or the
//! page cannot be fetched at all) values derived from the URL are used instead,
//! so a lookup always produces a result.
//!
//! # Example
//!
//! ```no_run
//! use urlist_preview::{MetadataService, PreviewError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PreviewError> {
//!     let service = MetadataService::builder().build()?;
//!     let meta = service.get_metadata("https://example.com/article").await;
//!     println!("{} - {}", meta.title, meta.description);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod extract;
pub mod fallback;
pub mod fetch;
pub mod options;
pub mod result;
pub mod service;

pub use crate::error::{ErrorCode, PreviewError};
pub use crate::extract::{MetadataExtractor, PartialMetadata};
pub use crate::fetch::{FailureReason, FetchFailure, FetchGuard, FetchOutcome, FetchedPage};
pub use crate::options::{MetadataRequest, Options, ServiceBuilder};
pub use crate::result::{Diagnostics, MetadataResult, ResolutionPath};
pub use crate::service::{normalize_url, MetadataService};
