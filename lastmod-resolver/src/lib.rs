//! Per-URL date resolution and the batch driver on top of it.
//!
//! ```no_run
//! # async fn demo() -> Result<(), lastmod_common::LastmodError> {
//! use lastmod_config::ResolverSettings;
//! use lastmod_resolver::BatchResolver;
//!
//! let batch = BatchResolver::from_settings(&ResolverSettings::default())?;
//! let results = batch
//!     .resolve_all(&["https://example.com/a", "https://example.org/b"])
//!     .await;
//! for r in results {
//!     println!("{} {:?} {:?}", r.url, r.resolved_date, r.error);
//! }
//! # Ok(()) }
//! ```
pub mod batch;
pub mod pipeline;
pub mod throttle;

pub use batch::BatchResolver;
pub use pipeline::DateResolutionPipeline;
pub use throttle::HostThrottle;
