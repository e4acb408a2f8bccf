//! # collage-client
//!
//! Async Rust client for a collage generation service: the backend does
//! all layout and compositing work, this crate handles the client side of
//! the job lifecycle.
//!
//! Provides upload staging with count/size/type validation, multipart job
//! submission, a cancellable status poll loop with stale-response
//! protection, artifact download, and pass-through access to the
//! service's grid-optimization and overlap-analysis advisors.
//!
//! ## Quick Start
//!
//! ```no_run
//! use collage_client::{
//!     CollageClient, CollageConfig, CollageSession, LayoutStyle, UploadLimits,
//! };
//!
//! # async fn example() -> collage_client::Result<()> {
//! let client = CollageClient::new("http://127.0.0.1:8000");
//! let mut session = CollageSession::new(client, UploadLimits::default());
//!
//! // Stage at least two images
//! session.uploads_mut().add_from_path("beach.jpg")?;
//! session.uploads_mut().add_from_path("sunset.png")?;
//!
//! // Submit and poll until done
//! let config = CollageConfig::new().layout(LayoutStyle::Grid).spacing(8);
//! session.submit(&config).await?;
//! let outcome = session
//!     .watch(|s| println!("{}: {}%", s.status.as_str(), s.progress))
//!     .await?;
//!
//! if outcome.is_completed() {
//!     let artifact = session.download().await?;
//!     std::fs::write(&artifact.filename, &artifact.bytes).unwrap();
//! }
//! # Ok(())
//! # }
//! ```

pub mod advisor;
pub mod client;
pub mod config;
pub mod error;
pub mod poller;
pub mod session;
pub mod types;
pub mod upload;

pub use advisor::{apply_remove_option, check_add_option, AdvisorError, GridRequest};
pub use client::CollageClient;
pub use config::{CanvasSize, CollageConfig, LayoutStyle, OutputFormat, SizeUnit};
pub use error::{CollageError, Result};
pub use poller::{JobTracker, PollConfig};
pub use session::CollageSession;
pub use types::{
    Artifact, CanvasInfo, CreateResponse, CurrentGrid, GridAction, GridOptimization,
    GridOption, JobSnapshot, JobStatus, OverlapAnalysis, OverlapPair, PollOutcome,
    SuggestedRemoval,
};
pub use upload::{
    PreviewHandle, UploadError, UploadLimits, UploadSet, UploadedFile, ACCEPTED_MIME_TYPES,
};
