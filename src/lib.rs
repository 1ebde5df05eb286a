// SPDX-License-Identifier: GPL-3.0-only

//! livecast - broadcast session manager
//!
//! This library acquires a camera and microphone through a degrading
//! constraint cascade, keeps an on-air session consistent while video and
//! audio are toggled independently, recovers once from under-provisioned
//! video, and releases every device handle on every exit path.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Capture device abstraction, constraint cascade, viewer sink
//! - [`session`]: The broadcast session state machine and its helpers
//! - [`directory`]: Directory of published streams and URL classification
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```no_run
//! use livecast::backends::capture::SimulatedDevice;
//! use livecast::session::{BroadcastSession, LiveMetadata, SessionOptions};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), livecast::errors::SessionError> {
//! let session = BroadcastSession::new(Arc::new(SimulatedDevice::default()), SessionOptions::default());
//! session.start_preview().await?;
//! session.go_live(LiveMetadata::new("Spring collection", "")).await?;
//! session.end();
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod directory;
pub mod errors;
pub mod session;

// Re-export commonly used types
pub use config::Config;
pub use errors::{AppError, AppResult, SessionError, SessionResult};
pub use session::{BroadcastSession, SessionOptions, SessionState};
