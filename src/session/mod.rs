// SPDX-License-Identifier: GPL-3.0-only

//! Broadcast session management
//!
//! # Architecture
//!
//! ```text
//!  operator intents          metadata reports
//!        │                          │
//!        ▼                          ▼
//! ┌───────────────────────────────────────────┐
//! │             BroadcastSession              │
//! │  ┌──────────────┐   ┌──────────────────┐  │
//! │  │ToggleCoord.  │   │RecoverySupervisor│  │
//! │  └──────────────┘   └──────────────────┘  │
//! │  ┌──────────────┐   ┌──────────────────┐  │
//! │  │   ChatLog    │   │ CaptureResource  │  │
//! │  └──────────────┘   └──────────────────┘  │
//! └─────────────────────┬─────────────────────┘
//!                       │ SessionEvent
//!                       ▼
//!                  presenters
//! ```
//!
//! # Modules
//!
//! - [`machine`]: The session state machine and its operations
//! - [`state`]: Lifecycle states and operator-facing value types
//! - [`toggle`]: One-in-flight-per-kind toggle serialization
//! - [`recovery`]: One-shot recovery policy
//! - [`chat`]: Append-only chat log
//! - [`events`]: Events published to presenters

pub mod chat;
pub mod events;
pub mod machine;
pub mod recovery;
pub mod state;
pub mod toggle;

pub use chat::{ChatKind, ChatLog, ChatMessage, ChatSnapshot};
pub use events::{Notice, SessionEvent, Severity};
pub use machine::{BroadcastSession, SessionOptions};
pub use recovery::{RecoveryDecision, RecoveryOutcome, RecoverySupervisor};
pub use state::{Enablement, FailureOrigin, FailureReason, LiveBroadcast, LiveMetadata, SessionState};
pub use toggle::{ToggleCoordinator, ToggleRequest};
