// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for capture devices and viewer output
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Session Layer                 │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                  │
//! │  ┌──────────────────┐   ┌───────────────┐   │
//! │  │     Capture      │   │  Viewer sink  │   │
//! │  │ (device + tiers) │   │   (opaque)    │   │
//! │  └──────────────────┘   └───────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`capture`]: Device-capture traits, constraint cascade, owned resources
//! - [`sink`]: Consumer of the on-air output

pub mod capture;
pub mod sink;
