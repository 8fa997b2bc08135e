//! Clipforge-Common: Shared types, IDs, and time helpers.
//!
//! This crate provides functionality used by both the container layer and the
//! clip engine:
//!
//! - **Typed IDs**: [`ClipId`] identifies one clip instance in logs
//! - **Core Types**: [`TrackKind`] for the two media kinds a clip can expose
//! - **Time**: conversions between media timescale ticks and microseconds
//!
//! # Examples
//!
//! ```
//! use clipforge_common::{time, ClipId, TrackKind};
//!
//! let id = ClipId::new();
//! assert_ne!(id, ClipId::new());
//!
//! assert_eq!(TrackKind::Video.to_string(), "video");
//! assert_eq!(time::ticks_to_micros(12_288, 12_288), 1_000_000);
//! ```

pub mod ids;
pub mod time;
pub mod types;

pub use ids::*;
pub use types::*;
