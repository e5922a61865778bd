//! `tt-core`: foundational types for the `rust_tt` streamline tracker.
//!
//! This crate is a dependency of every other `tt-*` crate.  It has no `tt-*`
//! dependencies and few external ones (`rand`, `bitflags`, `thiserror`, plus
//! optional `serde`).
//!
//! # What lives here
//!
//! | Module          | Contents                                              |
//! |-----------------|-------------------------------------------------------|
//! | [`ids`]         | `StreamlineId`, `SeedId`                              |
//! | [`geo`]         | `Point3`, `Affine`                                    |
//! | [`flags`]       | `StoppingFlags` bit set                               |
//! | [`config`]      | `TrackingConfig`, `SeedSelection`                     |
//! | [`rng`]         | `TrackRng` (per-streamline / per-candidate streams)   |
//! | [`error`]       | `CoreError`, `CoreResult`                             |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |

pub mod config;
pub mod error;
pub mod flags;
pub mod geo;
pub mod ids;
pub mod rng;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{SeedSelection, TrackingConfig};
pub use error::{CoreError, CoreResult};
pub use flags::StoppingFlags;
pub use geo::{Affine, Point3};
pub use ids::{SeedId, StreamlineId};
pub use rng::TrackRng;
