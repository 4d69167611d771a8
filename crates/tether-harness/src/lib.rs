#![forbid(unsafe_code)]

//! Test harness and reference fixtures for Tether.
//!
//! - [`fixtures`]: the string-builder store, action builders, and a
//!   [`SpyStore`](fixtures::SpyStore) that counts subscription traffic.
//! - [`recording`]: views that record every props object they render, and
//!   a [`Nest`](recording::Nest) view that mounts a connected child.

pub mod fixtures;
pub mod recording;

pub use fixtures::{SpyStore, append, string_builder, string_options};
pub use recording::{Nest, RecordingView, RenderLog, value_to_json};
