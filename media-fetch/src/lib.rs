//! media-fetch library crate.
//!
//! Resolves a media identifier, fetches its best video and audio streams in
//! parallel, merges them with an external muxer and streams the result to
//! the client, reclaiming every scratch file afterwards.

pub mod api;
pub mod config;
pub mod disk;
pub mod downloader;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod utils;

pub use error::{Error, Result};
