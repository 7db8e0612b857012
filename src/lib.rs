//! Image Mirror Library
//!
//! Incremental mirroring of container images between registries: tag
//! listings from each registry kind are normalized into time-ordered tag
//! indexes, a decision engine picks the minimal set of tags to copy, and a
//! bounded worker pool drives the external copy tool across a catalog.

pub mod catalog;
pub mod cli;
pub mod error;
pub mod image;
pub mod logging;
pub mod registry;
pub mod sync;
pub mod transfer;

pub use error::{MirrorError, Result};
pub use logging::Logger;
