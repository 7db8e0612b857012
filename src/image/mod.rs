//! Image reference handling
//!
//! This module provides the [`ImageReference`] parsed from each catalog line and
//! the [`naming`] rules that map a source image onto a flat destination
//! namespace.
//!
//! # Examples
//!
//! ```
//! use image_mirror::image::{ImageReference, naming};
//!
//! let image: ImageReference = "gcr.io/knative-releases/knative.dev/eventing/cmd/webhook".parse().unwrap();
//! let dest = naming::destination_name(&image.repository(), "docker.io/gcmirrors", &image.short_name);
//! assert_eq!(dest, "eventing-webhook");
//! ```

pub mod naming;
pub mod reference;

pub use naming::destination_name;
pub use reference::{DestinationRoot, ImageReference};
