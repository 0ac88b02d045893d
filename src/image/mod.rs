//! Image data model: reference parsing, wire formats, legacy v1 layout

pub mod reference;
pub mod spec;
pub mod v1;

pub use reference::ImageReference;
pub use spec::{Descriptor, ImageConfig, Manifest, ManifestItem, ManifestList};
pub use v1::V1Image;
