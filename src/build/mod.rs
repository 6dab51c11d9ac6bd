//! Disc image authoring.

pub mod gc;

pub use gc::{BuildCallback, DiscBuilder, DiscOverrides, DiscWriter, FileInfo};
