#![warn(missing_docs)]
//! Library for traversing & reading GameCube and Wii disc images, and for
//! authoring new GameCube disc images from a directory tree.
//!
//! Wii partition data is transparently decrypted and verified against the
//! partition hash tree while reading. Authoring is supported for GameCube
//! images only.
//!
//! # Examples
//!
//! Opening a disc image and reading a file from the data partition:
//!
//! ```no_run
//! use std::io::Read;
//!
//! use gcdisc::read::DiscReader;
//!
//! fn main() -> gcdisc::Result<()> {
//!     let disc = DiscReader::new("path/to/game.iso")?;
//!     let partition = disc.data_partition()?;
//!     let mut stream = partition.open_file("opening.bnr")?;
//!     let mut buf = Vec::new();
//!     stream.read_to_end(&mut buf).expect("Failed to read file");
//!     Ok(())
//! }
//! ```
//!
//! Building a GameCube disc image from a directory:
//!
//! ```no_run
//! use gcdisc::build::{DiscBuilder, DiscOverrides};
//!
//! fn main() -> gcdisc::Result<()> {
//!     let mut overrides = DiscOverrides::default();
//!     overrides.game_id = Some(*b"GAME01");
//!     overrides.game_title = Some("Example".to_string());
//!     let builder = DiscBuilder::new(overrides);
//!     builder.build_from_directory(
//!         "path/to/root".as_ref(),
//!         "out.iso".as_ref(),
//!         &mut |_written: u64, _name: &str, _len: u64| true,
//!     )
//! }
//! ```

pub mod build;
pub mod common;
pub mod disc;
pub mod extract;
pub(crate) mod io;
pub mod read;
pub mod util;

/// Error types for gcdisc.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No known disc magic matched while opening an image.
    #[error("unrecognized disc image format")]
    UnrecognizedFormat,
    /// The disc metadata is internally inconsistent. (Invalid FST indices,
    /// size mismatches, etc.)
    #[error("corrupt disc format: {0}")]
    CorruptFormat(String),
    /// A hash tree or decryption check failed while reading partition data.
    #[error("integrity check failed: {0}")]
    Integrity(String),
    /// A partition or file path does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The planned disc layout exceeds the fixed capacity of the target format.
    #[error("required size {required} exceeds disc capacity {limit}")]
    CapacityExceeded {
        /// Total byte size the layout requires.
        required: u64,
        /// Capacity limit of the disc format.
        limit: u64,
    },
    /// A general I/O error.
    #[error("{0}")]
    Io(String, #[source] std::io::Error),
}

impl From<zerocopy::AllocError> for Error {
    #[inline]
    fn from(_: zerocopy::AllocError) -> Error {
        Error::Io(
            "allocation failed".to_string(),
            std::io::Error::from(std::io::ErrorKind::OutOfMemory),
        )
    }
}

/// Helper result type for [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Helper trait for adding context to errors.
pub trait ErrorContext {
    /// Adds context to an error.
    fn context(self, context: impl Into<String>) -> Error;
}

impl ErrorContext for std::io::Error {
    fn context(self, context: impl Into<String>) -> Error {
        // Integrity failures are raised inside `std::io::Read` implementations
        // and must keep their kind when crossing into crate errors.
        if self.get_ref().is_some_and(|e| e.is::<crate::disc::wii::HashMismatch>()) {
            Error::Integrity(self.to_string())
        } else {
            Error::Io(context.into(), self)
        }
    }
}

/// Helper trait for adding context to result errors.
pub trait ResultContext<T> {
    /// Adds context to a result error.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Adds context to a result error using a closure.
    fn with_context<F>(self, f: F) -> Result<T>
    where F: FnOnce() -> String;
}

impl<T, E> ResultContext<T> for Result<T, E>
where E: ErrorContext
{
    #[inline]
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    #[inline]
    fn with_context<F>(self, f: F) -> Result<T>
    where F: FnOnce() -> String {
        self.map_err(|e| e.context(f()))
    }
}
