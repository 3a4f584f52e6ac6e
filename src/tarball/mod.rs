//! Tarball filtering and repacking.
//!
//! This module turns a provider tarball of a whole repository into a tarball
//! of a single package.
//!
//! ## Architecture
//!
//! The module is organized into three main components:
//!
//! - [`subpath`]: The requested subdirectory and the path arithmetic that maps
//!   archive entries onto the package root
//! - [`extractor`]: Single-pass, filtered extraction of a `.tar.gz` stream
//! - [`packer`]: Reproducible `.tgz` creation from an extracted directory
//!
//! ## Provider tarball layout
//!
//! Every entry of a GitHub tarball sits below one synthetic top-level folder
//! named after the repository and commit, e.g. `acme-libs-abc123/`. Its name
//! is not predictable, so it is always stripped as one anonymous segment:
//!
//! ```text
//! acme-libs-abc123/packages/utils/src/index.js
//! \______________/ \____________/ \__________/
//!   synthetic top      subpath      package path
//! ```
//!
//! ## Limitations
//!
//! - Only gzip-compressed tar input is understood
//! - Symlinks, hard links and special files are not carried over

pub mod extractor;
pub mod packer;
pub mod subpath;

pub use extractor::{ExtractSummary, TarExtractor};
pub use packer::TarPacker;
pub use subpath::Subpath;
