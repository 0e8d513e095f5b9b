//! Package manifest builder and deploy archive assembler.
//!
//! Turns a set of local source files into what an archive deploy needs:
//! a `package.xml` manifest listing the members of every metadata type,
//! and a zip archive laid out as `src/<folder>/<file>` with each file's
//! `-meta.xml` sidecar next to it.

mod archive;
mod manifest;

use std::path::PathBuf;

pub use archive::{ArchiveAssembler, ArchiveStream, MANIFEST_ENTRY};
pub use manifest::{PackageDescriptor, TypeMembers};

/// Errors produced by the package crate.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Name(#[from] forcesync_protocol::NameFormatError),

    #[error("two different files map to archive entry {0}")]
    DuplicateEntry(String),
}
