//! Deploy archive assembly.
//!
//! The archive is written by a blocking worker into an anonymous spool
//! file and then read back as an [`AsyncRead`] stream, so an upload can
//! consume it without the payload ever being held in memory.
//!
//! Source files are read eagerly: the worker starts as soon as
//! [`ArchiveAssembler::assemble`] returns, not when the stream is first
//! polled. The stream yields its first byte only after the worker has
//! finished and the archive is complete.

use std::collections::HashMap;
use std::fs::File;
use std::future::Future;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use forcesync_protocol::SourceFile;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::task::JoinHandle;
use tracing::debug;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::PackageError;

/// Archive entry holding the serialized manifest.
pub const MANIFEST_ENTRY: &str = "src/package.xml";

/// Builds deploy archives.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveAssembler {
    compression: CompressionMethod,
}

impl Default for ArchiveAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveAssembler {
    /// Creates an assembler that deflates every entry.
    pub fn new() -> Self {
        Self {
            compression: CompressionMethod::Deflated,
        }
    }

    /// Uses `method` for every entry.
    pub fn with_compression(mut self, method: CompressionMethod) -> Self {
        self.compression = method;
        self
    }

    /// Starts assembling an archive of `sources` plus `manifest`.
    ///
    /// Each source is stored at `src/<folder>/<file>` together with its
    /// `-meta.xml` sidecar; the manifest goes to [`MANIFEST_ENTRY`] and the
    /// archive is finalized after it. Files are read right away by a
    /// background worker, so the paths must stay valid until the returned
    /// stream yields data. Read failures surface as errors from the stream.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn assemble(
        &self,
        sources: Vec<SourceFile>,
        manifest: String,
    ) -> Result<ArchiveStream, PackageError> {
        let sources = dedup_sources(sources)?;

        let mut entries = Vec::with_capacity(sources.len() * 2 + 1);
        for source in &sources {
            entries.push(source.name.archive_entry());
            entries.push(source.name.meta_archive_entry());
        }
        entries.push(MANIFEST_ENTRY.to_string());
        debug!(entries = entries.len(), "assembling deploy archive");

        let compression = self.compression;
        let writer = tokio::task::spawn_blocking(move || {
            write_archive(&sources, &manifest, compression)
        });

        Ok(ArchiveStream {
            entries,
            state: StreamState::Assembling(writer),
        })
    }
}

/// Drops repeated paths and rejects different paths that would land on
/// the same archive entry.
fn dedup_sources(sources: Vec<SourceFile>) -> Result<Vec<SourceFile>, PackageError> {
    let mut seen: HashMap<String, std::path::PathBuf> = HashMap::new();
    let mut unique = Vec::with_capacity(sources.len());

    for source in sources {
        let entry = source.name.archive_entry();
        match seen.get(&entry) {
            Some(path) if *path == source.path => continue,
            Some(_) => return Err(PackageError::DuplicateEntry(entry)),
            None => {
                seen.insert(entry, source.path.clone());
                unique.push(source);
            }
        }
    }

    Ok(unique)
}

fn write_archive(
    sources: &[SourceFile],
    manifest: &str,
    compression: CompressionMethod,
) -> Result<File, PackageError> {
    let spool = tempfile::tempfile()?;
    let mut zip = ZipWriter::new(spool);
    let options = SimpleFileOptions::default().compression_method(compression);

    for source in sources {
        add_file(&mut zip, &source.name.archive_entry(), &source.path, options)?;
        add_file(
            &mut zip,
            &source.name.meta_archive_entry(),
            &source.meta_path(),
            options,
        )?;
    }

    zip.start_file(MANIFEST_ENTRY, options)?;
    zip.write_all(manifest.as_bytes())?;

    let mut spool = zip.finish()?;
    spool.flush()?;
    spool.seek(SeekFrom::Start(0))?;
    Ok(spool)
}

fn add_file(
    zip: &mut ZipWriter<File>,
    entry: &str,
    path: &Path,
    options: SimpleFileOptions,
) -> Result<(), PackageError> {
    let mut file = File::open(path).map_err(|source| PackageError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    zip.start_file(entry, options)?;
    io::copy(&mut file, zip).map_err(|source| PackageError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

enum StreamState {
    Assembling(JoinHandle<Result<File, PackageError>>),
    Reading(tokio::fs::File),
    Done,
}

/// A deploy archive readable on demand.
///
/// The first read waits for the archive to be finalized; later reads
/// stream it from the spool file.
pub struct ArchiveStream {
    entries: Vec<String>,
    state: StreamState,
}

impl ArchiveStream {
    /// Entry names the archive contains, in write order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Reads the whole archive into memory.
    pub async fn into_bytes(mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.read_to_end(&mut buf).await?;
        Ok(buf)
    }
}

impl std::fmt::Debug for ArchiveStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveStream")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl AsyncRead for ArchiveStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                StreamState::Assembling(writer) => {
                    let joined = ready!(Pin::new(writer).poll(cx));
                    match joined {
                        Ok(Ok(spool)) => {
                            this.state = StreamState::Reading(tokio::fs::File::from_std(spool));
                        }
                        Ok(Err(e)) => {
                            this.state = StreamState::Done;
                            return Poll::Ready(Err(io::Error::other(e)));
                        }
                        Err(e) => {
                            this.state = StreamState::Done;
                            return Poll::Ready(Err(io::Error::other(e)));
                        }
                    }
                }
                StreamState::Reading(file) => return Pin::new(file).poll_read(cx, buf),
                StreamState::Done => return Poll::Ready(Ok(())),
            }
        }
    }
}
