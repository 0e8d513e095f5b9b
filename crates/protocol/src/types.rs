//! Classification of local source files into remote metadata types.
//!
//! A file is classified once, when it enters the system, into a
//! [`SourceName`]; every later step (manifest, archive layout, container
//! artifact, identity lookup) reads the tagged [`MetadataType`] instead of
//! re-parsing the name.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{ARCHIVE_ROOT, META_SUFFIX};

/// Error returned when a file name does not match `^(\w+)\.(cls|page|trigger|resource)`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not an Apex source file name: {0:?}")]
pub struct NameFormatError(pub String);

/// Remote metadata type a local source file deploys as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataType {
    ApexClass,
    ApexTrigger,
    ApexPage,
    StaticResource,
}

impl MetadataType {
    /// Looks up the type for a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "cls" => Some(Self::ApexClass),
            // `apxt` is the extension of trigger test templates. The table
            // knows it, but the file-name grammar does not accept it.
            "trigger" | "apxt" => Some(Self::ApexTrigger),
            "page" => Some(Self::ApexPage),
            "resource" => Some(Self::StaticResource),
            _ => None,
        }
    }

    /// Type name as written in `package.xml` and Tooling queries.
    pub fn api_name(self) -> &'static str {
        match self {
            Self::ApexClass => "ApexClass",
            Self::ApexTrigger => "ApexTrigger",
            Self::ApexPage => "ApexPage",
            Self::StaticResource => "StaticResource",
        }
    }

    /// Folder under the archive root holding files of this type.
    pub fn folder(self) -> &'static str {
        match self {
            Self::ApexClass => "classes",
            Self::ApexTrigger => "triggers",
            Self::ApexPage => "pages",
            Self::StaticResource => "staticresources",
        }
    }

    /// Tooling sobject used as a container artifact for this type.
    ///
    /// Static resources cannot go through a container and return `None`.
    pub fn member_sobject(self) -> Option<&'static str> {
        match self {
            Self::ApexClass => Some("ApexClassMember"),
            Self::ApexTrigger => Some("ApexTriggerMember"),
            Self::ApexPage => Some("ApexPageMember"),
            Self::StaticResource => None,
        }
    }
}

impl fmt::Display for MetadataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

/// Extensions accepted by the source-name grammar.
///
/// A subset of [`MetadataType::from_extension`]: `apxt` files are never
/// picked up as sources.
const SOURCE_EXTENSIONS: [&str; 4] = ["cls", "page", "trigger", "resource"];

/// A file name that matched the source grammar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceName {
    file_name: String,
    base: String,
    kind: MetadataType,
}

impl SourceName {
    /// Parses a bare file name such as `Foo.cls`.
    ///
    /// The base must be non-empty word characters and everything after
    /// the first dot must be exactly one of the source extensions, so
    /// `Foo.cls-meta.xml` is rejected.
    pub fn parse(file_name: &str) -> Result<Self, NameFormatError> {
        let err = || NameFormatError(file_name.to_string());

        let (base, ext) = file_name.split_once('.').ok_or_else(err)?;
        if base.is_empty() || !base.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(err());
        }
        if !SOURCE_EXTENSIONS.contains(&ext) {
            return Err(err());
        }
        let kind = MetadataType::from_extension(ext).ok_or_else(err)?;

        Ok(Self {
            file_name: file_name.to_string(),
            base: base.to_string(),
            kind,
        })
    }

    /// Parses the final component of `path`.
    pub fn from_path(path: &Path) -> Result<Self, NameFormatError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| NameFormatError(path.to_string_lossy().into_owned()))?;
        Self::parse(name)
    }

    /// Full file name, e.g. `Foo.cls`.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// File name without extension, e.g. `Foo`. This is the remote `Name`.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn kind(&self) -> MetadataType {
        self.kind
    }

    /// Archive entry of the source file: `src/<folder>/<file>`.
    pub fn archive_entry(&self) -> String {
        format!("{ARCHIVE_ROOT}/{}/{}", self.kind.folder(), self.file_name)
    }

    /// Archive entry of the metadata sidecar: `src/<folder>/<file>-meta.xml`.
    pub fn meta_archive_entry(&self) -> String {
        format!("{}{META_SUFFIX}", self.archive_entry())
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name)
    }
}

/// A local source file together with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub name: SourceName,
}

impl SourceFile {
    /// Classifies the file at `path` by its file name.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, NameFormatError> {
        let path = path.into();
        let name = SourceName::from_path(&path)?;
        Ok(Self { path, name })
    }

    /// Path of the `-meta.xml` descriptor next to the source file.
    pub fn meta_path(&self) -> PathBuf {
        let mut os = self.path.clone().into_os_string();
        os.push(META_SUFFIX);
        PathBuf::from(os)
    }
}
