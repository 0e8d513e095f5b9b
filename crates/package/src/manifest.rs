//! `package.xml` generation.

use std::fmt::Write;

use forcesync_protocol::constants::{DEFAULT_API_VERSION, METADATA_NAMESPACE};
use forcesync_protocol::{MetadataType, NameFormatError, SourceName};

/// Members of one metadata type, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMembers {
    pub kind: MetadataType,
    pub members: Vec<String>,
}

/// Declarative description of what an archive deploy contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    api_version: String,
    types: Vec<TypeMembers>,
}

impl PackageDescriptor {
    /// Builds a descriptor from bare file names such as `Foo.cls`.
    ///
    /// Every name must match the source grammar; callers are expected to
    /// have filtered their candidate list already.
    pub fn build<I, S>(file_names: I) -> Result<Self, NameFormatError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = file_names
            .into_iter()
            .map(|name| SourceName::parse(name.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_sources(&names))
    }

    /// Builds a descriptor from already classified names.
    ///
    /// Types keep the order in which they are first seen, as do members
    /// within a type. A member repeated within a type is listed once.
    pub fn from_sources<'a>(names: impl IntoIterator<Item = &'a SourceName>) -> Self {
        let mut types: Vec<TypeMembers> = Vec::new();

        for name in names {
            let idx = match types.iter().position(|t| t.kind == name.kind()) {
                Some(idx) => idx,
                None => {
                    types.push(TypeMembers {
                        kind: name.kind(),
                        members: Vec::new(),
                    });
                    types.len() - 1
                }
            };
            let members = &mut types[idx].members;
            if !members.iter().any(|m| m == name.base()) {
                members.push(name.base().to_string());
            }
        }

        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            types,
        }
    }

    /// Overrides the API version written to the manifest.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn types(&self) -> &[TypeMembers] {
        &self.types
    }

    /// Members listed for `kind`, if the type is present.
    pub fn members(&self, kind: MetadataType) -> Option<&[String]> {
        self.types
            .iter()
            .find(|t| t.kind == kind)
            .map(|t| t.members.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Serializes the descriptor to the `package.xml` wire format.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(256);
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(xml, "<Package xmlns=\"{METADATA_NAMESPACE}\">");
        let _ = writeln!(xml, "    <version>{}</version>", escape(&self.api_version));
        for group in &self.types {
            xml.push_str("    <types>\n");
            for member in &group.members {
                let _ = writeln!(xml, "        <members>{}</members>", escape(member));
            }
            let _ = writeln!(xml, "        <name>{}</name>", group.kind.api_name());
            xml.push_str("    </types>\n");
        }
        xml.push_str("</Package>\n");
        xml
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
