mod checksum;
mod version;

pub use checksum::Checksum;
pub use version::{cmp_versions, PkgVersion};

/// A binary package: exactly one fetchable artifact
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinPkgInfo {
    pub name: String,
    pub version: String,
    /// Path of the artifact, relative to `repo_base`
    pub filename: String,
    pub repo_base: String,
    pub size: Option<u64>,
    pub checksum: Option<Checksum>,
}

impl BinPkgInfo {
    pub fn url(&self) -> String {
        format!("{}/{}", self.repo_base, self.filename)
    }
}

/// A source package: a set of files under one directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SrcPkgInfo {
    pub name: String,
    pub version: String,
    /// Directory holding the files, relative to `repo_base`
    pub directory: String,
    pub files: Vec<SrcFile>,
    pub repo_base: String,
}

impl SrcPkgInfo {
    pub fn file_url(&self, file: &SrcFile) -> String {
        format!("{}/{}/{}", self.repo_base, self.directory, file.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SrcFile {
    pub name: String,
    pub size: Option<u64>,
    pub checksum: Option<Checksum>,
}

impl SrcFile {
    pub fn new(name: &str) -> Self {
        SrcFile {
            name: name.to_owned(),
            size: None,
            checksum: None,
        }
    }
}

/// One package record read from a repository index
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PkgRecord {
    Binary(BinPkgInfo),
    Source(SrcPkgInfo),
}

impl PkgRecord {
    pub fn name(&self) -> &str {
        match self {
            PkgRecord::Binary(b) => &b.name,
            PkgRecord::Source(s) => &s.name,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            PkgRecord::Binary(b) => &b.version,
            PkgRecord::Source(s) => &s.version,
        }
    }
}
