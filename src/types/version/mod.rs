mod ord;

pub use ord::cmp_versions;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A Debian package version, ordered with [`cmp_versions`].
///
/// The original string is kept verbatim. Two versions are equal when the
/// comparator says so, e.g. `1.0` and `0:1.0`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PkgVersion(String);

impl PkgVersion {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric epoch, 0 if absent or too large to represent
    pub fn epoch(&self) -> u64 {
        let (epoch, _, _) = ord::split_version(&self.0);
        epoch.parse().unwrap_or(0)
    }

    pub fn upstream(&self) -> &str {
        ord::split_version(&self.0).1
    }

    pub fn revision(&self) -> Option<&str> {
        let (_, _, revision) = ord::split_version(&self.0);
        if revision.is_empty() {
            None
        } else {
            Some(revision)
        }
    }
}

impl From<&str> for PkgVersion {
    fn from(s: &str) -> Self {
        PkgVersion(s.to_owned())
    }
}

impl From<String> for PkgVersion {
    fn from(s: String) -> Self {
        PkgVersion(s)
    }
}

impl fmt::Display for PkgVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for PkgVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_versions(&self.0, &other.0)
    }
}

impl PartialOrd for PkgVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PkgVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PkgVersion {}
