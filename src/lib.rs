//! Client-side model of Debian-style package repositories.
//!
//! [`AptClient`] keeps the binary and source package metadata of a set of
//! repositories for one architecture, downloads package payloads on demand and
//! remembers them until the next [`AptClient::update`]. Versions are ordered with
//! [`cmp_versions`].

pub mod cli;
pub mod config;
pub mod error;
pub mod registry;
pub mod source;
pub mod transport;
pub mod types;

pub use error::{FetchError, SourceReadError, TransportError};
pub use registry::{AptClient, Fetched, Freshness, PkgInfo, SrcFiles, UpdateSummary};
pub use source::{AptSourceReader, SourceDescriptor, SourceKind, SourceReader};
pub use transport::{HttpTransport, Transport};
pub use types::{cmp_versions, BinPkgInfo, Checksum, PkgRecord, PkgVersion, SrcFile, SrcPkgInfo};
