mod test;

use crate::{
    debug,
    error::{FetchError, SourceReadError},
    source::{AptSourceReader, SourceDescriptor, SourceReader},
    transport::{HttpTransport, Transport},
    types::{cmp_versions, BinPkgInfo, Checksum, PkgRecord, SrcPkgInfo},
};

use bytes::Bytes;
use futures_util::future::{join_all, try_join_all};
use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError, RwLock},
};

/// Files of a source package, by file name
pub type SrcFiles = HashMap<String, Bytes>;

/// Payload cache slot of a registry entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload<T> {
    Absent,
    Cached(T),
}

impl<T> Payload<T> {
    pub fn cached(&self) -> Option<&T> {
        match self {
            Payload::Absent => None,
            Payload::Cached(p) => Some(p),
        }
    }
}

struct Entry<M, P> {
    meta: M,
    payload: Mutex<Payload<P>>,
}

impl<M, P: Clone> Entry<M, P> {
    fn new(meta: M) -> Self {
        Entry {
            meta,
            payload: Mutex::new(Payload::Absent),
        }
    }

    fn cached(&self) -> Option<P> {
        let slot = self.payload.lock().unwrap_or_else(PoisonError::into_inner);
        slot.cached().cloned()
    }

    /// Fill the slot unless someone else got there first.
    /// Returns whatever the slot holds afterwards.
    fn fill(&self, payload: P) -> P {
        let mut slot = self.payload.lock().unwrap_or_else(PoisonError::into_inner);
        match &*slot {
            Payload::Cached(existing) => existing.clone(),
            Payload::Absent => {
                *slot = Payload::Cached(payload.clone());
                payload
            }
        }
    }
}

#[derive(Default)]
struct Snapshot {
    bin: HashMap<String, Entry<BinPkgInfo, Bytes>>,
    src: HashMap<String, Entry<SrcPkgInfo, SrcFiles>>,
}

/// Metadata returned by [`AptClient::get_pkg_info`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PkgInfo {
    pub bin: HashMap<String, BinPkgInfo>,
    pub src: HashMap<String, SrcPkgInfo>,
}

/// Number of packages installed by an update
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub binary: usize,
    pub source: usize,
}

/// Result of a batch payload fetch.
/// Packages unknown to the registry appear in neither map.
#[derive(Debug)]
pub struct Fetched<T> {
    pub files: HashMap<String, T>,
    pub failed: HashMap<String, FetchError>,
}

impl<T> Fetched<T> {
    fn from_results<'a>(
        results: impl IntoIterator<Item = (&'a str, Result<T, FetchError>)>,
    ) -> Self {
        let mut res = Fetched {
            files: HashMap::new(),
            failed: HashMap::new(),
        };
        for (name, r) in results {
            match r {
                Ok(payload) => {
                    res.files.insert(name.to_owned(), payload);
                }
                Err(e) => {
                    res.failed.insert(name.to_owned(), e);
                }
            }
        }
        res
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// All payloads, or the error of the first failed package by name
    pub fn into_result(self) -> Result<HashMap<String, T>, FetchError> {
        match self.failed.into_iter().min_by(|a, b| a.0.cmp(&b.0)) {
            Some((_, e)) => Err(e),
            None => Ok(self.files),
        }
    }
}

/// How a version relates to the one in the registry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Freshness {
    /// Not older than the registry's version
    Latest,
    /// The registry knows a newer version
    Outdated,
    /// The registry doesn't know this package
    Unknown,
}

/// Client-side view of a set of APT repositories for one architecture.
///
/// Package metadata is replaced as a whole by [`AptClient::update`]. Payloads are
/// downloaded on first request and kept until the next successful update.
pub struct AptClient {
    arch: String,
    sources: Vec<SourceDescriptor>,
    reader: Box<dyn SourceReader>,
    transport: Arc<dyn Transport>,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl AptClient {
    /// Client reading repositories over HTTP
    pub fn new(arch: &str, sources: Vec<SourceDescriptor>) -> Self {
        let transport = Arc::new(HttpTransport::new());
        AptClient::with_backends(
            arch,
            sources,
            AptSourceReader::new(transport.clone()),
            transport,
        )
    }

    pub fn with_backends(
        arch: &str,
        sources: Vec<SourceDescriptor>,
        reader: impl SourceReader + 'static,
        transport: impl Transport + 'static,
    ) -> Self {
        AptClient {
            arch: arch.to_owned(),
            sources,
            reader: Box::new(reader),
            transport: Arc::new(transport),
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Refresh from the configured sources
    pub async fn update(&self) -> Result<UpdateSummary, SourceReadError> {
        self.update_from(&self.sources).await
    }

    /// Refresh from the given sources.
    ///
    /// All sources are read concurrently. If any of them fails, nothing changes.
    /// Otherwise the old snapshot, cached payloads included, is dropped. When a
    /// package shows up more than once, the one read last (in source order) wins.
    pub async fn update_from(
        &self,
        sources: &[SourceDescriptor],
    ) -> Result<UpdateSummary, SourceReadError> {
        debug!("Reading {} sources for {}", sources.len(), self.arch);
        let results =
            try_join_all(sources.iter().map(|s| self.reader.read(s, &self.arch))).await?;

        let mut snapshot = Snapshot::default();
        for record in results.into_iter().flatten() {
            match record {
                PkgRecord::Binary(b) => {
                    snapshot.bin.insert(b.name.clone(), Entry::new(b));
                }
                PkgRecord::Source(s) => {
                    snapshot.src.insert(s.name.clone(), Entry::new(s));
                }
            }
        }
        let summary = UpdateSummary {
            binary: snapshot.bin.len(),
            source: snapshot.src.len(),
        };

        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
        debug!(
            "Registry now holds {} binary and {} source packages",
            summary.binary,
            summary.source
        );
        Ok(summary)
    }

    /// Metadata of the requested packages. Unknown names are left out.
    pub fn get_pkg_info<S: AsRef<str>>(&self, names: &[S]) -> PkgInfo {
        let snapshot = self.snapshot();
        let mut res = PkgInfo::default();
        for name in names {
            let name = name.as_ref();
            if let Some(entry) = snapshot.bin.get(name) {
                res.bin.insert(name.to_owned(), entry.meta.clone());
            }
            if let Some(entry) = snapshot.src.get(name) {
                res.src.insert(name.to_owned(), entry.meta.clone());
            }
        }
        res
    }

    /// Artifacts of the requested binary packages, downloaded on first use
    pub async fn get_bin_files<S: AsRef<str>>(&self, names: &[S]) -> Fetched<Bytes> {
        let snapshot = self.snapshot();
        let jobs = dedup(names)
            .into_iter()
            .filter_map(|name| snapshot.bin.get_key_value(name))
            .map(|(name, entry)| async move { (name.as_str(), self.fetch_bin(entry).await) });

        Fetched::from_results(join_all(jobs).await)
    }

    /// File sets of the requested source packages, downloaded on first use
    pub async fn get_src_files<S: AsRef<str>>(&self, names: &[S]) -> Fetched<SrcFiles> {
        let snapshot = self.snapshot();
        let jobs = dedup(names)
            .into_iter()
            .filter_map(|name| snapshot.src.get_key_value(name))
            .map(|(name, entry)| async move { (name.as_str(), self.fetch_src(entry).await) });

        Fetched::from_results(join_all(jobs).await)
    }

    async fn fetch_bin(&self, entry: &Entry<BinPkgInfo, Bytes>) -> Result<Bytes, FetchError> {
        if let Some(data) = entry.cached() {
            return Ok(data);
        }

        let url = entry.meta.url();
        debug!("Downloading {}", url);
        let data = self.transport.retrieve(&url).await?;
        verify(&url, entry.meta.checksum.as_ref(), &data)?;
        Ok(entry.fill(data))
    }

    async fn fetch_src(&self, entry: &Entry<SrcPkgInfo, SrcFiles>) -> Result<SrcFiles, FetchError> {
        if let Some(files) = entry.cached() {
            return Ok(files);
        }

        let info = &entry.meta;
        // Cache only if every file made it
        let jobs = info.files.iter().map(|file| async move {
            let url = info.file_url(file);
            debug!("Downloading {}", url);
            let data = self.transport.retrieve(&url).await?;
            verify(&url, file.checksum.as_ref(), &data)?;
            Ok::<_, FetchError>((file.name.clone(), data))
        });
        let files: SrcFiles = try_join_all(jobs).await?.into_iter().collect();
        Ok(entry.fill(files))
    }

    /// Version of a package, looking at binary packages first
    pub fn known_version(&self, name: &str) -> Option<String> {
        let snapshot = self.snapshot();
        snapshot
            .bin
            .get(name)
            .map(|e| e.meta.version.clone())
            .or_else(|| snapshot.src.get(name).map(|e| e.meta.version.clone()))
    }

    pub fn freshness(&self, name: &str, version: &str) -> Freshness {
        match self.known_version(name) {
            None => Freshness::Unknown,
            Some(known) => match cmp_versions(&known, version) {
                Ordering::Greater => Freshness::Outdated,
                _ => Freshness::Latest,
            },
        }
    }

    /// Whether `version` is at least as new as what the registry knows.
    /// Unknown packages count as latest.
    pub fn is_latest(&self, name: &str, version: &str) -> bool {
        self.freshness(name, version) != Freshness::Outdated
    }
}

fn dedup<S: AsRef<str>>(names: &[S]) -> Vec<&str> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|n| n.as_ref())
        .filter(|n| seen.insert(*n))
        .collect()
}

fn verify(url: &str, checksum: Option<&Checksum>, data: &[u8]) -> Result<(), FetchError> {
    match checksum {
        Some(c) if !c.verify(data) => Err(FetchError::ChecksumMismatch {
            url: url.to_owned(),
            expected: c.to_string(),
        }),
        _ => Ok(()),
    }
}
