#[cfg(test)]
mod test {
    use super::super::*;
    use crate::{
        error::TransportError,
        source::{AptSourceReader, SourceKind},
        types::SrcFile,
    };
    use async_trait::async_trait;
    use std::time::Duration;

    const BASE: &str = "http://repo.test/debian";

    fn desc(url: &str) -> SourceDescriptor {
        SourceDescriptor::new(SourceKind::Binary, url, "sid", vec!["main".to_string()]).unwrap()
    }

    fn bin(name: &str, version: &str) -> PkgRecord {
        PkgRecord::Binary(BinPkgInfo {
            name: name.to_string(),
            version: version.to_string(),
            filename: format!("pool/{name}_{version}.deb"),
            repo_base: BASE.to_string(),
            size: None,
            checksum: None,
        })
    }

    fn src(name: &str, version: &str, files: &[&str]) -> PkgRecord {
        PkgRecord::Source(SrcPkgInfo {
            name: name.to_string(),
            version: version.to_string(),
            directory: format!("pool/{name}"),
            files: files.iter().map(|f| SrcFile::new(f)).collect(),
            repo_base: BASE.to_string(),
        })
    }

    /// Serves canned records per source url, after an optional delay
    #[derive(Default)]
    struct MockReader {
        sources: HashMap<String, (Duration, Vec<PkgRecord>)>,
    }

    impl MockReader {
        fn with(mut self, url: &str, records: Vec<PkgRecord>) -> Self {
            self.sources
                .insert(url.to_string(), (Duration::ZERO, records));
            self
        }

        fn with_delay(mut self, url: &str, delay: Duration, records: Vec<PkgRecord>) -> Self {
            self.sources.insert(url.to_string(), (delay, records));
            self
        }
    }

    #[async_trait]
    impl SourceReader for MockReader {
        async fn read(
            &self,
            source: &SourceDescriptor,
            _arch: &str,
        ) -> Result<Vec<PkgRecord>, SourceReadError> {
            match self.sources.get(&source.url) {
                Some((delay, records)) => {
                    tokio::time::sleep(*delay).await;
                    Ok(records.clone())
                }
                None => Err(SourceReadError::new(source, "404 Not Found")),
            }
        }
    }

    /// In-memory files, counting every retrieval.
    /// Contents are looked up when the request starts and returned after `delay`.
    #[derive(Default)]
    struct MockTransport {
        files: Mutex<HashMap<String, Bytes>>,
        requests: Mutex<Vec<String>>,
        delay: Duration,
    }

    impl MockTransport {
        fn with_delay(delay: Duration) -> Self {
            MockTransport {
                delay,
                ..Default::default()
            }
        }

        fn put(&self, url: &str, data: impl Into<Bytes>) {
            self.files
                .lock()
                .unwrap()
                .insert(url.to_string(), data.into());
        }

        fn requests(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn retrieve(&self, url: &str) -> Result<Bytes, TransportError> {
            self.requests.lock().unwrap().push(url.to_string());
            let data = self.files.lock().unwrap().get(url).cloned();
            tokio::time::sleep(self.delay).await;
            data.ok_or_else(|| TransportError::new(url, "404 Not Found"))
        }
    }

    fn client(reader: MockReader, transport: &Arc<MockTransport>) -> AptClient {
        AptClient::with_backends("amd64", vec![desc("http://a")], reader, transport.clone())
    }

    fn bin_url(name: &str, version: &str) -> String {
        format!("{BASE}/pool/{name}_{version}.deb")
    }

    fn src_url(name: &str, file: &str) -> String {
        format!("{BASE}/pool/{name}/{file}")
    }

    #[tokio::test]
    async fn update_replaces_snapshot() {
        let reader = MockReader::default()
            .with("http://a", vec![bin("p", "1.0"), bin("q", "1.0")])
            .with("http://b", vec![bin("q", "1.0")]);
        let transport = Arc::new(MockTransport::default());
        transport.put(&bin_url("q", "1.0"), "q-data");
        let client = client(reader, &transport);
        assert_eq!(client.arch(), "amd64");
        assert_eq!(client.sources(), &[desc("http://a")]);

        let summary = client.update().await.unwrap();
        assert_eq!(summary, UpdateSummary { binary: 2, source: 0 });
        assert!(client.get_pkg_info(&["p"]).bin.contains_key("p"));
        client.get_bin_files(&["q"]).await.into_result().unwrap();
        assert_eq!(transport.requests(), 1);

        client.update_from(&[desc("http://b")]).await.unwrap();
        let info = client.get_pkg_info(&["p", "q"]);
        assert!(!info.bin.contains_key("p"));
        assert!(info.bin.contains_key("q"));
        // Identical metadata, but the cache went away with the old snapshot
        client.get_bin_files(&["q"]).await.into_result().unwrap();
        assert_eq!(transport.requests(), 2);
    }

    #[tokio::test]
    async fn failed_update_keeps_snapshot() {
        let reader = MockReader::default().with("http://a", vec![bin("p", "1.0")]);
        let transport = Arc::new(MockTransport::default());
        transport.put(&bin_url("p", "1.0"), "p-data");
        let client = client(reader, &transport);
        client.update().await.unwrap();
        client.get_bin_files(&["p"]).await.into_result().unwrap();

        let err = client
            .update_from(&[desc("http://a"), desc("http://broken")])
            .await
            .unwrap_err();
        assert!(err.source_desc.contains("http://broken"));

        assert_eq!(client.known_version("p").as_deref(), Some("1.0"));
        client.get_bin_files(&["p"]).await.into_result().unwrap();
        assert_eq!(transport.requests(), 1);
    }

    #[tokio::test]
    async fn later_source_wins() {
        let reader = MockReader::default()
            .with("http://a", vec![bin("p", "1.0"), src("s", "1.0", &["s.dsc"])])
            .with("http://b", vec![bin("p", "2.0"), src("s", "0.5", &["s.dsc"])])
            .with("http://c", vec![bin("r", "1.0"), bin("r", "3.0")]);
        let transport = Arc::new(MockTransport::default());
        let client = client(reader, &transport);

        client
            .update_from(&[desc("http://a"), desc("http://b")])
            .await
            .unwrap();
        assert_eq!(client.get_pkg_info(&["p"]).bin["p"].version, "2.0");
        assert_eq!(client.get_pkg_info(&["s"]).src["s"].version, "0.5");

        client
            .update_from(&[desc("http://b"), desc("http://a")])
            .await
            .unwrap();
        assert_eq!(client.get_pkg_info(&["p"]).bin["p"].version, "1.0");
        assert_eq!(client.get_pkg_info(&["s"]).src["s"].version, "1.0");

        // Within one source, the later record wins as well
        client.update_from(&[desc("http://c")]).await.unwrap();
        assert_eq!(client.known_version("r").as_deref(), Some("3.0"));
    }

    #[tokio::test(start_paused = true)]
    async fn update_reads_sources_concurrently() {
        let reader = MockReader::default()
            .with_delay("http://a", Duration::from_millis(100), vec![bin("a", "1")])
            .with_delay("http://b", Duration::from_millis(300), vec![bin("b", "1")])
            .with_delay("http://c", Duration::from_millis(200), vec![bin("c", "1")]);
        let transport = Arc::new(MockTransport::default());
        let client = client(reader, &transport);

        let start = tokio::time::Instant::now();
        let summary = client
            .update_from(&[desc("http://a"), desc("http://b"), desc("http://c")])
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(summary.binary, 3);
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(600), "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn pkg_info_by_variant() {
        let reader = MockReader::default().with(
            "http://a",
            vec![bin("both", "1.0"), src("both", "1.0", &["x"]), bin("binonly", "2")],
        );
        let transport = Arc::new(MockTransport::default());
        let client = client(reader, &transport);
        client.update().await.unwrap();

        let info = client.get_pkg_info(&["both", "binonly", "nope"]);
        assert_eq!(info.bin.len(), 2);
        assert_eq!(info.src.len(), 1);
        assert!(info.src.contains_key("both"));
        assert!(!info.bin.contains_key("nope"));

        assert_eq!(client.get_pkg_info::<&str>(&[]), PkgInfo::default());
    }

    #[tokio::test]
    async fn bin_files_are_memoized() {
        let reader = MockReader::default().with("http://a", vec![bin("p", "1.0")]);
        let transport = Arc::new(MockTransport::default());
        transport.put(&bin_url("p", "1.0"), "p-data");
        let client = client(reader, &transport);
        client.update().await.unwrap();

        let first = client.get_bin_files(&["p"]).await.into_result().unwrap();
        let second = client.get_bin_files(&["p", "p"]).await.into_result().unwrap();
        assert_eq!(first["p"], Bytes::from("p-data"));
        assert_eq!(first, second);
        assert_eq!(transport.requests(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn late_fill_stays_in_old_snapshot() {
        let reader = MockReader::default().with("http://a", vec![bin("p", "1.0")]);
        let transport = Arc::new(MockTransport::with_delay(Duration::from_millis(100)));
        transport.put(&bin_url("p", "1.0"), "p-data");
        let client = client(reader, &transport);
        client.update().await.unwrap();

        let start = tokio::time::Instant::now();
        let (fetched, updated_at) = tokio::join!(client.get_bin_files(&["p"]), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            client.update().await.unwrap();
            start.elapsed()
        });
        // The update landed while the download was still running
        assert!(updated_at < Duration::from_millis(100));
        assert_eq!(fetched.into_result().unwrap()["p"], Bytes::from("p-data"));
        assert_eq!(transport.requests(), 1);

        // That fill went into the discarded snapshot
        client.get_bin_files(&["p"]).await.into_result().unwrap();
        assert_eq!(transport.requests(), 2);
        client.get_bin_files(&["p"]).await.into_result().unwrap();
        assert_eq!(transport.requests(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_fetches_keep_first_fill() {
        let reader = MockReader::default().with("http://a", vec![bin("p", "1.0")]);
        let transport = Arc::new(MockTransport::with_delay(Duration::from_millis(100)));
        transport.put(&bin_url("p", "1.0"), "first");
        let client = client(reader, &transport);
        client.update().await.unwrap();

        let (a, b) = tokio::join!(client.get_bin_files(&["p"]), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            // The second download sees different contents but finishes last
            transport.put(&bin_url("p", "1.0"), "second");
            client.get_bin_files(&["p"]).await
        });
        assert_eq!(transport.requests(), 2);
        let a = a.into_result().unwrap();
        let b = b.into_result().unwrap();
        assert_eq!(a["p"], Bytes::from("first"));
        assert_eq!(a, b);

        let cached = client.get_bin_files(&["p"]).await.into_result().unwrap();
        assert_eq!(cached["p"], Bytes::from("first"));
        assert_eq!(transport.requests(), 2);
    }

    #[tokio::test]
    async fn unknown_names_are_omitted() {
        let reader = MockReader::default().with("http://a", vec![bin("p", "1.0")]);
        let transport = Arc::new(MockTransport::default());
        let client = client(reader, &transport);
        client.update().await.unwrap();

        let res = client.get_bin_files(&["nope"]).await;
        assert!(res.files.is_empty());
        assert!(res.failed.is_empty());
        // p is binary only
        let res = client.get_src_files(&["p"]).await;
        assert!(res.files.is_empty() && res.failed.is_empty());
        assert_eq!(transport.requests(), 0);
    }

    #[tokio::test]
    async fn failures_do_not_cascade() {
        let reader = MockReader::default().with(
            "http://a",
            vec![bin("good", "1"), bin("bad", "1"), src("s", "1", &["a", "b"])],
        );
        let transport = Arc::new(MockTransport::default());
        transport.put(&bin_url("good", "1"), "good-data");
        let client = client(reader, &transport);
        client.update().await.unwrap();

        let res = client.get_bin_files(&["good", "bad", "unknown"]).await;
        assert!(!res.is_complete());
        assert_eq!(res.files.len(), 1);
        assert!(res.files.contains_key("good"));
        assert!(matches!(res.failed["bad"], FetchError::Transport(_)));
        assert!(res.into_result().is_err());
    }

    #[tokio::test]
    async fn src_files_all_or_nothing() {
        let files = ["s_1.dsc", "s_1.orig.tar.gz", "s_1.debian.tar.xz"];
        let reader = MockReader::default().with("http://a", vec![src("s", "1", &files)]);
        let transport = Arc::new(MockTransport::default());
        transport.put(&src_url("s", files[0]), "dsc");
        transport.put(&src_url("s", files[1]), "orig");
        let client = client(reader, &transport);
        client.update().await.unwrap();

        let res = client.get_src_files(&["s"]).await;
        assert!(res.files.is_empty());
        assert!(res.failed.contains_key("s"));

        // Nothing was cached, so every file is requested again
        transport.put(&src_url("s", files[2]), "debian");
        let before = transport.requests();
        let res = client.get_src_files(&["s"]).await.into_result().unwrap();
        assert_eq!(transport.requests() - before, 3);
        assert_eq!(res["s"].len(), 3);
        assert_eq!(res["s"]["s_1.orig.tar.gz"], Bytes::from("orig"));

        let before = transport.requests();
        client.get_src_files(&["s"]).await.into_result().unwrap();
        assert_eq!(transport.requests(), before);
    }

    #[tokio::test]
    async fn checksum_mismatch_is_not_cached() {
        let mut record = bin("p", "1.0");
        if let PkgRecord::Binary(b) = &mut record {
            // sha256("hello")
            b.checksum = Some(
                Checksum::from_sha256_str(
                    "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
                )
                .unwrap(),
            );
        }
        let reader = MockReader::default().with("http://a", vec![record]);
        let transport = Arc::new(MockTransport::default());
        transport.put(&bin_url("p", "1.0"), "tampered");
        let client = client(reader, &transport);
        client.update().await.unwrap();

        let res = client.get_bin_files(&["p"]).await;
        assert!(matches!(
            res.failed["p"],
            FetchError::ChecksumMismatch { .. }
        ));

        transport.put(&bin_url("p", "1.0"), "hello");
        let res = client.get_bin_files(&["p"]).await.into_result().unwrap();
        assert_eq!(res["p"], Bytes::from("hello"));
        assert_eq!(transport.requests(), 2);
    }

    #[tokio::test]
    async fn freshness() {
        let reader = MockReader::default().with(
            "http://a",
            vec![bin("p", "1.0"), bin("both", "1.0"), src("both", "3.0", &["x"]), src("s", "2:1", &["x"])],
        );
        let transport = Arc::new(MockTransport::default());
        let client = client(reader, &transport);
        client.update().await.unwrap();

        assert!(!client.is_latest("p", "0.9"));
        assert!(client.is_latest("p", "1.0"));
        assert!(client.is_latest("p", "1.1"));
        assert!(!client.is_latest("p", "1.0~rc1"));
        assert!(client.is_latest("unknown", "0.1"));
        assert_eq!(client.freshness("unknown", "0.1"), Freshness::Unknown);
        assert_eq!(client.freshness("p", "0.9"), Freshness::Outdated);
        // Binary version is consulted first
        assert!(client.is_latest("both", "2.0"));
        // Falls back to sources
        assert!(!client.is_latest("s", "5.0"));
        assert!(client.is_latest("s", "2:1.0"));
    }

    #[tokio::test]
    async fn read_real_index() {
        let packages = "Package: hello
Version: 2.10-3
Filename: pool/main/h/hello/hello_2.10-3_amd64.deb
SHA256: 2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824
";
        let transport = Arc::new(MockTransport::default());
        transport.put(
            "http://repo.test/debian/dists/sid/main/binary-amd64/Packages.gz",
            crate::source::apt_test::gzip(packages),
        );
        transport.put(
            "http://repo.test/debian/pool/main/h/hello/hello_2.10-3_amd64.deb",
            "hello",
        );
        let client = AptClient::with_backends(
            "amd64",
            vec![desc(BASE)],
            AptSourceReader::new(transport.clone()),
            transport.clone(),
        );

        client.update().await.unwrap();
        assert_eq!(client.known_version("hello").as_deref(), Some("2.10-3"));
        let res = client.get_bin_files(&["hello"]).await.into_result().unwrap();
        assert_eq!(res["hello"], Bytes::from("hello"));

        // A source that can't be read fails the whole update
        let err = client
            .update_from(&[desc(BASE), desc("http://repo.test/missing")])
            .await
            .unwrap_err();
        assert!(err.reason.contains("404"));
        assert!(client.is_latest("hello", "2.10-3"));
    }
}
