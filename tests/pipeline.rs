use pkgsize::archive::estimate_archive_size;
use pkgsize::fsx::{LocalFs, SourceFile, SourceReader};
use pkgsize::lister::{PackageLister, WalkLister};
use pkgsize::workers::CancelFlag;
use pkgsize::{PkgSize, PkgSizeError, PkgSizeOptions, SizeKind};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

// ---------- helpers ----------
fn write(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn sample_package() -> TempDir {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "package.json",
        br#"{"name":"demo","version":"1.0.0","main":"lib/index.js"}"#,
    );
    write(root, "README.md", b"# demo\n\nA package used in tests.\n");
    write(root, "lib/index.js", &b"module.exports = require('./util');\n".repeat(50));
    write(root, "lib/util.js", &b"exports.add = (a, b) => a + b;\n".repeat(80));
    write(root, "test/c.js", b"require('assert').ok(true);\n");
    write(root, "node_modules/dep/index.js", b"not published");
    dir
}

fn names(files: &[&str]) -> Vec<String> {
    files.iter().map(|f| f.to_string()).collect()
}

/// Lister returning a fixed list.
struct StubLister(Vec<String>);

impl PackageLister for StubLister {
    fn list(&self, _root: &Path) -> pkgsize::Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

async fn estimate(root: &Path, files: &[&str]) -> u64 {
    let root: Arc<Path> = Arc::from(root);
    estimate_archive_size(Arc::new(LocalFs), root, &names(files), &CancelFlag::default())
        .await
        .unwrap()
}

/// Reader that counts how many files are open at once.
///
/// Optionally fails to open one path and sleeps on every read, so a failure
/// lands while other files are still being streamed.
#[derive(Default)]
struct CountingFs {
    open: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    total: AtomicUsize,
    fail: Option<&'static str>,
    read_delay: Option<Duration>,
}

struct Tracked {
    inner: Box<dyn Read + Send>,
    open: Arc<AtomicUsize>,
    read_delay: Option<Duration>,
}

impl Read for Tracked {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(delay) = self.read_delay {
            std::thread::sleep(delay);
        }
        self.inner.read(buf)
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SourceReader for CountingFs {
    fn open(&self, root: &Path, relative: &str) -> io::Result<SourceFile> {
        if self.fail == Some(relative) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "access denied"));
        }
        let file = LocalFs.open(root, relative)?;
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
        // Hold the handle a little so tasks overlap.
        std::thread::sleep(Duration::from_millis(1));
        Ok(SourceFile {
            len: file.len,
            mode: file.mode,
            reader: Box::new(Tracked {
                inner: file.reader,
                open: Arc::clone(&self.open),
                read_delay: self.read_delay,
            }),
        })
    }
}

/// Reader that delays opening selected files.
struct SlowFs {
    delays: HashMap<String, Duration>,
}

impl SourceReader for SlowFs {
    fn open(&self, root: &Path, relative: &str) -> io::Result<SourceFile> {
        if let Some(delay) = self.delays.get(relative) {
            std::thread::sleep(*delay);
        }
        LocalFs.open(root, relative)
    }
}

/// Reader that fails for exactly one path.
struct FailingFs {
    fail: &'static str,
}

impl SourceReader for FailingFs {
    fn open(&self, root: &Path, relative: &str) -> io::Result<SourceFile> {
        if relative == self.fail {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "access denied"));
        }
        LocalFs.open(root, relative)
    }
}

// ---------- tests ----------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn report_covers_every_listed_file_with_exact_sizes() {
    let pkg = sample_package();
    let report = PkgSize::default()
        .compute(Some(pkg.path()), &PkgSizeOptions::default())
        .await
        .unwrap();

    let listed = WalkLister.list(pkg.path()).unwrap();
    assert_eq!(report.files.len(), listed.len());
    assert_eq!(report.pkg_path, pkg.path().canonicalize().unwrap());
    assert!(report.tarball_size > 0);

    for (entry, relative) in report.files.iter().zip(&listed) {
        assert_eq!(entry.path, format!("/{relative}"));
        let raw = fs::metadata(pkg.path().join(relative)).unwrap().len();
        assert_eq!(entry.size, Some(raw), "{relative}");
        assert!(entry.size_gzip.is_some());
        assert!(entry.size_brotli.is_some());
    }
    assert!(report.files.iter().all(|f| !f.path.contains("node_modules")));
    assert!(report.files.iter().any(|f| f.path == "/lib/index.js"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn repeated_runs_are_identical() {
    let pkg = sample_package();
    let options = PkgSizeOptions::default();
    let first = PkgSize::default().compute(Some(pkg.path()), &options).await.unwrap();
    let second = PkgSize::default().compute(Some(pkg.path()), &options).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn file_order_follows_the_lister_despite_latency() {
    let dir = tempdir().unwrap();
    let listed: Vec<String> = (0..12).map(|i| format!("src/file_{i:02}.js")).collect();
    let mut delays = HashMap::new();
    for (i, relative) in listed.iter().enumerate() {
        write(dir.path(), relative, format!("export const n = {i};\n").as_bytes());
        // Earlier files are the slowest to open.
        delays.insert(relative.clone(), Duration::from_millis((12 - i as u64) * 4));
    }

    let pipeline = PkgSize::new(
        Arc::new(StubLister(listed.clone())),
        Arc::new(SlowFs { delays }),
    );
    let options = PkgSizeOptions::default().with_concurrency(4);
    let report = pipeline.compute(Some(dir.path()), &options).await.unwrap();

    let got: Vec<String> = report.files.iter().map(|f| f.path.clone()).collect();
    let expected: Vec<String> = listed.iter().map(|r| format!("/{r}")).collect();
    assert_eq!(got, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn open_handles_stay_within_the_concurrency_bound() {
    let dir = tempdir().unwrap();
    let listed: Vec<String> = (0..60).map(|i| format!("lib/mod_{i}.js")).collect();
    for relative in &listed {
        write(dir.path(), relative, &b"const value = Math.random();\n".repeat(20));
    }

    let cases = [
        (SizeKind::ALL.to_vec(), 30),
        (vec![SizeKind::Gzip], 10),
        (vec![], 10),
    ];
    for (sizes, bound) in cases {
        let counting = Arc::new(CountingFs::default());
        let source = Arc::clone(&counting) as Arc<dyn SourceReader>;
        let pipeline = PkgSize::new(Arc::new(StubLister(listed.clone())), source);
        let options = PkgSizeOptions::default().with_sizes(sizes.clone()).with_concurrency(10);
        let report = pipeline.compute(Some(dir.path()), &options).await.unwrap();

        assert_eq!(report.files.len(), 60);
        let peak = counting.peak.load(Ordering::SeqCst);
        assert!(peak <= bound, "peak {peak} open handles exceeds {bound} for {sizes:?}");
        assert!(peak >= 1);
        assert_eq!(counting.open.load(Ordering::SeqCst), 0, "handles leaked");
        // One pass per metric per file plus one pass for the tarball.
        assert_eq!(counting.total.load(Ordering::SeqCst), 60 * sizes.len() + 60);
    }
}

#[tokio::test]
async fn ignored_files_leave_both_the_list_and_the_tarball() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.js", b"console.log('a');\n");
    write(dir.path(), "b.js", b"console.log('b');\n");
    write(dir.path(), "test/c.js", b"console.log('c');\n");

    let lister = StubLister(names(&["a.js", "b.js", "test/c.js"]));
    let pipeline = PkgSize::new(Arc::new(lister), Arc::new(LocalFs));
    let options = PkgSizeOptions::default().with_ignore_files("**/test/**");
    let report = pipeline.compute(Some(dir.path()), &options).await.unwrap();

    let paths: Vec<&str> = report.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["/a.js", "/b.js"]);

    let expected = estimate(&dir.path().canonicalize().unwrap(), &["a.js", "b.js"]).await;
    assert_eq!(report.tarball_size, expected);
}

#[tokio::test]
async fn empty_package_is_not_an_error() {
    let dir = tempdir().unwrap();
    let pipeline = PkgSize::new(Arc::new(StubLister(Vec::new())), Arc::new(LocalFs));
    let report = pipeline
        .compute(Some(dir.path()), &PkgSizeOptions::default())
        .await
        .unwrap();

    assert!(report.files.is_empty());
    assert_eq!(report.tarball_size, estimate(dir.path(), &[]).await);
}

#[tokio::test]
async fn no_requested_sizes_still_measures_the_tarball() {
    let pkg = sample_package();
    let options = PkgSizeOptions::default().with_sizes([]);
    let report = PkgSize::default().compute(Some(pkg.path()), &options).await.unwrap();

    assert!(report.tarball_size > 0);
    assert!(!report.files.is_empty());
    for entry in &report.files {
        assert_eq!((entry.size, entry.size_gzip, entry.size_brotli), (None, None, None));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_unreadable_file_fails_the_whole_batch() {
    let dir = tempdir().unwrap();
    for name in ["a.js", "b.js", "c.js"] {
        write(dir.path(), name, b"x");
    }
    let pipeline = PkgSize::new(
        Arc::new(StubLister(names(&["a.js", "b.js", "c.js"]))),
        Arc::new(FailingFs { fail: "b.js" }),
    );
    let err = pipeline
        .compute(Some(dir.path()), &PkgSizeOptions::default())
        .await
        .unwrap_err();

    match &err {
        PkgSizeError::Io { path, source } => {
            assert!(path.ends_with("b.js"), "{}", path.display());
            assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_package_path_is_a_resolution_error() {
    let dir = tempdir().unwrap();
    let err = PkgSize::default()
        .compute(Some(&dir.path().join("missing")), &PkgSizeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PkgSizeError::Resolution { .. }), "{err}");
}

#[tokio::test]
async fn directory_without_manifest_is_a_listing_error() {
    let dir = tempdir().unwrap();
    write(dir.path(), "index.js", b"x");
    let err = PkgSize::default()
        .compute(Some(dir.path()), &PkgSizeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PkgSizeError::Listing { .. }), "{err}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_batch_leaves_no_file_open() {
    let dir = tempdir().unwrap();
    write(dir.path(), "big.js", &b"const filler = 'abcdefghij';\n".repeat(45_000));
    write(dir.path(), "bad.js", b"x");

    let counting = Arc::new(CountingFs {
        fail: Some("bad.js"),
        read_delay: Some(Duration::from_millis(5)),
        ..CountingFs::default()
    });
    let source = Arc::clone(&counting) as Arc<dyn SourceReader>;
    let pipeline = PkgSize::new(Arc::new(StubLister(names(&["big.js", "bad.js"]))), source);

    let err = pipeline
        .compute(Some(dir.path()), &PkgSizeOptions::default())
        .await
        .unwrap_err();

    assert!(err.path().unwrap().ends_with("bad.js"), "{err}");
    assert!(counting.total.load(Ordering::SeqCst) >= 1);
    assert_eq!(counting.open.load(Ordering::SeqCst), 0, "readers outlived the failed run");
}
