use coffer_config::Settings;
use coffer_repository::encryption::KdfParams;
use coffer_repository::{Configuration, Context, Repository};
use coffer_snapshot::error::ErrorKind;
use coffer_snapshot::importer::{FileInfo, FsImporter, MockFile, MockImporter, ScanError, ScanRecord, ScanResult};
use coffer_snapshot::{Builder, Snapshot};
use coffer_storage::BackendHandle;
use coffer_storage::backend::{MockBackend, from_location};
use std::io;
use std::sync::Arc;

async fn open(temp_dir: &tempfile::TempDir, backend: BackendHandle, passphrase: Option<&str>) -> Repository {
    let ctx = Context::new(Settings::with_cache_dir(temp_dir.path().join("cache"))).with_ephemeral_cache(true);
    let Ok(repository) = Repository::open(ctx, backend, passphrase).await else {
        panic!("repository should open");
    };
    repository
}

async fn mock_repository(temp_dir: &tempfile::TempDir) -> Repository {
    let backend: BackendHandle = Arc::new(MockBackend::default());
    Repository::create(&backend, &Configuration::new()).await.unwrap();
    open(temp_dir, backend, None).await
}

#[tokio::test]
async fn test_simple_backup() {
    let temp_dir = tempfile::tempdir().unwrap();
    let repository = mock_repository(&temp_dir).await;
    let importer = MockImporter::new([
        MockFile::new("hello.txt", 0o644, "hello world!\n"),
        MockFile::new("unreadable", 0, "wooo\n"),
    ]);

    let header = Builder::new(&repository).backup(&importer).await.unwrap();
    assert_eq!(header.sources.len(), 1);
    let total = header.sources[0].summary.total();
    assert_eq!(total.errors, 1);
    assert_eq!(total.files, 1);
    assert_eq!(header.client, repository.context().settings().client);

    assert_eq!(Snapshot::list(&repository).await.unwrap(), vec![header.identifier]);
    let snapshot = Snapshot::load(&repository, &header.identifier).await.unwrap();
    assert_eq!(snapshot.header().sources, header.sources);
    assert_eq!(snapshot.identifier(), header.identifier);
    let mut fs = snapshot.filesystem().await.unwrap();
    fs.chroot("/").unwrap();
    assert_eq!(fs.read("hello.txt").await.unwrap(), b"hello world!\n");
    let err = fs.open("unreadable").await.unwrap_err();
    assert!(err.is_not_found());

    repository.close().await.unwrap();
}

#[tokio::test]
async fn test_excludes() {
    let temp_dir = tempfile::tempdir().unwrap();
    let repository = mock_repository(&temp_dir).await;
    let importer = MockImporter::new((0..10).map(|i| MockFile::new(format!("hello{i}"), 0o644, "hello world\n")));

    let mut builder = Builder::new(&repository).with_excludes(["/hello0", "/hello2", "/hello4", "/hello8"]).unwrap();
    let header = builder.backup(&importer).await.unwrap();
    assert_eq!(header.sources[0].summary.directory.files, 6);

    let snapshot = Snapshot::load(&repository, &header.identifier).await.unwrap();
    let fs = snapshot.filesystem().await.unwrap();
    assert!(fs.stat("hello1").is_ok());
    assert!(fs.stat("hello2").unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_invalid_exclude() {
    let temp_dir = tempfile::tempdir().unwrap();
    let repository = mock_repository(&temp_dir).await;
    let Err(err) = Builder::new(&repository).with_excludes(["/[oops"]) else {
        panic!("pattern should not compile");
    };
    assert!(matches!(&*err, ErrorKind::Pattern(_)));
}

#[tokio::test]
async fn test_many_errors() {
    let temp_dir = tempfile::tempdir().unwrap();
    let repository = mock_repository(&temp_dir).await;
    let names = ["a", "b", "c", "d", "e", "f"];
    let importer = MockImporter::with_generator("/", move || {
        let mut results: Vec<ScanResult> = vec![ScanRecord::new("/", FileInfo::directory("/")).into()];
        for first in names {
            results.push(ScanRecord::new(format!("/{first}"), FileInfo::directory(first)).into());
            for second in names {
                let directory = format!("/{first}/{second}");
                results.push(ScanRecord::new(directory.clone(), FileInfo::directory(second)).into());
                for leaf in 0..10 {
                    let path = format!("{directory}/{leaf}");
                    let result = match leaf % 2 {
                        0 => ScanRecord::new(path, FileInfo::file(leaf.to_string(), 11))
                            .with_reader(coffer_snapshot::importer::LazyReader::from_bytes("hello world"))
                            .into(),
                        _ => ScanError::new(path, io::Error::from(io::ErrorKind::PermissionDenied)).into(),
                    };
                    results.push(result);
                }
            }
        }
        results
    });

    let header = Builder::new(&repository).backup(&importer).await.unwrap();
    let summary = header.sources[0].summary;
    assert_eq!(summary.directory.directories, 6);
    assert_eq!(summary.below.files, 180);
    assert_eq!(summary.below.directories, 36);
    assert_eq!(summary.below.errors, 180);
    assert_eq!(summary.below.size, 180 * 11);

    let snapshot = Snapshot::load(&repository, &header.identifier).await.unwrap();
    let fs = snapshot.filesystem().await.unwrap();
    let leaf_dir = fs.stat("/c/d").unwrap();
    let own = leaf_dir.summary().unwrap().directory;
    assert_eq!((own.files, own.errors, own.directories), (5, 5, 0));
    let mid = fs.stat("/c").unwrap().summary().unwrap().total();
    assert_eq!((mid.files, mid.errors, mid.directories), (30, 30, 6));
}

#[tokio::test]
async fn test_encrypted_repository() {
    let temp_dir = tempfile::tempdir().unwrap();
    let backend: BackendHandle = Arc::new(MockBackend::default());
    let (configuration, _key) = Configuration::encrypted(KdfParams::with_iterations(16), "correct horse").unwrap();
    Repository::create(&backend, &configuration).await.unwrap();

    let repository = open(&temp_dir, backend.clone(), Some("correct horse")).await;
    let importer = MockImporter::new([MockFile::new("secret/plans.txt", 0o600, "attack at dawn")]);
    let header = Builder::new(&repository).backup(&importer).await.unwrap();
    repository.close().await.unwrap();

    let repository = open(&temp_dir, backend, Some("correct horse")).await;
    let snapshot = Snapshot::load(&repository, &header.identifier).await.unwrap();
    let fs = snapshot.filesystem().await.unwrap();
    assert_eq!(fs.read("/secret/plans.txt").await.unwrap(), b"attack at dawn");
}

#[tokio::test]
async fn test_missing_snapshot() {
    let temp_dir = tempfile::tempdir().unwrap();
    let repository = mock_repository(&temp_dir).await;
    let identifier = coffer_envelope::Mac::from_bytes([9; 32]);
    let Err(err) = Snapshot::load(&repository, &identifier).await else {
        panic!("nothing was stored");
    };
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_local_filesystem_round_trip() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = temp_dir.path().join("source");
    std::fs::create_dir_all(source.join("docs/drafts")).unwrap();
    std::fs::write(source.join("docs/letter.txt"), b"dear reader").unwrap();
    std::fs::write(source.join("docs/drafts/v1.txt"), b"draft").unwrap();
    std::fs::write(source.join("scratch.tmp"), b"junk").unwrap();

    let location = temp_dir.path().join("repository");
    let Ok(backend) = from_location(location.to_str().unwrap()) else {
        panic!("local backend should open");
    };
    Repository::create(&backend, &Configuration::new()).await.unwrap();
    let repository = open(&temp_dir, backend, None).await;

    let importer = FsImporter::from_context(&source, repository.context()).unwrap();
    let mut builder = Builder::new(&repository).with_excludes(["*.tmp"]).unwrap();
    let header = builder.backup(&importer).await.unwrap();
    let total = header.sources[0].summary.total();
    assert_eq!(total.files, 2);
    assert_eq!(total.directories, 2);
    assert_eq!(total.errors, 0);
    assert_eq!(header.sources[0].importer.kind, "fs");
    assert_eq!(header.sources[0].importer.origin, repository.context().settings().origin);

    let snapshot = Snapshot::load(&repository, &header.identifier).await.unwrap();
    let mut fs = snapshot.filesystem().await.unwrap();
    fs.chroot("docs").unwrap();
    assert_eq!(fs.read("letter.txt").await.unwrap(), b"dear reader");
    assert_eq!(fs.read("drafts/v1.txt").await.unwrap(), b"draft");
    assert!(fs.stat("../scratch.tmp").unwrap_err().is_not_found());
}
