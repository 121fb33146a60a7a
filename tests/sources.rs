use anyhow::Result;
use datarec::ErrorKind;
use datarec::sources::transport::drive_url;
use datarec::sources::{
    ChecksumAlgorithm, Source, SourceArgs, SourceDecl, SourceSet, SourceType, file_digest,
    verify_file,
};
use datarec::testing::TempDataDir;
use std::collections::BTreeMap;

const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";
const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

fn manual(filename: &str) -> SourceDecl {
    SourceDecl {
        source_type: SourceType::Manual,
        args: SourceArgs {
            filename: filename.into(),
            message: Some("Request access from the dataset owners.".into()),
            ..SourceArgs::default()
        },
    }
}

#[test]
fn digests_match_known_values() -> Result<()> {
    let dir = TempDataDir::new()?;
    let path = dir.write("hello.txt", "hello")?;
    assert_eq!(file_digest(&path, ChecksumAlgorithm::Md5)?, HELLO_MD5);
    assert_eq!(file_digest(&path, ChecksumAlgorithm::Sha256)?, HELLO_SHA256);
    assert_eq!(file_digest(&path, ChecksumAlgorithm::Sha512)?.len(), 128);

    verify_file(&path, &HELLO_MD5.to_uppercase(), ChecksumAlgorithm::Md5)?;
    let err = verify_file(&path, HELLO_SHA256, ChecksumAlgorithm::Md5).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);

    let err = file_digest(&dir.join("absent"), ChecksumAlgorithm::Md5).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    Ok(())
}

#[test]
fn declarations_are_validated() {
    let http = SourceDecl {
        source_type: SourceType::Http,
        args: SourceArgs {
            filename: "ml-100k.zip".into(),
            ..SourceArgs::default()
        },
    };
    assert_eq!(Source::new("zip", http).unwrap_err().kind(), ErrorKind::Config);

    let nested = SourceDecl {
        source_type: SourceType::Nested,
        args: SourceArgs {
            filename: "u.data".into(),
            ..SourceArgs::default()
        },
    };
    assert_eq!(Source::new("inner", nested).unwrap_err().kind(), ErrorKind::Config);
    assert_eq!(Source::new("blank", manual("")).unwrap_err().kind(), ErrorKind::Config);
}

#[test]
fn manual_source_with_a_placed_file_prepares_once() -> Result<()> {
    let dir = TempDataDir::new()?;
    dir.write("ratings.csv", "hello")?;
    let mut decl = manual("ratings.csv");
    decl.args.checksum = Some(HELLO_MD5.into());

    let mut source = Source::new("ratings", decl)?;
    assert_eq!(source.file_path().unwrap_err().kind(), ErrorKind::Config);
    source.set_output_folder(dir.path());
    assert!(source.is_locally_available());

    source.prepare()?;
    assert!(source.is_prepared());
    source.prepare()?;
    assert_eq!(source.resource_path("ratings")?, dir.join("ratings.csv"));

    source.set_output_folder(dir.path());
    assert!(!source.is_prepared());
    Ok(())
}

#[test]
fn checksum_mismatch_leaves_the_source_unprepared() -> Result<()> {
    let dir = TempDataDir::new()?;
    dir.write("ratings.csv", "tampered")?;
    let mut decl = manual("ratings.csv");
    decl.args.checksum = Some(HELLO_MD5.into());
    let mut source = Source::new("ratings", decl)?;
    source.set_output_folder(dir.path());

    let err = source.prepare().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert!(!source.is_prepared());
    Ok(())
}

#[test]
fn manual_source_without_the_file_is_not_found() -> Result<()> {
    // Confirmation is only awaited on an interactive stdin.
    if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Ok(());
    }
    let dir = TempDataDir::new()?;
    let mut source = Source::new("ratings", manual("ratings.csv"))?;
    source.set_output_folder(dir.path());
    let err = source.prepare().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(!source.is_prepared());
    Ok(())
}

#[test]
fn drive_links_resolve_to_the_file_id() {
    for link in [
        "https://drive.google.com/file/d/ABC123/view?usp=sharing",
        "https://drive.google.com/open?id=ABC123&authuser=0",
        "ABC123",
    ] {
        assert!(drive_url(link).contains("id=ABC123&"), "{link}");
    }
}

#[test]
fn nested_sources_need_a_known_parent() -> Result<()> {
    let dir = TempDataDir::new()?;
    let mut decls = BTreeMap::new();
    decls.insert(
        "inner".to_string(),
        SourceDecl {
            source_type: SourceType::Nested,
            args: SourceArgs {
                filename: "u.data".into(),
                parent_source_name: Some("bundle".into()),
                ..SourceArgs::default()
            },
        },
    );
    let err = SourceSet::new(decls.clone(), dir.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);

    // a parent that does not list the child among its inner paths
    decls.insert("bundle".to_string(), manual("bundle.tar"));
    let err = SourceSet::new(decls, dir.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    Ok(())
}

#[cfg(feature = "archive-tar")]
#[test]
fn nested_source_is_unpacked_from_its_parent() -> Result<()> {
    use datarec::sources::ArchiveKind;

    let staging = TempDataDir::new()?;
    let payload = staging.write("ratings.csv", "hello")?;
    let out = TempDataDir::new()?;
    {
        let file = std::fs::File::create(out.join("bundle.tar"))?;
        let mut builder = tar::Builder::new(file);
        builder.append_path_with_name(&payload, "bundle/ratings.csv")?;
        builder.finish()?;
    }

    let mut parent = manual("bundle.tar");
    parent.args.archive = Some(ArchiveKind::Tar);
    parent
        .args
        .inner_paths
        .insert("ratings".into(), "bundle/ratings.csv".into());
    let child = SourceDecl {
        source_type: SourceType::Nested,
        args: SourceArgs {
            filename: "ratings.csv".into(),
            parent_source_name: Some("bundle".into()),
            checksum: Some(HELLO_SHA256.into()),
            checksum_algorithm: ChecksumAlgorithm::Sha256,
            ..SourceArgs::default()
        },
    };
    let decls = BTreeMap::from([("bundle".to_string(), parent), ("ratings".to_string(), child)]);

    let mut set = SourceSet::new(decls, out.path())?;
    assert_eq!(set.len(), 2);
    let nested = set.get("ratings").ok_or_else(|| anyhow::anyhow!("no nested source"))?;
    assert_eq!(nested.file_path()?, out.join("bundle/ratings.csv"));
    assert!(!nested.is_locally_available());

    set.prepare("ratings")?;
    assert!(set.get("bundle").is_some_and(|s| s.is_prepared()));
    assert!(set.get("ratings").is_some_and(|s| s.is_prepared()));
    assert_eq!(out.read("bundle/ratings.csv")?, "hello");

    let resources = set.get_resources("bundle", false)?;
    assert_eq!(resources["ratings"], out.join("bundle/ratings.csv"));
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzip_bundles_unpack_to_a_single_file() -> Result<()> {
    use datarec::sources::{ArchiveKind, unpack};
    use std::io::Write;

    let dir = TempDataDir::new()?;
    let archive = dir.join("ratings.csv.gz");
    {
        let file = std::fs::File::create(&archive)?;
        let mut enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        enc.write_all(b"1,2,3\n")?;
        enc.finish()?;
    }
    let out = unpack(&archive, ArchiveKind::Gzip, &dir.join("unpacked"))?;
    assert_eq!(out, dir.join("unpacked/ratings.csv"));
    assert_eq!(std::fs::read_to_string(out)?, "1,2,3\n");

    let bogus = dir.write("bogus.gz", "not gzip")?;
    let err = unpack(&bogus, ArchiveKind::Gzip, dir.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    Ok(())
}
