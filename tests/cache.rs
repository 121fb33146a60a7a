use anyhow::Result;
use datarec::{Error, ErrorKind};
use datarec::cache::{
    SummarySort, cache_size, cache_summary, clear_cache, get_cache_dir, list_cache, use_cache_dir,
};
use datarec::testing::TempCache;
use std::fs;
use std::path::Path;

fn populate(root: &Path) -> Result<()> {
    fs::create_dir_all(root.join("movielens/100k/raw"))?;
    fs::write(root.join("movielens/100k/raw/ml-100k.zip"), vec![0u8; 2048])?;
    fs::write(root.join("movielens/100k/movielens_100k.pkl"), vec![0u8; 512])?;
    fs::create_dir_all(root.join("netflix/latest"))?;
    fs::write(root.join("netflix/latest/notes.txt"), b"hello")?;
    Ok(())
}

#[test]
fn scoped_root_is_restored() -> Result<()> {
    let cache = TempCache::new()?;
    assert_eq!(get_cache_dir(), cache.path());

    let inner = tempfile::tempdir()?;
    {
        let guard = use_cache_dir(inner.path())?;
        assert_eq!(get_cache_dir(), guard.path());
    }
    assert_eq!(get_cache_dir(), cache.path());
    Ok(())
}

#[test]
fn listing_and_sizes() -> Result<()> {
    let cache = TempCache::new()?;
    populate(cache.path())?;

    assert_eq!(cache_size(None)?, 2048 + 512 + 5);
    assert_eq!(cache_size(Some(Path::new("movielens/100k/raw")))?, 2048);

    let top = list_cache(None, 1)?;
    let names: Vec<_> = top
        .iter()
        .filter_map(|e| e.path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    assert_eq!(names, vec!["movielens", "netflix"]);
    assert!(top.iter().all(|e| e.is_dir));

    let deep = list_cache(Some(Path::new("movielens")), 3)?;
    assert!(deep.iter().any(|e| e.path.ends_with("raw/ml-100k.zip") && e.size_bytes == 2048));

    let summary = cache_summary(SummarySort::Size)?;
    assert_eq!(summary[0].path.file_name().and_then(|n| n.to_str()), Some("movielens"));
    Ok(())
}

#[test]
fn clear_with_patterns_and_subpaths() -> Result<()> {
    let cache = TempCache::new()?;
    populate(cache.path())?;

    let removed = clear_cache(Some(Path::new("movielens")), &["**/*.pkl"], true)?;
    assert_eq!(removed.len(), 1);
    assert!(!cache.path().join("movielens/100k/movielens_100k.pkl").exists());
    assert!(cache.path().join("movielens/100k/raw/ml-100k.zip").exists());

    let removed = clear_cache(Some(Path::new("netflix")), &[], true)?;
    assert_eq!(removed, vec![cache.path().join("netflix")]);
    assert!(!cache.path().join("netflix").exists());

    clear_cache(None, &[], true)?;
    assert!(cache.path().exists());
    assert_eq!(fs::read_dir(cache.path())?.count(), 0);
    Ok(())
}

#[test]
fn escaping_the_root_fails_before_deleting() -> Result<()> {
    let cache = TempCache::new()?;
    populate(cache.path())?;
    let outside = cache.path().parent().map(|p| p.join("other"));

    let err = clear_cache(Some(Path::new("../other")), &[], true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    let err = clear_cache(Some(Path::new("/etc")), &[], true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    let err = clear_cache(Some(Path::new("movielens/../../x")), &[], true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(list_cache(Some(Path::new("..")), 1).is_err());

    assert_eq!(cache_size(None)?, 2048 + 512 + 5);
    if let Some(outside) = outside {
        assert!(!outside.exists());
    }
    Ok(())
}

#[cfg(unix)]
#[test]
fn symlinks_never_lead_out_of_the_root() -> Result<()> {
    let cache = TempCache::new()?;
    populate(cache.path())?;
    let outside = tempfile::tempdir()?;
    let precious = outside.path().join("precious.txt");
    fs::write(&precious, b"keep me")?;
    std::os::unix::fs::symlink(outside.path(), cache.path().join("link"))?;

    let err = clear_cache(Some(Path::new("link/precious.txt")), &[], true).unwrap_err();
    assert!(matches!(err, Error::OutsideCache { .. }), "{err}");
    let err = clear_cache(None, &["netflix/**/*.txt", "link/*"], true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(cache_size(Some(Path::new("link"))).is_err());
    assert!(list_cache(Some(Path::new("link")), 1).is_err());
    assert!(precious.exists());
    // the mixed batch was refused as a whole
    assert!(cache.path().join("netflix/latest/notes.txt").exists());

    // removing the link itself only unlinks it
    let removed = clear_cache(Some(Path::new("link")), &[], true)?;
    assert_eq!(removed, vec![cache.path().join("link")]);
    assert!(fs::symlink_metadata(cache.path().join("link")).is_err());
    assert!(precious.exists());
    Ok(())
}

#[test]
fn clearing_without_force_needs_a_terminal() -> Result<()> {
    let cache = TempCache::new()?;
    populate(cache.path())?;
    // The test harness does not attach a terminal to stdin.
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        let removed = clear_cache(None, &[], false)?;
        assert!(removed.is_empty());
        assert_eq!(cache_size(None)?, 2048 + 512 + 5);
    }
    Ok(())
}
