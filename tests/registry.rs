use anyhow::Result;
use datarec::paths;
use datarec::registry::VersionDescriptor;
use datarec::resources::ResourceKind;
use datarec::testing::{TempCache, TempDataDir, rows};
use datarec::{DatasetVersion, ErrorKind, Metric, Registry, StepName, Value};

const DATASET: &str = r#"
name: toy
versions: [v1, v2]
latest: v2
source: https://example.org/toy
"#;

const VERSION: &str = r#"
sources:
  toy-src:
    source_type: manual
    args:
      filename: ratings.tsv
      message: Place the ratings file by hand.
resources:
  interactions:
    type: interactions
    format: transactions_tabular
    source_name: toy-src
    required: true
    schema:
      sep: "\t"
      header: false
      cols: [user_id, item_id, rating, timestamp]
      user_col: user_id
      item_col: item_id
      rating_col: rating
      timestamp_col: timestamp
  readme:
    type: documentation
    source_name: toy-src
sources_info:
  required: [toy-src]
  interactions: interactions
"#;

const METRICS: &str = "n_users: 3\ndensity: 0.5\n";

const RATINGS: &str = "1\t10\t4\t100\n1\t11\t2\t101\n2\t10\t5\t102\n3\t12\t3\t103\n";

fn toy_registry() -> Result<(TempDataDir, Registry)> {
    let dir = TempDataDir::new()?;
    dir.write("datasets/toy.yml", DATASET)?;
    dir.write("versions/toy_v1.yml", VERSION)?;
    dir.write("versions/toy_v2.yml", VERSION)?;
    dir.write("metrics/toy_v1.yml", METRICS)?;
    let registry = Registry::new(dir.path());
    Ok((dir, registry))
}

#[test]
fn versions_resolve_through_latest() -> Result<()> {
    let (_dir, registry) = toy_registry()?;
    assert_eq!(registry.available_datasets()?, vec!["toy".to_string()]);
    assert_eq!(registry.versions("toy")?, vec!["v1".to_string(), "v2".to_string()]);
    assert_eq!(registry.resolve_version("toy", "latest")?, "v2");
    assert_eq!(registry.resolve_version("toy", "v1")?, "v1");

    let err = registry.resolve_version("toy", "v3").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    let err = registry.dataset("nope").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    Ok(())
}

#[test]
fn metrics_are_optional() -> Result<()> {
    let (_dir, registry) = toy_registry()?;
    let metrics = registry
        .metrics("toy", "v1")?
        .ok_or_else(|| anyhow::anyhow!("v1 metrics missing"))?;
    assert_eq!(metrics["n_users"], Metric::Count(3));
    assert_eq!(metrics["density"], Metric::Real(0.5));
    assert_eq!(registry.metrics("toy", "latest")?, None);
    Ok(())
}

#[test]
fn version_links_resources_to_sources() -> Result<()> {
    let out = TempDataDir::new()?;
    let desc: VersionDescriptor = serde_yaml::from_str(VERSION)?;
    let version = DatasetVersion::with_output_folder("toy", "v1", desc, out.path())?;

    assert_eq!(version.name(), "toy");
    assert_eq!(version.interactions_name()?, "interactions");
    assert_eq!(version.resources_of(ResourceKind::Documentation).len(), 1);
    let resource = version
        .resource("interactions")
        .ok_or_else(|| anyhow::anyhow!("no interactions resource"))?;
    assert_eq!(resource.path()?, out.join("ratings.tsv"));
    assert_eq!(resource.source_name(), "toy-src");
    assert!(version.find_resource(|r| r.kind() == ResourceKind::Content).is_none());
    Ok(())
}

#[test]
fn broken_descriptors_are_config_errors() -> Result<()> {
    let out = TempDataDir::new()?;
    let cases = [
        VERSION.replace("source_name: toy-src\n    required", "source_name: other\n    required"),
        VERSION.replace("    format: transactions_tabular\n", ""),
        VERSION.replace("required: [toy-src]", "required: [missing]"),
    ];
    for text in cases {
        let desc: VersionDescriptor = serde_yaml::from_str(&text)?;
        let err = DatasetVersion::with_output_folder("toy", "v1", desc, out.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config, "{text}");
    }
    Ok(())
}

#[test]
fn loading_writes_and_reuses_the_snapshot() -> Result<()> {
    let cache = TempCache::new()?;
    let (_dir, registry) = toy_registry()?;
    let raw = paths::dataset_raw_directory("toy", "v1");
    assert!(raw.starts_with(cache.path()));
    std::fs::create_dir_all(&raw)?;
    std::fs::write(raw.join("ratings.tsv"), RATINGS)?;

    let mut version = registry.version("toy", "v1")?;
    version.prepare(false)?;
    let data = version.load(true, true)?;
    assert_eq!(data.len(), 4);
    assert_eq!(data.dataset_name(), Some("toy"));
    assert_eq!(data.version_name(), Some("v1"));
    assert_eq!(data.rating_col(), Some("rating"));
    assert_eq!(data.frame().require("item_id")?[3], Value::Int(12));

    let step = &data.pipeline().steps()[0];
    assert_eq!(step.name, StepName::Load);
    assert_eq!(step.operation, "registry_dataset");
    assert_eq!(
        step.params.get("dataset_name"),
        Some(&serde_yaml::Value::String("toy".into()))
    );
    assert!(paths::snapshot_path("toy", "v1").is_file());

    // the source file is no longer needed
    std::fs::remove_file(raw.join("ratings.tsv"))?;
    let mut again = registry.version("toy", "v1")?;
    let cached = again.load(true, false)?;
    assert_eq!(rows(&cached), rows(&data));
    assert_eq!(cached.pipeline(), data.pipeline());

    assert!(again.free_cache()?);
    assert!(!again.free_cache()?);
    Ok(())
}

#[test]
fn shipped_descriptors_build() -> Result<()> {
    let registry = Registry::default();
    let names = registry.available_datasets()?;
    assert!(names.contains(&"movielens".to_string()));
    for name in names {
        for version in registry.versions(&name)? {
            let built = registry.version(&name, &version)?;
            assert!(built.interactions_name().is_ok(), "{name} {version}");
        }
    }
    Ok(())
}
