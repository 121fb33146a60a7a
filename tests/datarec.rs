use anyhow::Result;
use datarec::frame::Frame;
use datarec::processing::{Binarize, Processor};
use datarec::testing::{InteractionsBuilder, TempCache, TempDataDir};
use datarec::{DataRec, ErrorKind, RawData, Role, Roles, Scope, Value, from_snapshot, paths};
use std::collections::HashMap;

fn strs(values: &[&str]) -> Vec<Value> {
    values.iter().map(|s| Value::Str((*s).to_string())).collect()
}

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().copied().map(Value::Int).collect()
}

fn raw_table() -> Result<RawData> {
    let frame = Frame::from_columns(vec![
        ("score", vec![Value::float(4.0), Value::float(2.0)]),
        ("uid", strs(&["a", "b"])),
        ("extra", ints(&[7, 8])),
        ("iid", strs(&["x", "y"])),
    ])?;
    Ok(RawData::new(frame, Roles::new("uid", "iid").with_rating("score")))
}

fn ab() -> Result<DataRec> {
    Ok(InteractionsBuilder::new()
        .add("a", "x")
        .add("b", "y")
        .add("a", "y")
        .build()?)
}

#[test]
fn role_columns_lead_the_table() -> Result<()> {
    let data = DataRec::new(raw_table()?, None)?;
    assert_eq!(data.frame().columns(), &["uid", "iid", "score", "extra"]);
    assert_eq!(data.role_col(Role::Rating), Some("score"));
    assert!(data.pipeline().steps().is_empty());

    let err = data.role_values(Role::Timestamp).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    Ok(())
}

#[test]
fn roles_must_name_existing_columns() -> Result<()> {
    let mut raw = raw_table()?;
    raw.roles.item = None;
    assert_eq!(DataRec::new(raw, None).unwrap_err().kind(), ErrorKind::Schema);

    let mut raw = raw_table()?;
    raw.roles.timestamp = Some("when".into());
    assert_eq!(DataRec::new(raw, None).unwrap_err().kind(), ErrorKind::Schema);

    assert!(DataRec::empty().is_empty());
    Ok(())
}

#[test]
fn reassigning_roles() -> Result<()> {
    let mut data = DataRec::new(raw_table()?, None)?;
    data.set_user_col("uid", true)?;
    assert_eq!(data.user_col(), Some("user_id"));
    assert!(!data.frame().has_column("uid"));

    data.set_timestamp_col("extra", false)?;
    assert_eq!(data.timestamp_col(), Some("extra"));
    assert_eq!(data.frame().columns(), &["user_id", "iid", "score", "extra"]);
    assert_eq!(data.role_values(Role::Timestamp)?, ints(&[7, 8]).as_slice());

    let err = data.set_item_col("genre", false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    Ok(())
}

#[test]
fn encode_and_decode_one_side() -> Result<()> {
    let mut data = ab()?;
    data.encode(Scope::Users)?;
    assert!(data.users_encoded());
    assert!(!data.items_encoded());
    assert_eq!(data.frame().require("user_id")?, ints(&[0, 1, 0]).as_slice());
    assert_eq!(data.user_encoder().decode(1), Some(&Value::Str("b".into())));

    // encoding twice is a no-op
    data.encode(Scope::Users)?;
    assert_eq!(data.frame().require("user_id")?, ints(&[0, 1, 0]).as_slice());

    data.decode(Scope::Users)?;
    assert!(!data.users_encoded());
    assert_eq!(data.frame().require("user_id")?, strs(&["a", "b", "a"]).as_slice());
    assert_eq!(data.user_encoder().len(), 2);
    Ok(())
}

#[test]
fn offsets_and_rebuilds() -> Result<()> {
    let mut data = ab()?;
    data.build_encoding(Scope::Items, 10)?;
    data.encode(Scope::Items)?;
    assert_eq!(data.frame().require("item_id")?, ints(&[10, 11, 11]).as_slice());

    // a rebuilt mapping re-encodes an encoded column
    data.build_encoding(Scope::Items, 5)?;
    assert_eq!(data.item_encoder().offset(), 5);
    assert_eq!(data.frame().require("item_id")?, ints(&[5, 6, 6]).as_slice());

    data.reset_encoding(Scope::Both)?;
    assert!(data.item_encoder().is_empty());
    assert_eq!(data.frame().require("item_id")?, strs(&["x", "y", "y"]).as_slice());
    Ok(())
}

#[test]
fn external_mappings() -> Result<()> {
    let mut data = ab()?;
    let forward = HashMap::from([(Value::Str("a".into()), 1), (Value::Str("b".into()), 0)]);
    data.apply_encoding(Scope::Users, forward)?;
    data.encode(Scope::Users)?;
    assert_eq!(data.frame().require("user_id")?, ints(&[1, 0, 1]).as_slice());

    let err = data
        .apply_encoding(Scope::Both, HashMap::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);

    let sparse = HashMap::from([(Value::Str("x".into()), 0), (Value::Str("y".into()), 5)]);
    let err = data.apply_encoding(Scope::Items, sparse).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    Ok(())
}

#[test]
fn snapshots_round_trip() -> Result<()> {
    let dir = TempDataDir::new()?;
    let rated = InteractionsBuilder::new()
        .add_event("a", "x", 4.0, 100)
        .add_event("b", "y", 1.5, 101)
        .build()?;
    let mut data = Binarize::new(3.0).process(&rated)?;
    data.encode(Scope::Both)?;

    let path = data.to_snapshot(Some(&dir.join("nested/data.pkl")))?;
    let back = from_snapshot(&path)?;
    assert_eq!(back, data);
    assert_eq!(back.pipeline().steps()[0].operation, "Binarize");

    let err = data.to_snapshot(None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
    let err = from_snapshot(dir.join("absent.pkl")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    let junk = dir.write("junk.pkl", [0xffu8, 0xff, 0xff])?;
    assert_eq!(from_snapshot(junk).unwrap_err().kind(), ErrorKind::Integrity);
    Ok(())
}

#[test]
fn tagged_snapshots_land_in_the_cache() -> Result<()> {
    let cache = TempCache::new()?;
    let data = ab()?.with_dataset("toy", "v1");
    let path = data.to_snapshot(None)?;
    assert_eq!(path, paths::snapshot_path("toy", "v1"));
    assert!(path.starts_with(cache.path()));
    assert_eq!(from_snapshot(&path)?.dataset_name(), Some("toy"));
    Ok(())
}
