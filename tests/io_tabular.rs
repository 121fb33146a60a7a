use anyhow::Result;
use datarec::io::{
    Engine, TabularOptions, TabularWriteOptions, read_transactions_tabular,
    read_transactions_tabular_raw, write_transactions_tabular,
};
use datarec::testing::{InteractionsBuilder, TempDataDir, assert_same_rows};
use datarec::{ErrorKind, StepName, Value};

const RATINGS_TSV: &str = "1\t10\t4\t881250949\n1\t11\t3\t881250950\n2\t10\t5\t881250951\n";

fn tsv_options() -> TabularOptions {
    TabularOptions {
        cols: Some(vec![
            "user_id".into(),
            "item_id".into(),
            "rating".into(),
            "timestamp".into(),
        ]),
        ..TabularOptions::new("\t", "user_id", "item_id")
            .rating("rating")
            .timestamp("timestamp")
            .header(false)
    }
}

#[test]
fn headerless_tsv_with_names() -> Result<()> {
    let dir = TempDataDir::new()?;
    let path = dir.write("u.data", RATINGS_TSV)?;

    let data = read_transactions_tabular(&path, &tsv_options())?;
    assert_eq!(data.len(), 3);
    assert_eq!(data.user_col(), Some("user_id"));
    assert_eq!(data.timestamp_col(), Some("timestamp"));
    let ratings = data.frame().require("rating")?;
    assert_eq!(ratings, &[Value::Int(4), Value::Int(3), Value::Int(5)]);

    let steps = data.pipeline().steps();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].name, StepName::Read);
    assert_eq!(steps[0].operation, "read_transactions_tabular");
    assert_eq!(
        steps[0].params.get("filename"),
        Some(&serde_yaml::Value::String("u.data".into()))
    );
    assert!(!steps[0].params.contains_key("filepath"));
    Ok(())
}

#[test]
fn header_and_positional_columns() -> Result<()> {
    let dir = TempDataDir::new()?;
    let path = dir.write("ratings.csv", "userId,movieId,rating\n7,\"a,b\",3.5\n8,c,4\n")?;

    let by_name = read_transactions_tabular(&path, &TabularOptions::new(",", "userId", "movieId").rating("rating"))?;
    assert_eq!(by_name.frame().require("movieId")?[0], Value::Str("a,b".into()));

    let by_index = read_transactions_tabular(&path, &TabularOptions::new(",", 0usize, 1usize))?;
    assert_eq!(by_index.user_col(), Some("userId"));
    assert_eq!(by_index.len(), 2);

    let err = read_transactions_tabular(&path, &TabularOptions::new(",", "userId", "nope")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    let err = read_transactions_tabular(&path, &TabularOptions::new(",", 0usize, 9usize)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    Ok(())
}

#[test]
fn multi_character_separator_falls_back_to_split() -> Result<()> {
    let dir = TempDataDir::new()?;
    let path = dir.write("ratings.dat", "1::1193::5::978300760\n1::661::3::978302109\n")?;
    let opts = TabularOptions {
        sep: "::".into(),
        engine: Engine::Split,
        ..tsv_options()
    };
    let data = read_transactions_tabular(&path, &opts)?;
    assert_eq!(data.len(), 2);
    assert_eq!(data.frame().require("item_id")?[1], Value::Int(661));
    Ok(())
}

#[test]
fn streaming_matches_eager_and_encodes_in_first_seen_order() -> Result<()> {
    let dir = TempDataDir::new()?;
    let path = dir.write("u.data", RATINGS_TSV)?;

    let eager = read_transactions_tabular_raw(&path, &tsv_options())?;
    let streamed = read_transactions_tabular_raw(&path, &tsv_options().streaming(1))?;
    assert_eq!(eager.frame, streamed.frame);

    let encoded = read_transactions_tabular(&path, &tsv_options().streaming(2).encode_ids(true))?;
    assert!(encoded.users_encoded() && encoded.items_encoded());
    assert_eq!(
        encoded.frame().require("item_id")?,
        &[Value::Int(0), Value::Int(1), Value::Int(0)]
    );
    assert_eq!(encoded.item_encoder().decode(1), Some(&Value::Int(11)));
    Ok(())
}

#[test]
fn missing_file_is_not_found() {
    let err = read_transactions_tabular("/definitely/not/here.tsv", &tsv_options()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn write_then_read_preserves_interactions() -> Result<()> {
    let dir = TempDataDir::new()?;
    let data = InteractionsBuilder::new()
        .add_event(1, 10, 4.5, 100)
        .add_event(2, "x7", 3.0, 200)
        .build()?;

    let path = write_transactions_tabular(&data, dir.join("out.tsv"), &TabularWriteOptions::default())?;
    let text = dir.read("out.tsv")?;
    assert_eq!(text.lines().next(), Some("user_id\titem_id\trating\ttimestamp"));

    let back = read_transactions_tabular(
        &path,
        &TabularOptions::new("\t", "user_id", "item_id")
            .rating("rating")
            .timestamp("timestamp"),
    )?;
    assert_same_rows(&back, &data);
    Ok(())
}

#[test]
fn writer_inclusion_flags() -> Result<()> {
    let dir = TempDataDir::new()?;
    let data = InteractionsBuilder::new().add_rated(1, 10, 4.0).build()?;

    let opts = TabularWriteOptions {
        header: false,
        include_rating: Some(false),
        sep: ",".into(),
        ..TabularWriteOptions::default()
    };
    write_transactions_tabular(&data, dir.join("plain.csv"), &opts)?;
    assert_eq!(dir.read("plain.csv")?, "1,10\n");

    let opts = TabularWriteOptions {
        include_timestamp: Some(true),
        ..TabularWriteOptions::default()
    };
    let err = write_transactions_tabular(&data, dir.join("bad.tsv"), &opts).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzip_round_trip_by_extension() -> Result<()> {
    let dir = TempDataDir::new()?;
    let data = InteractionsBuilder::new()
        .add_event(1, 10, 4.0, 100)
        .add_event(2, 11, 2.0, 101)
        .build()?;
    let path = write_transactions_tabular(&data, dir.join("out.tsv.gz"), &TabularWriteOptions::default())?;

    let raw = std::fs::read(&path)?;
    assert_eq!(&raw[..2], &[0x1f, 0x8b]);

    let back = read_transactions_tabular(
        &path,
        &TabularOptions::new("\t", "user_id", "item_id")
            .rating("rating")
            .timestamp("timestamp"),
    )?;
    assert_same_rows(&back, &data);
    Ok(())
}
