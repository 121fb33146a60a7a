use anyhow::Result;
use datarec::export::{Elliot, ExportInput, Exporter, RecBole};
use datarec::io::{TabularOptions, read_transactions_tabular};
use datarec::pipeline::{Params, operation_table};
use datarec::processing::{Binarize, Processor};
use datarec::splitters::{RandomHoldOut, SplitKind, SplitResult, Splitter};
use datarec::testing::{InteractionsBuilder, TempDataDir, assert_same_rows, rows};
use datarec::{DataRec, Error, ErrorKind, Pipeline, Replayed, Step, StepName};
use std::path::Path;

const RATINGS: &str = "1\t10\t5\t100\n1\t11\t2\t101\n2\t10\t4\t102\n2\t12\t3\t103\n3\t11\t5\t104\n3\t12\t1\t105\n";

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

fn written_options() -> TabularOptions {
    TabularOptions::new("\t", "user_id", "item_id")
        .rating("rating")
        .timestamp("timestamp")
}

/// Read, binarize and split the sample file, returning the input folder with it.
fn prepared() -> Result<(TempDataDir, DataRec, SplitResult)> {
    let input = TempDataDir::new()?;
    let path = input.write("u.data", RATINGS)?;
    let data = read_transactions_tabular(&path, &tsv_options())?;
    let binarized = Binarize::new(3.0).process(&data)?;
    let splits = RandomHoldOut::new(0.34, 0.17, 42).split(&binarized)?;
    Ok((input, binarized, splits))
}

fn string_params(pairs: &[(&str, &str)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), serde_yaml::Value::String((*v).to_string())))
        .collect()
}

fn with_step(pipeline: &Pipeline, name: StepName, operation: &str, params: Params) -> Result<Pipeline> {
    Ok(pipeline.extended(Step::new(name, operation, params))?)
}

#[test]
fn lineage_round_trips_through_yaml() -> Result<()> {
    let (input, _, splits) = prepared()?;
    let lineage = splits[&SplitKind::Train].pipeline().clone();
    let names: Vec<StepName> = lineage.steps().iter().map(|s| s.name).collect();
    assert_eq!(names, vec![StepName::Read, StepName::Process, StepName::Split]);

    let text = lineage.to_yaml_string()?;
    assert!(text.starts_with("pipeline:"));
    assert_eq!(Pipeline::from_yaml_str(&text)?, lineage);

    let path = input.join("nested/pipeline.yml");
    lineage.to_yaml(&path)?;
    assert_eq!(Pipeline::from_yaml(&path)?, lineage);

    let err = Pipeline::from_yaml(input.join("missing.yml")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    Ok(())
}

#[test]
fn replay_rebuilds_the_same_splits() -> Result<()> {
    let (input, _, splits) = prepared()?;
    let lineage = splits[&SplitKind::Train].pipeline();

    let replayed = lineage
        .apply(Some(input.path()), None)?
        .into_splits()
        .ok_or_else(|| anyhow::anyhow!("expected splits"))?;
    assert_eq!(
        replayed.keys().copied().collect::<Vec<_>>(),
        vec![SplitKind::Train, SplitKind::Val, SplitKind::Test]
    );
    for (kind, part) in &splits {
        assert_eq!(rows(&replayed[kind]), rows(part));
        assert_eq!(replayed[kind].pipeline(), part.pipeline());
    }
    Ok(())
}

#[test]
fn replay_writes_every_split_with_a_suffix() -> Result<()> {
    let (input, _, splits) = prepared()?;
    let output = TempDataDir::new()?;
    let descriptor = with_step(
        splits[&SplitKind::Train].pipeline(),
        StepName::Write,
        "write_transactions_tabular",
        string_params(&[("filename", "out.tsv")]),
    )?;
    descriptor.to_yaml(input.join("pipeline.yml"))?;

    let loaded = Pipeline::from_yaml(input.join("pipeline.yml"))?;
    let replayed = loaded.apply(Some(input.path()), Some(output.path()))?;
    let files = replayed.files();
    assert_eq!(
        files,
        [
            output.join("out_train.tsv"),
            output.join("out_val.tsv"),
            output.join("out_test.tsv"),
        ]
    );
    for (kind, file) in [SplitKind::Train, SplitKind::Val, SplitKind::Test].iter().zip(files) {
        let back = read_transactions_tabular(file, &written_options())?;
        assert_same_rows(&back, &splits[kind]);
    }
    Ok(())
}

#[test]
fn split_suffix_goes_before_the_first_dot() -> Result<()> {
    let (input, _, splits) = prepared()?;
    let output = TempDataDir::new()?;
    let mut names = vec!["my.data.tsv"];
    if cfg!(feature = "compression-gzip") {
        names.push("out.tsv.gz");
    }
    for name in names {
        let descriptor = with_step(
            splits[&SplitKind::Train].pipeline(),
            StepName::Write,
            "write_transactions_tabular",
            string_params(&[("filename", name)]),
        )?;
        let replayed = descriptor.apply(Some(input.path()), Some(output.path()))?;
        let (stem, ext) = name
            .split_once('.')
            .ok_or_else(|| anyhow::anyhow!("{name} has no extension"))?;
        assert_eq!(
            replayed.files(),
            [
                output.join(format!("{stem}_train.{ext}")),
                output.join(format!("{stem}_val.{ext}")),
                output.join(format!("{stem}_test.{ext}")),
            ]
        );
        let back = read_transactions_tabular(&replayed.files()[0], &written_options())?;
        assert_same_rows(&back, &splits[&SplitKind::Train]);
    }
    Ok(())
}

#[test]
fn replay_write_selects_one_split() -> Result<()> {
    let (input, _, splits) = prepared()?;
    let output = TempDataDir::new()?;
    let descriptor = with_step(
        splits[&SplitKind::Train].pipeline(),
        StepName::Write,
        "write_transactions_tabular",
        string_params(&[("filename", "test.tsv"), ("split", "test")]),
    )?;
    let replayed = descriptor.apply(Some(input.path()), Some(output.path()))?;
    assert_eq!(replayed.files(), [output.join("test.tsv")]);
    let back = read_transactions_tabular(output.join("test.tsv"), &written_options())?;
    assert_same_rows(&back, &splits[&SplitKind::Test]);

    let bad = with_step(
        splits[&SplitKind::Train].pipeline(),
        StepName::Write,
        "write_transactions_tabular",
        string_params(&[("filename", "x.tsv"), ("split", "holdout")]),
    )?;
    let err = bad.apply(Some(input.path()), Some(output.path())).unwrap_err();
    assert!(matches!(err, Error::Replay(_)));
    Ok(())
}

#[test]
fn replay_write_with_an_absolute_path() -> Result<()> {
    let (input, binarized, _) = prepared()?;
    let output = TempDataDir::new()?;
    let target = output.join("all.jsonl");
    let target_str = target.to_string_lossy().into_owned();
    let descriptor = with_step(
        binarized.pipeline(),
        StepName::Write,
        "write_transactions_jsonl",
        string_params(&[("filepath", target_str.as_str())]),
    )?;
    let replayed = descriptor.apply(Some(input.path()), None)?;
    assert_eq!(replayed.files(), [target.clone()]);
    assert_eq!(std::fs::read_to_string(&target)?.lines().count(), 6);

    let both = with_step(
        binarized.pipeline(),
        StepName::Write,
        "write_transactions_jsonl",
        string_params(&[("filepath", target_str.as_str()), ("filename", "all.jsonl")]),
    )?;
    let err = both.apply(Some(input.path()), Some(output.path())).unwrap_err();
    assert!(matches!(err, Error::Replay(_)));

    let needs_folder = with_step(
        binarized.pipeline(),
        StepName::Write,
        "write_transactions_jsonl",
        string_params(&[("filename", "all.jsonl")]),
    )?;
    let err = needs_folder.apply(Some(input.path()), None).unwrap_err();
    assert!(matches!(err, Error::Replay(_)));
    Ok(())
}

#[test]
fn read_steps_need_a_folder_and_a_filename() -> Result<()> {
    let (input, binarized, _) = prepared()?;
    let lineage = binarized.pipeline();

    let err = lineage.apply(None, None).unwrap_err();
    assert!(matches!(err, Error::Replay(_)));

    let mut steps = lineage.steps().to_vec();
    steps[0].params.insert(
        "filepath".into(),
        serde_yaml::Value::String(input.join("u.data").to_string_lossy().into_owned()),
    );
    let mut with_filepath = Pipeline::new();
    for step in steps {
        with_filepath.add_step(step.name, step.operation, step.params)?;
    }
    let err = with_filepath.apply(Some(input.path()), None).unwrap_err();
    assert!(matches!(err, Error::Replay(_)));

    let missing = TempDataDir::new()?;
    let err = lineage.apply(Some(missing.path()), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    Ok(())
}

#[test]
fn structurally_invalid_pipelines_are_rejected() -> Result<()> {
    let empty = Pipeline::new();
    assert!(matches!(empty.apply(None, None).unwrap_err(), Error::Replay(_)));

    let mut headless = Pipeline::new();
    headless.add_step(StepName::Process, "Binarize", Params::new())?;
    assert!(matches!(headless.apply(None, None).unwrap_err(), Error::Replay(_)));
    assert!(headless.validate().is_err());

    let mut terminal = Pipeline::new();
    terminal.add_step(StepName::Read, "read_transactions_tabular", Params::new())?;
    terminal.add_step(StepName::Write, "write_transactions_tabular", Params::new())?;
    let err = terminal
        .add_step(StepName::Process, "Binarize", Params::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);

    let yaml = "pipeline:\n  - name: read\n    operation: read_transactions_tabular\n  - name: read\n    operation: read_transactions_tabular\n";
    let twice = Pipeline::from_yaml_str(yaml)?;
    assert!(matches!(twice.validate().unwrap_err(), Error::Replay(_)));
    Ok(())
}

#[test]
fn unknown_operations_fail_before_anything_runs() -> Result<()> {
    let (input, binarized, _) = prepared()?;
    let output = TempDataDir::new()?;
    let shuffled = with_step(binarized.pipeline(), StepName::Process, "Shuffle", Params::new())?;
    let err = shuffled.apply(Some(input.path()), Some(output.path())).unwrap_err();
    assert!(matches!(&err, Error::Replay(m) if m.contains("Shuffle")));

    let mut parquet = Pipeline::new();
    parquet.add_step(StepName::Read, "read_parquet", string_params(&[("filename", "u.data")]))?;
    let err = parquet.apply(Some(input.path()), None).unwrap_err();
    assert!(matches!(&err, Error::Replay(m) if m.contains("read_parquet")));
    Ok(())
}

#[test]
fn splitting_twice_is_a_replay_error() -> Result<()> {
    let (input, _, splits) = prepared()?;
    let again = with_step(
        splits[&SplitKind::Train].pipeline(),
        StepName::Split,
        "RandomHoldOut",
        Params::new(),
    )?;
    let err = again.apply(Some(input.path()), None).unwrap_err();
    assert!(matches!(err, Error::Replay(_)));
    Ok(())
}

#[test]
fn processing_after_a_split_applies_to_every_part() -> Result<()> {
    let (input, _, splits) = prepared()?;
    let mut params = Params::new();
    params.insert("rating_threshold".into(), serde_yaml::Value::from(1.0));
    let descriptor = with_step(
        splits[&SplitKind::Train].pipeline(),
        StepName::Process,
        "FilterByRatingThreshold",
        params,
    )?;
    let replayed = descriptor
        .apply(Some(input.path()), None)?
        .into_splits()
        .ok_or_else(|| anyhow::anyhow!("expected splits"))?;
    for (kind, part) in &replayed {
        let ratings = part.frame().require("rating")?;
        assert!(ratings.iter().all(|r| r.as_f64() == Some(1.0)));
        assert!(part.len() <= splits[kind].len());
        assert_eq!(part.pipeline().len(), 4);
    }
    Ok(())
}

#[test]
fn operation_table_lists_every_builtin() {
    let table = operation_table();
    assert_eq!(table.operations(StepName::Process).len(), 12);
    assert_eq!(table.operations(StepName::Split).len(), 10);
    assert_eq!(table.operations(StepName::Load), vec!["registry_dataset".to_string()]);
    assert_eq!(table.operations(StepName::Read).len(), 10);
    assert!(
        table
            .operations(StepName::Write)
            .contains(&"write_transactions_blocks".to_string())
    );
    assert_eq!(table.operations(StepName::Export), vec!["elliot".to_string(), "recbole".to_string()]);

    assert!(table.processor("UserItemIterativeKCore").is_some());
    assert!(table.splitter("LeaveRatioLast").is_some());
    assert!(table.exporter("elliot").is_some_and(|e| e.requires_split));
    assert!(table.exporter("recbole").is_some_and(|e| !e.requires_split));

    let unknown = Step::new(StepName::Process, "Shuffle", Params::new());
    assert!(matches!(table.check(&unknown), Err(Error::Replay(_))));
    let unknown = Step::new(StepName::Read, "read_parquet", Params::new());
    assert!(matches!(table.check(&unknown), Err(Error::Replay(_))));
}

fn first_line(path: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(path)?
        .lines()
        .next()
        .unwrap_or_default()
        .to_string())
}

#[test]
fn recbole_export_writes_typed_headers_and_lineage() -> Result<()> {
    let (input, binarized, _) = prepared()?;
    let output = TempDataDir::new()?;
    let descriptor = with_step(
        binarized.pipeline(),
        StepName::Export,
        "recbole",
        string_params(&[("dataset_name", "ml")]),
    )?;
    let replayed = descriptor.apply(Some(input.path()), Some(output.path()))?;
    let inter = output.join("ml/ml.inter");
    let lineage = output.join("ml/pipeline.yml");
    assert_eq!(replayed.files(), [inter.clone(), lineage.clone()]);
    assert_eq!(
        first_line(&inter)?,
        "user_id:token\titem_id:token\trating:float\ttimestamp:float"
    );

    let written = Pipeline::from_yaml(&lineage)?;
    assert_eq!(written, descriptor);

    let err = descriptor.apply(Some(input.path()), None).unwrap_err();
    assert!(matches!(err, Error::Replay(_)));
    Ok(())
}

#[test]
fn recbole_marks_text_timestamps_as_tokens() -> Result<()> {
    let output = TempDataDir::new()?;
    let data = InteractionsBuilder::new()
        .add_event(1, 2, 3.0, "2005-01-01")
        .build()?;
    RecBole::new("text").export(&ExportInput::Data(&data), output.path())?;
    assert_eq!(
        first_line(&output.join("text/text.inter"))?,
        "user_id:token\titem_id:token\trating:float\ttimestamp:token"
    );
    Ok(())
}

#[test]
fn elliot_export_needs_splits() -> Result<()> {
    let (input, binarized, splits) = prepared()?;
    let output = TempDataDir::new()?;

    let err = Elliot::default()
        .export(&ExportInput::Data(&binarized), output.path())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);

    let unsplit = with_step(binarized.pipeline(), StepName::Export, "elliot", Params::new())?;
    let err = unsplit.apply(Some(input.path()), Some(output.path())).unwrap_err();
    assert!(matches!(err, Error::Replay(_)));

    let split = with_step(
        splits[&SplitKind::Train].pipeline(),
        StepName::Export,
        "elliot",
        Params::new(),
    )?;
    let replayed = split.apply(Some(input.path()), Some(output.path()))?;
    let dir = output.join("datarec");
    assert_eq!(
        replayed.files(),
        [
            dir.join("train.tsv"),
            dir.join("test.tsv"),
            dir.join("val.tsv"),
            dir.join("pipeline.yml"),
        ]
    );
    let train = std::fs::read_to_string(dir.join("train.tsv"))?;
    assert_eq!(train.lines().count(), splits[&SplitKind::Train].len());
    assert!(!train.starts_with("user_id"));

    let lineage = Pipeline::from_yaml(dir.join("pipeline.yml"))?;
    assert_eq!(lineage.steps().last().map(|s| s.name), Some(StepName::Export));
    Ok(())
}

#[test]
fn replayed_values_expose_their_payload() -> Result<()> {
    let data = InteractionsBuilder::new().add(1, 2).build()?;
    let value = Replayed::Data(data);
    assert!(value.files().is_empty());
    assert!(value.clone().into_splits().is_none());
    assert_eq!(value.into_data().map(|d| d.len()), Some(1));
    Ok(())
}
