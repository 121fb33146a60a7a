use anyhow::Result;
use datarec::processing::{
    Binarize, ColdFilter, DuplicateKeep, EntityMode, FilterByRatingThreshold, FilterByTime,
    FilterByUserMeanRating, FilterOutDuplicatedInteractions, ItemKCore, IterativeKCore, Keep,
    NRoundsKCore, Processor, TimeBound, UserItemIterativeKCore, UserItemNRoundsKCore, UserKCore,
};
use datarec::testing::{
    InteractionsBuilder, assert_lineage_extends, binarize_sample, rows, small_ratings,
};
use datarec::pipeline::from_params;
use datarec::{DataRec, ErrorKind, StepName, Value};
use std::collections::BTreeSet;

fn users(data: &DataRec) -> Result<BTreeSet<Value>> {
    Ok(data.frame().require("user_id")?.iter().cloned().collect())
}

fn items(data: &DataRec) -> Result<BTreeSet<Value>> {
    Ok(data.frame().require("item_id")?.iter().cloned().collect())
}

fn ints(values: impl IntoIterator<Item = i64>) -> BTreeSet<Value> {
    values.into_iter().map(Value::Int).collect()
}

#[test]
fn binarize_keeps_positive_rows_and_drops_ratings() -> Result<()> {
    let data = binarize_sample()?;
    let out = Binarize::new(3.0)
        .keep(Keep::Positive)
        .drop_rating_col(true)
        .process(&data)?;

    assert_eq!(users(&out)?, ints([2, 4]));
    assert_eq!(out.rating_col(), None);
    assert!(!out.frame().has_column("rating"));
    assert_lineage_extends(&data, &out, StepName::Process, "Binarize");

    // input untouched
    assert_eq!(data.len(), 4);
    assert_eq!(data.rating_col(), Some("rating"));
    Ok(())
}

#[test]
fn binarize_rewrites_ratings_by_default() -> Result<()> {
    let data = binarize_sample()?;
    let out = Binarize::new(3.0).process(&data)?;
    assert_eq!(out.len(), 4);
    assert_eq!(
        out.frame().require("rating")?,
        &[Value::Int(0), Value::Int(1), Value::Int(0), Value::Int(1)]
    );

    let negatives = Binarize::new(3.0).keep(Keep::Negative).process(&data)?;
    assert_eq!(users(&negatives)?, ints([1, 3]));

    let legacy = Binarize::new(3.0).implicit(true);
    assert_eq!(legacy.resolved(), (Keep::Positive, true));
    assert_eq!(legacy.process(&data)?.len(), 2);

    let step = &out.pipeline().steps()[0];
    assert_eq!(step.params.get("threshold"), Some(&serde_yaml::Value::from(3.0)));
    assert!(!step.params.contains_key("keep"));
    Ok(())
}

#[test]
fn binarize_needs_a_rating_column() -> Result<()> {
    let data = InteractionsBuilder::new().add(1, 2).build()?;
    let err = Binarize::new(1.0).process(&data).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    let err = Binarize::new(f64::NAN).process(&binarize_sample()?).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
    Ok(())
}

#[test]
fn rating_filters() -> Result<()> {
    assert_eq!(
        FilterByRatingThreshold::new(-1.0).unwrap_err().kind(),
        ErrorKind::Usage
    );
    let data = binarize_sample()?;
    let out = FilterByRatingThreshold::new(3.0)?.process(&data)?;
    assert_eq!(users(&out)?, ints([2, 4]));

    let data = InteractionsBuilder::new()
        .add_rated(1, 10, 1.0)
        .add_rated(1, 11, 3.0)
        .add_rated(1, 12, 5.0)
        .add_rated(2, 10, 2.0)
        .add_rated(2, 11, 2.0)
        .build()?;
    let out = FilterByUserMeanRating::new().process(&data)?;
    assert_eq!(out.len(), 4);
    assert_eq!(items(&out)?, ints([10, 11, 12]));
    assert_lineage_extends(&data, &out, StepName::Process, "FilterByUserMeanRating");
    Ok(())
}

#[test]
fn cold_filter_keeps_sparse_entities() -> Result<()> {
    let data = small_ratings()?;
    let cold_users = ColdFilter::new(2, EntityMode::User).process(&data)?;
    assert_eq!(cold_users.len(), 3);
    assert_eq!(users(&cold_users)?, ints([5, 6]));

    let cold_items = ColdFilter::new(1, EntityMode::Item).process(&data)?;
    assert_eq!(items(&cold_items)?, ints([5, 6, 7, 8]));
    Ok(())
}

fn duplicates() -> Result<DataRec> {
    Ok(InteractionsBuilder::new()
        .add_event(1, 10, 1.0, 100)
        .add_event(1, 10, 2.0, 300)
        .add_event(1, 10, 3.0, 300)
        .add_event(2, 5, 4.0, 50)
        .add_event(1, 10, 5.0, 200)
        .build()?)
}

#[test]
fn duplicate_policies() -> Result<()> {
    let data = duplicates()?;
    let kept = |keep: DuplicateKeep| -> Result<Value> {
        let out = FilterOutDuplicatedInteractions::new(keep, 42).process(&data)?;
        assert_eq!(out.len(), 2);
        let r = rows(&out);
        assert_eq!(r[0][0], Value::Int(1));
        assert_eq!(r[1][0], Value::Int(2));
        Ok(r[0][2].clone())
    };
    assert_eq!(kept(DuplicateKeep::First)?, Value::float(1.0));
    assert_eq!(kept(DuplicateKeep::Last)?, Value::float(5.0));
    assert_eq!(kept(DuplicateKeep::Earliest)?, Value::float(1.0));
    assert_eq!(kept(DuplicateKeep::Latest)?, Value::float(3.0));

    let a = kept(DuplicateKeep::Random)?;
    let b = kept(DuplicateKeep::Random)?;
    assert_eq!(a, b);

    let implicit = InteractionsBuilder::new().add(1, 2).add(1, 2).build()?;
    let err = FilterOutDuplicatedInteractions::new(DuplicateKeep::Latest, 42)
        .process(&implicit)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert_eq!(
        FilterOutDuplicatedInteractions::default().process(&implicit)?.len(),
        1
    );
    Ok(())
}

#[test]
fn time_window_is_inclusive() -> Result<()> {
    let data = InteractionsBuilder::new()
        .add_event(1, 1, 1.0, 100)
        .add_event(1, 2, 1.0, 200)
        .add_event(2, 1, 1.0, 300)
        .build()?;

    let out = FilterByTime::new(Some(TimeBound::Seconds(150.0)), Some(TimeBound::Seconds(300.0)))
        .process(&data)?;
    assert_eq!(out.len(), 2);

    let iso = FilterByTime::new(None, Some(TimeBound::Iso("1970-01-01T00:03:20Z".into())))
        .process(&data)?;
    assert_eq!(iso.len(), 2);

    let err = FilterByTime::new(Some(TimeBound::Seconds(10.0)), Some(TimeBound::Seconds(5.0)))
        .process(&data)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);

    let err = FilterByTime::new(Some(TimeBound::Iso("yesterday".into())), None)
        .process(&data)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);

    let untimed = InteractionsBuilder::new().add(1, 1).build()?;
    let err = FilterByTime::default().process(&untimed).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    Ok(())
}

#[test]
fn single_pass_cores() -> Result<()> {
    let data = small_ratings()?;
    let out = UserKCore::new(4).process(&data)?;
    assert_eq!(out.len(), 18);
    assert_eq!(users(&out)?, ints([1, 2, 3, 4]));

    let out = ItemKCore::new(5).process(&data)?;
    assert_eq!(out.len(), 5);
    assert_eq!(items(&out)?, ints([1]));
    Ok(())
}

#[test]
fn iterative_core_reaches_the_dense_block() -> Result<()> {
    let data = small_ratings()?;
    let out = UserItemIterativeKCore::new(2usize).process(&data)?;
    assert_eq!(out.len(), 16);
    assert_eq!(users(&out)?, ints([1, 2, 3, 4]));
    assert_eq!(items(&out)?, ints([1, 2, 3, 4]));

    let by_role = IterativeKCore::new(vec!["user".into(), "item".into()], vec![2usize, 2]).process(&data)?;
    assert_eq!(rows(&by_role), rows(&out));

    let by_label = IterativeKCore::new(vec!["user_id".into(), "item_id".into()], 2usize).process(&data)?;
    assert_eq!(by_label.len(), 16);

    // user 5 still holds item 1 after a single sweep
    let one_round = UserItemNRoundsKCore::new(2usize, 1).process(&data)?;
    assert_eq!(one_round.len(), 17);
    let two_rounds = NRoundsKCore::new(vec!["user".into(), "item".into()], 2usize, 2).process(&data)?;
    assert_eq!(two_rounds.len(), 16);
    Ok(())
}

#[test]
fn core_parameter_errors() -> Result<()> {
    let data = small_ratings()?;
    let err = IterativeKCore::new(vec!["user".into()], vec![1usize, 2])
        .process(&data)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
    let err = IterativeKCore::new(vec!["genre".into()], 2usize)
        .process(&data)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    Ok(())
}

/// Run `processor`, check the new `process` step and rebuild the processor from it.
fn replays_from_its_step<P>(processor: &P, data: &DataRec) -> Result<DataRec>
where
    P: Processor + PartialEq + std::fmt::Debug,
{
    let out = processor.process(data)?;
    assert_lineage_extends(data, &out, StepName::Process, P::NAME);
    let step = out
        .pipeline()
        .steps()
        .last()
        .ok_or_else(|| anyhow::anyhow!("{} recorded no step", P::NAME))?;
    let rebuilt: P = from_params(&step.params)?;
    assert_eq!(&rebuilt, processor);
    assert_eq!(rows(&rebuilt.process(data)?), rows(&out), "{}", P::NAME);
    Ok(out)
}

#[test]
fn every_processor_extends_the_lineage() -> Result<()> {
    // start from a dataset that already has a step of its own
    let data = FilterByRatingThreshold::new(0.0)?.process(&small_ratings()?)?;
    assert_eq!(data.len(), 21);
    assert_eq!(data.pipeline().steps().len(), 1);

    replays_from_its_step(&FilterByRatingThreshold::new(3.0)?, &data)?;
    replays_from_its_step(&ColdFilter::new(2, EntityMode::User), &data)?;
    replays_from_its_step(&ColdFilter::new(1, EntityMode::Item), &data)?;
    for keep in [
        DuplicateKeep::First,
        DuplicateKeep::Last,
        DuplicateKeep::Earliest,
        DuplicateKeep::Latest,
        DuplicateKeep::Random,
    ] {
        replays_from_its_step(&FilterOutDuplicatedInteractions::new(keep, 7), &duplicates()?)?;
    }
    replays_from_its_step(
        &FilterByTime::new(Some(TimeBound::Seconds(50.0)), Some(TimeBound::Seconds(150.0))),
        &data,
    )?;
    replays_from_its_step(
        &FilterByTime::new(Some(TimeBound::Iso("1970-01-01T00:01:40Z".into())), None),
        &data,
    )?;

    replays_from_its_step(&UserKCore::new(4), &data)?;
    replays_from_its_step(&ItemKCore::new(5), &data)?;
    replays_from_its_step(
        &IterativeKCore::new(vec!["user".into(), "item".into()], vec![2usize, 3]),
        &data,
    )?;
    replays_from_its_step(
        &NRoundsKCore::new(vec!["user".into(), "item".into()], 2usize, 1),
        &data,
    )?;
    let core = replays_from_its_step(&UserItemIterativeKCore::new(2usize), &data)?;
    assert_eq!(core.len(), 16);
    let one_round = replays_from_its_step(&UserItemNRoundsKCore::new(2usize, 1), &data)?;
    assert_eq!(one_round.len(), 17);
    Ok(())
}
