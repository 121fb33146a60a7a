use anyhow::Result;
use datarec::processing::TimeBound;
use datarec::splitters::{
    LeaveNLast, LeaveNOut, LeaveOneLast, LeaveOneOut, LeaveRatioLast, LeaveRatioOut, RandomHoldOut,
    SplitKind, SplitResult, Splitter, TemporalHoldOut, TemporalThresholdSplit,
    UserStratifiedHoldOut,
};
use datarec::testing::{
    InteractionsBuilder, assert_lineage_extends, assert_partition, leave_last_sample, rows,
    small_ratings, stratified_sample,
};
use datarec::{DataRec, ErrorKind, StepName, Value};
use std::collections::{BTreeMap, BTreeSet};

fn sizes(splits: &SplitResult) -> BTreeMap<SplitKind, usize> {
    splits.iter().map(|(k, d)| (*k, d.len())).collect()
}

fn per_user(data: &DataRec) -> Result<BTreeMap<Value, usize>> {
    let mut counts = BTreeMap::new();
    for u in data.frame().require("user_id")? {
        *counts.entry(u.clone()).or_insert(0) += 1;
    }
    Ok(counts)
}

fn timestamps(data: &DataRec) -> Result<Vec<f64>> {
    Ok(data
        .frame()
        .require("timestamp")?
        .iter()
        .filter_map(Value::as_timestamp)
        .collect())
}

#[test]
fn stratified_hold_out_keeps_every_user_in_train() -> Result<()> {
    let data = stratified_sample()?;
    let splitter = UserStratifiedHoldOut::new(0.2, 0.2, 42);
    let splits = splitter.split(&data)?;
    assert_partition(&data, &splits);
    assert_eq!(
        sizes(&splits),
        BTreeMap::from([(SplitKind::Train, 15), (SplitKind::Val, 5), (SplitKind::Test, 5)])
    );

    let train_users = per_user(&splits[&SplitKind::Train])?;
    assert_eq!(train_users.len(), 3);
    assert_eq!(per_user(&splits[&SplitKind::Test])?[&Value::Int(2)], 1);

    for part in splits.values() {
        assert_lineage_extends(&data, part, StepName::Split, "UserStratifiedHoldOut");
    }

    let again = splitter.split(&data)?;
    for kind in SplitKind::ALL {
        assert_eq!(rows(&splits[&kind]), rows(&again[&kind]));
    }
    Ok(())
}

#[test]
fn random_hold_out_counts_round_the_ratios() -> Result<()> {
    let data = stratified_sample()?;
    let splits = RandomHoldOut::new(0.3, 0.1, 7).split(&data)?;
    assert_partition(&data, &splits);
    // round(0.3 * 25) = 8, round(0.1 * 25) = 3
    assert_eq!(
        sizes(&splits),
        BTreeMap::from([(SplitKind::Train, 14), (SplitKind::Val, 3), (SplitKind::Test, 8)])
    );

    let step = &splits[&SplitKind::Test].pipeline().steps()[0];
    assert_eq!(step.params.get("seed"), Some(&serde_yaml::Value::from(7u64)));
    Ok(())
}

#[test]
fn zero_ratios_yield_only_train() -> Result<()> {
    let data = stratified_sample()?;
    let splits = RandomHoldOut::new(0.0, 0.0, 42).split(&data)?;
    assert_eq!(splits.keys().copied().collect::<Vec<_>>(), vec![SplitKind::Train]);
    assert_eq!(rows(&splits[&SplitKind::Train]), rows(&data));

    let splits = LeaveNOut::new(0, 0, 42).split(&data)?;
    assert_eq!(sizes(&splits), BTreeMap::from([(SplitKind::Train, 25)]));
    Ok(())
}

#[test]
fn invalid_ratios_are_rejected() -> Result<()> {
    let data = stratified_sample()?;
    for splitter in [
        RandomHoldOut::new(0.7, 0.4, 42),
        RandomHoldOut::new(-0.1, 0.0, 42),
        RandomHoldOut::new(1.5, 0.0, 42),
    ] {
        assert_eq!(splitter.split(&data).unwrap_err().kind(), ErrorKind::Usage);
    }
    let err = LeaveRatioOut::new(0.6, 0.6, 42).split(&data).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
    Ok(())
}

#[test]
fn leave_one_last_holds_out_the_newest_row() -> Result<()> {
    let data = leave_last_sample()?;
    let splits = LeaveOneLast::new(true, false, 42).split(&data)?;
    assert_partition(&data, &splits);

    let test = &splits[&SplitKind::Test];
    let held: BTreeSet<Value> = test.frame().require("item_id")?.iter().cloned().collect();
    assert_eq!(held, [13, 23, 33].into_iter().map(Value::Int).collect::<BTreeSet<_>>());
    assert!(timestamps(test)?.iter().all(|&t| (t - 300.0).abs() < f64::EPSILON));
    assert_eq!(splits[&SplitKind::Train].len(), 6);

    let splits = LeaveOneLast::new(true, true, 42).split(&data)?;
    let val: BTreeSet<Value> = splits[&SplitKind::Val]
        .frame()
        .require("item_id")?
        .iter()
        .cloned()
        .collect();
    assert_eq!(val, [12, 22, 32].into_iter().map(Value::Int).collect::<BTreeSet<_>>());
    assert!(timestamps(&splits[&SplitKind::Train])?.iter().all(|&t| t < 150.0));
    Ok(())
}

#[test]
fn leave_last_variants() -> Result<()> {
    let data = leave_last_sample()?;
    let splits = LeaveNLast::new(2, 0, 42).split(&data)?;
    assert_eq!(splits[&SplitKind::Test].len(), 6);
    assert!(timestamps(&splits[&SplitKind::Train])?.iter().all(|&t| t < 150.0));

    // round(0.34 * 3) = 1 per user
    let splits = LeaveRatioLast::new(0.34, 0.0, 42).split(&data)?;
    assert_eq!(splits[&SplitKind::Test].len(), 3);
    assert!(timestamps(&splits[&SplitKind::Test])?.iter().all(|&t| t > 250.0));

    let untimed = InteractionsBuilder::new().add(1, 1).add(1, 2).build()?;
    let err = LeaveOneLast::new(true, false, 42).split(&untimed).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    Ok(())
}

#[test]
fn random_leave_out_per_user() -> Result<()> {
    let data = stratified_sample()?;
    let splits = LeaveOneOut::new(true, true, 42).split(&data)?;
    assert_partition(&data, &splits);
    for kind in [SplitKind::Test, SplitKind::Val] {
        let counts = per_user(&splits[&kind])?;
        assert_eq!(counts.values().copied().collect::<Vec<_>>(), vec![1, 1, 1]);
    }

    let splits = LeaveNOut::new(6, 0, 42).split(&data)?;
    // user 2 has only five rows, all held out
    assert_eq!(splits[&SplitKind::Test].len(), 6 + 5 + 6);
    assert!(!per_user(&splits[&SplitKind::Train])?.contains_key(&Value::Int(2)));

    let splits = LeaveRatioOut::new(0.2, 0.0, 42).split(&data)?;
    assert_eq!(splits[&SplitKind::Test].len(), 2 + 1 + 2);
    Ok(())
}

#[test]
fn temporal_hold_out_is_chronological() -> Result<()> {
    let data = small_ratings()?;
    let splits = TemporalHoldOut::new(0.2, 0.1).split(&data)?;
    assert_partition(&data, &splits);
    assert_eq!(
        sizes(&splits),
        BTreeMap::from([(SplitKind::Train, 15), (SplitKind::Val, 2), (SplitKind::Test, 4)])
    );

    let train = timestamps(&splits[&SplitKind::Train])?;
    let val = timestamps(&splits[&SplitKind::Val])?;
    let test = timestamps(&splits[&SplitKind::Test])?;
    assert!(train.windows(2).all(|w| w[0] <= w[1]));
    assert!(train.iter().all(|t| val.iter().all(|v| t < v)));
    assert!(val.iter().all(|v| test.iter().all(|t| v < t)));

    let untimed = InteractionsBuilder::new().add(1, 1).build()?;
    let err = TemporalHoldOut::new(0.2, 0.0).split(&untimed).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    Ok(())
}

#[test]
fn temporal_thresholds_bucket_rows() -> Result<()> {
    let data = small_ratings()?;
    let splits = TemporalThresholdSplit::new(TimeBound::Seconds(100.0), TimeBound::Seconds(150.0))
        .split(&data)?;
    assert_eq!(
        sizes(&splits),
        BTreeMap::from([(SplitKind::Train, 9), (SplitKind::Val, 5), (SplitKind::Test, 7)])
    );

    let err = TemporalThresholdSplit::new(TimeBound::Seconds(150.0), TimeBound::Seconds(100.0))
        .split(&data)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
    Ok(())
}

#[test]
#[should_panic(expected = "needs distinct input rows")]
fn partition_check_refuses_repeated_rows() {
    let data = InteractionsBuilder::new()
        .add(1, 10)
        .add(1, 10)
        .add(2, 20)
        .build()
        .unwrap();
    let splits = RandomHoldOut::new(0.3, 0.0, 1).split(&data).unwrap();
    assert_partition(&data, &splits);
}
