//! Assertions over datasets, split results and lineage.

use crate::datarec::DataRec;
use crate::pipeline::StepName;
use crate::splitters::SplitResult;
use crate::value::Value;
use std::collections::HashMap;

/// Rows of `data` as owned cell vectors, in table order.
#[must_use]
pub fn rows(data: &DataRec) -> Vec<Vec<Value>> {
    let frame = data.frame();
    (0..frame.n_rows())
        .map(|i| frame.row(i).into_iter().cloned().collect())
        .collect()
}

fn multiset(rows: Vec<Vec<Value>>) -> HashMap<Vec<Value>, usize> {
    let mut counts = HashMap::new();
    for r in rows {
        *counts.entry(r).or_insert(0) += 1;
    }
    counts
}

/// Assert that the splits are disjoint and together hold exactly the rows of `input`.
///
/// Rows are matched by content, so `input` must not repeat a row; with distinct rows
/// a content match is the same as a partition of row indices.
///
/// # Panics
///
/// Panics if `input` repeats a row, or if a row is lost, duplicated or invented.
///
/// # Example
///
/// ```
/// use datarec::splitters::{RandomHoldOut, Splitter};
/// use datarec::testing::{assert_partition, stratified_sample};
///
/// let data = stratified_sample().unwrap();
/// let splits = RandomHoldOut::new(0.2, 0.2, 42).split(&data).unwrap();
/// assert_partition(&data, &splits);
/// ```
pub fn assert_partition(input: &DataRec, splits: &SplitResult) {
    let total: usize = splits.values().map(DataRec::len).sum();
    assert_eq!(
        total,
        input.len(),
        "split sizes {:?} do not add up to the {} input rows",
        splits.iter().map(|(k, d)| (k.as_str(), d.len())).collect::<Vec<_>>(),
        input.len()
    );
    let expected = multiset(rows(input));
    let repeated: Vec<_> = expected.iter().filter(|(_, n)| **n > 1).map(|(r, _)| r).collect();
    assert!(
        repeated.is_empty(),
        "assert_partition needs distinct input rows, found repeats: {repeated:?}"
    );
    let actual = multiset(splits.values().flat_map(rows).collect());
    assert_eq!(actual, expected, "split rows differ from the input rows");
}

/// Assert that `child`'s lineage is `parent`'s plus one step named `name`/`operation`.
///
/// # Panics
///
/// Panics if the prefix differs or the last step does not match.
pub fn assert_lineage_extends(parent: &DataRec, child: &DataRec, name: StepName, operation: &str) {
    let before = parent.pipeline().steps();
    let after = child.pipeline().steps();
    assert_eq!(
        after.len(),
        before.len() + 1,
        "expected exactly one new step, lineage went from {} to {} steps",
        before.len(),
        after.len()
    );
    assert_eq!(&after[..before.len()], before, "lineage prefix changed");
    let last = &after[before.len()];
    assert_eq!(last.name, name, "unexpected step kind");
    assert_eq!(last.operation, operation, "unexpected operation");
}

/// Assert that two datasets hold the same rows, ignoring order.
///
/// # Panics
///
/// Panics if the row multisets differ.
pub fn assert_same_rows(actual: &DataRec, expected: &DataRec) {
    assert_eq!(
        multiset(rows(actual)),
        multiset(rows(expected)),
        "row sets differ:\n  actual: {:?}\n  expected: {:?}",
        rows(actual),
        rows(expected)
    );
}
