//! Fixed interaction tables used across the test suite.

use super::builders::InteractionsBuilder;
use crate::datarec::DataRec;
use crate::error::Result;

/// A block-grouped file: item headers followed by `user,rating,date` events.
pub const BLOCK_SAMPLE: &str = "1:\n10,4,2005-01-01\n2:\n20,3,2005-01-02\n";

/// Four rated rows: `(1,10,2.5) (2,20,3.5) (3,30,1.5) (4,40,4.0)`.
///
/// # Errors
/// Never fails in practice; the signature matches [`InteractionsBuilder::build`].
pub fn binarize_sample() -> Result<DataRec> {
    InteractionsBuilder::new()
        .add_rated(1, 10, 2.5)
        .add_rated(2, 20, 3.5)
        .add_rated(3, 30, 1.5)
        .add_rated(4, 40, 4.0)
        .build()
}

/// Three users with 10, 5 and 10 timestamped ratings on disjoint items.
///
/// # Errors
/// See [`binarize_sample`].
pub fn stratified_sample() -> Result<DataRec> {
    let mut b = InteractionsBuilder::new();
    for (user, n) in [(1, 10), (2, 5), (3, 10)] {
        for k in 0..n {
            let item = user * 100 + k;
            let rating = f64::from(1 + k % 5);
            b = b.add_event(user, item, rating, 1_000 + i64::from(k));
        }
    }
    b.build()
}

/// Users 1, 2 and 3, each rating three items at timestamps 300, 100 and 200 (stored
/// out of time order).
///
/// # Errors
/// See [`binarize_sample`].
pub fn leave_last_sample() -> Result<DataRec> {
    let mut b = InteractionsBuilder::new();
    for user in 1..=3 {
        b = b.add_history(
            user,
            [
                (user * 10 + 3, 3.0, 300),
                (user * 10 + 1, 1.0, 100),
                (user * 10 + 2, 2.0, 200),
            ],
        );
    }
    b.build()
}

/// Six users over eight items with a dense core and a sparse tail, for k-core and
/// characteristic tests.
///
/// Users 1-4 rate items 1-4; user 5 rates items 1 and 5; user 6 rates item 6.
/// Items 7 and 8 are rated once each by user 1.
///
/// # Errors
/// See [`binarize_sample`].
pub fn small_ratings() -> Result<DataRec> {
    let mut b = InteractionsBuilder::new();
    let mut ts = 0;
    let mut next = || {
        ts += 10;
        ts
    };
    for user in 1..=4 {
        for item in 1..=4 {
            let rating = f64::from((user + item) % 5 + 1);
            b = b.add_event(user, item, rating, next());
        }
    }
    b = b
        .add_event(5, 1, 5.0, next())
        .add_event(5, 5, 2.0, next())
        .add_event(6, 6, 4.0, next())
        .add_event(1, 7, 3.0, next())
        .add_event(1, 8, 1.0, next());
    b.build()
}
