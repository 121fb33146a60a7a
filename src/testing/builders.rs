//! Builders for small interaction tables.

use crate::datarec::DataRec;
use crate::error::Result;
use crate::frame::Frame;
use crate::pipeline::Pipeline;
use crate::rawdata::{ITEM_ID, RATING, RawData, Roles, TIMESTAMP, USER_ID};
use crate::value::Value;

/// A fluent builder for interaction tables with canonical column names.
///
/// The rating and timestamp columns exist when at least one row sets them; rows that
/// do not get a null cell.
///
/// # Example
///
/// ```
/// use datarec::testing::InteractionsBuilder;
///
/// let data = InteractionsBuilder::new()
///     .add(1, 10)
///     .add_event(1, 11, 4.0, 100)
///     .build()
///     .unwrap();
/// assert_eq!(data.len(), 2);
/// assert_eq!(data.rating_col(), Some("rating"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct InteractionsBuilder {
    rows: Vec<[Option<Value>; 4]>,
}

impl InteractionsBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Add an implicit interaction.
    #[must_use]
    pub fn add(mut self, user: impl Into<Value>, item: impl Into<Value>) -> Self {
        self.rows
            .push([Some(user.into()), Some(item.into()), None, None]);
        self
    }

    /// Add a rated interaction.
    #[must_use]
    pub fn add_rated(mut self, user: impl Into<Value>, item: impl Into<Value>, rating: f64) -> Self {
        self.rows.push([
            Some(user.into()),
            Some(item.into()),
            Some(Value::float(rating)),
            None,
        ]);
        self
    }

    /// Add a rated, timestamped interaction.
    #[must_use]
    pub fn add_event(
        mut self,
        user: impl Into<Value>,
        item: impl Into<Value>,
        rating: f64,
        timestamp: impl Into<Value>,
    ) -> Self {
        self.rows.push([
            Some(user.into()),
            Some(item.into()),
            Some(Value::float(rating)),
            Some(timestamp.into()),
        ]);
        self
    }

    /// Add one rated, timestamped interaction per `(item, rating, timestamp)` for `user`.
    #[must_use]
    pub fn add_history<U, I, T>(mut self, user: U, events: impl IntoIterator<Item = (I, f64, T)>) -> Self
    where
        U: Into<Value> + Clone,
        I: Into<Value>,
        T: Into<Value>,
    {
        for (item, rating, ts) in events {
            self = self.add_event(user.clone(), item, rating, ts);
        }
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Assemble the raw relation.
    ///
    /// # Errors
    /// Returns a schema error if the frame cannot be assembled.
    pub fn build_raw(&self) -> Result<RawData> {
        let names = [USER_ID, ITEM_ID, RATING, TIMESTAMP];
        let present: Vec<bool> = (0..4)
            .map(|c| c < 2 || self.rows.iter().any(|r| r[c].is_some()))
            .collect();
        let mut columns = Vec::new();
        for (c, name) in names.iter().enumerate() {
            if present[c] {
                let values = self
                    .rows
                    .iter()
                    .map(|r| r[c].clone().unwrap_or_default())
                    .collect();
                columns.push((*name, values));
            }
        }
        let mut roles = Roles::new(USER_ID, ITEM_ID);
        if present[2] {
            roles = roles.with_rating(RATING);
        }
        if present[3] {
            roles = roles.with_timestamp(TIMESTAMP);
        }
        Ok(RawData::new(Frame::from_columns(columns)?, roles))
    }

    /// Assemble a dataset with an empty lineage.
    ///
    /// # Errors
    /// See [`InteractionsBuilder::build_raw`].
    pub fn build(&self) -> Result<DataRec> {
        DataRec::new(self.build_raw()?, Some(Pipeline::new()))
    }
}
