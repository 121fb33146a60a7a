//! The minimal container produced by readers and consumed by writers.

use crate::encoder::Encoder;
use crate::frame::Frame;
use serde::{Deserialize, Serialize};

/// Canonical column names used when renaming is requested.
pub const USER_ID: &str = "user_id";
pub const ITEM_ID: &str = "item_id";
pub const RATING: &str = "rating";
pub const TIMESTAMP: &str = "timestamp";

/// Column labels for the four interaction roles.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles {
    pub user: Option<String>,
    pub item: Option<String>,
    pub rating: Option<String>,
    pub timestamp: Option<String>,
}

impl Roles {
    #[must_use]
    pub fn new(user: impl Into<String>, item: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            item: Some(item.into()),
            rating: None,
            timestamp: None,
        }
    }

    #[must_use]
    pub fn with_rating(mut self, rating: impl Into<String>) -> Self {
        self.rating = Some(rating.into());
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Populated role columns in canonical order.
    #[must_use]
    pub fn ordered(&self) -> Vec<&str> {
        [&self.user, &self.item, &self.rating, &self.timestamp]
            .into_iter()
            .filter_map(|r| r.as_deref())
            .collect()
    }
}

/// An interaction relation with its role labels and optional identifier encoders.
///
/// When an encoder is present, the corresponding column holds integer codes and the
/// encoder maps them back to the public identifiers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawData {
    pub frame: Frame,
    pub roles: Roles,
    pub user_encoder: Option<Encoder>,
    pub item_encoder: Option<Encoder>,
}

impl RawData {
    #[must_use]
    pub fn new(frame: Frame, roles: Roles) -> Self {
        Self {
            frame,
            roles,
            user_encoder: None,
            item_encoder: None,
        }
    }

    #[must_use]
    pub fn with_encoders(mut self, user: Option<Encoder>, item: Option<Encoder>) -> Self {
        self.user_encoder = user;
        self.item_encoder = item;
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frame.n_rows()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }
}

/// Anything writers can consume.
pub trait AsRawData {
    fn to_rawdata(&self) -> RawData;
}

impl AsRawData for RawData {
    fn to_rawdata(&self) -> RawData {
        self.clone()
    }
}
