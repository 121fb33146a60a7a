//! Dense identifier encoding.
//!
//! An [`Encoder`] is a bijection between public identifiers and the contiguous integer
//! range `[offset, offset + len)`. Readers use it incrementally while streaming chunks
//! ([`IncrementalEncoder`] is the same type), and [`DataRec`](crate::DataRec) installs
//! the result as its user/item encoder, so there is a single copy of the mapping.

use crate::error::{Error, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Encoder {
    offset: i64,
    forward: HashMap<Value, i64>,
    reverse: Vec<Value>,
}

/// Encoder shared across the chunks of a streaming read.
pub type IncrementalEncoder = Encoder;

impl Encoder {
    #[must_use]
    pub fn new(offset: i64) -> Self {
        Self {
            offset,
            forward: HashMap::new(),
            reverse: Vec::new(),
        }
    }

    /// Build an encoder over `values` in first-seen order.
    pub fn build<'a>(values: impl IntoIterator<Item = &'a Value>, offset: i64) -> Self {
        let mut enc = Self::new(offset);
        for v in values {
            enc.encode_or_insert(v);
        }
        enc
    }

    /// Install an externally constructed forward mapping.
    ///
    /// The codes must be unique and cover a contiguous range; the smallest code becomes
    /// the offset and the inverse sequence is derived from the map.
    ///
    /// # Errors
    /// Returns a schema error if the mapping is not injective or not contiguous.
    pub fn from_forward(forward: HashMap<Value, i64>) -> Result<Self> {
        if forward.is_empty() {
            return Ok(Self::new(0));
        }
        let offset = forward.values().copied().min().unwrap_or(0);
        let mut reverse: Vec<Option<Value>> = vec![None; forward.len()];
        for (k, &code) in &forward {
            let slot = usize::try_from(code - offset)
                .ok()
                .and_then(|i| reverse.get_mut(i))
                .ok_or_else(|| {
                    Error::Schema(format!(
                        "encoding for {k} -> {code} is outside the dense range starting at {offset}"
                    ))
                })?;
            if slot.is_some() {
                return Err(Error::Schema(format!(
                    "encoding is not injective: code {code} assigned twice"
                )));
            }
            *slot = Some(k.clone());
        }
        Ok(Self {
            offset,
            forward,
            reverse: reverse.into_iter().flatten().collect(),
        })
    }

    /// Code for `key`, allocating the next free code on first sight.
    pub fn encode_or_insert(&mut self, key: &Value) -> i64 {
        if let Some(&code) = self.forward.get(key) {
            return code;
        }
        let code = self.offset + i64::try_from(self.reverse.len()).unwrap_or(i64::MAX);
        self.forward.insert(key.clone(), code);
        self.reverse.push(key.clone());
        code
    }

    #[must_use]
    pub fn encode(&self, key: &Value) -> Option<i64> {
        self.forward.get(key).copied()
    }

    #[must_use]
    pub fn decode(&self, code: i64) -> Option<&Value> {
        usize::try_from(code - self.offset)
            .ok()
            .and_then(|i| self.reverse.get(i))
    }

    /// Drop every mapping, returning to the identity.
    pub fn reset(&mut self) {
        self.forward.clear();
        self.reverse.clear();
        self.offset = 0;
    }

    #[must_use]
    pub const fn offset(&self) -> i64 {
        self.offset
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }

    #[must_use]
    pub const fn forward(&self) -> &HashMap<Value, i64> {
        &self.forward
    }

    #[must_use]
    pub fn reverse(&self) -> &[Value] {
        &self.reverse
    }

    /// Encode a whole column, failing on identifiers the encoder has never seen.
    ///
    /// # Errors
    /// Returns a schema error naming the first unknown identifier.
    pub fn encode_column(&self, values: &[Value]) -> Result<Vec<Value>> {
        values
            .iter()
            .map(|v| {
                self.encode(v)
                    .map(Value::Int)
                    .ok_or_else(|| Error::Schema(format!("identifier {v} has no encoding")))
            })
            .collect()
    }

    /// Decode a whole column of integer codes.
    ///
    /// # Errors
    /// Returns a schema error on a non-integer cell or an unknown code.
    pub fn decode_column(&self, values: &[Value]) -> Result<Vec<Value>> {
        values
            .iter()
            .map(|v| {
                v.as_i64()
                    .and_then(|c| self.decode(c))
                    .cloned()
                    .ok_or_else(|| Error::Schema(format!("code {v} has no decoding")))
            })
            .collect()
    }
}
