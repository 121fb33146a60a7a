//! A minimal column store for interaction tables.
//!
//! [`Frame`] keeps named columns of [`Value`]s with equal length. Every transform
//! returns a new frame; nothing here mutates rows in place except the explicit
//! column-level setters used while a frame is being assembled.

use crate::error::{Error, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    names: Vec<String>,
    columns: Vec<Vec<Value>>,
}

impl Frame {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Build a frame from `(name, values)` pairs.
    ///
    /// # Errors
    /// Returns a schema error on duplicate names or ragged columns.
    pub fn from_columns<S: Into<String>>(cols: Vec<(S, Vec<Value>)>) -> Result<Self> {
        let mut f = Self::new();
        for (name, values) in cols {
            f.push_column(name, values)?;
        }
        Ok(f)
    }

    /// Build a frame from row tuples; every row must have `names.len()` cells.
    ///
    /// # Errors
    /// Returns a schema error if a row has the wrong width.
    pub fn from_rows(names: &[&str], rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); names.len()];
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != names.len() {
                return Err(Error::Schema(format!(
                    "row {i} has {} cells, expected {}",
                    row.len(),
                    names.len()
                )));
            }
            for (c, v) in row.into_iter().enumerate() {
                columns[c].push(v);
            }
        }
        Ok(Self {
            names: names.iter().map(|s| (*s).to_string()).collect(),
            columns,
        })
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    #[must_use]
    pub const fn n_cols(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.column_index(name).map(|i| self.columns[i].as_slice())
    }

    /// Column lookup that reports a schema error naming the missing column.
    ///
    /// # Errors
    /// Returns a schema error if `name` is not a column.
    pub fn require(&self, name: &str) -> Result<&[Value]> {
        self.column(name).ok_or_else(|| {
            Error::Schema(format!(
                "column '{name}' not found (available: {})",
                self.names.join(", ")
            ))
        })
    }

    /// Append a column.
    ///
    /// # Errors
    /// Returns a schema error on a duplicate name or a length mismatch.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Value>) -> Result<()> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(Error::Schema(format!("duplicate column '{name}'")));
        }
        if !self.names.is_empty() && values.len() != self.n_rows() {
            return Err(Error::Schema(format!(
                "column '{name}' has {} values, frame has {} rows",
                values.len(),
                self.n_rows()
            )));
        }
        self.names.push(name);
        self.columns.push(values);
        Ok(())
    }

    /// Replace the values of an existing column.
    ///
    /// # Errors
    /// Returns a schema error if the column is missing or the length differs.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| Error::Schema(format!("column '{name}' not found")))?;
        if values.len() != self.n_rows() {
            return Err(Error::Schema(format!(
                "column '{name}' replacement has {} values, frame has {} rows",
                values.len(),
                self.n_rows()
            )));
        }
        self.columns[idx] = values;
        Ok(())
    }

    /// Remove a column, returning its values.
    pub fn drop_column(&mut self, name: &str) -> Option<Vec<Value>> {
        let idx = self.column_index(name)?;
        self.names.remove(idx);
        Some(self.columns.remove(idx))
    }

    /// Rename a column.
    ///
    /// # Errors
    /// Returns a schema error if `from` is missing or `to` already exists.
    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        if from == to {
            return Ok(());
        }
        if self.has_column(to) {
            return Err(Error::Schema(format!(
                "cannot rename '{from}' to '{to}': column exists"
            )));
        }
        let idx = self
            .column_index(from)
            .ok_or_else(|| Error::Schema(format!("column '{from}' not found")))?;
        self.names[idx] = to.to_string();
        Ok(())
    }

    /// Move the named columns to the front, in the given order; other columns keep
    /// their relative order after them.
    #[must_use]
    pub fn reorder_front(mut self, front: &[&str]) -> Self {
        let mut names = Vec::with_capacity(self.names.len());
        let mut columns = Vec::with_capacity(self.columns.len());
        for name in front {
            if let Some(idx) = self.column_index(name) {
                names.push(self.names.remove(idx));
                columns.push(self.columns.remove(idx));
            }
        }
        names.append(&mut self.names);
        columns.append(&mut self.columns);
        Self { names, columns }
    }

    /// Keep only the named columns, in the given order.
    ///
    /// # Errors
    /// Returns a schema error if any name is missing.
    pub fn select(&self, names: &[&str]) -> Result<Self> {
        let mut out = Self::new();
        for name in names {
            out.push_column(*name, self.require(name)?.to_vec())?;
        }
        Ok(out)
    }

    /// Rows at `indices`, in that order.
    #[must_use]
    pub fn take(&self, indices: &[usize]) -> Self {
        Self {
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| indices.iter().map(|&i| c[i].clone()).collect())
                .collect(),
        }
    }

    /// Rows where `mask` is true, preserving order.
    #[must_use]
    pub fn filter(&self, mask: &[bool]) -> Self {
        let idx: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, keep)| keep.then_some(i))
            .collect();
        self.take(&idx)
    }

    /// Append the rows of `other`. Column sets must match by name.
    ///
    /// # Errors
    /// Returns a schema error if the columns differ.
    pub fn append(&mut self, other: Self) -> Result<()> {
        if self.names.is_empty() && self.columns.is_empty() {
            *self = other;
            return Ok(());
        }
        if other.names.is_empty() {
            return Ok(());
        }
        if self.names != other.names {
            return Err(Error::Schema(format!(
                "cannot concatenate frames with columns [{}] and [{}]",
                self.names.join(", "),
                other.names.join(", ")
            )));
        }
        for (dst, src) in self.columns.iter_mut().zip(other.columns) {
            dst.extend(src);
        }
        Ok(())
    }

    /// Concatenate frames in order.
    ///
    /// # Errors
    /// See [`Frame::append`].
    pub fn concat(frames: impl IntoIterator<Item = Self>) -> Result<Self> {
        let mut out = Self::new();
        for f in frames {
            out.append(f)?;
        }
        Ok(out)
    }

    /// Cells of row `i`, in column order.
    #[must_use]
    pub fn row(&self, i: usize) -> Vec<&Value> {
        self.columns.iter().map(|c| &c[i]).collect()
    }

    /// Row indices grouped by the value of `name`, in first-seen order of the groups.
    ///
    /// # Errors
    /// Returns a schema error if the column is missing.
    pub fn group_indices(&self, name: &str) -> Result<Vec<(Value, Vec<usize>)>> {
        let col = self.require(name)?;
        let mut pos: HashMap<&Value, usize> = HashMap::new();
        let mut groups: Vec<(Value, Vec<usize>)> = Vec::new();
        for (i, v) in col.iter().enumerate() {
            let g = *pos.entry(v).or_insert_with(|| {
                groups.push((v.clone(), Vec::new()));
                groups.len() - 1
            });
            groups[g].1.push(i);
        }
        Ok(groups)
    }

    /// Stable sort permutation by the given columns, ascending.
    ///
    /// # Errors
    /// Returns a schema error if a column is missing.
    pub fn sorted_indices(&self, by: &[&str]) -> Result<Vec<usize>> {
        let keys: Vec<&[Value]> = by.iter().map(|n| self.require(n)).collect::<Result<_>>()?;
        let mut idx: Vec<usize> = (0..self.n_rows()).collect();
        idx.sort_by(|&a, &b| {
            keys.iter()
                .map(|k| k[a].cmp(&k[b]))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(idx)
    }
}
