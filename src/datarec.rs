//! The core dataset value.
//!
//! A [`DataRec`] owns an interaction table, the labels of its user/item/rating/timestamp
//! columns, one identifier encoder per side, dataset/version tags and the
//! [`Pipeline`] that produced it. Transformations never mutate a `DataRec`; they return
//! a new value whose pipeline is one step longer.

use crate::characteristics::Stats;
use crate::encoder::Encoder;
use crate::error::{Error, IoContext, Result};
use crate::frame::Frame;
use crate::graph::GraphRec;
use crate::paths;
use crate::pipeline::{Pipeline, Step};
use crate::rawdata::{AsRawData, ITEM_ID, RATING, RawData, Roles, TIMESTAMP, USER_ID};
use crate::task::{Task, TaskDataset};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Interaction roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Item,
    Rating,
    Timestamp,
}

impl Role {
    /// Canonical column name for this role.
    #[must_use]
    pub const fn canonical(self) -> &'static str {
        match self {
            Self::User => USER_ID,
            Self::Item => ITEM_ID,
            Self::Rating => RATING,
            Self::Timestamp => TIMESTAMP,
        }
    }
}

/// Which identifier side an encoding operation applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Users,
    Items,
    Both,
}

impl Scope {
    const fn sides(self) -> &'static [Side] {
        match self {
            Self::Users => &[Side::User],
            Self::Items => &[Side::Item],
            Self::Both => &[Side::User, Side::Item],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    User,
    Item,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataRec {
    frame: Frame,
    roles: Roles,
    user_encoder: Encoder,
    item_encoder: Encoder,
    users_encoded: bool,
    items_encoded: bool,
    dataset_name: Option<String>,
    version_name: Option<String>,
    #[serde(with = "crate::pipeline::as_yaml")]
    pipeline: Pipeline,
}

impl DataRec {
    /// An empty dataset without roles.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap raw data.
    ///
    /// Columns are reordered to `(user, item, rating?, timestamp?)` and any encoders
    /// carried by `raw` are installed. Without a `pipeline` the value has no lineage and
    /// cannot be replayed.
    ///
    /// # Errors
    /// Returns a schema error if the user or item role is missing on a non-empty table,
    /// or a role names a column that does not exist.
    pub fn new(raw: RawData, pipeline: Option<Pipeline>) -> Result<Self> {
        let pipeline = pipeline.unwrap_or_else(|| {
            warn!("DataRec created without a pipeline; it cannot be replayed");
            Pipeline::new()
        });
        Self::assemble(raw, pipeline)
    }

    /// Wrap raw data that was derived from `ancestor`, inheriting its tags and lineage.
    ///
    /// # Errors
    /// See [`DataRec::new`].
    pub fn derived(raw: RawData, ancestor: &Self) -> Result<Self> {
        let mut d = Self::assemble(raw, ancestor.pipeline.clone())?;
        d.dataset_name.clone_from(&ancestor.dataset_name);
        d.version_name.clone_from(&ancestor.version_name);
        Ok(d)
    }

    fn assemble(raw: RawData, pipeline: Pipeline) -> Result<Self> {
        let RawData {
            frame,
            roles,
            user_encoder,
            item_encoder,
        } = raw;
        let has_table = frame.n_cols() > 0;
        if has_table && (roles.user.is_none() || roles.item.is_none()) {
            return Err(Error::Schema(
                "user and item columns must be assigned for a non-empty table".into(),
            ));
        }
        for col in roles.ordered() {
            frame.require(col)?;
        }
        let frame = frame.reorder_front(&roles.ordered());
        Ok(Self {
            frame,
            roles,
            users_encoded: user_encoder.is_some(),
            items_encoded: item_encoder.is_some(),
            user_encoder: user_encoder.unwrap_or_default(),
            item_encoder: item_encoder.unwrap_or_default(),
            dataset_name: None,
            version_name: None,
            pipeline,
        })
    }

    /// Tag the value with its registry dataset and version.
    #[must_use]
    pub fn with_dataset(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.dataset_name = Some(name.into());
        self.version_name = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// A new value over `frame` with the same roles and encoders and one more step.
    pub(crate) fn derive(&self, frame: Frame, roles: Roles, step: Step) -> Result<Self> {
        let frame = frame.reorder_front(&roles.ordered());
        Ok(Self {
            frame,
            roles,
            user_encoder: self.user_encoder.clone(),
            item_encoder: self.item_encoder.clone(),
            users_encoded: self.users_encoded,
            items_encoded: self.items_encoded,
            dataset_name: self.dataset_name.clone(),
            version_name: self.version_name.clone(),
            pipeline: self.pipeline.extended(step)?,
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[must_use]
    pub const fn frame(&self) -> &Frame {
        &self.frame
    }

    #[must_use]
    pub const fn roles(&self) -> &Roles {
        &self.roles
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frame.n_rows()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    #[must_use]
    pub fn user_col(&self) -> Option<&str> {
        self.roles.user.as_deref()
    }

    #[must_use]
    pub fn item_col(&self) -> Option<&str> {
        self.roles.item.as_deref()
    }

    #[must_use]
    pub fn rating_col(&self) -> Option<&str> {
        self.roles.rating.as_deref()
    }

    #[must_use]
    pub fn timestamp_col(&self) -> Option<&str> {
        self.roles.timestamp.as_deref()
    }

    /// Column label bound to `role`.
    #[must_use]
    pub fn role_col(&self, role: Role) -> Option<&str> {
        match role {
            Role::User => self.user_col(),
            Role::Item => self.item_col(),
            Role::Rating => self.rating_col(),
            Role::Timestamp => self.timestamp_col(),
        }
    }

    /// Values of the column bound to `role`.
    ///
    /// # Errors
    /// Returns a schema error if the role is not assigned.
    pub fn role_values(&self, role: Role) -> Result<&[Value]> {
        let col = self.role_col(role).ok_or_else(|| {
            Error::Schema(format!("dataset has no {} column", role.canonical()))
        })?;
        self.frame.require(col)
    }

    #[must_use]
    pub fn dataset_name(&self) -> Option<&str> {
        self.dataset_name.as_deref()
    }

    #[must_use]
    pub fn version_name(&self) -> Option<&str> {
        self.version_name.as_deref()
    }

    #[must_use]
    pub const fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    #[must_use]
    pub const fn user_encoder(&self) -> &Encoder {
        &self.user_encoder
    }

    #[must_use]
    pub const fn item_encoder(&self) -> &Encoder {
        &self.item_encoder
    }

    #[must_use]
    pub const fn users_encoded(&self) -> bool {
        self.users_encoded
    }

    #[must_use]
    pub const fn items_encoded(&self) -> bool {
        self.items_encoded
    }

    /// Statistics and characteristics of the current table.
    #[must_use]
    pub const fn stats(&self) -> Stats<'_> {
        Stats::new(self)
    }

    // ------------------------------------------------------------------
    // Roles
    // ------------------------------------------------------------------

    /// Bind `role` to the column `col`, optionally renaming it to the canonical name.
    ///
    /// # Errors
    /// Returns a schema error if `col` is not a column of the table, or the canonical
    /// name is already taken by another column.
    pub fn set_role(&mut self, role: Role, col: &str, rename: bool) -> Result<()> {
        self.frame.require(col)?;
        let label = if rename {
            let canonical = role.canonical();
            self.frame.rename_column(col, canonical)?;
            for slot in [
                &mut self.roles.user,
                &mut self.roles.item,
                &mut self.roles.rating,
                &mut self.roles.timestamp,
            ] {
                if slot.as_deref() == Some(col) {
                    *slot = Some(canonical.to_string());
                }
            }
            canonical.to_string()
        } else {
            col.to_string()
        };
        match role {
            Role::User => self.roles.user = Some(label),
            Role::Item => self.roles.item = Some(label),
            Role::Rating => self.roles.rating = Some(label),
            Role::Timestamp => self.roles.timestamp = Some(label),
        }
        self.frame = std::mem::take(&mut self.frame).reorder_front(&self.roles.ordered());
        Ok(())
    }

    /// See [`DataRec::set_role`].
    ///
    /// # Errors
    /// See [`DataRec::set_role`].
    pub fn set_user_col(&mut self, col: &str, rename: bool) -> Result<()> {
        self.set_role(Role::User, col, rename)
    }

    /// See [`DataRec::set_role`].
    ///
    /// # Errors
    /// See [`DataRec::set_role`].
    pub fn set_item_col(&mut self, col: &str, rename: bool) -> Result<()> {
        self.set_role(Role::Item, col, rename)
    }

    /// See [`DataRec::set_role`].
    ///
    /// # Errors
    /// See [`DataRec::set_role`].
    pub fn set_rating_col(&mut self, col: &str, rename: bool) -> Result<()> {
        self.set_role(Role::Rating, col, rename)
    }

    /// See [`DataRec::set_role`].
    ///
    /// # Errors
    /// See [`DataRec::set_role`].
    pub fn set_timestamp_col(&mut self, col: &str, rename: bool) -> Result<()> {
        self.set_role(Role::Timestamp, col, rename)
    }

    // ------------------------------------------------------------------
    // Identifier encoding
    // ------------------------------------------------------------------

    fn side_col(&self, side: Side) -> Result<String> {
        let role = match side {
            Side::User => Role::User,
            Side::Item => Role::Item,
        };
        self.role_col(role)
            .map(str::to_string)
            .ok_or_else(|| Error::Schema(format!("dataset has no {} column", role.canonical())))
    }

    fn side_state(&mut self, side: Side) -> (&mut Encoder, &mut bool) {
        match side {
            Side::User => (&mut self.user_encoder, &mut self.users_encoded),
            Side::Item => (&mut self.item_encoder, &mut self.items_encoded),
        }
    }

    /// Public identifiers of one side, decoding if the column currently holds codes.
    fn public_values(&self, side: Side) -> Result<Vec<Value>> {
        let col = self.side_col(side)?;
        let values = self.frame.require(&col)?;
        let (enc, encoded) = match side {
            Side::User => (&self.user_encoder, self.users_encoded),
            Side::Item => (&self.item_encoder, self.items_encoded),
        };
        if encoded {
            enc.decode_column(values)
        } else {
            Ok(values.to_vec())
        }
    }

    /// Build dense mappings `[offset, offset + n)` in first-seen order.
    ///
    /// If a side is currently encoded, its column is re-encoded with the new mapping.
    ///
    /// # Errors
    /// Returns a schema error if a required role is missing.
    pub fn build_encoding(&mut self, scope: Scope, offset: i64) -> Result<()> {
        for &side in scope.sides() {
            let col = self.side_col(side)?;
            let public = self.public_values(side)?;
            let enc = Encoder::build(public.iter(), offset);
            let (slot, encoded) = self.side_state(side);
            let was_encoded = *encoded;
            *slot = enc;
            if was_encoded {
                let codes = slot.encode_column(&public)?;
                self.frame.set_column(&col, codes)?;
            }
            debug!(?side, offset, "encoding built");
        }
        Ok(())
    }

    /// Install an externally constructed mapping for one side.
    ///
    /// # Errors
    /// Returns a schema error if the mapping is not a dense bijection, or a usage error
    /// for [`Scope::Both`].
    pub fn apply_encoding(&mut self, scope: Scope, forward: HashMap<Value, i64>) -> Result<()> {
        let side = match scope {
            Scope::Users => Side::User,
            Scope::Items => Side::Item,
            Scope::Both => {
                return Err(Error::Usage(
                    "apply_encoding takes a single side (users or items)".into(),
                ));
            }
        };
        let enc = Encoder::from_forward(forward)?;
        let was_encoded = *self.side_state(side).1;
        if was_encoded {
            let col = self.side_col(side)?;
            let public = self.public_values(side)?;
            self.frame.set_column(&col, enc.encode_column(&public)?)?;
        }
        *self.side_state(side).0 = enc;
        Ok(())
    }

    /// Replace identifiers with their codes, building encoders where none exist.
    ///
    /// # Errors
    /// Returns a schema error if a required role is missing.
    pub fn encode(&mut self, scope: Scope) -> Result<()> {
        for &side in scope.sides() {
            let col = self.side_col(side)?;
            if *self.side_state(side).1 {
                continue;
            }
            if self.side_state(side).0.is_empty() {
                let enc = Encoder::build(self.frame.require(&col)?.iter(), 0);
                *self.side_state(side).0 = enc;
            }
            let values = self.frame.require(&col)?.to_vec();
            let codes = self.side_state(side).0.encode_column(&values)?;
            self.frame.set_column(&col, codes)?;
            *self.side_state(side).1 = true;
        }
        Ok(())
    }

    /// Restore public identifiers where a side is encoded.
    ///
    /// # Errors
    /// Returns a schema error if a code has no decoding.
    pub fn decode(&mut self, scope: Scope) -> Result<()> {
        for &side in scope.sides() {
            if !*self.side_state(side).1 {
                continue;
            }
            let col = self.side_col(side)?;
            let public = self.public_values(side)?;
            self.frame.set_column(&col, public)?;
            *self.side_state(side).1 = false;
        }
        Ok(())
    }

    /// Decode if needed, then forget the mapping.
    ///
    /// # Errors
    /// See [`DataRec::decode`].
    pub fn reset_encoding(&mut self, scope: Scope) -> Result<()> {
        self.decode(scope)?;
        for &side in scope.sides() {
            self.side_state(side).0.reset();
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Conversions
    // ------------------------------------------------------------------

    /// Bipartite graph view with disjoint user and item node ids.
    ///
    /// Users are encoded to `[0, n_users)` and items to `[n_users, n_users + n_items)`.
    ///
    /// # Errors
    /// Returns a schema error if the user or item role is missing.
    pub fn to_graphrec(&self) -> Result<GraphRec> {
        let mut d = self.clone();
        d.build_encoding(Scope::Users, 0)?;
        let n_users = i64::try_from(d.user_encoder.len()).unwrap_or(i64::MAX);
        d.build_encoding(Scope::Items, n_users)?;
        d.encode(Scope::Both)?;
        GraphRec::from_datarec(&d)
    }

    /// Task-shaped index view for model training frameworks.
    ///
    /// With `autoprepare`, identifiers are integer-encoded first; otherwise they must
    /// already be encoded.
    ///
    /// # Errors
    /// Returns a usage error if identifiers are not encoded and `autoprepare` is false.
    pub fn to_torch_dataset(&self, task: Task, autoprepare: bool) -> Result<TaskDataset> {
        if self.users_encoded && self.items_encoded {
            return TaskDataset::build(self, task);
        }
        if !autoprepare {
            return Err(Error::Usage(
                "identifiers must be integer-encoded; encode first or pass autoprepare".into(),
            ));
        }
        let mut d = self.clone();
        d.encode(Scope::Both)?;
        TaskDataset::build(&d, task)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Serialize to `path`, or to the registry snapshot location for this dataset.
    ///
    /// # Errors
    /// Returns a usage error if no path is given and the value has no dataset/version
    /// tags, or an I/O error if the file cannot be written.
    pub fn to_snapshot(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match (&self.dataset_name, &self.version_name) {
                (Some(n), Some(v)) => paths::snapshot_path(n, v),
                _ => {
                    return Err(Error::Usage(
                        "snapshot path required for a dataset without registry tags".into(),
                    ));
                }
            },
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).io_context(|| format!("mkdir -p {}", parent.display()))?;
        }
        let bytes = postcard::to_allocvec(self)?;
        let mut f = File::create(&path).io_context(|| format!("create {}", path.display()))?;
        f.write_all(&bytes)
            .io_context(|| format!("write {}", path.display()))?;
        info!(path = %path.display(), rows = self.len(), "dataset snapshot written");
        Ok(path)
    }
}

/// Read a dataset written with [`DataRec::to_snapshot`].
///
/// # Errors
/// Returns [`Error::NotFound`] for a missing file or a snapshot error for corrupt bytes.
pub fn from_snapshot(path: impl AsRef<Path>) -> Result<DataRec> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::NotFound(path.to_path_buf()));
    }
    let bytes = fs::read(path).io_context(|| format!("read {}", path.display()))?;
    Ok(postcard::from_bytes(&bytes)?)
}

impl AsRawData for DataRec {
    fn to_rawdata(&self) -> RawData {
        RawData {
            frame: self.frame.clone(),
            roles: self.roles.clone(),
            user_encoder: self.users_encoded.then(|| self.user_encoder.clone()),
            item_encoder: self.items_encoded.then(|| self.item_encoder.clone()),
        }
    }
}
