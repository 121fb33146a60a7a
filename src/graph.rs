//! Bipartite user-item graph view of a dataset.

use crate::datarec::{DataRec, Role};
use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::value::Value;
use std::collections::HashSet;

/// Undirected bipartite graph: users are nodes `[0, n_users)`, items are nodes
/// `[n_users, n_users + n_items)`. Repeated interactions collapse into one edge.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphRec {
    n_users: usize,
    n_items: usize,
    edges: Vec<(usize, usize)>,
    adjacency: Vec<Vec<usize>>,
    users: Encoder,
    items: Encoder,
}

fn node(v: &Value, role: Role) -> Result<usize> {
    v.as_i64()
        .and_then(|c| usize::try_from(c).ok())
        .ok_or_else(|| Error::Schema(format!("{} {v:?} is not a node id", role.canonical())))
}

impl GraphRec {
    /// Build from a dataset whose users are encoded to `[0, n_users)` and items to
    /// `[n_users, n_users + n_items)`.
    ///
    /// # Errors
    /// Returns a schema error if an id is not a valid node index.
    pub fn from_datarec(data: &DataRec) -> Result<Self> {
        let n_users = data.user_encoder().len();
        let n_items = data.item_encoder().len();
        let n = n_users + n_items;
        let users = data.role_values(Role::User)?;
        let items = data.role_values(Role::Item)?;

        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        let mut adjacency = vec![Vec::new(); n];
        for (u, i) in users.iter().zip(items) {
            let (u, i) = (node(u, Role::User)?, node(i, Role::Item)?);
            if u >= n_users || i < n_users || i >= n {
                return Err(Error::Schema(format!(
                    "edge ({u}, {i}) outside the user range [0, {n_users}) or item range [{n_users}, {n})"
                )));
            }
            if seen.insert((u, i)) {
                edges.push((u, i));
                adjacency[u].push(i);
                adjacency[i].push(u);
            }
        }
        Ok(Self {
            n_users,
            n_items,
            edges,
            adjacency,
            users: data.user_encoder().clone(),
            items: data.item_encoder().clone(),
        })
    }

    #[must_use]
    pub const fn n_users(&self) -> usize {
        self.n_users
    }

    #[must_use]
    pub const fn n_items(&self) -> usize {
        self.n_items
    }

    #[must_use]
    pub const fn n_nodes(&self) -> usize {
        self.n_users + self.n_items
    }

    #[must_use]
    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    /// `(user_node, item_node)` pairs in first-seen order.
    #[must_use]
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    #[must_use]
    pub const fn is_user(&self, node: usize) -> bool {
        node < self.n_users
    }

    #[must_use]
    pub fn neighbors(&self, node: usize) -> &[usize] {
        self.adjacency.get(node).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn degree(&self, node: usize) -> usize {
        self.neighbors(node).len()
    }

    #[must_use]
    pub fn degrees(&self) -> Vec<usize> {
        self.adjacency.iter().map(Vec::len).collect()
    }

    /// Fraction of possible user-item edges present.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn density(&self) -> f64 {
        let possible = self.n_users * self.n_items;
        if possible == 0 {
            return 0.0;
        }
        self.edges.len() as f64 / possible as f64
    }

    /// Public identifier of a node.
    #[must_use]
    pub fn label(&self, node: usize) -> Option<&Value> {
        let code = i64::try_from(node).ok()?;
        if self.is_user(node) {
            self.users.decode(code)
        } else {
            self.items.decode(code)
        }
    }
}
