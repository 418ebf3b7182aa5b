//! Materialized-path maintenance for the channel tree.
//!
//! Every channel stores the ordered list of its ancestor ids (root-first,
//! immediate-parent-last). Whenever a transaction creates a channel or moves
//! one under a different parent, the caller collects the affected ids and
//! invokes [`reconcile`] on the open transaction before committing, so the
//! structural change and every dependent path rewrite land atomically.
//!
//! The engine never fails on a malformed tree: a cyclic parent chain or a
//! chain deeper than [`MAX_DEPTH`] degrades to a bounded partial path rather
//! than an error or an unbounded loop.

use std::collections::{HashSet, VecDeque};

use rusqlite::Connection;

use crate::models::encode_path;
use warren_types::models::ChannelId;

/// Hard bound on ancestor hops during a path walk.
pub const MAX_DEPTH: usize = 50;

/// Read access to the live parent/child relation, as seen by the current
/// transaction. The seam exists so the walk logic can be exercised against
/// plain maps without a database.
pub trait ParentLookup {
    /// `Ok(None)` means the id is unknown to the store — for instance a
    /// staged row that has not been assigned an identifier yet. The inner
    /// option is the parent link (`None` = root).
    fn parent_of(&self, id: ChannelId) -> rusqlite::Result<Option<Option<ChannelId>>>;

    fn children_of(&self, id: ChannelId) -> rusqlite::Result<Vec<ChannelId>>;
}

/// The write half: overwrite a channel's stored path.
pub trait PathStore: ParentLookup {
    fn set_path(&self, id: ChannelId, path: &[ChannelId]) -> rusqlite::Result<()>;
}

/// Walk the parent chain starting at `start_parent`, collecting ancestor ids.
///
/// The walk stops, returning the partial path gathered so far, when it
/// revisits an id (cycle), exceeds [`MAX_DEPTH`] hops, or reaches an ancestor
/// the store does not know about. An unknown ancestor leaves the path short
/// for the rest of this flush; the next recomputation pass corrects it, and
/// in practice new channels are always leaves at creation time.
pub fn compute_path(
    store: &impl ParentLookup,
    start_parent: Option<ChannelId>,
) -> rusqlite::Result<Vec<ChannelId>> {
    let mut path = Vec::new();
    let mut seen: HashSet<ChannelId> = HashSet::new();
    let mut cursor = start_parent;

    while let Some(id) = cursor {
        if path.len() >= MAX_DEPTH || !seen.insert(id) {
            break;
        }
        path.push(id);
        match store.parent_of(id)? {
            Some(parent) => cursor = parent,
            None => break,
        }
    }

    path.reverse();
    Ok(path)
}

/// Pre-commit reconciliation: recompute the path of every pending channel
/// (newly created or reparented in the current transaction) and of every
/// transitive descendant, since an ancestor's path change invalidates the
/// whole subtree. Breadth-first with a visited set, so a malformed cycle in
/// the children relation still terminates; recomputation is idempotent per
/// node, making the traversal order irrelevant.
pub fn reconcile(store: &impl PathStore, pending: &[ChannelId]) -> rusqlite::Result<()> {
    let mut visited: HashSet<ChannelId> = HashSet::new();
    let mut queue: VecDeque<ChannelId> = VecDeque::new();

    for &id in pending {
        if visited.insert(id) {
            queue.push_back(id);
        }
    }

    while let Some(id) = queue.pop_front() {
        // A pending id the store no longer knows (deleted later in the same
        // transaction) has nothing to reconcile.
        let Some(parent) = store.parent_of(id)? else {
            continue;
        };

        let path = compute_path(store, parent)?;
        store.set_path(id, &path)?;

        for child in store.children_of(id)? {
            if visited.insert(child) {
                queue.push_back(child);
            }
        }
    }

    Ok(())
}

impl ParentLookup for Connection {
    fn parent_of(&self, id: ChannelId) -> rusqlite::Result<Option<Option<ChannelId>>> {
        let mut stmt = self.prepare_cached("SELECT parent_id FROM channels WHERE id = ?1")?;
        match stmt.query_row([id], |row| row.get::<_, Option<ChannelId>>(0)) {
            Ok(parent) => Ok(Some(parent)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn children_of(&self, id: ChannelId) -> rusqlite::Result<Vec<ChannelId>> {
        let mut stmt =
            self.prepare_cached("SELECT id FROM channels WHERE parent_id = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<ChannelId>>>()?;
        Ok(rows)
    }
}

impl PathStore for Connection {
    fn set_path(&self, id: ChannelId, path: &[ChannelId]) -> rusqlite::Result<()> {
        let mut stmt = self.prepare_cached("UPDATE channels SET path = ?1 WHERE id = ?2")?;
        stmt.execute(rusqlite::params![encode_path(path), id])?;
        Ok(())
    }
}
