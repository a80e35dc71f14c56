//! Reachability over the local object database
//!
//! Push sends the objects reachable from a ref's new tip that the encrypted
//! remote cannot already have: commits outside the ancestry of the remote's
//! advertised refs, plus whatever their trees add over the trees of the
//! known commits they build on.

use std::collections::HashSet;

use genc_core::{GencError, GencResult, ObjectId};

use crate::loose::ObjectKind;
use crate::odb::ObjectDatabase;

/// Tree entry mode for a submodule commit; never present in this repo's odb.
const GITLINK_MODE: &str = "160000";
const TREE_MODE: &str = "40000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: String,
    pub name: Vec<u8>,
    pub id: ObjectId,
}

impl TreeEntry {
    pub fn is_tree(&self) -> bool {
        self.mode == TREE_MODE
    }

    pub fn is_gitlink(&self) -> bool {
        self.mode == GITLINK_MODE
    }
}

pub fn parse_commit(payload: &[u8]) -> GencResult<CommitInfo> {
    let mut tree = None;
    let mut parents = Vec::new();
    for line in header_lines(payload) {
        if let Some(rest) = line.strip_prefix(b"tree ") {
            tree = Some(parse_id(rest)?);
        } else if let Some(rest) = line.strip_prefix(b"parent ") {
            parents.push(parse_id(rest)?);
        }
    }
    let tree = tree.ok_or_else(|| GencError::InvalidObject("commit without tree".into()))?;
    Ok(CommitInfo { tree, parents })
}

/// Target of an annotated tag.
pub fn parse_tag(payload: &[u8]) -> GencResult<ObjectId> {
    header_lines(payload)
        .find_map(|line| line.strip_prefix(b"object "))
        .ok_or_else(|| GencError::InvalidObject("tag without object".into()))
        .and_then(parse_id)
}

/// Tree payload: repeated `<mode> <name>\0<20-byte id>`.
pub fn parse_tree(payload: &[u8]) -> GencResult<Vec<TreeEntry>> {
    let mut entries = Vec::new();
    let mut rest = payload;
    while !rest.is_empty() {
        let space = rest
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| GencError::InvalidObject("tree entry without mode".into()))?;
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| GencError::InvalidObject("tree entry without name".into()))?;
        if nul < space || rest.len() < nul + 1 + 20 {
            return Err(GencError::InvalidObject("truncated tree entry".into()));
        }

        let mode = std::str::from_utf8(&rest[..space])
            .map_err(|_| GencError::InvalidObject("tree mode is not UTF-8".into()))?
            .to_string();
        let name = rest[space + 1..nul].to_vec();
        let mut digest = [0u8; 20];
        digest.copy_from_slice(&rest[nul + 1..nul + 21]);

        entries.push(TreeEntry {
            mode,
            name,
            id: ObjectId::from_digest(&digest),
        });
        rest = &rest[nul + 21..];
    }
    Ok(entries)
}

fn header_lines(payload: &[u8]) -> impl Iterator<Item = &[u8]> {
    payload
        .split(|&b| b == b'\n')
        .take_while(|line| !line.is_empty())
}

fn parse_id(bytes: &[u8]) -> GencResult<ObjectId> {
    let s = std::str::from_utf8(bytes)
        .map_err(|_| GencError::InvalidObject("object id is not UTF-8".into()))?;
    ObjectId::parse(s)
}

async fn read_decoded(
    odb: &dyn ObjectDatabase,
    id: &ObjectId,
) -> GencResult<(ObjectKind, Vec<u8>)> {
    odb.read_object(id).await?.decode()
}

/// Like [`read_decoded`], but `None` for objects this database lacks.
async fn read_if_present(
    odb: &dyn ObjectDatabase,
    id: &ObjectId,
) -> GencResult<Option<(ObjectKind, Vec<u8>)>> {
    match read_decoded(odb, id).await {
        Ok(obj) => Ok(Some(obj)),
        Err(GencError::MissingObject(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// All commits reachable from `tips` (tags peeled). Tips or ancestors
/// missing locally are skipped.
pub async fn commit_ancestors(
    odb: &dyn ObjectDatabase,
    tips: &[ObjectId],
) -> GencResult<HashSet<ObjectId>> {
    let mut commits = HashSet::new();
    let mut seen = HashSet::new();
    let mut stack: Vec<ObjectId> = tips.to_vec();

    while let Some(id) = stack.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        let Some((kind, data)) = read_if_present(odb, &id).await? else {
            continue;
        };
        match kind {
            ObjectKind::Commit => {
                stack.extend(parse_commit(&data)?.parents);
                commits.insert(id);
            }
            ObjectKind::Tag => stack.push(parse_tag(&data)?),
            ObjectKind::Tree | ObjectKind::Blob => {}
        }
    }
    Ok(commits)
}

/// Whether `ancestor` is reachable from `descendant` (or equal to it).
pub async fn is_ancestor(
    odb: &dyn ObjectDatabase,
    ancestor: &ObjectId,
    descendant: &ObjectId,
) -> GencResult<bool> {
    if ancestor == descendant {
        return Ok(true);
    }
    let ancestry = commit_ancestors(odb, std::slice::from_ref(descendant)).await?;
    Ok(ancestry.contains(ancestor))
}

/// Objects reachable from `tip` that are not reachable from `haves`.
///
/// Precise for commits; for trees and blobs, only the trees of known commits
/// adjacent to the new history are subtracted, so an unchanged object may be
/// sent again. Re-sending is harmless since exports are idempotent.
pub async fn objects_to_push(
    odb: &dyn ObjectDatabase,
    tip: &ObjectId,
    haves: &[ObjectId],
) -> GencResult<Vec<ObjectId>> {
    let known_commits = commit_ancestors(odb, haves).await?;

    let mut out = Vec::new();
    // Trees still to expand
    let mut pending = Vec::new();
    let mut boundary = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![tip.clone()];

    while let Some(id) = stack.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        if known_commits.contains(&id) {
            boundary.push(id);
            continue;
        }
        let (kind, data) = read_decoded(odb, &id).await?;
        match kind {
            ObjectKind::Commit => {
                let commit = parse_commit(&data)?;
                pending.push(commit.tree);
                stack.extend(commit.parents);
                out.push(id);
            }
            ObjectKind::Tag => {
                stack.push(parse_tag(&data)?);
                out.push(id);
            }
            ObjectKind::Tree => pending.push(id),
            ObjectKind::Blob => out.push(id),
        }
    }

    let mut known = HashSet::new();
    for commit in &boundary {
        mark_tree_closure(odb, commit, &mut known).await?;
    }

    // Blobs are taken from tree entries without being read
    let mut seen = HashSet::new();
    while let Some(tree) = pending.pop() {
        if known.contains(&tree) || !seen.insert(tree.clone()) {
            continue;
        }
        let (_, data) = read_decoded(odb, &tree).await?;
        for entry in parse_tree(&data)? {
            if entry.is_tree() {
                pending.push(entry.id);
            } else if !entry.is_gitlink()
                && !known.contains(&entry.id)
                && seen.insert(entry.id.clone())
            {
                out.push(entry.id);
            }
        }
        out.push(tree);
    }

    tracing::debug!(tip = %tip, count = out.len(), boundary = boundary.len(), "computed push set");
    Ok(out)
}

/// Add every tree and blob reachable from `commit`'s tree to `known`.
async fn mark_tree_closure(
    odb: &dyn ObjectDatabase,
    commit: &ObjectId,
    known: &mut HashSet<ObjectId>,
) -> GencResult<()> {
    let Some((ObjectKind::Commit, data)) = read_if_present(odb, commit).await? else {
        return Ok(());
    };
    let mut trees = vec![parse_commit(&data)?.tree];

    while let Some(tree) = trees.pop() {
        if !known.insert(tree.clone()) {
            continue;
        }
        let Some((ObjectKind::Tree, data)) = read_if_present(odb, &tree).await? else {
            continue;
        };
        for entry in parse_tree(&data)? {
            if entry.is_tree() {
                trees.push(entry.id);
            } else if !entry.is_gitlink() {
                known.insert(entry.id);
            }
        }
    }
    Ok(())
}
