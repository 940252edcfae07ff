//! Legend hierarchy: parts with one level of sub-parts.
//!
//! Membership is owned by the geometries (`Geometry::legend_part`). The
//! member lists kept here are an index over that field, maintained by
//! [`crate::composition::Composition`] so a geometry is listed in at most
//! one node at any time.

use crate::geometry::GeometryId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Legend errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LegendError {
    #[error("Unknown legend node: {0}")]
    UnknownNode(NodeId),
    #[error("Unknown legend part: {0}")]
    UnknownPart(NodeId),
    #[error("Legend node id already used: {0}")]
    DuplicateNode(NodeId),
}

/// Result type for legend operations.
pub type LegendResult<T> = Result<T, LegendError>;

/// Identity of a part or sub-part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    fn part() -> Self {
        Self(format!("part-{}", Uuid::new_v4().simple()))
    }

    fn sub_part() -> Self {
        Self(format!("subpart-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Reorder direction for parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Second-level grouping node.
#[derive(Debug, Clone, PartialEq)]
pub struct SubPart {
    pub id: NodeId,
    pub title: String,
    pub members: Vec<GeometryId>,
}

/// Top-level grouping node.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendPart {
    pub id: NodeId,
    pub title: String,
    pub members: Vec<GeometryId>,
    pub sub_parts: Vec<SubPart>,
}

/// Where a node sits in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Part,
    SubPart,
}

/// Ordered legend parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegendHierarchy {
    parts: Vec<LegendPart>,
}

impl LegendHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parts(&self) -> &[LegendPart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn part(&self, id: &NodeId) -> Option<&LegendPart> {
        self.parts.iter().find(|p| &p.id == id)
    }

    /// Append a part with no members and no sub-parts.
    pub fn add_part(&mut self, title: impl Into<String>) -> NodeId {
        let id = NodeId::part();
        self.parts.push(LegendPart {
            id: id.clone(),
            title: title.into(),
            members: Vec::new(),
            sub_parts: Vec::new(),
        });
        id
    }

    /// Append a part with a known id (import path).
    pub fn insert_part(&mut self, id: NodeId, title: impl Into<String>) -> LegendResult<()> {
        if self.node_kind(&id).is_some() {
            return Err(LegendError::DuplicateNode(id));
        }
        self.parts.push(LegendPart {
            id,
            title: title.into(),
            members: Vec::new(),
            sub_parts: Vec::new(),
        });
        Ok(())
    }

    /// Append `count` sub-parts titled `A`, `B`, ... after any existing ones.
    pub fn add_sub_parts(&mut self, part: &NodeId, count: usize) -> LegendResult<Vec<NodeId>> {
        let part = self.part_mut(part)?;
        let start = part.sub_parts.len();
        let ids: Vec<NodeId> = (0..count).map(|_| NodeId::sub_part()).collect();
        for (i, id) in ids.iter().enumerate() {
            part.sub_parts.push(SubPart {
                id: id.clone(),
                title: sub_part_title(start + i),
                members: Vec::new(),
            });
        }
        Ok(ids)
    }

    /// Append a sub-part with a known id (import path).
    pub fn insert_sub_part(
        &mut self,
        part: &NodeId,
        id: NodeId,
        title: impl Into<String>,
    ) -> LegendResult<()> {
        if self.node_kind(&id).is_some() {
            return Err(LegendError::DuplicateNode(id));
        }
        self.part_mut(part)?.sub_parts.push(SubPart {
            id,
            title: title.into(),
            members: Vec::new(),
        });
        Ok(())
    }

    pub fn rename_part(&mut self, id: &NodeId, title: impl Into<String>) -> LegendResult<()> {
        self.part_mut(id)?.title = title.into();
        Ok(())
    }

    pub fn rename_sub_part(&mut self, id: &NodeId, title: impl Into<String>) -> LegendResult<()> {
        let sub = self
            .parts
            .iter_mut()
            .flat_map(|p| p.sub_parts.iter_mut())
            .find(|s| &s.id == id)
            .ok_or_else(|| LegendError::UnknownNode(id.clone()))?;
        sub.title = title.into();
        Ok(())
    }

    /// Delete a part and its sub-parts. Returns every released geometry.
    pub fn delete_part(&mut self, id: &NodeId) -> LegendResult<Vec<GeometryId>> {
        let pos = self
            .parts
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| LegendError::UnknownPart(id.clone()))?;
        let part = self.parts.remove(pos);
        let mut released = part.members;
        for sub in part.sub_parts {
            released.extend(sub.members);
        }
        Ok(released)
    }

    /// Delete one sub-part. Returns its released geometries.
    pub fn delete_sub_part(&mut self, id: &NodeId) -> LegendResult<Vec<GeometryId>> {
        for part in &mut self.parts {
            if let Some(pos) = part.sub_parts.iter().position(|s| &s.id == id) {
                return Ok(part.sub_parts.remove(pos).members);
            }
        }
        Err(LegendError::UnknownNode(id.clone()))
    }

    /// Swap a part with its neighbour. Returns `false` at either end.
    pub fn move_part(&mut self, id: &NodeId, direction: Direction) -> LegendResult<bool> {
        let pos = self
            .parts
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| LegendError::UnknownPart(id.clone()))?;
        let target = match direction {
            Direction::Up if pos > 0 => pos - 1,
            Direction::Down if pos + 1 < self.parts.len() => pos + 1,
            _ => return Ok(false),
        };
        self.parts.swap(pos, target);
        Ok(true)
    }

    /// The node listing a geometry: parts first, then each part's sub-parts.
    pub fn resolve_part_of(&self, geometry: GeometryId) -> Option<&NodeId> {
        for part in &self.parts {
            if part.members.contains(&geometry) {
                return Some(&part.id);
            }
            for sub in &part.sub_parts {
                if sub.members.contains(&geometry) {
                    return Some(&sub.id);
                }
            }
        }
        None
    }

    pub fn node_kind(&self, id: &NodeId) -> Option<NodeKind> {
        for part in &self.parts {
            if &part.id == id {
                return Some(NodeKind::Part);
            }
            if part.sub_parts.iter().any(|s| &s.id == id) {
                return Some(NodeKind::SubPart);
            }
        }
        None
    }

    pub fn node_exists(&self, id: &NodeId) -> bool {
        self.node_kind(id).is_some()
    }

    pub fn node_title(&self, id: &NodeId) -> Option<&str> {
        self.parts.iter().find_map(|p| {
            if &p.id == id {
                Some(p.title.as_str())
            } else {
                p.sub_parts
                    .iter()
                    .find(|s| &s.id == id)
                    .map(|s| s.title.as_str())
            }
        })
    }

    pub fn members_of(&self, id: &NodeId) -> Option<&[GeometryId]> {
        self.parts.iter().find_map(|p| {
            if &p.id == id {
                Some(p.members.as_slice())
            } else {
                p.sub_parts
                    .iter()
                    .find(|s| &s.id == id)
                    .map(|s| s.members.as_slice())
            }
        })
    }

    /// How many member lists contain a geometry (0 or 1 when consistent).
    pub fn membership_count(&self, geometry: GeometryId) -> usize {
        self.parts
            .iter()
            .map(|p| {
                p.members.iter().filter(|&&g| g == geometry).count()
                    + p.sub_parts
                        .iter()
                        .map(|s| s.members.iter().filter(|&&g| g == geometry).count())
                        .sum::<usize>()
            })
            .sum()
    }

    /// List a geometry under a node, removing it from every other list first.
    pub(crate) fn insert_member(&mut self, node: &NodeId, geometry: GeometryId) -> LegendResult<()> {
        if !self.node_exists(node) {
            return Err(LegendError::UnknownNode(node.clone()));
        }
        self.remove_member(geometry);
        if let Some(list) = self.members_mut(node) {
            list.push(geometry);
        }
        Ok(())
    }

    /// Drop a geometry from every member list.
    pub(crate) fn remove_member(&mut self, geometry: GeometryId) -> bool {
        let mut removed = false;
        for part in &mut self.parts {
            let before = part.members.len();
            part.members.retain(|&g| g != geometry);
            removed |= part.members.len() != before;
            for sub in &mut part.sub_parts {
                let before = sub.members.len();
                sub.members.retain(|&g| g != geometry);
                removed |= sub.members.len() != before;
            }
        }
        removed
    }

    /// Sort a node's members to follow `order`; ids not in `order` keep
    /// their relative position after the ordered ones.
    pub(crate) fn order_members(&mut self, node: &NodeId, order: &[GeometryId]) {
        if let Some(list) = self.members_mut(node) {
            list.sort_by_key(|g| order.iter().position(|o| o == g).unwrap_or(usize::MAX));
        }
    }

    pub(crate) fn clear(&mut self) {
        self.parts.clear();
    }

    fn part_mut(&mut self, id: &NodeId) -> LegendResult<&mut LegendPart> {
        self.parts
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| LegendError::UnknownPart(id.clone()))
    }

    fn members_mut(&mut self, id: &NodeId) -> Option<&mut Vec<GeometryId>> {
        for part in &mut self.parts {
            if &part.id == id {
                return Some(&mut part.members);
            }
            if let Some(sub) = part.sub_parts.iter_mut().find(|s| &s.id == id) {
                return Some(&mut sub.members);
            }
        }
        None
    }
}

/// Spreadsheet-style letters: A..Z, AA, AB, ...
fn sub_part_title(index: usize) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        n -= 1;
        out.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_part() {
        let mut legend = LegendHierarchy::new();
        let id = legend.add_part("Routes");
        assert!(id.as_str().starts_with("part-"));
        let part = legend.part(&id).unwrap();
        assert_eq!(part.title, "Routes");
        assert!(part.members.is_empty());
        assert!(part.sub_parts.is_empty());
    }

    #[test]
    fn test_sub_part_titles_continue() {
        let mut legend = LegendHierarchy::new();
        let part = legend.add_part("Zones");
        legend.add_sub_parts(&part, 2).unwrap();
        let more = legend.add_sub_parts(&part, 1).unwrap();
        let titles: Vec<_> = legend.part(&part).unwrap().sub_parts.iter().map(|s| s.title.clone()).collect();
        assert_eq!(titles, ["A", "B", "C"]);
        assert_eq!(legend.node_kind(&more[0]), Some(NodeKind::SubPart));
    }

    #[test]
    fn test_sub_part_title_letters() {
        assert_eq!(sub_part_title(0), "A");
        assert_eq!(sub_part_title(25), "Z");
        assert_eq!(sub_part_title(26), "AA");
        assert_eq!(sub_part_title(27), "AB");
    }

    #[test]
    fn test_add_sub_parts_unknown_part() {
        let mut legend = LegendHierarchy::new();
        assert!(matches!(
            legend.add_sub_parts(&NodeId::from("nope"), 1),
            Err(LegendError::UnknownPart(_))
        ));
    }

    #[test]
    fn test_insert_member_is_exclusive() {
        let mut legend = LegendHierarchy::new();
        let a = legend.add_part("A");
        let b = legend.add_part("B");
        let subs = legend.add_sub_parts(&b, 1).unwrap();
        let g = GeometryId(1);
        legend.insert_member(&a, g).unwrap();
        legend.insert_member(&subs[0], g).unwrap();
        assert_eq!(legend.membership_count(g), 1);
        assert_eq!(legend.resolve_part_of(g), Some(&subs[0]));
        legend.insert_member(&subs[0], g).unwrap();
        assert_eq!(legend.members_of(&subs[0]).unwrap(), &[g]);
    }

    #[test]
    fn test_delete_part_releases_transitive_members() {
        let mut legend = LegendHierarchy::new();
        let p = legend.add_part("P");
        let subs = legend.add_sub_parts(&p, 2).unwrap();
        legend.insert_member(&p, GeometryId(1)).unwrap();
        legend.insert_member(&subs[1], GeometryId(2)).unwrap();
        let mut released = legend.delete_part(&p).unwrap();
        released.sort();
        assert_eq!(released, vec![GeometryId(1), GeometryId(2)]);
        assert!(!legend.node_exists(&subs[0]));
        assert_eq!(legend.resolve_part_of(GeometryId(2)), None);
    }

    #[test]
    fn test_delete_sub_part() {
        let mut legend = LegendHierarchy::new();
        let p = legend.add_part("P");
        let subs = legend.add_sub_parts(&p, 1).unwrap();
        legend.insert_member(&subs[0], GeometryId(3)).unwrap();
        assert_eq!(legend.delete_sub_part(&subs[0]).unwrap(), vec![GeometryId(3)]);
        assert!(legend.node_exists(&p));
        assert!(legend.delete_sub_part(&subs[0]).is_err());
    }

    #[test]
    fn test_rename() {
        let mut legend = LegendHierarchy::new();
        let p = legend.add_part("Old");
        let subs = legend.add_sub_parts(&p, 1).unwrap();
        legend.rename_part(&p, "New").unwrap();
        legend.rename_sub_part(&subs[0], "Detail").unwrap();
        assert_eq!(legend.node_title(&p), Some("New"));
        assert_eq!(legend.node_title(&subs[0]), Some("Detail"));
        assert!(legend.rename_sub_part(&p, "x").is_err());
    }

    #[test]
    fn test_move_part() {
        let mut legend = LegendHierarchy::new();
        let a = legend.add_part("A");
        let b = legend.add_part("B");
        assert!(!legend.move_part(&a, Direction::Up).unwrap());
        assert!(legend.move_part(&b, Direction::Up).unwrap());
        assert_eq!(legend.parts()[0].id, b);
        assert!(!legend.move_part(&a, Direction::Down).unwrap());
    }

    #[test]
    fn test_insert_part_rejects_duplicates() {
        let mut legend = LegendHierarchy::new();
        legend.insert_part(NodeId::from("part-1"), "One").unwrap();
        assert_eq!(
            legend.insert_part(NodeId::from("part-1"), "Again"),
            Err(LegendError::DuplicateNode(NodeId::from("part-1")))
        );
    }

    #[test]
    fn test_order_members() {
        let mut legend = LegendHierarchy::new();
        let p = legend.add_part("P");
        for g in [1, 2, 3] {
            legend.insert_member(&p, GeometryId(g)).unwrap();
        }
        legend.order_members(&p, &[GeometryId(3), GeometryId(1)]);
        assert_eq!(
            legend.members_of(&p).unwrap(),
            &[GeometryId(3), GeometryId(1), GeometryId(2)]
        );
    }
}
