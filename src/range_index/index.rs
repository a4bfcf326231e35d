use tracing::debug;

use crate::error::StoreError;
use crate::geometry::ElementRange;
use crate::id::ElementId;

use super::RangeTree;

/// Per-model spatial index over element bounding ranges.
///
/// The tree is created lazily on first insert. Every structural change
/// bumps the stamp; read-side consumers capture the stamp with their
/// results and compare it later instead of taking locks — a cheap
/// staleness signal rather than fine-grained invalidation.
#[derive(Debug, Clone)]
pub struct RangeIndex {
    tree: Option<RangeTree>,
    stamp: u64,
    is_3d: bool,
}

impl RangeIndex {
    pub fn new(is_3d: bool) -> Self {
        RangeIndex {
            tree: None,
            stamp: 0,
            is_3d,
        }
    }

    #[inline]
    pub fn is_3d(&self) -> bool {
        self.is_3d
    }

    /// Monotonically non-decreasing change counter.
    #[inline]
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    pub fn len(&self) -> usize {
        self.tree.as_ref().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert an element's range, tagged with the current stamp.
    ///
    /// A range that is not valid for this index's dimensionality is
    /// silently dropped — callers do not check a return value here, and
    /// upstream code relies on the drop not being reported as an error.
    pub fn add_range_element(&mut self, id: ElementId, range: ElementRange) {
        let valid = if self.is_3d {
            range.is_valid_3d()
        } else {
            range.is_valid_2d()
        };
        if !valid {
            debug!(%id, ?range, "dropping invalid range");
            return;
        }
        self.tree.get_or_insert_with(RangeTree::new).insert(id, range);
        self.stamp += 1;
    }

    /// Remove a previously-inserted entry by its prior range. Always
    /// succeeds; returns whether an entry was actually removed. An
    /// absent tree is a no-op — lazy initialization relies on that.
    pub fn remove_element(&mut self, id: ElementId, old_range: &ElementRange) -> bool {
        let Some(tree) = self.tree.as_mut() else {
            return false;
        };
        if tree.remove(id, old_range) {
            self.stamp += 1;
            true
        } else {
            false
        }
    }

    /// The model-wide aggregate range, if the tree has one. For 2D
    /// indexes the z bounds are forced to exactly 0 on return, whatever
    /// the tree stored transiently.
    pub fn range_if_known(&self) -> Result<ElementRange, StoreError> {
        let range = self
            .tree
            .as_ref()
            .and_then(|t| t.bounds())
            .ok_or(StoreError::RangeUnavailable)?;
        if self.is_3d {
            Ok(range)
        } else {
            Ok(range.flattened())
        }
    }

    /// Ids of every element whose range intersects `range`.
    pub fn query_intersecting(&self, range: &ElementRange) -> Vec<ElementId> {
        let mut out = Vec::new();
        if let Some(tree) = self.tree.as_ref() {
            tree.query_intersecting(range, &mut out);
        }
        out
    }

    /// Drop the tree and reinsert the given entries, applying the same
    /// validity gate as `add_range_element`. Used after bulk geometry or
    /// schema changes invalidate the index wholesale.
    pub fn rebuild<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (ElementId, ElementRange)>,
    {
        let mut tree = RangeTree::new();
        let mut dropped = 0usize;
        for (id, range) in entries {
            let valid = if self.is_3d {
                range.is_valid_3d()
            } else {
                range.is_valid_2d()
            };
            if valid {
                tree.insert(id, range);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!(dropped, "rebuild dropped invalid ranges");
        }
        self.tree = Some(tree);
        self.stamp += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range2d(lx: f64, ly: f64, hx: f64, hy: f64) -> ElementRange {
        ElementRange::from_coords(lx, ly, 0.0, hx, hy, 0.0)
    }

    fn id(raw: u64) -> ElementId {
        ElementId::new(raw)
    }

    #[test]
    fn empty_index_has_no_range() {
        let index = RangeIndex::new(false);
        assert!(matches!(
            index.range_if_known(),
            Err(StoreError::RangeUnavailable)
        ));
    }

    #[test]
    fn single_2d_element_scenario() {
        let mut index = RangeIndex::new(false);
        index.add_range_element(id(1), range2d(0.0, 0.0, 10.0, 10.0));
        let range = index.range_if_known().unwrap();
        assert_eq!(range, ElementRange::from_coords(0.0, 0.0, 0.0, 10.0, 10.0, 0.0));
    }

    #[test]
    fn invalid_2d_range_is_silently_dropped() {
        let mut index = RangeIndex::new(false);
        let before = index.stamp();
        // Nonzero z is invalid for a 2D index.
        index.add_range_element(id(1), ElementRange::from_coords(0.0, 0.0, 1.0, 5.0, 5.0, 1.0));
        // Inverted x is invalid everywhere.
        index.add_range_element(id(2), range2d(9.0, 0.0, 1.0, 5.0));
        assert!(index.is_empty());
        assert_eq!(index.stamp(), before);
    }

    #[test]
    fn invalid_3d_range_is_silently_dropped() {
        let mut index = RangeIndex::new(true);
        index.add_range_element(id(1), ElementRange::from_coords(0.0, 0.0, 5.0, 1.0, 1.0, 2.0));
        assert!(index.is_empty());
        // A flat range is fine in 3D.
        index.add_range_element(id(2), ElementRange::from_coords(0.0, 0.0, 2.0, 1.0, 1.0, 2.0));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn remove_on_uninitialized_index_is_noop() {
        let mut index = RangeIndex::new(false);
        assert!(!index.remove_element(id(1), &range2d(0.0, 0.0, 1.0, 1.0)));
        assert_eq!(index.stamp(), 0);
    }

    #[test]
    fn stamp_is_monotonic_and_bumped_by_structural_changes() {
        let mut index = RangeIndex::new(false);
        let mut last = index.stamp();

        index.add_range_element(id(1), range2d(0.0, 0.0, 1.0, 1.0));
        assert!(index.stamp() > last);
        last = index.stamp();

        index.add_range_element(id(2), range2d(5.0, 5.0, 6.0, 6.0));
        assert!(index.stamp() > last);
        last = index.stamp();

        // Failed removal is not a structural change.
        index.remove_element(id(9), &range2d(0.0, 0.0, 1.0, 1.0));
        assert_eq!(index.stamp(), last);

        index.remove_element(id(1), &range2d(0.0, 0.0, 1.0, 1.0));
        assert!(index.stamp() > last);
    }

    #[test]
    fn query_returns_intersecting_ids() {
        let mut index = RangeIndex::new(false);
        index.add_range_element(id(1), range2d(0.0, 0.0, 2.0, 2.0));
        index.add_range_element(id(2), range2d(10.0, 10.0, 12.0, 12.0));
        index.add_range_element(id(3), range2d(1.0, 1.0, 3.0, 3.0));

        let mut hits = index.query_intersecting(&range2d(0.5, 0.5, 2.5, 2.5));
        hits.sort();
        assert_eq!(hits, vec![id(1), id(3)]);
        assert!(index.query_intersecting(&range2d(50.0, 50.0, 60.0, 60.0)).is_empty());
    }

    #[test]
    fn rebuild_replaces_contents_and_bumps_stamp() {
        let mut index = RangeIndex::new(false);
        index.add_range_element(id(1), range2d(0.0, 0.0, 1.0, 1.0));
        let before = index.stamp();

        index.rebuild(vec![
            (id(2), range2d(5.0, 5.0, 6.0, 6.0)),
            // Invalid entry passes through the same gate.
            (id(3), range2d(9.0, 9.0, 1.0, 1.0)),
        ]);
        assert!(index.stamp() > before);
        assert_eq!(index.len(), 1);
        assert_eq!(index.range_if_known().unwrap(), range2d(5.0, 5.0, 6.0, 6.0));
    }
}
