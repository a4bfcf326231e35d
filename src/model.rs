use std::collections::HashSet;

use crate::error::StoreError;
use crate::geometry::ElementRange;
use crate::id::{ElementId, ModelId};
use crate::range_index::RangeIndex;

/// Dimensionality of a model's content. Drawing models are planar;
/// their element ranges live at z == 0 and their queries report z == 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Drawing,
    Spatial,
}

impl ModelKind {
    #[inline]
    pub fn is_3d(self) -> bool {
        matches!(self, ModelKind::Spatial)
    }
}

/// A named container of elements, scoped to one database, owning one
/// range index. The index stores element ids only; the actual rows are
/// reached through the repository, so there is no ownership cycle.
#[derive(Debug)]
pub struct Model {
    id: ModelId,
    name: String,
    kind: ModelKind,
    elements: HashSet<ElementId>,
    index: RangeIndex,
}

impl Model {
    pub(crate) fn new(id: ModelId, name: impl Into<String>, kind: ModelKind) -> Self {
        Model {
            id,
            name: name.into(),
            kind,
            elements: HashSet::new(),
            index: RangeIndex::new(kind.is_3d()),
        }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.contains(&id)
    }

    /// Current staleness stamp of the owned range index.
    pub fn index_stamp(&self) -> u64 {
        self.index.stamp()
    }

    pub fn range_if_known(&self) -> Result<ElementRange, StoreError> {
        self.index.range_if_known()
    }

    pub fn query_intersecting(&self, range: &ElementRange) -> Vec<ElementId> {
        self.index.query_intersecting(range)
    }

    pub(crate) fn add_element(&mut self, id: ElementId, range: Option<ElementRange>) {
        self.elements.insert(id);
        if let Some(range) = range {
            self.index.add_range_element(id, range);
        }
    }

    pub(crate) fn remove_element(&mut self, id: ElementId, old_range: Option<&ElementRange>) {
        self.elements.remove(&id);
        if let Some(range) = old_range {
            self.index.remove_element(id, range);
        }
    }

    pub(crate) fn replace_element_range(
        &mut self,
        id: ElementId,
        old_range: Option<&ElementRange>,
        new_range: Option<ElementRange>,
    ) {
        if let Some(range) = old_range {
            self.index.remove_element(id, range);
        }
        if let Some(range) = new_range {
            self.index.add_range_element(id, range);
        }
    }

    pub(crate) fn element_ids(&self) -> Vec<ElementId> {
        self.elements.iter().copied().collect()
    }

    pub(crate) fn rebuild_index<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (ElementId, ElementRange)>,
    {
        self.index.rebuild(entries);
    }
}
