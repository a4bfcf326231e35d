use serde_json::{json, Value};

use crate::error::StoreError;
use crate::geometry::ElementRange;
use crate::handler::{HandlerStatus, InstanceFormat};
use crate::id::{ElementId, ModelId};
use crate::store::{ElementRow, RowOp};

use super::Repository;

impl Repository {
    /// Create a new element of `class_name` in `model`.
    ///
    /// The class handler, if one is registered, gets first claim on the
    /// identity through `on_next_id`; otherwise (and whenever the
    /// handler defers or supplies an invalid id) the store's sequence
    /// allocates. The element's range goes through the model's validity
    /// gate — an invalid range leaves the element unindexed without
    /// failing the insert.
    pub fn insert_element(
        &self,
        model: ModelId,
        class_name: &str,
        properties: Value,
        range: Option<ElementRange>,
    ) -> Result<ElementId, StoreError> {
        self.access.check()?;
        let class = self.intern_class(class_name)?;

        let mut id = ElementId::INVALID;
        if let Some(handler) = self.resolve_handler(class, class_name) {
            if handler.on_next_id(&mut id) == HandlerStatus::NotHandled {
                id = ElementId::INVALID;
            }
        }
        if !id.is_valid() {
            id = self.row_store().next_id();
        }
        if self.row_store().get(id)?.is_some() {
            return Err(StoreError::DuplicateElement(id));
        }

        // Membership and index first: this also validates the model.
        self.with_model_mut(model, |m| m.add_element(id, range))?;

        let row = ElementRow::new(id, class, model, properties, range);
        self.row_store().put(row.clone())?;
        self.record_op(RowOp::Insert { after: row })?;
        Ok(id)
    }

    /// Replace an element's properties and range. Class and owning model
    /// are immutable for the row's lifetime.
    pub fn update_element(
        &self,
        id: ElementId,
        properties: Value,
        range: Option<ElementRange>,
    ) -> Result<(), StoreError> {
        self.access.check()?;
        let before = self
            .row_store()
            .get(id)?
            .ok_or(StoreError::ElementNotFound(id))?;

        self.with_model_mut(before.model, |m| {
            m.replace_element_range(id, before.range.as_ref(), range)
        })?;

        let after = ElementRow::new(id, before.class, before.model, properties, range);
        self.row_store().put(after.clone())?;
        self.record_op(RowOp::Update { before, after })?;
        Ok(())
    }

    pub fn delete_element(&self, id: ElementId) -> Result<(), StoreError> {
        self.access.check()?;
        let before = self
            .row_store()
            .remove(id)?
            .ok_or(StoreError::ElementNotFound(id))?;

        self.with_model_mut(before.model, |m| {
            m.remove_element(id, before.range.as_ref())
        })?;

        self.record_op(RowOp::Delete { before })?;
        Ok(())
    }

    /// The element's raw row, exactly as stored.
    pub fn element_row(&self, id: ElementId) -> Result<Option<ElementRow>, StoreError> {
        self.row_store().get(id)
    }

    /// Materialize an element into its JSON instance form and run the
    /// class handler's read hook over it.
    ///
    /// A class with no registered handler takes the plain path — the
    /// result is bit-identical to a build with no registry at all. A
    /// class identifier the connection cannot resolve degrades to the
    /// same generic access rather than failing the read.
    pub fn read_element(
        &self,
        id: ElementId,
        format: InstanceFormat,
    ) -> Result<Value, StoreError> {
        let row = self
            .row_store()
            .get(id)?
            .ok_or(StoreError::ElementNotFound(id))?;
        let class_name = self.class_name(row.class);
        let mut instance = materialize(&row, class_name.as_deref());

        if let Some(name) = class_name {
            if let Some(handler) = self.resolve_handler(row.class, &name) {
                handler.on_after_read_instance(&mut instance, &row, format);
            }
        }
        Ok(instance)
    }
}

/// Build the JSON instance form of a row. Unknown classes carry a null
/// class field; everything else is copied verbatim from the row.
fn materialize(row: &ElementRow, class_name: Option<&str>) -> Value {
    json!({
        "id": row.id.to_hex(),
        "class": class_name,
        "model": row.model.to_string(),
        "properties": row.properties,
    })
}
