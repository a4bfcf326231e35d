use crate::id::ElementId;
use crate::store::ElementRow;

/// Outcome of an extension-point invocation: whether the handler took
/// responsibility for the event or deferred to the default behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerStatus {
    Handled,
    NotHandled,
}

/// Wire form requested for a materialized instance. `Standard` is the
/// canonical encoding; `Legacy` asks handlers to preserve pre-conversion
/// field encodings for callers that still expect them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceFormat {
    Standard,
    Legacy,
}

/// Per-class extension points invoked during instance marshalling.
///
/// Handlers are stateless or connection-scoped; the registry owns them
/// for the lifetime of the connection. Every method has a no-op default,
/// and an unregistered class behaves exactly as if every method deferred
/// — registering nothing must be indistinguishable from this trait not
/// existing at all.
pub trait ClassHandler: Send + Sync {
    /// Called when a brand-new instance needs an identity. Write a valid
    /// id into `next` and return `Handled` to supply a custom allocation
    /// strategy; return `NotHandled` to defer to the store's sequence.
    fn on_next_id(&self, next: &mut ElementId) -> HandlerStatus {
        let _ = next;
        HandlerStatus::NotHandled
    }

    /// Called after a row has been materialized into its JSON instance
    /// form. Handlers may normalize legacy field encodings here; when no
    /// fix-up is needed the instance must be left untouched.
    fn on_after_read_instance(
        &self,
        instance: &mut serde_json::Value,
        row: &ElementRow,
        format: InstanceFormat,
    ) {
        let _ = (instance, row, format);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{ClassId, ModelId};
    use serde_json::json;

    struct NoOverrides;
    impl ClassHandler for NoOverrides {}

    #[test]
    fn defaults_defer_and_leave_instance_untouched() {
        let handler = NoOverrides;

        let mut id = ElementId::INVALID;
        assert_eq!(handler.on_next_id(&mut id), HandlerStatus::NotHandled);
        assert_eq!(id, ElementId::INVALID);

        let row = ElementRow::new(
            ElementId::new(1),
            ClassId::new(0),
            ModelId::new(1),
            json!({"a": 1}),
            None,
        );
        let mut instance = json!({"a": 1});
        handler.on_after_read_instance(&mut instance, &row, InstanceFormat::Standard);
        assert_eq!(instance, json!({"a": 1}));
    }
}
