use tracing::warn;

use crate::id::ElementId;

/// Rewrite a legacy id field to the canonical `0x`-hex string encoding.
///
/// Older distributions persisted element ids as raw 64-bit integers (or
/// their decimal string form); today's canonical encoding is the hex
/// string. Handlers call this from `on_after_read_instance` for each
/// affected field.
///
/// An absent field is left alone. A value that fails to parse is logged
/// as a warning and left exactly as stored — never coerced into a
/// valid-looking but wrong id. Converted ids are therefore either valid
/// or still explicitly in their invalid legacy form.
pub fn normalize_legacy_id(instance: &mut serde_json::Value, field: &str) {
    let Some(value) = instance.get_mut(field) else {
        return;
    };
    if value.is_null() {
        return;
    }

    match ElementId::from_legacy_json(value) {
        Some(id) => {
            let canonical = serde_json::Value::String(id.to_hex());
            if *value != canonical {
                *value = canonical;
            }
        }
        None => {
            warn!(field, %value, "legacy id failed to parse; leaving stored value");
        }
    }
}
