mod class_handler;
mod fixup;
mod registry;

pub use class_handler::{ClassHandler, HandlerStatus, InstanceFormat};
pub use fixup::normalize_legacy_id;
pub use registry::ClassHandlerRegistry;
