//! Object-management menu abstraction.

use uuid::Uuid;

/// Receives tracked-object add/remove notifications for display.
///
/// The production implementation backs the "Manage Tracked Objects" menu;
/// tests use [`NullSink`] or a recording mock.
pub trait ObjectListSink: Send + Sync + 'static {
    /// A new instance of a model was detected.
    fn object_added(&self, model_id: Uuid, instance_id: Uuid, display_name: &str);

    /// The tracked instance of a model went away.
    fn object_removed(&self, model_id: Uuid);
}

/// Sink that ignores all notifications.
#[derive(Debug, Default)]
pub struct NullSink;

impl ObjectListSink for NullSink {
    fn object_added(&self, _model_id: Uuid, _instance_id: Uuid, _display_name: &str) {}

    fn object_removed(&self, _model_id: Uuid) {}
}
