//! Recording object-list sink for assertions.

use anchortrack_env::ObjectListSink;
use std::sync::Mutex;
use uuid::Uuid;

/// One menu notification as the engine emitted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEvent {
    Added {
        model_id: Uuid,
        instance_id: Uuid,
        display_name: String,
    },
    Removed {
        model_id: Uuid,
    },
}

/// Sink that records every notification for later inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MenuEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MenuEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn added_count(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, MenuEvent::Added { .. }))
            .count()
    }

    pub fn removed_count(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, MenuEvent::Removed { .. }))
            .count()
    }
}

impl ObjectListSink for RecordingSink {
    fn object_added(&self, model_id: Uuid, instance_id: Uuid, display_name: &str) {
        self.events.lock().unwrap().push(MenuEvent::Added {
            model_id,
            instance_id,
            display_name: display_name.to_string(),
        });
    }

    fn object_removed(&self, model_id: Uuid) {
        self.events
            .lock()
            .unwrap()
            .push(MenuEvent::Removed { model_id });
    }
}
