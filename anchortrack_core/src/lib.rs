//! AnchorTrack Core - Object Tracking & Placement Reconciliation
//!
//! The engine behind a mixed-reality maintenance app: it keeps one detection
//! query alive per registered 3D model, periodically asks the spatial
//! anchoring service to look for those models around the wearer, and
//! reconciles the Added/Updated/Removed events coming back on background
//! threads into smooth, jitter-free holographic placements.
//!
//! Three problems shape the design:
//! 1. **Thread handoff**: service callbacks fire on arbitrary threads; a
//!    lock-free queue carries them to the single main tick.
//! 2. **Request storms**: a compare-and-swap flag guarantees at most one
//!    detection cycle is ever in flight.
//! 3. **Pose jitter**: an update-suppression heuristic plus eased
//!    interpolation keep holograms steady against noisy detections.

pub mod config;
pub mod events;
pub mod placement;
pub mod search;
pub mod smoothing;
pub mod tracking;

// Re-export key types for convenience
pub use config::{SearchAreaKind, TrackingConfig};
pub use events::{EventQueue, EventSender, TrackingEvent};
pub use placement::{InstanceState, Placement, UpdateDecision};
pub use smoothing::{Easing, SmoothTransform};
pub use tracking::{run_detection_cycle, DetectionGate, TrackingError, TrackingManager};
