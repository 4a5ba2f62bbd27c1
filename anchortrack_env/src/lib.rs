//! AnchorTrack Environment Abstraction Layer
//!
//! This crate isolates the tracking engine from everything it does not own:
//! the spatial-anchoring service, the object-management menu, and the host
//! clock/task system. The engine talks only to the traits defined here, so
//! the same code runs against the real device runtime in production and
//! against scripted mocks in simulation.
//!
//! # Seams
//!
//! - [`AnchorService`] - the spatial-anchoring collaborator (detection
//!   queries in, tracking events out)
//! - [`ObjectListSink`] - the object-management menu collaborator
//! - [`AnchorContext`] - clock, sleep, and background task spawning
//!
//! Detection results never come back as return values: the service raises
//! `Added` / `Updated` / `Removed` events on its own worker threads, and the
//! engine drains them once per tick on the main thread.

mod context;
mod error;
mod service;
mod sink;
mod tokio_impl;
mod types;

pub use context::AnchorContext;
pub use error::EnvError;
pub use service::AnchorService;
pub use sink::{NullSink, ObjectListSink};
pub use tokio_impl::TokioContext;
pub use types::{
    FieldOfView, ObjectEventArgs, ObjectLocation, ObjectQuery, ObservationMode, OrientedBox,
    SearchArea, Sphere, TrackingMode, WorldFrame,
};
