//! Change detection: event model, coalescing, recovery and dispatch.
//!
//! # Architecture
//!
//! ```text
//! Backend (native | polling)      TreeScanner (recovery)
//!          \                        /
//!           +---> Coalescer <------+
//!                     |
//!            mask check (Registry)
//!                     |
//!                 Dispatcher ---> callback
//! ```
//!
//! Everything below the callback runs on the single monitoring thread
//! owned by [`FsMonitor`]. Other threads talk to it only through the intent
//! queue behind [`MonitorHandle`] / [`RegistryHandle`].

pub mod backend;
mod coalescer;
mod dispatcher;
mod error;
pub mod event;
mod fsmonitor;
pub mod recovery;
mod registry;

pub use backend::{Backend, BackendEvent, BackendKind};
pub use coalescer::{Coalesced, Coalescer};
pub use dispatcher::{Dispatcher, EventCallback};
pub use error::MonitorError;
pub use event::{DiscoveredThrough, EventMask, FileEvent, RawEvent, event_name, merge};
pub use fsmonitor::{FsMonitor, FsMonitorBuilder, MonitorHandle};
pub use registry::{Intent, MonitoredPath, PathState, Registry, RegistryHandle};
