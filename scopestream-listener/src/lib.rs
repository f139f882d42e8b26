//! Supervised listener bridging a microscope acquisition session onto an
//! in-process event bus.
//!
//! The external acquisition application cannot be controlled from here; it
//! only answers queries (session count, per-session metadata, pixel
//! extraction). A polling worker detects new sessions and streams their
//! timepoints as [`ImageFrame`](scopestream_common::ImageFrame) events; a
//! supervisor owns the worker's lifecycle and supports hot-reset without
//! losing or duplicating events.
//!
//! Modules:
//!
//! - [`adapter`] - Query contract for the acquisition application
//! - [`bus`] - In-process publish/subscribe channels
//! - [`worker`] - Polling loop: session detection and timepoint streaming
//! - [`supervisor`] - Worker lifecycle: start, stop, hot-reset
//! - [`config`] - Poll timing and logging configuration
//! - [`mock`] - Scripted fake acquisition application for demos and tests

pub mod adapter;
pub mod bus;
pub mod config;
pub mod mock;
pub mod supervisor;
pub mod worker;

pub use adapter::{AcquisitionAdapter, AdapterError, AdapterFactory, SessionMetadata, SubsetSpec};
pub use bus::EventBus;
pub use config::{ConfigError, ListenerBridgeConfig, ListenerConfig};
pub use supervisor::{ListenerSupervisor, SupervisorError};
pub use worker::ListenerWorker;
