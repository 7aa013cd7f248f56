#![warn(clippy::all, missing_docs)]

//! Core logic for directional fluid ports on composite structures.
//!
//! This crate hosts the port state machine, its connection handler and
//! transfer engine, the collaborator traits a game supplies, an in-memory
//! world for driving ports, configuration, and snapshot persistence used by
//! the terminal sandbox.

pub mod config;
pub mod env;
pub mod geometry;
pub mod handler;
pub mod io;
pub mod port;
pub mod resource;
pub mod sandbox;
pub mod snapshot;
pub mod transfer;
pub mod world;

pub use config::AppConfig;
pub use env::{NeighborQuery, PartHost, Role, StructureController};
pub use geometry::{BlockPos, Facing};
pub use handler::{PortCapability, PortConnectionHandler};
pub use io::{IoDirection, IoMode, SyncData};
pub use port::{model_variant_index, FluidPort, PortStatus};
pub use resource::{PortKind, Reservoir, ResourceHandler, ResourceStack, SharedHandler};
pub use sandbox::{Sandbox, SandboxView, StepReport};
pub use snapshot::{SandboxState, SnapshotStore};
