//! Cargo stowage logic for a crewed station.
//!
//! This crate decides where cargo goes inside storage containers, how to
//! get it back out, what has become waste and how waste leaves with an
//! undocking container, and what happens to item lifecycles as simulated
//! days pass. Functions take an [`inventory::Inventory`] plus plain request
//! data and return serializable results; [`engine::StowageEngine`] wraps
//! them behind a mutex for concurrent callers.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`audit`] | Append-only action log with time/item/actor filters |
//! | [`catalog`] | Item/container catalog entries, validation, CSV export |
//! | [`config`] | Planner tunables (epsilon, move cap, retrieval usage) |
//! | [`engine`] | Mutex-guarded engine handle and reply envelope |
//! | [`error`] | Error kinds and the crate error type |
//! | [`geometry`] | Boxes, orientations, anchors and first-fit search |
//! | [`inventory`] | Shared store of containers, items, placements and clock |
//! | [`layout`] | Scratch item→box mapping used while planning |
//! | [`model`] | Containers, items, placements, lifecycle status, dates |
//! | [`placement`] | Priority placement with eviction-based rearrangement |
//! | [`retrieval`] | Blocking analysis and retrieval step sequences |
//! | [`search`] | Item lookup with location and retrieval preview |
//! | [`simulation`] | Day-stepping clock with usage and expiry tracking |
//! | [`waste`] | Waste classification, return manifests, undocking |

pub mod audit;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod inventory;
pub mod layout;
pub mod model;
pub mod placement;
pub mod retrieval;
pub mod search;
pub mod simulation;
pub mod waste;

pub use engine::{Reply, StowageEngine};
pub use error::{ErrorKind, Result, StowageError};
