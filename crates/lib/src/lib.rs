//! graft-lib: Core types and logic for graft
//!
//! This crate compiles a declarative package spec into a build graph and
//! composes build requests for an external, content-addressed execution
//! backend:
//! - `State`: immutable filesystem snapshots composed into a graph
//! - `Spec`: named sources and their ordered patch chains
//! - `source`: resolution, patching, archiving and merging of sources
//! - `compose`: injecting one build's result as a named input of another

pub mod backend;
pub mod compose;
pub mod consts;
pub mod progress;
pub mod source;
pub mod spec;
pub mod state;
pub mod util;
