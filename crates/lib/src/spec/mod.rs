//! Package spec types.
//!
//! A [`Spec`] is the read-only input of the source pipeline: a set of named
//! [`Source`] descriptors plus, per source, an ordered list of patches. Patch
//! names refer to other entries in `sources`.

mod types;

pub use types::*;
