//! Integration tests for graft-lib.

mod common;
mod compose_tests;
mod pipeline_tests;
