//! CLI integration tests: run the `beet` binary against real projects.

mod build_tests;
mod common;
mod info_tests;
