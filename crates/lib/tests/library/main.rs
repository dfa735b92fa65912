//! Integration tests for beet-lib: full builds against real Lua plugin files.

mod common;
mod session_tests;
