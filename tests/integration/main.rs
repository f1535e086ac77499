//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises one component through
//! the public service facade against mock radio adapters. All tests run
//! on the host with no radio required.

mod scan_tests;
mod service_tests;
mod transport_tests;
