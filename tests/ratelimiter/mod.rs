//! Rate limiter integration tests.
//!
//! Test organization:
//! - windows.rs: fixed-window counting, per-client and per-scope isolation
//! - concurrency.rs: exact admission counts under parallel checks

mod windows;
