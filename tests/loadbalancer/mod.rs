//! Load balancer integration tests.
//!
//! Test organization:
//! - strategies.rs: selection order and fairness per strategy
//! - connections.rs: connection tracking under concurrency

mod strategies;
