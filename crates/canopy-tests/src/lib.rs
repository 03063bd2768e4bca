//! Shared fixtures for the integration tests and benchmarks of `canopy`.

pub mod grammars;
