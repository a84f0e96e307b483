// Library crate exposing modules for integration tests and benchmarks

pub mod graph;
pub mod model;
pub mod repository;
pub mod util;
