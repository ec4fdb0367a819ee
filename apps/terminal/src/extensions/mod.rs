pub mod file_store;
pub mod subgraph;

#[cfg(test)]
mod subgraph_tests;
