pub mod accession;
pub mod app;
pub mod bins;
pub mod config;
pub mod directive;
pub mod domain;
pub mod error;
pub mod extract;
pub mod genbank;
pub mod genome;
pub mod location;
pub mod output;
pub mod persist;
pub mod process;
pub mod reconcile;
pub mod retrieve;
pub mod store;
