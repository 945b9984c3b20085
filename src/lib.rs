//! Automated program repair by test-driven genetic search.
//!
//! A run evaluates the original program, ranks statements by suspiciousness,
//! and evolves genes (ordered edit lists over those statements) until enough
//! variants pass every test or a budget runs out.

pub mod ast;
pub mod binary_store;
pub mod builder;
pub mod catalog;
pub mod cli;
pub mod crossover;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod fl;
pub mod mutation;
pub mod options;
pub mod out;
pub mod patch;
pub mod project;
pub mod random;
pub mod report;
pub mod roulette;
pub mod run_report;
pub mod runner;
pub mod scan;
pub mod source;
pub mod span;
pub mod store;
pub mod survivor;
pub mod test_results;
pub mod ui;
pub mod variant;
