//! Scripts for deploying the contract modules and wiring them into the address book.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod artifacts;
pub mod chain;
pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod errors;
pub mod orchestrator;
pub mod plan;
mod solidity;
pub mod types;
pub mod utils;
