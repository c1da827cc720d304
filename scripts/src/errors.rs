//! Definitions of errors that can occur during the execution of the deploy scripts

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// Errors that can occur during the execution of the deploy scripts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// A configuration input is missing, empty, or malformed
    Config(String),
    /// The deployment plan is malformed or violates its ordering precondition
    InvalidPlan(String),
    /// Error reading or parsing a compiled contract artifact
    ArtifactParsing(String),
    /// Error initializing the RPC client
    ClientInitialization(String),
    /// Error constructing calldata for a contract method or constructor
    CalldataConstruction(String),
    /// A registry lookup resolved to the zero address
    MissingRegistryEntry(String),
    /// A transaction could not be submitted, or its confirmation could not be awaited
    Submission(String),
    /// A transaction was mined but reverted
    Reverted(String),
    /// Error performing a read-only contract call or storage read
    ContractInteraction(String),
    /// Error reading the deployments file
    ReadDeployments(String),
    /// Error writing the deployments file
    WriteDeployments(String),
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Config(s) => write!(f, "invalid configuration: {}", s),
            ScriptError::InvalidPlan(s) => write!(f, "invalid deployment plan: {}", s),
            ScriptError::ArtifactParsing(s) => write!(f, "error parsing artifact: {}", s),
            ScriptError::ClientInitialization(s) => write!(f, "error initializing client: {}", s),
            ScriptError::CalldataConstruction(s) => write!(f, "error constructing calldata: {}", s),
            ScriptError::MissingRegistryEntry(s) => {
                write!(f, "no address registered under `{}`", s)
            }
            ScriptError::Submission(s) => write!(f, "error submitting transaction: {}", s),
            ScriptError::Reverted(s) => write!(f, "transaction reverted: {}", s),
            ScriptError::ContractInteraction(s) => {
                write!(f, "error interacting with contract: {}", s)
            }
            ScriptError::ReadDeployments(s) => write!(f, "error reading deployments: {}", s),
            ScriptError::WriteDeployments(s) => write!(f, "error writing deployments: {}", s),
        }
    }
}

impl Error for ScriptError {}
