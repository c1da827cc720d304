//! Loading of compiled contract artifacts.
//!
//! Both Hardhat (`"bytecode": "0x…"`) and Foundry (`"bytecode": { "object": "0x…" }`)
//! artifact layouts are supported.

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use alloy::primitives::Bytes;
use itertools::Itertools;
use serde::Deserialize;

use crate::{
    constants::{ARTIFACT_EXTENSION, SOLIDITY_EXTENSION},
    errors::ScriptError,
};

/// The subset of a compiled artifact needed for deployment
#[derive(Deserialize)]
struct RawArtifact {
    /// The creation bytecode
    bytecode: RawBytecode,
}

/// The creation bytecode, in either of the supported layouts
#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    /// Hardhat layout
    Hex(String),
    /// Foundry layout
    Object {
        /// The hex-encoded bytecode
        object: String,
    },
}

/// Looks up compiled artifacts by contract name under a root directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    /// The root directory
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find the artifact file for the given contract.
    ///
    /// Tries `<root>/<Name>.json` and `<root>/<Name>.sol/<Name>.json` before
    /// searching the whole tree, where the name must then match exactly one file.
    pub fn locate(&self, name: &str) -> Result<PathBuf, ScriptError> {
        let file_name = format!("{}.{}", name, ARTIFACT_EXTENSION);
        let candidates = [
            self.root.join(&file_name),
            self.root.join(format!("{}.{}", name, SOLIDITY_EXTENSION)).join(&file_name),
        ];

        if let Some(path) = candidates.into_iter().find(|path| path.is_file()) {
            return Ok(path);
        }

        let mut matches = Vec::new();
        find_files(&self.root, &file_name, &mut matches);
        match matches.len() {
            0 => Err(ScriptError::ArtifactParsing(format!(
                "no artifact for `{}` under {}",
                name,
                self.root.display()
            ))),
            1 => Ok(matches.remove(0)),
            _ => {
                matches.sort();
                let paths = matches.iter().map(|p| p.display().to_string()).join(", ");
                Err(ScriptError::ArtifactParsing(format!(
                    "several artifacts for `{}`: {}",
                    name, paths
                )))
            }
        }
    }

    /// Read the creation bytecode of the given contract
    pub fn bytecode(&self, name: &str) -> Result<Bytes, ScriptError> {
        let path = self.locate(name)?;
        let contents = fs::read_to_string(&path)
            .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {}", path.display(), e)))?;

        parse_bytecode(name, &contents)
    }
}

/// Extract the creation bytecode from the contents of an artifact file
pub fn parse_bytecode(name: &str, contents: &str) -> Result<Bytes, ScriptError> {
    let artifact: RawArtifact = serde_json::from_str(contents)
        .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {}", name, e)))?;

    let hex = match artifact.bytecode {
        RawBytecode::Hex(hex) => hex,
        RawBytecode::Object { object } => object,
    };

    // Unlinked library references are not valid hex and fail here
    let bytecode = Bytes::from_str(&hex)
        .map_err(|e| ScriptError::ArtifactParsing(format!("{} bytecode: {}", name, e)))?;
    if bytecode.is_empty() {
        return Err(ScriptError::ArtifactParsing(format!(
            "{} has no bytecode, is it abstract or an interface?",
            name
        )));
    }

    Ok(bytecode)
}

/// Collect every file with the given name under `dir`
fn find_files(dir: &Path, file_name: &str, matches: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            find_files(&path, file_name, matches);
        } else if path.file_name().is_some_and(|f| f == file_name) {
            matches.push(path);
        }
    }
}
