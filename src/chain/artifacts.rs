//! Compiled contract artifacts.
//!
//! Artifacts are JSON files under `<build_dir>/contracts/<Name>.json`
//! carrying the contract ABI and creation bytecode. Both the flat layout
//! (`"bytecode": "0x..."`) and the nested one
//! (`"bytecode": { "object": "0x..." }`) are accepted.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;
use web3::ethabi::{self, Function, Token};

use crate::types::BettingError;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Flat(String),
    Nested { object: String },
}

#[derive(Debug, Deserialize)]
struct RawArtifact {
    abi: ethabi::Contract,
    bytecode: RawBytecode,
}

/// A compiled contract ready to be deployed and called.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub abi: ethabi::Contract,
    pub bytecode: Vec<u8>,
}

impl Artifact {
    /// Parse an artifact from its JSON text.
    pub fn from_json(name: &str, json: &str) -> Result<Self> {
        let raw: RawArtifact = serde_json::from_str(json)
            .with_context(|| format!("Failed to parse artifact for {name}"))?;
        let hex_code = match raw.bytecode {
            RawBytecode::Flat(s) => s,
            RawBytecode::Nested { object } => object,
        };
        let bytecode = hex::decode(hex_code.trim().trim_start_matches("0x"))
            .with_context(|| format!("Artifact for {name} has invalid bytecode hex"))?;
        if bytecode.is_empty() {
            return Err(BettingError::Contract {
                contract: name.to_string(),
                message: "artifact has no bytecode (abstract contract or interface?)".into(),
            }
            .into());
        }
        Ok(Self {
            name: name.to_string(),
            abi: raw.abi,
            bytecode,
        })
    }

    /// Creation data: bytecode followed by the encoded constructor arguments.
    pub fn creation_data(&self, args: &[Token]) -> Result<Vec<u8>> {
        match self.abi.constructor() {
            Some(constructor) => constructor
                .encode_input(self.bytecode.clone(), args)
                .map_err(|e| self.error(format!("constructor arguments: {e}")).into()),
            None if args.is_empty() => Ok(self.bytecode.clone()),
            None => Err(self
                .error(format!("takes no constructor arguments, got {}", args.len()))
                .into()),
        }
    }

    /// Pick the overload of `name` matching the number of arguments.
    pub fn function(&self, name: &str, args: &[Token]) -> Result<&Function> {
        let overloads = self
            .abi
            .functions_by_name(name)
            .map_err(|_| self.error(format!("no function named {name}")))?;
        overloads
            .iter()
            .find(|f| f.inputs.len() == args.len())
            .ok_or_else(|| {
                self.error(format!("no overload of {name} takes {} arguments", args.len()))
                    .into()
            })
    }

    fn error(&self, message: String) -> BettingError {
        BettingError::Contract {
            contract: self.name.clone(),
            message,
        }
    }
}

/// Loads artifacts from the build directory, caching each one.
pub struct ArtifactStore {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Arc<Artifact>>>,
}

impl ArtifactStore {
    /// `build_dir` is the project build directory; artifacts are read from
    /// its `contracts/` subdirectory.
    pub fn new(build_dir: &Path) -> Self {
        Self {
            dir: build_dir.join("contracts"),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<Artifact>> {
        if let Some(artifact) = self.lock().get(name) {
            return Ok(Arc::clone(artifact));
        }

        let path = self.dir.join(format!("{name}.json"));
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        let artifact = Arc::new(Artifact::from_json(name, &json)?);
        debug!(contract = name, bytes = artifact.bytecode.len(), "Artifact loaded");

        self.lock().insert(name.to_string(), Arc::clone(&artifact));
        Ok(artifact)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Artifact>>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
