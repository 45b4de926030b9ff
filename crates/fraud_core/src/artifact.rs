//! Artifact bundle: everything the serving side needs, written as one unit
//!
//! Directory layout:
//! - `manifest.json`: format version, model kind, creation time, feature
//!   count, blake3 digest per component and a bundle hash
//! - `schema.json`: ordered feature names (canonical JSON)
//! - `preprocessor.json`: frozen scaler state (canonical JSON)
//! - `model.bin`: bincode-encoded model parameters
//!
//! Saving stages the files in a sibling directory and renames it into place,
//! so readers never observe a partially written bundle.

use crate::errors::{FraudError, Result};
use crate::model::{AnyModel, FraudModel, ModelKind};
use crate::preprocessor::{Preprocessor, ScalerState};
use crate::schema::{FeatureSchema, SchemaMode};
use crate::serde_canon::{hash_hex, to_canonical_json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const SCHEMA_FILE: &str = "schema.json";
pub const PREPROCESSOR_FILE: &str = "preprocessor.json";
pub const MODEL_FILE: &str = "model.bin";

/// Bundle layout version understood by this build
pub const FORMAT_VERSION: u32 = 1;

/// blake3 hex digests of the component files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDigests {
    pub schema: String,
    pub preprocessor: String,
    pub model: String,
}

impl ComponentDigests {
    /// Hash over the three digests in file order
    pub fn bundle_hash(&self) -> String {
        let mut joined = String::with_capacity(192);
        joined.push_str(&self.schema);
        joined.push_str(&self.preprocessor);
        joined.push_str(&self.model);
        hash_hex(joined.as_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub model_kind: ModelKind,
    pub created_at: DateTime<Utc>,
    pub feature_count: usize,
    pub digests: ComponentDigests,
    pub bundle_hash: String,
}

/// Trained model plus the preprocessing it was trained behind
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub model: AnyModel,
    pub preprocessor: Preprocessor,
}

impl ArtifactBundle {
    /// Pair a model with its preprocessor; input widths must agree.
    pub fn new(model: AnyModel, preprocessor: Preprocessor) -> Result<Self> {
        if model.feature_count() != preprocessor.schema().len() {
            return Err(FraudError::DimensionMismatch {
                expected: preprocessor.schema().len(),
                actual: model.feature_count(),
            });
        }
        Ok(Self {
            model,
            preprocessor,
        })
    }

    /// Write the bundle to `dir`, replacing any bundle already there.
    pub fn save(&self, dir: &Path) -> Result<Manifest> {
        let schema_bytes = to_canonical_json(self.preprocessor.schema())?;
        let state_bytes = to_canonical_json(self.preprocessor.state())?;
        let model_bytes = self.model.to_bytes()?;

        let digests = ComponentDigests {
            schema: hash_hex(&schema_bytes),
            preprocessor: hash_hex(&state_bytes),
            model: hash_hex(&model_bytes),
        };
        let manifest = Manifest {
            version: FORMAT_VERSION,
            model_kind: self.model.kind(),
            created_at: Utc::now(),
            feature_count: self.model.feature_count(),
            bundle_hash: digests.bundle_hash(),
            digests,
        };
        let manifest_bytes = to_canonical_json(&manifest)?;

        let staging = staging_dir(dir)?;
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        let written = (|| -> Result<()> {
            fs::write(staging.join(SCHEMA_FILE), &schema_bytes)?;
            fs::write(staging.join(PREPROCESSOR_FILE), &state_bytes)?;
            fs::write(staging.join(MODEL_FILE), &model_bytes)?;
            fs::write(staging.join(MANIFEST_FILE), &manifest_bytes)?;
            if dir.exists() {
                fs::remove_dir_all(dir)?;
            }
            fs::rename(&staging, dir)?;
            Ok(())
        })();

        if let Err(err) = written {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!(path = %staging.display(), error = %cleanup, "failed to remove staging dir");
            }
            return Err(err);
        }

        info!(
            path = %dir.display(),
            kind = %manifest.model_kind,
            bundle_hash = %manifest.bundle_hash,
            "artifact bundle saved"
        );
        Ok(manifest)
    }

    /// Read and verify a bundle. Every failure maps to `ArtifactLoad`.
    pub fn load(dir: &Path, mode: SchemaMode) -> Result<(Self, Manifest)> {
        let manifest_bytes = read_component(dir, MANIFEST_FILE)?;
        let manifest: Manifest = serde_json::from_slice(&manifest_bytes)
            .map_err(|e| load_error(format!("{MANIFEST_FILE} is not a valid manifest: {e}")))?;
        if manifest.version != FORMAT_VERSION {
            return Err(load_error(format!(
                "unsupported bundle version {} (expected {FORMAT_VERSION})",
                manifest.version
            )));
        }
        if manifest.digests.bundle_hash() != manifest.bundle_hash {
            return Err(load_error("bundle hash does not match component digests"));
        }

        let schema_bytes = read_verified(dir, SCHEMA_FILE, &manifest.digests.schema)?;
        let state_bytes = read_verified(dir, PREPROCESSOR_FILE, &manifest.digests.preprocessor)?;
        let model_bytes = read_verified(dir, MODEL_FILE, &manifest.digests.model)?;

        let schema: FeatureSchema = serde_json::from_slice(&schema_bytes)
            .map_err(|e| load_error(format!("{SCHEMA_FILE}: {e}")))?;
        let state: ScalerState = serde_json::from_slice(&state_bytes)
            .map_err(|e| load_error(format!("{PREPROCESSOR_FILE}: {e}")))?;
        let model = AnyModel::from_bytes(&model_bytes)
            .map_err(|e| load_error(format!("{MODEL_FILE}: {e}")))?;

        if model.kind() != manifest.model_kind {
            return Err(load_error(format!(
                "manifest declares {} but model file holds {}",
                manifest.model_kind,
                model.kind()
            )));
        }
        let widths = [
            schema.len(),
            state.feature_count(),
            model.feature_count(),
            manifest.feature_count,
        ];
        if widths.iter().any(|&w| w != widths[0]) {
            return Err(load_error(format!(
                "feature count disagreement: schema {}, preprocessor {}, model {}, manifest {}",
                widths[0], widths[1], widths[2], widths[3]
            )));
        }

        let preprocessor =
            Preprocessor::new(schema, state, mode).map_err(|e| load_error(e.to_string()))?;
        let bundle = Self::new(model, preprocessor).map_err(|e| load_error(e.to_string()))?;
        info!(
            path = %dir.display(),
            kind = %manifest.model_kind,
            features = manifest.feature_count,
            "artifact bundle loaded"
        );
        Ok((bundle, manifest))
    }
}

fn load_error(message: impl Into<String>) -> FraudError {
    FraudError::ArtifactLoad(message.into())
}

fn read_component(dir: &Path, name: &str) -> Result<Vec<u8>> {
    let path = dir.join(name);
    fs::read(&path).map_err(|e| load_error(format!("cannot read {}: {e}", path.display())))
}

fn read_verified(dir: &Path, name: &str, expected: &str) -> Result<Vec<u8>> {
    let bytes = read_component(dir, name)?;
    let actual = hash_hex(&bytes);
    if actual != expected {
        return Err(load_error(format!(
            "{name} digest mismatch: manifest {expected}, file {actual}"
        )));
    }
    Ok(bytes)
}

/// Sibling of `dir` used while a save is in progress
fn staging_dir(dir: &Path) -> Result<PathBuf> {
    let name = dir
        .file_name()
        .ok_or_else(|| FraudError::InvalidConfig(format!("invalid bundle path {}", dir.display())))?;
    let mut staged = std::ffi::OsString::from(".");
    staged.push(name);
    staged.push(".partial");
    let parent = match dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;
    Ok(parent.join(staged))
}
