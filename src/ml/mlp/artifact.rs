//! On-disk form of a trained classifier.
//!
//! Three files live side by side:
//! - `bisindo-model.json`: topology plus a manifest of the weight blob,
//! - `bisindo-model.weights.bin`: every layer's weights then bias as `f32le`,
//! - `bisindo-labels.json`: the label list as a JSON array of strings.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::model::{Activation, DenseLayer, MlpClassifier, ModelError};
use crate::atomic_file::atomic_write;
use crate::dataset::LabelSet;
use crate::inference::{InferenceError, TrainedClassifier};

pub const MODEL_FILE_NAME: &str = "bisindo-model.json";
pub const WEIGHTS_FILE_NAME: &str = "bisindo-model.weights.bin";
pub const LABELS_FILE_NAME: &str = "bisindo-labels.json";

const FORMAT_NAME: &str = "bisindo-mlp";
const FORMAT_VERSION: i64 = 1;
const WEIGHT_ENCODING: &str = "f32le";
/// Upper bound on any layer width or input width read from a manifest.
const MAX_LAYER_WIDTH: usize = 1 << 16;

/// Failures loading or saving a trained classifier.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid json at {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("unsupported model format {format} v{version}")]
    UnsupportedFormat { format: String, version: i64 },
    #[error("weight blob holds {actual} values, topology needs {expected}")]
    WeightBlobSize { expected: usize, actual: usize },
    #[error("invalid model topology: {0}")]
    InvalidTopology(String),
    #[error("weights path {0:?} must be a file name next to the model")]
    WeightsPath(String),
    #[error("invalid model: {0}")]
    Model(#[from] ModelError),
    #[error(transparent)]
    Pairing(#[from] InferenceError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelManifest {
    format: String,
    format_version: i64,
    input_dim: usize,
    layers: Vec<LayerSpec>,
    weights: WeightsManifest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LayerSpec {
    units: usize,
    activation: Activation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WeightsManifest {
    /// Path relative to the model file.
    path: String,
    encoding: String,
    len_f32: usize,
}

/// Paths written by [`save_trained`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifact {
    pub model_path: PathBuf,
    pub weights_path: PathBuf,
    pub labels_path: PathBuf,
}

/// Write model, weights and labels into `dir`.
pub fn save_trained(
    dir: &Path,
    classifier: &TrainedClassifier,
) -> Result<SavedArtifact, ArtifactError> {
    let model = classifier.model();
    let mut blob = Vec::with_capacity(model.parameter_count());
    for layer in model.layers() {
        blob.extend_from_slice(&layer.weights);
        blob.extend_from_slice(&layer.bias);
    }
    let manifest = ModelManifest {
        format: FORMAT_NAME.to_string(),
        format_version: FORMAT_VERSION,
        input_dim: model.input_dim(),
        layers: model
            .layers()
            .iter()
            .map(|layer| LayerSpec {
                units: layer.units,
                activation: layer.activation,
            })
            .collect(),
        weights: WeightsManifest {
            path: WEIGHTS_FILE_NAME.to_string(),
            encoding: WEIGHT_ENCODING.to_string(),
            len_f32: blob.len(),
        },
    };

    let saved = SavedArtifact {
        model_path: dir.join(MODEL_FILE_NAME),
        weights_path: dir.join(WEIGHTS_FILE_NAME),
        labels_path: dir.join(LABELS_FILE_NAME),
    };
    let weight_bytes: Vec<u8> = blob.iter().flat_map(|v| v.to_le_bytes()).collect();
    write(&saved.weights_path, &weight_bytes)?;
    let labels_json =
        serde_json::to_vec(classifier.labels()).map_err(|source| ArtifactError::Json {
            path: saved.labels_path.clone(),
            source,
        })?;
    write(&saved.labels_path, &labels_json)?;
    let manifest_json =
        serde_json::to_vec_pretty(&manifest).map_err(|source| ArtifactError::Json {
            path: saved.model_path.clone(),
            source,
        })?;
    // Manifest last so a readable manifest implies complete weights.
    write(&saved.model_path, &manifest_json)?;

    info!(
        dir = %dir.display(),
        labels = classifier.labels().len(),
        parameters = blob.len(),
        "Saved trained classifier"
    );
    Ok(saved)
}

/// Load a classifier and its label list, verifying they belong together.
pub fn load_trained(
    model_path: &Path,
    labels_path: &Path,
) -> Result<TrainedClassifier, ArtifactError> {
    let manifest: ModelManifest = read_json(model_path)?;
    if manifest.format != FORMAT_NAME
        || manifest.format_version != FORMAT_VERSION
        || manifest.weights.encoding != WEIGHT_ENCODING
    {
        return Err(ArtifactError::UnsupportedFormat {
            format: manifest.format,
            version: manifest.format_version,
        });
    }

    let expected = parameter_count(&manifest)?;
    let weights_name = bare_file_name(&manifest.weights.path)?;
    let weights_path = model_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(weights_name);
    let blob = read_f32le(&weights_path)?;
    if blob.len() != expected || manifest.weights.len_f32 != expected {
        return Err(ArtifactError::WeightBlobSize {
            expected,
            actual: blob.len(),
        });
    }

    let mut layers = Vec::with_capacity(manifest.layers.len());
    let mut offset = 0usize;
    let mut fan_in = manifest.input_dim;
    for spec in &manifest.layers {
        let w_len = fan_in * spec.units;
        let weights = blob[offset..offset + w_len].to_vec();
        offset += w_len;
        let bias = blob[offset..offset + spec.units].to_vec();
        offset += spec.units;
        layers.push(DenseLayer {
            input_dim: fan_in,
            units: spec.units,
            activation: spec.activation,
            weights,
            bias,
        });
        fan_in = spec.units;
    }
    let model = MlpClassifier::new(layers)?;
    let labels: LabelSet = read_json(labels_path)?;
    let classifier = TrainedClassifier::new(model, labels)?;
    info!(path = %model_path.display(), "Loaded trained classifier");
    Ok(classifier)
}

/// Total weights and biases the manifest's topology needs.
fn parameter_count(manifest: &ModelManifest) -> Result<usize, ArtifactError> {
    let check_width = |what: &str, width: usize| {
        if width == 0 || width > MAX_LAYER_WIDTH {
            Err(ArtifactError::InvalidTopology(format!(
                "{what} width {width} outside 1..={MAX_LAYER_WIDTH}"
            )))
        } else {
            Ok(())
        }
    };
    check_width("input", manifest.input_dim)?;
    let overflow = || ArtifactError::InvalidTopology("parameter count overflows".to_string());
    let mut total = 0usize;
    let mut fan_in = manifest.input_dim;
    for spec in &manifest.layers {
        check_width("layer", spec.units)?;
        let layer = fan_in
            .checked_mul(spec.units)
            .and_then(|weights| weights.checked_add(spec.units))
            .ok_or_else(overflow)?;
        total = total.checked_add(layer).ok_or_else(overflow)?;
        fan_in = spec.units;
    }
    Ok(total)
}

/// The manifest may only name a sibling file of the model.
fn bare_file_name(raw: &str) -> Result<&Path, ArtifactError> {
    let path = Path::new(raw);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(path),
        _ => Err(ArtifactError::WeightsPath(raw.to_string())),
    }
}

fn write(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    atomic_write(path, bytes).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn read_f32le(path: &Path) -> Result<Vec<f32>, ArtifactError> {
    let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.len() % 4 != 0 {
        return Err(ArtifactError::WeightBlobSize {
            expected: bytes.len() / 4 + 1,
            actual: bytes.len() / 4,
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tempfile::tempdir;

    fn classifier() -> TrainedClassifier {
        let mut rng = StdRng::seed_from_u64(9);
        let model = MlpClassifier::with_architecture(6, &[5, 4], 3, &mut rng);
        TrainedClassifier::new(model, LabelSet::from_labels(["A", "B", "C"])).unwrap()
    }

    #[test]
    fn reload_restores_identical_parameters() {
        let dir = tempdir().unwrap();
        let original = classifier();
        let saved = save_trained(dir.path(), &original).unwrap();
        assert_eq!(saved.model_path, dir.path().join(MODEL_FILE_NAME));

        let labels = std::fs::read_to_string(&saved.labels_path).unwrap();
        assert_eq!(labels, r#"["A","B","C"]"#);

        let loaded = load_trained(&saved.model_path, &saved.labels_path).unwrap();
        assert_eq!(loaded.model(), original.model());
        assert_eq!(loaded.labels(), original.labels());
    }

    #[test]
    fn mismatched_label_file_is_rejected() {
        let dir = tempdir().unwrap();
        let saved = save_trained(dir.path(), &classifier()).unwrap();
        std::fs::write(&saved.labels_path, br#"["A","B"]"#).unwrap();
        let err = load_trained(&saved.model_path, &saved.labels_path).unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::Pairing(InferenceError::LabelCountMismatch { outputs: 3, labels: 2 })
        ));
    }

    fn rewrite_manifest(path: &Path, edit: impl FnOnce(&mut serde_json::Value)) {
        let mut value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        edit(&mut value);
        std::fs::write(path, serde_json::to_vec(&value).unwrap()).unwrap();
    }

    #[test]
    fn oversized_topology_is_an_error_not_a_panic() {
        let dir = tempdir().unwrap();
        let saved = save_trained(dir.path(), &classifier()).unwrap();
        rewrite_manifest(&saved.model_path, |manifest| {
            manifest["input_dim"] = serde_json::json!(usize::MAX / 2 + 1);
            manifest["layers"] = serde_json::json!([{ "units": 2, "activation": "softmax" }]);
            manifest["weights"]["len_f32"] = serde_json::json!(2);
        });
        std::fs::write(&saved.weights_path, [0u8; 8]).unwrap();
        let err = load_trained(&saved.model_path, &saved.labels_path).unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidTopology(_)));
    }

    #[test]
    fn weights_outside_the_model_directory_are_refused() {
        let dir = tempdir().unwrap();
        let saved = save_trained(dir.path().join("models").as_path(), &classifier()).unwrap();
        std::fs::copy(&saved.weights_path, dir.path().join(WEIGHTS_FILE_NAME)).unwrap();
        for path in ["../bisindo-model.weights.bin", "/etc/passwd", "sub/w.bin"] {
            rewrite_manifest(&saved.model_path, |manifest| {
                manifest["weights"]["path"] = serde_json::json!(path);
            });
            let err = load_trained(&saved.model_path, &saved.labels_path).unwrap_err();
            assert!(matches!(err, ArtifactError::WeightsPath(_)), "{path}");
        }
    }

    #[test]
    fn truncated_weights_are_rejected() {
        let dir = tempdir().unwrap();
        let saved = save_trained(dir.path(), &classifier()).unwrap();
        let bytes = std::fs::read(&saved.weights_path).unwrap();
        std::fs::write(&saved.weights_path, &bytes[..bytes.len() - 4]).unwrap();
        let err = load_trained(&saved.model_path, &saved.labels_path).unwrap_err();
        assert!(matches!(err, ArtifactError::WeightBlobSize { .. }));
    }
}
