use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::DatasetError;
use crate::atomic_file::atomic_write;
use crate::landmarks::FeatureVector;

const FILE_PREFIX: &str = "dataset_";
const FILE_EXTENSION: &str = "json";

/// A `(label, features)` pair recorded during a session.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    pub label: String,
    pub features: FeatureVector,
}

impl LabeledSample {
    pub fn new(label: impl Into<String>, features: FeatureVector) -> Self {
        Self {
            label: label.into(),
            features,
        }
    }
}

/// Feature vectors recorded under one letter.
#[derive(Debug, Clone, PartialEq)]
pub struct LetterCollection {
    pub label: String,
    pub samples: Vec<FeatureVector>,
}

impl LetterCollection {
    pub fn new(label: impl Into<String>, samples: Vec<FeatureVector>) -> Self {
        Self {
            label: label.into(),
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Group chronologically recorded samples by label.
    pub fn from_samples(samples: Vec<LabeledSample>) -> Vec<Self> {
        let mut grouped: BTreeMap<String, Vec<FeatureVector>> = BTreeMap::new();
        for sample in samples {
            grouped.entry(sample.label).or_default().push(sample.features);
        }
        grouped
            .into_iter()
            .map(|(label, samples)| Self { label, samples })
            .collect()
    }

    pub fn labeled_samples(&self) -> impl Iterator<Item = LabeledSample> + '_ {
        self.samples
            .iter()
            .map(|features| LabeledSample::new(self.label.clone(), features.clone()))
    }
}

/// One entry of a `dataset_<LABEL>.json` file.
#[derive(Debug, Serialize, Deserialize)]
struct FrameRecord<'a> {
    #[serde(borrow)]
    letter: std::borrow::Cow<'a, str>,
    landmarks: std::borrow::Cow<'a, [f32]>,
}

/// Reject labels that would not stay a single file name component.
pub fn check_label(label: &str) -> Result<(), DatasetError> {
    if label.is_empty() || label.contains(['/', '\\', '\0']) {
        return Err(DatasetError::InvalidLabel(label.to_string()));
    }
    Ok(())
}

/// File name used to persist a collection: `dataset_<LABEL>.json`.
pub fn collection_file_name(label: &str) -> String {
    format!("{FILE_PREFIX}{label}.{FILE_EXTENSION}")
}

/// Whether `path` looks like a persisted collection file.
pub fn is_collection_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    name.starts_with(FILE_PREFIX)
        && path.extension().and_then(|ext| ext.to_str()) == Some(FILE_EXTENSION)
}

/// Serialize a collection as a JSON array of `{letter, landmarks}` objects.
pub fn encode_collection(collection: &LetterCollection) -> Result<Vec<u8>, serde_json::Error> {
    let records: Vec<FrameRecord<'_>> = collection
        .samples
        .iter()
        .map(|features| FrameRecord {
            letter: collection.label.as_str().into(),
            landmarks: features.as_slice().into(),
        })
        .collect();
    serde_json::to_vec(&records)
}

/// Parse a `{letter, landmarks}` array, grouping entries by letter.
pub fn decode_collections(bytes: &[u8]) -> Result<Vec<LetterCollection>, serde_json::Error> {
    let records: Vec<FrameRecord<'_>> = serde_json::from_slice(bytes)?;
    let samples = records
        .into_iter()
        .map(|record| {
            LabeledSample::new(
                record.letter.into_owned(),
                FeatureVector::new(record.landmarks.into_owned()),
            )
        })
        .collect();
    Ok(LetterCollection::from_samples(samples))
}

/// Write `collection` to `dir/dataset_<LABEL>.json`, replacing any earlier take.
pub fn save_collection(dir: &Path, collection: &LetterCollection) -> Result<PathBuf, DatasetError> {
    check_label(&collection.label)?;
    let path = dir.join(collection_file_name(&collection.label));
    let bytes = encode_collection(collection).map_err(|source| DatasetError::Json {
        path: path.clone(),
        source,
    })?;
    atomic_write(&path, &bytes).map_err(|source| DatasetError::Io {
        path: path.clone(),
        source,
    })?;
    info!(
        label = %collection.label,
        samples = collection.len(),
        path = %path.display(),
        "Saved landmark collection"
    );
    Ok(path)
}

/// Load every collection stored in one file.
pub fn load_collection(path: &Path) -> Result<Vec<LetterCollection>, DatasetError> {
    let bytes = std::fs::read(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let collections = decode_collections(&bytes).map_err(|source| DatasetError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), groups = collections.len(), "Loaded landmark collection");
    Ok(collections)
}

/// Load all files; any failure aborts the whole load.
pub fn load_collections<P: AsRef<Path>>(
    paths: &[P],
) -> Result<Vec<LetterCollection>, DatasetError> {
    let mut out = Vec::new();
    for path in paths {
        out.extend(load_collection(path.as_ref())?);
    }
    Ok(out)
}

/// Every `dataset_*.json` file in `dir`, sorted by name.
pub fn list_collection_files(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let entries = std::fs::read_dir(dir).map_err(|source| DatasetError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_collection_file(path))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_name_follows_letter() {
        assert_eq!(collection_file_name("A"), "dataset_A.json");
        assert!(is_collection_file(Path::new("/tmp/dataset_B.json")));
        assert!(!is_collection_file(Path::new("/tmp/bisindo-labels.json")));
    }

    #[test]
    fn labels_that_leave_the_directory_are_refused() {
        let dir = tempdir().unwrap();
        let datasets = dir.path().join("datasets");
        for label in ["../x", "a/b", "a\\b", ""] {
            let collection = LetterCollection::new(label, vec![FeatureVector::new(vec![0.1])]);
            let err = save_collection(&datasets, &collection).unwrap_err();
            assert!(matches!(err, DatasetError::InvalidLabel(_)), "{label}");
        }
        assert!(!dir.path().join("x.json").exists());
        assert!(!datasets.exists());
    }

    #[test]
    fn writes_letter_landmarks_records() {
        let collection = LetterCollection::new(
            "A",
            vec![FeatureVector::new(vec![0.5, 0.25, 0.0])],
        );
        let json = String::from_utf8(encode_collection(&collection).unwrap()).unwrap();
        assert_eq!(json, r#"[{"letter":"A","landmarks":[0.5,0.25,0.0]}]"#);
    }

    #[test]
    fn mixed_letter_file_is_split_per_label() {
        let raw = br#"[
            {"letter":"B","landmarks":[1.0,2.0,3.0]},
            {"letter":"A","landmarks":[4.0,5.0,6.0]},
            {"letter":"B","landmarks":[7.0,8.0,9.0]}
        ]"#;
        let collections = decode_collections(raw).unwrap();
        assert_eq!(collections.len(), 2);
        assert_eq!(collections[0].label, "A");
        assert_eq!(collections[1].label, "B");
        assert_eq!(collections[1].samples[1].as_slice(), &[7.0, 8.0, 9.0]);
    }

    #[test]
    fn one_bad_file_fails_the_whole_load() {
        let dir = tempdir().unwrap();
        let good = save_collection(
            dir.path(),
            &LetterCollection::new("A", vec![FeatureVector::new(vec![0.0; 3])]),
        )
        .unwrap();
        let bad = dir.path().join("dataset_B.json");
        std::fs::write(&bad, b"{not json").unwrap();

        assert_eq!(load_collections(&[&good]).unwrap().len(), 1);
        let err = load_collections(&[&good, &bad]).unwrap_err();
        assert!(matches!(err, DatasetError::Json { .. }));
        assert_eq!(list_collection_files(dir.path()).unwrap(), vec![good, bad]);
    }
}
