use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Canonical sorted list of distinct class labels.
///
/// A label's index is its position in the sorted order and doubles as the
/// classifier output index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    /// Sort and deduplicate `labels`.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: BTreeSet<String> = labels.into_iter().map(Into::into).collect();
        Self {
            labels: unique.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels
            .binary_search_by(|probe| probe.as_str().cmp(label))
            .ok()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    /// Class index and one-hot row for `label`, or `None` when unknown.
    pub fn one_hot(&self, label: &str) -> Option<(usize, Vec<f32>)> {
        let index = self.index_of(label)?;
        let mut row = vec![0.0; self.labels.len()];
        row[index] = 1.0;
        Some((index, row))
    }
}

impl TryFrom<Vec<String>> for LabelSet {
    type Error = String;

    /// Persisted label lists must already be canonical.
    fn try_from(labels: Vec<String>) -> Result<Self, Self::Error> {
        if labels.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err("label list must be sorted and free of duplicates".to_string());
        }
        Ok(Self { labels })
    }
}

impl From<LabelSet> for Vec<String> {
    fn from(set: LabelSet) -> Self {
        set.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_and_deduplicates() {
        let set = LabelSet::from_labels(["C", "A", "B", "A", "C"]);
        assert_eq!(set.as_slice(), &["A", "B", "C"]);
        assert_eq!(set.index_of("B"), Some(1));
        assert_eq!(set.index_of("Z"), None);
        assert_eq!(set.one_hot("C").unwrap(), (2, vec![0.0, 0.0, 1.0]));
    }

    #[test]
    fn rejects_unsorted_persisted_lists() {
        let parsed: Result<LabelSet, _> = serde_json::from_str(r#"["B","A"]"#);
        assert!(parsed.is_err());
        let parsed: LabelSet = serde_json::from_str(r#"["A","B"]"#).unwrap();
        assert_eq!(parsed.len(), 2);
    }
}
