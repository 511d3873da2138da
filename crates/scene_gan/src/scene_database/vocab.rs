use std::path::Path;

use serde::{Deserialize, Serialize};

use super::scene_dataset::{SceneDatasetError, load_ron, save_ron};

/// Names of the object categories and relationship predicates.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Vocab {
    pub object_idx_to_name: Vec<String>,
    #[serde(default)]
    pub pred_idx_to_name: Vec<String>,
}

impl Vocab {
    pub fn new(object_idx_to_name: Vec<String>, pred_idx_to_name: Vec<String>) -> Self {
        Self {
            object_idx_to_name,
            pred_idx_to_name,
        }
    }

    pub fn num_objects(&self) -> usize {
        self.object_idx_to_name.len()
    }

    pub fn num_predicates(&self) -> usize {
        self.pred_idx_to_name.len()
    }

    pub fn object_index(&self, name: &str) -> Option<usize> {
        self.object_idx_to_name.iter().position(|n| n == name)
    }

    pub fn object_name(&self, index: usize) -> Option<&str> {
        self.object_idx_to_name.get(index).map(String::as_str)
    }

    pub fn save_to_ron(&self, path: &Path) -> Result<(), SceneDatasetError> {
        save_ron(self, path)
    }

    pub fn load_from_ron(path: &Path) -> Result<Self, SceneDatasetError> {
        load_ron(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_objects() {
        let vocab = Vocab::new(vec!["sky".into(), "tree".into()], vec![]);
        assert_eq!(vocab.num_objects(), 2);
        assert_eq!(vocab.object_index("tree"), Some(1));
        assert_eq!(vocab.object_name(0), Some("sky"));
        assert_eq!(vocab.object_name(2), None);
    }

    #[test]
    fn predicates_are_optional() {
        let vocab: Vocab = ron::from_str(r#"(object_idx_to_name: ["sky"])"#).unwrap();
        assert_eq!(vocab.num_objects(), 1);
        assert_eq!(vocab.num_predicates(), 0);
    }
}
