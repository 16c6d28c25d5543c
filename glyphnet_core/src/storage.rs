//! Named model slots on disk.
//!
//! Each slot is one checkpoint file `<dir>/<slot>.glyph`, written atomically
//! through [`Checkpointable::write_snapshot`].

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::checkpoint::{CheckpointError, Checkpointable};
use crate::config::StorageConfig;
use crate::error::{LearnerError, Result};
use crate::handle::ModelHandle;
use crate::neural::Classifier;

pub const SLOT_EXTENSION: &str = "glyph";

/// Directory of saved classifiers addressed by slot name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File that backs `slot`.
    pub fn slot_path(&self, slot: &str) -> Result<PathBuf> {
        validate_slot_name(slot)?;
        Ok(self.root.join(format!("{slot}.{SLOT_EXTENSION}")))
    }

    pub fn contains(&self, slot: &str) -> Result<bool> {
        Ok(self.slot_path(slot)?.is_file())
    }

    /// Saves the handle's model into `slot`, replacing any previous content.
    ///
    /// Refused with [`LearnerError::TrainingInProgress`] during a fit.
    pub fn save(&self, handle: &ModelHandle, slot: &str) -> Result<()> {
        handle.ensure_idle("save")?;
        let model = handle.read()?;
        self.save_classifier(&model, slot)
    }

    pub fn save_classifier(&self, classifier: &Classifier, slot: &str) -> Result<()> {
        let path = self.slot_path(slot)?;
        classifier.save_checkpoint(&path)?;
        info!(slot, path = %path.display(), "model saved");
        Ok(())
    }

    /// Restores the classifier saved in `slot`, marked trained and compiled.
    pub fn load(&self, slot: &str) -> Result<Classifier> {
        let path = self.slot_path(slot)?;
        let mut classifier = match Classifier::load_checkpoint(&path) {
            Ok(classifier) => classifier,
            Err(CheckpointError::Io(err)) if err.kind() == ErrorKind::NotFound => {
                return Err(LearnerError::SlotNotFound {
                    slot: slot.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };
        classifier.compile();
        info!(
            slot,
            sample_size = classifier.sample_size(),
            num_classes = classifier.num_classes(),
            "model loaded"
        );
        Ok(classifier)
    }

    /// Replaces the handle's model with the one in `slot`. On error the
    /// handle keeps its current model.
    pub fn load_into(&self, handle: &ModelHandle, slot: &str) -> Result<()> {
        handle.ensure_idle("load")?;
        let classifier = self.load(slot)?;
        handle.replace(classifier)
    }

    /// Slot names present in the directory, sorted.
    pub fn list_slots(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(LearnerError::io(&self.root, err)),
        };

        let mut slots = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| LearnerError::io(&self.root, err))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SLOT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                if validate_slot_name(stem).is_ok() {
                    slots.push(stem.to_string());
                }
            }
        }
        slots.sort();
        Ok(slots)
    }
}

fn validate_slot_name(slot: &str) -> Result<()> {
    let valid = !slot.is_empty()
        && slot
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(LearnerError::InvalidSlotName(slot.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neural::ClassifierConfig;

    fn store() -> (tempfile::TempDir, ModelStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("models"));
        (dir, store)
    }

    #[test]
    fn missing_slot_reports_its_name() {
        let (_dir, store) = store();
        match store.load("model") {
            Err(LearnerError::SlotNotFound { slot }) => assert_eq!(slot, "model"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn loaded_model_is_trained_and_compiled() {
        let (_dir, store) = store();
        let handle = ModelHandle::from_config(&ClassifierConfig::new(16, 3)).unwrap();
        store.save(&handle, "model").unwrap();

        let loaded = store.load("model").unwrap();
        assert!(loaded.is_trained());
        assert!(loaded.is_compiled());
        assert_eq!(loaded.optimizer_steps(), 0);
        assert_eq!(store.list_slots().unwrap(), vec!["model".to_string()]);
    }

    #[test]
    fn load_into_replaces_the_handles_model() {
        let (_dir, store) = store();
        let saved = Classifier::new(&ClassifierConfig::new(16, 4).with_seed(1)).unwrap();
        store.save_classifier(&saved, "four").unwrap();

        let handle = ModelHandle::from_config(&ClassifierConfig::new(16, 2)).unwrap();
        store.load_into(&handle, "four").unwrap();
        assert_eq!(handle.with_model(|m| m.num_classes()).unwrap(), 4);
        assert!(handle.is_trained().unwrap());
        assert_eq!(
            handle.with_model(|m| m.parameters()).unwrap(),
            saved.parameters()
        );
    }

    #[test]
    fn failed_load_keeps_the_current_model() {
        let (_dir, store) = store();
        let handle = ModelHandle::from_config(&ClassifierConfig::new(16, 2)).unwrap();
        let before = handle.with_model(|m| m.parameters()).unwrap();
        assert!(store.load_into(&handle, "absent").is_err());
        assert_eq!(handle.with_model(|m| m.parameters()).unwrap(), before);
    }

    #[test]
    fn corrupt_slot_is_a_checkpoint_error() {
        let (_dir, store) = store();
        fs::create_dir_all(store.root()).unwrap();
        fs::write(store.slot_path("broken").unwrap(), b"not a model").unwrap();
        assert!(matches!(
            store.load("broken"),
            Err(LearnerError::Checkpoint(_))
        ));
    }

    #[test]
    fn slot_names_are_restricted() {
        let (_dir, store) = store();
        for bad in ["", "../escape", "a b", "model.glyph"] {
            assert!(matches!(
                store.slot_path(bad),
                Err(LearnerError::InvalidSlotName(_))
            ));
        }
        assert!(store.slot_path("letters_v2-final").is_ok());
        assert!(store.list_slots().unwrap().is_empty());
    }

    #[test]
    fn save_is_refused_while_training() {
        let (_dir, store) = store();
        let handle = ModelHandle::from_config(&ClassifierConfig::new(16, 2)).unwrap();
        let _guard = handle.begin_training().unwrap();
        assert!(matches!(
            store.save(&handle, "model"),
            Err(LearnerError::TrainingInProgress)
        ));
        assert!(!store.contains("model").unwrap());
    }
}
