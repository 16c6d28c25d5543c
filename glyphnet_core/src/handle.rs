//! Shared ownership of one classifier across capture, training and inference.
//!
//! A [`ModelHandle`] is cheap to clone; every clone refers to the same model.
//! Inference and saving take the read lock, training steps and loads take the
//! write lock, and the `training` flag marks the whole span of a fit so that
//! competing operations are refused instead of interleaving with it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

use crate::error::{LearnerError, Result};
use crate::neural::{Classifier, ClassifierConfig};

struct Shared {
    model: RwLock<Classifier>,
    training: AtomicBool,
}

#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<Shared>,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("training", &self.is_training())
            .finish_non_exhaustive()
    }
}

/// Clears the training flag when dropped, including on early return.
pub(crate) struct TrainingGuard {
    handle: ModelHandle,
}

impl Drop for TrainingGuard {
    fn drop(&mut self) {
        self.handle.inner.training.store(false, Ordering::Release);
    }
}

impl ModelHandle {
    pub fn new(classifier: Classifier) -> Self {
        Self {
            inner: Arc::new(Shared {
                model: RwLock::new(classifier),
                training: AtomicBool::new(false),
            }),
        }
    }

    /// Builds a fresh classifier and wraps it.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        Classifier::new(config).map(Self::new)
    }

    pub fn is_training(&self) -> bool {
        self.inner.training.load(Ordering::Acquire)
    }

    /// Whether a fit has completed or a checkpoint was loaded into this model.
    pub fn is_trained(&self) -> Result<bool> {
        Ok(self.read()?.is_trained())
    }

    /// Claims the training flag for one fit.
    pub(crate) fn begin_training(&self) -> Result<TrainingGuard> {
        self.inner
            .training
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                warn!("fit rejected: training already in progress");
                LearnerError::TrainingInProgress
            })?;
        Ok(TrainingGuard {
            handle: self.clone(),
        })
    }

    /// Fails with [`LearnerError::TrainingInProgress`] while a fit is running.
    pub(crate) fn ensure_idle(&self, operation: &'static str) -> Result<()> {
        if self.is_training() {
            warn!(operation, "rejected: training in progress");
            return Err(LearnerError::TrainingInProgress);
        }
        Ok(())
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, Classifier>> {
        self.inner.model.read().map_err(|_| LearnerError::LockPoisoned)
    }

    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<'_, Classifier>> {
        self.inner.model.write().map_err(|_| LearnerError::LockPoisoned)
    }

    /// Runs `f` against the model under the read lock. Refused during a fit.
    pub fn with_model<T>(&self, f: impl FnOnce(&Classifier) -> T) -> Result<T> {
        self.ensure_idle("inspect")?;
        let model = self.read()?;
        Ok(f(&model))
    }

    /// Swaps in a different classifier wholesale. Refused during a fit.
    pub fn replace(&self, classifier: Classifier) -> Result<()> {
        self.ensure_idle("replace")?;
        *self.write()? = classifier;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> ModelHandle {
        ModelHandle::from_config(&ClassifierConfig::new(16, 2)).unwrap()
    }

    #[test]
    fn training_flag_is_exclusive_and_released_on_drop() {
        let handle = handle();
        let guard = handle.begin_training().unwrap();
        assert!(handle.is_training());
        assert!(matches!(
            handle.clone().begin_training(),
            Err(LearnerError::TrainingInProgress)
        ));
        drop(guard);
        assert!(!handle.is_training());
        assert!(handle.begin_training().is_ok());
    }

    #[test]
    fn replace_and_inspect_are_refused_while_training() {
        let handle = handle();
        let replacement = Classifier::new(&ClassifierConfig::new(16, 3)).unwrap();
        let _guard = handle.begin_training().unwrap();
        assert!(matches!(
            handle.with_model(|m| m.num_classes()),
            Err(LearnerError::TrainingInProgress)
        ));
        assert!(matches!(
            handle.replace(replacement),
            Err(LearnerError::TrainingInProgress)
        ));
    }

    #[test]
    fn clones_share_one_model() {
        let handle = handle();
        let other = handle.clone();
        other
            .replace(Classifier::new(&ClassifierConfig::new(16, 5)).unwrap())
            .unwrap();
        assert_eq!(handle.with_model(|m| m.num_classes()).unwrap(), 5);
        assert!(!handle.is_trained().unwrap());
    }
}
