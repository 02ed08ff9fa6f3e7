// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves ELECTRA weights using Burn's CompactRecorder (named
// MessagePack, weights stored as f16).
//
// What gets saved per checkpoint tag:
//   1. <tag>.mpk                   — generator + discriminator
//   2. <tag>_discriminator.mpk     — the discriminator alone,
//                                    the part kept for fine-tuning
//   3. latest_checkpoint.json      — which tag was written last
//
// And once per run:
//   pretrain_config.json           — every run hyperparameter,
//                                    enough to rebuild the model
//
// Tags are `<run_name>_<percent>`, e.g. `vanilla_50` and
// `vanilla_100` for checkpoints at half and full run length.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::PretrainConfig;
use crate::ml::electra::ElectraModel;
use crate::ml::model::ElectraDiscriminator;

const CONFIG_FILE: &str = "pretrain_config.json";
const LATEST_FILE: &str = "latest_checkpoint.json";

/// Checkpoint tag for a run at `percent` of its length.
pub fn checkpoint_tag(run_name: &str, percent: usize) -> String {
    format!("{run_name}_{percent}")
}

/// Manages saving and loading of pretraining checkpoints.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Save the full generator + discriminator model under `tag`.
    pub fn save_model<B: Backend>(&self, model: &ElectraModel<B>, tag: &str) -> Result<()> {
        // recorder adds the extension
        let path = self.dir.join(tag);
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        fs::write(self.dir.join(LATEST_FILE), serde_json::to_string(tag)?)
            .with_context(|| format!("Failed to write {LATEST_FILE}"))?;

        tracing::debug!("Saved model checkpoint '{}'", tag);
        Ok(())
    }

    /// Save only the discriminator under `<tag>_discriminator`.
    pub fn save_discriminator<B: Backend>(&self, discriminator: &ElectraDiscriminator<B>, tag: &str) -> Result<()> {
        let path = self.dir.join(format!("{tag}_discriminator"));
        CompactRecorder::new()
            .record(discriminator.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save discriminator to '{}'", path.display()))?;

        tracing::debug!("Saved discriminator checkpoint '{}'", tag);
        Ok(())
    }

    /// Tag of the most recently saved full model.
    pub fn latest_tag(&self) -> Result<String> {
        let path = self.dir.join(LATEST_FILE);
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot find '{}'. Have you run 'train' first?", path.display()))?;
        Ok(serde_json::from_str::<String>(&s)?)
    }

    /// Written before training starts.
    pub fn save_config(&self, cfg: &PretrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved pretraining config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<PretrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::ModelSize;
    use crate::ml::electra::{ElectraModelConfig, TokenDiscriminator};
    use crate::ml::model::EncoderConfig;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray;

    fn tiny_discriminator(device: &<TestBackend as Backend>::Device) -> ElectraDiscriminator<TestBackend> {
        EncoderConfig::new(30, 8, 8, 2, 1, 16)
            .with_dropout(0.0)
            .init_discriminator(device)
    }

    #[test]
    fn test_checkpoint_tag() {
        assert_eq!(checkpoint_tag("vanilla", 50), "vanilla_50");
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(dir.path()).unwrap();
        let cfg = PretrainConfig::for_size(ModelSize::Small);
        mgr.save_config(&cfg).unwrap();
        assert_eq!(mgr.load_config().unwrap(), cfg);
    }

    #[test]
    fn test_latest_tag_missing_before_training() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(dir.path()).unwrap();
        assert!(mgr.latest_tag().is_err());
    }

    #[test]
    fn test_save_model_writes_mpk_and_latest_tag() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(dir.path()).unwrap();

        let encoder = EncoderConfig::new(30, 8, 8, 2, 1, 16).with_dropout(0.0);
        let model = ElectraModelConfig::new(encoder.clone(), encoder, 0).init::<TestBackend>(&device);
        mgr.save_model(&model, "run_50").unwrap();

        assert!(dir.path().join("run_50.mpk").exists());
        assert!(!dir.path().join("run_50.mpk.gz").exists());
        assert_eq!(mgr.latest_tag().unwrap(), "run_50");
    }

    #[test]
    fn test_discriminator_save_and_restore() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(dir.path()).unwrap();

        let saved = tiny_discriminator(&device);
        mgr.save_discriminator(&saved, "run_100").unwrap();
        assert!(dir.path().join("run_100_discriminator.mpk").exists());

        let record = CompactRecorder::new()
            .load(dir.path().join("run_100_discriminator"), &device)
            .unwrap();
        let restored = tiny_discriminator(&device).load_record(record);

        let ids = Tensor::<TestBackend, 2, Int>::from_data(
            TensorData::new(vec![1i64, 5, 6, 2], [1, 4]),
            &device,
        );
        let a = saved.discriminator_logits(ids.clone()).into_data().to_vec::<f32>().unwrap();
        let b = restored.discriminator_logits(ids).into_data().to_vec::<f32>().unwrap();
        // weights go through f16 on disk
        for (x, y) in a.iter().zip(b.iter()) {
            approx::assert_abs_diff_eq!(*x, *y, epsilon = 1e-3);
        }
    }
}
