// ============================================================
// Layer 2 — PretrainUseCase
// ============================================================
// Orchestrates the full ELECTRA pretraining pipeline in order:
//
//   Step 1: Load .txt documents         (Layer 4 - data)
//   Step 2: Clean into lines            (Layer 4 - data)
//   Step 3: Build / load tokenizer      (Layer 6 - infra)
//   Step 4: Pack pretraining examples   (Layer 4 - data)
//   Step 5: Build the dataset           (Layer 4 - data)
//   Step 6: Save config                 (Layer 6 - infra)
//   Step 7: Run the step loop           (Layer 5 - ml)
//
// Reference: Clark et al. (2020) ELECTRA, Table 6 hyperparameters

use anyhow::{bail, Result};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::data::{
    dataset::PretrainDataset,
    examples::ExampleBuilder,
    loader::TextCorpusLoader,
    preprocessor::Preprocessor,
};
use crate::domain::special_tokens::SpecialTokens;
use crate::domain::traits::{CorpusSource, TokenEncoder};
use crate::infra::{
    checkpoint::CheckpointManager,
    tokenizer_store::{model_vocab_size, special_tokens, TokenizerStore},
};
use crate::ml::loss::ElectraLossConfig;
use crate::ml::masking::{MaskingConfig, IGNORE_INDEX};
use crate::ml::model::EncoderConfig;
use crate::ml::electra::ElectraModelConfig;
use crate::ml::schedule::WarmupDecayConfig;
use crate::ml::trainer::run_training;

// ─── Model Size ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Small,
    Base,
    Large,
}

impl FromStr for ModelSize {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "small" => Ok(Self::Small),
            "base"  => Ok(Self::Base),
            "large" => Ok(Self::Large),
            other   => Err(format!("unknown model size '{other}' (expected small, base or large)")),
        }
    }
}

// ─── Pretraining Configuration ───────────────────────────────────────────────
// Every hyperparameter of a run. Written to pretrain_config.json
// so a checkpoint can always be matched with its architecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PretrainConfig {
    pub size:                   ModelSize,
    pub corpus_dir:             String,
    pub checkpoint_dir:         String,
    pub run_name:               String,
    pub seed:                   Option<u64>,

    // ── Size-dependent presets ───────────────────────────────────────────────
    pub mask_prob:              f64,
    pub lr:                     f64,
    pub batch_size:             usize,
    pub total_steps:            usize,
    pub max_length:             usize,

    // ── Architecture ─────────────────────────────────────────────────────────
    pub vocab_size:             usize,
    pub d_model:                usize,
    pub num_heads:              usize,
    pub num_layers:             usize,
    pub d_ff:                   usize,
    pub dropout:                f64,
    /// Generator width = discriminator width / divisor
    pub generator_size_divisor: usize,

    // ── Optimisation ─────────────────────────────────────────────────────────
    pub warmup_steps:           usize,
    /// Warm-up as a fraction of the run; replaces `warmup_steps` when set
    pub warmup_pct:             Option<f64>,
    pub end_lr:                 f64,
    pub decay_power:            f64,
    pub adam_epsilon:           f32,
    pub generator_weight:       f64,
    pub discriminator_weight:   f64,
    pub label_smoothing:        Option<f64>,
    /// Label of positions the generator loss skips
    pub ignore_index:           i64,

    // ── Bookkeeping ──────────────────────────────────────────────────────────
    /// Percentages of `total_steps` at which checkpoints are written
    pub checkpoint_percents:    Vec<usize>,
    pub log_every:              usize,
    pub num_workers:            usize,
}

impl PretrainConfig {
    pub fn for_size(size: ModelSize) -> Self {
        // (mask_prob, lr, batch, steps, max_length)
        let (mask_prob, lr, batch_size, total_steps, max_length) = match size {
            ModelSize::Small => (0.15, 5e-4, 128, 1_000_000, 128),
            ModelSize::Base  => (0.15, 2e-4, 256, 766_000, 512),
            ModelSize::Large => (0.25, 2e-4, 2048, 400_000, 512),
        };
        // (d_model, heads, layers, d_ff)
        let (d_model, num_heads, num_layers, d_ff) = match size {
            ModelSize::Small => (256, 4, 12, 1024),
            ModelSize::Base  => (768, 12, 12, 3072),
            ModelSize::Large => (1024, 16, 24, 4096),
        };
        Self {
            size,
            corpus_dir:             "data/corpus".to_string(),
            checkpoint_dir:         "checkpoints".to_string(),
            run_name:               "electra".to_string(),
            seed:                   None,
            mask_prob,
            lr,
            batch_size,
            total_steps,
            max_length,
            vocab_size:             30522,
            d_model,
            num_heads,
            num_layers,
            d_ff,
            dropout:                0.1,
            generator_size_divisor: 1,
            warmup_steps:           10_000,
            warmup_pct:             None,
            end_lr:                 0.0,
            decay_power:            1.0,
            adam_epsilon:           1e-6,
            generator_weight:       1.0,
            discriminator_weight:   50.0,
            label_smoothing:        Some(0.1),
            ignore_index:           IGNORE_INDEX,
            checkpoint_percents:    vec![50, 100],
            log_every:              100,
            num_workers:            1,
        }
    }

    /// Fail early on combinations the model or schedule cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.total_steps == 0 || self.log_every == 0 {
            bail!("batch_size, total_steps and log_every must be positive");
        }
        if self.max_length < 5 {
            bail!("max_length must be at least 5, got {}", self.max_length);
        }
        if self.generator_size_divisor == 0 {
            bail!("generator_size_divisor must be positive");
        }
        if self.num_heads == 0 || self.d_model % self.num_heads != 0 {
            bail!("d_model ({}) must be divisible by num_heads ({})", self.d_model, self.num_heads);
        }
        let gen = self.generator_encoder(self.vocab_size, 0);
        if gen.d_model == 0 || gen.d_model % gen.num_heads != 0 {
            bail!(
                "generator width {} (d_model / {}) does not split into {} heads",
                gen.d_model, self.generator_size_divisor, gen.num_heads
            );
        }
        if let Some(pct) = self.warmup_pct.filter(|p| !(p.is_finite() && *p > 0.0)) {
            bail!("warmup_pct must be a positive fraction, got {pct}");
        }
        if let Some(p) = self.checkpoint_percents.iter().find(|&&p| p == 0 || p > 100) {
            bail!("checkpoint percentages must be in 1..=100, got {p}");
        }
        Ok(())
    }

    pub fn discriminator_encoder(&self, vocab_size: usize, pad_token_id: usize) -> EncoderConfig {
        EncoderConfig::new(vocab_size, self.max_length, self.d_model, self.num_heads, self.num_layers, self.d_ff)
            .with_dropout(self.dropout)
            .with_pad_token_id(pad_token_id)
    }

    /// Same depth as the discriminator, narrower by `generator_size_divisor`.
    pub fn generator_encoder(&self, vocab_size: usize, pad_token_id: usize) -> EncoderConfig {
        let div = self.generator_size_divisor.max(1);
        EncoderConfig::new(
            vocab_size,
            self.max_length,
            self.d_model / div,
            (self.num_heads / div).max(1),
            self.num_layers,
            self.d_ff / div,
        )
        .with_dropout(self.dropout)
        .with_pad_token_id(pad_token_id)
    }

    pub fn model_config(&self, vocab_size: usize, special: &SpecialTokens) -> ElectraModelConfig {
        let pad = special.pad as usize;
        ElectraModelConfig::new(
            self.generator_encoder(vocab_size, pad),
            self.discriminator_encoder(vocab_size, pad),
            pad,
        )
    }

    pub fn masking_config(&self, vocab_size: usize, special: &SpecialTokens) -> MaskingConfig {
        let specials = special.all_ids().into_iter().map(i64::from).collect();
        MaskingConfig::new(special.mask as i64, specials, vocab_size)
            .with_mlm_probability(self.mask_prob)
            .with_ignore_index(self.ignore_index)
    }

    pub fn loss_config(&self) -> ElectraLossConfig {
        ElectraLossConfig::new()
            .with_weights(self.generator_weight, self.discriminator_weight)
            .with_label_smoothing(self.label_smoothing)
            .with_ignore_index(self.ignore_index)
    }

    pub fn schedule_config(&self) -> WarmupDecayConfig {
        let schedule = WarmupDecayConfig::new(self.lr, self.total_steps)
            .with_end_lr(self.end_lr)
            .with_decay_power(self.decay_power);
        match self.warmup_pct {
            Some(pct) => schedule.with_warmup_pct(pct),
            None => schedule.with_warmup_steps(self.warmup_steps),
        }
    }
}

impl Default for PretrainConfig {
    fn default() -> Self {
        Self::for_size(ModelSize::Small)
    }
}

// ─── Corpus Preparation ───────────────────────────────────────────────────────
/// Everything the loop needs from the corpus side.
pub struct PreparedCorpus {
    pub tokenizer:  tokenizers::Tokenizer,
    pub special:    SpecialTokens,
    pub vocab_size: usize,
    pub dataset:    PretrainDataset,
}

/// Load, clean, tokenize and pack the corpus into a dataset.
pub fn prepare_corpus(cfg: &PretrainConfig, rng: &mut StdRng) -> Result<PreparedCorpus> {
    // ── Step 1: Load all .txt documents ──────────────────────────────────────
    let docs = TextCorpusLoader::new(&cfg.corpus_dir).load_all()?;
    if docs.is_empty() {
        bail!("No documents found in '{}'", cfg.corpus_dir);
    }

    // ── Step 2: Clean into lines ─────────────────────────────────────────────
    let preprocessor = Preprocessor::new();
    let doc_lines: Vec<Vec<String>> = docs
        .iter()
        .map(|d| preprocessor.clean_lines(&d.text))
        .collect();

    // ── Step 3: Build / load tokenizer ───────────────────────────────────────
    let all_lines: Vec<String> = doc_lines.iter().flatten().cloned().collect();
    let tokenizer  = TokenizerStore::new(&cfg.checkpoint_dir).load_or_build(&all_lines, cfg.vocab_size)?;
    let special    = special_tokens(&tokenizer)?;
    let vocab_size = model_vocab_size(&tokenizer);
    tracing::info!("Vocabulary: {} ids, special tokens {:?}", vocab_size, special);

    // ── Step 4: Pack pretraining examples ────────────────────────────────────
    let mut builder  = ExampleBuilder::new(cfg.max_length, &special);
    let mut examples = Vec::new();
    for lines in doc_lines {
        let encoded = lines
            .iter()
            .map(|line| tokenizer.encode_line(line))
            .collect::<Result<Vec<_>>>()?;
        examples.extend(builder.build_document(encoded, rng));
    }

    // ── Step 5: Build the dataset ────────────────────────────────────────────
    let dataset = PretrainDataset::from_ids(examples);
    tracing::info!(
        "Built {} examples ({} tokens) with max_length={}",
        dataset.sample_count(),
        dataset.token_count(),
        cfg.max_length
    );
    if dataset.sample_count() == 0 {
        bail!("Corpus in '{}' produced no pretraining examples", cfg.corpus_dir);
    }

    Ok(PreparedCorpus { tokenizer, special, vocab_size, dataset })
}

/// Seeded when the config carries a seed, otherwise from entropy.
pub fn run_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Warns when the checkpoint directory already holds a run with
/// other hyperparameters. Returns true in that case.
pub fn warn_if_overwriting(ckpt_manager: &CheckpointManager, cfg: &PretrainConfig) -> bool {
    let Ok(previous) = ckpt_manager.load_config() else {
        return false;
    };
    if previous == *cfg {
        return false;
    }
    let latest = ckpt_manager.latest_tag().unwrap_or_else(|_| "none".to_string());
    tracing::warn!(
        "'{}' already holds run '{}' with a different config (latest checkpoint: {}); it will be overwritten",
        ckpt_manager.dir().display(),
        previous.run_name,
        latest
    );
    true
}

// ─── PretrainUseCase ──────────────────────────────────────────────────────────
pub struct PretrainUseCase {
    config: PretrainConfig,
}

impl PretrainUseCase {
    pub fn new(config: PretrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full pretraining pipeline end to end
    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;
        cfg.validate()?;
        tracing::info!(
            "Pretraining ELECTRA-{:?}: {} steps, batch {}, lr {:e}",
            cfg.size, cfg.total_steps, cfg.batch_size, cfg.lr
        );

        let mut rng = run_rng(cfg.seed);
        let corpus  = prepare_corpus(cfg, &mut rng)?;

        // ── Step 6: Save config ───────────────────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        warn_if_overwriting(&ckpt_manager, cfg);
        ckpt_manager.save_config(cfg)?;

        // ── Step 7: Run the step loop (Layer 5) ──────────────────────────────
        run_training(cfg, corpus, ckpt_manager)
    }
}
