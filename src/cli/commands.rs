// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `show-batch`.
//
// Every run hyperparameter starts from the `--size` preset;
// a flag that is given overrides the preset value, a flag that
// is omitted leaves it alone.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::train_use_case::{ModelSize, PretrainConfig};
use crate::ml::mlm_hook::ShowBatchOptions;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pretrain an ELECTRA generator/discriminator pair on .txt files
    Train(TrainArgs),

    /// Mask one batch of the corpus and print it
    ShowBatch(ShowBatchArgs),
}

/// Flags shared by every command that reads the corpus.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Model size preset: small, base or large
    #[arg(long, default_value = "small")]
    pub size: ModelSize,

    /// Directory containing .txt files, one sentence per line
    #[arg(long, default_value = "data/corpus")]
    pub corpus_dir: String,

    /// Directory for checkpoints, tokenizer, config and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Seed for masking, example packing and shuffling
    #[arg(long, env = "ELECTRA_SEED")]
    pub seed: Option<u64>,

    /// Fraction of tokens selected for masking
    #[arg(long)]
    pub mask_prob: Option<f64>,

    /// Maximum tokens per example, including [CLS] and [SEP]
    #[arg(long)]
    pub max_length: Option<usize>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Upper bound on the vocabulary built from the corpus
    #[arg(long)]
    pub vocab_size: Option<usize>,
}

impl RunArgs {
    /// The size preset with every given flag applied on top.
    pub fn to_config(&self) -> PretrainConfig {
        let mut cfg = PretrainConfig::for_size(self.size);
        cfg.corpus_dir     = self.corpus_dir.clone();
        cfg.checkpoint_dir = self.checkpoint_dir.clone();
        cfg.seed           = self.seed;
        if let Some(v) = self.mask_prob  { cfg.mask_prob  = v; }
        if let Some(v) = self.max_length { cfg.max_length = v; }
        if let Some(v) = self.batch_size { cfg.batch_size = v; }
        if let Some(v) = self.vocab_size { cfg.vocab_size = v; }
        cfg
    }
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Prefix of checkpoint tags (`<run_name>_<percent>`)
    #[arg(long, default_value = "electra")]
    pub run_name: String,

    /// Peak learning rate
    #[arg(long)]
    pub lr: Option<f64>,

    /// Number of optimizer steps
    #[arg(long)]
    pub steps: Option<usize>,

    #[arg(long)]
    pub warmup_steps: Option<usize>,

    /// Warm-up as a fraction of the run, instead of a step count
    #[arg(long, conflicts_with = "warmup_steps")]
    pub warmup_pct: Option<f64>,

    /// Hidden width of the discriminator
    #[arg(long)]
    pub d_model: Option<usize>,

    #[arg(long)]
    pub num_heads: Option<usize>,

    #[arg(long)]
    pub num_layers: Option<usize>,

    #[arg(long)]
    pub d_ff: Option<usize>,

    /// Generator width = discriminator width / divisor
    #[arg(long)]
    pub generator_size_divisor: Option<usize>,

    /// Weight of the discriminator loss (generator weight is 1)
    #[arg(long)]
    pub disc_weight: Option<f64>,

    /// Turn off generator label smoothing
    #[arg(long)]
    pub no_label_smoothing: bool,

    /// Comma-separated checkpoint percentages, e.g. 25,50,100
    #[arg(long, value_delimiter = ',')]
    pub checkpoint_percents: Option<Vec<usize>>,

    /// Log metrics every N steps
    #[arg(long)]
    pub log_every: Option<usize>,

    /// DataLoader worker threads
    #[arg(long)]
    pub num_workers: Option<usize>,
}

/// Convert CLI TrainArgs into the application-layer PretrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for PretrainConfig {
    fn from(a: TrainArgs) -> Self {
        let mut cfg = a.run.to_config();
        cfg.run_name = a.run_name;
        if let Some(v) = a.lr                     { cfg.lr = v; }
        if let Some(v) = a.steps                  { cfg.total_steps = v; }
        if let Some(v) = a.warmup_steps           { cfg.warmup_steps = v; }
        if let Some(v) = a.warmup_pct             { cfg.warmup_pct = Some(v); }
        if let Some(v) = a.d_model                { cfg.d_model = v; }
        if let Some(v) = a.num_heads              { cfg.num_heads = v; }
        if let Some(v) = a.num_layers             { cfg.num_layers = v; }
        if let Some(v) = a.d_ff                   { cfg.d_ff = v; }
        if let Some(v) = a.generator_size_divisor { cfg.generator_size_divisor = v; }
        if let Some(v) = a.disc_weight            { cfg.discriminator_weight = v; }
        if let Some(v) = a.checkpoint_percents    { cfg.checkpoint_percents = v; }
        if let Some(v) = a.log_every              { cfg.log_every = v; }
        if let Some(v) = a.num_workers            { cfg.num_workers = v; }
        if a.no_label_smoothing {
            cfg.label_smoothing = None;
        }
        cfg
    }
}

/// All arguments for the `show-batch` command
#[derive(Args, Debug)]
pub struct ShowBatchArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Print this id instead of the ignore marker in the label row
    #[arg(long, allow_negative_numbers = true)]
    pub show_ignore_id: Option<i64>,

    /// Render at most this many examples
    #[arg(long, default_value_t = 4)]
    pub rows: usize,

    /// Skip the explanation printed above the batch
    #[arg(long)]
    pub quiet: bool,
}

impl ShowBatchArgs {
    pub fn options(&self) -> ShowBatchOptions {
        ShowBatchOptions {
            show_ignore_id: self.show_ignore_id,
            verbose:        !self.quiet,
            max_rows:       Some(self.rows),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn parse(args: &[&str]) -> Commands {
        Cli::try_parse_from(args).unwrap().command
    }

    #[test]
    fn test_train_uses_size_preset() {
        let Commands::Train(args) = parse(&["electra-pretrain", "train", "--size", "base"]) else {
            panic!("expected train");
        };
        let cfg = PretrainConfig::from(args);
        assert_eq!(cfg, PretrainConfig {
            run_name: "electra".to_string(),
            ..PretrainConfig::for_size(ModelSize::Base)
        });
    }

    #[test]
    fn test_train_overrides() {
        let Commands::Train(args) = parse(&[
            "electra-pretrain", "train",
            "--steps", "1000", "--lr", "1e-4", "--mask-prob", "0.2",
            "--checkpoint-percents", "25,100", "--no-label-smoothing",
        ]) else {
            panic!("expected train");
        };
        let cfg = PretrainConfig::from(args);
        assert_eq!(cfg.total_steps, 1000);
        assert_eq!(cfg.lr, 1e-4);
        assert_eq!(cfg.mask_prob, 0.2);
        assert_eq!(cfg.checkpoint_percents, vec![25, 100]);
        assert_eq!(cfg.label_smoothing, None);
        // untouched presets stay
        assert_eq!(cfg.batch_size, 128);
    }

    #[test]
    fn test_warmup_pct_flag() {
        let Commands::Train(args) = parse(&["electra-pretrain", "train", "--warmup-pct", "0.1"]) else {
            panic!("expected train");
        };
        assert_eq!(PretrainConfig::from(args).warmup_pct, Some(0.1));

        assert!(Cli::try_parse_from([
            "electra-pretrain", "train", "--warmup-pct", "0.1", "--warmup-steps", "10",
        ]).is_err());
    }

    #[test]
    fn test_show_batch_options() {
        let Commands::ShowBatch(args) = parse(&[
            "electra-pretrain", "show-batch", "--show-ignore-id", "0", "--quiet",
        ]) else {
            panic!("expected show-batch");
        };
        let opts = args.options();
        assert_eq!(opts.show_ignore_id, Some(0));
        assert!(!opts.verbose);
        assert_eq!(opts.max_rows, Some(4));
    }

    #[test]
    fn test_unknown_size_rejected() {
        assert!(Cli::try_parse_from(["electra-pretrain", "train", "--size", "huge"]).is_err());
    }
}
