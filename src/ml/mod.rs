// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that turns a clean token batch into a gradient
// step lives here.
//
//   masking.rs   — Dynamic MLM masking of a token batch
//                  (80% [MASK] / 10% random / 10% unchanged)
//
//   mlm_hook.rs  — Per-step interception: replaces the clean
//                  batch with masked inputs + labels, and
//                  renders masked batches for inspection
//
//   model.rs     — The transformer encoder and the concrete
//                  generator / discriminator heads
//
//   electra.rs   — Replaced-token detection: generator →
//                  substitution → discriminator
//
//   loss.rs      — Weighted generator cross-entropy +
//                  discriminator binary cross-entropy
//
//   schedule.rs  — Linear warm-up × polynomial decay LR
//
//   trainer.rs   — The step-based training loop
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Clark et al. (2020) ELECTRA
//            Devlin et al. (2019) BERT

/// Dynamic token masking
pub mod masking;

/// Per-batch masking hook and batch rendering
pub mod mlm_hook;

/// Transformer encoder, generator and discriminator
pub mod model;

/// Generator/discriminator coupling
pub mod electra;

/// Composite ELECTRA loss
pub mod loss;

/// Warm-up and decay learning-rate schedule
pub mod schedule;

/// Step-based pretraining loop with checkpointing
pub mod trainer;
