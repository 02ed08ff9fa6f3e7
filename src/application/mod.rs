// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (pretraining, or inspecting masked batches).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern

// The pretraining workflow and its configuration
pub mod train_use_case;

// Masks one batch from the corpus and renders it
pub mod show_batch_use_case;
