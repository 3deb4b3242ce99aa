// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that touches Burn modules, optimisers and tensors
// during training and evaluation lives here.
//
//   model.rs     — stacked, optionally bidirectional LSTM encoder
//                  with a per-step linear head
//                  [batch, time, features] → [batch, time]
//
//   trainer.rs   — masked MSE, Adam with gradient clipping,
//                  epoch loop, checkpoints, early stopping
//
//   scheduler.rs — reduce-on-plateau learning-rate decay
//
//   evaluator.rs — validation/test passes, aggregation,
//                  single-window forecasts for charts
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Hochreiter & Schmidhuber (1997) Long Short-Term Memory

/// LSTM forecaster architecture
pub mod model;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Learning-rate decay on validation plateaus
pub mod scheduler;

/// Evaluation passes and forecast extraction
pub mod evaluator;
