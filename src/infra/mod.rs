// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by the other layers:
//
//   checkpoint.rs — Saving and loading model weights
//                   Uses Burn's CompactRecorder to serialise
//                   model parameters to disk. Also saves/loads
//                   TrainConfig as JSON so `test` can rebuild
//                   the model and the data split.
//
//   metrics.rs    — RunLogger: scalar metrics to CSV and chart
//                   images to JPEG files inside a run directory.
//
//   plot.rs       — Truth vs prediction chart rendered with
//                   plotters and encoded to JPEG.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Run directory logger (metrics.csv + images/)
pub mod metrics;

/// Forecast chart rendering
pub mod plot;
