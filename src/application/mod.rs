// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (train, test, tune).
//
// Rules for this layer:
//   - No ML math or model code here
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The training workflow
pub mod train_use_case;

// Scoring a finished run on its test split
pub mod test_use_case;

// Random hyperparameter search
pub mod tune_use_case;
