// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that describe a forecasting run:
//
//   table.rs        — the time-indexed source table
//   hparams.rs      — the flat hyperparameter set shared by every
//                     layer and by external tuning tools
//   search_space.rs — the declared tuning ranges, the fixed
//                     operational defaults, and the Trial seam
//   traits.rs       — abstractions the other layers implement
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Time-indexed table of numeric columns
pub mod table;

// Typed hyperparameter set with the exact serialised key names
pub mod hparams;

// Search space, fixed defaults, and trial implementations
pub mod search_space;

// Core abstractions (traits) that other layers implement
pub mod traits;
