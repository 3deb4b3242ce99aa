// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from a CSV file on disk to tensor batches.
//
//   smart-meter .csv
//       │
//       ▼
//   CsvTableLoader    → parses timestamps and numeric columns
//       │
//       ▼
//   split_chronological → train / validation / test tables
//       │
//       ▼
//   SequenceDataset   → index → (x, y) windows, label masking,
//       │               relative time feature
//       ▼
//   SequenceBatcher   → stacks samples into [N, T, F] / [N, T]
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads a CSV file into a SeriesTable
pub mod loader;

/// Cuts a table into consecutive train/validation/test pieces
pub mod splitter;

/// Windowed (input, target) adapter implementing Burn's Dataset trait
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
