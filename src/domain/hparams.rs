// ============================================================
// Layer 3 — Hyperparameters
// ============================================================
// One flat, typed set of options consumed by the dataset adapter,
// the model, and the training controller.
//
// The serialised key names are part of the external interface:
// tuning tools read and write these JSON objects directly, so the
// field names below must not be renamed.
//
// Example JSON:
//   {
//     "window_length": 96, "target_length": 48,
//     "hidden_size": 32, "lstm_layers": 2, "bidirectional": false,
//     "lstm_dropout": 0.25, "batch_size": 16, "num_workers": 4,
//     "learning_rate": 0.001, "patience": 2, "vis_i": 670,
//     "input_size": 6, "output_size": 1,
//     "max_nb_epochs": 200, "grad_clip": 40.0
//   }

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HParams {
    /// Number of context rows the model sees with their labels
    pub window_length: usize,
    /// Number of future rows (forecast horizon) appended after the context
    pub target_length: usize,
    /// LSTM hidden width per direction
    pub hidden_size: usize,
    /// Number of stacked recurrent layers
    pub lstm_layers: usize,
    /// Run each recurrent layer in both time directions
    pub bidirectional: bool,
    /// Dropout applied between stacked recurrent layers
    pub lstm_dropout: f64,
    pub batch_size: usize,
    /// Worker threads used by the training data loader
    pub num_workers: usize,
    /// Initial Adam learning rate
    pub learning_rate: f64,
    /// Plateau-scheduler patience, in epochs
    pub patience: usize,
    /// Validation sample index to plot; 0 disables plotting
    pub vis_i: usize,
    /// Feature width of each input row (time feature included)
    pub input_size: usize,
    /// Number of label columns forecast per timestep
    pub output_size: usize,
    /// Hard cap on training epochs
    #[serde(default = "default_max_nb_epochs")]
    pub max_nb_epochs: usize,
    /// Gradient-norm clipping threshold
    #[serde(default = "default_grad_clip")]
    pub grad_clip: f64,
}

// Objects written by tuning tools carry only the 13 core keys.
fn default_max_nb_epochs() -> usize {
    200
}

fn default_grad_clip() -> f64 {
    40.0
}

impl HParams {
    /// Rows in one input window: context plus horizon
    pub fn span(&self) -> usize {
        self.window_length + self.target_length
    }
}

impl Default for HParams {
    fn default() -> Self {
        Self {
            window_length: 96,
            target_length: 48,
            hidden_size:   32,
            lstm_layers:   2,
            bidirectional: false,
            lstm_dropout:  0.25,
            batch_size:    16,
            num_workers:   4,
            learning_rate: 1e-3,
            patience:      2,
            vis_i:         670,
            input_size:    6,
            output_size:   1,
            max_nb_epochs: default_max_nb_epochs(),
            grad_clip:     default_grad_clip(),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialised_key_set_is_exact() {
        let value = serde_json::to_value(HParams::default()).unwrap();
        let mut keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(|k| k.as_str())
            .collect();
        keys.sort_unstable();

        let mut expected = vec![
            "window_length", "target_length", "hidden_size", "lstm_layers",
            "bidirectional", "lstm_dropout", "batch_size", "num_workers",
            "learning_rate", "patience", "vis_i", "input_size", "output_size",
            "max_nb_epochs", "grad_clip",
        ];
        expected.sort_unstable();

        assert_eq!(keys, expected);
    }

    #[test]
    fn test_json_round_trip_preserves_values() {
        let hp = HParams { bidirectional: true, hidden_size: 128, ..HParams::default() };
        let json = serde_json::to_string(&hp).unwrap();
        let back: HParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hp);
    }

    #[test]
    fn test_core_keys_alone_fill_in_training_extras() {
        let json = r#"{
            "window_length": 24, "target_length": 12, "hidden_size": 64,
            "lstm_layers": 3, "bidirectional": true, "lstm_dropout": 0.5,
            "batch_size": 32, "num_workers": 2, "learning_rate": 0.0001,
            "patience": 4, "vis_i": 10, "input_size": 6, "output_size": 1
        }"#;
        let hp: HParams = serde_json::from_str(json).unwrap();
        assert_eq!(hp.hidden_size, 64);
        assert_eq!(hp.lstm_layers, 3);
        assert_eq!(hp.max_nb_epochs, 200);
        assert_eq!(hp.grad_clip, 40.0);

        let again: HParams = serde_json::from_str(&serde_json::to_string(&hp).unwrap()).unwrap();
        assert_eq!(again, hp);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let mut value = serde_json::to_value(HParams::default()).unwrap();
        value["hidden"] = serde_json::json!(8);
        assert!(serde_json::from_value::<HParams>(value).is_err());
    }

    #[test]
    fn test_span_adds_context_and_horizon() {
        let hp = HParams { window_length: 3, target_length: 2, ..HParams::default() };
        assert_eq!(hp.span(), 5);
    }
}
