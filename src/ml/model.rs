use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig, Lstm, LstmConfig},
    prelude::*,
};

use crate::domain::hparams::HParams;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
// Deriving them again gives conflicting impls.
#[derive(Config, Debug)]
pub struct ForecasterConfig {
    pub input_size:    usize,
    pub hidden_size:   usize,
    pub lstm_layers:   usize,
    pub bidirectional: bool,
    pub lstm_dropout:  f64,
}

impl ForecasterConfig {
    pub fn from_hparams(hp: &HParams) -> Self {
        Self::new(hp.input_size, hp.hidden_size, hp.lstm_layers, hp.bidirectional, hp.lstm_dropout)
    }

    pub fn directions(&self) -> usize {
        if self.bidirectional { 2 } else { 1 }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> LstmForecaster<B> {
        if self.lstm_layers == 1 && self.lstm_dropout > 0.0 {
            tracing::warn!(
                "lstm_dropout={} has no effect with a single recurrent layer",
                self.lstm_dropout
            );
        }
        let layer_out = self.hidden_size * self.directions();
        let layers = (0..self.lstm_layers)
            .map(|l| {
                let d_input = if l == 0 { self.input_size } else { layer_out };
                self.build_layer(d_input, device)
            })
            .collect();
        let dropout = DropoutConfig::new(self.lstm_dropout).init();
        let head    = LinearConfig::new(layer_out, 1).init(device);
        LstmForecaster { layers, dropout, head }
    }

    fn build_layer<B: Backend>(&self, d_input: usize, device: &B::Device) -> RecurrentLayer<B> {
        let forward_lstm  = LstmConfig::new(d_input, self.hidden_size, true).init(device);
        let backward_lstm = self
            .bidirectional
            .then(|| LstmConfig::new(d_input, self.hidden_size, true).init(device));
        RecurrentLayer { forward_lstm, backward_lstm }
    }
}

/// One recurrent layer; the optional second LSTM reads the sequence
/// back to front.
#[derive(Module, Debug)]
pub struct RecurrentLayer<B: Backend> {
    pub forward_lstm:  Lstm<B>,
    pub backward_lstm: Option<Lstm<B>>,
}

impl<B: Backend> RecurrentLayer<B> {
    /// [batch, time, d_input] → [batch, time, hidden * directions]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let (fwd, _) = self.forward_lstm.forward(x.clone(), None);
        match &self.backward_lstm {
            None => fwd,
            Some(lstm) => {
                let (bwd, _) = lstm.forward(x.flip([1]), None);
                // Re-align the reversed outputs with forward time before joining
                Tensor::cat(vec![fwd, bwd.flip([1])], 2)
            }
        }
    }
}

#[derive(Module, Debug)]
pub struct LstmForecaster<B: Backend> {
    pub layers:  Vec<RecurrentLayer<B>>,
    pub dropout: Dropout,
    pub head:    Linear<B>,
}

impl<B: Backend> LstmForecaster<B> {
    /// x: [batch, time, features] → one prediction per step: [batch, time]
    ///
    /// Recurrent state starts from zero on every call.
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let n_layers = self.layers.len();
        let mut h = x;
        for (l, layer) in self.layers.iter().enumerate() {
            h = layer.forward(h);
            // Dropout sits between layers only, never after the last one
            if l + 1 < n_layers {
                h = self.dropout.forward(h);
            }
        }

        let [batch_size, steps, _] = h.dims();
        self.head.forward(h).reshape([batch_size, steps])
    }
}
