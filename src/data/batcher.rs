// ============================================================
// Layer 4 — Sequence Batcher
// ============================================================
// Implements Burn's Batcher trait to stack SequenceItems into
// tensors the model can consume.
//
// How batching works here:
//   Input:  Vec of N items, each with T steps of F features
//   Output: inputs  [N, T, F]
//           targets [N, T]
//
//   Every item from one dataset has the same T and F, so the
//   flat buffers are simply concatenated and reshaped.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::data::dataset::SequenceItem;

// ─── SequenceBatch ────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct SequenceBatch<B: Backend> {
    /// shape: [batch_size, steps, features]
    pub inputs: Tensor<B, 3>,
    /// shape: [batch_size, steps]
    pub targets: Tensor<B, 2>,
}

// ─── SequenceBatcher ──────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct SequenceBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> SequenceBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<SequenceItem, SequenceBatch<B>> for SequenceBatcher<B> {
    fn batch(&self, items: Vec<SequenceItem>) -> SequenceBatch<B> {
        let batch_size = items.len();
        let steps      = items[0].steps;
        let features   = items[0].features;

        let mut input_flat  = Vec::with_capacity(batch_size * steps * features);
        let mut target_flat = Vec::with_capacity(batch_size * steps);
        for item in &items {
            assert_eq!(
                item.target.len(),
                steps,
                "one target per step expected; multi-label targets cannot be batched"
            );
            input_flat.extend_from_slice(&item.input);
            target_flat.extend_from_slice(&item.target);
        }

        let inputs = Tensor::<B, 3>::from_data(
            TensorData::new(input_flat, [batch_size, steps, features]),
            &self.device,
        );
        let targets = Tensor::<B, 2>::from_data(
            TensorData::new(target_flat, [batch_size, steps]),
            &self.device,
        );

        SequenceBatch { inputs, targets }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn item(offset: f32) -> SequenceItem {
        SequenceItem {
            input:    (0..6).map(|i| offset + i as f32).collect(),
            target:   vec![offset, offset + 1.0, offset + 2.0],
            steps:    3,
            features: 2,
        }
    }

    #[test]
    fn test_batch_shapes() {
        let batcher = SequenceBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch(vec![item(0.0), item(10.0)]);
        assert_eq!(batch.inputs.dims(), [2, 3, 2]);
        assert_eq!(batch.targets.dims(), [2, 3]);
    }

    #[test]
    fn test_batch_preserves_item_order() {
        let batcher = SequenceBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch(vec![item(0.0), item(10.0)]);
        let targets = batch.targets.into_data().to_vec::<f32>().unwrap();
        assert_eq!(targets, vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
    }
}
