// ============================================================
// Layer 5 — Evaluator
// ============================================================
// The no-gradient half of the training controller. Shared by the
// validation phase of every epoch and by the `test` command:
//
//   eval_steps      — one {"<prefix>_loss": v} record per batch
//   validation_end  — mean of every key, log, finiteness check,
//                     chart for one sample → "<prefix>/image"
//   forecast_window — run the model on a single window and return
//                     truth + prediction for plotting
//
// Models passed in here live on a plain (non-autodiff) backend,
// so dropout is inactive and no graph is recorded.
//
// Reference: Burn Book §5 (Custom Training Loop: validation)

use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use burn::{data::dataloader::DataLoaderBuilder, prelude::*, tensor::TensorData};
use chrono::TimeDelta;

use crate::data::{batcher::SequenceBatcher, dataset::SequenceDataset};
use crate::domain::traits::ExperimentLogger;
use crate::infra::plot::render_forecast;
use crate::ml::model::LstmForecaster;
use crate::ml::trainer::masked_mse;

/// Aggregated result of one evaluation pass
#[derive(Debug, Clone)]
pub struct EvalReport {
    /// Mean of the per-batch `<prefix>_loss` values
    pub avg_loss: f64,
    /// Mean of every key logged by the steps
    pub record:   BTreeMap<String, f64>,
    pub batches:  usize,
}

/// Truth vs prediction for one dataset sample
#[derive(Debug, Clone)]
pub struct Forecast {
    pub index:         usize,
    /// Label column the truth series comes from
    pub label:         String,
    pub truth:         Vec<f32>,
    pub prediction:    Vec<f32>,
    pub window_length: usize,
    /// Time covered by the horizon, when the sample spacing is known
    pub lead_time:     Option<TimeDelta>,
}

pub fn loss_key(prefix: &str) -> String {
    format!("{prefix}_loss")
}

/// Run the validation step over every batch, in order.
pub fn eval_steps<B: Backend>(
    model:      &LstmForecaster<B>,
    dataset:    SequenceDataset,
    batch_size: usize,
    prefix:     &str,
    device:     &B::Device,
) -> Vec<BTreeMap<String, f64>> {
    let window_length = dataset.spec().window_length;
    let key = loss_key(prefix);

    let batcher = SequenceBatcher::<B>::new(device.clone());
    let loader  = DataLoaderBuilder::new(batcher)
        .batch_size(batch_size)
        .build(dataset);

    let mut records = Vec::new();
    for batch in loader.iter() {
        let y_hat = model.forward(batch.inputs);
        let loss  = masked_mse(y_hat, batch.targets, window_length);
        let value: f64 = loss.into_scalar().elem::<f64>();

        let mut record = BTreeMap::new();
        record.insert(key.clone(), value);
        records.push(record);
    }
    records
}

/// Mean of every key across the step records.
/// A key missing from some records is averaged over the ones that have it.
pub fn aggregate(records: &[BTreeMap<String, f64>], prefix: &str) -> EvalReport {
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for record in records {
        for (k, v) in record {
            let e = sums.entry(k.clone()).or_insert((0.0, 0));
            e.0 += v;
            e.1 += 1;
        }
    }
    let record: BTreeMap<String, f64> = sums
        .into_iter()
        .map(|(k, (sum, n))| (k, sum / n as f64))
        .collect();
    let avg_loss = record.get(&loss_key(prefix)).copied().unwrap_or(f64::NAN);

    EvalReport { avg_loss, record, batches: records.len() }
}

/// Close an evaluation pass: aggregate, report, check, visualise.
///
/// # Panics
/// If the aggregated loss is not finite. Training cannot meaningfully
/// continue from a diverged model.
#[allow(clippy::too_many_arguments)]
pub fn validation_end<B: Backend>(
    model:   &LstmForecaster<B>,
    dataset: &SequenceDataset,
    records: &[BTreeMap<String, f64>],
    prefix:  &str,
    step:    usize,
    vis_i:   usize,
    logger:  &mut dyn ExperimentLogger,
    device:  &B::Device,
) -> Result<EvalReport> {
    let report = aggregate(records, prefix);

    tracing::info!("step {}, {:?}", step, report.record);
    logger.log_metrics(step, &report.record)?;

    assert!(
        report.avg_loss.is_finite(),
        "{} is not finite at step {step}: {}",
        loss_key(prefix),
        report.avg_loss
    );

    if vis_i > 0 && !dataset.is_empty() {
        let idx      = vis_i.min(dataset.len() - 1);
        let forecast = forecast_window(model, dataset, idx, device)?;
        match forecast.lead_time {
            Some(lead) => tracing::info!(
                "{prefix}/image: {} for sample {}, predicting {} min ahead",
                forecast.label, forecast.index, lead.num_minutes()
            ),
            None => tracing::info!("{prefix}/image: {} for sample {}", forecast.label, forecast.index),
        }
        let jpeg = render_forecast(&forecast.truth, &forecast.prediction, forecast.window_length)?;
        logger.log_image(&format!("{prefix}/image"), step, &jpeg)?;
    }

    Ok(report)
}

/// Predict one sample. Truth is the first label column of the target
/// window; prediction covers every step, context included.
pub fn forecast_window<B: Backend>(
    model:   &LstmForecaster<B>,
    dataset: &SequenceDataset,
    idx:     usize,
    device:  &B::Device,
) -> Result<Forecast> {
    let rows = dataset.window(idx);
    let item = dataset.item(idx);
    let steps = item.steps;

    let input = Tensor::<B, 3>::from_data(
        TensorData::new(item.input, [1, steps, item.features]),
        device,
    );
    let prediction = prediction_values(model.forward(input).into_data())
        .with_context(|| format!("Cannot read the forecast for sample {idx}"))?;

    let truth: Vec<f32> = rows.y.iter().map(|labels| labels[0]).collect();

    let spec = dataset.spec();
    let lead_time = match rows.y_timestamps.as_slice() {
        [a, b, ..] => Some((*b - *a) * spec.target_length as i32),
        _ => None,
    };

    let label = rows.label_columns.first().cloned().unwrap_or_default();

    Ok(Forecast {
        index: idx,
        label,
        truth,
        prediction,
        window_length: spec.window_length,
        lead_time,
    })
}

fn prediction_values(data: TensorData) -> Result<Vec<f32>> {
    data.to_vec::<f32>()
        .map_err(|e| anyhow!("model output is not f32: {e:?}"))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use burn::backend::NdArray;
    use chrono::{Duration, NaiveDate};

    use crate::data::dataset::WindowSpec;
    use crate::domain::table::SeriesTable;
    use crate::infra::metrics::MemoryLogger;
    use crate::ml::model::ForecasterConfig;

    type TestBackend = NdArray<f32>;

    fn dataset(rows: usize, w: usize, t: usize) -> SequenceDataset {
        let start = NaiveDate::from_ymd_opt(2013, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let ts = (0..rows).map(|i| start + Duration::minutes(30 * i as i64)).collect();
        let values = (0..rows).flat_map(|i| [(i as f32 * 0.2).sin(), 1.0]).collect();
        let table = SeriesTable::new("tstp", vec!["energy".into(), "temp".into()], ts, values).unwrap();
        SequenceDataset::new(Arc::new(table), WindowSpec::new(w, t), &["energy".to_string()]).unwrap()
    }

    fn model() -> LstmForecaster<TestBackend> {
        ForecasterConfig::new(3, 4, 1, false, 0.0).init(&Default::default())
    }

    #[test]
    fn test_aggregate_means_each_key() {
        let mk = |v: f64| BTreeMap::from([("val_loss".to_string(), v)]);
        let report = aggregate(&[mk(1.0), mk(2.0), mk(6.0)], "val");
        assert_eq!(report.batches, 3);
        assert!((report.avg_loss - 3.0).abs() < 1e-12);
        assert!((report.record["val_loss"] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_aggregate_of_nothing_is_nan() {
        assert!(aggregate(&[], "val").avg_loss.is_nan());
    }

    #[test]
    fn test_eval_steps_one_record_per_batch() {
        let ds = dataset(20, 4, 2); // 13 samples
        let records = eval_steps(&model(), ds, 5, "val", &Default::default());
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r["val_loss"].is_finite()));
    }

    #[test]
    fn test_forecast_window_lengths_and_lead_time() {
        let ds = dataset(20, 4, 2);
        let f = forecast_window(&model(), &ds, 3, &Default::default()).unwrap();
        assert_eq!(f.index, 3);
        assert_eq!(f.label, "energy");
        assert_eq!(f.truth.len(), 6);
        assert_eq!(f.prediction.len(), 6);
        assert_eq!(f.window_length, 4);
        // two half-hour steps ahead
        assert_eq!(f.lead_time, Some(Duration::minutes(60)));
    }

    #[test]
    fn test_unreadable_model_output_is_an_error() {
        let data = TensorData::new(vec![1.0f64, 2.0], [1, 2]);
        let err = prediction_values(data).unwrap_err();
        assert!(err.to_string().contains("not f32"));
    }

    #[test]
    fn test_validation_end_logs_scalars_and_image() {
        let ds = dataset(20, 4, 2);
        let device = Default::default();
        let m = model();
        let records = eval_steps(&m, ds.clone(), 8, "val", &device);
        let mut logger = MemoryLogger::default();

        // vis_i beyond the dataset clamps to the last sample
        validation_end(&m, &ds, &records, "val", 7, 670, &mut logger, &device).unwrap();

        assert_eq!(logger.values("val_loss").len(), 1);
        assert_eq!(logger.images.len(), 1);
        assert_eq!(logger.images[0].0, "val/image");
        assert_eq!(logger.images[0].1, 7);
    }

    #[test]
    fn test_vis_i_zero_disables_plotting() {
        let ds = dataset(20, 4, 2);
        let device = Default::default();
        let m = model();
        let records = eval_steps(&m, ds.clone(), 8, "test", &device);
        let mut logger = MemoryLogger::default();
        validation_end(&m, &ds, &records, "test", 0, 0, &mut logger, &device).unwrap();
        assert!(logger.images.is_empty());
        assert_eq!(logger.values("test_loss").len(), 1);
    }

    #[test]
    #[should_panic(expected = "not finite")]
    fn test_non_finite_loss_is_fatal() {
        let ds = dataset(20, 4, 2);
        let records = vec![BTreeMap::from([("val_loss".to_string(), f64::NAN)])];
        let mut logger = MemoryLogger::default();
        let _ = validation_end(&model(), &ds, &records, "val", 1, 0, &mut logger, &Default::default());
    }
}
