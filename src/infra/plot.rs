// ============================================================
// Layer 6 — Forecast Chart Rendering
// ============================================================
// Draws ground truth against the model's prediction for one
// window and encodes the result as JPEG bytes, ready to hand to
// an ExperimentLogger.
//
//   value
//     │      truth ───── (whole window, context + horizon)
//     │   prediction ─── (from window_length onwards)
//     │               ┆
//     └───────────────┆──────────────── step
//               window_length
//
// The y-axis is fitted to the truth series only; predictions that
// leave that band are clamped to its edge.
//
// No text is drawn, so no font backend is needed. Titles travel
// through the logs instead.
//
// Reference: plotters BitMapBackend::with_buffer

use anyhow::{anyhow, bail, Result};
use image::{codecs::jpeg::JpegEncoder, ExtendedColorType};
use plotters::prelude::*;

pub const CHART_WIDTH:  u32 = 640;
pub const CHART_HEIGHT: u32 = 480;
const JPEG_QUALITY: u8 = 85;

const TRUTH_COLOR:    RGBColor = RGBColor(31, 119, 180);
const PREDICT_COLOR:  RGBColor = RGBColor(255, 127, 14);
const BOUNDARY_COLOR: RGBColor = RGBColor(160, 160, 160);

/// Render truth vs prediction and return an encoded JPEG.
///
/// `truth` and `prediction` must have the same length; only
/// `prediction[window_length..]` is drawn.
pub fn render_forecast(truth: &[f32], prediction: &[f32], window_length: usize) -> Result<Vec<u8>> {
    if truth.is_empty() {
        bail!("cannot plot an empty series");
    }
    if truth.len() != prediction.len() {
        bail!(
            "truth and prediction lengths differ: {} vs {}",
            truth.len(),
            prediction.len()
        );
    }

    let (lo, hi) = truth
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let pad  = ((hi - lo) * 0.05).max(1e-3);
    let y_lo = lo - pad;
    let y_hi = hi + pad;
    let x_hi = truth.len().saturating_sub(1).max(1);

    let mut rgb = vec![0u8; (CHART_WIDTH * CHART_HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut rgb, (CHART_WIDTH, CHART_HEIGHT))
            .into_drawing_area();
        root.fill(&WHITE).map_err(|e| anyhow!("chart fill failed: {e}"))?;

        let mut chart = ChartBuilder::on(&root)
            .margin(16)
            .build_cartesian_2d(0..x_hi, y_lo..y_hi)
            .map_err(|e| anyhow!("chart layout failed: {e}"))?;

        if window_length > 0 && window_length < truth.len() {
            chart
                .draw_series(LineSeries::new(
                    [(window_length, y_lo), (window_length, y_hi)],
                    &BOUNDARY_COLOR,
                ))
                .map_err(|e| anyhow!("boundary draw failed: {e}"))?;
        }

        chart
            .draw_series(LineSeries::new(
                truth.iter().enumerate().map(|(i, &v)| (i, v)),
                TRUTH_COLOR.stroke_width(2),
            ))
            .map_err(|e| anyhow!("truth draw failed: {e}"))?;

        chart
            .draw_series(LineSeries::new(
                prediction
                    .iter()
                    .enumerate()
                    .skip(window_length)
                    .map(|(i, &v)| (i, v.clamp(y_lo, y_hi))),
                PREDICT_COLOR.stroke_width(2),
            ))
            .map_err(|e| anyhow!("prediction draw failed: {e}"))?;

        root.present().map_err(|e| anyhow!("chart render failed: {e}"))?;
    }

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode(&rgb, CHART_WIDTH, CHART_HEIGHT, ExtendedColorType::Rgb8)
        .map_err(|e| anyhow!("JPEG encoding failed: {e}"))?;

    tracing::debug!("Rendered forecast chart ({} bytes)", jpeg.len());
    Ok(jpeg)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_is_jpeg() {
        let truth: Vec<f32> = (0..20).map(|i| (i as f32 * 0.3).sin()).collect();
        let pred:  Vec<f32> = truth.iter().map(|v| v * 0.9).collect();
        let jpeg = render_forecast(&truth, &pred, 10).unwrap();
        // JPEG start-of-image marker
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_flat_series_still_renders() {
        let truth = vec![0.5f32; 8];
        let pred  = vec![10.0f32; 8];
        assert!(render_forecast(&truth, &pred, 4).is_ok());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(render_forecast(&[], &[], 0).is_err());
        assert!(render_forecast(&[1.0, 2.0], &[1.0], 1).is_err());
    }
}
