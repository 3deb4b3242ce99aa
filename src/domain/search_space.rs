// ============================================================
// Layer 3 — Hyperparameter Suggestion Policy
// ============================================================
// Declares what an automated tuner may vary and what stays fixed.
//
//   SearchSpace::lstm()    — the tunable ranges
//   OperationalDefaults    — batch size, workers, epoch cap, ...
//   Trial                  — the seam to a search library
//   add_suggest()          — suggested values + defaults → HParams
//
// Two Trial implementations ship with the crate:
//   RandomTrial — independent random sampling (used by `tune`)
//   FixedTrial  — replays a known parameter map
//
// Reference: Bergstra & Bengio (2012) Random Search for
//            Hyper-Parameter Optimization

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::hparams::HParams;

// ─── Values and distributions ─────────────────────────────────────────────────
/// A single suggested value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl ParamValue {
    pub fn as_f64(&self, name: &str) -> Result<f64> {
        match *self {
            ParamValue::Float(v) => Ok(v),
            ParamValue::Int(v)   => Ok(v as f64),
            ParamValue::Bool(_)  => Err(anyhow!("parameter '{name}' is a bool, expected a number")),
        }
    }

    pub fn as_usize(&self, name: &str) -> Result<usize> {
        match *self {
            ParamValue::Int(v) if v >= 0 => Ok(v as usize),
            other => Err(anyhow!("parameter '{name}' = {other:?} is not a non-negative integer")),
        }
    }

    pub fn as_bool(&self, name: &str) -> Result<bool> {
        match *self {
            ParamValue::Bool(v) => Ok(v),
            other => Err(anyhow!("parameter '{name}' = {other:?} is not a bool")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Distribution {
    /// Sampled uniformly in log space over [low, high]
    LogUniform { low: f64, high: f64 },
    /// Sampled uniformly over [low, high]
    Uniform { low: f64, high: f64 },
    /// One of a fixed set of choices
    Categorical(Vec<ParamValue>),
}

impl Distribution {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamValue {
        match self {
            Distribution::LogUniform { low, high } => {
                let v = rng.gen_range(low.ln()..=high.ln()).exp();
                ParamValue::Float(v.clamp(*low, *high))
            }
            Distribution::Uniform { low, high } => ParamValue::Float(rng.gen_range(*low..=*high)),
            Distribution::Categorical(choices) => choices[rng.gen_range(0..choices.len())],
        }
    }

    /// Whether `value` could have been drawn from this distribution
    pub fn contains(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (Distribution::LogUniform { low, high }, v) | (Distribution::Uniform { low, high }, v) => {
                match v.as_f64("") {
                    Ok(x) => x >= *low && x <= *high,
                    Err(_) => false,
                }
            }
            (Distribution::Categorical(choices), v) => choices.contains(v),
        }
    }
}

// ─── SearchSpace ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct SearchSpace {
    pub params: Vec<(&'static str, Distribution)>,
}

impl SearchSpace {
    /// The joint search space for the LSTM forecaster.
    pub fn lstm() -> Self {
        let ints = |xs: &[i64]| xs.iter().map(|&x| ParamValue::Int(x)).collect::<Vec<_>>();
        Self {
            params: vec![
                ("learning_rate", Distribution::LogUniform { low: 1e-6, high: 1e-2 }),
                ("lstm_dropout",  Distribution::Uniform    { low: 0.0,  high: 0.75 }),
                ("hidden_size",   Distribution::Categorical(ints(&[1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1024]))),
                ("lstm_layers",   Distribution::Categorical(ints(&[1, 2, 3, 4, 6, 8]))),
                ("bidirectional", Distribution::Categorical(vec![ParamValue::Bool(false), ParamValue::Bool(true)])),
            ],
        }
    }

    pub fn get(&self, name: &str) -> Option<&Distribution> {
        self.params.iter().find(|(n, _)| *n == name).map(|(_, d)| d)
    }
}

// ─── OperationalDefaults ──────────────────────────────────────────────────────
/// Values every trial shares. Not tuned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationalDefaults {
    pub window_length: usize,
    pub target_length: usize,
    pub batch_size:    usize,
    pub grad_clip:     f64,
    pub max_nb_epochs: usize,
    pub num_workers:   usize,
    pub vis_i:         usize,
    pub input_size:    usize,
    pub output_size:   usize,
    pub patience:      usize,
}

impl Default for OperationalDefaults {
    fn default() -> Self {
        let hp = HParams::default();
        Self {
            window_length: hp.window_length,
            target_length: hp.target_length,
            batch_size:    16,
            grad_clip:     40.0,
            max_nb_epochs: 200,
            num_workers:   4,
            vis_i:         670,
            input_size:    6,
            output_size:   1,
            patience:      2,
        }
    }
}

impl From<&HParams> for OperationalDefaults {
    /// Keep every non-tuned value of an existing hyperparameter set
    fn from(hp: &HParams) -> Self {
        Self {
            window_length: hp.window_length,
            target_length: hp.target_length,
            batch_size:    hp.batch_size,
            grad_clip:     hp.grad_clip,
            max_nb_epochs: hp.max_nb_epochs,
            num_workers:   hp.num_workers,
            vis_i:         hp.vis_i,
            input_size:    hp.input_size,
            output_size:   hp.output_size,
            patience:      hp.patience,
        }
    }
}

// ─── Trial ────────────────────────────────────────────────────────────────────
/// One point in the search space, as chosen by some search strategy.
pub trait Trial {
    /// Produce a value for `name` and record it on the trial.
    fn suggest(&mut self, name: &str, dist: &Distribution) -> Result<ParamValue>;

    /// Every value suggested so far.
    fn params(&self) -> &BTreeMap<String, ParamValue>;
}

/// Independent random sampling from each distribution.
pub struct RandomTrial<R: Rng> {
    rng:    R,
    params: BTreeMap<String, ParamValue>,
}

impl<R: Rng> RandomTrial<R> {
    pub fn new(rng: R) -> Self {
        Self { rng, params: BTreeMap::new() }
    }

    /// Hand the RNG back so the next trial continues the same stream
    pub fn into_rng(self) -> R {
        self.rng
    }
}

impl<R: Rng> Trial for RandomTrial<R> {
    fn suggest(&mut self, name: &str, dist: &Distribution) -> Result<ParamValue> {
        let v = dist.sample(&mut self.rng);
        self.params.insert(name.to_string(), v);
        Ok(v)
    }

    fn params(&self) -> &BTreeMap<String, ParamValue> {
        &self.params
    }
}

/// Replays a fixed parameter map. Suggesting a name that is not in the
/// map is an error.
pub struct FixedTrial {
    params: BTreeMap<String, ParamValue>,
}

impl FixedTrial {
    pub fn new(params: BTreeMap<String, ParamValue>) -> Self {
        Self { params }
    }
}

impl Trial for FixedTrial {
    fn suggest(&mut self, name: &str, dist: &Distribution) -> Result<ParamValue> {
        let Some(v) = self.params.get(name).copied() else {
            bail!("FixedTrial has no value for parameter '{name}'");
        };
        if !dist.contains(&v) {
            tracing::warn!("Fixed value {:?} for '{}' lies outside {:?}", v, name, dist);
        }
        Ok(v)
    }

    fn params(&self) -> &BTreeMap<String, ParamValue> {
        &self.params
    }
}

// ─── add_suggest ──────────────────────────────────────────────────────────────
/// Draw every tunable parameter from `trial` and merge with `defaults`.
pub fn add_suggest(trial: &mut dyn Trial, defaults: &OperationalDefaults) -> Result<HParams> {
    let space = SearchSpace::lstm();
    let mut pick = |name: &'static str| -> Result<ParamValue> {
        let dist = space
            .get(name)
            .ok_or_else(|| anyhow!("'{name}' is not part of the search space"))?;
        trial.suggest(name, dist)
    };

    let learning_rate = pick("learning_rate")?.as_f64("learning_rate")?;
    let lstm_dropout  = pick("lstm_dropout")?.as_f64("lstm_dropout")?;
    let hidden_size   = pick("hidden_size")?.as_usize("hidden_size")?;
    let lstm_layers   = pick("lstm_layers")?.as_usize("lstm_layers")?;
    let bidirectional = pick("bidirectional")?.as_bool("bidirectional")?;

    Ok(HParams {
        window_length: defaults.window_length,
        target_length: defaults.target_length,
        hidden_size,
        lstm_layers,
        bidirectional,
        lstm_dropout,
        batch_size:    defaults.batch_size,
        num_workers:   defaults.num_workers,
        learning_rate,
        patience:      defaults.patience,
        vis_i:         defaults.vis_i,
        input_size:    defaults.input_size,
        output_size:   defaults.output_size,
        max_nb_epochs: defaults.max_nb_epochs,
        grad_clip:     defaults.grad_clip,
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_random_suggestions_stay_in_range() {
        let space = SearchSpace::lstm();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let mut trial = RandomTrial::new(&mut rng);
            let hp = add_suggest(&mut trial, &OperationalDefaults::default()).unwrap();

            assert!(hp.learning_rate >= 1e-6 && hp.learning_rate <= 1e-2);
            assert!(hp.lstm_dropout >= 0.0 && hp.lstm_dropout <= 0.75);
            for (name, dist) in &space.params {
                assert!(dist.contains(&trial.params()[*name]), "{name} out of range");
            }
        }
    }

    #[test]
    fn test_fixed_trial_replays_values() {
        let params = BTreeMap::from([
            ("learning_rate".to_string(), ParamValue::Float(1e-3)),
            ("lstm_dropout".to_string(),  ParamValue::Float(0.1)),
            ("hidden_size".to_string(),   ParamValue::Int(128)),
            ("lstm_layers".to_string(),   ParamValue::Int(3)),
            ("bidirectional".to_string(), ParamValue::Bool(true)),
        ]);
        let mut trial = FixedTrial::new(params);
        let hp = add_suggest(&mut trial, &OperationalDefaults::default()).unwrap();

        assert_eq!(hp.hidden_size, 128);
        assert_eq!(hp.lstm_layers, 3);
        assert!(hp.bidirectional);
        assert_eq!(hp.batch_size, 16);
        assert_eq!(hp.vis_i, 670);
        assert_eq!(hp.patience, 2);
    }

    #[test]
    fn test_fixed_trial_reports_missing_parameter() {
        let params = BTreeMap::from([("learning_rate".to_string(), ParamValue::Float(1e-3))]);
        let mut trial = FixedTrial::new(params);
        let err = add_suggest(&mut trial, &OperationalDefaults::default()).unwrap_err();
        assert!(err.to_string().contains("lstm_dropout"));
    }

    #[test]
    fn test_param_value_conversions() {
        assert_eq!(ParamValue::Int(4).as_usize("x").unwrap(), 4);
        assert_eq!(ParamValue::Int(4).as_f64("x").unwrap(), 4.0);
        assert!(ParamValue::Int(-1).as_usize("x").is_err());
        assert!(ParamValue::Float(0.5).as_bool("x").is_err());
    }

    #[test]
    fn test_untagged_json_values() {
        let v: ParamValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, ParamValue::Bool(true));
        let v: ParamValue = serde_json::from_str("64").unwrap();
        assert_eq!(v, ParamValue::Int(64));
        let v: ParamValue = serde_json::from_str("0.25").unwrap();
        assert_eq!(v, ParamValue::Float(0.25));
    }

    #[test]
    fn test_defaults_from_existing_hparams() {
        let base = HParams { window_length: 8, target_length: 3, batch_size: 2, ..HParams::default() };
        let mut trial = RandomTrial::new(StdRng::seed_from_u64(1));
        let hp = add_suggest(&mut trial, &OperationalDefaults::from(&base)).unwrap();
        assert_eq!(hp.window_length, 8);
        assert_eq!(hp.target_length, 3);
        assert_eq!(hp.batch_size, 2);
    }
}
