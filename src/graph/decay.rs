// Time-decayed interaction weights.
//
// Each interaction contributes `base * 2^(-elapsed / half_life)`: a reply sent
// immediately is worth the full base weight, one sent a half-life later is
// worth half. The half-life is estimated per kind as the median response
// time observed in the window, so a slow group chat isn't penalised
// relative to a fast one.
//
// With fewer than two samples (or a median of zero) there is nothing
// sensible to estimate, and the configured default is used instead. The
// default itself must be positive and finite, or every weight would be NaN.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::interactions::{Extraction, Interaction, InteractionKind};
use crate::error::PipelineError;

/// Fallback half-life: one hour.
pub const DEFAULT_HALF_LIFE_SECS: f64 = 3600.0;

/// Fewer samples than this and the median isn't trusted.
pub const MIN_HALF_LIFE_SAMPLES: usize = 2;

/// The half-life used for one interaction kind, and where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HalfLife {
    pub seconds: f64,
    /// Number of instances the estimate was drawn from
    pub samples: usize,
    /// True when `seconds` is the configured default rather than a median
    pub fallback: bool,
}

impl HalfLife {
    /// Median of the observed elapsed times, or `default_secs` if that isn't
    /// a usable positive number.
    ///
    /// Fails with `InvalidHalfLife` when `default_secs` is zero, negative or
    /// not finite, whether or not the fallback would have been needed.
    pub fn estimate(elapsed_secs: &[f64], default_secs: f64) -> Result<Self, PipelineError> {
        let default_secs = check_half_life(default_secs)?;
        let samples = elapsed_secs.len();
        let fallback = HalfLife {
            seconds: default_secs,
            samples,
            fallback: true,
        };

        if samples < MIN_HALF_LIFE_SAMPLES {
            return Ok(fallback);
        }

        Ok(match median(elapsed_secs) {
            Some(m) if m.is_finite() && m > 0.0 => HalfLife {
                seconds: m,
                samples,
                fallback: false,
            },
            _ => fallback,
        })
    }
}

/// Pass a half-life through if it is positive and finite.
pub fn check_half_life(seconds: f64) -> Result<f64, PipelineError> {
    if seconds.is_finite() && seconds > 0.0 {
        Ok(seconds)
    } else {
        Err(PipelineError::InvalidHalfLife { seconds })
    }
}

/// Median of a set of values; mean of the middle pair for even lengths.
/// NaNs are ignored.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Exponential decay: `base * 2^(-elapsed / half_life)`.
///
/// Negative (or NaN) elapsed times are treated as zero, so the result never
/// exceeds `base`. `half_life_secs` must be positive and finite; `HalfLife`
/// guarantees that for every value it produces.
pub fn decay_weight(base: f64, elapsed_secs: f64, half_life_secs: f64) -> f64 {
    let elapsed = elapsed_secs.max(0.0);
    base * (-elapsed / half_life_secs).exp2()
}

/// An interaction with its decayed weight attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedInteraction {
    #[serde(flatten)]
    pub interaction: Interaction,
    pub weight: f64,
}

/// Estimate a half-life per kind from the extraction.
pub fn estimate_half_lives(
    extraction: &Extraction,
    default_secs: f64,
) -> Result<BTreeMap<InteractionKind, HalfLife>, PipelineError> {
    InteractionKind::ALL
        .iter()
        .map(|&kind| {
            let elapsed: Vec<f64> = extraction
                .of_kind(kind)
                .iter()
                .map(|i| i.elapsed_secs)
                .collect();
            let half_life = HalfLife::estimate(&elapsed, default_secs)?;

            if half_life.fallback && half_life.samples > 0 {
                warn!(
                    kind = kind.as_str(),
                    samples = half_life.samples,
                    default_secs,
                    "Too little data to estimate a half-life; using the default"
                );
            } else if !half_life.fallback {
                info!(
                    kind = kind.as_str(),
                    samples = half_life.samples,
                    half_life_secs = half_life.seconds,
                    "Half-life estimated"
                );
            }

            Ok((kind, half_life))
        })
        .collect()
}

/// Attach a decayed weight to every interaction of every kind.
///
/// A kind missing from `half_lives` decays with `DEFAULT_HALF_LIFE_SECS`.
pub fn weigh(
    extraction: &Extraction,
    half_lives: &BTreeMap<InteractionKind, HalfLife>,
) -> Vec<WeightedInteraction> {
    extraction
        .all()
        .map(|interaction| {
            let half_life = half_lives
                .get(&interaction.kind)
                .map_or(DEFAULT_HALF_LIFE_SECS, |h| h.seconds);
            WeightedInteraction {
                weight: decay_weight(
                    interaction.kind.base_weight(),
                    interaction.elapsed_secs,
                    half_life,
                ),
                interaction: interaction.clone(),
            }
        })
        .collect()
}
