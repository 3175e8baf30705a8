//! Target-size search engine.
//!
//! Given a target byte count and an integer setting domain (quality or DPI),
//! binary-searches for the setting whose encoded size lands inside the
//! tolerance band around the target:
//!
//! ```text
//! [target × (1 − tolerance), target × (1 + tolerance)]
//! ```
//!
//! The engine never touches a codec directly. Callers hand it a `measure`
//! closure that encodes at a setting and returns the byte length, which keeps
//! the search a pure function of its inputs plus that closure. The
//! [`imaging::operations`](crate::imaging::operations) module wires it to real
//! codecs; tests drive it with synthetic size curves.
//!
//! ## Assumptions
//!
//! Binary search is only valid if encoded size is non-decreasing in the
//! setting. This is not verified. Every trial is kept and the closest one is
//! tracked across the whole run, so a codec that breaks monotonicity still
//! produces a sane fallback instead of an arbitrary last probe.
//!
//! ## Termination
//!
//! The loop runs while `low <= high`, capped at `⌈log2(N)⌉ + 2` probes for a
//! domain of `N` settings. A plain binary search needs at most
//! `⌊log2(N)⌋ + 1`, so the cap only matters for a misbehaving `measure`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tolerance used when the caller does not specify one.
pub const DEFAULT_TOLERANCE: f64 = 0.05;

/// Probes allowed beyond `⌈log2(N)⌉`.
const EXTRA_PROBES: u32 = 2;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid target: {0}")]
    InvalidTarget(String),
    #[error("Invalid domain [{min}, {max}]: min must be below max")]
    InvalidDomain { min: u32, max: u32 },
    #[error("Codec failed at setting {setting}: {source}")]
    Codec {
        setting: u32,
        #[source]
        source: crate::imaging::CodecError,
    },
}

/// Desired output size plus the fractional band still counted as a hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SizeTarget {
    bytes: u64,
    tolerance: f64,
}

impl SizeTarget {
    /// Rejects `bytes == 0` and tolerances outside `(0, 1]`.
    pub fn new(bytes: u64, tolerance: f64) -> Result<Self, SearchError> {
        if bytes == 0 {
            return Err(SearchError::InvalidTarget(
                "target size must be at least 1 byte".into(),
            ));
        }
        if !(tolerance > 0.0 && tolerance <= 1.0) {
            return Err(SearchError::InvalidTarget(format!(
                "tolerance must be in (0, 1], got {tolerance}"
            )));
        }
        Ok(Self { bytes, tolerance })
    }

    pub fn with_default_tolerance(bytes: u64) -> Result<Self, SearchError> {
        Self::new(bytes, DEFAULT_TOLERANCE)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn lower_bound(&self) -> f64 {
        self.bytes as f64 * (1.0 - self.tolerance)
    }

    pub fn upper_bound(&self) -> f64 {
        self.bytes as f64 * (1.0 + self.tolerance)
    }

    /// Whether `bytes` falls inside the tolerance band (inclusive).
    pub fn accepts(&self, bytes: u64) -> bool {
        let size = bytes as f64;
        size >= self.lower_bound() && size <= self.upper_bound()
    }

    /// Absolute distance from the target in bytes.
    pub fn distance(&self, bytes: u64) -> u64 {
        bytes.abs_diff(self.bytes)
    }
}

/// Inclusive integer range of settings, `min < max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingDomain {
    min: u32,
    max: u32,
}

/// Lossy-compression quality range for one codec.
pub type QualityDomain = SettingDomain;
/// Resolution range searched in auto-DPI mode.
pub type DpiDomain = SettingDomain;

impl SettingDomain {
    pub fn new(min: u32, max: u32) -> Result<Self, SearchError> {
        if min >= max {
            return Err(SearchError::InvalidDomain { min, max });
        }
        Ok(Self { min, max })
    }

    /// Constructor for built-in constant ranges, checked in debug builds only.
    pub(crate) const fn from_bounds(min: u32, max: u32) -> Self {
        debug_assert!(min < max, "setting domain needs min < max");
        Self { min, max }
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Number of settings in the domain.
    pub fn len(&self) -> u32 {
        self.max - self.min + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, setting: u32) -> bool {
        (self.min..=self.max).contains(&setting)
    }

    /// Maximum number of probes a search over this domain may make.
    pub fn probe_cap(&self) -> u32 {
        ceil_log2(self.len()) + EXTRA_PROBES
    }
}

fn ceil_log2(n: u32) -> u32 {
    if n <= 1 {
        0
    } else {
        u32::BITS - (n - 1).leading_zeros()
    }
}

/// One encode attempt at a specific setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EncodeTrial {
    pub setting: u32,
    pub result_bytes: u64,
    pub within_tolerance: bool,
}

/// Everything a search hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    /// Setting to encode the final output with.
    pub final_setting: u32,
    /// Size produced by `final_setting`.
    pub final_bytes: u64,
    /// `true` when at least one trial landed inside the tolerance band.
    pub succeeded: bool,
    pub trials_used: u32,
    /// Trial with the smallest distance to the target across the whole run.
    pub best_trial: EncodeTrial,
    /// Every trial, in probe order.
    pub trials: Vec<EncodeTrial>,
}

/// Binary-search `domain` for a setting whose measured size fits `target`.
///
/// `measure` encodes at a setting and returns the resulting byte count. Its
/// first error aborts the search; no partial trial becomes a result.
///
/// Within-tolerance trials push the search toward higher settings so the
/// highest fitting setting wins. When nothing fits, the trial closest to the
/// target is returned with `succeeded = false`. Ties on distance go to the
/// lower setting.
pub fn search_setting<F, E>(
    domain: SettingDomain,
    target: &SizeTarget,
    mut measure: F,
) -> Result<SearchOutcome, E>
where
    F: FnMut(u32) -> Result<u64, E>,
{
    let cap = domain.probe_cap() as usize;
    let mut low = i64::from(domain.min());
    let mut high = i64::from(domain.max());
    let mut trials: Vec<EncodeTrial> = Vec::with_capacity(cap);
    let mut best_fit: Option<EncodeTrial> = None;

    let mut measure_at = |setting: u32| -> Result<EncodeTrial, E> {
        let result_bytes = measure(setting)?;
        Ok(EncodeTrial {
            setting,
            result_bytes,
            within_tolerance: target.accepts(result_bytes),
        })
    };
    let closeness = |t: &EncodeTrial| (target.distance(t.result_bytes), t.setting);

    // `low <= high` holds on entry, so the midpoint is always measured once.
    let mut trial = measure_at(((low + high) / 2) as u32)?;
    let mut best_trial = trial;
    loop {
        trials.push(trial);
        if closeness(&trial) < closeness(&best_trial) {
            best_trial = trial;
        }

        let mid = i64::from(trial.setting);
        if trial.within_tolerance {
            if best_fit.is_none_or(|fit| trial.setting > fit.setting) {
                best_fit = Some(trial);
            }
            low = mid + 1;
        } else if trial.result_bytes > target.bytes() {
            high = mid - 1;
        } else {
            low = mid + 1;
        }

        if low > high || trials.len() >= cap {
            break;
        }
        trial = measure_at(((low + high) / 2) as u32)?;
    }

    let chosen = best_fit.unwrap_or(best_trial);

    Ok(SearchOutcome {
        final_setting: chosen.setting,
        final_bytes: chosen.result_bytes,
        succeeded: best_fit.is_some(),
        trials_used: trials.len() as u32,
        best_trial,
        trials,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn linear(k: u64) -> impl FnMut(u32) -> Result<u64, Infallible> {
        move |setting| Ok(u64::from(setting) * k)
    }

    fn domain(min: u32, max: u32) -> SettingDomain {
        SettingDomain::new(min, max).unwrap()
    }

    // =========================================================================
    // SizeTarget / SettingDomain
    // =========================================================================

    #[test]
    fn target_rejects_zero_bytes() {
        assert!(matches!(
            SizeTarget::new(0, 0.05),
            Err(SearchError::InvalidTarget(_))
        ));
    }

    #[test]
    fn target_rejects_tolerance_out_of_range() {
        assert!(SizeTarget::new(100, 0.0).is_err());
        assert!(SizeTarget::new(100, -0.1).is_err());
        assert!(SizeTarget::new(100, 1.5).is_err());
        assert!(SizeTarget::new(100, f64::NAN).is_err());
        assert!(SizeTarget::new(100, 1.0).is_ok());
    }

    #[test]
    fn target_band_is_inclusive() {
        let target = SizeTarget::new(1000, 0.05).unwrap();
        assert!(target.accepts(950));
        assert!(target.accepts(1050));
        assert!(!target.accepts(949));
        assert!(!target.accepts(1051));
    }

    #[test]
    fn default_tolerance_is_five_percent() {
        let target = SizeTarget::with_default_tolerance(512_000).unwrap();
        assert_eq!(target.tolerance(), 0.05);
    }

    #[test]
    fn domain_requires_min_below_max() {
        assert!(matches!(
            SettingDomain::new(10, 10),
            Err(SearchError::InvalidDomain { min: 10, max: 10 })
        ));
        assert!(SettingDomain::new(20, 10).is_err());
        assert_eq!(domain(1, 95).len(), 95);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "min < max")]
    fn inverted_const_bounds_panic_in_debug() {
        let _ = SettingDomain::from_bounds(10, 5);
    }

    #[test]
    fn smallest_domain_still_yields_a_closest_trial() {
        let target = SizeTarget::new(1_000, 0.05).unwrap();
        let outcome = search_setting(domain(1, 2), &target, |_| Ok::<_, Infallible>(5_000)).unwrap();
        assert!(!outcome.succeeded);
        assert_eq!(outcome.trials_used, 1);
        assert_eq!(outcome.best_trial.setting, 1);
        assert_eq!(outcome.final_setting, 1);
    }

    #[test]
    fn probe_cap_tracks_log2_of_domain_size() {
        assert_eq!(domain(1, 2).probe_cap(), 3);
        assert_eq!(domain(1, 95).probe_cap(), 9);
        assert_eq!(domain(1, 100).probe_cap(), 9);
        assert_eq!(domain(72, 600).probe_cap(), 12);
    }

    // =========================================================================
    // Monotonic codec
    // =========================================================================

    #[test]
    fn linear_codec_lands_inside_band() {
        let k = 5_000;
        let target = SizeTarget::new(300_000, 0.05).unwrap();
        let outcome = search_setting(domain(1, 95), &target, linear(k)).unwrap();

        assert!(outcome.succeeded);
        let size = u64::from(outcome.final_setting) * k;
        assert_eq!(outcome.final_bytes, size);
        assert!(size.abs_diff(300_000) as f64 <= 0.05 * 300_000.0);
    }

    #[test]
    fn prefers_highest_setting_within_tolerance() {
        // 57..=63 all fit the band [285_000, 315_000] at 5_000 bytes per step.
        let target = SizeTarget::new(300_000, 0.05).unwrap();
        let outcome = search_setting(domain(1, 95), &target, linear(5_000)).unwrap();
        assert_eq!(outcome.final_setting, 63);
    }

    #[test]
    fn every_fitting_target_is_found() {
        // 100-byte steps always leave a size inside a 10% band above 1_000.
        let k = 100;
        for t in (1_000..=9_500).step_by(250) {
            let target = SizeTarget::new(t, 0.1).unwrap();
            let outcome = search_setting(domain(1, 95), &target, linear(k)).unwrap();
            assert!(outcome.succeeded, "target {t} should be reachable");
            let size = u64::from(outcome.final_setting) * k;
            assert!(size.abs_diff(t) as f64 <= 0.1 * t as f64);
        }
    }

    #[test]
    fn records_every_trial_in_probe_order() {
        let target = SizeTarget::new(300_000, 0.05).unwrap();
        let outcome = search_setting(domain(1, 95), &target, linear(5_000)).unwrap();

        assert_eq!(outcome.trials.len() as u32, outcome.trials_used);
        assert_eq!(outcome.trials[0].setting, 48);
        for trial in &outcome.trials {
            assert_eq!(trial.within_tolerance, target.accepts(trial.result_bytes));
        }
    }

    // =========================================================================
    // Termination
    // =========================================================================

    #[test]
    fn probes_stay_under_cap_for_many_domain_sizes() {
        for max in 2..=700u32 {
            let d = domain(1, max);
            for t in [1u64, 7, 50, 333, 10_000] {
                let target = SizeTarget::new(t, 0.01).unwrap();
                let mut calls = 0u32;
                let outcome = search_setting(d, &target, |s| {
                    calls += 1;
                    Ok::<_, Infallible>(u64::from(s) * 3)
                })
                .unwrap();
                assert!(calls <= d.probe_cap());
                assert_eq!(calls, outcome.trials_used);
            }
        }
    }

    #[test]
    fn erratic_codec_still_terminates() {
        let target = SizeTarget::new(500, 0.01).unwrap();
        let d = domain(1, 100);
        let outcome =
            search_setting(d, &target, |s| Ok::<_, Infallible>(u64::from((s * 37) % 101) * 10))
                .unwrap();
        assert!(outcome.trials_used <= d.probe_cap());
    }

    // =========================================================================
    // Unreachable targets
    // =========================================================================

    #[test]
    fn unreachable_low_falls_back_to_min() {
        // Smallest encoding is 10 * 1_000 = 10_000 bytes, far above 1_000.
        let target = SizeTarget::new(1_000, 0.05).unwrap();
        let outcome = search_setting(domain(10, 95), &target, linear(1_000)).unwrap();

        assert!(!outcome.succeeded);
        assert_eq!(outcome.final_setting, 10);
        assert_eq!(outcome.final_bytes, 10_000);
        assert_eq!(outcome.best_trial.setting, 10);
    }

    #[test]
    fn unreachable_high_falls_back_to_max() {
        let target = SizeTarget::new(10_000_000, 0.05).unwrap();
        let outcome = search_setting(domain(1, 95), &target, linear(1_000)).unwrap();

        assert!(!outcome.succeeded);
        assert_eq!(outcome.final_setting, 95);
        assert_eq!(outcome.final_bytes, 95_000);
    }

    #[test]
    fn gap_between_steps_returns_closest_trial() {
        // Steps of 10_000 bytes with a 1% band around 55_000 never fit.
        let target = SizeTarget::new(55_000, 0.01).unwrap();
        let outcome = search_setting(domain(1, 10), &target, linear(10_000)).unwrap();

        assert!(!outcome.succeeded);
        assert_eq!(outcome.final_bytes.abs_diff(55_000), 5_000);
        // Equal distance from 5 and 6: the lower setting wins.
        assert_eq!(outcome.final_setting, 5);
    }

    #[test]
    fn non_monotonic_codec_keeps_best_seen() {
        // Sizes dip at 50 even though everything around it is huge.
        let target = SizeTarget::new(1_000, 0.05).unwrap();
        let outcome = search_setting(domain(1, 99), &target, |s| {
            Ok::<_, Infallible>(if s == 50 { 1_000 } else { 50_000 })
        })
        .unwrap();

        assert!(outcome.succeeded);
        assert_eq!(outcome.final_setting, 50);
    }

    #[test]
    fn codec_error_aborts_search() {
        let target = SizeTarget::new(1_000, 0.05).unwrap();
        let mut calls = 0;
        let result = search_setting(domain(1, 95), &target, |s| {
            calls += 1;
            if calls == 2 { Err(s) } else { Ok(u64::from(s)) }
        });
        assert!(result.is_err());
        assert_eq!(calls, 2);
    }
}
