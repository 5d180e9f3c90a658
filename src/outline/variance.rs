//! Variance arithmetic between the parsed outline total and the
//! requested target duration.

/// Percentage deviation of `parsed_total` from `target_total`.
/// A zero target yields 0 rather than dividing by zero.
pub fn variance_pct(parsed_total: u32, target_total: u32) -> f64 {
    if target_total == 0 {
        return 0.0;
    }
    let parsed = f64::from(parsed_total);
    let target = f64::from(target_total);
    (parsed - target).abs() / target * 100.0
}

/// Outcome of checking a completed outline against the target duration.
#[derive(Debug, Clone, PartialEq)]
pub enum VarianceVerdict {
    /// Parsed total was 0: parse failure is indistinguishable from a
    /// stated zero duration, so the outline is treated as unknown and
    /// review is skipped.
    Unknown,
    /// Deviation within tolerance; storage may proceed.
    WithinTolerance { variance_pct: f64 },
    /// Deviation above threshold; a review pass is warranted.
    NeedsReview {
        variance_pct: f64,
        current_total: u32,
        min_acceptable: u32,
        max_acceptable: u32,
    },
}

/// Assess a parsed outline total against the target, using the
/// configured threshold (percent).
pub fn assess(parsed_total: u32, target_total: u32, threshold_pct: f64) -> VarianceVerdict {
    if parsed_total == 0 {
        return VarianceVerdict::Unknown;
    }

    let pct = variance_pct(parsed_total, target_total);
    if pct > threshold_pct {
        let target = f64::from(target_total);
        VarianceVerdict::NeedsReview {
            variance_pct: pct,
            current_total: parsed_total,
            min_acceptable: (target * 0.95).round() as u32,
            max_acceptable: (target * 1.05).round() as u32,
        }
    } else {
        VarianceVerdict::WithinTolerance { variance_pct: pct }
    }
}

#[cfg(test)]
#[path = "tests/variance_tests.rs"]
mod tests;
