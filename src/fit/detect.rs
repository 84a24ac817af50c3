//! Candidate peak detection: local maxima with topographic prominence and
//! half-prominence width estimates.
//!
//! The scan proceeds left to right, so candidates come out in ascending
//! channel order ("discovery order"). Downstream code relies on that ordering
//! for deterministic tie-breaking.

use crate::domain::PeakCandidate;

/// Find all candidates whose prominence is at least `prominence_threshold`
/// and whose half-prominence width is at least `min_width` channels.
pub fn find_candidates(
    counts: &[f64],
    prominence_threshold: f64,
    min_width: f64,
) -> Vec<PeakCandidate> {
    let mut out = Vec::new();

    for peak in local_maxima(counts) {
        let (prominence, left_base, right_base) = prominence_and_bases(counts, peak);
        if prominence < prominence_threshold {
            continue;
        }

        let width = half_prominence_width(counts, peak, prominence, left_base, right_base);
        if width < min_width {
            continue;
        }

        out.push(PeakCandidate {
            channel: peak,
            height: counts[peak],
            prominence,
            width,
        });
    }

    out
}

/// Indices of strict local maxima; plateaus report their midpoint.
fn local_maxima(y: &[f64]) -> Vec<usize> {
    let n = y.len();
    let mut out = Vec::new();

    let mut i = 1;
    while i + 1 < n {
        if y[i - 1] < y[i] {
            // Walk to the end of a possible flat top.
            let mut j = i;
            while j + 1 < n && y[j + 1] == y[i] {
                j += 1;
            }
            if j + 1 < n && y[j + 1] < y[i] {
                out.push((i + j) / 2);
            }
            i = j + 1;
        } else {
            i += 1;
        }
    }

    out
}

/// Topographic prominence of the maximum at `peak`, plus the positions of the
/// bounding valleys (bases).
///
/// Each side is scanned outward until a sample higher than the peak (or the
/// array edge) is met; the base is the lowest sample seen on the way.
fn prominence_and_bases(y: &[f64], peak: usize) -> (f64, usize, usize) {
    let h = y[peak];

    let mut left_min = h;
    let mut left_base = peak;
    let mut i = peak;
    while i > 0 && y[i - 1] <= h {
        i -= 1;
        if y[i] < left_min {
            left_min = y[i];
            left_base = i;
        }
    }

    let mut right_min = h;
    let mut right_base = peak;
    let mut j = peak;
    while j + 1 < y.len() && y[j + 1] <= h {
        j += 1;
        if y[j] < right_min {
            right_min = y[j];
            right_base = j;
        }
    }

    (h - left_min.max(right_min), left_base, right_base)
}

/// Interpolated width of the peak at half-prominence height, measured between
/// the bases found by the prominence scan.
fn half_prominence_width(
    y: &[f64],
    peak: usize,
    prominence: f64,
    left_base: usize,
    right_base: usize,
) -> f64 {
    let wh = y[peak] - 0.5 * prominence;

    let mut i = peak;
    while i > left_base && y[i] > wh {
        i -= 1;
    }
    let mut left_ip = i as f64;
    if y[i] < wh {
        left_ip += (wh - y[i]) / (y[i + 1] - y[i]);
    }

    let mut j = peak;
    while j < right_base && y[j] > wh {
        j += 1;
    }
    let mut right_ip = j as f64;
    if y[j] < wh {
        right_ip -= (wh - y[j]) / (y[j - 1] - y[j]);
    }

    right_ip - left_ip
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian(x: f64, amp: f64, mean: f64, var: f64) -> f64 {
        amp * (-(x - mean).powi(2) / (2.0 * var)).exp()
    }

    #[test]
    fn plateau_reports_midpoint() {
        let y = [0.0, 1.0, 2.0, 2.0, 2.0, 1.0, 0.0];
        assert_eq!(local_maxima(&y), vec![3]);
    }

    #[test]
    fn edge_samples_are_not_maxima() {
        let y = [5.0, 1.0, 0.0, 1.0, 5.0];
        assert!(local_maxima(&y).is_empty());

        // A monotone ramp has no interior maximum either.
        let y = [0.0, 1.0, 2.0, 3.0];
        assert!(local_maxima(&y).is_empty());
    }

    #[test]
    fn prominence_uses_higher_valley() {
        // Peak of 10 between valleys at 2 (left) and 6 (right).
        let y = [2.0, 4.0, 10.0, 6.0, 8.0, 7.0];
        let (prom, left, right) = prominence_and_bases(&y, 2);
        assert_eq!(prom, 4.0);
        assert_eq!(left, 0);
        assert_eq!(right, 3);
    }

    #[test]
    fn gaussian_candidates_pass_filters_and_noise_bumps_do_not() {
        let n = 2000;
        let counts: Vec<f64> = (0..n)
            .map(|ch| {
                let x = ch as f64;
                let signal = gaussian(x, 3000.0, 500.0, 36.0) + gaussian(x, 1500.0, 1200.0, 64.0);
                // A deterministic sub-threshold ripple.
                signal + 20.0 * ((x * 0.7).sin().abs())
            })
            .collect();

        let found = find_candidates(&counts, 100.0, 5.0);
        assert_eq!(found.len(), 2);
        assert!((found[0].channel as f64 - 500.0).abs() <= 1.0);
        assert!((found[1].channel as f64 - 1200.0).abs() <= 1.0);
        // Discovery order is ascending channel.
        assert!(found[0].channel < found[1].channel);
    }

    #[test]
    fn width_matches_half_prominence_crossing_for_a_gaussian() {
        let counts: Vec<f64> = (0..400).map(|ch| gaussian(ch as f64, 1000.0, 200.0, 25.0)).collect();
        let found = find_candidates(&counts, 100.0, 1.0);
        assert_eq!(found.len(), 1);
        // Half-prominence width of a Gaussian on zero baseline is
        // 2 * sqrt(2 ln 2 * var).
        let expected = 2.0 * (2.0 * std::f64::consts::LN_2 * 25.0).sqrt();
        assert!((found[0].width - expected).abs() < 0.1);
    }

    #[test]
    fn narrow_spikes_are_rejected_by_min_width() {
        let mut counts = vec![0.0; 100];
        counts[50] = 500.0;
        assert!(find_candidates(&counts, 100.0, 5.0).is_empty());
        assert_eq!(find_candidates(&counts, 100.0, 0.5).len(), 1);
    }
}
