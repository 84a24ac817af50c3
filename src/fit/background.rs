//! Background estimation under detected peaks.
//!
//! For each selected candidate with width `w` at channel `c` we sample two
//! bands beside the peak, `[c - 2w - H, c - 2w)` and `[c + 2w, c + 2w + H)`
//! with `H` the configured halfwidth, and fit a quadratic through the sampled
//! channels. Bands from different peaks are combined by symmetric difference:
//! a channel covered by an even number of bands drops back out of the mask.
//! That parity rule reproduces the lab's historical mask arithmetic exactly
//! (see DESIGN.md, OQ-1) and is pinned by a test below.

use crate::domain::PeakCandidate;
use crate::math::poly::polyfit;

/// Background sampling bands, two per candidate, as half-open `(start, stop)`
/// intervals in fractional channels.
pub fn background_bands(candidates: &[PeakCandidate], halfwidth: f64) -> Vec<(f64, f64)> {
    let mut bands = Vec::with_capacity(candidates.len() * 2);
    for c in candidates {
        let center = c.channel as f64;
        let left = center - 2.0 * c.width;
        let right = center + 2.0 * c.width;
        bands.push((left - halfwidth, left));
        bands.push((right, right + halfwidth));
    }
    bands
}

/// Combine bands into a channel mask by symmetric difference.
///
/// A channel `x` belongs to a band `(start, stop)` when `start <= x < stop`.
/// Channels covered by an odd number of bands end up in the mask.
pub fn background_mask(n_channels: usize, bands: &[(f64, f64)]) -> Vec<bool> {
    let mut mask = vec![false; n_channels];
    for &(start, stop) in bands {
        let lo = start.ceil().max(0.0) as usize;
        let hi = (stop.ceil().max(0.0) as usize).min(n_channels);
        for flag in &mut mask[lo.min(n_channels)..hi] {
            *flag ^= true;
        }
    }
    mask
}

/// Fit a quadratic to the masked channels, coefficients highest power first.
///
/// The polynomial is later evaluated over the *full* channel range; it may go
/// negative or overshoot the data outside the sampled bands, which is
/// accepted. Returns `None` when the mask has too few channels to constrain
/// three coefficients.
pub fn fit_background(counts: &[f64], mask: &[bool]) -> Option<[f64; 3]> {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for (ch, (&count, &keep)) in counts.iter().zip(mask.iter()).enumerate() {
        if keep {
            xs.push(ch as f64);
            ys.push(count);
        }
    }

    let coeffs = polyfit(&xs, &ys, 2)?;
    Some([coeffs[0], coeffs[1], coeffs[2]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::poly::polyval;

    fn candidate(channel: usize, width: f64) -> PeakCandidate {
        PeakCandidate {
            channel,
            height: 1000.0,
            prominence: 1000.0,
            width,
        }
    }

    #[test]
    fn bands_sit_two_widths_away_from_the_peak() {
        let bands = background_bands(&[candidate(100, 10.0)], 70.0);
        assert_eq!(bands, vec![(10.0, 80.0), (120.0, 190.0)]);
    }

    #[test]
    fn mask_is_half_open_and_clamped() {
        let mask = background_mask(10, &[(-3.0, 4.0), (8.0, 25.0)]);
        let on: Vec<usize> = (0..10).filter(|&ch| mask[ch]).collect();
        assert_eq!(on, vec![0, 1, 2, 3, 8, 9]);
    }

    #[test]
    fn overlapping_bands_cancel_in_the_overlap() {
        // Pinned parity behavior: [10, 30) xor [20, 40) leaves the doubly
        // covered channels 20..30 *out* of the mask.
        let mask = background_mask(50, &[(10.0, 30.0), (20.0, 40.0)]);
        for ch in 10..20 {
            assert!(mask[ch], "channel {ch} should be background");
        }
        for ch in 20..30 {
            assert!(!mask[ch], "channel {ch} should cancel out");
        }
        for ch in 30..40 {
            assert!(mask[ch], "channel {ch} should be background");
        }
        assert!(!mask[5] && !mask[45]);
    }

    #[test]
    fn mask_is_independent_of_band_order() {
        let forward = background_mask(100, &[(5.0, 25.0), (18.0, 40.0), (60.0, 70.0)]);
        let reversed = background_mask(100, &[(60.0, 70.0), (18.0, 40.0), (5.0, 25.0)]);
        assert_eq!(forward, reversed);
    }

    #[test]
    fn quadratic_background_is_recovered_from_masked_channels() {
        let counts: Vec<f64> = (0..500)
            .map(|ch| {
                let x = ch as f64;
                0.001 * x * x - 0.2 * x + 30.0
            })
            .collect();
        // Only sample two disjoint bands, as the real pipeline does.
        let mask = background_mask(500, &[(20.0, 120.0), (300.0, 450.0)]);

        let coeffs = fit_background(&counts, &mask).unwrap();
        for &x in &[0.0, 150.0, 499.0] {
            let expected = 0.001 * x * x - 0.2 * x + 30.0;
            assert!((polyval(&coeffs, x) - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn degenerate_mask_yields_no_background() {
        let counts = vec![1.0; 100];
        let mask = vec![false; 100];
        assert!(fit_background(&counts, &mask).is_none());
    }
}
