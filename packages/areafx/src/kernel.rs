//! Gaussian weights for the separable blur passes.
//!
//! The blur shader samples `2 * half - 1` taps along one axis and mirrors a
//! half-kernel around the centre tap, so only the centre weight and the
//! weights for positive offsets are generated and uploaded.

/// Spread of the blur kernel, in texels.
pub const KERNEL_SIGMA: f32 = 40.0;

/// Largest sample count a blur pass accepts.
pub const MAX_BLUR_SAMPLES: i32 = 151;

/// Capacity of the shader's weight table (half-kernel of `MAX_BLUR_SAMPLES`).
pub const MAX_KERNEL_WEIGHTS: usize = half_width(MAX_BLUR_SAMPLES);

/// Number of half-kernel weights for a requested sample count (`⌈N/2⌉`).
pub const fn half_width(samples: i32) -> usize {
    let samples = if samples < 1 { 1 } else { samples };
    ((samples - 1) / 2 + 1) as usize
}

/// Clamp a requested sample count to what the weight table can hold.
pub fn clamp_samples(samples: i32) -> i32 {
    samples.clamp(1, MAX_BLUR_SAMPLES)
}

/// Snap a stored blur radius to an odd sample count.
///
/// Even counts lose one sample, which is where repeated kernel generation
/// used to leave the stored value anyway.
pub fn settle_samples(samples: i32) -> i32 {
    let samples = clamp_samples(samples);
    if samples % 2 == 0 {
        samples - 1
    } else {
        samples
    }
}

/// Normalised half-kernel.
#[derive(Clone, Debug, PartialEq)]
pub struct GaussianKernel {
    weights: Vec<f32>,
}

impl GaussianKernel {
    /// Generate the half-kernel for `samples` taps.
    ///
    /// Requests above `MAX_BLUR_SAMPLES` are clamped.
    pub fn new(samples: i32) -> Self {
        let half = half_width(clamp_samples(samples));
        let reach = (half - 1) as i32;
        let s = 2.0 * KERNEL_SIGMA * KERNEL_SIGMA;

        let weight = |x: i32| {
            let r2 = (x * x) as f32;
            (-r2 / s).exp() / (std::f32::consts::PI * s)
        };

        let sum: f32 = (-reach..=reach).map(weight).sum();
        let weights = (0..=reach).map(|x| weight(x) / sum).collect();

        Self { weights }
    }

    /// Weights from the centre tap outward.
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Number of taps actually sampled by the shader (always odd).
    pub fn effective_samples(&self) -> i32 {
        (2 * self.weights.len() - 1) as i32
    }

    /// Sum over the mirrored kernel; 1.0 up to rounding.
    pub fn mirrored_sum(&self) -> f32 {
        match self.weights.split_first() {
            Some((centre, rest)) => centre + 2.0 * rest.iter().sum::<f32>(),
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_matches_slider_maximum() {
        assert_eq!(MAX_KERNEL_WEIGHTS, 76);
        assert_eq!(half_width(1), 1);
        assert_eq!(half_width(5), 3);
        assert_eq!(half_width(6), 3);
    }

    #[test]
    fn test_kernel_is_normalised_for_every_sample_count() {
        for samples in 1..=MAX_BLUR_SAMPLES {
            let kernel = GaussianKernel::new(samples);
            assert_eq!(kernel.weights().len(), half_width(samples));
            let sum = kernel.mirrored_sum();
            assert!((sum - 1.0).abs() < 1e-4, "samples {} summed to {}", samples, sum);
        }
    }

    #[test]
    fn test_weights_fall_off_from_centre() {
        let kernel = GaussianKernel::new(31);
        for pair in kernel.weights().windows(2) {
            assert!(pair[0] >= pair[1]);
        }
    }

    #[test]
    fn test_single_tap_kernel_is_identity() {
        let kernel = GaussianKernel::new(1);
        assert_eq!(kernel.weights(), &[1.0]);
        assert_eq!(kernel.effective_samples(), 1);
    }

    #[test]
    fn test_even_request_samples_one_fewer_tap() {
        let kernel = GaussianKernel::new(6);
        assert_eq!(kernel.effective_samples(), 5);
        assert_eq!(settle_samples(6), 5);
        assert_eq!(settle_samples(7), 7);
    }

    #[test]
    fn test_oversized_request_is_clamped() {
        let kernel = GaussianKernel::new(1000);
        assert_eq!(kernel.weights().len(), MAX_KERNEL_WEIGHTS);
        assert_eq!(clamp_samples(0), 1);
        assert_eq!(settle_samples(400), MAX_BLUR_SAMPLES);
    }
}
