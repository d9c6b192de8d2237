//! Separable Gaussian blur weights.

/// One-sided Gaussian weights for offsets `0..=radius`.
///
/// Sigma is `radius / 3`, so the kernel reaches roughly three standard
/// deviations. The weights are normalized for a symmetric two-sided
/// convolution: `w[0] + 2 * (w[1] + .. + w[radius]) == 1`. A radius of zero
/// yields the identity kernel `[1.0]`.
#[must_use]
pub fn gaussian_kernel(radius: u32) -> Vec<f32> {
    if radius == 0 {
        return vec![1.0];
    }
    let sigma = radius as f32 / 3.0;
    let weights: Vec<f32> = (0..=radius)
        .map(|i| {
            let x = i as f32;
            (-0.5 * x * x / (sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = weights
        .iter()
        .enumerate()
        .map(|(i, w)| if i == 0 { *w } else { 2.0 * w })
        .sum();
    weights.into_iter().map(|w| w / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_sided_sum(kernel: &[f32]) -> f32 {
        kernel[0] + 2.0 * kernel[1..].iter().sum::<f32>()
    }

    #[test]
    fn weights_are_normalized() {
        for radius in [1, 2, 5, 30, 200] {
            let kernel = gaussian_kernel(radius);
            assert_eq!(kernel.len(), radius as usize + 1);
            assert!((two_sided_sum(&kernel) - 1.0).abs() < 1e-4, "radius {radius}");
        }
    }

    #[test]
    fn weights_decrease_with_distance() {
        let kernel = gaussian_kernel(9);
        assert!(kernel.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn radius_one_matches_closed_form() {
        // sigma = 1/3: w1 = exp(-4.5)
        let w1 = (-4.5_f32).exp();
        let sum = 1.0 + 2.0 * w1;
        let kernel = gaussian_kernel(1);
        assert!((kernel[0] - 1.0 / sum).abs() < 1e-6);
        assert!((kernel[1] - w1 / sum).abs() < 1e-6);
    }

    #[test]
    fn zero_radius_is_identity() {
        assert_eq!(gaussian_kernel(0), vec![1.0]);
    }
}
