//! Smoothing kernels for the density constraint, 2-d normalizations.

use std::f32::consts::PI;

/// Guards the gradient against the r -> 0 singularity.
const GRAD_EPSILON: f32 = 1e-6;

/// Poly6-style kernel: `4/(pi h^8) (h^2 - r^2)^3` inside the support
/// radius, zero outside.
pub fn poly6(r: f32, h: f32) -> f32 {
    if r > h {
        return 0.0;
    }
    let diff = h * h - r * r;
    4.0 / (PI * h.powi(8)) * diff * diff * diff
}

/// Scalar coefficient of the spiky-style gradient. The vector gradient of
/// the kernel with respect to particle `i` is this value times
/// `(x_i - x_j)`, which makes the pairwise term antisymmetric.
pub fn grad_spiky(r: f32, h: f32) -> f32 {
    if r > h {
        return 0.0;
    }
    let c = -30.0 / (PI * h.powi(5));
    let diff = h - r;
    c * diff * diff / (h * (r + GRAD_EPSILON))
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::grad_spiky;
    use super::poly6;

    const H: f32 = 0.2;

    #[test]
    fn poly6_has_compact_support() {
        assert_eq!(poly6(H * 1.001, H), 0.0);
        assert_eq!(poly6(10.0 * H, H), 0.0);
        assert!(poly6(H * 0.999, H) > 0.0);
    }

    #[test]
    fn poly6_peak_value() {
        let expected = 4.0 / (std::f32::consts::PI * H * H);
        assert!((poly6(0.0, H) - expected).abs() < expected * 1e-5);
    }

    #[test]
    fn poly6_decreases_monotonically() {
        let mut previous = f32::INFINITY;
        for step in 0..20 {
            let r = H * step as f32 / 20.0;
            let w = poly6(r, H);
            assert!(w < previous);
            previous = w;
        }
    }

    #[test]
    fn grad_has_compact_support() {
        assert_eq!(grad_spiky(H * 1.001, H), 0.0);
        assert!(grad_spiky(H * 0.5, H) < 0.0);
    }

    #[test]
    fn vector_gradient_is_antisymmetric() {
        let x_i = Vec2::new(0.31, 0.17);
        let x_j = Vec2::new(0.4, 0.12);
        let r = (x_i - x_j).length();
        let forward = grad_spiky(r, H) * (x_i - x_j);
        let backward = grad_spiky(r, H) * (x_j - x_i);
        assert!((forward + backward).length() < 1e-6);
    }
}
