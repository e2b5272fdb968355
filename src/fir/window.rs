// Window sequences for FIR tapering: Rectangular, Hann, Hamming, Blackman, Kaiser

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WindowKind {
    Rectangular,
    Hann,
    Hamming,
    Blackman,
    Kaiser,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Generate a symmetric window of length `n`.
///
/// `kaiser_beta` is only consulted for `WindowKind::Kaiser`. Callers pass an
/// odd positive `n` (the designer guarantees this); `n == 1` yields `[1.0]`
/// for every kind since the closed forms divide by `n - 1`.
pub fn generate(kind: WindowKind, n: usize, kaiser_beta: f64) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    match kind {
        WindowKind::Rectangular => vec![1.0; n],
        WindowKind::Hann => hann_window(n),
        WindowKind::Hamming => hamming_window(n),
        WindowKind::Blackman => blackman_window(n),
        WindowKind::Kaiser => kaiser_window(n, kaiser_beta),
    }
}

// ---------------------------------------------------------------------------
// Closed forms
// ---------------------------------------------------------------------------

fn hann_window(n: usize) -> Vec<f64> {
    (0..n).map(|i| {
        let x = 2.0 * PI * i as f64 / (n - 1) as f64;
        0.5 * (1.0 - x.cos())
    }).collect()
}

fn hamming_window(n: usize) -> Vec<f64> {
    (0..n).map(|i| {
        let x = 2.0 * PI * i as f64 / (n - 1) as f64;
        0.54 - 0.46 * x.cos()
    }).collect()
}

fn blackman_window(n: usize) -> Vec<f64> {
    let a0 = 0.42;
    let a1 = 0.5;
    let a2 = 0.08;
    (0..n).map(|i| {
        let x = 2.0 * PI * i as f64 / (n - 1) as f64;
        a0 - a1 * x.cos() + a2 * (2.0 * x).cos()
    }).collect()
}

fn kaiser_window(n: usize, beta: f64) -> Vec<f64> {
    let denom = bessel_i0(beta);
    (0..n).map(|i| {
        let x = 2.0 * i as f64 / (n - 1) as f64 - 1.0;
        let arg = beta * (1.0 - x * x).max(0.0).sqrt();
        bessel_i0(arg) / denom
    }).collect()
}

/// Modified Bessel function of the first kind, order 0 (I₀).
/// Computed via series expansion (converges fast for typical beta values).
fn bessel_i0(x: f64) -> f64 {
    let mut sum = 1.0;
    let mut term = 1.0;
    let x_half = x / 2.0;
    for k in 1..50 {
        term *= (x_half / k as f64) * (x_half / k as f64);
        sum += term;
        if term < 1e-20 {
            break;
        }
    }
    sum
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_symmetry() {
        let n = 1025;
        let kinds = [
            WindowKind::Rectangular,
            WindowKind::Hann,
            WindowKind::Hamming,
            WindowKind::Blackman,
            WindowKind::Kaiser,
        ];
        for kind in kinds {
            let w = generate(kind, n, 8.6);
            assert_eq!(w.len(), n);
            for i in 0..n / 2 {
                let diff = (w[i] - w[n - 1 - i]).abs();
                assert!(diff < 1e-10, "{:?} not symmetric at i={}: {} vs {}", kind, i, w[i], w[n - 1 - i]);
            }
            // Center of an odd-length symmetric window is the peak
            assert!(w[n / 2] > 0.99, "{:?} center should be ~1.0, got {}", kind, w[n / 2]);
        }
    }

    #[test]
    fn test_hamming_closed_form() {
        // w[i] = 0.54 - 0.46·cos(2πi/4) for n = 5
        let w = generate(WindowKind::Hamming, 5, 0.0);
        let expected = [0.08, 0.54, 1.0, 0.54, 0.08];
        for (i, (&got, &want)) in w.iter().zip(expected.iter()).enumerate() {
            assert!(
                (got - want).abs() < 1e-9,
                "Hamming[{}] should be {}, got {}",
                i, want, got
            );
        }
    }

    #[test]
    fn test_hann_endpoints_zero() {
        let w = generate(WindowKind::Hann, 101, 0.0);
        assert!(w[0].abs() < 1e-12);
        assert!(w[100].abs() < 1e-12);
        assert!((w[50] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rectangular_is_all_ones() {
        let w = generate(WindowKind::Rectangular, 33, 0.0);
        assert!(w.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_kaiser_window() {
        let n = 513;
        let beta = 8.6;
        let w = generate(WindowKind::Kaiser, n, beta);
        // Symmetric, peak 1.0 at center, endpoints 1/I₀(β)
        for i in 0..n / 2 {
            assert!((w[i] - w[n - 1 - i]).abs() < 1e-10);
        }
        assert!((w[n / 2] - 1.0).abs() < 1e-12);
        let expected_edge = 1.0 / bessel_i0(beta);
        assert!(
            (w[0] - expected_edge).abs() < 1e-12,
            "Kaiser edge should be 1/I₀(β) = {}, got {}",
            expected_edge, w[0]
        );
    }

    #[test]
    fn test_bessel_i0() {
        // I₀(0) = 1
        assert!((bessel_i0(0.0) - 1.0).abs() < 1e-12);
        // I₀ is monotonically increasing for x ≥ 0
        assert!(bessel_i0(5.0) > 1.0);
        assert!(bessel_i0(10.0) > bessel_i0(5.0));
        // Reference value: I₀(1) ≈ 1.2660658777520084
        assert!((bessel_i0(1.0) - 1.2660658777520084).abs() < 1e-12);
    }

    #[test]
    fn test_length_one_is_unity() {
        for kind in [
            WindowKind::Rectangular,
            WindowKind::Hann,
            WindowKind::Hamming,
            WindowKind::Blackman,
            WindowKind::Kaiser,
        ] {
            assert_eq!(generate(kind, 1, 8.6), vec![1.0]);
        }
    }
}
