// Filter chain data model mirroring the DSP engine's pipeline config.
//
// Only Biquad and DiffEq steps shape the frequency response; every other
// pipeline step (gain, delay, volume, dither, ...) passes through as unity
// for design purposes.

mod biquad;

pub use biquad::{BiquadParams, Coefficients, coefficients};

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

// ---------------------------------------------------------------------------
// Data model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FilterDesc {
    Biquad { parameters: BiquadParams },
    DiffEq { parameters: DiffEqParams },
    /// Any config entry that does not shape the response (Gain, Delay, ...).
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEqParams {
    /// Denominator coefficients, a[0] first. Empty means `[1.0]`.
    #[serde(default = "default_unit_poly")]
    pub a: Vec<f64>,
    /// Numerator coefficients, b[0] first. Empty means `[1.0]`.
    #[serde(default = "default_unit_poly")]
    pub b: Vec<f64>,
}

fn default_unit_poly() -> Vec<f64> {
    vec![1.0]
}

// ---------------------------------------------------------------------------
// Per-filter complex response
// ---------------------------------------------------------------------------

/// Complex transfer-function value of one filter at `f_hz`.
pub fn response_at(filter: &FilterDesc, f_hz: f64, sample_rate: f64) -> Complex64 {
    match filter {
        FilterDesc::Biquad { parameters } => biquad::response_at(parameters, f_hz, sample_rate),
        FilterDesc::DiffEq { parameters } => parameters.response_at(f_hz, sample_rate),
        FilterDesc::Other => Complex64::new(1.0, 0.0),
    }
}

impl DiffEqParams {
    /// Evaluate b(z)/a(z) at z = e^{jω} by summing powers of z⁻¹.
    pub fn response_at(&self, f_hz: f64, sample_rate: f64) -> Complex64 {
        let w = 2.0 * PI * f_hz / sample_rate;
        let z_inv = Complex64::from_polar(1.0, -w);
        let num = eval_poly(&self.b, z_inv);
        let den = eval_poly(&self.a, z_inv);
        if den.norm_sqr() < 1e-30 {
            // Degenerate denominator at this frequency; contribute unity.
            return Complex64::new(1.0, 0.0);
        }
        num / den
    }
}

fn eval_poly(coeffs: &[f64], z_inv: Complex64) -> Complex64 {
    if coeffs.is_empty() {
        return Complex64::new(1.0, 0.0);
    }
    let mut acc = Complex64::new(0.0, 0.0);
    let mut zpow = Complex64::new(1.0, 0.0);
    for &c in coeffs {
        acc += zpow * c;
        zpow *= z_inv;
    }
    acc
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
