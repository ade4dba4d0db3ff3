//! Plasma fractal: the per-coordinate height function, gradient shading and
//! the two renderers driving it.
//!
//! Heights come from recursive midpoint displacement of a unit square. Each
//! coordinate is evaluated on its own: it descends from the root square into
//! the quadrant containing it, reseeding a [`xorwow::Xorwow`] generator from
//! the quadrant path at every level. Pixels therefore never communicate, and
//! any two renderers that agree on the generator and the normal table agree
//! on every pixel.

pub mod gradient;
pub mod reference;
pub mod renderer;
pub mod subdivision;
pub mod xorwow;

pub use gradient::{shade, shade_color, GradientImage, RgbaImage};
pub use reference::render_reference;
pub use renderer::PlasmaRenderer;
pub use subdivision::{evaluate, LogicalCoordinate, Subdivision, MAX_DEPTH};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Inputs of the height function.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Fractal", inline)]
#[serde(default)]
pub struct FractalParameters {
    /// Seed of every generator in the descent.
    pub seed: u32,
    /// Standard deviation of the first level's displacement.
    #[schemars(title = "Initial Sigma", range(min = 0.0, max = 4.0))]
    pub sigma_initial: f32,
    /// Mean of the first level's displacement.
    #[schemars(title = "Initial Mu", range(min = -1.0, max = 1.0))]
    pub mu_initial: f32,
    /// Factor applied to sigma and mu after every level.
    #[schemars(title = "Attenuation", range(min = 0.0, max = 1.0))]
    pub attenuation: f32,
    /// Subdivision levels; values above [`MAX_DEPTH`] are capped.
    #[schemars(title = "Depth", range(min = 0, max = 15))]
    pub depth: u32,
}

impl Default for FractalParameters {
    fn default() -> Self {
        Self {
            seed: 0,
            sigma_initial: 0.7,
            mu_initial: 0.0,
            attenuation: 0.45,
            depth: 8,
        }
    }
}

impl FractalParameters {
    /// Depth actually walked by the evaluator.
    #[must_use]
    pub fn effective_depth(&self) -> u32 {
        self.depth.min(MAX_DEPTH)
    }

    /// Replace non-finite sigma, mu or attenuation with their defaults.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        Self {
            sigma_initial: finite_or(self.sigma_initial, defaults.sigma_initial, "sigma-initial"),
            mu_initial: finite_or(self.mu_initial, defaults.mu_initial, "mu-initial"),
            attenuation: finite_or(self.attenuation, defaults.attenuation, "attenuation"),
            ..self
        }
    }

    /// Apply a textual attribute (`seed`, `sigma-initial`, `mu-initial`,
    /// `attenuation`, `depth`).
    ///
    /// Returns whether `name` is a known attribute. Values that do not parse
    /// leave the parameter unchanged.
    pub fn apply_attribute(&mut self, name: &str, value: &str) -> bool {
        let value = value.trim();
        match name {
            "seed" => set_or_keep(&mut self.seed, name, parse_seed(value)),
            "sigma-initial" => set_or_keep(&mut self.sigma_initial, name, parse_finite(value)),
            "mu-initial" => set_or_keep(&mut self.mu_initial, name, parse_finite(value)),
            "attenuation" => set_or_keep(&mut self.attenuation, name, parse_finite(value)),
            "depth" => set_or_keep(&mut self.depth, name, value.parse().ok()),
            _ => return false,
        }
        true
    }
}

fn set_or_keep<T: Copy + std::fmt::Debug>(slot: &mut T, name: &str, parsed: Option<T>) {
    match parsed {
        Some(v) => *slot = v,
        None => log::debug!("Ignoring malformed '{name}'; keeping {slot:?}"),
    }
}

fn finite_or(value: f32, default: f32, name: &str) -> f32 {
    if value.is_finite() {
        value
    } else {
        log::debug!("Ignoring non-finite '{name}' ({value}); using {default}");
        default
    }
}

/// Parse a seed: a decimal or `0x` hexadecimal integer, optionally
/// negative, truncated to its low 32 bits.
#[must_use]
pub fn parse_seed(value: &str) -> Option<u32> {
    let (digits, negative) = match value.strip_prefix('-') {
        Some(rest) => (rest, true),
        None => (value, false),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u64>().ok()?,
    };
    let bits = if negative {
        magnitude.wrapping_neg()
    } else {
        magnitude
    };
    Some(bits as u32)
}

fn parse_finite(value: &str) -> Option<f32> {
    value.parse::<f32>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_update_parameters() {
        let mut params = FractalParameters::default();
        assert!(params.apply_attribute("seed", "0x10"));
        assert!(params.apply_attribute("sigma-initial", "1.5"));
        assert!(params.apply_attribute("mu-initial", " -0.25 "));
        assert!(params.apply_attribute("attenuation", "0.5"));
        assert!(params.apply_attribute("depth", "12"));
        assert_eq!(
            params,
            FractalParameters {
                seed: 16,
                sigma_initial: 1.5,
                mu_initial: -0.25,
                attenuation: 0.5,
                depth: 12,
            }
        );
    }

    #[test]
    fn malformed_values_keep_the_current_value() {
        let mut params = FractalParameters::default();
        assert!(params.apply_attribute("sigma-initial", "lots"));
        assert!(params.apply_attribute("attenuation", "NaN"));
        assert!(params.apply_attribute("seed", "0xZZ"));
        assert_eq!(params, FractalParameters::default());
        assert!(!params.apply_attribute("colour", "red"));
    }

    #[test]
    fn seeds_truncate_to_32_bits() {
        assert_eq!(parse_seed("4294967297"), Some(1));
        assert_eq!(parse_seed("-1"), Some(u32::MAX));
        assert_eq!(parse_seed("0xFFFFFFFF"), Some(u32::MAX));
        assert_eq!(parse_seed(""), None);
    }

    #[test]
    fn non_finite_values_fall_back_to_defaults() {
        let params = FractalParameters {
            seed: 5,
            sigma_initial: f32::NAN,
            mu_initial: f32::NEG_INFINITY,
            attenuation: f32::INFINITY,
            depth: 4,
        }
        .sanitized();
        assert_eq!(
            params,
            FractalParameters {
                seed: 5,
                depth: 4,
                ..FractalParameters::default()
            }
        );

        let finite = FractalParameters {
            sigma_initial: 1.25,
            ..FractalParameters::default()
        };
        assert_eq!(finite.sanitized(), finite);
    }

    #[test]
    fn depth_is_capped_when_walked() {
        let params = FractalParameters {
            depth: 99,
            ..FractalParameters::default()
        };
        assert_eq!(params.effective_depth(), MAX_DEPTH);
    }
}
