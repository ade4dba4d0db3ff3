//! Run configuration with TOML file support.
//!
//! Every section uses `#[serde(default)]`, so a file that only sets
//! `[fractal] seed = 9` is complete. Presets live as TOML files in any
//! directory and are listed with [`PlasmaOptions::list_presets`].

use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::PlasmaError;
use crate::fractal::FractalParameters;
use crate::gpu::capabilities::DeviceQuirks;

/// Fractal inputs. An absent seed is drawn at random when a session starts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Fractal", inline)]
#[serde(default)]
pub struct FractalOptions {
    /// Fixed seed, or `None` for a random one.
    pub seed: Option<u32>,
    /// Standard deviation of the first level's displacement.
    #[schemars(title = "Initial Sigma", range(min = 0.0, max = 4.0))]
    pub sigma_initial: f32,
    /// Mean of the first level's displacement.
    #[schemars(title = "Initial Mu", range(min = -1.0, max = 1.0))]
    pub mu_initial: f32,
    /// Factor applied to sigma and mu after every level.
    #[schemars(title = "Attenuation", range(min = 0.0, max = 1.0))]
    pub attenuation: f32,
    /// Subdivision levels.
    #[schemars(title = "Depth", range(min = 0, max = 15))]
    pub depth: u32,
}

impl Default for FractalOptions {
    fn default() -> Self {
        let defaults = FractalParameters::default();
        Self {
            seed: None,
            sigma_initial: defaults.sigma_initial,
            mu_initial: defaults.mu_initial,
            attenuation: defaults.attenuation,
            depth: defaults.depth,
        }
    }
}

impl FractalOptions {
    /// Concrete parameters, drawing a random seed if none is set. Non-finite
    /// sigma, mu or attenuation fall back to their defaults.
    #[must_use]
    pub fn to_parameters(&self) -> FractalParameters {
        let seed = self.seed.unwrap_or_else(|| {
            let seed = rand::random::<u32>();
            log::info!("No seed configured; using {seed}");
            seed
        });
        FractalParameters {
            seed,
            sigma_initial: self.sigma_initial,
            mu_initial: self.mu_initial,
            attenuation: self.attenuation,
            depth: self.depth,
        }
        .sanitized()
    }
}

/// Size of the produced raster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[schemars(title = "Output", inline)]
#[serde(default)]
pub struct OutputOptions {
    /// Width in pixels.
    #[schemars(title = "Width", range(min = 1, max = 8192))]
    pub width: u32,
    /// Height in pixels.
    #[schemars(title = "Height", range(min = 1, max = 8192))]
    pub height: u32,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
        }
    }
}

/// Normal-table construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[schemars(title = "Table", inline)]
#[serde(default)]
pub struct TableOptions {
    /// Render the table on the device when float targets allow it.
    #[schemars(title = "Parallel Build")]
    pub parallel: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Top-level options container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema)]
#[serde(default)]
pub struct PlasmaOptions {
    /// Fractal inputs.
    pub fractal: FractalOptions,
    /// Output raster size.
    pub output: OutputOptions,
    /// Normal-table construction.
    pub table: TableOptions,
    /// Device quirk overrides.
    #[schemars(skip)]
    pub quirks: DeviceQuirks,
}

impl PlasmaOptions {
    /// Generate JSON Schema describing the user-facing options.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(PlasmaOptions)
    }

    /// Load options from a TOML file. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// Returns [`PlasmaError::Io`] if the file cannot be read and
    /// [`PlasmaError::OptionsParse`] if it is not valid options TOML.
    pub fn load(path: &Path) -> Result<Self, PlasmaError> {
        let content = std::fs::read_to_string(path).map_err(PlasmaError::Io)?;
        toml::from_str(&content).map_err(|e| PlasmaError::OptionsParse(e.to_string()))
    }

    /// Save options to a TOML file (pretty-printed).
    ///
    /// # Errors
    ///
    /// Returns [`PlasmaError::OptionsParse`] if serialization fails and
    /// [`PlasmaError::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), PlasmaError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| PlasmaError::OptionsParse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(PlasmaError::Io)?;
        }
        std::fs::write(path, content).map_err(PlasmaError::Io)
    }

    /// List available preset names (TOML file stems) in a directory.
    #[must_use]
    pub fn list_presets(dir: &Path) -> Vec<String> {
        let mut names = Vec::new();
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        names.push(stem.to_owned());
                    }
                }
            }
        }
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_toml() {
        let opts = PlasmaOptions {
            fractal: FractalOptions {
                seed: Some(42),
                ..FractalOptions::default()
            },
            ..PlasmaOptions::default()
        };
        let toml_str = toml::to_string_pretty(&opts).unwrap();
        let parsed: PlasmaOptions = toml::from_str(&toml_str).unwrap();
        assert_eq!(opts, parsed);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r"
[fractal]
seed = 9
attenuation = 0.5
";
        let opts: PlasmaOptions = toml::from_str(toml_str).unwrap();
        assert_eq!(opts.fractal.seed, Some(9));
        assert_eq!(opts.fractal.attenuation, 0.5);
        // Everything else should be default
        assert_eq!(opts.fractal.sigma_initial, 0.7);
        assert_eq!(opts.output, OutputOptions::default());
        assert!(opts.table.parallel);
        assert_eq!(opts.quirks, DeviceQuirks::default());
    }

    #[test]
    fn quirk_rules_replace_the_default_table() {
        let toml_str = r#"
[[quirks.rules]]
description = "test rig"
adapter_name_contains = "Rig"
disable_full_float = true
"#;
        let opts: PlasmaOptions = toml::from_str(toml_str).unwrap();
        assert_eq!(opts.quirks.rules.len(), 1);
        assert_eq!(opts.quirks.rules[0].description, "test rig");
        assert!(!opts.quirks.rules[0].disable_half_float);
    }

    #[test]
    fn fixed_seed_is_used_verbatim() {
        let fractal = FractalOptions {
            seed: Some(1),
            depth: 3,
            ..FractalOptions::default()
        };
        let params = fractal.to_parameters();
        assert_eq!(params.seed, 1);
        assert_eq!(params.depth, 3);
    }

    #[test]
    fn non_finite_values_load_as_defaults() {
        let toml_str = r"
[fractal]
seed = 1
sigma_initial = nan
attenuation = inf
mu_initial = 0.1
";
        let opts: PlasmaOptions = toml::from_str(toml_str).unwrap();
        assert!(opts.fractal.sigma_initial.is_nan());

        let params = opts.fractal.to_parameters();
        let defaults = FractalParameters::default();
        assert_eq!(params.sigma_initial, defaults.sigma_initial);
        assert_eq!(params.attenuation, defaults.attenuation);
        assert_eq!(params.mu_initial, 0.1);
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join(format!("plasma-options-{}", std::process::id()));
        let path = dir.join("preset.toml");
        let opts = PlasmaOptions {
            output: OutputOptions {
                width: 64,
                height: 32,
            },
            ..PlasmaOptions::default()
        };
        opts.save(&path).unwrap();
        assert_eq!(PlasmaOptions::load(&path).unwrap(), opts);
        assert_eq!(PlasmaOptions::list_presets(&dir), vec!["preset".to_owned()]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn schema_has_expected_properties() {
        let schema_value = serde_json::to_value(PlasmaOptions::json_schema()).unwrap();
        let props = schema_value["properties"].as_object().unwrap();

        assert!(props.contains_key("fractal"));
        assert!(props.contains_key("output"));
        assert!(props.contains_key("table"));
        assert!(!props.contains_key("quirks"));

        let fractal = &props["fractal"]["properties"];
        assert!(fractal.get("attenuation").is_some());
        assert!(fractal.get("seed").is_some());
    }
}
