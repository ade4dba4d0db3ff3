//! Float-texture capability detection and the device quirk table.
//!
//! Some devices advertise float color-buffer support they do not honor. The
//! capability profile is therefore derived from the adapter report *after*
//! running it through [`DeviceQuirks`], a data-driven override list that
//! options files can replace.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::backend::{AdapterReport, PlatformInfo, TextureFormat};

/// Effective float-texture capabilities, fixed at manager construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityProfile {
    /// `R32Float` render targets work.
    pub full_float: bool,
    /// `R16Float` render targets work.
    pub half_float: bool,
    /// Float textures support linear filtering.
    pub float_linear_filtering: bool,
}

impl CapabilityProfile {
    /// Derive the profile from a raw report, applying `quirks`.
    ///
    /// Priority is full precision, then half precision, then none.
    #[must_use]
    pub fn detect(report: &AdapterReport, quirks: &DeviceQuirks) -> Self {
        let mut full_float = report.renders_r32float;
        let mut half_float = report.renders_r16float;

        for rule in quirks.matching(&report.platform) {
            if rule.disable_full_float && full_float {
                log::warn!(
                    "Disabling full-precision float targets on '{}': {}",
                    report.platform.adapter_name,
                    rule.description
                );
                full_float = false;
            }
            if rule.disable_half_float && half_float {
                log::warn!(
                    "Disabling half-precision float targets on '{}': {}",
                    report.platform.adapter_name,
                    rule.description
                );
                half_float = false;
            }
        }

        Self {
            full_float,
            half_float,
            float_linear_filtering: full_float && report.filters_r32float,
        }
    }

    /// A profile with no float render support at all.
    #[must_use]
    pub const fn without_float() -> Self {
        Self {
            full_float: false,
            half_float: false,
            float_linear_filtering: false,
        }
    }

    /// Format for single-channel float render targets, if any is usable.
    #[must_use]
    pub const fn float_target_format(&self) -> Option<TextureFormat> {
        if self.full_float {
            Some(TextureFormat::R32Float)
        } else if self.half_float {
            Some(TextureFormat::R16Float)
        } else {
            None
        }
    }

    /// Format for uploaded (sample-only) float textures.
    ///
    /// `R32Float` is kept only where float textures are fully usable,
    /// filtering included. Otherwise uploads drop to `R16Float` when half
    /// floats work, and fall back to `R32Float` (which every backend can
    /// fetch from) when nothing better exists.
    #[must_use]
    pub const fn float_upload_format(&self) -> TextureFormat {
        if self.float_linear_filtering || !self.half_float {
            TextureFormat::R32Float
        } else {
            TextureFormat::R16Float
        }
    }
}

/// One entry of the quirk table. Empty match fields match anything; a rule
/// with every match field empty matches every platform.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema,
)]
#[serde(default)]
pub struct QuirkRule {
    /// Why the rule exists (logged when it fires).
    pub description: String,
    /// Exact operating-system match (case-insensitive).
    pub os: Option<String>,
    /// Substring of the adapter name (case-insensitive).
    pub adapter_name_contains: Option<String>,
    /// Exact graphics API match (case-insensitive).
    pub backend: Option<String>,
    /// Treat `R32Float` render targets as unsupported.
    pub disable_full_float: bool,
    /// Treat `R16Float` render targets as unsupported.
    pub disable_half_float: bool,
}

impl QuirkRule {
    /// Whether the rule applies to `platform`.
    #[must_use]
    pub fn matches(&self, platform: &PlatformInfo) -> bool {
        let os = self
            .os
            .as_ref()
            .is_none_or(|os| os.eq_ignore_ascii_case(&platform.os));
        let adapter = self.adapter_name_contains.as_ref().is_none_or(|needle| {
            platform
                .adapter_name
                .to_ascii_lowercase()
                .contains(&needle.to_ascii_lowercase())
        });
        let backend = self
            .backend
            .as_ref()
            .is_none_or(|b| b.eq_ignore_ascii_case(&platform.backend));
        os && adapter && backend
    }
}

/// Ordered list of capability overrides keyed on platform identification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(default)]
pub struct DeviceQuirks {
    /// Rules, all of which are applied when they match.
    pub rules: Vec<QuirkRule>,
}

impl Default for DeviceQuirks {
    /// iOS/iPadOS devices claim float32 color buffers they cannot render
    /// into; iPads additionally identify as desktop Macs, so Apple A-series
    /// adapters are matched by name as well.
    fn default() -> Self {
        Self {
            rules: vec![
                QuirkRule {
                    description: "iOS devices misreport float32 color buffer support".to_owned(),
                    os: Some("ios".to_owned()),
                    disable_full_float: true,
                    ..QuirkRule::default()
                },
                QuirkRule {
                    description: "Apple A-series GPUs misreport float32 color buffer support"
                        .to_owned(),
                    adapter_name_contains: Some("Apple A".to_owned()),
                    disable_full_float: true,
                    ..QuirkRule::default()
                },
            ],
        }
    }
}

impl DeviceQuirks {
    /// A table with no rules: trust the adapter report.
    #[must_use]
    pub const fn none() -> Self {
        Self { rules: Vec::new() }
    }

    /// Rules that apply to `platform`.
    pub fn matching<'a>(
        &'a self,
        platform: &'a PlatformInfo,
    ) -> impl Iterator<Item = &'a QuirkRule> + 'a {
        self.rules.iter().filter(move |rule| rule.matches(platform))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(os: &str, adapter: &str) -> AdapterReport {
        AdapterReport {
            platform: PlatformInfo {
                os: os.to_owned(),
                adapter_name: adapter.to_owned(),
                backend: "Metal".to_owned(),
            },
            renders_r32float: true,
            renders_r16float: true,
            filters_r32float: true,
            max_texture_dimension: 8192,
        }
    }

    #[test]
    fn trusted_adapter_gets_full_float() {
        let profile = CapabilityProfile::detect(&report("linux", "AMD Radeon"), &DeviceQuirks::default());
        assert!(profile.full_float);
        assert!(profile.float_linear_filtering);
        assert_eq!(profile.float_target_format(), Some(TextureFormat::R32Float));
    }

    #[test]
    fn ios_is_downgraded_to_half_float() {
        let profile = CapabilityProfile::detect(&report("ios", "Apple GPU"), &DeviceQuirks::default());
        assert!(!profile.full_float);
        assert!(profile.half_float);
        assert!(!profile.float_linear_filtering);
        assert_eq!(profile.float_target_format(), Some(TextureFormat::R16Float));
    }

    #[test]
    fn ipad_posing_as_mac_is_caught_by_adapter_name() {
        let profile = CapabilityProfile::detect(&report("macos", "Apple A12Z GPU"), &DeviceQuirks::default());
        assert!(!profile.full_float);

        let m1 = CapabilityProfile::detect(&report("macos", "Apple M1"), &DeviceQuirks::default());
        assert!(m1.full_float);
    }

    #[test]
    fn empty_table_trusts_the_report() {
        let profile = CapabilityProfile::detect(&report("ios", "Apple A15 GPU"), &DeviceQuirks::none());
        assert!(profile.full_float);
    }

    #[test]
    fn no_float_support_still_uploads_r32() {
        let profile = CapabilityProfile::without_float();
        assert_eq!(profile.float_target_format(), None);
        assert_eq!(profile.float_upload_format(), TextureFormat::R32Float);
    }

    #[test]
    fn unfilterable_full_float_uploads_half_tables() {
        let mut raw = report("linux", "Tile GPU");
        raw.filters_r32float = false;
        let profile = CapabilityProfile::detect(&raw, &DeviceQuirks::none());
        assert!(profile.full_float);
        assert!(!profile.float_linear_filtering);
        assert_eq!(profile.float_target_format(), Some(TextureFormat::R32Float));
        assert_eq!(profile.float_upload_format(), TextureFormat::R16Float);

        raw.renders_r16float = false;
        let profile = CapabilityProfile::detect(&raw, &DeviceQuirks::none());
        assert_eq!(profile.float_upload_format(), TextureFormat::R32Float);
    }

    #[test]
    fn quirks_round_trip_through_toml() {
        let quirks = DeviceQuirks::default();
        let text = toml::to_string_pretty(&quirks).unwrap();
        let parsed: DeviceQuirks = toml::from_str(&text).unwrap();
        assert_eq!(parsed, quirks);
    }
}
