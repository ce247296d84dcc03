//! Design system data model.
//!
//! DESIGN
//! ======
//! `DesignSystem` is the whole bundle of visual tokens being edited. The
//! persistence layer never patches it field by field: it is always read and
//! written whole, so every type here is plain serde data with camelCase wire
//! names. Collection fields default to empty so that sparse documents (an
//! import carrying only `colors` and `typography`) still deserialize.
//!
//! Token values are kept as raw JSON. A color may be a shade ramp or a flat
//! hex string, a font weight a number or a string, and keys this crate does
//! not model land in `extra` so a load/save cycle returns them unchanged.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Version stamped into newly created designs and export envelopes.
pub const FORMAT_VERSION: &str = "1.0";

/// Ordered map of token name to its JSON value (usually a CSS string).
pub type TokenMap = BTreeMap<String, Value>;

/// Fields outside the modelled schema, preserved verbatim.
pub type Extra = Map<String, Value>;

// =============================================================================
// TOKENS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Typography {
    pub font_family: TokenMap,
    pub font_size: TokenMap,
    pub font_weight: TokenMap,
    pub line_height: TokenMap,
    pub letter_spacing: TokenMap,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Animation {
    pub duration: TokenMap,
    pub easing: TokenMap,
    #[serde(flatten)]
    pub extra: Extra,
}

// =============================================================================
// DESIGN SYSTEM
// =============================================================================

/// The full token bundle. Opaque to the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignSystem {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub created_at: i64,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub updated_at: i64,
    /// Palette name to a shade ramp object or a single color value.
    #[serde(default)]
    pub colors: TokenMap,
    #[serde(default)]
    pub typography: Typography,
    #[serde(default)]
    pub spacing: TokenMap,
    #[serde(default)]
    pub border_radius: TokenMap,
    #[serde(default)]
    pub shadows: TokenMap,
    #[serde(default)]
    pub animation: Animation,
    #[serde(default)]
    pub z_index: TokenMap,
    /// Per-component overrides, component name to arbitrary JSON.
    #[serde(default)]
    pub components: TokenMap,
    #[serde(flatten)]
    pub extra: Extra,
}

impl DesignSystem {
    /// Set one shade of a color ramp, turning a flat color into a ramp.
    pub fn set_color_shade(&mut self, palette: String, shade: String, value: String) {
        let entry = self.colors.entry(palette).or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(shades) = entry {
            shades.insert(shade, Value::String(value));
        }
    }
}

fn default_version() -> String {
    FORMAT_VERSION.to_owned()
}

fn tokens(pairs: &[(&str, &str)]) -> TokenMap {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), Value::from(*v)))
        .collect()
}

fn numbers(pairs: &[(&str, i64)]) -> TokenMap {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), Value::from(*v)))
        .collect()
}

fn scale(shades: [&str; 10]) -> Value {
    const KEYS: [&str; 10] = ["50", "100", "200", "300", "400", "500", "600", "700", "800", "900"];
    Value::Object(
        KEYS.iter()
            .zip(shades)
            .map(|(k, v)| ((*k).to_owned(), Value::from(v)))
            .collect(),
    )
}

impl Default for DesignSystem {
    /// The starter design the editor opens with when nothing is persisted.
    fn default() -> Self {
        let mut colors = TokenMap::new();
        colors.insert(
            "primary".to_owned(),
            scale([
                "#eff6ff", "#dbeafe", "#bfdbfe", "#93c5fd", "#60a5fa", "#3b82f6", "#2563eb", "#1d4ed8", "#1e40af",
                "#1e3a8a",
            ]),
        );
        colors.insert(
            "neutral".to_owned(),
            scale([
                "#fafafa", "#f5f5f5", "#e5e5e5", "#d4d4d4", "#a3a3a3", "#737373", "#525252", "#404040", "#262626",
                "#171717",
            ]),
        );
        colors.insert(
            "success".to_owned(),
            scale([
                "#f0fdf4", "#dcfce7", "#bbf7d0", "#86efac", "#4ade80", "#22c55e", "#16a34a", "#15803d", "#166534",
                "#14532d",
            ]),
        );
        colors.insert(
            "danger".to_owned(),
            scale([
                "#fef2f2", "#fee2e2", "#fecaca", "#fca5a5", "#f87171", "#ef4444", "#dc2626", "#b91c1c", "#991b1b",
                "#7f1d1d",
            ]),
        );

        let typography = Typography {
            font_family: tokens(&[
                ("sans", "Inter, system-ui, sans-serif"),
                ("mono", "'JetBrains Mono', ui-monospace, monospace"),
            ]),
            font_size: tokens(&[
                ("xs", "0.75rem"),
                ("sm", "0.875rem"),
                ("base", "1rem"),
                ("lg", "1.125rem"),
                ("xl", "1.25rem"),
                ("2xl", "1.5rem"),
                ("3xl", "1.875rem"),
            ]),
            font_weight: numbers(&[("normal", 400), ("medium", 500), ("semibold", 600), ("bold", 700)]),
            line_height: tokens(&[("tight", "1.25"), ("normal", "1.5"), ("relaxed", "1.75")]),
            letter_spacing: tokens(&[("tight", "-0.025em"), ("normal", "0"), ("wide", "0.025em")]),
            extra: Extra::new(),
        };

        Self {
            name: "Untitled Design System".to_owned(),
            version: default_version(),
            created_at: 0,
            updated_at: 0,
            colors,
            typography,
            spacing: tokens(&[
                ("0", "0"),
                ("1", "0.25rem"),
                ("2", "0.5rem"),
                ("3", "0.75rem"),
                ("4", "1rem"),
                ("6", "1.5rem"),
                ("8", "2rem"),
                ("12", "3rem"),
            ]),
            border_radius: tokens(&[
                ("none", "0"),
                ("sm", "0.125rem"),
                ("md", "0.375rem"),
                ("lg", "0.5rem"),
                ("full", "9999px"),
            ]),
            shadows: tokens(&[
                ("sm", "0 1px 2px 0 rgb(0 0 0 / 0.05)"),
                ("md", "0 4px 6px -1px rgb(0 0 0 / 0.1)"),
                ("lg", "0 10px 15px -3px rgb(0 0 0 / 0.1)"),
            ]),
            animation: Animation {
                duration: tokens(&[("fast", "150ms"), ("normal", "250ms"), ("slow", "400ms")]),
                easing: tokens(&[
                    ("in", "cubic-bezier(0.4, 0, 1, 1)"),
                    ("out", "cubic-bezier(0, 0, 0.2, 1)"),
                    ("inOut", "cubic-bezier(0.4, 0, 0.2, 1)"),
                ]),
                extra: Extra::new(),
            },
            z_index: numbers(&[("dropdown", 1000), ("sticky", 1100), ("modal", 1300), ("toast", 1500)]),
            components: TokenMap::new(),
            extra: Extra::new(),
        }
    }
}

// =============================================================================
// PERSISTED RECORDS
// =============================================================================

/// A stored design: identity, display name, timestamps, and the full payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDesign {
    pub id: String,
    pub name: String,
    pub data: DesignSystem,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Listing projection of [`SavedDesign`], kept in a separate index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignMetadata {
    pub id: String,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&SavedDesign> for DesignMetadata {
    fn from(saved: &SavedDesign) -> Self {
        Self {
            id: saved.id.clone(),
            name: saved.name.clone(),
            created_at: saved.created_at,
            updated_at: saved.updated_at,
        }
    }
}

/// Versioned wrapper used for export files and imports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope {
    pub version: String,
    /// RFC 3339 timestamp.
    pub exported_at: String,
    pub design: DesignSystem,
}

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

#[cfg(test)]
#[path = "design_test.rs"]
mod tests;
