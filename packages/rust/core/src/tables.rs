//! Reference tables: typology ranges, U-value corrections and plausibility limits.
//!
//! All literal domain data used by the pipeline lives here in one immutable
//! [`ReferenceTables`] value. It is built once (built-in defaults or a TOML
//! override file) and shared by reference with every stage.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use berclean_shared::{BerCleanError, EraBand, Result, ThermalEra};

// ---------------------------------------------------------------------------
// Feature / InclusiveRange
// ---------------------------------------------------------------------------

/// A dimensional feature constrained per dwelling typology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Feature {
    LivingAreaPercent,
    WallArea,
    FloorArea,
    GroundFloorArea,
    RoofArea,
    WindowArea,
    DoorArea,
}

impl Feature {
    pub const ALL: [Feature; 7] = [
        Feature::LivingAreaPercent,
        Feature::WallArea,
        Feature::FloorArea,
        Feature::GroundFloorArea,
        Feature::RoofArea,
        Feature::WindowArea,
        Feature::DoorArea,
    ];

    /// Column name of the feature in certificate files.
    pub fn column_name(self) -> &'static str {
        match self {
            Feature::LivingAreaPercent => "LivingAreaPercent",
            Feature::WallArea => "WallArea",
            Feature::FloorArea => "FloorArea",
            Feature::GroundFloorArea => "GroundFloorArea(sq m)",
            Feature::RoofArea => "RoofArea",
            Feature::WindowArea => "WindowArea",
            Feature::DoorArea => "DoorArea",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column_name())
    }
}

impl TryFrom<String> for Feature {
    type Error = BerCleanError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Feature::ALL
            .into_iter()
            .find(|feature| feature.column_name() == value)
            .ok_or_else(|| BerCleanError::validation(format!("unknown typology feature `{value}`")))
    }
}

impl From<Feature> for String {
    fn from(feature: Feature) -> Self {
        feature.column_name().to_string()
    }
}

/// Closed interval `[min, max]`, serialized as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct InclusiveRange {
    pub min: f64,
    pub max: f64,
}

impl InclusiveRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// `min <= value <= max`; NaN is never contained.
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

impl From<(f64, f64)> for InclusiveRange {
    fn from((min, max): (f64, f64)) -> Self {
        Self { min, max }
    }
}

impl From<InclusiveRange> for (f64, f64) {
    fn from(range: InclusiveRange) -> Self {
        (range.min, range.max)
    }
}

/// Feature name -> plausible range, for one typology.
pub type TypologyRanges = BTreeMap<Feature, InclusiveRange>;

// ---------------------------------------------------------------------------
// Correction entries and limit groups
// ---------------------------------------------------------------------------

/// `(u_value, wall_type) -> corrected` entry of the wall correction table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallCorrection {
    pub u_value: f64,
    pub wall_type: String,
    pub corrected: f64,
}

/// `u_value -> corrected` entry of the roof correction table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoofCorrection {
    pub u_value: f64,
    pub corrected: f64,
}

/// Plausible U-value ranges for one thermal era.
///
/// Door, window, roof and floor also accept exactly 0 (component absent);
/// the wall range has no such exemption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalRanges {
    pub door: InclusiveRange,
    pub window: InclusiveRange,
    pub roof: InclusiveRange,
    pub floor: InclusiveRange,
    pub wall: InclusiveRange,
}

/// Limits applied to every record regardless of era or typology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralLimits {
    /// Ground-floor height, or exactly 0.
    pub ground_floor_height: InclusiveRange,
    /// A rating-type label must contain one of these substrings.
    pub rating_types: Vec<String>,
    /// Main space-heating efficiency bands (or exactly 0).
    pub heating_efficiency: Vec<InclusiveRange>,
    /// Main water-heating efficiency bands (or exactly 0).
    pub water_heating_efficiency: Vec<InclusiveRange>,
}

// ---------------------------------------------------------------------------
// ReferenceTables
// ---------------------------------------------------------------------------

/// Every lookup table the pipeline consults. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTables {
    pub thermal_pre: ThermalRanges,
    pub thermal_post: ThermalRanges,
    pub general: GeneralLimits,
    /// Dwelling-type label -> per-feature ranges.
    pub typologies: BTreeMap<String, TypologyRanges>,
    pub wall_corrections: BTreeMap<EraBand, Vec<WallCorrection>>,
    pub roof_corrections: BTreeMap<EraBand, Vec<RoofCorrection>>,
}

impl ReferenceTables {
    /// Ranges for a dwelling type, matched exactly.
    pub fn typology(&self, dwelling_type: &str) -> Option<&TypologyRanges> {
        self.typologies.get(dwelling_type)
    }

    pub fn thermal(&self, era: ThermalEra) -> &ThermalRanges {
        match era {
            ThermalEra::Pre => &self.thermal_pre,
            ThermalEra::Post => &self.thermal_post,
        }
    }

    /// Wall correction entries of `band`; an error when the band has no table.
    pub fn wall_entries(&self, band: EraBand) -> Result<&[WallCorrection]> {
        self.wall_corrections
            .get(&band)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                BerCleanError::lookup(format!("wall correction table has no entry for era band {band}"))
            })
    }

    /// Roof correction entries of `band`; an error when the band has no table.
    pub fn roof_entries(&self, band: EraBand) -> Result<&[RoofCorrection]> {
        self.roof_corrections
            .get(&band)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                BerCleanError::lookup(format!("roof correction table has no entry for era band {band}"))
            })
    }

    /// Corrected wall U-value for `(u_value, wall_type)` in `band`.
    ///
    /// `Ok(None)` when the pair is not listed.
    pub fn wall_correction(&self, band: EraBand, u_value: f64, wall_type: &str) -> Result<Option<f64>> {
        Ok(self
            .wall_entries(band)?
            .iter()
            .find(|e| e.u_value == u_value && e.wall_type == wall_type)
            .map(|e| e.corrected))
    }

    /// Corrected roof U-value for `u_value` in `band`.
    pub fn roof_correction(&self, band: EraBand, u_value: f64) -> Result<Option<f64>> {
        Ok(self
            .roof_entries(band)?
            .iter()
            .find(|e| e.u_value == u_value)
            .map(|e| e.corrected))
    }

    /// Parse tables from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| BerCleanError::validation(format!("invalid reference tables: {e}")))
    }

    /// Load tables from a TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BerCleanError::io(path, e))?;
        let tables = Self::from_toml_str(&content)?;
        debug!(
            path = %path.display(),
            typologies = tables.typologies.len(),
            "loaded reference tables"
        );
        Ok(tables)
    }

    /// Serialize tables to TOML (the format accepted by [`ReferenceTables::load_from`]).
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| BerCleanError::validation(format!("failed to serialize reference tables: {e}")))
    }
}

impl Default for ReferenceTables {
    /// The built-in tables.
    fn default() -> Self {
        Self {
            thermal_pre: ThermalRanges {
                door: InclusiveRange::new(1.10, 3.90),
                window: InclusiveRange::new(1.18, 5.70),
                roof: InclusiveRange::new(0.13, 1.99),
                floor: InclusiveRange::new(0.16, 1.14),
                wall: InclusiveRange::new(0.20, 2.90),
            },
            thermal_post: ThermalRanges {
                door: InclusiveRange::new(0.83, 3.54),
                window: InclusiveRange::new(0.77, 4.80),
                roof: InclusiveRange::new(0.11, 0.68),
                floor: InclusiveRange::new(0.11, 1.14),
                wall: InclusiveRange::new(0.14, 1.72),
            },
            general: GeneralLimits {
                ground_floor_height: InclusiveRange::new(2.30, 3.46),
                rating_types: vec!["Final".into(), "Existing".into(), "Provisional".into()],
                // conventional boiler, central system
                heating_efficiency: vec![
                    InclusiveRange::new(23.07, 95.90),
                    InclusiveRange::new(100.0, 635.34),
                ],
                // conventional boiler, heat pump
                water_heating_efficiency: vec![
                    InclusiveRange::new(24.0, 95.90),
                    InclusiveRange::new(100.0, 389.9),
                ],
            },
            typologies: builtin_typologies(),
            wall_corrections: builtin_wall_corrections(),
            roof_corrections: builtin_roof_corrections(),
        }
    }
}

// ---------------------------------------------------------------------------
// Built-in data
// ---------------------------------------------------------------------------

/// Ranges per typology, in `Feature::ALL` order.
///
/// "Basement Dwellinge" is the label as it appears in the source tables.
const TYPOLOGY_RANGES: &[(&str, [(f64, f64); 7])] = &[
    (
        "Semi-detached house",
        [(11.27, 35.16), (53.19, 147.96), (31.13, 119.09), (48.75, 186.83), (32.34, 127.39), (7.09, 41.99), (0.0, 5.86)],
    ),
    (
        "End of terrace house",
        [(12.96, 59.49), (56.62, 155.61), (29.97, 104.74), (58.68, 190.49), (29.99, 108.82), (5.66, 34.82), (1.54, 17.97)],
    ),
    (
        "Detached house",
        [(7.54, 45.89), (31.68, 336.19), (28.87, 255.60), (52.24, 422.20), (30.08, 290.85), (5.61, 83.48), (0.0, 6.28)],
    ),
    (
        "Top-floor apartment",
        [(-0.23, 62.28), (4.63, 139.35), (0.0, 0.0), (18.29, 153.06), (12.16, 126.58), (2.02, 38.71), (0.0, 1.91)],
    ),
    (
        "Mid-terrace house",
        [(13.03, 72.13), (29.24, 163.64), (31.65, 101.19), (61.13, 189.89), (32.54, 110.68), (4.29, 29.02), (1.61, 21.04)],
    ),
    (
        "Maisonette",
        [(6.39, 78.28), (20.88, 255.43), (-3.65, 841.0), (12.82, 182.30), (-121.43, 84.78), (1.83, 35.75), (1.83, 6.21)],
    ),
    (
        "House",
        [(6.61, 39.73), (57.96, 392.64), (-8.56, 248.01), (53.63, 453.75), (-4.44, 284.29), (5.44, 78.07), (0.0, 4.73)],
    ),
    (
        "Apartment",
        [(43.39, 57.59), (0.03, 135.15), (-1.41, 1596.88), (14.73, 143.84), (-4.74, 725.23), (1.72, 47.62), (1.78, 2.02)],
    ),
    (
        "Ground-floor apartment",
        [(3.72, 64.30), (-5.79, 113.86), (2.23, 107.71), (14.74, 125.67), (-0.19, 214.01), (2.96, 32.76), (1.45, 2.40)],
    ),
    (
        "Mid-floor apartment",
        [(21.59, 65.04), (-0.75, 104.89), (0.0, 0.0), (8.61, 114.22), (0.0, 0.0), (2.77, 41.77), (0.0, 1.91)],
    ),
    (
        "Basement Dwellinge",
        [(-4.70, 81.83), (0.94, 148.01), (-12.76, 141.22), (2.43, 189.37), (-0.21, 238.13), (-0.28, 32.29), (0.29, 2.23)],
    ),
];

const WALL_CORRECTIONS: &[(EraBand, &[(f64, &str, f64)])] = &[
    (EraBand::A, &[(2.10, "Unknown", 2.69), (2.10, "Stone", 2.90), (1.64, "325mm Solid Brick", 1.55)]),
    (
        EraBand::B,
        &[(2.10, "Unknown", 1.75), (2.10, "Stone", 3.28), (2.10, "225mm Solid Brick", 1.75), (1.64, "325mm Solid Brick", 1.55)],
    ),
    (
        EraBand::C,
        &[(2.10, "Unknown", 2.12), (2.10, "225mm Solid brick", 1.75), (1.78, "300mm Cavity", 1.20), (2.20, "Solid Mass Concrete", 2.12)],
    ),
    (
        EraBand::D,
        &[(2.10, "Unknown", 2.69), (1.78, "300mm Cavity", 1.85), (2.20, "Solid Mass Concrete", 2.12), (2.40, "Concrete Hollow Block", 2.69)],
    ),
    (EraBand::E, &[(2.10, "Unknown", 2.14), (1.78, "300mm Cavity", 1.54), (2.40, "Concrete Hollow Block", 2.14)]),
    (
        EraBand::F,
        &[(1.10, "Unknown", 1.83), (1.10, "300mm Cavity", 1.43), (0.60, "300mm Filled Cavity", 0.54), (1.10, "Concrete Hollow Block", 1.83)],
    ),
    (
        EraBand::G,
        &[(0.60, "Unknown", 1.35), (0.60, "300mm Cavity", 1.35), (0.60, "300mm Filled Cavity", 0.54), (0.60, "Concrete Hollow Block", 1.72)],
    ),
    (
        EraBand::H,
        &[(0.55, "Unknown", 0.39), (0.55, "300mm Filled Cavity", 0.39), (0.55, "Concrete Hollow Block", 0.54), (0.55, "Timber Frame", 0.40)],
    ),
    (EraBand::I, &[(0.55, "Unknown", 0.28), (0.55, "300mm Filled Cavity", 0.29), (0.55, "Timber Frame", 0.35)]),
    (EraBand::J, &[(0.37, "Unknown", 0.27), (0.37, "300mm Filled Cavity", 0.27), (0.37, "Timber Frame", 0.30)]),
    (EraBand::K, &[(0.27, "Unknown", 0.27), (0.27, "300mm Filled Cavity", 0.21), (0.27, "Timber Frame", 0.27)]),
];

const ROOF_CORRECTIONS: &[(EraBand, f64, f64)] = &[
    (EraBand::A, 2.30, 0.71),
    (EraBand::B, 2.30, 0.71),
    (EraBand::C, 2.30, 0.71),
    (EraBand::D, 2.30, 0.71),
    (EraBand::E, 2.30, 0.71),
    (EraBand::F, 0.49, 0.43),
    (EraBand::G, 0.49, 0.43),
    (EraBand::H, 0.40, 0.28),
    (EraBand::I, 0.36, 0.28),
    (EraBand::J, 0.25, 0.21),
    (EraBand::K, 0.25, 0.21),
];

fn builtin_typologies() -> BTreeMap<String, TypologyRanges> {
    TYPOLOGY_RANGES
        .iter()
        .map(|(label, ranges)| {
            let ranges = Feature::ALL
                .into_iter()
                .zip(ranges.iter())
                .map(|(feature, &range)| (feature, InclusiveRange::from(range)))
                .collect();
            (label.to_string(), ranges)
        })
        .collect()
}

fn builtin_wall_corrections() -> BTreeMap<EraBand, Vec<WallCorrection>> {
    WALL_CORRECTIONS
        .iter()
        .map(|(band, entries)| {
            let entries = entries
                .iter()
                .map(|&(u_value, wall_type, corrected)| WallCorrection {
                    u_value,
                    wall_type: wall_type.to_string(),
                    corrected,
                })
                .collect();
            (*band, entries)
        })
        .collect()
}

fn builtin_roof_corrections() -> BTreeMap<EraBand, Vec<RoofCorrection>> {
    ROOF_CORRECTIONS
        .iter()
        .map(|&(band, u_value, corrected)| (band, vec![RoofCorrection { u_value, corrected }]))
        .collect()
}
