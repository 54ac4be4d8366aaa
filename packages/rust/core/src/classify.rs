//! Row classifier: thermal, general and typology plausibility checks.
//!
//! A record is plausible when no [`Check`] fails. Every check is a pure
//! function of the record and the [`ClassifyContext`], so the result never
//! depends on the batch a record arrives in.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Local};
use tracing::{debug, instrument};

use berclean_shared::UnknownTypologyPolicy;

use crate::derive::thermal_era;
use crate::record::{Batch, Record};
use crate::tables::{Feature, InclusiveRange, ReferenceTables};

/// A single plausibility predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Check {
    DoorUValue,
    WindowUValue,
    RoofUValue,
    FloorUValue,
    WallUValue,
    ConstructionYear,
    GroundFloorHeight,
    RatingType,
    HeatingEfficiency,
    WaterHeatingEfficiency,
    Typology(Feature),
    UnknownTypology,
}

impl Check {
    /// Stable name used in run summaries.
    pub fn name(&self) -> String {
        match self {
            Check::DoorUValue => "thermal.door".into(),
            Check::WindowUValue => "thermal.window".into(),
            Check::RoofUValue => "thermal.roof".into(),
            Check::FloorUValue => "thermal.floor".into(),
            Check::WallUValue => "thermal.wall".into(),
            Check::ConstructionYear => "general.year".into(),
            Check::GroundFloorHeight => "general.ground_floor_height".into(),
            Check::RatingType => "general.rating_type".into(),
            Check::HeatingEfficiency => "general.heating_efficiency".into(),
            Check::WaterHeatingEfficiency => "general.water_heating_efficiency".into(),
            Check::Typology(feature) => format!("typology.{}", feature.column_name()),
            Check::UnknownTypology => "typology.unknown".into(),
        }
    }
}

impl std::fmt::Display for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

/// Everything classification reads besides the record itself.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext<'a> {
    pub tables: &'a ReferenceTables,
    /// Latest plausible construction year, captured once per run.
    pub current_year: i32,
    pub unknown_typology: UnknownTypologyPolicy,
}

impl<'a> ClassifyContext<'a> {
    /// Context using today's local calendar year.
    pub fn new(tables: &'a ReferenceTables, unknown_typology: UnknownTypologyPolicy) -> Self {
        Self {
            tables,
            current_year: Local::now().year(),
            unknown_typology,
        }
    }

    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }
}

/// Failed checks of one record, in evaluation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assessment {
    pub failures: Vec<Check>,
}

impl Assessment {
    pub fn is_plausible(&self) -> bool {
        self.failures.is_empty()
    }

    fn require(&mut self, check: Check, passed: bool) {
        if !passed {
            self.failures.push(check);
        }
    }
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

// Absent values fail every predicate.

fn within(value: Option<f64>, range: &InclusiveRange) -> bool {
    value.is_some_and(|v| range.contains(v))
}

fn zero_or_within(value: Option<f64>, range: &InclusiveRange) -> bool {
    value.is_some_and(|v| v == 0.0 || range.contains(v))
}

fn zero_or_any(value: Option<f64>, ranges: &[InclusiveRange]) -> bool {
    value.is_some_and(|v| v == 0.0 || ranges.iter().any(|r| r.contains(v)))
}

/// Evaluate every check against one record.
pub fn assess(record: &Record, ctx: &ClassifyContext<'_>) -> Assessment {
    let cert = &record.certificate;
    let mut assessment = Assessment::default();

    let era = record
        .derived
        .as_ref()
        .map(|d| d.thermal_era)
        .unwrap_or_else(|| thermal_era(cert.year_of_construction));
    let thermal = ctx.tables.thermal(era);
    assessment.require(Check::DoorUValue, zero_or_within(cert.u_value_door, &thermal.door));
    assessment.require(Check::WindowUValue, zero_or_within(cert.u_value_window, &thermal.window));
    assessment.require(Check::RoofUValue, zero_or_within(cert.u_value_roof, &thermal.roof));
    assessment.require(Check::FloorUValue, zero_or_within(cert.u_value_floor, &thermal.floor));
    assessment.require(Check::WallUValue, within(cert.u_value_wall, &thermal.wall));

    let general = &ctx.tables.general;
    assessment.require(
        Check::ConstructionYear,
        cert.year_of_construction <= ctx.current_year,
    );
    assessment.require(
        Check::GroundFloorHeight,
        zero_or_within(cert.ground_floor_height, &general.ground_floor_height),
    );
    assessment.require(
        Check::RatingType,
        general
            .rating_types
            .iter()
            .any(|t| cert.type_of_rating.contains(t.as_str())),
    );
    assessment.require(
        Check::HeatingEfficiency,
        zero_or_any(cert.heating_efficiency, &general.heating_efficiency),
    );
    assessment.require(
        Check::WaterHeatingEfficiency,
        zero_or_any(cert.water_heating_efficiency, &general.water_heating_efficiency),
    );

    match ctx.tables.typology(&cert.dwelling_type) {
        Some(ranges) => {
            for (feature, range) in ranges {
                assessment.require(Check::Typology(*feature), within(cert.feature(*feature), range));
            }
        }
        None => assessment.require(
            Check::UnknownTypology,
            ctx.unknown_typology == UnknownTypologyPolicy::Pass,
        ),
    }

    assessment
}

// ---------------------------------------------------------------------------
// Batch classification
// ---------------------------------------------------------------------------

/// Result of splitting a batch into plausible and implausible records.
#[derive(Debug, Clone)]
pub struct Classification {
    pub kept: Batch,
    pub excluded: Batch,
    /// Check name -> number of records failing it.
    pub check_failures: BTreeMap<String, usize>,
    /// Dwelling types with no typology table entry.
    pub unknown_typologies: BTreeSet<String>,
}

/// Classify every record and partition the batch, preserving order.
#[instrument(skip_all, fields(rows = batch.len()))]
pub fn classify_batch(batch: Batch, ctx: &ClassifyContext<'_>) -> Classification {
    let mut check_failures: BTreeMap<String, usize> = BTreeMap::new();
    let mut unknown_typologies = BTreeSet::new();
    let mut mask = Vec::with_capacity(batch.len());

    for record in &batch.records {
        let dwelling_type = &record.certificate.dwelling_type;
        if ctx.tables.typology(dwelling_type).is_none() && !unknown_typologies.contains(dwelling_type) {
            debug!(
                dwelling_type = %dwelling_type,
                policy = ?ctx.unknown_typology,
                "dwelling type has no typology ranges"
            );
            unknown_typologies.insert(dwelling_type.clone());
        }

        let assessment = assess(record, ctx);
        for check in &assessment.failures {
            *check_failures.entry(check.name()).or_default() += 1;
        }
        mask.push(assessment.is_plausible());
    }

    let (kept, excluded) = batch.partition(&mask);
    debug!(kept = kept.len(), excluded = excluded.len(), "batch classified");
    Classification {
        kept,
        excluded,
        check_failures,
        unknown_typologies,
    }
}
