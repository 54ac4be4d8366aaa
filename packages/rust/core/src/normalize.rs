//! Value normalizer: county names, storey counts, rating labels, U-value corrections.
//!
//! Each pass rewrites fields of an existing record; no columns are added or
//! removed here.

use serde::Serialize;
use tracing::{debug, instrument};

use berclean_shared::Result;

use crate::derive::era_band;
use crate::record::{Batch, Certificate, Record};
use crate::tables::ReferenceTables;

/// County names, in match priority order.
pub const COUNTIES: [&str; 26] = [
    "Carlow",
    "Cavan",
    "Clare",
    "Cork",
    "Donegal",
    "Dublin",
    "Galway",
    "Kerry",
    "Kildare",
    "Kilkenny",
    "Laois",
    "Leitrim",
    "Limerick",
    "Longford",
    "Louth",
    "Mayo",
    "Meath",
    "Monaghan",
    "Offaly",
    "Roscommon",
    "Sligo",
    "Tipperary",
    "Waterford",
    "Westmeath",
    "Wexford",
    "Wicklow",
];

/// Storey counts at or above this are trusted as given.
pub const TRUSTED_STOREY_COUNT: f64 = 4.0;

/// How many values each pass changed in a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CorrectionCounts {
    pub county: usize,
    pub storeys: usize,
    pub wall_u_value: usize,
    pub roof_u_value: usize,
}

impl CorrectionCounts {
    pub fn add(&mut self, other: &CorrectionCounts) {
        self.county += other.county;
        self.storeys += other.storeys;
        self.wall_u_value += other.wall_u_value;
        self.roof_u_value += other.roof_u_value;
    }
}

/// First listed county contained in `raw` (case-sensitive), else the trimmed text.
pub fn correct_county(raw: &str) -> String {
    COUNTIES
        .iter()
        .find(|county| raw.contains(*county))
        .map(|county| county.to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}

/// Recount storeys below the trusted threshold from the upper floor heights.
///
/// The result is 1 (ground floor) plus the number of first/second/third floor
/// heights strictly greater than zero.
pub fn correct_storeys(certificate: &Certificate) -> Option<f64> {
    match certificate.no_storeys {
        Some(count) if count < TRUSTED_STOREY_COUNT => {
            let upper = certificate
                .upper_floor_heights()
                .iter()
                .filter(|h| h.is_some_and(|h| h > 0.0))
                .count();
            Some(1.0 + upper as f64)
        }
        other => other,
    }
}

pub fn normalize_rating(raw: &str) -> String {
    raw.trim().to_string()
}

/// Apply every normalization pass to one record.
///
/// Fails only when the record's era band has no correction table.
pub fn normalize_record(record: &mut Record, tables: &ReferenceTables) -> Result<CorrectionCounts> {
    let mut counts = CorrectionCounts::default();
    let cert = &mut record.certificate;

    let county = correct_county(&cert.county_name);
    if county != cert.county_name {
        counts.county += 1;
        cert.county_name = county;
    }

    let storeys = correct_storeys(cert);
    if storeys != cert.no_storeys {
        counts.storeys += 1;
        cert.no_storeys = storeys;
    }

    cert.energy_rating = normalize_rating(&cert.energy_rating);

    let band = record
        .derived
        .as_ref()
        .map(|d| d.era_band)
        .unwrap_or_else(|| era_band(cert.year_of_construction));

    // Band tables are required even when the value itself is absent.
    tables.wall_entries(band)?;
    tables.roof_entries(band)?;

    if let Some(u_value) = cert.u_value_wall {
        if let Some(corrected) = tables.wall_correction(band, u_value, &cert.first_wall_type)? {
            counts.wall_u_value += 1;
            cert.u_value_wall = Some(corrected);
        }
    }

    if let Some(u_value) = cert.u_value_roof {
        if let Some(corrected) = tables.roof_correction(band, u_value)? {
            counts.roof_u_value += 1;
            cert.u_value_roof = Some(corrected);
        }
    }

    Ok(counts)
}

/// Normalize every record of a batch. A lookup error fails the whole batch.
#[instrument(skip_all, fields(rows = batch.len()))]
pub fn normalize_batch(mut batch: Batch, tables: &ReferenceTables) -> Result<(Batch, CorrectionCounts)> {
    let mut counts = CorrectionCounts::default();
    for record in &mut batch.records {
        counts.add(&normalize_record(record, tables)?);
    }
    debug!(
        county = counts.county,
        storeys = counts.storeys,
        wall = counts.wall_u_value,
        roof = counts.roof_u_value,
        "values normalized"
    );
    Ok((batch, counts))
}
