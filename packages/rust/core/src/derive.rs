//! Column deriver: era band, thermal era, glazing ratio, volume, location.
//!
//! Every derived value is a pure function of the record's own fields.

use tracing::{debug, instrument};

use berclean_shared::{EraBand, Location, ThermalEra};

use crate::record::{Batch, Certificate, Column, ColumnSlot, Derived, DerivedField};

/// Upper (inclusive) bounds of bands A..J; anything later is K.
pub const ERA_CUT_POINTS: [i32; 10] = [1899, 1929, 1949, 1966, 1977, 1982, 1993, 1999, 2004, 2009];

/// Last construction year of the `Pre` thermal era.
pub const THERMAL_ERA_LAST_PRE_YEAR: i32 = 1977;

/// Bucket a construction year. A year equal to a cut point belongs to the
/// earlier band.
pub fn era_band(year: i32) -> EraBand {
    ERA_CUT_POINTS
        .iter()
        .position(|&cut| year <= cut)
        .map(|idx| EraBand::ALL[idx])
        .unwrap_or(EraBand::K)
}

pub fn thermal_era(year: i32) -> ThermalEra {
    if year <= THERMAL_ERA_LAST_PRE_YEAR {
        ThermalEra::Pre
    } else {
        ThermalEra::Post
    }
}

/// `window / wall`, or 0 when the wall area is 0 or either area is absent.
pub fn glazing_percent(window_area: Option<f64>, wall_area: Option<f64>) -> f64 {
    match (window_area, wall_area) {
        (Some(window), Some(wall)) if wall != 0.0 => window / wall,
        _ => 0.0,
    }
}

/// Ground-floor area times the summed storey heights (absent heights count as 0).
pub fn volume(certificate: &Certificate) -> Option<f64> {
    let heights = [
        certificate.ground_floor_height,
        certificate.first_floor_height,
        certificate.second_floor_height,
        certificate.third_floor_height,
    ];
    let total: f64 = heights.iter().map(|h| h.unwrap_or(0.0)).sum();
    certificate.ground_floor_area.map(|area| area * total)
}

/// Classify raw county text.
///
/// `"Dublin "` keeps its trailing space so that postal districts
/// ("Dublin 6") count as urban but "Co. Dublin" does not.
pub fn location(county: &str) -> Location {
    if county.contains("City") || county.contains("Dublin ") {
        Location::Urban
    } else if county.contains("Co.") {
        Location::Rural
    } else {
        Location::Unknown
    }
}

/// All derived values for one certificate.
pub fn derive(certificate: &Certificate) -> Derived {
    let year = certificate.year_of_construction;
    Derived {
        era_band: era_band(year),
        thermal_era: thermal_era(year),
        glazing_percent: glazing_percent(certificate.window_area, certificate.wall_area),
        volume: volume(certificate),
        location: location(&certificate.county_name),
    }
}

/// Compute derived values for every record and append the derived columns.
///
/// Pass-through columns that already carry a derived column's name (e.g. a
/// re-processed output file) are replaced by the recomputed values.
#[instrument(skip_all, fields(rows = batch.len()))]
pub fn add_derived_columns(mut batch: Batch) -> Batch {
    let derived_names: Vec<&str> = DerivedField::ALL.iter().map(|f| f.column_name()).collect();
    let before = batch.layout.len();
    batch.drop_passthrough(|name| derived_names.contains(&name));
    if batch.layout.len() != before {
        debug!(
            replaced = before - batch.layout.len(),
            "replacing pre-existing derived columns"
        );
    }
    batch
        .layout
        .retain(|slot| !matches!(slot.source, Column::Derived(_)));

    for field in DerivedField::ALL {
        batch.layout.push(ColumnSlot {
            name: field.column_name().to_string(),
            source: Column::Derived(field),
        });
    }

    for record in &mut batch.records {
        record.derived = Some(derive(&record.certificate));
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::{sample_row, sample_table};

    #[test]
    fn era_band_boundaries_are_right_inclusive() {
        assert_eq!(era_band(i32::MIN), EraBand::A);
        assert_eq!(era_band(1899), EraBand::A);
        assert_eq!(era_band(1900), EraBand::B);
        assert_eq!(era_band(1929), EraBand::B);
        assert_eq!(era_band(1966), EraBand::D);
        assert_eq!(era_band(1977), EraBand::E);
        assert_eq!(era_band(1978), EraBand::F);
        assert_eq!(era_band(2009), EraBand::J);
        assert_eq!(era_band(2010), EraBand::K);
        assert_eq!(era_band(i32::MAX), EraBand::K);
    }

    #[test]
    fn era_band_is_monotonic_over_years() {
        let mut previous = era_band(1800);
        for year in 1800..=2030 {
            let band = era_band(year);
            assert!(band >= previous, "band went backwards at {year}");
            previous = band;
        }
    }

    #[test]
    fn thermal_era_threshold() {
        assert_eq!(thermal_era(1977), ThermalEra::Pre);
        assert_eq!(thermal_era(1978), ThermalEra::Post);
        // The Pre era ends exactly where band E ends.
        assert_eq!(era_band(1977), EraBand::E);
    }

    #[test]
    fn glazing_percent_handles_zero_and_absent_walls() {
        assert_eq!(glazing_percent(Some(20.0), Some(100.0)), 0.2);
        assert_eq!(glazing_percent(Some(20.0), Some(0.0)), 0.0);
        assert_eq!(glazing_percent(Some(20.0), None), 0.0);
        assert_eq!(glazing_percent(None, Some(100.0)), 0.0);
        assert_eq!(glazing_percent(Some(0.0), Some(50.0)), 0.0);
    }

    #[test]
    fn volume_defaults_missing_heights_to_zero() {
        let certificate = Certificate {
            ground_floor_area: Some(50.0),
            ground_floor_height: Some(2.5),
            first_floor_height: Some(2.5),
            second_floor_height: None,
            third_floor_height: None,
            ..Certificate::default()
        };
        assert_eq!(volume(&certificate), Some(250.0));

        let no_area = Certificate {
            ground_floor_height: Some(2.5),
            ..Certificate::default()
        };
        assert_eq!(volume(&no_area), None);
    }

    #[test]
    fn location_rule_order() {
        assert_eq!(location("Cork City"), Location::Urban);
        assert_eq!(location("Dublin 15"), Location::Urban);
        assert_eq!(location("Co. Dublin"), Location::Rural);
        assert_eq!(location("Co. Kerry"), Location::Rural);
        assert_eq!(location("Dublin"), Location::Unknown);
        assert_eq!(location(""), Location::Unknown);
    }

    #[test]
    fn add_derived_columns_appends_in_order() {
        let batch = Batch::from_table(sample_table(vec![sample_row("1")])).unwrap();
        let width = batch.layout.len();
        let batch = add_derived_columns(batch);

        let names = batch.column_names();
        assert_eq!(names.len(), width + 5);
        assert_eq!(
            &names[width..],
            &["AgeBand", "ThermalEra", "GlazingPercent", "Volume", "Location"]
        );

        let derived = batch.records[0].derived.as_ref().unwrap();
        assert_eq!(derived.era_band, EraBand::G);
        assert_eq!(derived.thermal_era, ThermalEra::Post);
        assert_eq!(derived.glazing_percent, 0.2);
        assert_eq!(derived.volume, Some(500.0));
        assert_eq!(derived.location, Location::Rural);

        let table = batch.to_table();
        assert_eq!(&table.rows[0][width..], &["G", "Post", "0.2", "500", "rural"]);
    }

    #[test]
    fn add_derived_columns_replaces_existing_columns() {
        let mut table = sample_table(vec![sample_row("1")]);
        table.headers.push("AgeBand".into());
        table.rows[0].push("Z".into());

        let batch = add_derived_columns(Batch::from_table(table).unwrap());
        let names = batch.column_names();
        assert_eq!(names.iter().filter(|n| *n == "AgeBand").count(), 1);
        assert_eq!(batch.to_table().rows[0][names.len() - 5], "G");

        // Deriving twice does not duplicate the columns either.
        let again = add_derived_columns(batch.clone());
        assert_eq!(again.column_names(), batch.column_names());
    }
}
