//! Certificate records and batches.
//!
//! A [`Batch`] is the typed form of a raw [`Table`]: every required column is
//! parsed into a [`Certificate`] field, every other column is carried through
//! untouched, and derived columns are appended by the column deriver. Column
//! order of the input is preserved when the batch is rendered back.

use berclean_shared::{BerCleanError, EraBand, Location, Result, Table, ThermalEra};

use crate::tables::Feature;

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// A required input column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    YearOfConstruction,
    DwellingType,
    CountyName,
    LivingAreaPercent,
    WallArea,
    FloorArea,
    GroundFloorArea,
    RoofArea,
    WindowArea,
    DoorArea,
    GroundFloorHeight,
    FirstFloorHeight,
    SecondFloorHeight,
    ThirdFloorHeight,
    NoStoreys,
    EnergyRating,
    TypeOfRating,
    UValueWall,
    UValueRoof,
    UValueFloor,
    UValueWindow,
    UValueDoor,
    HeatingEfficiency,
    WaterHeatingEfficiency,
    FirstWallType,
}

impl Field {
    pub const ALL: [Field; 25] = [
        Field::YearOfConstruction,
        Field::DwellingType,
        Field::CountyName,
        Field::LivingAreaPercent,
        Field::WallArea,
        Field::FloorArea,
        Field::GroundFloorArea,
        Field::RoofArea,
        Field::WindowArea,
        Field::DoorArea,
        Field::GroundFloorHeight,
        Field::FirstFloorHeight,
        Field::SecondFloorHeight,
        Field::ThirdFloorHeight,
        Field::NoStoreys,
        Field::EnergyRating,
        Field::TypeOfRating,
        Field::UValueWall,
        Field::UValueRoof,
        Field::UValueFloor,
        Field::UValueWindow,
        Field::UValueDoor,
        Field::HeatingEfficiency,
        Field::WaterHeatingEfficiency,
        Field::FirstWallType,
    ];

    /// Header of the column in certificate files.
    pub fn column_name(self) -> &'static str {
        match self {
            Field::YearOfConstruction => "Year_of_Construction",
            Field::DwellingType => "DwellingTypeDescr",
            Field::CountyName => "CountyName",
            Field::LivingAreaPercent => "LivingAreaPercent",
            Field::WallArea => "WallArea",
            Field::FloorArea => "FloorArea",
            Field::GroundFloorArea => "GroundFloorArea(sq m)",
            Field::RoofArea => "RoofArea",
            Field::WindowArea => "WindowArea",
            Field::DoorArea => "DoorArea",
            Field::GroundFloorHeight => "GroundFloorHeight",
            Field::FirstFloorHeight => "FirstFloorHeight",
            Field::SecondFloorHeight => "SecondFloorHeight",
            Field::ThirdFloorHeight => "ThirdFloorHeight",
            Field::NoStoreys => "NoStoreys",
            Field::EnergyRating => "EnergyRating",
            Field::TypeOfRating => "TypeofRating",
            Field::UValueWall => "UValueWall",
            Field::UValueRoof => "UValueRoof",
            Field::UValueFloor => "UValueFloor",
            Field::UValueWindow => "UValueWindow",
            Field::UValueDoor => "UvalueDoor",
            Field::HeatingEfficiency => "HSMainSystemEfficiency",
            Field::WaterHeatingEfficiency => "WHMainSystemEff",
            Field::FirstWallType => "FirstWallType_Description",
        }
    }
}

// ---------------------------------------------------------------------------
// Certificate
// ---------------------------------------------------------------------------

/// Typed view of the required columns of one certificate row.
///
/// Numeric fields are `None` when the cell was empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Certificate {
    pub year_of_construction: i32,
    pub dwelling_type: String,
    pub county_name: String,
    pub living_area_percent: Option<f64>,
    pub wall_area: Option<f64>,
    pub floor_area: Option<f64>,
    pub ground_floor_area: Option<f64>,
    pub roof_area: Option<f64>,
    pub window_area: Option<f64>,
    pub door_area: Option<f64>,
    pub ground_floor_height: Option<f64>,
    pub first_floor_height: Option<f64>,
    pub second_floor_height: Option<f64>,
    pub third_floor_height: Option<f64>,
    pub no_storeys: Option<f64>,
    pub energy_rating: String,
    pub type_of_rating: String,
    pub u_value_wall: Option<f64>,
    pub u_value_roof: Option<f64>,
    pub u_value_floor: Option<f64>,
    pub u_value_window: Option<f64>,
    pub u_value_door: Option<f64>,
    pub heating_efficiency: Option<f64>,
    pub water_heating_efficiency: Option<f64>,
    pub first_wall_type: String,
}

impl Certificate {
    /// Build a certificate from a cell accessor; `row` is only used in errors.
    fn parse<'a>(row: usize, cell: impl Fn(Field) -> &'a str) -> Result<Self> {
        let num = |field: Field| parse_number(row, field, cell(field));
        Ok(Self {
            year_of_construction: parse_year(row, cell(Field::YearOfConstruction))?,
            dwelling_type: cell(Field::DwellingType).to_string(),
            county_name: cell(Field::CountyName).to_string(),
            living_area_percent: num(Field::LivingAreaPercent)?,
            wall_area: num(Field::WallArea)?,
            floor_area: num(Field::FloorArea)?,
            ground_floor_area: num(Field::GroundFloorArea)?,
            roof_area: num(Field::RoofArea)?,
            window_area: num(Field::WindowArea)?,
            door_area: num(Field::DoorArea)?,
            ground_floor_height: num(Field::GroundFloorHeight)?,
            first_floor_height: num(Field::FirstFloorHeight)?,
            second_floor_height: num(Field::SecondFloorHeight)?,
            third_floor_height: num(Field::ThirdFloorHeight)?,
            no_storeys: num(Field::NoStoreys)?,
            energy_rating: cell(Field::EnergyRating).to_string(),
            type_of_rating: cell(Field::TypeOfRating).to_string(),
            u_value_wall: num(Field::UValueWall)?,
            u_value_roof: num(Field::UValueRoof)?,
            u_value_floor: num(Field::UValueFloor)?,
            u_value_window: num(Field::UValueWindow)?,
            u_value_door: num(Field::UValueDoor)?,
            heating_efficiency: num(Field::HeatingEfficiency)?,
            water_heating_efficiency: num(Field::WaterHeatingEfficiency)?,
            first_wall_type: cell(Field::FirstWallType).to_string(),
        })
    }

    /// Render a field back to cell text.
    pub fn render(&self, field: Field) -> String {
        match field {
            Field::YearOfConstruction => self.year_of_construction.to_string(),
            Field::DwellingType => self.dwelling_type.clone(),
            Field::CountyName => self.county_name.clone(),
            Field::LivingAreaPercent => format_number(self.living_area_percent),
            Field::WallArea => format_number(self.wall_area),
            Field::FloorArea => format_number(self.floor_area),
            Field::GroundFloorArea => format_number(self.ground_floor_area),
            Field::RoofArea => format_number(self.roof_area),
            Field::WindowArea => format_number(self.window_area),
            Field::DoorArea => format_number(self.door_area),
            Field::GroundFloorHeight => format_number(self.ground_floor_height),
            Field::FirstFloorHeight => format_number(self.first_floor_height),
            Field::SecondFloorHeight => format_number(self.second_floor_height),
            Field::ThirdFloorHeight => format_number(self.third_floor_height),
            Field::NoStoreys => format_number(self.no_storeys),
            Field::EnergyRating => self.energy_rating.clone(),
            Field::TypeOfRating => self.type_of_rating.clone(),
            Field::UValueWall => format_number(self.u_value_wall),
            Field::UValueRoof => format_number(self.u_value_roof),
            Field::UValueFloor => format_number(self.u_value_floor),
            Field::UValueWindow => format_number(self.u_value_window),
            Field::UValueDoor => format_number(self.u_value_door),
            Field::HeatingEfficiency => format_number(self.heating_efficiency),
            Field::WaterHeatingEfficiency => format_number(self.water_heating_efficiency),
            Field::FirstWallType => self.first_wall_type.clone(),
        }
    }

    /// Value of a typology feature.
    pub fn feature(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::LivingAreaPercent => self.living_area_percent,
            Feature::WallArea => self.wall_area,
            Feature::FloorArea => self.floor_area,
            Feature::GroundFloorArea => self.ground_floor_area,
            Feature::RoofArea => self.roof_area,
            Feature::WindowArea => self.window_area,
            Feature::DoorArea => self.door_area,
        }
    }

    /// Heights of the first, second and third floors (ground floor excluded).
    pub fn upper_floor_heights(&self) -> [Option<f64>; 3] {
        [
            self.first_floor_height,
            self.second_floor_height,
            self.third_floor_height,
        ]
    }
}

// ---------------------------------------------------------------------------
// Derived columns
// ---------------------------------------------------------------------------

/// A column computed by the column deriver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedField {
    AgeBand,
    ThermalEra,
    GlazingPercent,
    Volume,
    Location,
}

impl DerivedField {
    /// Append order of derived columns.
    pub const ALL: [DerivedField; 5] = [
        DerivedField::AgeBand,
        DerivedField::ThermalEra,
        DerivedField::GlazingPercent,
        DerivedField::Volume,
        DerivedField::Location,
    ];

    pub fn column_name(self) -> &'static str {
        match self {
            DerivedField::AgeBand => "AgeBand",
            DerivedField::ThermalEra => "ThermalEra",
            DerivedField::GlazingPercent => "GlazingPercent",
            DerivedField::Volume => "Volume",
            DerivedField::Location => "Location",
        }
    }
}

/// Values of the derived columns for one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
    pub era_band: EraBand,
    pub thermal_era: ThermalEra,
    pub glazing_percent: f64,
    pub volume: Option<f64>,
    pub location: Location,
}

impl Derived {
    pub fn render(&self, field: DerivedField) -> String {
        match field {
            DerivedField::AgeBand => self.era_band.to_string(),
            DerivedField::ThermalEra => self.thermal_era.to_string(),
            DerivedField::GlazingPercent => format_number(Some(self.glazing_percent)),
            DerivedField::Volume => format_number(self.volume),
            DerivedField::Location => self.location.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Record / Batch
// ---------------------------------------------------------------------------

/// Where an output column takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// A typed certificate field.
    Field(Field),
    /// Index into [`Record::passthrough`].
    Passthrough(usize),
    /// A derived value.
    Derived(DerivedField),
}

/// A named output column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSlot {
    pub name: String,
    pub source: Column,
}

/// One certificate row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub certificate: Certificate,
    /// Cells of columns the pipeline does not interpret, in layout order.
    pub passthrough: Vec<String>,
    /// Set by the column deriver.
    pub derived: Option<Derived>,
}

/// An ordered set of records sharing one column layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub layout: Vec<ColumnSlot>,
    pub records: Vec<Record>,
}

impl Batch {
    /// Parse a raw table, resolving every required column by header name.
    ///
    /// Fails on the first problem: missing columns (all listed), a row with
    /// the wrong number of cells, or a cell that does not parse.
    pub fn from_table(table: Table) -> Result<Self> {
        let headers: Vec<String> = table.headers.iter().map(|h| normalize_header(h)).collect();

        let mut field_index = Vec::with_capacity(Field::ALL.len());
        let mut missing = Vec::new();
        for field in Field::ALL {
            match headers.iter().position(|h| h == field.column_name()) {
                Some(idx) => field_index.push((field, idx)),
                None => missing.push(field.column_name().to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(BerCleanError::Schema { missing });
        }

        let mut layout = Vec::with_capacity(headers.len());
        let mut passthrough_index = Vec::new();
        for (idx, name) in headers.iter().enumerate() {
            let source = match field_index.iter().find(|(_, i)| *i == idx) {
                Some((field, _)) => Column::Field(*field),
                None => {
                    passthrough_index.push(idx);
                    Column::Passthrough(passthrough_index.len() - 1)
                }
            };
            layout.push(ColumnSlot {
                name: name.clone(),
                source,
            });
        }

        let mut records = Vec::with_capacity(table.rows.len());
        for (row_idx, row) in table.rows.into_iter().enumerate() {
            if row.len() != headers.len() {
                return Err(BerCleanError::parse(
                    row_idx,
                    "*",
                    format!("expected {} cells, found {}", headers.len(), row.len()),
                ));
            }

            let certificate = Certificate::parse(row_idx, |field| {
                let idx = field_index
                    .iter()
                    .find(|(f, _)| *f == field)
                    .map(|(_, i)| *i)
                    .unwrap_or_default();
                row[idx].as_str()
            })?;
            let passthrough = passthrough_index.iter().map(|&i| row[i].clone()).collect();

            records.push(Record {
                certificate,
                passthrough,
                derived: None,
            });
        }

        Ok(Self { layout, records })
    }

    /// Render the batch back to a raw table.
    pub fn to_table(&self) -> Table {
        let headers = self.column_names();
        let rows = self
            .records
            .iter()
            .map(|record| {
                self.layout
                    .iter()
                    .map(|slot| match slot.source {
                        Column::Field(field) => record.certificate.render(field),
                        Column::Passthrough(i) => record.passthrough.get(i).cloned().unwrap_or_default(),
                        Column::Derived(field) => record
                            .derived
                            .as_ref()
                            .map(|d| d.render(field))
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .collect();
        Table { headers, rows }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.layout.iter().map(|slot| slot.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every pass-through column whose name matches `drop`.
    ///
    /// Required and derived columns are never dropped.
    pub fn drop_passthrough(&mut self, drop: impl Fn(&str) -> bool) {
        let mut keep = Vec::new();
        let mut layout = Vec::with_capacity(self.layout.len());
        for slot in self.layout.drain(..) {
            match slot.source {
                Column::Passthrough(_) if drop(&slot.name) => {}
                Column::Passthrough(i) => {
                    keep.push(i);
                    layout.push(ColumnSlot {
                        name: slot.name,
                        source: Column::Passthrough(keep.len() - 1),
                    });
                }
                _ => layout.push(slot),
            }
        }
        self.layout = layout;

        for record in &mut self.records {
            let old = std::mem::take(&mut record.passthrough);
            record.passthrough = keep.iter().filter_map(|&i| old.get(i).cloned()).collect();
        }
    }

    /// Split into `(matching, rest)` by a per-record mask, preserving order.
    pub fn partition(self, mask: &[bool]) -> (Batch, Batch) {
        let mut kept = Vec::new();
        let mut excluded = Vec::new();
        for (record, &keep) in self.records.into_iter().zip(mask) {
            if keep {
                kept.push(record);
            } else {
                excluded.push(record);
            }
        }
        (
            Batch {
                layout: self.layout.clone(),
                records: kept,
            },
            Batch {
                layout: self.layout,
                records: excluded,
            },
        )
    }
}

// ---------------------------------------------------------------------------
// Cell helpers
// ---------------------------------------------------------------------------

fn normalize_header(name: &str) -> String {
    // UTF-8 exports sometimes carry a BOM on the first header.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

fn parse_number(row: usize, field: Field, raw: &str) -> Result<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let value: f64 = raw.parse().map_err(|_| {
        BerCleanError::parse(row, field.column_name(), format!("`{raw}` is not a number"))
    })?;
    Ok((!value.is_nan()).then_some(value))
}

fn parse_year(row: usize, raw: &str) -> Result<i32> {
    let column = Field::YearOfConstruction.column_name();
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(BerCleanError::parse(row, column, "year of construction is missing"));
    }
    if let Ok(year) = raw.parse::<i32>() {
        return Ok(year);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() <= f64::from(i32::MAX) => Ok(v as i32),
        _ => Err(BerCleanError::parse(row, column, format!("`{raw}` is not a whole year"))),
    }
}

/// Shortest round-trip text for a number; integral values have no fraction.
pub fn format_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
