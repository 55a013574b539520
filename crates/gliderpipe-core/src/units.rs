use once_cell::sync::Lazy;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::teos10;

/// Elementwise conversion applied to one column. Every formula reads the
/// values the column (and any dependency columns) had before the conversion
/// pass started, so the outcome does not depend on spec order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Formula {
    /// value * factor
    Scale { factor: f64 },
    /// value * scale + offset
    ScaleOffset { scale: f64, offset: f64 },
    /// The unit label changes, values pass through bit-identical.
    Relabel,
    /// umol/L to umol/kg, dividing by in-situ density derived from the named
    /// sibling columns (conductivity in mS/cm, temperature in degC, pressure
    /// in dbar). Rows missing any dependency produce a missing value.
    OxygenMolarToMass {
        temperature: String,
        conductivity: String,
        pressure: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnUnitSpec {
    pub column: String,
    pub source_unit: String,
    pub target_unit: String,
    pub formula: Formula,
}

#[derive(Debug)]
pub struct ConvertOutcome {
    pub dataframe: DataFrame,
    pub converted_columns: Vec<String>,
    pub coerced_cells: usize,
    pub warnings: Vec<String>,
}

/// Built-in conversion table for the SeaExplorer payload sensors.
/// Geographic coordinates are deliberately absent: they stay in decimal
/// degrees.
static CANONICAL_UNIT_SPECS: Lazy<Vec<ColumnUnitSpec>> = Lazy::new(|| {
    vec![
        ColumnUnitSpec {
            column: "FLBBCD_BB_700_SCALED".to_string(),
            source_unit: "m^-1 sr^-1".to_string(),
            target_unit: "NTU".to_string(),
            // NTU = beta / 0.002727
            formula: Formula::ScaleOffset {
                scale: 366.70,
                offset: 0.0,
            },
        },
        ColumnUnitSpec {
            column: "FLBBCD_CHL_SCALED".to_string(),
            source_unit: "ug/L".to_string(),
            target_unit: "mg/m^3".to_string(),
            formula: Formula::Relabel,
        },
        ColumnUnitSpec {
            column: "LEGATO_CONDUCTIVITY".to_string(),
            source_unit: "mS/cm".to_string(),
            target_unit: "S/m".to_string(),
            formula: Formula::Scale { factor: 0.1 },
        },
        ColumnUnitSpec {
            column: "LEGATO_CODA_DO".to_string(),
            source_unit: "umol/L".to_string(),
            target_unit: "umol/kg".to_string(),
            formula: Formula::OxygenMolarToMass {
                temperature: "LEGATO_TEMPERATURE".to_string(),
                conductivity: "LEGATO_CONDUCTIVITY".to_string(),
                pressure: "LEGATO_PRESSURE".to_string(),
            },
        },
    ]
});

pub fn canonical_unit_specs() -> Vec<ColumnUnitSpec> {
    CANONICAL_UNIT_SPECS.clone()
}

/// Applies every spec whose column exists in the dataset. Columns without a
/// spec pass through unchanged. Malformed cells coerce to missing and are
/// counted, never fatal.
pub fn convert_units(input: &DataFrame, specs: &[ColumnUnitSpec]) -> Result<ConvertOutcome> {
    let mut dataframe = input.clone();
    let mut converted_columns = Vec::new();
    let mut coerced_cells = 0usize;
    let mut warnings = Vec::new();

    for spec in specs {
        if input.column(&spec.column).is_err() {
            debug!(column = spec.column.as_str(), "column absent, conversion skipped");
            continue;
        }

        match &spec.formula {
            Formula::Relabel => {}
            Formula::Scale { factor } => {
                let (values, coerced) = numeric_values(input, &spec.column)?;
                coerced_cells += coerced;
                let scaled: Vec<Option<f64>> = values
                    .into_iter()
                    .map(|value| value.map(|v| v * factor))
                    .collect();
                dataframe
                    .with_column(Series::new(spec.column.as_str().into(), scaled))?;
            }
            Formula::ScaleOffset { scale, offset } => {
                let (values, coerced) = numeric_values(input, &spec.column)?;
                coerced_cells += coerced;
                let scaled: Vec<Option<f64>> = values
                    .into_iter()
                    .map(|value| value.map(|v| v * scale + offset))
                    .collect();
                dataframe
                    .with_column(Series::new(spec.column.as_str().into(), scaled))?;
            }
            Formula::OxygenMolarToMass {
                temperature,
                conductivity,
                pressure,
            } => {
                let output =
                    convert_oxygen(input, spec, temperature, conductivity, pressure, &mut warnings)?;
                match output {
                    Some((values, coerced)) => {
                        coerced_cells += coerced;
                        dataframe
                            .with_column(Series::new(spec.column.as_str().into(), values))?;
                    }
                    None => continue,
                }
            }
        }

        info!(
            column = spec.column.as_str(),
            from = spec.source_unit.as_str(),
            to = spec.target_unit.as_str(),
            "applied unit conversion"
        );
        converted_columns.push(spec.column.clone());
    }

    Ok(ConvertOutcome {
        dataframe,
        converted_columns,
        coerced_cells,
        warnings,
    })
}

type OxygenColumn = Option<(Vec<Option<f64>>, usize)>;

fn convert_oxygen(
    input: &DataFrame,
    spec: &ColumnUnitSpec,
    temperature: &str,
    conductivity: &str,
    pressure: &str,
    warnings: &mut Vec<String>,
) -> Result<OxygenColumn> {
    for dependency in [temperature, conductivity, pressure] {
        if input.column(dependency).is_err() {
            warnings.push(format!(
                "oxygen column {} left in {}: dependency column {} is absent",
                spec.column, spec.source_unit, dependency
            ));
            return Ok(None);
        }
    }

    let (oxygen, coerced) = numeric_values(input, &spec.column)?;
    let (temp, temp_coerced) = numeric_values(input, temperature)?;
    let (cond, cond_coerced) = numeric_values(input, conductivity)?;
    let (pres, pres_coerced) = numeric_values(input, pressure)?;

    for (name, count) in [
        (temperature, temp_coerced),
        (conductivity, cond_coerced),
        (pressure, pres_coerced),
    ] {
        if count > 0 {
            warnings.push(format!(
                "{count} unparseable cells in oxygen dependency column {name}"
            ));
        }
    }

    let mut values = Vec::with_capacity(oxygen.len());
    let mut rows_without_density = 0usize;
    for i in 0..oxygen.len() {
        let converted = match (oxygen[i], temp[i], cond[i], pres[i]) {
            (Some(o2), Some(t), Some(c), Some(p)) => {
                // umol/L divided by density in kg/L
                teos10::density_from_sensors(c, t, p).map(|rho| o2 * 1000.0 / rho)
            }
            _ => None,
        };
        if converted.is_none() && oxygen[i].is_some() {
            rows_without_density += 1;
        }
        values.push(converted);
    }

    if rows_without_density > 0 {
        warnings.push(format!(
            "{rows_without_density} oxygen values set to missing: no usable density for the row"
        ));
    }

    Ok(Some((values, coerced)))
}

/// Per-row f64 view of a column. String columns parse cell by cell; a
/// non-empty cell that fails to parse coerces to missing and is counted.
fn numeric_values(df: &DataFrame, name: &str) -> Result<(Vec<Option<f64>>, usize)> {
    let column = df.column(name)?;
    match column.dtype() {
        DataType::String => {
            let mut coerced = 0usize;
            let mut values = Vec::with_capacity(column.len());
            for cell in column.str()?.into_iter() {
                let value = match cell {
                    None => None,
                    Some(raw) => {
                        let trimmed = raw.trim();
                        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
                            None
                        } else {
                            match trimmed.parse::<f64>() {
                                Ok(parsed) => Some(parsed),
                                Err(_) => {
                                    coerced += 1;
                                    None
                                }
                            }
                        }
                    }
                };
                values.push(value);
            }
            Ok((values, coerced))
        }
        _ => {
            let cast = column.cast(&DataType::Float64)?;
            Ok((cast.f64()?.into_iter().collect(), 0))
        }
    }
}
