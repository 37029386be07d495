use crate::config::{AppConfig, IndicatorConfig, InputConfig};
use crate::error::{DataSide, MapError};
use crate::types::{AreaId, AreaRecord, GeoFeature};
use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use geo::MultiPolygon;
use geojson::GeoJson;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// Loads both inputs named in the config. Nothing is joined yet.
pub fn load_data(config: &AppConfig) -> Result<(Vec<AreaRecord>, Vec<GeoFeature>)> {
    let file = File::open(&config.input.data_csv)
        .with_context(|| format!("Failed to open CSV file: {:?}", config.input.data_csv))?;
    let records = read_area_records(file, &config.input, &config.indicators)?;
    info!("Loaded CSV data for {} areas", records.len());

    let features = load_geometry(&config.input.geometry, &config.input.join_column_shape)?;
    info!("Loaded geometry for {} areas", features.len());

    Ok((records, features))
}

pub fn load_geometry(path: &Path, join_column: &str) -> Result<Vec<GeoFeature>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .ok_or_else(|| anyhow!("Input geometry file has no extension"))?;

    match extension.as_str() {
        "shp" => load_shapefile(path, join_column),
        "json" | "geojson" => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open GeoJSON file: {:?}", path))?;
            read_geojson_features(BufReader::new(file), join_column)
        }
        _ => Err(anyhow!("Unsupported geometry format: {}", extension)),
    }
}

pub fn read_area_records<R: Read>(
    reader: R,
    input: &InputConfig,
    indicators: &[IndicatorConfig],
) -> Result<Vec<AreaRecord>> {
    let mut rdr = ReaderBuilder::new().from_reader(reader);
    let headers = rdr.headers().context("Failed to read CSV header")?.clone();

    let column_index = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| MapError::MissingField {
                side: DataSide::Table,
                field: name.to_string(),
            })
    };

    let join_idx = column_index(&input.join_column_csv)?;
    let name_idx = column_index(&input.name_column_csv)?;
    let indicator_idx = indicators
        .iter()
        .map(|i| column_index(&i.column).map(|idx| (i, idx)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut records = Vec::new();

    for (i, result) in rdr.records().enumerate() {
        let record = result.context("Failed to read CSV record")?;
        let row = record.position().map(|p| p.line() as usize).unwrap_or(i + 2);

        let raw_id = record.get(join_idx).unwrap_or("");
        let Some(id) = parse_area_id(raw_id, &input.join_column_csv, row)? else {
            // citywide aggregate row carries no area number
            debug!("Skipping CSV row {} without area number", row);
            continue;
        };

        let mut values = BTreeMap::new();
        for (indicator, idx) in &indicator_idx {
            let raw = record.get(*idx).unwrap_or("");
            values.insert(indicator.key.clone(), parse_value(raw, &indicator.column, row)?);
        }

        records.push(AreaRecord {
            id,
            name: record.get(name_idx).unwrap_or("").trim().to_string(),
            values,
        });
    }

    Ok(records)
}

/// Empty -> `None`. Accepts `35` and `35.0`.
pub fn parse_area_id(raw: &str, column: &str, row: usize) -> Result<Option<AreaId>, MapError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(id) = raw.parse::<AreaId>() {
        return Ok(Some(id));
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= AreaId::MAX as f64 => {
            Ok(Some(v as AreaId))
        }
        _ => Err(MapError::MalformedNumeric {
            column: column.to_string(),
            row,
            value: raw.to_string(),
        }),
    }
}

/// Empty -> `None`; anything that is not a finite number is an error.
pub fn parse_value(raw: &str, column: &str, row: usize) -> Result<Option<f64>, MapError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(MapError::MalformedNumeric {
            column: column.to_string(),
            row,
            value: raw.to_string(),
        }),
    }
}

pub fn read_geojson_features<R: Read>(reader: R, join_column: &str) -> Result<Vec<GeoFeature>> {
    // Loads the whole collection into memory; 77 polygons.
    let geojson = GeoJson::from_reader(reader).context("Failed to parse GeoJSON")?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("GeoJSON must be a FeatureCollection")),
    };

    let mut features = Vec::with_capacity(collection.features.len());

    for (row, feature) in collection.features.into_iter().enumerate() {
        let id_val = feature
            .properties
            .as_ref()
            .and_then(|props| props.get(join_column));

        let raw_id = match id_val {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => {
                return Err(MapError::MissingField {
                    side: DataSide::Geometry,
                    field: join_column.to_string(),
                }
                .into())
            }
        };
        let id = parse_area_id(&raw_id, join_column, row)?.ok_or_else(|| MapError::MissingField {
            side: DataSide::Geometry,
            field: join_column.to_string(),
        })?;

        let geometry = match feature.geometry {
            Some(geom) => {
                let converted: geo::Geometry<f64> =
                    geom.value.try_into().map_err(|e| MapError::MalformedGeometry {
                        id,
                        reason: format!("{:?}", e),
                    })?;
                polygonal(id, converted)?
            }
            None => {
                return Err(MapError::MalformedGeometry {
                    id,
                    reason: "feature has no geometry".to_string(),
                }
                .into())
            }
        };

        features.push(GeoFeature { id, geometry });
    }

    Ok(features)
}

fn polygonal(id: AreaId, geometry: geo::Geometry<f64>) -> Result<MultiPolygon<f64>, MapError> {
    match geometry {
        geo::Geometry::MultiPolygon(mp) => Ok(mp),
        geo::Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p])),
        _ => Err(MapError::MalformedGeometry {
            id,
            reason: "expected Polygon or MultiPolygon".to_string(),
        }),
    }
}

fn load_shapefile(path: &Path, join_column: &str) -> Result<Vec<GeoFeature>> {
    let mut reader = shapefile::Reader::from_path(path)
        .with_context(|| format!("Failed to open Shapefile: {:?}", path))?;

    let mut features = Vec::new();

    for (row, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result?;

        let missing = || MapError::MissingField {
            side: DataSide::Geometry,
            field: join_column.to_string(),
        };
        let raw_id = match record.get(join_column).ok_or_else(missing)? {
            shapefile::dbase::FieldValue::Character(Some(s)) => s.clone(),
            shapefile::dbase::FieldValue::Numeric(Some(n)) => n.to_string(),
            _ => return Err(missing().into()),
        };
        let id = parse_area_id(&raw_id, join_column, row)?.ok_or_else(missing)?;

        let converted: Result<MultiPolygon<f64>, String> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon.try_into().map_err(|e| format!("{:?}", e)),
            shapefile::Shape::PolygonM(polygon) => polygon.try_into().map_err(|e| format!("{:?}", e)),
            shapefile::Shape::PolygonZ(polygon) => polygon.try_into().map_err(|e| format!("{:?}", e)),
            other => Err(format!("unsupported shape type {:?}", other.shapetype())),
        };
        let geometry = converted.map_err(|reason| MapError::MalformedGeometry { id, reason })?;

        features.push(GeoFeature { id, geometry });
    }

    Ok(features)
}
