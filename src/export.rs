use crate::config::AppConfig;
use crate::processing::{IndicatorLayer, MapDataset};
use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

const INDEX_TEMPLATE: &str = include_str!("assets/index.html");

/// One feature per area, carrying everything the web map needs to draw it.
pub fn layer_collection(dataset: &MapDataset, layer: &IndicatorLayer) -> FeatureCollection {
    let features = dataset
        .areas
        .iter()
        .map(|area| {
            let mut properties = JsonObject::new();
            properties.insert("area_id".to_string(), JsonValue::from(area.id));
            properties.insert("area_name".to_string(), JsonValue::from(area.name.clone()));
            properties.insert("layer".to_string(), JsonValue::from(layer.indicator.name.clone()));
            properties.insert(
                "bucket".to_string(),
                layer
                    .assignments
                    .get(&area.id)
                    .map(|a| JsonValue::from(a.bucket))
                    .unwrap_or(JsonValue::Null),
            );
            properties.insert(
                "fill".to_string(),
                JsonValue::from(dataset.fill_color(layer, area.id).to_hex()),
            );
            properties.insert("label".to_string(), JsonValue::from(dataset.label(layer, area)));

            Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::from(&area.geometry))),
                id: Some(geojson::feature::Id::Number(area.id.into())),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[derive(Serialize)]
struct LayerEntry<'a> {
    key: &'a str,
    name: &'a str,
    url: String,
}

#[derive(Serialize)]
struct PageSettings<'a> {
    center: [f64; 2],
    zoom: u8,
    tile_url: &'a str,
    attribution: &'a str,
    layers: Vec<LayerEntry<'a>>,
}

pub fn index_html(config: &AppConfig, dataset: &MapDataset) -> Result<String> {
    let settings = PageSettings {
        center: config.map.center,
        zoom: config.map.zoom,
        tile_url: &config.map.tile_url,
        attribution: &config.map.attribution,
        layers: dataset
            .layers
            .iter()
            .map(|l| LayerEntry {
                key: &l.indicator.key,
                name: &l.indicator.name,
                url: format!("layers/{}.geojson", l.indicator.key),
            })
            .collect(),
    };
    let settings = serde_json::to_string(&settings)?;
    let legends = serde_json::to_string(&*dataset.legends())?;

    Ok(INDEX_TEMPLATE
        .replace("__SETTINGS__", &settings)
        .replace("__LEGENDS__", &legends))
}

/// Writes `layers/<key>.geojson`, `legends.json` and `index.html` under `dir`.
pub fn write_outputs(config: &AppConfig, dataset: &MapDataset, dir: &Path) -> Result<()> {
    let layer_dir = dir.join("layers");
    fs::create_dir_all(&layer_dir).context("Failed to create layer directory")?;

    for layer in &dataset.layers {
        let path = layer_dir.join(format!("{}.geojson", layer.indicator.key));
        let collection = layer_collection(dataset, layer);
        fs::write(&path, serde_json::to_string(&collection)?)
            .with_context(|| format!("Failed to write layer {:?}", path))?;
        info!("Wrote {:?}", path);
    }

    let legends_path = dir.join("legends.json");
    let legends = serde_json::to_string_pretty(&*dataset.legends())?;
    fs::write(&legends_path, legends)
        .with_context(|| format!("Failed to write {:?}", legends_path))?;

    let index_path = dir.join("index.html");
    fs::write(&index_path, index_html(config, dataset)?)
        .with_context(|| format!("Failed to write {:?}", index_path))?;

    Ok(())
}
