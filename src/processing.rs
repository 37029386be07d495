use crate::bucket::{bucketize, Gradient};
use crate::config::{AppConfig, IndicatorConfig};
use crate::error::MapError;
use crate::join::{join_areas, JoinMode};
use crate::label::hover_label;
use crate::legend::{configured_legend, derive_legend_labels, legend_drift, LegendDrift};
use crate::types::{AreaId, AreaRecord, BucketAssignment, GeoFeature, JoinedArea, LegendSpec, Rgb};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything derived for one indicator.
#[derive(Debug, Clone)]
pub struct IndicatorLayer {
    pub indicator: IndicatorConfig,
    // areas with a missing value have no entry
    pub assignments: BTreeMap<AreaId, BucketAssignment>,
    pub legend: LegendSpec,
}

/// Joined areas plus one layer per indicator. Immutable once built.
#[derive(Debug)]
pub struct MapDataset {
    pub areas: Vec<JoinedArea>,
    pub layers: Vec<IndicatorLayer>,
    pub no_data_color: Rgb,
    legends: Arc<[LegendSpec]>,
}

impl MapDataset {
    pub fn layer(&self, name_or_key: &str) -> Result<&IndicatorLayer, MapError> {
        self.layers
            .iter()
            .find(|l| l.indicator.key == name_or_key || l.indicator.name == name_or_key)
            .ok_or_else(|| MapError::UnknownIndicator {
                name: name_or_key.to_string(),
            })
    }

    pub fn legends(&self) -> Arc<[LegendSpec]> {
        Arc::clone(&self.legends)
    }

    pub fn fill_color(&self, layer: &IndicatorLayer, area_id: AreaId) -> Rgb {
        layer
            .assignments
            .get(&area_id)
            .map(|a| a.color)
            .unwrap_or(self.no_data_color)
    }

    pub fn label(&self, layer: &IndicatorLayer, area: &JoinedArea) -> String {
        hover_label(&area.name, area.value(&layer.indicator.key), layer.indicator.unit)
    }
}

/// Join, then bucketize every indicator column.
pub fn build_dataset(
    config: &AppConfig,
    records: Vec<AreaRecord>,
    features: Vec<GeoFeature>,
) -> Result<MapDataset, MapError> {
    let mode = if config.join.strict {
        JoinMode::Strict
    } else {
        JoinMode::Lenient
    };
    let areas = join_areas(records, features, mode)?;
    info!("Joined {} areas", areas.len());

    process_data(config, areas)
}

pub fn process_data(config: &AppConfig, areas: Vec<JoinedArea>) -> Result<MapDataset, MapError> {
    let (start, end, no_data_color) = config.style.colors()?;
    let gradient = Gradient::linear(start, end);

    let layers: Vec<IndicatorLayer> = config
        .indicators
        .par_iter()
        .map(|indicator| build_layer(indicator, &areas, &gradient))
        .collect();

    for layer in &layers {
        let missing = areas.len() - layer.assignments.len();
        if missing > 0 {
            warn!("{} areas have no value for '{}'", missing, layer.indicator.name);
        }
    }

    let legends: Arc<[LegendSpec]> = layers.iter().map(|l| l.legend.clone()).collect();

    Ok(MapDataset {
        areas,
        layers,
        no_data_color,
        legends,
    })
}

fn present_values(indicator: &IndicatorConfig, areas: &[JoinedArea]) -> Vec<(AreaId, f64)> {
    areas
        .iter()
        .filter_map(|a| a.value(&indicator.key).map(|v| (a.id, v)))
        .collect()
}

fn build_layer(indicator: &IndicatorConfig, areas: &[JoinedArea], gradient: &Gradient) -> IndicatorLayer {
    let values = present_values(indicator, areas);
    let assignments = bucketize(&indicator.key, &values, gradient)
        .into_iter()
        .map(|a| (a.area_id, a))
        .collect();

    IndicatorLayer {
        indicator: indicator.clone(),
        assignments,
        legend: configured_legend(indicator, gradient),
    }
}

/// Compares the configured legend labels with ranges recomputed from `areas`.
/// The configured labels are never modified.
pub fn check_legends(config: &AppConfig, areas: &[JoinedArea]) -> Vec<LegendDrift> {
    config
        .indicators
        .iter()
        .flat_map(|indicator| {
            let values: Vec<f64> = present_values(indicator, areas)
                .into_iter()
                .map(|(_, v)| v)
                .collect();
            legend_drift(indicator, &derive_legend_labels(&values, indicator.unit))
        })
        .collect()
}
