use crate::bucket::{bucket_for_rank, ranks, Gradient, BUCKET_COUNT};
use crate::config::IndicatorConfig;
use crate::error::MapError;
use crate::label::{format_bound, MISSING_VALUE};
use crate::types::{LegendEntry, LegendSpec, Unit};
use std::sync::Arc;
use tracing::debug;

pub const LEGEND_TITLE: &str = "Legend";

/// Legend built from the configured range labels, not from live data.
pub fn configured_legend(indicator: &IndicatorConfig, gradient: &Gradient) -> LegendSpec {
    let entries = gradient
        .colors()
        .iter()
        .zip(&indicator.legend)
        .map(|(color, label)| LegendEntry {
            color: color.to_hex(),
            label: label.clone(),
        })
        .collect();

    LegendSpec {
        indicator: indicator.key.clone(),
        layer: indicator.name.clone(),
        title: LEGEND_TITLE.to_string(),
        entries,
    }
}

/// `"<min> - <max>"` per bucket, computed from the values actually loaded.
pub fn derive_legend_labels(values: &[f64], unit: Unit) -> Vec<String> {
    let n = values.len();
    let mut bounds: [Option<(f64, f64)>; BUCKET_COUNT] = [None; BUCKET_COUNT];

    for (value, rank) in values.iter().zip(ranks(values)) {
        let slot = &mut bounds[bucket_for_rank(rank, n)];
        *slot = Some(match *slot {
            Some((lo, hi)) => (lo.min(*value), hi.max(*value)),
            None => (*value, *value),
        });
    }

    bounds
        .iter()
        .map(|b| match b {
            Some((lo, hi)) => format!("{} - {}", format_bound(*lo, unit), format_bound(*hi, unit)),
            None => MISSING_VALUE.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegendDrift {
    pub indicator: String,
    pub bucket: usize,
    pub configured: String,
    pub derived: String,
}

pub fn legend_drift(indicator: &IndicatorConfig, derived: &[String]) -> Vec<LegendDrift> {
    indicator
        .legend
        .iter()
        .zip(derived)
        .enumerate()
        .filter(|(_, (configured, derived))| configured != derived)
        .map(|(bucket, (configured, derived))| LegendDrift {
            indicator: indicator.key.clone(),
            bucket,
            configured: configured.clone(),
            derived: derived.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegendState {
    NoSelection,
    Active(String), // indicator key
}

/// Holds at most one rendered legend and swaps it when the active layer changes.
#[derive(Debug, Clone)]
pub struct LegendController {
    legends: Arc<[LegendSpec]>,
    state: LegendState,
    current: Option<LegendSpec>,
}

impl LegendController {
    pub fn new(legends: Arc<[LegendSpec]>) -> Self {
        Self {
            legends,
            state: LegendState::NoSelection,
            current: None,
        }
    }

    pub fn state(&self) -> &LegendState {
        &self.state
    }

    pub fn current(&self) -> Option<&LegendSpec> {
        self.current.as_ref()
    }

    /// Handles an "active layer changed" event. `layer` may be the layer
    /// name or the indicator key. On error the previous legend stays.
    pub fn on_layer_changed(&mut self, layer: &str) -> Result<&LegendSpec, MapError> {
        let spec = self
            .legends
            .iter()
            .find(|l| l.layer == layer || l.indicator == layer)
            .cloned()
            .ok_or_else(|| MapError::UnknownIndicator {
                name: layer.to_string(),
            })?;

        debug!("Legend {:?} -> {}", self.state, spec.indicator);
        self.state = LegendState::Active(spec.indicator.clone());
        let shown: &LegendSpec = self.current.insert(spec);
        Ok(shown)
    }
}

pub fn render_html(spec: &LegendSpec) -> String {
    let mut html = String::new();
    html.push_str("<div class=\"legend\">\n");
    html.push_str(&format!("  <h4>{}</h4>\n", escape_html(&spec.title)));
    for entry in &spec.entries {
        html.push_str(&format!(
            "  <div class=\"legend-row\"><i style=\"background:{}\"></i> {}</div>\n",
            entry.color,
            escape_html(&entry.label)
        ));
    }
    html.push_str("</div>\n");
    html
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}
