use crate::config::AppConfig;
use crate::processing::MapDataset;
use crate::spatial::AreaLocator;
use crate::types::Rgb;
use anyhow::{anyhow, Context, Result};
use geo::BoundingRect;
use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use std::f64::consts::PI;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

// Web Mercator, normalized to [0, 1] on both axes (y grows southwards).
pub fn project(lon: f64, lat: f64) -> (f64, f64) {
    let x = (lon + 180.0) / 360.0;
    let lat_rad = lat.to_radians();
    let y = (1.0 - (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() / PI) / 2.0;
    (x, y)
}

pub fn unproject(x: f64, y: f64) -> (f64, f64) {
    let lon = x * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();
    (lon, lat)
}

/// Which area (index into `dataset.areas`) covers each pixel, row-major.
pub struct PixelGrid {
    pub width: u32,
    pub height: u32,
    owners: Vec<Option<usize>>,
}

impl PixelGrid {
    /// Fits the dataset's extent into `size` pixels along its longer side.
    pub fn build(dataset: &MapDataset, size: u32) -> Option<Self> {
        let (min, max) = dataset
            .areas
            .iter()
            .filter_map(|a| a.geometry.bounding_rect())
            .map(|r| (project(r.min().x, r.max().y), project(r.max().x, r.min().y)))
            .reduce(|(lo, hi), (a, b)| ((lo.0.min(a.0), lo.1.min(a.1)), (hi.0.max(b.0), hi.1.max(b.1))))?;

        let span_x = max.0 - min.0;
        let span_y = max.1 - min.1;
        if size == 0 || span_x <= 0.0 || span_y <= 0.0 {
            return None;
        }

        let (width, height) = if span_x >= span_y {
            (size, ((size as f64 * span_y / span_x).round() as u32).max(1))
        } else {
            (((size as f64 * span_x / span_y).round() as u32).max(1), size)
        };

        let locator = AreaLocator::new(&dataset.areas);
        let owners: Vec<Option<usize>> = (0..height)
            .into_par_iter()
            .flat_map_iter(|py| {
                let locator = &locator;
                (0..width).map(move |px| {
                    let x = min.0 + (px as f64 + 0.5) / width as f64 * span_x;
                    let y = min.1 + (py as f64 + 0.5) / height as f64 * span_y;
                    let (lon, lat) = unproject(x, y);
                    locator.locate(&dataset.areas, lon, lat)
                })
            })
            .collect();

        Some(Self {
            width,
            height,
            owners,
        })
    }

    pub fn owner(&self, px: u32, py: u32) -> Option<usize> {
        self.owners
            .get(py as usize * self.width as usize + px as usize)
            .copied()
            .flatten()
    }
}

fn to_rgba(color: Rgb) -> Rgba<u8> {
    Rgba([color.0, color.1, color.2, 255])
}

/// Rasterizes one indicator layer. Pixels outside every area are transparent.
pub fn render_layer(dataset: &MapDataset, layer_key: &str, grid: &PixelGrid) -> Result<RgbaImage> {
    let layer = dataset.layer(layer_key)?;
    let mut img = RgbaImage::new(grid.width, grid.height);

    for (px, py, pixel) in img.enumerate_pixels_mut() {
        if let Some(i) = grid.owner(px, py) {
            let area = &dataset.areas[i];
            *pixel = to_rgba(dataset.fill_color(layer, area.id));
        }
    }

    Ok(img)
}

/// Writes `previews/<key>.png` for every layer when `output.preview_size` is set.
pub fn generate_previews(config: &AppConfig, dataset: &MapDataset, dir: &Path) -> Result<()> {
    let Some(size) = config.output.preview_size else {
        return Ok(());
    };

    let Some(grid) = PixelGrid::build(dataset, size) else {
        warn!("Dataset has no extent; skipping previews");
        return Ok(());
    };
    info!("Rendering {}x{} previews...", grid.width, grid.height);

    let preview_dir = dir.join("previews");
    fs::create_dir_all(&preview_dir).context("Failed to create preview directory")?;

    dataset.layers.par_iter().try_for_each(|layer| -> Result<()> {
        let img = render_layer(dataset, &layer.indicator.key, &grid)?;
        let path = preview_dir.join(format!("{}.png", layer.indicator.key));
        img.save(&path)
            .map_err(|e| anyhow!("Failed to save preview {:?}: {}", path, e))?;
        Ok(())
    })
}
