use hardship_map::config::AppConfig;
use hardship_map::data::{read_area_records, read_geojson_features};
use hardship_map::error::MapError;
use hardship_map::export::{index_html, layer_collection, write_outputs};
use hardship_map::legend::LegendState;
use hardship_map::processing::{build_dataset, check_legends, MapDataset};
use hardship_map::render::{render_layer, PixelGrid};
use hardship_map::session::{Session, SessionError, SessionRegistry};
use hardship_map::spatial::AreaLocator;
use std::collections::HashSet;
use std::sync::Arc;

const CONFIG: &str = r##"
[input]
data_csv = "unused.csv"
geometry = "unused.geojson"
join_column_csv = "Community Area Number"
name_column_csv = "COMMUNITY AREA NAME"
join_column_shape = "area_numbe"

[[indicators]]
key = "crowded"
name = "Percent of Crowded Housing"
column = "PERCENT OF HOUSING CROWDED"
unit = "percent"
legend = ["1 - 2", "3 - 4", "5 - 6", "7 - 8", "9 - 10"]

[[indicators]]
key = "income"
name = "Per Capita Income"
column = "PER CAPITA INCOME "
unit = "currency"
legend = ["$1000 - $2000", "$3000 - $4000", "$5000 - $6000", "$7000 - $8000", "$9000 - $99000"]

[map]
center = [41.85, -87.65]
zoom = 10
tile_url = "https://tile.openstreetmap.org/{z}/{x}/{y}.png"

[output]
dir = "output"

[server]
port = 8080
"##;

// Area i has crowding i and income 1000 * i; area 10's income is blank.
fn csv() -> String {
    let mut csv = String::from(
        "Community Area Number,COMMUNITY AREA NAME,PERCENT OF HOUSING CROWDED,PER CAPITA INCOME \n",
    );
    for i in 1..=10 {
        let name = if i == 1 { "Rogers Park".to_string() } else { format!("Area {i}") };
        let income = if i == 10 { String::new() } else { (1000 * i).to_string() };
        csv.push_str(&format!("{i},{name},{i},{income}\n"));
    }
    csv.push_str(",CHICAGO,4.7,28202\n");
    csv
}

// Ten 0.01-degree squares in a row, west to east, ids in reverse order.
fn geojson(ids: impl Iterator<Item = u32>) -> String {
    let features: Vec<String> = ids
        .map(|id| {
            let x0 = -87.70 + (id - 1) as f64 * 0.01;
            let x1 = x0 + 0.01;
            format!(
                r#"{{"type":"Feature","properties":{{"area_numbe":"{id}"}},"geometry":{{"type":"Polygon","coordinates":[[[{x0},41.80],[{x1},41.80],[{x1},41.81],[{x0},41.81],[{x0},41.80]]]}}}}"#
            )
        })
        .collect();
    format!(r#"{{"type":"FeatureCollection","features":[{}]}}"#, features.join(","))
}

fn dataset_from(config: &AppConfig, geo: &str) -> Result<MapDataset, MapError> {
    let records = read_area_records(csv().as_bytes(), &config.input, &config.indicators).unwrap();
    let features = read_geojson_features(geo.as_bytes(), &config.input.join_column_shape).unwrap();
    build_dataset(config, records, features)
}

fn dataset() -> MapDataset {
    let config = AppConfig::from_toml_str(CONFIG).unwrap();
    dataset_from(&config, &geojson((1..=10).rev())).unwrap()
}

#[test]
fn joins_and_buckets_every_area() {
    let dataset = dataset();
    assert_eq!(dataset.areas.len(), 10);
    let ids: HashSet<_> = dataset.areas.iter().map(|a| a.id).collect();
    assert_eq!(ids.len(), 10);

    let crowded = dataset.layer("crowded").unwrap();
    assert_eq!(crowded.assignments.len(), 10);
    for id in 1..=10u32 {
        assert_eq!(crowded.assignments[&id].bucket, ((id - 1) / 2) as usize);
    }
    assert_eq!(crowded.assignments[&1].color.to_hex(), "#CCCCCC");
    assert_eq!(crowded.assignments[&10].color.to_hex(), "#660066");
}

#[test]
fn missing_values_are_left_unbucketed() {
    let dataset = dataset();
    let income = dataset.layer("Per Capita Income").unwrap();
    assert_eq!(income.assignments.len(), 9);
    assert!(!income.assignments.contains_key(&10));
    assert_eq!(dataset.fill_color(income, 10).to_hex(), "#FFFFFF");

    let area10 = dataset.areas.iter().find(|a| a.id == 10).unwrap();
    assert_eq!(dataset.label(income, area10), "Area 10: N/A");
}

#[test]
fn unmatched_geometry_fails_strict_join() {
    let config = AppConfig::from_toml_str(CONFIG).unwrap();
    let err = dataset_from(&config, &geojson((1..=9).chain([42]))).unwrap_err();
    assert_eq!(
        err,
        MapError::JoinMismatch {
            unmatched_records: vec![10],
            unmatched_features: vec![42],
        }
    );
}

#[test]
fn lenient_join_drops_unmatched() {
    let lenient = format!("{CONFIG}\n[join]\nstrict = false\n");
    let config = AppConfig::from_toml_str(&lenient).unwrap();
    let dataset = dataset_from(&config, &geojson((1..=9).chain([42]))).unwrap();
    assert_eq!(dataset.areas.len(), 9);
}

#[test]
fn layer_features_carry_render_properties() {
    let dataset = dataset();
    let layer = dataset.layer("crowded").unwrap();
    let collection = layer_collection(&dataset, layer);
    assert_eq!(collection.features.len(), 10);

    let rogers = collection
        .features
        .iter()
        .find(|f| f.property("area_id").and_then(|v| v.as_u64()) == Some(1))
        .unwrap();
    assert_eq!(rogers.property("label").unwrap(), "Rogers Park: 1 percent");
    assert_eq!(rogers.property("fill").unwrap(), "#CCCCCC");
    assert_eq!(rogers.property("layer").unwrap(), "Percent of Crowded Housing");
    assert_eq!(rogers.property("bucket").unwrap(), 0);
    assert!(rogers.geometry.is_some());
}

#[test]
fn legends_come_from_configuration() {
    let dataset = dataset();
    let legends = dataset.legends();
    assert_eq!(legends.len(), 2);
    assert_eq!(legends[1].indicator, "income");
    assert_eq!(legends[1].title, "Legend");
    assert_eq!(legends[1].entries[4].label, "$9000 - $99000");
}

#[test]
fn legend_check_reports_only_stale_labels() {
    let config = AppConfig::from_toml_str(CONFIG).unwrap();
    let dataset = dataset_from(&config, &geojson(1..=10)).unwrap();
    let drift = check_legends(&config, &dataset.areas);

    // crowding labels match the data; income's top label is stale
    assert_eq!(drift.len(), 1);
    assert_eq!(drift[0].indicator, "income");
    assert_eq!(drift[0].bucket, 4);
    assert_eq!(drift[0].configured, "$9000 - $99000");
    assert_eq!(drift[0].derived, "$9000 - $9000");
}

#[test]
fn session_swaps_one_legend_at_a_time() {
    let dataset = Arc::new(dataset());
    let mut session = Session::new(1, Arc::clone(&dataset));
    assert_eq!(session.legend_state(), &LegendState::NoSelection);

    session.select_layer("Percent of Crowded Housing").unwrap();
    let shown = session.select_layer("Per Capita Income").unwrap().clone();
    assert_eq!(shown.indicator, "income");
    assert_eq!(session.current_legend(), Some(&shown));
    assert_eq!(session.legend_state(), &LegendState::Active("income".into()));

    let err = session.select_layer("Percent of Unicorns").unwrap_err();
    assert_eq!(err, MapError::UnknownIndicator { name: "Percent of Unicorns".into() });
    assert_eq!(session.current_legend().map(|l| l.indicator.as_str()), Some("income"));
}

#[test]
fn sessions_are_independent() {
    let registry = SessionRegistry::new(Arc::new(dataset()));
    let a = registry.open();
    let b = registry.open();
    assert_ne!(a, b);

    registry.select_layer(a, "crowded").unwrap();
    registry.select_layer(b, "income").unwrap();
    assert_eq!(registry.current_legend(a).unwrap().unwrap().indicator, "crowded");
    assert_eq!(registry.current_legend(b).unwrap().unwrap().indicator, "income");

    assert!(registry.close(a));
    assert_eq!(registry.select_layer(a, "crowded"), Err(SessionError::UnknownSession(a)));
}

#[test]
fn full_registry_evicts_oldest_session() {
    let registry = SessionRegistry::with_capacity(Arc::new(dataset()), 2);
    let a = registry.open();
    let b = registry.open();
    registry.select_layer(b, "income").unwrap();

    let c = registry.open();
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.current_legend(a), Err(SessionError::UnknownSession(a)));
    assert_eq!(registry.current_legend(b).unwrap().unwrap().indicator, "income");
    assert_eq!(registry.current_legend(c).unwrap(), None);
}

#[test]
fn point_lookup_finds_area() {
    let dataset = dataset();
    let locator = AreaLocator::new(&dataset.areas);
    let i = locator.locate(&dataset.areas, -87.695, 41.805).unwrap();
    assert_eq!(dataset.areas[i].id, 1);
    assert_eq!(locator.locate(&dataset.areas, -87.0, 41.805), None);
}

#[test]
fn preview_colors_follow_buckets() {
    let dataset = dataset();
    let grid = PixelGrid::build(&dataset, 100).unwrap();
    assert_eq!(grid.width, 100);
    assert!(grid.height >= 1 && grid.height < 100);

    let img = render_layer(&dataset, "crowded", &grid).unwrap();
    let y = grid.height / 2;
    // westernmost column is area 1, easternmost area 10
    assert_eq!(img.get_pixel(2, y).0, [0xCC, 0xCC, 0xCC, 255]);
    assert_eq!(img.get_pixel(97, y).0, [0x66, 0x00, 0x66, 255]);
}

#[test]
fn writes_map_outputs() {
    let config = AppConfig::from_toml_str(CONFIG).unwrap();
    let dataset = dataset_from(&config, &geojson(1..=10)).unwrap();
    let dir = std::env::temp_dir().join(format!("hardship-map-test-{}", std::process::id()));

    write_outputs(&config, &dataset, &dir).unwrap();
    assert!(dir.join("layers/crowded.geojson").exists());
    assert!(dir.join("layers/income.geojson").exists());

    let legends: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.join("legends.json")).unwrap()).unwrap();
    assert_eq!(legends.as_array().unwrap().len(), 2);

    let html = std::fs::read_to_string(dir.join("index.html")).unwrap();
    assert!(!html.contains("__SETTINGS__"));
    assert!(html.contains("layers/income.geojson"));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn index_page_embeds_fixed_zoom() {
    let config = AppConfig::from_toml_str(CONFIG).unwrap();
    let html = index_html(&config, &dataset()).unwrap();
    assert!(html.contains(r#""zoom":10"#));
    assert!(html.contains("Percent of Crowded Housing"));
}

#[test]
fn index_page_routes_layer_changes_through_sessions() {
    let config = AppConfig::from_toml_str(CONFIG).unwrap();
    let html = index_html(&config, &dataset()).unwrap();
    assert!(html.contains("fetch('api/sessions', { method: 'POST' })"));
    assert!(html.contains("'api/sessions/' + session + '/layer'"));
    assert!(html.contains("map.on('baselayerchange', e => showLegend(e.name))"));
}
