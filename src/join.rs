use crate::error::{DataSide, MapError};
use crate::types::{AreaId, AreaRecord, GeoFeature, JoinedArea};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    /// Any key present on only one side is a `JoinMismatch`.
    Strict,
    /// Keys present on only one side are logged and dropped.
    Lenient,
}

/// Inner join of table rows and polygons on area id.
///
/// Output follows the order of `features`. Duplicate ids on either side are
/// always an error, so no area appears twice in the output.
pub fn join_areas(
    records: Vec<AreaRecord>,
    features: Vec<GeoFeature>,
    mode: JoinMode,
) -> Result<Vec<JoinedArea>, MapError> {
    let mut by_id: BTreeMap<AreaId, AreaRecord> = BTreeMap::new();
    for record in records {
        let id = record.id;
        if by_id.insert(id, record).is_some() {
            return Err(MapError::DuplicateKey {
                side: DataSide::Table,
                id,
            });
        }
    }

    let mut seen = BTreeSet::new();
    for feature in &features {
        if !seen.insert(feature.id) {
            return Err(MapError::DuplicateKey {
                side: DataSide::Geometry,
                id: feature.id,
            });
        }
    }

    let unmatched_features: Vec<AreaId> = features
        .iter()
        .map(|f| f.id)
        .filter(|id| !by_id.contains_key(id))
        .collect();
    let unmatched_records: Vec<AreaId> = by_id
        .keys()
        .copied()
        .filter(|id| !seen.contains(id))
        .collect();

    if !unmatched_features.is_empty() || !unmatched_records.is_empty() {
        match mode {
            JoinMode::Strict => {
                return Err(MapError::JoinMismatch {
                    unmatched_records,
                    unmatched_features,
                })
            }
            JoinMode::Lenient => {
                for id in &unmatched_records {
                    warn!("Dropping table row for area {}: no geometry", id);
                }
                for id in &unmatched_features {
                    warn!("Dropping geometry for area {}: no table row", id);
                }
            }
        }
    }

    let joined = features
        .into_iter()
        .filter_map(|feature| {
            by_id.remove(&feature.id).map(|record| JoinedArea {
                id: feature.id,
                name: record.name,
                values: record.values,
                geometry: feature.geometry,
            })
        })
        .collect();

    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};
    use std::collections::HashSet;

    fn record(id: AreaId) -> AreaRecord {
        AreaRecord {
            id,
            name: format!("Area {id}"),
            values: BTreeMap::from([("x".to_string(), Some(id as f64))]),
        }
    }

    fn feature(id: AreaId) -> GeoFeature {
        let x = id as f64;
        GeoFeature {
            id,
            geometry: MultiPolygon::new(vec![polygon![
                (x: x, y: 0.0),
                (x: x + 1.0, y: 0.0),
                (x: x + 1.0, y: 1.0),
                (x: x, y: 0.0),
            ]]),
        }
    }

    #[test]
    fn full_match_joins_every_area_once() {
        let records: Vec<_> = (1..=77).map(record).collect();
        let features: Vec<_> = (1..=77).rev().map(feature).collect();
        let joined = join_areas(records, features, JoinMode::Strict).unwrap();

        assert_eq!(joined.len(), 77);
        let ids: HashSet<_> = joined.iter().map(|a| a.id).collect();
        assert_eq!(ids.len(), 77);
        assert_eq!(joined[0].id, 77);
        assert_eq!(joined[0].name, "Area 77");
        assert_eq!(joined[0].value("x"), Some(77.0));
    }

    #[test]
    fn strict_mode_reports_both_sides() {
        let records = vec![record(1), record(2), record(3)];
        let features = vec![feature(2), feature(3), feature(9)];
        let err = join_areas(records, features, JoinMode::Strict).unwrap_err();
        assert_eq!(
            err,
            MapError::JoinMismatch {
                unmatched_records: vec![1],
                unmatched_features: vec![9],
            }
        );
    }

    #[test]
    fn lenient_mode_drops_unmatched() {
        let records = vec![record(1), record(2), record(3)];
        let features = vec![feature(2), feature(3), feature(9)];
        let joined = join_areas(records, features, JoinMode::Lenient).unwrap();
        assert_eq!(joined.iter().map(|a| a.id).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn duplicate_keys_fail_in_either_mode() {
        let err = join_areas(vec![record(1), record(1)], vec![feature(1)], JoinMode::Lenient)
            .unwrap_err();
        assert_eq!(
            err,
            MapError::DuplicateKey {
                side: DataSide::Table,
                id: 1
            }
        );

        let err = join_areas(vec![record(1)], vec![feature(1), feature(1)], JoinMode::Strict)
            .unwrap_err();
        assert_eq!(
            err,
            MapError::DuplicateKey {
                side: DataSide::Geometry,
                id: 1
            }
        );
    }
}
