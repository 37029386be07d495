use crate::types::JoinedArea;
use geo::{BoundingRect, Contains, Point};
use rstar::{RTree, RTreeObject, AABB};

// Wrapper for RTree indexing
pub struct AreaIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for AreaIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Point-in-area lookup: bounding boxes in an R-tree, then an exact test.
pub struct AreaLocator {
    tree: RTree<AreaIndex>,
}

impl AreaLocator {
    pub fn new(areas: &[JoinedArea]) -> Self {
        let items: Vec<AreaIndex> = areas
            .iter()
            .enumerate()
            .filter_map(|(i, area)| {
                let rect = area.geometry.bounding_rect()?;
                Some(AreaIndex {
                    index: i,
                    aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                })
            })
            .collect();

        Self {
            tree: RTree::bulk_load(items),
        }
    }

    /// Index into `areas` of the area containing (lon, lat).
    pub fn locate(&self, areas: &[JoinedArea], lon: f64, lat: f64) -> Option<usize> {
        let point = Point::new(lon, lat);
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_point([lon, lat]))
            .map(|candidate| candidate.index)
            .find(|&i| areas.get(i).is_some_and(|area| area.geometry.contains(&point)))
    }
}
