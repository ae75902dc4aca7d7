use std::slice;
use nalgebra::{Point3, Vector3};

use map::BFieldMap;
use math::VectorField;

/// An ordered set of field maps covering different regions.
///
/// A query is answered by the first map, in insertion order, that can answer
/// it. Inner, finer maps should therefore come before the outer ones.
#[derive(Debug, Default)]
pub struct BFieldManager {
    maps: Vec<BFieldMap>,
}

impl BFieldManager {
    pub fn new(maps: Vec<BFieldMap>) -> Self {
        info!("Field manager holds {} map(s): {:?}",
              maps.len(),
              maps.iter().map(BFieldMap::key).collect::<Vec<_>>());
        BFieldManager { maps: maps }
    }

    pub fn query_field(&self, position: &Point3<f64>) -> (bool, Vector3<f64>) {
        self.maps
            .iter()
            .map(|map| map.query_field(position))
            .find(|&(ok, _)| ok)
            .unwrap_or((false, Vector3::zeros()))
    }

    /// First map whose region contains `position` and whose nearest node there
    /// is defined.
    pub fn map_containing(&self, position: &Point3<f64>) -> Option<&BFieldMap> {
        self.maps.iter().find(|map| map.is_valid(position))
    }

    pub fn maps(&self) -> slice::Iter<BFieldMap> {
        self.maps.iter()
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

impl VectorField for BFieldManager {
    fn field_at(&self, position: &Point3<f64>) -> Option<Vector3<f64>> {
        match self.query_field(position) {
            (true, value) => Some(value),
            (false, _) => None,
        }
    }
}
