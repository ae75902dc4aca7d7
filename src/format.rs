use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use nalgebra::Point3;

use errors::{Error, ErrorKind};

/// Source format a field map was produced from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MapFormat {
    Gmc,
    G4bl,
}

impl fmt::Display for MapFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MapFormat::Gmc => write!(f, "GMC"),
            MapFormat::G4bl => write!(f, "G4BL"),
        }
    }
}

impl FromStr for MapFormat {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Error> {
        match name.to_lowercase().as_str() {
            "gmc" => Ok(MapFormat::Gmc),
            "g4bl" => Ok(MapFormat::G4bl),
            _ => Err(ErrorKind::UnknownMapFormat(name.to_string()).into()),
        }
    }
}

/// Extra geometric restriction on where a map may be queried, on top of its
/// bounding box.
pub trait RegionConstraint: Send + Sync {
    fn allows(&self, position: &Point3<f64>) -> bool;

    fn describe(&self) -> String;
}

/// Rejects points inside an axis aligned box.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcludedBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl RegionConstraint for ExcludedBox {
    fn allows(&self, position: &Point3<f64>) -> bool {
        !(0..3).all(|axis| self.min[axis] <= position[axis] && position[axis] <= self.max[axis])
    }

    fn describe(&self) -> String {
        format!("excluded box [{}, {}] x [{}, {}] x [{}, {}]",
                self.min.x,
                self.max.x,
                self.min.y,
                self.max.y,
                self.min.z,
                self.max.z)
    }
}

/// Rejects points inside a cylinder whose axis is parallel to z.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcludedCylinder {
    pub x0: f64,
    pub y0: f64,
    pub radius: f64,
    pub z_min: f64,
    pub z_max: f64,
}

impl RegionConstraint for ExcludedCylinder {
    fn allows(&self, position: &Point3<f64>) -> bool {
        let (dx, dy) = (position.x - self.x0, position.y - self.y0);
        let inside = dx * dx + dy * dy < self.radius * self.radius && self.z_min <= position.z &&
                     position.z <= self.z_max;
        !inside
    }

    fn describe(&self) -> String {
        format!("excluded cylinder r < {} around ({}, {}) for z in [{}, {}]",
                self.radius,
                self.x0,
                self.y0,
                self.z_min,
                self.z_max)
    }
}

/// Constraints keyed by map format. A map looks its constraint up once, when
/// it is built.
#[derive(Clone, Default)]
pub struct ConstraintRegistry {
    rules: HashMap<MapFormat, Arc<dyn RegionConstraint>>,
}

impl ConstraintRegistry {
    pub fn new() -> Self {
        ConstraintRegistry::default()
    }

    pub fn register<C>(mut self, format: MapFormat, constraint: C) -> Self
        where C: RegionConstraint + 'static
    {
        self.rules.insert(format, Arc::new(constraint));
        self
    }

    pub fn resolve(&self, format: MapFormat) -> Option<Arc<dyn RegionConstraint>> {
        self.rules.get(&format).cloned()
    }
}

impl fmt::Debug for ConstraintRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut map = f.debug_map();
        for (format, constraint) in &self.rules {
            map.entry(format, &constraint.describe());
        }
        map.finish()
    }
}
