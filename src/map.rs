use std::fmt;
use std::sync::Arc;
use nalgebra::{Point3, Vector3};

use config::MapConfig;
use container::CellStorage;
use errors::{ErrorKind, Result};
use format::{ConstraintRegistry, MapFormat, RegionConstraint};
use grid::{GridGeometry, GridPoint};
use interpolate::{Stencil, UndefinedPolicy};
use math::VectorField;

/// Samples passed to `set_at` must be this close to a node, in grid steps.
const ON_GRID_TOLERANCE: f64 = 1e-3;

/// Exclusive write access to a field map while it is being filled in.
///
/// Loaders populate the samples through the builder and finish with `build`,
/// after which the map can no longer change.
pub struct BFieldMapBuilder {
    config: MapConfig,
    storage: CellStorage,
    constraint: Option<Arc<dyn RegionConstraint>>,
}

impl BFieldMapBuilder {
    pub fn new(config: MapConfig) -> Result<Self> {
        if !config.scale.is_finite() {
            bail!(ErrorKind::InvalidGridGeometry(format!("scale factor {} is not finite",
                                                         config.scale)));
        }
        Ok(BFieldMapBuilder {
            storage: CellStorage::new(config.geometry),
            config: config,
            constraint: None,
        })
    }

    #[inline]
    pub fn geometry(&self) -> &GridGeometry {
        &self.config.geometry
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn set(&mut self, ix: usize, iy: usize, iz: usize, value: Vector3<f64>) -> Result<()> {
        self.storage.set(ix, iy, iz, value)
    }

    /// Stores `value` at the node `position` falls on and marks it defined.
    pub fn set_at(&mut self, position: &Point3<f64>, value: Vector3<f64>) -> Result<GridPoint> {
        let geometry = self.config.geometry;
        let node = geometry.point_to_grid(position);
        let frac = geometry.cell_fraction(position, &node);
        let finite = position.coords.iter().all(|c| c.is_finite());
        if !finite || frac.amax() > ON_GRID_TOLERANCE {
            bail!(ErrorKind::OffGridSample(position.x, position.y, position.z));
        }
        self.storage.set(node.ix, node.iy, node.iz, value)?;
        self.storage.mark_defined(node.ix, node.iy, node.iz)?;
        Ok(node)
    }

    pub fn mark_defined(&mut self, ix: usize, iy: usize, iz: usize) -> Result<()> {
        self.storage.mark_defined(ix, iy, iz)
    }

    pub fn mark_all_defined(&mut self) {
        self.storage.mark_all_defined();
    }

    pub fn defined_count(&self) -> usize {
        self.storage.defined_count()
    }

    /// Looks up the validity constraint registered for this map's format.
    pub fn constraints(mut self, registry: &ConstraintRegistry) -> Self {
        self.constraint = registry.resolve(self.config.format);
        self
    }

    pub fn build(mut self) -> BFieldMap {
        if !self.storage.all_defined() && self.storage.defined_count() == self.storage.len() {
            self.storage.mark_all_defined();
        }
        info!("Built field map '{}' ({}, {} x {} x {}, {} of {} cells defined)",
              self.config.key,
              self.config.format,
              self.config.geometry.nx(),
              self.config.geometry.ny(),
              self.config.geometry.nz(),
              self.storage.defined_count(),
              self.storage.len());
        BFieldMap {
            config: self.config,
            storage: self.storage,
            constraint: self.constraint,
        }
    }
}

/// Why a query point was turned away before interpolation.
#[derive(Debug, Copy, Clone, PartialEq)]
enum Rejection {
    OutsideGrid,
    ExcludedRegion(MapFormat),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Rejection::OutsideGrid => write!(f, "is outside the grid of field map"),
            Rejection::ExcludedRegion(format) => {
                write!(f, "is in the excluded {} region of field map", format)
            }
        }
    }
}

/// A magnetic field map defined on a regular Cartesian grid.
///
/// Space points are in mm and field values in tesla; nothing is converted.
/// The map is immutable, so any number of threads may query it at once.
pub struct BFieldMap {
    config: MapConfig,
    storage: CellStorage,
    constraint: Option<Arc<dyn RegionConstraint>>,
}

impl BFieldMap {
    /// Interpolated, scaled field at `position`.
    ///
    /// Returns `(false, 0)` when the point is outside the map, excluded by the
    /// format constraint, or the stencil has undefined cells the map's
    /// `UndefinedPolicy` cannot work around.
    pub fn query_field(&self, position: &Point3<f64>) -> (bool, Vector3<f64>) {
        if let Some(rejection) = self.rejection(position) {
            if self.config.warn_if_outside {
                warn!("Point ({}, {}, {}) {} '{}'",
                      position.x,
                      position.y,
                      position.z,
                      rejection,
                      self.config.key);
            }
            return (false, Vector3::zeros());
        }

        let geometry = &self.config.geometry;
        let stencil = Stencil::gather(geometry, &self.storage, &geometry.point_to_grid(position));
        let frac = geometry.cell_fraction(position, &stencil.origin());
        match stencil.interpolate(&frac, self.config.undefined_policy) {
            Some(value) => (true, value * self.config.scale),
            None => {
                debug!("Undefined cells around {} in field map '{}'",
                       stencil.origin(),
                       self.config.key);
                (false, Vector3::zeros())
            }
        }
    }

    /// Cheap check that `position` is inside the map and its nearest node is
    /// defined.
    pub fn is_valid(&self, position: &Point3<f64>) -> bool {
        if !self.in_region(position) {
            return false;
        }
        let node = self.config.geometry.point_to_grid(position);
        self.is_valid_grid(&node)
    }

    #[inline]
    pub fn is_valid_grid(&self, node: &GridPoint) -> bool {
        self.storage.is_valid(node.ix, node.iy, node.iz)
    }

    /// The format specific restriction only; true if the format has none.
    #[inline]
    pub fn satisfies_format_constraint(&self, position: &Point3<f64>) -> bool {
        self.constraint.as_ref().map_or(true, |constraint| constraint.allows(position))
    }

    /// Scaled sample stored at `node`, if it is defined.
    pub fn sample(&self, node: &GridPoint) -> Option<Vector3<f64>> {
        if self.is_valid_grid(node) {
            Some(self.storage.at(node.ix, node.iy, node.iz) * self.config.scale)
        } else {
            None
        }
    }

    #[inline]
    pub fn point_to_grid(&self, position: &Point3<f64>) -> GridPoint {
        self.config.geometry.point_to_grid(position)
    }

    #[inline]
    pub fn grid_to_point(&self, ix: usize, iy: usize, iz: usize) -> Point3<f64> {
        self.config.geometry.grid_to_point(ix, iy, iz)
    }

    #[inline]
    pub fn cell_fraction(&self, position: &Point3<f64>, anchor: &GridPoint) -> Vector3<f64> {
        self.config.geometry.cell_fraction(position, anchor)
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.config.geometry
    }

    pub fn nx(&self) -> usize {
        self.config.geometry.nx()
    }

    pub fn ny(&self) -> usize {
        self.config.geometry.ny()
    }

    pub fn nz(&self) -> usize {
        self.config.geometry.nz()
    }

    pub fn xmin(&self) -> f64 {
        self.config.geometry.min(0)
    }

    pub fn xmax(&self) -> f64 {
        self.config.geometry.max(0)
    }

    pub fn ymin(&self) -> f64 {
        self.config.geometry.min(1)
    }

    pub fn ymax(&self) -> f64 {
        self.config.geometry.max(1)
    }

    pub fn zmin(&self) -> f64 {
        self.config.geometry.min(2)
    }

    pub fn zmax(&self) -> f64 {
        self.config.geometry.max(2)
    }

    pub fn dx(&self) -> f64 {
        self.config.geometry.step(0)
    }

    pub fn dy(&self) -> f64 {
        self.config.geometry.step(1)
    }

    pub fn dz(&self) -> f64 {
        self.config.geometry.step(2)
    }

    pub fn format(&self) -> MapFormat {
        self.config.format
    }

    pub fn key(&self) -> &str {
        &self.config.key
    }

    pub fn scale(&self) -> f64 {
        self.config.scale
    }

    pub fn warn_if_outside(&self) -> bool {
        self.config.warn_if_outside
    }

    pub fn undefined_policy(&self) -> UndefinedPolicy {
        self.config.undefined_policy
    }

    pub fn all_defined(&self) -> bool {
        self.storage.all_defined()
    }

    pub fn defined_count(&self) -> usize {
        self.storage.defined_count()
    }

    /// Unscaled sample, used when writing the map back out.
    pub(crate) fn raw_sample(&self, node: &GridPoint) -> Option<Vector3<f64>> {
        if self.is_valid_grid(node) {
            Some(self.storage.at(node.ix, node.iy, node.iz))
        } else {
            None
        }
    }

    #[inline]
    fn in_region(&self, position: &Point3<f64>) -> bool {
        self.rejection(position).is_none()
    }

    fn rejection(&self, position: &Point3<f64>) -> Option<Rejection> {
        if !self.config.geometry.contains(position) {
            Some(Rejection::OutsideGrid)
        } else if !self.satisfies_format_constraint(position) {
            Some(Rejection::ExcludedRegion(self.config.format))
        } else {
            None
        }
    }
}

impl VectorField for BFieldMap {
    #[inline]
    fn field_at(&self, position: &Point3<f64>) -> Option<Vector3<f64>> {
        match self.query_field(position) {
            (true, value) => Some(value),
            (false, _) => None,
        }
    }
}

impl fmt::Display for BFieldMap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let g = &self.config.geometry;
        writeln!(f, "Field map: {}", self.config.key)?;
        writeln!(f, "  format:  {}", self.config.format)?;
        writeln!(f, "  nodes:   {} x {} x {}", g.nx(), g.ny(), g.nz())?;
        for (axis, name) in ["x", "y", "z"].iter().enumerate() {
            writeln!(f,
                     "  {}:       [{}, {}] step {}",
                     name,
                     g.min(axis),
                     g.max(axis),
                     g.step(axis))?;
        }
        writeln!(f, "  scale:   {}", self.config.scale)?;
        writeln!(f,
                 "  defined: {} of {}{}",
                 self.storage.defined_count(),
                 self.storage.len(),
                 if self.storage.all_defined() { " (all)" } else { "" })?;
        match self.constraint {
            Some(ref constraint) => write!(f, "  region:  {}", constraint.describe()),
            None => write!(f, "  region:  bounding box"),
        }
    }
}

impl fmt::Debug for BFieldMap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BFieldMap")
            .field("config", &self.config)
            .field("all_defined", &self.storage.all_defined())
            .field("constraint",
                   &self.constraint.as_ref().map(|constraint| constraint.describe()))
            .finish()
    }
}
