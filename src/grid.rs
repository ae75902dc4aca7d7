use std::fmt;
use nalgebra::{Point3, Vector3};

use errors::{ErrorKind, Result};

/// Points this many steps outside the box still count as inside.
const BOUNDS_TOLERANCE: f64 = 1e-9;

/// Largest grid a map may allocate.
pub const MAX_CELLS: usize = 1 << 28;

/// Indices of one node of a regular 3D grid.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct GridPoint {
    pub ix: usize,
    pub iy: usize,
    pub iz: usize,
}

impl GridPoint {
    #[inline]
    pub fn new(ix: usize, iy: usize, iz: usize) -> Self {
        GridPoint {
            ix: ix,
            iy: iy,
            iz: iz,
        }
    }

    #[inline]
    pub fn axis(&self, axis: usize) -> usize {
        match axis {
            0 => self.ix,
            1 => self.iy,
            _ => self.iz,
        }
    }
}

impl fmt::Display for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {}, {})", self.ix, self.iy, self.iz)
    }
}

/// Shape and placement of a regular Cartesian grid.
///
/// Node `(ix, iy, iz)` sits at `min + i * step` on each axis, so the last node
/// on an axis is at `min + (n - 1) * step`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GridGeometry {
    n: [usize; 3],
    min: [f64; 3],
    step: [f64; 3],
}

impl GridGeometry {
    pub fn new(n: [usize; 3], min: [f64; 3], step: [f64; 3]) -> Result<Self> {
        for axis in 0..3 {
            let name = AXIS_NAMES[axis];
            if n[axis] < 2 {
                bail!(ErrorKind::InvalidGridGeometry(format!("n{} = {} but at least 2 nodes \
                                                              are needed",
                                                             name,
                                                             n[axis])));
            }
            if !(step[axis] > 0.0) || !step[axis].is_finite() {
                bail!(ErrorKind::InvalidGridGeometry(format!("d{} = {} must be positive",
                                                             name,
                                                             step[axis])));
            }
            if !min[axis].is_finite() {
                bail!(ErrorKind::InvalidGridGeometry(format!("{}min = {} must be finite",
                                                             name,
                                                             min[axis])));
            }
        }
        let cells = n[0].checked_mul(n[1]).and_then(|cells| cells.checked_mul(n[2]));
        match cells {
            Some(cells) if cells <= MAX_CELLS => {}
            _ => {
                bail!(ErrorKind::InvalidGridGeometry(format!("{} x {} x {} nodes exceed the \
                                                              limit of {} cells",
                                                             n[0],
                                                             n[1],
                                                             n[2],
                                                             MAX_CELLS)))
            }
        }
        Ok(GridGeometry {
            n: n,
            min: min,
            step: step,
        })
    }

    #[inline]
    pub fn extents(&self) -> [usize; 3] {
        self.n
    }

    #[inline]
    pub fn n_cells(&self) -> usize {
        self.n[0] * self.n[1] * self.n[2]
    }

    #[inline]
    pub fn min(&self, axis: usize) -> f64 {
        self.min[axis]
    }

    #[inline]
    pub fn max(&self, axis: usize) -> f64 {
        self.min[axis] + (self.n[axis] - 1) as f64 * self.step[axis]
    }

    #[inline]
    pub fn step(&self, axis: usize) -> f64 {
        self.step[axis]
    }

    #[inline]
    pub fn len(&self, axis: usize) -> usize {
        self.n[axis]
    }

    #[inline]
    pub fn nx(&self) -> usize {
        self.n[0]
    }

    #[inline]
    pub fn ny(&self) -> usize {
        self.n[1]
    }

    #[inline]
    pub fn nz(&self) -> usize {
        self.n[2]
    }

    pub fn lower_corner(&self) -> Point3<f64> {
        Point3::new(self.min[0], self.min[1], self.min[2])
    }

    pub fn upper_corner(&self) -> Point3<f64> {
        Point3::new(self.max(0), self.max(1), self.max(2))
    }

    /// Flat index into x-major storage (`iz` varies fastest).
    #[inline]
    pub fn index(&self, ix: usize, iy: usize, iz: usize) -> usize {
        debug_assert!(self.in_range(ix, iy, iz));
        (ix * self.n[1] + iy) * self.n[2] + iz
    }

    #[inline]
    pub fn in_range(&self, ix: usize, iy: usize, iz: usize) -> bool {
        ix < self.n[0] && iy < self.n[1] && iz < self.n[2]
    }

    /// True if `position` lies in the grid's bounding box.
    #[inline]
    pub fn contains(&self, position: &Point3<f64>) -> bool {
        (0..3).all(|axis| {
            let tolerance = BOUNDS_TOLERANCE * self.step[axis];
            let c = position[axis];
            c >= self.min[axis] - tolerance && c <= self.max(axis) + tolerance
        })
    }

    /// Nearest grid node to `position`, clamped into the grid.
    #[inline]
    pub fn point_to_grid(&self, position: &Point3<f64>) -> GridPoint {
        GridPoint::new(self.nearest_index(0, position[0]),
                       self.nearest_index(1, position[1]),
                       self.nearest_index(2, position[2]))
    }

    #[inline]
    pub fn grid_to_point(&self, ix: usize, iy: usize, iz: usize) -> Point3<f64> {
        Point3::new(self.min[0] + ix as f64 * self.step[0],
                    self.min[1] + iy as f64 * self.step[1],
                    self.min[2] + iz as f64 * self.step[2])
    }

    /// Offset from `anchor` to `position` in units of the grid step.
    #[inline]
    pub fn cell_fraction(&self, position: &Point3<f64>, anchor: &GridPoint) -> Vector3<f64> {
        let node = self.grid_to_point(anchor.ix, anchor.iy, anchor.iz);
        Vector3::new((position[0] - node[0]) / self.step[0],
                     (position[1] - node[1]) / self.step[1],
                     (position[2] - node[2]) / self.step[2])
    }

    #[inline]
    fn nearest_index(&self, axis: usize, c: f64) -> usize {
        let index = ((c - self.min[axis]) / self.step[axis] + 0.5).floor();
        if index <= 0.0 {
            0
        } else {
            (index as usize).min(self.n[axis] - 1)
        }
    }
}

const AXIS_NAMES: [&'static str; 3] = ["x", "y", "z"];
