use nalgebra::Vector3;

use errors::{ErrorKind, Result};
use grid::GridGeometry;

/// Dense 3D array laid out like `GridGeometry::index`.
#[derive(Debug, Clone)]
pub struct Container3D<T> {
    geometry: GridGeometry,
    data: Vec<T>,
}

impl<T: Clone> Container3D<T> {
    pub fn new(geometry: GridGeometry, init: T) -> Self {
        Container3D {
            data: vec![init; geometry.n_cells()],
            geometry: geometry,
        }
    }

    #[inline]
    pub fn get(&self, ix: usize, iy: usize, iz: usize) -> Result<&T> {
        self.check(ix, iy, iz)?;
        Ok(self.at(ix, iy, iz))
    }

    #[inline]
    pub fn set(&mut self, ix: usize, iy: usize, iz: usize, value: T) -> Result<()> {
        self.check(ix, iy, iz)?;
        let index = self.geometry.index(ix, iy, iz);
        self.data[index] = value;
        Ok(())
    }

    /// Unchecked in release builds; callers must keep indices in range.
    #[inline]
    pub fn at(&self, ix: usize, iy: usize, iz: usize) -> &T {
        &self.data[self.geometry.index(ix, iy, iz)]
    }

    #[inline]
    pub fn in_range(&self, ix: usize, iy: usize, iz: usize) -> bool {
        self.geometry.in_range(ix, iy, iz)
    }

    pub fn iter(&self) -> ::std::slice::Iter<T> {
        self.data.iter()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    fn check(&self, ix: usize, iy: usize, iz: usize) -> Result<()> {
        if self.in_range(ix, iy, iz) {
            Ok(())
        } else {
            let [nx, ny, nz] = self.geometry.extents();
            Err(ErrorKind::IndexOutOfRange(ix, iy, iz, nx, ny, nz).into())
        }
    }
}

/// Field samples plus their defined-state.
///
/// Once `mark_all_defined` has been called the per-cell flags are no longer
/// consulted.
#[derive(Debug, Clone)]
pub struct CellStorage {
    field: Container3D<Vector3<f64>>,
    defined: Container3D<bool>,
    all_defined: bool,
}

impl CellStorage {
    pub fn new(geometry: GridGeometry) -> Self {
        CellStorage {
            field: Container3D::new(geometry, Vector3::zeros()),
            defined: Container3D::new(geometry, false),
            all_defined: false,
        }
    }

    pub fn set(&mut self, ix: usize, iy: usize, iz: usize, value: Vector3<f64>) -> Result<()> {
        self.field.set(ix, iy, iz, value)
    }

    pub fn get(&self, ix: usize, iy: usize, iz: usize) -> Result<Vector3<f64>> {
        self.field.get(ix, iy, iz).map(|value| *value)
    }

    #[inline]
    pub(crate) fn at(&self, ix: usize, iy: usize, iz: usize) -> Vector3<f64> {
        *self.field.at(ix, iy, iz)
    }

    #[inline]
    pub fn is_valid(&self, ix: usize, iy: usize, iz: usize) -> bool {
        self.field.in_range(ix, iy, iz) && (self.all_defined || *self.defined.at(ix, iy, iz))
    }

    pub fn mark_defined(&mut self, ix: usize, iy: usize, iz: usize) -> Result<()> {
        self.defined.set(ix, iy, iz, true)
    }

    pub fn mark_all_defined(&mut self) {
        self.all_defined = true;
    }

    #[inline]
    pub fn all_defined(&self) -> bool {
        self.all_defined
    }

    pub fn defined_count(&self) -> usize {
        if self.all_defined {
            self.field.len()
        } else {
            self.defined.iter().filter(|&&defined| defined).count()
        }
    }

    pub fn len(&self) -> usize {
        self.field.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use errors::ErrorKind;
    use grid::GridGeometry;

    fn storage() -> CellStorage {
        CellStorage::new(GridGeometry::new([2, 3, 4], [0.0; 3], [1.0; 3]).unwrap())
    }

    #[test]
    fn set_then_get() {
        let mut s = storage();
        s.set(1, 2, 3, Vector3::new(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(s.get(1, 2, 3).unwrap(), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(s.get(0, 0, 0).unwrap(), Vector3::zeros());
    }

    #[test]
    fn out_of_range_access_fails() {
        let mut s = storage();
        match s.get(2, 0, 0) {
            Err(e) => {
                match *e.kind() {
                    ErrorKind::IndexOutOfRange(2, 0, 0, 2, 3, 4) => {}
                    ref other => panic!("unexpected error {:?}", other),
                }
            }
            Ok(v) => panic!("expected an error, got {:?}", v),
        }
        assert!(s.set(0, 3, 0, Vector3::zeros()).is_err());
        assert!(s.mark_defined(0, 0, 4).is_err());
    }

    #[test]
    fn validity_follows_defined_flags() {
        let mut s = storage();
        assert!(!s.is_valid(1, 1, 1));
        s.mark_defined(1, 1, 1).unwrap();
        assert!(s.is_valid(1, 1, 1));
        assert!(!s.is_valid(0, 1, 1));
        assert_eq!(s.defined_count(), 1);
    }

    #[test]
    fn all_defined_skips_flags_but_not_bounds() {
        let mut s = storage();
        s.mark_all_defined();
        assert!(s.all_defined());
        assert!(s.is_valid(0, 0, 0));
        assert!(s.is_valid(1, 2, 3));
        assert!(!s.is_valid(2, 2, 3));
        assert_eq!(s.defined_count(), 24);
    }
}
