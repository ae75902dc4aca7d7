use nalgebra::Vector3;
use num::Float;

use container::CellStorage;
use grid::{GridGeometry, GridPoint};

/// What to do when the interpolation stencil touches undefined cells.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UndefinedPolicy {
    /// The query fails.
    Fail,
    /// Each undefined sample is replaced by the nearest defined sample of the
    /// same stencil; the query fails only if the stencil has none.
    NearestValid,
}

impl Default for UndefinedPolicy {
    fn default() -> Self {
        UndefinedPolicy::NearestValid
    }
}

/// Second order polynomial through `f[0]`, `f[1]`, `f[2]` at offsets -1, 0, 1,
/// evaluated at `t`.
#[inline]
pub fn poly2<S: Float>(f: &[S; 3], t: S) -> S {
    let two = S::one() + S::one();
    let half = S::one() / two;
    f[1] + t * half * (f[2] - f[0]) + t * t * half * (f[2] - two * f[1] + f[0])
}

/// Straight line through `f0` at 0 and `f1` at 1, evaluated at `t`.
#[inline]
pub fn poly1<S: Float>(f0: S, f1: S, t: S) -> S {
    f0 + t * (f1 - f0)
}

/// Nodes used along one axis of the stencil.
///
/// Axes with at least three nodes get a three wide window centred on the
/// anchor, pushed inward at the grid edges. Two node axes use both nodes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AxisWindow {
    /// Node from which the fractional offset is measured.
    pub origin: usize,
    pub start: usize,
    pub len: usize,
}

impl AxisWindow {
    pub fn around(anchor: usize, n: usize) -> Self {
        if n >= 3 {
            let centre = anchor.max(1).min(n - 2);
            AxisWindow {
                origin: centre,
                start: centre - 1,
                len: 3,
            }
        } else {
            AxisWindow {
                origin: 0,
                start: 0,
                len: 2,
            }
        }
    }

    #[inline]
    fn fit(&self, f: &[f64; 3], t: f64) -> f64 {
        if self.len == 3 {
            poly2(f, t)
        } else {
            poly1(f[0], f[1], t)
        }
    }
}

type Samples<T> = [[[T; 3]; 3]; 3];

/// The neighbourhood of samples around an anchor node.
#[derive(Debug, Clone)]
pub struct Stencil {
    windows: [AxisWindow; 3],
    samples: Samples<Option<Vector3<f64>>>,
}

impl Stencil {
    /// Collects the samples around `anchor`. Undefined cells are left empty.
    pub fn gather(geometry: &GridGeometry, storage: &CellStorage, anchor: &GridPoint) -> Self {
        let windows = [AxisWindow::around(anchor.ix, geometry.nx()),
                       AxisWindow::around(anchor.iy, geometry.ny()),
                       AxisWindow::around(anchor.iz, geometry.nz())];
        let mut samples = [[[None; 3]; 3]; 3];
        for (i, j, k) in iproduct!(0..windows[0].len, 0..windows[1].len, 0..windows[2].len) {
            let (ix, iy, iz) = (windows[0].start + i, windows[1].start + j, windows[2].start + k);
            if storage.is_valid(ix, iy, iz) {
                samples[i][j][k] = Some(storage.at(ix, iy, iz));
            }
        }
        Stencil {
            windows: windows,
            samples: samples,
        }
    }

    /// Node the fractional offsets passed to `interpolate` are measured from.
    pub fn origin(&self) -> GridPoint {
        GridPoint::new(self.windows[0].origin,
                       self.windows[1].origin,
                       self.windows[2].origin)
    }

    pub fn windows(&self) -> &[AxisWindow; 3] {
        &self.windows
    }

    pub fn is_complete(&self) -> bool {
        self.positions().all(|(i, j, k)| self.samples[i][j][k].is_some())
    }

    /// Interpolates at `frac` (in grid steps from `origin()`), or `None` if
    /// `policy` does not allow the undefined samples in this stencil.
    pub fn interpolate(&self, frac: &Vector3<f64>, policy: UndefinedPolicy) -> Option<Vector3<f64>> {
        let samples = self.resolve(policy)?;
        let [wx, wy, wz] = self.windows;
        let mut result: Vector3<f64> = Vector3::zeros();
        for c in 0..3 {
            let mut plane = [[0.0; 3]; 3];
            for (j, k) in iproduct!(0..wy.len, 0..wz.len) {
                let f = [samples[0][j][k][c], samples[1][j][k][c], samples[2][j][k][c]];
                plane[j][k] = wx.fit(&f, frac[0]);
            }
            let mut line = [0.0; 3];
            for k in 0..wz.len {
                line[k] = wy.fit(&[plane[0][k], plane[1][k], plane[2][k]], frac[1]);
            }
            result[c] = wz.fit(&line, frac[2]);
        }
        Some(result)
    }

    fn positions<'a>(&'a self) -> impl Iterator<Item = (usize, usize, usize)> + 'a {
        iproduct!(0..self.windows[0].len,
                  0..self.windows[1].len,
                  0..self.windows[2].len)
    }

    fn resolve(&self, policy: UndefinedPolicy) -> Option<Samples<Vector3<f64>>> {
        let mut resolved: Samples<Vector3<f64>> = [[[Vector3::zeros(); 3]; 3]; 3];
        for (i, j, k) in self.positions() {
            resolved[i][j][k] = match self.samples[i][j][k] {
                Some(value) => value,
                None => {
                    match policy {
                        UndefinedPolicy::Fail => return None,
                        UndefinedPolicy::NearestValid => self.nearest_defined(i, j, k)?,
                    }
                }
            };
        }
        Some(resolved)
    }

    fn nearest_defined(&self, i: usize, j: usize, k: usize) -> Option<Vector3<f64>> {
        let distance = |a: usize, b: usize| (a as isize - b as isize).pow(2);
        let mut best: Option<(isize, Vector3<f64>)> = None;
        for (a, b, c) in self.positions() {
            if let Some(value) = self.samples[a][b][c] {
                let d = distance(a, i) + distance(b, j) + distance(c, k);
                if best.map_or(true, |(best_d, _)| d < best_d) {
                    best = Some((d, value));
                }
            }
        }
        best.map(|(_, value)| value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use container::CellStorage;
    use grid::{GridGeometry, GridPoint};
    use nalgebra::Point3;

    fn storage_from<F>(geometry: &GridGeometry, f: F) -> CellStorage
        where F: Fn(Point3<f64>) -> Vector3<f64>
    {
        let mut storage = CellStorage::new(*geometry);
        for (ix, iy, iz) in iproduct!(0..geometry.nx(), 0..geometry.ny(), 0..geometry.nz()) {
            storage.set(ix, iy, iz, f(geometry.grid_to_point(ix, iy, iz))).unwrap();
            storage.mark_defined(ix, iy, iz).unwrap();
        }
        storage
    }

    #[test]
    fn poly2_passes_through_samples() {
        let f = [3.0, -1.0, 7.0];
        assert_eq!(poly2(&f, -1.0), 3.0);
        assert_eq!(poly2(&f, 0.0), -1.0);
        assert_eq!(poly2(&f, 1.0), 7.0);
    }

    #[test]
    fn poly2_is_exact_for_parabolas() {
        let p = |x: f64| 2.0 * x * x - 3.0 * x + 0.5;
        let f = [p(-1.0), p(0.0), p(1.0)];
        for &t in &[-1.5, -0.3, 0.25, 0.8, 1.5] {
            assert!((poly2(&f, t) - p(t)).abs() < 1e-12, "t = {}", t);
        }
    }

    #[test]
    fn windows_are_pushed_inward_at_edges() {
        assert_eq!(AxisWindow::around(0, 5),
                   AxisWindow {
                       origin: 1,
                       start: 0,
                       len: 3,
                   });
        assert_eq!(AxisWindow::around(4, 5).start, 2);
        assert_eq!(AxisWindow::around(2, 5).origin, 2);
        assert_eq!(AxisWindow::around(1, 2),
                   AxisWindow {
                       origin: 0,
                       start: 0,
                       len: 2,
                   });
    }

    #[test]
    fn reproduces_quadratic_fields() {
        let g = GridGeometry::new([5, 4, 3], [0.0, -1.0, 2.0], [1.0, 0.5, 2.0]).unwrap();
        let field = |p: Point3<f64>| {
            Vector3::new(p.x * p.x + p.y, p.y * p.z - 1.0, 0.5 * p.z * p.z - p.x * p.y)
        };
        let storage = storage_from(&g, &field);
        for &(x, y, z) in &[(0.1, -0.9, 2.2), (2.6, 0.1, 4.9), (3.95, 0.45, 6.0)] {
            let p = Point3::new(x, y, z);
            let stencil = Stencil::gather(&g, &storage, &g.point_to_grid(&p));
            assert!(stencil.is_complete());
            let frac = g.cell_fraction(&p, &stencil.origin());
            let value = stencil.interpolate(&frac, UndefinedPolicy::Fail).unwrap();
            assert!((value - field(p)).norm() < 1e-9,
                    "at {:?}: {:?} vs {:?}",
                    p,
                    value,
                    field(p));
        }
    }

    #[test]
    fn two_node_axes_interpolate_linearly() {
        let g = GridGeometry::new([2, 2, 2], [0.0; 3], [1.0; 3]).unwrap();
        let storage = storage_from(&g, |p| Vector3::new(p.x + 2.0 * p.y + 3.0 * p.z, 1.0, 0.0));
        let p = Point3::new(0.25, 0.5, 0.75);
        let stencil = Stencil::gather(&g, &storage, &g.point_to_grid(&p));
        assert_eq!(stencil.origin(), GridPoint::new(0, 0, 0));
        let frac = g.cell_fraction(&p, &stencil.origin());
        let value = stencil.interpolate(&frac, UndefinedPolicy::Fail).unwrap();
        assert!((value - Vector3::new(3.5, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn undefined_samples_follow_policy() {
        let g = GridGeometry::new([3, 3, 3], [0.0; 3], [1.0; 3]).unwrap();
        let mut storage = CellStorage::new(g);
        for (ix, iy, iz) in iproduct!(0..3, 0..3, 0..3) {
            storage.set(ix, iy, iz, Vector3::new(1.0, 2.0, 3.0)).unwrap();
            if (ix, iy, iz) != (2, 2, 2) {
                storage.mark_defined(ix, iy, iz).unwrap();
            }
        }
        let anchor = GridPoint::new(1, 1, 1);
        let stencil = Stencil::gather(&g, &storage, &anchor);
        assert!(!stencil.is_complete());
        let frac = Vector3::new(0.5, 0.5, 0.5);
        assert_eq!(stencil.interpolate(&frac, UndefinedPolicy::Fail), None);
        let value = stencil.interpolate(&frac, UndefinedPolicy::NearestValid).unwrap();
        assert!((value - Vector3::new(1.0, 2.0, 3.0)).norm() < 1e-12);
    }

    #[test]
    fn nearest_valid_substitutes_closest_neighbour() {
        let g = GridGeometry::new([3, 3, 3], [0.0; 3], [1.0; 3]).unwrap();
        let mut storage = CellStorage::new(g);
        // Only two cells are defined; (0, 0, 0) stays empty and must take its
        // value from (0, 0, 1) rather than the far corner.
        storage.set(0, 0, 1, Vector3::new(5.0, 0.0, 0.0)).unwrap();
        storage.mark_defined(0, 0, 1).unwrap();
        storage.set(2, 2, 2, Vector3::new(-5.0, 0.0, 0.0)).unwrap();
        storage.mark_defined(2, 2, 2).unwrap();
        let stencil = Stencil::gather(&g, &storage, &GridPoint::new(1, 1, 1));
        let at_corner = stencil.interpolate(&Vector3::new(-1.0, -1.0, -1.0),
                                            UndefinedPolicy::NearestValid)
            .unwrap();
        assert_eq!(at_corner, Vector3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn empty_stencil_fails_under_every_policy() {
        let g = GridGeometry::new([3, 3, 3], [0.0; 3], [1.0; 3]).unwrap();
        let storage = CellStorage::new(g);
        let stencil = Stencil::gather(&g, &storage, &GridPoint::new(1, 1, 1));
        assert_eq!(stencil.interpolate(&Vector3::zeros(), UndefinedPolicy::NearestValid),
                   None);
    }
}
