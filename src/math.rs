use nalgebra::{Point3, Vector3};

/// Step used by `divergence_at` when no better one is known.
pub const DEFAULT_DIFFERENCE_STEP: f64 = 1e-3;

pub trait VectorField {
    /// Field value at `position`, or `None` where the field is not defined.
    fn field_at(&self, position: &Point3<f64>) -> Option<Vector3<f64>>;

    /// Central difference estimate of the divergence with half width `h`.
    #[inline]
    fn divergence_at(&self, position: &Point3<f64>, h: f64) -> Option<f64> {
        let mut divergence = 0.0;
        for axis in 0..3 {
            let mut offset: Vector3<f64> = Vector3::zeros();
            offset[axis] = h;
            let ahead = self.field_at(&(*position + offset))?;
            let behind = self.field_at(&(*position - offset))?;
            divergence += (ahead[axis] - behind[axis]) / (2.0 * h);
        }
        Some(divergence)
    }
}

/// The same field everywhere.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct UniformField {
    pub value: Vector3<f64>,
}

impl UniformField {
    pub fn new(value: Vector3<f64>) -> Self {
        UniformField { value: value }
    }
}

impl VectorField for UniformField {
    #[inline]
    fn field_at(&self, _position: &Point3<f64>) -> Option<Vector3<f64>> {
        Some(self.value)
    }
}
