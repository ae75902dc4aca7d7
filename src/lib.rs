#![recursion_limit = "1024"]

extern crate byteorder;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate itertools;
#[macro_use]
extern crate log;
extern crate nalgebra;
extern crate num;

pub mod config;
pub mod container;
pub mod errors;
pub mod format;
pub mod grid;
pub mod interpolate;
pub mod loader;
pub mod manager;
pub mod map;
pub mod math;

pub use config::{LoadSettings, MapConfig};
pub use container::{CellStorage, Container3D};
pub use format::{ConstraintRegistry, ExcludedBox, ExcludedCylinder, MapFormat, RegionConstraint};
pub use grid::{GridGeometry, GridPoint};
pub use interpolate::{Stencil, UndefinedPolicy};
pub use manager::BFieldManager;
pub use map::{BFieldMap, BFieldMapBuilder};
pub use math::{UniformField, VectorField};
