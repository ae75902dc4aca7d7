use format::{ConstraintRegistry, MapFormat};
use grid::GridGeometry;
use interpolate::UndefinedPolicy;

/// Map settings that do not come from the map file itself.
#[derive(Debug, Clone)]
pub struct LoadSettings {
    pub scale: f64,
    pub warn_if_outside: bool,
    pub undefined_policy: UndefinedPolicy,
    pub constraints: ConstraintRegistry,
}

impl Default for LoadSettings {
    fn default() -> Self {
        LoadSettings {
            scale: 1.0,
            warn_if_outside: false,
            undefined_policy: UndefinedPolicy::default(),
            constraints: ConstraintRegistry::new(),
        }
    }
}

impl LoadSettings {
    pub fn map_config<K: Into<String>>(&self,
                                       key: K,
                                       format: MapFormat,
                                       geometry: GridGeometry)
                                       -> MapConfig {
        MapConfig::new(key, format, geometry)
            .scale(self.scale)
            .warn_if_outside(self.warn_if_outside)
            .undefined_policy(self.undefined_policy)
    }
}

/// Everything needed to build one field map, apart from the samples.
#[derive(Debug, Clone, PartialEq)]
pub struct MapConfig {
    /// File name, database key or other description of where the map came from.
    pub key: String,
    pub format: MapFormat,
    pub geometry: GridGeometry,
    /// Applied to every value the map returns.
    pub scale: f64,
    /// Out of range queries are routine during tracking, so this is off by
    /// default.
    pub warn_if_outside: bool,
    pub undefined_policy: UndefinedPolicy,
}

impl MapConfig {
    pub fn new<K: Into<String>>(key: K, format: MapFormat, geometry: GridGeometry) -> Self {
        MapConfig {
            key: key.into(),
            format: format,
            geometry: geometry,
            scale: 1.0,
            warn_if_outside: false,
            undefined_policy: UndefinedPolicy::default(),
        }
    }

    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn warn_if_outside(mut self, warn: bool) -> Self {
        self.warn_if_outside = warn;
        self
    }

    pub fn undefined_policy(mut self, policy: UndefinedPolicy) -> Self {
        self.undefined_policy = policy;
        self
    }
}
