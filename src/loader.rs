//! Readers and writers for field map files.
//!
//! Text maps hold one sample per line as `x y z bx by bz`. G4beamline style
//! maps describe their grid in a `grid X0=.. nX=.. dX=..` header line followed
//! by a `data` line; GMC style maps are bare samples on a grid the caller
//! supplies, and may leave holes. The binary format is a dump of a built map,
//! used as a cache.

use std::fmt::Debug;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use nalgebra::{Point3, Vector3};

use config::LoadSettings;
use errors::{ChainErr, ErrorKind, Result};
use format::MapFormat;
use grid::{GridGeometry, GridPoint};
use map::{BFieldMap, BFieldMapBuilder};

const BINARY_MAGIC: &'static [u8; 8] = b"BFMAPBIN";

/// Smallest and largest field magnitude seen while loading.
struct FieldRange {
    min: f64,
    max: f64,
}

impl FieldRange {
    fn new() -> Self {
        FieldRange {
            min: ::std::f64::INFINITY,
            max: 0.0,
        }
    }

    fn add(&mut self, value: &Vector3<f64>) {
        let magnitude = value.norm();
        self.min = self.min.min(magnitude);
        self.max = self.max.max(magnitude);
    }
}

enum Section {
    Header(Option<GridGeometry>),
    Data(BFieldMapBuilder),
}

pub fn load_g4bl<R: BufRead>(key: &str, reader: R, settings: &LoadSettings) -> Result<BFieldMap> {
    let mut section = Section::Header(None);
    let mut range = FieldRange::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.chain_err(|| format!("Could not read line {} of {}", index + 1, key))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        section = match section {
            Section::Header(geometry) => {
                let mut words = line.split_whitespace();
                match words.next() {
                    Some("grid") => Section::Header(Some(parse_grid_line(words, index + 1)?)),
                    Some("data") => {
                        let geometry = match geometry {
                            Some(geometry) => geometry,
                            None => {
                                bail!(ErrorKind::MalformedMap(format!("{}: no grid line before \
                                                                       data",
                                                                      key)))
                            }
                        };
                        let config = settings.map_config(key, MapFormat::G4bl, geometry);
                        let builder = BFieldMapBuilder::new(config)?
                            .constraints(&settings.constraints);
                        Section::Data(builder)
                    }
                    _ => Section::Header(geometry),
                }
            }
            Section::Data(mut builder) => {
                let (position, value) = parse_sample(line, index + 1)?;
                builder.set_at(&position, value)
                    .chain_err(|| format!("Bad sample on line {} of {}", index + 1, key))?;
                range.add(&value);
                Section::Data(builder)
            }
        };
    }

    match section {
        Section::Data(builder) => Ok(finish(builder, &range)),
        Section::Header(_) => {
            Err(ErrorKind::MalformedMap(format!("{}: no data section", key)).into())
        }
    }
}

pub fn load_g4bl_file<P>(path: P, settings: &LoadSettings) -> Result<BFieldMap>
    where P: AsRef<Path> + Debug
{
    let file = File::open(path.as_ref())
        .chain_err(|| format!("Failed opening field map {:?}", path))?;
    load_g4bl(&path.as_ref().display().to_string(),
              BufReader::new(file),
              settings)
}

pub fn load_gmc<R: BufRead>(key: &str,
                            reader: R,
                            geometry: GridGeometry,
                            settings: &LoadSettings)
                            -> Result<BFieldMap> {
    let config = settings.map_config(key, MapFormat::Gmc, geometry);
    let mut builder = BFieldMapBuilder::new(config)?.constraints(&settings.constraints);
    let mut range = FieldRange::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.chain_err(|| format!("Could not read line {} of {}", index + 1, key))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (position, value) = parse_sample(line, index + 1)?;
        builder.set_at(&position, value)
            .chain_err(|| format!("Bad sample on line {} of {}", index + 1, key))?;
        range.add(&value);
    }
    Ok(finish(builder, &range))
}

pub fn load_gmc_file<P>(path: P, geometry: GridGeometry, settings: &LoadSettings) -> Result<BFieldMap>
    where P: AsRef<Path> + Debug
{
    let file = File::open(path.as_ref())
        .chain_err(|| format!("Failed opening field map {:?}", path))?;
    load_gmc(&path.as_ref().display().to_string(),
             BufReader::new(file),
             geometry,
             settings)
}

/// Dumps `map` without its scale factor, so the settings used when loading the
/// dump decide the scale.
pub fn write_binary<W: Write>(map: &BFieldMap, mut writer: W) -> Result<()> {
    let geometry = map.geometry();
    writer.write_all(BINARY_MAGIC)?;
    writer.write_u8(match map.format() {
            MapFormat::Gmc => 0,
            MapFormat::G4bl => 1,
        })?;
    for &n in &geometry.extents() {
        writer.write_u32::<LittleEndian>(n as u32)?;
    }
    for axis in 0..3 {
        writer.write_f64::<LittleEndian>(geometry.min(axis))?;
    }
    for axis in 0..3 {
        writer.write_f64::<LittleEndian>(geometry.step(axis))?;
    }
    for (ix, iy, iz) in iproduct!(0..geometry.nx(), 0..geometry.ny(), 0..geometry.nz()) {
        match map.raw_sample(&GridPoint::new(ix, iy, iz)) {
            Some(value) => {
                writer.write_u8(1)?;
                for c in 0..3 {
                    writer.write_f64::<LittleEndian>(value[c])?;
                }
            }
            None => {
                writer.write_u8(0)?;
                for _ in 0..3 {
                    writer.write_f64::<LittleEndian>(0.0)?;
                }
            }
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_binary_file<P>(map: &BFieldMap, path: P) -> Result<()>
    where P: AsRef<Path> + Debug
{
    let file = File::create(path.as_ref())
        .chain_err(|| format!("Failed creating binary field map {:?}", path))?;
    write_binary(map, BufWriter::new(file))
        .chain_err(|| format!("Failed writing binary field map {:?}", path))
}

pub fn load_binary<R: Read>(key: &str, mut reader: R, settings: &LoadSettings) -> Result<BFieldMap> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)
        .chain_err(|| format!("{}: missing binary field map header", key))?;
    if &magic != BINARY_MAGIC {
        bail!(ErrorKind::MalformedMap(format!("{}: not a binary field map", key)));
    }
    let format = match reader.read_u8()? {
        0 => MapFormat::Gmc,
        1 => MapFormat::G4bl,
        other => bail!(ErrorKind::MalformedMap(format!("{}: unknown format tag {}", key, other))),
    };
    let mut n = [0usize; 3];
    let mut min = [0.0; 3];
    let mut step = [0.0; 3];
    for axis in 0..3 {
        n[axis] = reader.read_u32::<LittleEndian>()? as usize;
    }
    for axis in 0..3 {
        min[axis] = reader.read_f64::<LittleEndian>()?;
    }
    for axis in 0..3 {
        step[axis] = reader.read_f64::<LittleEndian>()?;
    }
    let geometry = GridGeometry::new(n, min, step)?;

    let config = settings.map_config(key, format, geometry);
    let mut builder = BFieldMapBuilder::new(config)?.constraints(&settings.constraints);
    let mut range = FieldRange::new();
    for (ix, iy, iz) in iproduct!(0..n[0], 0..n[1], 0..n[2]) {
        let defined = reader.read_u8()
            .chain_err(|| format!("{}: binary field map is truncated", key))? != 0;
        let mut value: Vector3<f64> = Vector3::zeros();
        for c in 0..3 {
            value[c] = reader.read_f64::<LittleEndian>()
                .chain_err(|| format!("{}: binary field map is truncated", key))?;
        }
        if defined {
            builder.set(ix, iy, iz, value)?;
            builder.mark_defined(ix, iy, iz)?;
            range.add(&value);
        }
    }

    let remaining = reader.read_to_end(&mut Vec::new())?;
    if remaining > 0 {
        error!("Found {} unexpected bytes after {} cells in binary field map {}",
               remaining,
               geometry.n_cells(),
               key);
        return Err(ErrorKind::UnexhaustedMapFile.into());
    }
    Ok(finish(builder, &range))
}

pub fn load_binary_file<P>(path: P, settings: &LoadSettings) -> Result<BFieldMap>
    where P: AsRef<Path> + Debug
{
    let file = File::open(path.as_ref())
        .chain_err(|| format!("Failed opening binary field map {:?}", path))?;
    load_binary(&path.as_ref().display().to_string(),
                BufReader::new(file),
                settings)
}

fn finish(builder: BFieldMapBuilder, range: &FieldRange) -> BFieldMap {
    let geometry = *builder.geometry();
    let defined = builder.defined_count();
    if defined == 0 {
        warn!("Field map '{}' has no samples", builder.config().key);
    } else {
        info!("Loaded field map '{}': {} of {} cells defined, |B| in [{}, {}]",
              builder.config().key,
              defined,
              geometry.n_cells(),
              range.min,
              range.max);
    }
    builder.build()
}

fn parse_grid_line<'a, I>(words: I, line: usize) -> Result<GridGeometry>
    where I: Iterator<Item = &'a str>
{
    let mut n: [Option<usize>; 3] = [None; 3];
    let mut min: [Option<f64>; 3] = [None; 3];
    let mut step: [Option<f64>; 3] = [None; 3];
    for word in words {
        let mut parts = word.splitn(2, '=');
        let (name, value) = match (parts.next(), parts.next()) {
            (Some(name), Some(value)) => (name, value),
            _ => continue,
        };
        let context = || format!("Bad grid parameter '{}' on line {}", word, line);
        match grid_parameter(name) {
            Some(GridParameter::Nodes(axis)) => {
                n[axis] = Some(value.parse::<usize>().chain_err(&context)?)
            }
            Some(GridParameter::Origin(axis)) => {
                min[axis] = Some(value.parse::<f64>().chain_err(&context)?)
            }
            Some(GridParameter::Step(axis)) => {
                step[axis] = Some(value.parse::<f64>().chain_err(&context)?)
            }
            None => {}
        }
    }

    let missing = |name: &str| {
        ErrorKind::MalformedMap(format!("grid line {} has no {}", line, name))
    };
    let mut extents = [0; 3];
    let mut origin = [0.0; 3];
    let mut steps = [0.0; 3];
    for axis in 0..3 {
        let letter = ["X", "Y", "Z"][axis];
        extents[axis] = n[axis].ok_or_else(|| missing(&format!("n{}", letter)))?;
        origin[axis] = min[axis].ok_or_else(|| missing(&format!("{}0", letter)))?;
        steps[axis] = step[axis].ok_or_else(|| missing(&format!("d{}", letter)))?;
    }
    GridGeometry::new(extents, origin, steps)
}

enum GridParameter {
    Nodes(usize),
    Origin(usize),
    Step(usize),
}

fn grid_parameter(name: &str) -> Option<GridParameter> {
    Some(match name {
        "nX" => GridParameter::Nodes(0),
        "nY" => GridParameter::Nodes(1),
        "nZ" => GridParameter::Nodes(2),
        "X0" => GridParameter::Origin(0),
        "Y0" => GridParameter::Origin(1),
        "Z0" => GridParameter::Origin(2),
        "dX" => GridParameter::Step(0),
        "dY" => GridParameter::Step(1),
        "dZ" => GridParameter::Step(2),
        _ => return None,
    })
}

fn parse_sample(line: &str, number: usize) -> Result<(Point3<f64>, Vector3<f64>)> {
    let mut values = [0.0; 6];
    let mut count = 0;
    for word in line.split_whitespace() {
        if count < 6 {
            values[count] = word.parse::<f64>()
                .chain_err(|| format!("Bad number '{}' on line {}", word, number))?;
        }
        count += 1;
    }
    if count != 6 {
        bail!(ErrorKind::MalformedMap(format!("line {}: expected 6 values, found {}",
                                              number,
                                              count)));
    }
    Ok((Point3::new(values[0], values[1], values[2]),
        Vector3::new(values[3], values[4], values[5])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use config::LoadSettings;
    use errors::ErrorKind;
    use format::{ConstraintRegistry, ExcludedBox, MapFormat};
    use grid::{GridGeometry, GridPoint};
    use interpolate::UndefinedPolicy;
    use nalgebra::{Point3, Vector3};

    fn g4bl_text() -> String {
        let mut text = String::from("# solenoid test map\n\
                                     param maxline=100\n\
                                     grid X0=-1 Y0=0 Z0=10 nX=3 nY=2 nZ=2 dX=1 dY=2 dZ=5\n\
                                     extendX flip=Bx\n\
                                     data\n");
        for (ix, iy, iz) in iproduct!(0..3, 0..2, 0..2) {
            let (x, y, z) = (-1.0 + ix as f64, 2.0 * iy as f64, 10.0 + 5.0 * iz as f64);
            text.push_str(&format!("{} {} {} {} {} {}\n", x, y, z, 0.0, 0.1 * x, 1.0));
        }
        text
    }

    #[test]
    fn reads_g4bl_grid_and_samples() {
        let map = load_g4bl("solenoid", Cursor::new(g4bl_text()), &LoadSettings::default())
            .unwrap();
        assert_eq!(map.format(), MapFormat::G4bl);
        assert_eq!((map.nx(), map.ny(), map.nz()), (3, 2, 2));
        assert_eq!((map.xmin(), map.ymax(), map.zmax()), (-1.0, 2.0, 15.0));
        assert!(map.all_defined());
        let (ok, value) = map.query_field(&Point3::new(0.5, 1.0, 12.0));
        assert!(ok);
        assert!((value - Vector3::new(0.0, 0.05, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn g4bl_without_grid_is_malformed() {
        let text = "data\n0 0 0 1 1 1\n";
        match load_g4bl("broken", Cursor::new(text), &LoadSettings::default()) {
            Err(e) => {
                match *e.kind() {
                    ErrorKind::MalformedMap(ref msg) => assert!(msg.contains("grid")),
                    ref other => panic!("unexpected error {:?}", other),
                }
            }
            Ok(map) => panic!("loaded {:?}", map),
        }
    }

    #[test]
    fn g4bl_rejects_short_lines() {
        let text = g4bl_text() + "0 0 10 1 1\n";
        assert!(load_g4bl("short", Cursor::new(text), &LoadSettings::default()).is_err());
    }

    #[test]
    fn gmc_maps_may_have_holes() {
        let geometry = GridGeometry::new([3, 3, 3], [0.0; 3], [10.0; 3]).unwrap();
        let mut text = String::new();
        for (ix, iy, iz) in iproduct!(0..3, 0..3, 0..3) {
            if ix < 2 {
                text.push_str(&format!("{} {} {} 0 0 2\n", 10 * ix, 10 * iy, 10 * iz));
            }
        }
        let mut settings = LoadSettings::default();
        settings.scale = 0.5;
        settings.undefined_policy = UndefinedPolicy::Fail;
        let map = load_gmc("gmc", Cursor::new(text), geometry, &settings).unwrap();
        assert!(!map.all_defined());
        assert_eq!(map.defined_count(), 18);
        assert!(map.is_valid_grid(&GridPoint::new(1, 2, 2)));
        assert!(!map.is_valid_grid(&GridPoint::new(2, 0, 0)));
        assert_eq!(map.query_field(&Point3::new(5.0, 5.0, 5.0)),
                   (false, Vector3::zeros()));
        assert_eq!(map.sample(&GridPoint::new(0, 0, 0)), Some(Vector3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn g4bl_rejects_oversized_grid() {
        let text = "grid X0=0 Y0=0 Z0=0 nX=4000000 nY=4000000 nZ=4000000 dX=1 dY=1 dZ=1\n\
                    data\n";
        match load_g4bl("huge", Cursor::new(text), &LoadSettings::default()) {
            Err(e) => {
                match *e.kind() {
                    ErrorKind::InvalidGridGeometry(_) => {}
                    ref other => panic!("unexpected error {:?}", other),
                }
            }
            Ok(map) => panic!("loaded {:?}", map),
        }
    }

    #[test]
    fn gmc_rejects_non_finite_positions() {
        let geometry = GridGeometry::new([2, 2, 2], [0.0; 3], [1.0; 3]).unwrap();
        for text in &["NaN 0 0 7 8 9\n", "0 inf 0 7 8 9\n", "0 0 -inf 7 8 9\n"] {
            let result = load_gmc("gmc", Cursor::new(*text), geometry, &LoadSettings::default());
            assert!(result.is_err(), "accepted {:?}", text);
        }
    }

    #[test]
    fn gmc_rejects_off_grid_samples() {
        let geometry = GridGeometry::new([2, 2, 2], [0.0; 3], [1.0; 3]).unwrap();
        let text = "0.5 0 0 1 2 3\n";
        assert!(load_gmc("gmc", Cursor::new(text), geometry, &LoadSettings::default()).is_err());
    }

    #[test]
    fn binary_dump_restores_the_map() {
        let geometry = GridGeometry::new([3, 2, 2], [0.0; 3], [1.0; 3]).unwrap();
        let text = "0 0 0 1 2 3\n2 1 1 -1 0 4\n";
        let mut settings = LoadSettings::default();
        settings.constraints = ConstraintRegistry::new().register(MapFormat::Gmc,
                                                                  ExcludedBox {
                                                                      min: Point3::new(5.0,
                                                                                       5.0,
                                                                                       5.0),
                                                                      max: Point3::new(6.0,
                                                                                       6.0,
                                                                                       6.0),
                                                                  });
        let original = load_gmc("gmc", Cursor::new(text), geometry, &settings).unwrap();

        let mut bytes = Vec::new();
        write_binary(&original, &mut bytes).unwrap();
        settings.scale = 2.0;
        let restored = load_binary("gmc.bin", Cursor::new(bytes.clone()), &settings).unwrap();
        assert_eq!(restored.format(), MapFormat::Gmc);
        assert_eq!(restored.geometry(), original.geometry());
        assert_eq!(restored.defined_count(), 2);
        assert_eq!(restored.sample(&GridPoint::new(2, 1, 1)),
                   Some(Vector3::new(-2.0, 0.0, 8.0)));
        assert!(restored.to_string().contains("excluded box"));

        bytes.push(0);
        match load_binary("gmc.bin", Cursor::new(bytes), &settings) {
            Err(e) => {
                match *e.kind() {
                    ErrorKind::UnexhaustedMapFile => {}
                    ref other => panic!("unexpected error {:?}", other),
                }
            }
            Ok(_) => panic!("trailing data was accepted"),
        }
    }

    #[test]
    fn binary_rejects_oversized_header() {
        let mut bytes = BINARY_MAGIC.to_vec();
        bytes.write_u8(0).unwrap();
        for _ in 0..3 {
            bytes.write_u32::<LittleEndian>(4_000_000).unwrap();
        }
        for &value in &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0] {
            bytes.write_f64::<LittleEndian>(value).unwrap();
        }
        match load_binary("huge.bin", Cursor::new(bytes), &LoadSettings::default()) {
            Err(e) => {
                match *e.kind() {
                    ErrorKind::InvalidGridGeometry(_) => {}
                    ref other => panic!("unexpected error {:?}", other),
                }
            }
            Ok(map) => panic!("loaded {:?}", map),
        }
    }

    #[test]
    fn binary_rejects_foreign_files() {
        let bytes = b"NOTAMAPFILE....".to_vec();
        assert!(load_binary("x", Cursor::new(bytes), &LoadSettings::default()).is_err());
    }
}
