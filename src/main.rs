#![recursion_limit = "1024"]

extern crate bfmap;
#[macro_use]
extern crate clap;
extern crate env_logger;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;
extern crate nalgebra;
extern crate rayon;

use std::io::{self, BufRead, Write};
use clap::{Arg, ArgMatches};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use bfmap::errors::{ChainErr, ErrorKind, Result};
use bfmap::loader;
use bfmap::{BFieldMap, ConstraintRegistry, ExcludedBox, GridGeometry, LoadSettings, MapFormat,
            UndefinedPolicy};

fn parse_numbers(text: &str) -> Result<Vec<f64>> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| word.parse::<f64>().chain_err(|| format!("Bad number '{}'", word)))
        .collect()
}

fn parse_point(text: &str) -> Result<Point3<f64>> {
    let values = parse_numbers(text)?;
    if values.len() != 3 {
        bail!(format!("Expected 'x,y,z' but got '{}'", text));
    }
    Ok(Point3::new(values[0], values[1], values[2]))
}

fn grid_from_args(matches: &ArgMatches) -> Result<GridGeometry> {
    let extent = |name: &str| {
        value_t!(matches, name, usize).chain_err(|| format!("--{} is required for GMC maps", name))
    };
    let number = |name: &str| {
        value_t!(matches, name, f64).chain_err(|| format!("--{} is required for GMC maps", name))
    };
    GridGeometry::new([extent("nx")?, extent("ny")?, extent("nz")?],
                      [number("x0")?, number("y0")?, number("z0")?],
                      [number("dx")?, number("dy")?, number("dz")?])
}

fn settings_from_args(matches: &ArgMatches) -> Result<LoadSettings> {
    let mut settings = LoadSettings::default();
    if matches.is_present("scale") {
        settings.scale = value_t!(matches, "scale", f64).chain_err(|| "Bad --scale")?;
    }
    settings.warn_if_outside = matches.is_present("warn_outside");
    if matches.is_present("fail_on_undefined") {
        settings.undefined_policy = UndefinedPolicy::Fail;
    }
    if let Some(text) = matches.value_of("exclude_box") {
        let corners = parse_numbers(text)?;
        if corners.len() != 6 {
            bail!(format!("--exclude-box needs six numbers, got '{}'", text));
        }
        let hole = ExcludedBox {
            min: Point3::new(corners[0], corners[1], corners[2]),
            max: Point3::new(corners[3], corners[4], corners[5]),
        };
        settings.constraints = ConstraintRegistry::new().register(MapFormat::Gmc, hole);
    }
    Ok(settings)
}

fn load_map(matches: &ArgMatches, settings: &LoadSettings) -> Result<BFieldMap> {
    let path = match matches.value_of("map") {
        Some(path) => path,
        None => bail!(ErrorKind::MalformedMap("no map file given".to_string())),
    };
    match matches.value_of("format").unwrap_or("g4bl") {
        "bin" => loader::load_binary_file(path, settings),
        name => {
            match name.parse::<MapFormat>()? {
                MapFormat::G4bl => loader::load_g4bl_file(path, settings),
                MapFormat::Gmc => loader::load_gmc_file(path, grid_from_args(matches)?, settings),
            }
        }
    }
}

fn read_points(matches: &ArgMatches) -> Result<Vec<Point3<f64>>> {
    if let Some(values) = matches.values_of("point") {
        return values.map(parse_point).collect();
    }
    let stdin = io::stdin();
    let mut points = vec![];
    for line in stdin.lock().lines() {
        let line = line.chain_err(|| "Could not read points from stdin")?;
        let line = line.trim();
        if !line.is_empty() && !line.starts_with('#') {
            points.push(parse_point(line)?);
        }
    }
    Ok(points)
}

fn run() -> Result<()> {
    let matches = clap::App::new("bfmap")
        .version("0.1.0")
        .about("Queries magnetic field maps defined on regular grids.")
        .arg(Arg::with_name("map")
            .long("map")
            .value_name("FILE")
            .takes_value(true)
            .required(true))
        .arg(Arg::with_name("format")
            .long("format")
            .value_name("gmc|g4bl|bin")
            .takes_value(true))
        .arg(Arg::with_name("nx").long("nx").value_name("usize").takes_value(true))
        .arg(Arg::with_name("ny").long("ny").value_name("usize").takes_value(true))
        .arg(Arg::with_name("nz").long("nz").value_name("usize").takes_value(true))
        .arg(Arg::with_name("x0").long("x0").value_name("f64").takes_value(true))
        .arg(Arg::with_name("y0").long("y0").value_name("f64").takes_value(true))
        .arg(Arg::with_name("z0").long("z0").value_name("f64").takes_value(true))
        .arg(Arg::with_name("dx").long("dx").value_name("f64").takes_value(true))
        .arg(Arg::with_name("dy").long("dy").value_name("f64").takes_value(true))
        .arg(Arg::with_name("dz").long("dz").value_name("f64").takes_value(true))
        .arg(Arg::with_name("scale")
            .long("scale")
            .value_name("f64")
            .takes_value(true))
        .arg(Arg::with_name("exclude_box")
            .long("exclude-box")
            .value_name("xmin,ymin,zmin,xmax,ymax,zmax")
            .takes_value(true))
        .arg(Arg::with_name("warn_outside").long("warn-outside"))
        .arg(Arg::with_name("fail_on_undefined").long("fail-on-undefined"))
        .arg(Arg::with_name("describe").long("describe"))
        .arg(Arg::with_name("parallel").long("parallel"))
        .arg(Arg::with_name("write_binary")
            .long("write-binary")
            .value_name("FILE")
            .takes_value(true))
        .arg(Arg::with_name("point")
            .long("point")
            .value_name("x,y,z")
            .takes_value(true)
            .multiple(true)
            .number_of_values(1))
        .get_matches();

    let settings = settings_from_args(&matches)?;
    let map = load_map(&matches, &settings)?;
    if matches.is_present("describe") {
        println!("{}", map);
    }
    if let Some(path) = matches.value_of("write_binary") {
        loader::write_binary_file(&map, path)?;
        info!("Wrote binary copy of '{}' to {}", map.key(), path);
    }
    if matches.is_present("describe") && matches.values_of("point").is_none() {
        return Ok(());
    }

    let points = read_points(&matches)?;
    let results: Vec<(bool, Vector3<f64>)> = if matches.is_present("parallel") {
        points.par_iter().map(|point| map.query_field(point)).collect()
    } else {
        points.iter().map(|point| map.query_field(point)).collect()
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (point, &(valid, value)) in points.iter().zip(results.iter()) {
        writeln!(out,
                 "{} {} {} {} {} {} {}",
                 point.x,
                 point.y,
                 point.z,
                 if valid { 1 } else { 0 },
                 value.x,
                 value.y,
                 value.z)?;
    }
    Ok(())
}

fn main() {
    if let Err(err) = env_logger::try_init() {
        println!("Could not initialize logger, exiting: {}", err);
    } else if let Err(err) = run() {
        error!("{}", err);
        for cause in err.iter().skip(1) {
            error!("  caused by: {}", cause);
        }
        ::std::process::exit(1);
    }
}
