error_chain! {
    types {
        Error, ErrorKind, ChainErr, Result;
    }

    foreign_links {
        Io(::std::io::Error);
        ParseFloat(::std::num::ParseFloatError);
        ParseInt(::std::num::ParseIntError);
    }

    errors {
        InvalidGridGeometry(msg: String) {
            description("Invalid grid geometry.")
            display("Invalid grid geometry: {}", msg)
        }
        IndexOutOfRange(ix: usize, iy: usize, iz: usize, nx: usize, ny: usize, nz: usize) {
            description("Grid index out of range.")
            display("Grid index ({}, {}, {}) out of range for a {} x {} x {} grid",
                    ix, iy, iz, nx, ny, nz)
        }
        OffGridSample(x: f64, y: f64, z: f64) {
            description("Sample does not lie on a grid node.")
            display("Sample at ({}, {}, {}) does not lie on a grid node", x, y, z)
        }
        MalformedMap(msg: String) {
            description("Malformed field map.")
            display("Malformed field map: {}", msg)
        }
        UnexhaustedMapFile {
            description("More data than expected in field map file.")
            display("More data than expected in field map file.")
        }
        UnknownMapFormat(name: String) {
            description("Unknown field map format.")
            display("Unknown field map format: '{}'", name)
        }
    }
}
