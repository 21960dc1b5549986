//! Legacy ASCII VTK polydata.
//!
//! Surface meshes produced by the structural extraction step are stored in
//! FSL scaled-voxel millimetres as `DATASET POLYDATA` with a `POINTS` and a `POLYGONS`
//! section. Polygons with more than three vertices are fan-triangulated.

use std::io::{BufRead, Write};
use std::path::Path;

use nalgebra::Point3;
use rhino_core::{CoordFrame, Error, Result, TriangleMesh};

use crate::open_input;

struct Tokens {
    tokens: Vec<String>,
    pos: usize,
}

impl Tokens {
    fn next(&mut self) -> Option<&str> {
        let tok = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(tok.as_str())
    }

    fn remaining(&self) -> usize {
        self.tokens.len() - self.pos
    }

    fn require(&mut self, what: &str) -> Result<&str> {
        self.next()
            .ok_or_else(|| Error::Parse(format!("Unexpected end of VTK file, expected {}", what)))
    }

    fn number<T: std::str::FromStr>(&mut self, what: &str) -> Result<T> {
        let tok = self.require(what)?;
        tok.parse::<T>()
            .map_err(|_| Error::Parse(format!("Invalid {} '{}' in VTK file", what, tok)))
    }
}

/// Read a legacy ASCII VTK polydata mesh whose points are in `frame`.
pub fn read_vtk<R: BufRead>(reader: R, frame: CoordFrame) -> Result<TriangleMesh> {
    let mut lines = reader.lines();

    let mut header = |what: &str| -> Result<String> {
        match lines.next() {
            Some(line) => Ok(line?.trim().to_string()),
            None => Err(Error::Parse(format!("VTK file ends before {}", what))),
        }
    };
    let magic = header("version line")?;
    if !magic.starts_with("# vtk") {
        return Err(Error::UnsupportedFormat(format!(
            "not a legacy VTK file: '{}'",
            magic
        )));
    }
    let _title = header("title")?;
    let encoding = header("encoding")?;
    if !encoding.eq_ignore_ascii_case("ASCII") {
        return Err(Error::UnsupportedFormat(format!(
            "only ASCII VTK is supported, got '{}'",
            encoding
        )));
    }

    let mut tokens = Vec::new();
    for line in lines {
        tokens.extend(line?.split_whitespace().map(str::to_string));
    }
    let mut tokens = Tokens { tokens, pos: 0 };

    let mut vertices: Vec<Point3<f64>> = Vec::new();
    let mut triangles: Vec<[usize; 3]> = Vec::new();

    while let Some(keyword) = tokens.next() {
        match keyword.to_ascii_uppercase().as_str() {
            "DATASET" => {
                let kind = tokens.require("dataset type")?;
                if !kind.eq_ignore_ascii_case("POLYDATA") {
                    return Err(Error::UnsupportedFormat(format!(
                        "VTK dataset '{}' is not POLYDATA",
                        kind
                    )));
                }
            }
            "POINTS" => {
                let n: usize = tokens.number("point count")?;
                let _dtype = tokens.require("point data type")?;
                // The count is untrusted; never reserve past what the file holds.
                vertices.reserve(n.min(tokens.remaining() / 3));
                for _ in 0..n {
                    let x = tokens.number("coordinate")?;
                    let y = tokens.number("coordinate")?;
                    let z = tokens.number("coordinate")?;
                    vertices.push(Point3::new(x, y, z));
                }
            }
            "POLYGONS" => {
                let n: usize = tokens.number("polygon count")?;
                let _size: usize = tokens.number("polygon list size")?;
                for _ in 0..n {
                    let k: usize = tokens.number("polygon size")?;
                    let face = (0..k)
                        .map(|_| tokens.number::<usize>("vertex index"))
                        .collect::<Result<Vec<_>>>()?;
                    for i in 1..k.saturating_sub(1) {
                        triangles.push([face[0], face[i], face[i + 1]]);
                    }
                }
            }
            "VERTICES" | "LINES" | "TRIANGLE_STRIPS" => {
                let _n: usize = tokens.number("cell count")?;
                let size: usize = tokens.number("cell list size")?;
                for _ in 0..size {
                    tokens.require("cell index")?;
                }
            }
            // Attribute data follows the geometry and is not needed.
            "POINT_DATA" | "CELL_DATA" => break,
            other => {
                return Err(Error::Parse(format!("Unexpected VTK keyword '{}'", other)));
            }
        }
    }

    if vertices.is_empty() {
        return Err(Error::Parse("VTK file has no POINTS section".to_string()));
    }
    TriangleMesh::new(frame, vertices, triangles)
}

pub fn read_vtk_file(path: impl AsRef<Path>, frame: CoordFrame) -> Result<TriangleMesh> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading VTK mesh");
    read_vtk(open_input(path)?, frame)
}

/// Write a mesh as legacy ASCII VTK polydata.
pub fn write_vtk<W: Write>(writer: &mut W, mesh: &TriangleMesh) -> Result<()> {
    writeln!(writer, "# vtk DataFile Version 3.0")?;
    writeln!(writer, "surface mesh ({})", mesh.frame())?;
    writeln!(writer, "ASCII")?;
    writeln!(writer, "DATASET POLYDATA")?;
    writeln!(writer, "POINTS {} float", mesh.vertices().len())?;
    for v in mesh.vertices() {
        writeln!(writer, "{} {} {}", v.x, v.y, v.z)?;
    }
    let n = mesh.triangles().len();
    writeln!(writer, "POLYGONS {} {}", n, n * 4)?;
    for [a, b, c] in mesh.triangles() {
        writeln!(writer, "3 {} {} {}", a, b, c)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const QUAD: &str = "# vtk DataFile Version 3.0
vtk output
ASCII
DATASET POLYDATA
POINTS 5 float
0 0 0 1 0 0 1 1 0
0 1 0 0.5 0.5 1
POLYGONS 3 13
4 0 1 2 3
3 0 1 4
3 1 2 4
";

    #[test]
    fn test_read_fan_triangulates_quads() {
        let mesh = read_vtk(Cursor::new(QUAD), CoordFrame::MriVoxel).unwrap();
        assert_eq!(mesh.vertices().len(), 5);
        assert_eq!(mesh.vertices()[4], Point3::new(0.5, 0.5, 1.0));
        assert_eq!(
            mesh.triangles(),
            &[[0, 1, 2], [0, 2, 3], [0, 1, 4], [1, 2, 4]]
        );
        assert_eq!(mesh.frame(), CoordFrame::MriVoxel);
    }

    #[test]
    fn test_write_then_read() {
        let mesh = read_vtk(Cursor::new(QUAD), CoordFrame::Mri).unwrap();
        let mut buf = Vec::new();
        write_vtk(&mut buf, &mesh).unwrap();
        let back = read_vtk(Cursor::new(buf), CoordFrame::Mri).unwrap();
        assert_eq!(back, mesh);
    }

    #[test]
    fn test_point_data_is_ignored() {
        let text = format!("{}POINT_DATA 5\nSCALARS s float\nLOOKUP_TABLE default\n1 2 3 4 5\n", QUAD);
        let mesh = read_vtk(Cursor::new(text), CoordFrame::MriVoxel).unwrap();
        assert_eq!(mesh.triangles().len(), 4);
    }

    #[test]
    fn test_rejects_bad_input() {
        let binary = QUAD.replace("ASCII", "BINARY");
        assert!(read_vtk(Cursor::new(binary), CoordFrame::Mri).is_err());

        let grid = QUAD.replace("POLYDATA", "STRUCTURED_GRID");
        assert!(read_vtk(Cursor::new(grid), CoordFrame::Mri).is_err());

        let out_of_range = QUAD.replace("3 1 2 4", "3 1 2 9");
        assert!(read_vtk(Cursor::new(out_of_range), CoordFrame::Mri).is_err());

        let truncated = &QUAD[..QUAD.len() - 10];
        assert!(read_vtk(Cursor::new(truncated), CoordFrame::Mri).is_err());
    }

    #[test]
    fn test_huge_point_count_with_short_data() {
        let text = QUAD.replace("POINTS 5 float", "POINTS 2000000000 float");
        assert!(matches!(
            read_vtk(Cursor::new(text), CoordFrame::Mri),
            Err(Error::Parse(_))
        ));
    }
}
