//! Whitespace-delimited point text files.
//!
//! The usual layout is one point per row with three columns. Two legacy
//! layouts are also accepted: three rows of N columns (one point per column)
//! and three rows of a single value (one point written one coordinate per line).

use std::io::{BufRead, Write};
use std::path::Path;

use nalgebra::Point3;
use rhino_core::{CoordFrame, Error, PointCloud, Result};

use crate::{create_output, open_input};

/// Parse a point text file into a cloud in `frame`.
pub fn read_points<R: BufRead>(reader: R, frame: CoordFrame) -> Result<PointCloud> {
    let mut rows: Vec<Vec<f64>> = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let row = line
            .split_whitespace()
            .map(|tok| {
                tok.parse::<f64>().map_err(|_| {
                    Error::Parse(format!("Invalid number '{}' on line {}", tok, line_no + 1))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        rows.push(row);
    }

    if rows.is_empty() {
        return Ok(PointCloud::empty(frame));
    }

    let ncols = rows[0].len();
    if let Some(bad) = rows.iter().position(|r| r.len() != ncols) {
        return Err(Error::Parse(format!(
            "Row {} has {} values, expected {}",
            bad + 1,
            rows[bad].len(),
            ncols
        )));
    }

    let points = match (rows.len(), ncols) {
        (_, 3) => rows.iter().map(|r| Point3::new(r[0], r[1], r[2])).collect(),
        (3, n) => (0..n)
            .map(|c| Point3::new(rows[0][c], rows[1][c], rows[2][c]))
            .collect(),
        (nrows, ncols) => {
            return Err(Error::Parse(format!(
                "Cannot interpret a {}x{} table as 3D points",
                nrows, ncols
            )))
        }
    };

    Ok(PointCloud::new(frame, points))
}

pub fn read_points_file(path: impl AsRef<Path>, frame: CoordFrame) -> Result<PointCloud> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading points");
    read_points(open_input(path)?, frame)
}

/// Read a file holding exactly one point.
pub fn read_point_file(path: impl AsRef<Path>) -> Result<Point3<f64>> {
    let path = path.as_ref();
    let cloud = read_points_file(path, CoordFrame::Head)?;
    match cloud.points() {
        [p] => Ok(*p),
        other => Err(Error::Parse(format!(
            "{} holds {} points, expected exactly one",
            path.display(),
            other.len()
        ))),
    }
}

/// One point per row, full precision.
pub fn write_points<W: Write>(writer: &mut W, points: &[Point3<f64>]) -> Result<()> {
    for p in points {
        writeln!(writer, "{:.18e} {:.18e} {:.18e}", p.x, p.y, p.z)?;
    }
    Ok(())
}

pub fn write_points_file(path: impl AsRef<Path>, cloud: &PointCloud) -> Result<()> {
    let mut writer = create_output(path.as_ref())?;
    write_points(&mut writer, cloud.points())?;
    writer.flush()?;
    Ok(())
}

pub fn write_point_file(path: impl AsRef<Path>, point: &Point3<f64>) -> Result<()> {
    let mut writer = create_output(path.as_ref())?;
    write_points(&mut writer, std::slice::from_ref(point))?;
    writer.flush()?;
    Ok(())
}
