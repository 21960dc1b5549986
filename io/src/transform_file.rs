//! Text transform files.
//!
//! ```text
//! # from: head
//! # to: mri
//! r00 r01 r02 tx
//! r10 r11 r12 ty
//! r20 r21 r22 tz
//! 0 0 0 1
//! ```
//!
//! Files without frame headers (for example FSL `.mat` matrices) are read
//! with caller-supplied frames. A 3x4 body is accepted and completed with
//! the homogeneous row.

use std::io::{BufRead, Write};
use std::path::Path;

use nalgebra::Matrix4;
use rhino_core::{Affine, CoordFrame, Error, Result};

use crate::{create_output, open_input};

pub fn read_transform<R: BufRead>(
    reader: R,
    default_frames: Option<(CoordFrame, CoordFrame)>,
) -> Result<Affine> {
    let mut from = None;
    let mut to = None;
    let mut rows: Vec<[f64; 4]> = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(comment) = line.strip_prefix('#') {
            if let Some((key, value)) = comment.split_once(':') {
                match key.trim() {
                    "from" => from = Some(value.parse::<CoordFrame>()?),
                    "to" => to = Some(value.parse::<CoordFrame>()?),
                    _ => {}
                }
            }
            continue;
        }

        let values = line
            .split_whitespace()
            .map(|tok| {
                tok.parse::<f64>()
                    .map_err(|_| Error::Parse(format!("Invalid transform value '{}'", tok)))
            })
            .collect::<Result<Vec<f64>>>()?;
        let row: [f64; 4] = values.as_slice().try_into().map_err(|_| {
            Error::Parse(format!("Transform rows need 4 values, got {}", values.len()))
        })?;
        rows.push(row);
    }

    if rows.len() == 3 {
        rows.push([0.0, 0.0, 0.0, 1.0]);
    }
    if rows.len() != 4 {
        return Err(Error::Parse(format!(
            "Transform needs 3 or 4 rows, got {}",
            rows.len()
        )));
    }

    let (from, to) = match (from, to, default_frames) {
        (Some(f), Some(t), _) => (f, t),
        (None, None, Some(frames)) => frames,
        _ => {
            return Err(Error::Parse(
                "Transform file does not declare both 'from' and 'to' frames".to_string(),
            ))
        }
    };

    let matrix = Matrix4::from_fn(|r, c| rows[r][c]);
    Affine::new(from, to, matrix)
}

pub fn read_transform_file(
    path: impl AsRef<Path>,
    default_frames: Option<(CoordFrame, CoordFrame)>,
) -> Result<Affine> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading transform");
    read_transform(open_input(path)?, default_frames)
}

pub fn write_transform<W: Write>(writer: &mut W, transform: &Affine) -> Result<()> {
    writeln!(writer, "# from: {}", transform.from_frame())?;
    writeln!(writer, "# to: {}", transform.to_frame())?;
    let m = transform.matrix();
    for r in 0..4 {
        writeln!(
            writer,
            "{:.18e} {:.18e} {:.18e} {:.18e}",
            m[(r, 0)],
            m[(r, 1)],
            m[(r, 2)],
            m[(r, 3)]
        )?;
    }
    Ok(())
}

pub fn write_transform_file(path: impl AsRef<Path>, transform: &Affine) -> Result<()> {
    let mut writer = create_output(path.as_ref())?;
    write_transform(&mut writer, transform)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Rotation3, Vector3};
    use std::io::Cursor;

    #[test]
    fn test_round_trip_with_frames() {
        let t = Affine::rigid(
            CoordFrame::Head,
            CoordFrame::Mri,
            &Rotation3::from_euler_angles(0.1, 0.2, 0.3),
            &Vector3::new(1.5, -2.25, 100.0),
        );
        let mut buf = Vec::new();
        write_transform(&mut buf, &t).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("# from: head\n# to: mri\n"));

        let back = read_transform(Cursor::new(buf), None).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_fsl_style_matrix_uses_default_frames() {
        let text = "1 0 0 -90\n0 1 0 -126\n0 0 1 -72\n0 0 0 1\n";
        let t = read_transform(Cursor::new(text), Some((CoordFrame::Mni, CoordFrame::Mri))).unwrap();
        assert_eq!(t.from_frame(), CoordFrame::Mni);
        assert_eq!(t.translation(), Vector3::new(-90.0, -126.0, -72.0));

        assert!(read_transform(Cursor::new(text), None).is_err());
    }

    #[test]
    fn test_three_row_body_is_completed() {
        let text = "# from: mri_voxel\n# to: mri\n2 0 0 1\n0 2 0 2\n0 0 2 3\n";
        let t = read_transform(Cursor::new(text), None).unwrap();
        assert_eq!(t.matrix()[(3, 3)], 1.0);
        assert_eq!(t.matrix()[(1, 1)], 2.0);
    }

    #[test]
    fn test_rejects_bad_matrices() {
        let short_row = "1 0 0\n0 1 0 0\n0 0 1 0\n0 0 0 1\n";
        assert!(read_transform(Cursor::new(short_row), Some((CoordFrame::Head, CoordFrame::Mri))).is_err());

        let bad_bottom = "1 0 0 0\n0 1 0 0\n0 0 1 0\n1 0 0 1\n";
        assert!(matches!(
            read_transform(Cursor::new(bad_bottom), Some((CoordFrame::Head, CoordFrame::Mri))),
            Err(Error::InvalidInput(_))
        ));

        let unknown_frame = "# from: scanner\n# to: mri\n1 0 0 0\n0 1 0 0\n0 0 1 0\n";
        assert!(read_transform(Cursor::new(unknown_frame), None).is_err());
    }
}
