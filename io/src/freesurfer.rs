//! FreeSurfer binary triangle surfaces (`*.surf`).
//!
//! Layout, all big endian: the 3-byte magic `FF FF FE`, a free-text comment
//! terminated by two newlines, vertex and face counts as `i32`, vertex
//! coordinates as `f32` triples and faces as `i32` triples.

use std::io::{BufRead, Read, Write};
use std::path::Path;

use byteordered::ByteOrdered;
use nalgebra::Point3;
use rhino_core::{CoordFrame, Error, Result, TriangleMesh};

use crate::{create_output, open_input};

const TRIANGLE_MAGIC: [u8; 3] = [0xff, 0xff, 0xfe];

/// Counts come from the file, so capacity reserved up front is capped.
const MAX_PREALLOCATED: usize = 1 << 16;

/// Read a triangle surface whose vertices are in `frame`.
pub fn read_surface<R: BufRead>(mut reader: R, frame: CoordFrame) -> Result<TriangleMesh> {
    let mut magic = [0u8; 3];
    reader.read_exact(&mut magic)?;
    if magic != TRIANGLE_MAGIC {
        return Err(Error::UnsupportedFormat(format!(
            "not a FreeSurfer triangle surface (magic {:02x?})",
            magic
        )));
    }

    // The comment ends with "\n\n"; read_until keeps the terminator.
    let mut comment = Vec::new();
    while !comment.ends_with(b"\n\n") {
        if reader.read_until(b'\n', &mut comment)? == 0 {
            return Err(Error::Parse("Surface comment is not terminated".to_string()));
        }
    }

    let mut input = ByteOrdered::be(reader);
    let nverts = input.read_i32()?;
    let nfaces = input.read_i32()?;
    if nverts < 0 || nfaces < 0 {
        return Err(Error::Parse(format!(
            "Invalid surface counts: {} vertices, {} faces",
            nverts, nfaces
        )));
    }

    let mut vertices = Vec::with_capacity((nverts as usize).min(MAX_PREALLOCATED));
    for _ in 0..nverts {
        let x = input.read_f32()? as f64;
        let y = input.read_f32()? as f64;
        let z = input.read_f32()? as f64;
        vertices.push(Point3::new(x, y, z));
    }

    let mut triangles = Vec::with_capacity((nfaces as usize).min(MAX_PREALLOCATED));
    for _ in 0..nfaces {
        let mut face = [0usize; 3];
        for idx in face.iter_mut() {
            let v = input.read_i32()?;
            *idx = usize::try_from(v)
                .map_err(|_| Error::Parse(format!("Negative vertex index {}", v)))?;
        }
        triangles.push(face);
    }

    TriangleMesh::new(frame, vertices, triangles)
}

pub fn read_surface_file(path: impl AsRef<Path>, frame: CoordFrame) -> Result<TriangleMesh> {
    read_surface(open_input(path.as_ref())?, frame)
}

/// Write a mesh as a FreeSurfer triangle surface.
pub fn write_surface<W: Write>(writer: &mut W, mesh: &TriangleMesh) -> Result<()> {
    let nverts = i32::try_from(mesh.vertices().len())
        .map_err(|_| Error::InvalidInput("Too many vertices for a surface file".to_string()))?;
    let nfaces = i32::try_from(mesh.triangles().len())
        .map_err(|_| Error::InvalidInput("Too many faces for a surface file".to_string()))?;

    writer.write_all(&TRIANGLE_MAGIC)?;
    writer.write_all(format!("created by rhino in frame {}\n\n", mesh.frame()).as_bytes())?;

    let mut output = ByteOrdered::be(writer);
    output.write_i32(nverts)?;
    output.write_i32(nfaces)?;
    for v in mesh.vertices() {
        output.write_f32(v.x as f32)?;
        output.write_f32(v.y as f32)?;
        output.write_f32(v.z as f32)?;
    }
    for face in mesh.triangles() {
        for &idx in face {
            // Indices fit because every index is below nverts.
            output.write_i32(idx as i32)?;
        }
    }
    Ok(())
}

pub fn write_surface_file(path: impl AsRef<Path>, mesh: &TriangleMesh) -> Result<()> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), vertices = mesh.vertices().len(), "writing surface");
    let mut writer = create_output(path)?;
    write_surface(&mut writer, mesh)?;
    writer.flush()?;
    Ok(())
}
