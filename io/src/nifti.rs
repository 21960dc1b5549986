//! NIfTI-1 mask volumes.
//!
//! Only what a binary mask needs is read: dimensions, datatype, scaling and
//! the voxel-to-native affine. The affine is taken from the sform when
//! `sform_code > 0`, else from the qform quaternion when `qform_code > 0`,
//! else from pixdim scaling alone.

use std::io::{Read, Write};
use std::path::Path;

use byteordered::{ByteOrdered, Endianness};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use nalgebra::{Matrix3, Matrix4, Vector3};
use rhino_core::{Affine, CoordFrame, Error, MaskVolume, Result};

use crate::{create_output, open_input};

pub const NIFTI1_HEADER_SIZE: i32 = 348;
const NIFTI1_VOX_OFFSET: usize = 352;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

const DT_UINT8: i16 = 2;
const DT_INT16: i16 = 4;
const DT_INT32: i16 = 8;
const DT_FLOAT32: i16 = 16;
const DT_FLOAT64: i16 = 64;
const DT_INT8: i16 = 256;
const DT_UINT16: i16 = 512;
const DT_UINT32: i16 = 768;

/// Read a `.nii` or `.nii.gz` mask.
pub fn read_nifti_mask(path: impl AsRef<Path>) -> Result<MaskVolume> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading mask volume");
    let mut bytes = Vec::new();
    open_input(path)?.read_to_end(&mut bytes)?;
    read_nifti_mask_bytes(&bytes)
}

/// Parse an in-memory NIfTI-1 image, gzip-compressed or not.
pub fn read_nifti_mask_bytes(bytes: &[u8]) -> Result<MaskVolume> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut decompressed = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut decompressed)?;
        return parse_nifti(&decompressed);
    }
    parse_nifti(bytes)
}

struct Header<'a> {
    bytes: &'a [u8],
    endianness: Endianness,
}

impl<'a> Header<'a> {
    fn reader(&self, offset: usize) -> ByteOrdered<&'a [u8], Endianness> {
        ByteOrdered::runtime(&self.bytes[offset..], self.endianness)
    }

    fn i16_at(&self, offset: usize) -> Result<i16> {
        Ok(self.reader(offset).read_i16()?)
    }

    fn f32_at(&self, offset: usize) -> Result<f64> {
        Ok(self.reader(offset).read_f32()? as f64)
    }

    fn f32s_at<const N: usize>(&self, offset: usize) -> Result<[f64; N]> {
        let mut reader = self.reader(offset);
        let mut out = [0.0; N];
        for v in out.iter_mut() {
            *v = reader.read_f32()? as f64;
        }
        Ok(out)
    }
}

fn parse_nifti(bytes: &[u8]) -> Result<MaskVolume> {
    if bytes.len() < NIFTI1_HEADER_SIZE as usize {
        return Err(Error::Parse(format!(
            "NIfTI file too short: {} bytes",
            bytes.len()
        )));
    }

    let endianness = if ByteOrdered::le(&bytes[..4]).read_i32()? == NIFTI1_HEADER_SIZE {
        Endianness::Little
    } else if ByteOrdered::be(&bytes[..4]).read_i32()? == NIFTI1_HEADER_SIZE {
        Endianness::Big
    } else {
        return Err(Error::UnsupportedFormat(
            "not a NIfTI-1 file (sizeof_hdr != 348)".to_string(),
        ));
    };
    let header = Header { bytes, endianness };

    let ndim = header.i16_at(40)?;
    if !(1..=7).contains(&ndim) {
        return Err(Error::Parse(format!("Invalid NIfTI dimension count {}", ndim)));
    }
    let mut dims = [1usize; 3];
    for (axis, dim) in dims.iter_mut().enumerate().take(ndim.min(3) as usize) {
        let n = header.i16_at(42 + 2 * axis)?;
        if n < 1 {
            return Err(Error::Parse(format!("Invalid NIfTI dimension {} = {}", axis + 1, n)));
        }
        *dim = n as usize;
    }

    let datatype = header.i16_at(70)?;
    let pixdim: [f64; 4] = header.f32s_at(76)?;
    // Single-file images always place data at or after byte 352.
    let vox_offset = header.f32_at(108)?.max(NIFTI1_VOX_OFFSET as f64) as usize;
    let slope = header.f32_at(112)?;
    let inter = header.f32_at(116)?;
    let qform_code = header.i16_at(252)?;
    let sform_code = header.i16_at(254)?;

    let n_voxels = dims[0] * dims[1] * dims[2];
    let bytes_per_voxel = match datatype {
        DT_UINT8 | DT_INT8 => 1,
        DT_INT16 | DT_UINT16 => 2,
        DT_INT32 | DT_UINT32 | DT_FLOAT32 => 4,
        DT_FLOAT64 => 8,
        other => {
            return Err(Error::UnsupportedFormat(format!(
                "NIfTI datatype {} is not supported for masks",
                other
            )))
        }
    };
    let needed = vox_offset + n_voxels * bytes_per_voxel;
    if bytes.len() < needed {
        return Err(Error::Parse(format!(
            "NIfTI data truncated: need {} bytes, have {}",
            needed,
            bytes.len()
        )));
    }

    let mut reader = header.reader(vox_offset);
    let mut data = Vec::with_capacity(n_voxels);
    for _ in 0..n_voxels {
        let v = match datatype {
            DT_UINT8 => reader.read_u8()? as f64,
            DT_INT8 => reader.read_i8()? as f64,
            DT_INT16 => reader.read_i16()? as f64,
            DT_UINT16 => reader.read_u16()? as f64,
            DT_INT32 => reader.read_i32()? as f64,
            DT_UINT32 => reader.read_u32()? as f64,
            DT_FLOAT32 => reader.read_f32()? as f64,
            _ => reader.read_f64()?,
        };
        data.push(v);
    }
    if slope != 0.0 && !(slope == 1.0 && inter == 0.0) {
        for v in data.iter_mut() {
            *v = *v * slope + inter;
        }
    }

    let voxel_to_mri = if sform_code > 0 {
        let rows: [[f64; 4]; 3] = [header.f32s_at(280)?, header.f32s_at(296)?, header.f32s_at(312)?];
        let matrix = Matrix4::from_fn(|r, c| if r < 3 { rows[r][c] } else if c == 3 { 1.0 } else { 0.0 });
        Affine::new(CoordFrame::MriVoxel, CoordFrame::Mri, matrix)?
    } else if qform_code > 0 {
        let [b, c, d]: [f64; 3] = header.f32s_at(256)?;
        let offset: [f64; 3] = header.f32s_at(268)?;
        qform_affine(b, c, d, &pixdim, &offset)
    } else {
        let scale = Matrix3::from_diagonal(&Vector3::new(pixdim[1], pixdim[2], pixdim[3]));
        Affine::from_parts(CoordFrame::MriVoxel, CoordFrame::Mri, &scale, &Vector3::zeros())
    };

    MaskVolume::new(dims, data.into_iter().map(|v| v as f32).collect(), voxel_to_mri)
}

fn qform_affine(b: f64, c: f64, d: f64, pixdim: &[f64; 4], offset: &[f64; 3]) -> Affine {
    let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
    let rotation = Matrix3::new(
        a * a + b * b - c * c - d * d,
        2.0 * (b * c - a * d),
        2.0 * (b * d + a * c),
        2.0 * (b * c + a * d),
        a * a + c * c - b * b - d * d,
        2.0 * (c * d - a * b),
        2.0 * (b * d - a * c),
        2.0 * (c * d + a * b),
        a * a + d * d - b * b - c * c,
    );
    let qfac = if pixdim[0] < 0.0 { -1.0 } else { 1.0 };
    let scale = Matrix3::from_diagonal(&Vector3::new(pixdim[1], pixdim[2], qfac * pixdim[3]));
    Affine::from_parts(
        CoordFrame::MriVoxel,
        CoordFrame::Mri,
        &(rotation * scale),
        &Vector3::new(offset[0], offset[1], offset[2]),
    )
}

/// Write a uint8 mask with an sform (code 1), little endian.
/// A path ending in `.gz` is gzip-compressed.
pub fn write_nifti_mask(path: impl AsRef<Path>, mask: &MaskVolume) -> Result<()> {
    let path = path.as_ref();
    let bytes = encode_nifti_mask(mask)?;
    let mut writer = create_output(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        encoder.write_all(&bytes)?;
        encoder.finish()?.flush()?;
    } else {
        writer.write_all(&bytes)?;
        writer.flush()?;
    }
    Ok(())
}

fn put_i16(buf: &mut [u8], offset: usize, value: i16) -> Result<()> {
    ByteOrdered::le(&mut buf[offset..]).write_i16(value)?;
    Ok(())
}

fn put_f32s(buf: &mut [u8], offset: usize, values: &[f64]) -> Result<()> {
    let mut writer = ByteOrdered::le(&mut buf[offset..]);
    for v in values {
        writer.write_f32(*v as f32)?;
    }
    Ok(())
}

fn encode_nifti_mask(mask: &MaskVolume) -> Result<Vec<u8>> {
    let [nx, ny, nz] = mask.dims();
    for n in [nx, ny, nz] {
        if n > i16::MAX as usize {
            return Err(Error::InvalidInput(format!(
                "Dimension {} exceeds the NIfTI-1 limit",
                n
            )));
        }
    }

    let affine = mask.voxel_to_mri();
    let linear = affine.linear();
    let m = affine.matrix();

    let mut buf = vec![0u8; NIFTI1_VOX_OFFSET];
    ByteOrdered::le(&mut buf[0..4]).write_i32(NIFTI1_HEADER_SIZE)?;
    for (i, v) in [3, nx as i16, ny as i16, nz as i16, 1, 1, 1, 1].iter().enumerate() {
        put_i16(&mut buf, 40 + 2 * i, *v)?;
    }
    put_i16(&mut buf, 70, DT_UINT8)?;
    put_i16(&mut buf, 72, 8)?;
    put_f32s(
        &mut buf,
        76,
        &[
            1.0,
            linear.column(0).norm(),
            linear.column(1).norm(),
            linear.column(2).norm(),
            1.0,
            1.0,
            1.0,
            1.0,
        ],
    )?;
    put_f32s(&mut buf, 108, &[NIFTI1_VOX_OFFSET as f64, 1.0, 0.0])?;
    put_i16(&mut buf, 252, 0)?;
    put_i16(&mut buf, 254, 1)?;
    for r in 0..3 {
        put_f32s(
            &mut buf,
            280 + 16 * r,
            &[m[(r, 0)], m[(r, 1)], m[(r, 2)], m[(r, 3)]],
        )?;
    }
    buf[344..348].copy_from_slice(b"n+1\0");

    buf.extend(mask.data().iter().map(|v| u8::from(*v != 0.0)));
    Ok(buf)
}
