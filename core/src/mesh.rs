use nalgebra::Point3;

use crate::{Affine, CoordFrame, Error, Result};

/// Triangle surface mesh tagged with its coordinate frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleMesh {
    frame: CoordFrame,
    vertices: Vec<Point3<f64>>,
    triangles: Vec<[usize; 3]>,
}

impl TriangleMesh {
    pub fn new(
        frame: CoordFrame,
        vertices: Vec<Point3<f64>>,
        triangles: Vec<[usize; 3]>,
    ) -> Result<Self> {
        if let Some(bad) = triangles
            .iter()
            .flatten()
            .find(|&&idx| idx >= vertices.len())
        {
            return Err(Error::InvalidInput(format!(
                "Triangle references vertex {} but mesh has {} vertices",
                bad,
                vertices.len()
            )));
        }
        Ok(Self {
            frame,
            vertices,
            triangles,
        })
    }

    pub fn frame(&self) -> CoordFrame {
        self.frame
    }

    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Map every vertex through `transform`; connectivity is unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the mesh is not in the transform's source frame.
    pub fn transformed(&self, transform: &Affine) -> TriangleMesh {
        assert!(
            transform.from_frame() == self.frame,
            "cannot apply {} -> {} transform to a mesh in frame {}",
            transform.from_frame(),
            transform.to_frame(),
            self.frame
        );
        Self {
            frame: transform.to_frame(),
            vertices: self
                .vertices
                .iter()
                .map(|v| transform.transform_point(v))
                .collect(),
            triangles: self.triangles.clone(),
        }
    }
}
