use nalgebra::{Matrix3xX, MatrixXx3, Point3, Vector3};

use crate::CoordFrame;

/// Ordered, immutable set of 3D points in millimetres, tagged with its frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    frame: CoordFrame,
    points: Vec<Point3<f64>>,
}

impl PointCloud {
    pub fn new(frame: CoordFrame, points: Vec<Point3<f64>>) -> Self {
        Self { frame, points }
    }

    pub fn empty(frame: CoordFrame) -> Self {
        Self::new(frame, Vec::new())
    }

    /// Build from an Nx3 matrix, one point per row.
    pub fn from_rows(frame: CoordFrame, rows: &MatrixXx3<f64>) -> Self {
        let points = rows
            .row_iter()
            .map(|r| Point3::new(r[0], r[1], r[2]))
            .collect();
        Self::new(frame, points)
    }

    /// Build from a 3xN matrix, one point per column.
    pub fn from_columns(frame: CoordFrame, columns: &Matrix3xX<f64>) -> Self {
        let points = columns.column_iter().map(|c| Point3::from(c.into_owned())).collect();
        Self::new(frame, points)
    }

    pub fn to_rows(&self) -> MatrixXx3<f64> {
        MatrixXx3::from_fn(self.points.len(), |i, j| self.points[i][j])
    }

    pub fn to_columns(&self) -> Matrix3xX<f64> {
        Matrix3xX::from_fn(self.points.len(), |i, j| self.points[j][i])
    }

    pub fn frame(&self) -> CoordFrame {
        self.frame
    }

    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Point3<f64>> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.points.is_empty() {
            return None;
        }
        let sum: Vector3<f64> = self.points.iter().map(|p| p.coords).sum();
        Some(Point3::from(sum / self.points.len() as f64))
    }

    /// Points of `self` followed by the points of `other`.
    ///
    /// # Panics
    ///
    /// Panics if the two clouds are in different frames.
    pub fn concat(&self, other: &PointCloud) -> PointCloud {
        assert!(
            self.frame == other.frame,
            "cannot concatenate point clouds in frames {} and {}",
            self.frame,
            other.frame
        );
        let mut points = Vec::with_capacity(self.len() + other.len());
        points.extend_from_slice(&self.points);
        points.extend_from_slice(&other.points);
        Self::new(self.frame, points)
    }

    /// Every `step`-th point, starting with the first.
    pub fn every_nth(&self, step: usize) -> PointCloud {
        let step = step.max(1);
        Self::new(self.frame, self.points.iter().step_by(step).copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_column_layouts() {
        let cloud = PointCloud::new(
            CoordFrame::Head,
            vec![Point3::new(1.0, 2.0, 3.0), Point3::new(4.0, 5.0, 6.0)],
        );
        let rows = cloud.to_rows();
        assert_eq!(rows.shape(), (2, 3));
        assert_eq!(rows[(1, 0)], 4.0);

        let cols = cloud.to_columns();
        assert_eq!(cols.shape(), (3, 2));
        assert_eq!(cols[(2, 0)], 3.0);

        assert_eq!(PointCloud::from_rows(CoordFrame::Head, &rows), cloud);
        assert_eq!(PointCloud::from_columns(CoordFrame::Head, &cols), cloud);
    }

    #[test]
    fn test_centroid_and_concat() {
        let a = PointCloud::new(CoordFrame::Mri, vec![Point3::new(0.0, 0.0, 0.0)]);
        let b = PointCloud::new(CoordFrame::Mri, vec![Point3::new(2.0, 4.0, -6.0)]);
        let joined = a.concat(&b);
        assert_eq!(joined.len(), 2);
        assert_eq!(joined.points()[1], Point3::new(2.0, 4.0, -6.0));
        assert_eq!(joined.centroid(), Some(Point3::new(1.0, 2.0, -3.0)));
        assert_eq!(PointCloud::empty(CoordFrame::Mri).centroid(), None);
    }

    #[test]
    #[should_panic(expected = "cannot concatenate")]
    fn test_concat_frame_mismatch() {
        let a = PointCloud::empty(CoordFrame::Mri);
        let b = PointCloud::empty(CoordFrame::Head);
        let _ = a.concat(&b);
    }

    #[test]
    fn test_every_nth() {
        let points = (0..10).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        let cloud = PointCloud::new(CoordFrame::Head, points);
        let thinned = cloud.every_nth(4);
        let xs: Vec<f64> = thinned.points().iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 4.0, 8.0]);
    }
}
