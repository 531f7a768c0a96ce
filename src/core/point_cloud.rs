//! Point cloud with SoA (Struct of Arrays) layout and descriptor columns.
//!
//! Coordinates are stored in separate `xs`/`ys`/`zs` arrays for
//! cache-friendly sequential processing. In 2D mode the `zs` column is
//! carried but stays zero.
//!
//! Three descriptor columns are known to the map:
//! - `normals`: unit surface normals, required by the dynamic-probability
//!   update
//! - `probability_dynamic`: per-point dynamic probability in [0, 1], added
//!   lazily at scan integration
//! - `depths`: per-point cell depth, attached only when externalizing the
//!   whole map
//!
//! Descriptor columns, when present, always have one entry per point.

use super::pose::Pose;

/// A point cloud in SoA layout with optional descriptor columns.
#[derive(Clone, Debug, Default)]
pub struct PointCloud {
    /// X coordinates in meters.
    pub xs: Vec<f32>,
    /// Y coordinates in meters.
    pub ys: Vec<f32>,
    /// Z coordinates in meters (zero in 2D mode).
    pub zs: Vec<f32>,
    normals: Option<Vec<[f32; 3]>>,
    probability_dynamic: Option<Vec<f32>>,
    depths: Option<Vec<i32>>,
}

impl PointCloud {
    /// Create an empty cloud with no descriptor columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cloud with room for `capacity` points.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            xs: Vec::with_capacity(capacity),
            ys: Vec::with_capacity(capacity),
            zs: Vec::with_capacity(capacity),
            normals: None,
            probability_dynamic: None,
            depths: None,
        }
    }

    /// Create a cloud from Cartesian points.
    pub fn from_points(points: &[[f32; 3]]) -> Self {
        let mut cloud = Self::with_capacity(points.len());
        for p in points {
            cloud.push(p[0], p[1], p[2]);
        }
        cloud
    }

    /// Number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    /// Whether the cloud has no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Cartesian coordinates of point `index`.
    #[inline]
    pub fn point(&self, index: usize) -> [f32; 3] {
        [self.xs[index], self.ys[index], self.zs[index]]
    }

    /// Append a bare point. Descriptor columns, when present, receive
    /// zeroed entries.
    pub fn push(&mut self, x: f32, y: f32, z: f32) {
        self.xs.push(x);
        self.ys.push(y);
        self.zs.push(z);
        if let Some(normals) = &mut self.normals {
            normals.push([0.0; 3]);
        }
        if let Some(probabilities) = &mut self.probability_dynamic {
            probabilities.push(0.0);
        }
        if let Some(depths) = &mut self.depths {
            depths.push(0);
        }
    }

    /// An empty cloud carrying the same descriptor columns as `self`.
    pub fn similar_empty(&self) -> Self {
        Self {
            xs: Vec::new(),
            ys: Vec::new(),
            zs: Vec::new(),
            normals: self.normals.as_ref().map(|_| Vec::new()),
            probability_dynamic: self.probability_dynamic.as_ref().map(|_| Vec::new()),
            depths: self.depths.as_ref().map(|_| Vec::new()),
        }
    }

    /// Copy point `index` of `source` into this cloud, descriptors included.
    /// Columns absent from `source` stay absent here; columns this cloud
    /// lacks but `source` carries are dropped.
    pub fn push_from(&mut self, source: &PointCloud, index: usize) {
        self.xs.push(source.xs[index]);
        self.ys.push(source.ys[index]);
        self.zs.push(source.zs[index]);
        if let (Some(dst), Some(src)) = (&mut self.normals, &source.normals) {
            dst.push(src[index]);
        }
        if let (Some(dst), Some(src)) = (
            &mut self.probability_dynamic,
            &source.probability_dynamic,
        ) {
            dst.push(src[index]);
        }
        if let (Some(dst), Some(src)) = (&mut self.depths, &source.depths) {
            dst.push(src[index]);
        }
    }

    /// Append all points of `other`.
    ///
    /// A descriptor column survives only when both clouds carry it; columns
    /// present on one side only are dropped, keeping every surviving column
    /// aligned with the point count.
    pub fn concatenate(&mut self, other: &PointCloud) {
        if self.is_empty() {
            *self = other.clone();
            return;
        }
        self.xs.extend_from_slice(&other.xs);
        self.ys.extend_from_slice(&other.ys);
        self.zs.extend_from_slice(&other.zs);
        self.normals = match (self.normals.take(), &other.normals) {
            (Some(mut dst), Some(src)) => {
                dst.extend_from_slice(src);
                Some(dst)
            }
            _ => None,
        };
        self.probability_dynamic = match (self.probability_dynamic.take(), &other.probability_dynamic)
        {
            (Some(mut dst), Some(src)) => {
                dst.extend_from_slice(src);
                Some(dst)
            }
            _ => None,
        };
        self.depths = match (self.depths.take(), &other.depths) {
            (Some(mut dst), Some(src)) => {
                dst.extend_from_slice(src);
                Some(dst)
            }
            _ => None,
        };
    }

    /// Keep points for which `keep` returns true, preserving order and
    /// descriptor alignment.
    pub fn retain_where<F: FnMut(usize) -> bool>(&mut self, mut keep: F) {
        let mut kept = 0usize;
        for i in 0..self.len() {
            if keep(i) {
                self.xs[kept] = self.xs[i];
                self.ys[kept] = self.ys[i];
                self.zs[kept] = self.zs[i];
                if let Some(normals) = &mut self.normals {
                    normals[kept] = normals[i];
                }
                if let Some(probabilities) = &mut self.probability_dynamic {
                    probabilities[kept] = probabilities[i];
                }
                if let Some(depths) = &mut self.depths {
                    depths[kept] = depths[i];
                }
                kept += 1;
            }
        }
        self.truncate(kept);
    }

    /// Move points for which `extract` returns true into a new cloud with
    /// the same descriptor columns, keeping relative order on both sides.
    pub fn split_off_where<F: FnMut(usize) -> bool>(&mut self, mut extract: F) -> PointCloud {
        let mut extracted = self.similar_empty();
        let mut kept = 0usize;
        for i in 0..self.len() {
            if extract(i) {
                extracted.push_from(self, i);
            } else {
                self.xs[kept] = self.xs[i];
                self.ys[kept] = self.ys[i];
                self.zs[kept] = self.zs[i];
                if let Some(normals) = &mut self.normals {
                    normals[kept] = normals[i];
                }
                if let Some(probabilities) = &mut self.probability_dynamic {
                    probabilities[kept] = probabilities[i];
                }
                if let Some(depths) = &mut self.depths {
                    depths[kept] = depths[i];
                }
                kept += 1;
            }
        }
        self.truncate(kept);
        extracted
    }

    fn truncate(&mut self, len: usize) {
        self.xs.truncate(len);
        self.ys.truncate(len);
        self.zs.truncate(len);
        if let Some(normals) = &mut self.normals {
            normals.truncate(len);
        }
        if let Some(probabilities) = &mut self.probability_dynamic {
            probabilities.truncate(len);
        }
        if let Some(depths) = &mut self.depths {
            depths.truncate(len);
        }
    }

    /// The cloud rigidly transformed by `pose`. Positions get the full
    /// transform; normals are rotated only.
    pub fn transformed(&self, pose: &Pose) -> PointCloud {
        let mut out = self.clone();
        for i in 0..out.len() {
            let p = pose.transform_point(self.point(i));
            out.xs[i] = p[0];
            out.ys[i] = p[1];
            out.zs[i] = p[2];
        }
        if let Some(normals) = &mut out.normals {
            for n in normals.iter_mut() {
                *n = pose.rotate_vector(*n);
            }
        }
        out
    }

    /// Surface normals, one unit vector per point.
    #[inline]
    pub fn normals(&self) -> Option<&[[f32; 3]]> {
        self.normals.as_deref()
    }

    /// Whether the cloud carries surface normals.
    #[inline]
    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Attach surface normals. Panics if the length does not match the
    /// point count.
    pub fn set_normals(&mut self, normals: Vec<[f32; 3]>) {
        assert_eq!(normals.len(), self.len(), "normals column length mismatch");
        self.normals = Some(normals);
    }

    /// Per-point dynamic probability.
    #[inline]
    pub fn probability_dynamic(&self) -> Option<&[f32]> {
        self.probability_dynamic.as_deref()
    }

    /// Mutable access to the dynamic-probability column.
    #[inline]
    pub fn probability_dynamic_mut(&mut self) -> Option<&mut [f32]> {
        self.probability_dynamic.as_deref_mut()
    }

    /// Attach a dynamic-probability column. Panics if the length does not
    /// match the point count.
    pub fn set_probability_dynamic(&mut self, probabilities: Vec<f32>) {
        assert_eq!(
            probabilities.len(),
            self.len(),
            "probability column length mismatch"
        );
        self.probability_dynamic = Some(probabilities);
    }

    /// Per-point cell depths, present only on externalized maps.
    #[inline]
    pub fn depths(&self) -> Option<&[i32]> {
        self.depths.as_deref()
    }

    /// Attach a depth column. Panics if the length does not match the point
    /// count.
    pub fn set_depths(&mut self, depths: Vec<i32>) {
        assert_eq!(depths.len(), self.len(), "depth column length mismatch");
        self.depths = Some(depths);
    }

    /// Drop the depth column if present.
    pub fn clear_depths(&mut self) {
        self.depths = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud_with_probabilities() -> PointCloud {
        let mut cloud = PointCloud::from_points(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [2.0, 1.0, 0.0],
        ]);
        cloud.set_probability_dynamic(vec![0.1, 0.2, 0.3]);
        cloud
    }

    #[test]
    fn test_push_and_point() {
        let mut cloud = PointCloud::new();
        cloud.push(1.0, 2.0, 3.0);
        assert_eq!(cloud.len(), 1);
        assert_eq!(cloud.point(0), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_concatenate_keeps_common_columns() {
        let mut a = cloud_with_probabilities();
        let b = cloud_with_probabilities();
        a.concatenate(&b);
        assert_eq!(a.len(), 6);
        assert_eq!(a.probability_dynamic().unwrap().len(), 6);
    }

    #[test]
    fn test_concatenate_drops_one_sided_columns() {
        let mut a = cloud_with_probabilities();
        let b = PointCloud::from_points(&[[5.0, 5.0, 0.0]]);
        a.concatenate(&b);
        assert_eq!(a.len(), 4);
        assert!(a.probability_dynamic().is_none());
    }

    #[test]
    fn test_concatenate_into_empty_adopts_schema() {
        let mut a = PointCloud::new();
        a.concatenate(&cloud_with_probabilities());
        assert_eq!(a.len(), 3);
        assert_eq!(a.probability_dynamic().unwrap(), &[0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_split_off_where_keeps_alignment() {
        let mut cloud = cloud_with_probabilities();
        let extracted = cloud.split_off_where(|i| i >= 1);

        assert_eq!(cloud.len(), 1);
        assert_eq!(extracted.len(), 2);
        assert_eq!(cloud.probability_dynamic().unwrap(), &[0.1]);
        assert_eq!(extracted.probability_dynamic().unwrap(), &[0.2, 0.3]);
    }

    #[test]
    fn test_retain_where() {
        let mut cloud = cloud_with_probabilities();
        cloud.retain_where(|i| i != 1);
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.probability_dynamic().unwrap(), &[0.1, 0.3]);
        assert_eq!(cloud.point(1), [2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_transform_rotates_normals() {
        use std::f32::consts::FRAC_PI_2;
        let mut cloud = PointCloud::from_points(&[[1.0, 0.0, 0.0]]);
        cloud.set_normals(vec![[1.0, 0.0, 0.0]]);
        let pose = Pose::from_2d(0.0, 0.0, FRAC_PI_2);
        let rotated = cloud.transformed(&pose);
        let p = rotated.point(0);
        assert!(p[0].abs() < 1e-6 && (p[1] - 1.0).abs() < 1e-6);
        let n = rotated.normals().unwrap()[0];
        assert!(n[0].abs() < 1e-6 && (n[1] - 1.0).abs() < 1e-6);
    }
}
