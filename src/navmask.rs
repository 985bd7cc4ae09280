//! Binary sea/land raster plus forbidden-zone polygon overlay.

use crate::error::NavMaskError;

pub const LAT_STEPS_PER_DEGREE: usize = 10;
pub const LON_STEPS_PER_DEGREE: usize = 10;
pub const NB_LON: usize = 3601;
pub const NB_LAT: usize = 1801;
pub const SIZE_T_IS_SEA: usize = NB_LON * NB_LAT;

#[derive(Clone, Debug)]
pub struct ForbidPolygon {
    pub points: Vec<(f64, f64)>,
}

impl ForbidPolygon {
    /// Ray-casting point-in-polygon test.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let n = self.points.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (lat_i, lon_i) = self.points[i];
            let (lat_j, lon_j) = self.points[j];
            if ((lon_i > lon) != (lon_j > lon))
                && (lat < (lat_j - lat_i) * (lon - lon_i) / (lon_j - lon_i) + lat_i)
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

/// Land/sea navigability test: a fixed-resolution raster AND'd against
/// user-supplied forbidden polygons.
pub struct NavMask {
    is_sea: Vec<u8>,
    forbid_zones: Vec<ForbidPolygon>,
    allways_sea: bool,
}

fn raster_index(lat: f64, lon: f64) -> usize {
    let lat_idx = ((90.0 - lat) * LAT_STEPS_PER_DEGREE as f64).round() as i64;
    let lon_idx = ((lon + 180.0) * LON_STEPS_PER_DEGREE as f64).round() as i64;
    (lat_idx as usize) * NB_LON + (lon_idx as usize)
}

impl NavMask {
    pub fn from_raster(is_sea: Vec<u8>, forbid_zones: Vec<ForbidPolygon>) -> Result<Self, NavMaskError> {
        if is_sea.len() != SIZE_T_IS_SEA {
            return Err(NavMaskError::BadLength { got: is_sea.len(), expected: SIZE_T_IS_SEA });
        }
        Ok(NavMask { is_sea, forbid_zones, allways_sea: false })
    }

    /// Parses the raw `'0'/'1'` byte stream the reference program's
    /// `readIsSea` reads with no delimiters.
    pub fn parse_raster(bytes: &[u8]) -> Result<Vec<u8>, NavMaskError> {
        if bytes.len() != SIZE_T_IS_SEA {
            return Err(NavMaskError::BadLength { got: bytes.len(), expected: SIZE_T_IS_SEA });
        }
        Ok(bytes.iter().map(|&b| if b == b'1' { 1 } else { 0 }).collect())
    }

    pub fn always_sea() -> Self {
        NavMask { is_sea: Vec::new(), forbid_zones: Vec::new(), allways_sea: true }
    }

    pub fn is_navigable(&self, lat: f64, lon: f64) -> bool {
        if self.allways_sea {
            return true;
        }
        let idx = raster_index(lat, lon);
        let sea = self.is_sea.get(idx).copied().unwrap_or(0) == 1;
        if !sea {
            return false;
        }
        !self.forbid_zones.iter().any(|z| z.contains(lat, lon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_raster_length() {
        assert!(NavMask::from_raster(vec![0; 10], Vec::new()).is_err());
    }

    #[test]
    fn always_sea_ignores_raster() {
        let mask = NavMask::always_sea();
        assert!(mask.is_navigable(90.0, 180.0));
        assert!(mask.is_navigable(-90.0, -180.0));
    }

    #[test]
    fn all_sea_raster_is_navigable_everywhere_sampled() {
        let is_sea = vec![1u8; SIZE_T_IS_SEA];
        let mask = NavMask::from_raster(is_sea, Vec::new()).unwrap();
        assert!(mask.is_navigable(10.0, 10.0));
    }

    #[test]
    fn forbid_polygon_masks_points_inside() {
        let is_sea = vec![1u8; SIZE_T_IS_SEA];
        let polygon = ForbidPolygon {
            points: vec![(0.0, 0.0), (0.0, 2.0), (2.0, 2.0), (2.0, 0.0)],
        };
        let mask = NavMask::from_raster(is_sea, vec![polygon]).unwrap();
        assert!(!mask.is_navigable(1.0, 1.0));
        assert!(mask.is_navigable(10.0, 10.0));
    }
}
