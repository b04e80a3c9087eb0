//! Sentinel-aware mean of a masked feature map

use phenotex_core::raster::Raster;
use phenotex_core::{Error, Result};

/// Mean over the cells that are not exactly `sentinel`.
///
/// Computed as `(Σ map − sentinel·n_s) / (n − n_s)` where `n_s` counts the
/// sentinel cells. Fails with [`Error::EmptyFeatureRegion`] when every cell
/// is a sentinel.
pub fn sentinel_mean(map: &Raster<f64>, sentinel: f64) -> Result<f64> {
    let mut sum = 0.0;
    let mut n_sentinel = 0usize;
    for &v in map.data().iter() {
        sum += v;
        if v == sentinel {
            n_sentinel += 1;
        }
    }

    let denom = map.len() - n_sentinel;
    if denom == 0 {
        return Err(Error::EmptyFeatureRegion { sentinel });
    }
    Ok((sum - sentinel * n_sentinel as f64) / denom as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_all_sentinel_fails() {
        let map = Raster::filled(5, 5, 1.0);
        let err = sentinel_mean(&map, 1.0).unwrap_err();
        assert!(matches!(err, Error::EmptyFeatureRegion { .. }));
    }

    #[test]
    fn test_single_surviving_cell() {
        let mut map = Raster::filled(4, 4, 0.0);
        map.set(2, 1, 3.25).unwrap();
        assert_relative_eq!(sentinel_mean(&map, 0.0).unwrap(), 3.25);
    }

    #[test]
    fn test_mean_of_non_sentinels() {
        let map = Raster::from_vec(vec![1.0, 1.0, 0.2, 0.4, 0.6, 1.0], 2, 3).unwrap();
        assert_relative_eq!(sentinel_mean(&map, 1.0).unwrap(), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_map_fails() {
        let map = Raster::<f64>::new(0, 0);
        assert!(sentinel_mean(&map, 0.0).is_err());
    }
}
