//! Per-bounce histogram dumps: one `<base><bounce>.float` file per bounce,
//! each a raw array of `bins` little-endian f32 (`bins x 4` for RGBA curves).

use std::path::{Path, PathBuf};

use bytemuck::Pod;

use super::stream::{IStream, OStream};
use crate::util::{Error, Result};

/// Path of the histogram of `bounce` for the output base `base`.
pub fn histogram_path(base: &Path, bounce: usize) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!("{bounce}.float"));
    PathBuf::from(name)
}

/// Write one curve per bounce; returns the written paths.
///
/// `T` is `f32` for baseline curves or `Vec4` for ground-truth curves.
pub fn save_histograms<T: Pod>(base: &Path, curves: &[Vec<T>]) -> Result<Vec<PathBuf>> {
    curves
        .iter()
        .enumerate()
        .map(|(bounce, curve)| {
            let path = histogram_path(base, bounce);
            let mut out = OStream::create(&path)?;
            out.write_f32_slice(bytemuck::cast_slice(curve))?;
            out.flush()?;
            Ok(path)
        })
        .collect()
}

/// Read a histogram of `bins` values.
pub fn load_histogram(path: impl AsRef<Path>, bins: usize) -> Result<Vec<f32>> {
    let mut input = IStream::open(path)?;
    if input.size() != bins as u64 * 4 {
        return Err(Error::invalid(format!(
            "histogram of {} bytes, expected {} bins",
            input.size(),
            bins
        )));
    }
    input.read_f32_vec(bins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let base = Path::new("Results/rocks_hist");
        assert_eq!(histogram_path(base, 0), PathBuf::from("Results/rocks_hist0.float"));
        assert_eq!(histogram_path(base, 20), PathBuf::from("Results/rocks_hist20.float"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("h");
        let curves = vec![vec![1.0f32; 100], vec![2.0f32; 100]];
        let paths = save_histograms(&base, &curves).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(std::fs::metadata(&paths[1]).unwrap().len(), 400);
        assert_eq!(load_histogram(&paths[1], 100).unwrap(), curves[1]);
        assert!(load_histogram(&paths[1], 64).is_err());
    }

    #[test]
    fn test_rgba_curves() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("h_groundTruth");
        let curves = vec![vec![glam::Vec4::new(1.0, 2.0, 3.0, 0.0); 10]];
        let paths = save_histograms(&base, &curves).unwrap();
        assert!(paths[0].ends_with("h_groundTruth0.float"));
        let values = load_histogram(&paths[0], 40).unwrap();
        assert_eq!(&values[..4], &[1.0, 2.0, 3.0, 0.0]);
    }
}
