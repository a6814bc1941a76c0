//! Per-AO-bin averages of a bake, used for curve fitting.
//!
//! Serves both the scalar baseline (`f32` planes) and the RGBA ground truth
//! (`Vec4` planes): binning only depends on the AO plane.

use std::f32::consts::TAU;
use std::ops::{AddAssign, Mul};

use glam::Vec4;
use tracing::debug;

use crate::config::{BakeConfig, HISTOGRAM_SIZE};
use crate::util::{Error, Result};

/// Value that can be averaged per bin.
pub trait HistogramSample: Copy + Default + AddAssign + Mul<f32, Output = Self> {}

impl HistogramSample for f32 {}
impl HistogramSample for Vec4 {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HistogramCompiler {
    bins: usize,
}

impl Default for HistogramCompiler {
    fn default() -> Self {
        Self::new(HISTOGRAM_SIZE)
    }
}

impl HistogramCompiler {
    pub fn new(bins: usize) -> Self {
        Self { bins: bins.max(1) }
    }

    pub fn from_config(config: &BakeConfig) -> Self {
        Self::new(config.histogram_bins)
    }

    #[inline]
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Bin of an AO value (`[0, 2π]` maps onto every bin, out of range values clamp).
    #[inline]
    pub fn bin_of(&self, ao: f32) -> usize {
        // Saturating cast: negative and NaN land in bin 0
        ((ao / TAU * self.bins as f32) as usize).min(self.bins - 1)
    }

    /// Average every plane per AO bin. Empty bins are 0.
    pub fn compile<T: HistogramSample>(&self, ao: &[f32], planes: &[Vec<T>]) -> Result<Vec<Vec<T>>> {
        let bin_of_pixel: Vec<usize> = ao.iter().map(|&v| self.bin_of(v)).collect();
        let mut population = vec![0u32; self.bins];
        for &bin in &bin_of_pixel {
            population[bin] += 1;
        }
        let normalizer: Vec<f32> = population
            .iter()
            .map(|&n| if n > 0 { 1.0 / n as f32 } else { 0.0 })
            .collect();
        debug!(bins = self.bins, empty = population.iter().filter(|&&n| n == 0).count(), "AO histogram");

        planes
            .iter()
            .enumerate()
            .map(|(bounce, plane)| {
                if plane.len() != ao.len() {
                    return Err(Error::invalid(format!(
                        "plane {bounce} has {} values, AO has {}",
                        plane.len(),
                        ao.len()
                    )));
                }
                let mut histogram = vec![T::default(); self.bins];
                for (&bin, &value) in bin_of_pixel.iter().zip(plane) {
                    histogram[bin] += value;
                }
                for (h, &k) in histogram.iter_mut().zip(&normalizer) {
                    *h = *h * k;
                }
                Ok(histogram)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_of() {
        let h = HistogramCompiler::default();
        assert_eq!(h.bin_of(0.0), 0);
        assert_eq!(h.bin_of(TAU), 99);
        assert_eq!(h.bin_of(10.0 * TAU), 99);
        assert_eq!(h.bin_of(-1.0), 0);
        assert_eq!(h.bin_of(f32::NAN), 0);
        assert_eq!(h.bin_of(0.5 * TAU), 50);
    }

    #[test]
    fn test_mean_and_empty_bins() {
        let h = HistogramCompiler::new(4);
        // bins: 0, 0, 3
        let ao = [0.0, 0.1, 0.9 * TAU];
        let planes = vec![vec![1.0f32, 3.0, 5.0]];
        let curves = h.compile(&ao, &planes).unwrap();
        assert_eq!(curves[0], vec![2.0, 0.0, 0.0, 5.0]);
        assert!(curves[0].iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_rgba_matches_scalar() {
        let h = HistogramCompiler::new(8);
        let ao = [0.2, 1.0, 3.0, 6.0, 1.1];
        let scalar = vec![vec![0.5f32, 1.0, 2.0, 4.0, 8.0]];
        let rgba = vec![scalar[0].iter().map(|&v| Vec4::new(v, 2.0 * v, 0.0, 0.0)).collect::<Vec<_>>()];
        let a = h.compile(&ao, &scalar).unwrap();
        let b = h.compile(&ao, &rgba).unwrap();
        for (x, v) in a[0].iter().zip(&b[0]) {
            assert_eq!(*x, v.x);
            assert_eq!(2.0 * x, v.y);
        }
    }

    #[test]
    fn test_plane_length_checked() {
        let h = HistogramCompiler::new(4);
        assert!(h.compile(&[0.0, 1.0], &[vec![1.0f32]]).is_err());
    }
}
