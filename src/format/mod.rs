//! Binary files exchanged between bake runs.
//!
//! All files are little-endian and row-major. Loaders that take an expected
//! [`Dimensions`](crate::util::Dimensions) check the header first and fail
//! with a dimension mismatch before reading any payload.

pub mod ao_file;
#[cfg(feature = "image-io")]
pub mod ao_image;
pub mod ground_truth_file;
pub mod histogram_file;
pub mod indirect_map;
pub mod stream;

use std::path::{Path, PathBuf};

pub use ao_file::AoFile;
#[cfg(feature = "image-io")]
pub use ao_image::{ao_image, save_ao_image};
pub use histogram_file::{histogram_path, load_histogram, save_histograms};
pub use indirect_map::IndirectMap;
pub use stream::{IStream, OStream};

/// `<base>.<extension>`, keeping any dot already in the base name.
pub fn with_extension(base: &Path, extension: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_extension() {
        let base = Path::new("Results/rock.v2");
        assert_eq!(
            with_extension(base, indirect_map::EXTENSION),
            PathBuf::from("Results/rock.v2.indirectMap")
        );
    }
}
