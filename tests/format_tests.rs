//! Integration tests for bake files and configuration round-trips.

use aobake::bake::{AoValue, BounceIntegrator, NoProgress, OcclusionParams, OcclusionSampler, RaySet, BOUNCE_PLANES};
use aobake::format::{self, ground_truth_file, indirect_map, AoFile, IStream, IndirectMap};
use aobake::surface::{self, HeightField};
use aobake::util::{Dimensions, Error, Severity, Stage, StageExt, Vec4};
use aobake::{BakeConfig, HostBackend};

use tempfile::{tempdir, NamedTempFile};

fn baked_map(dims: Dimensions, rays_count: u32) -> (HeightField, RaySet, IndirectMap) {
    let samples = (0..dims.num_pixels()).map(|i| ((i * 7919) % 13) as f32 / 12.0).collect();
    let height = HeightField::new(dims, samples, 1.0, 3.0, false).unwrap();
    let rays = RaySet::generate(rays_count, 1.3);
    let mut backend = HostBackend::new();
    let map = OcclusionSampler::new(OcclusionParams { max_steps: 16, max_batch_elements: 1024 })
        .run(&mut backend, &height, None, &rays, &mut NoProgress)
        .unwrap();
    (height, rays, map)
}

#[test]
fn test_indirect_map_roundtrip() {
    let (_, _, map) = baked_map(Dimensions::new(7, 5), 8);
    let temp = NamedTempFile::new().expect("Failed to create temp file");

    map.save(temp.path()).expect("Failed to save");
    let size = std::fs::metadata(temp.path()).unwrap().len();
    assert_eq!(size, 12 + 7 * 5 * 8 + 7 * 5 * 8 * 4);

    let (dims, rays_count) = IndirectMap::read_header(temp.path()).unwrap();
    assert_eq!((dims, rays_count), (Dimensions::new(7, 5), 8));

    let loaded = IndirectMap::load(temp.path(), Dimensions::new(7, 5)).expect("Failed to load");
    assert_eq!(loaded, map);

    // Buffered fallback reads the same header
    let mut input = IStream::open_opts(temp.path(), false).unwrap();
    assert_eq!(input.read_u32().unwrap(), 7);
}

#[test]
fn test_indirect_map_layout() {
    let dims = Dimensions::new(2, 1);
    let map = IndirectMap::new(dims, 2, vec![AoValue::new(1.5, 0.25), AoValue::new(0.0, 3.0)], vec![1, 0, 1, 1])
        .unwrap();
    let temp = NamedTempFile::new().unwrap();
    map.save(temp.path()).unwrap();

    let bytes = std::fs::read(temp.path()).unwrap();
    let words: Vec<u32> = bytes.chunks_exact(4).map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect();
    assert_eq!(&words[..3], &[2, 1, 2]);
    assert_eq!(f32::from_bits(words[3]), 1.5);
    assert_eq!(f32::from_bits(words[4]), 0.25);
    assert_eq!(f32::from_bits(words[6]), 3.0);
    assert_eq!(&words[7..], &[1, 0, 1, 1]);
}

#[test]
fn test_dimension_mismatch_before_payload() {
    let (_, _, map) = baked_map(Dimensions::new(10, 10), 4);
    let temp = NamedTempFile::new().unwrap();
    map.save(temp.path()).unwrap();

    let err = IndirectMap::load(temp.path(), Dimensions::new(8, 8)).unwrap_err();
    match err {
        Error::DimensionMismatch { expected_w, expected_h, found_w, found_h } => {
            assert_eq!((expected_w, expected_h), (8, 8));
            assert_eq!((found_w, found_h), (10, 10));
        }
        other => panic!("expected a dimension mismatch, got {other:?}"),
    }

    // Header only: a mismatch is reported even when the payload is gone
    let truncated = NamedTempFile::new().unwrap();
    std::fs::write(truncated.path(), &std::fs::read(temp.path()).unwrap()[..12]).unwrap();
    assert!(matches!(
        IndirectMap::load(truncated.path(), Dimensions::new(8, 8)),
        Err(Error::DimensionMismatch { .. })
    ));
}

#[test]
fn test_truncated_map() {
    let (_, _, map) = baked_map(Dimensions::new(4, 4), 4);
    let temp = NamedTempFile::new().unwrap();
    map.save(temp.path()).unwrap();

    let bytes = std::fs::read(temp.path()).unwrap();
    let truncated = NamedTempFile::new().unwrap();
    std::fs::write(truncated.path(), &bytes[..bytes.len() - 4]).unwrap();

    let err = IndirectMap::load(truncated.path(), Dimensions::new(4, 4)).unwrap_err();
    assert!(matches!(err, Error::UnexpectedEof(_)));
    assert_eq!(err.severity(), Severity::SkipStage);
}

#[test]
fn test_out_of_range_adjacency_skips_stage() {
    let (_, _, map) = baked_map(Dimensions::new(4, 4), 2);
    let temp = NamedTempFile::new().unwrap();
    map.save(temp.path()).unwrap();

    // Entry 5 sits after the header and the 16 (AO, E0) pairs
    let mut bytes = std::fs::read(temp.path()).unwrap();
    let at = 12 + 16 * 8 + 5 * 4;
    bytes[at..at + 4].copy_from_slice(&1_000_000u32.to_le_bytes());
    std::fs::write(temp.path(), &bytes).unwrap();

    let err = IndirectMap::load(temp.path(), Dimensions::new(4, 4)).unwrap_err();
    assert!(matches!(err, Error::InvalidFormat(_)));
    assert_eq!(err.severity(), Severity::SkipStage);
}

#[test]
fn test_missing_file_skips_stage() {
    let dir = tempdir().unwrap();
    let err = IndirectMap::load(dir.path().join("nothing.indirectMap"), Dimensions::new(4, 4))
        .stage(Stage::Persist)
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Persist));
    assert!(matches!(err.root(), Error::FileNotFound(_)));
    assert_eq!(err.severity(), Severity::SkipStage);
    assert!(!err.is_fatal());
}

#[test]
fn test_ao_file_roundtrip() {
    let (height, rays, map) = baked_map(Dimensions::new(6, 4), 8);
    let mut backend = HostBackend::new();
    let result = BounceIntegrator::new(0.9)
        .with_bounces(3)
        .run(&mut backend, &map, &height, None, &rays, &mut NoProgress)
        .unwrap();

    let dir = tempdir().unwrap();
    let path = format::with_extension(&dir.path().join("rock"), aobake::format::ao_file::EXTENSION);
    assert!(path.ends_with("rock.AO"));
    result.save(&path).unwrap();

    let size = std::fs::metadata(&path).unwrap().len() as usize;
    assert_eq!(size, 8 + 24 * 4 + 4 + BOUNCE_PLANES * 24 * 4);

    let loaded = AoFile::load(&path, Dimensions::new(6, 4)).unwrap();
    assert_eq!(loaded, result);
    assert_eq!(loaded.ao, map.ao_plane());
    assert!(AoFile::load(&path, Dimensions::new(4, 6)).is_err());
}

#[test]
fn test_ground_truth_file_roundtrip() {
    let dims = Dimensions::new(3, 2);
    let planes: Vec<Vec<Vec4>> = (0..BOUNCE_PLANES)
        .map(|b| (0..6).map(|i| Vec4::new(b as f32, i as f32, 0.5, 0.0)).collect())
        .collect();

    let dir = tempdir().unwrap();
    let path = format::with_extension(&dir.path().join("rock"), ground_truth_file::EXTENSION);
    ground_truth_file::save(&path, dims, &planes).unwrap();
    assert_eq!(ground_truth_file::load(&path, dims).unwrap(), planes);
    assert!(matches!(
        ground_truth_file::load(&path, Dimensions::new(2, 3)),
        Err(Error::DimensionMismatch { .. })
    ));
}

#[test]
fn test_histograms_on_disk() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("rock_hist");
    let curves: Vec<Vec<f32>> = (0..BOUNCE_PLANES).map(|b| vec![b as f32; 100]).collect();
    let paths = format::save_histograms(&base, &curves).unwrap();

    assert_eq!(paths.len(), BOUNCE_PLANES);
    assert!(paths[20].ends_with("rock_hist20.float"));
    assert_eq!(format::load_histogram(&paths[7], 100).unwrap(), vec![7.0; 100]);
}

#[test]
fn test_raw_height_field_loading() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("height.f32");
    let dims = Dimensions::new(5, 3);
    let samples: Vec<f32> = (0..15).map(|i| i as f32 / 15.0).collect();
    surface::save_raw_field(&path, dims, 1, &samples).unwrap();

    let config = BakeConfig::default();
    let height = surface::load_height_field(&path, config.texture_size_mm(), config.displacement_mm(), true).unwrap();
    assert_eq!(height.dims(), dims);
    assert_eq!(height.samples(), &samples[..]);
    // 100 cm spread over the largest side
    assert!((height.texel_size_mm() - 1000.0 / 5.0).abs() < 1e-4);
    assert_eq!(height.displacement_mm(), 450.0);
}

#[test]
fn test_config_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bake.json");
    let config = BakeConfig { rays_count: 256, albedo: 0.5, tile: false, ..Default::default() };
    config.save(&path).unwrap();
    assert_eq!(BakeConfig::load(&path).unwrap(), config);

    std::fs::write(&path, r#"{ "rays_count": 0 }"#).unwrap();
    let err = BakeConfig::load(&path).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(err.is_fatal());

    let missing = BakeConfig::load(dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(missing, Error::FileNotFound(_)));
}

#[test]
fn test_file_names() {
    let base = std::path::Path::new("Results/rock.v2");
    assert_eq!(
        format::with_extension(base, indirect_map::EXTENSION),
        std::path::PathBuf::from("Results/rock.v2.indirectMap")
    );
}
