//! aobake CLI - bake AO, indirect bounces and ground truth for a height map.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use aobake::bake::{self, BounceIntegrator, GroundTruthRenderer, HistogramCompiler, RaySet};
use aobake::format::{self, ao_file, ground_truth_file, indirect_map, AoFile, IndirectMap};
use aobake::surface::{load_height_field, load_normal_field, HeightField, NormalField};
use aobake::util::{Severity, Stage, StageExt, Vec3};
use aobake::{BakeConfig, HostBackend};

/// Keeps the chrome trace writer alive until exit.
struct TraceGuard {
    #[cfg(feature = "trace")]
    _chrome: Option<tracing_chrome::FlushGuard>,
}

fn init_tracing(level: &str) -> TraceGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr));

    #[cfg(feature = "trace")]
    {
        if env::var("AOBAKE_TRACE").ok().as_deref() == Some("1") {
            let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
                .file("trace.json")
                .build();
            registry.with(chrome_layer).init();
            return TraceGuard { _chrome: Some(guard) };
        }
        registry.init();
        TraceGuard { _chrome: None }
    }
    #[cfg(not(feature = "trace"))]
    {
        registry.init();
        TraceGuard {}
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            _ => filtered_args.push(arg),
        }
    }
    let _trace_guard = init_tracing(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let result = match filtered_args[0] {
        "generate" | "g" => Job::parse(&filtered_args[1..]).and_then(|job| Ok(job.generate()?)),
        "bounce" | "b" => Job::parse(&filtered_args[1..]).and_then(|job| Ok(job.bounce()?)),
        "compile" | "c" => Job::parse(&filtered_args[1..]).and_then(|job| Ok(job.compile()?)),
        "ground-truth" | "gt" => Job::parse(&filtered_args[1..]).and_then(|job| Ok(job.ground_truth()?)),
        "all" | "a" => Job::parse(&filtered_args[1..]).and_then(|job| job.all()),
        "rays" | "r" => cmd_rays(&filtered_args[1..]),
        "config" => cmd_config(&filtered_args[1..]),
        "help" | "h" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn print_help() {
    println!("aobake - height-field AO and indirect lighting baker");
    println!();
    println!("USAGE:");
    println!("    aobake [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    g, generate     <height> [JOB]   Filter the height map and sample occlusion (.indirectMap)");
    println!("    b, bounce       <height> [JOB]   Propagate indirect bounces (.AO)");
    println!("    c, compile      <height> [JOB]   Compile per-bounce AO histograms (<base>_hist<b>.float)");
    println!("    gt, ground-truth <height> [JOB]  Render the SH ground truth (.groundTruth + histograms)");
    println!("    a, all          <height> [JOB]   Run every stage, skipping the ones that fail on their inputs");
    println!("    r, rays         [-c <config>]    Print the ray set");
    println!("    config          <file>           Write the default configuration");
    println!("    h, help                          Show this help");
    println!();
    println!("JOB OPTIONS:");
    println!("    -n, --normal <file>    Normal map (flat when omitted, required for ground truth)");
    println!("    -c, --config <file>    Bake configuration (JSON, missing keys use defaults)");
    println!("    -o, --out <base>       Output base path (default: height map without extension)");
    println!("    --rho <r,g,b>          Ground-truth reflectance (default: from the configuration)");
    println!("    --ao-image <file>      Also write AO/2pi as a grayscale image (generate, all)");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only show errors");
    println!();
    println!("EXAMPLES:");
    println!("    aobake config bake.json");
    println!("    aobake generate rock.png -c bake.json -o Results/rock");
    println!("    aobake bounce rock.png -c bake.json -o Results/rock");
    println!("    aobake generate rock.png --ao-image Results/rock_ao.png");
    println!("    aobake gt rock.png -n rock_n.png --rho 0.8,0.6,0.5 -o Results/rock");
    println!();
    println!("NOTES:");
    println!("    - Height maps are images (green channel) or raw .f32/.raw fields");
    println!("    - AOBAKE_TRACE=1 writes trace.json when built with --features trace");
}

/// Returns the value following `flag`, if `flag` is present.
fn option<'a>(args: &[&'a str], short: &str, long: &str) -> anyhow::Result<Option<&'a str>> {
    match args.iter().position(|&a| a == short || a == long) {
        Some(i) => match args.get(i + 1) {
            Some(value) => Ok(Some(value)),
            None => bail!("missing value for {long}"),
        },
        None => Ok(None),
    }
}

fn load_config(path: Option<&str>) -> anyhow::Result<BakeConfig> {
    match path {
        Some(path) => BakeConfig::load(path).with_context(|| format!("loading configuration {path}")),
        None => Ok(BakeConfig::default()),
    }
}

fn parse_rho(value: &str) -> anyhow::Result<Vec3> {
    let parts: Vec<f32> = value
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .with_context(|| format!("invalid reflectance '{value}'"))?;
    match parts.as_slice() {
        [v] => Ok(Vec3::splat(*v)),
        [r, g, b] => Ok(Vec3::new(*r, *g, *b)),
        _ => bail!("reflectance takes 1 or 3 values, got '{value}'"),
    }
}

/// Logs stage progress every 10 percent.
fn progress_log(stage: &'static str) -> impl FnMut(f32) {
    let mut last = -1;
    move |percent: f32| {
        let decile = (percent / 10.0) as i32;
        if decile > last {
            last = decile;
            info!("{stage}: {:.0}%", percent);
        }
    }
}

/// Inputs and outputs shared by the baking commands.
struct Job {
    config: BakeConfig,
    height_path: PathBuf,
    normal_path: Option<PathBuf>,
    base: PathBuf,
    rho: Vec3,
    ao_image: Option<PathBuf>,
}

impl Job {
    fn parse(args: &[&str]) -> anyhow::Result<Self> {
        let Some(height) = args.first().filter(|a| !a.starts_with('-')) else {
            bail!("missing height map argument");
        };
        let config = load_config(option(args, "-c", "--config")?)?;
        let height_path = PathBuf::from(height);
        let base = match option(args, "-o", "--out")? {
            Some(out) => PathBuf::from(out),
            None => height_path.with_extension(""),
        };
        let rho = match option(args, "--rho", "--rho")? {
            Some(value) => parse_rho(value)?,
            None => config.reflectance,
        };
        if let Some(dir) = base.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(Self {
            config,
            height_path,
            normal_path: option(args, "-n", "--normal")?.map(PathBuf::from),
            base,
            rho,
            ao_image: option(args, "--ao-image", "--ao-image")?.map(PathBuf::from),
        })
    }

    fn height(&self) -> aobake::Result<HeightField> {
        load_height_field(
            &self.height_path,
            self.config.texture_size_mm(),
            self.config.displacement_mm(),
            self.config.tile,
        )
        .stage(Stage::Input)
    }

    fn normal(&self) -> aobake::Result<Option<NormalField>> {
        self.normal_path
            .as_deref()
            .map(|path| load_normal_field(path))
            .transpose()
            .stage(Stage::Input)
    }

    fn path(&self, extension: &str) -> PathBuf {
        format::with_extension(&self.base, extension)
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut name = self.base.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }

    /// Load the adjacency map baked for `height`, with the rays it was baked with.
    fn indirect_map(&self, height: &HeightField) -> aobake::Result<(IndirectMap, RaySet)> {
        let map = IndirectMap::load(self.path(indirect_map::EXTENSION), height.dims()).stage(Stage::Persist)?;
        let rays = RaySet::generate(map.rays_count, self.config.cone_half_angle());
        Ok((map, rays))
    }

    fn generate(&self) -> aobake::Result<()> {
        let height = self.height()?;
        let normal = self.normal()?;
        let rays = RaySet::generate(self.config.clamped_rays_count(), self.config.cone_half_angle());

        let mut backend = HostBackend::new();
        let map = bake::generate(
            &mut backend,
            &self.config,
            &height,
            normal.as_ref(),
            &rays,
            &mut progress_log("generate"),
        )?;

        let path = self.path(indirect_map::EXTENSION);
        map.save(&path).stage(Stage::Persist)?;
        info!("wrote {}", path.display());

        if let Some(image) = &self.ao_image {
            format::save_ao_image(image, &map).stage(Stage::Persist)?;
            info!("wrote {}", image.display());
        }
        Ok(())
    }

    fn bounce(&self) -> aobake::Result<()> {
        let height = self.height()?;
        let normal = self.normal()?;
        let (map, rays) = self.indirect_map(&height)?;

        let mut backend = HostBackend::new();
        let result = BounceIntegrator::new(self.config.albedo).run(
            &mut backend,
            &map,
            &height,
            normal.as_ref(),
            &rays,
            &mut progress_log("bounce"),
        )?;

        let path = self.path(ao_file::EXTENSION);
        result.save(&path).stage(Stage::Persist)?;
        info!("wrote {}", path.display());
        Ok(())
    }

    fn compile(&self) -> aobake::Result<()> {
        let height = self.height()?;
        let ao = AoFile::load(self.path(ao_file::EXTENSION), height.dims()).stage(Stage::Persist)?;
        let curves = HistogramCompiler::from_config(&self.config)
            .compile(&ao.ao, &ao.planes)
            .stage(Stage::Histogram)?;
        let paths = format::save_histograms(&self.with_suffix("_hist"), &curves).stage(Stage::Persist)?;
        info!(files = paths.len(), "wrote AO histograms");
        Ok(())
    }

    fn ground_truth(&self) -> aobake::Result<()> {
        let height = self.height()?;
        let normal = self.normal()?;
        let (map, rays) = self.indirect_map(&height)?;

        let mut backend = HostBackend::new();
        let mut renderer = GroundTruthRenderer::from_config(&self.config);
        let Some(result) = renderer.render(
            &mut backend,
            &map,
            &height,
            normal.as_ref(),
            &rays,
            self.rho,
            &mut progress_log("ground truth"),
        )?
        else {
            warn!("no normal map, ground truth skipped");
            return Ok(());
        };

        let path = self.path(ground_truth_file::EXTENSION);
        ground_truth_file::save(&path, result.dims, &result.planes).stage(Stage::Persist)?;
        info!("wrote {}", path.display());

        let curves = HistogramCompiler::from_config(&self.config)
            .compile(&map.ao_plane(), &result.planes)
            .stage(Stage::Histogram)?;
        let paths = format::save_histograms(&self.with_suffix("_groundTruth"), &curves).stage(Stage::Persist)?;
        info!(files = paths.len(), "wrote ground truth histograms");
        Ok(())
    }

    /// Every stage in order. Stages failing on their inputs are skipped, anything else aborts.
    fn all(&self) -> anyhow::Result<()> {
        let stages: [(&str, fn(&Job) -> aobake::Result<()>); 4] = [
            ("generate", Job::generate),
            ("bounce", Job::bounce),
            ("compile", Job::compile),
            ("ground truth", Job::ground_truth),
        ];
        for (name, stage) in stages {
            match stage(self) {
                Ok(()) => {}
                Err(e) if e.severity() == Severity::SkipStage => warn!("{name} skipped: {e}"),
                Err(e) => return Err(e).with_context(|| format!("{name} failed")),
            }
        }
        Ok(())
    }
}

fn cmd_rays(args: &[&str]) -> anyhow::Result<()> {
    let config = load_config(option(args, "-c", "--config")?)?;
    let rays = RaySet::generate(config.clamped_rays_count(), config.cone_half_angle());
    println!(
        "# {} rays, half angle {:.4} rad, solid angle {:.4} sr",
        rays.count(),
        rays.half_angle(),
        rays.solid_angle()
    );
    for dir in rays.directions() {
        println!("{:.6} {:.6} {:.6}", dir.x, dir.y, dir.z);
    }
    Ok(())
}

fn cmd_config(args: &[&str]) -> anyhow::Result<()> {
    let Some(&path) = args.first() else {
        bail!("missing output file. Usage: aobake config <file.json>");
    };
    BakeConfig::default()
        .save(Path::new(path))
        .with_context(|| format!("writing {path}"))?;
    info!("wrote default configuration to {path}");
    Ok(())
}
