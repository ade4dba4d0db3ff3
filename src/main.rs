use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use plasma_fractal::error::PlasmaError;
use plasma_fractal::fractal::{parse_seed, GradientImage, RgbaImage};
use plasma_fractal::gpu::backend::Backend;
use plasma_fractal::gpu::render_context::RenderContext;
use plasma_fractal::gpu::software::SoftwareBackend;
use plasma_fractal::gpu::wgpu_backend::WgpuBackend;
use plasma_fractal::options::PlasmaOptions;
use plasma_fractal::session::PlasmaSession;

/// Render a plasma fractal to a PNG file.
#[derive(Parser, Debug)]
#[command(name = "plasma-fractal", version, about)]
struct Cli {
    /// TOML options file; command-line values override it.
    #[arg(long)]
    options: Option<PathBuf>,
    /// Seed (decimal or 0x hex); random if absent.
    #[arg(long, value_parser = seed_arg)]
    seed: Option<u32>,
    /// Standard deviation of the first displacement.
    #[arg(long)]
    sigma: Option<f32>,
    /// Mean of the first displacement.
    #[arg(long)]
    mu: Option<f32>,
    /// Per-level attenuation of sigma and mu.
    #[arg(long)]
    attenuation: Option<f32>,
    /// Subdivision levels (at most 15 are walked).
    #[arg(long)]
    depth: Option<u32>,
    /// Output width in pixels.
    #[arg(long)]
    width: Option<u32>,
    /// Output height in pixels.
    #[arg(long)]
    height: Option<u32>,
    /// Gradient PNG; the first row is used. Defaults to white-to-black.
    #[arg(long)]
    gradient: Option<PathBuf>,
    /// Skip the GPU and render on the host.
    #[arg(long)]
    software: bool,
    /// Where to write the PNG.
    #[arg(long, short)]
    output: PathBuf,
}

impl Cli {
    fn resolve_options(&self) -> Result<PlasmaOptions, PlasmaError> {
        let mut options = match &self.options {
            Some(path) => PlasmaOptions::load(path)?,
            None => PlasmaOptions::default(),
        };
        let fractal = &mut options.fractal;
        fractal.seed = self.seed.or(fractal.seed);
        fractal.sigma_initial = self.sigma.unwrap_or(fractal.sigma_initial);
        fractal.mu_initial = self.mu.unwrap_or(fractal.mu_initial);
        fractal.attenuation = self.attenuation.unwrap_or(fractal.attenuation);
        fractal.depth = self.depth.unwrap_or(fractal.depth);
        options.output.width = self.width.unwrap_or(options.output.width);
        options.output.height = self.height.unwrap_or(options.output.height);
        Ok(options)
    }
}

fn seed_arg(value: &str) -> Result<u32, String> {
    parse_seed(value).ok_or_else(|| format!("'{value}' is not an integer seed"))
}

fn load_gradient(path: Option<&Path>) -> Result<GradientImage, PlasmaError> {
    let Some(path) = path else {
        return Ok(GradientImage::white_to_black(256));
    };
    let decoded = image::open(path)
        .map_err(|e| PlasmaError::Image(format!("{}: {e}", path.display())))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();
    GradientImage::new(width, height, decoded.into_raw())
        .ok_or_else(|| PlasmaError::Image(format!("{}: empty gradient", path.display())))
}

fn save_png(frame: &RgbaImage, path: &Path) -> Result<(), PlasmaError> {
    image::save_buffer(
        path,
        frame.pixels(),
        frame.width(),
        frame.height(),
        image::ExtendedColorType::Rgba8,
    )
    .map_err(|e| PlasmaError::Image(format!("{}: {e}", path.display())))
}

fn render<B: Backend>(
    backend: B,
    options: &PlasmaOptions,
    gradient: &GradientImage,
    output: &Path,
) -> Result<(), PlasmaError> {
    let mut session = PlasmaSession::new(backend, options, gradient)?;
    log::info!(
        "Rendering seed {} at {}x{}",
        session.parameters().seed,
        options.output.width,
        options.output.height
    );
    let saved = match session.frame() {
        Ok(Some(frame)) => save_png(frame, output),
        Ok(None) => Ok(()),
        Err(e) => Err(e.into()),
    };
    drop(session.close());
    saved
}

fn run(cli: &Cli) -> Result<(), PlasmaError> {
    let options = cli.resolve_options()?;
    let gradient = load_gradient(cli.gradient.as_deref())?;

    if !cli.software {
        match pollster::block_on(RenderContext::new()) {
            Ok(context) => {
                return render(WgpuBackend::new(context), &options, &gradient, &cli.output);
            }
            Err(e) => log::warn!("{e}; falling back to the software renderer"),
        }
    }
    render(SoftwareBackend::new(), &options, &gradient, &cli.output)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => {
            log::info!("Wrote {}", cli.output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
