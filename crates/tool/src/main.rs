//! Vexel - render layered vector scenes to images.

use clap::{Parser, ValueEnum};
use common::units::Time;
use compositor::{Backend, RenderConfig, Renderer};
use render::ProgressLog;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use tool::{ExitStatus, Failure, Job, Scene, SceneError, WithStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    Raster,
    Vector,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Raster => Backend::Raster,
            BackendArg::Vector => Backend::Vector,
        }
    }
}

/// Vexel - render layered vector scenes to images
#[derive(Parser, Debug)]
#[command(name = "vexel", author, version, about, long_about = None)]
struct Args {
    /// Scene file (JSON)
    scene: PathBuf,

    /// Output image; defaults to the scene name with a .png extension
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Image width in pixels
    #[arg(short, long)]
    width: Option<u32>,

    /// Image height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Time to render, in seconds
    #[arg(short, long, default_value = "0")]
    time: f64,

    /// Render quality (lower is better)
    #[arg(short, long, default_value = "3")]
    quality: u32,

    /// Output gamma
    #[arg(short, long, default_value = "2.2")]
    gamma: f32,

    /// Render path
    #[arg(long, value_enum, default_value = "raster")]
    backend: BackendArg,

    /// Also write the alpha channel to <name>-alpha.<ext>
    #[arg(long)]
    extract_alpha: bool,

    /// Worker threads (0 uses one per core)
    #[arg(short = 'T', long, default_value = "0")]
    threads: usize,

    /// Tile edge length in pixels
    #[arg(long, default_value = "128")]
    tile_size: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn render_config(&self) -> RenderConfig {
        let config = RenderConfig::new()
            .with_gamma(self.gamma)
            .with_quality(self.quality)
            .with_tile_size(self.tile_size)
            .with_threads(self.threads)
            .with_backend(self.backend.into());
        match std::env::current_exe() {
            Ok(path) => config.with_binary_path(path),
            Err(_) => config,
        }
    }

    fn output(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.scene.with_extension("png"))
    }
}

fn scene_status(err: &SceneError) -> ExitStatus {
    match err {
        SceneError::NotFound(_) => ExitStatus::FileNotFound,
        SceneError::BadVersion { .. } => ExitStatus::BadVersion,
        _ => ExitStatus::BadCanvas,
    }
}

fn run(args: &Args) -> Result<(), Failure> {
    let scene = Scene::load(&args.scene).map_err(|err| Failure {
        status: scene_status(&err),
        error: err.into(),
    })?;
    let config = args.render_config();
    let jobs = Job::list(&args.output(), args.extract_alpha);
    for job in &jobs {
        job.format().status(ExitStatus::UnknownTarget)?;
    }

    let desc = scene.rend_desc(args.width, args.height, Time::from_seconds(args.time));
    info!(
        "rendering {} at {}x{} ({} backend)",
        args.scene.display(),
        desc.width(),
        desc.height(),
        config.backend.name()
    );
    let gamma = config.output_gamma();
    let renderer = Renderer::new(config).status(ExitStatus::RenderFailure)?;
    let surface = renderer
        .render(&scene.canvas, &desc, &ProgressLog::new("render"))
        .status(ExitStatus::RenderFailure)?;

    for job in &jobs {
        job.write(&surface, &gamma).status(ExitStatus::RenderFailure)?;
        info!("wrote {}", job.output.display());
    }
    Ok(())
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let status = ExitStatus::from_clap(err.kind());
            let _ = err.print();
            std::process::exit(status.code());
        }
    };

    // Initialize logging
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to initialize logging: {err}");
    }

    info!("Vexel v{}", tool::VERSION);
    let status = match run(&args) {
        Ok(()) => ExitStatus::Ok,
        Err(failure) => {
            error!("{failure}");
            failure.status
        }
    };
    std::process::exit(status.code());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const SCENE: &str = r##"{
        "version": 1,
        "width": 6,
        "height": 4,
        "layers": [
            { "type": "circle", "params": { "radius": 0.02, "color": "#00ff00" } },
            { "type": "rectangle", "params": { "point1": [-1, -1], "point2": [0, 1], "color": "#ff0000" } }
        ]
    }"##;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("vexel-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_args_default() {
        let args = Args::parse_from(["vexel", "scene.json"]);
        assert_eq!(args.scene, PathBuf::from("scene.json"));
        assert_eq!(args.output(), PathBuf::from("scene.png"));
        assert_eq!(args.backend, BackendArg::Raster);
        assert_eq!(args.quality, 3);
        assert!(!args.extract_alpha);
    }

    #[test]
    fn test_args_render_config() {
        let args = Args::parse_from([
            "vexel", "s.json", "-o", "out.tga", "-w", "64", "--height", "32", "--backend",
            "vector", "--gamma", "1", "-T", "2", "--tile-size", "16", "--extract-alpha",
        ]);
        assert_eq!(args.width, Some(64));
        assert_eq!(args.height, Some(32));
        assert!(args.extract_alpha);
        let config = args.render_config();
        assert_eq!(config.backend, Backend::Vector);
        assert_eq!(config.threads, 2);
        assert_eq!(config.tile_size, 16);
        assert!(config.output_gamma().is_identity());
    }

    #[test]
    fn test_argument_errors() {
        let kind = |argv: &[&str]| Args::try_parse_from(argv).unwrap_err().kind();
        assert_eq!(ExitStatus::from_clap(kind(&["vexel"])), ExitStatus::MissingArgument);
        assert_eq!(
            ExitStatus::from_clap(kind(&["vexel", "s.json", "--bogus"])),
            ExitStatus::UnknownArgument
        );
        assert_eq!(ExitStatus::from_clap(kind(&["vexel", "--help"])), ExitStatus::Help);
    }

    #[test]
    fn test_run_writes_color_and_alpha() {
        let dir = scratch("alpha");
        let scene = dir.join("scene.json");
        std::fs::write(&scene, SCENE).unwrap();
        let output = dir.join("frame.png");
        let args = Args::parse_from([
            "vexel",
            scene.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--extract-alpha",
        ]);
        run(&args).unwrap();

        let color = image::open(&output).unwrap().to_rgba8();
        let alpha = image::open(dir.join("frame-alpha.png")).unwrap().to_rgba8();
        assert_eq!(color.dimensions(), (6, 4));
        // Left half is covered by the red rectangle, right half is empty.
        assert_eq!(color.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(alpha.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(alpha.get_pixel(5, 0).0, [0, 0, 0, 255]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_run_failures() {
        let dir = scratch("failures");
        let missing = Args::parse_from(["vexel", dir.join("missing.json").to_str().unwrap()]);
        assert_eq!(run(&missing).unwrap_err().status, ExitStatus::FileNotFound);

        let scene = dir.join("scene.json");
        std::fs::write(&scene, SCENE.replace("\"version\": 1", "\"version\": 9")).unwrap();
        let args = Args::parse_from(["vexel", scene.to_str().unwrap()]);
        assert_eq!(run(&args).unwrap_err().status, ExitStatus::BadVersion);

        std::fs::write(&scene, SCENE).unwrap();
        let target = dir.join("frame.xyz");
        let args = Args::parse_from(["vexel", scene.to_str().unwrap(), "-o", target.to_str().unwrap()]);
        assert_eq!(run(&args).unwrap_err().status, ExitStatus::UnknownTarget);
        assert!(!Path::new(&target).exists());
        std::fs::remove_dir_all(&dir).ok();
    }
}
