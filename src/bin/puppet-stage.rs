use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use puppet_stage::{
    AdaptiveConfig, BackendKind, FrameTime, FsPuppetLoader, InputEvent, LoadOutcome,
    ManualScheduler, PixelSize, PuppetSource, PuppetStage, StageOptions,
};

#[derive(Parser, Debug)]
#[command(name = "puppet-stage", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a puppet, run a number of frames and write the last one as a PNG.
    Frame(FrameArgs),
    /// Print the adaptive layout for a display size as JSON.
    Layout(LayoutArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Puppet definition JSON.
    #[arg(long)]
    model: PathBuf,

    /// Surface width in pixels.
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Surface height in pixels.
    #[arg(long, default_value_t = 800)]
    height: u32,

    /// Number of frames to run before capturing.
    #[arg(long, default_value_t = 30)]
    frames: u32,

    /// Frames per second used to advance animation.
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Adaptive config JSON (camelCase; missing fields take defaults).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Drag the pointer to this device position before rendering, as `x,y`.
    #[arg(long, value_parser = parse_point)]
    pointer: Option<(f64, f64)>,

    /// Backend to use.
    #[arg(long, value_enum, default_value_t = BackendChoice::Cpu)]
    backend: BackendChoice,
}

#[derive(Parser, Debug)]
struct LayoutArgs {
    /// Display width in pixels.
    #[arg(long)]
    width: u32,

    /// Display height in pixels.
    #[arg(long)]
    height: u32,

    /// Native puppet aspect ratio (width / height).
    #[arg(long)]
    model_aspect: Option<f64>,

    /// Adaptive config JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendChoice {
    Cpu,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Layout(args) => cmd_layout(args),
    }
}

fn parse_point(s: &str) -> Result<(f64, f64), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `x,y`, got '{s}'"))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad x: {e}"))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad y: {e}"))?;
    Ok((x, y))
}

fn read_config(path: Option<&Path>) -> anyhow::Result<AdaptiveConfig> {
    let Some(path) = path else {
        return Ok(AdaptiveConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("read adaptive config '{}'", path.display()))?;
    Ok(AdaptiveConfig::from_json_str(&json)?)
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    if args.fps == 0 {
        anyhow::bail!("--fps must be > 0");
    }
    let config = read_config(args.config.as_deref())?;
    let options = StageOptions {
        surface: PixelSize::non_empty(args.width, args.height)?,
        backend: match args.backend {
            BackendChoice::Cpu => BackendKind::Cpu,
        },
        config,
        ..StageOptions::default()
    };

    let scheduler = Rc::new(ManualScheduler::new());
    let stage = PuppetStage::new(options, Rc::new(FsPuppetLoader::new()), scheduler.clone())?;

    let outcome = pollster::block_on(stage.load(PuppetSource::from_path(&args.model)))
        .with_context(|| format!("load puppet '{}'", args.model.display()))?;
    if outcome != LoadOutcome::Installed {
        anyhow::bail!("puppet was not installed ({outcome:?})");
    }

    if let Some((x, y)) = args.pointer {
        stage.handle_input(&InputEvent::PointerDown { x, y });
        stage.handle_input(&InputEvent::PointerMove { x, y });
    }

    stage.start();
    let step = Duration::from_secs_f64(1.0 / f64::from(args.fps));
    scheduler.run_frames(FrameTime::default(), step, args.frames.max(1));
    stage.stop();

    let frame = stage.last_frame().context("no frame was presented")?;
    let png = puppet_stage::encode_png_premul(frame.width, frame.height, &frame.data)?;

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, png)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_layout(args: LayoutArgs) -> anyhow::Result<()> {
    let config = read_config(args.config.as_deref())?;
    let display = PixelSize::new(args.width, args.height);
    let params = puppet_stage::layout::engine::compute_params(
        puppet_stage::LayoutInput {
            canvas: display,
            display,
        },
        args.model_aspect,
        &config,
    );
    let out = serde_json::json!({
        "viewBounds": params.view_bounds,
        "modelScale": params.model_scale,
        "modelPosition": { "x": params.model_position.x, "y": params.model_position.y },
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
