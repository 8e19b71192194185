use std::path::{Path, PathBuf};

use audioscope_core::{
    AppConfig, AudioSource, Canvas, DrawCommand, FrameOutcome, HeadlessHost, ManualScheduler,
    PcmSource, PlaybackCoordinator, PlaybackState, RecordingCanvas, SurfaceSize, VisualMode,
};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod raster;

use raster::RasterCanvas;

type Session = PlaybackCoordinator<ManualScheduler>;

fn main() -> audioscope_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Render {
            input,
            output,
            every,
            seek,
            settings,
        } => run_render(config, &input, &output, every, seek, &settings),
        Commands::Dump {
            input,
            output,
            at,
            settings,
        } => run_dump(config, &input, &output, at, &settings),
        Commands::Inspect { input } => run_inspect(&input),
    }
}

fn run_render(
    mut config: AppConfig,
    input: &Path,
    output: &Path,
    every: u32,
    seek: Option<f64>,
    settings: &Settings,
) -> audioscope_core::Result<()> {
    tracing::info!(?input, ?output, "rendering frames");
    settings.apply_canvas(&mut config);
    let mut session = open_session(&config, input, settings)?;

    if let Some(position) = seek {
        session.begin_seek(position)?;
        session.commit_seek(position)?;
    }
    session.toggle_play_pause()?;

    std::fs::create_dir_all(output)?;
    let mut canvas = RasterCanvas::new(config.canvas.into());
    let frame_seconds = config.frame_rate.frame_seconds();
    let every = every.max(1);
    let mut drawn = 0_u32;
    let mut written = 0_u32;

    while session.state() == PlaybackState::LoadedPlaying {
        match session.step(frame_seconds, &mut canvas) {
            Some(FrameOutcome::Drawn) => {
                if drawn % every == 0 {
                    canvas.save(&output.join(format!("frame_{drawn:05}.png")))?;
                    written += 1;
                }
                drawn += 1;
            }
            Some(FrameOutcome::Skipped | FrameOutcome::Faulted | FrameOutcome::Stale) => {}
            None => break,
        }
    }

    let stats = session.render_loop().stats();
    tracing::info!(
        frames = stats.frames,
        skipped = stats.skipped,
        faults = stats.faults,
        written,
        state = ?session.state(),
        "render finished"
    );
    Ok(())
}

fn run_dump(
    mut config: AppConfig,
    input: &Path,
    output: &Path,
    at: f64,
    settings: &Settings,
) -> audioscope_core::Result<()> {
    settings.apply_canvas(&mut config);
    let mut session = open_session(&config, input, settings)?;
    session.toggle_play_pause()?;

    let mut canvas = RecordingCanvas::new(config.canvas.into());
    let frame_seconds = config.frame_rate.frame_seconds();
    while session.state() == PlaybackState::LoadedPlaying && session.displayed_position() < at {
        if session.step(frame_seconds, &mut canvas).is_none() {
            break;
        }
    }

    let dump = FrameDump {
        position: session.displayed_position(),
        time: session.time_label(),
        mode: session.params().mode(),
        size: canvas.size(),
        commands: canvas.commands(),
    };
    let file = std::fs::File::create(output)?;
    serde_json::to_writer_pretty(file, &dump)?;
    tracing::info!(?output, commands = dump.commands.len(), "frame dumped");
    Ok(())
}

fn run_inspect(input: &Path) -> audioscope_core::Result<()> {
    let source = PcmSource::from_wav(input)?;
    println!("{}", serde_json::to_string_pretty(&source.summary())?);
    Ok(())
}

fn open_session(
    config: &AppConfig,
    input: &Path,
    settings: &Settings,
) -> audioscope_core::Result<Session> {
    let mut session = PlaybackCoordinator::from_config(
        Box::new(HeadlessHost::default()),
        config,
        ManualScheduler::new(),
    )?;
    session.subscribe(|change| tracing::debug!(?change, "parameter changed"));
    settings.apply(&mut session)?;

    let source = PcmSource::from_wav(input)?;
    tracing::info!(
        duration = %audioscope_core::format_time(source.duration()),
        sample_rate = source.sample_rate(),
        "decoded input"
    );
    session.load(Box::new(source))?;
    Ok(session)
}

fn load_config(path: Option<&Path>) -> audioscope_core::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path),
        None => Ok(AppConfig::default()),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Serialize)]
struct FrameDump<'a> {
    position: f64,
    time: String,
    mode: VisualMode,
    size: SurfaceSize,
    commands: &'a [DrawCommand],
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Real-time waveform and spectrum visualiser", long_about = None)]
struct Cli {
    /// JSON configuration file; flags override its values.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a WAV file to the end and write rendered frames as PNG files.
    Render {
        input: PathBuf,
        /// Directory receiving the frame images.
        output: PathBuf,
        /// Write every Nth drawn frame.
        #[arg(long, default_value_t = 6)]
        every: u32,
        /// Seek to this position (seconds) before playback starts.
        #[arg(long)]
        seek: Option<f64>,
        #[command(flatten)]
        settings: Settings,
    },
    /// Play up to a position and write that frame's draw commands as JSON.
    Dump {
        input: PathBuf,
        output: PathBuf,
        /// Playback position in seconds.
        #[arg(long, default_value_t = 1.0)]
        at: f64,
        #[command(flatten)]
        settings: Settings,
    },
    /// Print sample rate, frame count and duration of a WAV file.
    Inspect { input: PathBuf },
}

/// Control values, interpreted exactly like the UI controls would be.
#[derive(Args, Debug, Default)]
struct Settings {
    /// waveform, spectrum or spectrogram.
    #[arg(long)]
    mode: Option<String>,
    /// FFT size, a power of two between 32 and 32768.
    #[arg(long)]
    fft_size: Option<u32>,
    #[arg(long)]
    smoothing: Option<f32>,
    #[arg(long)]
    sensitivity: Option<f32>,
    #[arg(long)]
    line_width: Option<f32>,
    /// Volume in percent.
    #[arg(long)]
    volume: Option<u32>,
    /// Logical canvas width.
    #[arg(long)]
    width: Option<f32>,
    /// Logical canvas height.
    #[arg(long)]
    height: Option<f32>,
    #[arg(long)]
    device_pixel_ratio: Option<f32>,
}

impl Settings {
    fn apply(&self, session: &mut Session) -> audioscope_core::Result<()> {
        if let Some(mode) = &self.mode {
            session.select_mode(mode.parse()?)?;
        }
        if let Some(resolution) = self.fft_size {
            session.set_resolution(resolution)?;
        }
        if let Some(smoothing) = self.smoothing {
            session.set_smoothing(smoothing)?;
        }
        if let Some(sensitivity) = self.sensitivity {
            session.set_sensitivity(sensitivity)?;
        }
        if let Some(line_width) = self.line_width {
            session.set_line_width(line_width)?;
        }
        if let Some(volume) = self.volume {
            session.set_volume_percent(volume)?;
        }
        Ok(())
    }

    fn apply_canvas(&self, config: &mut AppConfig) {
        if let Some(width) = self.width {
            config.canvas.width = width;
        }
        if let Some(height) = self.height {
            config.canvas.height = height;
        }
        if let Some(ratio) = self.device_pixel_ratio {
            config.canvas.device_pixel_ratio = ratio;
        }
    }
}
