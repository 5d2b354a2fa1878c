use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

use rusteq::engine::{Engine, EngineConfig};
use rusteq::params::ParameterState;
use rusteq::preset::{EqCurve, Manager, Preset, StoredPreset};
use rusteq::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "rusteq")]
#[command(version)]
#[command(about = "Equalizer, tone, reverb and dynamics for stereo audio.")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a WAV file through the effect chain
    Render(RenderArgs),
    /// List the named EQ curves
    Curves,
    /// Store a named preset in the preset directory
    SavePreset {
        #[arg(long)]
        name: String,
        #[arg(long, value_enum, default_value_t = EqCurve::Flat)]
        curve: EqCurve,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        preamp: f32,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        trim: f32,
        #[arg(long, env = "RUSTEQ_PRESET_DIR", help = "Overrides the configured preset directory")]
        preset_dir: Option<String>,
    },
}

#[derive(clap::Args, Debug)]
struct RenderArgs {
    #[arg(short, long)]
    input: PathBuf,
    #[arg(short, long)]
    output: PathBuf,
    #[arg(long, value_enum)]
    curve: Option<EqCurve>,
    #[arg(long, help = "Preset JSON file applied after --curve")]
    preset_file: Option<PathBuf>,
    #[arg(long, help = "Route input straight to output")]
    bypass: bool,
    #[arg(long, help = "Take the compressor out of the chain")]
    no_compressor: bool,
    #[arg(long, help = "Enable reverb with this wet level (0..1)")]
    reverb_mix: Option<f32>,
    #[arg(long, default_value_t = 2.5)]
    reverb_decay: f32,
    #[arg(long, allow_negative_numbers = true)]
    pan: Option<f32>,
    #[arg(long, allow_negative_numbers = true)]
    preamp: Option<f32>,
    #[arg(long, allow_negative_numbers = true)]
    trim: Option<f32>,
    #[arg(long, env = "RUSTEQ_SEED", help = "Seed for reproducible reverb noise")]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    info!("rusteq v{}", env!("CARGO_PKG_VERSION"));
    debug!("Args: {args:?}");

    match args.command {
        Command::Render(render_args) => render(&render_args),
        Command::Curves => {
            for curve in EqCurve::ALL {
                let gains: Vec<String> = curve.gains().iter().map(|g| format!("{g:+}")).collect();
                println!("{:<9} {}", curve.name(), gains.join(" "));
            }
            Ok(())
        }
        Command::SavePreset {
            name,
            curve,
            preamp,
            trim,
            preset_dir,
        } => {
            let settings = Settings::load().context("failed to load settings")?;
            let dir = preset_dir.unwrap_or(settings.preset_dir);
            let mut manager = Manager::new(&dir)
                .with_context(|| format!("failed to open preset directory '{dir}'"))?;

            let preset = Preset {
                preamp,
                trim,
                ..Preset::from_curve(curve)
            };
            let path = manager.save_preset(&StoredPreset::new(name, preset))?;
            println!("Saved {}", path.display());
            Ok(())
        }
    }
}

fn render(args: &RenderArgs) -> Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    let (mut frames, sample_rate) = read_stereo(&args.input)?;

    let mut config = EngineConfig::from(&settings);
    config.sample_rate = sample_rate;
    if args.seed.is_some() {
        config.reverb_seed = args.seed;
    }
    info!("{settings}");

    let (mut engine, mut handle) = Engine::new(&config).context("failed to create engine")?;

    if let Some(curve) = args.curve {
        handle.apply_eq_curve(curve)?;
    }
    if let Some(path) = &args.preset_file {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read preset '{}'", path.display()))?;
        handle
            .load_preset_json(&json)
            .with_context(|| format!("failed to load preset '{}'", path.display()))?;
    }
    if let Some(db) = args.preamp {
        handle.set_preamp(db)?;
    }
    if let Some(db) = args.trim {
        handle.set_trim(db)?;
    }
    if let Some(pan) = args.pan {
        handle.set_balance(pan)?;
    }
    if let Some(mix) = args.reverb_mix {
        handle.set_reverb(true, mix, args.reverb_decay)?;
    }
    if args.no_compressor {
        handle.set_compressor_enabled(false)?;
    }
    if args.bypass {
        handle.set_bypass(true)?;
    }

    // Let the reverb ring out past the end of the input
    let tail = reverb_tail_frames(handle.params(), sample_rate);
    if tail > 0 {
        debug!("Appending {tail} frames of reverb tail");
        frames.resize(frames.len() + tail * 2, 0.0);
    }

    let block_len = config.block_size * 2;
    let mut input = vec![0.0f32; block_len];
    let mut output = vec![0.0f32; block_len];
    let mut rendered = Vec::with_capacity(frames.len());

    for chunk in frames.chunks(block_len) {
        input[..chunk.len()].copy_from_slice(chunk);
        input[chunk.len()..].fill(0.0);
        engine.process(&input, &mut output)?;
        rendered.extend_from_slice(&output[..chunk.len()]);
    }

    write_stereo(&args.output, &rendered, sample_rate)?;
    info!(
        "Rendered {} frames to {}",
        rendered.len() / 2,
        args.output.display()
    );
    Ok(())
}

/// Frames of silence needed after the input for the reverb to decay.
fn reverb_tail_frames(params: &ParameterState, sample_rate: u32) -> usize {
    let reverb = &params.reverb;
    if params.bypass || !reverb.enabled || reverb.mix <= 0.0 {
        return 0;
    }
    (reverb.decay_secs * sample_rate as f32).ceil() as usize
}

/// Read a WAV file as interleaved stereo f32. Mono is duplicated to both sides.
fn read_stereo(path: &Path) -> Result<(Vec<f32>, u32)> {
    let reader = WavReader::open(path)
        .with_context(|| format!("failed to open WAV file '{}'", path.display()))?;
    let spec = reader.spec();

    let samples: Vec<f32> = if spec.sample_format == SampleFormat::Float {
        reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read float samples")?
    } else {
        let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
        reader
            .into_samples::<i32>()
            .map(|s| s.map(|v| v as f32 / max_val))
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read int samples")?
    };

    let stereo = match spec.channels {
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        2 => samples,
        n => bail!("unsupported channel count: {n} (expected 1 or 2)"),
    };

    Ok((stereo, spec.sample_rate))
}

fn write_stereo(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("failed to create '{}'", path.display()))?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize().context("failed to finalize WAV file")?;
    Ok(())
}
