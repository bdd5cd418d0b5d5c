mod audio;
mod config;
mod report;
mod utils;

use std::path::PathBuf;

use anyhow::Context;
use clap::builder::PossibleValuesParser;
use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use rusty_audiohash::{AttackEvaluator, AttackMode, AttackTrial, Fingerprinter, GranularPitchShifter, PitchShifter};

use crate::audio::{clip_path, decode_audio, shifted_clip_path, write_wav};
use crate::config::{load_config, ExperimentConfig};
use crate::report::{report_path, Report};

const CLIP_NAMES: [&str; 4] = ["brahms", "choice", "fishin", "trumpet"];

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Compare spectrograms directly.
    Simple,
    /// Compare against a bank of pitch shifted fingerprints.
    Robust,
}

impl From<Mode> for AttackMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Simple => AttackMode::Simple,
            Mode::Robust => AttackMode::Robust,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "pitch-attack", about = "Evaluate pitch shifting attacks against audio fingerprinting")]
struct Args {
    /// Clip to attack.
    #[arg(value_parser = PossibleValuesParser::new(CLIP_NAMES))]
    clip: String,

    /// Fingerprinting scheme to attack.
    #[arg(value_enum)]
    mode: Mode,

    /// Number of trials; overrides the config file.
    #[arg(short, long)]
    trials: Option<usize>,

    /// Directory holding `<clip>/<clip>.wav`.
    #[arg(long, default_value = "audio_files")]
    audio_dir: PathBuf,

    /// Directory receiving the results file.
    #[arg(short, long, default_value = "experiments")]
    output_dir: PathBuf,

    /// Seed for the pitch shift sampling.
    #[arg(long)]
    seed: Option<u64>,

    /// Save every shifted signal next to the clip.
    #[arg(long)]
    write_shifted: bool,

    /// TOML file with experiment parameters.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let experiment = match &args.config {
        Some(path) => load_config(path)?,
        None => ExperimentConfig::default(),
    };
    let mode = AttackMode::from(args.mode);
    let attack_config = experiment.attack_config()?;
    let trial_count = args.trials.unwrap_or(experiment.trials.count);

    let audio = decode_audio(&clip_path(&args.audio_dir, &args.clip))?;
    info!(
        "Loaded {} ({} samples at {} Hz)",
        args.clip,
        audio.samples.len(),
        audio.sample_rate
    );

    let mut rng = match args.seed.or(experiment.trials.seed) {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let shifts = (0..trial_count)
        .map(|_| attack_config.sample_shift(&mut rng))
        .collect::<Result<Vec<f64>, _>>()?;

    let fingerprint_config = experiment.fingerprint_config();
    info!(
        "Fingerprint items cover {:.4}s each",
        fingerprint_config.item_duration_in_seconds(audio.sample_rate)
    );
    let evaluator = AttackEvaluator::new(
        attack_config,
        Fingerprinter::new(&fingerprint_config),
        GranularPitchShifter::default(),
    );

    let path = report_path(&args.output_dir, mode, &args.clip);
    let mut report = Report::create(&path, mode, &args.clip)?;

    info!("Running {trial_count} {mode} trials on {}", args.clip);
    let results: Vec<(f64, anyhow::Result<AttackTrial>)> = if args.write_shifted {
        let reference = evaluator
            .prepare(mode, &audio.samples, audio.sample_rate)
            .context("failed to fingerprint the reference clip")?;
        shifts
            .iter()
            .map(|&shift| {
                let result = (|| -> anyhow::Result<AttackTrial> {
                    let shifted = evaluator.shifter().shift(&audio.samples, audio.sample_rate, shift)?;
                    write_wav(&shifted_clip_path(&args.audio_dir, &args.clip, shift), &shifted, audio.sample_rate)?;
                    Ok(evaluator.attack_shifted(&reference, &shifted, audio.sample_rate, shift)?)
                })();
                (shift, result)
            })
            .collect()
    } else {
        let trials = evaluator
            .run_trials(mode, &audio.samples, audio.sample_rate, &shifts)
            .context("failed to fingerprint the reference clip")?;
        shifts
            .iter()
            .copied()
            .zip(trials.into_iter().map(|trial| trial.map_err(anyhow::Error::from)))
            .collect()
    };

    for (shift, result) in results {
        match result {
            Ok(trial) => {
                info!(
                    "Shift {shift:+.3}: ber {:.3}, {}",
                    trial.scores.decisive_ber(),
                    trial.verdict
                );
                report.write_trial(&trial)?;
            }
            Err(err) => {
                warn!("Shift {shift:+.3} failed: {err:#}");
                report.write_failure(shift, &format!("{err:#}"))?;
            }
        }
    }

    report.finish()?;
    info!("Results written to {}", path.display());
    Ok(())
}
