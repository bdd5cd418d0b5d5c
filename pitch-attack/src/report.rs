use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;

use rusty_audiohash::{AttackMode, AttackTrial, TrialScores};

/// Path of the results file for a clip attacked in the given mode.
pub fn report_path(output_dir: &Path, mode: AttackMode, clip: &str) -> PathBuf {
    output_dir.join(format!("{mode}_results_{clip}.txt"))
}

/// Human readable log of an experiment, one block per trial.
pub struct Report<W: Write> {
    writer: W,
    clip: String,
    hits: usize,
    misses: usize,
    failures: usize,
}

impl Report<BufWriter<File>> {
    pub fn create(path: &Path, mode: AttackMode, clip: &str) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        Self::new(BufWriter::new(file), mode, clip)
    }
}

impl<W: Write> Report<W> {
    pub fn new(mut writer: W, mode: AttackMode, clip: &str) -> anyhow::Result<Self> {
        let scheme = match mode {
            AttackMode::Simple => "simple",
            AttackMode::Robust => "pitch robust",
        };
        let header = format!("Testing a pitch shifting attack against {scheme} fingerprinting scheme");
        writeln!(writer, "{header}")?;
        writeln!(writer, "{}", "-".repeat(header.len()))?;
        Ok(Self {
            writer,
            clip: clip.to_owned(),
            hits: 0,
            misses: 0,
            failures: 0,
        })
    }

    pub fn write_trial(&mut self, trial: &AttackTrial) -> anyhow::Result<()> {
        writeln!(self.writer)?;
        writeln!(self.writer, "Attack on {} with n_sts {}", self.clip, trial.shift)?;
        match &trial.scores {
            TrialScores::Simple { ber } => writeln!(self.writer, "BER: {ber:.3}")?,
            TrialScores::Robust { bers } => {
                let entries = bers
                    .iter()
                    .map(|(shift, ber)| format!("{shift}: {ber:.3}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(self.writer, "BERs: {{{entries}}}")?;
            }
        }
        writeln!(self.writer, "{}", trial.verdict)?;
        if trial.verdict.is_hit() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        Ok(())
    }

    pub fn write_failure(&mut self, shift: f64, error: &dyn std::fmt::Display) -> anyhow::Result<()> {
        writeln!(self.writer)?;
        writeln!(self.writer, "Attack on {} with n_sts {shift}", self.clip)?;
        writeln!(self.writer, "FAILED: {error}")?;
        self.failures += 1;
        Ok(())
    }

    /// Writes the summary line and flushes the writer.
    pub fn finish(mut self) -> anyhow::Result<W> {
        writeln!(self.writer)?;
        write!(self.writer, "Hits: {}, misses: {}", self.hits, self.misses)?;
        if self.failures > 0 {
            write!(self.writer, ", failed: {}", self.failures)?;
        }
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use rusty_audiohash::{AttackMode, AttackTrial, TrialScores, Verdict};

    use crate::report::{report_path, Report};

    fn render(mode: AttackMode, trials: &[AttackTrial]) -> String {
        let mut report = Report::new(Vec::new(), mode, "brahms").unwrap();
        for trial in trials {
            report.write_trial(trial).unwrap();
        }
        String::from_utf8(report.finish().unwrap()).unwrap()
    }

    #[test]
    fn path() {
        assert_eq!(
            Path::new("experiments/robust_results_trumpet.txt"),
            report_path(Path::new("experiments"), AttackMode::Robust, "trumpet")
        );
    }

    #[test]
    fn simple_report() {
        let trial = AttackTrial {
            shift: 0.5,
            scores: TrialScores::Simple { ber: 0.41234 },
            verdict: Verdict::Miss,
        };
        let text = render(AttackMode::Simple, &[trial]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!("Testing a pitch shifting attack against simple fingerprinting scheme", lines[0]);
        assert_eq!(lines[0].len(), lines[1].len());
        assert!(lines[1].chars().all(|c| c == '-'));
        assert_eq!("Attack on brahms with n_sts 0.5", lines[3]);
        assert_eq!("BER: 0.412", lines[4]);
        assert_eq!("FINGERPRINT MISS. ATTACK SUCCESSFUL", lines[5]);
        assert_eq!("Hits: 0, misses: 1", lines[7]);
    }

    #[test]
    fn robust_report() {
        let trial = AttackTrial {
            shift: -1.25,
            scores: TrialScores::Robust { bers: vec![(-0.8, 0.3), (0.0, 0.45)] },
            verdict: Verdict::Hit,
        };
        let mut report = Report::new(Vec::new(), AttackMode::Robust, "brahms").unwrap();
        report.write_trial(&trial).unwrap();
        report.write_failure(1.5, &"resampling failed").unwrap();
        let text = String::from_utf8(report.finish().unwrap()).unwrap();

        assert!(text.starts_with("Testing a pitch shifting attack against pitch robust fingerprinting scheme\n"));
        assert!(text.contains("BERs: {-0.8: 0.300, 0: 0.450}\n"));
        assert!(text.contains("FINGERPRINT HIT. ATTACK UNSUCCESSFUL\n"));
        assert!(text.contains("Attack on brahms with n_sts 1.5\nFAILED: resampling failed\n"));
        assert!(text.ends_with("Hits: 1, misses: 0, failed: 1\n"));
    }
}
