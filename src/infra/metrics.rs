// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training metrics to a CSV file every `log_every`
// optimizer steps.
//
// Metrics recorded per row (averaged over the logging window):
//   - step:       optimizer steps completed so far
//   - lr:         learning rate of the last step in the window
//   - loss:       weighted generator + discriminator loss
//   - gen_loss:   masked-LM cross-entropy of the generator
//   - disc_loss:  replaced-token BCE of the discriminator
//
// Output file: <checkpoint_dir>/metrics.csv
//
// Example CSV output:
//   step,lr,loss,gen_loss,disc_loss
//   100,0.00000500,42.118300,10.281100,0.636740
//   200,0.00001000,40.902100,10.104800,0.615946
//
// Reading the numbers: gen_loss starts near ln(vocab_size) and
// disc_loss near ln(2); with weight 50 the discriminator term
// dominates the total early on.

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

/// One row of metrics data for a logging window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMetrics {
    pub step:      usize,
    pub lr:        f64,
    pub loss:      f64,
    pub gen_loss:  f64,
    pub disc_loss: f64,
}

/// Running sums between two log lines.
#[derive(Debug, Clone, Default)]
pub struct MetricsWindow {
    steps:     usize,
    loss:      f64,
    gen_loss:  f64,
    disc_loss: f64,
}

impl MetricsWindow {
    pub fn add(&mut self, loss: f64, gen_loss: f64, disc_loss: f64) {
        self.steps     += 1;
        self.loss      += loss;
        self.gen_loss  += gen_loss;
        self.disc_loss += disc_loss;
    }

    pub fn is_empty(&self) -> bool {
        self.steps == 0
    }

    /// Averages of the window, resetting it. None if nothing was added.
    pub fn take(&mut self, step: usize, lr: f64) -> Option<StepMetrics> {
        if self.is_empty() {
            return None;
        }
        let n = self.steps as f64;
        let m = StepMetrics {
            step,
            lr,
            loss:      self.loss / n,
            gen_loss:  self.gen_loss / n,
            disc_loss: self.disc_loss / n,
        };
        *self = Self::default();
        Some(m)
    }
}

/// Logs step metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");

        // appending across runs keeps a single header
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "step,lr,loss,gen_loss,disc_loss")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one row to the CSV.
    pub fn log(&self, m: &StepMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{:.8},{:.6},{:.6},{:.6}",
            m.step,
            m.lr,
            m.loss,
            m.gen_loss,
            m.disc_loss,
        )?;

        tracing::debug!("Logged step {} metrics: loss={:.4}", m.step, m.loss);
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_window_averages_and_resets() {
        let mut w = MetricsWindow::default();
        assert!(w.take(0, 0.0).is_none());

        w.add(10.0, 2.0, 0.5);
        w.add(20.0, 4.0, 0.3);
        let m = w.take(2, 1e-4).unwrap();
        assert_eq!(m.step, 2);
        assert_relative_eq!(m.loss, 15.0);
        assert_relative_eq!(m.gen_loss, 3.0);
        assert_relative_eq!(m.disc_loss, 0.4);
        assert!(w.is_empty());
    }

    #[test]
    fn test_csv_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let m = StepMetrics { step: 1, lr: 1e-4, loss: 3.0, gen_loss: 2.0, disc_loss: 0.02 };

        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&m).unwrap();
        // a second logger on the same dir appends
        MetricsLogger::new(dir.path()).unwrap().log(&m).unwrap();

        let csv = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "step,lr,loss,gen_loss,disc_loss");
        assert_eq!(lines[1], "1,0.00010000,3.000000,2.000000,0.020000");
    }
}
