//! Training history for monitoring GAN progress
//!
//! One record is appended per completed step. Records are never removed or
//! rewritten.

use std::path::Path;

use crate::error::Result;

/// Losses and accuracy of one completed training step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepRecord {
    pub step: usize,
    /// Mean of the real-batch and fake-batch discriminator losses
    pub disc_loss: f64,
    pub gen_loss: f64,
    /// Mean of the real-batch and fake-batch discriminator accuracies, in [0, 1]
    pub disc_accuracy: f64,
}

/// Append-only sequence of step records
#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    records: Vec<StepRecord>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the record of a completed step
    pub fn record(&mut self, record: StepRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest(&self) -> Option<&StepRecord> {
        self.records.last()
    }

    /// Moving average of the generator loss over the last `window` steps
    pub fn gen_loss_ma(&self, window: usize) -> f64 {
        moving_average(self.records.iter().map(|r| r.gen_loss), window)
    }

    /// Moving average of the discriminator loss over the last `window` steps
    pub fn disc_loss_ma(&self, window: usize) -> f64 {
        moving_average(self.records.iter().map(|r| r.disc_loss), window)
    }

    /// Moving average of the discriminator accuracy over the last `window` steps
    pub fn disc_accuracy_ma(&self, window: usize) -> f64 {
        moving_average(self.records.iter().map(|r| r.disc_accuracy), window)
    }

    /// Check if training appears to have collapsed
    ///
    /// Mode collapse indicators:
    /// - Discriminator loss very low (can easily distinguish)
    /// - Generator loss very high (can't fool discriminator)
    pub fn check_mode_collapse(&self, window: usize) -> bool {
        if self.len() < window {
            return false;
        }

        self.disc_loss_ma(window) < 0.1 && self.gen_loss_ma(window) > 5.0
    }

    /// Save history to CSV file
    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        writer.write_record(["step", "disc_loss", "disc_accuracy", "gen_loss"])?;

        for r in &self.records {
            writer.write_record([
                r.step.to_string(),
                r.disc_loss.to_string(),
                r.disc_accuracy.to_string(),
                r.gen_loss.to_string(),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// Mean of the last `window` values
fn moving_average<I>(values: I, window: usize) -> f64
where
    I: DoubleEndedIterator<Item = f64>,
{
    let (sum, n) = values
        .rev()
        .take(window)
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn rec(step: usize, disc_loss: f64, gen_loss: f64) -> StepRecord {
        StepRecord {
            step,
            disc_loss,
            gen_loss,
            disc_accuracy: 0.5,
        }
    }

    #[test]
    fn test_training_history() {
        let mut history = TrainingHistory::new();

        history.record(rec(0, 0.8, 1.5));
        history.record(rec(1, 0.75, 1.3));

        assert_eq!(history.len(), 2);
        assert_eq!(history.latest().map(|r| r.gen_loss), Some(1.3));
        assert_eq!(history.records()[0].step, 0);
    }

    #[test]
    fn test_moving_averages() {
        let mut history = TrainingHistory::new();
        for (i, g) in [1.0, 2.0, 3.0, 4.0].iter().enumerate() {
            history.record(rec(i, 0.5, *g));
        }

        assert_eq!(history.gen_loss_ma(2), 3.5);
        assert_eq!(history.disc_loss_ma(3), 0.5);
        assert_eq!(history.disc_accuracy_ma(4), 0.5);
        assert_eq!(history.gen_loss_ma(10), 2.5);
        assert_eq!(TrainingHistory::new().gen_loss_ma(3), 0.0);
    }

    #[test]
    fn test_mode_collapse_detection() {
        let mut history = TrainingHistory::new();
        for i in 0..5 {
            history.record(rec(i, 0.01, 8.0));
        }

        assert!(!history.check_mode_collapse(10));
        assert!(history.check_mode_collapse(5));

        history.record(rec(5, 0.7, 0.9));
        assert!(!history.check_mode_collapse(1));
    }

    #[test]
    fn test_save_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.csv");

        let mut history = TrainingHistory::new();
        history.record(rec(0, 0.7, 0.9));
        history.record(rec(1, 0.6, 1.1));
        history.save_csv(&path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[1][0], "1");
        assert_eq!(&rows[1][3], "1.1");
    }
}
