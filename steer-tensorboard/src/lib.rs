//! Writes training telemetry of `steer-core` as TensorBoard event files.
use log::warn;
use std::path::Path;
use steer_core::record::{Record, RecordValue, Recorder};
use tensorboard_rs::summary_writer::SummaryWriter;

/// Write records to TFRecord.
///
/// Every scalar of a record is written under its key, at the step given by
/// the value of `step_key` in the same record. Records without the step key
/// are dropped.
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    step_key: String,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`] keyed on `global_step`.
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            step_key: "global_step".to_string(),
        }
    }

    /// Sets the key holding the step of a record.
    pub fn step_key(mut self, step_key: impl Into<String>) -> Self {
        self.step_key = step_key.into();
        self
    }
}

impl Recorder for TensorboardRecorder {
    fn write(&mut self, record: Record) {
        let step = match record.get_scalar(&self.step_key) {
            Ok(v) => v as usize,
            Err(e) => {
                warn!("Dropped a record: {}", e);
                return;
            }
        };

        for (k, RecordValue::Scalar(v)) in record.iter() {
            if *k != self.step_key {
                self.writer.add_scalar(k, *v, step);
            }
        }
    }

    fn flush(&mut self, _step: usize) {
        self.writer.flush();
    }
}
