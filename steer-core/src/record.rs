//! Records of training telemetry.
//!
//! A [`Record`] is a bag of named values emitted by the [`Trainer`](crate::Trainer)
//! at two points of the training loop:
//!
//! * once per finished episode, with keys `reward`, `epsilon`, `success`,
//!   `agent`, `steps`, `episode`, `global_step` and running averages;
//! * once per optimization step, with keys `loss` and `global_step`.
//!
//! Records are handed to a [`Recorder`], which decides where they go.
//!
//! ```rust
//! use steer_core::record::{Record, RecordValue};
//!
//! let mut record = Record::empty();
//! record.insert("reward", RecordValue::Scalar(12.5));
//! record.insert("success", RecordValue::Scalar(1.0));
//! assert_eq!(record.get_scalar("reward").unwrap(), 12.5);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
