use super::Record;

/// Writes records to an output destination.
pub trait Recorder {
    /// Writes a record.
    fn write(&mut self, record: Record);

    /// Flushes buffered output, if any.
    ///
    /// `step` is the global step at the time of the call.
    fn flush(&mut self, _step: usize) {}
}
