//! Stacked-frame observations of a single vehicle.
use crate::error::SteerError;
use anyhow::Result;

/// Fixed-depth ring buffer of observation frames.
///
/// Holds `2 * frame_count` frames. The oldest `frame_count` frames form the
/// previous observation and the newest `frame_count` frames form the current
/// one, so that a single push shifts both views by one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationWindow {
    frame_count: usize,
    frame_dim: usize,

    /// Frames stored back to back, `2 * frame_count * frame_dim` values.
    data: Vec<f32>,

    /// Slot of the oldest frame.
    head: usize,
}

impl ObservationWindow {
    /// Creates a window filled with zeros.
    ///
    /// Both `frame_count` and `frame_dim` must be positive.
    pub fn new(frame_count: usize, frame_dim: usize) -> Result<Self, SteerError> {
        if frame_count == 0 || frame_dim == 0 {
            return Err(SteerError::InvalidConfig(format!(
                "observation window needs positive frame_count and frame_dim, got {} and {}",
                frame_count, frame_dim
            )));
        }
        Ok(Self {
            frame_count,
            frame_dim,
            data: vec![0.; 2 * frame_count * frame_dim],
            head: 0,
        })
    }

    /// Returns the number of stacked frames in a view.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Returns the length of a frame.
    pub fn frame_dim(&self) -> usize {
        self.frame_dim
    }

    /// Returns the length of a view, `frame_count * frame_dim`.
    pub fn obs_dim(&self) -> usize {
        self.frame_count * self.frame_dim
    }

    fn check_frame(&self, frame: &[f32]) -> Result<(), SteerError> {
        if frame.len() != self.frame_dim {
            return Err(SteerError::ShapeMismatch {
                what: "observation frame".into(),
                expected: self.frame_dim,
                actual: frame.len(),
            });
        }
        Ok(())
    }

    fn n_slots(&self) -> usize {
        2 * self.frame_count
    }

    /// Appends a frame, evicting the oldest one.
    pub fn push(&mut self, frame: &[f32]) -> Result<()> {
        self.check_frame(frame)?;
        let d = self.frame_dim;
        let slot = self.head;
        self.data[slot * d..(slot + 1) * d].copy_from_slice(frame);
        self.head = (self.head + 1) % self.n_slots();
        Ok(())
    }

    /// Fills every slot with copies of `frame`.
    pub fn reset(&mut self, frame: &[f32]) -> Result<()> {
        self.check_frame(frame)?;
        for chunk in self.data.chunks_exact_mut(self.frame_dim) {
            chunk.copy_from_slice(frame);
        }
        self.head = 0;
        Ok(())
    }

    fn view(&self, offset: usize) -> Vec<f32> {
        let d = self.frame_dim;
        let mut obs = Vec::with_capacity(self.obs_dim());
        for k in 0..self.frame_count {
            let slot = (self.head + offset + k) % self.n_slots();
            obs.extend_from_slice(&self.data[slot * d..(slot + 1) * d]);
        }
        obs
    }

    /// The oldest `frame_count` frames concatenated, oldest first.
    pub fn previous(&self) -> Vec<f32> {
        self.view(0)
    }

    /// The newest `frame_count` frames concatenated, oldest first.
    pub fn current(&self) -> Vec<f32> {
        self.view(self.frame_count)
    }
}
