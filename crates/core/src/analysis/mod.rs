//! Shapes of the analysis data handed to plugins, plus the reference
//! pipeline that produces them.

mod engine;

use std::ops::Deref;

use serde::{Deserialize, Serialize};

pub use engine::AnalysisEngine;

/// Number of pitch classes in a [`Chromagram`].
pub const PITCH_CLASSES: usize = 12;

/// Pitch-class energy, index 0 is C. Filled in place by the host.
pub type Chromagram = [f32; PITCH_CLASSES];

/// Audio stream a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Mono,
    Left,
    Right,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Mono, Channel::Left, Channel::Right];

    pub(crate) fn index(self) -> usize {
        match self {
            Channel::Mono => 0,
            Channel::Left => 1,
            Channel::Right => 2,
        }
    }
}

/// Read-only view over host-owned samples for the current frame.
///
/// The borrow ends when the call that produced it returns; copy the data
/// with [`AnalysisBuffer::to_vec`] to keep it longer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisBuffer<'a> {
    samples: &'a [f32],
}

impl<'a> AnalysisBuffer<'a> {
    pub fn new(samples: &'a [f32]) -> Self {
        Self { samples }
    }

    pub fn empty() -> Self {
        Self { samples: &[] }
    }

    pub fn as_slice(&self) -> &'a [f32] {
        self.samples
    }
}

impl Deref for AnalysisBuffer<'_> {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        self.samples
    }
}

/// Features computed for one channel during one frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelFeatures {
    pub time_domain: Vec<f32>,
    pub frequency_domain: Vec<f32>,
    pub chromagram: Chromagram,
    pub pulse: Vec<f32>,
    /// Beats per minute, `0.0` until an estimate exists.
    pub tempo: f32,
}

/// Everything the host knows about the audio at the current frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisFrame {
    pub time: f32,
    channels: [ChannelFeatures; 3],
}

impl AnalysisFrame {
    pub fn channel(&self, channel: Channel) -> &ChannelFeatures {
        &self.channels[channel.index()]
    }

    pub fn channel_mut(&mut self, channel: Channel) -> &mut ChannelFeatures {
        &mut self.channels[channel.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_views_host_storage() {
        let storage = vec![0.25_f32; 4];
        let buffer = AnalysisBuffer::new(&storage);
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.iter().sum::<f32>(), 1.0);
        assert!(AnalysisBuffer::empty().is_empty());
    }

    #[test]
    fn frame_channels_are_separate() {
        let mut frame = AnalysisFrame::default();
        frame.channel_mut(Channel::Left).tempo = 120.0;
        assert_eq!(frame.channel(Channel::Left).tempo, 120.0);
        assert_eq!(frame.channel(Channel::Right).tempo, 0.0);
        assert_eq!(frame.channel(Channel::Mono).chromagram.len(), PITCH_CLASSES);
    }
}
