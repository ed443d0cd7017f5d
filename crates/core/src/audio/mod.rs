use std::{
    f64::consts::TAU,
    sync::{Arc, Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize};

use crate::{AnalysisEngine, AnalysisFrame, BobError, Capabilities, HostConfig, Result};

/// High level audio engine façade.
///
/// Capture code pushes interleaved stereo blocks; the render loop reads the
/// resulting frame through an [`AnalysisHandle`].
#[derive(Debug)]
pub struct AudioEngine {
    sample_rate: u32,
    analysis: Arc<Mutex<AnalysisEngine>>,
}

impl AudioEngine {
    pub fn new(config: &HostConfig) -> Self {
        Self {
            sample_rate: config.audio.sample_rate,
            analysis: Arc::new(Mutex::new(AnalysisEngine::from_config(config))),
        }
    }

    /// Returns the sample rate the engine operates at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Resets the analysis state and returns a handle to it.
    pub fn start(&self) -> Result<AnalysisHandle> {
        self.lock_analysis()?.reset();
        Ok(AnalysisHandle::new(self.analysis.clone()))
    }

    /// Feeds a block of interleaved stereo samples, computing the `wanted`
    /// features.
    pub fn push_stereo(&self, samples: &[f32], wanted: Capabilities) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let mut engine = self.lock_analysis()?;
        engine.process_stereo(samples, wanted)?;
        Ok(())
    }

    fn lock_analysis(&self) -> Result<MutexGuard<'_, AnalysisEngine>> {
        self.analysis
            .lock()
            .map_err(|_| BobError::msg("analysis pipeline has been poisoned"))
    }
}

/// Shared, thread-safe view over the analysis engine managed by [`AudioEngine`].
#[derive(Clone)]
pub struct AnalysisHandle {
    shared: Arc<Mutex<AnalysisEngine>>,
}

impl AnalysisHandle {
    pub(crate) fn new(shared: Arc<Mutex<AnalysisEngine>>) -> Self {
        Self { shared }
    }

    /// Runs `f` against the latest frame while holding the analysis lock.
    pub fn with_frame<R>(&self, f: impl FnOnce(&AnalysisFrame) -> R) -> Result<R> {
        let engine = self
            .shared
            .lock()
            .map_err(|_| BobError::msg("analysis pipeline has been poisoned"))?;
        Ok(f(engine.frame()))
    }
}

impl std::fmt::Debug for AnalysisHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisHandle").finish()
    }
}

/// Synthetic input for running visualisations without a capture device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Signal {
    Silence,
    /// Sine on the left channel, the same tone a fifth up on the right.
    Sine { frequency: f32 },
    /// Full-scale bursts at `bpm`, silence in between.
    Clicks { bpm: f32 },
}

/// Produces interleaved stereo blocks of a [`Signal`].
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    signal: Signal,
    sample_rate: f64,
    position: u64,
}

impl SignalGenerator {
    pub fn new(signal: Signal, sample_rate: u32) -> Self {
        Self {
            signal,
            sample_rate: f64::from(sample_rate.max(1)),
            position: 0,
        }
    }

    /// Next `frames` left/right pairs.
    pub fn next_block(&mut self, frames: usize) -> Vec<f32> {
        let mut block = Vec::with_capacity(frames * 2);
        for _ in 0..frames {
            // Seconds in f64; f32 loses the phase after a few minutes.
            let t = self.position as f64 / self.sample_rate;
            let (left, right) = match self.signal {
                Signal::Silence => (0.0, 0.0),
                Signal::Sine { frequency } => {
                    let frequency = f64::from(frequency);
                    (tone(frequency, t), tone(frequency * 1.5, t))
                }
                Signal::Clicks { bpm } => {
                    let period = 60.0 / f64::from(bpm.max(1.0));
                    let value = if t % period < 0.05 { 1.0 } else { 0.0 };
                    (value, value)
                }
            };
            block.push(left);
            block.push(right);
            self.position += 1;
        }
        block
    }
}

fn tone(frequency: f64, t: f64) -> f32 {
    (TAU * (frequency * t).fract()).sin() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AudioFeature, Channel};

    #[test]
    fn pushes_samples_into_shared_analysis() {
        let audio = AudioEngine::new(&HostConfig::default());
        let analysis = audio.start().unwrap();
        let wanted = Capabilities::from(AudioFeature::TimeDomainStereo);

        audio
            .push_stereo(&[1.0_f32; 64], wanted)
            .expect("pushing samples should succeed");

        let len = analysis
            .with_frame(|frame| frame.channel(Channel::Left).time_domain.len())
            .unwrap();
        assert_eq!(len, 32);
    }

    #[test]
    fn silence_is_silent() {
        let mut generator = SignalGenerator::new(Signal::Silence, 48_000);
        let block = generator.next_block(256);
        assert_eq!(block.len(), 512);
        assert!(block.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn sine_keeps_its_phase_after_long_runs() {
        let mut generator = SignalGenerator::new(Signal::Sine { frequency: 1000.0 }, 48_000);
        // Ten minutes in; 48 samples per period.
        generator.position = 48_000 * 600;
        let block = generator.next_block(13);

        assert!(block[0].abs() < 1e-4);
        assert!((block[2 * 12] - 1.0).abs() < 1e-4);
        assert!(block.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn clicks_repeat_at_the_tempo() {
        let mut generator = SignalGenerator::new(Signal::Clicks { bpm: 120.0 }, 100);
        let block = generator.next_block(100);
        let onsets = block
            .chunks_exact(2)
            .collect::<Vec<_>>()
            .windows(2)
            .filter(|pair| pair[0][0] == 0.0 && pair[1][0] == 1.0)
            .count();
        // Clicks at 0.0 s and 0.5 s; only the second follows silence.
        assert_eq!(onsets, 1);
        assert_eq!(block[0], 1.0);
        assert_eq!(block[2 * 50], 1.0);
    }
}
