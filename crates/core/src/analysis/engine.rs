use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use super::{AnalysisFrame, Channel, Chromagram, PITCH_CLASSES};
use crate::{capability::FeatureKind, BobError, Capabilities, HostConfig, Result};

const BEAT_GAIN: f32 = 12.0;
const BEAT_THRESHOLD: f32 = 0.6;
const MIN_BEAT_INTERVAL: f32 = 0.2;
const MAX_BEAT_HISTORY: usize = 32;
/// A0; anything lower is rumble as far as pitch classes go.
const LOWEST_PITCH_HZ: f32 = 27.5;

/// Reference analysis pipeline feeding the plugin contract.
///
/// Every call to one of the `process_*` methods turns one block of audio into
/// a fresh [`AnalysisFrame`]. Only the features in the `wanted` mask are
/// recomputed; everything else keeps whatever the previous frame left there.
pub struct AnalysisEngine {
    sample_rate: u32,
    pulse_history: usize,
    processed_frames: usize,
    frame: AnalysisFrame,
    trackers: [BeatTracker; 3],
    inputs: [Vec<f32>; 3],
    fft_planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
}

impl AnalysisEngine {
    /// Creates a new engine using the default 48 kHz sample rate.
    pub fn new() -> Self {
        Self::with_sample_rate(48_000)
    }

    /// Creates a new engine that operates at the provided sample rate.
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            pulse_history: 256,
            processed_frames: 0,
            frame: AnalysisFrame::default(),
            trackers: Default::default(),
            inputs: Default::default(),
            fft_planner: RealFftPlanner::new(),
            fft: None,
        }
    }

    pub fn from_config(config: &HostConfig) -> Self {
        let mut engine = Self::with_sample_rate(config.audio.sample_rate);
        engine.pulse_history = config.analysis.pulse_history.max(1);
        engine
    }

    /// Returns the sample rate associated with the engine.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The frame produced by the most recent block.
    pub fn frame(&self) -> &AnalysisFrame {
        &self.frame
    }

    /// Clears the accumulated state while preserving configuration.
    pub fn reset(&mut self) {
        self.processed_frames = 0;
        self.frame = AnalysisFrame::default();
        self.trackers = Default::default();
    }

    /// Analyses a block of interleaved left/right samples.
    pub fn process_stereo(
        &mut self,
        interleaved: &[f32],
        wanted: Capabilities,
    ) -> Result<&AnalysisFrame> {
        if interleaved.len() % 2 != 0 {
            return Err(BobError::InvalidInput(
                "stereo blocks must hold whole left/right pairs",
            ));
        }

        let frames = interleaved.len() / 2;
        check_block_len(frames)?;

        let [mono, left, right] = &mut self.inputs;
        mono.clear();
        left.clear();
        right.clear();
        for pair in interleaved.chunks_exact(2) {
            left.push(pair[0]);
            right.push(pair[1]);
            mono.push((pair[0] + pair[1]) * 0.5);
        }

        self.analyse(frames, wanted)
    }

    /// Analyses a mono block; the left and right channels mirror it.
    pub fn process_mono(
        &mut self,
        samples: &[f32],
        wanted: Capabilities,
    ) -> Result<&AnalysisFrame> {
        check_block_len(samples.len())?;

        for input in &mut self.inputs {
            input.clear();
            input.extend_from_slice(samples);
        }

        self.analyse(samples.len(), wanted)
    }

    fn analyse(&mut self, block_size: usize, wanted: Capabilities) -> Result<&AnalysisFrame> {
        let sample_rate = self.sample_rate.max(1) as f32;
        let start_time = self.processed_frames as f32 / sample_rate;
        let end_time = (self.processed_frames + block_size) as f32 / sample_rate;
        let timestamp = start_time + (end_time - start_time) * 0.5;

        let needs_spectrum = Channel::ALL.into_iter().any(|channel| {
            wanted.wants(FeatureKind::FrequencyDomain, channel)
                || wanted.wants(FeatureKind::Chromagram, channel)
        });
        if needs_spectrum {
            self.prepare_fft(block_size);
        }

        let Self {
            pulse_history,
            frame,
            trackers,
            inputs,
            fft,
            ..
        } = self;

        for channel in Channel::ALL {
            if !wanted.touches(channel) {
                continue;
            }

            let samples = &inputs[channel.index()];
            let features = frame.channel_mut(channel);

            if wanted.wants(FeatureKind::TimeDomain, channel) {
                features.time_domain.clear();
                features.time_domain.extend_from_slice(samples);
            }

            let wants_frequency = wanted.wants(FeatureKind::FrequencyDomain, channel);
            let wants_chroma = wanted.wants(FeatureKind::Chromagram, channel);
            if wants_frequency || wants_chroma {
                let Some(fft) = fft.as_mut() else {
                    return Err(BobError::msg("fft resources were not prepared"));
                };
                fft.compute_magnitudes(samples)?;
                if wants_frequency {
                    features.frequency_domain.clear();
                    features.frequency_domain.extend_from_slice(&fft.magnitudes);
                }
                if wants_chroma {
                    fold_chromagram(
                        &fft.magnitudes,
                        sample_rate,
                        block_size,
                        &mut features.chromagram,
                    );
                }
            }

            let wants_pulse = wanted.wants(FeatureKind::Pulse, channel);
            let wants_tempo = wanted.wants(FeatureKind::Tempo, channel);
            if wants_pulse || wants_tempo {
                let tracker = &mut trackers[channel.index()];
                let onset = tracker.update(timestamp, compute_rms(samples));
                if wants_pulse {
                    features.pulse.push(onset);
                    if features.pulse.len() > *pulse_history {
                        let overflow = features.pulse.len() - *pulse_history;
                        features.pulse.drain(0..overflow);
                    }
                }
                if wants_tempo {
                    features.tempo = tracker.tempo_bpm.unwrap_or(0.0);
                }
            }
        }

        frame.time = timestamp;
        self.processed_frames += block_size;
        tracing::trace!(time = timestamp, ?wanted, "analysed block");
        Ok(&self.frame)
    }

    fn prepare_fft(&mut self, size: usize) {
        let rebuild = self
            .fft
            .as_ref()
            .map(|fft| fft.size != size)
            .unwrap_or(true);

        if rebuild {
            let plan = self.fft_planner.plan_fft_forward(size);
            let scratch = plan.make_scratch_vec();
            let spectrum = plan.make_output_vec();
            let input = plan.make_input_vec();
            self.fft = Some(FftResources {
                size,
                plan,
                scratch,
                spectrum,
                input,
                magnitudes: Vec::with_capacity(size / 2 + 1),
            });
        }
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn check_block_len(frames: usize) -> Result<()> {
    if frames < 2 {
        return Err(BobError::InvalidInput(
            "analysis requires blocks with at least two frames",
        ));
    }
    Ok(())
}

/// Onset detection and tempo estimation for one channel.
#[derive(Debug, Default)]
struct BeatTracker {
    last_rms: f32,
    beat_timestamps: Vec<f32>,
    tempo_bpm: Option<f32>,
}

impl BeatTracker {
    /// Returns the onset strength of this block in `[0, 1]`.
    fn update(&mut self, timestamp: f32, rms: f32) -> f32 {
        let delta = (rms - self.last_rms).max(0.0);
        self.last_rms = rms;
        let confidence = (delta * BEAT_GAIN).clamp(0.0, 1.0);

        if confidence >= BEAT_THRESHOLD
            && self
                .beat_timestamps
                .last()
                .map(|last| timestamp - last >= MIN_BEAT_INTERVAL)
                .unwrap_or(true)
        {
            self.beat_timestamps.push(timestamp);
            if self.beat_timestamps.len() > MAX_BEAT_HISTORY {
                let overflow = self.beat_timestamps.len() - MAX_BEAT_HISTORY;
                self.beat_timestamps.drain(0..overflow);
            }
            self.update_tempo_estimate();
        }

        confidence
    }

    fn update_tempo_estimate(&mut self) {
        if self.beat_timestamps.len() < 2 {
            return;
        }

        let mut sum = 0.0;
        let mut count = 0;
        for window in self.beat_timestamps.windows(2) {
            let interval = window[1] - window[0];
            if interval > f32::EPSILON {
                sum += interval;
                count += 1;
            }
        }

        if count > 0 {
            let average_interval = sum / count as f32;
            if average_interval > 0.0 {
                self.tempo_bpm = Some(60.0 / average_interval);
            }
        }
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
    magnitudes: Vec<f32>,
}

impl FftResources {
    /// Hann-windowed magnitude spectrum of `samples`, `size / 2 + 1` bins.
    fn compute_magnitudes(&mut self, samples: &[f32]) -> Result<()> {
        let len = self.size;
        for (index, value) in samples.iter().take(len).enumerate() {
            self.input[index] = *value * hann_value(index, len);
        }

        self.plan
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)?;

        let scale = 2.0 / len as f32;
        self.magnitudes.clear();
        self.magnitudes
            .extend(self.spectrum.iter().map(|bin| bin.norm() * scale));
        Ok(())
    }
}

impl fmt::Debug for AnalysisEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisEngine")
            .field("sample_rate", &self.sample_rate)
            .field("pulse_history", &self.pulse_history)
            .field("processed_frames", &self.processed_frames)
            .field("fft", &self.fft)
            .finish()
    }
}

impl fmt::Debug for FftResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftResources")
            .field("size", &self.size)
            .finish()
    }
}

fn fold_chromagram(
    magnitudes: &[f32],
    sample_rate: f32,
    block_size: usize,
    chroma: &mut Chromagram,
) {
    *chroma = [0.0; PITCH_CLASSES];
    let bin_hz = sample_rate / block_size as f32;

    for (i, &mag) in magnitudes.iter().enumerate().skip(1) {
        let freq = i as f32 * bin_hz;
        if freq < LOWEST_PITCH_HZ {
            continue;
        }
        let midi = 69.0 + 12.0 * (freq / 440.0).log2();
        let pitch_class = (midi.round() as i32).rem_euclid(PITCH_CLASSES as i32) as usize;
        chroma[pitch_class] += mag * mag;
    }

    for c in chroma.iter_mut() {
        *c = c.sqrt();
    }

    let max = chroma.iter().fold(0.0f32, |a, &b| a.max(b));
    if max > 1e-10 {
        for c in chroma.iter_mut() {
            *c /= max;
        }
    }
}

fn compute_rms(samples: &[f32]) -> f32 {
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}
