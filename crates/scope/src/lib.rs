//! Oscilloscope of the mono signal, flashing on detected beats.

use bob_core::{
    AudioFeature, Channel, ControlHandle, Host, PluginInstance, PluginMetadata, Point, Rgba,
    Visualization,
};

/// Upper bound on vertices per frame.
const MAX_POINTS: usize = 512;
const FLASH_THRESHOLD: f32 = 0.6;
const TRACE: Rgba = Rgba::rgb(0.2, 1.0, 0.4);
const FLASH: Rgba = Rgba::rgb(0.25, 0.25, 0.25);

pub struct Scope;

struct State {
    gain_control: Option<ControlHandle>,
    flash_control: Option<ControlHandle>,
    gain: f32,
    flash: bool,
}

impl Visualization for Scope {
    fn describe(&self) -> PluginMetadata {
        PluginMetadata::new("Scope", "Oscilloscope of the mono signal.")
            .with_feature(AudioFeature::TimeDomainMono)
            .with_feature(AudioFeature::PulseMono)
    }

    fn create(&self, host: &mut dyn Host) -> PluginInstance {
        let gain_control = host
            .register_float_slider("Gain", 0.1, 4.0, 1.0)
            .map_err(|err| tracing::warn!(%err, "gain slider unavailable"))
            .ok();
        let flash_control = host
            .register_checkbox("Beat flash", true)
            .map_err(|err| tracing::warn!(%err, "beat flash checkbox unavailable"))
            .ok();

        PluginInstance::new(State {
            gain_control,
            flash_control,
            gain: 1.0,
            flash: true,
        })
    }

    fn update(&self, instance: &mut PluginInstance, host: &mut dyn Host) {
        let Some(state) = instance.downcast_mut::<State>() else {
            return;
        };
        state.poll_controls(host);

        let beat = host
            .pulse(Channel::Mono)
            .ok()
            .and_then(|pulse| pulse.last().copied())
            .unwrap_or(0.0);
        let background = if state.flash && beat >= FLASH_THRESHOLD {
            FLASH
        } else {
            Rgba::BLACK
        };

        let points = match host.time_domain(Channel::Mono) {
            Ok(samples) => trace_points(&samples, state.gain),
            Err(err) => {
                tracing::debug!(%err, "no time domain data this frame");
                return;
            }
        };

        let canvas = host.canvas();
        canvas.clear(background);
        if points.len() > 1 {
            canvas.line_strip(&points, TRACE);
        }
    }
}

impl State {
    fn poll_controls(&mut self, host: &mut dyn Host) {
        if let Some(handle) = self.gain_control {
            if let Ok(true) = host.is_updated(handle) {
                if let Ok(gain) = host.float_value(handle) {
                    tracing::debug!(gain, "scope gain changed");
                    self.gain = gain;
                }
            }
        }
        if let Some(handle) = self.flash_control {
            if let Ok(true) = host.is_updated(handle) {
                self.flash = host.bool_value(handle).unwrap_or(self.flash);
            }
        }
    }
}

/// Spreads `samples` across the x axis, keeping at most [`MAX_POINTS`].
fn trace_points(samples: &[f32], gain: f32) -> Vec<Point> {
    if samples.is_empty() {
        return Vec::new();
    }

    let step = samples.len().div_ceil(MAX_POINTS);
    let count = samples.len().div_ceil(step);
    let span = (count.max(2) - 1) as f32;

    samples
        .iter()
        .step_by(step)
        .enumerate()
        .map(|(i, sample)| Point {
            x: -1.0 + 2.0 * i as f32 / span,
            y: (sample * gain).clamp(-1.0, 1.0),
        })
        .collect()
}

#[cfg(not(feature = "builtin"))]
bob_core::declare_visualization!(Scope);
