//! Drives a small visualisation through both a hand-written host and the
//! reference runtime.

use std::collections::BTreeMap;

use bob_core::{
    AnalysisBuffer, AnalysisEngine, AudioFeature, BobError, Canvas, Capabilities, Channel,
    Chromagram, ControlHandle, DrawCommand, Host, HostConfig, PluginInstance, PluginMetadata,
    Point, RecordingCanvas, Rect, Result, Rgba, Runtime, Visualization, VisualizationModule,
};

/// Lights up the strongest pitch class; the bar height follows a slider.
struct Tuner;

struct TunerState {
    sensitivity: Option<ControlHandle>,
    height: f32,
    polls: u32,
}

impl Visualization for Tuner {
    fn describe(&self) -> PluginMetadata {
        PluginMetadata::new("Tuner", "Strongest pitch class")
            .with_feature(AudioFeature::ChromagramMono)
            .with_feature(AudioFeature::TempoMono)
    }

    fn create(&self, host: &mut dyn Host) -> PluginInstance {
        let sensitivity = host.register_float_slider("Sensitivity", 0.0, 1.0, 0.5).ok();
        let height = sensitivity
            .and_then(|handle| host.float_value(handle).ok())
            .unwrap_or(1.0);
        PluginInstance::new(TunerState {
            sensitivity,
            height,
            polls: 0,
        })
    }

    fn update(&self, instance: &mut PluginInstance, host: &mut dyn Host) {
        let Some(state) = instance.downcast_mut::<TunerState>() else {
            return;
        };
        if let Some(handle) = state.sensitivity {
            if let Ok(true) = host.is_updated(handle) {
                state.polls += 1;
                state.height = host.float_value(handle).unwrap_or(state.height);
            }
        }

        let mut chroma = [0.0; 12];
        if host.chromagram(Channel::Mono, &mut chroma).is_err() {
            return;
        }
        let strongest = chroma
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(bin, _)| bin)
            .unwrap_or(0);

        let left = -1.0 + 2.0 * strongest as f32 / 12.0;
        let rect = Rect {
            min: Point { x: left, y: -1.0 },
            max: Point {
                x: left + 2.0 / 12.0,
                y: -1.0 + 2.0 * state.height,
            },
        };
        let canvas = host.canvas();
        canvas.clear(Rgba::BLACK);
        canvas.fill_rect(rect, Rgba::WHITE);
    }
}

struct FakeControl {
    value: f32,
    updated: bool,
}

/// Minimal host: fixed analysis data, a flat control table, no capability
/// enforcement.
#[derive(Default)]
struct FakeHost {
    samples: Vec<f32>,
    chroma: Chromagram,
    tempo: f32,
    controls: BTreeMap<i32, FakeControl>,
    registration_open: bool,
    canvas: RecordingCanvas,
}

impl FakeHost {
    fn move_slider(&mut self, handle: ControlHandle, value: f32) {
        if let Some(control) = self.controls.get_mut(&handle.raw()) {
            control.updated = control.value != value;
            control.value = value;
        }
    }
}

impl Host for FakeHost {
    fn time_domain(&self, _channel: Channel) -> Result<AnalysisBuffer<'_>> {
        Ok(AnalysisBuffer::new(&self.samples))
    }

    fn frequency_domain(&self, _channel: Channel) -> Result<AnalysisBuffer<'_>> {
        Ok(AnalysisBuffer::empty())
    }

    fn chromagram(&self, _channel: Channel, out: &mut Chromagram) -> Result<()> {
        *out = self.chroma;
        Ok(())
    }

    fn pulse(&self, _channel: Channel) -> Result<AnalysisBuffer<'_>> {
        Ok(AnalysisBuffer::empty())
    }

    fn tempo(&self, _channel: Channel) -> Result<f32> {
        Ok(self.tempo)
    }

    fn register_float_slider(
        &mut self,
        _name: &str,
        _min: f32,
        _max: f32,
        default: f32,
    ) -> Result<ControlHandle> {
        if !self.registration_open {
            return Err(BobError::RegistrationClosed);
        }
        let handle = ControlHandle::from_raw(self.controls.len() as i32);
        self.controls.insert(
            handle.raw(),
            FakeControl {
                value: default,
                updated: false,
            },
        );
        Ok(handle)
    }

    fn register_checkbox(&mut self, _name: &str, _default: bool) -> Result<ControlHandle> {
        Err(BobError::msg("checkboxes are not supported"))
    }

    fn is_updated(&mut self, handle: ControlHandle) -> Result<bool> {
        let control = self
            .controls
            .get_mut(&handle.raw())
            .ok_or(BobError::UnknownHandle(handle))?;
        Ok(std::mem::take(&mut control.updated))
    }

    fn float_value(&self, handle: ControlHandle) -> Result<f32> {
        self.controls
            .get(&handle.raw())
            .map(|control| control.value)
            .ok_or(BobError::UnknownHandle(handle))
    }

    fn bool_value(&self, handle: ControlHandle) -> Result<bool> {
        Err(BobError::UnknownHandle(handle))
    }

    fn canvas(&mut self) -> &mut dyn Canvas {
        &mut self.canvas
    }
}

fn drawn_rect(commands: &[DrawCommand]) -> Option<Rect> {
    commands.iter().find_map(|command| match command {
        DrawCommand::FillRect { rect, .. } => Some(*rect),
        _ => None,
    })
}

fn sine(frequency: f32, sample_rate: u32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (std::f32::consts::TAU * frequency * i as f32 / sample_rate as f32).sin())
        .collect()
}

#[test]
fn describe_needs_no_host() {
    let metadata = Tuner.describe();
    assert_eq!(metadata, Tuner.describe());
    assert_eq!(
        metadata.capabilities,
        Capabilities::empty()
            .with(AudioFeature::ChromagramMono)
            .with(AudioFeature::TempoMono)
    );
}

#[test]
fn any_host_implementation_can_drive_a_module() {
    let mut host = FakeHost {
        registration_open: true,
        ..FakeHost::default()
    };
    let mut instance = Tuner.create(&mut host);
    host.registration_open = false;
    assert_eq!(
        instance.downcast_ref::<TunerState>().map(|state| state.height),
        Some(0.5)
    );

    host.chroma[4] = 1.0;
    Tuner.update(&mut instance, &mut host);
    let rect = drawn_rect(host.canvas.commands()).unwrap();
    assert!((rect.min.x - (-1.0 + 8.0 / 12.0)).abs() < 1e-6);
    assert_eq!(rect.max.y, 0.0);

    let slider = ControlHandle::from_raw(0);
    host.move_slider(slider, 1.0);
    Tuner.update(&mut instance, &mut host);
    Tuner.update(&mut instance, &mut host);
    let state = instance.downcast_ref::<TunerState>().unwrap();
    assert_eq!(state.height, 1.0);
    assert_eq!(state.polls, 1);

    Tuner.destroy(instance, &mut host);
}

#[test]
fn runtime_feeds_analysis_into_the_module() {
    let mut runtime = Runtime::new(HostConfig::default());
    runtime
        .load(VisualizationModule::builtin("tuner", Box::new(Tuner)))
        .unwrap();
    runtime.create().unwrap();

    let mut engine = AnalysisEngine::with_sample_rate(48_000);
    let frame = engine
        .process_mono(&sine(440.0, 48_000, 4096), runtime.capabilities())
        .unwrap();
    runtime.update(frame).unwrap();

    let rect = drawn_rect(runtime.canvas().commands()).unwrap();
    assert!((rect.min.x - (-1.0 + 18.0 / 12.0)).abs() < 1e-6);

    let slider = runtime.control("Sensitivity").unwrap();
    runtime.set_float(slider, 5.0).unwrap();
    runtime.update(engine.frame()).unwrap();
    let rect = drawn_rect(runtime.canvas().commands()).unwrap();
    assert_eq!(rect.max.y, 1.0);

    runtime.destroy().unwrap();
    assert!(matches!(
        runtime.set_float(slider, 0.2),
        Err(BobError::StaleHandle(_))
    ));
}
