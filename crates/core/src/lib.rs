//! Host/plugin contract for BoB audio visualisations.
//!
//! A host analyses audio and runs a render loop; a visualisation module
//! reads the analysis through the [`Host`] table and draws one frame per
//! [`Visualization::update`]. This crate holds both sides of that contract
//! plus a reference host: the analysis pipeline, the control registry, the
//! lifecycle runtime and the dynamic library loader.

pub mod analysis;
pub mod audio;
pub mod capability;
pub mod config;
pub mod error;
pub mod host;
pub mod loader;
pub mod plugin;
pub mod render;
pub mod runtime;
pub mod ui;

pub use analysis::{
    AnalysisBuffer, AnalysisEngine, AnalysisFrame, Channel, ChannelFeatures, Chromagram,
    PITCH_CLASSES,
};
pub use audio::{AnalysisHandle, AudioEngine, Signal, SignalGenerator};
pub use capability::{AudioFeature, Capabilities};
pub use config::{AnalysisConfig, AudioConfig, HostConfig, HostPolicy, PluginConfig, UiConfig};
pub use error::{BobError, RegistrationError, Result};
pub use host::{CallPhase, Host, HostBinding, HostContext};
pub use loader::{DiscoveredModule, ModuleCatalog, ModuleFactory, ModuleSource, VisualizationModule};
pub use plugin::{
    PluginInstance, PluginMetadata, Visualization, VisualizationEntry, VisualizationExport,
    ABI_VERSION, ENTRY_SYMBOL,
};
pub use render::{Canvas, DrawCommand, Point, RecordingCanvas, Rect, Rgba};
pub use runtime::{PluginState, Runtime};
pub use ui::{ControlHandle, ControlInfo, ControlKind, ControlRegistry, ControlValue, InstanceId};
