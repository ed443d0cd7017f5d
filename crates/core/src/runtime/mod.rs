//! Drives a visualisation module through its lifecycle.
//!
//! ```text
//! Unloaded -> Described -> Created -> Running -> Destroyed
//!   load()      create()    update()*   destroy()
//! ```
//!
//! Every call takes `&mut self`, so calls into one instance are strictly
//! sequential. Out-of-order calls come back as [`BobError::Lifecycle`].

use serde::{Deserialize, Serialize};

use crate::{
    host::{CallPhase, HostBinding, HostContext},
    render::{Canvas, RecordingCanvas},
    ui::{ControlInfo, ControlRegistry, InstanceId},
    AnalysisFrame, BobError, Capabilities, ControlHandle, HostConfig, PluginInstance,
    PluginMetadata, Result, VisualizationModule,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginState {
    Unloaded,
    Described,
    Created,
    Running,
    Destroyed,
}

struct ActivePlugin {
    module: VisualizationModule,
    metadata: PluginMetadata,
    state: PluginState,
    binding: Option<HostBinding>,
    instance: Option<PluginInstance>,
    frames: u64,
}

impl ActivePlugin {
    fn require(&self, allowed: &[PluginState], operation: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(BobError::Lifecycle {
                state: self.state,
                operation,
            })
        }
    }

    fn is_live(&self) -> bool {
        matches!(self.state, PluginState::Created | PluginState::Running)
    }
}

/// The host side of the contract for one active visualisation at a time.
///
/// Owns the control registry and the render target. Analysis frames come
/// from outside, one per `update`.
pub struct Runtime<C: Canvas = RecordingCanvas> {
    config: HostConfig,
    controls: ControlRegistry,
    canvas: C,
    blank: AnalysisFrame,
    next_instance: u64,
    active: Option<ActivePlugin>,
}

impl Runtime<RecordingCanvas> {
    pub fn new(config: HostConfig) -> Self {
        Self::with_canvas(config, RecordingCanvas::new())
    }
}

impl<C: Canvas> Runtime<C> {
    pub fn with_canvas(config: HostConfig, canvas: C) -> Self {
        let controls = ControlRegistry::new(config.ui.max_controls);
        Self {
            config,
            controls,
            canvas,
            blank: AnalysisFrame::default(),
            next_instance: 1,
            active: None,
        }
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn state(&self) -> PluginState {
        self.active
            .as_ref()
            .map(|active| active.state)
            .unwrap_or(PluginState::Unloaded)
    }

    pub fn metadata(&self) -> Option<&PluginMetadata> {
        self.active.as_ref().map(|active| &active.metadata)
    }

    /// Features the analysis pipeline should compute for the active plugin.
    pub fn capabilities(&self) -> Capabilities {
        self.metadata()
            .map(|metadata| metadata.capabilities)
            .unwrap_or_default()
    }

    pub fn instance_id(&self) -> Option<InstanceId> {
        self.active
            .as_ref()
            .and_then(|active| active.binding)
            .map(|binding| binding.instance)
    }

    /// Frames rendered by the active instance.
    pub fn frames(&self) -> u64 {
        self.active.as_ref().map(|active| active.frames).unwrap_or(0)
    }

    /// `Unloaded -> Described`. Replaces the active module, destroying its
    /// instance first if it is still live.
    pub fn load(&mut self, module: VisualizationModule) -> Result<&PluginMetadata> {
        self.unload()?;

        let metadata = module.describe();
        tracing::info!(
            name = %metadata.name,
            source = %module.source(),
            capabilities = ?metadata.capabilities,
            "described visualisation"
        );
        let active = self.active.insert(ActivePlugin {
            module,
            metadata,
            state: PluginState::Described,
            binding: None,
            instance: None,
            frames: 0,
        });
        Ok(&active.metadata)
    }

    /// `Described -> Created`. The only window in which controls register.
    pub fn create(&mut self) -> Result<InstanceId> {
        let active = self.active.as_mut().ok_or(BobError::Lifecycle {
            state: PluginState::Unloaded,
            operation: "create",
        })?;
        active.require(&[PluginState::Described], "create")?;

        let instance = InstanceId(self.next_instance);
        self.next_instance += 1;
        let binding = HostBinding {
            instance,
            capabilities: active.metadata.capabilities,
            strict_capabilities: self.config.host.strict_capabilities,
        };

        let mut host = HostContext::new(
            binding,
            CallPhase::Create,
            &self.blank,
            &mut self.controls,
            &mut self.canvas,
        );
        let state = active.module.visualization().create(&mut host);

        active.binding = Some(binding);
        active.instance = Some(state);
        active.state = PluginState::Created;
        tracing::info!(name = %active.metadata.name, ?instance, "created visualisation");
        Ok(instance)
    }

    /// `Created/Running -> Running`. Draws one frame from `frame`.
    pub fn update(&mut self, frame: &AnalysisFrame) -> Result<()> {
        let active = self.active.as_mut().ok_or(BobError::Lifecycle {
            state: PluginState::Unloaded,
            operation: "update",
        })?;
        active.require(&[PluginState::Created, PluginState::Running], "update")?;

        let ActivePlugin {
            module,
            binding: Some(binding),
            instance: Some(instance),
            state,
            frames,
            ..
        } = active
        else {
            return Err(BobError::msg("live plugin has no instance"));
        };

        self.canvas.begin_frame();
        let mut host = HostContext::new(
            *binding,
            CallPhase::Update,
            frame,
            &mut self.controls,
            &mut self.canvas,
        );
        module.visualization().update(instance, &mut host);

        *state = PluginState::Running;
        *frames += 1;
        tracing::trace!(frame = *frames, "updated visualisation");
        Ok(())
    }

    /// `Created/Running -> Destroyed`. Every control handle of the instance
    /// is invalid afterwards.
    pub fn destroy(&mut self) -> Result<()> {
        let active = self.active.as_mut().ok_or(BobError::Lifecycle {
            state: PluginState::Unloaded,
            operation: "destroy",
        })?;
        active.require(&[PluginState::Created, PluginState::Running], "destroy")?;

        let (Some(binding), Some(instance)) = (active.binding, active.instance.take()) else {
            return Err(BobError::msg("live plugin has no instance"));
        };

        let mut host = HostContext::new(
            binding,
            CallPhase::Destroy,
            &self.blank,
            &mut self.controls,
            &mut self.canvas,
        );
        active.module.visualization().destroy(instance, &mut host);

        self.controls.release(binding.instance);
        active.state = PluginState::Destroyed;
        tracing::info!(
            name = %active.metadata.name,
            instance = ?binding.instance,
            frames = active.frames,
            "destroyed visualisation"
        );
        Ok(())
    }

    /// Destroys a live instance, then drops the module.
    pub fn unload(&mut self) -> Result<()> {
        if self.active.as_ref().map(ActivePlugin::is_live).unwrap_or(false) {
            self.destroy()?;
        }
        if let Some(active) = self.active.take() {
            tracing::debug!(name = %active.metadata.name, "unloaded visualisation");
        }
        Ok(())
    }

    /// Controls of the active instance, for the UI to display.
    pub fn controls(&self) -> Vec<ControlInfo> {
        self.instance_id()
            .map(|instance| self.controls.controls_of(instance))
            .unwrap_or_default()
    }

    /// Looks up a control of the active instance by name.
    pub fn control(&self, name: &str) -> Option<ControlHandle> {
        self.controls.find(self.instance_id()?, name)
    }

    /// UI-side write of a slider.
    pub fn set_float(&mut self, handle: ControlHandle, value: f32) -> Result<()> {
        self.controls.set_float(handle, value)
    }

    /// UI-side write of a checkbox.
    pub fn set_bool(&mut self, handle: ControlHandle, value: bool) -> Result<()> {
        self.controls.set_bool(handle, value)
    }
}

impl<C: Canvas> Drop for Runtime<C> {
    fn drop(&mut self) {
        if let Err(err) = self.unload() {
            tracing::warn!(%err, "failed to tear down visualisation");
        }
    }
}
