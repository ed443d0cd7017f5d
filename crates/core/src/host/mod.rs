//! The host capability table and the runtime's implementation of it.

use crate::{
    capability::FeatureKind,
    render::Canvas,
    ui::{ControlRegistry, InstanceId},
    AnalysisBuffer, AnalysisFrame, AudioFeature, BobError, Capabilities, Channel, Chromagram,
    ControlHandle, Result,
};

/// Operations the host offers to a plugin instance.
///
/// Passed explicitly into every lifecycle call after `describe`. Buffers
/// borrow from the host and cannot outlive the call that produced them.
pub trait Host {
    fn time_domain(&self, channel: Channel) -> Result<AnalysisBuffer<'_>>;
    fn frequency_domain(&self, channel: Channel) -> Result<AnalysisBuffer<'_>>;
    /// Fills `out` with the pitch-class energies of `channel`.
    fn chromagram(&self, channel: Channel, out: &mut Chromagram) -> Result<()>;
    fn pulse(&self, channel: Channel) -> Result<AnalysisBuffer<'_>>;
    fn tempo(&self, channel: Channel) -> Result<f32>;

    /// Only valid during `create`.
    fn register_float_slider(
        &mut self,
        name: &str,
        min: f32,
        max: f32,
        default: f32,
    ) -> Result<ControlHandle>;
    /// Only valid during `create`.
    fn register_checkbox(&mut self, name: &str, default: bool) -> Result<ControlHandle>;
    /// True once after each external change of the control.
    fn is_updated(&mut self, handle: ControlHandle) -> Result<bool>;
    fn float_value(&self, handle: ControlHandle) -> Result<f32>;
    fn bool_value(&self, handle: ControlHandle) -> Result<bool>;

    /// Render target of the current frame.
    fn canvas(&mut self) -> &mut dyn Canvas;
}

/// Lifecycle call a [`HostContext`] serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Create,
    Update,
    Destroy,
}

/// What the host fixes about a plugin when it instantiates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostBinding {
    pub instance: InstanceId,
    pub capabilities: Capabilities,
    pub strict_capabilities: bool,
}

/// Runtime implementation of [`Host`] for one call into one instance.
pub struct HostContext<'a> {
    binding: HostBinding,
    phase: CallPhase,
    frame: &'a AnalysisFrame,
    controls: &'a mut ControlRegistry,
    canvas: &'a mut dyn Canvas,
}

impl<'a> HostContext<'a> {
    pub fn new(
        binding: HostBinding,
        phase: CallPhase,
        frame: &'a AnalysisFrame,
        controls: &'a mut ControlRegistry,
        canvas: &'a mut dyn Canvas,
    ) -> Self {
        Self {
            binding,
            phase,
            frame,
            controls,
            canvas,
        }
    }

    fn check_declared(&self, kind: FeatureKind, channel: Channel) -> Result<()> {
        let feature = AudioFeature::for_query(kind, channel);
        if self.binding.capabilities.contains(feature) {
            return Ok(());
        }
        if self.binding.strict_capabilities {
            return Err(BobError::FeatureNotDeclared { feature });
        }
        tracing::trace!(
            ?feature,
            instance = ?self.binding.instance,
            "query outside declared capabilities"
        );
        Ok(())
    }

    fn check_registration(&self) -> Result<()> {
        if self.phase == CallPhase::Create {
            Ok(())
        } else {
            Err(BobError::RegistrationClosed)
        }
    }
}

impl Host for HostContext<'_> {
    fn time_domain(&self, channel: Channel) -> Result<AnalysisBuffer<'_>> {
        self.check_declared(FeatureKind::TimeDomain, channel)?;
        Ok(AnalysisBuffer::new(&self.frame.channel(channel).time_domain))
    }

    fn frequency_domain(&self, channel: Channel) -> Result<AnalysisBuffer<'_>> {
        self.check_declared(FeatureKind::FrequencyDomain, channel)?;
        Ok(AnalysisBuffer::new(&self.frame.channel(channel).frequency_domain))
    }

    fn chromagram(&self, channel: Channel, out: &mut Chromagram) -> Result<()> {
        self.check_declared(FeatureKind::Chromagram, channel)?;
        *out = self.frame.channel(channel).chromagram;
        Ok(())
    }

    fn pulse(&self, channel: Channel) -> Result<AnalysisBuffer<'_>> {
        self.check_declared(FeatureKind::Pulse, channel)?;
        Ok(AnalysisBuffer::new(&self.frame.channel(channel).pulse))
    }

    fn tempo(&self, channel: Channel) -> Result<f32> {
        self.check_declared(FeatureKind::Tempo, channel)?;
        Ok(self.frame.channel(channel).tempo)
    }

    fn register_float_slider(
        &mut self,
        name: &str,
        min: f32,
        max: f32,
        default: f32,
    ) -> Result<ControlHandle> {
        self.check_registration()?;
        self.controls
            .register_float_slider(self.binding.instance, name, min, max, default)
    }

    fn register_checkbox(&mut self, name: &str, default: bool) -> Result<ControlHandle> {
        self.check_registration()?;
        self.controls
            .register_checkbox(self.binding.instance, name, default)
    }

    fn is_updated(&mut self, handle: ControlHandle) -> Result<bool> {
        self.controls.take_updated(self.binding.instance, handle)
    }

    fn float_value(&self, handle: ControlHandle) -> Result<f32> {
        self.controls.float_value(self.binding.instance, handle)
    }

    fn bool_value(&self, handle: ControlHandle) -> Result<bool> {
        self.controls.bool_value(self.binding.instance, handle)
    }

    fn canvas(&mut self) -> &mut dyn Canvas {
        &mut *self.canvas
    }
}
