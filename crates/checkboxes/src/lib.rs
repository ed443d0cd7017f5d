//! Background colour from three checkboxes.
//!
//! Mostly useful for checking that switching between visualisations works:
//! it reads no audio at all.

use bob_core::{
    Capabilities, ControlHandle, Host, PluginInstance, PluginMetadata, Rgba, Visualization,
};

pub struct Checkboxes;

struct State {
    red: Option<ControlHandle>,
    green: Option<ControlHandle>,
    blue: Option<ControlHandle>,
}

impl Visualization for Checkboxes {
    fn describe(&self) -> PluginMetadata {
        PluginMetadata::new(
            "Checkboxes",
            "Lets you set the background colour using checkboxes.",
        )
        .with_capabilities(Capabilities::empty())
    }

    fn create(&self, host: &mut dyn Host) -> PluginInstance {
        PluginInstance::new(State {
            red: checkbox(host, "Red"),
            green: checkbox(host, "Green"),
            blue: checkbox(host, "Blue"),
        })
    }

    fn update(&self, instance: &mut PluginInstance, host: &mut dyn Host) {
        let Some(state) = instance.downcast_ref::<State>() else {
            return;
        };

        let color = Rgba::rgb(
            channel(host, state.red),
            channel(host, state.green),
            channel(host, state.blue),
        );
        host.canvas().clear(color);
    }
}

fn checkbox(host: &mut dyn Host, name: &str) -> Option<ControlHandle> {
    host.register_checkbox(name, false)
        .map_err(|err| tracing::warn!(name, %err, "checkbox unavailable"))
        .ok()
}

fn channel(host: &dyn Host, handle: Option<ControlHandle>) -> f32 {
    match handle.map(|handle| host.bool_value(handle)) {
        Some(Ok(true)) => 1.0,
        _ => 0.0,
    }
}

#[cfg(not(feature = "builtin"))]
bob_core::declare_visualization!(Checkboxes);
