//! What a visualisation module implements.
//!
//! A module is four entry points. The host calls them in a fixed order:
//!
//! 1. [`Visualization::describe`] returns metadata. It needs no host.
//! 2. [`Visualization::create`] builds the instance state and registers UI
//!    controls. Registration is valid only here.
//! 3. [`Visualization::update`] draws one frame. It runs zero or more times.
//! 4. [`Visualization::destroy`] tears the instance down, exactly once.
//!
//! The host capability table reaches the plugin as an explicit `&mut dyn
//! Host` argument on every call after `describe`.

use std::{any::Any, fmt};

use serde::{Deserialize, Serialize};

use crate::{AudioFeature, Capabilities, Host};

/// Bumped whenever [`Visualization`] or [`VisualizationExport`] change shape.
pub const ABI_VERSION: u32 = 1;

/// Symbol every dynamic visualisation library exports.
pub const ENTRY_SYMBOL: &str = "bob_visualization_entry";

/// Signature of [`ENTRY_SYMBOL`].
pub type VisualizationEntry = unsafe extern "C" fn() -> *mut VisualizationExport;

/// Static description of a visualisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub description: String,
    /// Analysis features the plugin reads. Advisory only.
    pub capabilities: Capabilities,
}

impl PluginMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            capabilities: Capabilities::empty(),
        }
    }

    pub fn with_feature(mut self, feature: AudioFeature) -> Self {
        self.capabilities.insert(feature);
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

/// Per-instance state owned by the plugin.
///
/// The host stores it between calls and hands it back untouched. An empty
/// instance is a legal result of `create` for stateless plugins.
#[derive(Default)]
pub struct PluginInstance(Option<Box<dyn Any + Send>>);

impl PluginInstance {
    pub fn new<T: Any + Send>(state: T) -> Self {
        Self(Some(Box::new(state)))
    }

    pub fn empty() -> Self {
        Self(None)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_ref()?.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.0.as_mut()?.downcast_mut::<T>()
    }

    /// Takes the state back out, if it is a `T`.
    pub fn into_inner<T: Any>(self) -> Option<T> {
        self.0?.downcast::<T>().ok().map(|state| *state)
    }
}

impl fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstance")
            .field("empty", &self.is_empty())
            .finish()
    }
}

/// Entry points of a visualisation module.
///
/// Implementations are expected to be stateless; everything that lives
/// across frames belongs in the [`PluginInstance`] returned by `create`.
/// Failures inside a plugin never cross this boundary: a plugin degrades
/// (typically by skipping drawing) and logs.
pub trait Visualization: Send + Sync {
    /// Pure metadata query. Must give the same answer on every call.
    fn describe(&self) -> PluginMetadata;

    /// Builds a new instance, registering its controls with `host`.
    fn create(&self, host: &mut dyn Host) -> PluginInstance;

    /// Draws one frame.
    fn update(&self, instance: &mut PluginInstance, host: &mut dyn Host);

    /// Releases the instance. Its control handles die with it.
    fn destroy(&self, instance: PluginInstance, host: &mut dyn Host) {
        let _ = host;
        drop(instance);
    }
}

/// What [`ENTRY_SYMBOL`] hands to the host.
#[repr(C)]
pub struct VisualizationExport {
    /// Stays the first field so the host can check it before anything else.
    pub abi_version: u32,
    module: Box<dyn Visualization>,
}

impl VisualizationExport {
    pub fn new(module: Box<dyn Visualization>) -> Self {
        Self {
            abi_version: ABI_VERSION,
            module,
        }
    }

    /// Leaks the export for the host to reclaim with [`Self::from_raw`].
    pub fn into_raw(module: Box<dyn Visualization>) -> *mut Self {
        Box::into_raw(Box::new(Self::new(module)))
    }

    /// # Safety
    ///
    /// `raw` must come from [`Self::into_raw`] built with the same
    /// [`ABI_VERSION`] and must not be reclaimed twice.
    pub unsafe fn from_raw(raw: *mut Self) -> Box<Self> {
        Box::from_raw(raw)
    }

    pub fn into_module(self) -> Box<dyn Visualization> {
        self.module
    }
}

/// Exports a visualisation from a `cdylib` crate.
///
/// ```ignore
/// struct Scope;
///
/// impl bob_core::Visualization for Scope { /* ... */ }
///
/// bob_core::declare_visualization!(Scope);
/// ```
#[macro_export]
macro_rules! declare_visualization {
    ($module:expr) => {
        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn bob_visualization_entry() -> *mut $crate::VisualizationExport {
            $crate::VisualizationExport::into_raw(::std::boxed::Box::new($module))
        }
    };
}
