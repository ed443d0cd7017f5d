use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use libloading::Library;

use crate::{
    BobError, HostConfig, PluginMetadata, Result, Visualization, VisualizationEntry,
    VisualizationExport, ABI_VERSION, ENTRY_SYMBOL,
};

/// Where a module came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSource {
    Builtin(String),
    Library(PathBuf),
}

impl fmt::Display for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleSource::Builtin(name) => write!(f, "builtin:{name}"),
            ModuleSource::Library(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A visualisation module ready to be described and instantiated.
pub struct VisualizationModule {
    source: ModuleSource,
    // Declared before `_library` so the module is dropped first.
    module: Box<dyn Visualization>,
    _library: Option<Arc<Library>>,
}

impl VisualizationModule {
    /// Wraps a module linked into the host binary.
    pub fn builtin(name: impl Into<String>, module: Box<dyn Visualization>) -> Self {
        Self {
            source: ModuleSource::Builtin(name.into()),
            module,
            _library: None,
        }
    }

    /// Opens a visualisation library and takes its module.
    ///
    /// # Safety
    ///
    /// Loading a library runs its initialisers, and the entry point is
    /// trusted to return a [`VisualizationExport`] built by
    /// [`declare_visualization!`](crate::declare_visualization) with a
    /// compatible toolchain.
    pub unsafe fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let library = Library::new(&path)?;

        let raw = {
            let entry = library
                .get::<VisualizationEntry>(ENTRY_SYMBOL.as_bytes())
                .map_err(|_| BobError::MissingEntryPoint {
                    path: path.clone(),
                    symbol: ENTRY_SYMBOL,
                })?;
            entry()
        };

        let module = Self::take_export(raw, &path)?;
        tracing::info!(?path, "loaded visualisation library");
        Ok(Self {
            source: ModuleSource::Library(path),
            module,
            _library: Some(Arc::new(library)),
        })
    }

    /// Checks what an entry point returned and takes ownership of its module.
    ///
    /// # Safety
    ///
    /// `raw` is null or points to an export whose leading `abi_version` is
    /// readable.
    unsafe fn take_export(
        raw: *mut VisualizationExport,
        path: &Path,
    ) -> Result<Box<dyn Visualization>> {
        if raw.is_null() {
            return Err(BobError::msg(format!(
                "plugin {path:?} returned no visualisation"
            )));
        }

        let found = (*raw).abi_version;
        if found != ABI_VERSION {
            // The export's layout is unknown, so it is leaked rather than dropped.
            return Err(BobError::AbiMismatch {
                path: path.to_path_buf(),
                expected: ABI_VERSION,
                found,
            });
        }

        Ok(VisualizationExport::from_raw(raw).into_module())
    }

    pub fn source(&self) -> &ModuleSource {
        &self.source
    }

    pub fn describe(&self) -> PluginMetadata {
        self.module.describe()
    }

    pub(crate) fn visualization(&self) -> &dyn Visualization {
        self.module.as_ref()
    }
}

impl fmt::Debug for VisualizationModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisualizationModule")
            .field("source", &self.source)
            .finish()
    }
}

/// Constructor of a built-in module.
pub type ModuleFactory = fn() -> Box<dyn Visualization>;

/// Result of probing one library during discovery.
#[derive(Debug)]
pub struct DiscoveredModule {
    pub path: PathBuf,
    pub metadata: Result<PluginMetadata>,
}

/// Built-in modules plus the directories searched for libraries.
#[derive(Debug, Default)]
pub struct ModuleCatalog {
    builtins: BTreeMap<String, ModuleFactory>,
    search_paths: Vec<PathBuf>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &HostConfig) -> Self {
        Self {
            builtins: BTreeMap::new(),
            search_paths: config.plugins.search_paths.clone(),
        }
    }

    pub fn register_builtin(&mut self, name: impl Into<String>, factory: ModuleFactory) {
        self.builtins.insert(name.into(), factory);
    }

    pub fn builtin_names(&self) -> impl Iterator<Item = &str> {
        self.builtins.keys().map(String::as_str)
    }

    pub fn has_builtin(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    pub fn instantiate(&self, name: &str) -> Result<VisualizationModule> {
        let factory = self
            .builtins
            .get(name)
            .ok_or_else(|| BobError::UnknownModule(name.to_string()))?;
        Ok(VisualizationModule::builtin(name, factory()))
    }

    /// Platform libraries found in the search paths, sorted by path.
    pub fn library_paths(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for dir in &self.search_paths {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::warn!(?dir, %err, "skipping plugin search path");
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let is_library = path
                    .extension()
                    .map(|ext| ext == std::env::consts::DLL_EXTENSION)
                    .unwrap_or(false);
                if is_library && path.is_file() {
                    found.push(path);
                }
            }
        }
        found.sort();
        found
    }

    /// Loads every library in the search paths and describes it.
    ///
    /// Libraries that fail to load are reported, not fatal.
    ///
    /// # Safety
    ///
    /// See [`VisualizationModule::load`].
    pub unsafe fn discover(&self) -> Vec<DiscoveredModule> {
        self.library_paths()
            .into_iter()
            .map(|path| {
                let metadata = VisualizationModule::load(&path).map(|module| module.describe());
                if let Err(err) = &metadata {
                    tracing::warn!(?path, %err, "ignoring visualisation library");
                }
                DiscoveredModule { path, metadata }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Host, PluginInstance};

    struct Blank;

    impl Visualization for Blank {
        fn describe(&self) -> PluginMetadata {
            PluginMetadata::new("Blank", "Draws nothing")
        }

        fn create(&self, _host: &mut dyn Host) -> PluginInstance {
            PluginInstance::empty()
        }

        fn update(&self, _instance: &mut PluginInstance, _host: &mut dyn Host) {}
    }

    fn blank() -> Box<dyn Visualization> {
        Box::new(Blank)
    }

    #[test]
    fn instantiates_builtins_by_name() {
        let mut catalog = ModuleCatalog::new();
        catalog.register_builtin("blank", blank);

        let module = catalog.instantiate("blank").unwrap();
        assert_eq!(module.source(), &ModuleSource::Builtin("blank".to_string()));
        assert_eq!(module.describe().name, "Blank");
        assert_eq!(catalog.builtin_names().collect::<Vec<_>>(), ["blank"]);
    }

    #[test]
    fn unknown_builtin_is_an_error() {
        let catalog = ModuleCatalog::new();
        assert!(matches!(
            catalog.instantiate("nope"),
            Err(BobError::UnknownModule(_))
        ));
    }

    #[test]
    fn missing_library_is_a_load_error() {
        let result = unsafe { VisualizationModule::load("/nonexistent/libnothing.so") };
        assert!(matches!(result, Err(BobError::LibraryLoad(_))));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn library_without_entry_point_is_declined() {
        let result = unsafe { VisualizationModule::load("libm.so.6") };
        assert!(matches!(
            result,
            Err(BobError::MissingEntryPoint {
                symbol: ENTRY_SYMBOL,
                ..
            })
        ));
    }

    crate::declare_visualization!(Blank);

    #[test]
    fn declared_entry_point_yields_the_module() {
        let raw = bob_visualization_entry();
        let module = unsafe { VisualizationModule::take_export(raw, Path::new("blank.so")) };
        assert_eq!(module.unwrap().describe().name, "Blank");
    }

    #[test]
    fn foreign_abi_version_is_declined() {
        let raw = VisualizationExport::into_raw(blank());
        unsafe { (*raw).abi_version = ABI_VERSION + 1 };

        let result = unsafe { VisualizationModule::take_export(raw, Path::new("old.so")) };
        assert!(matches!(
            result,
            Err(BobError::AbiMismatch { expected: ABI_VERSION, found, .. })
                if found == ABI_VERSION + 1
        ));
    }

    #[test]
    fn null_export_is_declined() {
        let result =
            unsafe { VisualizationModule::take_export(std::ptr::null_mut(), Path::new("x.so")) };
        assert!(matches!(result, Err(BobError::Message(_))));
    }

    #[test]
    fn export_round_trips_through_raw_pointer() {
        let raw = VisualizationExport::into_raw(blank());
        let export = unsafe { VisualizationExport::from_raw(raw) };
        assert_eq!(export.abi_version, ABI_VERSION);
        assert_eq!(export.into_module().describe().name, "Blank");
    }

    #[test]
    fn missing_search_paths_are_skipped() {
        let mut config = HostConfig::default();
        config.plugins.search_paths = vec![PathBuf::from("/nonexistent/bob-plugins")];
        let catalog = ModuleCatalog::from_config(&config);
        assert!(catalog.library_paths().is_empty());
    }
}
