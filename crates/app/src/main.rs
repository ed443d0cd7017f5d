use std::path::PathBuf;

use bob_core::{
    AudioEngine, BobError, ControlKind, HostConfig, ModuleCatalog, Runtime, Signal,
    SignalGenerator, VisualizationModule,
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

fn main() -> bob_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => HostConfig::load(path)?,
        None => HostConfig::default(),
    };
    let catalog = catalog(&config);

    match cli.command {
        Commands::List => run_list(&catalog),
        Commands::Describe { module } => run_describe(&catalog, &module),
        Commands::Run {
            module,
            frames,
            signal,
            frequency,
            bpm,
            toggle,
        } => {
            let signal = match signal {
                SignalKind::Silence => Signal::Silence,
                SignalKind::Sine => Signal::Sine { frequency },
                SignalKind::Clicks => Signal::Clicks { bpm },
            };
            run_visualisation(&catalog, config, &module, frames, signal, &toggle)
        }
    }
}

fn catalog(config: &HostConfig) -> ModuleCatalog {
    let mut catalog = ModuleCatalog::from_config(config);
    catalog.register_builtin("checkboxes", || Box::new(bob_checkboxes::Checkboxes));
    catalog.register_builtin("scope", || Box::new(bob_scope::Scope));
    catalog
}

fn open_module(catalog: &ModuleCatalog, module: &str) -> bob_core::Result<VisualizationModule> {
    if catalog.has_builtin(module) {
        return catalog.instantiate(module);
    }
    // SAFETY: the user asked for this library by path.
    unsafe { VisualizationModule::load(module) }
}

fn run_list(catalog: &ModuleCatalog) -> bob_core::Result<()> {
    for name in catalog.builtin_names() {
        let metadata = catalog.instantiate(name)?.describe();
        println!("{name:<12} {}  {:?}", metadata.name, metadata.capabilities);
    }

    // SAFETY: libraries in configured search paths are trusted plugins.
    for found in unsafe { catalog.discover() } {
        match found.metadata {
            Ok(metadata) => println!(
                "{}  {}  {:?}",
                found.path.display(),
                metadata.name,
                metadata.capabilities
            ),
            Err(err) => println!("{}  (failed: {err})", found.path.display()),
        }
    }
    Ok(())
}

fn run_describe(catalog: &ModuleCatalog, module: &str) -> bob_core::Result<()> {
    let metadata = open_module(catalog, module)?.describe();
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}

fn run_visualisation(
    catalog: &ModuleCatalog,
    config: HostConfig,
    module: &str,
    frames: u64,
    signal: Signal,
    settings: &[String],
) -> bob_core::Result<()> {
    tracing::info!(module, frames, ?signal, "starting headless run");

    let audio = AudioEngine::new(&config);
    let analysis = audio.start()?;
    let block_size = config.audio.block_size;
    let mut generator = SignalGenerator::new(signal, audio.sample_rate());
    let mut runtime = Runtime::new(config);

    runtime.load(open_module(catalog, module)?)?;
    runtime.create()?;
    for setting in settings {
        apply_setting(&mut runtime, setting)?;
    }

    for _ in 0..frames {
        let block = generator.next_block(block_size);
        audio.push_stereo(&block, runtime.capabilities())?;
        analysis.with_frame(|frame| runtime.update(frame))??;
    }

    let canvas = runtime.canvas();
    tracing::info!(
        frames = runtime.frames(),
        commands = canvas.commands().len(),
        clear = ?canvas.clear_color(),
        "last frame"
    );
    runtime.destroy()
}

/// Applies a `NAME=VALUE` control setting as if the user had changed it.
fn apply_setting(runtime: &mut Runtime, setting: &str) -> bob_core::Result<()> {
    let (name, value) = setting
        .split_once('=')
        .ok_or_else(|| BobError::msg(format!("expected NAME=VALUE, got `{setting}`")))?;
    let control = runtime
        .controls()
        .into_iter()
        .find(|control| control.name == name)
        .ok_or_else(|| BobError::msg(format!("no control named `{name}`")))?;

    match control.kind {
        ControlKind::Checkbox => {
            let value = value
                .parse::<bool>()
                .map_err(|_| BobError::msg(format!("`{value}` is not true/false")))?;
            runtime.set_bool(control.handle, value)
        }
        ControlKind::FloatSlider { .. } => {
            let value = value
                .parse::<f32>()
                .map_err(|_| BobError::msg(format!("`{value}` is not a number")))?;
            runtime.set_float(control.handle, value)
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Host for BoB audio visualisations", long_about = None)]
struct Cli {
    /// JSON host configuration.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List built-in visualisations and libraries in the search paths.
    List,
    /// Print the metadata of a visualisation as JSON.
    Describe {
        /// Built-in name or path to a visualisation library.
        module: String,
    },
    /// Drive a visualisation headlessly with a synthetic signal.
    Run {
        /// Built-in name or path to a visualisation library.
        module: String,
        /// Number of frames to render.
        #[arg(short, long, default_value_t = 120)]
        frames: u64,
        #[arg(short, long, value_enum, default_value_t = SignalKind::Sine)]
        signal: SignalKind,
        /// Tone frequency for `--signal sine`.
        #[arg(long, default_value_t = 440.0)]
        frequency: f32,
        /// Click rate for `--signal clicks`.
        #[arg(long, default_value_t = 120.0)]
        bpm: f32,
        /// Control values to apply after create, as NAME=VALUE.
        #[arg(long = "toggle")]
        toggle: Vec<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SignalKind {
    Silence,
    Sine,
    Clicks,
}
