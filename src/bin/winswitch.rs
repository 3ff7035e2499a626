use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use winswitch::common::config::Config;
use winswitch::common::log::init_logging;

#[derive(Parser)]
#[command(name = "winswitch", version, about = "Keyboard window and application switcher")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the switcher until interrupted.
    Run {
        /// Configuration file. Defaults to ~/.config/winswitch/config.toml.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run a single discovery pass and print the result.
    List {
        #[arg(value_enum)]
        what: ListTarget,
        #[arg(long)]
        json: bool,
    },
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Clone, Copy, ValueEnum)]
enum ListTarget {
    /// Windows of the frontmost application.
    Windows,
    /// Applications with at least one switchable window.
    Apps,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the default configuration.
    Default,
    /// Parse and validate a configuration file.
    Check { path: Option<PathBuf> },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Commands::Run { config } => run(config_path(config)?),
        Commands::List { what, json } => list(what, json),
        Commands::Config(ConfigCommand::Default) => {
            print!("{}", Config::default().to_toml_string()?);
            Ok(())
        }
        Commands::Config(ConfigCommand::Check { path }) => {
            let path = config_path(path)?;
            Config::read(&path)?;
            println!("{}: ok", path.display());
            Ok(())
        }
    }
}

fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => Config::default_path().context("cannot locate the home directory"),
    }
}

#[cfg(not(target_os = "macos"))]
fn run(_path: PathBuf) -> Result<()> { bail!("the switcher is only available on macOS") }

#[cfg(not(target_os = "macos"))]
fn list(_what: ListTarget, _json: bool) -> Result<()> {
    bail!("window discovery is only available on macOS")
}

#[cfg(target_os = "macos")]
fn list(what: ListTarget, json: bool) -> Result<()> {
    use std::sync::Arc;

    use winswitch::engine::discovery::Discovery;
    use winswitch::model::handle_cache::{AxHandleCache, IconCache};
    use winswitch::sys::app::current_pid;
    use winswitch::sys::geometry::Size;
    use winswitch::sys::macos;

    let config = Config::default();
    let platform = macos::platform();
    if !platform.ax.is_trusted() {
        bail!("accessibility access has not been granted to this process");
    }
    let s = &config.settings;
    let discovery = Discovery::new(
        platform,
        Arc::new(AxHandleCache::new("ax-handles", s.cache.ax_handles)),
        Arc::new(IconCache::new("icons", s.cache.icons)),
        Arc::new(config.title_rules()),
        Size::new(s.discovery.min_window_width, s.discovery.min_window_height),
        current_pid(),
    );
    match what {
        ListTarget::Windows => {
            let windows = discovery.discover_windows_for_foreground_app();
            if json {
                println!("{}", serde_json::to_string_pretty(&windows)?);
            } else {
                for window in &windows {
                    println!("{:>8}  {}", window.window_id.as_u32(), window.derived_label);
                }
            }
        }
        ListTarget::Apps => {
            let apps = discovery.discover_all_apps_with_windows();
            if json {
                println!("{}", serde_json::to_string_pretty(&apps)?);
            } else {
                for app in &apps {
                    println!("{:>8}  {} ({} windows)", app.pid, app.display_name, app.windows.len());
                }
            }
        }
    }
    Ok(())
}

#[cfg(target_os = "macos")]
fn run(path: PathBuf) -> Result<()> {
    use std::sync::Arc;
    use std::thread;

    use tracing::{info, warn};
    use winswitch::actor;
    use winswitch::actor::broadcast::{BroadcastEvent, Broadcaster};
    use winswitch::actor::cache_sweeper::{CacheSweeper, Caches};
    use winswitch::actor::config_watcher::ConfigWatcher;
    use winswitch::actor::permission::ensure_trusted;
    use winswitch::actor::switcher::{Event, Services, SwitcherActor};
    use winswitch::actor::worker::Worker;
    use winswitch::engine::activation::ActivationEngine;
    use winswitch::engine::discovery::Discovery;
    use winswitch::model::handle_cache::{AxHandleCache, IconCache};
    use winswitch::sys::app::current_pid;
    use winswitch::sys::geometry::Size;
    use winswitch::sys::macos::{self, EventTapHotkeys, EventTapListeners, MemoryPressureMonitor};
    use winswitch::ui::overlay::LogOverlay;

    let config = Config::read_or_default(&path)?;
    let s = config.settings.clone();
    let platform = macos::platform();
    let broadcaster = Broadcaster::new();
    let (tx, rx) = actor::channel::<Event>();

    // Subscribe before anything can publish.
    let events = tx.clone();
    broadcaster.subscribe(move |event| match event {
        BroadcastEvent::ConfigChanged { config } => events.send(Event::ConfigUpdated(config.clone())),
        BroadcastEvent::PermissionChanged { granted } => {
            events.send(Event::PermissionChanged { granted: *granted })
        }
        BroadcastEvent::SessionOpened { .. } | BroadcastEvent::SessionClosed { .. } => {}
    });

    let (trusted, _permission_poll) =
        ensure_trusted(platform.ax.clone(), s.permission.poll_interval, broadcaster.clone());
    info!(trusted, config = %path.display(), "starting");

    let caches = Caches {
        ax: Arc::new(AxHandleCache::new("ax-handles", s.cache.ax_handles)),
        icons: Arc::new(IconCache::new("icons", s.cache.icons)),
    };
    let discovery = Arc::new(Discovery::new(
        platform.clone(),
        caches.ax.clone(),
        caches.icons.clone(),
        Arc::new(config.title_rules()),
        Size::new(s.discovery.min_window_width, s.discovery.min_window_height),
        current_pid(),
    ));
    let activation = Arc::new(ActivationEngine::new(
        platform.clone(),
        caches.ax.clone(),
        s.activation.clone(),
    ));
    let worker = Worker::spawn("activation").context("starting the activation worker")?;

    let _sweeper = CacheSweeper::spawn(s.cache.sweep_interval, caches.clone(), platform.apps.clone());
    let _watcher = match ConfigWatcher::spawn(path.clone(), broadcaster.clone()) {
        Ok(watcher) => Some(watcher),
        Err(err) => {
            warn!(%err, "config changes will not be picked up");
            None
        }
    };
    let pressure = tx.clone();
    let _pressure_monitor = MemoryPressureMonitor::start(move || pressure.send(Event::MemoryPressure));

    let services = Services {
        platform,
        discovery,
        activation,
        caches,
        worker,
        overlay: Box::new(LogOverlay::new()),
        listeners: Box::new(EventTapListeners::new()),
        hotkeys: Box::new(EventTapHotkeys::new()),
        broadcaster,
    };
    let switcher = SwitcherActor::new(config, services, tx.clone(), rx);

    thread::Builder::new().name("switcher".into()).spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(err) => {
                tracing::error!(%err, "could not build the switcher runtime");
                std::process::exit(1);
            }
        };
        runtime.block_on(async move {
            let interrupt = tx.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupted");
                    interrupt.send(Event::Shutdown);
                }
            });
            switcher.run().await;
        });
        info!("switcher stopped");
        std::process::exit(0);
    })?;

    macos::run_main_loop();
    Ok(())
}
