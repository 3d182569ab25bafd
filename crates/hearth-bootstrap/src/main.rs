// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Hearth.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use clap::Parser;
use hearth_bootstrap::config::DEFAULT_CONFIG_PATH;
use hearth_bootstrap::{
    Bootstrap, BootstrapSettings, DeviceConfig, ExecRestart, HostNetwork, LogIndicator, MqttBus,
    paths_under_root,
};
use hearth_ota::{Fetcher, HttpFetcher, ImmortalFileSet, UnavailableFetcher, Updater};
use hearth_runtime::{Clock, Fault, ModuleRegistry, MonotonicClock, Runtime, Supervisor};
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "hearth", version)]
#[command(about = "Hearth device bootstrap supervisor", long_about = None)]
struct Cli {
    /// Device configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Device root that updates are installed under
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Built-in application module, overrides the configured one
    #[arg(short, long)]
    module: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    // Respects RUST_LOG
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    // Losing logs is no reason to stay down
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("hearth: logging unavailable: {e}");
    }

    // An unreadable config never stops the device, it boots on defaults and
    // keeps reporting the problem.
    let (config, standing_fault) = match DeviceConfig::load(&cli.config) {
        Ok(config) => (config, None),
        Err(e) => {
            warn!("{e}, booting with defaults");
            let fault = Fault::configuration("config_load_failed", e.to_string());
            (DeviceConfig::defaults(), Some(fault))
        }
    };

    let module = cli.module.unwrap_or_else(|| config.supervisor.module.clone());
    let registry = ModuleRegistry::with_builtins();

    info!("🚀 Starting Hearth {}", env!("CARGO_PKG_VERSION"));
    info!("📋 Configuration Summary:");
    info!("   Device: {}", config.identity.device_id);
    info!("   Namespace: {}", config.identity.namespace);
    info!(
        "   Bus: {}:{}",
        config.identity.bus.host.as_deref().unwrap_or("<unset>"),
        config.identity.bus.port
    );
    info!("   Module: {module}");
    info!("   Update root: {}", cli.root.display());

    let bus = MqttBus::new(&config.identity.bus, &config.identity.device_id);
    let runtime = Runtime::new(
        config.identity.clone(),
        config.runtime_settings(),
        Rc::new(MonotonicClock::new()),
        Box::new(HostNetwork),
        Box::new(bus),
    );
    let supervisor = Supervisor::new(
        registry.loader(&module),
        config.supervisor.quiesce_timeout(),
    );
    let fetcher: Box<dyn Fetcher> = match HttpFetcher::new() {
        Ok(fetcher) => Box::new(fetcher),
        Err(e) => {
            warn!("{e}, updates will fail until restart");
            Box::new(UnavailableFetcher::new(e.to_string()))
        }
    };

    // The running binary and its config are as immortal as the bootstrap layer
    let mut own_files = vec![cli.config.clone()];
    match std::env::current_exe() {
        Ok(exe) => own_files.push(exe),
        Err(e) => warn!("Cannot locate current executable: {e}"),
    }
    let immortal = ImmortalFileSet::default().with_names(paths_under_root(&cli.root, &own_files));
    let clock = runtime.clock();
    let updater = Updater::new(cli.root, fetcher)
        .with_immortal(immortal)
        .with_sleep(move |d| clock.sleep(d));

    let boot_faults = config
        .warnings
        .iter()
        .map(|w| Fault::configuration(w.code(), w.message.clone()))
        .collect();

    let mut bootstrap = Bootstrap::new(
        runtime,
        supervisor,
        updater,
        Box::new(LogIndicator::default()),
        Box::new(ExecRestart),
        BootstrapSettings::from(&config.supervisor),
    )
    .with_boot_faults(boot_faults);
    if let Some(fault) = standing_fault {
        bootstrap = bootstrap.with_standing_fault(fault);
    }

    bootstrap.run_forever()
}
