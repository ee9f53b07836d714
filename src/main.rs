use anyhow::{bail, Context, Result};
use log::{error, info, warn};
use serde_json::json;
use std::env;
use std::time::Duration;
use tokio::sync::mpsc;
use winsvc_bridge::{
    Config, ServiceConfigOptions, ServiceHandler, ServiceManager, ServiceRuntime, StartType,
    StateFilter, StopAction, TypeFilter,
};

const DEFAULT_SERVICE_NAME: &str = "ABCDEF";

fn print_help(program: &str) {
    println!("svcctl - Windows service control and service runtime demo");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("\nUsage: {} [OPTIONS] <COMMAND>\n", program);
    println!("Commands:");
    println!("  names             List names of active win32 services");
    println!("  enumerate         Show status of active win32 services");
    println!("  create [binary]   Register the service (defaults to this executable with `run`)");
    println!("  remove            Mark the service for deletion");
    println!("  status            Show configuration and status of the service");
    println!("  start             Start the service and wait until it is running");
    println!("  stop              Stop the service and wait until it is stopped");
    println!("  restart           Stop, then start the service");
    println!("  enable            Set the service to start automatically");
    println!("  disable           Disable the service");
    println!("  run               Run this process as the service (used by the SCM)");
    println!("\nOptions:");
    println!("  --name <name>     Service name (default: {})", DEFAULT_SERVICE_NAME);
    println!("  --debug           Enable debug logging");
    println!("  --help, -h        Show this help message");
    println!("  --version, -v     Show version information");
    println!("\nEnvironment Variables:");
    println!("  WINSVC_BRIDGE_CONFIG=<path>          JSON configuration file");
    println!("  WINSVC_POLL_INTERVAL_MS=<ms>         Status poll interval while waiting");
    println!("  WINSVC_TRANSITION_TIMEOUT_SECS=<s>   Start/stop wait timeout");
    println!("  WINSVC_EVENT_QUEUE_CAPACITY=<n>      Runtime event queue capacity");
    println!("  RUST_LOG=<level>                     Set log level (error|warn|info|debug)");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) || args.contains(&"-v".to_string()) {
        println!("svcctl {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    if args.contains(&"--help".to_string()) || args.contains(&"-h".to_string()) {
        print_help(&args[0]);
        return Ok(());
    }

    let config = Config::load()?;
    let debug_mode = args.contains(&"--debug".to_string());
    let default_level = if debug_mode { "debug" } else { config.log_level.as_str() };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mut name = DEFAULT_SERVICE_NAME.to_string();
    let mut positional = Vec::new();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--name" if i + 1 < args.len() => {
                name = args[i + 1].clone();
                i += 1;
            }
            "--name" => bail!("--name requires a value"),
            "--debug" => {}
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    let command = positional.first().map(String::as_str).unwrap_or("run");
    info!("svcctl {} for service {}", command, name);

    if command == "run" {
        return run_as_service(&name, &config).await;
    }

    let manager = ServiceManager::with_config(&config)?;
    match command {
        "names" => {
            let names = manager.names(&[TypeFilter::Win32], StateFilter::Active)?;
            println!("{}", serde_json::to_string_pretty(&names)?);
        }
        "enumerate" => {
            let services = manager.enumerate(&[TypeFilter::Win32], StateFilter::Active)?;
            println!("{}", serde_json::to_string_pretty(&services)?);
        }
        "create" => {
            let binary = match positional.get(1) {
                Some(binary) => binary.clone(),
                None => {
                    let exe = env::current_exe().context("Failed to locate svcctl executable")?;
                    format!("\"{}\" --name {} run", exe.display(), name)
                }
            };
            let options = ServiceConfigOptions::new(binary)
                .with_display_name(format!("{} Service", name));
            manager.create(&name, &options)?;
            println!("Service {} created", name);
        }
        "remove" => {
            manager.remove(&name)?;
            println!("Service {} marked for deletion", name);
        }
        "status" => {
            let report = json!({
                "config": manager.config(&name)?,
                "status": manager.status(&name)?,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "start" => manager.start_and_wait(&name).await?,
        "stop" => manager.stop_and_wait(&name).await?,
        "restart" => {
            println!("{}", manager.status(&name)?.state);
            manager.stop_and_wait(&name).await?;
            println!("{}", manager.status(&name)?.state);
            manager.start_and_wait(&name).await?;
            println!("{}", manager.status(&name)?.state);
        }
        "enable" => manager.enable(&name, StartType::AutoStart)?,
        "disable" => manager.disable(&name)?,
        other => bail!("Unknown command: {} (see --help)", other),
    }

    Ok(())
}

/// Demo service: logs its start arguments and a heartbeat until stopped.
struct DemoService {
    shutdown_tx: mpsc::Sender<()>,
}

impl ServiceHandler for DemoService {
    fn on_init(&mut self, init: winsvc_bridge::Result<Vec<String>>) -> Result<()> {
        match init {
            Ok(args) => {
                info!("Service started with arguments: {:?}", args);
                Ok(())
            }
            Err(e) => {
                error!("Could not run as a service: {}", e);
                let _ = self.shutdown_tx.try_send(());
                Err(e.into())
            }
        }
    }

    fn on_stop(&mut self) -> StopAction {
        info!("Received stop signal");
        let _ = self.shutdown_tx.try_send(());
        StopAction::Pending
    }
}

async fn run_as_service(name: &str, config: &Config) -> Result<()> {
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    let handle = ServiceRuntime::run_with_config(name, DemoService { shutdown_tx }, config)?;
    info!("Service runtime started for {}", name);

    let mut heartbeat = tokio::time::interval(Duration::from_secs(30));
    loop {
        tokio::select! {
            _ = heartbeat.tick() => info!("Still running"),
            received = shutdown_rx.recv() => {
                if received.is_none() {
                    warn!("Stop channel closed");
                }
                info!("Shutting down");
                break;
            }
        }
    }

    handle.finish(0);
    Ok(())
}
