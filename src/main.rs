//! Codegate - terminal access gate
//!
//! Asks for a 4-character access code, validates it against the shipped
//! allow-list with a per-code device limit, and announces the destination
//! URL once access is granted. Sessions expire after a period of
//! inactivity; the remembered code survives and is prefilled on the next
//! attempt.

use anyhow::Result;
use clap::Parser;
use codegate_core::{AccessCode, GateConfig};
use codegate_registry::{
    DeviceRegistry, GateStorage, InactivityMonitor, RegistrationInfo, RegistryError, SessionExpiry,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

/// Codegate - access codes with a per-code device limit
#[derive(Parser, Debug)]
#[command(name = "codegate")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the storage file (default: ~/.config/codegate/gate.json)
    #[arg(short, long)]
    storage: Option<PathBuf>,

    /// Keep all state in memory, nothing on disk
    #[arg(long)]
    ephemeral: bool,

    /// Destination URL announced on success
    #[arg(short, long)]
    url: Option<String>,

    /// Inactivity timeout in seconds
    #[arg(short, long, default_value = "600")]
    timeout: u64,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    info!("Codegate v{}", env!("CARGO_PKG_VERSION"));

    let mut config = GateConfig::new().with_inactivity_timeout(Duration::from_secs(args.timeout));
    if let Some(url) = args.url {
        config = config.with_destination_url(url);
    }

    let storage = Arc::new(if args.ephemeral {
        debug!("Using in-memory storage");
        GateStorage::in_memory()
    } else if let Some(path) = args.storage {
        GateStorage::with_path(path)?
    } else {
        GateStorage::open()?
    });

    let registry = DeviceRegistry::new(config.clone(), storage.clone());

    // A still-active session skips the prompt entirely
    if let Some(redirect) = registry.check_existing_session().await? {
        println!("✅ Sesión activa, redirigiendo...");
        tokio::time::sleep(redirect.delay).await;
        println!("→ {}", redirect.url);
        return Ok(());
    }

    // Prefill: show the remembered code and its device summary
    if let Some(saved) = storage.current_code().await {
        println!("Código guardado: {saved}");
        if let Ok(code) = saved.parse::<AccessCode>() {
            print_device_info(&registry.registration_info(&code).await?);
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    'gate: loop {
        let monitor = InactivityMonitor::new(config.inactivity_timeout);
        let activity = monitor.handle();
        let mut expiry = Box::pin(monitor.run(storage.clone()));

        println!("Introduce el código de acceso (4 caracteres):");

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        // stdin closed
                        return Ok(());
                    };
                    activity.record_activity();

                    let entered = AccessCode::sanitize(&line);
                    if entered.is_empty() {
                        continue;
                    }
                    let code: AccessCode = match entered.parse() {
                        Ok(code) => code,
                        Err(e) => {
                            println!("❌ {e}");
                            continue;
                        }
                    };

                    print_device_info(&registry.registration_info(&code).await?);
                    println!("🔒 Verificando código...");

                    match registry.validate_access_code(&code).await {
                        Ok(validation) => {
                            println!("✅ Acceso concedido...");
                            if validation.is_new_device {
                                debug!("Device registered for the first time");
                            }
                            tokio::time::sleep(config.grant_redirect_delay).await;
                            println!("→ {}", config.destination_url);
                            return Ok(());
                        }
                        Err(e @ (RegistryError::InvalidCode | RegistryError::DeviceLimitReached)) => {
                            println!("❌ {e}");
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                expired = &mut expiry => {
                    if expired == SessionExpiry::CodeRetained {
                        println!("⏳ Sesión expirada por inactividad");
                    }
                    continue 'gate;
                }
            }
        }
    }
}

/// Mirror of the entry form's device-info area
fn print_device_info(info: &RegistrationInfo) {
    if info.registered_devices == 0 {
        return;
    }

    if info.is_registered {
        println!(
            "✅ Este dispositivo está registrado ({}/{})",
            info.registered_devices, info.max_devices
        );
    } else if info.available_slots > 0 {
        println!(
            "⚠️ Este código tiene {} de {} dispositivos (puedes registrar {} más)",
            info.registered_devices, info.max_devices, info.available_slots
        );
    } else {
        println!(
            "❌ Límite de dispositivos alcanzado ({} dispositivos registrados)",
            info.max_devices
        );
    }
}
