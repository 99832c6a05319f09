use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};

use osc_panel::registry::banner;
use osc_panel::{
    ChannelRegistry, Config, DispatchLoop, LoopSettings, Mcp3008Bus, Overrides, STANDARD_LAYOUT,
    UdpOscClient,
};

#[derive(Parser, Debug)]
#[command(name = "osc-panel", version, about = "MCP3008 control surface to OSC bridge")]
struct Cli {
    /// JSON config file; missing fields fall back to defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// OSC receiver host
    #[arg(long)]
    host: Option<String>,

    /// OSC receiver UDP port
    #[arg(long)]
    port: Option<u16>,

    /// Raw value above which a digital input reads as on
    #[arg(long)]
    threshold: Option<u16>,

    #[arg(long)]
    debounce_ms: Option<u64>,

    #[arg(long)]
    loop_delay_ms: Option<u64>,

    /// Write the effective configuration to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,
}

fn main() -> ExitCode {
    setup_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn setup_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            port: self.port,
            digital_threshold: self.threshold,
            debounce_ms: self.debounce_ms,
            loop_delay_ms: self.loop_delay_ms,
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_or_default(cli.config.as_deref()).with_context(|| {
        let path = cli.config.as_deref().unwrap_or(Path::new(""));
        format!("Failed to load config from {}", path.display())
    })?;
    config.apply_overrides(&cli.overrides());
    Ok(config)
}

/// The returned flag stays set until the first Ctrl-C.
fn install_interrupt_handler() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
        .context("Failed to install interrupt handler")?;
    Ok(running)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    if let Some(path) = &cli.write_config {
        config
            .save(path)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        info!(path = %path.display(), "config written");
        return Ok(());
    }

    // before bus bring-up: an early Ctrl-C must still end in a clean exit
    let running = install_interrupt_handler()?;

    let sender = UdpOscClient::connect(&config.host, config.port)
        .context("Failed to create OSC client")?;
    let bus = Mcp3008Bus::new(config.spi_clock_hz, &config.chip_select_pins)
        .context("Failed to initialize MCP3008 bus")?;
    let registry = ChannelRegistry::standard(&bus).context("Failed to bind panel channels")?;

    println!("Starting MCP3008 OSC controller...");
    println!("Layout:");
    for line in banner(&STANDARD_LAYOUT, &config.chip_select_pins) {
        println!("  {}", line);
    }

    let mut dispatch = DispatchLoop::new(bus, sender, registry, LoopSettings::from(&config));
    dispatch.run(&running);

    info!("Controller stopped.");
    Ok(())
}
