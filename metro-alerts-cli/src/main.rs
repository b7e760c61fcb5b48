use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use suspension_channel::logging::{init_logging, init_logging_from_env, LoggingMode};
use suspension_channel::{ChannelConfig, ConnectionState, SuspensionChannel};
use tracing::info;

mod render;

/// Metro line suspension monitor
///
/// Connects to the alert broker, subscribes to the suspension topic and
/// prints the alert state every time it changes. Unset options fall back
/// to the METRO_ALERTS_* environment variables.
#[derive(Parser, Debug)]
#[command(name = "metro-alerts")]
#[command(about = "Watch realtime metro line suspensions")]
#[command(version)]
pub struct Args {
    /// Broker WebSocket endpoint (ws:// or wss://)
    #[arg(short, long)]
    pub broker_url: Option<String>,

    /// Topic carrying suspension broadcasts
    #[arg(short, long)]
    pub topic: Option<String>,

    /// Milliseconds before an alert is cleared
    #[arg(long)]
    pub ttl_ms: Option<u64>,

    /// Broker login
    #[arg(long)]
    pub login: Option<String>,

    /// Broker passcode
    #[arg(long)]
    pub passcode: Option<String>,

    /// Print each state as a JSON line
    #[arg(long)]
    pub json: bool,

    /// Exit with an error once the connection fails
    #[arg(long)]
    pub exit_on_error: bool,

    /// Log mode (silent, development, debug, json); overrides METRO_ALERTS_LOG_MODE
    #[arg(long)]
    pub log_mode: Option<String>,
}

impl Args {
    /// Environment configuration with command-line overrides applied
    pub fn channel_config(&self) -> Result<ChannelConfig> {
        self.channel_config_with(|name| std::env::var(name).ok())
    }

    /// Layer the arguments over `lookup`, then validate the result once
    ///
    /// Variables shadowed by an argument are never read, so a stale value
    /// in the environment cannot fail a run that overrides it.
    fn channel_config_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ChannelConfig> {
        let mut config = ChannelConfig::from_lookup(|name| {
            if self.overrides(name) {
                None
            } else {
                lookup(name)
            }
        })
        .context("Invalid METRO_ALERTS_* environment")?;

        if let Some(url) = &self.broker_url {
            config.broker_url = url.clone();
        }
        if let Some(topic) = &self.topic {
            config.topic = topic.clone();
        }
        if let Some(ttl) = self.ttl_ms {
            config.alert_ttl = Duration::from_millis(ttl);
        }
        if let Some(login) = &self.login {
            config.login = Some(login.clone());
        }
        if let Some(passcode) = &self.passcode {
            config.passcode = Some(passcode.clone());
        }

        config.validate().context("Invalid channel configuration")?;
        Ok(config)
    }

    fn overrides(&self, name: &str) -> bool {
        match name {
            "METRO_ALERTS_BROKER_URL" => self.broker_url.is_some(),
            "METRO_ALERTS_TOPIC" => self.topic.is_some(),
            "METRO_ALERTS_TTL_MS" => self.ttl_ms.is_some(),
            "METRO_ALERTS_LOGIN" => self.login.is_some(),
            "METRO_ALERTS_PASSCODE" => self.passcode.is_some(),
            _ => false,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    match &args.log_mode {
        Some(mode) => init_logging(LoggingMode::from_name(mode)),
        None => init_logging_from_env(),
    }
    .context("Failed to initialize logging")?;

    let config = args.channel_config()?;
    info!("Watching {} on {}", config.topic, config.broker_url);

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
        .context("Failed to install Ctrl-C handler")?;

    let channel =
        SuspensionChannel::connect_stomp(config).context("Failed to start suspension channel")?;
    let changes = channel.changes();
    channel.connect();

    let mut failed = false;
    while running.load(Ordering::SeqCst) {
        let Some(change) = changes.recv_timeout(Duration::from_millis(250)) else {
            continue;
        };

        if args.json {
            println!("{}", render::to_json(&change.state)?);
        } else {
            println!("{}", render::describe(&change.state, chrono::Utc::now()));
        }

        if args.exit_on_error && change.state.connection_state == ConnectionState::Error {
            failed = true;
            break;
        }
    }

    info!("Shutting down");
    channel.disconnect();
    channel.shutdown();

    if failed {
        anyhow::bail!("Connection to the alert broker failed");
    }
    Ok(())
}
