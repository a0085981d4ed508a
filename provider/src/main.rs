//! Reconciliation entry-point: answers orchestrator requests read from stdin.
//!
//! Stdout carries responses only; logs go to stderr.

use std::ffi::OsString;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use mockable::DefaultEnv;
use ortho_config::OrthoConfig;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

use provider::config::RuntimeSettings;
use provider::domain::ReconcilerOptions;
use provider::inbound::plugin::{DebugSwitch, Plugin};
use provider::outbound::privx::PrivxConnector;

/// Declarative reconciliation of PrivX objects.
#[derive(Debug, Parser)]
#[command(name = "privx-reconcile", version)]
struct Cli {
    /// Handle a single request and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    // Settings come from the environment only; the command line belongs to clap.
    let settings = RuntimeSettings::load_from_iter([OsString::from("privx-reconcile")])
        .wrap_err("loading runtime settings")?;
    let debug_switch = init_tracing(settings.json_logs);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; abandoning pending waits");
            on_signal.cancel();
        }
    });

    let options = ReconcilerOptions {
        key_poll: settings.key_poll(),
        cancel,
    };
    let connector = Arc::new(PrivxConnector::new(settings.request_timeout()));
    let mut plugin =
        Plugin::new(connector, DefaultEnv::new(), options).with_debug_switch(debug_switch);

    info!(once = cli.once, "waiting for requests");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await.wrap_err("reading request")? {
        if line.trim().is_empty() {
            continue;
        }
        let response = plugin.handle_line(&line).await;
        let mut encoded = serde_json::to_vec(&response).wrap_err("encoding response")?;
        encoded.push(b'\n');
        stdout.write_all(&encoded).await.wrap_err("writing response")?;
        stdout.flush().await.wrap_err("flushing response")?;
        if cli.once {
            break;
        }
    }
    Ok(())
}

fn init_tracing(json: bool) -> DebugSwitch {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, handle) = reload::Layer::<EnvFilter, Registry>::new(filter);
    let layer = fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);
    let init = if json {
        registry.with(layer.json()).try_init()
    } else {
        registry.with(layer).try_init()
    };
    if let Err(e) = init {
        warn!(error = %e, "tracing init failed");
    }

    Box::new(move |debug| {
        if debug {
            if let Err(e) = handle.reload(EnvFilter::new("debug")) {
                warn!(error = %e, "could not raise log level");
            }
        }
    })
}
