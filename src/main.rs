mod collectors;
mod config;
mod model;
mod parser;
mod state;

use clap::Parser;
use config::Config;
use state::{Snapshot, SnapshotStore, Sources};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hostsnap")]
#[command(version)]
struct Cli {
    /// YAML config; built-in defaults are used when omitted.
    #[arg(long)]
    config: Option<String>,
    #[arg(long)]
    print_default_config: bool,
    /// Collect a single snapshot, print it as JSON and exit.
    #[arg(long)]
    once: bool,
    /// Print every refreshed snapshot as a JSON line instead of a log summary.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match &cli.config {
        Some(path) => match Config::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                error!(error = %err, "failed to load configuration");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    info!(
        interval_secs = cfg.interval_secs,
        once = cli.once,
        "starting hostsnap"
    );

    let store = Arc::new(SnapshotStore::initialize(&cfg, Sources::host()).await);

    if cli.once {
        let snapshot = store.snapshot().await;
        match serde_json::to_string_pretty(snapshot.as_ref()) {
            Ok(text) => println!("{text}"),
            Err(err) => {
                error!(error = %err, "failed to encode snapshot");
                std::process::exit(1);
            }
        }
        return;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let refresh_task = {
        let store = store.clone();
        let interval = cfg.interval();
        let json = cli.json;
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The store already holds a fresh snapshot; report it first.
            report(store.snapshot().await.as_ref(), json);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        info!("refresh loop stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        store.refresh().await;
                        report(store.snapshot().await.as_ref(), json);
                    }
                }
            }
        })
    };

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to wait for Ctrl+C");
    }
    info!("received Ctrl+C, shutting down");

    let _ = shutdown_tx.send(true);
    let _ = refresh_task.await;
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report(snapshot: &Snapshot, json: bool) {
    if json {
        match serde_json::to_string(snapshot) {
            Ok(line) => println!("{line}"),
            Err(err) => error!(error = %err, "failed to encode snapshot"),
        }
        return;
    }

    let at = UNIX_EPOCH + Duration::from_secs(snapshot.collected_at_unix.max(0) as u64);
    let cpu_usage = snapshot
        .cpu_usage_percent
        .map(|pct| format!("{pct:.1}%"))
        .unwrap_or_else(|| model::UNKNOWN.to_string());
    let temperatures: Vec<i32> = snapshot.processors.iter().map(|c| c.temperature).collect();
    let interfaces: Vec<&str> = snapshot.interfaces.iter().map(|ni| ni.name()).collect();
    let uptime = format!(
        "{}d {}h {}m",
        snapshot.uptime.days, snapshot.uptime.hours, snapshot.uptime.minutes
    );

    info!(
        at = %humantime::format_rfc3339_seconds(at),
        host = %snapshot.hostname,
        uptime = %uptime,
        cpu = %cpu_usage,
        temps = ?temperatures,
        mem_used_mb = snapshot.memory_used_mb,
        mem_total_mb = snapshot.memory_total_mb,
        interfaces = ?interfaces,
        dns = ?unique_dns(&snapshot.dns),
        "snapshot"
    );
}

/// Resolver list in first-seen order without repeats.
fn unique_dns(dns: &[String]) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::with_capacity(dns.len());
    for server in dns {
        if !out.contains(&server.as_str()) {
            out.push(server);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dns_summary_drops_repeats() {
        let dns = vec![
            "1.1.1.1".to_string(),
            "8.8.8.8".to_string(),
            "1.1.1.1".to_string(),
        ];
        assert_eq!(unique_dns(&dns), vec!["1.1.1.1", "8.8.8.8"]);
    }

    #[test]
    fn published_snapshot_is_reported_as_json() {
        let published = Arc::new(Snapshot {
            hostname: "rack-12".to_string(),
            ..Snapshot::default()
        });
        report(published.as_ref(), true);
        report(published.as_ref(), false);
    }

    #[test]
    fn cli_flags_parse() {
        let cli = Cli::parse_from(["hostsnap", "--once", "--config", "/etc/hostsnap.yaml"]);
        assert!(cli.once);
        assert!(!cli.json);
        assert_eq!(cli.config.as_deref(), Some("/etc/hostsnap.yaml"));
    }
}
