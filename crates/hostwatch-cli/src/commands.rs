use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{TimeZone, Utc};
use colored::Colorize;
use hostwatch_config::{load_config, Config, CONSOLE_SINK};
use hostwatch_monitor::{
    format_elapsed, watch_storage, HostState, Monitor, PingRegistrator, PortRegistrator,
    RegistrationContext, RegistratorRepository,
};
use hostwatch_probe::{PingTarget, PortTarget, Probe, SystemPing, TcpPortChecker};
use hostwatch_sink::SinkCollector;
use tracing::{error, info};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(args).await,
        Command::Check(args) => cmd_check(args),
        Command::Status(args) => cmd_status(args).await,
        Command::Ping(args) => cmd_ping(args).await,
        Command::Port(args) => cmd_port(args).await,
    }
}

fn load(args: &ConfigArgs) -> anyhow::Result<Config> {
    load_config(&args.config).with_context(|| format!("loading {}", args.config.display()))
}

async fn cmd_run(args: ConfigArgs) -> anyhow::Result<()> {
    let config = load(&args)?;
    let sinks = Arc::new(SinkCollector::from_config(&config).await);
    let context = RegistrationContext::from_config(&config, Arc::clone(&sinks))?;

    let pings = Arc::new(Monitor::new(SystemPing::new()));
    let ports = Arc::new(Monitor::new(TcpPortChecker::new()));

    let mut registrators = RegistratorRepository::new();
    registrators.register(Arc::new(PingRegistrator::new(
        context.clone(),
        Arc::clone(&pings),
    )));
    registrators.register(Arc::new(PortRegistrator::new(context, Arc::clone(&ports))));

    let mut active = 0;
    for watch in &config.watch {
        match registrators.dispatch(watch).await {
            Ok(true) => active += 1,
            Ok(false) => {}
            Err(e) => error!(watch = %watch.describe(), error = %e, "registration failed"),
        }
    }

    println!(
        "{} Watching {} of {} targets ({} sinks). Press Ctrl-C to stop.",
        "✓".green().bold(),
        active.to_string().bold(),
        config.watch.len(),
        sinks.len()
    );
    if active == 0 {
        anyhow::bail!("nothing to watch");
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}

fn cmd_check(args: ConfigArgs) -> anyhow::Result<()> {
    let config = load(&args)?;
    println!("{} {} is valid", "✓".green().bold(), args.config.display());
    println!("  Time zone: {}", config.time_zone.cyan());
    println!("  Data dir: {}", config.data_dir.display());

    let mut sink_ids = vec![CONSOLE_SINK.to_string()];
    sink_ids.extend(config.sinks.keys().cloned());
    println!("  Sinks: {}", sink_ids.join(", "));

    println!("  Watches: {}", config.watch.len());
    for watch in &config.watch {
        let sinks: Vec<String> = watch
            .notify()
            .sink
            .iter()
            .map(|id| {
                if sink_ids.contains(id) {
                    id.normal().to_string()
                } else {
                    id.red().to_string()
                }
            })
            .collect();
        println!(
            "    {} every {}s → {}",
            watch.describe().bold(),
            watch.interval().as_secs(),
            if sinks.is_empty() {
                "no sinks".red().to_string()
            } else {
                sinks.join(", ")
            }
        );
    }
    Ok(())
}

async fn cmd_status(args: ConfigArgs) -> anyhow::Result<()> {
    let config = load(&args)?;
    let zone = config.time_zone()?;
    let now = Utc::now();

    for watch in &config.watch {
        let storage = watch_storage(&config.data_dir, watch);
        let state = HostState::open(Arc::new(storage))?;
        let presence = match state.is_alive().await? {
            Some(true) => "up".green().bold(),
            Some(false) => "down".red().bold(),
            None => "unknown".dimmed(),
        };
        let checked = state
            .checked()
            .await?
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
        let since = match checked {
            Some(at) => format!(
                "since {} ({} ago)",
                zone.format(at, "%Y-%m-%d %H:%M:%S"),
                format_elapsed((now - at).num_milliseconds())
            ),
            None => String::new(),
        };
        println!("{:<40} {} {}", watch.describe(), presence, since.dimmed());
    }
    Ok(())
}

async fn cmd_ping(args: PingArgs) -> anyhow::Result<()> {
    let ping = SystemPing::new().with_count(args.count);
    let target = PingTarget::new(&args.host).with_ip_version(args.ipv);
    let result = ping.probe(&target).await;

    if result.alive {
        let rtt = result
            .rtt_avg
            .map(|ms| format!(", avg {ms:.1} ms"))
            .unwrap_or_default();
        println!(
            "{} {} is alive ({}% loss{})",
            "✓".green().bold(),
            args.host.bold(),
            result.loss,
            rtt
        );
    } else {
        println!("{} {} is unreachable", "✗".red().bold(), args.host.bold());
    }
    Ok(())
}

async fn cmd_port(args: PortArgs) -> anyhow::Result<()> {
    let target = PortTarget::new(&args.host, args.port)
        .with_ip_version(args.ipv)
        .with_timeout(Duration::from_millis(args.timeout));
    let status = TcpPortChecker::new().probe(&target).await;

    let endpoint = format!("{}:{}", args.host, args.port);
    if status.open {
        println!("{} {} is open", "✓".green().bold(), endpoint.bold());
    } else {
        println!("{} {} is closed", "✗".red().bold(), endpoint.bold());
    }
    Ok(())
}
