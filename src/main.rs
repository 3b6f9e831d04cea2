use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sbprobe::gate::PathGate;
use sbprobe::probe::{JsonLinesSink, TracingSink};
use sbprobe::scenario::{self, Scenario};
use sbprobe::{activate, ProbeConfig};

/// Replays a scripted page session with the submission probe installed.
#[derive(Debug, Parser)]
#[command(name = "sbprobe", version)]
struct Args {
    /// Scenario file (JSON). The built-in demo runs when omitted.
    scenario: Option<PathBuf>,

    /// Override the page location the activation gate is evaluated against.
    #[arg(long)]
    location: Option<String>,

    /// Probe configuration file (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frames kept per origin trace (0 disables capture).
    #[arg(long)]
    max_frames: Option<usize>,

    /// Emit reports as JSON lines on stdout instead of log events.
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ProbeConfig::load(path)?,
        None => ProbeConfig::default(),
    };
    if let Some(frames) = args.max_frames {
        config.max_stack_frames = frames;
    }

    let mut scenario = match &args.scenario {
        Some(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading scenario {}", path.display()))?;
            Scenario::from_json(&json)?
        }
        None => Scenario::demo()?,
    };
    if let Some(location) = args.location {
        scenario.location = location;
    }

    let page = scenario.build_page();
    let gate = PathGate::from_config(&config);
    let probe = if args.json {
        activate(&page, config, &gate, JsonLinesSink::new(std::io::stdout()))
    } else {
        let sink = TracingSink::new(&config.log_prefix);
        activate(&page, config, &gate, sink)
    };
    if probe.is_none() {
        tracing::info!(location = %scenario.location, "activation gate closed, probe not installed");
    }

    let outcomes = scenario::replay(&page, &scenario.steps).await?;
    for outcome in &outcomes {
        if let Err(err) = &outcome.result {
            tracing::warn!(step = outcome.step, %err, "host call failed");
        }
    }

    tracing::info!(
        steps = outcomes.len(),
        navigations = page.navigations().len(),
        network_calls = page.network_log().len(),
        "scenario finished"
    );
    if let Some(probe) = probe {
        let indicator = probe.indicator();
        for (kind, count) in indicator.counters.iter() {
            tracing::info!(kind = ?kind, count, "counter");
        }
        if let Some(label) = indicator.last_label {
            tracing::info!(last = %label, "last event");
        }
    }
    Ok(())
}
