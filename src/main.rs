// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use dagline::config::RuntimeBuilder;
use dagline::engine::ExecutorState;
use dagline::plugins::NodeRegistry;

const DEFAULT_EVENT_PATTERN: &str = "graph.*";

/// Command line options.
#[derive(Debug, PartialEq)]
struct CliArgs {
    graph: PathBuf,
    duration: Option<Duration>,
    events: String,
}

impl CliArgs {
    fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self, String> {
        let mut graph = None;
        let mut duration = None;
        let mut events = DEFAULT_EVENT_PATTERN.to_string();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--duration" => {
                    let value = args.next().ok_or("--duration needs a value")?;
                    let secs: f64 = value
                        .parse()
                        .map_err(|_| format!("invalid duration '{}'", value))?;
                    if !secs.is_finite() || secs <= 0.0 {
                        return Err(format!("duration must be positive, got {}", value));
                    }
                    duration = Some(Duration::from_secs_f64(secs));
                }
                "--events" => {
                    events = args.next().ok_or("--events needs a pattern")?;
                }
                flag if flag.starts_with("--") => return Err(format!("unknown option '{}'", flag)),
                path if graph.is_none() => graph = Some(PathBuf::from(path)),
                extra => return Err(format!("unexpected argument '{}'", extra)),
            }
        }

        Ok(Self {
            graph: graph.ok_or("missing graph file")?,
            duration,
            events,
        })
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} <graph file> [--duration <secs>] [--events <pattern>]", program);
    eprintln!("Example: {} configs/inspection-line.yaml --duration 10 --events 'node.*'", program);
    eprintln!("Graph files may be .yaml, .yml, .json or .toml. Set RUST_LOG to adjust logging.");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let program = env::args().next().unwrap_or_else(|| "dagline".to_string());
    let args = match CliArgs::parse(env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("❌ {}", message);
            print_usage(&program);
            process::exit(2);
        }
    };

    let registry = NodeRegistry::with_builtins();
    let executor = RuntimeBuilder::load_and_build(&args.graph, &registry)
        .with_context(|| format!("failed to build {}", args.graph.display()))?;

    println!("🚀 dagline");
    println!("═══════════════════════════════════");
    println!("📋 Graph: {} ({})", executor.graph_name(), args.graph.display());
    println!("🔢 Nodes: {}, connections: {}", executor.topology().len(), executor.topology().connections().len());
    println!("🛡️  Error strategy: {}", executor.error_strategy().as_str());
    println!("📨 Events: {}", args.events);
    println!();

    let mut events = executor.event_bus().subscribe(&args.events);
    executor.start().await.context("failed to start the graph")?;

    let deadline = async {
        match args.duration {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };
    let mut states = executor.watch_state();
    let halted = async {
        let _ = states.wait_for(|s| *s == ExecutorState::Stopped).await;
    };
    let interrupted = tokio::signal::ctrl_c();
    let drained = executor.wait_until_drained();
    tokio::pin!(deadline, halted, interrupted, drained);

    let reason = loop {
        tokio::select! {
            Some(event) = events.recv() => {
                println!("  {} [{}] {}", event.topic, event.source, event.payload);
            }
            _ = &mut interrupted => break "interrupted",
            _ = &mut deadline => break "duration elapsed",
            _ = &mut drained => break "stream ended",
            _ = &mut halted => break "halted",
        }
    };

    executor.stop().await.context("failed to stop the graph")?;
    for event in events.drain() {
        println!("  {} [{}] {}", event.topic, event.source, event.payload);
    }

    println!();
    println!("📊 Run finished ({}):", reason);
    println!("{}", serde_json::to_string_pretty(&executor.metrics())?);

    if let Some(error) = executor.last_error() {
        return Err(error).context("graph stopped on a fatal error");
    }
    Ok(())
}
