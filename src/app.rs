//! Command dispatch for the `pcapcache` binary.
//!
//! [`run_app`] wires the ambient pieces together (logging, configuration,
//! Ctrl+C handling, the async runtime) and runs one subcommand against the
//! cache selected by [`build_cache`].

use anyhow::{bail, Context, Result};
use bytesize::ByteSize;
use std::path::Path;

use crate::cache::{build_cache, AnalysisArtifact, AnalysisCache, CacheKey, ResultKind};
use crate::cancel::{self, CancelFlag};
use crate::cli::{ClearArgs, Cli, Commands, EvictArgs, FileArgs, ForgetArgs, ShowArgs, StatsArgs};
use crate::config::Config;
use crate::error::{ExitCode, Interrupted};
use crate::logging;
use crate::model::{SecurityThreat, ThreatSummary, VoiceQosResult};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";
const SHOWN_THREATS: usize = 20;

/// Run the parsed command line and return the process exit code.
///
/// # Errors
///
/// Returns an error when the capture file cannot be read, the arguments are
/// inconsistent, or the command was interrupted ([`Interrupted`]).
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let mut config = Config::load();
    if let Some(db) = &cli.db {
        config.store_path = Some(db.clone());
        config.enabled = true;
    }
    log::debug!("Effective configuration: {:?}", config);

    let cancel = cancel::install_handler().context("Failed to install Ctrl+C handler")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let cache = build_cache(&config);
    let code = runtime.block_on(execute(cli.command, &config, cache.as_ref(), &cancel))?;

    if cancel.is_cancelled() {
        return Err(Interrupted.into());
    }
    Ok(code)
}

async fn execute(
    command: Commands,
    config: &Config,
    cache: &dyn AnalysisCache,
    cancel: &CancelFlag,
) -> Result<ExitCode> {
    match command {
        Commands::Key(args) => print_key(cache, &args),
        Commands::Status(args) => status(cache, &args, cancel).await,
        Commands::Show(args) => show(cache, &args, cancel).await,
        Commands::Stats(args) => stats(cache, &args, cancel).await,
        Commands::Evict(args) => evict(cache, config, &args, cancel).await,
        Commands::Forget(args) => forget(cache, &args, cancel).await,
        Commands::Clear(args) => clear(cache, &args, cancel).await,
        Commands::Compact => compact(cache, cancel).await,
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(ExitCode::Success)
        }
    }
}

fn key_for(cache: &dyn AnalysisCache, path: &Path) -> Result<CacheKey> {
    cache
        .compute_cache_key(path)
        .with_context(|| format!("Cannot derive cache key for {}", path.display()))
}

fn print_key(cache: &dyn AnalysisCache, args: &FileArgs) -> Result<ExitCode> {
    let key = key_for(cache, &args.path)?;
    println!("{key}");
    Ok(ExitCode::Success)
}

async fn status(cache: &dyn AnalysisCache, args: &FileArgs, cancel: &CancelFlag) -> Result<ExitCode> {
    let key = key_for(cache, &args.path)?;
    println!("{}", args.path.display());
    println!("  Key: {key}");

    let mut found = 0;
    for kind in ResultKind::ALL {
        match cache.entry_info(&key, kind, cancel).await {
            Some(info) => {
                found += 1;
                println!(
                    "  {:<9} cached   {:>10}   created {}   last used {}",
                    kind.as_str(),
                    ByteSize::b(info.payload_size).to_string(),
                    info.created_at.format(TIME_FORMAT),
                    info.last_accessed_at.format(TIME_FORMAT)
                );
            }
            None => println!("  {:<9} not cached", kind.as_str()),
        }
    }

    Ok(if found == 0 {
        ExitCode::NotCached
    } else {
        ExitCode::Success
    })
}

async fn show(cache: &dyn AnalysisCache, args: &ShowArgs, cancel: &CancelFlag) -> Result<ExitCode> {
    let key = key_for(cache, &args.path)?;
    let kind = ResultKind::from(args.kind);

    match cache.load_artifact(&key, kind, cancel).await {
        Some(AnalysisArtifact::Threats(threats)) => print_threats(&threats),
        Some(AnalysisArtifact::VoiceQos(result)) => print_voice_qos(&result),
        None => {
            println!("No cached {} result for {}", kind, args.path.display());
            return Ok(ExitCode::NotCached);
        }
    }
    Ok(ExitCode::Success)
}

fn print_threats(threats: &[SecurityThreat]) {
    let summary = ThreatSummary::from_threats(threats);
    println!(
        "{} threats: {} critical, {} high, {} medium, {} low, {} info",
        summary.total, summary.critical, summary.high, summary.medium, summary.low, summary.info
    );

    let mut sorted: Vec<&SecurityThreat> = threats.iter().collect();
    sorted.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.first_seen.cmp(&b.first_seen)));
    for threat in sorted.iter().take(SHOWN_THREATS) {
        println!(
            "  [{:<8}] {} ({}, seen {}x)",
            threat.severity.to_string(),
            threat.title,
            threat.threat_type,
            threat.occurrence_count
        );
    }
    if sorted.len() > SHOWN_THREATS {
        println!("  ... and {} more", sorted.len() - SHOWN_THREATS);
    }
}

fn print_voice_qos(result: &VoiceQosResult) {
    println!("Voice QoS analyzed at {}", result.analyzed_at.format(TIME_FORMAT));
    println!("  Voice packets:            {}", result.total_voice_packets);
    println!("  Marked flows:             {}", result.qos_traffic.len());
    println!("  High-latency connections: {}", result.high_latency_connections.len());
    println!("  High-jitter connections:  {}", result.high_jitter_connections.len());

    for conn in &result.high_latency_connections {
        println!(
            "    latency {} -> {} ({}): avg {:.1} ms, max {:.1} ms",
            conn.source_address,
            conn.destination_address,
            conn.protocol,
            conn.average_latency_ms,
            conn.max_latency_ms
        );
    }
    for conn in &result.high_jitter_connections {
        println!(
            "    jitter  {} -> {} ({}): avg {:.1} ms, max {:.1} ms",
            conn.source_address,
            conn.destination_address,
            conn.protocol,
            conn.average_jitter_ms,
            conn.max_jitter_ms
        );
    }
}

async fn stats(cache: &dyn AnalysisCache, args: &StatsArgs, cancel: &CancelFlag) -> Result<ExitCode> {
    let stats = cache.statistics(cancel).await;
    if stats.enabled && !stats.available {
        log::warn!("Cache store could not be read; statistics are empty");
    }
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("Failed to serialize statistics")?
        );
    } else {
        print!("{stats}");
    }
    Ok(ExitCode::Success)
}

async fn evict(
    cache: &dyn AnalysisCache,
    config: &Config,
    args: &EvictArgs,
    cancel: &CancelFlag,
) -> Result<ExitCode> {
    let days = args.older_than.unwrap_or(config.max_age_days);
    let removed = cache.clear_older_than(days, cancel).await;
    println!("Removed {removed} entries not used in the last {days} days");
    Ok(ExitCode::Success)
}

async fn forget(cache: &dyn AnalysisCache, args: &ForgetArgs, cancel: &CancelFlag) -> Result<ExitCode> {
    let digest = resolve_digest(cache, &args.target)?;
    let removed = cache.delete_for_file(&digest, cancel).await;
    println!("Removed {removed} entries for file digest {digest}");
    Ok(ExitCode::Success)
}

/// Accept either an existing capture file or a bare hex file digest.
fn resolve_digest(cache: &dyn AnalysisCache, target: &str) -> Result<String> {
    let path = Path::new(target);
    if path.is_file() {
        return Ok(key_for(cache, path)?.file_digest().to_string());
    }
    if is_hex_digest(target) {
        return Ok(target.to_ascii_lowercase());
    }
    bail!("'{target}' is neither an existing file nor a hex file digest")
}

fn is_hex_digest(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

async fn clear(cache: &dyn AnalysisCache, args: &ClearArgs, cancel: &CancelFlag) -> Result<ExitCode> {
    if !args.yes {
        bail!("Refusing to remove every cache entry without --yes");
    }
    let removed = cache.clear_all(cancel).await;
    println!("Removed {removed} entries");
    Ok(ExitCode::Success)
}

async fn compact(cache: &dyn AnalysisCache, cancel: &CancelFlag) -> Result<ExitCode> {
    let before = cache.statistics(cancel).await.store_size_on_disk_bytes;
    cache.compact(cancel).await;
    let after = cache.statistics(cancel).await.store_size_on_disk_bytes;
    println!(
        "Store size: {} -> {}",
        ByteSize::b(before),
        ByteSize::b(after)
    );
    Ok(ExitCode::Success)
}
