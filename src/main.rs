//! Ruster Audit CLI
//!
//! Usage:
//!   ruster_audit <bundle.json>                  audit a prepared `AuditBundle` offline
//!   ruster_audit live <address|source> [addr]   resolve and audit against live RPC
//!
//! The finding is printed to stdout as JSON; logs go to stderr.

use eyre::{eyre, Result};
use ruster_audit::{AppConfig, AuditBundle, AuditFinding, Auditor};
use std::path::Path;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const USAGE: &str = "usage: ruster_audit <bundle.json> | ruster_audit live <address|source-file> [address]";

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let finding = match args.as_slice() {
        [cmd, input, rest @ ..] if cmd == "live" && rest.len() <= 1 => {
            live_audit(input, rest.first().map(String::as_str)).await?
        }
        [path] if path != "live" => offline_audit(Path::new(path))?,
        _ => return Err(eyre!(USAGE)),
    };

    info!("{}", finding.summary());
    println!("{}", serde_json::to_string_pretty(&finding)?);
    Ok(())
}

fn offline_audit(path: &Path) -> Result<AuditFinding> {
    let raw = std::fs::read_to_string(path).map_err(|e| eyre!("cannot read {}: {}", path.display(), e))?;
    let bundle: AuditBundle = serde_json::from_str(&raw)?;
    info!("📂 Loaded bundle for {} ({} events)", bundle.input.contract_address, bundle.input.events.len());
    Ok(bundle.run()?)
}

/// `input` may name a source file; its contents are classified instead of the path
async fn live_audit(input: &str, address: Option<&str>) -> Result<AuditFinding> {
    let path = Path::new(input);
    let input = if path.is_file() {
        std::fs::read_to_string(path)?
    } else {
        input.to_string()
    };

    let config = AppConfig::from_env()?;
    let auditor = Auditor::new(&config)?;
    Ok(auditor.audit(&input, address, Vec::new()).await?)
}
