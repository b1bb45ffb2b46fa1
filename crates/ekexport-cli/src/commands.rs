//! CLI argument definitions and command dispatch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use p256::ecdsa::SigningKey;
use p256::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rand::rngs::OsRng;
use serde::Deserialize;

use ekexport_core::model::BACKFILL_DAYS;
use ekexport_core::{
    BundleSigner, ExportConfig, ExportWorker, KeyRecord, MemoryDb, ObjectStoreExportStore,
    RetentionSweeper,
};

/// Build, sign, and retire exposure-key export bundles.
#[derive(Debug, Parser)]
#[command(name = "ekexport", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run an export pass: current window plus backfill of preceding
    /// midnights.
    Export {
        /// YAML config with region policy, signature info, and key path.
        #[arg(long)]
        config: PathBuf,
        /// JSON array of key records to seed the in-memory database with.
        #[arg(long)]
        keys: PathBuf,
        /// Object store URL (s3://bucket/prefix, file:///path, memory://).
        #[arg(long)]
        store: String,
        /// Anchor timestamp (RFC 3339); defaults to now.
        #[arg(long)]
        since: Option<DateTime<Utc>>,
        /// How many preceding midnights to backfill.
        #[arg(long, default_value_t = BACKFILL_DAYS)]
        backfill_days: u32,
    },
    /// Run a retention sweep over the seeded records.
    Sweep {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        keys: PathBuf,
        #[arg(long)]
        store: String,
    },
    /// Generate a P-256 signing key (PKCS#8 PEM) and print the public key.
    Keygen {
        /// Where to write the private key PEM.
        #[arg(long)]
        out: PathBuf,
    },
}

/// CLI config file: the core export config plus the signing key location.
#[derive(Debug, Deserialize)]
struct CliConfig {
    #[serde(flatten)]
    export: ExportConfig,
    signing_key: PathBuf,
}

fn load_config(path: &Path) -> Result<CliConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))
}

fn load_keys(path: &Path) -> Result<Vec<KeyRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read key records {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid key records {}", path.display()))
}

fn load_signer(path: &Path) -> Result<BundleSigner> {
    let pem = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read signing key {}", path.display()))?;
    Ok(BundleSigner::from_pkcs8_pem(&pem)?)
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Export {
            config,
            keys,
            store,
            since,
            backfill_days,
        } => export(&config, &keys, &store, since, backfill_days).await,
        Command::Sweep {
            config,
            keys,
            store,
        } => sweep(&config, &keys, &store).await,
        Command::Keygen { out } => keygen(&out),
    }
}

async fn export(
    config: &Path,
    keys: &Path,
    store_url: &str,
    since: Option<DateTime<Utc>>,
    backfill_days: u32,
) -> Result<()> {
    let cfg = load_config(config)?;
    let signer = load_signer(&cfg.signing_key)?;

    let db = Arc::new(MemoryDb::new());
    db.insert_keys(load_keys(keys)?);
    let store = Arc::new(ObjectStoreExportStore::from_url(store_url)?);

    let worker = ExportWorker::new(db, store, signer, cfg.export)?;
    let now = since.unwrap_or_else(Utc::now);
    let summaries = worker.run_with_backfill(now, backfill_days).await?;

    let written: usize = summaries.iter().map(|s| s.bundles_written.len()).sum();
    let skipped: usize = summaries.iter().map(|s| s.regions_skipped).sum();
    tracing::info!(runs = summaries.len(), written, skipped, "export pass complete");
    println!("runs: {}", summaries.len());
    println!("bundles written: {written}");
    println!("regions skipped: {skipped}");
    for summary in &summaries {
        for path in &summary.bundles_written {
            println!("  {path}");
        }
    }
    Ok(())
}

async fn sweep(config: &Path, keys: &Path, store_url: &str) -> Result<()> {
    // Config is loaded for validation parity with `export`, even though the
    // sweeper itself only needs the collaborators.
    let cfg = load_config(config)?;
    cfg.export.validate()?;

    let db = Arc::new(MemoryDb::new());
    db.insert_keys(load_keys(keys)?);
    let store = Arc::new(ObjectStoreExportStore::from_url(store_url)?);

    let sweeper = RetentionSweeper::new(db, store);
    let summary = sweeper.sweep(Utc::now()).await?;
    tracing::info!(
        keys = summary.keys_deleted,
        bundles = summary.bundles_deleted,
        "retention sweep complete"
    );
    println!("keys deleted: {}", summary.keys_deleted);
    println!("bundles deleted: {}", summary.bundles_deleted);
    Ok(())
}

fn keygen(out: &Path) -> Result<()> {
    let key = SigningKey::random(&mut OsRng);
    let pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .context("failed to encode signing key")?;
    std::fs::write(out, pem.as_bytes())
        .with_context(|| format!("failed to write {}", out.display()))?;

    let public = key
        .verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .context("failed to encode public key")?;
    println!("wrote {}", out.display());
    println!("{public}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_config_file_parses() {
        let file = write_temp(
            "
default_region: US
native_regions: [\"*\"]
signature_info:
  app_bundle_id: com.example.app
  verification_key_version: v1
  verification_key_id: \"310\"
  signature_algorithm: 1.2.840.10045.4.3.2
signing_key: ./signing-key.pem
",
            ".yaml",
        );

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.export.default_region, "US");
        assert_eq!(cfg.signing_key, PathBuf::from("./signing-key.pem"));
    }

    #[test]
    fn test_key_records_parse() {
        let file = write_temp(
            r#"[{
                "id": 1,
                "createdAt": "2026-08-01T12:00:00Z",
                "keyData": "AAAAAAAAAAAAAAAAAAAAAA==",
                "rollingStartIntervalNumber": 2650000,
                "rollingPeriod": 144,
                "transmissionRiskLevel": 4,
                "regions": ["US"]
            }]"#,
            ".json",
        );

        let records = load_keys(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 1);
    }

    #[test]
    fn test_keygen_roundtrips_through_signer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.pem");
        keygen(&path).unwrap();

        let signer = load_signer(&path).unwrap();
        let sig_info = ekexport_core::SignatureInfo {
            app_bundle_id: "com.example.app".to_string(),
            verification_key_version: "v1".to_string(),
            verification_key_id: "310".to_string(),
            signature_algorithm: "1.2.840.10045.4.3.2".to_string(),
        };
        signer.sign_export(b"payload", &sig_info, 1, 1).unwrap();
    }
}
