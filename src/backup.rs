use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const TABLES_DIR: &str = "csv";
pub const BUNDLE_FORMAT_V1: &str = "schoold-tables-v1";
pub const TABLES: [&str; 5] = [
    "employees",
    "students",
    "attendance",
    "schedules",
    "lesson_plans",
];

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub tables_restored: usize,
}

fn table_entry(table: &str) -> String {
    format!("tables/{}.csv", table)
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let tables_dir = workspace_path.join(TABLES_DIR);
    let mut contents: Vec<(&str, Vec<u8>)> = Vec::with_capacity(TABLES.len());
    for table in TABLES {
        let p = tables_dir.join(format!("{}.csv", table));
        if !p.is_file() {
            return Err(anyhow!("workspace table not found: {}", p.to_string_lossy()));
        }
        let bytes =
            std::fs::read(&p).with_context(|| format!("failed to read {}", p.to_string_lossy()))?;
        contents.push((table, bytes));
    }

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let checksums: serde_json::Map<String, serde_json::Value> = contents
        .iter()
        .map(|(table, bytes)| (table.to_string(), json!(sha256_hex(bytes))))
        .collect();
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": exported_at,
        "sha256": checksums,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    for (table, bytes) in &contents {
        zip.start_file(table_entry(table), opts)
            .with_context(|| format!("failed to start {} entry", table))?;
        zip.write_all(bytes)
            .with_context(|| format!("failed to write {} entry", table))?;
    }

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: contents.len() + 1,
    })
}

/// Every checksum is verified, and every table passes `check`, before any
/// workspace file is replaced.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
    check: impl Fn(&str, &[u8]) -> anyhow::Result<()>,
) -> anyhow::Result<ImportSummary> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let mut restored: Vec<(&str, Vec<u8>)> = Vec::with_capacity(TABLES.len());
    for table in TABLES {
        let entry = table_entry(table);
        let mut bytes = Vec::new();
        archive
            .by_name(&entry)
            .with_context(|| format!("bundle missing {}", entry))?
            .read_to_end(&mut bytes)
            .with_context(|| format!("failed to read {}", entry))?;
        let expected = manifest
            .get("sha256")
            .and_then(|m| m.get(table))
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("manifest has no checksum for {}", table))?;
        if sha256_hex(&bytes) != expected {
            return Err(anyhow!("checksum mismatch for {}", entry));
        }
        check(table, &bytes).with_context(|| format!("{} is not a usable table", entry))?;
        restored.push((table, bytes));
    }

    let tables_dir = workspace_path.join(TABLES_DIR);
    std::fs::create_dir_all(&tables_dir).with_context(|| {
        format!(
            "failed to create table directory {}",
            tables_dir.to_string_lossy()
        )
    })?;
    for (table, bytes) in &restored {
        let dst = tables_dir.join(format!("{}.csv", table));
        let tmp = tables_dir.join(format!("{}.csv.importing", table));
        let mut out = File::create(&tmp)
            .with_context(|| format!("failed to create {}", tmp.to_string_lossy()))?;
        out.write_all(bytes)
            .with_context(|| format!("failed to write {}", tmp.to_string_lossy()))?;
        out.flush()
            .with_context(|| format!("failed to flush {}", tmp.to_string_lossy()))?;
        std::fs::rename(&tmp, &dst).with_context(|| {
            format!("failed to move restored table to {}", dst.to_string_lossy())
        })?;
    }

    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        tables_restored: restored.len(),
    })
}
