use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/gradetrack.sqlite3";
const DB_FILE: &str = "gradetrack.sqlite3";
pub const BUNDLE_FORMAT_V1: &str = "gradetrack-workspace-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub db_sha256: String,
    pub db_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format: String,
    pub db_sha256: String,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace_path.join(DB_FILE);
    if !db_path.is_file() {
        return Err(anyhow!(
            "workspace database not found: {}",
            db_path.to_string_lossy()
        ));
    }
    let db_bytes = std::fs::read(&db_path)
        .with_context(|| format!("failed to read database {}", db_path.to_string_lossy()))?;
    let checksum = sha256_hex(&db_bytes);

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

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "db": { "entry": DB_ENTRY, "sha256": checksum, "bytes": db_bytes.len() },
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(DB_ENTRY, opts)
        .context("failed to start database entry")?;
    zip.write_all(&db_bytes)
        .context("failed to write database entry")?;
    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        db_sha256: checksum,
        db_bytes: db_bytes.len() as u64,
    })
}

/// A bundle whose manifest format and database checksum have been checked.
#[derive(Debug)]
pub struct VerifiedBundle {
    db_bytes: Vec<u8>,
    pub db_sha256: String,
}

/// Reads and checks a bundle without touching any workspace.
pub fn verify_workspace_bundle(in_path: &Path) -> anyhow::Result<VerifiedBundle> {
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
    let expected = manifest
        .get("db")
        .and_then(|d| d.get("sha256"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("manifest missing db.sha256"))?
        .to_string();

    let mut db_bytes = Vec::new();
    archive
        .by_name(DB_ENTRY)
        .with_context(|| format!("bundle missing {}", DB_ENTRY))?
        .read_to_end(&mut db_bytes)
        .context("failed to extract database entry")?;
    let actual = sha256_hex(&db_bytes);
    if actual != expected {
        return Err(anyhow!(
            "database checksum mismatch: manifest {} but entry hashes to {}",
            expected,
            actual
        ));
    }

    Ok(VerifiedBundle {
        db_bytes,
        db_sha256: actual,
    })
}

/// Replaces the workspace database with the bundle's copy via a temp file and rename.
pub fn restore_workspace_bundle(
    bundle: VerifiedBundle,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace_path).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace_path.to_string_lossy()
        )
    })?;
    let dst = workspace_path.join(DB_FILE);
    let tmp_dst = workspace_path.join(format!("{}.importing", DB_FILE));
    {
        let mut out = File::create(&tmp_dst).with_context(|| {
            format!(
                "failed to create temp database {}",
                tmp_dst.to_string_lossy()
            )
        })?;
        out.write_all(&bundle.db_bytes)
            .context("failed to write extracted database")?;
        out.flush().context("failed to flush extracted database")?;
    }
    if dst.exists() {
        std::fs::remove_file(&dst).with_context(|| {
            format!(
                "failed to remove existing database {}",
                dst.to_string_lossy()
            )
        })?;
    }
    std::fs::rename(&tmp_dst, &dst).with_context(|| {
        format!(
            "failed to move extracted database to {}",
            dst.to_string_lossy()
        )
    })?;

    Ok(ImportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        db_sha256: bundle.db_sha256,
    })
}
