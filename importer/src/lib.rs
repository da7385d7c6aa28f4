use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, NaiveDate};
use clap::Parser;
use hamai_lib::api::{EntryDraft, ItemDraft};
use hamai_lib::ledger::Ledger;
use hamai_lib::palette::CategoryColors;
use serde::Deserialize;
use tracing::info;
use walkdir::WalkDir;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "hamai-importer",
    author,
    version,
    about = "Import exported monthly statement files into a HamAI ledger snapshot",
    long_about = None
)]
pub struct Cli {
    /// Directory of statement files, one JSON array per month named YYYY-MM.json
    #[arg(long, value_name = "SOURCE_DIR")]
    pub source: PathBuf,

    /// Destination file for the generated ledger snapshot
    #[arg(long, value_name = "LEDGER_FILE")]
    pub output_ledger: PathBuf,

    /// Destination file for the category color map covering every imported category
    #[arg(long, value_name = "COLORS_FILE")]
    pub output_colors: PathBuf,
}

#[derive(Debug, Deserialize)]
struct StatementItem {
    name: String,
    #[serde(default)]
    amount: f64,
}

#[derive(Debug, Deserialize)]
struct StatementRecord {
    receiver: String,
    items: Vec<StatementItem>,
    #[serde(default)]
    tax: f64,
    #[serde(default)]
    category: String,
    #[serde(default)]
    notes: String,
}

pub fn run(cli: Cli) -> Result<()> {
    let source_root = ensure_directory(&cli.source)
        .with_context(|| format!("source directory '{}' is invalid", cli.source.display()))?;

    for output in [&cli.output_ledger, &cli.output_colors] {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "failed to create output parent directory '{}'",
                        parent.display()
                    )
                })?;
            }
        }
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(source_root) {
        let entry = entry.with_context(|| {
            format!(
                "failed to walk source directory '{}'",
                source_root.display()
            )
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        if is_statement_file(&path) {
            files.push(path);
        }
    }
    files.sort();

    let mut ledger = Ledger::default();
    for path in &files {
        import_statement_file(path, &mut ledger)?;
    }

    // Colors are allocated in one batch over the snapshot so every imported
    // category renders distinctly from the first launch.
    let mut colors = CategoryColors::default();
    colors.ensure(ledger.categories());

    ledger
        .save_to_path(&cli.output_ledger)
        .with_context(|| format!("failed to write ledger to '{}'", cli.output_ledger.display()))?;
    colors.save_to_path(&cli.output_colors).with_context(|| {
        format!(
            "failed to write category colors to '{}'",
            cli.output_colors.display()
        )
    })?;

    info!(
        target: "hamai::importer",
        source = %source_root.display(),
        ledger = %cli.output_ledger.display(),
        colors = %cli.output_colors.display(),
        statements = files.len(),
        entries = ledger.entry_count(),
        categories = colors.len(),
        "importer completed"
    );

    Ok(())
}

fn import_statement_file(path: &Path, ledger: &mut Ledger) -> Result<()> {
    let stem = path
        .file_stem()
        .and_then(OsStr::to_str)
        .ok_or_else(|| anyhow!("statement file '{}' has an invalid name", path.display()))?;

    let (year, month) = parse_statement_month(stem)
        .with_context(|| format!("failed to parse month from statement '{stem}.json'"))?;

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read statement '{}'", path.display()))?;
    let records: Vec<StatementRecord> = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse statement '{}'", path.display()))?;

    for (index, record) in records.into_iter().enumerate() {
        let category = if record.category.trim().is_empty() {
            "other".to_string()
        } else {
            record.category
        };

        ledger
            .add(EntryDraft {
                receiver: record.receiver,
                items: record
                    .items
                    .into_iter()
                    .map(|item| ItemDraft {
                        name: item.name,
                        amount: item.amount,
                    })
                    .collect(),
                tax: record.tax,
                category,
                notes: record.notes,
                month,
                year,
            })
            .with_context(|| {
                format!("invalid record {} in statement '{}'", index + 1, path.display())
            })?;
    }

    Ok(())
}

fn ensure_directory(path: &Path) -> Result<&Path> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("failed to read metadata for '{}'", path.display()))?;

    if !metadata.is_dir() {
        anyhow::bail!("'{}' is not a directory", path.display());
    }

    Ok(path)
}

fn is_statement_file(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

fn parse_statement_month(stem: &str) -> Result<(i32, u32)> {
    let date = NaiveDate::parse_from_str(&format!("{}-01", stem.trim()), "%Y-%m-%d")
        .map_err(|err| anyhow!("unable to parse statement month from '{stem}': {err}"))?;

    Ok((date.year(), date.month()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use assert_fs::prelude::*;
    use clap::CommandFactory;

    fn cli_for(temp: &assert_fs::TempDir, source: &Path) -> Cli {
        Cli {
            source: source.to_path_buf(),
            output_ledger: temp.child("out/ledger.json").path().to_path_buf(),
            output_colors: temp.child("out/category_colors.json").path().to_path_buf(),
        }
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_statement_month_accepts_year_month_stems() {
        assert_eq!(parse_statement_month("2025-08").unwrap(), (2025, 8));
        assert_eq!(parse_statement_month(" 2024-02 ").unwrap(), (2024, 2));
        assert!(parse_statement_month("august-2025").is_err());
        assert!(parse_statement_month("2025-13").is_err());
    }

    #[test]
    fn run_errors_when_source_missing() {
        let temp = assert_fs::TempDir::new().expect("temp dir");
        let missing = temp.child("missing").path().to_path_buf();

        let result = run(cli_for(&temp, &missing));
        assert!(result.is_err(), "expected missing directory error");
    }

    #[test]
    fn run_imports_statements_and_assigns_distinct_colors() {
        let temp = assert_fs::TempDir::new().expect("temp dir");
        let source = temp.child("statements");
        source.create_dir_all().expect("create source");

        source
            .child("2025-08.json")
            .write_str(
                r#"[
                    {"receiver": "Costco", "items": [{"name": "Eggs", "amount": 10.0}], "tax": 0.5, "category": "Grocery"},
                    {"receiver": "Blue Bottle", "items": [{"name": "Latte", "amount": 6.25}], "category": "eating out"}
                ]"#,
            )
            .expect("write statement");
        source
            .child("2025-07.json")
            .write_str(r#"[{"receiver": "Landlord", "items": [{"name": "Rent", "amount": 1200.0}]}]"#)
            .expect("write statement");
        source
            .child("README.md")
            .write_str("not a statement")
            .expect("write readme");

        let cli = cli_for(&temp, source.path());
        run(cli.clone()).expect("run importer");

        let ledger = Ledger::load_from_path(&cli.output_ledger).expect("load ledger");
        assert_eq!(ledger.entry_count(), 3);
        assert_eq!(ledger.earliest_month(), Some((2025, 7)));
        assert_eq!(
            ledger.categories(),
            vec!["eating out", "grocery", "other"]
        );

        let colors = CategoryColors::load_from_path(&cli.output_colors);
        let assigned: Vec<&str> = ledger
            .categories()
            .iter()
            .map(|category| colors.color_for(category).expect("assigned color"))
            .collect();
        assert_eq!(assigned.len(), 3);
        assert!(assigned.iter().all(|color| !color.is_empty()));
        let mut unique = assigned.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn run_rejects_malformed_statements() {
        let temp = assert_fs::TempDir::new().expect("temp dir");
        let source = temp.child("statements");
        source.create_dir_all().expect("create source");
        source
            .child("2025-08.json")
            .write_str("{not json")
            .expect("write statement");

        let result = run(cli_for(&temp, source.path()));
        assert!(result.is_err(), "expected parse error");
    }

    #[test]
    fn run_rejects_records_missing_required_fields() {
        let temp = assert_fs::TempDir::new().expect("temp dir");
        let source = temp.child("statements");
        source.create_dir_all().expect("create source");
        source
            .child("2025-08.json")
            .write_str(r#"[{"receiver": "  ", "items": [{"name": "Eggs", "amount": 1.0}]}]"#)
            .expect("write statement");

        let result = run(cli_for(&temp, source.path()));
        assert!(result.is_err(), "expected validation error");

        let err = format!("{:#}", result.unwrap_err());
        assert!(err.contains("invalid record 1"), "unexpected error: {err}");
    }

    #[test]
    fn ledger_snapshot_is_not_written_on_failure() {
        let temp = assert_fs::TempDir::new().expect("temp dir");
        let source = temp.child("statements");
        source.create_dir_all().expect("create source");
        source
            .child("2025-08.json")
            .write_str("{not json")
            .expect("write statement");

        let cli = cli_for(&temp, source.path());
        assert!(run(cli.clone()).is_err());
        assert!(!cli.output_ledger.exists());
        assert!(!cli.output_colors.exists());
    }
}
