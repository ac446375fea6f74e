//! Signed archive verification command

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use xpisign_common::{inspect_signed, InspectionReport, SigningConfig};

use crate::output::{print_error, print_serialized, OutputFormat};

#[derive(Args)]
pub struct VerifyArgs {
    /// Path to the signed archive
    pub path: PathBuf,
}

pub async fn execute(args: VerifyArgs, config: SigningConfig, format: OutputFormat) -> Result<()> {
    if !args.path.exists() {
        print_error(&format!("File not found: {}", args.path.display()));
        std::process::exit(1);
    }

    let path = args.path.clone();
    let report = tokio::task::spawn_blocking(move || inspect_signed(&path, &config))
        .await?
        .with_context(|| format!("Failed to inspect {}", args.path.display()))?;

    match format {
        OutputFormat::Json | OutputFormat::Yaml => print_serialized(&report, format),
        OutputFormat::Table | OutputFormat::Plain => print_summary(&report),
    }

    if !report.passed {
        std::process::exit(1);
    }
    Ok(())
}

fn status(ok: bool) -> colored::ColoredString {
    if ok {
        "✅".green()
    } else {
        "❌".red()
    }
}

fn print_summary(report: &InspectionReport) {
    println!();
    println!("{}", "━".repeat(60).dimmed());
    println!("{}", " Signed Archive Report".bold());
    println!("{}", "━".repeat(60).dimmed());
    println!();

    println!("{}  {}", "📦 Input:".bold(), report.input_path);
    println!();

    println!("{}", "✍️  Signature Block".bold());
    println!("   Found:       {}", status(report.signature_block.found));
    println!("   First entry: {}", status(report.signature_block.first_entry));
    if report.signature_block.found {
        println!("   Size:        {} bytes", report.signature_block.size);
    }
    println!();

    let manifest = &report.manifest;
    println!("{}", "📋 Manifest".bold());
    println!("   Found:    {}", status(manifest.found));
    println!("   Parsed:   {}", status(manifest.parsed_ok));
    if manifest.parsed_ok {
        println!(
            "   Entries:  {}/{} verified",
            manifest.verified_entries.to_string().green(),
            manifest.total_entries
        );
    }
    for (label, files) in [
        ("Missing", &manifest.missing_files),
        ("Mismatched", &manifest.mismatched_files),
        ("Unlisted", &manifest.unlisted_files),
    ] {
        if !files.is_empty() {
            println!("   {}:", label);
            for f in files {
                println!("     • {}", f.red());
            }
        }
    }
    println!();

    let sf = &report.signature_file;
    println!("{}", "🔏 Signature File".bold());
    println!("   Found:           {}", status(sf.found));
    println!("   Parsed:          {}", status(sf.parsed_ok));
    println!("   Digest-Manifest: {}", status(sf.digest_manifest_ok));
    if sf.sections_checked > 0 {
        println!(
            "   Sections:        {}/{} match",
            sf.sections_checked - sf.mismatched_sections.len(),
            sf.sections_checked
        );
    }
    println!();

    if !report.warnings.is_empty() {
        println!("{}", "⚠️  Warnings".yellow().bold());
        for w in &report.warnings {
            println!("   • {}", w.yellow());
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("{}", "❌ Errors".red().bold());
        for e in &report.errors {
            println!("   • {}", e.red());
        }
        println!();
    }

    println!("{}", "━".repeat(60).dimmed());
    if report.passed {
        println!("{}", " ✅ PASSED - Archive structure and digests verified".green().bold());
    } else {
        println!("{}", " ❌ FAILED - Issues detected".red().bold());
    }
    println!("{}", "━".repeat(60).dimmed());
    println!();
}
