use colored::Colorize;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use wrap_store::{AnalysisReport, Checksum, CodeStore};

fn open(data_dir: &Path) -> Result<CodeStore, String> {
    CodeStore::open(data_dir).map_err(|e| e.to_string())
}

fn read_input(file: &str) -> Result<Vec<u8>, String> {
    if file == "-" {
        let mut buf = Vec::new();
        io::stdin()
            .read_to_end(&mut buf)
            .map_err(|e| format!("read stdin: {e}"))?;
        Ok(buf)
    } else {
        fs::read(file).map_err(|e| format!("read file: {e}"))
    }
}

fn parse_checksum(hex: &str) -> Result<Checksum, String> {
    hex.parse().map_err(|e| format!("parse checksum: {e}"))
}

// ── checksum ────────────────────────────────────────────────────

pub fn checksum(file: &str) -> Result<(), String> {
    let bytes = read_input(file)?;
    println!("{}", Checksum::of(&bytes));
    Ok(())
}

// ── create ──────────────────────────────────────────────────────

pub fn create(data_dir: &Path, file: &str) -> Result<(), String> {
    let store = open(data_dir)?;
    let bytes = read_input(file)?;
    let checksum = store.create(&bytes).map_err(|e| e.to_string())?;
    println!("{} {}", "Checksum:".dimmed(), checksum.to_string().cyan());
    println!("{} {} bytes", "Size:    ".dimmed(), bytes.len());
    println!("{} {}", "Path:    ".dimmed(), store.code_path(&checksum).display());
    Ok(())
}

// ── get ─────────────────────────────────────────────────────────

pub fn get(data_dir: &Path, hex: &str, out: Option<&str>) -> Result<(), String> {
    let store = open(data_dir)?;
    let checksum = parse_checksum(hex)?;
    let code = store.get_code(&checksum).map_err(|e| e.to_string())?;
    match out {
        Some(path) => {
            fs::write(path, &code).map_err(|e| format!("write {path}: {e}"))?;
            eprintln!("{} {} bytes → {}", "✓".green(), code.len(), path);
        }
        None => io::stdout()
            .write_all(&code)
            .map_err(|e| format!("write stdout: {e}"))?,
    }
    Ok(())
}

// ── analyze ─────────────────────────────────────────────────────

pub fn analyze(data_dir: &Path, hex: &str, json: bool) -> Result<(), String> {
    let store = open(data_dir)?;
    let checksum = parse_checksum(hex)?;
    let report = store.analyze_code(&checksum).map_err(|e| e.to_string())?;

    if json {
        println!("{}", report_json(&report)?);
        return Ok(());
    }
    println!("{} {}", "Code:".bold(), checksum.to_string().dimmed());
    let ibc = if report.has_ibc_entry_points {
        "yes".green().bold()
    } else {
        "no".normal()
    };
    println!("  {} {}", "IBC entry points:".dimmed(), ibc);
    if report.required_capabilities.is_empty() {
        println!("  {} {}", "Capabilities:    ".dimmed(), "none".dimmed());
    } else {
        let caps: Vec<&str> = report.required_capabilities.iter().map(String::as_str).collect();
        println!("  {} {}", "Capabilities:    ".dimmed(), caps.join(", ").yellow());
    }
    if !report.exports.is_empty() {
        println!("  {}:", "exports".dimmed());
        for name in &report.exports {
            println!("    {} {}", "•".dimmed(), name);
        }
    }
    Ok(())
}

fn report_json(report: &AnalysisReport) -> Result<String, String> {
    serde_json::to_string_pretty(report).map_err(|e| format!("encode report: {e}"))
}

// ── list ────────────────────────────────────────────────────────

pub fn list(data_dir: &Path) -> Result<(), String> {
    let store = open(data_dir)?;
    let all = store.list().map_err(|e| e.to_string())?;
    if all.is_empty() {
        println!("{}", "No code stored.".dimmed());
        return Ok(());
    }
    println!("{} {} entries\n", "Store:".bold(), all.len());
    for checksum in all {
        let size = store
            .manifest(&checksum)
            .ok()
            .flatten()
            .map(|m| format!("{} bytes", m.size))
            .unwrap_or_else(|| "?".into());
        println!("  {} {} {}", "•".dimmed(), checksum, size.dimmed());
    }
    Ok(())
}
