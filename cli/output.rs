use anyhow::{Context, Result};
use colored::*;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use xcombine_core::{RunSummary, human_size};

pub fn print_run_summary(summary: &RunSummary) {
    println!();
    println!("{}", " Aggregation Summary ".green().bold().underline());
    println!(
        "{:<20} {}",
        "Root:".green(),
        summary.root.display().to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "Files Combined:".green(),
        summary.report.files.to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "Combined Size:".green(),
        summary.report.combined_size_readable().cyan()
    );
    println!(
        "{:<20} {}",
        "Tree Size:".green(),
        human_size(summary.report.tree_bytes).cyan()
    );
    if summary.read_errors > 0 || summary.traversal_errors > 0 {
        println!(
            "{:<20} {}",
            "Errors:".yellow(),
            format!(
                "{} read, {} traversal (see {})",
                summary.read_errors,
                summary.traversal_errors,
                summary.outputs.debug_log.display()
            )
            .yellow()
        );
    }
}

/// Prints the head of the combined file, the tree, and where the artifacts live.
pub fn print_preview(summary: &RunSummary, preview_lines: usize) -> Result<()> {
    let combined = &summary.outputs.combined;
    println!(
        "{}",
        format!("\nFirst {} lines of {}:", preview_lines, combined.display())
            .green()
            .bold()
    );
    let head = read_head(combined, preview_lines)?;
    write_to_stdout(&head)?;

    println!(
        "{}",
        format!("\nTree structure (from {}):", summary.outputs.tree.display())
            .green()
            .bold()
    );
    write_to_stdout(&summary.tree_text)?;

    if let Some(dir) = combined.parent() {
        println!(
            "\n{} {}",
            "All output files are located in:".green(),
            dir.display().to_string().blue()
        );
    }
    Ok(())
}

fn read_head(path: &Path, lines: usize) -> Result<String> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} for preview", path.display()))?;
    let mut head = String::new();
    let mut reader = BufReader::new(file);
    for _ in 0..lines {
        let mut line = Vec::new();
        let read = reader
            .read_until(b'\n', &mut line)
            .with_context(|| format!("Failed to read preview from {}", path.display()))?;
        if read == 0 {
            break;
        }
        head.push_str(&String::from_utf8_lossy(&line));
    }
    Ok(head)
}

pub fn write_to_stdout(content: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(content.as_bytes())
        .context("Failed to write to stdout")?;
    if !content.ends_with('\n') {
        handle
            .write_all(b"\n")
            .context("Failed to write newline to stdout")?;
    }
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}
