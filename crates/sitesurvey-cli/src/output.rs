use std::io::Write;
use std::path::Path;

use owo_colors::OwoColorize;
use sitesurvey_core::{CategoryTable, RunReport, TopImage, UNCATEGORIZED};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Print the per-category counts, rejections and top images of a run.
pub fn print_summary(w: &mut dyn Write, report: &RunReport, color: ColorMode) -> std::io::Result<()> {
    let pdf_name = report
        .pdf
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| report.pdf.display().to_string());

    writeln!(w, "Extracted {} images from {}", report.extracted, pdf_name)?;
    writeln!(w)?;

    let per_category = report.per_category();
    if per_category.is_empty() {
        writeln!(w, "No photos were saved.")?;
    } else {
        if color.enabled() {
            writeln!(w, "{}", "Saved photos".bold())?;
        } else {
            writeln!(w, "Saved photos")?;
        }
        let width = per_category.keys().map(|k| k.len()).max().unwrap_or(0);
        for (category, count) in &per_category {
            if color.enabled() && *category == UNCATEGORIZED {
                writeln!(w, "  {:<width$}  {:>4}", category.dimmed(), count)?;
            } else if color.enabled() {
                writeln!(w, "  {:<width$}  {:>4}", category.cyan(), count)?;
            } else {
                writeln!(w, "  {:<width$}  {:>4}", category, count)?;
            }
        }
        writeln!(w, "  {:<width$}  {:>4}", "Total", report.saved.len())?;
    }

    let rejected = report.rejected_too_small + report.rejected_black;
    if rejected > 0 {
        let line = format!(
            "(Rejected {} too small, {} all black)",
            report.rejected_too_small, report.rejected_black
        );
        if color.enabled() {
            writeln!(w, "{}", line.dimmed())?;
        } else {
            writeln!(w, "{}", line)?;
        }
    }
    if report.kept_existing > 0 {
        writeln!(w, "(Kept {} existing files)", report.kept_existing)?;
    }
    writeln!(w)?;

    print_top(w, &report.top, color)
}

/// Print the ranked top images.
pub fn print_top(w: &mut dyn Write, top: &[TopImage], color: ColorMode) -> std::io::Result<()> {
    for entry in top {
        let rank = format!("#{}", entry.rank);
        let note = if entry.kept { " (existing file kept)" } else { "" };
        if color.enabled() {
            writeln!(
                w,
                "{:>4} {:>12} px  {}{}",
                rank.green(),
                entry.resolution,
                entry.source.display(),
                note.yellow()
            )?;
        } else {
            writeln!(
                w,
                "{:>4} {:>12} px  {}{}",
                rank,
                entry.resolution,
                entry.source.display(),
                note
            )?;
        }
    }
    if !top.is_empty() {
        writeln!(w)?;
    }
    Ok(())
}

/// The closing line of a run.
pub fn print_completion(w: &mut dyn Write, top_n: usize, folder: &Path) -> std::io::Result<()> {
    writeln!(
        w,
        "Top {} high-resolution images have been saved in the '{}' folder.",
        top_n,
        folder.display()
    )
}

/// Print the category table in precedence order, fallback label last.
pub fn print_categories(
    w: &mut dyn Write,
    table: &CategoryTable,
    color: ColorMode,
) -> std::io::Result<()> {
    for (i, label) in table.labels().enumerate() {
        match table.categories().get(i) {
            Some(category) => {
                let keywords = category.keywords.join(", ");
                if color.enabled() {
                    writeln!(w, "{:>2}. {}: {}", i + 1, label.bold(), keywords.dimmed())?;
                } else {
                    writeln!(w, "{:>2}. {}: {}", i + 1, label, keywords)?;
                }
            }
            None if color.enabled() => writeln!(w, "{:>2}. {}", i + 1, label.dimmed())?,
            None => writeln!(w, "{:>2}. {}", i + 1, label)?,
        }
    }
    Ok(())
}
