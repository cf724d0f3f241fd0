use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sitesurvey_core::config_file::{self, ConfigFile};
use sitesurvey_core::{
    DecodeErrorPolicy, OverwritePolicy, SurveyConfig, SurveyConfigBuilder,
    filter_and_save_top_images,
};
use sitesurvey_pdf::PdfImageBackend;

mod output;

use output::ColorMode;

/// Site Survey Photo Sorter - Pull photos out of site-survey PDFs and file them by topic
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Read settings from this TOML file instead of the default locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract, categorize and rank the photos of a site-survey PDF
    Run {
        /// Path to the site-survey PDF
        pdf: Option<PathBuf>,

        /// Root folder for the category folders
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Folder receiving the highest-resolution copies
        #[arg(long)]
        top_dir: Option<PathBuf>,

        /// Number of highest-resolution images to keep
        #[arg(long)]
        top_n: Option<usize>,

        /// Number of leading pages to ignore
        #[arg(long)]
        skip_pages: Option<usize>,

        /// What to do with files that already exist: overwrite, keep or fail
        #[arg(long)]
        overwrite: Option<OverwritePolicy>,

        /// Warn about and skip images that cannot be decoded instead of aborting
        #[arg(long)]
        skip_undecodable: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Rank an existing output folder and copy its highest-resolution images
    Top {
        /// Folder holding the category folders
        base: Option<PathBuf>,

        /// Destination folder for the ranked copies
        #[arg(long)]
        dest: Option<PathBuf>,

        /// Number of images to keep
        #[arg(long)]
        top_n: Option<usize>,

        /// What to do with summary files that already exist: overwrite, keep or fail
        #[arg(long)]
        overwrite: Option<OverwritePolicy>,
    },

    /// Print the category assigned to a piece of page text
    Classify {
        /// Text to classify; several arguments are joined with spaces
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// List the active categories in precedence order
    Categories,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let file = load_settings(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            pdf,
            output,
            top_dir,
            top_n,
            skip_pages,
            overwrite,
            skip_undecodable,
            json,
            no_color,
        } => {
            let mut builder = file.apply(SurveyConfigBuilder::new());
            if let Some(pdf) = pdf {
                builder = builder.pdf_path(pdf);
            }
            if let Some(dir) = output {
                builder = builder.output_dir(dir);
            }
            if let Some(dir) = top_dir {
                builder = builder.top_dir(dir);
            }
            if let Some(n) = top_n {
                builder = builder.top_n(n);
            }
            if let Some(n) = skip_pages {
                builder = builder.skip_pages(n);
            }
            if let Some(policy) = overwrite {
                builder = builder.overwrite(policy);
            }
            if skip_undecodable {
                builder = builder.on_decode_error(DecodeErrorPolicy::Skip);
            }
            let config = builder.build().context("invalid configuration")?;
            run(&config, json, stdout_color(no_color))
        }
        Command::Top {
            base,
            dest,
            top_n,
            overwrite,
        } => {
            let mut builder = file.apply(SurveyConfigBuilder::new());
            if let Some(base) = base {
                builder = builder.output_dir(base);
            }
            if let Some(dest) = dest {
                builder = builder.top_dir(dest);
            }
            if let Some(n) = top_n {
                builder = builder.top_n(n);
            }
            if let Some(policy) = overwrite {
                builder = builder.overwrite(policy);
            }
            let config = builder.build().context("invalid configuration")?;
            top(&config)
        }
        Command::Classify { text } => {
            let config = file
                .apply(SurveyConfigBuilder::new())
                .build()
                .context("invalid configuration")?;
            let text = text.join(" ");
            println!("{}", config.categories.classify(&text));
            Ok(())
        }
        Command::Categories => {
            let config = file
                .apply(SurveyConfigBuilder::new())
                .build()
                .context("invalid configuration")?;
            let mut stdout = std::io::stdout().lock();
            output::print_categories(&mut stdout, &config.categories, stdout_color(false))?;
            Ok(())
        }
    }
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve the settings file: an explicit `--config` must load, the default
/// cascade is best-effort.
fn load_settings(explicit: Option<&Path>) -> anyhow::Result<ConfigFile> {
    match explicit {
        Some(path) => config_file::read_config(path)
            .with_context(|| format!("failed to load config file {}", path.display())),
        None => Ok(config_file::load_config()),
    }
}

fn run(config: &SurveyConfig, json: bool, color: ColorMode) -> anyhow::Result<()> {
    let backend = PdfImageBackend::new();
    let report = sitesurvey_core::run(config, &backend)
        .with_context(|| format!("failed to process {}", config.pdf_path.display()))?;

    let mut stdout = std::io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut stdout, &report)?;
        writeln!(stdout)?;
    } else {
        output::print_summary(&mut stdout, &report, color)?;
        output::print_completion(&mut stdout, config.top_n, &report.top_dir)?;
    }
    Ok(())
}

fn top(config: &SurveyConfig) -> anyhow::Result<()> {
    let top = filter_and_save_top_images(
        &config.output_dir,
        &config.top_dir,
        config.top_n,
        config.overwrite,
    )
    .with_context(|| format!("failed to rank images under {}", config.output_dir.display()))?;

    let mut stdout = std::io::stdout().lock();
    output::print_top(&mut stdout, &top, stdout_color(false))?;
    output::print_completion(&mut stdout, config.top_n, &config.top_dir)?;
    Ok(())
}

/// Color only when writing to a terminal and not explicitly disabled.
fn stdout_color(no_color: bool) -> ColorMode {
    ColorMode(!no_color && std::io::stdout().is_terminal())
}
