//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use berclean_core::pipeline::{CleanConfig, CleanResult, ProgressReporter, clean_file};
use berclean_core::tables::ReferenceTables;
use berclean_dataset::default_output_path;
use berclean_shared::{
    AppConfig, PipelineOptions, UnknownTypologyPolicy, config_file_path, init_config, load_config,
};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// berclean: clean and validate energy certificate datasets.
#[derive(Parser)]
#[command(
    name = "berclean",
    version,
    about = "Derive, correct and plausibility-check residential energy certificate CSV files.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Policy for dwelling types missing from the typology table.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum TypologyPolicyArg {
    Exclude,
    Pass,
}

impl From<TypologyPolicyArg> for UnknownTypologyPolicy {
    fn from(arg: TypologyPolicyArg) -> Self {
        match arg {
            TypologyPolicyArg::Exclude => UnknownTypologyPolicy::Exclude,
            TypologyPolicyArg::Pass => UnknownTypologyPolicy::Pass,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Clean a certificate CSV file.
    Process {
        /// Input CSV file.
        input: PathBuf,

        /// Cleaned output file (defaults to <input stem>_cleaned.csv).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep every row; skip plausibility checks and the excluded file.
        #[arg(long)]
        no_filter: bool,

        /// Rows per chunk.
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Reference tables TOML file replacing the built-in tables.
        #[arg(long)]
        tables: Option<PathBuf>,

        /// What to do with dwelling types that have no typology ranges.
        #[arg(long, value_enum)]
        unknown_typology: Option<TypologyPolicyArg>,
    },

    /// Inspect or export the reference tables.
    Tables {
        #[command(subcommand)]
        action: TablesAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Reference table subcommands.
#[derive(Subcommand)]
pub(crate) enum TablesAction {
    /// Print the effective tables as TOML.
    Show,
    /// Write the built-in tables to a TOML file for editing.
    Export {
        /// Destination file.
        path: PathBuf,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "berclean=info",
        1 => "berclean=debug",
        _ => "berclean=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Process {
            input,
            output,
            no_filter,
            chunk_size,
            tables,
            unknown_typology,
        } => {
            let overrides = ProcessOverrides {
                no_filter,
                chunk_size,
                tables,
                unknown_typology: unknown_typology.map(UnknownTypologyPolicy::from),
            };
            cmd_process(&input, output, overrides)
        }
        Command::Tables { action } => match action {
            TablesAction::Show => cmd_tables_show(),
            TablesAction::Export { path } => cmd_tables_export(&path),
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

/// Command-line values that take precedence over the config file.
struct ProcessOverrides {
    no_filter: bool,
    chunk_size: Option<usize>,
    tables: Option<PathBuf>,
    unknown_typology: Option<UnknownTypologyPolicy>,
}

fn resolve_options(config: &AppConfig, overrides: ProcessOverrides) -> PipelineOptions {
    let mut options = PipelineOptions::from(config);
    if overrides.no_filter {
        options.filter = false;
    }
    if let Some(chunk_size) = overrides.chunk_size {
        options.chunk_size = chunk_size;
    }
    if let Some(tables) = overrides.tables {
        options.tables_path = Some(tables);
    }
    if let Some(policy) = overrides.unknown_typology {
        options.unknown_typology = policy;
    }
    options
}

fn load_tables(path: Option<&Path>) -> Result<ReferenceTables> {
    match path {
        Some(path) => ReferenceTables::load_from(path)
            .wrap_err_with(|| format!("failed to load reference tables from {}", path.display())),
        None => Ok(ReferenceTables::default()),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_process(input: &Path, output: Option<PathBuf>, overrides: ProcessOverrides) -> Result<()> {
    if !input.is_file() {
        return Err(eyre!("input file '{}' does not exist", input.display()));
    }

    let config = load_config()?;
    let options = resolve_options(&config, overrides);
    options.validate()?;
    let tables = load_tables(options.tables_path.as_deref())?;

    let output = output.unwrap_or_else(|| default_output_path(input));

    info!(
        input = %input.display(),
        output = %output.display(),
        filter = options.filter,
        "processing certificates"
    );

    let clean_config = CleanConfig {
        input: input.to_path_buf(),
        output,
        options,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let reporter = CliProgress::new();
    let result = clean_file(&clean_config, &tables, &reporter)?;

    let summary = &result.summary;
    println!();
    println!("  Certificates cleaned.");
    println!("  Run:       {}", result.run_id);
    println!("  Read:      {}", summary.rows_read);
    println!("  Kept:      {}", summary.rows_kept);
    if let Some(excluded) = &result.excluded_path {
        println!("  Excluded:  {} ({})", summary.rows_excluded, excluded.display());
    }
    println!(
        "  Corrected: {} county, {} storeys, {} wall U, {} roof U",
        summary.corrections.county,
        summary.corrections.storeys,
        summary.corrections.wall_u_value,
        summary.corrections.roof_u_value
    );
    if !summary.unknown_typologies.is_empty() {
        let names: Vec<&str> = summary.unknown_typologies.iter().map(String::as_str).collect();
        println!("  Unknown dwelling types: {}", names.join(", "));
    }
    println!("  Output:    {}", result.kept_path.display());
    println!("  Summary:   {}", result.manifest_path.display());
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_tables_show() -> Result<()> {
    let config = load_config()?;
    let options = PipelineOptions::from(&config);
    let tables = load_tables(options.tables_path.as_deref())?;
    println!("{}", tables.to_toml_string()?);
    Ok(())
}

fn cmd_tables_export(path: &Path) -> Result<()> {
    let content = ReferenceTables::default().to_toml_string()?;
    std::fs::write(path, content).wrap_err_with(|| format!("failed to write {}", path.display()))?;
    println!("Reference tables written to: {}", path.display());
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("# {}", config_file_path()?.display());
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn chunk_done(&self, chunk: usize, rows_read: usize) {
        self.spinner
            .set_message(format!("Cleaning [chunk {chunk}] {rows_read} rows"));
    }

    fn done(&self, _result: &CleanResult) {
        self.spinner.finish_and_clear();
    }
}
