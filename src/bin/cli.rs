//! MetroWeb extraction CLI
//!
//! Logs into the INTI MetroWeb portal, reads every instrument of a work
//! order's VPE and writes the result as an xlsx workbook.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use metroweb::{
    error::{AppError, Result},
    export,
    models::{Config, Credentials, OutputFormat, OutputRow, WorkOrder},
    pipeline::{self, ExportRequest},
    presenter::Presenter,
    services::HttpPortal,
};

const USER_ENV: &str = "METROWEB_USER";
const PASSWORD_ENV: &str = "METROWEB_PASS";

/// MetroWeb - VPE instrument extractor
#[derive(Parser, Debug)]
#[command(
    name = "metroweb",
    version,
    about = "Extracts INTI MetroWeb VPE instrument data into XLSX workbooks"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "data/metroweb.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract a work order's instruments from the portal
    Extract {
        /// Work order number, e.g. 307-62136
        #[arg(long)]
        ot: Option<String>,

        /// Portal username (default: $METROWEB_USER, then prompt)
        #[arg(long)]
        user: Option<String>,

        /// Portal password (default: $METROWEB_PASS, then prompt)
        #[arg(long)]
        pass: Option<String>,

        /// Output workbook (default: OT_<ot>_<owner>.xlsx)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Layout: wide, campo-valor or template (default from config)
        #[arg(short, long)]
        format: Option<OutputFormat>,

        /// Template workbook for the template layout
        #[arg(long)]
        template: Option<PathBuf>,

        /// Also insert the data as first sheet of a copy of this workbook
        #[arg(long)]
        merge_into: Option<PathBuf>,

        /// Also write the extraction as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Fill a template from a workbook written by `extract`
    Fill {
        /// Workbook with extracted rows (wide or Campo/Valor)
        #[arg(long)]
        raw: PathBuf,

        /// Template workbook (default from config)
        #[arg(long)]
        template: Option<PathBuf>,

        /// Output workbook (default: OT_<ot>_<owner>.xlsx)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Insert rows from a workbook written by `extract` into a copy of
    /// another workbook
    Merge {
        /// Workbook with extracted rows (wide or Campo/Valor)
        #[arg(long)]
        raw: PathBuf,

        /// Workbook receiving the new first sheet
        #[arg(long)]
        base: PathBuf,
    },

    /// Validate the configuration file
    Validate,

    /// Print the configuration in use as TOML
    Config {
        /// Print the built-in defaults instead
        #[arg(long)]
        defaults: bool,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Presenter for an interactive terminal.
struct ConsolePresenter;

impl Presenter for ConsolePresenter {
    fn log(&self, message: &str) {
        log::info!("{}", message);
    }

    fn progress(&self, current: usize, total: usize) {
        log::info!("Progress: {}/{} instruments", current, total);
    }

    fn prompt_credentials(&self) -> Result<Credentials> {
        let username = prompt("MetroWeb user")?;
        let password = rpassword::prompt_password("MetroWeb password: ")?;
        Ok(Credentials::new(username, password))
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Credentials from flags, then the environment. `None` means prompt.
fn credentials_from(user: Option<String>, pass: Option<String>) -> Option<Credentials> {
    let user = user.or_else(|| std::env::var(USER_ENV).ok())?;
    let pass = pass.or_else(|| std::env::var(PASSWORD_ENV).ok())?;
    Some(Credentials::new(user, pass))
}

type Ask<'a> = dyn FnMut(&str) -> Result<String> + 'a;

/// Keep asking for another path while saving fails; empty input gives up.
fn save_with_retry<T>(
    mut path: PathBuf,
    question: &str,
    ask: &mut Ask<'_>,
    mut save: impl FnMut(&Path) -> Result<T>,
) -> Result<T> {
    loop {
        match save(&path) {
            Ok(value) => return Ok(value),
            Err(e @ (AppError::Io(_) | AppError::Xlsx(_))) => {
                log::error!("Could not save {}: {}", path.display(), e);
                let answer = ask(question)?;
                if answer.is_empty() {
                    return Err(e);
                }
                path = PathBuf::from(answer);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Write the workbook, then the merge copy. A failed step is retried on
/// its own; a written workbook is never written again.
fn save_outputs<T>(
    output: PathBuf,
    merge_base: Option<PathBuf>,
    ask: &mut Ask<'_>,
    write: impl FnMut(&Path) -> Result<T>,
    merge: impl FnMut(&Path) -> Result<PathBuf>,
) -> Result<(T, Option<PathBuf>)> {
    let written = save_with_retry(output, "Another output path (empty to give up)", ask, write)?;
    let merged = match merge_base {
        Some(base) => Some(save_with_retry(
            base,
            "Another workbook to merge into (empty to give up)",
            ask,
            merge,
        )?),
        None => None,
    };
    Ok((written, merged))
}

/// Configuration printed by `config`.
fn printable_config(path: &Path, defaults: bool) -> Config {
    if defaults {
        Config::default()
    } else {
        Config::load_or_default(path)
    }
}

fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        Config::load(path)?
    } else {
        Config::load_or_default(path)
    };
    config.validate()?;
    Ok(config)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Extract {
            ot,
            user,
            pass,
            out,
            format,
            template,
            merge_into,
            json,
        } => {
            let config = load_config(&cli.config)?;
            let work_order = match ot {
                Some(ot) => WorkOrder::new(ot),
                None => WorkOrder::new(prompt("Work order (OT)")?),
            };

            let portal = HttpPortal::new(&config.portal)?;
            let presenter = ConsolePresenter;
            let extraction = pipeline::run_extraction(
                &config,
                &portal,
                credentials_from(user, pass),
                &work_order,
                &presenter,
            )
            .await?;

            if let Some(json) = json {
                std::fs::write(&json, serde_json::to_string_pretty(&extraction)?)?;
                log::info!("Extraction saved to {}", json.display());
            }

            let output = out.unwrap_or_else(|| {
                PathBuf::from(pipeline::suggest_file_name(
                    &extraction.tramite.work_order,
                    extraction.tramite.owner(),
                ))
            });
            let format = format.unwrap_or(config.export.format);
            let (_, merged) = save_outputs(
                output,
                merge_into,
                &mut prompt,
                |path| {
                    let request = ExportRequest {
                        format,
                        output: path.to_path_buf(),
                        template: template.clone(),
                        merge_into: None,
                    };
                    pipeline::run_export(&config.export, &extraction.rows, &request)
                },
                |base| export::merge_into(base, &extraction.rows, &config.export.merge),
            )?;
            if let Some(copy) = merged {
                log::info!("Saved {}", copy.display());
            }

            if !extraction.report.is_clean() {
                log::warn!(
                    "Finished with {} warnings; check the fields listed above",
                    extraction.report.degradations.len()
                );
            }
        }

        Command::Fill { raw, template, out } => {
            let config = load_config(&cli.config)?;
            let rows = export::read_rows(&raw)?;
            if rows.is_empty() {
                log::warn!("{} holds no instruments; nothing to fill", raw.display());
                return Ok(());
            }

            let output = out.unwrap_or_else(|| PathBuf::from(pipeline::suggest_for_rows(&rows)));
            let written = save_with_retry(output, "Another output path (empty to give up)", &mut prompt, |path| {
                let writer = export::writer_for(OutputFormat::Template, &config.export, template.as_deref())?;
                writer.write(&rows, path)
            })?;
            for path in written {
                log::info!("Generated {}", path.display());
            }
        }

        Command::Merge { raw, base } => {
            let config = load_config(&cli.config)?;
            let rows: Vec<OutputRow> = export::read_rows(&raw)?;
            let copy = export::merge_into(&base, &rows, &config.export.merge)?;
            log::info!("Saved {}", copy.display());
        }

        Command::Validate => {
            let config = Config::load(&cli.config)?;
            config.validate()?;
            log::info!("Configuration is valid: {}", cli.config.display());
        }

        Command::Config { defaults } => {
            let config = printable_config(&cli.config, defaults);
            println!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
