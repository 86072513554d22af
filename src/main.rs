use clap::{Parser, Subcommand, builder::styling};
use eyre::{Result, bail};
use formfill::{cli, config::Settings};
use owo_colors::OwoColorize;
use std::path::PathBuf;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// formfill: read line items off document images and type them into a legacy web form
#[derive(Parser)]
#[command(name = "formfill", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source settings from
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Schema registry file, overrides SCHEMA_FILE
    #[arg(long, global = true)]
    schema: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract line items from page images into an NDJSON record file
    Extract {
        /// Page images or directories of page images, in page order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// The record file to write
        #[arg(short, long, default_value = "records.ndjson")]
        output: PathBuf,

        /// Transaction type selecting the active fields, overrides TRANSACTION_TYPE
        #[arg(short = 't', long = "type")]
        transaction_type: Option<String>,
    },

    /// Fill a record file into an in-memory copy of the host form
    Rehearse {
        /// NDJSON record file, as written by extract
        #[arg(default_value = "records.ndjson")]
        records: PathBuf,

        /// Transaction type selecting the active fields, overrides TRANSACTION_TYPE
        #[arg(short = 't', long = "type")]
        transaction_type: Option<String>,

        /// Write the final form state as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the active fields and their DOM names for the first row
    Schema {
        #[arg(short = 't', long = "type")]
        transaction_type: Option<String>,
    },

    /// Print the extraction prompt
    Prompt {
        #[arg(short = 't', long = "type")]
        transaction_type: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(e) = dotenvy::from_filename(&cli.env)
        && !e.not_found()
    {
        return Err(e.into());
    }

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    let settings = Settings::from_env()?;
    let registry = cli::load_registry(cli.schema.as_deref().or(settings.schema_file.as_deref()))?;
    let pick = |t: Option<String>| t.unwrap_or_else(|| settings.transaction_type.clone());

    match cli.command {
        Commands::Extract {
            inputs,
            output,
            transaction_type,
        } => {
            let transaction_type = pick(transaction_type);
            log::info!(
                "Extracting {} line items from {} input(s)",
                transaction_type.cyan(),
                inputs.len()
            );
            cli::extract_records(&settings, registry, &inputs, &output, &transaction_type)
                .await?;
        }
        Commands::Rehearse {
            records,
            transaction_type,
            output,
        } => {
            let transaction_type = pick(transaction_type);
            log::info!(
                "Rehearsing {} as {}",
                records.display().bright_black(),
                transaction_type.cyan()
            );
            let rehearsal = cli::rehearse(
                &settings,
                registry,
                &records,
                &transaction_type,
                output.as_deref(),
            )
            .await?;

            for (i, result) in rehearsal.results.iter().enumerate() {
                match result {
                    Some(row) => println!("record {:>3} → row {}", i + 1, row.green()),
                    None => println!("record {:>3} → {}", i + 1, "not placed".red()),
                }
            }
            println!("{}", rehearsal.status.to_string().bold());

            if let Some(reason) = rehearsal.aborted {
                bail!("{}", reason);
            }
        }
        Commands::Schema { transaction_type } => {
            let transaction_type = pick(transaction_type);
            let effective = registry.effective_profile(&transaction_type);
            println!(
                "{} {} ({})",
                "Schema".bold(),
                registry.version(),
                effective.cyan()
            );
            for field in cli::describe_fields(&registry, effective, 1)? {
                let kind = if field.calculated {
                    format!("{} calculated", field.kind)
                } else {
                    field.kind.to_string()
                };
                println!(
                    "  {:<16} {:<18} {}",
                    field.id,
                    kind.bright_black(),
                    field.dom_name.green()
                );
            }
        }
        Commands::Prompt { transaction_type } => {
            print!("{}", cli::prompt_for(&registry, &pick(transaction_type)));
        }
    }

    Ok(())
}
