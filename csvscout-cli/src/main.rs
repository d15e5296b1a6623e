use clap::{Parser, Subcommand};
use colored::Colorize;
use csvscout::{
    config::ConfigOverrides,
    enrich::UrlTemplateImageSource,
    filter::{FilterEngine, FilterOutput, Finish},
    FilterConfig, FilterError, Record, RecordStore,
};
use std::{num::NonZeroUsize, path::PathBuf, process};
use tracing::debug;

type Result<T> = std::result::Result<T, FilterError>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file, layered over the default locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// CSV file with `id,name[,image]` rows
    #[arg(short = 'f', long, global = true)]
    data_file: Option<PathBuf>,

    /// Maximum number of worker threads
    #[arg(short = 'j', long, global = true)]
    threads: Option<NonZeroUsize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Concurrently select records whose id matches a filter kind
    Filter {
        /// Filter kind (odd, even)
        #[arg(short = 't', long = "type")]
        kind: String,

        /// Maximum number of records to return
        #[arg(short = 'n', long, allow_negative_numbers = true)]
        items: i64,

        /// Maximum number of records each worker may contribute
        #[arg(short = 'w', long, allow_negative_numbers = true)]
        items_per_worker: i64,

        /// Sort results by id instead of arrival order
        #[arg(long)]
        sorted: bool,

        /// Capacity of the match channel
        #[arg(long)]
        channel_capacity: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a single record
    Get {
        id: i64,

        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },

    /// List every record in id order
    List {
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fill in the image column of every record and rewrite the data file
    UpdateImages {
        /// URL template; `{id}` and `{name}` are substituted
        #[arg(long)]
        template: Option<String>,
    },

    /// Print the effective configuration
    ShowConfig,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", "error:".red().bold(), e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut overrides = ConfigOverrides {
        data_file: cli.data_file,
        thread_count: cli.threads,
        log_level: cli.log_level,
        ..Default::default()
    };
    match &cli.command {
        Commands::Filter {
            sorted,
            channel_capacity,
            ..
        } => {
            overrides.sort_results = *sorted;
            overrides.channel_capacity = *channel_capacity;
        }
        Commands::UpdateImages { template } => {
            overrides.image_url_template = template.clone();
        }
        _ => {}
    }

    let config = FilterConfig::load_from(cli.config.as_deref())?.merge_with_cli(overrides);
    csvscout::logging::init(&config.log_level)?;
    debug!("Effective configuration: {:?}", config);

    match cli.command {
        Commands::Filter {
            kind,
            items,
            items_per_worker,
            json,
            ..
        } => {
            let engine = FilterEngine::new(config);
            let output = engine.filter_file(
                &engine.config().data_file,
                &kind,
                items,
                items_per_worker,
            )?;
            if json {
                print_json(&output.records)?;
            } else {
                print_filter_output(&output, items);
            }
            Ok(())
        }
        Commands::Get { id, json } => {
            let store = RecordStore::open(&config)?;
            let record = store.get_by_id(id)?;
            if json {
                print_json(&record)?;
            } else {
                print_record(&record);
            }
            Ok(())
        }
        Commands::List { json } => {
            let store = RecordStore::open(&config)?;
            let records = store.get_all();
            if json {
                print_json(&records)?;
            } else {
                for record in &records {
                    print_record(record);
                }
                println!("\n{} records", records.len());
            }
            Ok(())
        }
        Commands::UpdateImages { .. } => {
            let source = UrlTemplateImageSource::new(config.image_url_template.clone())?;
            let store = RecordStore::open(&config)?;
            let updated = store.update_images(&source)?;
            println!(
                "Updated images for {} records in {}",
                updated.len().to_string().green(),
                store.path().display().to_string().blue()
            );
            Ok(())
        }
        Commands::ShowConfig => {
            print!("{}", config.to_yaml()?);
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

fn print_record(record: &Record) {
    if record.image.is_empty() {
        println!("{}: {}", record.id.to_string().green(), record.name);
    } else {
        println!(
            "{}: {} {}",
            record.id.to_string().green(),
            record.name,
            record.image.dimmed()
        );
    }
}

fn print_filter_output(output: &FilterOutput, requested: i64) {
    for record in &output.records {
        print_record(record);
    }

    let summary = format!(
        "\nFound {} of {} requested records using {} workers in {}",
        output.records.len(),
        requested,
        output.workers,
        format_elapsed(output.elapsed)
    );
    if output.finish == Finish::WorkersFinished && (output.records.len() as i64) < requested {
        println!("{} {}", summary, "(data exhausted before target)".yellow());
    } else {
        println!("{}", summary);
    }
}

fn format_elapsed(elapsed: std::time::Duration) -> String {
    format!("{:.2}ms", elapsed.as_secs_f64() * 1000.0)
}
