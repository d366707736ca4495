use clap::Parser;
use dcmnii_core::cli::report::TextReport;
use dcmnii_core::cli::{Cli, OutputFormat};
use dcmnii_core::Pipeline;
use log::{error, info};
use std::process;

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let format = cli.format.clone();
    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    info!(
        "Processing {} -> {}",
        config.input.display(),
        config.output.display()
    );

    let summary = Pipeline::new(config).run();
    print_summary(&summary, format);
    process::exit(summary.exit_code());
}

fn setup_logging(verbose: bool) {
    if verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }
}

fn print_summary(summary: &dcmnii_core::RunSummary, format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            println!("{}", TextReport::new(summary));
        }
        OutputFormat::Json => {
            #[cfg(feature = "json")]
            {
                match dcmnii_core::cli::report::json_report(summary) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("Failed to serialize summary to JSON: {}", e);
                        eprintln!("Error: Failed to serialize summary to JSON: {}", e);
                        process::exit(1);
                    }
                }
            }
            #[cfg(not(feature = "json"))]
            {
                eprintln!("Error: JSON output requires the 'json' feature");
                eprintln!("Rebuild with: cargo build --features json");
                process::exit(2);
            }
        }
    }
}
