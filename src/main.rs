mod app;
mod audio;
mod candle;
mod config;
mod constants;
mod controller;
mod detector;
mod error;
mod slideshow;
mod smoothing;
mod spectrum;
mod state;
mod ui;
mod wishes;

use clap::Parser;
use dialoguer::{Select, theme::ColorfulTheme};
use error::AppError;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use wishes::{FileStore, Wish};

/// Send logs to a file, stderr, or nowhere. The cake screen owns the
/// terminal, so it never logs to stderr.
fn init_logging(log_file: Option<&Path>, to_stderr: bool) -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let writer = match log_file {
        Some(path) => BoxMakeWriter::new(Mutex::new(File::create(path)?)),
        None if to_stderr => BoxMakeWriter::new(std::io::stderr),
        None => BoxMakeWriter::new(std::io::sink),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_file.is_none())
        .init();
    Ok(())
}

fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let device_list = audio::input_device_names()?;

    if device_list.is_empty() {
        println!("No audio input devices found.");
        return Ok(());
    }

    // Interactive selection
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select an audio input device")
        .items(&device_list)
        .default(0)
        .interact()?;

    println!("{}", device_list[selection]);

    Ok(())
}

fn manage_wishes(store: Option<PathBuf>, import: Option<PathBuf>) -> Result<(), AppError> {
    let mut store = FileStore::open(store.unwrap_or_else(FileStore::default_path));

    if let Some(path) = import {
        let contents = std::fs::read_to_string(&path)?;
        let imported: Vec<Wish> = serde_json::from_str(&contents)?;
        let imported = wishes::validate_wishes(imported);
        wishes::store_wishes(&mut store, &imported)?;
        println!("Stored {} wishes in {}", imported.len(), store.path().display());
        return Ok(());
    }

    for (i, wish) in wishes::load_wishes(&store).iter().enumerate() {
        println!("{}. {}", i + 1, wish.text);
        if let Some(image) = &wish.image {
            println!("   image: {}", image);
        }
        if let Some(header) = &wish.header_image {
            println!("   header: {}", header);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    use app::ExitCode;
    use config::{Args, Commands};

    let args = Args::parse();

    let to_stderr = !matches!(args.command, Commands::Blow(_));
    if let Err(e) = init_logging(args.log_file.as_deref(), to_stderr) {
        eprintln!("Logging error: {}", e);
        std::process::exit(ExitCode::Error as i32);
    }

    match args.command {
        Commands::Blow(blow_args) => {
            let config = match config::Config::from_blow_args(blow_args) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(ExitCode::Error as i32);
                }
            };

            match app::App::new_with_config(config) {
                Ok(app) => {
                    let run_result = app.run().await;
                    match run_result.result {
                        Ok(_) => {
                            std::process::exit(run_result.exit_code as i32);
                        }
                        Err(e) => {
                            eprintln!("Application error: {}", e);
                            std::process::exit(ExitCode::Error as i32);
                        }
                    }
                }
                Err(e) => {
                    eprintln!("Setup error: {}", e);
                    std::process::exit(ExitCode::Error as i32);
                }
            }
        }
        Commands::List(_) => {
            if let Err(e) = list_devices() {
                eprintln!("Error listing devices: {}", e);
                std::process::exit(ExitCode::Error as i32);
            }
        }
        Commands::Calibrate(calibrate_args) => {
            let config = match config::Config::from_calibrate_args(&calibrate_args) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(ExitCode::Error as i32);
                }
            };

            match app::calibrate(&config, calibrate_args.seconds).await {
                Ok(calibration) => {
                    if calibrate_args.quiet {
                        println!("{}", calibration.suggested_threshold.round() as i32);
                    } else {
                        println!("Ambient low-band energy (0-255):");
                        println!("Peak: {:.1}", calibration.peak);
                        println!("Average: {:.1}", calibration.average);
                        println!(
                            "Suggested threshold: {}",
                            calibration.suggested_threshold.round() as i32
                        );
                    }
                }
                Err(e) => {
                    eprintln!("Error during calibration: {}", e);
                    std::process::exit(ExitCode::Error as i32);
                }
            }
        }
        Commands::Wishes(wishes_args) => {
            if let Err(e) = manage_wishes(wishes_args.store, wishes_args.import) {
                eprintln!("Error managing wishes: {}", e);
                std::process::exit(ExitCode::Error as i32);
            }
        }
    }
}
