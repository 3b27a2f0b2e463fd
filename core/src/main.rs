use bidsmap_core::cli::{Cli, Command, InputArgs, OutputFormat};
use bidsmap_core::export::export_config;
use bidsmap_core::preprocess::prepare_input;
use bidsmap_core::{
    Analysis, BidsSchema, DatasetConfig, LinkMode, Manifest, Pipeline, Result, TextReport,
};
use clap::Parser;
use log::{error, info};
use std::path::Path;
use std::process;
use std::time::Duration;

fn main() {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(cli.verbose);

    if let Err(e) = run(cli.command) {
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
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

fn run(command: Command) -> Result<()> {
    match command {
        Command::Analyze { input, format } => {
            let schema = load_schema(input.schema.as_deref())?;
            let analysis = analyze(&input, &schema)?;
            match format {
                OutputFormat::Text => println!("{}", TextReport::new(&analysis)),
                OutputFormat::Json => println!("{}", analysis.manifest.to_json_string()?),
            }
        }
        Command::Convert { input, link_mode } => {
            let schema = load_schema(input.schema.as_deref())?;
            let analysis = analyze(&input, &schema)?;
            let report = Pipeline::new(&schema).write(
                &analysis.manifest,
                &input.output_dir(),
                link_mode.into(),
            )?;
            println!("{}", report);
        }
        Command::Apply {
            manifest,
            output_dir,
            link_mode,
            schema,
        } => {
            let schema = load_schema(schema.as_deref())?;
            info!("Loading manifest: {}", manifest.display());
            let manifest = Manifest::from_json_file(&manifest)?;
            let link_mode: LinkMode = link_mode.into();
            let report = Pipeline::new(&schema).write(&manifest, &output_dir, link_mode)?;
            println!("{}", report);
        }
        Command::InitConfig {
            input,
            output,
            schema,
            timeout,
        } => {
            let schema = load_schema(schema.as_deref())?;
            let input = InputArgs {
                input,
                output: None,
                config: None,
                schema: None,
                timeout,
            };
            let analysis = run_pipeline(&input, &schema)?;
            export_config(&analysis.manifest, &output)?;
            println!("Config template created: {}", output.display());
        }
    }
    Ok(())
}

fn load_schema(path: Option<&Path>) -> Result<BidsSchema> {
    match path {
        Some(path) => {
            info!("Loading schema snapshot: {}", path.display());
            BidsSchema::from_json_file(path)
        }
        None => Ok(BidsSchema::builtin()),
    }
}

/// Runs the pipeline and saves the manifest next to the output
fn analyze(input: &InputArgs, schema: &BidsSchema) -> Result<Analysis> {
    let analysis = run_pipeline(input, schema)?;
    let manifest_path = analysis.manifest.save(&input.output_dir())?;
    info!("Manifest written to {}", manifest_path.display());
    Ok(analysis)
}

/// Loads configuration, converts DICOM input if needed and runs the pipeline
fn run_pipeline(input: &InputArgs, schema: &BidsSchema) -> Result<Analysis> {
    // Configuration errors abort before any image is touched
    let config = match &input.config {
        Some(path) => DatasetConfig::from_yaml_file(path)?,
        None => DatasetConfig::default(),
    };

    if !input.input.is_dir() {
        return Err(format!("{} is not a directory", input.input.display()).into());
    }

    let output_dir = input.output_dir();
    std::fs::create_dir_all(&output_dir)?;
    info!("Processing directory: {}", input.input.display());

    let prepared = prepare_input(
        &input.input,
        &output_dir,
        Duration::from_secs(input.timeout),
    )?;

    let analysis = Pipeline::new(schema)
        .with_config(config)
        .analyze_dir(&prepared.data_dir)?;
    Ok(analysis)
}
