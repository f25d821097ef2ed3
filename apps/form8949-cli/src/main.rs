//! form8949 command line
//!
//! Fills Form 8949 from a CSV export of capital asset sales.

mod config;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use form8949_core::pipeline::no_records_reason;
use form8949_core::{
    build, generate, BoxSelection, FileTemplateSource, FormError, GenerationConfig,
    HttpTemplateSource, InputVariant, OfflineTemplateSource, Taxpayer, TemplateSource,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "form8949")]
#[command(version, about = "Fill IRS Form 8949 from a CSV of capital asset sales")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the filled form (one PDF, or a zip of several)
    Generate(GenerateArgs),
    /// Read the CSV and report what would be included
    Check(CheckArgs),
    /// List the coordinate layouts and the tax years they cover
    Layouts {
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// CSV file of sales
    #[arg(short, long)]
    input: PathBuf,

    /// Tax year to report
    #[arg(short, long)]
    year: Option<i32>,

    /// CSV layout: generic or exchange
    #[arg(long)]
    variant: Option<InputVariant>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Taxpayer name printed on every page
    #[arg(short, long)]
    name: Option<String>,

    /// Taxpayer identification number
    #[arg(long)]
    tin: Option<String>,

    /// Reporting box: A, B or C (D, E or F on Part II)
    #[arg(long = "box")]
    box_selection: Option<BoxSelection>,

    /// Base form PDF, or a directory holding f8949-<year>.pdf files
    #[arg(long)]
    template: Option<PathBuf>,

    /// Do not download the official form; draw standalone pages
    #[arg(long)]
    offline: bool,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[command(flatten)]
    input: InputArgs,
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Check(args) => run_check(args),
        Command::Layouts { config } => run_layouts(config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Merge command line values over the configuration file.
fn generation_config(
    input: &InputArgs,
    config: &Config,
    name: Option<&str>,
    tin: Option<&str>,
    box_selection: Option<BoxSelection>,
) -> anyhow::Result<GenerationConfig> {
    let tax_year = input
        .year
        .or(config.form.tax_year)
        .context("No tax year given; pass --year or set [form] tax_year")?;
    let name = name
        .map(str::to_string)
        .or_else(|| config.taxpayer.name.clone())
        .unwrap_or_default();
    let tin = tin
        .map(str::to_string)
        .or_else(|| config.taxpayer.tin.clone())
        .unwrap_or_default();

    Ok(GenerationConfig::new(tax_year, Taxpayer::new(name, tin))
        .with_box(box_selection.or(config.form.box_selection).unwrap_or_default())
        .with_variant(input.variant.or(config.form.variant).unwrap_or_default()))
}

fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))
}

fn template_source(args: &GenerateArgs, config: &Config) -> anyhow::Result<Box<dyn TemplateSource>> {
    if args.offline {
        return Ok(Box::new(OfflineTemplateSource));
    }
    if let Some(path) = args.template.as_ref().or(config.templates.path.as_ref()) {
        return Ok(Box::new(FileTemplateSource::new(path)));
    }
    let catalog = config.templates.catalog()?;
    Ok(Box::new(HttpTemplateSource::new(catalog, config.templates.timeout)?))
}

fn run_generate(args: GenerateArgs) -> anyhow::Result<()> {
    let config = Config::load(args.input.config.as_deref())?;
    let request = generation_config(
        &args.input,
        &config,
        args.name.as_deref(),
        args.tin.as_deref(),
        args.box_selection,
    )?;
    let layouts = config.layout_registry()?;
    let source = template_source(&args, &config)?;
    let csv = read_input(&args.input.input)?;

    let report = generate(&csv, &request, source.as_ref(), &layouts)?;
    let deliverable = report.single_or_archive()?;

    fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create output directory: {}", args.out.display()))?;
    let path = args.out.join(deliverable.filename());
    fs::write(&path, deliverable.bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = deliverable.bytes().len(), "Wrote output");

    for warning in &report.warnings {
        println!("warning: {}", warning);
    }
    println!("{}", report.summary);
    println!("Wrote {}", path.display());
    Ok(())
}

fn run_check(args: CheckArgs) -> anyhow::Result<()> {
    let config = Config::load(args.input.config.as_deref())?;
    let request = generation_config(&args.input, &config, None, None, None)?;
    let csv = read_input(&args.input.input)?;

    let report = build(&csv, &request)?;
    for warning in &report.warnings {
        println!("warning: {}", warning);
    }

    let short = report.records.iter().filter(|r| r.is_short_term).count();
    println!(
        "{} rows: {} short-term, {} long-term, {} outside {}, {} skipped, {} rejected",
        report.total_rows,
        short,
        report.accepted() - short,
        report.out_of_year,
        request.tax_year,
        report.skipped_action,
        report.rejected
    );

    if report.accepted() == 0 {
        let reason = no_records_reason(&report, request.tax_year);
        return Err(FormError::NoRecords(reason).into());
    }
    Ok(())
}

fn run_layouts(config: Option<&Path>) -> anyhow::Result<()> {
    let config = Config::load(config)?;
    let registry = config.layout_registry()?;
    for profile in registry.profiles() {
        let years = match (profile.years.first, profile.years.last) {
            (Some(first), Some(last)) => format!("{}-{}", first, last),
            (Some(first), None) => format!("{} and later", first),
            (None, Some(last)) => format!("{} and earlier", last),
            (None, None) => "all years".to_string(),
        };
        println!(
            "{:<10} {:<18} rows {} x {:.1}pt, row font {}pt",
            profile.revision,
            years,
            profile.part_one.table.capacity,
            profile.part_one.table.row_height,
            profile.fonts.row
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_generate_arguments() {
        let cli = Cli::try_parse_from([
            "form8949", "generate", "--input", "sales.csv", "--year", "2023", "--name",
            "Jane Q Public", "--box", "C", "--variant", "exchange", "--offline",
        ])
        .unwrap();
        match cli.command {
            Command::Generate(args) => {
                assert_eq!(args.input.year, Some(2023));
                assert_eq!(args.box_selection, Some(BoxSelection::C));
                assert_eq!(args.input.variant, Some(InputVariant::Exchange));
                assert!(args.offline);
                assert_eq!(args.out, PathBuf::from("."));
            }
            other => panic!("Expected generate, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_box_rejected() {
        let result = Cli::try_parse_from([
            "form8949", "generate", "--input", "sales.csv", "--box", "Z",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let config = Config::from_str(
            r#"
            [taxpayer]
            name = "From File"
            tin = "000-00-0000"
            [form]
            tax_year = 2022
            box = "B"
            "#,
        )
        .unwrap();
        let input = InputArgs {
            input: PathBuf::from("sales.csv"),
            year: Some(2023),
            variant: None,
            config: None,
        };
        let request = generation_config(&input, &config, Some("From Flag"), None, None).unwrap();
        assert_eq!(request.tax_year, 2023);
        assert_eq!(request.taxpayer.name, "From Flag");
        assert_eq!(request.taxpayer.tin, "000-00-0000");
        assert_eq!(request.box_selection, BoxSelection::B);
        assert_eq!(request.variant, InputVariant::Generic);
    }

    #[test]
    fn test_year_is_required() {
        let input = InputArgs {
            input: PathBuf::from("sales.csv"),
            year: None,
            variant: None,
            config: None,
        };
        let err = generation_config(&input, &Config::default(), None, None, None).unwrap_err();
        assert!(err.to_string().contains("No tax year given"));
    }

    #[test]
    fn test_generate_offline_writes_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("sales.csv");
        fs::write(
            &input,
            "Description,Date Acquired,Date Sold,Proceeds,Cost Basis\n\
             100 sh XYZ,2023-01-15,2023-06-15,100.00,40.00\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "form8949",
            "generate",
            "--input",
            input.to_str().unwrap(),
            "--year",
            "2023",
            "--name",
            "Jane Q Public",
            "--offline",
            "--out",
            dir.path().to_str().unwrap(),
        ])
        .unwrap();
        let Command::Generate(args) = cli.command else {
            panic!("Expected generate");
        };
        run_generate(args).unwrap();

        let written = dir
            .path()
            .join("Form_8949_2023_Part_I_Short_Term_Jane_Q_Public.pdf");
        assert!(fs::read(written).unwrap().starts_with(b"%PDF-"));
    }
}
