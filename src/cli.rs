use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::normalize::NormalizationRule;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Reconcile CSV and Excel files and build pivot summaries",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show how input columns map onto canonical fields
    Map(MapArgs),
    /// Merge inputs into one table over the canonical schema
    Combine(CombineArgs),
    /// Group, aggregate, and reshape the combined table
    Pivot(PivotArgs),
    /// Report problems with inputs, mapping, combined data, and pivot
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input CSV/TSV/XLSX files (repeatable or comma-separated)
    #[arg(short = 'i', long = "input", required = true, value_delimiter = ',')]
    pub inputs: Vec<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Worksheet to read from workbook inputs
    #[arg(long)]
    pub sheet: Option<String>,
    /// YAML file of manual column -> canonical overrides
    #[arg(long)]
    pub overrides: Option<PathBuf>,
    /// Keep surrounding whitespace in column names
    #[arg(long = "no-trim")]
    pub no_trim: bool,
    /// Keep column name case
    #[arg(long = "no-lowercase")]
    pub no_lowercase: bool,
    /// Keep spaces instead of replacing them with underscores
    #[arg(long = "no-underscore")]
    pub no_underscore: bool,
    /// Keep characters other than letters, digits, and underscores
    #[arg(long = "no-strip")]
    pub no_strip: bool,
}

impl InputArgs {
    pub fn rule(&self) -> NormalizationRule {
        NormalizationRule {
            trim: !self.no_trim,
            lowercase: !self.no_lowercase,
            replace_spaces: !self.no_underscore,
            strip_special: !self.no_strip,
        }
    }
}

#[derive(Debug, Args)]
pub struct MapArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Print the mapping export as JSON instead of a grid
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CombineArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Output file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,
    /// Limit rows shown by the table format
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct PivotArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Pivot configuration JSON; flags below extend it
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Row dimension (repeatable)
    #[arg(long = "row", action = clap::ArgAction::Append)]
    pub rows: Vec<String>,
    /// Column dimension (repeatable)
    #[arg(long = "column", action = clap::ArgAction::Append)]
    pub columns: Vec<String>,
    /// Value field as `column[:sum|count|mean|min|max]` (repeatable)
    #[arg(long = "value", action = clap::ArgAction::Append)]
    pub values: Vec<String>,
    /// Filter as `column=value[,value]` (repeatable)
    #[arg(long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// Write the effective pivot configuration to this JSON file
    #[arg(long = "save-config")]
    pub save_config: Option<PathBuf>,
    /// Output file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Pivot configuration JSON to validate alongside the data
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
    Table,
    Xlsx,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value.to_ascii_lowercase().as_str() {
        "tab" | "\\t" => Ok(b'\t'),
        "comma" => Ok(b','),
        "semicolon" => Ok(b';'),
        "pipe" => Ok(b'|'),
        _ => {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) if ch.is_ascii() => Ok(ch as u8),
                _ => Err(format!(
                    "Delimiter '{value}' must be a single ASCII character"
                )),
            }
        }
    }
}
