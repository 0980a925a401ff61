pub mod cli;
pub mod combine;
pub mod data;
pub mod dtype;
pub mod error;
pub mod export;
pub mod files;
pub mod frame;
pub mod io_utils;
pub mod matching;
pub mod normalize;
pub mod overrides;
pub mod pivot;
pub mod pivot_config;
pub mod table;
pub mod validation;
pub mod workbook;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cli::{Cli, Commands, InputArgs, OutputFormat},
    files::{LoadOptions, LoadedFile},
    frame::Table,
    matching::ColumnMapping,
    overrides::OverrideSet,
    pivot_config::{PivotSpec, ValueField},
    validation::{ExportKind, Severity, ValidationInput, ValidationReport},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("pivot_builder", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Map(args) => handle_map(&args),
        Commands::Combine(args) => handle_combine(&args),
        Commands::Pivot(args) => handle_pivot(&args),
        Commands::Validate(args) => handle_validate(&args),
    }
}

/// Loaded inputs plus the mapping built over them.
struct Session {
    files: Vec<LoadedFile>,
    mapping: ColumnMapping,
}

impl Session {
    fn open(args: &InputArgs) -> Result<Self> {
        let options = LoadOptions {
            delimiter: args.delimiter,
            encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
            sheet: args.sheet.clone(),
        };
        let files: Vec<LoadedFile> = args
            .inputs
            .iter()
            .map(|path| LoadedFile::load(path, &options))
            .collect();
        let rule = args.rule();
        let mut mapping = matching::build_initial_mapping(&files::files_columns(&files), &rule);
        if let Some(path) = &args.overrides {
            let overrides = OverrideSet::load(path)
                .with_context(|| format!("Loading mapping overrides from {path:?}"))?;
            overrides.apply(&mut mapping, &files);
        }
        debug!(
            "Mapping has {} canonical field(s) over {} file(s)",
            mapping.canonical_fields().count(),
            mapping.file_ids().count()
        );
        Ok(Self { files, mapping })
    }

    fn combined(&mut self) -> Table {
        let combined = combine::build_combined_dataset_or_empty(&self.files, &self.mapping);
        for name in self.mapping.canonical_names() {
            let kind = combined
                .column_index(&name)
                .and_then(|idx| dtype::column_kind(&combined, idx));
            self.mapping.declare_type(&name, kind);
        }
        combined
    }

    fn validate(
        &self,
        combined: &Table,
        spec: Option<&PivotSpec>,
        pivot: Option<&Table>,
    ) -> ValidationReport {
        validation::validate_all(&ValidationInput {
            files: &self.files,
            mapping: Some(&self.mapping),
            combined: Some(combined),
            pivot_spec: spec,
            pivot,
        })
    }
}

fn handle_map(args: &cli::MapArgs) -> Result<()> {
    let mut session = Session::open(&args.input)?;
    session.combined();
    if args.json {
        let export = session.mapping.export();
        println!(
            "{}",
            serde_json::to_string_pretty(&export).context("Serializing column mapping")?
        );
        return Ok(());
    }

    let loaded: Vec<&LoadedFile> = session.files.iter().filter(|f| f.is_loaded()).collect();
    let mut headers = vec!["canonical".to_string(), "type".to_string()];
    headers.extend(loaded.iter().map(|f| f.display_name()));
    let rows: Vec<Vec<String>> = session
        .mapping
        .canonical_fields()
        .map(|field| {
            let mut row = vec![
                field.name.clone(),
                field
                    .declared_type
                    .map(|kind| kind.to_string())
                    .unwrap_or_default(),
            ];
            row.extend(loaded.iter().map(|file| {
                session
                    .mapping
                    .original_for(&file.id, &field.name)
                    .unwrap_or_default()
                    .to_string()
            }));
            row
        })
        .collect();
    print!("{}", table::render_rows(&headers, &rows));

    for file in &loaded {
        let unmapped = session
            .mapping
            .columns_for(&file.id)
            .iter()
            .filter(|a| a.canonical.is_none())
            .map(|a| a.original.as_str())
            .join(", ");
        if !unmapped.is_empty() {
            println!("unmapped in {}: {unmapped}", file.display_name());
        }
    }
    for file in session.files.iter().filter(|f| !f.is_loaded()) {
        println!("not loaded: {} ({})", file.display_name(), file.status);
    }
    Ok(())
}

fn handle_combine(args: &cli::CombineArgs) -> Result<()> {
    let mut session = Session::open(&args.input)?;
    let combined = session.combined();
    let report = session.validate(&combined, None, None);
    refuse_blocked(&report, ExportKind::Combined)?;
    emit(&combined, args.format, args.output.as_deref(), args.limit)
}

fn handle_pivot(args: &cli::PivotArgs) -> Result<()> {
    let spec = effective_spec(args)?;
    if let Some(path) = &args.save_config {
        spec.save(path)
            .with_context(|| format!("Saving pivot configuration to {path:?}"))?;
        info!("Pivot configuration saved to {path:?}");
    }

    let mut session = Session::open(&args.input)?;
    let combined = session.combined();
    let pivot = pivot::build_pivot(&combined, &spec).context("Building pivot table")?;
    let report = session.validate(&combined, Some(&spec), Some(&pivot));
    refuse_blocked(&report, ExportKind::Pivot)?;
    emit(&pivot, args.format, args.output.as_deref(), None)
}

fn handle_validate(args: &cli::ValidateArgs) -> Result<()> {
    let spec = args
        .config
        .as_deref()
        .map(PivotSpec::load)
        .transpose()?;
    let mut session = Session::open(&args.input)?;
    let combined = session.combined();
    let pivot = spec
        .as_ref()
        .map(|spec| pivot::build_pivot_or_empty(&combined, spec));
    let report = session.validate(&combined, spec.as_ref(), pivot.as_ref());

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Serializing validation report")?
        );
    } else {
        print_report(&report);
    }

    let kind = if spec.is_some() {
        ExportKind::Pivot
    } else {
        ExportKind::Combined
    };
    if report.has_blocking_errors_for_export(kind) {
        bail!("Validation found blocking issues");
    }
    Ok(())
}

/// Config file first, then command-line fields layered on top.
fn effective_spec(args: &cli::PivotArgs) -> Result<PivotSpec> {
    let mut spec = match &args.config {
        Some(path) => PivotSpec::load(path)?,
        None => PivotSpec::default(),
    };
    for field in &args.rows {
        spec.add_row(field);
    }
    for field in &args.columns {
        spec.add_column(field);
    }
    for value in &args.values {
        let ValueField {
            column,
            aggregation,
        } = ValueField::parse(value)?;
        spec.add_value(&column, aggregation);
    }
    for filter in &args.filters {
        spec.add_filter(filter)?;
    }
    if !spec.is_valid() {
        warn!("Pivot configuration has no value fields; output will be empty");
    }
    Ok(spec)
}

fn refuse_blocked(report: &ValidationReport, kind: ExportKind) -> Result<()> {
    if !report.has_blocking_errors_for_export(kind) {
        return Ok(());
    }
    for issue in report.errors().into_iter().chain(report.warnings()) {
        warn!("[{}] {}", issue.code, issue.message);
    }
    let codes = report
        .issues
        .iter()
        .filter(|i| i.severity != Severity::Info)
        .map(|i| i.code)
        .join(", ");
    bail!("Export blocked by validation: {codes}")
}

fn emit(
    table: &Table,
    format: OutputFormat,
    output: Option<&Path>,
    limit: Option<usize>,
) -> Result<()> {
    match format {
        OutputFormat::Csv => export::write_csv(table, output),
        OutputFormat::Json => export::write_json_records(table, output),
        OutputFormat::Xlsx => match output {
            Some(path) if !io_utils::is_dash(path) => export::write_xlsx(table, path),
            _ => bail!("--format xlsx needs an output file given with -o"),
        },
        OutputFormat::Table => {
            if output.is_some() {
                warn!("--output is ignored for table format");
            }
            table::print_table(table, limit);
            Ok(())
        }
    }
}

fn print_report(report: &ValidationReport) {
    if report.issues.is_empty() {
        println!("No issues found");
        return;
    }
    for issue in &report.issues {
        println!(
            "{:<7}  {:<28}  {}",
            issue.severity.to_string(),
            issue.code,
            issue.message
        );
    }
}
