use std::num::ParseIntError;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};
use tblimg_core::{
    ContainerFormat, ConvertOptions, IMAGE_HEADER_LEN, IdentityDefaults, ObjectFile, PayloadBound,
    TableDefinition, convert_object, read_table_definition, verify_image,
};

/// Convert an object file's CFE_TBL_FileDef table into a cFE table image
#[derive(Parser)]
#[command(name = "elf2cfetbl", version, author)]
struct Cli {
    /// ELF or Mach-O object file holding the table
    input: PathBuf,

    /// Table image to write
    output: PathBuf,

    /// Spacecraft id stamped into the file header (decimal or 0x hex)
    #[arg(short = 's', long, default_value_t = 0, value_parser = parse_id)]
    spacecraft_id: u32,

    /// Processor id stamped into the file header (decimal or 0x hex)
    #[arg(short = 'p', long, default_value_t = 0, value_parser = parse_id)]
    processor_id: u32,

    /// Application id stamped into the file header (decimal or 0x hex)
    #[arg(short = 'a', long, default_value_t = 0, value_parser = parse_id)]
    application_id: u32,

    /// File header timestamp, seconds
    #[arg(long, default_value_t = 0)]
    seconds: u32,

    /// File header timestamp, subseconds
    #[arg(long, default_value_t = 0)]
    subseconds: u32,

    /// End the payload at object_size instead of offset + object_size, as
    /// older converters did
    #[arg(long)]
    legacy_payload_bound: bool,

    /// List the input's sections and defined symbols before converting
    #[arg(short, long)]
    list: bool,

    /// Print the table summary as JSON
    #[arg(long, conflicts_with = "quiet")]
    json: bool,

    /// Re-read the input object from disk, decode the written image's header
    /// independently, and check both agree on names, size, identity and
    /// payload bytes
    #[arg(long)]
    verify: bool,

    /// Do not print the table summary
    #[arg(short, long)]
    quiet: bool,
}

fn parse_id(s: &str) -> Result<u32, ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

impl Cli {
    fn options(&self) -> ConvertOptions {
        ConvertOptions {
            identity: IdentityDefaults {
                spacecraft_id: self.spacecraft_id,
                processor_id: self.processor_id,
                application_id: self.application_id,
                time_seconds: self.seconds,
                time_subseconds: self.subseconds,
            },
            payload_bound: if self.legacy_payload_bound {
                PayloadBound::Declared
            } else {
                PayloadBound::Relative
            },
        }
    }
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct SectionRow {
    #[tabled(rename = "Index")]
    index: usize,
    #[tabled(rename = "Section")]
    name: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Size")]
    size: String,
}

#[derive(Tabled)]
struct SymbolRow {
    #[tabled(rename = "Symbol")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Section")]
    section: String,
}

#[derive(Serialize)]
struct Summary<'a> {
    input: &'a str,
    format: ContainerFormat,
    output: String,
    #[serde(flatten)]
    table: &'a TableDefinition,
    image_len: usize,
}

fn print_listing(object: &ObjectFile) {
    let sections: Vec<SectionRow> = object
        .sections()
        .iter()
        .enumerate()
        .map(|(index, s)| SectionRow {
            index,
            name: s.name.clone(),
            address: format!("0x{:x}", s.address),
            size: format!("0x{:x}", s.len()),
        })
        .collect();

    let symbols: Vec<SymbolRow> = object
        .symbols()
        .iter()
        .map(|sym| SymbolRow {
            name: sym.name.clone(),
            value: format!("0x{:x}", sym.value),
            section: match sym.section_index.and_then(|i| object.sections().get(i)) {
                Some(s) => s.name.clone(),
                None => "-".to_string(),
            },
        })
        .collect();

    if sections.is_empty() {
        println!("No sections found.");
    } else {
        println!("{}", Table::new(sections).with(Style::sharp()));
    }
    if symbols.is_empty() {
        println!("No defined symbols found (stripped object?).");
    } else {
        println!("{}", Table::new(symbols).with(Style::sharp()));
    }
}

fn print_summary(summary: &Summary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    let meta = &summary.table.metadata;
    let rows = vec![
        Row {
            field: "Data Object",
            value: meta.object_name.clone(),
        },
        Row {
            field: "Table Name",
            value: format!("'{}'", meta.table_name),
        },
        Row {
            field: "Description",
            value: format!("'{}'", meta.description),
        },
        Row {
            field: "Output File",
            value: meta.target_file_name.clone(),
        },
        Row {
            field: "Object Size",
            value: format!("{} (0x{:08X})", meta.object_size, meta.object_size),
        },
    ];
    println!("Table defined in {} ({}):", summary.input, summary.format);
    println!("{}", Table::new(rows).with(Style::sharp()));
    println!("Wrote {} bytes to {}", summary.image_len, summary.output);
    Ok(())
}

fn verify(cli: &Cli, options: &ConvertOptions) -> Result<()> {
    let written = std::fs::read(&cli.output)
        .with_context(|| format!("re-reading {}", cli.output.display()))?;
    let reread = ObjectFile::open(&cli.input)
        .and_then(|object| read_table_definition(&object, options.payload_bound))
        .with_context(|| format!("re-reading table from {}", cli.input.display()))?;

    verify_image(&written, &reread, options.identity)
        .with_context(|| format!("verifying {}", cli.output.display()))?;
    log::info!("Verified {}", cli.output.display());
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    ensure!(
        cli.input.exists(),
        "file does not exist: {}",
        cli.input.display()
    );

    let object = ObjectFile::open(&cli.input)
        .with_context(|| format!("loading {}", cli.input.display()))?;
    if cli.list {
        print_listing(&object);
    }

    let options = cli.options();
    let table = convert_object(&object, &cli.output, &options)
        .with_context(|| format!("converting {}", cli.input.display()))?;

    if cli.verify {
        verify(cli, &options)?;
    }

    if !cli.quiet {
        let summary = Summary {
            input: &object.path,
            format: object.format,
            output: cli.output.display().to_string(),
            table: &table,
            image_len: IMAGE_HEADER_LEN + table.content.len(),
        };
        print_summary(&summary, cli.json)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
#[path = "../../tblimg-core/tests/common/mod.rs"]
mod fixtures;
