//! Engine result decoding command.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::Cell;
use graphir_engine::{QueryResult, ResultDecoder, TagTable};

use super::read_json;
use crate::OutputFormat;
use crate::output::{self, Format};

/// Run the decode command.
pub fn run(path: &Path, tags: Option<&Path>, format: OutputFormat, quiet: bool) -> Result<()> {
    let batch: QueryResult = read_json(path)?;
    let table = match tags {
        Some(tags) => read_json(tags)?,
        None => TagTable::new(),
    };

    let values = ResultDecoder::new(table)
        .decode(&batch)
        .with_context(|| format!("failed to decode {}", path.display()))?;

    let fmt: Format = format.into();
    match fmt {
        Format::Json => output::print_output(&values, fmt, quiet)?,
        Format::Table => {
            if !quiet {
                let mut table = output::create_table();
                output::add_header(&mut table, &["#", "Value"]);
                for (i, value) in values.iter().enumerate() {
                    table.add_row(vec![Cell::new(i), Cell::new(value.to_string())]);
                }
                println!("{table}");
            }
        }
    }
    Ok(())
}
