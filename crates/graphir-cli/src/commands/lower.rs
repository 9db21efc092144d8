//! Traversal lowering command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::Cell;
use graphir_engine::query::plan::{ApplyOp, IrOperator, LimitOp, SampleAmount, SortOrder};
use graphir_engine::{LoweringConfig, ModulatorPolicy, OperatorProgram, Traversal};

use super::read_json;
use crate::OutputFormat;
use crate::output::{self, Format};

/// Arguments of the lower command.
pub struct LowerArgs {
    pub path: PathBuf,
    pub config: Option<PathBuf>,
    pub policy: Option<ModulatorPolicy>,
    pub seed: Option<u64>,
    pub parallel: bool,
    pub output: Option<PathBuf>,
}

/// One operator of the printed program.
struct OperatorRow {
    index: String,
    operator: &'static str,
    detail: String,
}

/// Run the lower command.
pub fn run(args: &LowerArgs, format: OutputFormat, quiet: bool) -> Result<()> {
    let config = load_config(args)?;
    let traversal: Traversal = read_json(&args.path)?;

    let program = graphir_engine::lower_with_config(&traversal, config)
        .with_context(|| format!("failed to lower {}", args.path.display()))?;

    if let Some(out) = &args.output {
        let bytes = program.encode()?;
        std::fs::write(out, &bytes)
            .with_context(|| format!("failed to write {}", out.display()))?;
        output::status(
            &format!("Wrote {} bytes to {}", bytes.len(), out.display()),
            quiet,
        );
    }

    let fmt: Format = format.into();
    match fmt {
        Format::Json => output::print_output(&program, fmt, quiet)?,
        Format::Table => {
            if !quiet {
                let mut rows = Vec::new();
                collect_rows(&program, "", &mut rows);
                let mut table = output::create_table();
                output::add_header(&mut table, &["#", "Operator", "Detail"]);
                for row in rows {
                    table.add_row(vec![
                        Cell::new(row.index),
                        output::operator_cell(row.operator),
                        Cell::new(row.detail),
                    ]);
                }
                println!("{table}");
            }
        }
    }
    output::success(&format!("Lowered {} operators", program.len()), quiet);
    Ok(())
}

fn load_config(args: &LowerArgs) -> Result<LoweringConfig> {
    let mut config = match &args.config {
        Some(path) => read_json(path)?,
        None => LoweringConfig::default(),
    };
    if let Some(policy) = args.policy {
        config = config.with_modulator_policy(policy);
    }
    if let Some(seed) = args.seed {
        config = config.with_default_sample_seed(seed);
    }
    if args.parallel {
        config = config.with_parallel(true);
    }
    Ok(config)
}

/// Flattens the program, numbering subprogram operators `parent.child`.
fn collect_rows(program: &OperatorProgram, prefix: &str, rows: &mut Vec<OperatorRow>) {
    for (i, op) in program.iter().enumerate() {
        let index = format!("{prefix}{i}");
        rows.push(OperatorRow {
            index: index.clone(),
            operator: op.name(),
            detail: describe(op),
        });
        if let IrOperator::Apply(ApplyOp { subprogram, .. }) = op {
            collect_rows(subprogram, &format!("{index}."), rows);
        }
    }
}

fn describe(op: &IrOperator) -> String {
    match op {
        IrOperator::Source(s) => {
            let ids: Vec<_> = s.ids.iter().map(ToString::to_string).collect();
            format!("{:?} [{}]", s.element, ids.join(", "))
        }
        IrOperator::Expand(e) => format!("{:?} {:?} {:?}", e.direction, e.element, e.labels),
        IrOperator::GetV(g) => format!("{:?}", g.opt),
        IrOperator::Limit(LimitOp { lower, upper }) => format!("[{lower}, {upper})"),
        IrOperator::As(a) => a.alias.to_string(),
        IrOperator::Apply(a) => format!(
            "{:?} -> {}",
            a.join_kind,
            a.alias.as_ref().map_or("-".to_string(), ToString::to_string)
        ),
        IrOperator::Project(p) => p
            .items
            .iter()
            .map(|item| match &item.alias {
                Some(alias) => format!("{} AS {alias}", item.expression),
                None => item.expression.clone(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        IrOperator::Dedup(d) => d.keys.join(", "),
        IrOperator::Order(o) => o
            .keys
            .iter()
            .map(|k| {
                let dir = match k.order {
                    SortOrder::Ascending => "ASC",
                    SortOrder::Descending => "DESC",
                    SortOrder::Shuffle => "SHUFFLE",
                };
                format!("{} {dir}", k.expression)
            })
            .collect::<Vec<_>>()
            .join(", "),
        IrOperator::Group(g) => {
            let keys: Vec<_> = g
                .keys
                .iter()
                .map(|k| format!("{} AS {}", k.expression, k.alias))
                .collect();
            let values: Vec<_> = g
                .values
                .iter()
                .map(|v| {
                    format!(
                        "{:?}({}) AS {}",
                        v.kind,
                        v.source.as_deref().unwrap_or("@"),
                        v.alias
                    )
                })
                .collect();
            format!("keys: [{}] values: [{}]", keys.join(", "), values.join(", "))
        }
        IrOperator::Select(s) => s.predicate.clone(),
        IrOperator::Sample(s) => {
            let amount = match s.amount {
                SampleAmount::Count(n) => n.to_string(),
                SampleAmount::Ratio(r) => format!("{r}"),
            };
            format!("{amount} seed={} by {}", s.seed, s.probability)
        }
    }
}
