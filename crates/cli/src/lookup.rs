// ABOUTME: The `lookup` subcommand: resolves metadata for URLs and prints or writes JSON.
// ABOUTME: A single URL prints one object; several print an array in input order.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{json, Value};
use urlist_preview::MetadataService;

#[derive(Args, Debug)]
pub struct LookupArgs {
    /// URLs to look up
    #[arg(required = true)]
    urls: Vec<String>,

    /// Lookups in flight at once
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Output compact JSON instead of pretty
    #[arg(long)]
    compact: bool,

    /// Include lookup diagnostics next to each result
    #[arg(long)]
    debug: bool,

    /// Print elapsed time in ms to stderr
    #[arg(long)]
    timing: bool,

    /// Output file path (default: stdout)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,
}

pub async fn run(service: &MetadataService, args: &LookupArgs) -> Result<()> {
    let start = Instant::now();

    let values: Vec<Value> = if args.debug {
        service
            .inspect_many(&args.urls, args.concurrency)
            .await
            .into_iter()
            .map(|(result, diagnostics)| json!({ "result": result, "diagnostics": diagnostics }))
            .collect()
    } else {
        service
            .get_many(&args.urls, args.concurrency)
            .await
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<_, _>>()?
    };

    let rendered = render(values, args.compact)?;

    match &args.output {
        Some(path) => fs::write(path, format!("{}\n", rendered))
            .with_context(|| format!("error writing to {:?}", path))?,
        None => println!("{}", rendered),
    }

    if args.timing {
        eprintln!("elapsed: {}ms", start.elapsed().as_millis());
    }

    Ok(())
}

fn render(mut values: Vec<Value>, compact: bool) -> Result<String> {
    let output = if values.len() == 1 {
        values.remove(0)
    } else {
        Value::Array(values)
    };

    let rendered = if compact {
        serde_json::to_string(&output)?
    } else {
        serde_json::to_string_pretty(&output)?
    };
    Ok(rendered)
}
