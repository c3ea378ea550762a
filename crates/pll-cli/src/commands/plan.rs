//! Plan command - Show a partition layout
//!
//! Prints how a collection of a given size is split into contiguous,
//! balanced partitions, without loading anything.

use anyhow::{Context, Result};
use pll_core::{create_partitions, InMemoryPartition, Partition};
use serde::Serialize;

use crate::GlobalOptions;

/// Arguments for the plan command
#[derive(clap::Args, Debug)]
pub struct PlanArgs {
    /// Number of elements in the collection
    #[arg(long)]
    rows: usize,

    /// Number of partitions
    #[arg(long, short = 'p', allow_negative_numbers = true)]
    partitions: i64,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Layout report
#[derive(Debug, Serialize)]
struct PlanReport {
    rows: usize,
    partitions: Vec<InMemoryPartition>,
}

/// Execute the plan command
pub fn execute(args: PlanArgs, _global: GlobalOptions) -> Result<()> {
    let partitions = create_partitions(args.rows, args.partitions).with_context(|| {
        format!(
            "Cannot split {} rows into {} partitions",
            args.rows, args.partitions
        )
    })?;

    if args.json {
        let report = PlanReport {
            rows: args.rows,
            partitions,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Layout of {} rows into {} partitions",
        args.rows,
        partitions.len()
    );
    for p in &partitions {
        println!(
            "  partition {}: offset {}, length {}",
            p.index(),
            p.offset(),
            p.length()
        );
    }
    Ok(())
}
