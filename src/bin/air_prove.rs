//! `air_prove` — compile a schema, materialize its static registers, walk
//! the transition procedure into a concrete execution trace, and evaluate
//! the transition constraints over the composition domain (spec §4.G).
//!
//! Usage: `air_prove --schema schema.air --witness witness.json [--export main]
//! [--extension-factor 4] [--max-domain-order <power-of-two>]`
//!
//! `witness.json`:
//! ```json
//! {
//!   "seed": ["3"],
//!   "inputs": [ { "flat": ["3", "4", "5", "6"] } ]
//! }
//! ```
//! Each input entry is either `{"flat": [...]}` (a [`air_asm::ConcreteInput::Flat`])
//! or `{"nested": [...]}` (one sub-entry per native occurrence of a parent
//! register), decimal strings throughout.
//!
//! This crate stops at constraint evaluation; committing the quotient,
//! opening it, and transcript/Fiat-Shamir challenges are the outer STARK
//! prover's job (see `DESIGN.md`). `air_prove` reports whether the
//! constraints vanish on the trace domain as a correctness smoke test, not
//! as a proof artifact — nothing here is serialized to a proof file.

#![forbid(unsafe_code)]

use std::{env, fs};

use air_asm::{compile, AirInstance, ConcreteInput, ExecutorConfig};
use anyhow::{bail, Context, Result};
use num_bigint::BigUint;
use tracing::{info, warn};

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn parse_biguints(values: &serde_json::Value) -> Result<Vec<BigUint>> {
    let arr = values.as_array().context("expected a JSON array of decimal strings")?;
    arr.iter()
        .map(|v| {
            let s = v.as_str().context("expected a decimal string")?;
            s.parse::<BigUint>().with_context(|| format!("invalid decimal integer {s:?}"))
        })
        .collect()
}

fn parse_concrete_input(value: &serde_json::Value) -> Result<ConcreteInput> {
    if let Some(flat) = value.get("flat") {
        Ok(ConcreteInput::Flat(parse_biguints(flat)?))
    } else if let Some(nested) = value.get("nested") {
        let arr = nested.as_array().context("\"nested\" must be a JSON array")?;
        Ok(ConcreteInput::Nested(arr.iter().map(parse_concrete_input).collect::<Result<_>>()?))
    } else {
        bail!("each witness input entry must have a \"flat\" or \"nested\" key")
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "air_prove=info".into()))
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().collect();
    let schema_path = parse_flag(&args, "--schema").context("missing required --schema <path>")?;
    let witness_path = parse_flag(&args, "--witness").context("missing required --witness <path>")?;
    let export = parse_flag(&args, "--export").unwrap_or_else(|| "main".into());
    let extension_factor: usize = parse_flag(&args, "--extension-factor")
        .map(|s| s.parse())
        .transpose()
        .context("--extension-factor must be an integer")?
        .unwrap_or(4);
    let max_domain_order: Option<u64> = parse_flag(&args, "--max-domain-order")
        .map(|s| s.parse())
        .transpose()
        .context("--max-domain-order must be an integer")?;

    let source = fs::read_to_string(&schema_path).with_context(|| format!("reading {schema_path}"))?;
    let schema = compile(&source).with_context(|| format!("compiling {schema_path}"))?;

    let witness_text = fs::read_to_string(&witness_path).with_context(|| format!("reading {witness_path}"))?;
    let witness: serde_json::Value = serde_json::from_str(&witness_text).context("parsing witness JSON")?;
    let seed = parse_biguints(witness.get("seed").context("witness is missing \"seed\"")?)?;
    let input_entries = witness
        .get("inputs")
        .and_then(|v| v.as_array())
        .context("witness is missing an \"inputs\" array")?;
    let inputs = input_entries
        .iter()
        .map(parse_concrete_input)
        .collect::<Result<Vec<_>>>()?;

    let config = ExecutorConfig { extension_factor, max_domain_order, ..ExecutorConfig::default() };
    let mut instance = AirInstance::new(&schema, &export, inputs, config)?;
    instance.init_proof()?;
    info!(
        export = %export,
        trace_length = instance.trace_length(),
        composition_domain = instance.composition_domain().len(),
        evaluation_domain = instance.evaluation_domain().len(),
        "proof initialized"
    );

    instance.generate_execution_trace(seed)?;
    let trace_polys = instance.trace_polynomials()?;
    let static_polys = instance.static_register_polynomials()?;
    let evals = instance.evaluate_transition_constraints(&trace_polys, &static_polys)?;

    let zero = schema.field().zero();
    let nonzero_cells: usize = evals.iter().flatten().filter(|v| **v != zero).count();
    if nonzero_cells > 0 {
        warn!(nonzero_cells, "constraint evaluation did not vanish everywhere on the composition domain");
    } else {
        info!("constraint evaluation vanished on every composition-domain sample");
    }

    let summary = serde_json::json!({
        "export": export,
        "trace_length": instance.trace_length(),
        "width": instance.width(),
        "composition_domain_size": instance.composition_domain().len(),
        "evaluation_domain_size": instance.evaluation_domain().len(),
        "nonzero_constraint_cells": nonzero_cells,
    });
    println!("{summary}");
    Ok(())
}
