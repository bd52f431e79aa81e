//! `air_verify` — build a [`air_asm::VerifierObject`] from a compiled
//! schema and evaluate the transition constraint at a single challenge
//! point, without ever materializing a trace (spec §4.H).
//!
//! Usage: `air_verify --schema schema.air --point point.json [--export main]`
//!
//! `point.json`:
//! ```json
//! {
//!   "x": "7971",
//!   "row": ["3"],
//!   "next_row": ["4"],
//!   "public": [],
//!   "secret": ["10"]
//! }
//! ```
//! `row`/`next_row` are the trace register values at `x` and `x·g`; `public`
//! and `secret` are witness values for this schema's non-periodic input
//! registers, ordered the way `StaticRegisterSet::inputs` enumerates
//! registers of that scope (mask and cyclic registers need no witness —
//! both are pure functions of the schema and `x`).

#![forbid(unsafe_code)]

use std::{env, fs};

use air_asm::{compile, VerifierObject};
use anyhow::{Context, Result};
use num_bigint::BigUint;
use tracing::info;

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

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "air_verify=info".into()))
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().collect();
    let schema_path = parse_flag(&args, "--schema").context("missing required --schema <path>")?;
    let point_path = parse_flag(&args, "--point").context("missing required --point <path>")?;
    let export = parse_flag(&args, "--export").unwrap_or_else(|| "main".into());

    let source = fs::read_to_string(&schema_path).with_context(|| format!("reading {schema_path}"))?;
    let schema = compile(&source).with_context(|| format!("compiling {schema_path}"))?;
    let field = schema.field();

    let point_text = fs::read_to_string(&point_path).with_context(|| format!("reading {point_path}"))?;
    let point: serde_json::Value = serde_json::from_str(&point_text).context("parsing point JSON")?;

    let x_str = point.get("x").and_then(|v| v.as_str()).context("point is missing \"x\"")?;
    let x = field.elem(x_str.parse::<BigUint>().with_context(|| format!("invalid decimal integer {x_str:?}"))?);
    let row = parse_biguints(point.get("row").context("point is missing \"row\"")?)?
        .into_iter()
        .map(|v| field.elem(v))
        .collect();
    let next_row = parse_biguints(point.get("next_row").context("point is missing \"next_row\"")?)?
        .into_iter()
        .map(|v| field.elem(v))
        .collect();
    let public = parse_biguints(point.get("public").context("point is missing \"public\"")?)?
        .into_iter()
        .map(|v| field.elem(v))
        .collect::<Vec<_>>();
    let secret = parse_biguints(point.get("secret").context("point is missing \"secret\"")?)?
        .into_iter()
        .map(|v| field.elem(v))
        .collect::<Vec<_>>();

    let verifier = VerifierObject::new(&schema, &export)?;
    info!(export = %export, trace_length = verifier.trace_length(), "verifier object built");

    let result = verifier.evaluate_constraints_at(&x, row, next_row, &public, &secret)?;
    let zero = field.zero();
    let vanishes = result.iter().all(|v| *v == zero);

    let summary = serde_json::json!({
        "export": export,
        "vanishes": vanishes,
        "result": result.iter().map(|v| v.to_string()).collect::<Vec<_>>(),
    });
    println!("{summary}");
    Ok(())
}
