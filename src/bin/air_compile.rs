//! `air_compile` — parse an AIR assembly source file, run `analyze`, and
//! print the canonical re-print of the schema (the `compile`/`toString`
//! pair, spec §6 Schema API).
//!
//! Usage: `air_compile --in schema.air [--export main] [--out schema.air]`
//!
//! With `--out`, the canonical re-print is written there instead of stdout.
//! `analyze`'s report always goes to stderr as a single JSON line, so stdout
//! stays clean for piping the re-printed source onward.

#![forbid(unsafe_code)]

use std::{env, fs};

use air_asm::{analyze, compile, print_schema};
use anyhow::{Context, Result};
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

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "air_compile=info".into()))
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().collect();
    let in_path = parse_flag(&args, "--in").context("missing required --in <path>")?;
    let export = parse_flag(&args, "--export").unwrap_or_else(|| "main".into());
    let out_path = parse_flag(&args, "--out");

    let source = fs::read_to_string(&in_path).with_context(|| format!("reading {in_path}"))?;
    let schema = compile(&source).with_context(|| format!("compiling {in_path}"))?;
    info!(path = %in_path, "schema compiled");

    let report = analyze(&schema, &export)?;
    eprintln!("{}", serde_json::to_string(&report)?);

    let printed = print_schema(&schema);
    match out_path {
        Some(out) => {
            fs::write(&out, &printed).with_context(|| format!("writing {out}"))?;
            info!(path = %out, "canonical form written");
        }
        None => print!("{printed}"),
    }
    Ok(())
}
