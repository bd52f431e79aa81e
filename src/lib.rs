//! Crate root: public surface for the AIR assembly language.
//!
//! This is the single canonical entry-point for downstream users. It
//! re-exports the pieces needed to compile a source schema, instantiate a
//! prover-side executor, or build a verifier-side point-evaluation object,
//! without reaching into the submodules directly.
//!
//! ## Pipeline
//!
//! ```text
//! source text --parser::parse--> Schema --executor::AirInstance--> trace / constraint evaluations
//!                                    \--verifier::VerifierObject--> point evaluation at a challenge
//! ```
//!
//! ## Invariants
//!
//! - **Field.** Every schema picks its own prime modulus at compile time
//!   (`field::PrimeField`); there is no fixed curve scalar field baked into
//!   the crate.
//! - **One interpreter.** Prover-side trace generation/constraint evaluation
//!   and verifier-side point evaluation both walk the same
//!   `expr::Interpreter`, never two independent implementations of the
//!   arithmetic (Testable Property 3).
//! - **Handles resolve once.** A parsed schema never carries a string handle
//!   past elaboration; every load/store/call is a resolved numeric index by
//!   the time a `Schema` is frozen (Design Note, "Handles vs indices").
//!
//! Merkle commitment, FRI, transcript/Fiat-Shamir, and proof serialization
//! belong to the outer STARK prover this crate's output feeds, and stay out
//! of scope here (see `DESIGN.md`).

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

/// Static analysis over a frozen schema: declared constraint degree,
/// implied composition domain size, register counts.
pub mod analyze;
/// Crate-wide error kinds (`AirError` and its typed components).
pub mod error;
/// Runtime-modulus prime field arithmetic, domains, and NTT/INTT.
pub mod field;
/// Shape (`Dimensions`) and degree (`ExpressionDegree`) calculus.
pub mod shape;
/// The expression IR and the shared interpreter that evaluates it.
pub mod expr;
/// Execution contexts: symbol tables backing constants/locals/params.
pub mod context;
/// The static register bank: inputs, masks, and cyclic registers.
pub mod registers;
/// Schema construction (`SchemaBuilder`) and the frozen `Schema` type.
pub mod schema;
/// The proof executor: trace generation and constraint composition.
pub mod executor;
/// The verification surface: point evaluation without a materialized trace.
pub mod verifier;
/// The S-expression concrete syntax: lexer, reader, and elaborator.
pub mod parser;
/// The canonical S-expression printer, `parser`'s round-trip partner.
pub mod printer;

pub use analyze::{analyze, Report};
pub use error::{AirError, AirResult};
pub use executor::{AirInstance, ExecutorConfig, WrapPolicy};
pub use field::{FieldElement, PrimeField};
pub use parser::parse as compile;
pub use printer::print_schema;
pub use registers::ConcreteInput;
pub use schema::Schema;
pub use verifier::VerifierObject;
