//! Static analysis over a frozen schema (spec §6 Schema API, `analyze(schema)
//! → Report`).
//!
//! Everything here reads data the expression IR already cached at
//! construction (`Expression::degree`, `shape::ExpressionDegree`) or the
//! static register bank's own counts — no witness, no field operation
//! beyond the power-of-two rounding the degree calculus is explicitly for
//! (spec §4.B: "the maximum of all constraint cell degrees × trace length
//! defines the composition domain size"). An `analyze` caller never needs to
//! instantiate an [`crate::executor::AirInstance`] or generate a trace.

use serde::Serialize;

use crate::error::{AirError, UndefinedReferenceError};
use crate::expr::{BinaryOp, ExprKind, Expression, LoadKind, UnaryOp, Value};
use crate::registers::StaticRegisterSet;
use crate::schema::{FunctionDecl, ProcedureDecl, Schema};
use crate::shape::{Dimensions, ExpressionDegree};

/// Register counts for a schema's static bank, split by kind (spec §4.E).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RegisterCounts {
    pub inputs: usize,
    pub masks: usize,
    pub cyclics: usize,
    pub total: usize,
}

/// Everything `analyze(schema)` reports without generating a trace: each
/// procedure's declared constraint degree, the trace/composition domain
/// sizes that degree implies for one export, and the static register
/// bank's shape.
///
/// Composition domain size is a function of an export's cycle length (via
/// the trace length it implies), so `analyze` takes the export it should
/// report on rather than assuming the schema has exactly one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Report {
    pub export: String,
    pub trace_width: usize,
    pub trace_length: usize,
    pub transition_degree: u64,
    pub evaluation_degree: u64,
    /// Roots of unity of order `trace_length · max(declared degrees)`,
    /// rounded up to a power of two (spec §4.B).
    pub composition_domain_size: u64,
    pub registers: RegisterCounts,
}

/// Inspect `schema`'s `export` without instantiating an
/// [`crate::executor::AirInstance`] or a [`crate::verifier::VerifierObject`]
/// (spec §6).
pub fn analyze(schema: &Schema, export: &str) -> Result<Report, AirError> {
    let export_decl = schema
        .export(export)
        .ok_or_else(|| UndefinedReferenceError::UnknownExport(export.to_string()))?;
    let trace_length = schema.registers().trace_length_for(export_decl.cycle_length);

    let transition_degree = procedure_degree(schema.transition(), schema.registers(), schema.functions(), trace_length).max_degree();
    let evaluation_degree = procedure_degree(schema.evaluation(), schema.registers(), schema.functions(), trace_length).max_degree();
    let composition_domain_size = composition_domain_size(schema, trace_length);

    let registers = schema.registers();
    Ok(Report {
        export: export.to_string(),
        trace_width: schema.trace_width(),
        trace_length,
        transition_degree,
        evaluation_degree,
        composition_domain_size,
        registers: RegisterCounts {
            inputs: registers.inputs().len(),
            masks: registers.masks().len(),
            cyclics: registers.cyclics().len(),
            total: registers.len(),
        },
    })
}

/// The composition domain size a given trace length implies for `schema`
/// (spec §4.B). Shared by [`analyze`] and
/// [`crate::executor::AirInstance::init_proof`] so the two never disagree
/// on how the evaluation procedure's declared degree sizes the domain.
pub(crate) fn composition_domain_size(schema: &Schema, trace_length: usize) -> u64 {
    let transition = procedure_degree(schema.transition(), schema.registers(), schema.functions(), trace_length).max_degree();
    let evaluation = procedure_degree(schema.evaluation(), schema.registers(), schema.functions(), trace_length).max_degree();
    transition.max(evaluation).max(1).next_power_of_two()
}

fn zero_degree_for(dims: Dimensions) -> ExpressionDegree {
    if dims.is_scalar() {
        ExpressionDegree::Scalar(0)
    } else if dims.is_vector() {
        ExpressionDegree::Vector(vec![0; dims.rows])
    } else {
        ExpressionDegree::Matrix(vec![vec![0; dims.cols]; dims.rows])
    }
}

fn flat_degree_for(dims: Dimensions, d: u64) -> ExpressionDegree {
    if dims.is_scalar() {
        ExpressionDegree::Scalar(d)
    } else if dims.is_vector() {
        ExpressionDegree::Vector(vec![d; dims.rows])
    } else {
        ExpressionDegree::Matrix(vec![vec![d; dims.cols]; dims.rows])
    }
}

/// A procedure's result degree, recomputed against a concrete
/// `trace_length` rather than read off the expression IR's build-time
/// cache (spec §4.B). At schema-build time neither `load.trace` nor
/// `load.static`'s real degree is known yet — the cycle length an export
/// fixes, which is what [`StaticRegisterSet::trace_length_for`] needs,
/// isn't declared until after the transition/evaluation procedures are —
/// so [`crate::context::ExecutionContext::build_load_expression`] bakes in
/// a conservative placeholder there and this walk re-derives the real
/// bound once an export makes `trace_length` concrete. Mirrors
/// [`crate::expr::Interpreter::run_procedure`]'s store-then-result order so
/// locals see the same values here as they would during evaluation.
pub(crate) fn procedure_degree(
    proc: &ProcedureDecl,
    registers: &StaticRegisterSet,
    functions: &[FunctionDecl],
    trace_length: usize,
) -> ExpressionDegree {
    let mut locals: Vec<ExpressionDegree> = proc.locals.iter().map(|s| zero_degree_for(s.dims)).collect();
    let params: Vec<ExpressionDegree> = Vec::new();
    for store in &proc.stores {
        let d = real_degree(&store.value, registers, functions, trace_length, &locals, &params);
        locals[store.local_index] = d;
    }
    real_degree(&proc.result, registers, functions, trace_length, &locals, &params)
}

fn function_degree(
    func: &FunctionDecl,
    registers: &StaticRegisterSet,
    functions: &[FunctionDecl],
    trace_length: usize,
    params: &[ExpressionDegree],
) -> ExpressionDegree {
    let mut locals: Vec<ExpressionDegree> = func.locals.iter().map(|s| zero_degree_for(s.dims)).collect();
    for store in &func.stores {
        let d = real_degree(&store.value, registers, functions, trace_length, &locals, params);
        locals[store.local_index] = d;
    }
    real_degree(&func.result, registers, functions, trace_length, &locals, params)
}

/// Walks `expr` the same way it was built, reusing `shape`'s unit-agnostic
/// combinators but substituting a `trace_length`-accurate base degree for
/// every `load.trace`/`load.static` leaf (spec §4.B) instead of the
/// build-time placeholder cached on [`Expression::degree`].
fn real_degree(
    expr: &Expression,
    registers: &StaticRegisterSet,
    functions: &[FunctionDecl],
    trace_length: usize,
    locals: &[ExpressionDegree],
    params: &[ExpressionDegree],
) -> ExpressionDegree {
    match &expr.kind {
        ExprKind::LiteralValue(_) => expr.degree.clone(),
        ExprKind::LoadExpression { kind, index } => match kind {
            LoadKind::Const => expr.degree.clone(),
            LoadKind::Local => locals[*index].clone(),
            LoadKind::Param => params[*index].clone(),
            LoadKind::Trace => flat_degree_for(expr.dims, (trace_length as u64).saturating_sub(1)),
            LoadKind::Static => ExpressionDegree::Scalar(registers.register_degree(*index, trace_length)),
        },
        ExprKind::UnaryOperation { op, operand } => {
            let d = real_degree(operand, registers, functions, trace_length, locals, params);
            match op {
                UnaryOp::Neg => ExpressionDegree::neg(&d),
                UnaryOp::Inv => ExpressionDegree::inv(&d),
            }
        }
        ExprKind::BinaryOperation { op: BinaryOp::Exp, lhs, rhs } => {
            let d = real_degree(lhs, registers, functions, trace_length, locals, params);
            let k = match &rhs.kind {
                ExprKind::LiteralValue(Value::Scalar(k)) => k.to_u64_lossy(),
                _ => unreachable!("exp exponent validated at construction"),
            };
            ExpressionDegree::exp(&d, k)
        }
        ExprKind::BinaryOperation { op: BinaryOp::Prod, lhs, rhs } => {
            let dl = real_degree(lhs, registers, functions, trace_length, locals, params);
            let dr = real_degree(rhs, registers, functions, trace_length, locals, params);
            ExpressionDegree::prod(&dl, &dr).expect("shape already validated at construction")
        }
        ExprKind::BinaryOperation { op, lhs, rhs } => {
            let dl = real_degree(lhs, registers, functions, trace_length, locals, params);
            let dr = real_degree(rhs, registers, functions, trace_length, locals, params);
            match op {
                BinaryOp::Add | BinaryOp::Sub => {
                    ExpressionDegree::add_sub(&dl, &dr).expect("shape already validated at construction")
                }
                BinaryOp::Mul => ExpressionDegree::mul(&dl, &dr).expect("shape already validated at construction"),
                BinaryOp::Div => ExpressionDegree::div(&dl, &dr).expect("shape already validated at construction"),
                BinaryOp::Exp | BinaryOp::Prod => unreachable!("handled above"),
            }
        }
        ExprKind::MakeVector(elements) => ExpressionDegree::Vector(
            elements
                .iter()
                .map(|e| real_degree(e, registers, functions, trace_length, locals, params).max_degree())
                .collect(),
        ),
        ExprKind::MakeMatrix(rows) => ExpressionDegree::Matrix(
            rows.iter()
                .map(|r| {
                    r.iter()
                        .map(|e| real_degree(e, registers, functions, trace_length, locals, params).max_degree())
                        .collect()
                })
                .collect(),
        ),
        ExprKind::GetVectorElement { source, index } => {
            match real_degree(source, registers, functions, trace_length, locals, params) {
                ExpressionDegree::Vector(v) => ExpressionDegree::Scalar(v[*index]),
                _ => unreachable!("vector dims implies vector degree"),
            }
        }
        ExprKind::SliceVector { source, start, end } => {
            match real_degree(source, registers, functions, trace_length, locals, params) {
                ExpressionDegree::Vector(v) => ExpressionDegree::Vector(v[*start..*end].to_vec()),
                _ => unreachable!("vector dims implies vector degree"),
            }
        }
        ExprKind::CallExpression { function, arguments } => {
            let arg_degrees: Vec<ExpressionDegree> = arguments
                .iter()
                .map(|a| real_degree(a, registers, functions, trace_length, locals, params))
                .collect();
            function_degree(&functions[*function], registers, functions, trace_length, &arg_degrees)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProcedureKind;
    use crate::expr::{BinaryOp, Expression, LoadKind};
    use crate::field::PrimeField;
    use crate::registers::{InputRegister, InputScope, InputShape, StaticRegisterSet};
    use crate::schema::{ProcedureDecl, SchemaBuilder};
    use crate::shape::{Dimensions, ExpressionDegree};
    use num_bigint::BigUint;

    fn field() -> PrimeField {
        PrimeField::new(BigUint::from(96769u32)).unwrap()
    }

    /// `next := trace[0]^3 + static[0]`; degree 3 drives the composition
    /// domain size up past a plain copy constraint's.
    fn cubic_schema() -> Schema {
        let f = field();
        let mut registers = StaticRegisterSet::new();
        registers
            .add_input(InputRegister::new(InputScope::Public, false, InputShape::Leaf))
            .unwrap();

        let mut b = SchemaBuilder::new(f.clone());
        b.set_static_registers(registers);

        let three = Expression::literal(crate::expr::Value::Scalar(f.elem(BigUint::from(3u32))));
        let cur_row = Expression::load(LoadKind::Trace, 0, Dimensions::vector(1), ExpressionDegree::Vector(vec![1]));
        let cur = Expression::get_vector_element(cur_row, 0).unwrap();
        let cubed = Expression::binary(BinaryOp::Exp, cur, three).unwrap();
        let statics = Expression::load(LoadKind::Static, 0, Dimensions::SCALAR, ExpressionDegree::Scalar(1));
        let next_scalar = Expression::binary(BinaryOp::Add, cubed, statics).unwrap();
        let next = Expression::make_vector(vec![next_scalar.clone()]);
        b.set_transition_function(ProcedureDecl { kind: ProcedureKind::Transition, width: 1, locals: vec![], stores: vec![], result: next })
            .unwrap();

        let next_row = Expression::load(LoadKind::Trace, 1, Dimensions::vector(1), ExpressionDegree::Vector(vec![1]));
        let next_actual = Expression::get_vector_element(next_row, 0).unwrap();
        let diff = Expression::make_vector(vec![Expression::binary(BinaryOp::Sub, next_actual, next_scalar).unwrap()]);
        b.set_constraint_evaluator(ProcedureDecl { kind: ProcedureKind::Evaluation, width: 1, locals: vec![], stores: vec![], result: diff })
            .unwrap();

        let seed = Expression::load(LoadKind::Param, 0, Dimensions::vector(1), ExpressionDegree::Vector(vec![0]));
        b.add_export("main".into(), Some(seed), 8).unwrap();
        b.freeze().unwrap()
    }

    #[test]
    fn reports_declared_degree_and_implied_domain_size() {
        let schema = cubic_schema();
        let report = analyze(&schema, "main").unwrap();
        assert_eq!(report.trace_width, 1);
        assert_eq!(report.trace_length, 8);
        // trace[0]^3: the trace column's real degree is 7 (trace_length - 1),
        // cubed is 21; static[0] (a plain input) contributes only 7.
        assert_eq!(report.transition_degree, 21);
        assert_eq!(report.evaluation_degree, 21);
        // 21 rounded up to the next power of two.
        assert_eq!(report.composition_domain_size, 32);
        assert_eq!(report.registers.inputs, 1);
        assert_eq!(report.registers.masks, 0);
        assert_eq!(report.registers.cyclics, 0);
        assert_eq!(report.registers.total, 1);
    }

    /// A mask register (period 2 over an 8-row trace) contributes degree
    /// `8 - 8/2 = 4`, well short of a plain trace/input column's degree 7 —
    /// the two must not collapse to the same reported bound.
    fn masked_schema() -> Schema {
        let f = field();
        let mut registers = StaticRegisterSet::new();
        registers
            .add_input(InputRegister { steps: 2, ..InputRegister::new(InputScope::Public, false, InputShape::Leaf) })
            .unwrap();
        registers.add_mask(0, false, None).unwrap();

        let mut b = SchemaBuilder::new(f.clone());
        b.set_static_registers(registers);

        let mask = Expression::load(LoadKind::Static, 1, Dimensions::SCALAR, ExpressionDegree::Scalar(1));
        let next = Expression::make_vector(vec![mask]);
        b.set_transition_function(ProcedureDecl { kind: ProcedureKind::Transition, width: 1, locals: vec![], stores: vec![], result: next })
            .unwrap();

        let next_row = Expression::load(LoadKind::Trace, 1, Dimensions::vector(1), ExpressionDegree::Vector(vec![1]));
        let next_actual = Expression::get_vector_element(next_row, 0).unwrap();
        let mask2 = Expression::load(LoadKind::Static, 1, Dimensions::SCALAR, ExpressionDegree::Scalar(1));
        let diff = Expression::make_vector(vec![Expression::binary(BinaryOp::Sub, next_actual, mask2).unwrap()]);
        b.set_constraint_evaluator(ProcedureDecl { kind: ProcedureKind::Evaluation, width: 1, locals: vec![], stores: vec![], result: diff })
            .unwrap();

        let seed = Expression::load(LoadKind::Param, 0, Dimensions::vector(1), ExpressionDegree::Vector(vec![0]));
        b.add_export("main".into(), Some(seed), 4).unwrap();
        b.freeze().unwrap()
    }

    #[test]
    fn mask_register_degree_reflects_its_period_not_a_flat_constant() {
        let schema = masked_schema();
        let report = analyze(&schema, "main").unwrap();
        assert_eq!(report.trace_length, 8);
        // transition is exactly the mask load: degree 8 - 8/2 = 4.
        assert_eq!(report.transition_degree, 4);
        // evaluation takes max(trace column 7, mask 4) = 7.
        assert_eq!(report.evaluation_degree, 7);
        assert_eq!(report.composition_domain_size, 8);
    }

    #[test]
    fn rejects_unknown_export() {
        let schema = cubic_schema();
        assert!(analyze(&schema, "nope").is_err());
    }
}
