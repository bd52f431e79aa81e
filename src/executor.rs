//! The proof executor (spec §4.G): trace generation, polynomial
//! interpolation/evaluation, and constraint composition over an extended
//! domain. Merkle commitment, FRI, and proof serialization belong to the
//! outer STARK prover and stay out of this crate.
//!
//! [`AirInstance`] is a small state machine: `Initialized` holds the
//! concrete inputs a prover supplied; [`AirInstance::init_proof`] sizes the
//! trace, builds the three domains, and materializes every static
//! register, moving the instance to `ProofReady`; only then can a trace be
//! generated or constraints evaluated.
//!
//! The execution trace is `width` registers wide (spec §3 "Procedure",
//! `width × T` matrix per §4.G); it is stored register-major — one
//! `Vec<FieldElement>` of length `T` per register — matching the
//! column-major convention §4.A describes for polynomial values.

use num_bigint::BigUint;

use crate::error::{AirError, ArityError, DomainError, UndefinedReferenceError};
use crate::expr::{Interpreter, Value};
use crate::field::FieldElement;
use crate::registers::ConcreteInput;
use crate::schema::Schema;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WrapPolicy {
    Wrap,
    Error,
}

/// Knobs the schema itself leaves open (spec §4.B, §9 "Open questions"):
/// how far the evaluation domain extends past the composition domain size
/// the degree calculus already implies, and what happens when a
/// `load.trace` boundary would read past the last row.
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Multiple of the trace domain the evaluation domain is sized to, at
    /// least large enough to cover the composition domain (spec §4.B: "the
    /// evaluation domain is a configured multiple (the extension factor) of
    /// the trace domain, at least the composition domain size").
    pub extension_factor: usize,
    pub wrap_policy: WrapPolicy,
    /// Largest power-of-two domain order this instance will build, for a
    /// caller that wants to fail fast on a schema whose degree blows up the
    /// evaluation domain rather than let it run (spec §7: "requested
    /// power-of-two domain exceeds schema limits" is a fatal condition).
    /// `None` means no ceiling.
    pub max_domain_order: Option<u64>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { extension_factor: 4, wrap_policy: WrapPolicy::Wrap, max_domain_order: None }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExecutorState {
    Initialized,
    ProofReady,
}

/// One proof run of a schema's export: owns the concrete inputs, the
/// materialized static registers, and (once generated) the execution
/// trace.
pub struct AirInstance<'s> {
    schema: &'s Schema,
    config: ExecutorConfig,
    state: ExecutorState,
    export: String,
    cycle_length: usize,
    inputs: Vec<ConcreteInput>,
    trace_length: usize,
    execution_domain: Vec<FieldElement>,
    composition_domain: Vec<FieldElement>,
    evaluation_domain: Vec<FieldElement>,
    static_traces: Vec<Vec<FieldElement>>,
    secret_register_traces: Vec<Vec<FieldElement>>,
    /// `width` registers, each a length-`trace_length` column.
    execution_trace: Option<Vec<Vec<FieldElement>>>,
}

impl<'s> AirInstance<'s> {
    pub fn new(
        schema: &'s Schema,
        export: &str,
        inputs: Vec<ConcreteInput>,
        config: ExecutorConfig,
    ) -> Result<Self, AirError> {
        let export_decl = schema
            .export(export)
            .ok_or_else(|| UndefinedReferenceError::UnknownExport(export.to_string()))?;
        let expected = schema.registers().inputs().len();
        if inputs.len() != expected {
            return Err(ArityError::InputCount { expected, got: inputs.len() }.into());
        }
        Ok(Self {
            schema,
            config,
            state: ExecutorState::Initialized,
            export: export.to_string(),
            cycle_length: export_decl.cycle_length,
            inputs,
            trace_length: 0,
            execution_domain: Vec::new(),
            composition_domain: Vec::new(),
            evaluation_domain: Vec::new(),
            static_traces: Vec::new(),
            secret_register_traces: Vec::new(),
            execution_trace: None,
        })
    }

    fn require_proof_ready(&self) -> Result<(), AirError> {
        if self.state != ExecutorState::ProofReady {
            return Err(AirError::Syntax("AirInstance is not PROOF_READY; call init_proof first".into()));
        }
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.schema.trace_width()
    }

    /// Size the trace, build the three domains, and materialize every
    /// static register column (Design Note §9, "Static register trace
    /// length").
    pub fn init_proof(&mut self) -> Result<(), AirError> {
        let field = self.schema.field();
        let trace_length = self.schema.registers().trace_length_for(self.cycle_length);

        let execution_domain = field.domain(trace_length as u64)?;
        let composition_order = crate::analyze::composition_domain_size(self.schema, trace_length);
        let evaluation_order = composition_order.max((trace_length * self.config.extension_factor) as u64).next_power_of_two();
        if let Some(limit) = self.config.max_domain_order {
            if evaluation_order > limit {
                return Err(DomainError::ExceedsLimit { requested: evaluation_order, limit }.into());
            }
        }
        let composition_domain = field.domain(composition_order)?;
        let evaluation_domain = if evaluation_order == composition_order {
            composition_domain.clone()
        } else {
            field.domain(evaluation_order)?
        };

        let static_traces = self.schema.registers().materialize(field, trace_length, &self.inputs)?;
        let secret_register_traces = self
            .schema
            .registers()
            .secret_input_indices()
            .into_iter()
            .map(|i| static_traces[i].clone())
            .collect();

        self.trace_length = trace_length;
        self.execution_domain = execution_domain;
        self.composition_domain = composition_domain;
        self.evaluation_domain = evaluation_domain;
        self.static_traces = static_traces;
        self.secret_register_traces = secret_register_traces;
        self.state = ExecutorState::ProofReady;
        Ok(())
    }

    pub fn trace_length(&self) -> usize {
        self.trace_length
    }

    pub fn execution_domain(&self) -> &[FieldElement] {
        &self.execution_domain
    }

    pub fn composition_domain(&self) -> &[FieldElement] {
        &self.composition_domain
    }

    pub fn evaluation_domain(&self) -> &[FieldElement] {
        &self.evaluation_domain
    }

    pub fn static_register_traces(&self) -> Result<&[Vec<FieldElement>], AirError> {
        self.require_proof_ready()?;
        Ok(&self.static_traces)
    }

    pub fn secret_register_traces(&self) -> Result<&[Vec<FieldElement>], AirError> {
        self.require_proof_ready()?;
        Ok(&self.secret_register_traces)
    }

    /// Apply the export's initializer to `seed` (a `width`-long sequence of
    /// raw field values; the "tag `seed`" form of an initializer is modeled
    /// internally as a single-parameter function body reading `load.param
    /// 0`, so both initializer forms run through the same interpreter),
    /// then walk the transition procedure row by row.
    ///
    /// [`ExecutorConfig::wrap_policy`] governs the evaluation procedure's
    /// last-row read, not this method: the transition only ever reads the
    /// current row (span 1), so trace generation itself never needs to
    /// wrap.
    pub fn generate_execution_trace(&mut self, seed: Vec<BigUint>) -> Result<&[Vec<FieldElement>], AirError> {
        self.require_proof_ready()?;
        let field = self.schema.field();
        let width = self.width();
        let export = self.schema.export(&self.export).expect("export validated at construction");
        let initializer = export
            .initializer
            .as_ref()
            .ok_or(ArityError::MainMissingInitializer)?;
        let seed_value = Value::Vector(seed.into_iter().map(|v| field.elem(v)).collect());
        let row0 = vector_of(
            Interpreter::eval_with_params(
                field,
                self.schema.constants(),
                self.schema.functions(),
                initializer,
                vec![seed_value],
            ),
            width,
        )?;

        let mut trace: Vec<Vec<FieldElement>> = vec![vec![field.zero(); self.trace_length]; width];
        for (r, v) in row0.into_iter().enumerate() {
            trace[r][0] = v;
        }

        let transition = self.schema.transition();
        for row in 0..self.trace_length.saturating_sub(1) {
            let cur_row: Vec<FieldElement> = trace.iter().map(|reg| reg[row].clone()).collect();
            let trace_lookup = move |index: usize| -> Value {
                debug_assert_eq!(index, 0, "transition procedures only read the current row");
                Value::Vector(cur_row.clone())
            };
            let statics = &self.static_traces;
            let static_lookup = |index: usize| -> FieldElement { statics[index][row].clone() };
            let next = vector_of(
                Interpreter::run_procedure(
                    field,
                    self.schema.constants(),
                    self.schema.functions(),
                    transition,
                    &trace_lookup,
                    &static_lookup,
                ),
                width,
            )?;
            for (r, v) in next.into_iter().enumerate() {
                trace[r][row + 1] = v;
            }
        }
        self.execution_trace = Some(trace);
        Ok(self.execution_trace.as_deref().unwrap())
    }

    pub fn execution_trace(&self) -> Result<&[Vec<FieldElement>], AirError> {
        self.require_proof_ready()?;
        self.execution_trace
            .as_deref()
            .ok_or_else(|| AirError::Syntax("execution trace not generated yet".into()))
    }

    /// Interpolate every register's column into coefficient form, one
    /// polynomial per register in declaration order.
    pub fn trace_polynomials(&self) -> Result<Vec<Vec<FieldElement>>, AirError> {
        let trace = self.execution_trace()?;
        let field = self.schema.field();
        trace
            .iter()
            .map(|col| Ok(field.interpolate_roots(&self.execution_domain, col)?))
            .collect()
    }

    /// Interpolate every static register column into coefficient form, in
    /// the same fixed order `load.static` indexes into.
    pub fn static_register_polynomials(&self) -> Result<Vec<Vec<FieldElement>>, AirError> {
        self.require_proof_ready()?;
        let field = self.schema.field();
        self.static_traces
            .iter()
            .map(|col| Ok(field.interpolate_roots(&self.execution_domain, col)?))
            .collect()
    }

    /// Evaluate the evaluation procedure (the one with trace span 2) at
    /// every point of the composition domain, given the trace register
    /// polynomials and every static register polynomial in coefficient
    /// form. This is where "current row" and "next row" become "evaluate
    /// at `x`" and "evaluate at `x * omega`" — `omega` being the execution
    /// domain's generator, since consecutive trace rows are consecutive
    /// powers of it. The result is `width` raw, undivided constraint
    /// evaluation columns over the composition domain; dividing by the
    /// trace domain's vanishing polynomial and committing the quotient is
    /// the outer STARK prover's job, not this crate's.
    pub fn evaluate_transition_constraints(
        &self,
        trace_polys: &[Vec<FieldElement>],
        static_polys: &[Vec<FieldElement>],
    ) -> Result<Vec<Vec<FieldElement>>, AirError> {
        self.evaluate_constraints_over(&self.composition_domain, trace_polys, static_polys)
    }

    /// The shared implementation behind [`Self::evaluate_transition_constraints`],
    /// generalized to any point set rather than hardcoding the composition
    /// domain, so a caller that already holds trace/static polynomials can
    /// also check vanishing directly over the execution domain without
    /// round-tripping through a differently-sized domain's NTT basis.
    pub(crate) fn evaluate_constraints_over(
        &self,
        domain: &[FieldElement],
        trace_polys: &[Vec<FieldElement>],
        static_polys: &[Vec<FieldElement>],
    ) -> Result<Vec<Vec<FieldElement>>, AirError> {
        self.require_proof_ready()?;
        let field = self.schema.field();
        let width = self.width();
        let omega = field.root_of_unity(self.trace_length as u64)?;
        let evaluation = self.schema.evaluation();

        let mut out: Vec<Vec<FieldElement>> = vec![Vec::with_capacity(domain.len()); width];
        for x in domain {
            let next_x = field.mul(x, &omega);
            // Every point whose successor cycles back to the trace domain's
            // first point is reading row `T-1`'s "next row" as row `0`
            // (spec §9, "wrap-edge policy"). `WrapPolicy::Wrap` accepts this
            // the way a cyclic AIR normally does; `WrapPolicy::Error` treats
            // it as a boundary the schema must handle separately instead.
            if self.config.wrap_policy == WrapPolicy::Error && next_x == field.one() && *x != field.one() {
                return Err(crate::error::DomainError::WrapsAtTraceBoundary.into());
            }
            let cur: Vec<FieldElement> = trace_polys.iter().map(|p| field.eval_poly_at(p, x)).collect();
            let next: Vec<FieldElement> = trace_polys.iter().map(|p| field.eval_poly_at(p, &next_x)).collect();
            let statics: Vec<FieldElement> = static_polys.iter().map(|p| field.eval_poly_at(p, x)).collect();
            let trace_lookup = |index: usize| -> Value {
                match index {
                    0 => Value::Vector(cur.clone()),
                    1 => Value::Vector(next.clone()),
                    _ => unreachable!("evaluation procedures read only span {{0,1}}"),
                }
            };
            let static_lookup = |index: usize| -> FieldElement { statics[index].clone() };
            let value = vector_of(
                Interpreter::run_procedure(
                    field,
                    self.schema.constants(),
                    self.schema.functions(),
                    evaluation,
                    &trace_lookup,
                    &static_lookup,
                ),
                width,
            )?;
            for (r, v) in value.into_iter().enumerate() {
                out[r].push(v);
            }
        }
        Ok(out)
    }
}

/// Unwrap a procedure/initializer result as a `width`-long vector. Both
/// are validated at schema-freeze time to have shape `vector(width)`, so a
/// shape mismatch here can only mean the caller passed a `width`
/// inconsistent with the schema the expression was built against.
fn vector_of(v: Value, width: usize) -> Result<Vec<FieldElement>, AirError> {
    match v {
        Value::Vector(v) if v.len() == width => Ok(v),
        Value::Scalar(s) if width == 1 => Ok(vec![s]),
        other => Err(AirError::Syntax(format!(
            "expected a width-{width} vector result, got {:?}",
            other.dims()
        ))),
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

    fn field() -> PrimeField {
        PrimeField::new(BigUint::from(96769u32)).unwrap()
    }

    /// `next := trace[0] + const(1)` (width 1); `eval := trace[1] - (trace[0] + const(1))`.
    fn tiny_schema() -> Schema {
        let f = field();
        let mut b = SchemaBuilder::new(f.clone());
        b.add_constant(Value::Scalar(f.one()), Some("one")).unwrap();

        let one = Expression::load(LoadKind::Const, 0, Dimensions::SCALAR, ExpressionDegree::Scalar(0));
        let cur_row = Expression::load(LoadKind::Trace, 0, Dimensions::vector(1), ExpressionDegree::Vector(vec![1]));
        let cur = Expression::get_vector_element(cur_row, 0).unwrap();
        let next_expected_scalar = Expression::binary(BinaryOp::Add, cur, one).unwrap();
        let next_expected = Expression::make_vector(vec![next_expected_scalar]);
        b.set_transition_function(ProcedureDecl {
            kind: ProcedureKind::Transition,
            width: 1,
            locals: vec![],
            stores: vec![],
            result: next_expected.clone(),
        })
        .unwrap();

        let next_row = Expression::load(LoadKind::Trace, 1, Dimensions::vector(1), ExpressionDegree::Vector(vec![1]));
        let next_actual = Expression::get_vector_element(next_row, 0).unwrap();
        let next_expected_scalar2 = Expression::get_vector_element(next_expected, 0).unwrap();
        let diff_scalar = Expression::binary(BinaryOp::Sub, next_actual, next_expected_scalar2).unwrap();
        let diff = Expression::make_vector(vec![diff_scalar]);
        b.set_constraint_evaluator(ProcedureDecl {
            kind: ProcedureKind::Evaluation,
            width: 1,
            locals: vec![],
            stores: vec![],
            result: diff,
        })
        .unwrap();

        let seed = Expression::load(crate::expr::LoadKind::Param, 0, Dimensions::vector(1), ExpressionDegree::Vector(vec![0]));
        b.add_export("main".into(), Some(seed), 8).unwrap();
        b.freeze().unwrap()
    }

    #[test]
    fn trace_follows_the_transition_and_evaluation_vanishes() {
        let schema = tiny_schema();
        let mut instance = AirInstance::new(&schema, "main", vec![], ExecutorConfig::default()).unwrap();
        instance.init_proof().unwrap();
        let trace = instance
            .generate_execution_trace(vec![BigUint::from(3u32)])
            .unwrap()
            .to_vec();
        let field = schema.field();
        let col = &trace[0];
        assert_eq!(col[0], field.elem(BigUint::from(3u32)));
        for i in 0..col.len() - 1 {
            assert_eq!(col[i + 1], field.add(&col[i], &field.one()));
        }

        let trace_polys = instance.trace_polynomials().unwrap();
        let static_polys = instance.static_register_polynomials().unwrap();
        let evals = instance
            .evaluate_transition_constraints(&trace_polys, &static_polys)
            .unwrap();
        assert_eq!(evals.len(), 1);
        assert_eq!(evals[0].len(), instance.composition_domain().len());

        // The evaluation procedure is a fixed low-degree polynomial in the
        // trace-domain variable; evaluating it directly at every
        // execution-domain point (not by re-interpolating the composition-
        // domain samples, which live on an unrelated-sized domain) must
        // vanish there.
        let direct = instance
            .evaluate_constraints_over(instance.execution_domain().to_vec().as_slice(), &trace_polys, &static_polys)
            .unwrap();
        for v in &direct[0] {
            assert_eq!(*v, field.zero());
        }
    }

    #[test]
    fn wrap_policy_error_rejects_the_trace_domain_wrap_point() {
        let schema = tiny_schema();
        let config = ExecutorConfig { wrap_policy: WrapPolicy::Error, ..ExecutorConfig::default() };
        let mut instance = AirInstance::new(&schema, "main", vec![], config).unwrap();
        instance.init_proof().unwrap();
        instance.generate_execution_trace(vec![BigUint::from(3u32)]).unwrap();
        let trace_polys = instance.trace_polynomials().unwrap();
        let static_polys = instance.static_register_polynomials().unwrap();

        // The execution domain's own points include the wrap point (row
        // `T-1`'s successor is row `0`); `WrapPolicy::Wrap` tolerates it
        // (exercised above), `WrapPolicy::Error` must reject it.
        let err = instance
            .evaluate_constraints_over(instance.execution_domain().to_vec().as_slice(), &trace_polys, &static_polys)
            .unwrap_err();
        assert!(matches!(err, AirError::Domain(crate::error::DomainError::WrapsAtTraceBoundary)));
    }

    #[test]
    fn max_domain_order_rejects_a_schema_that_exceeds_it() {
        let schema = tiny_schema();
        // `tiny_schema` needs an evaluation domain of at least 32 (trace
        // length 8 times the default extension factor 4); capping it at 16
        // must fail init_proof rather than silently truncate the domain.
        let config = ExecutorConfig { max_domain_order: Some(16), ..ExecutorConfig::default() };
        let mut instance = AirInstance::new(&schema, "main", vec![], config).unwrap();
        let err = instance.init_proof().unwrap_err();
        assert!(matches!(
            err,
            AirError::Domain(DomainError::ExceedsLimit { requested: 32, limit: 16 })
        ));
    }

    #[test]
    fn secret_inputs_are_exposed_separately_from_public_statics() {
        let f = field();
        let mut registers = StaticRegisterSet::new();
        registers
            .add_input(InputRegister::new(InputScope::Secret, false, InputShape::Leaf))
            .unwrap();
        registers
            .add_input(InputRegister::new(InputScope::Public, false, InputShape::Leaf))
            .unwrap();

        let mut b = SchemaBuilder::new(f.clone());
        b.set_static_registers(registers);
        let cur_row = Expression::load(LoadKind::Trace, 0, Dimensions::vector(1), ExpressionDegree::Vector(vec![1]));
        let cur = Expression::get_vector_element(cur_row, 0).unwrap();
        let result = Expression::make_vector(vec![cur.clone()]);
        b.set_transition_function(ProcedureDecl { kind: ProcedureKind::Transition, width: 1, locals: vec![], stores: vec![], result }).unwrap();
        let next_row = Expression::load(LoadKind::Trace, 1, Dimensions::vector(1), ExpressionDegree::Vector(vec![1]));
        let next = Expression::get_vector_element(next_row, 0).unwrap();
        let diff = Expression::make_vector(vec![Expression::binary(BinaryOp::Sub, next, cur).unwrap()]);
        b.set_constraint_evaluator(ProcedureDecl { kind: ProcedureKind::Evaluation, width: 1, locals: vec![], stores: vec![], result: diff }).unwrap();
        let seed = Expression::load(LoadKind::Param, 0, Dimensions::vector(1), ExpressionDegree::Vector(vec![0]));
        b.add_export("main".into(), Some(seed), 4).unwrap();
        let schema = b.freeze().unwrap();

        let inputs = vec![
            ConcreteInput::Flat(vec![BigUint::from(1u32)]),
            ConcreteInput::Flat(vec![BigUint::from(2u32)]),
        ];
        let mut instance = AirInstance::new(&schema, "main", inputs, ExecutorConfig::default()).unwrap();
        instance.init_proof().unwrap();
        assert_eq!(instance.secret_register_traces().unwrap().len(), 1);
        assert_eq!(instance.static_register_traces().unwrap().len(), 2);
    }
}
