//! The verification surface (spec §4.H): point evaluation of the
//! constraint system at a single challenge `x`, given register values at
//! `x` and `x·g` plus whatever secret-input witness the verifier is
//! handed out of band.
//!
//! This must stay call-compatible with
//! [`crate::executor::AirInstance::evaluate_transition_constraints`] —
//! both drive the same evaluation procedure through
//! [`crate::expr::Interpreter::run_procedure`], which is the concrete
//! mechanism behind Testable Property 3 (composition/evaluation
//! agreement): there is exactly one interpreter, called at different
//! points, never two divergent implementations of the same arithmetic.

use num_bigint::BigUint;

use crate::error::{AirError, ArityError, UndefinedReferenceError};
use crate::expr::{Interpreter, Value};
use crate::field::FieldElement;
use crate::registers::{prng_sequence, CyclicValues, RegisterRef};
use crate::schema::Schema;

/// A schema's verification-side view of one export: knows the trace
/// domain's size and generator, and can evaluate the evaluation procedure
/// at an arbitrary field point without ever materializing a trace.
pub struct VerifierObject<'s> {
    schema: &'s Schema,
    export: String,
    trace_length: usize,
    omega: FieldElement,
}

impl<'s> VerifierObject<'s> {
    /// `cycle_length` and the static register set's implied period are
    /// schema data, not witness data, so the trace length (and hence the
    /// generator `g`) is reconstructible from the schema alone, exactly as
    /// [`crate::executor::AirInstance::init_proof`] computes it.
    pub fn new(schema: &'s Schema, export: &str) -> Result<Self, AirError> {
        let export_decl = schema
            .export(export)
            .ok_or_else(|| UndefinedReferenceError::UnknownExport(export.to_string()))?;
        let trace_length = schema.registers().trace_length_for(export_decl.cycle_length);
        let omega = schema.field().root_of_unity(trace_length as u64)?;
        Ok(Self { schema, export: export.to_string(), trace_length, omega })
    }

    /// The trace-domain generator `g`.
    pub fn root_of_unity(&self) -> &FieldElement {
        &self.omega
    }

    pub fn trace_length(&self) -> usize {
        self.trace_length
    }

    pub fn export(&self) -> &str {
        &self.export
    }

    /// Evaluate the evaluation procedure at `x`, given the trace register
    /// values at `x` (`row_values`) and at `x·g` (`next_row_values`), plus
    /// whatever witness the caller holds for non-periodic input registers:
    /// `public_input_values`/`secret_input_values`, each ordered the same
    /// way [`crate::registers::StaticRegisterSet::inputs`] enumerates
    /// registers of that scope. Mask and cyclic registers never need
    /// witness — both are pure functions of the schema and `x`.
    pub fn evaluate_constraints_at(
        &self,
        x: &FieldElement,
        row_values: Vec<FieldElement>,
        next_row_values: Vec<FieldElement>,
        public_input_values: &[FieldElement],
        secret_input_values: &[FieldElement],
    ) -> Result<Vec<FieldElement>, AirError> {
        let field = self.schema.field();
        let width = self.schema.trace_width();
        if row_values.len() != width {
            return Err(ArityError::InputCount { expected: width, got: row_values.len() }.into());
        }
        if next_row_values.len() != width {
            return Err(ArityError::InputCount { expected: width, got: next_row_values.len() }.into());
        }

        let registers = self.schema.registers();
        let mut public_iter = public_input_values.iter();
        let mut secret_iter = secret_input_values.iter();
        let mut statics: Vec<FieldElement> = Vec::with_capacity(registers.len());

        for i in 0..registers.inputs().len() {
            let reg = &registers.inputs()[i];
            let v = match reg.scope {
                crate::registers::InputScope::Secret => secret_iter
                    .next()
                    .cloned()
                    .ok_or_else(|| UndefinedReferenceError::IndexOutOfRange { kind: "secret input value", index: i, len: secret_input_values.len() })?,
                crate::registers::InputScope::Public => public_iter
                    .next()
                    .cloned()
                    .ok_or_else(|| UndefinedReferenceError::IndexOutOfRange { kind: "public input value", index: i, len: public_input_values.len() })?,
            };
            statics.push(v);
        }
        for mask in registers.masks() {
            let source = &registers.inputs()[mask.source_index];
            statics.push(self.mask_value_at(field, source.steps, source.shift, mask.inverted, x)?);
        }
        for cyclic in registers.cyclics() {
            statics.push(self.cyclic_value_at(field, cyclic, x)?);
        }

        let trace_lookup = |index: usize| -> Value {
            match index {
                0 => Value::Vector(row_values.clone()),
                1 => Value::Vector(next_row_values.clone()),
                _ => unreachable!("evaluation procedures read only span {{0,1}}"),
            }
        };
        let static_lookup = |index: usize| -> FieldElement { statics[index].clone() };

        let result = Interpreter::run_procedure(
            field,
            self.schema.constants(),
            self.schema.functions(),
            self.schema.evaluation(),
            &trace_lookup,
            &static_lookup,
        );
        match result {
            Value::Vector(v) if v.len() == width => Ok(v),
            Value::Scalar(s) if width == 1 => Ok(vec![s]),
            other => Err(AirError::Syntax(format!("evaluation procedure returned the wrong shape: {:?}", other.dims()))),
        }
    }

    /// A cyclic register's column is the period-`L` repetition of
    /// `values` across the trace domain; its interpolant is the
    /// small period-`L` polynomial composed with `x^(T/L)` (the standard
    /// "periodic column" algebraic identity: repeating a length-`L`
    /// sequence `T/L` times across the order-`T` domain is exactly
    /// evaluating the length-`L` interpolant at `x` raised to the `T/L`
    /// power, since `omega_T^(T/L)` is an order-`L` root of unity).
    fn cyclic_value_at(
        &self,
        field: &crate::field::PrimeField,
        reg: &crate::registers::CyclicRegister,
        x: &FieldElement,
    ) -> Result<FieldElement, AirError> {
        let values: Vec<FieldElement> = match &reg.values {
            CyclicValues::Literal(v) => v.iter().map(|raw| field.elem(raw.clone())).collect(),
            CyclicValues::Prng(p) => prng_sequence(field, p),
        };
        let l = values.len().max(1);
        let domain_l = field.domain(l as u64)?;
        let poly = field.interpolate_roots(&domain_l, &values)?;
        let m = (self.trace_length / l).max(1);
        let x_m = field.pow(x, m as u64);
        Ok(field.eval_poly_at(&poly, &x_m))
    }

    /// A mask register's native/repeated pattern is itself periodic with
    /// period `steps`, rotated by `shift` — purely structural, independent
    /// of the actual witness values (Design Note §9, "Mask semantics":
    /// nativity is schema data, not secret data). Evaluated the same way
    /// as a cyclic register, then corrected for the rotation: shifting a
    /// column by `shift` rows is evaluating the un-rotated interpolant at
    /// `x·g^{-shift}` instead of `x` (row `r`'s domain point `g^r` becomes
    /// `g^{r-shift}` after the rotation reads from row `r-shift`).
    fn mask_value_at(
        &self,
        field: &crate::field::PrimeField,
        steps: usize,
        shift: i64,
        inverted: bool,
        x: &FieldElement,
    ) -> Result<FieldElement, AirError> {
        let steps = steps.max(1);
        let mut pattern = vec![field.zero(); steps];
        pattern[0] = field.one();
        let domain_steps = field.domain(steps as u64)?;
        let poly = field.interpolate_roots(&domain_steps, &pattern)?;

        let t = self.trace_length as i64;
        let shift_mod = (((shift % t) + t) % t) as u64;
        let omega_inv = field.inv(&self.omega)?;
        let rotation = field.pow(&omega_inv, shift_mod);
        let x_rotated = field.mul(x, &rotation);

        let m = (self.trace_length / steps).max(1);
        let x_m = field.pow(&x_rotated, m as u64);
        let v = field.eval_poly_at(&poly, &x_m);
        if inverted {
            Ok(field.sub(&field.one(), &v))
        } else {
            Ok(v)
        }
    }
}

/// Convenience: resolve which buffer backs a global static index, useful
/// for callers assembling `public_input_values`/`secret_input_values` in
/// the right order from a flat witness.
pub fn classify_static(schema: &Schema, global_index: usize) -> Option<RegisterRef> {
    schema.registers().register_at(global_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProcedureKind;
    use crate::executor::{AirInstance, ExecutorConfig};
    use crate::expr::{BinaryOp, Expression, LoadKind};
    use crate::field::PrimeField;
    use crate::registers::{
        ConcreteInput, CyclicRegister, CyclicValues, InputRegister, InputScope, InputShape,
        StaticRegisterSet,
    };
    use crate::schema::{ProcedureDecl, SchemaBuilder};
    use crate::shape::{Dimensions, ExpressionDegree};

    fn field() -> PrimeField {
        PrimeField::new(BigUint::from(96769u32)).unwrap()
    }

    /// One secret input (steps=2), a mask over it, and a 2-value literal
    /// cyclic register, so both the mask and cyclic closed-form evaluations
    /// in [`VerifierObject`] get exercised. `next := trace[0] + static[1]
    /// (mask) + static[2] (cyclic)`; evaluation mirrors the same sum against
    /// `trace[1]`.
    fn worked_schema() -> Schema {
        let f = field();
        let mut registers = StaticRegisterSet::new();
        let mut secret = InputRegister::new(InputScope::Secret, false, InputShape::Leaf);
        secret.steps = 2;
        registers.add_input(secret).unwrap();
        registers.add_mask(0, false, None).unwrap();
        registers.add_cyclic(CyclicRegister {
            values: CyclicValues::Literal(vec![BigUint::from(5u32), BigUint::from(7u32)]),
            handle: None,
        });

        let mut b = SchemaBuilder::new(f);
        b.set_static_registers(registers);

        let mask = Expression::load(LoadKind::Static, 1, Dimensions::SCALAR, ExpressionDegree::Scalar(1));
        let cyclic = Expression::load(LoadKind::Static, 2, Dimensions::SCALAR, ExpressionDegree::Scalar(1));

        let cur_row = Expression::load(LoadKind::Trace, 0, Dimensions::vector(1), ExpressionDegree::Vector(vec![1]));
        let cur = Expression::get_vector_element(cur_row, 0).unwrap();
        let transition_scalar = Expression::binary(
            BinaryOp::Add,
            Expression::binary(BinaryOp::Add, cur, mask.clone()).unwrap(),
            cyclic.clone(),
        )
        .unwrap();
        let transition_result = Expression::make_vector(vec![transition_scalar]);
        b.set_transition_function(ProcedureDecl {
            kind: ProcedureKind::Transition,
            width: 1,
            locals: vec![],
            stores: vec![],
            result: transition_result,
        })
        .unwrap();

        let row0 = Expression::load(LoadKind::Trace, 0, Dimensions::vector(1), ExpressionDegree::Vector(vec![1]));
        let row0_elem = Expression::get_vector_element(row0, 0).unwrap();
        let row1 = Expression::load(LoadKind::Trace, 1, Dimensions::vector(1), ExpressionDegree::Vector(vec![1]));
        let row1_elem = Expression::get_vector_element(row1, 0).unwrap();
        let expected = Expression::binary(
            BinaryOp::Add,
            Expression::binary(BinaryOp::Add, row0_elem, mask).unwrap(),
            cyclic,
        )
        .unwrap();
        let eval_scalar = Expression::binary(BinaryOp::Sub, row1_elem, expected).unwrap();
        let eval_result = Expression::make_vector(vec![eval_scalar]);
        b.set_constraint_evaluator(ProcedureDecl {
            kind: ProcedureKind::Evaluation,
            width: 1,
            locals: vec![],
            stores: vec![],
            result: eval_result,
        })
        .unwrap();

        let seed = Expression::load(LoadKind::Param, 0, Dimensions::vector(1), ExpressionDegree::Vector(vec![0]));
        b.add_export("main".into(), Some(seed), 8).unwrap();
        b.freeze().unwrap()
    }

    #[test]
    fn verifier_agrees_with_composition_domain_evaluation() {
        let schema = worked_schema();
        let field = schema.field();

        let mut instance = AirInstance::new(
            &schema,
            "main",
            vec![ConcreteInput::Flat(
                (3u32..11).map(BigUint::from).collect(),
            )],
            ExecutorConfig::default(),
        )
        .unwrap();
        instance.init_proof().unwrap();
        let trace = instance.generate_execution_trace(vec![BigUint::from(3u32)]).unwrap();
        assert_eq!(trace[0][0], field.elem(BigUint::from(3u32)));

        let trace_polys = instance.trace_polynomials().unwrap();
        let static_polys = instance.static_register_polynomials().unwrap();
        let evals = instance.evaluate_transition_constraints(&trace_polys, &static_polys).unwrap();

        let verifier = VerifierObject::new(&schema, "main").unwrap();
        let omega = verifier.root_of_unity().clone();
        let x2 = instance.composition_domain()[2].clone();
        let row_eval = field.eval_poly_at(&trace_polys[0], &x2);
        let next_eval = field.eval_poly_at(&trace_polys[0], &field.mul(&x2, &omega));
        let secret_at_2 = field.eval_poly_at(&instance.static_register_polynomials().unwrap()[0], &x2);

        let via_verifier = verifier
            .evaluate_constraints_at(&x2, vec![row_eval], vec![next_eval], &[], &[secret_at_2])
            .unwrap();

        assert_eq!(via_verifier[0], evals[0][2]);
    }

    #[test]
    fn evaluation_vanishes_on_every_trace_domain_point() {
        let schema = worked_schema();
        let field = schema.field();
        let mut instance = AirInstance::new(
            &schema,
            "main",
            vec![ConcreteInput::Flat(
                (3u32..11).map(BigUint::from).collect(),
            )],
            ExecutorConfig::default(),
        )
        .unwrap();
        instance.init_proof().unwrap();
        instance.generate_execution_trace(vec![BigUint::from(3u32)]).unwrap();
        let trace_polys = instance.trace_polynomials().unwrap();
        let static_polys = instance.static_register_polynomials().unwrap();
        let direct = instance
            .evaluate_constraints_over(instance.execution_domain().to_vec().as_slice(), &trace_polys, &static_polys)
            .unwrap();
        for v in &direct[0] {
            assert_eq!(*v, field.zero());
        }
    }
}
