//! Schema construction and freezing (spec §4.F).
//!
//! A [`SchemaBuilder`] accumulates constants, the static register bank,
//! functions, the transition/evaluation procedures, and exports exactly as
//! a parser discovers them; [`SchemaBuilder::freeze`] performs the handful
//! of checks that can only be made once every declaration is in, and hands
//! back an immutable [`Schema`] that the executor and verifier both borrow
//! from.

use crate::context::{ConstantDecl, HandleOrIndex, ProcedureKind, Slot, StoreOperation};
use crate::error::{ArityError, UndefinedReferenceError};
use crate::expr::{Expression, Value};
use crate::field::PrimeField;
use crate::registers::StaticRegisterSet;
use crate::shape::{Dimensions, ExpressionDegree};

/// A function body: parameters in, a sequence of local stores, then a
/// result expression. Functions cannot see `load.trace`/`load.static`
/// (spec §4.D) and may only call functions declared earlier in the schema.
#[derive(Clone, Debug)]
pub struct FunctionDecl {
    pub handle: Option<String>,
    pub params: Vec<Slot>,
    pub locals: Vec<Slot>,
    pub stores: Vec<StoreOperation>,
    pub result: Expression,
}

/// A transition or evaluation procedure body.
#[derive(Clone, Debug)]
pub struct ProcedureDecl {
    pub kind: ProcedureKind,
    /// Declared output width (spec §3 "Procedure"): the result expression
    /// must have shape `vector(width)`.
    pub width: usize,
    pub locals: Vec<Slot>,
    pub stores: Vec<StoreOperation>,
    pub result: Expression,
}

/// One `export` block: a name, an optional initializer (mandatory only for
/// `main`), and the power-of-two cycle length that export runs at.
#[derive(Clone, Debug)]
pub struct ExportDeclaration {
    pub handle: String,
    pub initializer: Option<Expression>,
    pub cycle_length: usize,
}

fn zero_degree(dims: Dimensions) -> ExpressionDegree {
    if dims.is_scalar() {
        ExpressionDegree::Scalar(0)
    } else if dims.is_vector() {
        ExpressionDegree::Vector(vec![0; dims.rows])
    } else {
        ExpressionDegree::Matrix(vec![vec![0; dims.cols]; dims.rows])
    }
}

/// Accumulates a schema's declarations in the order a parser (or any other
/// frontend) discovers them.
#[derive(Default)]
pub struct SchemaBuilder {
    field: Option<PrimeField>,
    constants: Vec<ConstantDecl>,
    registers: StaticRegisterSet,
    functions: Vec<FunctionDecl>,
    transition: Option<ProcedureDecl>,
    evaluation: Option<ProcedureDecl>,
    exports: Vec<ExportDeclaration>,
}

impl SchemaBuilder {
    pub fn new(field: PrimeField) -> Self {
        Self { field: Some(field), ..Self::default() }
    }

    pub fn field(&self) -> &PrimeField {
        self.field.as_ref().expect("field set at construction")
    }

    pub fn constants(&self) -> &[ConstantDecl] {
        &self.constants
    }

    pub fn add_constant(&mut self, value: Value, handle: Option<&str>) -> Result<usize, ArityError> {
        if let Some(h) = handle {
            if self.constants.iter().any(|c| c.handle.as_deref() == Some(h)) {
                return Err(ArityError::DuplicateHandle(h.to_string()));
            }
        }
        let dims = value.dims();
        let idx = self.constants.len();
        self.constants.push(ConstantDecl {
            degree: zero_degree(dims),
            dims,
            value,
            handle: handle.map(String::from),
        });
        Ok(idx)
    }

    pub fn set_static_registers(&mut self, registers: StaticRegisterSet) {
        self.registers = registers;
    }

    pub fn registers(&self) -> &StaticRegisterSet {
        &self.registers
    }

    /// Resolve a function reference against only the functions declared so
    /// far — a function may call an earlier function but never itself or a
    /// later one, which rules out recursion without a separate check.
    pub fn resolve_function(&self, idx: &HandleOrIndex) -> Result<usize, UndefinedReferenceError> {
        match idx {
            HandleOrIndex::Index(i) => {
                if *i < self.functions.len() {
                    Ok(*i)
                } else {
                    Err(UndefinedReferenceError::IndexOutOfRange { kind: "function", index: *i, len: self.functions.len() })
                }
            }
            HandleOrIndex::Handle(h) => self
                .functions
                .iter()
                .position(|f| f.handle.as_deref() == Some(h.as_str()))
                .ok_or_else(|| UndefinedReferenceError::UnknownHandle(h.clone())),
        }
    }

    pub fn function(&self, index: usize) -> Option<&FunctionDecl> {
        self.functions.get(index)
    }

    pub fn add_function(&mut self, decl: FunctionDecl) -> Result<usize, ArityError> {
        if let Some(h) = decl.handle.as_deref() {
            if self.functions.iter().any(|f| f.handle.as_deref() == Some(h)) {
                return Err(ArityError::DuplicateHandle(h.to_string()));
            }
        }
        let idx = self.functions.len();
        self.functions.push(decl);
        Ok(idx)
    }

    pub fn set_transition_function(&mut self, decl: ProcedureDecl) -> Result<(), crate::error::TypeError> {
        self.check_procedure_width(&decl)?;
        self.transition = Some(decl);
        Ok(())
    }

    pub fn set_constraint_evaluator(&mut self, decl: ProcedureDecl) -> Result<(), crate::error::TypeError> {
        self.check_procedure_width(&decl)?;
        self.evaluation = Some(decl);
        Ok(())
    }

    /// Every procedure's result must have shape `vector(width)` for its
    /// own declared `width` (spec §3 "Procedure"). Cross-procedure width
    /// agreement (transition width == evaluation width == trace width) is
    /// checked once both are present, at [`SchemaBuilder::freeze`].
    fn check_procedure_width(&self, decl: &ProcedureDecl) -> Result<(), crate::error::TypeError> {
        let expected = Dimensions::vector(decl.width);
        if decl.result.dims != expected {
            return Err(crate::error::TypeError::ShapeMismatch {
                expected: expected.to_string(),
                got: decl.result.dims.to_string(),
            });
        }
        Ok(())
    }

    pub fn add_export(
        &mut self,
        handle: String,
        initializer: Option<Expression>,
        cycle_length: usize,
    ) -> Result<usize, ArityError> {
        if self.exports.iter().any(|e| e.handle == handle) {
            return Err(ArityError::DuplicateHandle(handle));
        }
        if !cycle_length.is_power_of_two() {
            return Err(ArityError::CycleLengthNotPowerOfTwo(cycle_length));
        }
        let idx = self.exports.len();
        self.exports.push(ExportDeclaration { handle, initializer, cycle_length });
        Ok(idx)
    }

    pub fn freeze(self) -> Result<Schema, crate::error::AirError> {
        let transition = self.transition.ok_or_else(|| {
            crate::error::AirError::Syntax("schema is missing a transition function".into())
        })?;
        let evaluation = self.evaluation.ok_or_else(|| {
            crate::error::AirError::Syntax("schema is missing a constraint evaluator".into())
        })?;
        if transition.width != evaluation.width {
            return Err(crate::error::TypeError::ShapeMismatch {
                expected: format!("transition width {}", transition.width),
                got: format!("evaluation width {}", evaluation.width),
            }
            .into());
        }
        if self.exports.is_empty() {
            return Err(crate::error::AirError::Syntax("schema declares no exports".into()));
        }
        if let Some(main) = self.exports.iter().find(|e| e.handle == "main") {
            if main.initializer.is_none() {
                return Err(ArityError::MainMissingInitializer.into());
            }
        }

        Ok(Schema {
            field: self.field.expect("field set at construction"),
            constants: self.constants,
            registers: self.registers,
            functions: self.functions,
            transition,
            evaluation,
            exports: self.exports,
        })
    }
}

/// A fully validated, immutable schema — the shared input to the proof
/// executor and the verification surface.
pub struct Schema {
    field: PrimeField,
    constants: Vec<ConstantDecl>,
    registers: StaticRegisterSet,
    functions: Vec<FunctionDecl>,
    transition: ProcedureDecl,
    evaluation: ProcedureDecl,
    exports: Vec<ExportDeclaration>,
}

impl Schema {
    pub fn field(&self) -> &PrimeField {
        &self.field
    }
    pub fn constants(&self) -> &[ConstantDecl] {
        &self.constants
    }
    pub fn registers(&self) -> &StaticRegisterSet {
        &self.registers
    }
    pub fn functions(&self) -> &[FunctionDecl] {
        &self.functions
    }
    pub fn transition(&self) -> &ProcedureDecl {
        &self.transition
    }
    /// The execution trace's register count, shared by both procedures
    /// (checked equal at [`SchemaBuilder::freeze`]).
    pub fn trace_width(&self) -> usize {
        self.transition.width
    }
    pub fn evaluation(&self) -> &ProcedureDecl {
        &self.evaluation
    }
    pub fn exports(&self) -> &[ExportDeclaration] {
        &self.exports
    }
    pub fn export(&self, handle: &str) -> Option<&ExportDeclaration> {
        self.exports.iter().find(|e| e.handle == handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProcedureKind;
    use crate::expr::Expression;
    use num_bigint::BigUint;

    fn field() -> PrimeField {
        PrimeField::new(BigUint::from(96769u32)).unwrap()
    }

    fn const_vector1(f: &PrimeField) -> Expression {
        Expression::make_vector(vec![Expression::literal(Value::Scalar(f.zero()))])
    }

    #[test]
    fn freeze_rejects_missing_main_initializer() {
        let f = field();
        let mut b = SchemaBuilder::new(f.clone());
        b.set_transition_function(ProcedureDecl {
            kind: ProcedureKind::Transition,
            width: 1,
            locals: vec![],
            stores: vec![],
            result: const_vector1(&f),
        })
        .unwrap();
        b.set_constraint_evaluator(ProcedureDecl {
            kind: ProcedureKind::Evaluation,
            width: 1,
            locals: vec![],
            stores: vec![],
            result: const_vector1(&f),
        })
        .unwrap();
        b.add_export("main".into(), None, 16).unwrap();
        assert!(b.freeze().is_err());
    }

    #[test]
    fn freeze_succeeds_with_initializer() {
        let f = field();
        let mut b = SchemaBuilder::new(f.clone());
        b.set_transition_function(ProcedureDecl {
            kind: ProcedureKind::Transition,
            width: 1,
            locals: vec![],
            stores: vec![],
            result: const_vector1(&f),
        })
        .unwrap();
        b.set_constraint_evaluator(ProcedureDecl {
            kind: ProcedureKind::Evaluation,
            width: 1,
            locals: vec![],
            stores: vec![],
            result: const_vector1(&f),
        })
        .unwrap();
        let init = Expression::literal(Value::Scalar(f.zero()));
        b.add_export("main".into(), Some(init), 16).unwrap();
        assert!(b.freeze().is_ok());
    }

    #[test]
    fn duplicate_constant_handles_rejected() {
        let f = field();
        let mut b = SchemaBuilder::new(f.clone());
        b.add_constant(Value::Scalar(f.zero()), Some("c0")).unwrap();
        assert!(b.add_constant(Value::Scalar(f.one()), Some("c0")).is_err());
    }

    #[test]
    fn export_cycle_length_must_be_power_of_two() {
        let f = field();
        let mut b = SchemaBuilder::new(f);
        assert!(b.add_export("main".into(), None, 15).is_err());
        assert!(b.add_export("main".into(), None, 16).is_ok());
    }

    #[test]
    fn procedure_result_must_match_declared_width() {
        let f = field();
        let mut b = SchemaBuilder::new(f.clone());
        let two_wide = Expression::make_vector(vec![
            Expression::literal(Value::Scalar(f.zero())),
            Expression::literal(Value::Scalar(f.zero())),
        ]);
        let bad = ProcedureDecl {
            kind: ProcedureKind::Transition,
            width: 1,
            locals: vec![],
            stores: vec![],
            result: two_wide,
        };
        assert!(b.set_transition_function(bad).is_err());
    }

    #[test]
    fn transition_and_evaluation_widths_must_agree() {
        let f = field();
        let mut b = SchemaBuilder::new(f.clone());
        b.set_transition_function(ProcedureDecl {
            kind: ProcedureKind::Transition,
            width: 1,
            locals: vec![],
            stores: vec![],
            result: const_vector1(&f),
        })
        .unwrap();
        let two_wide = Expression::make_vector(vec![
            Expression::literal(Value::Scalar(f.zero())),
            Expression::literal(Value::Scalar(f.zero())),
        ]);
        b.set_constraint_evaluator(ProcedureDecl {
            kind: ProcedureKind::Evaluation,
            width: 2,
            locals: vec![],
            stores: vec![],
            result: two_wide,
        })
        .unwrap();
        b.add_export("main".into(), Some(Expression::literal(Value::Scalar(f.zero()))), 16).unwrap();
        assert!(b.freeze().is_err());
    }
}
