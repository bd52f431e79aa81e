//! The expression intermediate representation (spec §3, §4.C).
//!
//! Kept as one closed sum type with shape and degree carried in common
//! header fields (Design Note §9, "Tagged variants") rather than a trait
//! hierarchy — every [`Expression`] already knows its [`Dimensions`] and
//! [`ExpressionDegree`] the moment it is built, so downstream consumers
//! never recompute either.

use std::cell::RefCell;

use crate::context::ConstantDecl;
use crate::error::TypeError;
use crate::field::{FieldElement, PrimeField};
use crate::schema::{FunctionDecl, ProcedureDecl};
use crate::shape::{broadcast_dims, prod_dims, Dimensions, ExpressionDegree};

/// A concrete scalar/vector/matrix value, shape-shaped like
/// [`ExpressionDegree`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Scalar(FieldElement),
    Vector(Vec<FieldElement>),
    Matrix(Vec<Vec<FieldElement>>),
}

impl Value {
    pub fn dims(&self) -> Dimensions {
        match self {
            Value::Scalar(_) => Dimensions::SCALAR,
            Value::Vector(v) => Dimensions::vector(v.len()),
            Value::Matrix(m) => {
                let rows = m.len();
                let cols = m.first().map(|r| r.len()).unwrap_or(0);
                Dimensions::matrix(rows, cols)
            }
        }
    }

    pub fn as_scalar(&self) -> Option<&FieldElement> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_vector(self) -> Vec<FieldElement> {
        match self {
            Value::Vector(v) => v,
            Value::Scalar(s) => vec![s],
            Value::Matrix(_) => panic!("expected vector, got matrix"),
        }
    }

    fn broadcast_to(&self, dims: Dimensions) -> Value {
        match self {
            Value::Scalar(s) if dims.is_vector() => Value::Vector(vec![s.clone(); dims.rows]),
            Value::Scalar(s) if dims.is_matrix() => {
                Value::Matrix(vec![vec![s.clone(); dims.cols]; dims.rows])
            }
            other => other.clone(),
        }
    }

    fn zip_with(
        &self,
        other: &Value,
        dims: Dimensions,
        f: impl Fn(&FieldElement, &FieldElement) -> FieldElement,
    ) -> Value {
        let a = self.broadcast_to(dims);
        let b = other.broadcast_to(dims);
        match (a, b) {
            (Value::Scalar(x), Value::Scalar(y)) => Value::Scalar(f(&x, &y)),
            (Value::Vector(x), Value::Vector(y)) => {
                Value::Vector(x.iter().zip(y.iter()).map(|(p, q)| f(p, q)).collect())
            }
            (Value::Matrix(x), Value::Matrix(y)) => Value::Matrix(
                x.iter()
                    .zip(y.iter())
                    .map(|(xr, yr)| xr.iter().zip(yr.iter()).map(|(p, q)| f(p, q)).collect())
                    .collect(),
            ),
            _ => unreachable!("broadcast_to normalizes both sides to the same shape kind"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Exp,
    Prod,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Inv,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadKind {
    Const,
    Local,
    Param,
    Trace,
    Static,
}

/// A fully shape- and degree-checked expression node.
#[derive(Clone, Debug)]
pub struct Expression {
    pub kind: ExprKind,
    pub dims: Dimensions,
    pub degree: ExpressionDegree,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    LiteralValue(Value),
    BinaryOperation { op: BinaryOp, lhs: Box<Expression>, rhs: Box<Expression> },
    UnaryOperation { op: UnaryOp, operand: Box<Expression> },
    MakeVector(Vec<Expression>),
    MakeMatrix(Vec<Vec<Expression>>),
    GetVectorElement { source: Box<Expression>, index: usize },
    SliceVector { source: Box<Expression>, start: usize, end: usize },
    LoadExpression { kind: LoadKind, index: usize },
    CallExpression { function: usize, arguments: Vec<Expression> },
}

impl Expression {
    pub fn literal(value: Value) -> Expression {
        let dims = value.dims();
        let degree = literal_degree(&value);
        Expression { kind: ExprKind::LiteralValue(value), dims, degree }
    }

    /// A `load.*` expression; the caller (execution context) has already
    /// resolved the handle/index and knows the declared dims/base degree.
    pub fn load(kind: LoadKind, index: usize, dims: Dimensions, degree: ExpressionDegree) -> Expression {
        Expression { kind: ExprKind::LoadExpression { kind, index }, dims, degree }
    }

    pub fn call(function: usize, arguments: Vec<Expression>, dims: Dimensions, degree: ExpressionDegree) -> Expression {
        Expression { kind: ExprKind::CallExpression { function, arguments }, dims, degree }
    }

    pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression) -> Result<Expression, TypeError> {
        let (dims, degree) = match op {
            BinaryOp::Prod => {
                let dims = prod_dims(lhs.dims, rhs.dims)?;
                let degree = ExpressionDegree::prod(&lhs.degree, &rhs.degree)?;
                (dims, degree)
            }
            BinaryOp::Exp => {
                let k = match &rhs.kind {
                    ExprKind::LiteralValue(Value::Scalar(k)) => k.to_u64_lossy(),
                    _ => return Err(TypeError::NonConstantExponent),
                };
                (lhs.dims, ExpressionDegree::exp(&lhs.degree, k))
            }
            BinaryOp::Add | BinaryOp::Sub => {
                let dims = broadcast_dims(lhs.dims, rhs.dims)?;
                let degree = ExpressionDegree::add_sub(&lhs.degree, &rhs.degree)?;
                (dims, degree)
            }
            BinaryOp::Mul => {
                let dims = broadcast_dims(lhs.dims, rhs.dims)?;
                let degree = ExpressionDegree::mul(&lhs.degree, &rhs.degree)?;
                (dims, degree)
            }
            BinaryOp::Div => {
                let dims = broadcast_dims(lhs.dims, rhs.dims)?;
                let degree = ExpressionDegree::div(&lhs.degree, &rhs.degree)?;
                (dims, degree)
            }
        };
        Ok(Expression { kind: ExprKind::BinaryOperation { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, dims, degree })
    }

    pub fn unary(op: UnaryOp, operand: Expression) -> Expression {
        let degree = match op {
            UnaryOp::Neg => ExpressionDegree::neg(&operand.degree),
            UnaryOp::Inv => ExpressionDegree::inv(&operand.degree),
        };
        let dims = operand.dims;
        Expression { kind: ExprKind::UnaryOperation { op, operand: Box::new(operand) }, dims, degree }
    }

    pub fn make_vector(elements: Vec<Expression>) -> Expression {
        let degree = ExpressionDegree::Vector(elements.iter().map(|e| e.degree.max_degree()).collect());
        let dims = Dimensions::vector(elements.len());
        Expression { kind: ExprKind::MakeVector(elements), dims, degree }
    }

    pub fn make_matrix(rows: Vec<Vec<Expression>>) -> Result<Expression, TypeError> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
        for r in &rows {
            if r.len() != n_cols {
                return Err(TypeError::ShapeMismatch {
                    expected: format!("row of {n_cols}"),
                    got: format!("row of {}", r.len()),
                });
            }
        }
        let degree = ExpressionDegree::Matrix(
            rows.iter().map(|r| r.iter().map(|e| e.degree.max_degree()).collect()).collect(),
        );
        let dims = Dimensions::matrix(n_rows, n_cols);
        Ok(Expression { kind: ExprKind::MakeMatrix(rows), dims, degree })
    }

    pub fn get_vector_element(source: Expression, index: usize) -> Result<Expression, TypeError> {
        let len = source.dims.vector_len().ok_or_else(|| TypeError::ShapeMismatch {
            expected: "vector".into(),
            got: source.dims.to_string(),
        })?;
        if index >= len {
            return Err(TypeError::IndexOutOfBounds { index, len });
        }
        let degree = match &source.degree {
            ExpressionDegree::Vector(v) => ExpressionDegree::Scalar(v[index]),
            _ => unreachable!("vector dims implies vector degree"),
        };
        Ok(Expression {
            dims: Dimensions::SCALAR,
            degree,
            kind: ExprKind::GetVectorElement { source: Box::new(source), index },
        })
    }

    pub fn slice_vector(source: Expression, start: usize, end: usize) -> Result<Expression, TypeError> {
        let len = source.dims.vector_len().ok_or_else(|| TypeError::ShapeMismatch {
            expected: "vector".into(),
            got: source.dims.to_string(),
        })?;
        if start > end || end > len {
            return Err(TypeError::SliceOutOfBounds { start, end, len });
        }
        let degree = match &source.degree {
            ExpressionDegree::Vector(v) => ExpressionDegree::Vector(v[start..end].to_vec()),
            _ => unreachable!("vector dims implies vector degree"),
        };
        Ok(Expression {
            dims: Dimensions::vector(end - start),
            degree,
            kind: ExprKind::SliceVector { source: Box::new(source), start, end },
        })
    }

    /// Structural equality ignoring shape/degree caches, used for optional
    /// common-subexpression detection (spec §4.C item iii).
    pub fn structurally_eq(&self, other: &Expression) -> bool {
        use ExprKind::*;
        match (&self.kind, &other.kind) {
            (LiteralValue(a), LiteralValue(b)) => a == b,
            (BinaryOperation { op: o1, lhs: l1, rhs: r1 }, BinaryOperation { op: o2, lhs: l2, rhs: r2 }) => {
                o1 == o2 && l1.structurally_eq(l2) && r1.structurally_eq(r2)
            }
            (UnaryOperation { op: o1, operand: a }, UnaryOperation { op: o2, operand: b }) => {
                o1 == o2 && a.structurally_eq(b)
            }
            (MakeVector(a), MakeVector(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.structurally_eq(y))
            }
            (MakeMatrix(a), MakeMatrix(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(ra, rb)| {
                        ra.len() == rb.len() && ra.iter().zip(rb.iter()).all(|(x, y)| x.structurally_eq(y))
                    })
            }
            (GetVectorElement { source: s1, index: i1 }, GetVectorElement { source: s2, index: i2 }) => {
                i1 == i2 && s1.structurally_eq(s2)
            }
            (
                SliceVector { source: s1, start: a1, end: b1 },
                SliceVector { source: s2, start: a2, end: b2 },
            ) => a1 == a2 && b1 == b2 && s1.structurally_eq(s2),
            (LoadExpression { kind: k1, index: i1 }, LoadExpression { kind: k2, index: i2 }) => {
                k1 == k2 && i1 == i2
            }
            (
                CallExpression { function: f1, arguments: a1 },
                CallExpression { function: f2, arguments: a2 },
            ) => f1 == f2 && a1.len() == a2.len() && a1.iter().zip(a2.iter()).all(|(x, y)| x.structurally_eq(y)),
            _ => false,
        }
    }

    /// Evaluate against a resolving environment. `exp`'s exponent is read
    /// straight from the literal at construction time (it was validated to
    /// be a scalar literal in [`Expression::binary`]).
    pub fn eval(&self, env: &dyn ExecutionEnvironment) -> Value {
        let field = env.field();
        match &self.kind {
            ExprKind::LiteralValue(v) => v.clone(),
            ExprKind::LoadExpression { kind, index } => match kind {
                LoadKind::Const => env.load_const(*index),
                LoadKind::Local => env.load_local(*index),
                LoadKind::Param => env.load_param(*index),
                LoadKind::Trace => env.load_trace(*index),
                LoadKind::Static => Value::Scalar(env.load_static(*index)),
            },
            ExprKind::UnaryOperation { op, operand } => {
                let v = operand.eval(env);
                map_value(field, &v, *op)
            }
            ExprKind::BinaryOperation { op: BinaryOp::Exp, lhs, rhs } => {
                let base = lhs.eval(env);
                let k = match &rhs.kind {
                    ExprKind::LiteralValue(Value::Scalar(k)) => k.to_u64_lossy(),
                    _ => unreachable!("exp exponent validated at construction"),
                };
                exp_value(field, &base, k)
            }
            ExprKind::BinaryOperation { op: BinaryOp::Prod, lhs, rhs } => {
                prod_value(field, &lhs.eval(env), &rhs.eval(env))
            }
            ExprKind::BinaryOperation { op, lhs, rhs } => {
                let a = lhs.eval(env);
                let b = rhs.eval(env);
                let dims = self.dims;
                match op {
                    BinaryOp::Add => a.zip_with(&b, dims, |x, y| field.add(x, y)),
                    BinaryOp::Sub => a.zip_with(&b, dims, |x, y| field.sub(x, y)),
                    BinaryOp::Mul => a.zip_with(&b, dims, |x, y| field.mul(x, y)),
                    BinaryOp::Div => a.zip_with(&b, dims, |x, y| {
                        field.div(x, y).expect("division by zero during evaluation")
                    }),
                    BinaryOp::Exp | BinaryOp::Prod => unreachable!("handled above"),
                }
            }
            ExprKind::MakeVector(elements) => {
                Value::Vector(elements.iter().map(|e| scalar_of(e.eval(env))).collect())
            }
            ExprKind::MakeMatrix(rows) => Value::Matrix(
                rows.iter()
                    .map(|r| r.iter().map(|e| scalar_of(e.eval(env))).collect())
                    .collect(),
            ),
            ExprKind::GetVectorElement { source, index } => {
                let v = source.eval(env).into_vector();
                Value::Scalar(v[*index].clone())
            }
            ExprKind::SliceVector { source, start, end } => {
                let v = source.eval(env).into_vector();
                Value::Vector(v[*start..*end].to_vec())
            }
            ExprKind::CallExpression { function, arguments } => {
                let args = arguments.iter().map(|a| a.eval(env)).collect();
                env.call(*function, args)
            }
        }
    }
}

fn scalar_of(v: Value) -> FieldElement {
    match v {
        Value::Scalar(s) => s,
        _ => panic!("expected scalar element inside make.vector/make.matrix"),
    }
}

fn literal_degree(value: &Value) -> ExpressionDegree {
    match value {
        Value::Scalar(_) => ExpressionDegree::Scalar(0),
        Value::Vector(v) => ExpressionDegree::Vector(vec![0; v.len()]),
        Value::Matrix(m) => {
            ExpressionDegree::Matrix(m.iter().map(|r| vec![0; r.len()]).collect())
        }
    }
}

fn map_value(field: &PrimeField, v: &Value, op: UnaryOp) -> Value {
    let f = |x: &FieldElement| match op {
        UnaryOp::Neg => field.neg(x),
        UnaryOp::Inv => field.inv(x).expect("inverse of zero during evaluation"),
    };
    match v {
        Value::Scalar(s) => Value::Scalar(f(s)),
        Value::Vector(vec) => Value::Vector(vec.iter().map(f).collect()),
        Value::Matrix(m) => Value::Matrix(m.iter().map(|r| r.iter().map(f).collect()).collect()),
    }
}

fn exp_value(field: &PrimeField, base: &Value, k: u64) -> Value {
    match base {
        Value::Scalar(s) => Value::Scalar(field.pow(s, k)),
        Value::Vector(v) => Value::Vector(v.iter().map(|s| field.pow(s, k)).collect()),
        Value::Matrix(m) => Value::Matrix(m.iter().map(|r| r.iter().map(|s| field.pow(s, k)).collect()).collect()),
    }
}

/// `prod`: dot product / matrix-vector / matrix-matrix, square-and-multiply
/// handled upstream in `field.pow`; this implements the contraction itself.
fn prod_value(field: &PrimeField, a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Vector(x), Value::Vector(y)) => {
            let mut acc = field.zero();
            for (p, q) in x.iter().zip(y.iter()) {
                acc = field.add(&acc, &field.mul(p, q));
            }
            Value::Scalar(acc)
        }
        (Value::Matrix(m), Value::Vector(v)) => Value::Vector(
            m.iter()
                .map(|row| {
                    let mut acc = field.zero();
                    for (p, q) in row.iter().zip(v.iter()) {
                        acc = field.add(&acc, &field.mul(p, q));
                    }
                    acc
                })
                .collect(),
        ),
        (Value::Matrix(x), Value::Matrix(y)) => {
            let y_cols = y.first().map(|r| r.len()).unwrap_or(0);
            let mut out = Vec::with_capacity(x.len());
            for row in x {
                let mut out_row = Vec::with_capacity(y_cols);
                for j in 0..y_cols {
                    let mut acc = field.zero();
                    for (k, p) in row.iter().enumerate() {
                        acc = field.add(&acc, &field.mul(p, &y[k][j]));
                    }
                    out_row.push(acc);
                }
                out.push(out_row);
            }
            Value::Matrix(out)
        }
        _ => panic!("prod requires vector/matrix operands, validated at construction"),
    }
}

/// Resolves loads and dispatches calls during [`Expression::eval`].
///
/// Implemented by the proof executor, the verifier, and function-body
/// evaluation inside the schema; kept as a trait (rather than a concrete
/// struct) so the same [`Expression::eval`] walk serves all three without
/// duplicating the interpreter (this is the mechanism behind Testable
/// Property 3, composition/evaluation agreement).
pub trait ExecutionEnvironment {
    fn field(&self) -> &PrimeField;
    fn load_const(&self, index: usize) -> Value;
    fn load_local(&self, index: usize) -> Value;
    fn load_param(&self, index: usize) -> Value;
    /// `load.trace i`: the entire row at span offset `i`, as a
    /// `vector(width)` (spec §3, §4.C "per cell" trace degree).
    fn load_trace(&self, index: usize) -> Value;
    fn load_static(&self, index: usize) -> FieldElement;
    fn call(&self, function: usize, arguments: Vec<Value>) -> Value;
}

fn zero_value(field: &PrimeField, dims: Dimensions) -> Value {
    if dims.is_scalar() {
        Value::Scalar(field.zero())
    } else if dims.is_vector() {
        Value::Vector(vec![field.zero(); dims.rows])
    } else {
        Value::Matrix(vec![vec![field.zero(); dims.cols]; dims.rows])
    }
}

/// The one concrete [`ExecutionEnvironment`]: runs a procedure or function
/// body (stores in order, then the result expression) against a schema's
/// constants and function table. The proof executor and the verification
/// surface both drive constraint evaluation through this same interpreter
/// so composition-time and verification-time evaluation can never drift
/// apart from each other.
///
/// Two lifetimes: `'a` covers the schema data (constants, functions, the
/// field) which typically outlives a single evaluation call, while `'b`
/// covers the `load.trace`/`load.static` callbacks, which usually close
/// over a loop-local row index and die at the end of that iteration.
pub struct Interpreter<'a, 'b> {
    field: &'a PrimeField,
    constants: &'a [ConstantDecl],
    functions: &'a [FunctionDecl],
    params: Vec<Value>,
    locals: RefCell<Vec<Value>>,
    trace: Option<&'b dyn Fn(usize) -> Value>,
    statik: Option<&'b dyn Fn(usize) -> FieldElement>,
}

impl<'a, 'b> Interpreter<'a, 'b> {
    /// Evaluate a transition/evaluation procedure at one point, given
    /// callbacks that resolve `load.trace`/`load.static` for that point.
    pub fn run_procedure(
        field: &'a PrimeField,
        constants: &'a [ConstantDecl],
        functions: &'a [FunctionDecl],
        proc: &ProcedureDecl,
        trace: &'b dyn Fn(usize) -> Value,
        statik: &'b dyn Fn(usize) -> FieldElement,
    ) -> Value {
        let locals = proc.locals.iter().map(|s| zero_value(field, s.dims)).collect();
        let interp = Interpreter {
            field,
            constants,
            functions,
            params: Vec::new(),
            locals: RefCell::new(locals),
            trace: Some(trace),
            statik: Some(statik),
        };
        for store in &proc.stores {
            let v = store.value.eval(&interp);
            interp.locals.borrow_mut()[store.local_index] = v;
        }
        proc.result.eval(&interp)
    }

    /// Evaluate a bare expression (no stores) against a fixed parameter
    /// list and no trace/static access — used for an export's initializer,
    /// which is built as a single-parameter function body with no locals.
    pub fn eval_with_params(
        field: &'a PrimeField,
        constants: &'a [ConstantDecl],
        functions: &'a [FunctionDecl],
        expr: &Expression,
        params: Vec<Value>,
    ) -> Value {
        let interp: Interpreter<'a, 'b> = Interpreter {
            field,
            constants,
            functions,
            params,
            locals: RefCell::new(Vec::new()),
            trace: None,
            statik: None,
        };
        expr.eval(&interp)
    }

    fn run_function<'c>(
        field: &'a PrimeField,
        constants: &'a [ConstantDecl],
        functions: &'a [FunctionDecl],
        func: &FunctionDecl,
        args: Vec<Value>,
    ) -> Value {
        let locals = func.locals.iter().map(|s| zero_value(field, s.dims)).collect();
        let interp: Interpreter<'a, 'c> = Interpreter {
            field,
            constants,
            functions,
            params: args,
            locals: RefCell::new(locals),
            trace: None,
            statik: None,
        };
        for store in &func.stores {
            let v = store.value.eval(&interp);
            interp.locals.borrow_mut()[store.local_index] = v;
        }
        func.result.eval(&interp)
    }
}

impl<'a, 'b> ExecutionEnvironment for Interpreter<'a, 'b> {
    fn field(&self) -> &PrimeField {
        self.field
    }
    fn load_const(&self, index: usize) -> Value {
        self.constants[index].value.clone()
    }
    fn load_local(&self, index: usize) -> Value {
        self.locals.borrow()[index].clone()
    }
    fn load_param(&self, index: usize) -> Value {
        self.params[index].clone()
    }
    fn load_trace(&self, index: usize) -> Value {
        (self.trace.expect("load.trace reached outside a procedure body"))(index)
    }
    fn load_static(&self, index: usize) -> FieldElement {
        (self.statik.expect("load.static reached outside a procedure body"))(index)
    }
    fn call(&self, function: usize, arguments: Vec<Value>) -> Value {
        Interpreter::run_function(self.field, self.constants, self.functions, &self.functions[function], arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    struct NullEnv(PrimeField);
    impl ExecutionEnvironment for NullEnv {
        fn field(&self) -> &PrimeField {
            &self.0
        }
        fn load_const(&self, _i: usize) -> Value {
            unreachable!()
        }
        fn load_local(&self, _i: usize) -> Value {
            unreachable!()
        }
        fn load_param(&self, _i: usize) -> Value {
            unreachable!()
        }
        fn load_trace(&self, _i: usize) -> Value {
            unreachable!()
        }
        fn load_static(&self, _i: usize) -> FieldElement {
            unreachable!()
        }
        fn call(&self, _f: usize, _a: Vec<Value>) -> Value {
            unreachable!()
        }
    }

    fn field() -> PrimeField {
        PrimeField::new(BigUint::from(96769u32)).unwrap()
    }

    #[test]
    fn exp_requires_literal_scalar_exponent() {
        let f = field();
        let base = Expression::literal(Value::Scalar(f.elem(BigUint::from(3u32))));
        let bad_exp = Expression::load(LoadKind::Const, 0, Dimensions::SCALAR, ExpressionDegree::Scalar(0));
        assert!(Expression::binary(BinaryOp::Exp, base, bad_exp).is_err());
    }

    #[test]
    fn eval_add_and_exp() {
        let f = field();
        let env = NullEnv(f.clone());
        let three = Expression::literal(Value::Scalar(f.elem(BigUint::from(3u32))));
        let exponent = Expression::literal(Value::Scalar(f.elem(BigUint::from(4u32))));
        let pow = Expression::binary(BinaryOp::Exp, three.clone(), exponent).unwrap();
        let sum = Expression::binary(BinaryOp::Add, pow, three).unwrap();
        let v = sum.eval(&env);
        assert_eq!(v, Value::Scalar(f.elem(BigUint::from(81u32 + 3))));
    }

    #[test]
    fn prod_dot_product() {
        let f = field();
        let env = NullEnv(f.clone());
        let a = Expression::make_vector(vec![
            Expression::literal(Value::Scalar(f.elem(BigUint::from(1u32)))),
            Expression::literal(Value::Scalar(f.elem(BigUint::from(2u32)))),
        ]);
        let b = Expression::make_vector(vec![
            Expression::literal(Value::Scalar(f.elem(BigUint::from(3u32)))),
            Expression::literal(Value::Scalar(f.elem(BigUint::from(4u32)))),
        ]);
        let dot = Expression::binary(BinaryOp::Prod, a, b).unwrap();
        assert_eq!(dot.eval(&env), Value::Scalar(f.elem(BigUint::from(11u32))));
    }

    #[test]
    fn get_and_slice_bounds_checked() {
        let v = Expression::make_vector(vec![
            Expression::literal(Value::Scalar(field().elem(BigUint::from(1u32)))),
            Expression::literal(Value::Scalar(field().elem(BigUint::from(2u32)))),
        ]);
        assert!(Expression::get_vector_element(v.clone(), 5).is_err());
        assert!(Expression::slice_vector(v, 0, 5).is_err());
    }
}
