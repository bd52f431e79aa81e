//! Crate-wide error kinds.
//!
//! Every fatal condition named in the assembly language's error design maps
//! to one variant here. None of these are recoverable: callers are expected
//! to discard partial state and re-drive compilation/instantiation from
//! scratch, matching the "no retries, no recovery" stance of the source
//! language's error model.

use thiserror::Error;

/// Shape/index errors raised by the degree and shape calculus.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },
    #[error("`prod` operand shapes are incompatible: {lhs} x {rhs}")]
    BadProdShape { lhs: String, rhs: String },
    #[error("`exp` requires a scalar integer-valued constant exponent")]
    NonConstantExponent,
    #[error("index {index} out of bounds (len={len})")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("slice [{start}, {end}) out of bounds (len={len})")]
    SliceOutOfBounds { start: usize, end: usize, len: usize },
    #[error("`load.trace {index}` exceeds procedure span {span}")]
    TraceIndexOutOfSpan { index: usize, span: usize },
}

/// Unresolved handle or numeric index referenced by a load/store/call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UndefinedReferenceError {
    #[error("unknown handle `${0}`")]
    UnknownHandle(String),
    #[error("{kind} index {index} out of range (have {len})")]
    IndexOutOfRange { kind: &'static str, index: usize, len: usize },
    #[error("no static register at index {0}")]
    UnknownStaticRegister(usize),
    #[error("no function named `{0}`")]
    UnknownFunction(String),
    #[error("no export named `{0}`")]
    UnknownExport(String),
}

/// Wrong arity / duplicate-handle / malformed declaration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArityError {
    #[error("expected {expected} inputs, got {got}")]
    InputCount { expected: usize, got: usize },
    #[error("export `main` must declare an initializer")]
    MainMissingInitializer,
    #[error("duplicate handle `${0}`")]
    DuplicateHandle(String),
    #[error("`{op}` expects {expected} argument(s), got {got}")]
    CallArity { op: String, expected: usize, got: usize },
    #[error("cycle length {0} must be a power of two")]
    CycleLengthNotPowerOfTwo(usize),
}

/// Modulus / root-of-unity / domain construction errors from the field layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("modulus {0} failed a best-effort primality check")]
    NotPrime(String),
    #[error("modulus must be at least 2 (got {0})")]
    ModulusTooSmall(String),
    #[error("domain order {order} does not divide p-1")]
    OrderDoesNotDivide { order: u64 },
    #[error("order must be a power of two (got {0})")]
    OrderNotPowerOfTwo(u64),
    #[error("no root of unity of order {0} exists for this modulus")]
    NoRootOfUnity(u64),
    #[error("division by zero")]
    DivisionByZero,
    #[error("cannot invert zero")]
    ZeroInverse,
}

/// Requested a power-of-two domain that exceeds schema-imposed limits.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("requested domain order {requested} exceeds the schema limit {limit}")]
    ExceedsLimit { requested: u64, limit: u64 },
    #[error("trace length {0} must be a power of two")]
    NotPowerOfTwo(u64),
    #[error("evaluation procedure's `load.trace 1` wraps past the trace domain boundary under WrapPolicy::Error")]
    WrapsAtTraceBoundary,
}

/// Union of every fatal error kind the crate can raise.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AirError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    UndefinedReference(#[from] UndefinedReferenceError),
    #[error(transparent)]
    Arity(#[from] ArityError),
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

pub type AirResult<T> = Result<T, AirError>;
