//! Execution contexts (spec §4.D): the symbol tables that back constants,
//! locals, parameters, and trace/static access while a procedure or
//! function body is being built.
//!
//! Handles are resolved to stable integer indices exactly once, at build
//! time (Design Note §9, "Handles vs indices") — nothing downstream ever
//! looks a load or store up by string again.

use std::collections::HashMap;

use crate::error::{ArityError, TypeError, UndefinedReferenceError};
use crate::expr::{Expression, LoadKind, Value};
use crate::registers::StaticRegisterSet;
use crate::shape::{Dimensions, ExpressionDegree};

/// Either a resolved numeric index or an unresolved `$handle` string, as
/// produced by the parser before a context has had a chance to bind it.
#[derive(Clone, Debug)]
pub enum HandleOrIndex {
    Index(usize),
    Handle(String),
}

impl From<usize> for HandleOrIndex {
    fn from(i: usize) -> Self {
        HandleOrIndex::Index(i)
    }
}

impl From<&str> for HandleOrIndex {
    fn from(h: &str) -> Self {
        HandleOrIndex::Handle(h.to_string())
    }
}

/// An ordered symbol table addressable by index or by an optional handle.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable<T> {
    entries: Vec<T>,
    handles: HashMap<String, usize>,
}

impl<T> SymbolTable<T> {
    pub fn new() -> Self {
        Self { entries: Vec::new(), handles: HashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<T> {
        self.entries
    }

    /// Append an entry, registering its handle if present.
    pub fn push(&mut self, item: T, handle: Option<&str>) -> Result<usize, ArityError> {
        let index = self.entries.len();
        if let Some(h) = handle {
            if self.handles.contains_key(h) {
                return Err(ArityError::DuplicateHandle(h.to_string()));
            }
            self.handles.insert(h.to_string(), index);
        }
        self.entries.push(item);
        Ok(index)
    }

    /// Resolve a [`HandleOrIndex`] to a concrete, bounds-checked index.
    pub fn resolve(&self, ref_: &HandleOrIndex, kind: &'static str) -> Result<usize, UndefinedReferenceError> {
        match ref_ {
            HandleOrIndex::Index(i) => {
                if *i >= self.entries.len() {
                    Err(UndefinedReferenceError::IndexOutOfRange { kind, index: *i, len: self.entries.len() })
                } else {
                    Ok(*i)
                }
            }
            HandleOrIndex::Handle(h) => self
                .handles
                .get(h)
                .copied()
                .ok_or_else(|| UndefinedReferenceError::UnknownHandle(h.clone())),
        }
    }
}

/// A declared constant, local, or parameter slot.
#[derive(Clone, Debug)]
pub struct Slot {
    pub dims: Dimensions,
    pub handle: Option<String>,
}

/// A schema-level constant: a literal value plus its inferred shape/degree.
#[derive(Clone, Debug)]
pub struct ConstantDecl {
    pub value: Value,
    pub handle: Option<String>,
    pub dims: Dimensions,
    pub degree: ExpressionDegree,
}

/// A `StoreOperation`: writes `value` into local slot `local_index`. Stores
/// execute in declared order before a procedure/function's result
/// expression is taken (spec §3).
#[derive(Clone, Debug)]
pub struct StoreOperation {
    pub local_index: usize,
    pub value: Expression,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcedureKind {
    Transition,
    Evaluation,
}

impl ProcedureKind {
    pub fn required_span(self) -> usize {
        match self {
            ProcedureKind::Transition => 1,
            ProcedureKind::Evaluation => 2,
        }
    }
}

/// What kind of body a context is being built for; governs whether
/// `load.trace`/`load.static` are reachable at all (functions cannot see
/// either, matching `FunctionContext(schema, width)`'s narrower
/// constructor signature in spec §4.D).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ContextScope {
    Procedure { span: usize, width: usize },
    Function,
}

/// Shared builder for both `ProcedureContext` and `FunctionContext`: four
/// ordered symbol tables (params, locals, constants, static/trace access)
/// addressed by index or handle.
pub struct ExecutionContext<'s> {
    scope: ContextScope,
    constants: &'s [ConstantDecl],
    /// `None` in a function body (spec §4.D: functions cannot see
    /// `load.static`), `Some` in a procedure body.
    registers: Option<&'s StaticRegisterSet>,
    pub params: SymbolTable<Slot>,
    pub locals: SymbolTable<Slot>,
}

impl<'s> ExecutionContext<'s> {
    /// `width` is the enclosing procedure's declared output width: every
    /// `load.trace i` for `i < span` yields the *entire* row as a
    /// `vector(width)` (spec §3 "Procedure", §4.C "per cell" trace degree),
    /// not a single register — `get`/`slice` pick a register back out.
    ///
    /// `registers` gives [`Self::build_load_expression`]'s `Static` arm a
    /// way to tell register kinds apart; it cannot yet report a *trace_length*-
    /// accurate degree, because a schema's exports (which fix cycle length,
    /// and so trace length) are declared after its procedures — [`crate::analyze`]
    /// re-derives the exact bound per export once that's known.
    pub fn new_procedure(constants: &'s [ConstantDecl], span: usize, width: usize, registers: &'s StaticRegisterSet) -> Self {
        Self {
            scope: ContextScope::Procedure { span, width },
            constants,
            registers: Some(registers),
            params: SymbolTable::new(),
            locals: SymbolTable::new(),
        }
    }

    pub fn new_function(constants: &'s [ConstantDecl]) -> Self {
        Self {
            scope: ContextScope::Function,
            constants,
            registers: None,
            params: SymbolTable::new(),
            locals: SymbolTable::new(),
        }
    }

    pub fn add_param(&mut self, dims: Dimensions, handle: Option<&str>) -> Result<usize, ArityError> {
        self.params.push(Slot { dims, handle: handle.map(String::from) }, handle)
    }

    pub fn add_local(&mut self, dims: Dimensions, handle: Option<&str>) -> Result<usize, ArityError> {
        self.locals.push(Slot { dims, handle: handle.map(String::from) }, handle)
    }

    /// `load.const` / `load.local` / `load.param` / `load.trace` / `load.static`.
    pub fn build_load_expression(
        &self,
        kind: LoadKind,
        idx: HandleOrIndex,
    ) -> Result<Expression, BuildError> {
        match kind {
            LoadKind::Const => {
                let idx = resolve_in(&self.constants_table(), &idx, "const")?;
                let decl = &self.constants[idx];
                Ok(Expression::load(LoadKind::Const, idx, decl.dims, decl.degree.clone()))
            }
            LoadKind::Local => {
                let idx = self.locals.resolve(&idx, "local")?;
                let slot = self.locals.get(idx).expect("resolved index in range");
                Ok(Expression::load(LoadKind::Local, idx, slot.dims, ExpressionDegree::Scalar(0).broadcast_like(slot.dims)))
            }
            LoadKind::Param => {
                let idx = self.params.resolve(&idx, "param")?;
                let slot = self.params.get(idx).expect("resolved index in range");
                Ok(Expression::load(LoadKind::Param, idx, slot.dims, ExpressionDegree::Scalar(0).broadcast_like(slot.dims)))
            }
            LoadKind::Trace => {
                let (span, width) = match self.scope {
                    ContextScope::Procedure { span, width } => (span, width),
                    ContextScope::Function => (0, 0),
                };
                let index = as_index(&idx)?;
                if index >= span {
                    return Err(TypeError::TraceIndexOutOfSpan { index, span }.into());
                }
                Ok(Expression::load(
                    LoadKind::Trace,
                    index,
                    Dimensions::vector(width),
                    ExpressionDegree::Vector(vec![1; width]),
                ))
            }
            LoadKind::Static => {
                let index = as_index(&idx)?;
                match self.registers {
                    Some(registers) if index < registers.len() => {}
                    _ => return Err(UndefinedReferenceError::UnknownStaticRegister(index).into()),
                }
                // Every register kind — plain input or periodic mask/cyclic —
                // is bounded by the same weight-1 trace column here: a
                // period-`L` register's real degree (`trace_length -
                // trace_length/L`, spec §4.B) is always < trace_length, so
                // weight 1 stays a valid bound regardless of kind. `trace_length`
                // itself isn't known until an export is built, at which point
                // `crate::analyze::procedure_degree` recomputes each
                // `load.static`'s exact degree via
                // `StaticRegisterSet::register_degree` instead of this
                // placeholder.
                Ok(Expression::load(LoadKind::Static, index, Dimensions::SCALAR, ExpressionDegree::Scalar(1)))
            }
        }
    }

    pub fn build_store_operation(
        &mut self,
        target: HandleOrIndex,
        value: Expression,
    ) -> Result<StoreOperation, BuildError> {
        let local_index = self.locals.resolve(&target, "local")?;
        let slot = self.locals.get(local_index).expect("resolved index in range");
        if slot.dims != value.dims {
            return Err(TypeError::ShapeMismatch {
                expected: slot.dims.to_string(),
                got: value.dims.to_string(),
            }
            .into());
        }
        Ok(StoreOperation { local_index, value })
    }

    fn constants_table(&self) -> ConstantsView<'_> {
        ConstantsView(self.constants)
    }
}

/// Lightweight adapter so constants (a plain slice, owned by the schema
/// builder rather than this context) can reuse `SymbolTable::resolve`'s
/// handle-lookup logic without duplicating it.
struct ConstantsView<'a>(&'a [ConstantDecl]);

fn resolve_in(view: &ConstantsView<'_>, idx: &HandleOrIndex, kind: &'static str) -> Result<usize, UndefinedReferenceError> {
    match idx {
        HandleOrIndex::Index(i) => {
            if *i >= view.0.len() {
                Err(UndefinedReferenceError::IndexOutOfRange { kind, index: *i, len: view.0.len() })
            } else {
                Ok(*i)
            }
        }
        HandleOrIndex::Handle(h) => view
            .0
            .iter()
            .position(|c| c.handle.as_deref() == Some(h.as_str()))
            .ok_or_else(|| UndefinedReferenceError::UnknownHandle(h.clone())),
    }
}

fn as_index(idx: &HandleOrIndex) -> Result<usize, BuildError> {
    match idx {
        HandleOrIndex::Index(i) => Ok(*i),
        HandleOrIndex::Handle(h) => Err(UndefinedReferenceError::UnknownHandle(h.clone()).into()),
    }
}

impl ExpressionDegree {
    /// Scalar zero broadcast to `dims`, used for freshly declared
    /// local/parameter slots which start with base degree 0 until a store
    /// gives them a real expression to track (locals/params are not
    /// themselves trace polynomials).
    fn broadcast_like(&self, dims: Dimensions) -> ExpressionDegree {
        if dims.is_scalar() {
            ExpressionDegree::Scalar(0)
        } else if dims.is_vector() {
            ExpressionDegree::Vector(vec![0; dims.rows])
        } else {
            ExpressionDegree::Matrix(vec![vec![0; dims.cols]; dims.rows])
        }
    }
}

/// Errors that can occur while building load/store expressions; a thin
/// local union so `context.rs` doesn't need to depend on `AirError`'s full
/// `Field`/`Domain`/`Syntax` variants.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    UndefinedReference(#[from] UndefinedReferenceError),
}

impl From<BuildError> for crate::error::AirError {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::Type(t) => crate::error::AirError::Type(t),
            BuildError::UndefinedReference(u) => crate::error::AirError::UndefinedReference(u),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::PrimeField;
    use crate::registers::{InputRegister, InputScope, InputShape};
    use num_bigint::BigUint;

    fn field() -> PrimeField {
        PrimeField::new(BigUint::from(96769u32)).unwrap()
    }

    fn registers_with(n: usize) -> StaticRegisterSet {
        let mut set = StaticRegisterSet::new();
        for _ in 0..n {
            set.add_input(InputRegister::new(InputScope::Public, false, InputShape::Leaf)).unwrap();
        }
        set
    }

    #[test]
    fn resolves_locals_by_handle_and_index() {
        let consts: Vec<ConstantDecl> = vec![];
        let registers = registers_with(0);
        let mut ctx = ExecutionContext::new_procedure(&consts, 1, 1, &registers);
        ctx.add_local(Dimensions::SCALAR, Some("acc")).unwrap();
        let by_index = ctx.build_load_expression(LoadKind::Local, 0usize.into()).unwrap();
        let by_handle = ctx.build_load_expression(LoadKind::Local, "acc".into()).unwrap();
        assert_eq!(by_index.dims, by_handle.dims);
    }

    #[test]
    fn duplicate_handles_rejected() {
        let consts: Vec<ConstantDecl> = vec![];
        let registers = registers_with(0);
        let mut ctx = ExecutionContext::new_procedure(&consts, 1, 1, &registers);
        ctx.add_local(Dimensions::SCALAR, Some("x")).unwrap();
        assert!(ctx.add_local(Dimensions::SCALAR, Some("x")).is_err());
    }

    #[test]
    fn trace_load_bounded_by_span() {
        let consts: Vec<ConstantDecl> = vec![];
        let registers = registers_with(0);
        let ctx = ExecutionContext::new_procedure(&consts, 1, 1, &registers);
        assert!(ctx.build_load_expression(LoadKind::Trace, 0usize.into()).is_ok());
        assert!(ctx.build_load_expression(LoadKind::Trace, 1usize.into()).is_err());
    }

    #[test]
    fn static_load_bounded_by_count() {
        let consts: Vec<ConstantDecl> = vec![];
        let registers = registers_with(3);
        let ctx = ExecutionContext::new_procedure(&consts, 2, 1, &registers);
        assert!(ctx.build_load_expression(LoadKind::Static, 2usize.into()).is_ok());
        assert!(ctx.build_load_expression(LoadKind::Static, 3usize.into()).is_err());
    }

    #[test]
    fn function_context_has_no_trace_or_static_access() {
        let consts: Vec<ConstantDecl> = vec![];
        let ctx = ExecutionContext::new_function(&consts);
        assert!(ctx.build_load_expression(LoadKind::Trace, 0usize.into()).is_err());
        assert!(ctx.build_load_expression(LoadKind::Static, 0usize.into()).is_err());
    }

    #[test]
    fn const_load_resolves_by_handle() {
        let f = field();
        let consts = vec![ConstantDecl {
            value: Value::Scalar(f.elem(BigUint::from(3u32))),
            handle: Some("c0".to_string()),
            dims: Dimensions::SCALAR,
            degree: ExpressionDegree::Scalar(0),
        }];
        let registers = registers_with(0);
        let ctx = ExecutionContext::new_procedure(&consts, 1, 1, &registers);
        assert!(ctx.build_load_expression(LoadKind::Const, "c0".into()).is_ok());
        assert!(ctx.build_load_expression(LoadKind::Const, "missing".into()).is_err());
    }
}
