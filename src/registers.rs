//! The static register bank (spec §3 "Static register", §4.E).
//!
//! Registers are always added in a fixed order — inputs, then masks, then
//! cyclic — regardless of the order a schema declares them in; the
//! builder keeps three separate buffers and concatenates them at
//! materialization time so global static indices are stable no matter how
//! `addInput`/`addMask`/`addCyclic` calls happen to interleave.

use num_bigint::BigUint;
use sha2::{Digest, Sha256};

use crate::error::{AirError, ArityError, TypeError, UndefinedReferenceError};
use crate::field::{FieldElement, PrimeField};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputScope {
    Secret,
    Public,
}

/// `scalar`/`vector` inputs are both flat sequences at the concrete-value
/// level (spec §6 "Input format"); `(parent k)` nests one level inside an
/// ancestor input's native cells. `k` indexes the input's position among
/// *inputs only* (stable because inputs are always the front of the final
/// register vector).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputShape {
    Leaf,
    Parent(usize),
}

#[derive(Clone, Debug)]
pub struct InputRegister {
    pub scope: InputScope,
    pub binary: bool,
    pub shape: InputShape,
    /// Row stride between successive native values; defaults to 1 (a native
    /// value every row) when the source declares no `steps`.
    pub steps: usize,
    /// Signed rotation applied to the finished column, modulo the trace
    /// length.
    pub shift: i64,
    pub handle: Option<String>,
}

impl InputRegister {
    pub fn new(scope: InputScope, binary: bool, shape: InputShape) -> Self {
        Self { scope, binary, shape, steps: 1, shift: 0, handle: None }
    }
}

#[derive(Clone, Debug)]
pub enum PrngMethod {
    Sha256,
}

#[derive(Clone, Debug)]
pub struct PrngSequence {
    pub method: PrngMethod,
    pub seed: Vec<u8>,
    pub count: usize,
}

#[derive(Clone, Debug)]
pub enum CyclicValues {
    Literal(Vec<BigUint>),
    Prng(PrngSequence),
}

#[derive(Clone, Debug)]
pub struct CyclicRegister {
    pub values: CyclicValues,
    pub handle: Option<String>,
}

#[derive(Clone, Debug)]
pub struct MaskRegister {
    /// Index into the *inputs* list (0-based), not the global static index.
    pub source_index: usize,
    pub inverted: bool,
    pub handle: Option<String>,
}

/// The concrete value(s) a prover supplies for one input register (spec §6
/// "Input format"): a flat sequence for a [`InputShape::Leaf`] register, or
/// one nested sub-sequence per native occurrence of the parent register for
/// [`InputShape::Parent`].
#[derive(Clone, Debug)]
pub enum ConcreteInput {
    Flat(Vec<BigUint>),
    Nested(Vec<ConcreteInput>),
}

/// Arity tree the prover must match, recoverable from the schema alone
/// (spec §4.E item 1, "Input shape descriptor").
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputShapeDescriptor {
    Leaf,
    Parent { parent: usize },
}

/// One materialized input column plus a parallel "was this cell given
/// natively, or filled by repetition" bitmap (Design Note §9, "Mask
/// semantics": tracked here, read-only by masks — never re-derived).
#[derive(Clone, Debug)]
pub struct MaterializedInput {
    pub values: Vec<FieldElement>,
    pub native: Vec<bool>,
}

/// A reference into one of the three register buffers, recovered from a
/// global static index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterRef {
    Input(usize),
    Mask(usize),
    Cyclic(usize),
}

#[derive(Default, Clone, Debug)]
pub struct StaticRegisterSet {
    inputs: Vec<InputRegister>,
    masks: Vec<MaskRegister>,
    cyclics: Vec<CyclicRegister>,
}

impl StaticRegisterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_input(&mut self, reg: InputRegister) -> Result<usize, UndefinedReferenceError> {
        if let InputShape::Parent(k) = reg.shape {
            if k >= self.inputs.len() {
                return Err(UndefinedReferenceError::IndexOutOfRange { kind: "parent input", index: k, len: self.inputs.len() });
            }
            if matches!(self.inputs[k].shape, InputShape::Parent(_)) {
                // Bound nesting depth at one level: a parent-of-a-parent would
                // require recursively segmenting segments, which no schema in
                // this language's worked examples exercises.
                return Err(UndefinedReferenceError::IndexOutOfRange { kind: "parent input (nesting depth 1 max)", index: k, len: self.inputs.len() });
            }
        }
        let idx = self.inputs.len();
        self.inputs.push(reg);
        Ok(idx)
    }

    pub fn add_mask(&mut self, source_index: usize, inverted: bool, handle: Option<String>) -> Result<usize, UndefinedReferenceError> {
        if source_index >= self.inputs.len() {
            return Err(UndefinedReferenceError::IndexOutOfRange { kind: "mask source input", index: source_index, len: self.inputs.len() });
        }
        let idx = self.masks.len();
        self.masks.push(MaskRegister { source_index, inverted, handle });
        Ok(idx)
    }

    pub fn add_cyclic(&mut self, reg: CyclicRegister) -> usize {
        let idx = self.cyclics.len();
        self.cyclics.push(reg);
        idx
    }

    pub fn inputs(&self) -> &[InputRegister] {
        &self.inputs
    }
    pub fn masks(&self) -> &[MaskRegister] {
        &self.masks
    }
    pub fn cyclics(&self) -> &[CyclicRegister] {
        &self.cyclics
    }

    pub fn len(&self) -> usize {
        self.inputs.len() + self.masks.len() + self.cyclics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Map a global `load.static i` index back to which buffer holds it.
    pub fn register_at(&self, global_index: usize) -> Option<RegisterRef> {
        if global_index < self.inputs.len() {
            return Some(RegisterRef::Input(global_index));
        }
        let global_index = global_index - self.inputs.len();
        if global_index < self.masks.len() {
            return Some(RegisterRef::Mask(global_index));
        }
        let global_index = global_index - self.masks.len();
        if global_index < self.cyclics.len() {
            return Some(RegisterRef::Cyclic(global_index));
        }
        None
    }

    /// The subset of input registers whose scope is `secret`, as global
    /// static indices (spec §4.E item 3, "Secret register traces").
    pub fn secret_input_indices(&self) -> Vec<usize> {
        self.inputs
            .iter()
            .enumerate()
            .filter(|(_, r)| r.scope == InputScope::Secret)
            .map(|(i, _)| i)
            .collect()
    }

    /// The minimum period any register implies, used by the schema/executor
    /// to size the trace domain (Design Note §9, "Static register trace
    /// length"): registers conventionally use power-of-two `steps`, so we
    /// take the max observed `steps` rather than a full LCM across periods.
    pub fn implied_period_multiplier(&self) -> usize {
        self.inputs.iter().map(|r| r.steps.max(1)).max().unwrap_or(1)
    }

    /// The trace length an export running at `cycle_length` implies: the
    /// cycle stretched by [`Self::implied_period_multiplier`], rounded up to
    /// a power of two (spec §4.G). [`crate::executor::AirInstance::init_proof`],
    /// [`crate::verifier::VerifierObject::new`], and [`crate::analyze::analyze`]
    /// all derive the same trace length from a schema this way, so none of
    /// them can silently disagree on the execution domain's size.
    pub fn trace_length_for(&self, cycle_length: usize) -> usize {
        (cycle_length * self.implied_period_multiplier()).next_power_of_two()
    }

    pub fn input_shape_descriptor(&self) -> Vec<InputShapeDescriptor> {
        self.inputs
            .iter()
            .map(|r| match r.shape {
                InputShape::Leaf => InputShapeDescriptor::Leaf,
                InputShape::Parent(k) => InputShapeDescriptor::Parent { parent: k },
            })
            .collect()
    }

    /// The real trace-domain polynomial degree bound for `load.static
    /// global_index`, given a concrete `trace_length` (spec §4.B: the base
    /// degree of a static load is "the static register's degree," not the
    /// flat `1` that `load.trace` gets). An input register's column has no
    /// general periodic structure, so it is bounded the same way a witness
    /// trace column is: `trace_length - 1`. A mask or cyclic register's
    /// column is periodic with period `L` — a degree-`<L` polynomial
    /// composed with `x^(trace_length/L)` (the same closed form
    /// [`crate::verifier::VerifierObject`] evaluates it with) — which bounds
    /// its degree at `trace_length - trace_length/L`.
    ///
    /// Unknown at schema-build time (exports, which fix `trace_length`, are
    /// declared after the procedures that contain `load.static`), so this is
    /// computed lazily per export by [`crate::analyze`], not baked into the
    /// expression IR the way `load.trace`'s flat weight is.
    pub fn register_degree(&self, global_index: usize, trace_length: usize) -> u64 {
        let t = trace_length as u64;
        match self.register_at(global_index) {
            Some(RegisterRef::Mask(i)) => {
                let source = &self.inputs[self.masks[i].source_index];
                self.periodic_degree(t, source.steps.max(1) as u64)
            }
            Some(RegisterRef::Cyclic(i)) => {
                let period = cyclic_period(&self.cyclics[i]) as u64;
                self.periodic_degree(t, period)
            }
            Some(RegisterRef::Input(_)) | None => t.saturating_sub(1),
        }
    }

    fn periodic_degree(&self, trace_length: u64, period: u64) -> u64 {
        let period = period.max(1).min(trace_length.max(1));
        trace_length.saturating_sub(trace_length / period)
    }

    /// Materialize every register's column of length `t` (a power of two),
    /// in the fixed inputs -> masks -> cyclic order, given concrete values
    /// for every input register.
    pub fn materialize(
        &self,
        field: &PrimeField,
        t: usize,
        concretes: &[ConcreteInput],
    ) -> Result<Vec<Vec<FieldElement>>, AirError> {
        if concretes.len() != self.inputs.len() {
            return Err(ArityError::InputCount { expected: self.inputs.len(), got: concretes.len() }.into());
        }
        let materialized_inputs = self.materialize_inputs(field, t, concretes)?;

        let mut out = Vec::with_capacity(self.len());
        for m in &materialized_inputs {
            out.push(m.values.clone());
        }
        for mask in &self.masks {
            let src = &materialized_inputs[mask.source_index];
            let on = field.one();
            let off = field.zero();
            let col = src
                .native
                .iter()
                .map(|&is_native| {
                    let asserted = is_native;
                    if mask.inverted {
                        if asserted { off.clone() } else { on.clone() }
                    } else if asserted {
                        on.clone()
                    } else {
                        off.clone()
                    }
                })
                .collect();
            out.push(col);
        }
        for cyclic in &self.cyclics {
            out.push(materialize_cyclic(field, t, cyclic));
        }
        Ok(out)
    }

    fn materialize_inputs(
        &self,
        field: &PrimeField,
        t: usize,
        concretes: &[ConcreteInput],
    ) -> Result<Vec<MaterializedInput>, AirError> {
        let mut out: Vec<MaterializedInput> = Vec::with_capacity(self.inputs.len());
        for (reg, concrete) in self.inputs.iter().zip(concretes.iter()) {
            let materialized = match reg.shape {
                InputShape::Leaf => {
                    let values = flat_of(concrete)?;
                    let (mut vals, mut native) = materialize_leaf(field, reg, values, t)?;
                    rotate(&mut vals, &mut native, reg.shift);
                    MaterializedInput { values: vals, native }
                }
                InputShape::Parent(k) => {
                    let parent = &out[k];
                    materialize_nested(field, reg, concrete, parent)?
                }
            };
            out.push(materialized);
        }
        Ok(out)
    }
}

/// A cyclic register's own period: the length of one repeated block,
/// whether it comes from a literal value list or a PRNG sequence.
fn cyclic_period(reg: &CyclicRegister) -> usize {
    match &reg.values {
        CyclicValues::Literal(v) => v.len().max(1),
        CyclicValues::Prng(p) => p.count.max(1),
    }
}

fn flat_of(concrete: &ConcreteInput) -> Result<&[BigUint], AirError> {
    match concrete {
        ConcreteInput::Flat(v) => Ok(v),
        ConcreteInput::Nested(_) => Err(TypeError::ShapeMismatch {
            expected: "flat input sequence".into(),
            got: "nested input sequence".into(),
        }
        .into()),
    }
}

fn materialize_leaf(
    field: &PrimeField,
    reg: &InputRegister,
    values: &[BigUint],
    window_len: usize,
) -> Result<(Vec<FieldElement>, Vec<bool>), AirError> {
    let stride = reg.steps.max(1);
    let mut vals = vec![field.zero(); window_len];
    let mut native = vec![false; window_len];
    for (j, raw) in values.iter().enumerate() {
        let row = j * stride;
        if row >= window_len {
            return Err(ArityError::InputCount { expected: (window_len + stride - 1) / stride, got: values.len() }.into());
        }
        let fe = field.elem(raw.clone());
        if reg.binary && fe != field.zero() && fe != field.one() {
            return Err(TypeError::ShapeMismatch { expected: "binary input (0 or 1)".into(), got: fe.to_string() }.into());
        }
        vals[row] = fe;
        native[row] = true;
    }
    let mut cur = field.zero();
    let mut have = false;
    for i in 0..window_len {
        if native[i] {
            cur = vals[i].clone();
            have = true;
        } else if have {
            vals[i] = cur.clone();
        }
    }
    Ok((vals, native))
}

fn materialize_nested(
    field: &PrimeField,
    reg: &InputRegister,
    concrete: &ConcreteInput,
    parent: &MaterializedInput,
) -> Result<MaterializedInput, AirError> {
    let children = match concrete {
        ConcreteInput::Nested(v) => v,
        ConcreteInput::Flat(_) => {
            return Err(TypeError::ShapeMismatch {
                expected: "nested input sequence".into(),
                got: "flat input sequence".into(),
            }
            .into())
        }
    };
    let parent_native_rows: Vec<usize> = parent
        .native
        .iter()
        .enumerate()
        .filter(|(_, &b)| b)
        .map(|(i, _)| i)
        .collect();
    if children.len() != parent_native_rows.len() {
        return Err(ArityError::InputCount { expected: parent_native_rows.len(), got: children.len() }.into());
    }

    let t = parent.values.len();
    let mut values = vec![field.zero(); t];
    let mut native = vec![false; t];
    for (seg_idx, &start) in parent_native_rows.iter().enumerate() {
        let end = parent_native_rows.get(seg_idx + 1).copied().unwrap_or(t);
        let window_len = end - start;
        let leaf_values = flat_of(&children[seg_idx])?;
        let (vals, nat) = materialize_leaf(field, reg, leaf_values, window_len)?;
        values[start..end].clone_from_slice(&vals);
        native[start..end].clone_from_slice(&nat);
    }
    Ok(MaterializedInput { values, native })
}

fn rotate(values: &mut [FieldElement], native: &mut [bool], shift: i64) {
    let n = values.len() as i64;
    if n == 0 || shift % n == 0 {
        return;
    }
    let shift = ((shift % n) + n) % n;
    let orig_v = values.to_vec();
    let orig_n = native.to_vec();
    for i in 0..values.len() {
        let src = (((i as i64) - shift).rem_euclid(n)) as usize;
        values[i] = orig_v[src].clone();
        native[i] = orig_n[src];
    }
}

fn materialize_cyclic(field: &PrimeField, t: usize, reg: &CyclicRegister) -> Vec<FieldElement> {
    let period_values = match &reg.values {
        CyclicValues::Literal(v) => v.iter().map(|x| field.elem(x.clone())).collect::<Vec<_>>(),
        CyclicValues::Prng(p) => prng_sequence(field, p),
    };
    let l = period_values.len().max(1);
    (0..t).map(|i| period_values[i % l].clone()).collect()
}

/// `sha256(seed || be32(i))`, interpreted big-endian, reduced modulo `p`,
/// for `i` in `0..count` (Design Note §9, "PRNG").
pub fn prng_sequence(field: &PrimeField, p: &PrngSequence) -> Vec<FieldElement> {
    let PrngMethod::Sha256 = p.method;
    (0..p.count as u32)
        .map(|i| {
            let mut hasher = Sha256::new();
            hasher.update(&p.seed);
            hasher.update(i.to_be_bytes());
            let digest = hasher.finalize();
            field.elem(BigUint::from_bytes_be(&digest))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> PrimeField {
        PrimeField::new(BigUint::from(96769u32)).unwrap()
    }

    #[test]
    fn leaf_input_fills_by_repetition_and_rotates() {
        let f = field();
        let mut set = StaticRegisterSet::new();
        let idx = set
            .add_input(InputRegister { steps: 4, ..InputRegister::new(InputScope::Secret, false, InputShape::Leaf) })
            .unwrap();
        assert_eq!(idx, 0);
        let concretes = vec![ConcreteInput::Flat(vec![
            BigUint::from(3u32),
            BigUint::from(4u32),
        ])];
        let cols = set.materialize(&f, 8, &concretes).unwrap();
        let col = &cols[0];
        assert_eq!(col[0], f.elem(BigUint::from(3u32)));
        assert_eq!(col[1], f.elem(BigUint::from(3u32)));
        assert_eq!(col[3], f.elem(BigUint::from(3u32)));
        assert_eq!(col[4], f.elem(BigUint::from(4u32)));
        assert_eq!(col[7], f.elem(BigUint::from(4u32)));
    }

    #[test]
    fn mask_tracks_native_not_repeated_cells() {
        let f = field();
        let mut set = StaticRegisterSet::new();
        set.add_input(InputRegister { steps: 2, ..InputRegister::new(InputScope::Public, false, InputShape::Leaf) }).unwrap();
        set.add_mask(0, false, None).unwrap();
        let concretes = vec![ConcreteInput::Flat(vec![BigUint::from(1u32), BigUint::from(2u32)])];
        let cols = set.materialize(&f, 4, &concretes).unwrap();
        let mask = &cols[1];
        assert_eq!(mask[0], f.one());
        assert_eq!(mask[1], f.zero());
        assert_eq!(mask[2], f.one());
        assert_eq!(mask[3], f.zero());
    }

    #[test]
    fn prng_sequence_is_deterministic() {
        let f = field();
        let seq = PrngSequence { method: PrngMethod::Sha256, seed: b"seed".to_vec(), count: 8 };
        let a = prng_sequence(&f, &seq);
        let b = prng_sequence(&f, &seq);
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }

    #[test]
    fn cyclic_register_repeats_with_its_period() {
        let f = field();
        let mut set = StaticRegisterSet::new();
        set.add_cyclic(CyclicRegister {
            values: CyclicValues::Literal(vec![BigUint::from(1u32), BigUint::from(2u32)]),
            handle: None,
        });
        let cols = set.materialize(&f, 8, &[]).unwrap();
        assert_eq!(cols[0], vec![f.one(), f.elem(BigUint::from(2u32)), f.one(), f.elem(BigUint::from(2u32)), f.one(), f.elem(BigUint::from(2u32)), f.one(), f.elem(BigUint::from(2u32))]);
    }

    #[test]
    fn register_degree_distinguishes_periodic_from_input() {
        let mut set = StaticRegisterSet::new();
        set.add_input(InputRegister::new(InputScope::Secret, false, InputShape::Leaf)).unwrap();
        set.add_mask(0, false, None).unwrap();
        set.add_cyclic(CyclicRegister {
            values: CyclicValues::Literal(vec![BigUint::from(1u32), BigUint::from(2u32)]),
            handle: None,
        });
        // Input: conservative trace-column bound.
        assert_eq!(set.register_degree(0, 16), 15);
        // Mask over an input with steps=1: period 1 degenerates to degree 0.
        assert_eq!(set.register_degree(1, 16), 0);
        // Cyclic of period 2 over a length-16 trace: 16 - 16/2 = 8.
        assert_eq!(set.register_degree(2, 16), 8);
    }

    #[test]
    fn parent_nesting_rejects_depth_two() {
        let mut set = StaticRegisterSet::new();
        set.add_input(InputRegister::new(InputScope::Secret, false, InputShape::Leaf)).unwrap();
        set.add_input(InputRegister::new(InputScope::Secret, false, InputShape::Parent(0))).unwrap();
        assert!(set.add_input(InputRegister::new(InputScope::Secret, false, InputShape::Parent(1))).is_err());
    }
}
