// SPDX-FileCopyrightText: 2026 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2026 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The OT algebra: operations over a flat sequence of Unicode scalar values
//! (atoms), and the three primitives `Apply`, `Compose`, `Transform`, plus
//! `Normalize`.
//!
//! Ported case-table for case-table from `ot/ot.go` in the original
//! `mstone/focus` implementation, expressed with owned `VecDeque` cursors
//! instead of slice rebinding, and `Result` instead of panics at the
//! primitive boundary (callers elevate these to fatals, per the error
//! propagation rules of the spec).

use crate::error::FocusError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// A single operation against a document. `Retain`/`Delete` sizes are
/// measured in atoms (Unicode scalar values), not bytes. `Zero` is the
/// identity element; it is never produced by the public constructors and is
/// stripped by `Normalize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Retain(u64),
    Delete(u64),
    Insert(String),
    Zero,
}

impl Op {
    fn len(&self) -> u64 {
        match self {
            Self::Retain(n) | Self::Delete(n) => *n,
            Self::Insert(s) => s.chars().count() as u64,
            Self::Zero => 0,
        }
    }

    /// Splits off the first `n` atoms of this op, returning `(head, rest)`.
    /// `n` must not exceed `self.len()`.
    fn split_at(&self, n: u64) -> (Self, Self) {
        if n == self.len() {
            return (self.clone(), Self::Zero);
        }
        match self {
            Self::Retain(size) => (Self::Retain(n), Self::Retain(size - n)),
            Self::Delete(size) => (Self::Delete(n), Self::Delete(size - n)),
            Self::Insert(s) => {
                let idx = s
                    .char_indices()
                    .nth(n as usize)
                    .map_or(s.len(), |(i, _)| i);
                (Self::Insert(s[..idx].to_string()), Self::Insert(s[idx..].to_string()))
            }
            Self::Zero => (Self::Zero, Self::Zero),
        }
    }
}

/// An ordered sequence of [`Op`] describing a single transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ops(Vec<Op>);

impl fmt::Display for Ops {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ops{{")?;
        for (i, op) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            match op {
                Op::Retain(n) => write!(f, "R{n}")?,
                Op::Delete(n) => write!(f, "D{n}")?,
                Op::Insert(s) => write!(f, "I{s:?}")?,
                Op::Zero => write!(f, "Z")?,
            }
        }
        write!(f, "}}")
    }
}

impl Ops {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn from_ops(ops: Vec<Op>) -> Self {
        Self(ops)
    }

    #[must_use]
    pub fn ops(&self) -> &[Op] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends an op, merging it with the last op if they share a tag (the
    /// same bookkeeping `Insert`/`Retain`/`Delete` invariants that
    /// `Normalize` establishes globally).
    pub fn push(&mut self, op: Op) {
        match op {
            Op::Zero => {}
            Op::Retain(0) | Op::Delete(0) => {}
            Op::Insert(ref s) if s.is_empty() => {}
            Op::Retain(n) => {
                if let Some(Op::Retain(last)) = self.0.last_mut() {
                    *last += n;
                } else {
                    self.0.push(Op::Retain(n));
                }
            }
            Op::Delete(n) => {
                if let Some(Op::Delete(last)) = self.0.last_mut() {
                    *last += n;
                } else {
                    self.0.push(Op::Delete(n));
                }
            }
            Op::Insert(s) => {
                let len = self.0.len();
                match self.0.last_mut() {
                    Some(Op::Insert(last)) => last.push_str(&s),
                    // Canonical order: when a Delete and Insert are
                    // adjacent, the Insert comes first.
                    Some(Op::Delete(_)) if len >= 2 => {
                        if let Op::Insert(prev) = &mut self.0[len - 2] {
                            prev.push_str(&s);
                        } else {
                            self.0.insert(len - 1, Op::Insert(s));
                        }
                    }
                    Some(Op::Delete(_)) => {
                        self.0.insert(len - 1, Op::Insert(s));
                    }
                    _ => self.0.push(Op::Insert(s)),
                }
            }
        }
    }

    pub fn retain(&mut self, n: u64) {
        self.push(Op::Retain(n));
    }

    pub fn delete(&mut self, n: u64) {
        self.push(Op::Delete(n));
    }

    pub fn insert(&mut self, s: impl Into<String>) {
        self.push(Op::Insert(s.into()));
    }

    /// Sum of `Retain` and `Delete` sizes: the size of the document `self` applies to.
    #[must_use]
    pub fn base_len(&self) -> u64 {
        self.0
            .iter()
            .map(|op| match op {
                Op::Retain(n) | Op::Delete(n) => *n,
                Op::Insert(_) | Op::Zero => 0,
            })
            .sum()
    }

    /// Sum of `Retain` and `Insert` sizes: the size of the document after applying `self`.
    #[must_use]
    pub fn target_len(&self) -> u64 {
        self.0
            .iter()
            .map(|op| match op {
                Op::Retain(n) => *n,
                Op::Insert(s) => s.chars().count() as u64,
                Op::Delete(_) | Op::Zero => 0,
            })
            .sum()
    }
}

impl From<Vec<Op>> for Ops {
    fn from(ops: Vec<Op>) -> Self {
        Self(ops)
    }
}

/// Removes `Zero`s, merges adjacent same-tag ops, and canonicalises
/// `Delete`-then-`Insert` adjacency into `Insert`-then-`Delete`.
#[must_use]
pub fn normalize(ops: &Ops) -> Ops {
    let mut out = Ops::new();
    for op in &ops.0 {
        out.push(op.clone());
    }
    out
}

/// Left-folds `compose` over a sequence of `Ops`.
///
/// The fold starts from the first entry itself rather than the
/// literally-empty `Ops`: an empty `Ops` is only a valid starting identity
/// when the first entry's base length is zero (true of a document's full
/// history, which always starts against the empty document), but
/// `compose_all` is also used on *suffixes* of history and on buffered
/// local writes, whose first entry generally has a non-zero base length.
/// Starting from the first entry itself is the length-correct identity in
/// both cases and agrees with the full-history case (composing `Ops::new()`
/// with the first entry is a no-op anyway).
pub fn compose_all(history: &[Ops]) -> Result<Ops, FocusError> {
    let Some((first, rest)) = history.split_first() else {
        return Ok(Ops::new());
    };
    let mut acc = first.clone();
    for ops in rest {
        acc = compose(&acc, ops)?;
    }
    Ok(acc)
}

/// A cursor over an `Ops`'s atoms that supports peeking and splitting the head.
struct Cursor(VecDeque<Op>);

impl Cursor {
    fn new(ops: &Ops) -> Self {
        Self(ops.0.iter().cloned().collect())
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn head(&self) -> Option<&Op> {
        self.0.front()
    }

    /// Removes and returns the first `n` atoms of the head op, leaving the
    /// remainder (if any) as the new head.
    fn take(&mut self, n: u64) -> Op {
        let head = self.0.pop_front().expect("take on empty cursor");
        let (taken, rest) = head.split_at(n);
        if !matches!(rest, Op::Zero) {
            self.0.push_front(rest);
        }
        taken
    }

    fn drain_rest(self) -> Vec<Op> {
        self.0.into_iter().collect()
    }
}

/// `Compose(a, b) -> c` such that `Apply(c, d) == Apply(b, Apply(a, d))`.
pub fn compose(a: &Ops, b: &Ops) -> Result<Ops, FocusError> {
    if a.target_len() != b.base_len() {
        return Err(FocusError::Incomposable {
            a_target_len: a.target_len(),
            b_base_len: b.base_len(),
        });
    }

    let mut a = Cursor::new(a);
    let mut b = Cursor::new(b);
    let mut out = Ops::new();

    loop {
        match (a.head(), b.head()) {
            (None, None) => break,
            (Some(Op::Delete(n)), _) => {
                let n = *n;
                out.push(a.take(n));
            }
            (_, Some(Op::Insert(_))) => {
                let n = b.head().unwrap().len();
                out.push(b.take(n));
            }
            (Some(ah), Some(bh)) => {
                let n = ah.len().min(bh.len());
                match (ah, bh) {
                    (Op::Retain(_), Op::Retain(_)) => out.push(Op::Retain(n)),
                    (Op::Retain(_), Op::Delete(_)) => out.push(Op::Delete(n)),
                    (Op::Insert(_), Op::Retain(_)) => {
                        let taken = a.take(n);
                        b.take(n);
                        out.push(taken);
                        continue;
                    }
                    (Op::Insert(_), Op::Delete(_)) => {
                        a.take(n);
                        b.take(n);
                        continue;
                    }
                    _ => unreachable!("cursor heads cannot both be Delete/Insert here"),
                }
                a.take(n);
                b.take(n);
            }
            (Some(_), None) => out.push(a.take(a.head().unwrap().len())),
            (None, Some(_)) => out.push(b.take(b.head().unwrap().len())),
        }
    }

    debug_assert!(a.is_empty() && b.is_empty());
    let _ = (a.drain_rest(), b.drain_rest());
    Ok(out)
}

/// `Transform(a, b) -> (a', b')` such that `Compose(a, b') == Compose(b, a')`.
///
/// Insert-vs-insert ties are broken deterministically: `a`'s insert is
/// placed first in `a'` and represented as a `Retain` in `b'` (so `a`
/// "wins" the position).
pub fn transform(a: &Ops, b: &Ops) -> Result<(Ops, Ops), FocusError> {
    if a.base_len() != b.base_len() {
        return Err(FocusError::Incompatible {
            a_base_len: a.base_len(),
            b_base_len: b.base_len(),
        });
    }

    let mut a = Cursor::new(a);
    let mut b = Cursor::new(b);
    let mut a_out = Ops::new();
    let mut b_out = Ops::new();

    loop {
        match (a.head(), b.head()) {
            (None, None) => break,
            (Some(Op::Insert(_)), _) => {
                let n = a.head().unwrap().len();
                let taken = a.take(n);
                a_out.push(taken);
                b_out.retain(n);
            }
            (_, Some(Op::Insert(_))) => {
                let n = b.head().unwrap().len();
                let taken = b.take(n);
                a_out.retain(n);
                b_out.push(taken);
            }
            (Some(ah), Some(bh)) => {
                let n = ah.len().min(bh.len());
                match (ah, bh) {
                    (Op::Retain(_), Op::Retain(_)) => {
                        a_out.retain(n);
                        b_out.retain(n);
                    }
                    (Op::Delete(_), Op::Retain(_)) => {
                        a_out.delete(n);
                    }
                    (Op::Retain(_), Op::Delete(_)) => {
                        b_out.delete(n);
                    }
                    (Op::Delete(_), Op::Delete(_)) => {
                        // Both sides agreed on the deletion: emit nothing.
                    }
                    _ => unreachable!("Insert already handled above"),
                }
                a.take(n);
                b.take(n);
            }
            (Some(_), None) => {
                let n = a.head().unwrap().len();
                a_out.push(a.take(n));
            }
            (None, Some(_)) => {
                let n = b.head().unwrap().len();
                b_out.push(b.take(n));
            }
        }
    }

    Ok((a_out, b_out))
}

/// An ordered sequence of atoms (Unicode scalar values).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Doc(Vec<char>);

impl Doc {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.0.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Requires `ops.base_len() == self.len()`.
    pub fn apply(&mut self, ops: &Ops) -> Result<(), FocusError> {
        if ops.base_len() != self.len() {
            return Err(FocusError::LengthMismatch {
                ops_base_len: ops.base_len(),
                doc_len: self.len(),
            });
        }
        let mut pos = 0usize;
        let mut out = Vec::with_capacity(ops.target_len() as usize);
        for op in &ops.0 {
            match op {
                Op::Retain(n) => {
                    let n = *n as usize;
                    out.extend_from_slice(&self.0[pos..pos + n]);
                    pos += n;
                }
                Op::Delete(n) => pos += *n as usize,
                Op::Insert(s) => out.extend(s.chars()),
                Op::Zero => {}
            }
        }
        self.0 = out;
        Ok(())
    }
}

impl fmt::Display for Doc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.0 {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl From<&str> for Doc {
    fn from(s: &str) -> Self {
        Self(s.chars().collect())
    }
}

impl From<String> for Doc {
    fn from(s: String) -> Self {
        Self(s.chars().collect())
    }
}

/// Builds the `Ops` for inserting `s` at `pos` in a document of length `doc_len`.
///
/// # Panics
/// Panics if `pos` is out of range (`pos > doc_len`).
#[must_use]
pub fn new_insert(doc_len: u64, pos: u64, s: &str) -> Ops {
    assert!(pos <= doc_len, "insert position {pos} out of range for doc of length {doc_len}");
    let mut ops = Ops::new();
    ops.retain(pos);
    ops.insert(s);
    ops.retain(doc_len - pos);
    ops
}

/// Builds the `Ops` for deleting `n` atoms starting at `pos` in a document of length `doc_len`.
///
/// # Panics
/// Panics if the range `[pos, pos + n)` is out of bounds.
#[must_use]
pub fn new_delete(doc_len: u64, pos: u64, n: u64) -> Ops {
    assert!(pos + n <= doc_len, "delete range [{pos}, {}) out of range for doc of length {doc_len}", pos + n);
    let mut ops = Ops::new();
    ops.retain(pos);
    ops.delete(n);
    ops.retain(doc_len - pos - n);
    ops
}

// --- Wire (de)serialization -------------------------------------------------
//
// On the wire, an Op is represented as in spec §6: a positive integer is a
// Retain, a negative integer is a Delete (of its absolute value), and a
// string is an Insert. `Zero` never appears on the wire (Normalize strips it
// before a document actor or client controller would serialise anything).

impl Serialize for Op {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Retain(n) => serializer.serialize_i64(*n as i64),
            Self::Delete(n) => serializer.serialize_i64(-(*n as i64)),
            Self::Insert(s) => serializer.serialize_str(s),
            Self::Zero => serializer.serialize_i64(0),
        }
    }
}

impl<'de> Deserialize<'de> for Op {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Int(i64),
            Str(String),
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Int(n) if n > 0 => Self::Retain(n as u64),
            Repr::Int(n) if n < 0 => Self::Delete((-n) as u64),
            Repr::Int(_) => Self::Zero,
            Repr::Str(s) => Self::Insert(s),
        })
    }
}

impl Serialize for Ops {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Ops {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Self(Vec::<Op>::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc(s: &str) -> Doc {
        Doc::from(s)
    }

    fn apply_str(ops: &Ops, s: &str) -> String {
        let mut d = doc(s);
        d.apply(ops).unwrap();
        d.to_string()
    }

    #[test]
    fn apply_basic_insertion() {
        let ops = new_insert(0, 0, "foobar");
        assert_eq!(apply_str(&ops, ""), "foobar");
    }

    #[test]
    fn apply_basic_deletion() {
        let ops = new_delete(6, 3, 3);
        assert_eq!(apply_str(&ops, "foobar"), "foo");
    }

    #[test]
    fn apply_rejects_length_mismatch() {
        let ops = new_insert(0, 0, "x");
        let mut d = doc("hello");
        assert!(matches!(d.apply(&ops), Err(FocusError::LengthMismatch { .. })));
    }

    #[test]
    fn compose_matches_sequential_apply() {
        let a = new_insert(5, 0, "x"); // "xhello"
        let b = new_delete(6, 0, 1); // "hello"
        let c = compose(&a, &b).unwrap();
        assert_eq!(apply_str(&c, "hello"), "hello");
    }

    #[test]
    fn compose_rejects_incomposable() {
        let a = new_insert(0, 0, "x"); // target_len 1
        let b = new_insert(5, 0, "y"); // base_len 5
        assert!(matches!(compose(&a, &b), Err(FocusError::Incomposable { .. })));
    }

    #[test]
    fn transform_concurrent_inserts_same_position() {
        let a = new_insert(0, 0, "a");
        let b = new_insert(0, 0, "b");
        let (a_prime, b_prime) = transform(&a, &b).unwrap();
        // a wins the position: applying a then b' (or b then a') converge.
        let left = compose(&a, &b_prime).unwrap();
        let right = compose(&b, &a_prime).unwrap();
        assert_eq!(apply_str(&left, ""), apply_str(&right, ""));
    }

    #[test]
    fn transform_delete_vs_delete_cancels() {
        let mut a = Ops::new();
        a.retain(1);
        a.delete(2);
        a.retain(1);
        let mut b = Ops::new();
        b.retain(1);
        b.delete(2);
        b.retain(1);
        let (a_prime, b_prime) = transform(&a, &b).unwrap();
        assert_eq!(apply_str(&compose(&a, &b_prime).unwrap(), "wxyz"), "wz");
        assert_eq!(apply_str(&compose(&b, &a_prime).unwrap(), "wxyz"), "wz");
    }

    #[test]
    fn transform_rejects_incompatible_base_len() {
        let a = new_insert(3, 0, "x");
        let b = new_insert(5, 0, "y");
        assert!(matches!(transform(&a, &b), Err(FocusError::Incompatible { .. })));
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut ops = Ops::new();
        ops.retain(0);
        ops.insert("a");
        ops.insert("b");
        ops.retain(2);
        let once = normalize(&ops);
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_puts_insert_before_delete() {
        let mut ops = Ops::new();
        ops.push(Op::Delete(2));
        ops.push(Op::Insert("x".into()));
        assert_eq!(ops.ops(), &[Op::Insert("x".into()), Op::Delete(2)]);
    }

    #[test]
    fn empty_ops_is_noop_under_apply() {
        let ops = Ops::new();
        assert_eq!(apply_str(&ops, ""), "");
    }

    #[test]
    fn empty_ops_is_identity_under_compose() {
        let a = new_insert(3, 1, "z");
        let mut identity_at_target = Ops::new();
        identity_at_target.retain(a.target_len());
        let composed = compose(&a, &identity_at_target).unwrap();
        assert_eq!(composed, a);
        let mut identity_at_base = Ops::new();
        identity_at_base.retain(a.base_len());
        let composed2 = compose(&identity_at_base, &a).unwrap();
        assert_eq!(composed2, a);
    }

    #[test]
    fn transform_against_empty_is_identity() {
        let a = new_insert(2, 1, "q");
        let mut identity = Ops::new();
        identity.retain(a.base_len());
        let (a_prime, b_prime) = transform(&a, &identity).unwrap();
        assert_eq!(a_prime, a);
        assert!(b_prime.ops().iter().all(|op| matches!(op, Op::Retain(_))));
    }

    #[test]
    fn wire_roundtrip() {
        let mut ops = Ops::new();
        ops.retain(3);
        ops.delete(2);
        ops.insert("hi");
        let json = serde_json::to_string(&ops).unwrap();
        // `push`'s canonical ordering keeps an Insert ahead of an adjacent
        // Delete, so "hi" sorts before -2 even though it was pushed after.
        assert_eq!(json, r#"[3,"hi",-2]"#);
        let back: Ops = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ops);
    }

    #[test]
    fn compose_associative() {
        let a = new_insert(0, 0, "a");
        let b = new_insert(1, 1, "b");
        let c = new_insert(2, 0, "c");
        let left = compose(&compose(&a, &b).unwrap(), &c).unwrap();
        let right = compose(&a, &compose(&b, &c).unwrap()).unwrap();
        assert_eq!(apply_str(&left, ""), apply_str(&right, ""));
    }
}
