//! Canonical byte encoding of expressions.
//!
//! Pre-order, one tag byte per node followed by its payload. Integers are
//! little-endian, strings are length-prefixed UTF-8. Shared subterms are
//! written once per occurrence, so the bytes depend only on tree structure.

use crate::arena::ExprArena;
use crate::expr::{BinaryOp, Expr, ExprId, Literal};
use soul_core::{Error, Result};
use std::collections::HashMap;

const TAG_VAR: u8 = 0x01;
const TAG_CONST: u8 = 0x02;
const TAG_PRIM: u8 = 0x03;
const TAG_ID: u8 = 0x04;
const TAG_LAM: u8 = 0x05;
const TAG_APP: u8 = 0x06;
const TAG_MAP: u8 = 0x07;
const TAG_FILTER: u8 = 0x08;
const TAG_REDUCE: u8 = 0x09;
const TAG_COMPOSE: u8 = 0x0a;
const TAG_FOCUS: u8 = 0x0b;
const TAG_BINOP: u8 = 0x0c;
const TAG_NOT: u8 = 0x0d;
const TAG_IF: u8 = 0x0e;

/// Leading byte of the shared encoding
const TAG_SHARED: u8 = 0xd0;

const LIT_INT: u8 = 0x10;
const LIT_BOOL: u8 = 0x11;
const LIT_STR: u8 = 0x12;
const LIT_NIL: u8 = 0x13;

/// Encode the tree rooted at `root`.
pub fn encode(arena: &ExprArena, root: ExprId) -> Vec<u8> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let node = arena.get(id);
        write_header(node, &mut out);
        // Reverse so the first child is written first
        stack.extend(node.children().into_iter().rev());
    }
    out
}

/// Encode the DAG rooted at `root`, writing each distinct node once.
///
/// Nodes are numbered in post-order (first child first) and children are
/// written as back-references, so the output is linear in the number of
/// distinct nodes and independent of arena layout. Not decodable by
/// [`decode`].
pub fn encode_shared(arena: &ExprArena, root: ExprId) -> Vec<u8> {
    let mut out = vec![TAG_SHARED];
    let mut numbering: HashMap<ExprId, u32> = HashMap::new();
    let mut stack = vec![(root, false)];
    while let Some((id, expanded)) = stack.pop() {
        if numbering.contains_key(&id) {
            continue;
        }
        let node = arena.get(id);
        if expanded {
            write_header(node, &mut out);
            for child in node.children() {
                let index = numbering.get(&child).copied().unwrap_or(u32::MAX);
                out.extend_from_slice(&index.to_le_bytes());
            }
            numbering.insert(id, numbering.len() as u32);
        } else {
            stack.push((id, true));
            stack.extend(node.children().into_iter().rev().map(|c| (c, false)));
        }
    }
    out
}

fn write_header(node: &Expr, out: &mut Vec<u8>) {
    match node {
        Expr::Var(k) => {
            out.push(TAG_VAR);
            out.extend_from_slice(&k.to_le_bytes());
        }
        Expr::Const(lit) => {
            out.push(TAG_CONST);
            encode_literal(lit, out);
        }
        Expr::Prim(name) => {
            out.push(TAG_PRIM);
            encode_str(name, out);
        }
        Expr::Id => out.push(TAG_ID),
        Expr::Lam(_) => out.push(TAG_LAM),
        Expr::App(..) => out.push(TAG_APP),
        Expr::Map(..) => out.push(TAG_MAP),
        Expr::Filter(..) => out.push(TAG_FILTER),
        Expr::Reduce(..) => out.push(TAG_REDUCE),
        Expr::Compose(..) => out.push(TAG_COMPOSE),
        Expr::Focus(..) => out.push(TAG_FOCUS),
        Expr::BinOp(op, ..) => {
            out.push(TAG_BINOP);
            out.push(op.tag());
        }
        Expr::Not(_) => out.push(TAG_NOT),
        Expr::If(..) => out.push(TAG_IF),
    }
}

fn encode_literal(lit: &Literal, out: &mut Vec<u8>) {
    match lit {
        Literal::Int(n) => {
            out.push(LIT_INT);
            out.extend_from_slice(&n.to_le_bytes());
        }
        Literal::Bool(b) => {
            out.push(LIT_BOOL);
            out.push(u8::from(*b));
        }
        Literal::Str(s) => {
            out.push(LIT_STR);
            encode_str(s, out);
        }
        Literal::Nil => out.push(LIT_NIL),
    }
}

fn encode_str(s: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// Decode canonical bytes into `arena`.
pub fn decode(arena: &mut ExprArena, bytes: &[u8]) -> Result<ExprId> {
    let mut decoder = Decoder { bytes, pos: 0 };
    let root = decoder.expr(arena)?;
    if decoder.pos != bytes.len() {
        return Err(Error::Parse(format!(
            "{} trailing bytes after canonical expression",
            bytes.len() - decoder.pos
        )));
    }
    Ok(root)
}

struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Decoder<'_> {
    fn take(&mut self, n: usize) -> Result<&[u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| Error::Parse("truncated canonical expression".to_string()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn i64(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(i64::from_le_bytes(buf))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| Error::Parse(format!("invalid utf-8 in canonical string: {}", e)))
    }

    fn literal(&mut self) -> Result<Literal> {
        match self.byte()? {
            LIT_INT => Ok(Literal::Int(self.i64()?)),
            LIT_BOOL => match self.byte()? {
                0 => Ok(Literal::Bool(false)),
                1 => Ok(Literal::Bool(true)),
                other => Err(Error::Parse(format!("invalid bool byte {:#04x}", other))),
            },
            LIT_STR => Ok(Literal::Str(self.string()?)),
            LIT_NIL => Ok(Literal::Nil),
            other => Err(Error::Parse(format!("unknown literal tag {:#04x}", other))),
        }
    }

    fn expr(&mut self, arena: &mut ExprArena) -> Result<ExprId> {
        let tag = self.byte()?;
        let node = match tag {
            TAG_VAR => Expr::Var(self.u32()?),
            TAG_CONST => Expr::Const(self.literal()?),
            TAG_PRIM => Expr::Prim(self.string()?),
            TAG_ID => Expr::Id,
            TAG_LAM => Expr::Lam(self.expr(arena)?),
            TAG_APP => {
                let f = self.expr(arena)?;
                Expr::App(f, self.expr(arena)?)
            }
            TAG_MAP => {
                let f = self.expr(arena)?;
                Expr::Map(f, self.expr(arena)?)
            }
            TAG_FILTER => {
                let p = self.expr(arena)?;
                Expr::Filter(p, self.expr(arena)?)
            }
            TAG_REDUCE => {
                let f = self.expr(arena)?;
                let init = self.expr(arena)?;
                Expr::Reduce(f, init, self.expr(arena)?)
            }
            TAG_COMPOSE => {
                let f = self.expr(arena)?;
                Expr::Compose(f, self.expr(arena)?)
            }
            TAG_FOCUS => {
                let xs = self.expr(arena)?;
                let p = self.expr(arena)?;
                let f = self.expr(arena)?;
                Expr::Focus(xs, p, f, self.expr(arena)?)
            }
            TAG_BINOP => {
                let op_tag = self.byte()?;
                let op = BinaryOp::from_tag(op_tag)
                    .ok_or_else(|| Error::Parse(format!("unknown operator tag {:#04x}", op_tag)))?;
                let lhs = self.expr(arena)?;
                Expr::BinOp(op, lhs, self.expr(arena)?)
            }
            TAG_NOT => Expr::Not(self.expr(arena)?),
            TAG_IF => {
                let cond = self.expr(arena)?;
                let then = self.expr(arena)?;
                Expr::If(cond, then, self.expr(arena)?)
            }
            other => return Err(Error::Parse(format!("unknown node tag {:#04x}", other))),
        };
        Ok(arena.alloc(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{parse, print};

    #[test]
    fn test_encoding_layout() {
        let mut arena = ExprArena::new();
        let root = parse(&mut arena, "(lam x x)").unwrap();
        assert_eq!(encode(&arena, root), vec![TAG_LAM, TAG_VAR, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encoding_ignores_arena_layout() {
        let mut a = ExprArena::new();
        let root_a = parse(&mut a, "(map f (filter p xs))").unwrap();

        let mut b = ExprArena::new();
        b.prim("padding");
        b.prim("xs");
        let root_b = parse(&mut b, "(map f (filter p xs))").unwrap();

        assert_ne!(root_a, root_b);
        assert_eq!(encode(&a, root_a), encode(&b, root_b));
    }

    #[test]
    fn test_decode_restores_structure() {
        let mut arena = ExprArena::new();
        let root = parse(&mut arena, r#"(reduce (lam (a b) (if (not a) b (add a b))) 0 (focus xs even? "s" id))"#).unwrap();
        let bytes = encode(&arena, root);

        let mut fresh = ExprArena::new();
        let decoded = decode(&mut fresh, &bytes).unwrap();
        assert_eq!(print(&fresh, decoded), print(&arena, root));
    }

    #[test]
    fn test_shared_encoding_is_linear() {
        let mut arena = ExprArena::new();
        let mut term = arena.prim("y");
        for _ in 0..40 {
            term = arena.binop(BinaryOp::Add, term, term);
        }
        // 41 distinct nodes, 2^41 - 1 tree nodes
        let bytes = encode_shared(&arena, term);
        assert!(bytes.len() < 41 * 16);
        assert_eq!(bytes[0], TAG_SHARED);
    }

    #[test]
    fn test_shared_encoding_ignores_arena_layout() {
        let mut a = ExprArena::new();
        let root_a = parse(&mut a, "(add (map f xs) (map f xs))").unwrap();

        let mut b = ExprArena::new();
        b.prim("xs");
        b.prim("unused");
        let root_b = parse(&mut b, "(add (map f xs) (map f xs))").unwrap();

        assert_eq!(encode_shared(&a, root_a), encode_shared(&b, root_b));
        assert_ne!(encode_shared(&a, root_a), encode(&a, root_a));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let mut arena = ExprArena::new();
        assert!(decode(&mut arena, &[]).is_err());
        assert!(decode(&mut arena, &[0xff]).is_err());
        assert!(decode(&mut arena, &[TAG_LAM]).is_err());
        assert!(decode(&mut arena, &[TAG_ID, TAG_ID]).is_err());
        assert!(decode(&mut arena, &[TAG_PRIM, 0xff, 0xff, 0xff, 0xff]).is_err());
    }
}
