//! S-expression surface syntax.
//!
//! ```text
//! (map (lam x (add x 1)) xs)
//! (focus xs even? inc id)
//! ((lam (x y) (mul x y)) 6 7)
//! (let n 3 (if (lt n 5) (not false) true))
//! ```
//!
//! Binders are named in the surface syntax and converted to de Bruijn
//! indices on parse, so alpha-equivalent inputs produce identical nodes.
//! Unbound names become `Prim`. `#n` denotes the free variable `n`.
//! `(let x v body)` is sugar for `((lam x body) v)`.

use crate::arena::ExprArena;
use crate::expr::{BinaryOp, Expr, ExprId, Literal};
use soul_core::{Error, Result};

const KEYWORDS: &[&str] = &[
    "lam", "fn", "λ", "app", "map", "filter", "reduce", "compose", "focus", "if", "not", "let",
];

#[derive(Debug, Clone, PartialEq)]
enum Sexp {
    Atom(String),
    Str(String),
    List(Vec<Sexp>),
}

/// Parse one expression into `arena`.
pub fn parse(arena: &mut ExprArena, input: &str) -> Result<ExprId> {
    let mut reader = Reader::new(input);
    let sexp = reader.read()?;
    reader.skip_trivia();
    if !reader.at_end() {
        return Err(Error::Parse(format!(
            "unexpected trailing input at offset {}",
            reader.pos
        )));
    }
    let mut scope = Vec::new();
    lower(arena, &sexp, &mut scope)
}

/// Render an expression back to surface syntax.
pub fn print(arena: &ExprArena, root: ExprId) -> String {
    let mut out = String::new();
    write_expr(arena, root, 0, &mut out);
    out
}

struct Reader {
    chars: Vec<char>,
    pos: usize,
}

impl Reader {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
            } else if c == ';' {
                while let Some(c) = self.peek() {
                    self.pos += 1;
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn read(&mut self) -> Result<Sexp> {
        self.skip_trivia();
        match self.peek() {
            None => Err(Error::Parse("unexpected end of input".to_string())),
            Some('(') => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_trivia();
                    match self.peek() {
                        None => return Err(Error::Parse("unclosed '('".to_string())),
                        Some(')') => {
                            self.pos += 1;
                            return Ok(Sexp::List(items));
                        }
                        Some(_) => items.push(self.read()?),
                    }
                }
            }
            Some(')') => Err(Error::Parse(format!("unexpected ')' at offset {}", self.pos))),
            Some('"') => self.read_string(),
            Some(_) => {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' || c == '"' || c == ';' {
                        break;
                    }
                    self.pos += 1;
                }
                Ok(Sexp::Atom(self.chars[start..self.pos].iter().collect()))
            }
        }
    }

    fn read_string(&mut self) -> Result<Sexp> {
        self.pos += 1;
        let mut s = String::new();
        loop {
            let c = self
                .peek()
                .ok_or_else(|| Error::Parse("unterminated string literal".to_string()))?;
            self.pos += 1;
            match c {
                '"' => return Ok(Sexp::Str(s)),
                '\\' => {
                    let escaped = self
                        .peek()
                        .ok_or_else(|| Error::Parse("unterminated escape".to_string()))?;
                    self.pos += 1;
                    match escaped {
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        'r' => s.push('\r'),
                        '0' => s.push('\0'),
                        '\\' | '"' | '\'' => s.push(escaped),
                        'u' => s.push(self.read_unicode_escape()?),
                        other => {
                            return Err(Error::Parse(format!("unknown escape \\{}", other)));
                        }
                    }
                }
                other => s.push(other),
            }
        }
    }

    fn read_unicode_escape(&mut self) -> Result<char> {
        if self.peek() != Some('{') {
            return Err(Error::Parse("expected '{' after \\u".to_string()));
        }
        self.pos += 1;
        let start = self.pos;
        while self.peek().map_or(false, |c| c != '}') {
            self.pos += 1;
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        self.pos += 1;
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| Error::Parse(format!("invalid unicode escape \\u{{{}}}", digits)))
    }
}

fn lower(arena: &mut ExprArena, sexp: &Sexp, scope: &mut Vec<String>) -> Result<ExprId> {
    match sexp {
        Sexp::Str(s) => Ok(arena.string(s)),
        Sexp::Atom(atom) => lower_atom(arena, atom, scope),
        Sexp::List(items) => {
            let (head, args) = items
                .split_first()
                .ok_or_else(|| Error::Parse("empty list".to_string()))?;

            if let Sexp::Atom(keyword) = head {
                if let Some(op) = BinaryOp::from_name(keyword) {
                    let [lhs, rhs] = expect_args::<2>(keyword, args)?;
                    let lhs = lower(arena, lhs, scope)?;
                    let rhs = lower(arena, rhs, scope)?;
                    return Ok(arena.binop(op, lhs, rhs));
                }

                match keyword.as_str() {
                    "lam" | "fn" | "λ" => return lower_lambda(arena, args, scope),
                    "app" => {
                        if args.len() < 2 {
                            return Err(Error::Parse("app needs a function and an argument".to_string()));
                        }
                        return lower_application(arena, &args[0], &args[1..], scope);
                    }
                    "map" => {
                        let [f, xs] = expect_args::<2>(keyword, args)?;
                        let f = lower(arena, f, scope)?;
                        let xs = lower(arena, xs, scope)?;
                        return Ok(arena.map(f, xs));
                    }
                    "filter" => {
                        let [p, xs] = expect_args::<2>(keyword, args)?;
                        let p = lower(arena, p, scope)?;
                        let xs = lower(arena, xs, scope)?;
                        return Ok(arena.filter(p, xs));
                    }
                    "reduce" => {
                        let [f, init, xs] = expect_args::<3>(keyword, args)?;
                        let f = lower(arena, f, scope)?;
                        let init = lower(arena, init, scope)?;
                        let xs = lower(arena, xs, scope)?;
                        return Ok(arena.reduce(f, init, xs));
                    }
                    "compose" => {
                        let [f, g] = expect_args::<2>(keyword, args)?;
                        let f = lower(arena, f, scope)?;
                        let g = lower(arena, g, scope)?;
                        return Ok(arena.compose(f, g));
                    }
                    "focus" => {
                        let [xs, p, f, drop] = expect_args::<4>(keyword, args)?;
                        let xs = lower(arena, xs, scope)?;
                        let p = lower(arena, p, scope)?;
                        let f = lower(arena, f, scope)?;
                        let drop = lower(arena, drop, scope)?;
                        return Ok(arena.focus(xs, p, f, drop));
                    }
                    "not" => {
                        let [x] = expect_args::<1>(keyword, args)?;
                        let x = lower(arena, x, scope)?;
                        return Ok(arena.not(x));
                    }
                    "if" => {
                        let [cond, then, otherwise] = expect_args::<3>(keyword, args)?;
                        let cond = lower(arena, cond, scope)?;
                        let then = lower(arena, then, scope)?;
                        let otherwise = lower(arena, otherwise, scope)?;
                        return Ok(arena.if_then_else(cond, then, otherwise));
                    }
                    "let" => return lower_let(arena, args, scope),
                    _ => {}
                }
            }

            if args.is_empty() {
                return Err(Error::Parse("application without arguments".to_string()));
            }
            lower_application(arena, head, args, scope)
        }
    }
}

fn lower_atom(arena: &mut ExprArena, atom: &str, scope: &[String]) -> Result<ExprId> {
    if let Some(pos) = scope.iter().rev().position(|name| name == atom) {
        return Ok(arena.var(pos as u32));
    }
    if let Ok(n) = atom.parse::<i64>() {
        return Ok(arena.int(n));
    }
    if let Some(free) = atom.strip_prefix('#').and_then(|n| n.parse::<u32>().ok()) {
        let index = u32::try_from(scope.len())
            .ok()
            .and_then(|depth| free.checked_add(depth))
            .ok_or_else(|| Error::Parse(format!("free variable {} is out of range", atom)))?;
        return Ok(arena.var(index));
    }
    Ok(match atom {
        "true" => arena.boolean(true),
        "false" => arena.boolean(false),
        "nil" => arena.nil(),
        "id" => arena.id(),
        name => arena.prim(name),
    })
}

fn lower_let(arena: &mut ExprArena, args: &[Sexp], scope: &mut Vec<String>) -> Result<ExprId> {
    let [binder, value, body] = expect_args::<3>("let", args)?;
    let Sexp::Atom(name) = binder else {
        return Err(Error::Parse(format!("let binder must be a name, got {:?}", binder)));
    };
    let value = lower(arena, value, scope)?;

    scope.push(name.clone());
    let body = lower(arena, body, scope);
    scope.pop();

    let lam = arena.lam(body?);
    Ok(arena.app(lam, value))
}

fn lower_lambda(arena: &mut ExprArena, args: &[Sexp], scope: &mut Vec<String>) -> Result<ExprId> {
    let [binders, body] = expect_args::<2>("lam", args)?;
    let names: Vec<String> = match binders {
        Sexp::Atom(name) => vec![name.clone()],
        Sexp::List(items) if !items.is_empty() => items
            .iter()
            .map(|item| match item {
                Sexp::Atom(name) => Ok(name.clone()),
                other => Err(Error::Parse(format!("binder must be a name, got {:?}", other))),
            })
            .collect::<Result<_>>()?,
        other => return Err(Error::Parse(format!("invalid binder list {:?}", other))),
    };

    let depth = scope.len();
    scope.extend(names.iter().cloned());
    let body = lower(arena, body, scope);
    scope.truncate(depth);

    let mut result = body?;
    for _ in &names {
        result = arena.lam(result);
    }
    Ok(result)
}

fn lower_application(
    arena: &mut ExprArena,
    head: &Sexp,
    args: &[Sexp],
    scope: &mut Vec<String>,
) -> Result<ExprId> {
    let mut result = lower(arena, head, scope)?;
    for arg in args {
        let arg = lower(arena, arg, scope)?;
        result = arena.app(result, arg);
    }
    Ok(result)
}

fn expect_args<'s, const N: usize>(form: &str, args: &'s [Sexp]) -> Result<[&'s Sexp; N]> {
    if args.len() != N {
        return Err(Error::Parse(format!(
            "{} expects {} arguments, got {}",
            form,
            N,
            args.len()
        )));
    }
    let mut out = [&args[0]; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = arg;
    }
    Ok(out)
}

fn write_expr(arena: &ExprArena, id: ExprId, depth: u32, out: &mut String) {
    match arena.get(id) {
        Expr::Var(k) => {
            if *k < depth {
                out.push_str(&format!("x{}", depth - 1 - k));
            } else {
                out.push_str(&format!("#{}", k - depth));
            }
        }
        Expr::Const(Literal::Str(s)) => out.push_str(&format!("{:?}", s)),
        Expr::Const(lit) => out.push_str(&lit.to_string()),
        Expr::Prim(name) => out.push_str(name),
        Expr::Id => out.push_str("id"),
        Expr::Lam(body) => {
            out.push_str(&format!("(lam x{} ", depth));
            write_expr(arena, *body, depth + 1, out);
            out.push(')');
        }
        Expr::App(f, a) => {
            let keyword_head = matches!(
                arena.get(*f),
                Expr::Prim(name) if KEYWORDS.contains(&name.as_str()) || BinaryOp::from_name(name).is_some()
            );
            out.push('(');
            if keyword_head {
                out.push_str("app ");
            }
            write_expr(arena, *f, depth, out);
            out.push(' ');
            write_expr(arena, *a, depth, out);
            out.push(')');
        }
        Expr::BinOp(op, l, r) => write_form(arena, op.name(), &[*l, *r], depth, out),
        Expr::Map(f, xs) => write_form(arena, "map", &[*f, *xs], depth, out),
        Expr::Filter(p, xs) => write_form(arena, "filter", &[*p, *xs], depth, out),
        Expr::Reduce(f, init, xs) => write_form(arena, "reduce", &[*f, *init, *xs], depth, out),
        Expr::Compose(f, g) => write_form(arena, "compose", &[*f, *g], depth, out),
        Expr::Focus(xs, p, f, d) => write_form(arena, "focus", &[*xs, *p, *f, *d], depth, out),
        Expr::Not(x) => write_form(arena, "not", &[*x], depth, out),
        Expr::If(c, t, e) => write_form(arena, "if", &[*c, *t, *e], depth, out),
    }
}

fn write_form(arena: &ExprArena, name: &str, args: &[ExprId], depth: u32, out: &mut String) {
    out.push('(');
    out.push_str(name);
    for arg in args {
        out.push(' ');
        write_expr(arena, *arg, depth, out);
    }
    out.push(')');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_map() {
        let mut arena = ExprArena::new();
        let root = parse(&mut arena, "(map inc xs)").unwrap();
        let f = arena.prim("inc");
        let xs = arena.prim("xs");
        assert_eq!(arena.get(root), &Expr::Map(f, xs));
    }

    #[test]
    fn test_binders_become_indices() {
        let mut arena = ExprArena::new();
        let a = parse(&mut arena, "(lam x (lam y (add x y)))").unwrap();
        let b = parse(&mut arena, "(lam a (lam b (add a b)))").unwrap();
        assert_eq!(a, b);

        let one = arena.var(1);
        let zero = arena.var(0);
        let sum = arena.binop(BinaryOp::Add, one, zero);
        let inner = arena.lam(sum);
        assert_eq!(arena.get(a), &Expr::Lam(inner));
    }

    #[test]
    fn test_multi_binder_sugar() {
        let mut arena = ExprArena::new();
        let a = parse(&mut arena, "(lam (x y) (mul x y))").unwrap();
        let b = parse(&mut arena, "(lam x (lam y (mul x y)))").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_application_is_left_nested() {
        let mut arena = ExprArena::new();
        let root = parse(&mut arena, "(f a b)").unwrap();
        let f = arena.prim("f");
        let a = arena.prim("a");
        let b = arena.prim("b");
        let fa = arena.app(f, a);
        assert_eq!(arena.get(root), &Expr::App(fa, b));
    }

    #[test]
    fn test_literals() {
        let mut arena = ExprArena::new();
        let root = parse(&mut arena, r#"(eq "a\"b" (lt -3 nil))"#).unwrap();
        assert_eq!(print(&arena, root), r#"(eq "a\"b" (lt -3 nil))"#);
    }

    #[test]
    fn test_print_roundtrip() {
        let inputs = [
            "(map (lam x0 (add x0 1)) xs)",
            "(focus xs even? inc id)",
            "(lam x0 (lam x1 (x0 x1)))",
            "(reduce add 0 (filter pos? ys))",
            "(compose f (compose g h))",
            "(app map f)",
            "(lam x0 (add x0 #0))",
            "(if (lt x 5) (not b) true)",
            "(app if c)",
        ];
        for input in inputs {
            let mut arena = ExprArena::new();
            let root = parse(&mut arena, input).unwrap();
            assert_eq!(print(&arena, root), input);
        }
    }

    #[test]
    fn test_let_lowers_to_application() {
        let mut arena = ExprArena::new();
        let sugared = parse(&mut arena, "(let n 3 (add n n))").unwrap();
        let plain = parse(&mut arena, "((lam n (add n n)) 3)").unwrap();
        assert_eq!(sugared, plain);

        // The value is outside the binder's scope
        let shadowed = parse(&mut arena, "(lam n (let n (add n 1) n))").unwrap();
        assert_eq!(print(&arena, shadowed), "(lam x0 ((lam x1 x1) (add x0 1)))");
    }

    #[test]
    fn test_conditionals() {
        let mut arena = ExprArena::new();
        let root = parse(&mut arena, "(if (not c) 1 2)").unwrap();
        let c = arena.prim("c");
        let not = arena.not(c);
        let one = arena.int(1);
        let two = arena.int(2);
        assert_eq!(arena.get(root), &Expr::If(not, one, two));
        assert!(parse(&mut arena, "(if c 1)").is_err());
        assert!(parse(&mut arena, "(not a b)").is_err());
        assert!(parse(&mut arena, "(let (x) 1 x)").is_err());
    }

    #[test]
    fn test_free_variable_overflow() {
        let mut arena = ExprArena::new();
        assert!(parse(&mut arena, "#4294967295").is_ok());
        let err = parse(&mut arena, "(lam x #4294967295)").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_comments_and_whitespace() {
        let mut arena = ExprArena::new();
        let root = parse(&mut arena, "; doubled\n(map\n  double ; fn\n  xs)\n").unwrap();
        assert_eq!(print(&arena, root), "(map double xs)");
    }

    #[test]
    fn test_parse_errors() {
        let mut arena = ExprArena::new();
        assert!(parse(&mut arena, "").is_err());
        assert!(parse(&mut arena, "(map f").is_err());
        assert!(parse(&mut arena, "(map f xs ys)").is_err());
        assert!(parse(&mut arena, "()").is_err());
        assert!(parse(&mut arena, "(f)").is_err());
        assert!(parse(&mut arena, "a b").is_err());
        assert!(parse(&mut arena, "\"open").is_err());
        assert!(parse(&mut arena, "(lam (1 (x)) x)").is_err());
    }
}
