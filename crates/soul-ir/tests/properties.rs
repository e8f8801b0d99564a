use proptest::prelude::*;
use soul_core::SoulConfig;
use soul_ir::{cost, normalize, optimize, parse, soul, ExprArena, SoulHasher};

const NORMALIZE_BUDGET: usize = 5_000;

/// Named-binder term used to generate surface syntax
#[derive(Debug, Clone)]
enum Term {
    /// Reference to an enclosing binder, chosen modulo the binder depth
    Bound(usize),
    Int(i64),
    Bool(bool),
    Prim(&'static str),
    Id,
    Lam(Box<Term>),
    App(Box<Term>, Box<Term>),
    Map(Box<Term>, Box<Term>),
    Filter(Box<Term>, Box<Term>),
    Reduce(Box<Term>, Box<Term>, Box<Term>),
    Compose(Box<Term>, Box<Term>),
    Op(&'static str, Box<Term>, Box<Term>),
    Not(Box<Term>),
    If(Box<Term>, Box<Term>, Box<Term>),
}

impl Term {
    /// Render with binder names `<prefix><depth>`.
    fn render(&self, prefix: &str, depth: usize) -> String {
        match self {
            Term::Bound(n) => {
                if depth == 0 {
                    "xs".to_string()
                } else {
                    format!("{}{}", prefix, n % depth)
                }
            }
            Term::Int(n) => n.to_string(),
            Term::Bool(b) => b.to_string(),
            Term::Prim(name) => name.to_string(),
            Term::Id => "id".to_string(),
            Term::Lam(body) => format!("(lam {}{} {})", prefix, depth, body.render(prefix, depth + 1)),
            Term::App(f, a) => format!("(app {} {})", f.render(prefix, depth), a.render(prefix, depth)),
            Term::Map(f, xs) => format!("(map {} {})", f.render(prefix, depth), xs.render(prefix, depth)),
            Term::Filter(p, xs) => {
                format!("(filter {} {})", p.render(prefix, depth), xs.render(prefix, depth))
            }
            Term::Reduce(f, init, xs) => format!(
                "(reduce {} {} {})",
                f.render(prefix, depth),
                init.render(prefix, depth),
                xs.render(prefix, depth)
            ),
            Term::Compose(f, g) => {
                format!("(compose {} {})", f.render(prefix, depth), g.render(prefix, depth))
            }
            Term::Op(op, l, r) => format!("({} {} {})", op, l.render(prefix, depth), r.render(prefix, depth)),
            Term::Not(x) => format!("(not {})", x.render(prefix, depth)),
            Term::If(c, t, e) => format!(
                "(if {} {} {})",
                c.render(prefix, depth),
                t.render(prefix, depth),
                e.render(prefix, depth)
            ),
        }
    }
}

fn term_strategy() -> impl Strategy<Value = Term> {
    let leaf = prop_oneof![
        (0usize..4).prop_map(Term::Bound),
        (-5i64..5).prop_map(Term::Int),
        any::<bool>().prop_map(Term::Bool),
        prop_oneof![Just("f"), Just("g"), Just("p"), Just("xs"), Just("ys")].prop_map(Term::Prim),
        Just(Term::Id),
    ];
    leaf.prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(|b| Term::Lam(Box::new(b))),
            (inner.clone(), inner.clone()).prop_map(|(f, a)| Term::App(Box::new(f), Box::new(a))),
            (inner.clone(), inner.clone()).prop_map(|(f, xs)| Term::Map(Box::new(f), Box::new(xs))),
            (inner.clone(), inner.clone()).prop_map(|(p, xs)| Term::Filter(Box::new(p), Box::new(xs))),
            (inner.clone(), inner.clone(), inner.clone())
                .prop_map(|(f, i, xs)| Term::Reduce(Box::new(f), Box::new(i), Box::new(xs))),
            (inner.clone(), inner.clone()).prop_map(|(f, g)| Term::Compose(Box::new(f), Box::new(g))),
            (
                prop_oneof![Just("add"), Just("mul"), Just("sub"), Just("lt")],
                inner.clone(),
                inner.clone()
            )
                .prop_map(|(op, l, r)| Term::Op(op, Box::new(l), Box::new(r))),
            inner.clone().prop_map(|x| Term::Not(Box::new(x))),
            (inner.clone(), inner.clone(), inner)
                .prop_map(|(c, t, e)| Term::If(Box::new(c), Box::new(t), Box::new(e))),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn normalize_is_idempotent(term in term_strategy()) {
        let mut arena = ExprArena::new();
        let root = parse(&mut arena, &term.render("x", 0)).unwrap();
        let first = normalize(&mut arena, root, NORMALIZE_BUDGET);
        prop_assume!(!first.exhausted);

        let second = normalize(&mut arena, first.result, NORMALIZE_BUDGET);
        prop_assert_eq!(second.result, first.result);
        prop_assert_eq!(second.steps_used, 0);
    }

    #[test]
    fn soul_is_invariant_under_alpha_renaming(term in term_strategy()) {
        let mut arena = ExprArena::new();
        let a = parse(&mut arena, &term.render("a", 0)).unwrap();
        let b = parse(&mut arena, &term.render("b", 0)).unwrap();
        // de Bruijn conversion makes the two parses identical nodes
        prop_assert_eq!(a, b);

        let soul_a = soul(&mut arena, a);
        let soul_b = soul(&mut arena, b);
        prop_assert_eq!(soul_a, soul_b);
    }

    #[test]
    fn optimize_preserves_soul(term in term_strategy()) {
        let mut arena = ExprArena::new();
        let root = parse(&mut arena, &term.render("x", 0)).unwrap();
        let hasher = SoulHasher::default();
        let before = hasher.soul(&mut arena, root);
        prop_assume!(!before.provisional);

        let optimized = optimize(&mut arena, root, hasher.config());
        let after = hasher.soul(&mut arena, optimized.result);
        prop_assert_eq!(before, after);
    }

    #[test]
    fn optimize_never_increases_cost(term in term_strategy()) {
        let mut arena = ExprArena::new();
        let root = parse(&mut arena, &term.render("x", 0)).unwrap();
        let config = SoulConfig::default();

        let once = optimize(&mut arena, root, &config);
        prop_assert_eq!(once.initial_cost, cost(&arena, root));
        prop_assert!(once.final_cost <= once.initial_cost);

        let twice = optimize(&mut arena, once.result, &config);
        prop_assert!(twice.final_cost <= once.final_cost);
    }

    #[test]
    fn canonical_form_is_a_fixpoint(term in term_strategy()) {
        let mut arena = ExprArena::new();
        let root = parse(&mut arena, &term.render("x", 0)).unwrap();
        let hasher = SoulHasher::default();
        let canonical = hasher.canonicalize(&mut arena, root);
        prop_assume!(!canonical.soul.provisional);

        let again = hasher.canonicalize(&mut arena, canonical.root);
        prop_assert_eq!(again.root, canonical.root);
        prop_assert_eq!(again.bytes, canonical.bytes);
    }

    #[test]
    fn arena_bytes_roundtrip_preserves_soul(term in term_strategy()) {
        let mut arena = ExprArena::new();
        let root = parse(&mut arena, &term.render("x", 0)).unwrap();
        let bytes = arena.to_bytes(root).unwrap();
        let (mut decoded, decoded_root) = ExprArena::from_bytes(&bytes).unwrap();

        prop_assert_eq!(cost(&decoded, decoded_root), cost(&arena, root));
        let original = soul(&mut arena, root);
        let restored = soul(&mut decoded, decoded_root);
        prop_assert_eq!(original, restored);
    }
}
