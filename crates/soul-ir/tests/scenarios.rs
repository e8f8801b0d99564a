use soul_core::SoulConfig;
use soul_ir::{optimize, parse, print, Expr, ExprArena, ExprId};

fn optimized(input: &str) -> (ExprArena, ExprId) {
    let mut arena = ExprArena::new();
    let root = parse(&mut arena, input).unwrap();
    let result = optimize(&mut arena, root, &SoulConfig::default()).result;
    (arena, result)
}

fn contains_nested_map(arena: &ExprArena, root: ExprId) -> bool {
    arena.reachable(root).into_iter().any(|id| match arena.get(id) {
        Expr::Map(_, inner) => matches!(arena.get(*inner), Expr::Map(..)),
        _ => false,
    })
}

#[test]
fn map_of_map_fuses_into_single_map() {
    let (arena, root) = optimized("(map f (map g xs))");
    assert_eq!(print(&arena, root), "(map (compose f g) xs)");
    assert!(!contains_nested_map(&arena, root));
}

#[test]
fn map_of_filter_becomes_focus() {
    let (arena, root) = optimized("(map f (filter p xs))");
    assert_eq!(print(&arena, root), "(focus xs p f id)");
    let leftover = arena
        .reachable(root)
        .into_iter()
        .any(|id| matches!(arena.get(id), Expr::Map(..) | Expr::Filter(..)));
    assert!(!leftover);
}

#[test]
fn constant_addition_folds() {
    let (arena, root) = optimized("(add 3 4)");
    assert_eq!(arena.get(root), &Expr::Const(soul_ir::Literal::Int(7)));
}

#[test]
fn map_identity_is_eliminated() {
    let mut arena = ExprArena::new();
    let xs = parse(&mut arena, "xs").unwrap();
    let root = parse(&mut arena, "(map id xs)").unwrap();
    let result = optimize(&mut arena, root, &SoulConfig::default()).result;
    assert_eq!(result, xs);
}

#[test]
fn second_optimization_never_grows() {
    let mut arena = ExprArena::new();
    let root = parse(&mut arena, "(filter p1 (filter p2 (map f (map g xs))))").unwrap();
    let config = SoulConfig::default();

    let first = optimize(&mut arena, root, &config);
    let second = optimize(&mut arena, first.result, &config);
    assert!(second.final_cost <= first.final_cost);
    assert_eq!(
        print(&arena, second.result),
        "(filter p1 (filter p2 (map (compose f g) xs)))"
    );
}

#[test]
fn beta_redex_is_reduced_before_rewriting() {
    let mut arena = ExprArena::new();
    let root = parse(&mut arena, "((lam h (map h (map g xs))) id)").unwrap();
    let before = soul_ir::soul(&mut arena, root);

    let result = optimize(&mut arena, root, &SoulConfig::default()).result;
    assert_eq!(print(&arena, result), "(map g xs)");
    assert_eq!(soul_ir::soul(&mut arena, result), before);
}

#[test]
fn let_bound_conditional_folds() {
    let (arena, root) = optimized("(let b (not false) (if b (add 1 2) 0))");
    assert_eq!(arena.get(root), &Expr::Const(soul_ir::Literal::Int(3)));
}
