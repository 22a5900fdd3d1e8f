//! Property tests for unification: symmetry and occurs soundness.

use proptest::prelude::*;

use semalog::{unify, KnowledgeBase, Substitution, Term};

fn term_strategy() -> impl Strategy<Value = Term> {
    // No anonymous variables here: `_` matches without binding, which
    // would make the two sides resolve differently by design.
    let leaf = prop_oneof![
        prop::sample::select(vec!["a", "b", "c"]).prop_map(Term::atom),
        prop::sample::select(vec!["X", "Y", "Z"]).prop_map(Term::var),
        prop::sample::select(vec!["s", "t"]).prop_map(Term::str),
        (0..4i32).prop_map(|n| Term::Number(n as f64)),
    ];
    leaf.prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(Term::list),
            (
                prop::sample::select(vec!["f", "g"]),
                prop::collection::vec(inner, 1..3)
            )
                .prop_map(|(functor, args)| Term::compound(functor, args)),
        ]
    })
}

fn contains_var(term: &Term, name: &str) -> bool {
    match term {
        Term::Var(v) => v == name,
        Term::Compound { args, .. } => args.iter().any(|a| contains_var(a, name)),
        Term::List { items, tail } => {
            items.iter().any(|t| contains_var(t, name))
                || tail.as_ref().map_or(false, |t| contains_var(t, name))
        }
        _ => false,
    }
}

proptest! {
    /// unify(a, b) succeeds iff unify(b, a) succeeds, and within each
    /// resulting substitution both terms resolve identically.
    #[test]
    fn unification_is_symmetric(a in term_strategy(), b in term_strategy()) {
        let kb = KnowledgeBase::new();
        let empty = Substitution::new();
        let left = unify(&a, &b, &empty, &kb);
        let right = unify(&b, &a, &empty, &kb);
        prop_assert_eq!(left.is_some(), right.is_some());
        if let (Some(l), Some(r)) = (left, right) {
            prop_assert_eq!(l.resolve(&a, &kb), l.resolve(&b, &kb));
            prop_assert_eq!(r.resolve(&a, &kb), r.resolve(&b, &kb));
        }
    }

    /// No produced substitution binds a variable to a term containing
    /// that variable (under full resolution).
    #[test]
    fn occurs_soundness(a in term_strategy(), b in term_strategy()) {
        let kb = KnowledgeBase::new();
        if let Some(s) = unify(&a, &b, &Substitution::new(), &kb) {
            for name in ["X", "Y", "Z"] {
                if s.get(name).is_some() {
                    let resolved = s.resolve(&Term::var(name), &kb);
                    prop_assert!(
                        !contains_var(&resolved, name),
                        "{} resolves to {:?} containing itself",
                        name,
                        resolved
                    );
                }
            }
        }
    }

    /// Unifying a term with itself always succeeds and binds nothing new
    /// beyond aliasing.
    #[test]
    fn self_unification_succeeds(a in term_strategy()) {
        let kb = KnowledgeBase::new();
        prop_assert!(unify(&a, &a, &Substitution::new(), &kb).is_some());
    }

    /// Anonymous variables never acquire bindings.
    #[test]
    fn anonymous_never_binds(a in term_strategy()) {
        let kb = KnowledgeBase::new();
        let s = unify(&Term::Anonymous, &a, &Substitution::new(), &kb).unwrap();
        prop_assert!(s.is_empty());
    }
}
