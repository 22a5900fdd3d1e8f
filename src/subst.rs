//! Substitutions and unification.
//!
//! A substitution is a persistent mapping from variable names to terms.
//! Extending one returns a new mapping; failure paths simply drop the
//! extension, so backtracking needs no trail. Dereference (`walk`) follows
//! variable chains, resolves `obj.field` accesses against the knowledge
//! base, and expands global bindings.

use std::collections::HashMap;

use crate::ast::Term;
use crate::kb::KnowledgeBase;

/// A mapping from variable names to terms representing current bindings.
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    map: HashMap<String, Term>,
}

impl Substitution {
    /// Create an empty substitution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a binding without dereferencing.
    pub fn get(&self, name: &str) -> Option<&Term> {
        self.map.get(name)
    }

    /// Number of bound variables.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if no variable is bound.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Return a new substitution extended with `name ↦ term`.
    pub fn bind(&self, name: impl Into<String>, term: Term) -> Self {
        let mut map = self.map.clone();
        map.insert(name.into(), term);
        Self { map }
    }

    /// Dereference a term: follow variable chains, resolve field accesses,
    /// and expand global bindings until a stable head term is reached.
    ///
    /// This is shallow — arguments of compounds and list elements are left
    /// untouched. Use [`resolve`] for a deep rendition.
    pub fn walk(&self, term: &Term, kb: &KnowledgeBase) -> Term {
        let mut current = term.clone();
        let mut seen_globals: Vec<String> = Vec::new();
        loop {
            match current {
                Term::Var(ref name) => match self.map.get(name) {
                    Some(bound) => current = bound.clone(),
                    None => return current,
                },
                Term::Atom(ref name) => match kb.global(name) {
                    Some(value) if !seen_globals.iter().any(|s| s == name) => {
                        seen_globals.push(name.clone());
                        current = value.clone();
                    }
                    _ => return current,
                },
                Term::FieldAccess {
                    ref object,
                    ref field,
                } => match self.resolve_field(object, field, kb) {
                    Some(resolved) => current = resolved,
                    None => return current,
                },
                _ => return current,
            }
        }
    }

    /// Deeply resolve a term: walk it and every subterm, splicing list
    /// tails that themselves resolve to lists.
    pub fn resolve(&self, term: &Term, kb: &KnowledgeBase) -> Term {
        match self.walk(term, kb) {
            Term::Compound { functor, args } => Term::Compound {
                functor,
                args: args.iter().map(|a| self.resolve(a, kb)).collect(),
            },
            Term::List { items, tail } => {
                let mut out: Vec<Term> = items.iter().map(|t| self.resolve(t, kb)).collect();
                match tail {
                    None => Term::list(out),
                    Some(t) => match self.resolve(&t, kb) {
                        Term::List {
                            items: rest,
                            tail: rest_tail,
                        } => {
                            out.extend(rest);
                            Term::List {
                                items: out,
                                tail: rest_tail,
                            }
                        }
                        other => Term::List {
                            items: out,
                            tail: Some(Box::new(other)),
                        },
                    },
                }
            }
            other => other,
        }
    }

    /// The elements of a proper list, fully resolved. None when the term
    /// does not dereference to a proper list.
    pub fn proper_list(&self, term: &Term, kb: &KnowledgeBase) -> Option<Vec<Term>> {
        match self.resolve(term, kb) {
            Term::List { items, tail: None } => Some(items),
            _ => None,
        }
    }

    /// Resolve `object.field` against the knowledge base.
    ///
    /// The object symbol may name a variable bound in this substitution;
    /// it is walked to an atom before the lookup. Unresolvable accesses
    /// return None and the field access stays as-is (a non-ground term).
    fn resolve_field(&self, object: &str, field: &str, kb: &KnowledgeBase) -> Option<Term> {
        let name = match self.walk(&Term::var(object), kb) {
            Term::Atom(n) => n,
            Term::Var(_) => object.to_string(),
            _ => return None,
        };

        if let Some(entity) = kb.entity(&name) {
            return match field {
                "description" => entity.description.clone().map(Term::Str),
                "concept" | "conceptType" => Some(Term::Atom(entity.concept_type.clone())),
                "genus" | "attributes" | "essentials" => {
                    let concept = kb.concept(&entity.concept_type)?;
                    concept_field(concept, field)
                }
                key => entity.properties.get(key).cloned().map(Term::Str),
            };
        }

        if let Some(concept) = kb.concept(&name) {
            return concept_field(concept, field);
        }

        None
    }
}

fn concept_field(concept: &crate::ast::Concept, field: &str) -> Option<Term> {
    match field {
        "description" => concept.description.clone().map(Term::Str),
        "genus" => concept.genus.clone().map(Term::Atom),
        "attributes" => Some(Term::list(
            concept.attributes.iter().cloned().map(Term::Str).collect(),
        )),
        "essentials" => Some(Term::list(
            concept.essentials.iter().cloned().map(Term::Str).collect(),
        )),
        _ => None,
    }
}

/// Occurs-check: does `name` appear in `term` under the substitution?
fn occurs(name: &str, term: &Term, subst: &Substitution, kb: &KnowledgeBase) -> bool {
    match subst.walk(term, kb) {
        Term::Var(v) => v == name,
        Term::Compound { args, .. } => args.iter().any(|a| occurs(name, a, subst, kb)),
        Term::List { items, tail } => {
            items.iter().any(|t| occurs(name, t, subst, kb))
                || tail.map_or(false, |t| occurs(name, &t, subst, kb))
        }
        _ => false,
    }
}

/// Unify two terms under an existing substitution.
///
/// Returns an extended substitution, or None if the terms cannot match.
/// Unification is pure: the input substitution is never modified.
pub fn unify(
    a: &Term,
    b: &Term,
    subst: &Substitution,
    kb: &KnowledgeBase,
) -> Option<Substitution> {
    let a = subst.walk(a, kb);
    let b = subst.walk(b, kb);

    match (a, b) {
        // Anonymous variables match anything and are never bound
        (Term::Anonymous, _) | (_, Term::Anonymous) => Some(subst.clone()),

        // Variable binding (either side), occurs-check first
        (Term::Var(v), t) | (t, Term::Var(v)) => {
            if let Term::Var(v2) = &t {
                if *v2 == v {
                    return Some(subst.clone());
                }
            }
            if occurs(&v, &t, subst, kb) {
                return None;
            }
            Some(subst.bind(v, t))
        }

        (Term::Atom(x), Term::Atom(y)) => (x == y).then(|| subst.clone()),
        (Term::Str(x), Term::Str(y)) => (x == y).then(|| subst.clone()),
        (Term::Number(x), Term::Number(y)) => (x == y).then(|| subst.clone()),

        (
            Term::Compound {
                functor: f1,
                args: a1,
            },
            Term::Compound {
                functor: f2,
                args: a2,
            },
        ) => {
            if f1 != f2 || a1.len() != a2.len() {
                return None;
            }
            let mut s = subst.clone();
            for (x, y) in a1.iter().zip(a2.iter()) {
                s = unify(x, y, &s, kb)?;
            }
            Some(s)
        }

        (
            Term::List {
                items: i1,
                tail: t1,
            },
            Term::List {
                items: i2,
                tail: t2,
            },
        ) => {
            let n = i1.len().min(i2.len());
            let mut s = subst.clone();
            for (x, y) in i1[..n].iter().zip(i2[..n].iter()) {
                s = unify(x, y, &s, kb)?;
            }
            let rest1 = residual(&i1[n..], &t1);
            let rest2 = residual(&i2[n..], &t2);
            unify(&rest1, &rest2, &s, kb)
        }

        _ => None,
    }
}

/// The list structure remaining after consuming a prefix: the tail itself
/// when no elements remain, an empty list for an absent tail.
fn residual(items: &[Term], tail: &Option<Box<Term>>) -> Term {
    if items.is_empty() {
        match tail {
            Some(t) => (**t).clone(),
            None => Term::nil(),
        }
    } else {
        Term::List {
            items: items.to_vec(),
            tail: tail.clone(),
        }
    }
}

/// Structural identity of two terms after full resolution.
pub fn structurally_equal(a: &Term, b: &Term, subst: &Substitution, kb: &KnowledgeBase) -> bool {
    subst.resolve(a, kb) == subst.resolve(b, kb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Concept, Entity};

    fn kb() -> KnowledgeBase {
        KnowledgeBase::new()
    }

    #[test]
    fn test_unify_atoms() {
        let s = Substitution::new();
        assert!(unify(&Term::atom("a"), &Term::atom("a"), &s, &kb()).is_some());
        assert!(unify(&Term::atom("a"), &Term::atom("b"), &s, &kb()).is_none());
        assert!(unify(&Term::atom("a"), &Term::str("a"), &s, &kb()).is_none());
    }

    #[test]
    fn test_unify_binds_variable() {
        let s = Substitution::new();
        let s2 = unify(&Term::var("X"), &Term::atom("a"), &s, &kb()).unwrap();
        assert_eq!(s2.walk(&Term::var("X"), &kb()), Term::atom("a"));
    }

    #[test]
    fn test_unify_symmetry() {
        let kb = kb();
        let s = Substitution::new();
        let a = Term::compound("f", vec![Term::var("X"), Term::atom("c")]);
        let b = Term::compound("f", vec![Term::atom("b"), Term::var("Y")]);
        let left = unify(&a, &b, &s, &kb);
        let right = unify(&b, &a, &s, &kb);
        assert!(left.is_some() && right.is_some());
        let (l, r) = (left.unwrap(), right.unwrap());
        assert_eq!(l.resolve(&a, &kb), r.resolve(&a, &kb));
        assert_eq!(l.resolve(&b, &kb), r.resolve(&b, &kb));
    }

    #[test]
    fn test_occurs_check() {
        let s = Substitution::new();
        let cyclic = Term::compound("f", vec![Term::var("X")]);
        assert!(unify(&Term::var("X"), &cyclic, &s, &kb()).is_none());
    }

    #[test]
    fn test_anonymous_never_binds() {
        let s = Substitution::new();
        let s2 = unify(&Term::Anonymous, &Term::atom("a"), &s, &kb()).unwrap();
        assert!(s2.is_empty());
    }

    #[test]
    fn test_unify_lists_with_tail() {
        let kb = kb();
        let s = Substitution::new();
        let pattern = Term::list_with_tail(vec![Term::var("H")], Term::var("T"));
        let value = Term::list(vec![Term::atom("a"), Term::atom("b"), Term::atom("c")]);
        let s2 = unify(&pattern, &value, &s, &kb).unwrap();
        assert_eq!(s2.walk(&Term::var("H"), &kb), Term::atom("a"));
        assert_eq!(
            s2.resolve(&Term::var("T"), &kb),
            Term::list(vec![Term::atom("b"), Term::atom("c")])
        );
    }

    #[test]
    fn test_unify_list_length_mismatch() {
        let s = Substitution::new();
        let a = Term::list(vec![Term::atom("a")]);
        let b = Term::list(vec![Term::atom("a"), Term::atom("b")]);
        assert!(unify(&a, &b, &s, &kb()).is_none());
    }

    #[test]
    fn test_resolve_splices_tails() {
        let kb = kb();
        let s = Substitution::new();
        let s2 = unify(
            &Term::var("T"),
            &Term::list(vec![Term::atom("b"), Term::atom("c")]),
            &s,
            &kb,
        )
        .unwrap();
        let open = Term::list_with_tail(vec![Term::atom("a")], Term::var("T"));
        assert_eq!(
            s2.resolve(&open, &kb),
            Term::list(vec![Term::atom("a"), Term::atom("b"), Term::atom("c")])
        );
    }

    #[test]
    fn test_field_access_on_entity() {
        let mut kb = KnowledgeBase::new();
        let mut concept = Concept::new("Man");
        concept.genus = Some("Animal".to_string());
        concept.attributes = vec!["mortal".to_string()];
        kb.add_concept(concept);
        let mut entity = Entity::new("SOCRATES", "Man");
        entity.description = Some("philosopher".to_string());
        entity.set_property("era", "ancient");
        kb.add_entity(entity);

        let s = Substitution::new();
        let access = |field: &str| Term::FieldAccess {
            object: "SOCRATES".to_string(),
            field: field.to_string(),
        };
        assert_eq!(s.walk(&access("description"), &kb), Term::str("philosopher"));
        assert_eq!(s.walk(&access("concept"), &kb), Term::atom("Man"));
        assert_eq!(s.walk(&access("era"), &kb), Term::str("ancient"));
        // falls through to the concept
        assert_eq!(s.walk(&access("genus"), &kb), Term::atom("Animal"));
        assert_eq!(
            s.walk(&access("attributes"), &kb),
            Term::list(vec![Term::str("mortal")])
        );
    }

    #[test]
    fn test_field_access_through_variable() {
        let mut kb = KnowledgeBase::new();
        kb.add_concept(Concept::new("Man"));
        let mut entity = Entity::new("SOCRATES", "Man");
        entity.description = Some("philosopher".to_string());
        kb.add_entity(entity);

        let s = Substitution::new();
        let s2 = unify(&Term::var("E"), &Term::atom("SOCRATES"), &s, &kb).unwrap();
        let access = Term::FieldAccess {
            object: "E".to_string(),
            field: "description".to_string(),
        };
        assert_eq!(s2.walk(&access, &kb), Term::str("philosopher"));
    }

    #[test]
    fn test_unknown_field_access_stays_put() {
        let kb = kb();
        let s = Substitution::new();
        let access = Term::FieldAccess {
            object: "NOBODY".to_string(),
            field: "description".to_string(),
        };
        assert_eq!(s.walk(&access, &kb), access);
        // and it will not unify with ground data
        assert!(unify(&access, &Term::str("x"), &s, &kb).is_none());
    }

    #[test]
    fn test_global_resolution() {
        let mut kb = KnowledgeBase::new();
        kb.assign_global("threshold", Term::Number(0.9));
        let s = Substitution::new();
        assert_eq!(s.walk(&Term::atom("threshold"), &kb), Term::Number(0.9));
        // self-referential globals stay put instead of looping
        kb.assign_global("loop", Term::atom("loop"));
        assert_eq!(s.walk(&Term::atom("loop"), &kb), Term::atom("loop"));
    }

    #[test]
    fn test_structural_equality() {
        let kb = kb();
        let s = Substitution::new();
        let s2 = unify(&Term::var("X"), &Term::atom("a"), &s, &kb).unwrap();
        assert!(structurally_equal(
            &Term::var("X"),
            &Term::atom("a"),
            &s2,
            &kb
        ));
        assert!(!structurally_equal(
            &Term::var("X"),
            &Term::atom("b"),
            &s2,
            &kb
        ));
    }
}
