//! Abstract syntax tree definitions for semalog.
//!
//! Defines the core data structures representing programs: terms, goals,
//! clauses, concept and entity declarations, and queries.

use std::collections::HashMap;

/// A complete program: an ordered sequence of statements.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A top-level statement.
#[derive(Debug, Clone)]
pub enum Statement {
    Concept(Concept),
    Entity(Entity),
    Clause(Clause),
    Query(Vec<Goal>),
    /// Global assignment: `name = term`
    Assign(String, Term),
}

/// A declared abstract category with descriptive fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Concept {
    pub name: String,
    pub genus: Option<String>,
    pub description: Option<String>,
    pub attributes: Vec<String>,
    pub essentials: Vec<String>,
}

impl Concept {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            genus: None,
            description: None,
            attributes: Vec::new(),
            essentials: Vec::new(),
        }
    }
}

/// A declared concrete instance of a concept.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub name: String,
    pub concept_type: String,
    pub description: Option<String>,
    pub properties: HashMap<String, String>,
    /// Property keys in declaration order, for deterministic serialization.
    pub property_order: Vec<String>,
}

impl Entity {
    pub fn new(name: impl Into<String>, concept_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            concept_type: concept_type.into(),
            description: None,
            properties: HashMap::new(),
            property_order: Vec::new(),
        }
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if !self.properties.contains_key(&key) {
            self.property_order.push(key.clone());
        }
        self.properties.insert(key, value.into());
    }
}

/// The head of a clause: predicate name and parameter terms.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateHead {
    pub name: String,
    pub params: Vec<Term>,
}

/// A clause: fact or rule.
///
/// A fact has an empty body: `man(socrates).`
/// A rule has a non-empty body: `mortal(X) :- man(X).`
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub head: PredicateHead,
    pub body: Vec<Goal>,
}

impl Clause {
    /// Create a new fact (clause with empty body).
    pub fn fact(head: PredicateHead) -> Self {
        Self {
            head,
            body: Vec::new(),
        }
    }

    /// Create a new rule.
    pub fn rule(head: PredicateHead, body: Vec<Goal>) -> Self {
        Self { head, body }
    }

    /// Returns true if this is a fact (no body).
    pub fn is_fact(&self) -> bool {
        self.body.is_empty()
    }

    /// Get the predicate key of this clause.
    pub fn key(&self) -> PredicateKey {
        PredicateKey::new(self.head.name.clone(), self.head.params.len())
    }
}

/// A goal in a clause body or query.
#[derive(Debug, Clone, PartialEq)]
pub enum Goal {
    /// Predicate call (also meta-call when the term is a variable)
    Call(Term),
    /// Semantic match: `L =~= R`
    Semantic(Term, Term),
    /// Unification: `L = R`
    Unify(Term, Term),
    /// Structural equality: `L == R`
    StructEq(Term, Term),
    /// Negation as failure: `not G`
    Not(Vec<Goal>),
    /// Disjunction: `A ; B`
    Or(Vec<Goal>, Vec<Goal>),
    /// If-then-else: `(C -> T ; E)`
    IfThenElse(Vec<Goal>, Vec<Goal>, Vec<Goal>),
    /// Cut
    Cut,
    /// Always succeeds
    True,
    /// Always fails
    Fail,
    /// Arithmetic evaluation: `T is Expr`
    Is(Term, ArithExpr),
    /// Arithmetic comparison
    Compare(CompareOp, ArithExpr, ArithExpr),
}

impl Goal {
    /// Collect free variable names in first-appearance order.
    pub fn collect_variables(&self, vars: &mut Vec<String>) {
        match self {
            Goal::Call(t) => t.collect_variables(vars),
            Goal::Semantic(a, b) | Goal::Unify(a, b) | Goal::StructEq(a, b) => {
                a.collect_variables(vars);
                b.collect_variables(vars);
            }
            Goal::Not(goals) => {
                for g in goals {
                    g.collect_variables(vars);
                }
            }
            Goal::Or(a, b) => {
                for g in a.iter().chain(b) {
                    g.collect_variables(vars);
                }
            }
            Goal::IfThenElse(c, t, e) => {
                for g in c.iter().chain(t).chain(e) {
                    g.collect_variables(vars);
                }
            }
            Goal::Is(t, expr) => {
                t.collect_variables(vars);
                expr.collect_variables(vars);
            }
            Goal::Compare(_, a, b) => {
                a.collect_variables(vars);
                b.collect_variables(vars);
            }
            Goal::Cut | Goal::True | Goal::Fail => {}
        }
    }
}

/// Free variable names of a goal sequence, in first-appearance order.
pub fn goal_variables(goals: &[Goal]) -> Vec<String> {
    let mut vars = Vec::new();
    for g in goals {
        g.collect_variables(&mut vars);
    }
    vars
}

/// A semalog term.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// Logic variable
    Var(String),
    /// Anonymous variable: `_`
    Anonymous,
    /// Symbolic constant
    Atom(String),
    /// String literal
    Str(String),
    /// Numeric literal
    Number(f64),
    /// List with leading elements and an optional tail:
    /// `[a, b]` has no tail, `[a, b | T]` has tail `T`.
    List {
        items: Vec<Term>,
        tail: Option<Box<Term>>,
    },
    /// Compound term: functor(arg1, arg2, ...)
    Compound { functor: String, args: Vec<Term> },
    /// Deferred knowledge-base lookup: `object.field`
    FieldAccess { object: String, field: String },
}

impl Term {
    /// Create a compound term.
    pub fn compound(functor: impl Into<String>, args: Vec<Term>) -> Self {
        Term::Compound {
            functor: functor.into(),
            args,
        }
    }

    /// Create an atom term.
    pub fn atom(name: impl Into<String>) -> Self {
        Term::Atom(name.into())
    }

    /// Create a variable term.
    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(name.into())
    }

    /// Create a string term.
    pub fn str(text: impl Into<String>) -> Self {
        Term::Str(text.into())
    }

    /// Create a proper list from a vector of terms.
    pub fn list(items: Vec<Term>) -> Self {
        Term::List { items, tail: None }
    }

    /// Create a list with a tail: `[h1, h2 | tail]`.
    pub fn list_with_tail(items: Vec<Term>, tail: Term) -> Self {
        Term::List {
            items,
            tail: Some(Box::new(tail)),
        }
    }

    /// The empty list.
    pub fn nil() -> Self {
        Term::List {
            items: Vec::new(),
            tail: None,
        }
    }

    /// Returns true if this term is the empty list.
    pub fn is_nil(&self) -> bool {
        matches!(self, Term::List { items, tail: None } if items.is_empty())
    }

    /// Returns true if this term is a variable.
    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Var(_) | Term::Anonymous)
    }

    /// Returns true if this term is ground (no variables or field accesses).
    pub fn is_ground(&self) -> bool {
        match self {
            Term::Atom(_) | Term::Str(_) | Term::Number(_) => true,
            Term::Var(_) | Term::Anonymous | Term::FieldAccess { .. } => false,
            Term::Compound { args, .. } => args.iter().all(|a| a.is_ground()),
            Term::List { items, tail } => {
                items.iter().all(|t| t.is_ground())
                    && tail.as_ref().map_or(true, |t| t.is_ground())
            }
        }
    }

    /// Collect all named variables in this term, preserving first appearance.
    pub fn variables(&self) -> Vec<String> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars
    }

    pub(crate) fn collect_variables(&self, vars: &mut Vec<String>) {
        match self {
            Term::Var(name) => {
                if !vars.contains(name) {
                    vars.push(name.clone());
                }
            }
            Term::Compound { args, .. } => {
                for arg in args {
                    arg.collect_variables(vars);
                }
            }
            Term::List { items, tail } => {
                for item in items {
                    item.collect_variables(vars);
                }
                if let Some(t) = tail {
                    t.collect_variables(vars);
                }
            }
            _ => {}
        }
    }
}

/// Arithmetic expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ArithExpr {
    /// Numeric constant
    Number(f64),
    /// Variable reference
    Variable(String),
    /// Binary operation
    BinOp(ArithOp, Box<ArithExpr>, Box<ArithExpr>),
    /// Unary negation
    Neg(Box<ArithExpr>),
}

impl ArithExpr {
    pub(crate) fn collect_variables(&self, vars: &mut Vec<String>) {
        match self {
            ArithExpr::Variable(name) => {
                if !vars.contains(name) {
                    vars.push(name.clone());
                }
            }
            ArithExpr::BinOp(_, left, right) => {
                left.collect_variables(vars);
                right.collect_variables(vars);
            }
            ArithExpr::Neg(inner) => inner.collect_variables(vars),
            ArithExpr::Number(_) => {}
        }
    }
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// <
    Lt,
    /// >
    Gt,
    /// =<
    Le,
    /// >=
    Ge,
    /// =:= (arithmetic equality)
    ArithEq,
    /// =\= (arithmetic inequality)
    ArithNe,
}

/// Predicate identifier (name/arity).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PredicateKey {
    pub name: String,
    pub arity: usize,
}

impl PredicateKey {
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }
}

impl std::fmt::Display for PredicateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clause_key() {
        let clause = Clause::fact(PredicateHead {
            name: "parent".to_string(),
            params: vec![Term::atom("tom"), Term::atom("bob")],
        });
        assert_eq!(clause.key(), PredicateKey::new("parent", 2));
        assert!(clause.is_fact());
    }

    #[test]
    fn test_term_ground() {
        assert!(Term::list(vec![Term::atom("a"), Term::Number(1.0)]).is_ground());
        assert!(!Term::list_with_tail(vec![Term::atom("a")], Term::var("T")).is_ground());
        assert!(!Term::FieldAccess {
            object: "x".to_string(),
            field: "description".to_string()
        }
        .is_ground());
    }

    #[test]
    fn test_goal_variables_order() {
        let goals = vec![
            Goal::Call(Term::compound("p", vec![Term::var("X"), Term::var("Y")])),
            Goal::Unify(Term::var("Y"), Term::var("Z")),
        ];
        assert_eq!(goal_variables(&goals), vec!["X", "Y", "Z"]);
    }

    #[test]
    fn test_entity_property_order() {
        let mut e = Entity::new("SOCRATES", "Man");
        e.set_property("era", "ancient");
        e.set_property("city", "athens");
        e.set_property("era", "classical");
        assert_eq!(e.property_order, vec!["era", "city"]);
        assert_eq!(e.properties["era"], "classical");
    }
}
