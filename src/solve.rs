//! Resolution engine: a lazy stream of substitutions for a goal sequence.
//!
//! Solutions are produced by SLD resolution with chronological
//! backtracking, in continuation-passing style: `solve_seq` walks the
//! search tree depth first and hands every solution to an `emit`
//! continuation as it is found. The continuation's return value steers the
//! producer, which is how cut and consumer cancellation propagate without
//! materializing the stream:
//!
//! - [`Flow::More`] — keep enumerating alternatives;
//! - [`Flow::Cut`] — a cut fired in the clause body identified by the
//!   carried barrier id; every choice point it passes is pruned, and the
//!   predicate call that owns the barrier absorbs it;
//! - [`Flow::Halt`] — the consumer abandoned the stream; unwind everything.
//!
//! The barrier id is threaded lexically: the conjunction continuations of
//! one clause body capture that body's barrier, so a cut reached through a
//! callee's continuation still cuts to its own clause, not the callee.
//!
//! The engine is single threaded and cooperative. The only points where a
//! proof suspends are judge calls and `readln`, both blocking.

use std::cell::{Cell, RefCell};
use std::io::{BufRead, Write};

use thiserror::Error;

use crate::ast::{ArithExpr, ArithOp, Clause, CompareOp, Goal, PredicateKey, Term};
use crate::judge::Judge;
use crate::kb::KnowledgeBase;
use crate::parser::classify_ident;
use crate::printer;
use crate::subst::{structurally_equal, unify, Substitution};

/// Steering signal threaded between producer and consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Alternatives exhausted (producer side) or more solutions wanted
    /// (consumer side).
    More,
    /// A cut fired; the payload identifies the predicate call that must
    /// absorb it.
    Cut(u64),
    /// The consumer abandoned the stream.
    Halt,
}

/// Unrecoverable mid-proof conditions. Everything else is failure, which
/// is ordinary control flow.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("readln argument must be an unbound variable")]
    ReadlnBound,
    #[error("cannot call {0} as a goal")]
    BadMetaCall(String),
    #[error("non-numeric term in arithmetic: {0}")]
    NonNumeric(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Solution continuation: receives each solution, answers how to proceed.
pub type Emit<'e> = dyn FnMut(&Substitution) -> Result<Flow, EngineError> + 'e;

/// The resolution machine for one program run.
pub struct Machine<'a> {
    kb: &'a KnowledgeBase,
    judge: &'a dyn Judge,
    threshold: f64,
    out: &'a RefCell<Box<dyn Write>>,
    input: &'a RefCell<Box<dyn BufRead>>,
    counter: Cell<u64>,
    side_effects: Cell<bool>,
}

impl<'a> Machine<'a> {
    pub fn new(
        kb: &'a KnowledgeBase,
        judge: &'a dyn Judge,
        threshold: f64,
        out: &'a RefCell<Box<dyn Write>>,
        input: &'a RefCell<Box<dyn BufRead>>,
    ) -> Self {
        Self {
            kb,
            judge,
            threshold,
            out,
            input,
            counter: Cell::new(0),
            side_effects: Cell::new(false),
        }
    }

    /// Has a side-effecting built-in fired since the last reset?
    pub fn side_effects_fired(&self) -> bool {
        self.side_effects.get()
    }

    /// Forget recorded side effects (called by the driver per query).
    pub fn reset_side_effects(&self) {
        self.side_effects.set(false);
    }

    fn fresh_id(&self) -> u64 {
        let id = self.counter.get();
        self.counter.set(id + 1);
        id
    }

    /// Solve a query: stream every solution of `goals` into `emit`.
    ///
    /// The query is its own cut barrier, so a top-level cut never leaks.
    pub fn solve(
        &self,
        goals: &[Goal],
        subst: &Substitution,
        emit: &mut Emit,
    ) -> Result<Flow, EngineError> {
        let barrier = self.fresh_id();
        match self.solve_seq(goals, subst, barrier, emit)? {
            Flow::Cut(_) => Ok(Flow::More),
            other => Ok(other),
        }
    }

    /// Solve a conjunction left to right within one cut barrier.
    fn solve_seq(
        &self,
        goals: &[Goal],
        subst: &Substitution,
        barrier: u64,
        emit: &mut Emit,
    ) -> Result<Flow, EngineError> {
        match goals.split_first() {
            None => emit(subst),
            Some((first, rest)) => {
                self.solve_goal(first, subst, barrier, &mut |s: &Substitution| {
                    self.solve_seq(rest, s, barrier, &mut *emit)
                })
            }
        }
    }

    fn solve_goal(
        &self,
        goal: &Goal,
        subst: &Substitution,
        barrier: u64,
        emit: &mut Emit,
    ) -> Result<Flow, EngineError> {
        match goal {
            Goal::True => emit(subst),
            Goal::Fail => Ok(Flow::More),

            // Succeeds once, then fences: the cut signal carries the
            // barrier of the clause body it appears in and prunes every
            // choice point on the way there. When the continuation comes
            // back with a cut of its own, the outer barrier (allocated
            // earlier, so the smaller id) wins.
            Goal::Cut => match emit(subst)? {
                Flow::Halt => Ok(Flow::Halt),
                Flow::Cut(outer) => Ok(Flow::Cut(outer.min(barrier))),
                Flow::More => Ok(Flow::Cut(barrier)),
            },

            Goal::Unify(a, b) => match unify(a, b, subst, self.kb) {
                Some(s) => emit(&s),
                None => Ok(Flow::More),
            },

            Goal::StructEq(a, b) => {
                if structurally_equal(a, b, subst, self.kb) {
                    emit(subst)
                } else {
                    Ok(Flow::More)
                }
            }

            Goal::Semantic(left, right) => self.solve_semantic(left, right, subst, emit),

            // Negation as failure: no bindings escape, and the negated
            // goals are their own cut barrier.
            Goal::Not(inner) => {
                let mut found = false;
                let inner_barrier = self.fresh_id();
                self.solve_seq(inner, subst, inner_barrier, &mut |_s: &Substitution| {
                    found = true;
                    Ok(Flow::Halt)
                })?;
                if found {
                    Ok(Flow::More)
                } else {
                    emit(subst)
                }
            }

            Goal::Or(left, right) => {
                match self.solve_seq(left, subst, barrier, &mut *emit)? {
                    // A cut inside the left branch escapes to the
                    // enclosing barrier; it must not fall through to the
                    // right branch.
                    Flow::More => self.solve_seq(right, subst, barrier, emit),
                    other => Ok(other),
                }
            }

            // Commit to the first solution of the condition; never
            // backtrack into it. A cut inside the condition is local.
            Goal::IfThenElse(cond, then, else_) => {
                let mut first: Option<Substitution> = None;
                let cond_barrier = self.fresh_id();
                self.solve_seq(cond, subst, cond_barrier, &mut |s: &Substitution| {
                    first = Some(s.clone());
                    Ok(Flow::Halt)
                })?;
                match first {
                    Some(s) => self.solve_seq(then, &s, barrier, emit),
                    None => self.solve_seq(else_, subst, barrier, emit),
                }
            }

            Goal::Is(target, expr) => {
                let value = self.eval_arith(expr, subst)?;
                match unify(target, &Term::Number(value), subst, self.kb) {
                    Some(s) => emit(&s),
                    None => Ok(Flow::More),
                }
            }

            Goal::Compare(op, left, right) => {
                let l = self.eval_arith(left, subst)?;
                let r = self.eval_arith(right, subst)?;
                if compare(*op, l, r) {
                    emit(subst)
                } else {
                    Ok(Flow::More)
                }
            }

            Goal::Call(term) => self.solve_call(term, subst, emit),
        }
    }

    /// Dispatch a predicate call, dereferencing the callee first so that a
    /// variable bound to a compound or atom can be called (meta-call).
    fn solve_call(
        &self,
        term: &Term,
        subst: &Substitution,
        emit: &mut Emit,
    ) -> Result<Flow, EngineError> {
        match subst.walk(term, self.kb) {
            Term::Atom(name) => self.call_predicate(&name, &[], subst, emit),
            Term::Compound { functor, args } => self.call_predicate(&functor, &args, subst, emit),
            other => Err(EngineError::BadMetaCall(printer::format_term(&other, true))),
        }
    }

    fn call_predicate(
        &self,
        name: &str,
        args: &[Term],
        subst: &Substitution,
        emit: &mut Emit,
    ) -> Result<Flow, EngineError> {
        if is_builtin(name) {
            return self.solve_builtin(name, args, subst, emit);
        }

        let barrier = self.fresh_id();
        let key = PredicateKey::new(name, args.len());
        for clause in self.kb.clauses_for(&key) {
            let renamed = self.rename_clause(clause);

            let mut s = subst.clone();
            let mut matched = true;
            for (arg, param) in args.iter().zip(&renamed.head.params) {
                match unify(arg, param, &s, self.kb) {
                    Some(next) => s = next,
                    None => {
                        matched = false;
                        break;
                    }
                }
            }
            if !matched {
                continue;
            }

            match self.solve_seq(&renamed.body, &s, barrier, &mut *emit)? {
                Flow::More => continue,
                // Our own cut: this call selected the clause it appeared
                // in, so it stops here and reads as plain exhaustion. A
                // foreign cut keeps climbing, pruning our clauses too.
                Flow::Cut(b) if b == barrier => return Ok(Flow::More),
                other => return Ok(other),
            }
        }
        Ok(Flow::More)
    }

    // -- semantic goals ----------------------------------------------------

    /// `L =~= R`: succeed when the judge scores any left text against the
    /// right text at or above the threshold.
    fn solve_semantic(
        &self,
        left: &Term,
        right: &Term,
        subst: &Substitution,
        emit: &mut Emit,
    ) -> Result<Flow, EngineError> {
        let (Some(left_texts), Some(right_text)) = (
            self.semantic_texts(left, subst),
            self.semantic_text(right, subst),
        ) else {
            return Ok(Flow::More);
        };
        for text in &left_texts {
            if self.judge.similarity(text, &right_text) >= self.threshold {
                return emit(subst);
            }
        }
        Ok(Flow::More)
    }

    /// Ground text of a scalar term: strings, atoms, and numbers qualify.
    fn semantic_text(&self, term: &Term, subst: &Substitution) -> Option<String> {
        match subst.resolve(term, self.kb) {
            Term::Str(text) => Some(text),
            Term::Atom(name) => Some(name),
            Term::Number(n) => Some(printer::format_number(n)),
            _ => None,
        }
    }

    /// Ground texts of a term: a scalar yields one, a proper list yields
    /// one per element.
    fn semantic_texts(&self, term: &Term, subst: &Substitution) -> Option<Vec<String>> {
        match subst.resolve(term, self.kb) {
            Term::List { items, tail: None } => items
                .iter()
                .map(|item| self.semantic_text(item, subst))
                .collect(),
            _ => self.semantic_text(term, subst).map(|t| vec![t]),
        }
    }

    // -- clause renaming ---------------------------------------------------

    /// Produce a fresh copy of a clause: every named variable gets a
    /// unique `#n` suffix so distinct invocations never share bindings.
    fn rename_clause(&self, clause: &Clause) -> Clause {
        let id = self.fresh_id();
        let head = crate::ast::PredicateHead {
            name: clause.head.name.clone(),
            params: clause
                .head
                .params
                .iter()
                .map(|p| rename_term(p, id))
                .collect(),
        };
        let body = clause.body.iter().map(|g| rename_goal(g, id)).collect();
        Clause { head, body }
    }

    // -- arithmetic --------------------------------------------------------

    fn eval_arith(&self, expr: &ArithExpr, subst: &Substitution) -> Result<f64, EngineError> {
        match expr {
            ArithExpr::Number(n) => Ok(*n),
            ArithExpr::Variable(name) => match subst.walk(&Term::var(name.clone()), self.kb) {
                Term::Number(n) => Ok(n),
                other => Err(EngineError::NonNumeric(printer::format_term(&other, true))),
            },
            ArithExpr::BinOp(op, left, right) => {
                let l = self.eval_arith(left, subst)?;
                let r = self.eval_arith(right, subst)?;
                Ok(match op {
                    ArithOp::Add => l + r,
                    ArithOp::Sub => l - r,
                    ArithOp::Mul => l * r,
                    ArithOp::Div => l / r,
                    ArithOp::Mod => l % r,
                })
            }
            ArithExpr::Neg(inner) => Ok(-self.eval_arith(inner, subst)?),
        }
    }

    // -- built-ins ---------------------------------------------------------

    fn solve_builtin(
        &self,
        name: &str,
        args: &[Term],
        subst: &Substitution,
        emit: &mut Emit,
    ) -> Result<Flow, EngineError> {
        match (name, args.len()) {
            ("print", _) => {
                self.write_terms(args, subst, false)?;
                emit(subst)
            }
            ("println", _) => {
                self.write_terms(args, subst, true)?;
                emit(subst)
            }
            ("nl", 0) => {
                self.side_effects.set(true);
                writeln!(self.out.borrow_mut())?;
                emit(subst)
            }

            ("readln", 1) => {
                let target = subst.walk(&args[0], self.kb);
                if !target.is_variable() {
                    return Err(EngineError::ReadlnBound);
                }
                self.side_effects.set(true);
                let mut line = String::new();
                self.input.borrow_mut().read_line(&mut line)?;
                while line.ends_with('\n') || line.ends_with('\r') {
                    line.pop();
                }
                match target {
                    Term::Var(var) => emit(&subst.bind(var, Term::Str(line))),
                    // anonymous: the line is consumed and dropped
                    _ => emit(subst),
                }
            }

            ("member", 2) => {
                let Some(items) = subst.proper_list(&args[1], self.kb) else {
                    return Ok(Flow::More);
                };
                for item in &items {
                    if let Some(s) = unify(&args[0], item, subst, self.kb) {
                        match emit(&s)? {
                            Flow::More => continue,
                            other => return Ok(other),
                        }
                    }
                }
                Ok(Flow::More)
            }

            ("append", 3) => {
                let (Some(mut a), Some(b)) = (
                    subst.proper_list(&args[0], self.kb),
                    subst.proper_list(&args[1], self.kb),
                ) else {
                    return Ok(Flow::More);
                };
                a.extend(b);
                match unify(&args[2], &Term::list(a), subst, self.kb) {
                    Some(s) => emit(&s),
                    None => Ok(Flow::More),
                }
            }

            ("length", 2) => {
                let Some(items) = subst.proper_list(&args[0], self.kb) else {
                    return Ok(Flow::More);
                };
                match unify(&args[1], &Term::Number(items.len() as f64), subst, self.kb) {
                    Some(s) => emit(&s),
                    None => Ok(Flow::More),
                }
            }

            ("reverse", 2) => {
                let Some(mut items) = subst.proper_list(&args[0], self.kb) else {
                    return Ok(Flow::More);
                };
                items.reverse();
                match unify(&args[1], &Term::list(items), subst, self.kb) {
                    Some(s) => emit(&s),
                    None => Ok(Flow::More),
                }
            }

            ("is_list", 1) => self.guard(
                matches!(subst.resolve(&args[0], self.kb), Term::List { tail: None, .. }),
                subst,
                emit,
            ),
            ("is_atom", 1) => self.guard(
                matches!(subst.walk(&args[0], self.kb), Term::Atom(_)),
                subst,
                emit,
            ),
            ("is_bound", 1) => {
                self.guard(!subst.walk(&args[0], self.kb).is_variable(), subst, emit)
            }
            ("is_unbound", 1) => {
                self.guard(subst.walk(&args[0], self.kb).is_variable(), subst, emit)
            }

            ("findall", 3) | ("bagof", 3) => {
                let collected = self.collect_solutions(&args[0], &args[1], subst)?;
                match unify(&args[2], &Term::list(collected), subst, self.kb) {
                    Some(s) => emit(&s),
                    None => Ok(Flow::More),
                }
            }

            ("setof", 3) => {
                let collected = self.collect_solutions(&args[0], &args[1], subst)?;
                let mut unique: Vec<Term> = Vec::new();
                for term in collected {
                    if !unique.contains(&term) {
                        unique.push(term);
                    }
                }
                if unique.is_empty() {
                    return Ok(Flow::More);
                }
                match unify(&args[2], &Term::list(unique), subst, self.kb) {
                    Some(s) => emit(&s),
                    None => Ok(Flow::More),
                }
            }

            ("has_attr", 2) => {
                let (Some(attr), Some(subject)) = (
                    self.semantic_text(&args[0], subst),
                    self.semantic_text(&args[1], subst),
                ) else {
                    return Ok(Flow::More);
                };
                self.guard(self.judge.has_attribute(&attr, &subject), subst, emit)
            }

            ("share_attr", 3) => {
                let (Some(attr), Some(a), Some(b)) = (
                    self.semantic_text(&args[0], subst),
                    self.semantic_text(&args[1], subst),
                    self.semantic_text(&args[2], subst),
                ) else {
                    return Ok(Flow::More);
                };
                self.guard(self.judge.share_attribute(&attr, &a, &b), subst, emit)
            }

            ("differentia", 3) => {
                let (Some(a), Some(b)) = (
                    self.semantic_text(&args[0], subst),
                    self.semantic_text(&args[1], subst),
                ) else {
                    return Ok(Flow::More);
                };
                let answer = self.judge.differentia(&a, &b);
                if answer.is_empty() {
                    return Ok(Flow::More);
                }
                match unify(&args[2], &Term::Str(answer), subst, self.kb) {
                    Some(s) => emit(&s),
                    None => Ok(Flow::More),
                }
            }

            ("similar_attr", 3) => {
                let (Some(axis), Some(a), Some(b)) = (
                    self.semantic_text(&args[0], subst),
                    self.semantic_text(&args[1], subst),
                    self.semantic_text(&args[2], subst),
                ) else {
                    return Ok(Flow::More);
                };
                self.guard(
                    self.judge.axis_similarity(&axis, &a, &b) >= self.threshold,
                    subst,
                    emit,
                )
            }

            // A built-in name with the wrong arity fails rather than
            // falling through to user clauses.
            _ => Ok(Flow::More),
        }
    }

    fn guard(
        &self,
        holds: bool,
        subst: &Substitution,
        emit: &mut Emit,
    ) -> Result<Flow, EngineError> {
        if holds {
            emit(subst)
        } else {
            Ok(Flow::More)
        }
    }

    fn write_terms(
        &self,
        args: &[Term],
        subst: &Substitution,
        newline: bool,
    ) -> Result<(), EngineError> {
        self.side_effects.set(true);
        let mut out = self.out.borrow_mut();
        for arg in args {
            write!(out, "{}", printer::display(arg, subst, self.kb))?;
        }
        if newline {
            writeln!(out)?;
        }
        Ok(())
    }

    /// Nested resolution for `findall` and friends: solve the goal term
    /// from the surrounding substitution and collect the resolved
    /// template per solution. No bindings leak outward.
    fn collect_solutions(
        &self,
        template: &Term,
        goal: &Term,
        subst: &Substitution,
    ) -> Result<Vec<Term>, EngineError> {
        let mut collected = Vec::new();
        self.solve_call(goal, subst, &mut |s: &Substitution| {
            collected.push(s.resolve(template, self.kb));
            Ok(Flow::More)
        })?;
        Ok(collected)
    }
}

/// Names reserved for the built-in table.
pub fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        "print"
            | "println"
            | "nl"
            | "readln"
            | "member"
            | "append"
            | "length"
            | "reverse"
            | "is_list"
            | "is_atom"
            | "is_bound"
            | "is_unbound"
            | "findall"
            | "setof"
            | "bagof"
            | "has_attr"
            | "share_attr"
            | "differentia"
            | "similar_attr"
    )
}

fn compare(op: CompareOp, l: f64, r: f64) -> bool {
    match op {
        CompareOp::Lt => l < r,
        CompareOp::Gt => l > r,
        CompareOp::Le => l <= r,
        CompareOp::Ge => l >= r,
        CompareOp::ArithEq => l == r,
        CompareOp::ArithNe => l != r,
    }
}

fn rename_term(term: &Term, id: u64) -> Term {
    match term {
        Term::Var(name) => Term::Var(format!("{}#{}", name, id)),
        Term::Compound { functor, args } => Term::Compound {
            functor: functor.clone(),
            args: args.iter().map(|a| rename_term(a, id)).collect(),
        },
        Term::List { items, tail } => Term::List {
            items: items.iter().map(|t| rename_term(t, id)).collect(),
            tail: tail.as_ref().map(|t| Box::new(rename_term(t, id))),
        },
        // The object may name a clause variable; rename it with the rest
        // of the clause scope.
        Term::FieldAccess { object, field } => {
            let object = match classify_ident(object) {
                Term::Var(_) => format!("{}#{}", object, id),
                _ => object.clone(),
            };
            Term::FieldAccess {
                object,
                field: field.clone(),
            }
        }
        other => other.clone(),
    }
}

fn rename_goal(goal: &Goal, id: u64) -> Goal {
    match goal {
        Goal::Call(t) => Goal::Call(rename_term(t, id)),
        Goal::Semantic(a, b) => Goal::Semantic(rename_term(a, id), rename_term(b, id)),
        Goal::Unify(a, b) => Goal::Unify(rename_term(a, id), rename_term(b, id)),
        Goal::StructEq(a, b) => Goal::StructEq(rename_term(a, id), rename_term(b, id)),
        Goal::Not(goals) => Goal::Not(goals.iter().map(|g| rename_goal(g, id)).collect()),
        Goal::Or(a, b) => Goal::Or(
            a.iter().map(|g| rename_goal(g, id)).collect(),
            b.iter().map(|g| rename_goal(g, id)).collect(),
        ),
        Goal::IfThenElse(c, t, e) => Goal::IfThenElse(
            c.iter().map(|g| rename_goal(g, id)).collect(),
            t.iter().map(|g| rename_goal(g, id)).collect(),
            e.iter().map(|g| rename_goal(g, id)).collect(),
        ),
        Goal::Is(t, expr) => Goal::Is(rename_term(t, id), rename_arith(expr, id)),
        Goal::Compare(op, a, b) => Goal::Compare(*op, rename_arith(a, id), rename_arith(b, id)),
        Goal::Cut | Goal::True | Goal::Fail => goal.clone(),
    }
}

fn rename_arith(expr: &ArithExpr, id: u64) -> ArithExpr {
    match expr {
        ArithExpr::Variable(name) => ArithExpr::Variable(format!("{}#{}", name, id)),
        ArithExpr::BinOp(op, l, r) => ArithExpr::BinOp(
            *op,
            Box::new(rename_arith(l, id)),
            Box::new(rename_arith(r, id)),
        ),
        ArithExpr::Neg(inner) => ArithExpr::Neg(Box::new(rename_arith(inner, id))),
        ArithExpr::Number(_) => expr.clone(),
    }
}
