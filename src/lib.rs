//! semalog: a Prolog-flavored logic language with semantic matching.
//!
//! Programs declare concepts (abstract categories with descriptive
//! fields), entities (concrete instances of a concept), and Horn-clause
//! rules, and query them by SLD resolution with chronological
//! backtracking. Alongside exact unification the language has a
//! semantic-match goal, `L =~= R`, which defers truth to an external
//! judge (an LLM or embedding service) and succeeds when the judged
//! similarity clears a configurable threshold.
//!
//! # Features
//!
//! - Facts and rules over atoms, strings, numbers, lists, and compounds
//! - Unification with occurs-check; structural equality
//! - Negation as failure, disjunction, if-then-else, cut
//! - `obj.field` access into concept and entity declarations
//! - Semantic built-ins (`has_attr`, `share_attr`, `differentia`,
//!   `similar_attr`) judged externally, degrading to failure offline
//! - Lazy solution streaming with `Bindings:` output per solution
//!
//! # Example
//!
//! ```text
//! concept Man : Animal, description = "rational animal".
//! entity SOCRATES : Man, description = "philosopher".
//! wise(E) :- E.description =~= "thinker".
//! ? wise(SOCRATES).
//! ```

pub mod ast;
pub mod interp;
pub mod judge;
pub mod kb;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod repl;
pub mod solve;
pub mod subst;
pub mod token;

pub use ast::{ArithExpr, ArithOp, Clause, CompareOp, Concept, Entity, Goal, PredicateHead,
    PredicateKey, Program, Statement, Term};
pub use interp::Interpreter;
pub use judge::{EmbeddingJudge, HttpJudge, Judge, JudgeConfig, NullJudge};
pub use kb::KnowledgeBase;
pub use lexer::{LexError, Lexer};
pub use parser::{parse, ParseError, Parser};
pub use solve::{EngineError, Flow, Machine};
pub use subst::{unify, Substitution};
pub use token::{Span, Token};
