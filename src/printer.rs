//! Term and knowledge-base rendering to surface syntax.
//!
//! Two registers: `display` (raw strings, used by `print`/`println`) and
//! `quoted` (strings in double quotes, used for result bindings and
//! serialization). Printing a term and re-parsing it yields a structurally
//! identical term, modulo list sugar.

use std::fmt::Write;

use crate::ast::{ArithExpr, ArithOp, Clause, CompareOp, Goal, Term};
use crate::kb::KnowledgeBase;
use crate::subst::Substitution;

/// Render a term under a substitution, strings unquoted.
pub fn display(term: &Term, subst: &Substitution, kb: &KnowledgeBase) -> String {
    format_term(&subst.resolve(term, kb), false)
}

/// Render a term under a substitution, strings quoted.
pub fn quoted(term: &Term, subst: &Substitution, kb: &KnowledgeBase) -> String {
    format_term(&subst.resolve(term, kb), true)
}

/// Render an already-resolved term.
pub fn format_term(term: &Term, quote_strings: bool) -> String {
    match term {
        Term::Var(name) => name.clone(),
        Term::Anonymous => "_".to_string(),
        Term::Atom(name) => name.clone(),
        Term::Str(text) => {
            if quote_strings {
                format!("\"{}\"", escape(text))
            } else {
                text.clone()
            }
        }
        Term::Number(n) => format_number(*n),
        Term::List { items, tail } => {
            let mut out = String::from("[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&format_term(item, quote_strings));
            }
            if let Some(t) = tail {
                let _ = write!(out, " | {}", format_term(t, quote_strings));
            }
            out.push(']');
            out
        }
        Term::Compound { functor, args } => {
            let rendered: Vec<String> =
                args.iter().map(|a| format_term(a, quote_strings)).collect();
            format!("{}({})", functor, rendered.join(", "))
        }
        Term::FieldAccess { object, field } => format!("{}.{}", object, field),
    }
}

/// Numbers print without a trailing fraction when integral.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out
}

/// Render a goal in surface syntax.
pub fn format_goal(goal: &Goal) -> String {
    match goal {
        Goal::Call(t) => format_term(t, true),
        Goal::Semantic(a, b) => format!("{} =~= {}", format_term(a, true), format_term(b, true)),
        Goal::Unify(a, b) => format!("{} = {}", format_term(a, true), format_term(b, true)),
        Goal::StructEq(a, b) => format!("{} == {}", format_term(a, true), format_term(b, true)),
        Goal::Not(goals) => format!("not ({})", format_goals(goals)),
        Goal::Or(a, b) => format!("({} ; {})", format_goals(a), format_goals(b)),
        Goal::IfThenElse(c, t, e) => {
            if e.as_slice() == [Goal::Fail] {
                format!("({} -> {})", format_goals(c), format_goals(t))
            } else {
                format!(
                    "({} -> {} ; {})",
                    format_goals(c),
                    format_goals(t),
                    format_goals(e)
                )
            }
        }
        Goal::Cut => "!".to_string(),
        Goal::True => "true".to_string(),
        Goal::Fail => "fail".to_string(),
        Goal::Is(t, expr) => format!("{} is {}", format_term(t, true), format_arith(expr)),
        Goal::Compare(op, a, b) => format!(
            "{} {} {}",
            format_arith(a),
            compare_op(*op),
            format_arith(b)
        ),
    }
}

/// Render a goal conjunction.
pub fn format_goals(goals: &[Goal]) -> String {
    goals
        .iter()
        .map(format_goal)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_arith(expr: &ArithExpr) -> String {
    match expr {
        ArithExpr::Number(n) => format_number(*n),
        ArithExpr::Variable(name) => name.clone(),
        ArithExpr::BinOp(op, l, r) => {
            format!("({} {} {})", format_arith(l), arith_op(*op), format_arith(r))
        }
        ArithExpr::Neg(inner) => format!("-{}", format_arith(inner)),
    }
}

fn arith_op(op: ArithOp) -> &'static str {
    match op {
        ArithOp::Add => "+",
        ArithOp::Sub => "-",
        ArithOp::Mul => "*",
        ArithOp::Div => "/",
        ArithOp::Mod => "mod",
    }
}

fn compare_op(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Lt => "<",
        CompareOp::Gt => ">",
        CompareOp::Le => "=<",
        CompareOp::Ge => ">=",
        CompareOp::ArithEq => "=:=",
        CompareOp::ArithNe => "=\\=",
    }
}

/// Render a clause in source syntax.
pub fn format_clause(clause: &Clause) -> String {
    let head = if clause.head.params.is_empty() {
        clause.head.name.clone()
    } else {
        let params: Vec<String> = clause
            .head
            .params
            .iter()
            .map(|p| format_term(p, true))
            .collect();
        format!("{}({})", clause.head.name, params.join(", "))
    };
    if clause.is_fact() {
        format!("{}.", head)
    } else {
        format!("{} :- {}.", head, format_goals(&clause.body))
    }
}

/// Serialize the whole knowledge base back to source syntax.
pub fn format_knowledge_base(kb: &KnowledgeBase) -> String {
    let mut out = String::new();

    for concept in kb.concepts() {
        let _ = write!(out, "concept {}", concept.name);
        if let Some(genus) = &concept.genus {
            let _ = write!(out, " : {}", genus);
        }
        if let Some(desc) = &concept.description {
            let _ = write!(out, ", description = \"{}\"", escape(desc));
        }
        if !concept.attributes.is_empty() {
            let rendered: Vec<String> = concept
                .attributes
                .iter()
                .map(|a| format!("\"{}\"", escape(a)))
                .collect();
            let _ = write!(out, ", attributes = [{}]", rendered.join(", "));
        }
        if !concept.essentials.is_empty() {
            let rendered: Vec<String> = concept
                .essentials
                .iter()
                .map(|e| format!("\"{}\"", escape(e)))
                .collect();
            let _ = write!(out, ", essentials = [{}]", rendered.join(", "));
        }
        out.push_str(".\n");
    }

    for entity in kb.entities() {
        let _ = write!(out, "entity {} : {}", entity.name, entity.concept_type);
        if let Some(desc) = &entity.description {
            let _ = write!(out, ", description = \"{}\"", escape(desc));
        }
        for key in &entity.property_order {
            let _ = write!(out, ", {} = \"{}\"", key, escape(&entity.properties[key]));
        }
        out.push_str(".\n");
    }

    for (name, value) in kb.globals() {
        let _ = writeln!(out, "{} = {}.", name, format_term(value, true));
    }

    for clause in kb.clauses() {
        out.push_str(&format_clause(clause));
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_atoms_and_strings() {
        assert_eq!(format_term(&Term::atom("socrates"), true), "socrates");
        assert_eq!(format_term(&Term::str("a man"), true), "\"a man\"");
        assert_eq!(format_term(&Term::str("a man"), false), "a man");
    }

    #[test]
    fn test_format_numbers() {
        assert_eq!(format_term(&Term::Number(3.0), true), "3");
        assert_eq!(format_term(&Term::Number(2.5), true), "2.5");
        assert_eq!(format_term(&Term::Number(-1.0), true), "-1");
    }

    #[test]
    fn test_format_lists() {
        let proper = Term::list(vec![Term::atom("a"), Term::atom("b")]);
        assert_eq!(format_term(&proper, true), "[a, b]");
        let open = Term::list_with_tail(vec![Term::atom("a")], Term::var("T"));
        assert_eq!(format_term(&open, true), "[a | T]");
        assert_eq!(format_term(&Term::nil(), true), "[]");
    }

    #[test]
    fn test_format_compound() {
        let t = Term::compound("likes", vec![Term::atom("a"), Term::var("X")]);
        assert_eq!(format_term(&t, true), "likes(a, X)");
    }

    #[test]
    fn test_format_escapes() {
        assert_eq!(
            format_term(&Term::str("a\n\"b\""), true),
            "\"a\\n\\\"b\\\"\""
        );
    }

    #[test]
    fn test_format_clause() {
        let clause = Clause::rule(
            crate::ast::PredicateHead {
                name: "mortal".to_string(),
                params: vec![Term::var("X")],
            },
            vec![Goal::Call(Term::compound("man", vec![Term::var("X")]))],
        );
        assert_eq!(format_clause(&clause), "mortal(X) :- man(X).");
    }

    #[test]
    fn test_format_if_then_without_else() {
        let goal = Goal::IfThenElse(
            vec![Goal::Call(Term::atom("a"))],
            vec![Goal::Call(Term::atom("b"))],
            vec![Goal::Fail],
        );
        assert_eq!(format_goal(&goal), "(a -> b)");
    }
}
