//! Driver: wires lexer → parser → resolution engine and streams query
//! solutions to an output sink.
//!
//! Batch semantics: all declarations populate the knowledge base in
//! program order, then all queries run in order. Each solution prints the
//! query's originally-free variables under a `Bindings:` header as it is
//! produced, followed by a `True`/`False` terminator — suppressed when a
//! side-effecting built-in fired during the query. Engine errors abort
//! only the query they occurred in.

use std::cell::RefCell;
use std::io::{BufRead, Write};

use crate::ast::{goal_variables, Goal, Statement, Term};
use crate::judge::Judge;
use crate::kb::KnowledgeBase;
use crate::parser::{parse, ParseError};
use crate::printer;
use crate::solve::{EngineError, Flow, Machine};
use crate::subst::Substitution;

/// The interpreter: knowledge base, judge, and I/O endpoints for one run.
pub struct Interpreter {
    kb: KnowledgeBase,
    judge: Box<dyn Judge>,
    threshold: f64,
    out: RefCell<Box<dyn Write>>,
    input: RefCell<Box<dyn BufRead>>,
}

impl Interpreter {
    /// Interpreter talking to stdout/stdin.
    pub fn new(judge: Box<dyn Judge>, threshold: f64) -> Self {
        Self::with_io(
            judge,
            threshold,
            Box::new(std::io::stdout()),
            Box::new(std::io::BufReader::new(std::io::stdin())),
        )
    }

    /// Interpreter with explicit output sink and input source.
    pub fn with_io(
        judge: Box<dyn Judge>,
        threshold: f64,
        out: Box<dyn Write>,
        input: Box<dyn BufRead>,
    ) -> Self {
        Self {
            kb: KnowledgeBase::new(),
            judge,
            threshold,
            out: RefCell::new(out),
            input: RefCell::new(input),
        }
    }

    pub fn kb(&self) -> &KnowledgeBase {
        &self.kb
    }

    /// Drop every declaration and binding.
    pub fn clear(&mut self) {
        self.kb.clear();
    }

    /// Run a whole program: declaration pass first, then queries in order.
    ///
    /// Lex and parse errors are fatal to the program. Engine errors abort
    /// the query they occurred in, are reported on the sink, and the next
    /// query runs.
    pub fn run_source(&mut self, source: &str) -> Result<(), ParseError> {
        let program = parse(source)?;

        let mut queries = Vec::new();
        for statement in program.statements {
            match statement {
                Statement::Query(goals) => queries.push(goals),
                other => self.load_statement(other),
            }
        }

        for goals in &queries {
            self.run_query(goals);
        }
        Ok(())
    }

    /// Load declarations from source, skipping any queries. Used by the
    /// knowledge-base load path.
    pub fn load_declarations(&mut self, source: &str) -> Result<(), ParseError> {
        let program = parse(source)?;
        for statement in program.statements {
            match statement {
                Statement::Query(_) => log::warn!("skipping query in loaded knowledge base"),
                other => self.load_statement(other),
            }
        }
        Ok(())
    }

    /// Run one already-parsed statement: declarations extend the
    /// knowledge base, queries execute immediately. Interactive mode
    /// feeds statements through here.
    pub fn run_statement(&mut self, statement: Statement) {
        match statement {
            Statement::Query(goals) => {
                self.run_query(&goals);
            }
            other => self.load_statement(other),
        }
    }

    fn load_statement(&mut self, statement: Statement) {
        match statement {
            Statement::Concept(c) => self.kb.add_concept(c),
            Statement::Entity(e) => self.kb.add_entity(e),
            Statement::Clause(c) => self.kb.add_clause(c),
            Statement::Assign(name, value) => self.kb.assign_global(name, value),
            Statement::Query(_) => unreachable!("queries are routed to run_query"),
        }
    }

    /// Execute a query, streaming bindings to the sink. Returns whether at
    /// least one solution was produced, or None when the query aborted.
    pub fn run_query(&mut self, goals: &[Goal]) -> Option<bool> {
        let vars = goal_variables(goals);
        let machine = Machine::new(
            &self.kb,
            self.judge.as_ref(),
            self.threshold,
            &self.out,
            &self.input,
        );
        machine.reset_side_effects();

        let mut any = false;
        let kb = &self.kb;
        let out = &self.out;
        let result = machine.solve(goals, &Substitution::new(), &mut |s: &Substitution| {
            any = true;
            if !vars.is_empty() {
                let mut o = out.borrow_mut();
                writeln!(o, "Bindings:")?;
                for name in &vars {
                    let value = printer::quoted(&Term::var(name.clone()), s, kb);
                    writeln!(o, "  {} = {}", name, value)?;
                }
            }
            Ok(Flow::More)
        });

        match result {
            Ok(_) => {
                if !machine.side_effects_fired() {
                    let _ = writeln!(out.borrow_mut(), "{}", if any { "True" } else { "False" });
                }
                Some(any)
            }
            Err(e) => {
                self.report_engine_error(&e);
                None
            }
        }
    }

    fn report_engine_error(&self, error: &EngineError) {
        log::error!("query aborted: {}", error);
        let _ = writeln!(self.out.borrow_mut(), "Error: {}", error);
    }

    /// Serialize the current knowledge base to source syntax.
    pub fn dump_kb(&self) -> String {
        printer::format_knowledge_base(&self.kb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::{Judge, NullJudge};
    use std::io::Cursor;
    use std::rc::Rc;

    /// Clonable sink capturing everything written through it.
    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn run(source: &str) -> String {
        run_with_judge(Box::new(NullJudge), source)
    }

    fn run_with_judge(judge: Box<dyn Judge>, source: &str) -> String {
        let buf = SharedBuf::default();
        let mut interp = Interpreter::with_io(
            judge,
            0.7,
            Box::new(buf.clone()),
            Box::new(Cursor::new(Vec::new())),
        );
        interp.run_source(source).unwrap();
        buf.text()
    }

    #[test]
    fn test_ground_query_prints_true_without_bindings() {
        let output = run("man(socrates). mortal(X) :- man(X). ? mortal(socrates).");
        assert_eq!(output, "True\n");
    }

    #[test]
    fn test_failed_query_prints_false() {
        let output = run("man(socrates). ? man(plato).");
        assert_eq!(output, "False\n");
    }

    #[test]
    fn test_bindings_stream_per_solution() {
        let output = run("color(red). color(green). ? color(C).");
        assert_eq!(
            output,
            "Bindings:\n  C = red\nBindings:\n  C = green\nTrue\n"
        );
    }

    #[test]
    fn test_declarations_run_before_queries() {
        // the query precedes the fact textually but still sees it
        let output = run("? late(x). late(x).");
        assert_eq!(output, "True\n");
    }

    #[test]
    fn test_side_effects_suppress_terminator() {
        let output = run("? println(\"hello\").");
        assert_eq!(output, "hello\n");
    }

    #[test]
    fn test_print_renders_strings_unquoted() {
        let output = run("greet(N) :- print(\"hi \", N), nl. ? greet(\"ada\").");
        assert_eq!(output, "hi ada\n");
    }

    #[test]
    fn test_bindings_quote_strings() {
        let output = run("name(\"ada\"). ? name(N).");
        assert_eq!(output, "Bindings:\n  N = \"ada\"\nTrue\n");
    }

    #[test]
    fn test_engine_error_aborts_query_only() {
        let output = run("bad(Y) :- Y is X + 1. ok. ? bad(Y). ? ok.");
        assert!(output.starts_with("Error: "));
        assert!(output.ends_with("True\n"));
    }

    #[test]
    fn test_findall_binding_output() {
        let output = run("p(1). p(2). p(3). ? findall(X, p(X), L).");
        assert_eq!(output, "Bindings:\n  L = [1, 2, 3]\nTrue\n");
    }

    #[test]
    fn test_global_assignment_resolves_in_queries() {
        let output = run("limit = 3. check(X) :- X == limit. ? check(3).");
        assert_eq!(output, "True\n");
    }

    #[test]
    fn test_load_declarations_skips_queries() {
        let buf = SharedBuf::default();
        let mut interp = Interpreter::with_io(
            Box::new(NullJudge),
            0.7,
            Box::new(buf.clone()),
            Box::new(Cursor::new(Vec::new())),
        );
        interp
            .load_declarations("p(1). ? p(X).")
            .unwrap();
        assert_eq!(buf.text(), "");
        assert_eq!(interp.kb().counts().2, 1);
    }

    #[test]
    fn test_dump_kb_round_trips() {
        let buf = SharedBuf::default();
        let mut interp = Interpreter::with_io(
            Box::new(NullJudge),
            0.7,
            Box::new(buf.clone()),
            Box::new(Cursor::new(Vec::new())),
        );
        interp
            .run_source(
                "concept Man : Animal, description = \"rational animal\".
                 entity SOCRATES : Man, description = \"philosopher\".
                 mortal(X) :- man(X).
                 man(socrates).",
            )
            .unwrap();
        let dumped = interp.dump_kb();

        let mut reloaded = Interpreter::with_io(
            Box::new(NullJudge),
            0.7,
            Box::new(SharedBuf::default()),
            Box::new(Cursor::new(Vec::new())),
        );
        reloaded.load_declarations(&dumped).unwrap();
        assert_eq!(reloaded.kb().counts(), interp.kb().counts());
        assert_eq!(reloaded.dump_kb(), dumped);
    }

    #[test]
    fn test_parse_error_is_fatal() {
        let buf = SharedBuf::default();
        let mut interp = Interpreter::with_io(
            Box::new(NullJudge),
            0.7,
            Box::new(buf.clone()),
            Box::new(Cursor::new(Vec::new())),
        );
        assert!(interp.run_source("man(").is_err());
    }
}
