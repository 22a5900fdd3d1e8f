//! Interactive mode: a small shell over the interpreter.
//!
//! One statement per line. Declarations extend the knowledge base in
//! place, queries run immediately. Lines beginning with `:` are
//! meta-commands handled by the shell, not the engine.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::interp::Interpreter;
use crate::parser::parse;

enum Control {
    Continue,
    Exit,
}

/// Run the interactive loop until `:quit` or end of input.
pub fn run(interp: &mut Interpreter) -> Result<()> {
    println!("semalog interactive mode. Type :help for commands.");

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("?- ") {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(&line);
                match dispatch(interp, &line) {
                    Ok(Control::Continue) => {}
                    Ok(Control::Exit) => break,
                    Err(e) => eprintln!("{} {}", "error:".red(), e),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn dispatch(interp: &mut Interpreter, line: &str) -> Result<Control> {
    if let Some(rest) = line.strip_prefix(':') {
        return meta_command(interp, rest);
    }

    let program = parse(line)?;
    for statement in program.statements {
        interp.run_statement(statement);
    }
    Ok(Control::Continue)
}

fn meta_command(interp: &mut Interpreter, command: &str) -> Result<Control> {
    let mut parts = command.split_whitespace();
    match parts.next().unwrap_or("") {
        "help" => {
            print_help();
            Ok(Control::Continue)
        }
        "kb" => {
            let (concepts, entities, clauses, globals) = interp.kb().counts();
            println!(
                "{}",
                format!(
                    "# {} concepts, {} entities, {} clauses, {} globals",
                    concepts, entities, clauses, globals
                )
                .dimmed()
            );
            print!("{}", interp.dump_kb());
            Ok(Control::Continue)
        }
        "kb_save" => {
            let path = parts.next().context("usage: :kb_save FILE")?;
            fs::write(Path::new(path), interp.dump_kb())
                .with_context(|| format!("cannot write {}", path))?;
            println!("saved to {}", path);
            Ok(Control::Continue)
        }
        "kb_load" => {
            let path = parts.next().context("usage: :kb_load FILE")?;
            let source = fs::read_to_string(Path::new(path))
                .with_context(|| format!("cannot read {}", path))?;
            interp.load_declarations(&source)?;
            let (concepts, entities, clauses, globals) = interp.kb().counts();
            println!(
                "loaded {}: {} concepts, {} entities, {} clauses, {} globals",
                path, concepts, entities, clauses, globals
            );
            Ok(Control::Continue)
        }
        "clear" => {
            interp.clear();
            println!("knowledge base cleared");
            Ok(Control::Continue)
        }
        "quit" | "q" => Ok(Control::Exit),
        other => {
            anyhow::bail!("unknown command :{} (try :help)", other)
        }
    }
}

fn print_help() {
    println!("Statements:");
    println!("  concept NAME : Genus, description = \"...\"   declare a concept");
    println!("  entity NAME : Concept, description = \"...\"  declare an entity");
    println!("  head :- body.                               add a rule");
    println!("  head.                                       add a fact");
    println!("  name = term                                 bind a global");
    println!("  ? goal, goal                                run a query");
    println!();
    println!("Commands:");
    println!("  :help            show this help");
    println!("  :kb              print the knowledge base");
    println!("  :kb_save FILE    save the knowledge base to a file");
    println!("  :kb_load FILE    load declarations from a file");
    println!("  :clear           drop everything");
    println!("  :quit            leave");
}
