//! semalog CLI - batch runner and interactive shell.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use semalog::interp::Interpreter;
use semalog::judge::{EmbeddingJudge, HttpJudge, Judge, JudgeConfig, NullJudge};
use semalog::lexer::Lexer;
use semalog::token::Token;

#[derive(Parser)]
#[command(
    name = "semalog",
    version,
    about = "A Prolog-flavored logic language with semantic matching"
)]
struct Cli {
    /// Program file to run; interactive mode when omitted
    file: Option<PathBuf>,

    /// Print the token stream and exit
    #[arg(long)]
    tokens: bool,

    /// Print the parsed AST and exit
    #[arg(long)]
    ast: bool,

    /// Judge endpoint (overrides SEMALOG_JUDGE_URL)
    #[arg(long)]
    judge_url: Option<String>,

    /// Judge model name (overrides SEMALOG_JUDGE_MODEL)
    #[arg(long)]
    judge_model: Option<String>,

    /// Similarity threshold in [0, 1] (overrides SEMALOG_THRESHOLD)
    #[arg(long)]
    threshold: Option<f64>,

    /// Use the embedding judge instead of the chat judge
    #[arg(long)]
    embeddings: bool,

    /// Run without a judge; every semantic goal fails
    #[arg(long)]
    offline: bool,
}

fn build_judge(cli: &Cli) -> (Box<dyn Judge>, f64) {
    let mut config = JudgeConfig::from_env();
    if let Some(url) = &cli.judge_url {
        config.endpoint = url.clone();
    }
    if let Some(model) = &cli.judge_model {
        config.model = model.clone();
    }
    if let Some(threshold) = cli.threshold {
        config.threshold = threshold.clamp(0.0, 1.0);
    }
    let threshold = config.threshold;

    let judge: Box<dyn Judge> = if cli.offline {
        Box::new(NullJudge)
    } else if cli.embeddings {
        Box::new(EmbeddingJudge::new(config))
    } else {
        Box::new(HttpJudge::new(config))
    };
    (judge, threshold)
}

fn print_tokens(input: &str) {
    let mut lexer = Lexer::new(input);
    loop {
        match lexer.next_token() {
            Ok(Token::Eof) => break,
            Ok(token) => println!("{:?}", token),
            Err(e) => {
                eprintln!("{}", e);
                break;
            }
        }
    }
}

fn print_ast(input: &str) -> ExitCode {
    match semalog::parser::parse(input) {
        Ok(program) => {
            for statement in &program.statements {
                println!("{:#?}", statement);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(1)
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let (judge, threshold) = build_judge(&cli);

    let Some(file) = &cli.file else {
        let mut interp = Interpreter::new(judge, threshold);
        return match semalog::repl::run(&mut interp) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::from(1)
            }
        };
    };

    let input = match fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {}", file.display(), e);
            return ExitCode::from(1);
        }
    };

    if cli.tokens {
        print_tokens(&input);
        return ExitCode::SUCCESS;
    }
    if cli.ast {
        return print_ast(&input);
    }

    let mut interp = Interpreter::new(judge, threshold);
    match interp.run_source(&input) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(1)
        }
    }
}
