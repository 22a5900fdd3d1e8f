//! Parser for semalog source code.
//!
//! Implements a recursive descent parser producing a program AST:
//! concept and entity declarations, clauses, global assignments, and
//! queries, with the full goal grammar (conjunction, disjunction,
//! if-then-else, negation, cut, equality and semantic-match goals).

use thiserror::Error;

use crate::ast::{
    ArithExpr, ArithOp, Clause, CompareOp, Concept, Entity, Goal, PredicateHead, Program,
    Statement, Term,
};
use crate::lexer::{LexError, Lexer};
use crate::token::{Span, Token};

/// Parse error with location information.
#[derive(Debug, Clone, Error)]
#[error("Parse error at {span}: {message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        Self {
            message: e.message,
            span: e.span,
        }
    }
}

/// Parser for semalog programs.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    next: Token,
    span: Span,
    next_span: Span,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given input.
    pub fn new(input: &'a str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(input);
        let span = lexer.span();
        let current = lexer.next_token()?;
        let next_span = lexer.span();
        let next = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            next,
            span,
            next_span,
        })
    }

    /// Advance to the next token, returning the one just consumed.
    fn advance(&mut self) -> Result<Token, ParseError> {
        let old = std::mem::replace(&mut self.current, std::mem::replace(&mut self.next, Token::Eof));
        self.span = self.next_span;
        self.next_span = self.lexer.span();
        self.next = self.lexer.next_token()?;
        Ok(old)
    }

    /// Check if the current token has the same discriminant.
    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(&self.current) == std::mem::discriminant(token)
    }

    /// Expect a specific token kind, error if not found.
    fn expect(&mut self, expected: &Token) -> Result<Token, ParseError> {
        if self.check(expected) {
            self.advance()
        } else {
            Err(self.unexpected(&format!("Expected {:?}", expected)))
        }
    }

    fn unexpected(&self, message: &str) -> ParseError {
        ParseError::new(
            format!("{}, found {:?}", message, self.current),
            self.span,
        )
    }

    /// Consume the optional statement terminator.
    fn skip_terminator(&mut self) -> Result<(), ParseError> {
        if self.current == Token::Dot {
            self.advance()?;
        }
        Ok(())
    }

    /// The raw text of the current identifier-like token.
    fn ident_text(&mut self) -> Result<String, ParseError> {
        match &self.current {
            Token::Ident(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(name)
            }
            other => {
                if let Some(kw) = other.keyword_ident() {
                    let kw = kw.to_string();
                    self.advance()?;
                    Ok(kw)
                } else {
                    Err(self.unexpected("Expected identifier"))
                }
            }
        }
    }

    /// Parse a complete program.
    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut program = Program::new();
        while self.current != Token::Eof {
            program.statements.push(self.parse_statement()?);
        }
        Ok(program)
    }

    /// Parse a single top-level statement.
    pub fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let statement = match &self.current {
            Token::Concept => Statement::Concept(self.parse_concept()?),
            Token::Entity => Statement::Entity(self.parse_entity()?),
            Token::Query => {
                self.advance()?;
                Statement::Query(self.parse_goal_seq()?)
            }
            Token::Ident(_) if self.next == Token::Unify => {
                let name = self.ident_text()?;
                self.advance()?; // consume '='
                let value = self.parse_term()?;
                Statement::Assign(name, value)
            }
            Token::Ident(_) => Statement::Clause(self.parse_clause()?),
            _ => return Err(self.unexpected("Expected statement")),
        };
        self.skip_terminator()?;
        Ok(statement)
    }

    /// Parse a concept declaration.
    ///
    /// `concept NAME [: GENUS] [, description = STR]
    ///  [, attributes = [...]] [, essentials = [...]]`
    fn parse_concept(&mut self) -> Result<Concept, ParseError> {
        self.expect(&Token::Concept)?;
        let mut concept = Concept::new(self.ident_text()?);

        if self.current == Token::Colon {
            self.advance()?;
            concept.genus = Some(self.ident_text()?);
        }

        while self.current == Token::Comma {
            self.advance()?;
            match &self.current {
                Token::Description => {
                    self.advance()?;
                    self.expect(&Token::Unify)?;
                    concept.description = Some(self.string_text()?);
                }
                Token::Attributes => {
                    self.advance()?;
                    self.expect(&Token::Unify)?;
                    concept.attributes = self.parse_text_list()?;
                }
                Token::Essentials => {
                    self.advance()?;
                    self.expect(&Token::Unify)?;
                    concept.essentials = self.parse_text_list()?;
                }
                _ => return Err(self.unexpected("Expected concept property")),
            }
        }

        Ok(concept)
    }

    /// Parse an entity declaration.
    ///
    /// `entity NAME : CONCEPT [, description = STR] [, key = STR]...`
    fn parse_entity(&mut self) -> Result<Entity, ParseError> {
        self.expect(&Token::Entity)?;
        let name = self.ident_text()?;
        self.expect(&Token::Colon)?;
        let mut entity = Entity::new(name, self.ident_text()?);

        while self.current == Token::Comma {
            self.advance()?;
            match &self.current {
                Token::Description => {
                    self.advance()?;
                    self.expect(&Token::Unify)?;
                    entity.description = Some(self.string_text()?);
                }
                Token::Ident(_) => {
                    let key = self.ident_text()?;
                    self.expect(&Token::Unify)?;
                    let value = self.string_text()?;
                    entity.set_property(key, value);
                }
                _ => return Err(self.unexpected("Expected entity property")),
            }
        }

        Ok(entity)
    }

    fn string_text(&mut self) -> Result<String, ParseError> {
        match &self.current {
            Token::Str(text) => {
                let text = text.clone();
                self.advance()?;
                Ok(text)
            }
            _ => Err(self.unexpected("Expected string literal")),
        }
    }

    /// Parse a bracketed list of strings or bare identifiers as raw text.
    fn parse_text_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(&Token::LBracket)?;
        let mut items = Vec::new();
        if self.current != Token::RBracket {
            loop {
                match &self.current {
                    Token::Str(text) => {
                        items.push(text.clone());
                        self.advance()?;
                    }
                    Token::Ident(_) => items.push(self.ident_text()?),
                    _ => return Err(self.unexpected("Expected string or identifier")),
                }
                if self.current == Token::Comma {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RBracket)?;
        Ok(items)
    }

    /// Parse a single clause (fact or rule).
    fn parse_clause(&mut self) -> Result<Clause, ParseError> {
        let head = self.parse_head()?;
        if self.current == Token::Neck {
            self.advance()?;
            let body = self.parse_goal_seq()?;
            Ok(Clause::rule(head, body))
        } else {
            Ok(Clause::fact(head))
        }
    }

    fn parse_head(&mut self) -> Result<PredicateHead, ParseError> {
        let name = self.ident_text()?;
        let params = if self.current == Token::LParen {
            self.advance()?;
            let params = self.parse_term_list()?;
            self.expect(&Token::RParen)?;
            params
        } else {
            Vec::new()
        };
        Ok(PredicateHead { name, params })
    }

    /// Parse a goal expression at the disjunction level.
    ///
    /// `A ; B` and `(C -> T ; E)` live here; conjunction binds tighter.
    fn parse_goal_seq(&mut self) -> Result<Vec<Goal>, ParseError> {
        let left = self.parse_conjunction()?;
        match self.current {
            Token::Arrow => {
                self.advance()?;
                let then = self.parse_conjunction()?;
                let else_ = if self.current == Token::Semicolon {
                    self.advance()?;
                    self.parse_goal_seq()?
                } else {
                    vec![Goal::Fail]
                };
                Ok(vec![Goal::IfThenElse(left, then, else_)])
            }
            Token::Semicolon => {
                self.advance()?;
                let right = self.parse_goal_seq()?;
                Ok(vec![Goal::Or(left, right)])
            }
            _ => Ok(left),
        }
    }

    /// Parse a comma-separated conjunction of goals.
    fn parse_conjunction(&mut self) -> Result<Vec<Goal>, ParseError> {
        let mut goals = self.parse_goal_unit()?;
        while self.current == Token::Comma {
            self.advance()?;
            goals.extend(self.parse_goal_unit()?);
        }
        Ok(goals)
    }

    /// Parse one goal, or a parenthesized goal expression (spliced into
    /// the surrounding conjunction when it is a plain group).
    fn parse_goal_unit(&mut self) -> Result<Vec<Goal>, ParseError> {
        if self.current == Token::LParen {
            self.advance()?;
            let goals = self.parse_goal_seq()?;
            self.expect(&Token::RParen)?;
            Ok(goals)
        } else {
            Ok(vec![self.parse_goal()?])
        }
    }

    /// Parse a single atomic goal.
    fn parse_goal(&mut self) -> Result<Goal, ParseError> {
        match &self.current {
            Token::Cut => {
                self.advance()?;
                return Ok(Goal::Cut);
            }
            Token::Not => {
                self.advance()?;
                return Ok(Goal::Not(self.parse_goal_unit()?));
            }
            Token::Ident(name) if name == "true" && self.next != Token::LParen => {
                self.advance()?;
                return Ok(Goal::True);
            }
            Token::Ident(name) if name == "fail" && self.next != Token::LParen => {
                self.advance()?;
                return Ok(Goal::Fail);
            }
            _ => {}
        }

        // Arithmetic comparison with a numeric left side: `1 + 2 < N`.
        // A number followed by an equality operator is a term goal instead.
        if matches!(self.current, Token::Number(_))
            && !matches!(self.next, Token::Unify | Token::Identical | Token::Semantic)
        {
            let left = self.parse_arith_expr()?;
            if let Some(op) = self.try_compare_op() {
                self.advance()?;
                let right = self.parse_arith_expr()?;
                return Ok(Goal::Compare(op, left, right));
            }
            return Err(self.unexpected("Expected comparison operator"));
        }

        let term = self.parse_term()?;

        match self.current {
            Token::Unify => {
                self.advance()?;
                let right = self.parse_term()?;
                Ok(Goal::Unify(term, right))
            }
            Token::Identical => {
                self.advance()?;
                let right = self.parse_term()?;
                Ok(Goal::StructEq(term, right))
            }
            Token::Semantic => {
                self.advance()?;
                let right = self.parse_term()?;
                Ok(Goal::Semantic(term, right))
            }
            Token::Is => {
                self.advance()?;
                let expr = self.parse_arith_expr()?;
                Ok(Goal::Is(term, expr))
            }
            _ => {
                if let Some(op) = self.try_compare_op() {
                    self.advance()?;
                    let right = self.parse_arith_expr()?;
                    let left = self.term_as_arith(&term)?;
                    return Ok(Goal::Compare(op, left, right));
                }
                match &term {
                    Term::Atom(_) | Term::Compound { .. } | Term::Var(_) => Ok(Goal::Call(term)),
                    _ => Err(ParseError::new(
                        format!("Term {:?} cannot be called as a goal", term),
                        self.span,
                    )),
                }
            }
        }
    }

    fn term_as_arith(&self, term: &Term) -> Result<ArithExpr, ParseError> {
        match term {
            Term::Var(name) => Ok(ArithExpr::Variable(name.clone())),
            Term::Number(n) => Ok(ArithExpr::Number(*n)),
            _ => Err(ParseError::new(
                "Expected variable or number on the left of a comparison",
                self.span,
            )),
        }
    }

    /// Try to match a comparison operator.
    fn try_compare_op(&self) -> Option<CompareOp> {
        match &self.current {
            Token::Lt => Some(CompareOp::Lt),
            Token::Gt => Some(CompareOp::Gt),
            Token::Le => Some(CompareOp::Le),
            Token::Ge => Some(CompareOp::Ge),
            Token::ArithEq => Some(CompareOp::ArithEq),
            Token::ArithNe => Some(CompareOp::ArithNe),
            _ => None,
        }
    }

    /// Parse a term.
    pub fn parse_term(&mut self) -> Result<Term, ParseError> {
        match &self.current {
            Token::Str(text) => {
                let text = text.clone();
                self.advance()?;
                Ok(Term::Str(text))
            }

            Token::Number(n) => {
                let n = *n;
                self.advance()?;
                Ok(Term::Number(n))
            }

            Token::FieldAccess(object, field) => {
                let (object, field) = (object.clone(), field.clone());
                self.advance()?;
                Ok(Term::FieldAccess { object, field })
            }

            Token::Ident(name) => {
                let name = name.clone();
                self.advance()?;
                if self.current == Token::LParen {
                    self.advance()?;
                    let args = self.parse_term_list()?;
                    self.expect(&Token::RParen)?;
                    Ok(Term::Compound {
                        functor: name,
                        args,
                    })
                } else {
                    Ok(classify_ident(&name))
                }
            }

            // Field-name keywords double as plain atoms in term position
            Token::Description | Token::Attributes | Token::Essentials => {
                let name = self.ident_text()?;
                Ok(Term::Atom(name))
            }

            Token::LBracket => {
                self.advance()?;
                self.parse_list()
            }

            Token::LParen => {
                self.advance()?;
                let term = self.parse_term()?;
                self.expect(&Token::RParen)?;
                Ok(term)
            }

            Token::Minus => {
                self.advance()?;
                if let Token::Number(n) = self.current {
                    self.advance()?;
                    Ok(Term::Number(-n))
                } else {
                    Err(self.unexpected("Expected number after '-'"))
                }
            }

            _ => Err(self.unexpected("Expected term")),
        }
    }

    /// Parse a comma-separated list of terms.
    fn parse_term_list(&mut self) -> Result<Vec<Term>, ParseError> {
        let mut terms = Vec::new();
        if self.current == Token::RParen {
            return Ok(terms);
        }
        terms.push(self.parse_term()?);
        while self.current == Token::Comma {
            self.advance()?;
            terms.push(self.parse_term()?);
        }
        Ok(terms)
    }

    /// Parse a list: `[]`, `[a]`, `[a, b]`, `[H | T]`, `[a, b | T]`.
    fn parse_list(&mut self) -> Result<Term, ParseError> {
        if self.current == Token::RBracket {
            self.advance()?;
            return Ok(Term::nil());
        }

        let mut items = Vec::new();
        items.push(self.parse_term()?);
        while self.current == Token::Comma {
            self.advance()?;
            items.push(self.parse_term()?);
        }

        let term = if self.current == Token::Pipe {
            self.advance()?;
            let tail = self.parse_term()?;
            Term::list_with_tail(items, tail)
        } else {
            Term::list(items)
        };

        self.expect(&Token::RBracket)?;
        Ok(term)
    }

    /// Parse an arithmetic expression.
    fn parse_arith_expr(&mut self) -> Result<ArithExpr, ParseError> {
        self.parse_arith_additive()
    }

    /// Parse additive expression: + -
    fn parse_arith_additive(&mut self) -> Result<ArithExpr, ParseError> {
        let mut left = self.parse_arith_multiplicative()?;
        loop {
            let op = match &self.current {
                Token::Plus => ArithOp::Add,
                Token::Minus => ArithOp::Sub,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_arith_multiplicative()?;
            left = ArithExpr::BinOp(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// Parse multiplicative expression: * / mod
    fn parse_arith_multiplicative(&mut self) -> Result<ArithExpr, ParseError> {
        let mut left = self.parse_arith_unary()?;
        loop {
            let op = match &self.current {
                Token::Star => ArithOp::Mul,
                Token::Slash => ArithOp::Div,
                Token::Mod => ArithOp::Mod,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_arith_unary()?;
            left = ArithExpr::BinOp(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// Parse unary expression: - or primary
    fn parse_arith_unary(&mut self) -> Result<ArithExpr, ParseError> {
        if self.current == Token::Minus {
            self.advance()?;
            let expr = self.parse_arith_primary()?;
            Ok(ArithExpr::Neg(Box::new(expr)))
        } else {
            self.parse_arith_primary()
        }
    }

    /// Parse primary arithmetic expression: number, variable, (expr)
    fn parse_arith_primary(&mut self) -> Result<ArithExpr, ParseError> {
        match &self.current {
            Token::Number(n) => {
                let n = *n;
                self.advance()?;
                Ok(ArithExpr::Number(n))
            }

            Token::Ident(name) => {
                if let Term::Var(name) = classify_ident(name) {
                    self.advance()?;
                    Ok(ArithExpr::Variable(name))
                } else {
                    Err(self.unexpected("Expected arithmetic expression"))
                }
            }

            Token::LParen => {
                self.advance()?;
                let expr = self.parse_arith_expr()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }

            _ => Err(self.unexpected("Expected arithmetic expression")),
        }
    }
}

/// Classify a bare identifier into a variable, anonymous variable, or atom.
///
/// Leading uppercase or underscore means variable, with one exception:
/// screaming-case identifiers with at least two letters (`SOCRATES`,
/// `GREAT_DANE`) are atoms, which is how entities are referred to.
pub fn classify_ident(name: &str) -> Term {
    if name == "_" {
        return Term::Anonymous;
    }
    let first = name.chars().next().unwrap_or('a');
    if first == '_' {
        return Term::Var(name.to_string());
    }
    if first.is_uppercase() {
        let letters = name.chars().filter(|c| c.is_ascii_alphabetic()).count();
        let screaming = letters >= 2
            && name
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        if screaming {
            return Term::Atom(name.to_string());
        }
        return Term::Var(name.to_string());
    }
    Term::Atom(name.to_string())
}

/// Parse a semalog program from source.
pub fn parse(input: &str) -> Result<Program, ParseError> {
    let mut parser = Parser::new(input)?;
    parser.parse_program()
}
