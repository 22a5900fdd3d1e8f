//! Lexer for semalog source code.
//!
//! Tokenizes programs into a stream of tokens, handling identifiers,
//! string literals, numbers, field accesses, operators, and `#` comments.

use thiserror::Error;

use crate::token::{Span, Token};

/// Lexer error with location information.
#[derive(Debug, Clone, Error)]
#[error("Lex error at {span}: {message}")]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

impl LexError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            span: Span::new(line, column),
        }
    }
}

/// Lexer for semalog source code.
pub struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    column: usize,
    current_pos: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
            column: 1,
            current_pos: 0,
        }
    }

    /// Get current span for error reporting.
    pub fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }

    /// Peek at the next character without consuming it.
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    /// Peek at the character after the next one.
    fn peek_next(&self) -> Option<char> {
        let mut iter = self.input[self.current_pos..].chars();
        iter.next();
        iter.next()
    }

    /// Consume and return the next character.
    fn advance(&mut self) -> Option<char> {
        if let Some((pos, c)) = self.chars.next() {
            self.current_pos = pos + c.len_utf8();
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            Some(c)
        } else {
            None
        }
    }

    /// Skip whitespace and `#` line comments.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while let Some(c) = self.peek() {
                if c.is_whitespace() {
                    self.advance();
                } else {
                    break;
                }
            }

            if let Some('#') = self.peek() {
                while let Some(c) = self.advance() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Read an identifier.
    fn read_identifier(&mut self, first: char) -> String {
        let mut ident = String::new();
        ident.push(first);
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }
        ident
    }

    /// Read a string literal. The opening quote has been consumed.
    fn read_string(&mut self, start_line: usize, start_col: usize) -> Result<String, LexError> {
        let mut text = String::new();
        loop {
            match self.advance() {
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('"') => text.push('"'),
                    Some('\\') => text.push('\\'),
                    Some(c) => text.push(c),
                    None => {
                        return Err(LexError::new("Unterminated string", start_line, start_col))
                    }
                },
                Some(c) => text.push(c),
                None => return Err(LexError::new("Unterminated string", start_line, start_col)),
            }
        }
        Ok(text)
    }

    /// Read a numeric literal, with an optional fractional part.
    fn read_number(&mut self, first: char) -> f64 {
        let mut num = String::new();
        num.push(first);
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                num.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if self.peek() == Some('.') && self.peek_next().map_or(false, |c| c.is_ascii_digit()) {
            num.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    num.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }
        num.parse().unwrap_or(0.0)
    }

    /// Finish an identifier token: map keywords, fuse `obj.field` accesses.
    ///
    /// A dot fuses into a field access only when it sits tightly between
    /// identifier characters; any other dot is the statement terminator.
    fn finish_identifier(&mut self, ident: String) -> Token {
        match ident.as_str() {
            "concept" => return Token::Concept,
            "entity" => return Token::Entity,
            "description" => return Token::Description,
            "attributes" => return Token::Attributes,
            "essentials" => return Token::Essentials,
            "not" => return Token::Not,
            "is" => return Token::Is,
            "mod" => return Token::Mod,
            _ => {}
        }

        if self.peek() == Some('.')
            && self
                .peek_next()
                .map_or(false, |c| c.is_alphabetic() || c == '_')
        {
            self.advance(); // consume '.'
            let first = self.advance().unwrap();
            let field = self.read_identifier(first);
            return Token::FieldAccess(ident, field);
        }

        Token::Ident(ident)
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace_and_comments();

        let start_line = self.line;
        let start_col = self.column;

        let c = match self.advance() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };

        match c {
            '(' => Ok(Token::LParen),
            ')' => Ok(Token::RParen),
            '[' => Ok(Token::LBracket),
            ']' => Ok(Token::RBracket),
            ',' => Ok(Token::Comma),
            ';' => Ok(Token::Semicolon),
            '|' => Ok(Token::Pipe),
            '!' => Ok(Token::Cut),
            '?' => Ok(Token::Query),
            '+' => Ok(Token::Plus),
            '*' => Ok(Token::Star),
            '/' => Ok(Token::Slash),
            '.' => Ok(Token::Dot),

            // Minus, arrow, or negative number
            '-' => match self.peek() {
                Some('>') => {
                    self.advance();
                    Ok(Token::Arrow)
                }
                Some(c) if c.is_ascii_digit() => {
                    let first = self.advance().unwrap();
                    let n = self.read_number(first);
                    Ok(Token::Number(-n))
                }
                _ => Ok(Token::Minus),
            },

            // Neck or genus separator
            ':' => {
                if self.peek() == Some('-') {
                    self.advance();
                    Ok(Token::Neck)
                } else {
                    Ok(Token::Colon)
                }
            }

            // Operators starting with =
            '=' => match self.peek() {
                Some('~') => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        Ok(Token::Semantic)
                    } else {
                        Err(LexError::new(
                            "Expected '=' after '=~'",
                            start_line,
                            start_col,
                        ))
                    }
                }
                Some(':') => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        Ok(Token::ArithEq)
                    } else {
                        Err(LexError::new(
                            "Expected '=' after '=:'",
                            start_line,
                            start_col,
                        ))
                    }
                }
                Some('\\') => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        Ok(Token::ArithNe)
                    } else {
                        Err(LexError::new(
                            "Expected '=' after '=\\'",
                            start_line,
                            start_col,
                        ))
                    }
                }
                Some('=') => {
                    self.advance();
                    Ok(Token::Identical)
                }
                Some('<') => {
                    self.advance();
                    Ok(Token::Le)
                }
                _ => Ok(Token::Unify),
            },

            '<' => Ok(Token::Lt),

            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Ok(Token::Ge)
                } else {
                    Ok(Token::Gt)
                }
            }

            '"' => {
                let text = self.read_string(start_line, start_col)?;
                Ok(Token::Str(text))
            }

            c if c.is_ascii_digit() => {
                let n = self.read_number(c);
                Ok(Token::Number(n))
            }

            c if c.is_alphabetic() || c == '_' => {
                let ident = self.read_identifier(c);
                Ok(self.finish_identifier(ident))
            }

            _ => Err(LexError::new(
                format!("Unexpected character '{}'", c),
                start_line,
                start_col,
            )),
        }
    }

    /// Tokenize the entire input.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            if token == Token::Eof {
                tokens.push(token);
                break;
            }
            tokens.push(token);
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_fact() {
        let mut lexer = Lexer::new("man(socrates).");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("man".to_string()),
                Token::LParen,
                Token::Ident("socrates".to_string()),
                Token::RParen,
                Token::Dot,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_rule() {
        let mut lexer = Lexer::new("mortal(X) :- man(X).");
        let tokens = lexer.tokenize().unwrap();
        assert!(tokens.contains(&Token::Neck));
        assert!(tokens.contains(&Token::Ident("X".to_string())));
    }

    #[test]
    fn test_query_prefix() {
        let mut lexer = Lexer::new("? mortal(socrates).");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(tokens[0], Token::Query);
    }

    #[test]
    fn test_semantic_match() {
        let mut lexer = Lexer::new("A =~= \"thinker\"");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("A".to_string()),
                Token::Semantic,
                Token::Str("thinker".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_field_access_fuses() {
        let mut lexer = Lexer::new("E.description");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(
            tokens[0],
            Token::FieldAccess("E".to_string(), "description".to_string())
        );
    }

    #[test]
    fn test_terminator_dot_does_not_fuse() {
        let mut lexer = Lexer::new("sunny. rainy.");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("sunny".to_string()),
                Token::Dot,
                Token::Ident("rainy".to_string()),
                Token::Dot,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_concept_keywords() {
        let mut lexer = Lexer::new("concept Dog : Animal, description = \"a dog\"");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(tokens[0], Token::Concept);
        assert!(tokens.contains(&Token::Colon));
        assert!(tokens.contains(&Token::Description));
        assert!(tokens.contains(&Token::Unify));
    }

    #[test]
    fn test_string_escapes() {
        let mut lexer = Lexer::new(r#""line\nbreak \"quoted\" tab\t""#);
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(
            tokens[0],
            Token::Str("line\nbreak \"quoted\" tab\t".to_string())
        );
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("\"oops");
        assert!(lexer.tokenize().is_err());
    }

    #[test]
    fn test_numbers() {
        let mut lexer = Lexer::new("1 2.5 -3");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Number(1.0),
                Token::Number(2.5),
                Token::Number(-3.0),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_number_then_terminator() {
        // `p(1).` must not read the dot as a fraction
        let mut lexer = Lexer::new("p(1).");
        let tokens = lexer.tokenize().unwrap();
        assert!(tokens.contains(&Token::Number(1.0)));
        assert!(tokens.contains(&Token::Dot));
    }

    #[test]
    fn test_comments() {
        let mut lexer = Lexer::new("# a comment\nfoo.");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(tokens[0], Token::Ident("foo".to_string()));
    }

    #[test]
    fn test_cut_and_disjunction() {
        let mut lexer = Lexer::new("a :- b, ! ; c.");
        let tokens = lexer.tokenize().unwrap();
        assert!(tokens.contains(&Token::Cut));
        assert!(tokens.contains(&Token::Semicolon));
    }

    #[test]
    fn test_arrow() {
        let mut lexer = Lexer::new("(a -> b ; c)");
        let tokens = lexer.tokenize().unwrap();
        assert!(tokens.contains(&Token::Arrow));
    }

    #[test]
    fn test_comparisons() {
        let mut lexer = Lexer::new("X < Y, X > Y, X =< Y, X >= Y, X =:= Y, X =\\= Y");
        let tokens = lexer.tokenize().unwrap();
        assert!(tokens.contains(&Token::Lt));
        assert!(tokens.contains(&Token::Gt));
        assert!(tokens.contains(&Token::Le));
        assert!(tokens.contains(&Token::Ge));
        assert!(tokens.contains(&Token::ArithEq));
        assert!(tokens.contains(&Token::ArithNe));
    }

    #[test]
    fn test_unexpected_character() {
        let mut lexer = Lexer::new("@");
        let err = lexer.tokenize().unwrap_err();
        assert!(err.message.contains('@'));
    }

    #[test]
    fn test_query_without_dash() {
        // `?-` is not part of the surface syntax; `?` must stand alone
        let mut lexer = Lexer::new("? p(X)");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(tokens[0], Token::Query);
    }
}
