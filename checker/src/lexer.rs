// Lexer for graph sketches (.ncg files).
//
// Tokenizes the compact text notation for block graphs. Uses the `logos`
// crate for DFA-based lexing.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// Sketch token types.
///
/// Identifiers carry no value; use the span to retrieve the text.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+|#[^\n]*")]
pub enum Token {
    #[token("true")]
    True,
    #[token("false")]
    False,

    #[token("->")]
    Arrow,
    #[token(".")]
    Dot,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,

    /// Numeric literal (int, float, exponent, negative).
    #[regex(r"-?[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", parse_number)]
    Number(f64),

    /// String literal with `\"` and `\\` escapes.
    #[regex(r#""([^"\\]|\\.)*""#, parse_string)]
    StringLit(String),

    /// Identifier: `[a-zA-Z_][a-zA-Z0-9_]*`
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    /// One or more newlines; statements end at a newline.
    #[regex(r"\n+")]
    Newline,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Arrow => write!(f, "->"),
            Token::Dot => write!(f, "."),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Equals => write!(f, "="),
            Token::Number(v) => write!(f, "{v}"),
            Token::StringLit(s) => write!(f, "\"{s}\""),
            Token::Ident => write!(f, "<ident>"),
            Token::Newline => write!(f, "<newline>"),
        }
    }
}

// ── Callbacks ──

fn parse_number(lex: &mut logos::Lexer<'_, Token>) -> Option<f64> {
    lex.slice().parse().ok()
}

fn parse_string(lex: &mut logos::Lexer<'_, Token>) -> Option<String> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                '"' => result.push('"'),
                '\\' => result.push('\\'),
                _ => return None,
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

// ── Public API ──

/// Lex a sketch into tokens.
///
/// Lexing is non-fatal: errors are collected and the lexer continues past
/// bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_ok(source: &str) -> Vec<Token> {
        let result = lex(source);
        assert!(
            result.errors.is_empty(),
            "unexpected lex errors: {:?}",
            result.errors
        );
        result.tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn declaration() {
        let tokens = lex_ok("fc = Linear(in_features = 784, bias = true)");
        assert_eq!(
            tokens,
            vec![
                Token::Ident,
                Token::Equals,
                Token::Ident,
                Token::LParen,
                Token::Ident,
                Token::Equals,
                Token::Number(784.0),
                Token::Comma,
                Token::Ident,
                Token::Equals,
                Token::True,
                Token::RParen,
            ]
        );
    }

    #[test]
    fn chain_with_handles() {
        let tokens = lex_ok("q -> attn.query");
        assert_eq!(
            tokens,
            vec![Token::Ident, Token::Arrow, Token::Ident, Token::Dot, Token::Ident]
        );
    }

    #[test]
    fn negative_and_exponent_numbers() {
        assert_eq!(lex_ok("-1"), vec![Token::Number(-1.0)]);
        assert_eq!(lex_ok("1e-5"), vec![Token::Number(1e-5)]);
        assert_eq!(lex_ok("0.5"), vec![Token::Number(0.5)]);
    }

    #[test]
    fn comments_and_newlines() {
        let tokens = lex_ok("# header\nx = Input()\n\n\ny = Flatten() # trailing\n");
        assert_eq!(tokens.iter().filter(|t| **t == Token::Newline).count(), 3);
        assert_eq!(tokens[0], Token::Newline);
        assert_eq!(tokens.len(), 13);
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            lex_ok(r#""say \"hi\"""#),
            vec![Token::StringLit("say \"hi\"".to_string())]
        );
    }

    #[test]
    fn truthy_prefix_is_ident() {
        assert_eq!(lex_ok("trueish"), vec![Token::Ident]);
    }

    #[test]
    fn bad_character_is_reported_and_skipped() {
        let result = lex("x = Input() $");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].span, Span { start: 12, end: 13 });
        assert_eq!(result.tokens.len(), 5);
    }
}
