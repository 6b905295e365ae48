// Parser for graph sketches.
//
// Parses a token stream (from the lexer) into a `Sketch` AST. Uses chumsky
// combinators.
//
// Grammar:
//   sketch    := NL* (statement (NL+ statement)*)? NL*
//   statement := node_decl | chain
//   node_decl := IDENT '=' IDENT '(' (arg (',' arg)* ','?)? ')'
//   arg       := IDENT '=' value
//   value     := NUMBER | STRING | IDENT | 'true' | 'false' | '[' NUMBER,* ']'
//   chain     := endpoint ('->' endpoint)+
//   endpoint  := IDENT ('.' IDENT)?
//
// Preconditions: none.
// Postconditions: returns an AST plus any parse errors.
// Failure modes: syntax errors produce `Rich` diagnostics.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::lexer::Token;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub sketch: Option<Sketch>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse a sketch source string. Lexes then parses.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = sketch_parser(source);
    let (sketch, parse_errors) = parser.parse(stream).into_output_errors();

    // Lex errors first, then parse errors.
    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        sketch,
        errors: all_errors,
    }
}

fn sketch_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Sketch, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let nl = just(Token::Newline).repeated().ignored();

    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start()..span.end()].to_string(),
            span,
        }
    });

    // ── Values ──

    let array = select! { Token::Number(n) => n }
        .separated_by(just(Token::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LBracket), just(Token::RBracket))
        .map_with(|items, e| Value::Array(items, e.span()));

    let scalar = select! {
        Token::Number(n) = e => Value::Number(n, e.span()),
        Token::True = e => Value::Bool(true, e.span()),
        Token::False = e => Value::Bool(false, e.span()),
        Token::StringLit(s) = e => Value::Text(s, e.span()),
    }
    .or(ident.clone().map(|id| Value::Text(id.name, id.span)));

    let value = array.or(scalar);

    // ── Node declaration ──

    let arg = ident
        .clone()
        .then_ignore(just(Token::Equals))
        .then(value)
        .map(|(key, value)| ParamArg { key, value });

    let args = arg
        .separated_by(just(Token::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    let node_decl = ident
        .clone()
        .then_ignore(just(Token::Equals))
        .then(ident.clone())
        .then(args)
        .map_with(|((name, block), args), e| {
            Statement::Node(NodeDecl {
                name,
                block,
                args,
                span: e.span(),
            })
        });

    // ── Chain ──

    let endpoint = ident
        .clone()
        .then(just(Token::Dot).ignore_then(ident.clone()).or_not())
        .map_with(|(node, handle), e| Endpoint {
            node,
            handle,
            span: e.span(),
        });

    let chain = endpoint
        .clone()
        .then(
            just(Token::Arrow)
                .ignore_then(endpoint)
                .repeated()
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .map_with(|(first, rest), e| {
            let mut endpoints = Vec::with_capacity(rest.len() + 1);
            endpoints.push(first);
            endpoints.extend(rest);
            Statement::Chain(Chain {
                endpoints,
                span: e.span(),
            })
        });

    let statement = node_decl.or(chain);

    // ── Sketch ──

    nl.clone()
        .ignore_then(
            statement
                .separated_by(just(Token::Newline).repeated().at_least(1))
                .allow_trailing()
                .collect::<Vec<_>>(),
        )
        .then_ignore(nl)
        .map_with(|statements, e| Sketch {
            statements,
            span: e.span(),
        })
}

// ── Tests ──
