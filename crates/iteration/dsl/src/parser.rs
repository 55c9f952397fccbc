//! Parser: recursive descent parser for processor declarations
//!
//! Consumes tokens from the lexer and produces a [`ParsedProcessor`] that the
//! validator checks and the compiler turns into a stack definition.
//!
//! ```text
//! processor := PROCESSOR string "{" item* "}"
//! item      := INPUT ident DEPTH number | LAYER expr
//! expr      := ident | ident "(" expr ("," expr)* ")"
//! ```

use crate::errors::{DslError, DslResult};
use crate::lexer::{Lexer, Token, TokenKind};

/// Parsed processor, the intermediate representation
#[derive(Clone, Debug)]
pub struct ParsedProcessor {
    pub name: String,
    pub inputs: Vec<ParsedInput>,
    /// Strategy layers in declaration order
    pub layers: Vec<ParsedLayer>,
}

#[derive(Clone, Debug)]
pub struct ParsedInput {
    pub name: String,
    pub depth: usize,
    pub line: usize,
    pub col: usize,
}

#[derive(Clone, Debug)]
pub struct ParsedLayer {
    pub expr: ParsedExpr,
    pub line: usize,
}

/// A strategy expression: a port reference or an operator application
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedExpr {
    Port {
        name: String,
        line: usize,
        col: usize,
    },
    Operator {
        name: String,
        operands: Vec<ParsedExpr>,
        line: usize,
        col: usize,
    },
}

impl ParsedExpr {
    /// Port references in the expression, left to right, with positions
    pub fn ports(&self) -> Vec<(&str, usize, usize)> {
        match self {
            Self::Port { name, line, col } => vec![(name.as_str(), *line, *col)],
            Self::Operator { operands, .. } => operands.iter().flat_map(Self::ports).collect(),
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Parse DSL input text into a ParsedProcessor
    pub fn parse(input: &str) -> DslResult<ParsedProcessor> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize()?;
        let mut parser = Self { tokens, pos: 0 };
        let processor = parser.parse_processor()?;
        parser.expect(TokenKind::Eof)?;
        Ok(processor)
    }

    fn parse_processor(&mut self) -> DslResult<ParsedProcessor> {
        // PROCESSOR "name" {
        self.expect(TokenKind::Processor)?;
        let name = self.expect(TokenKind::StringLiteral)?.text.clone();
        self.expect(TokenKind::OpenBrace)?;

        let mut processor = ParsedProcessor {
            name,
            inputs: Vec::new(),
            layers: Vec::new(),
        };

        while !self.check(TokenKind::CloseBrace) && !self.check(TokenKind::Eof) {
            match self.peek_kind() {
                TokenKind::Input => {
                    let input = self.parse_input()?;
                    processor.inputs.push(input);
                }
                TokenKind::Layer => {
                    let line = self.advance().line;
                    let expr = self.parse_expr()?;
                    processor.layers.push(ParsedLayer { expr, line });
                }
                _ => {
                    let tok = self.peek();
                    return Err(DslError::UnknownKeyword(tok.text.clone()));
                }
            }
        }

        self.expect(TokenKind::CloseBrace)?;
        Ok(processor)
    }

    fn parse_input(&mut self) -> DslResult<ParsedInput> {
        self.expect(TokenKind::Input)?;
        let tok = self.expect(TokenKind::Identifier)?;
        let (name, line, col) = (tok.text.clone(), tok.line, tok.col);
        self.expect(TokenKind::Depth)?;
        let depth = self.expect_number()?;
        Ok(ParsedInput {
            name,
            depth,
            line,
            col,
        })
    }

    fn parse_expr(&mut self) -> DslResult<ParsedExpr> {
        let tok = self.expect(TokenKind::Identifier)?;
        let (name, line, col) = (tok.text.clone(), tok.line, tok.col);

        if !self.check(TokenKind::OpenParen) {
            return Ok(ParsedExpr::Port { name, line, col });
        }

        self.advance();
        let mut operands = vec![self.parse_expr()?];
        while self.check(TokenKind::Comma) {
            self.advance();
            operands.push(self.parse_expr()?);
        }
        self.expect(TokenKind::CloseParen)?;

        Ok(ParsedExpr::Operator {
            name,
            operands,
            line,
            col,
        })
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind.clone()
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> DslResult<&Token> {
        if self.check(kind.clone()) {
            Ok(self.advance())
        } else if self.check(TokenKind::Eof) {
            Err(DslError::UnexpectedEof(format!("{}", kind)))
        } else {
            let tok = self.peek();
            Err(DslError::UnexpectedToken {
                expected: format!("{}", kind),
                found: tok.text.clone(),
                line: tok.line,
                col: tok.col,
            })
        }
    }

    fn expect_number(&mut self) -> DslResult<usize> {
        let tok = self.expect(TokenKind::NumberLiteral)?;
        tok.text.parse::<usize>().map_err(|_| DslError::InvalidValue {
            field: "DEPTH".into(),
            message: format!("'{}' is not a valid depth", tok.text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_processor() {
        let parsed = Parser::parse(r#"PROCESSOR "echo" { INPUT text DEPTH 0 }"#).unwrap();

        assert_eq!(parsed.name, "echo");
        assert_eq!(parsed.inputs.len(), 1);
        assert_eq!(parsed.inputs[0].name, "text");
        assert_eq!(parsed.inputs[0].depth, 0);
        assert!(parsed.layers.is_empty());
    }

    #[test]
    fn test_parse_full_processor() {
        let input = r#"
        PROCESSOR "blast" {
            INPUT query DEPTH 0
            INPUT database DEPTH 0
            INPUT options DEPTH 1

            # align each query with its database, then every option set
            LAYER cross(dot(query, database), options)
            LAYER cross(query, database, options)
        }
        "#;

        let parsed = Parser::parse(input).unwrap();
        assert_eq!(parsed.name, "blast");
        assert_eq!(parsed.inputs.len(), 3);
        assert_eq!(parsed.inputs[2].depth, 1);
        assert_eq!(parsed.layers.len(), 2);
        assert_eq!(parsed.layers[0].line, 8);

        match &parsed.layers[0].expr {
            ParsedExpr::Operator { name, operands, .. } => {
                assert_eq!(name, "cross");
                assert_eq!(operands.len(), 2);
                assert!(matches!(&operands[0], ParsedExpr::Operator { name, .. } if name == "dot"));
            }
            other => panic!("expected operator, got {:?}", other),
        }

        let ports: Vec<&str> = parsed.layers[1]
            .expr
            .ports()
            .into_iter()
            .map(|(name, _, _)| name)
            .collect();
        assert_eq!(ports, vec!["query", "database", "options"]);
    }

    #[test]
    fn test_bare_port_layer() {
        let parsed =
            Parser::parse(r#"PROCESSOR "p" { INPUT a DEPTH 2 LAYER a }"#).unwrap();
        assert!(matches!(
            &parsed.layers[0].expr,
            ParsedExpr::Port { name, .. } if name == "a"
        ));
    }

    #[test]
    fn test_missing_close_paren() {
        let err = Parser::parse(r#"PROCESSOR "p" { INPUT a DEPTH 0 LAYER cross(a }"#)
            .unwrap_err();
        assert!(matches!(
            err,
            DslError::UnexpectedToken { ref expected, .. } if expected == ")"
        ));
    }

    #[test]
    fn test_unknown_keyword() {
        let err = Parser::parse(r#"PROCESSOR "p" { OUTPUT a }"#).unwrap_err();
        assert!(matches!(err, DslError::UnknownKeyword(ref k) if k == "OUTPUT"));
    }

    #[test]
    fn test_unexpected_eof() {
        let err = Parser::parse(r#"PROCESSOR "p" { INPUT a DEPTH"#).unwrap_err();
        assert!(matches!(err, DslError::UnexpectedEof(_)));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        let err = Parser::parse(r#"PROCESSOR "p" { } extra"#).unwrap_err();
        assert!(matches!(err, DslError::UnexpectedToken { line: 1, .. }));
    }

    #[test]
    fn test_error_position() {
        let err = Parser::parse("PROCESSOR \"p\" {\n  INPUT 7 DEPTH 0\n}").unwrap_err();
        assert!(matches!(
            err,
            DslError::UnexpectedToken { line: 2, col: 9, .. }
        ));
    }
}
