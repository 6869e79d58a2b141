//! Recursive descent parser for Mini
//!
//! Builds a rowan GreenNode tree from tokens.
//! Supports error recovery and produces a lossless CST.
//!
//! Trivia between two sibling nodes belongs to their parent, so the range of
//! every composite node starts and ends on a significant token.

use super::lexer::{Lexer, Token};
use super::syntax_kind::SyntaxKind;
use rowan::{GreenNode, GreenNodeBuilder, TextRange, TextSize};

/// Parse result containing the green tree and any errors
#[derive(Debug, Clone)]
pub struct Parse {
    pub green: GreenNode,
    pub errors: Vec<SyntaxError>,
}

impl Parse {
    /// Get the root syntax node
    pub fn syntax(&self) -> super::SyntaxNode {
        super::SyntaxNode::new_root(self.green.clone())
    }

    /// Check if parsing succeeded without errors
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A syntax error with location and message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub range: TextRange,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, range: TextRange) -> Self {
        Self {
            message: message.into(),
            range,
        }
    }
}

/// Parse Mini source code into a CST
pub fn parse(input: &str) -> Parse {
    let tokens: Vec<_> = Lexer::new(input).collect();
    let mut parser = Parser::new(&tokens);
    parser.parse_source_file();
    parser.finish()
}

/// Parse arbitrary text as a plain text file: one `PLAIN_TEXT` node per
/// non-empty line, line breaks kept as whitespace of the file node.
pub fn parse_plain_text(input: &str) -> Parse {
    let mut builder = GreenNodeBuilder::new();
    builder.start_node(SyntaxKind::PLAIN_TEXT_FILE.into());
    for line in input.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        if !content.is_empty() {
            builder.start_node(SyntaxKind::PLAIN_TEXT.into());
            builder.token(SyntaxKind::TEXT.into(), content);
            builder.finish_node();
        }
        let newline = &line[content.len()..];
        if !newline.is_empty() {
            builder.token(SyntaxKind::WHITESPACE.into(), newline);
        }
    }
    builder.finish_node();
    Parse {
        green: builder.finish(),
        errors: Vec::new(),
    }
}

/// The parser state
struct Parser<'a> {
    tokens: &'a [Token<'a>],
    pos: usize,
    builder: GreenNodeBuilder<'static>,
    errors: Vec<SyntaxError>,
}

const ITEM_RECOVERY: &[SyntaxKind] = &[
    SyntaxKind::IMPORT_KW,
    SyntaxKind::CLASS_KW,
    SyntaxKind::FN_KW,
    SyntaxKind::VAR_KW,
];

const MEMBER_RECOVERY: &[SyntaxKind] = &[
    SyntaxKind::R_BRACE,
    SyntaxKind::CLASS_KW,
    SyntaxKind::FN_KW,
    SyntaxKind::VAR_KW,
];

const STMT_RECOVERY: &[SyntaxKind] = &[
    SyntaxKind::SEMICOLON,
    SyntaxKind::R_BRACE,
    SyntaxKind::LET_KW,
    SyntaxKind::RETURN_KW,
    SyntaxKind::IF_KW,
];

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token<'a>]) -> Self {
        Self {
            tokens,
            pos: 0,
            builder: GreenNodeBuilder::new(),
            errors: Vec::new(),
        }
    }

    fn finish(self) -> Parse {
        Parse {
            green: self.builder.finish(),
            errors: self.errors,
        }
    }

    // =========================================================================
    // Token inspection
    // =========================================================================

    fn current(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn current_kind(&self) -> SyntaxKind {
        self.current().map(|t| t.kind).unwrap_or(SyntaxKind::ERROR)
    }

    fn at(&self, kind: SyntaxKind) -> bool {
        self.current_kind() == kind
    }

    fn at_any(&self, kinds: &[SyntaxKind]) -> bool {
        kinds.contains(&self.current_kind())
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// True when only trivia is left.
    fn at_end(&self) -> bool {
        self.tokens[self.pos..]
            .iter()
            .all(|t| t.kind.is_trivia())
    }

    fn nth(&self, n: usize) -> SyntaxKind {
        // Look ahead, skipping trivia
        let mut idx = self.pos;
        let mut count = 0;
        while idx < self.tokens.len() {
            if !self.tokens[idx].kind.is_trivia() {
                if count == n {
                    return self.tokens[idx].kind;
                }
                count += 1;
            }
            idx += 1;
        }
        SyntaxKind::ERROR
    }

    // =========================================================================
    // Token consumption
    // =========================================================================

    fn bump(&mut self) {
        if let Some(token) = self.current() {
            self.builder.token(token.kind.into(), token.text);
            self.pos += 1;
        }
    }

    /// Consume trivia and the next token if it has the given kind.
    fn eat_next(&mut self, kind: SyntaxKind) -> bool {
        if self.nth(0) == kind {
            self.skip_trivia();
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_next(&mut self, kind: SyntaxKind) -> bool {
        if self.eat_next(kind) {
            true
        } else {
            self.error(format!("expected {:?}", kind));
            false
        }
    }

    fn skip_trivia(&mut self) {
        while self.current().map(|t| t.kind.is_trivia()).unwrap_or(false) {
            self.bump();
        }
    }

    // =========================================================================
    // Error handling
    // =========================================================================

    fn error(&mut self, message: impl Into<String>) {
        let range = self
            .current()
            .map(|t| TextRange::at(t.offset, TextSize::of(t.text)))
            .or_else(|| {
                self.tokens
                    .last()
                    .map(|t| TextRange::empty(t.offset + TextSize::of(t.text)))
            })
            .unwrap_or_else(|| TextRange::empty(TextSize::new(0)));
        self.errors.push(SyntaxError::new(message, range));
    }

    fn error_recover(&mut self, message: impl Into<String>, recovery: &[SyntaxKind]) {
        self.error(message);
        self.builder.start_node(SyntaxKind::ERROR.into());
        let mut consumed = false;
        while !self.at_eof() && !self.at_any(recovery) {
            self.bump();
            consumed = true;
        }
        // Always consume at least one token to make progress
        if !consumed && !self.at_eof() {
            self.bump();
        }
        self.builder.finish_node();
    }

    // =========================================================================
    // Node building helpers
    // =========================================================================

    fn start_node(&mut self, kind: SyntaxKind) {
        self.builder.start_node(kind.into());
    }

    fn finish_node(&mut self) {
        self.builder.finish_node();
    }

    // =========================================================================
    // File and declarations
    // =========================================================================

    fn parse_source_file(&mut self) {
        self.start_node(SyntaxKind::SOURCE_FILE);
        self.skip_trivia();
        if self.at(SyntaxKind::IMPORT_KW) {
            self.parse_import_list();
        }
        loop {
            self.skip_trivia();
            if self.at_eof() {
                break;
            }
            match self.current_kind() {
                SyntaxKind::IMPORT_KW => self.parse_import(),
                SyntaxKind::CLASS_KW => self.parse_class(),
                SyntaxKind::FN_KW => self.parse_function(),
                SyntaxKind::VAR_KW => self.parse_field(),
                _ => self.error_recover("expected declaration", ITEM_RECOVERY),
            }
        }
        self.finish_node();
    }

    fn parse_import_list(&mut self) {
        self.start_node(SyntaxKind::IMPORT_LIST);
        loop {
            self.parse_import();
            if self.nth(0) != SyntaxKind::IMPORT_KW {
                break;
            }
            self.skip_trivia();
        }
        self.finish_node();
    }

    fn parse_import(&mut self) {
        self.start_node(SyntaxKind::IMPORT);
        self.bump();
        if self.nth(0) == SyntaxKind::IDENT {
            self.skip_trivia();
            self.start_node(SyntaxKind::IMPORT_PATH);
            self.bump();
            while self.nth(0) == SyntaxKind::DOT {
                self.eat_next(SyntaxKind::DOT);
                self.expect_next(SyntaxKind::IDENT);
            }
            self.finish_node();
        } else {
            self.error("expected import path");
        }
        self.expect_next(SyntaxKind::SEMICOLON);
        self.finish_node();
    }

    fn parse_name(&mut self) {
        if self.nth(0) == SyntaxKind::IDENT {
            self.skip_trivia();
            self.start_node(SyntaxKind::NAME);
            self.bump();
            self.finish_node();
        } else {
            self.error("expected name");
        }
    }

    fn parse_type_ref(&mut self) {
        if self.nth(0) == SyntaxKind::IDENT {
            self.skip_trivia();
            self.start_node(SyntaxKind::TYPE_REF);
            self.bump();
            self.finish_node();
        } else {
            self.error("expected type");
        }
    }

    fn parse_class(&mut self) {
        self.start_node(SyntaxKind::CLASS);
        self.bump();
        self.parse_name();
        if self.expect_next(SyntaxKind::L_BRACE) {
            loop {
                if self.at_end() || self.nth(0) == SyntaxKind::R_BRACE {
                    break;
                }
                self.skip_trivia();
                match self.current_kind() {
                    SyntaxKind::CLASS_KW => self.parse_class(),
                    SyntaxKind::FN_KW => self.parse_function(),
                    SyntaxKind::VAR_KW => self.parse_field(),
                    _ => self.error_recover("expected member", MEMBER_RECOVERY),
                }
            }
            self.expect_next(SyntaxKind::R_BRACE);
        }
        self.finish_node();
    }

    fn parse_field(&mut self) {
        self.start_node(SyntaxKind::FIELD);
        self.bump();
        self.parse_name();
        if self.eat_next(SyntaxKind::COLON) {
            self.parse_type_ref();
        }
        if self.eat_next(SyntaxKind::EQ) {
            self.parse_expr_after_trivia();
        }
        self.expect_next(SyntaxKind::SEMICOLON);
        self.finish_node();
    }

    fn parse_function(&mut self) {
        self.start_node(SyntaxKind::FUNCTION);
        self.bump();
        self.parse_name();
        self.parse_param_list();
        if self.eat_next(SyntaxKind::COLON) {
            self.parse_type_ref();
        }
        self.parse_block();
        self.finish_node();
    }

    fn parse_param_list(&mut self) {
        if self.nth(0) != SyntaxKind::L_PAREN {
            self.error("expected parameter list");
            return;
        }
        self.skip_trivia();
        self.start_node(SyntaxKind::PARAM_LIST);
        self.bump();
        loop {
            if self.at_end() || self.nth(0) == SyntaxKind::R_PAREN {
                break;
            }
            if self.nth(0) == SyntaxKind::IDENT {
                self.skip_trivia();
                self.start_node(SyntaxKind::PARAM);
                self.start_node(SyntaxKind::NAME);
                self.bump();
                self.finish_node();
                if self.eat_next(SyntaxKind::COLON) {
                    self.parse_type_ref();
                }
                self.finish_node();
            } else {
                self.skip_trivia();
                self.error_recover(
                    "expected parameter",
                    &[SyntaxKind::COMMA, SyntaxKind::R_PAREN, SyntaxKind::L_BRACE],
                );
                if self.at(SyntaxKind::L_BRACE) {
                    break;
                }
            }
            if !self.eat_next(SyntaxKind::COMMA) {
                break;
            }
        }
        self.expect_next(SyntaxKind::R_PAREN);
        self.finish_node();
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn parse_block(&mut self) {
        if self.nth(0) != SyntaxKind::L_BRACE {
            self.error("expected block");
            return;
        }
        self.skip_trivia();
        self.start_node(SyntaxKind::BLOCK);
        self.bump();
        loop {
            if self.at_end() || self.nth(0) == SyntaxKind::R_BRACE {
                break;
            }
            self.skip_trivia();
            self.parse_stmt();
        }
        self.expect_next(SyntaxKind::R_BRACE);
        self.finish_node();
    }

    fn parse_stmt(&mut self) {
        match self.current_kind() {
            SyntaxKind::LET_KW => self.parse_let(),
            SyntaxKind::RETURN_KW => self.parse_return(),
            SyntaxKind::IF_KW => self.parse_if(),
            SyntaxKind::L_BRACE => self.parse_block(),
            kind if at_expr_start(kind) => {
                self.start_node(SyntaxKind::EXPR_STMT);
                self.parse_expr();
                self.expect_next(SyntaxKind::SEMICOLON);
                self.finish_node();
            }
            _ => {
                self.error_recover("expected statement", STMT_RECOVERY);
                self.eat_next(SyntaxKind::SEMICOLON);
            }
        }
    }

    fn parse_let(&mut self) {
        self.start_node(SyntaxKind::LET_STMT);
        self.bump();
        self.parse_name();
        if self.eat_next(SyntaxKind::COLON) {
            self.parse_type_ref();
        }
        if self.eat_next(SyntaxKind::EQ) {
            self.parse_expr_after_trivia();
        }
        self.expect_next(SyntaxKind::SEMICOLON);
        self.finish_node();
    }

    fn parse_return(&mut self) {
        self.start_node(SyntaxKind::RETURN_STMT);
        self.bump();
        if at_expr_start(self.nth(0)) {
            self.parse_expr_after_trivia();
        }
        self.expect_next(SyntaxKind::SEMICOLON);
        self.finish_node();
    }

    fn parse_if(&mut self) {
        self.start_node(SyntaxKind::IF_STMT);
        self.bump();
        self.parse_expr_after_trivia();
        self.parse_block();
        if self.eat_next(SyntaxKind::ELSE_KW) {
            if self.nth(0) == SyntaxKind::IF_KW {
                self.skip_trivia();
                self.parse_if();
            } else {
                self.parse_block();
            }
        }
        self.finish_node();
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn parse_expr_after_trivia(&mut self) {
        self.skip_trivia();
        self.parse_expr();
    }

    fn parse_expr(&mut self) {
        self.parse_binary(0);
    }

    fn parse_binary(&mut self, min_prec: u8) {
        let checkpoint = self.builder.checkpoint();
        self.parse_prefix();
        while let Some(prec) = infix_precedence(self.nth(0)) {
            if prec <= min_prec {
                break;
            }
            self.builder
                .start_node_at(checkpoint, SyntaxKind::BINARY_EXPR.into());
            self.skip_trivia();
            self.bump();
            self.skip_trivia();
            self.parse_binary(prec);
            self.finish_node();
        }
    }

    fn parse_prefix(&mut self) {
        if self.at_any(&[SyntaxKind::BANG, SyntaxKind::MINUS]) {
            self.start_node(SyntaxKind::PREFIX_EXPR);
            self.bump();
            self.skip_trivia();
            self.parse_prefix();
            self.finish_node();
        } else {
            self.parse_postfix();
        }
    }

    fn parse_postfix(&mut self) {
        let checkpoint = self.builder.checkpoint();
        if !self.parse_primary() {
            return;
        }
        loop {
            match self.nth(0) {
                SyntaxKind::L_PAREN => {
                    self.builder
                        .start_node_at(checkpoint, SyntaxKind::CALL_EXPR.into());
                    self.skip_trivia();
                    self.parse_arg_list();
                    self.finish_node();
                }
                SyntaxKind::DOT => {
                    self.builder
                        .start_node_at(checkpoint, SyntaxKind::FIELD_EXPR.into());
                    self.eat_next(SyntaxKind::DOT);
                    if self.nth(0) == SyntaxKind::IDENT {
                        self.skip_trivia();
                        self.start_node(SyntaxKind::NAME_REF);
                        self.bump();
                        self.finish_node();
                    } else {
                        self.error("expected field name");
                    }
                    self.finish_node();
                }
                _ => break,
            }
        }
    }

    fn parse_arg_list(&mut self) {
        self.start_node(SyntaxKind::ARG_LIST);
        self.bump();
        loop {
            if self.at_end() || self.nth(0) == SyntaxKind::R_PAREN {
                break;
            }
            self.skip_trivia();
            if at_expr_start(self.current_kind()) {
                self.parse_expr();
            } else {
                self.error_recover(
                    "expected argument",
                    &[
                        SyntaxKind::COMMA,
                        SyntaxKind::R_PAREN,
                        SyntaxKind::SEMICOLON,
                        SyntaxKind::R_BRACE,
                    ],
                );
            }
            if !self.eat_next(SyntaxKind::COMMA) {
                break;
            }
        }
        self.expect_next(SyntaxKind::R_PAREN);
        self.finish_node();
    }

    /// Returns `false` without consuming anything when no expression starts here.
    fn parse_primary(&mut self) -> bool {
        match self.current_kind() {
            SyntaxKind::INTEGER
            | SyntaxKind::STRING
            | SyntaxKind::TRUE_KW
            | SyntaxKind::FALSE_KW => {
                self.start_node(SyntaxKind::LITERAL);
                self.bump();
                self.finish_node();
                true
            }
            SyntaxKind::IDENT => {
                self.start_node(SyntaxKind::NAME_REF);
                self.bump();
                self.finish_node();
                true
            }
            SyntaxKind::L_PAREN => {
                self.start_node(SyntaxKind::PAREN_EXPR);
                self.bump();
                self.parse_expr_after_trivia();
                self.expect_next(SyntaxKind::R_PAREN);
                self.finish_node();
                true
            }
            _ => {
                self.error("expected expression");
                false
            }
        }
    }
}

fn at_expr_start(kind: SyntaxKind) -> bool {
    matches!(
        kind,
        SyntaxKind::INTEGER
            | SyntaxKind::STRING
            | SyntaxKind::TRUE_KW
            | SyntaxKind::FALSE_KW
            | SyntaxKind::IDENT
            | SyntaxKind::L_PAREN
            | SyntaxKind::BANG
            | SyntaxKind::MINUS
    )
}

fn infix_precedence(kind: SyntaxKind) -> Option<u8> {
    let prec = match kind {
        SyntaxKind::EQ => 1,
        SyntaxKind::EQ_EQ | SyntaxKind::BANG_EQ => 2,
        SyntaxKind::LT | SyntaxKind::GT => 3,
        SyntaxKind::PLUS | SyntaxKind::MINUS => 4,
        SyntaxKind::STAR | SyntaxKind::SLASH => 5,
        _ => return None,
    };
    Some(prec)
}
