//! Syntax kinds for the Rowan-based CST
//!
//! This enum defines all node and token kinds produced for Mini sources and
//! for plain text files.

/// All syntax kinds (tokens and nodes)
///
/// Tokens are leaf nodes (identifiers, keywords, punctuation).
/// Nodes are composite (classes, functions, statements, expressions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
#[allow(non_camel_case_types)]
pub enum SyntaxKind {
    // =========================================================================
    // TRIVIA (whitespace and comments - preserved but not semantically meaningful)
    // =========================================================================
    WHITESPACE = 0,
    LINE_COMMENT,
    BLOCK_COMMENT,

    // =========================================================================
    // LITERALS
    // =========================================================================
    IDENT,   // identifier
    INTEGER, // 42
    STRING,  // "hello"
    TEXT,    // a run of plain text

    // =========================================================================
    // PUNCTUATION
    // =========================================================================
    L_BRACE,   // {
    R_BRACE,   // }
    L_PAREN,   // (
    R_PAREN,   // )
    SEMICOLON, // ;
    COLON,     // :
    COMMA,     // ,
    DOT,       // .
    EQ,        // =
    EQ_EQ,     // ==
    BANG_EQ,   // !=
    LT,        // <
    GT,        // >
    PLUS,      // +
    MINUS,     // -
    STAR,      // *
    SLASH,     // /
    BANG,      // !

    // =========================================================================
    // KEYWORDS
    // =========================================================================
    IMPORT_KW,
    CLASS_KW,
    FN_KW,
    VAR_KW,
    LET_KW,
    RETURN_KW,
    IF_KW,
    ELSE_KW,
    TRUE_KW,
    FALSE_KW,

    // =========================================================================
    // NODES
    // =========================================================================
    SOURCE_FILE,
    IMPORT_LIST,
    IMPORT,
    IMPORT_PATH,
    CLASS,
    FIELD,
    FUNCTION,
    PARAM_LIST,
    PARAM,
    NAME,
    TYPE_REF,

    // Statements
    BLOCK,
    LET_STMT,
    RETURN_STMT,
    IF_STMT,
    EXPR_STMT,

    // Expressions
    LITERAL,
    NAME_REF,
    PAREN_EXPR,
    PREFIX_EXPR,
    BINARY_EXPR,
    CALL_EXPR,
    FIELD_EXPR,
    ARG_LIST,

    // Plain text
    PLAIN_TEXT_FILE,
    PLAIN_TEXT,

    // Special
    ERROR,

    #[doc(hidden)]
    __LAST,
}

impl SyntaxKind {
    /// Check if this is a trivia token (whitespace or comment)
    pub fn is_trivia(self) -> bool {
        matches!(self, Self::WHITESPACE | Self::LINE_COMMENT | Self::BLOCK_COMMENT)
    }

    /// Check if this is a keyword
    pub fn is_keyword(self) -> bool {
        (self as u16) >= (Self::IMPORT_KW as u16) && (self as u16) <= (Self::FALSE_KW as u16)
    }

    /// Check if this is a punctuation token
    pub fn is_punct(self) -> bool {
        (self as u16) >= (Self::L_BRACE as u16) && (self as u16) <= (Self::BANG as u16)
    }

    /// Check if this is a literal
    pub fn is_literal(self) -> bool {
        matches!(self, Self::IDENT | Self::INTEGER | Self::STRING | Self::TEXT)
    }

    /// Check if this kind is used for composite nodes rather than tokens
    pub fn is_node(self) -> bool {
        (self as u16) >= (Self::SOURCE_FILE as u16) && (self as u16) <= (Self::ERROR as u16)
    }

    /// Root node kinds, one per language
    pub fn is_file(self) -> bool {
        matches!(self, Self::SOURCE_FILE | Self::PLAIN_TEXT_FILE)
    }
}

impl From<SyntaxKind> for rowan::SyntaxKind {
    fn from(kind: SyntaxKind) -> Self {
        Self(kind as u16)
    }
}

impl From<rowan::SyntaxKind> for SyntaxKind {
    fn from(raw: rowan::SyntaxKind) -> Self {
        assert!(raw.0 < SyntaxKind::__LAST as u16);
        // Safety: we control all syntax kinds and check bounds above
        unsafe { std::mem::transmute::<u16, SyntaxKind>(raw.0) }
    }
}

/// Language definition for Rowan
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MiniLanguage {}

impl rowan::Language for MiniLanguage {
    type Kind = SyntaxKind;

    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        raw.into()
    }

    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        kind.into()
    }
}

/// Type aliases for convenience
pub type SyntaxNode = rowan::SyntaxNode<MiniLanguage>;
pub type SyntaxToken = rowan::SyntaxToken<MiniLanguage>;
pub type SyntaxElement = rowan::SyntaxElement<MiniLanguage>;
pub type SyntaxNodeChildren = rowan::SyntaxNodeChildren<MiniLanguage>;
