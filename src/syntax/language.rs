use std::fmt;

use crate::parser::{Parse, SyntaxKind, parse, parse_plain_text};

/// The languages a file can be interpreted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    Mini,
    #[default]
    PlainText,
}

impl Language {
    pub fn name(self) -> &'static str {
        match self {
            Language::Mini => "Mini",
            Language::PlainText => "PlainText",
        }
    }

    pub fn parse(self, text: &str) -> Parse {
        match self {
            Language::Mini => parse(text),
            Language::PlainText => parse_plain_text(text),
        }
    }

    pub fn root_kind(self) -> SyntaxKind {
        match self {
            Language::Mini => SyntaxKind::SOURCE_FILE,
            Language::PlainText => SyntaxKind::PLAIN_TEXT_FILE,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
