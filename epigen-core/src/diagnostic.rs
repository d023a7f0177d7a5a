//! User-facing diagnostics for every pipeline stage.

use std::fmt;

use crate::token::Token;

/// Lexical, syntax and attribute problems found while parsing one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxErrorCode {
    NoMatchingClosingBrace,
    NoMatchingOpeningBrace,
    NoMatchingClosingBracket,
    NoSemicolonOnDeclaration,
    NoBodyOnDeclaration,
    MissingTypeDeclaration,
    MissingTemplateArguments,
    UnknownToken,
    UnexpectedToken,
    UnexpectedKeywordUsage,
    UnexpectedEOF,
    IncorrectValueLiteral,
    IncorrectValueAssignment,
    AttributeConflict,
    AttributeInvalidParameters,
    AttributeInvalidTarget,
    DuplicatingSymbol,
    MultiDepthPointer,
    WrongIdentifierContext,
}

impl SyntaxErrorCode {
    pub fn message(self) -> &'static str {
        use SyntaxErrorCode::*;
        match self {
            NoMatchingClosingBrace => "No matching closing brace",
            NoMatchingOpeningBrace => "No matching opening brace",
            NoMatchingClosingBracket => "No matching closing bracket",
            NoSemicolonOnDeclaration => "No `;` at the end of the declaration",
            NoBodyOnDeclaration => "The body of the type declaration is absent",
            MissingTypeDeclaration => "Missing a user type declaration",
            MissingTemplateArguments => "Template type should have a template argument list",
            UnknownToken => "Unknown token (the token is unrecognized)",
            UnexpectedToken => {
                "Unexpected token (the token is recognized, but used in the wrong context)"
            }
            UnexpectedKeywordUsage => "Unexpected keyword usage",
            UnexpectedEOF => "Unexpected end of file",
            IncorrectValueLiteral => "Incorrect value literal",
            IncorrectValueAssignment => "Incorrect value assignment",
            AttributeConflict => "Provided attribute conflicts with another attribute",
            AttributeInvalidParameters => "Invalid attribute parameters",
            AttributeInvalidTarget => "An attribute was applied to the wrong target",
            DuplicatingSymbol => "The symbol's name duplicates another symbol's name",
            MultiDepthPointer => "Only single-depth pointers are allowed",
            WrongIdentifierContext => "An identifier was used in the wrong context",
        }
    }
}

/// Cross-file problems found while linking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkerErrorCode {
    DuplicatingSymbol,
    NoSuchSymbol,
    HashCollision,
    IncompleteTypeUsage,
    BadTemplateArgument,
    IncorrectValueAssignment,
}

impl LinkerErrorCode {
    pub fn message(self) -> &'static str {
        use LinkerErrorCode::*;
        match self {
            DuplicatingSymbol => "A symbol with such a name has already been defined",
            NoSuchSymbol => "The symbol doesn't exist",
            HashCollision => "Hash collision has occurred",
            IncompleteTypeUsage => "This incomplete type can't be used in this context",
            BadTemplateArgument => "Provided template argument isn't a type",
            IncorrectValueAssignment => "Incorrect value assignment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeGenErrorCode {
    CorruptedAnchor,
    ReservedName,
}

impl CodeGenErrorCode {
    pub fn message(self) -> &'static str {
        match self {
            CodeGenErrorCode::CorruptedAnchor => "Anchor corrupted",
            CodeGenErrorCode::ReservedName => "The name is reserved for a generated region",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Syntax(SyntaxErrorCode),
    Linker(LinkerErrorCode),
    CodeGen(CodeGenErrorCode),
}

impl DiagnosticKind {
    pub fn message(self) -> &'static str {
        match self {
            DiagnosticKind::Syntax(code) => code.message(),
            DiagnosticKind::Linker(code) => code.message(),
            DiagnosticKind::CodeGen(code) => code.message(),
        }
    }

    fn stage(self) -> &'static str {
        match self {
            DiagnosticKind::Syntax(_) => "Syntax",
            DiagnosticKind::Linker(_) => "Linker",
            DiagnosticKind::CodeGen(_) => "Code generation",
        }
    }
}

/// A single reported problem.
///
/// Parser and linker diagnostics point at a token (`None` meaning end of
/// file); generator diagnostics name the affected file in `subject`.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub token: Option<Token>,
    pub subject: Option<String>,
    pub tip: String,
}

impl Diagnostic {
    pub fn syntax(code: SyntaxErrorCode, token: Option<Token>, tip: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Syntax(code),
            token,
            subject: None,
            tip: tip.into(),
        }
    }

    pub fn linker(code: LinkerErrorCode, token: &Token, tip: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Linker(code),
            token: Some(token.clone()),
            subject: None,
            tip: tip.into(),
        }
    }

    pub fn codegen(code: CodeGenErrorCode, subject: impl Into<String>, tip: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::CodeGen(code),
            token: None,
            subject: Some(subject.into()),
            tip: tip.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error ", self.kind.stage())?;
        match (&self.token, &self.subject) {
            (Some(token), _) => write!(f, "{token}")?,
            (None, Some(subject)) => f.write_str(subject)?,
            (None, None) => f.write_str("EOF")?,
        }
        write!(f, ": {}", self.kind.message())?;
        if !self.tip.is_empty() {
            write!(f, " ({})", self.tip)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{SourceOrigin, TokenKind};
    use std::sync::Arc;

    #[test]
    fn formats_token_diagnostics() {
        let origin = Arc::new(SourceOrigin::new("A.epi", "core/A.epi"));
        let token = Token::new(TokenKind::Identifier, "Name", 3, 7, Some(origin));
        let diag = Diagnostic::syntax(SyntaxErrorCode::UnexpectedToken, Some(token), "oops");
        assert_eq!(
            diag.to_string(),
            "Syntax error [core/A.epi(l:   3, c:   7)]: \"Name\" (Identifier): \
             Unexpected token (the token is recognized, but used in the wrong context) (oops)"
        );
    }

    #[test]
    fn formats_eof_and_file_diagnostics() {
        let eof = Diagnostic::syntax(SyntaxErrorCode::UnexpectedEOF, None, "");
        assert_eq!(eof.to_string(), "Syntax error EOF: Unexpected end of file");

        let anchor = Diagnostic::codegen(CodeGenErrorCode::CorruptedAnchor, "A.h", "missing");
        assert_eq!(
            anchor.to_string(),
            "Code generation error A.h: Anchor corrupted (missing)"
        );
    }
}
