//! Token model shared by the lexer, parser and diagnostics.

use std::fmt;
use std::sync::Arc;

/// Classification of a single token.
///
/// Keywords are not produced while scanning: the lexer emits plain
/// identifiers and rewrites them in a final keyword-resolution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Unknown,
    Identifier,

    // Punctuation
    OpenBrace,         // {
    CloseBrace,        // }
    OpenAngleBracket,  // <
    CloseAngleBracket, // >
    OpenBracket,       // (
    CloseBracket,      // )
    OpenSqBracket,     // [
    CloseSqBracket,    // ]
    Assign,            // =
    Asterisk,          // *
    Ampersand,         // &
    Comma,             // ,
    Colon,             // :
    Semicolon,         // ;
    VSlash,            // |

    // Literals
    CharLiteral,
    WCharLiteral,
    StringLiteral,
    WStringLiteral,
    IntegerLiteral,
    SingleFloatingLiteral,
    DoubleFloatingLiteral,
    TrueLiteral,
    FalseLiteral,

    // Fundamental types
    CharType,
    WCharType,
    BoolType,
    ByteType,
    SizeTType,
    HashTType,
    UInt8Type,
    UInt16Type,
    UInt32Type,
    UInt64Type,
    Int8Type,
    Int16Type,
    Int32Type,
    Int64Type,
    SingleFloatingType,
    DoubleFloatingType,

    // Compound types
    StringType,
    WStringType,
    Vec2FType,
    Vec2DType,
    Vec2SType,
    Vec2UType,
    Vec3FType,
    Vec3DType,
    Vec3SType,
    Vec3UType,
    Vec4FType,
    Vec4DType,
    Vec4SType,
    Vec4UType,
    Mat2x2FType,
    Mat3x3FType,
    Mat4x4FType,
    Rect2FType,
    Rect2DType,
    Rect2SType,
    Rect2UType,

    // Templated containers
    ArrayType,
    PtrArrayType,

    // Declarations
    ClassType,
    EnumType,

    // Attributes
    ReadOnly,
    WriteOnly,
    ReadCallback,
    WriteCallback,
    Virtual,
    Min,
    Max,
    Transient,
    DisplayName,
    FlagMask,
}

/// Punctuation table. Longer entries come first so that a prefix never
/// shadows a longer symbol.
pub const SYMBOLS: &[(&str, TokenKind)] = &[
    ("{", TokenKind::OpenBrace),
    ("}", TokenKind::CloseBrace),
    ("<", TokenKind::OpenAngleBracket),
    (">", TokenKind::CloseAngleBracket),
    ("(", TokenKind::OpenBracket),
    (")", TokenKind::CloseBracket),
    ("[", TokenKind::OpenSqBracket),
    ("]", TokenKind::CloseSqBracket),
    ("=", TokenKind::Assign),
    ("*", TokenKind::Asterisk),
    ("&", TokenKind::Ampersand),
    (",", TokenKind::Comma),
    (":", TokenKind::Colon),
    (";", TokenKind::Semicolon),
    ("|", TokenKind::VSlash),
];

/// Reserved words and the kinds they resolve to.
pub const KEYWORDS: &[(&str, TokenKind)] = &[
    ("epiChar", TokenKind::CharType),
    ("epiWChar", TokenKind::WCharType),
    ("epiBool", TokenKind::BoolType),
    ("epiByte", TokenKind::ByteType),
    ("epiSize_t", TokenKind::SizeTType),
    ("epiHash_t", TokenKind::HashTType),
    ("epiU8", TokenKind::UInt8Type),
    ("epiU16", TokenKind::UInt16Type),
    ("epiU32", TokenKind::UInt32Type),
    ("epiU64", TokenKind::UInt64Type),
    ("epiS8", TokenKind::Int8Type),
    ("epiS16", TokenKind::Int16Type),
    ("epiS32", TokenKind::Int32Type),
    ("epiS64", TokenKind::Int64Type),
    ("epiFloat", TokenKind::SingleFloatingType),
    ("epiDouble", TokenKind::DoubleFloatingType),
    ("epiString", TokenKind::StringType),
    ("epiWString", TokenKind::WStringType),
    ("epiVec2f", TokenKind::Vec2FType),
    ("epiVec2d", TokenKind::Vec2DType),
    ("epiVec2s", TokenKind::Vec2SType),
    ("epiVec2u", TokenKind::Vec2UType),
    ("epiVec3f", TokenKind::Vec3FType),
    ("epiVec3d", TokenKind::Vec3DType),
    ("epiVec3s", TokenKind::Vec3SType),
    ("epiVec3u", TokenKind::Vec3UType),
    ("epiVec4f", TokenKind::Vec4FType),
    ("epiVec4d", TokenKind::Vec4DType),
    ("epiVec4s", TokenKind::Vec4SType),
    ("epiVec4u", TokenKind::Vec4UType),
    ("epiMat2x2f", TokenKind::Mat2x2FType),
    ("epiMat3x3f", TokenKind::Mat3x3FType),
    ("epiMat4x4f", TokenKind::Mat4x4FType),
    ("epiRect2f", TokenKind::Rect2FType),
    ("epiRect2d", TokenKind::Rect2DType),
    ("epiRect2s", TokenKind::Rect2SType),
    ("epiRect2u", TokenKind::Rect2UType),
    ("epiArray", TokenKind::ArrayType),
    ("epiPtrArray", TokenKind::PtrArrayType),
    ("class", TokenKind::ClassType),
    ("enum", TokenKind::EnumType),
    ("ReadOnly", TokenKind::ReadOnly),
    ("WriteOnly", TokenKind::WriteOnly),
    ("ReadCallback", TokenKind::ReadCallback),
    ("WriteCallback", TokenKind::WriteCallback),
    ("Virtual", TokenKind::Virtual),
    ("Min", TokenKind::Min),
    ("Max", TokenKind::Max),
    ("Transient", TokenKind::Transient),
    ("DisplayName", TokenKind::DisplayName),
    ("FlagMask", TokenKind::FlagMask),
    ("true", TokenKind::TrueLiteral),
    ("false", TokenKind::FalseLiteral),
];

const BOOL_LITERALS: &[TokenKind] = &[TokenKind::TrueLiteral, TokenKind::FalseLiteral];
const INTEGER_LITERALS: &[TokenKind] = &[TokenKind::IntegerLiteral];

impl TokenKind {
    pub fn keyword(text: &str) -> Option<TokenKind> {
        KEYWORDS
            .iter()
            .find(|(word, _)| *word == text)
            .map(|(_, kind)| *kind)
    }

    /// Source spelling of keywords and punctuation.
    pub fn spelling(self) -> Option<&'static str> {
        KEYWORDS
            .iter()
            .chain(SYMBOLS.iter())
            .find(|(_, kind)| *kind == self)
            .map(|(text, _)| *text)
    }

    pub fn is_keyword(self) -> bool {
        KEYWORDS.iter().any(|(_, kind)| *kind == self)
    }

    pub fn is_fundamental(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            CharType
                | WCharType
                | BoolType
                | ByteType
                | SizeTType
                | HashTType
                | UInt8Type
                | UInt16Type
                | UInt32Type
                | UInt64Type
                | Int8Type
                | Int16Type
                | Int32Type
                | Int64Type
                | SingleFloatingType
                | DoubleFloatingType
        )
    }

    pub fn is_compound(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            StringType
                | WStringType
                | Vec2FType
                | Vec2DType
                | Vec2SType
                | Vec2UType
                | Vec3FType
                | Vec3DType
                | Vec3SType
                | Vec3UType
                | Vec4FType
                | Vec4DType
                | Vec4SType
                | Vec4UType
                | Mat2x2FType
                | Mat3x3FType
                | Mat4x4FType
                | Rect2FType
                | Rect2DType
                | Rect2SType
                | Rect2UType
        )
    }

    pub fn is_templated(self) -> bool {
        matches!(self, TokenKind::ArrayType | TokenKind::PtrArrayType)
    }

    pub fn is_builtin_type(self) -> bool {
        self.is_fundamental() || self.is_compound() || self.is_templated()
    }

    /// Anything that may start a property declaration.
    pub fn is_type(self) -> bool {
        self == TokenKind::Identifier || self.is_builtin_type()
    }

    pub fn is_integer_type(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            ByteType
                | SizeTType
                | HashTType
                | UInt8Type
                | UInt16Type
                | UInt32Type
                | UInt64Type
                | Int8Type
                | Int16Type
                | Int32Type
                | Int64Type
        )
    }

    /// Types accepted by the numeric bound attributes.
    pub fn is_bounded_numeric(self) -> bool {
        self != TokenKind::HashTType
            && (self.is_integer_type()
                || matches!(self, TokenKind::SingleFloatingType | TokenKind::DoubleFloatingType))
    }

    pub fn is_attribute(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            ReadOnly
                | WriteOnly
                | ReadCallback
                | WriteCallback
                | Virtual
                | Min
                | Max
                | Transient
                | DisplayName
                | FlagMask
        )
    }

    pub fn is_literal(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            CharLiteral
                | WCharLiteral
                | StringLiteral
                | WStringLiteral
                | IntegerLiteral
                | SingleFloatingLiteral
                | DoubleFloatingLiteral
                | TrueLiteral
                | FalseLiteral
        )
    }

    pub fn is_bool_literal(self) -> bool {
        BOOL_LITERALS.contains(&self)
    }

    /// Scalar types that may be given a literal default value.
    pub fn is_assignable(self) -> bool {
        self.is_fundamental() || matches!(self, TokenKind::StringType | TokenKind::WStringType)
    }

    /// Literal kinds compatible with a value of this type. Empty for
    /// types that can't hold a literal.
    pub fn literals_of(self) -> &'static [TokenKind] {
        use TokenKind::*;
        match self {
            BoolType => BOOL_LITERALS,
            _ if self.is_integer_type() => INTEGER_LITERALS,
            SingleFloatingType => &[SingleFloatingLiteral],
            DoubleFloatingType => &[DoubleFloatingLiteral],
            CharType => &[CharLiteral],
            WCharType => &[WCharLiteral],
            StringType => &[StringLiteral],
            WStringType => &[WStringLiteral],
            _ => &[],
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.spelling() {
            Some(text) => f.write_str(text),
            None => write!(f, "{self:?}"),
        }
    }
}

/// Where a token was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOrigin {
    /// Path relative to the input directory, e.g. `core/math/Vec.epi`.
    pub rel_path: String,
    /// Path relative to the owning module, prefixed with the module name.
    pub module_path: String,
}

impl SourceOrigin {
    pub fn new(rel_path: impl Into<String>, module_path: impl Into<String>) -> Self {
        Self {
            rel_path: rel_path.into(),
            module_path: module_path.into(),
        }
    }
}

/// Decoded value of a literal token.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Integer(i128),
    Float(f64),
    Char(char),
    String(String),
}

impl Literal {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Integer(value) => Some(*value as f64),
            Literal::Float(value) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Verbatim source text, quotes and suffixes included.
    pub text: String,
    pub line: usize,
    pub column: usize,
    pub origin: Option<Arc<SourceOrigin>>,
}

impl Token {
    pub fn new(
        kind: TokenKind,
        text: impl Into<String>,
        line: usize,
        column: usize,
        origin: Option<Arc<SourceOrigin>>,
    ) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            column,
            origin,
        }
    }

    /// A token that doesn't come from any source file.
    pub fn synthetic(kind: TokenKind, text: impl Into<String>) -> Self {
        Self::new(kind, text, 0, 0, None)
    }

    pub fn module_path(&self) -> &str {
        self.origin
            .as_deref()
            .map(|origin| origin.module_path.as_str())
            .unwrap_or("<unknown>")
    }

    pub fn is_keyword(&self) -> bool {
        self.kind.is_keyword()
    }

    /// Whether the identifier can name a declaration (no `::` path).
    pub fn is_declaration_identifier(&self) -> bool {
        self.kind == TokenKind::Identifier && !self.text.contains("::")
    }

    /// Decodes the value of a literal token.
    pub fn value(&self) -> Option<Literal> {
        match self.kind {
            TokenKind::TrueLiteral => Some(Literal::Bool(true)),
            TokenKind::FalseLiteral => Some(Literal::Bool(false)),
            TokenKind::IntegerLiteral => self.text.parse().ok().map(Literal::Integer),
            TokenKind::DoubleFloatingLiteral => self.text.parse().ok().map(Literal::Float),
            TokenKind::SingleFloatingLiteral => self
                .text
                .strip_suffix('f')
                .and_then(|text| text.parse().ok())
                .map(Literal::Float),
            TokenKind::CharLiteral | TokenKind::WCharLiteral => {
                unescape(quoted_body(&self.text, '\'')?).chars().next().map(Literal::Char)
            }
            TokenKind::StringLiteral | TokenKind::WStringLiteral => {
                Some(Literal::String(unescape(quoted_body(&self.text, '"')?)))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}(l:{:4}, c:{:4})]: \"{}\" ({:?})",
            self.module_path(),
            self.line,
            self.column,
            self.text,
            self.kind
        )
    }
}

fn quoted_body(text: &str, quote: char) -> Option<&str> {
    text.strip_prefix('L')
        .unwrap_or(text)
        .strip_prefix(quote)?
        .strip_suffix(quote)
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_table_has_no_duplicates() {
        for (i, (word, kind)) in KEYWORDS.iter().enumerate() {
            for (other_word, other_kind) in &KEYWORDS[i + 1..] {
                assert_ne!(word, other_word);
                assert_ne!(kind, other_kind);
            }
        }
    }

    #[test]
    fn every_assignable_type_has_a_literal_family() {
        for (_, kind) in KEYWORDS {
            assert_eq!(kind.is_assignable(), !kind.literals_of().is_empty(), "{kind:?}");
        }
    }

    #[test]
    fn decodes_literal_values() {
        let float = Token::synthetic(TokenKind::SingleFloatingLiteral, "4.5f");
        assert_eq!(float.value(), Some(Literal::Float(4.5)));

        let negative = Token::synthetic(TokenKind::IntegerLiteral, "-12");
        assert_eq!(negative.value(), Some(Literal::Integer(-12)));

        let wide = Token::synthetic(TokenKind::WStringLiteral, "L\"a\\\"b\"");
        assert_eq!(wide.value(), Some(Literal::String("a\"b".to_string())));

        let ch = Token::synthetic(TokenKind::CharLiteral, "'\\n'");
        assert_eq!(ch.value(), Some(Literal::Char('\n')));

        let ident = Token::synthetic(TokenKind::Identifier, "Name");
        assert_eq!(ident.value(), None);
    }

    #[test]
    fn hash_type_is_not_bounded() {
        assert!(TokenKind::ByteType.is_bounded_numeric());
        assert!(TokenKind::SizeTType.is_bounded_numeric());
        assert!(TokenKind::DoubleFloatingType.is_bounded_numeric());
        assert!(!TokenKind::HashTType.is_bounded_numeric());
        assert!(!TokenKind::BoolType.is_bounded_numeric());
    }
}
