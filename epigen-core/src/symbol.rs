//! In-memory model of declared classes, enums, properties and entries.

use indexmap::IndexMap;

use crate::attr::{Attribute, AttributeKind};
use crate::token::{Literal, Token, TokenKind};

/// Top-level symbols keyed by name, in declaration order.
pub type Registry = IndexMap<String, Symbol>;

/// CRC32 of a symbol name, used as its generated type or property id.
pub fn name_hash(name: &str) -> u32 {
    crc32fast::hash(name.as_bytes())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Property,
    Class,
    Enum,
    EnumEntry,
}

/// Anything attributes can be attached to.
pub trait Attributed {
    fn kind(&self) -> SymbolKind;
    fn token(&self) -> &Token;
    fn attrs(&self) -> &[Attribute];
    fn attrs_mut(&mut self) -> &mut Vec<Attribute>;

    fn as_property(&self) -> Option<&Property> {
        None
    }

    fn as_property_mut(&mut self) -> Option<&mut Property> {
        None
    }

    fn as_enum(&self) -> Option<&Enum> {
        None
    }

    fn name(&self) -> &str {
        &self.token().text
    }

    fn attr(&self, kind: AttributeKind) -> Option<&Attribute> {
        self.attrs().iter().find(|attr| attr.kind == kind)
    }

    fn has_attr(&self, kind: AttributeKind) -> bool {
        self.attr(kind).is_some()
    }
}

macro_rules! impl_attributed {
    ($kind:expr) => {
        fn kind(&self) -> SymbolKind {
            $kind
        }

        fn token(&self) -> &Token {
            &self.token
        }

        fn attrs(&self) -> &[Attribute] {
            &self.attrs
        }

        fn attrs_mut(&mut self) -> &mut Vec<Attribute> {
            &mut self.attrs
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyForm {
    Plain,
    Pointer,
    Template,
}

/// What a user type name resolved to during linking.
///
/// Stores qualified names rather than references; the registry stays the
/// single owner of every symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Class(String),
    Enum(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub token: Token,
    pub declared_type: Token,
    pub form: PropertyForm,
    pub nested_type_args: Vec<Token>,
    pub value: Option<Token>,
    pub attrs: Vec<Attribute>,
    pub resolved: Option<Resolved>,
}

impl Attributed for Property {
    impl_attributed!(SymbolKind::Property);

    fn as_property(&self) -> Option<&Property> {
        Some(self)
    }

    fn as_property_mut(&mut self) -> Option<&mut Property> {
        Some(self)
    }
}

impl Property {
    pub fn new(token: Token, declared_type: Token, form: PropertyForm) -> Self {
        Self {
            token,
            declared_type,
            form,
            nested_type_args: Vec::new(),
            value: None,
            attrs: Vec::new(),
            resolved: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.token.text
    }

    pub fn type_base(&self) -> &str {
        &self.declared_type.text
    }

    /// Full type spelling, e.g. `epiArray<epiFloat>` or `Node*`.
    pub fn type_name(&self) -> String {
        let mut name = self.declared_type.text.clone();
        if !self.nested_type_args.is_empty() {
            let args: Vec<&str> = self.nested_type_args.iter().map(|t| t.text.as_str()).collect();
            name = format!("{name}<{}>", args.join(","));
        }
        if self.form == PropertyForm::Pointer {
            name.push('*');
        }
        name
    }

    pub fn is_fundamental(&self) -> bool {
        self.declared_type.kind.is_fundamental()
    }

    /// Pointers and pointer arrays may name incomplete types.
    pub fn is_polymorphic(&self) -> bool {
        self.form == PropertyForm::Pointer || self.declared_type.kind == TokenKind::PtrArrayType
    }

    pub fn is_assigned(&self) -> bool {
        self.value.is_some()
    }

    /// The value a property starts with when none was written.
    pub fn default_value(&self) -> Option<Token> {
        let kind = self.declared_type.kind;
        let (literal, text) = match kind {
            _ if self.form == PropertyForm::Pointer => (TokenKind::Identifier, "nullptr"),
            _ if self.form == PropertyForm::Template => return None,
            TokenKind::BoolType => (TokenKind::FalseLiteral, "false"),
            _ if kind.is_integer_type() => (TokenKind::IntegerLiteral, "0"),
            TokenKind::SingleFloatingType => (TokenKind::SingleFloatingLiteral, "0.0f"),
            TokenKind::DoubleFloatingType => (TokenKind::DoubleFloatingLiteral, "0.0"),
            TokenKind::CharType => (TokenKind::CharLiteral, "'\\0'"),
            TokenKind::WCharType => (TokenKind::WCharLiteral, "L'\\0'"),
            TokenKind::StringType => (TokenKind::StringLiteral, "\"\""),
            TokenKind::WStringType => (TokenKind::WStringLiteral, "L\"\""),
            _ => return None,
        };
        Some(Token::synthetic(literal, text))
    }

    /// Explicit value, falling back to the default.
    pub fn effective_value(&self) -> Option<Token> {
        self.value.clone().or_else(|| self.default_value())
    }

    pub fn value_of(&self) -> Option<Literal> {
        self.effective_value().and_then(|token| token.value())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub token: Token,
    pub attrs: Vec<Attribute>,
    pub parent: Option<Token>,
    /// Declaration order fixes the property index enumeration.
    pub properties: Vec<Property>,
    pub inner_enums: IndexMap<String, Enum>,
}

impl Attributed for Class {
    impl_attributed!(SymbolKind::Class);
}

impl Class {
    pub fn new(token: Token) -> Self {
        Self {
            token,
            attrs: Vec::new(),
            parent: None,
            properties: Vec::new(),
            inner_enums: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.token.text
    }

    pub fn parent_name(&self) -> Option<&str> {
        self.parent.as_ref().map(|token| token.text.as_str())
    }
}

/// Explicit value of an enum entry.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryValue {
    Integer(Token),
    /// Bitwise OR of references to other entries.
    Flags(Vec<Token>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumEntry {
    pub token: Token,
    pub attrs: Vec<Attribute>,
    pub value: Option<EntryValue>,
}

impl Attributed for EnumEntry {
    impl_attributed!(SymbolKind::EnumEntry);
}

impl EnumEntry {
    pub fn new(token: Token) -> Self {
        Self {
            token,
            attrs: Vec::new(),
            value: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.token.text
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enum {
    pub token: Token,
    pub attrs: Vec<Attribute>,
    pub base: Option<Token>,
    pub entries: Vec<EnumEntry>,
}

impl Attributed for Enum {
    impl_attributed!(SymbolKind::Enum);

    fn as_enum(&self) -> Option<&Enum> {
        Some(self)
    }
}

impl Enum {
    pub fn new(token: Token) -> Self {
        Self {
            token,
            attrs: Vec::new(),
            base: None,
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.token.text
    }

    pub fn entry(&self, name: &str) -> Option<&EnumEntry> {
        self.entries.iter().find(|entry| entry.name() == name)
    }

    pub fn is_flag_mask(&self) -> bool {
        self.has_attr(AttributeKind::FlagMask)
    }
}

/// A top-level declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Class(Class),
    Enum(Enum),
}

impl Symbol {
    pub fn name(&self) -> &str {
        self.token().text.as_str()
    }

    pub fn token(&self) -> &Token {
        match self {
            Symbol::Class(class) => &class.token,
            Symbol::Enum(enumeration) => &enumeration.token,
        }
    }

    pub fn as_class(&self) -> Option<&Class> {
        match self {
            Symbol::Class(class) => Some(class),
            Symbol::Enum(_) => None,
        }
    }

    pub fn view(&self) -> SymbolRef<'_> {
        match self {
            Symbol::Class(class) => SymbolRef::Class(class),
            Symbol::Enum(enumeration) => SymbolRef::Enum(enumeration),
        }
    }

    pub fn attributed_mut(&mut self) -> &mut dyn Attributed {
        match self {
            Symbol::Class(class) => class,
            Symbol::Enum(enumeration) => enumeration,
        }
    }
}

/// Borrowed view over any symbol variant, as returned by lookups.
#[derive(Debug, Clone, Copy)]
pub enum SymbolRef<'a> {
    Property(&'a Property),
    Class(&'a Class),
    Enum(&'a Enum),
    EnumEntry(&'a EnumEntry),
}

impl<'a> SymbolRef<'a> {
    pub fn token(&self) -> &'a Token {
        match self {
            SymbolRef::Property(property) => &property.token,
            SymbolRef::Class(class) => &class.token,
            SymbolRef::Enum(enumeration) => &enumeration.token,
            SymbolRef::EnumEntry(entry) => &entry.token,
        }
    }

    pub fn kind(&self) -> SymbolKind {
        match self {
            SymbolRef::Property(_) => SymbolKind::Property,
            SymbolRef::Class(_) => SymbolKind::Class,
            SymbolRef::Enum(_) => SymbolKind::Enum,
            SymbolRef::EnumEntry(_) => SymbolKind::EnumEntry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn property(kind: TokenKind, text: &str, form: PropertyForm) -> Property {
        Property::new(
            Token::synthetic(TokenKind::Identifier, "Value"),
            Token::synthetic(kind, text),
            form,
        )
    }

    #[test]
    fn spells_type_names() {
        let mut array = property(TokenKind::ArrayType, "epiArray", PropertyForm::Template);
        array
            .nested_type_args
            .push(Token::synthetic(TokenKind::SingleFloatingType, "epiFloat"));
        assert_eq!(array.type_name(), "epiArray<epiFloat>");

        let pointer = property(TokenKind::Identifier, "Node", PropertyForm::Pointer);
        assert_eq!(pointer.type_name(), "Node*");
        assert!(pointer.is_polymorphic());
    }

    #[test]
    fn falls_back_to_default_values() {
        let int = property(TokenKind::Int32Type, "epiS32", PropertyForm::Plain);
        assert_eq!(int.value_of(), Some(Literal::Integer(0)));

        let float = property(TokenKind::SingleFloatingType, "epiFloat", PropertyForm::Plain);
        assert_eq!(float.value_of(), Some(Literal::Float(0.0)));

        let user = property(TokenKind::Identifier, "Color", PropertyForm::Plain);
        assert_eq!(user.effective_value(), None);

        let mut assigned = property(TokenKind::BoolType, "epiBool", PropertyForm::Plain);
        assigned.value = Some(Token::synthetic(TokenKind::TrueLiteral, "true"));
        assert_eq!(assigned.value_of(), Some(Literal::Bool(true)));
    }

    #[test]
    fn name_hash_matches_crc32() {
        assert_eq!(name_hash("A"), 0xd3d99e8b);
    }
}
