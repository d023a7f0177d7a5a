//! Recursive-descent parser turning one file's tokens into a registry of
//! top-level symbols.
//!
//! Every grammar check goes through [`Parser::expect`]. A failed check
//! either records the diagnostic and carries on, or aborts the whole file.
//! A file that produced any diagnostic yields an empty registry.

use crate::attr::{Attribute, AttributeKind, push_attr};
use crate::diagnostic::{Diagnostic, SyntaxErrorCode};
use crate::symbol::{
    Attributed, Class, EntryValue, Enum, EnumEntry, Property, PropertyForm, Registry, Symbol,
};
use crate::token::{Token, TokenKind};

/// Parses a token stream into the symbols it declares.
pub fn parse(tokens: Vec<Token>) -> (Registry, Vec<Diagnostic>) {
    let unknown: Vec<Diagnostic> = tokens
        .iter()
        .filter(|token| token.kind == TokenKind::Unknown)
        .map(|token| Diagnostic::syntax(SyntaxErrorCode::UnknownToken, Some(token.clone()), ""))
        .collect();
    if !unknown.is_empty() {
        return (Registry::new(), unknown);
    }

    let mut parser = Parser {
        tokens,
        at: 0,
        diagnostics: Vec::new(),
    };
    let mut registry = Registry::new();
    // An abort has already been recorded as a diagnostic.
    let _ = parser.parse_file(&mut registry);
    if !parser.diagnostics.is_empty() {
        registry.clear();
    }
    (registry, parser.diagnostics)
}

/// Unwinds the parse of the current file.
struct Aborted;

type Parse<T> = Result<T, Aborted>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    Abort,
    Continue,
}

#[derive(Clone, Copy)]
enum Expect<'a> {
    Kinds(&'a [TokenKind]),
    Type,
    IntegerType,
    Attribute,
    Value,
    Any,
}

impl Expect<'_> {
    fn accepts(self, kind: TokenKind) -> bool {
        match self {
            Expect::Kinds(kinds) => kinds.contains(&kind),
            Expect::Type => kind.is_type(),
            Expect::IntegerType => kind.is_integer_type(),
            Expect::Attribute => kind.is_attribute(),
            Expect::Value => kind.is_literal() || kind == TokenKind::Identifier,
            Expect::Any => true,
        }
    }

    fn describe(self) -> String {
        match self {
            Expect::Kinds(kinds) => describe(kinds),
            Expect::Type => "A type".to_string(),
            Expect::IntegerType => "An integer type".to_string(),
            Expect::Attribute => "An attribute".to_string(),
            Expect::Value => "A literal or an identifier".to_string(),
            Expect::Any => "A token".to_string(),
        }
    }
}

fn describe(kinds: &[TokenKind]) -> String {
    let names: Vec<String> = kinds.iter().map(|kind| format!("`{kind}`")).collect();
    names.join(" or ")
}

struct Parser {
    tokens: Vec<Token>,
    at: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    fn curr(&self) -> Option<&Token> {
        self.tokens.get(self.at)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.curr().map(|token| token.kind)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.at).cloned();
        if token.is_some() {
            self.at += 1;
        }
        token
    }

    /// Consumes the current token if it is of `kind`.
    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.peek_kind() == Some(kind) {
            self.next()
        } else {
            None
        }
    }

    fn report(&mut self, code: SyntaxErrorCode, token: Option<&Token>, tip: impl Into<String>) {
        let code = match (code, token) {
            (SyntaxErrorCode::UnexpectedToken, None) => SyntaxErrorCode::UnexpectedEOF,
            (SyntaxErrorCode::UnexpectedToken, Some(token)) if token.is_keyword() => {
                SyntaxErrorCode::UnexpectedKeywordUsage
            }
            _ => code,
        };
        self.diagnostics
            .push(Diagnostic::syntax(code, token.cloned(), tip));
    }

    fn expect(
        &mut self,
        token: Option<&Token>,
        expect: Expect<'_>,
        code: SyntaxErrorCode,
        tip: &str,
        recovery: Recovery,
    ) -> Parse<bool> {
        if token.is_some_and(|token| expect.accepts(token.kind)) {
            return Ok(true);
        }
        let expected = format!("{} is expected!", expect.describe());
        let tip = if tip.is_empty() {
            expected
        } else {
            format!("{tip}. {expected}")
        };
        self.report(code, token, tip);
        match recovery {
            Recovery::Abort => Err(Aborted),
            Recovery::Continue => Ok(false),
        }
    }

    /// Consumes the next token, aborting unless `expect` accepts it.
    fn require(&mut self, expect: Expect<'_>, code: SyntaxErrorCode, tip: &str) -> Parse<Token> {
        let token = self.next();
        self.expect(token.as_ref(), expect, code, tip, Recovery::Abort)?;
        token.ok_or(Aborted)
    }

    fn check_declaration(&mut self, token: &Token, what: &str) {
        if !token.is_declaration_identifier() {
            let tip = format!("A `{what}` declaration identifier was expected");
            self.report(SyntaxErrorCode::WrongIdentifierContext, Some(token), tip);
        }
    }

    fn push_attrs(&mut self, target: &mut dyn Attributed, attrs: Vec<Attribute>) {
        for attr in attrs {
            if let Err(diagnostic) = push_attr(target, attr) {
                self.diagnostics.push(diagnostic);
            }
        }
    }

    fn parse_file(&mut self, registry: &mut Registry) -> Parse<()> {
        while self.curr().is_some() {
            let attrs = self.parse_attr_list()?;

            let token = self.curr().cloned();
            self.expect(
                token.as_ref(),
                Expect::Kinds(&[TokenKind::ClassType, TokenKind::EnumType]),
                SyntaxErrorCode::MissingTypeDeclaration,
                "",
                Recovery::Abort,
            )?;
            let mut symbol = match self.peek_kind() {
                Some(TokenKind::ClassType) => Symbol::Class(self.parse_class()?),
                _ => Symbol::Enum(self.parse_enum()?),
            };

            if registry.contains_key(symbol.name()) {
                let tip = format!(
                    "The symbol `{}` has already been defined in the current file!",
                    symbol.name()
                );
                self.report(SyntaxErrorCode::DuplicatingSymbol, Some(symbol.token()), tip);
            }
            self.push_attrs(symbol.attributed_mut(), attrs);
            registry.insert(symbol.name().to_string(), symbol);
        }
        Ok(())
    }

    fn parse_attr_list(&mut self) -> Parse<Vec<Attribute>> {
        let mut attrs = Vec::new();
        while self.eat(TokenKind::OpenSqBracket).is_some() {
            loop {
                attrs.push(self.parse_attr()?);
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.require(
                Expect::Kinds(&[TokenKind::CloseSqBracket]),
                SyntaxErrorCode::NoMatchingClosingBracket,
                "Attribute list should be followed by `]`",
            )?;
        }
        Ok(attrs)
    }

    fn parse_attr(&mut self) -> Parse<Attribute> {
        let token = self.require(Expect::Attribute, SyntaxErrorCode::UnexpectedToken, "")?;
        let kind = AttributeKind::from_token_kind(token.kind).ok_or(Aborted)?;
        let mut attr = Attribute::new(kind, token);

        if self.eat(TokenKind::OpenBracket).is_none() {
            return Ok(attr);
        }
        let mut has_named = false;
        while self.peek_kind() != Some(TokenKind::CloseBracket) {
            let param = self.require(Expect::Value, SyntaxErrorCode::UnexpectedToken, "")?;
            if self.eat(TokenKind::Assign).is_some() {
                let value = self.require(Expect::Value, SyntaxErrorCode::UnexpectedToken, "")?;
                attr.named.insert(param.text, value);
                has_named = true;
            } else {
                if has_named {
                    let tip = "Named parameters should come after positional parameters";
                    self.report(SyntaxErrorCode::AttributeInvalidParameters, Some(&param), tip);
                }
                attr.positional.push(param);
            }
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.require(
            Expect::Kinds(&[TokenKind::CloseBracket]),
            SyntaxErrorCode::NoMatchingClosingBracket,
            "",
        )?;
        Ok(attr)
    }

    fn parse_class(&mut self) -> Parse<Class> {
        self.next();
        let name = self.require(
            Expect::Kinds(&[TokenKind::Identifier]),
            SyntaxErrorCode::UnexpectedToken,
            "",
        )?;
        self.check_declaration(&name, "class");
        let mut class = Class::new(name);

        if self.eat(TokenKind::Colon).is_some() {
            let parent = self.require(
                Expect::Kinds(&[TokenKind::Identifier]),
                SyntaxErrorCode::UnexpectedToken,
                "",
            )?;
            class.parent = Some(parent);
        }

        self.require(
            Expect::Kinds(&[TokenKind::OpenBrace]),
            SyntaxErrorCode::NoBodyOnDeclaration,
            "",
        )?;
        self.parse_class_scope(&mut class, &[])?;
        self.require(
            Expect::Kinds(&[TokenKind::Semicolon]),
            SyntaxErrorCode::NoSemicolonOnDeclaration,
            "`class` type should be followed by `;`",
        )?;
        Ok(class)
    }

    /// Parses a `{ ... }` body after its opening brace, flattening nested
    /// scopes into `class` in declaration order.
    fn parse_class_scope(&mut self, class: &mut Class, inherited: &[Attribute]) -> Parse<()> {
        loop {
            let local = self.parse_attr_list()?;
            let merged: Vec<Attribute> = inherited.iter().cloned().chain(local).collect();

            match self.peek_kind() {
                Some(TokenKind::CloseBrace) => break,
                Some(TokenKind::OpenBrace) => {
                    self.next();
                    self.parse_class_scope(class, &merged)?;
                }
                Some(TokenKind::EnumType) => {
                    let mut inner = self.parse_enum()?;
                    self.push_attrs(&mut inner, merged);
                    if class.inner_enums.contains_key(inner.name()) {
                        let tip = format!(
                            "The symbol `{}` has already been defined in the {} `class` type!",
                            inner.name(),
                            class.name()
                        );
                        self.report(SyntaxErrorCode::DuplicatingSymbol, Some(&inner.token), tip);
                    }
                    class.inner_enums.insert(inner.name().to_string(), inner);
                }
                _ => {
                    let mut property = self.parse_property()?;
                    if property.form == PropertyForm::Pointer {
                        let transient = Attribute::implied_by(AttributeKind::Transient, &property.token);
                        let _ = push_attr(&mut property, transient);
                    }
                    self.push_attrs(&mut property, merged);
                    class.properties.push(property);
                }
            }
        }
        self.require(
            Expect::Kinds(&[TokenKind::CloseBrace]),
            SyntaxErrorCode::NoMatchingClosingBrace,
            "Expected `}`",
        )?;
        Ok(())
    }

    fn parse_property(&mut self) -> Parse<Property> {
        let type_token = self.require(Expect::Type, SyntaxErrorCode::UnexpectedToken, "")?;
        let mut form = PropertyForm::Plain;
        let mut nested = Vec::new();

        if type_token.kind.is_templated() {
            let open = self.curr().cloned();
            let has_args = self.expect(
                open.as_ref(),
                Expect::Kinds(&[TokenKind::OpenAngleBracket]),
                SyntaxErrorCode::MissingTemplateArguments,
                "",
                Recovery::Continue,
            )?;
            if has_args {
                self.next();
                form = PropertyForm::Template;

                let arg = self.curr().cloned();
                if self.expect(
                    arg.as_ref(),
                    Expect::Type,
                    SyntaxErrorCode::UnexpectedToken,
                    "",
                    Recovery::Continue,
                )? {
                    nested.extend(self.next());
                }
                let close = self.require(
                    Expect::Kinds(&[TokenKind::CloseAngleBracket]),
                    SyntaxErrorCode::NoMatchingClosingBracket,
                    "",
                )?;
                if nested.is_empty() {
                    self.report(SyntaxErrorCode::MissingTemplateArguments, Some(&close), "");
                }
            }
        }

        if let Some(star) = self.eat(TokenKind::Asterisk) {
            if form == PropertyForm::Template {
                let tip = "Pointers to template types aren't supported";
                self.report(SyntaxErrorCode::UnexpectedToken, Some(&star), tip);
            } else {
                form = PropertyForm::Pointer;
            }
            while let Some(extra) = self.eat(TokenKind::Asterisk) {
                self.report(SyntaxErrorCode::MultiDepthPointer, Some(&extra), "");
            }
        }
        if let Some(ampersand) = self.eat(TokenKind::Ampersand) {
            let tip = "References aren't supported";
            self.report(SyntaxErrorCode::UnexpectedToken, Some(&ampersand), tip);
        }

        let name = self.require(
            Expect::Kinds(&[TokenKind::Identifier]),
            SyntaxErrorCode::UnexpectedToken,
            "",
        )?;
        self.check_declaration(&name, "property");

        let mut property = Property::new(name, type_token, form);
        property.nested_type_args = nested;

        if self.eat(TokenKind::Assign).is_some() {
            let value = self.require(Expect::Any, SyntaxErrorCode::IncorrectValueAssignment, "")?;
            self.assign(&mut property, value);
        }
        self.require(
            Expect::Kinds(&[TokenKind::Semicolon]),
            SyntaxErrorCode::UnexpectedToken,
            "",
        )?;
        Ok(property)
    }

    /// Checks an explicit default value against the property's type.
    fn assign(&mut self, property: &mut Property, value: Token) {
        let tip = match property.form {
            PropertyForm::Pointer => {
                Some("Pointers are unassignable and are set with `nullptr` by default".to_string())
            }
            PropertyForm::Template => Some("Template types are unassignable".to_string()),
            PropertyForm::Plain => None,
        };
        if let Some(tip) = tip {
            self.report(SyntaxErrorCode::IncorrectValueAssignment, Some(&value), tip);
            return;
        }

        let type_kind = property.declared_type.kind;
        if value.kind == TokenKind::Identifier {
            if type_kind != TokenKind::Identifier {
                let tip = "Only user type properties can be assigned with an identifier";
                self.report(SyntaxErrorCode::IncorrectValueAssignment, Some(&value), tip);
                return;
            }
        } else if !value.kind.is_literal() {
            let tip = "The assigned value isn't a literal";
            self.report(SyntaxErrorCode::IncorrectValueAssignment, Some(&value), tip);
            return;
        } else if !type_kind.is_assignable() {
            let tip = format!("`{}` type is unassignable", property.type_base());
            self.report(SyntaxErrorCode::IncorrectValueAssignment, Some(&value), tip);
            return;
        } else if !type_kind.literals_of().contains(&value.kind) {
            let tip = format!("{} is expected!", describe(type_kind.literals_of()));
            self.report(SyntaxErrorCode::IncorrectValueLiteral, Some(&value), tip);
        }
        property.value = Some(value);
    }

    fn parse_enum(&mut self) -> Parse<Enum> {
        self.next();
        let name = self.require(
            Expect::Kinds(&[TokenKind::Identifier]),
            SyntaxErrorCode::UnexpectedToken,
            "",
        )?;
        self.check_declaration(&name, "enum");
        let mut enumeration = Enum::new(name);

        if self.eat(TokenKind::Colon).is_some() {
            let base = self.require(Expect::IntegerType, SyntaxErrorCode::UnexpectedToken, "")?;
            enumeration.base = Some(base);
        }

        self.require(
            Expect::Kinds(&[TokenKind::OpenBrace]),
            SyntaxErrorCode::NoBodyOnDeclaration,
            "",
        )?;
        self.parse_enum_scope(&mut enumeration, &[])?;
        self.require(
            Expect::Kinds(&[TokenKind::Semicolon]),
            SyntaxErrorCode::NoSemicolonOnDeclaration,
            "`enum` type should be followed by `;`",
        )?;
        Ok(enumeration)
    }

    fn parse_enum_scope(&mut self, enumeration: &mut Enum, inherited: &[Attribute]) -> Parse<()> {
        loop {
            let local = self.parse_attr_list()?;
            let merged: Vec<Attribute> = inherited.iter().cloned().chain(local).collect();

            match self.peek_kind() {
                Some(TokenKind::CloseBrace) => break,
                Some(TokenKind::OpenBrace) => {
                    self.next();
                    self.parse_enum_scope(enumeration, &merged)?;
                    self.eat(TokenKind::Comma);
                }
                _ => {
                    let mut entry = self.parse_enum_entry()?;
                    self.push_attrs(&mut entry, merged);
                    enumeration.entries.push(entry);

                    if self.eat(TokenKind::Comma).is_none() {
                        break;
                    }
                    if matches!(self.peek_kind(), None | Some(TokenKind::CloseBrace)) {
                        let next = self.curr().cloned();
                        let tip = "An entry is expected after `,`";
                        self.report(SyntaxErrorCode::UnexpectedToken, next.as_ref(), tip);
                    }
                }
            }
        }
        self.require(
            Expect::Kinds(&[TokenKind::CloseBrace]),
            SyntaxErrorCode::NoMatchingClosingBrace,
            "Expected `}`",
        )?;
        Ok(())
    }

    fn parse_enum_entry(&mut self) -> Parse<EnumEntry> {
        let name = self.require(
            Expect::Kinds(&[TokenKind::Identifier]),
            SyntaxErrorCode::UnexpectedToken,
            "",
        )?;
        self.check_declaration(&name, "enum entry");
        let mut entry = EnumEntry::new(name);
        if self.eat(TokenKind::Assign).is_some() {
            entry.value = self.parse_entry_value()?;
        }
        Ok(entry)
    }

    /// `INTEGER` or `IDENT ('|' IDENT)*`.
    fn parse_entry_value(&mut self) -> Parse<Option<EntryValue>> {
        match self.next() {
            Some(token) if token.kind == TokenKind::IntegerLiteral => {
                Ok(Some(EntryValue::Integer(token)))
            }
            Some(token) if token.kind == TokenKind::Identifier => {
                let mut operands = vec![token];
                while self.eat(TokenKind::VSlash).is_some() {
                    operands.push(self.require(
                        Expect::Kinds(&[TokenKind::Identifier]),
                        SyntaxErrorCode::UnexpectedToken,
                        "Only entries can be combined with `|`",
                    )?);
                }
                Ok(Some(EntryValue::Flags(operands)))
            }
            other => {
                let tip = "The assigned value isn't an integer literal or an entry reference";
                self.report(SyntaxErrorCode::IncorrectValueAssignment, other.as_ref(), tip);
                Ok(None)
            }
        }
    }
}
