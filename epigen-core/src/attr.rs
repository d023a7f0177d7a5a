//! Attribute semantics: conflicts, implications and per-kind validation.
//!
//! Every attribute kind has exactly one validator, selected by an
//! exhaustive match in [`validator_of`]. Implied attributes are pushed
//! best-effort and always yield to explicit ones.

use indexmap::IndexMap;

use crate::diagnostic::{Diagnostic, SyntaxErrorCode};
use crate::symbol::{Attributed, EntryValue, PropertyForm, SymbolKind};
use crate::token::{Literal, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
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

impl AttributeKind {
    pub const ALL: [AttributeKind; 10] = [
        AttributeKind::ReadOnly,
        AttributeKind::WriteOnly,
        AttributeKind::ReadCallback,
        AttributeKind::WriteCallback,
        AttributeKind::Virtual,
        AttributeKind::Min,
        AttributeKind::Max,
        AttributeKind::Transient,
        AttributeKind::DisplayName,
        AttributeKind::FlagMask,
    ];

    pub fn from_token_kind(kind: TokenKind) -> Option<Self> {
        Some(match kind {
            TokenKind::ReadOnly => AttributeKind::ReadOnly,
            TokenKind::WriteOnly => AttributeKind::WriteOnly,
            TokenKind::ReadCallback => AttributeKind::ReadCallback,
            TokenKind::WriteCallback => AttributeKind::WriteCallback,
            TokenKind::Virtual => AttributeKind::Virtual,
            TokenKind::Min => AttributeKind::Min,
            TokenKind::Max => AttributeKind::Max,
            TokenKind::Transient => AttributeKind::Transient,
            TokenKind::DisplayName => AttributeKind::DisplayName,
            TokenKind::FlagMask => AttributeKind::FlagMask,
            _ => return None,
        })
    }

    pub fn token_kind(self) -> TokenKind {
        match self {
            AttributeKind::ReadOnly => TokenKind::ReadOnly,
            AttributeKind::WriteOnly => TokenKind::WriteOnly,
            AttributeKind::ReadCallback => TokenKind::ReadCallback,
            AttributeKind::WriteCallback => TokenKind::WriteCallback,
            AttributeKind::Virtual => TokenKind::Virtual,
            AttributeKind::Min => TokenKind::Min,
            AttributeKind::Max => TokenKind::Max,
            AttributeKind::Transient => TokenKind::Transient,
            AttributeKind::DisplayName => TokenKind::DisplayName,
            AttributeKind::FlagMask => TokenKind::FlagMask,
        }
    }

    /// Kinds that can't coexist with this one. The relation is symmetric.
    pub fn conflicts(self) -> &'static [AttributeKind] {
        use AttributeKind::*;
        match self {
            ReadOnly => &[WriteOnly, WriteCallback, Min, Max],
            WriteOnly => &[ReadOnly, ReadCallback],
            ReadCallback => &[WriteOnly],
            WriteCallback => &[ReadOnly],
            Min | Max => &[ReadOnly],
            Virtual | Transient | DisplayName | FlagMask => &[],
        }
    }

    pub fn conflicts_with(self, other: AttributeKind) -> bool {
        self.conflicts().contains(&other)
    }

    /// Kinds inserted alongside this one as implied attributes.
    pub fn implies(self) -> &'static [AttributeKind] {
        match self {
            AttributeKind::Virtual => &[
                AttributeKind::Transient,
                AttributeKind::ReadCallback,
                AttributeKind::WriteCallback,
            ],
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub kind: AttributeKind,
    pub token: Token,
    pub positional: Vec<Token>,
    pub named: IndexMap<String, Token>,
    /// Inserted by another attribute rather than written by the user.
    pub implied: bool,
}

impl Attribute {
    pub fn new(kind: AttributeKind, token: Token) -> Self {
        Self {
            kind,
            token,
            positional: Vec::new(),
            named: IndexMap::new(),
            implied: false,
        }
    }

    /// An attribute injected on behalf of `origin`.
    pub fn implied_by(kind: AttributeKind, origin: &Token) -> Self {
        let token = Token {
            kind: kind.token_kind(),
            text: kind.token_kind().to_string(),
            ..origin.clone()
        };
        Self {
            implied: true,
            ..Self::new(kind, token)
        }
    }

    pub fn named_bool(&self, name: &str) -> bool {
        self.named
            .get(name)
            .is_some_and(|token| token.kind == TokenKind::TrueLiteral)
    }

    pub fn has_named(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }
}

type AttrResult = Result<(), Diagnostic>;
type Validator = fn(&Attribute, &mut dyn Attributed) -> AttrResult;

/// Validates `attr` against `target` and attaches it.
///
/// An explicit attribute replaces an implied one of the same kind and
/// evicts implied attributes it conflicts with. Implications are then
/// pushed with their errors discarded.
pub fn push_attr(target: &mut dyn Attributed, attr: Attribute) -> AttrResult {
    validate_conflicts(&attr, target)?;
    validator_of(attr.kind)(&attr, target)?;

    let kind = attr.kind;
    let origin = attr.token.clone();
    target
        .attrs_mut()
        .retain(|existing| existing.kind != kind && !kind.conflicts_with(existing.kind));
    target.attrs_mut().push(attr);

    for implied in kind.implies() {
        let _ = push_attr(target, Attribute::implied_by(*implied, &origin));
    }
    Ok(())
}

fn validator_of(kind: AttributeKind) -> Validator {
    match kind {
        AttributeKind::ReadOnly => validate_plain_property_flag,
        AttributeKind::WriteOnly => validate_plain_property_flag,
        AttributeKind::Transient => validate_plain_property_flag,
        AttributeKind::ReadCallback => validate_read_callback,
        AttributeKind::WriteCallback => validate_write_callback,
        AttributeKind::Virtual => validate_virtual,
        AttributeKind::Min => validate_min,
        AttributeKind::Max => validate_max,
        AttributeKind::DisplayName => validate_display_name,
        AttributeKind::FlagMask => validate_flag_mask,
    }
}

fn error(code: SyntaxErrorCode, token: &Token, tip: impl Into<String>) -> Diagnostic {
    Diagnostic::syntax(code, Some(token.clone()), tip)
}

fn validate_conflicts(attr: &Attribute, target: &dyn Attributed) -> AttrResult {
    for existing in target.attrs().iter().filter(|a| !a.implied) {
        if existing.kind == attr.kind {
            let tip = format!("It duplicates {:?}", existing.kind);
            return Err(error(SyntaxErrorCode::AttributeConflict, &attr.token, tip));
        }
        if attr.kind.conflicts_with(existing.kind) {
            let tip = format!("It conflicts with {:?}", existing.kind);
            return Err(error(SyntaxErrorCode::AttributeConflict, &attr.token, tip));
        }
    }
    Ok(())
}

fn validate_target(attr: &Attribute, target: &dyn Attributed, accepted: SymbolKind) -> AttrResult {
    if target.kind() == accepted {
        return Ok(());
    }
    let tip = format!("{:?} should be applied to {accepted:?}", attr.kind);
    Err(error(SyntaxErrorCode::AttributeInvalidTarget, &attr.token, tip))
}

fn validate_unassigned(attr: &Attribute, target: &dyn Attributed) -> AttrResult {
    match target.as_property() {
        Some(property) if property.is_assigned() => {
            let tip = format!("`{:?}` attribute target is unassignable", attr.kind);
            Err(error(SyntaxErrorCode::IncorrectValueAssignment, &attr.token, tip))
        }
        _ => Ok(()),
    }
}

fn validate_positional(attr: &Attribute, expected: &[&[TokenKind]]) -> AttrResult {
    if attr.positional.len() != expected.len() {
        let tip = format!(
            "Number of arguments should be {} but {} was provided",
            expected.len(),
            attr.positional.len()
        );
        return Err(error(SyntaxErrorCode::AttributeInvalidParameters, &attr.token, tip));
    }
    for (param, kinds) in attr.positional.iter().zip(expected) {
        if !kinds.contains(&param.kind) {
            let tip = format!(
                "`{}` positional parameter has a wrong type (the type should be {})",
                param.text,
                describe(kinds)
            );
            return Err(error(SyntaxErrorCode::AttributeInvalidParameters, &attr.token, tip));
        }
    }
    Ok(())
}

fn validate_named(attr: &Attribute, accepted: &[(&str, &[TokenKind])]) -> AttrResult {
    for (name, param) in &attr.named {
        let Some((_, kinds)) = accepted.iter().find(|(accepted, _)| accepted == name) else {
            let tip = format!("Invalid named parameter `{name}` was provided");
            return Err(error(SyntaxErrorCode::AttributeInvalidParameters, &attr.token, tip));
        };
        if !kinds.contains(&param.kind) {
            let tip = format!(
                "Invalid named parameter type {:?} was provided (but should be {})",
                param.kind,
                describe(kinds)
            );
            return Err(error(SyntaxErrorCode::AttributeInvalidParameters, &attr.token, tip));
        }
    }
    Ok(())
}

/// Reference-tuning parameters only make sense for non-scalar types.
fn validate_named_target_type(attr: &Attribute, target: &dyn Attributed) -> AttrResult {
    let Some(property) = target.as_property() else {
        return Ok(());
    };
    let kind = property.declared_type.kind;
    let by_reference = kind == TokenKind::Identifier || kind.is_templated() || kind.is_compound();
    if attr.named.is_empty() || by_reference {
        return Ok(());
    }
    let tip = format!(
        "Named parameters of {:?} can't be applied to a `{}` target",
        attr.kind,
        property.type_base()
    );
    Err(error(SyntaxErrorCode::AttributeInvalidParameters, &attr.token, tip))
}

fn describe(kinds: &[TokenKind]) -> String {
    let names: Vec<String> = kinds.iter().map(|kind| format!("{kind:?}")).collect();
    names.join(" or ")
}

const BOOL: &[TokenKind] = &[TokenKind::TrueLiteral, TokenKind::FalseLiteral];

fn validate_plain_property_flag(attr: &Attribute, target: &mut dyn Attributed) -> AttrResult {
    validate_target(attr, target, SymbolKind::Property)?;
    validate_positional(attr, &[])?;
    validate_named(attr, &[])
}

fn validate_read_callback(attr: &Attribute, target: &mut dyn Attributed) -> AttrResult {
    validate_target(attr, target, SymbolKind::Property)?;
    validate_positional(attr, &[])?;
    validate_named(attr, &[("SuppressRef", BOOL)])?;
    validate_named_target_type(attr, target)
}

fn validate_write_callback(attr: &Attribute, target: &mut dyn Attributed) -> AttrResult {
    validate_target(attr, target, SymbolKind::Property)?;
    validate_unassigned(attr, target)?;
    validate_positional(attr, &[])?;
    validate_named(attr, &[("SuppressRef", BOOL), ("RValueRef", BOOL)])?;
    validate_named_target_type(attr, target)
}

fn validate_virtual(attr: &Attribute, target: &mut dyn Attributed) -> AttrResult {
    validate_target(attr, target, SymbolKind::Property)?;
    validate_unassigned(attr, target)?;
    validate_positional(attr, &[])?;
    validate_named(attr, &[])
}

fn validate_display_name(attr: &Attribute, _target: &mut dyn Attributed) -> AttrResult {
    validate_positional(attr, &[&[TokenKind::StringLiteral]])?;
    validate_named(attr, &[])
}

fn validate_flag_mask(attr: &Attribute, target: &mut dyn Attributed) -> AttrResult {
    validate_target(attr, target, SymbolKind::Enum)?;
    validate_positional(attr, &[])?;
    validate_named(attr, &[])?;

    let Some(enumeration) = target.as_enum() else {
        return Ok(());
    };
    for entry in &enumeration.entries {
        if let Some(EntryValue::Integer(token)) = &entry.value {
            let tip = "Flags can be assigned only with identifiers";
            return Err(error(SyntaxErrorCode::IncorrectValueLiteral, token, tip));
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Bound {
    Lower,
    Upper,
}

fn validate_min(attr: &Attribute, target: &mut dyn Attributed) -> AttrResult {
    validate_bound(attr, target, Bound::Lower)
}

fn validate_max(attr: &Attribute, target: &mut dyn Attributed) -> AttrResult {
    validate_bound(attr, target, Bound::Upper)
}

/// Shared checks of `Min` and `Max`. With `Force=true` a violating value
/// is clamped to the bound instead of being reported.
fn validate_bound(attr: &Attribute, target: &mut dyn Attributed, bound: Bound) -> AttrResult {
    validate_target(attr, target, SymbolKind::Property)?;
    let Some(property) = target.as_property_mut() else {
        return Ok(());
    };

    let type_kind = property.declared_type.kind;
    if !type_kind.is_bounded_numeric() {
        let tip = format!(
            "{:?} should be applied to an integer or floating point type, not `{}`",
            attr.kind,
            property.type_base()
        );
        return Err(error(SyntaxErrorCode::AttributeInvalidTarget, &attr.token, tip));
    }
    if property.form != PropertyForm::Plain {
        let tip = format!("{:?} can't be applied to a pointer or template", attr.kind);
        return Err(error(SyntaxErrorCode::AttributeInvalidTarget, &attr.token, tip));
    }
    validate_positional(attr, &[type_kind.literals_of()])?;
    validate_named(attr, &[("Force", BOOL)])?;

    let limit_token = &attr.positional[0];
    let (Some(limit), Some(value)) = (
        limit_token.value().as_ref().and_then(Literal::as_f64),
        property.value_of().as_ref().and_then(Literal::as_f64),
    ) else {
        return Ok(());
    };

    let violated = match bound {
        Bound::Lower => value < limit,
        Bound::Upper => value > limit,
    };
    if !violated {
        return Ok(());
    }
    if attr.named_bool("Force") {
        property.value = Some(limit_token.clone());
        return Ok(());
    }

    let relation = if bound == Bound::Lower { ">=" } else { "<=" };
    let tip = format!(
        "{:?} restricts the value of `{}` to be {relation} {}",
        attr.kind,
        property.name(),
        limit_token.text
    );
    Err(error(SyntaxErrorCode::IncorrectValueAssignment, &property.token, tip))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Enum, EnumEntry, Property};
    use pretty_assertions::assert_eq;

    fn ident(text: &str) -> Token {
        Token::synthetic(TokenKind::Identifier, text)
    }

    fn attr(kind: AttributeKind) -> Attribute {
        Attribute::new(kind, Token::synthetic(kind.token_kind(), kind.token_kind().to_string()))
    }

    fn int_property(value: Option<&str>) -> Property {
        let mut property = Property::new(
            ident("Value"),
            Token::synthetic(TokenKind::Int32Type, "epiS32"),
            PropertyForm::Plain,
        );
        property.value = value.map(|text| Token::synthetic(TokenKind::IntegerLiteral, text));
        property
    }

    fn kinds(target: &dyn Attributed) -> Vec<(AttributeKind, bool)> {
        target.attrs().iter().map(|a| (a.kind, a.implied)).collect()
    }

    fn code(result: AttrResult) -> SyntaxErrorCode {
        match result.expect_err("attribute should be rejected").kind {
            crate::diagnostic::DiagnosticKind::Syntax(code) => code,
            other => panic!("unexpected diagnostic kind {other:?}"),
        }
    }

    #[test]
    fn conflict_table_is_symmetric() {
        for kind in AttributeKind::ALL {
            for other in kind.conflicts() {
                assert!(other.conflicts_with(kind), "{kind:?} / {other:?}");
            }
        }
    }

    #[test]
    fn virtual_implies_transient_and_callbacks() {
        let mut property = int_property(None);
        push_attr(&mut property, attr(AttributeKind::Virtual)).expect("virtual");
        assert_eq!(
            kinds(&property),
            vec![
                (AttributeKind::Virtual, false),
                (AttributeKind::Transient, true),
                (AttributeKind::ReadCallback, true),
                (AttributeKind::WriteCallback, true),
            ]
        );
    }

    #[test]
    fn explicit_attribute_replaces_implied_duplicate() {
        let mut property = Property::new(
            ident("Items"),
            Token::synthetic(TokenKind::StringType, "epiString"),
            PropertyForm::Plain,
        );
        push_attr(&mut property, attr(AttributeKind::Virtual)).expect("virtual");

        let mut read = attr(AttributeKind::ReadCallback);
        read.named
            .insert("SuppressRef".into(), Token::synthetic(TokenKind::TrueLiteral, "true"));
        push_attr(&mut property, read).expect("explicit read callback");

        let callback = property.attr(AttributeKind::ReadCallback).expect("read callback");
        assert!(!callback.implied);
        assert!(callback.named_bool("SuppressRef"));
        assert_eq!(
            property
                .attrs
                .iter()
                .filter(|a| a.kind == AttributeKind::ReadCallback)
                .count(),
            1
        );
    }

    #[test]
    fn explicit_attribute_evicts_implied_conflict() {
        let mut property = int_property(None);
        push_attr(&mut property, attr(AttributeKind::Virtual)).expect("virtual");
        push_attr(&mut property, attr(AttributeKind::ReadOnly)).expect("read only");
        assert!(property.attr(AttributeKind::WriteCallback).is_none());
        assert!(property.attr(AttributeKind::ReadOnly).is_some());
    }

    #[test]
    fn implied_attribute_yields_to_explicit_conflict() {
        let mut property = int_property(None);
        push_attr(&mut property, attr(AttributeKind::ReadOnly)).expect("read only");
        push_attr(&mut property, attr(AttributeKind::Virtual)).expect("virtual");
        assert!(property.attr(AttributeKind::WriteCallback).is_none());
        assert!(property.attr(AttributeKind::ReadCallback).is_some());
    }

    #[test]
    fn rejects_explicit_duplicates_and_conflicts() {
        let mut property = int_property(None);
        push_attr(&mut property, attr(AttributeKind::ReadOnly)).expect("read only");
        assert_eq!(
            code(push_attr(&mut property, attr(AttributeKind::ReadOnly))),
            SyntaxErrorCode::AttributeConflict
        );
        assert_eq!(
            code(push_attr(&mut property, attr(AttributeKind::WriteOnly))),
            SyntaxErrorCode::AttributeConflict
        );
    }

    #[test]
    fn callbacks_reject_assigned_targets() {
        let mut property = int_property(Some("3"));
        assert_eq!(
            code(push_attr(&mut property, attr(AttributeKind::WriteCallback))),
            SyntaxErrorCode::IncorrectValueAssignment
        );
        push_attr(&mut property, attr(AttributeKind::ReadCallback)).expect("read callback");
    }

    #[test]
    fn suppress_ref_requires_reference_type() {
        let mut property = int_property(None);
        let mut read = attr(AttributeKind::ReadCallback);
        read.named
            .insert("SuppressRef".into(), Token::synthetic(TokenKind::TrueLiteral, "true"));
        assert_eq!(
            code(push_attr(&mut property, read)),
            SyntaxErrorCode::AttributeInvalidParameters
        );
    }

    #[test]
    fn min_checks_value_and_parameters() {
        let mut min = attr(AttributeKind::Min);
        min.positional.push(Token::synthetic(TokenKind::IntegerLiteral, "5"));

        let mut below = int_property(Some("3"));
        assert_eq!(
            code(push_attr(&mut below, min.clone())),
            SyntaxErrorCode::IncorrectValueAssignment
        );

        let mut above = int_property(Some("7"));
        push_attr(&mut above, min.clone()).expect("value within bound");

        let mut float_min = attr(AttributeKind::Min);
        float_min
            .positional
            .push(Token::synthetic(TokenKind::DoubleFloatingLiteral, "1.0"));
        assert_eq!(
            code(push_attr(&mut int_property(Some("7")), float_min)),
            SyntaxErrorCode::AttributeInvalidParameters
        );
    }

    #[test]
    fn forced_bound_clamps_default_value() {
        let mut max = attr(AttributeKind::Max);
        max.positional.push(Token::synthetic(TokenKind::IntegerLiteral, "-2"));
        max.named
            .insert("Force".into(), Token::synthetic(TokenKind::TrueLiteral, "true"));

        let mut property = int_property(None);
        push_attr(&mut property, max).expect("forced max");
        assert_eq!(property.value_of(), Some(Literal::Integer(-2)));
    }

    #[test]
    fn bounds_reject_hash_and_read_only() {
        let mut min = attr(AttributeKind::Min);
        min.positional.push(Token::synthetic(TokenKind::IntegerLiteral, "0"));

        let mut hash = Property::new(
            ident("Id"),
            Token::synthetic(TokenKind::HashTType, "epiHash_t"),
            PropertyForm::Plain,
        );
        assert_eq!(
            code(push_attr(&mut hash, min.clone())),
            SyntaxErrorCode::AttributeInvalidTarget
        );

        let mut read_only = int_property(None);
        push_attr(&mut read_only, attr(AttributeKind::ReadOnly)).expect("read only");
        assert_eq!(
            code(push_attr(&mut read_only, min)),
            SyntaxErrorCode::AttributeConflict
        );
    }

    #[test]
    fn flag_mask_targets_enums_with_identifier_values() {
        let mut property = int_property(None);
        assert_eq!(
            code(push_attr(&mut property, attr(AttributeKind::FlagMask))),
            SyntaxErrorCode::AttributeInvalidTarget
        );

        let mut flags = Enum::new(ident("Flags"));
        flags.entries.push(EnumEntry::new(ident("A")));
        let mut combined = EnumEntry::new(ident("B"));
        combined.value = Some(EntryValue::Flags(vec![ident("A")]));
        flags.entries.push(combined);
        push_attr(&mut flags, attr(AttributeKind::FlagMask)).expect("flag mask");

        let mut numbered = Enum::new(ident("Numbered"));
        let mut entry = EnumEntry::new(ident("A"));
        entry.value = Some(EntryValue::Integer(Token::synthetic(TokenKind::IntegerLiteral, "1")));
        numbered.entries.push(entry);
        assert_eq!(
            code(push_attr(&mut numbered, attr(AttributeKind::FlagMask))),
            SyntaxErrorCode::IncorrectValueLiteral
        );
    }

    #[test]
    fn display_name_takes_one_string() {
        let mut named = attr(AttributeKind::DisplayName);
        named
            .positional
            .push(Token::synthetic(TokenKind::StringLiteral, "\"Pretty\""));
        push_attr(&mut Enum::new(ident("E")), named).expect("display name");

        assert_eq!(
            code(push_attr(&mut Enum::new(ident("E")), attr(AttributeKind::DisplayName))),
            SyntaxErrorCode::AttributeInvalidParameters
        );
    }
}
