//! Cross-file registration, symbol lookup and reference validation.

use std::collections::HashSet;

use crate::diagnostic::{Diagnostic, LinkerErrorCode};
use crate::inheritance;
use crate::symbol::{
    Class, EntryValue, Enum, Property, Registry, Resolved, Symbol, SymbolRef, name_hash,
};
use crate::token::{Token, TokenKind};

/// Global symbol table assembled from per-file registries.
#[derive(Debug, Default)]
pub struct Linker {
    registry: Registry,
    diagnostics: Vec<Diagnostic>,
}

impl Linker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn into_registry(self) -> Registry {
        self.registry
    }

    /// Validates `batch` against itself and the symbols registered so far.
    /// The batch is merged only when no name or hash clashes.
    pub fn register(&mut self, batch: Registry) -> bool {
        let before = self.diagnostics.len();

        let symbols: Vec<&Symbol> = batch.values().collect();
        for (index, symbol) in symbols.iter().enumerate() {
            for earlier in &symbols[..index] {
                self.diagnostics.extend(clash(symbol.token(), earlier.token()));
            }
        }
        for symbol in &symbols {
            for existing in self.registry.values() {
                self.diagnostics.extend(clash(symbol.token(), existing.token()));
            }
        }

        let valid = self.diagnostics.len() == before;
        if valid {
            self.registry.extend(batch);
        }
        valid
    }

    pub fn lookup<'a>(&'a self, reference: &str, outer: Option<SymbolRef<'a>>) -> Option<SymbolRef<'a>> {
        lookup(&self.registry, reference, outer)
    }

    /// Resolves and validates every reference of the registered symbols.
    ///
    /// Registration problems are returned as-is without linking.
    pub fn link(&mut self) -> Vec<Diagnostic> {
        if !self.diagnostics.is_empty() {
            return std::mem::take(&mut self.diagnostics);
        }

        let mut diagnostics = inheritance::validate(&self.registry);
        let mut resolutions = Vec::new();
        for symbol in self.registry.values() {
            match symbol {
                Symbol::Class(class) => {
                    check_class(&self.registry, class, &mut diagnostics, &mut resolutions);
                    for inner in class.inner_enums.values() {
                        check_enum(&self.registry, inner, Some(class), &mut diagnostics);
                    }
                }
                Symbol::Enum(enumeration) => {
                    check_enum(&self.registry, enumeration, None, &mut diagnostics);
                }
            }
        }

        for (class, index, resolved) in resolutions {
            if let Some(Symbol::Class(class)) = self.registry.get_mut(&class) {
                if let Some(property) = class.properties.get_mut(index) {
                    property.resolved = Some(resolved);
                }
            }
        }
        diagnostics
    }
}

/// Name or CRC32 clash of `token` with the earlier declared `other`.
pub(crate) fn clash(token: &Token, other: &Token) -> Option<Diagnostic> {
    if token.text == other.text {
        let tip = format!("The symbol has already been defined in `{}`", other.module_path());
        Some(Diagnostic::linker(LinkerErrorCode::DuplicatingSymbol, token, tip))
    } else if name_hash(&token.text) == name_hash(&other.text) {
        let tip = format!(
            "Hash collision with `{}` defined in `{}`",
            other.text,
            other.module_path()
        );
        Some(Diagnostic::linker(LinkerErrorCode::HashCollision, token, tip))
    } else {
        None
    }
}

/// Resolves a possibly qualified `reference`.
///
/// The first segment is searched in `outer` (a class's inner enums,
/// ancestors included, or an enum's entries) and then in the registry.
/// Further segments descend into class inner enums; an enum entry may
/// only be the last segment.
pub fn lookup<'a>(
    registry: &'a Registry,
    reference: &str,
    outer: Option<SymbolRef<'a>>,
) -> Option<SymbolRef<'a>> {
    let mut path = reference.split("::");
    let head = path.next()?;

    let scoped = match outer {
        Some(SymbolRef::Class(class)) => inner_enum(registry, class, head).map(SymbolRef::Enum),
        Some(SymbolRef::Enum(enumeration)) => enumeration.entry(head).map(SymbolRef::EnumEntry),
        _ => None,
    };
    let mut found = scoped.or_else(|| registry.get(head).map(Symbol::view))?;

    let rest: Vec<&str> = path.collect();
    for (index, segment) in rest.iter().enumerate() {
        found = match found {
            SymbolRef::Enum(enumeration) if index + 1 == rest.len() => {
                SymbolRef::EnumEntry(enumeration.entry(segment)?)
            }
            SymbolRef::Class(class) => SymbolRef::Enum(class.inner_enums.get(*segment)?),
            _ => return None,
        };
    }
    Some(found)
}

fn inner_enum<'a>(registry: &'a Registry, class: &'a Class, name: &str) -> Option<&'a Enum> {
    let mut visited = HashSet::new();
    let mut current = Some(class);
    while let Some(class) = current {
        if !visited.insert(class.name()) {
            break;
        }
        if let Some(inner) = class.inner_enums.get(name) {
            return Some(inner);
        }
        current = class
            .parent_name()
            .and_then(|parent| registry.get(parent))
            .and_then(Symbol::as_class);
    }
    None
}

fn check_class(
    registry: &Registry,
    class: &Class,
    diagnostics: &mut Vec<Diagnostic>,
    resolutions: &mut Vec<(String, usize, Resolved)>,
) {
    let outer = Some(SymbolRef::Class(class));
    for (index, property) in class.properties.iter().enumerate() {
        if property.declared_type.kind == TokenKind::Identifier {
            let type_name = property.type_base();
            if type_name == class.name() && !property.is_polymorphic() {
                let tip = format!("The symbol should be a complete type, but not: `{type_name}`");
                diagnostics.push(Diagnostic::linker(
                    LinkerErrorCode::IncompleteTypeUsage,
                    &property.token,
                    tip,
                ));
            }

            let resolved = match lookup(registry, type_name, outer) {
                Some(SymbolRef::Class(target)) => {
                    check_class_default(property, diagnostics);
                    Some(Resolved::Class(target.name().to_string()))
                }
                Some(SymbolRef::Enum(target)) => {
                    check_enum_default(registry, class, property, target, diagnostics);
                    Some(Resolved::Enum(target.name().to_string()))
                }
                Some(_) => {
                    let tip = format!("`{type_name}` is not a type");
                    diagnostics.push(Diagnostic::linker(
                        LinkerErrorCode::NoSuchSymbol,
                        &property.token,
                        tip,
                    ));
                    None
                }
                None => {
                    let tip = format!("No such symbol exists: `{type_name}`");
                    diagnostics.push(Diagnostic::linker(
                        LinkerErrorCode::NoSuchSymbol,
                        &property.token,
                        tip,
                    ));
                    None
                }
            };
            if let Some(resolved) = resolved {
                resolutions.push((class.name().to_string(), index, resolved));
            }
        }

        for arg in property
            .nested_type_args
            .iter()
            .filter(|arg| arg.kind == TokenKind::Identifier)
        {
            if arg.text == class.name() && !property.is_polymorphic() {
                let tip = format!(
                    "Template argument symbol should be a complete type, but not: `{}`",
                    arg.text
                );
                diagnostics.push(Diagnostic::linker(
                    LinkerErrorCode::IncompleteTypeUsage,
                    &property.token,
                    tip,
                ));
                continue;
            }
            match lookup(registry, &arg.text, outer) {
                None => {
                    let tip = format!("Template argument symbol doesn't exist: `{}`", arg.text);
                    diagnostics.push(Diagnostic::linker(
                        LinkerErrorCode::NoSuchSymbol,
                        &property.token,
                        tip,
                    ));
                }
                Some(SymbolRef::EnumEntry(entry)) => {
                    let tip = format!("Template argument should be a type: `{}`", entry.name());
                    diagnostics.push(Diagnostic::linker(
                        LinkerErrorCode::BadTemplateArgument,
                        &property.token,
                        tip,
                    ));
                }
                Some(_) => {}
            }
        }
    }
}

fn check_class_default(property: &Property, diagnostics: &mut Vec<Diagnostic>) {
    if let Some(value) = &property.value {
        let tip = format!(
            "Couldn't assign `{}` to `{}` type",
            value.text,
            property.type_base()
        );
        diagnostics.push(Diagnostic::linker(
            LinkerErrorCode::IncorrectValueAssignment,
            &property.token,
            tip,
        ));
    }
}

/// An enum-typed property may default to one of that enum's entries.
fn check_enum_default(
    registry: &Registry,
    class: &Class,
    property: &Property,
    target: &Enum,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(value) = &property.value else {
        return;
    };
    let found = lookup(registry, &value.text, Some(SymbolRef::Enum(target)))
        .or_else(|| lookup(registry, &value.text, Some(SymbolRef::Class(class))));

    match found {
        Some(SymbolRef::EnumEntry(entry))
            if target.entries.iter().any(|candidate| std::ptr::eq(candidate, entry)) => {}
        Some(_) => {
            let tip = format!(
                "Couldn't assign `{}` to `{}` type",
                value.text,
                property.type_base()
            );
            diagnostics.push(Diagnostic::linker(
                LinkerErrorCode::IncorrectValueAssignment,
                &property.token,
                tip,
            ));
        }
        None => {
            let tip = format!("No such symbol exists: `{}`", value.text);
            diagnostics.push(Diagnostic::linker(
                LinkerErrorCode::NoSuchSymbol,
                &property.token,
                tip,
            ));
        }
    }
}

fn check_enum(
    registry: &Registry,
    enumeration: &Enum,
    owner: Option<&Class>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let entries = &enumeration.entries;
    for (index, entry) in entries.iter().enumerate() {
        if let Some(earlier) = entries[..index].iter().find(|e| e.name() == entry.name()) {
            let tip = format!(
                "The symbol has already been defined in `{}`",
                earlier.token.module_path()
            );
            diagnostics.push(Diagnostic::linker(
                LinkerErrorCode::DuplicatingSymbol,
                &entry.token,
                tip,
            ));
        }
    }

    for (index, entry) in entries.iter().enumerate() {
        let Some(EntryValue::Flags(operands)) = &entry.value else {
            continue;
        };
        for operand in operands {
            let found = lookup(registry, &operand.text, Some(SymbolRef::Enum(enumeration))).or_else(
                || owner.and_then(|class| lookup(registry, &operand.text, Some(SymbolRef::Class(class)))),
            );
            let problem = match found {
                None => Some(LinkerErrorCode::NoSuchSymbol),
                Some(SymbolRef::EnumEntry(target)) => entries
                    .iter()
                    .position(|candidate| std::ptr::eq(candidate, target))
                    .filter(|position| *position >= index)
                    .map(|_| LinkerErrorCode::NoSuchSymbol),
                Some(_) => Some(LinkerErrorCode::IncorrectValueAssignment),
            };
            let tip = match problem {
                None => continue,
                Some(LinkerErrorCode::IncorrectValueAssignment) => {
                    format!("Couldn't assign `{}` to the `enum` type", operand.text)
                }
                Some(_) => format!("No such symbol exists: `{}`", operand.text),
            };
            if let Some(code) = problem {
                diagnostics.push(Diagnostic::linker(code, &entry.token, tip));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticKind;
    use crate::lexer::tokenize;
    use crate::parser::parse;
    use crate::token::SourceOrigin;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn batch(source: &str, module: &str) -> Registry {
        let path = format!("{module}.epi");
        let origin = Arc::new(SourceOrigin::new(path.clone(), path));
        let (registry, diagnostics) = parse(tokenize(source, Some(origin)));
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        registry
    }

    fn codes(diagnostics: &[Diagnostic]) -> Vec<LinkerErrorCode> {
        diagnostics
            .iter()
            .map(|diagnostic| match diagnostic.kind {
                DiagnosticKind::Linker(code) => code,
                other => panic!("unexpected diagnostic kind {other:?}"),
            })
            .collect()
    }

    fn link(sources: &[&str]) -> (Linker, Vec<LinkerErrorCode>) {
        let mut linker = Linker::new();
        for (index, source) in sources.iter().enumerate() {
            linker.register(batch(source, &format!("module{index}")));
        }
        let diagnostics = linker.link();
        (linker, codes(&diagnostics))
    }

    #[test]
    fn links_empty_class() {
        let (linker, codes) = link(&["class A {};"]);
        assert_eq!(codes, vec![]);
        assert!(linker.registry().contains_key("A"));
    }

    #[test]
    fn missing_parent_fails_at_link_time() {
        let (_, codes) = link(&["class A : B {};"]);
        assert_eq!(codes, vec![LinkerErrorCode::NoSuchSymbol]);
    }

    #[test]
    fn duplicate_across_files_is_rejected() {
        let mut linker = Linker::new();
        assert!(linker.register(batch("class A {};", "first")));
        assert!(!linker.register(batch("enum A { X };", "second")));
        assert!(linker.register(batch("class B : A {};", "third")));

        let diagnostics = linker.link();
        assert_eq!(codes(&diagnostics), vec![LinkerErrorCode::DuplicatingSymbol]);
        assert!(diagnostics[0].tip.contains("first.epi"));
        assert!(linker.registry().get("A").and_then(Symbol::as_class).is_some());
    }

    #[test]
    fn hash_collision_is_reported_once_per_pair() {
        let (_, codes) = link(&["class plumless {}; class buckeroo {};"]);
        assert_eq!(codes, vec![LinkerErrorCode::HashCollision]);

        let (_, codes) = link(&["class plumless {};", "enum buckeroo { X };"]);
        assert_eq!(codes, vec![LinkerErrorCode::HashCollision]);
    }

    #[test]
    fn self_typed_property_needs_indirection() {
        let (_, codes) = link(&["class A { A Inner; };"]);
        assert_eq!(codes, vec![LinkerErrorCode::IncompleteTypeUsage]);

        let (_, codes) = link(&["class A { A* Next; epiPtrArray<A> Children; };"]);
        assert_eq!(codes, vec![]);

        let (_, codes) = link(&["class A { epiArray<A> Children; };"]);
        assert_eq!(codes, vec![LinkerErrorCode::IncompleteTypeUsage]);
    }

    #[test]
    fn unresolved_types_are_reported() {
        let (_, codes) = link(&["class A { Missing Value; epiArray<Unknown> Items; };"]);
        assert_eq!(
            codes,
            vec![LinkerErrorCode::NoSuchSymbol, LinkerErrorCode::NoSuchSymbol]
        );
    }

    #[test]
    fn resolves_property_types() {
        let (linker, codes) = link(&[
            "enum Color { Red, Green };",
            "class Base { enum Mode { On, Off }; }; \
             class Shape : Base { Color Tint = Green; Mode Current = Base::Mode::Off; Base* Owner; };",
        ]);
        assert_eq!(codes, vec![]);

        let shape = linker
            .registry()
            .get("Shape")
            .and_then(Symbol::as_class)
            .expect("shape");
        let resolved: Vec<Option<Resolved>> =
            shape.properties.iter().map(|p| p.resolved.clone()).collect();
        assert_eq!(
            resolved,
            vec![
                Some(Resolved::Enum("Color".to_string())),
                Some(Resolved::Enum("Mode".to_string())),
                Some(Resolved::Class("Base".to_string())),
            ]
        );
    }

    #[test]
    fn enum_defaults_must_name_own_entries() {
        let (_, codes) = link(&["enum Color { Red }; class C { Color Tint = Green; };"]);
        assert_eq!(codes, vec![LinkerErrorCode::NoSuchSymbol]);

        let (_, codes) = link(&[
            "enum Color { Red }; enum Shape { Box }; class C { Color Tint = Shape::Box; };",
        ]);
        assert_eq!(codes, vec![LinkerErrorCode::IncorrectValueAssignment]);
    }

    #[test]
    fn enum_entry_references() {
        let (_, codes) = link(&["enum A : epiHash_t { Value1, Value2 = A::Value1 };"]);
        assert_eq!(codes, vec![]);

        let (_, codes) = link(&["enum A : epiHash_t { Value1, Value2 = A };"]);
        assert_eq!(codes, vec![LinkerErrorCode::IncorrectValueAssignment]);

        let (_, codes) = link(&["[FlagMask] enum F { A, B = C, C };"]);
        assert_eq!(codes, vec![LinkerErrorCode::NoSuchSymbol]);

        let (_, codes) = link(&["enum E { X, X };"]);
        assert_eq!(codes, vec![LinkerErrorCode::DuplicatingSymbol]);
    }

    #[test]
    fn enum_entries_are_not_template_arguments() {
        let (_, codes) = link(&["enum E { X }; class C { epiArray<E::X> Items; };"]);
        assert_eq!(codes, vec![LinkerErrorCode::BadTemplateArgument]);
    }

    #[test]
    fn qualified_lookup_descends_into_inner_enums() {
        let mut linker = Linker::new();
        linker.register(batch("class A { enum Mode { On }; };", "a"));

        let entry = linker.lookup("A::Mode::On", None).expect("entry");
        assert_eq!(entry.token().text, "On");
        assert!(linker.lookup("A::Mode::On::More", None).is_none());
        assert!(linker.lookup("A::Missing", None).is_none());
    }
}
