//! Inheritance tree checks run at link time.
//!
//! Parents must resolve to classes and chains must be acyclic. A class may
//! not redeclare a property name, or a name with the same CRC32, anywhere
//! along its ancestor chain.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::diagnostic::{Diagnostic, LinkerErrorCode};
use crate::linker::clash;
use crate::symbol::{Class, Property, Registry, Symbol};

#[derive(Clone, Copy)]
struct Node<'a> {
    class: &'a Class,
    parent: Option<&'a str>,
    is_leaf: bool,
}

/// Validates every class of `registry`, returning the problems found.
pub fn validate(registry: &Registry) -> Vec<Diagnostic> {
    let mut tree = Tree {
        nodes: IndexMap::new(),
        visible: HashMap::new(),
        diagnostics: Vec::new(),
    };
    tree.build(registry);
    tree.break_cycles();
    tree.check_properties();
    tree.diagnostics
}

struct Tree<'a> {
    nodes: IndexMap<&'a str, Node<'a>>,
    /// Own and inherited properties of every visited class.
    visible: HashMap<&'a str, Vec<&'a Property>>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Tree<'a> {
    fn build(&mut self, registry: &'a Registry) {
        for class in registry.values().filter_map(Symbol::as_class) {
            let parent = match &class.parent {
                None => None,
                Some(token) => match registry.get(&token.text) {
                    Some(Symbol::Class(parent)) => Some(parent.name()),
                    Some(Symbol::Enum(_)) => {
                        let tip = format!("Parent `{}` is not a class", token.text);
                        self.diagnostics
                            .push(Diagnostic::linker(LinkerErrorCode::NoSuchSymbol, token, tip));
                        None
                    }
                    None => {
                        let tip = format!("Invalid parent name: `{}`", token.text);
                        self.diagnostics
                            .push(Diagnostic::linker(LinkerErrorCode::NoSuchSymbol, token, tip));
                        None
                    }
                },
            };
            self.nodes.insert(
                class.name(),
                Node {
                    class,
                    parent,
                    is_leaf: true,
                },
            );
        }
    }

    /// Reports every class that is its own ancestor and cuts its parent
    /// link, leaving a forest.
    fn break_cycles(&mut self) {
        let mut cyclic = Vec::new();
        for (name, node) in &self.nodes {
            let mut steps = 0;
            let mut current = node.parent;
            while let Some(ancestor) = current {
                if ancestor == *name {
                    cyclic.push(*name);
                    break;
                }
                steps += 1;
                if steps > self.nodes.len() {
                    break;
                }
                current = self.nodes.get(ancestor).and_then(|node| node.parent);
            }
        }

        for name in &cyclic {
            if let Some(node) = self.nodes.get(name) {
                let tip = format!("`{name}` inherits from itself");
                self.diagnostics.push(Diagnostic::linker(
                    LinkerErrorCode::IncompleteTypeUsage,
                    &node.class.token,
                    tip,
                ));
            }
        }
        for name in cyclic {
            if let Some(node) = self.nodes.get_mut(name) {
                node.parent = None;
            }
        }

        let parents: Vec<&str> = self.nodes.values().filter_map(|node| node.parent).collect();
        for parent in parents {
            if let Some(node) = self.nodes.get_mut(parent) {
                node.is_leaf = false;
            }
        }
    }

    fn check_properties(&mut self) {
        let leaves: Vec<&str> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.is_leaf)
            .map(|(name, _)| *name)
            .collect();
        for name in leaves {
            self.visit(name);
        }
    }

    /// Checks `name` against its ancestors and returns its visible
    /// properties. Each class is checked once.
    fn visit(&mut self, name: &'a str) -> Vec<&'a Property> {
        if let Some(visible) = self.visible.get(name) {
            return visible.clone();
        }
        let Some(node) = self.nodes.get(name).copied() else {
            return Vec::new();
        };
        let inherited = match node.parent {
            Some(parent) => self.visit(parent),
            None => Vec::new(),
        };

        let own = &node.class.properties;
        for (index, property) in own.iter().enumerate() {
            let earlier = own[..index].iter();
            for other in earlier.chain(inherited.iter().copied()) {
                if let Some(diagnostic) = clash(&property.token, &other.token) {
                    self.diagnostics.push(diagnostic);
                }
            }
        }

        let mut visible: Vec<&'a Property> = own.iter().collect();
        visible.extend(inherited);
        self.visible.insert(name, visible.clone());
        visible
    }
}
