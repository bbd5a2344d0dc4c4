//! Compile-time symbol tables.
//!
//! A `Context` is a stack of scopes, each holding two namespaces: type
//! aliases (`type Id = Int`) and the declared or inferred types of
//! values (`answer : Int`). Lookups walk from the innermost scope
//! outwards; nothing is ever removed, inner scopes only shadow.

use std::collections::HashMap;

use crate::types::Type;

#[derive(Debug, Default, Clone)]
struct Scope {
    types: HashMap<String, Type>,
    values: HashMap<String, Type>,
}

#[derive(Debug, Clone)]
pub struct Context {
    scopes: Vec<Scope>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Context {
            scopes: vec![Scope::default()],
        }
    }

    pub fn set_type(&mut self, name: impl Into<String>, ty: Type) {
        self.innermost().types.insert(name.into(), ty);
    }

    /// Resolves a type alias.
    pub fn type_of(&self, name: &str) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|scope| scope.types.get(name))
    }

    pub fn set_value(&mut self, name: impl Into<String>, ty: Type) {
        self.innermost().values.insert(name.into(), ty);
    }

    /// Resolves the type of a value.
    pub fn value(&self, name: &str) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|scope| scope.values.get(name))
    }

    /// Opens a child scope. Every call must be paired with `exit_scope`.
    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn exit_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn innermost(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }
}
