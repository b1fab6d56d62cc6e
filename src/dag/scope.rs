// src/dag/scope.rs

use std::collections::HashMap;
use std::fmt;

/// Names visible at one point of a task declaration.
///
/// Each call to `Loader::add` starts from an empty scope. A task's name is
/// introduced for its later siblings and its own sub-tasks; every
/// `requires_direct` list works on a copy, so names declared inside a subtree
/// never leak back out to the parent's siblings.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    names: HashMap<String, usize>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    /// Bind `name`, shadowing any outer binding of the same name.
    pub fn insert(&mut self, name: impl Into<String>, idx: usize) {
        self.names.insert(name.into(), idx);
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<_> = self.names.iter().collect();
        entries.sort();
        let rendered: Vec<String> = entries
            .into_iter()
            .map(|(name, idx)| format!("{name:?}=>{idx}"))
            .collect();
        f.write_str(&rendered.join(", "))
    }
}
