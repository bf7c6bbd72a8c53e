//! Scope stack for lexical symbol resolution
//!
//! Tracks nested scopes during AST traversal. Each frame maps source names to
//! the unique variable key the SSA builder uses for them, so an inner
//! declaration shadows an outer one without clobbering its definitions.

use ahash::AHashMap;

#[derive(Debug, Clone, Default)]
struct ScopeFrame {
    name: String,
    symbols: AHashMap<String, String>,
}

/// Scope stack for managing lexical bindings and qualified names
#[derive(Debug, Clone)]
pub struct ScopeStack {
    frames: Vec<ScopeFrame>,
    separator: &'static str,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    /// Create a new scope stack with default separator "."
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            separator: ".",
        }
    }

    /// Create with a custom separator
    pub fn with_separator(separator: &'static str) -> Self {
        Self {
            frames: Vec::new(),
            separator,
        }
    }

    /// Push a new scope
    pub fn push(&mut self, name: impl Into<String>) {
        self.frames.push(ScopeFrame {
            name: name.into(),
            symbols: AHashMap::new(),
        });
    }

    /// Pop the current scope, dropping its bindings
    pub fn pop(&mut self) -> Option<String> {
        self.frames.pop().map(|f| f.name)
    }

    /// Get current FQN (anonymous block scopes are skipped)
    pub fn fqn(&self) -> String {
        self.frames
            .iter()
            .filter(|f| !f.name.is_empty())
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join(self.separator)
    }

    /// Get FQN with additional name
    pub fn fqn_with(&self, name: &str) -> String {
        let fqn = self.fqn();
        if fqn.is_empty() {
            name.to_string()
        } else {
            format!("{}{}{}", fqn, self.separator, name)
        }
    }

    /// Current depth
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Get current scope name
    pub fn current(&self) -> Option<&str> {
        self.frames.last().map(|f| f.name.as_str())
    }

    /// Bind `name` to `key` in the innermost scope
    pub fn declare(&mut self, name: impl Into<String>, key: impl Into<String>) {
        if self.frames.is_empty() {
            self.push("");
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.symbols.insert(name.into(), key.into());
        }
    }

    /// Bind `name` to `key` in the outermost scope
    pub fn declare_root(&mut self, name: impl Into<String>, key: impl Into<String>) {
        if self.frames.is_empty() {
            self.push("");
        }
        if let Some(frame) = self.frames.first_mut() {
            frame.symbols.insert(name.into(), key.into());
        }
    }

    /// Resolve `name`, innermost scope first
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.symbols.get(name).map(|k| k.as_str()))
    }

    /// Is `name` bound in the innermost scope?
    pub fn is_declared_in_current(&self, name: &str) -> bool {
        self.frames
            .last()
            .map(|f| f.symbols.contains_key(name))
            .unwrap_or(false)
    }

    /// Execute a closure within a new scope
    pub fn with_scope<F, R>(&mut self, name: impl Into<String>, f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        self.push(name);
        let result = f(self);
        self.pop();
        result
    }
}
