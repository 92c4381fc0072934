//! Ordered key/value tree used for definitions and persistence.
//!
//! Keys may repeat; lookups return the first match. Typed readers never fail:
//! a missing or malformed value yields the caller's default.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigNode {
    pub name: String,
    #[serde(default)]
    pub values: Vec<(String, String)>,
    #[serde(default)]
    pub nodes: Vec<ConfigNode>,
}

impl ConfigNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn has_value(&self, key: &str) -> bool {
        self.values.iter().any(|(k, _)| k == key)
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.iter().any(|node| node.name == name)
    }

    pub fn get_value(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_node(&self, name: &str) -> Option<&ConfigNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn get_nodes<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ConfigNode> + 'a {
        self.nodes.iter().filter(move |node| node.name == name)
    }

    pub fn add_value(&mut self, key: impl Into<String>, value: impl Display) {
        self.values.push((key.into(), value.to_string()));
    }

    /// Replaces the first value under `key`, or appends one.
    pub fn set_value(&mut self, key: &str, value: impl Display) {
        let value = value.to_string();
        match self.values.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.values.push((key.to_string(), value)),
        }
    }

    pub fn add_node(&mut self, node: ConfigNode) -> &mut ConfigNode {
        self.nodes.push(node);
        let last = self.nodes.len() - 1;
        &mut self.nodes[last]
    }

    // -----------------------------------------------------------------------
    // Typed readers
    // -----------------------------------------------------------------------

    pub fn parse_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get_value(key)
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Booleans parse case-insensitively (`True`, `FALSE`, ...).
    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        match self.get_value(key).map(str::trim) {
            Some(raw) if raw.eq_ignore_ascii_case("true") => true,
            Some(raw) if raw.eq_ignore_ascii_case("false") => false,
            _ => default,
        }
    }

    pub fn string_or(&self, key: &str, default: &str) -> String {
        self.get_value(key).unwrap_or(default).to_string()
    }
}
