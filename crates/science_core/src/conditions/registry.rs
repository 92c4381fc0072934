use ahash::AHashMap;
use thiserror::Error;
use tracing::warn;

use super::{kinds, Condition, ConditionKind};
use crate::ConfigNode;

/// Builds a condition's type-specific parameters from its persisted block.
pub type ConditionCtor = fn(&ConfigNode) -> ConditionKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("condition block has no conditionType")]
    MissingConditionType,
    #[error("unknown condition type '{0}'")]
    UnknownConditionType(String),
}

/// Maps `conditionType` discriminators to constructors.
#[derive(Debug, Clone)]
pub struct ConditionRegistry {
    ctors: AHashMap<String, ConditionCtor>,
}

impl ConditionRegistry {
    pub fn empty() -> Self {
        Self {
            ctors: AHashMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("Altitude", kinds::altitude);
        registry.register("Biome", kinds::biome);
        registry.register("Crew", kinds::crew);
        registry.register("GeeForce", kinds::gee_force);
        registry.register("Orbit", kinds::orbit);
        registry.register("Part", kinds::part);
        registry.register("Situation", kinds::situation);
        registry.register("SurfaceSpeed", kinds::surface_speed);
        registry.register("Resource", kinds::resource);
        registry
    }

    /// Registers `ctor` under `name`, returning any constructor it replaced.
    pub fn register(&mut self, name: impl Into<String>, ctor: ConditionCtor) -> Option<ConditionCtor> {
        self.ctors.insert(name.into(), ctor)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ctors.contains_key(name)
    }

    pub fn load(&self, node: &ConfigNode) -> Result<Condition, LoadError> {
        let type_name = node
            .get_value("conditionType")
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(LoadError::MissingConditionType)?;
        let ctor = self
            .ctors
            .get(type_name)
            .ok_or_else(|| LoadError::UnknownConditionType(type_name.to_string()))?;
        Ok(Condition::from_node(node, ctor(node)))
    }

    /// Loads every block in order, skipping the ones that fail.
    pub fn load_all<'a>(
        &self,
        nodes: impl Iterator<Item = &'a ConfigNode>,
        diagnostics: &mut Vec<LoadError>,
    ) -> Vec<Condition> {
        let mut conditions = Vec::new();
        for node in nodes {
            match self.load(node) {
                Ok(condition) => conditions.push(condition),
                Err(err) => {
                    warn!(error = %err, "skipping condition block");
                    diagnostics.push(err);
                }
            }
        }
        conditions
    }
}

impl Default for ConditionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
