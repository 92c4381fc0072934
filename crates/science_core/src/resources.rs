//! Vessel resource pools and the science ledger.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Anything conditions and transmissions can draw resources from.
pub trait ResourcePool {
    /// Withdraws up to `amount` of `resource` and returns what was actually taken.
    fn withdraw(&mut self, resource: &str, amount: f32) -> f32;

    fn available(&self, resource: &str) -> f32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AwardReason {
    Transmission,
    Recovery,
}

/// Receives awarded science value.
pub trait ValueSink {
    fn award(&mut self, amount: f32, reason: AwardReason);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceAmount {
    pub amount: f32,
    pub capacity: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceStore {
    pub pools: HashMap<String, ResourceAmount>,
}

impl ResourceStore {
    #[must_use]
    pub fn with(mut self, resource: &str, amount: f32, capacity: f32) -> Self {
        self.pools.insert(
            resource.to_string(),
            ResourceAmount {
                amount: amount.clamp(0.0, capacity.max(0.0)),
                capacity: capacity.max(0.0),
            },
        );
        self
    }

    /// Adds up to `amount`, clamped to capacity. Returns what was accepted.
    pub fn replenish(&mut self, resource: &str, amount: f32) -> f32 {
        let Some(pool) = self.pools.get_mut(resource) else {
            return 0.0;
        };
        let accepted = amount.max(0.0).min(pool.capacity - pool.amount).max(0.0);
        pool.amount += accepted;
        accepted
    }
}

impl ResourcePool for ResourceStore {
    fn withdraw(&mut self, resource: &str, amount: f32) -> f32 {
        if amount <= 0.0 {
            return 0.0;
        }
        let Some(pool) = self.pools.get_mut(resource) else {
            return 0.0;
        };
        let taken = amount.min(pool.amount).max(0.0);
        pool.amount -= taken;
        taken
    }

    fn available(&self, resource: &str) -> f32 {
        self.pools.get(resource).map_or(0.0, |pool| pool.amount)
    }
}

/// Running science totals for the whole game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScienceLedger {
    pub transmitted: f32,
    pub recovered: f32,
}

impl ScienceLedger {
    pub fn total(&self) -> f32 {
        self.transmitted + self.recovered
    }
}

impl ValueSink for ScienceLedger {
    fn award(&mut self, amount: f32, reason: AwardReason) {
        if amount <= 0.0 {
            return;
        }
        match reason {
            AwardReason::Transmission => self.transmitted += amount,
            AwardReason::Recovery => self.recovered += amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn withdraw_is_capped_by_stock() {
        let mut store = ResourceStore::default().with("ElectricCharge", 3.0, 10.0);
        assert!((store.withdraw("ElectricCharge", 5.0) - 3.0).abs() < 1e-6);
        assert!(store.available("ElectricCharge").abs() < 1e-6);
        assert!(store.withdraw("Monoprop", 1.0).abs() < 1e-6);
    }

    #[test]
    fn replenish_clamps_to_capacity() {
        let mut store = ResourceStore::default().with("ElectricCharge", 8.0, 10.0);
        assert!((store.replenish("ElectricCharge", 5.0) - 2.0).abs() < 1e-6);
        assert!((store.available("ElectricCharge") - 10.0).abs() < 1e-6);
    }

    #[test]
    fn ledger_splits_awards_by_reason() {
        let mut ledger = ScienceLedger::default();
        ledger.award(2.0, AwardReason::Transmission);
        ledger.award(1.5, AwardReason::Recovery);
        ledger.award(-4.0, AwardReason::Recovery);
        assert!((ledger.transmitted - 2.0).abs() < 1e-6);
        assert!((ledger.recovered - 1.5).abs() < 1e-6);
        assert!((ledger.total() - 3.5).abs() < 1e-6);
    }
}
