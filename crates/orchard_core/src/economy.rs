//! Apples: where they grow and who holds them.
//!
//! Resource nodes are depletable sources on the map. Each faction has one
//! [`Economy`] shared by all of its agents and structures.

use serde::{Deserialize, Serialize};

use crate::components::{Body, EntityId, TilePos};
use crate::math::Vec2Fixed;

/// A depletable apple source.
///
/// Supply only ever goes down. An exhausted node stays on the map as a
/// marker but is never targeted again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Identity and pixel centre.
    pub body: Body,
    /// Tile the node sits on.
    pub tile: TilePos,
    /// Remaining supply.
    pub supply: u32,
    /// Supply at map generation.
    pub max_supply: u32,
    /// Render radius in pixels.
    pub radius: u32,
}

impl ResourceNode {
    /// Create a full node.
    #[must_use]
    pub const fn new(id: EntityId, tile: TilePos, position: Vec2Fixed, supply: u32, radius: u32) -> Self {
        Self {
            body: Body::new(id, position),
            tile,
            supply,
            max_supply: supply,
            radius,
        }
    }

    /// Check if this node is exhausted.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.supply == 0
    }

    /// Take up to `amount` apples. Returns the amount actually taken.
    pub fn extract(&mut self, amount: u32) -> u32 {
        let taken = amount.min(self.supply);
        self.supply -= taken;
        taken
    }
}

/// A faction's apple counter plus running totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Economy {
    /// Apples available to spend.
    pub apples: u32,
    /// Apples delivered by workers over the whole match.
    pub gathered: u64,
    /// Apples paid by passive income over the whole match.
    pub income: u64,
    /// Apples spent over the whole match.
    pub spent: u64,
}

impl Economy {
    /// Create an economy holding `apples`.
    #[must_use]
    pub const fn new(apples: u32) -> Self {
        Self {
            apples,
            gathered: 0,
            income: 0,
            spent: 0,
        }
    }

    /// Check if the faction can afford a cost.
    #[must_use]
    pub const fn can_afford(&self, cost: u32) -> bool {
        self.apples >= cost
    }

    /// Try to spend apples. Returns `false` and changes nothing if the
    /// faction cannot afford it.
    pub fn spend(&mut self, cost: u32) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        self.apples -= cost;
        self.spent += u64::from(cost);
        true
    }

    /// Add apples carried back by a worker.
    pub fn deposit(&mut self, amount: u32) {
        self.apples = self.apples.saturating_add(amount);
        self.gathered += u64::from(amount);
    }

    /// Add apples from passive income.
    pub fn pay_income(&mut self, amount: u32) {
        self.apples = self.apples.saturating_add(amount);
        self.income += u64::from(amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(supply: u32) -> ResourceNode {
        ResourceNode::new(1, TilePos::new(3, 3), Vec2Fixed::from_ints(112, 112), supply, 12)
    }

    #[test]
    fn test_extract_clamps_to_supply() {
        let mut n = node(7);
        assert_eq!(n.extract(5), 5);
        assert_eq!(n.extract(5), 2);
        assert!(n.is_exhausted());
        assert_eq!(n.extract(5), 0);
        assert_eq!(n.max_supply, 7);
    }

    #[test]
    fn test_spend_is_all_or_nothing() {
        let mut economy = Economy::new(20);
        assert!(!economy.spend(25));
        assert_eq!(economy.apples, 20);
        assert!(economy.spend(20));
        assert_eq!(economy.apples, 0);
        assert_eq!(economy.spent, 20);
    }

    #[test]
    fn test_ledger_tracks_sources() {
        let mut economy = Economy::new(0);
        economy.deposit(10);
        economy.pay_income(2);
        assert_eq!(economy.apples, 12);
        assert_eq!(economy.gathered, 10);
        assert_eq!(economy.income, 2);
    }
}
