//! Upgrade orderings.
//!
//! Generates every permutation of the selected module types. Orderings are
//! produced lazily in lexicographic order of input positions, so a run can be
//! regenerated exactly by calling [`OrderGenerator::orderings`] again.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::canister::ModuleType;
use crate::error::{ConfigError, Result};

/// One candidate sequence in which the module types are upgraded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UpgradeOrder {
    modules: Vec<ModuleType>,
}

impl UpgradeOrder {
    /// Module types in application order.
    #[must_use]
    pub fn modules(&self) -> &[ModuleType] {
        &self.modules
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns true if the ordering has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Space-separated module names, e.g. `root governance`.
    #[must_use]
    pub fn label(&self) -> String {
        self.modules
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for UpgradeOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Upgrade Order: {}", self.label())
    }
}

/// Produces every ordering of a set of distinct module types.
#[derive(Debug, Clone)]
pub struct OrderGenerator {
    modules: Vec<ModuleType>,
}

impl OrderGenerator {
    /// Creates a generator over `modules`.
    ///
    /// # Errors
    ///
    /// Returns an error if `modules` is empty or contains a module twice.
    pub fn new(modules: &[ModuleType]) -> Result<Self> {
        if modules.is_empty() {
            return Err(ConfigError::EmptyModuleSet.into());
        }

        let mut seen = HashSet::with_capacity(modules.len());
        if let Some(duplicate) = modules.iter().find(|m| !seen.insert(**m)) {
            return Err(ConfigError::DuplicateModuleType { module: *duplicate }.into());
        }

        Ok(Self {
            modules: modules.to_vec(),
        })
    }

    /// Module types in input order.
    #[must_use]
    pub fn modules(&self) -> &[ModuleType] {
        &self.modules
    }

    /// Number of orderings, K! for K module types.
    ///
    /// `None` if K! does not fit in a `usize`.
    #[must_use]
    pub fn total(&self) -> Option<usize> {
        (1..=self.modules.len()).try_fold(1usize, usize::checked_mul)
    }

    /// Iterates over all orderings, starting from the input order.
    #[must_use]
    pub fn orderings(&self) -> Orderings<'_> {
        Orderings {
            modules: &self.modules,
            indices: Some((0..self.modules.len()).collect()),
        }
    }
}

/// Iterator over the orderings of an [`OrderGenerator`].
#[derive(Debug)]
pub struct Orderings<'a> {
    modules: &'a [ModuleType],
    /// Positions into `modules` for the next ordering; `None` once exhausted.
    indices: Option<Vec<usize>>,
}

impl Iterator for Orderings<'_> {
    type Item = UpgradeOrder;

    fn next(&mut self) -> Option<Self::Item> {
        let indices = self.indices.as_mut()?;
        let order = UpgradeOrder {
            modules: indices.iter().map(|&i| self.modules[i]).collect(),
        };

        if !next_permutation(indices) {
            self.indices = None;
        }

        Some(order)
    }
}

/// Rearranges `indices` into the next lexicographic permutation.
///
/// Returns false (leaving `indices` untouched) when it is already the last one.
fn next_permutation(indices: &mut [usize]) -> bool {
    let Some(pivot) = indices.windows(2).rposition(|w| w[0] < w[1]) else {
        return false;
    };

    let Some(successor) = indices.iter().rposition(|&x| x > indices[pivot]) else {
        return false;
    };

    indices.swap(pivot, successor);
    indices[pivot + 1..].reverse();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpgradeOrdersError;

    const LIVE: [ModuleType; 5] = [
        ModuleType::Root,
        ModuleType::Governance,
        ModuleType::Ledger,
        ModuleType::Swap,
        ModuleType::Index,
    ];

    #[test]
    fn test_two_modules() {
        let generator = OrderGenerator::new(&[ModuleType::Root, ModuleType::Governance]).unwrap();
        let labels: Vec<_> = generator.orderings().map(|o| o.label()).collect();
        assert_eq!(labels, vec!["root governance", "governance root"]);
    }

    #[test]
    fn test_single_module() {
        let generator = OrderGenerator::new(&[ModuleType::Swap]).unwrap();
        let orders: Vec<_> = generator.orderings().collect();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].modules(), &[ModuleType::Swap]);
    }

    #[test]
    fn test_factorial_count_complete_and_unique() {
        for k in 1..=LIVE.len() {
            let input = &LIVE[..k];
            let generator = OrderGenerator::new(input).unwrap();
            let orders: Vec<_> = generator.orderings().collect();
            let unique: HashSet<_> = orders.iter().cloned().collect();

            assert_eq!(Some(orders.len()), generator.total());
            assert_eq!(unique.len(), orders.len());

            let mut expected = input.to_vec();
            expected.sort_unstable();
            for order in &orders {
                let mut sorted = order.modules().to_vec();
                sorted.sort_unstable();
                assert_eq!(sorted, expected);
            }
        }

        let generator = OrderGenerator::new(&LIVE).unwrap();
        assert_eq!(generator.total(), Some(120));
    }

    #[test]
    fn test_restartable() {
        let generator = OrderGenerator::new(&LIVE[..4]).unwrap();
        let first: Vec<_> = generator.orderings().collect();
        let second: Vec<_> = generator.orderings().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rejects_empty_and_duplicates() {
        assert!(matches!(
            OrderGenerator::new(&[]),
            Err(UpgradeOrdersError::Config(ConfigError::EmptyModuleSet))
        ));
        assert!(matches!(
            OrderGenerator::new(&[ModuleType::Root, ModuleType::Ledger, ModuleType::Root]),
            Err(UpgradeOrdersError::Config(ConfigError::DuplicateModuleType {
                module: ModuleType::Root
            }))
        ));
    }

    #[test]
    fn test_display() {
        let generator = OrderGenerator::new(&[ModuleType::Ledger, ModuleType::Index]).unwrap();
        let first = generator.orderings().next().unwrap();
        assert_eq!(first.to_string(), "Upgrade Order: ledger index");
    }
}
