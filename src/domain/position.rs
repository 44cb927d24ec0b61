//! Position Allocation
//!
//! Sibling order is a fractional sort key. Insertions take the midpoint of
//! their neighbours, or step one gap past a list boundary. When neighbours get
//! too close to split, the whole sibling list is renumbered with even spacing.

/// Distance between evenly spaced positions and boundary steps
pub const POSITION_GAP: f64 = 1_000_000.0;

/// Neighbours closer than this are renumbered instead of split
pub const MIN_POSITION_GAP: f64 = 1e-3;

/// Result of placing one item into a sibling list
#[derive(Debug, Clone, PartialEq)]
pub enum Allocation {
    /// Only the inserted item needs a new position
    At(f64),
    /// Siblings must be renumbered too. `siblings[i]` is the new position of
    /// the i-th input sibling, in input order.
    Rebalanced { position: f64, siblings: Vec<f64> },
}

impl Allocation {
    /// Position assigned to the inserted item
    pub fn position(&self) -> f64 {
        match self {
            Allocation::At(p) => *p,
            Allocation::Rebalanced { position, .. } => *position,
        }
    }

    pub fn is_rebalanced(&self) -> bool {
        matches!(self, Allocation::Rebalanced { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionAllocator {
    gap: f64,
    min_gap: f64,
}

impl Default for PositionAllocator {
    fn default() -> Self {
        Self {
            gap: POSITION_GAP,
            min_gap: MIN_POSITION_GAP,
        }
    }
}

impl PositionAllocator {
    pub fn new(gap: f64, min_gap: f64) -> Self {
        Self { gap, min_gap }
    }

    pub fn gap(&self) -> f64 {
        self.gap
    }

    /// Position for inserting at `index` into `siblings`
    ///
    /// `siblings` are the positions of the other children of the target
    /// parent, ascending, with the moved item already removed. An index past
    /// the end appends.
    pub fn allocate(&self, siblings: &[f64], index: usize) -> Allocation {
        let index = index.min(siblings.len());

        let candidate = if !is_strictly_ascending(siblings) {
            None
        } else if siblings.is_empty() {
            Some(self.gap)
        } else if index == 0 {
            let first = siblings[0];
            Some(first - self.gap).filter(|p| p.is_finite() && *p < first)
        } else if index == siblings.len() {
            let last = siblings[index - 1];
            Some(last + self.gap).filter(|p| p.is_finite() && *p > last)
        } else {
            let before = siblings[index - 1];
            let after = siblings[index];
            if after - before >= self.min_gap {
                let mid = (before + after) / 2.0;
                Some(mid).filter(|p| before < *p && *p < after)
            } else {
                None
            }
        };

        match candidate {
            Some(position) => Allocation::At(position),
            None => {
                log::debug!(
                    "renumbering {} siblings to insert at index {}",
                    siblings.len(),
                    index
                );
                self.rebalance(siblings.len(), index)
            }
        }
    }

    /// `count` positions spaced one gap apart, starting at one gap
    pub fn evenly_spaced(&self, count: usize) -> Vec<f64> {
        (1..=count).map(|k| self.gap * k as f64).collect()
    }

    /// `count` strictly increasing positions strictly between two bounds
    ///
    /// Missing bounds are open-ended. Returns `None` when the bounds are too
    /// close to fit `count` values at least `min_gap` apart.
    pub fn spread(&self, before: Option<f64>, after: Option<f64>, count: usize) -> Option<Vec<f64>> {
        if count == 0 {
            return Some(Vec::new());
        }

        let values: Vec<f64> = match (before, after) {
            (None, None) => self.evenly_spaced(count),
            (Some(b), None) => (1..=count).map(|k| b + self.gap * k as f64).collect(),
            (None, Some(a)) => (0..count)
                .map(|k| a - self.gap * (count - k) as f64)
                .collect(),
            (Some(b), Some(a)) => {
                let step = (a - b) / (count + 1) as f64;
                if step < self.min_gap {
                    return None;
                }
                (1..=count).map(|k| b + step * k as f64).collect()
            }
        };

        let fits = values.iter().all(|v| v.is_finite())
            && is_strictly_ascending(&values)
            && before.map_or(true, |b| values[0] > b)
            && after.map_or(true, |a| values[count - 1] < a);
        fits.then_some(values)
    }

    fn rebalance(&self, sibling_count: usize, index: usize) -> Allocation {
        let slots = self.evenly_spaced(sibling_count + 1);
        let position = slots[index];
        let siblings = slots
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, p)| *p)
            .collect();
        Allocation::Rebalanced { position, siblings }
    }
}

fn is_strictly_ascending(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}
