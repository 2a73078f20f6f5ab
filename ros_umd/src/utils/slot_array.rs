use crate::error::{Error, Result};

/// Fixed-capacity, bounds-checked binding slot container.
///
/// Models one hardware binding table (vertex buffer slots, sampler slots,
/// render target slots, ...). Every slot is either empty or holds one
/// binding. Range updates are checked against the capacity before any slot
/// is touched, so a rejected update leaves the table unchanged.
///
/// # Example
///
/// ```ignore
/// let mut samplers: SlotArray<u32, 16> = SlotArray::new();
/// samplers.set_range(2, &[Some(7), None])?;   // slot 2 = 7, slot 3 = empty
/// assert_eq!(samplers.highest_bound(), Some(2));
/// ```
#[derive(Debug, Clone)]
pub struct SlotArray<T, const N: usize> {
    slots: [Option<T>; N],
}

impl<T: Clone, const N: usize> SlotArray<T, N> {
    /// Create a table with every slot empty
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        N
    }

    /// Binding at `index`, or None if empty or out of range
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(|slot| slot.as_ref())
    }

    /// Whether `index` holds a binding
    pub fn is_bound(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Replace one slot
    pub fn set(&mut self, index: usize, value: Option<T>) -> Result<()> {
        self.check_range(index, 1)?;
        self.slots[index] = value;
        Ok(())
    }

    /// Replace `values.len()` consecutive slots starting at `start`
    ///
    /// Fails with `CapacityExceeded` (and changes nothing) if the range does
    /// not fit.
    pub fn set_range(&mut self, start: usize, values: &[Option<T>]) -> Result<()> {
        self.check_range(start, values.len())?;
        for (slot, value) in self.slots[start..start + values.len()].iter_mut().zip(values) {
            *slot = value.clone();
        }
        Ok(())
    }

    /// Empty `count` consecutive slots starting at `start`, clamped to the capacity
    pub fn clear_range_clamped(&mut self, start: usize, count: usize) {
        let start = start.min(N);
        let end = start.saturating_add(count).min(N);
        for slot in &mut self.slots[start..end] {
            *slot = None;
        }
    }

    /// Empty every slot
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    /// Empty every slot whose binding matches `predicate`, returning how many were cleared
    pub fn clear_matching(&mut self, mut predicate: impl FnMut(&T) -> bool) -> usize {
        let mut cleared = 0;
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(&mut predicate) {
                *slot = None;
                cleared += 1;
            }
        }
        cleared
    }

    /// Index of the highest bound slot
    pub fn highest_bound(&self) -> Option<usize> {
        self.slots.iter().rposition(|slot| slot.is_some())
    }

    /// Number of bound slots
    pub fn bound_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Iterate over (index, binding) for every bound slot, in slot order
    pub fn iter_bound(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|value| (index, value)))
    }

    fn check_range(&self, start: usize, count: usize) -> Result<()> {
        match start.checked_add(count) {
            Some(end) if end <= N => Ok(()),
            _ => Err(Error::CapacityExceeded(format!(
                "slot range {}..{} exceeds capacity {}",
                start,
                start.saturating_add(count),
                N
            ))),
        }
    }
}

impl<T: Clone, const N: usize> Default for SlotArray<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "slot_array_tests.rs"]
mod tests;
