use std::sync::atomic::{AtomicBool, Ordering};

/// Per-slot flag telling the presentation layer an image is loaded, readable
/// without taking any fractal lock
#[derive(Debug)]
pub struct ReadinessTable {
    slots: Vec<AtomicBool>,
}

impl ReadinessTable {
    pub fn new(size: usize) -> Self {
        Self {
            slots: (0..size).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn mark(&self, slot: usize, ready: bool) {
        if let Some(flag) = self.slots.get(slot) {
            flag.store(ready, Ordering::Release);
        }
    }

    /// Out-of-range slots are never ready
    pub fn is_ready(&self, slot: usize) -> bool {
        self.slots
            .get(slot)
            .map(|flag| flag.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    pub fn ready_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|flag| flag.load(Ordering::Acquire))
            .count()
    }

    pub fn clear(&self) {
        for flag in &self.slots {
            flag.store(false, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_clear() {
        let table = ReadinessTable::new(9);
        table.mark(2, true);
        table.mark(8, true);
        table.mark(40, true);
        assert!(table.is_ready(2));
        assert!(!table.is_ready(40));
        assert_eq!(table.ready_count(), 2);

        table.clear();
        assert_eq!(table.ready_count(), 0);
    }
}
