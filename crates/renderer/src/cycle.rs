/// A list with a cursor that wraps at both ends.
#[derive(Debug, Clone)]
pub struct Cycle<T> {
    items: Vec<T>,
    index: usize,
}

impl<T> Default for Cycle<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: 0,
        }
    }
}

impl<T> Cycle<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items, index: 0 }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Moves the cursor to `index`; out-of-range indices are refused.
    pub fn set_index(&mut self, index: usize) -> bool {
        if index < self.items.len() {
            self.index = index;
            true
        } else {
            false
        }
    }

    pub fn current(&self) -> Option<&T> {
        self.items.get(self.index)
    }

    pub fn current_mut(&mut self) -> Option<&mut T> {
        self.items.get_mut(self.index)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn next_index(&self) -> Option<usize> {
        (!self.items.is_empty()).then(|| (self.index + 1) % self.items.len())
    }

    pub fn previous_index(&self) -> Option<usize> {
        (!self.items.is_empty()).then(|| (self.index + self.items.len() - 1) % self.items.len())
    }

    /// Advances and returns the new current item.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&T> {
        self.index = self.next_index()?;
        self.current()
    }

    pub fn previous(&mut self) -> Option<&T> {
        self.index = self.previous_index()?;
        self.current()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_in_both_directions() {
        let mut cycle = Cycle::new(vec!["a", "b", "c"]);
        assert_eq!(cycle.current(), Some(&"a"));
        assert_eq!(cycle.previous(), Some(&"c"));
        assert_eq!(cycle.next(), Some(&"a"));
        assert_eq!(cycle.next(), Some(&"b"));
        assert_eq!(cycle.next(), Some(&"c"));
        assert_eq!(cycle.next(), Some(&"a"));
    }

    #[test]
    fn empty_cycle_has_no_current() {
        let mut cycle: Cycle<u8> = Cycle::default();
        assert!(cycle.current().is_none());
        assert!(cycle.next().is_none());
        assert!(cycle.previous().is_none());
        assert!(!cycle.set_index(0));
    }

    #[test]
    fn single_item_stays_put() {
        let mut cycle = Cycle::new(vec![7]);
        assert_eq!(cycle.next(), Some(&7));
        assert_eq!(cycle.previous(), Some(&7));
        assert_eq!(cycle.index(), 0);
    }
}
