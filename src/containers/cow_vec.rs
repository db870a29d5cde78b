use std::rc::Rc;

/// Maximum number of overrides kept before the delta is folded into a fresh base.
const MAX_DELTA_LEN: usize = 16;

/// A persistent indexed array with copy-on-write updates.
///
/// Every paving node carries one of these per bound map. A child node clones the parent's array,
/// which only copies the (small) override delta and bumps the reference count of the shared base.
/// Mutations touch the delta; once the delta outgrows [`MAX_DELTA_LEN`] entries it is rebased into
/// a private copy of the base. Ancestor arrays are never affected by descendant writes.
#[derive(Debug, Clone)]
pub(crate) struct CowVec<T> {
    base: Rc<Vec<T>>,
    delta: Vec<(u32, T)>,
}

impl<T: Clone> CowVec<T> {
    pub(crate) fn new(values: Vec<T>) -> Self {
        CowVec {
            base: Rc::new(values),
            delta: Vec::new(),
        }
    }

    pub(crate) fn get(&self, index: u32) -> &T {
        self.delta
            .iter()
            .rev()
            .find(|(i, _)| *i == index)
            .map(|(_, value)| value)
            .unwrap_or_else(|| &self.base[index as usize])
    }

    pub(crate) fn set(&mut self, index: u32, value: T) {
        assert!((index as usize) < self.base.len());

        if let Some(slot) = self.delta.iter_mut().find(|(i, _)| *i == index) {
            slot.1 = value;
            return;
        }

        if self.delta.len() == MAX_DELTA_LEN {
            self.rebase();
        }
        self.delta.push((index, value));
    }

    /// Fold the override delta into a private copy of the base. Sharing with other arrays is
    /// broken for this instance only.
    fn rebase(&mut self) {
        let mut values = (*self.base).clone();
        for (index, value) in self.delta.drain(..) {
            values[index as usize] = value;
        }
        self.base = Rc::new(values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_updates_do_not_leak_into_the_parent() {
        let parent = CowVec::new(vec![0, 1, 2, 3]);
        let mut child = parent.clone();

        child.set(2, 42);

        assert_eq!(*parent.get(2), 2);
        assert_eq!(*child.get(2), 42);
    }

    #[test]
    fn updates_overwrite_previous_overrides() {
        let mut vec = CowVec::new(vec![0; 4]);

        vec.set(1, 10);
        vec.set(1, 20);

        assert_eq!(*vec.get(1), 20);
        assert_eq!(vec.delta.len(), 1);
    }

    #[test]
    fn rebase_preserves_values_and_sharing_of_siblings() {
        let root = CowVec::new(vec![0_i32; 8]);
        let mut busy = root.clone();
        let lazy = root.clone();

        for round in 0..3 {
            for i in 0..8 {
                busy.set(i, (round * 8 + i) as i32);
            }
        }

        for i in 0..8_u32 {
            assert_eq!(*busy.get(i), (16 + i) as i32);
            assert_eq!(*lazy.get(i), 0);
        }
    }
}
