use super::handle::Handle;

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot arena with generational handles. Removing a value frees its slot for
/// reuse; handles issued for the old value stop resolving.
pub struct ResourceCache<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for ResourceCache<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}

impl<T> ResourceCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: T) -> Handle<T> {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(item);
            return Handle::new(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(item),
        });
        Handle::new(index, 0)
    }

    /// Get a reference to a value by handle.
    /// Returns None if the handle is stale or was never issued.
    pub fn get(&self, h: Handle<T>) -> Option<&T> {
        self.slots
            .get(h.index())
            .filter(|slot| slot.generation == h.generation())
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, h: Handle<T>) -> Option<&mut T> {
        self.slots
            .get_mut(h.index())
            .filter(|slot| slot.generation == h.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, h: Handle<T>) -> bool {
        self.get(h).is_some()
    }

    pub fn remove(&mut self, h: Handle<T>) -> Option<T> {
        let slot = self.slots.get_mut(h.index())?;
        if slot.generation != h.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(h.index() as u32);
        self.len -= 1;
        Some(value)
    }

    /// Removes every value for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(Handle<T>, &mut T) -> bool) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(value) = slot.value.as_mut() else {
                continue;
            };
            if !keep(Handle::new(index as u32, slot.generation), value) {
                slot.value = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
                self.len -= 1;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (Handle::new(index as u32, slot.generation), value))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(|value| (Handle::new(index as u32, generation), value))
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_invalid_handle_returns_none() {
        let cache: ResourceCache<u32> = ResourceCache::default();
        let fake_handle = Handle::new(999, 0);
        assert!(cache.get(fake_handle).is_none());
    }

    #[test]
    fn get_valid_handle_returns_some() {
        let mut cache = ResourceCache::default();
        let handle = cache.insert(42u32);
        assert_eq!(cache.get(handle), Some(&42));
    }

    #[test]
    fn removed_slot_is_reused_with_new_generation() {
        let mut cache = ResourceCache::default();
        let first = cache.insert("a");
        assert_eq!(cache.remove(first), Some("a"));
        assert!(cache.get(first).is_none());

        let second = cache.insert("b");
        assert_eq!(second.index(), first.index());
        assert_ne!(second, first);
        assert!(cache.get(first).is_none());
        assert_eq!(cache.get(second), Some(&"b"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn retain_drops_rejected_values() {
        let mut cache = ResourceCache::default();
        let keep = cache.insert(1);
        let drop = cache.insert(2);
        cache.retain(|_, value| *value == 1);
        assert!(cache.contains(keep));
        assert!(!cache.contains(drop));
        assert_eq!(cache.len(), 1);
    }
}
