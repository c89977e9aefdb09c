//! Entity identity.
//!
//! An `Entity` is a generational index: the index slot can be reused after
//! despawn, the generation distinguishes the new occupant from the old one
//! so a stale handle never aliases a live entity.

use derive_more::Display;

/// A handle to a row in a [`World`](crate::world::World)'s component store.
///
/// `Entity` carries no access of its own (spec §4.1: `Get` element `Entity`
/// registers no reads/writes) — it is a `FromParam`-free literal value
/// query iteration hands out alongside the row's components.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("Entity({index}v{generation})")]
pub struct Entity {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl Entity {
    pub const PLACEHOLDER: Entity = Entity {
        index: u32::MAX,
        generation: u32::MAX,
    };

    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Default)]
pub(crate) struct Entities {
    generations: Vec<u32>,
    free: Vec<u32>,
}

impl Entities {
    pub(crate) fn spawn(&mut self) -> Entity {
        if let Some(index) = self.free.pop() {
            Entity {
                index,
                generation: self.generations[index as usize],
            }
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            Entity { index, generation: 0 }
        }
    }

    /// Predicts the `Entity` the `n`th call to `spawn` (counting from this
    /// table's current state, `n = 0` for the very next call) would
    /// produce, without mutating anything. Mirrors `spawn`'s own
    /// free-list-first order: reservation `n` reuses `free`'s `n`th slot
    /// from the back, carrying that slot's existing generation, until the
    /// free list is exhausted, after which reservations grow the table
    /// sequentially at generation 0.
    pub(crate) fn predict_spawn(&self, n: usize) -> Entity {
        if n < self.free.len() {
            let index = self.free[self.free.len() - 1 - n];
            Entity { index, generation: self.generations[index as usize] }
        } else {
            let index = self.generations.len() as u32 + (n - self.free.len()) as u32;
            Entity { index, generation: 0 }
        }
    }

    pub(crate) fn is_alive(&self, entity: Entity) -> bool {
        self.generations
            .get(entity.index as usize)
            .is_some_and(|&g| g == entity.generation)
    }

    /// High-water mark of ever-spawned slots (including currently-free ones).
    pub(crate) fn len(&self) -> usize {
        self.generations.len()
    }

    pub(crate) fn iter_alive(&self) -> impl Iterator<Item = Entity> + '_ {
        (0..self.generations.len() as u32)
            .filter(|i| !self.free.contains(i))
            .map(|i| Entity { index: i, generation: self.generations[i as usize] })
    }

    /// Returns `true` if the entity was alive and is now retired.
    pub(crate) fn despawn(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.generations[entity.index as usize] = entity.generation.wrapping_add(1);
        self.free.push(entity.index);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reused_index_gets_new_generation() {
        let mut entities = Entities::default();
        let e0 = entities.spawn();
        assert!(entities.despawn(e0));
        let e1 = entities.spawn();
        assert_eq!(e0.index(), e1.index());
        assert_ne!(e0.generation(), e1.generation());
        assert!(!entities.is_alive(e0));
        assert!(entities.is_alive(e1));
    }

    #[test]
    fn predict_spawn_matches_actual_spawn_order_after_a_despawn() {
        let mut entities = Entities::default();
        let a = entities.spawn();
        let _b = entities.spawn();
        entities.despawn(a);

        // One free slot (a's), then fresh growth: predictions for n=0,1,2
        // must match what three real `spawn()` calls produce, in order.
        let predicted: Vec<Entity> = (0..3).map(|n| entities.predict_spawn(n)).collect();
        let actual = [entities.spawn(), entities.spawn(), entities.spawn()];

        assert_eq!(predicted[0].index(), actual[0].index());
        assert_eq!(predicted[0].generation(), actual[0].generation());
        assert_eq!(predicted[1].index(), actual[1].index());
        assert_eq!(predicted[1].generation(), actual[1].generation());
        assert_eq!(predicted[2].index(), actual[2].index());
        assert_eq!(predicted[2].generation(), actual[2].generation());
    }
}
