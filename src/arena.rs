//! Generational arena used for lines, tree nodes, markers, documents and editors.
//!
//! Slots are recycled through a free list; every slot carries a generation so
//! that an id held past the removal of its value never resolves to whatever
//! reuses the slot.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// Raw slot index plus generation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawId {
    slot: u32,
    generation: u32,
}

impl fmt::Debug for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.slot, self.generation)
    }
}

/// Typed id wrapper stored in an [`Arena`].
pub trait ArenaId: Copy + Eq {
    fn from_raw(raw: RawId) -> Self;
    fn raw(self) -> RawId;
}

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name($crate::arena::RawId);

        impl $crate::arena::ArenaId for $name {
            fn from_raw(raw: $crate::arena::RawId) -> Self {
                Self(raw)
            }

            fn raw(self) -> $crate::arena::RawId {
                self.0
            }
        }
    };
}

pub(crate) use arena_id;

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage with a free list.
#[derive(Clone, Debug)]
pub struct Arena<I, T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    len: usize,
    _id: PhantomData<I>,
}

impl<I, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            _id: PhantomData,
        }
    }
}

impl<I: ArenaId, T> Arena<I, T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: T) -> I {
        self.len += 1;
        if let Some(slot) = self.free_list.pop() {
            let entry = &mut self.slots[slot as usize];
            entry.generation = entry.generation.wrapping_add(1);
            entry.value = Some(value);
            return I::from_raw(RawId {
                slot,
                generation: entry.generation,
            });
        }

        let slot = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        I::from_raw(RawId {
            slot,
            generation: 0,
        })
    }

    pub fn remove(&mut self, id: I) -> Option<T> {
        let raw = id.raw();
        let entry = self.slots.get_mut(raw.slot as usize)?;
        if entry.generation != raw.generation {
            return None;
        }
        let value = entry.value.take()?;
        self.free_list.push(raw.slot);
        self.len -= 1;
        Some(value)
    }

    #[must_use]
    pub fn get(&self, id: I) -> Option<&T> {
        let raw = id.raw();
        let entry = self.slots.get(raw.slot as usize)?;
        if entry.generation == raw.generation {
            entry.value.as_ref()
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        let raw = id.raw();
        let entry = self.slots.get_mut(raw.slot as usize)?;
        if entry.generation == raw.generation {
            entry.value.as_mut()
        } else {
            None
        }
    }

    #[must_use]
    pub fn contains(&self, id: I) -> bool {
        self.get(id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Ids of all live values, in slot order.
    #[must_use]
    pub fn ids(&self) -> Vec<I> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.slots.iter().enumerate().filter_map(|(slot, entry)| {
            entry.value.as_ref().map(|value| {
                (
                    I::from_raw(RawId {
                        slot: slot as u32,
                        generation: entry.generation,
                    }),
                    value,
                )
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (I, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(slot, entry)| {
                let generation = entry.generation;
                entry.value.as_mut().map(|value| {
                    (
                        I::from_raw(RawId {
                            slot: slot as u32,
                            generation,
                        }),
                        value,
                    )
                })
            })
    }
}

impl<I: ArenaId + fmt::Debug, T> Index<I> for Arena<I, T> {
    type Output = T;

    /// Panics when `id` is stale. Internal links between lines, nodes and
    /// markers are kept consistent, so this only fires on a logic error.
    fn index(&self, id: I) -> &T {
        match self.get(id) {
            Some(value) => value,
            None => panic!("stale arena id {id:?}"),
        }
    }
}

impl<I: ArenaId + fmt::Debug, T> IndexMut<I> for Arena<I, T> {
    fn index_mut(&mut self, id: I) -> &mut T {
        match self.get_mut(id) {
            Some(value) => value,
            None => panic!("stale arena id {id:?}"),
        }
    }
}
