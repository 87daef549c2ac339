//! Coarse reader/writer sharing of an arena tree.
//!
//! All mutations serialize behind the exclusive lock; reads (`get`, `walk`,
//! `resolve_alternatives`, ...) may run concurrently while no write is held.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::tree::ArenaTree;

#[derive(Debug, Clone, Default)]
pub struct SharedArenaTree {
    inner: Arc<RwLock<ArenaTree>>,
}

impl From<ArenaTree> for SharedArenaTree {
    fn from(tree: ArenaTree) -> Self {
        Self {
            inner: Arc::new(RwLock::new(tree)),
        }
    }
}

impl SharedArenaTree {
    /// Runs `f` under the shared lock.
    pub fn read<R>(&self, f: impl FnOnce(&ArenaTree) -> R) -> R {
        f(&self.inner.read())
    }

    /// Runs `f` under the exclusive lock.
    pub fn write<R>(&self, f: impl FnOnce(&mut ArenaTree) -> R) -> R {
        f(&mut self.inner.write())
    }

    /// Returns the tree if this is the last handle.
    pub fn try_unwrap(self) -> Result<ArenaTree, Self> {
        Arc::try_unwrap(self.inner)
            .map(RwLock::into_inner)
            .map_err(|inner| Self { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_concurrent_readers_after_single_writer() {
        let shared = SharedArenaTree::default();
        let root = shared
            .write(|tree| {
                let arena = tree.arena_mut();
                let root = arena.allocate("root")?;
                for i in 0..10 {
                    let child = arena.allocate(format!("file{i}.json"))?;
                    arena.attach_child(root, child)?;
                }
                Ok::<_, crate::domain::DomainError>(root)
            })
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || shared.read(|tree| tree.walk(root).unwrap().count()))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 11);
        }

        let tree = shared.try_unwrap().unwrap();
        assert_eq!(tree.len(), 11);
    }
}
