//! Client-side cache of one entity type.
//!
//! The cache is a projection of the server: list fetches replace it wholesale
//! and writes replace single entries with whatever the server returned. Every
//! fetch is tagged with a [`FetchToken`]; a response whose token is older than
//! the last one applied is dropped, so a slow fetch can never overwrite the
//! result of a newer one.
//!
//! Writes are remembered with the fetch sequence current when they landed. A
//! fetch issued before a write may carry a snapshot from before it, so when
//! that fetch is applied the later writes are laid back over it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::model::Entity;

pub type SharedStore<T> = Arc<Mutex<EntityStore<T>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchToken(u64);

#[derive(Debug)]
enum Write<T> {
  Put { entity: T, front: bool },
  Removed,
}

#[derive(Debug)]
struct Written<T> {
  /// Value of `issued` when the write landed.
  seq: u64,
  write: Write<T>,
}

#[derive(Debug)]
pub struct EntityStore<T> {
  name: &'static str,
  items: Vec<T>,
  issued: u64,
  applied: u64,
  written: HashMap<Uuid, Written<T>>,
  submitting: HashSet<Uuid>,
}

impl<T: Entity> EntityStore<T> {
  pub fn new(name: &'static str) -> Self {
    Self {
      name,
      items: Vec::new(),
      issued: 0,
      applied: 0,
      written: HashMap::new(),
      submitting: HashSet::new(),
    }
  }

  pub fn into_shared(self) -> SharedStore<T> {
    Arc::new(Mutex::new(self))
  }

  pub fn begin_fetch(&mut self) -> FetchToken {
    self.issued += 1;
    debug!("{}: fetch #{} started", self.name, self.issued);
    FetchToken(self.issued)
  }

  /// Applies a fetched collection unless a newer fetch already landed.
  /// Writes made after the fetch was issued win over its snapshot.
  /// Returns whether the collection was applied.
  pub fn complete_fetch(&mut self, token: FetchToken, items: Vec<T>) -> bool {
    if token.0 <= self.applied {
      warn!(
        "{}: discarding stale fetch #{} (already applied #{})",
        self.name, token.0, self.applied
      );
      return false;
    }
    debug!("{}: fetch #{} applied ({} items)", self.name, token.0, items.len());
    self.applied = token.0;
    self.items = items;

    // Writes older than this fetch are already in its snapshot, and every
    // fetch still able to apply was issued after this one.
    self.written.retain(|_, w| w.seq >= token.0);
    let later: Vec<(Uuid, Write<T>)> = self
      .written
      .iter()
      .map(|(id, w)| {
        let write = match &w.write {
          Write::Put { entity, front } => Write::Put {
            entity: entity.clone(),
            front: *front,
          },
          Write::Removed => Write::Removed,
        };
        (*id, write)
      })
      .collect();
    for (id, write) in later {
      debug!("{}: keeping write to {id} over fetch #{}", self.name, token.0);
      match write {
        Write::Put { entity, front } => {
          if let Err(entity) = self.try_replace(entity) {
            if front {
              self.items.insert(0, entity);
            } else {
              self.items.push(entity);
            }
          }
        }
        Write::Removed => {
          self.items.retain(|e| e.id() != id);
        }
      }
    }
    true
  }

  pub fn items(&self) -> &[T] {
    &self.items
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn get(&self, id: Uuid) -> Option<&T> {
    self.items.iter().find(|e| e.id() == id)
  }

  pub fn contains(&self, id: Uuid) -> bool {
    self.get(id).is_some()
  }

  fn record(&mut self, id: Uuid, write: Write<T>) {
    let seq = self.issued;
    self.written.insert(id, Written { seq, write });
  }

  /// Replaces the cached entity in full. Returns false, leaving the cache
  /// alone, if it was not cached.
  pub fn replace(&mut self, entity: T) -> bool {
    let id = entity.id();
    match self.try_replace(entity.clone()) {
      Ok(()) => {
        self.record(id, Write::Put { entity, front: false });
        true
      }
      Err(_) => false,
    }
  }

  /// Replaces the cached entity, or appends it when it is new.
  pub fn upsert(&mut self, entity: T) {
    self.record(
      entity.id(),
      Write::Put {
        entity: entity.clone(),
        front: false,
      },
    );
    if let Err(entity) = self.try_replace(entity) {
      self.items.push(entity);
    }
  }

  pub fn insert_front(&mut self, entity: T) {
    self.record(
      entity.id(),
      Write::Put {
        entity: entity.clone(),
        front: true,
      },
    );
    if let Err(entity) = self.try_replace(entity) {
      self.items.insert(0, entity);
    }
  }

  fn try_replace(&mut self, entity: T) -> std::result::Result<(), T> {
    match self.items.iter().position(|e| e.id() == entity.id()) {
      Some(i) => {
        self.items[i] = entity;
        Ok(())
      }
      None => Err(entity),
    }
  }

  pub fn remove(&mut self, id: Uuid) -> Option<T> {
    self.record(id, Write::Removed);
    let pos = self.items.iter().position(|e| e.id() == id)?;
    Some(self.items.remove(pos))
  }

  /// Drops every entity `keep` rejects; each drop counts as a removal.
  pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
    let dropped: Vec<Uuid> = self
      .items
      .iter()
      .filter(|e| !keep(*e))
      .map(Entity::id)
      .collect();
    for id in dropped {
      self.remove(id);
    }
  }

  pub fn is_submitting(&self, id: Uuid) -> bool {
    self.submitting.contains(&id)
  }
}

pub fn lock<T>(store: &SharedStore<T>) -> MutexGuard<'_, EntityStore<T>> {
  store.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks one entity as having a write in flight until dropped.
pub struct SubmitGuard<T: Entity> {
  store: SharedStore<T>,
  id: Uuid,
}

impl<T: Entity> SubmitGuard<T> {
  /// `None` when a write for the same entity is already in flight.
  pub fn acquire(store: &SharedStore<T>, id: Uuid) -> Option<Self> {
    let mut s = lock(store);
    if !s.submitting.insert(id) {
      return None;
    }
    Some(Self {
      store: store.clone(),
      id,
    })
  }
}

impl<T: Entity> Drop for SubmitGuard<T> {
  fn drop(&mut self) {
    lock(&self.store).submitting.remove(&self.id);
  }
}
