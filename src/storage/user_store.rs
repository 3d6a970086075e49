use crate::common::{PipelineError, Result};
use crate::core::Embedding;
use std::collections::BTreeMap;

pub type UserId = u32;

/// Where known users and their embeddings live.
///
/// Ids are handed out by `allocate_next_id` when an enrollment starts and
/// only get a record once the first embedding is appended.
pub trait UserRepository: Send {
    fn allocate_next_id(&mut self) -> UserId;
    fn append_embedding(&mut self, id: UserId, embedding: Embedding) -> Result<()>;
    fn lookup(&self, id: UserId) -> Option<&[Embedding]>;
    /// Users with at least one embedding, ascending.
    fn user_ids(&self) -> Vec<UserId>;
}

impl<R: UserRepository + ?Sized> UserRepository for Box<R> {
    fn allocate_next_id(&mut self) -> UserId {
        (**self).allocate_next_id()
    }

    fn append_embedding(&mut self, id: UserId, embedding: Embedding) -> Result<()> {
        (**self).append_embedding(id, embedding)
    }

    fn lookup(&self, id: UserId) -> Option<&[Embedding]> {
        (**self).lookup(id)
    }

    fn user_ids(&self) -> Vec<UserId> {
        (**self).user_ids()
    }
}

/// Process-lifetime store; nothing survives a restart.
#[derive(Debug)]
pub struct InMemoryUserStore {
    users: BTreeMap<UserId, Vec<Embedding>>,
    next_id: UserId,
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self { users: BTreeMap::new(), next_id: 1 }
    }
}

impl UserRepository for InMemoryUserStore {
    fn allocate_next_id(&mut self) -> UserId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn append_embedding(&mut self, id: UserId, embedding: Embedding) -> Result<()> {
        if id == 0 || id >= self.next_id {
            return Err(PipelineError::UnknownUser(id));
        }
        if embedding.is_empty() {
            return Err(PipelineError::Storage(format!("Empty embedding for user {}", id)));
        }

        let entry = self.users.entry(id).or_default();
        entry.push(embedding);
        tracing::debug!("User {} now has {} embedding(s)", id, entry.len());
        Ok(())
    }

    fn lookup(&self, id: UserId) -> Option<&[Embedding]> {
        self.users.get(&id).map(Vec::as_slice)
    }

    fn user_ids(&self) -> Vec<UserId> {
        self.users.keys().copied().collect()
    }
}
