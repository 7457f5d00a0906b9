//! Keyed document wrapper

use std::ops::Deref;

/// A document together with the key it is stored under.
///
/// Implements `Deref` to allow transparent access to the inner document.
#[derive(Clone, Debug, PartialEq)]
pub struct Stored<Id, T> {
    pub id: Id,
    pub content: T,
}

impl<Id, T> Stored<Id, T> {
    pub fn new(id: Id, content: T) -> Self {
        Self { id, content }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn into_content(self) -> T {
        self.content
    }
}

impl<Id, T> Deref for Stored<Id, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.content
    }
}
