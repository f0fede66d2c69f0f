use std::sync::Arc;

use tokio::sync::watch;

/// Two-way binding between a form field and the value it edits.
///
/// The form owns the value; widgets read it and write through the binding.
/// Clones share the same value.
#[derive(Debug)]
pub struct FieldBinding<T> {
    name: Arc<str>,
    value: Arc<watch::Sender<Option<T>>>,
}

impl<T> Clone for FieldBinding<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            value: self.value.clone(),
        }
    }
}

impl<T> FieldBinding<T> {
    pub fn new<N: Into<Arc<str>>>(name: N, initial: Option<T>) -> Self {
        let (value, _) = watch::channel(initial);
        Self {
            name: name.into(),
            value: Arc::new(value),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self) -> watch::Ref<'_, Option<T>> {
        self.value.borrow()
    }

    pub fn is_set(&self) -> bool {
        self.value.borrow().is_some()
    }

    /// Replace the bound value, returning the previous one.
    pub fn set(&self, value: Option<T>) -> Option<T> {
        self.value.send_replace(value)
    }
}

impl<T: Clone> FieldBinding<T> {
    pub fn cloned(&self) -> Option<T> {
        self.value.borrow().clone()
    }
}
