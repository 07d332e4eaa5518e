//! Typed observer lists.
//!
//! Every body exposes one [`Observers`] list per notification kind. Subscribing
//! returns a [`ListenerToken`]; handing the token back to
//! [`Observers::unsubscribe`] removes exactly that listener. The storage itself
//! is never exposed.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

/// Opaque handle identifying one subscription within an [`Observers`] list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(u32);

/// An ordered list of listeners sharing one callback signature `F`.
///
/// Listeners run in subscription order.
pub struct Observers<F: ?Sized> {
    next_token: u32,
    entries: Vec<(ListenerToken, Box<F>)>,
}

impl<F: ?Sized> Observers<F> {
    pub fn new() -> Self {
        Self {
            next_token: 0,
            entries: Vec::new(),
        }
    }

    fn subscribe_boxed(&mut self, listener: Box<F>) -> ListenerToken {
        let token = ListenerToken(self.next_token);
        self.next_token = self.next_token.wrapping_add(1);
        self.entries.push((token, listener));
        token
    }

    /// Remove the listener registered under `token`.
    ///
    /// Returns `false` if the token is unknown (already removed, or issued by
    /// another list).
    pub fn unsubscribe(&mut self, token: ListenerToken) -> bool {
        match self.entries.iter().position(|(t, _)| *t == token) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    fn listeners_mut(&mut self) -> impl Iterator<Item = &mut Box<F>> {
        self.entries.iter_mut().map(|(_, listener)| listener)
    }
}

impl<F: ?Sized> Default for Observers<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> fmt::Debug for Observers<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("listeners", &self.entries.len())
            .finish()
    }
}

impl<T: ?Sized> Observers<dyn FnMut(&T)> {
    /// Register a listener that receives a reference to the new value.
    pub fn subscribe(&mut self, listener: impl FnMut(&T) + 'static) -> ListenerToken {
        self.subscribe_boxed(Box::new(listener))
    }

    /// Invoke every listener with `value`.
    pub fn emit(&mut self, value: &T) {
        for listener in self.listeners_mut() {
            listener(value);
        }
    }
}

impl<T: ?Sized, C: ?Sized> Observers<dyn FnMut(&T, &mut C)> {
    /// Register a listener that also receives a mutable context.
    pub fn subscribe(&mut self, listener: impl FnMut(&T, &mut C) + 'static) -> ListenerToken {
        self.subscribe_boxed(Box::new(listener))
    }

    /// Invoke every listener with `value` and the shared context.
    pub fn emit(&mut self, value: &T, context: &mut C) {
        for listener in self.listeners_mut() {
            listener(value, context);
        }
    }
}
