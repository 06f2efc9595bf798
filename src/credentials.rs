//! Paid-credential side channel used by the higher-tier image model.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Answers whether a paid credential is selected and lets the user pick one.
#[async_trait]
pub trait CredentialSelector: Send + Sync {
    /// Returns true when a valid paid credential has been selected.
    async fn has_selected_credential(&self) -> bool;

    /// Asks the user to select a credential. Completion says nothing about
    /// whether one was actually chosen.
    async fn open_selector(&self);
}

/// What to do after the selector closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReauthPolicy {
    /// Query the selector again and refuse to proceed without a credential.
    #[default]
    Recheck,
    /// Assume the user picked a credential and proceed.
    Optimistic,
}

/// A selector with a fixed answer that counts how often it was opened.
///
/// Opening it can optionally flip the answer to `true`, which models a user
/// who completes the selection.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    selected: AtomicBool,
    select_on_open: bool,
    opened: AtomicUsize,
}

impl StaticCredentials {
    /// Creates a selector that reports `selected`.
    pub fn new(selected: bool) -> Self {
        Self {
            selected: AtomicBool::new(selected),
            select_on_open: false,
            opened: AtomicUsize::new(0),
        }
    }

    /// Makes `open_selector` mark the credential as selected.
    pub fn selecting_on_open(mut self) -> Self {
        self.select_on_open = true;
        self
    }

    /// Returns how many times the selector was opened.
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSelector for StaticCredentials {
    async fn has_selected_credential(&self) -> bool {
        self.selected.load(Ordering::SeqCst)
    }

    async fn open_selector(&self) {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if self.select_on_open {
            self.selected.store(true, Ordering::SeqCst);
        }
    }
}
