//! Ownership of the active puppet: load, swap and release.
//!
//! The slot is a tagged state machine:
//!
//! ```text
//! Empty ──load──▶ Loading{None} ──ok──▶ Active ──load──▶ Loading{Some(prev)} ──ok──▶ Active'
//!                       │                                      │
//!                       └──────────err──▶ Empty                └──err──▶ Active(prev)
//! any ──destroy──▶ Destroyed
//! ```
//!
//! A [`ReloadGuard`] exists exactly while the slot is `Loading`. Loads requested while it is held
//! are dropped, not queued.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::Instrument;

use crate::foundation::core::PixelSize;
use crate::foundation::error::{PuppetError, PuppetResult};
use crate::puppet::instance::PuppetInstance;
use crate::puppet::loader::{LocalBoxFuture, PuppetLoader, PuppetSource};
use crate::render::context::SharedContext;

/// State of the puppet slot.
#[derive(Debug, Default)]
pub enum PuppetSlot {
    /// Nothing loaded.
    #[default]
    Empty,
    /// A swap is in flight; `previous` keeps drawing until it completes.
    Loading { previous: Option<PuppetInstance> },
    /// The installed puppet.
    Active(PuppetInstance),
    /// Terminal. Completing loads release their instance instead of installing it.
    Destroyed,
}

impl PuppetSlot {
    fn drawable_mut(&mut self) -> Option<&mut PuppetInstance> {
        match self {
            Self::Active(i) => Some(i),
            Self::Loading { previous } => previous.as_mut(),
            Self::Empty | Self::Destroyed => None,
        }
    }

    fn drawable(&self) -> Option<&PuppetInstance> {
        match self {
            Self::Active(i) => Some(i),
            Self::Loading { previous } => previous.as_ref(),
            Self::Empty | Self::Destroyed => None,
        }
    }
}

/// Data-free view of [`PuppetSlot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// Nothing loaded.
    Empty,
    /// A swap is in flight.
    Loading,
    /// A puppet is installed.
    Active,
    /// Torn down; loads are discarded.
    Destroyed,
    /// The slot is mid-update (a drawable puppet is being updated or swapped in), so its state
    /// cannot be read right now.
    Busy,
}

/// Result of a [`PuppetLifecycle::load`] call that did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The new puppet is active.
    Installed,
    /// Another load was in flight; nothing was done.
    Ignored,
    /// The lifecycle was destroyed; the new puppet was released without being installed.
    Discarded,
}

/// RAII token for an in-flight swap.
///
/// Dropping it without [`ReloadGuard::commit`] puts the previous instance back.
#[derive(Debug)]
pub struct ReloadGuard {
    slot: Rc<RefCell<PuppetSlot>>,
    armed: bool,
}

impl ReloadGuard {
    /// Move the slot to `Loading`. Returns the outcome to report instead when a guard cannot be
    /// taken.
    fn acquire(slot: &Rc<RefCell<PuppetSlot>>) -> Result<Self, LoadOutcome> {
        let Ok(mut s) = slot.try_borrow_mut() else {
            return Err(LoadOutcome::Ignored);
        };
        let next = match std::mem::take(&mut *s) {
            PuppetSlot::Empty => PuppetSlot::Loading { previous: None },
            PuppetSlot::Active(i) => PuppetSlot::Loading { previous: Some(i) },
            busy @ PuppetSlot::Loading { .. } => {
                *s = busy;
                return Err(LoadOutcome::Ignored);
            }
            PuppetSlot::Destroyed => {
                *s = PuppetSlot::Destroyed;
                return Err(LoadOutcome::Discarded);
            }
        };
        *s = next;
        Ok(Self {
            slot: Rc::clone(slot),
            armed: true,
        })
    }

    /// Install `instance`, releasing the previous one, or release `instance` if the lifecycle
    /// was destroyed meanwhile.
    fn commit(mut self, instance: PuppetInstance, context: &SharedContext) -> PuppetResult<LoadOutcome> {
        let mut ctx = context
            .try_borrow_mut()
            .map_err(|_| PuppetError::context("drawing context is busy"))?;
        let mut slot = self
            .slot
            .try_borrow_mut()
            .map_err(|_| PuppetError::context("puppet slot is busy"))?;
        self.armed = false;

        match std::mem::take(&mut *slot) {
            PuppetSlot::Loading { previous } => {
                if let Some(prev) = previous {
                    prev.release(&mut **ctx);
                }
                tracing::info!(name = instance.name(), "puppet swapped in");
                *slot = PuppetSlot::Active(instance);
                Ok(LoadOutcome::Installed)
            }
            PuppetSlot::Destroyed => {
                instance.release(&mut **ctx);
                *slot = PuppetSlot::Destroyed;
                tracing::info!("load completed after destroy; instance released");
                Ok(LoadOutcome::Discarded)
            }
            other => {
                // Only the guard moves the slot out of Loading.
                instance.release(&mut **ctx);
                *slot = other;
                Err(PuppetError::context("puppet slot left Loading while a guard was held"))
            }
        }
    }
}

impl Drop for ReloadGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(mut slot) = self.slot.try_borrow_mut() else {
            tracing::error!("puppet slot busy while abandoning a load; slot stays Loading");
            return;
        };
        *slot = match std::mem::take(&mut *slot) {
            PuppetSlot::Loading { previous } => {
                previous.map_or(PuppetSlot::Empty, PuppetSlot::Active)
            }
            other => other,
        };
    }
}

/// Cloneable handle owning the puppet slot.
#[derive(Clone)]
pub struct PuppetLifecycle {
    slot: Rc<RefCell<PuppetSlot>>,
    loader: Rc<dyn PuppetLoader>,
    context: SharedContext,
    seed: u64,
}

impl std::fmt::Debug for PuppetLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PuppetLifecycle")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl PuppetLifecycle {
    pub fn new(loader: Rc<dyn PuppetLoader>, context: SharedContext, seed: u64) -> Self {
        Self {
            slot: Rc::new(RefCell::new(PuppetSlot::Empty)),
            loader,
            context,
            seed,
        }
    }

    pub fn state(&self) -> LifecycleState {
        match self.slot.try_borrow() {
            Ok(s) => match &*s {
                PuppetSlot::Empty => LifecycleState::Empty,
                PuppetSlot::Loading { .. } => LifecycleState::Loading,
                PuppetSlot::Active(_) => LifecycleState::Active,
                PuppetSlot::Destroyed => LifecycleState::Destroyed,
            },
            Err(_) => LifecycleState::Busy,
        }
    }

    /// Return `true` when a swap is in flight.
    pub fn is_loading(&self) -> bool {
        self.state() == LifecycleState::Loading
    }

    /// Load `source` and swap it in.
    ///
    /// The guard is taken synchronously: a second call made before the first future completes
    /// resolves to [`LoadOutcome::Ignored`] even if the first future has not been polled yet.
    pub fn load(&self, source: PuppetSource) -> LocalBoxFuture<'static, PuppetResult<LoadOutcome>> {
        let guard = match ReloadGuard::acquire(&self.slot) {
            Ok(g) => g,
            Err(outcome) => {
                tracing::debug!(%source, ?outcome, "load request dropped");
                return Box::pin(std::future::ready(Ok(outcome)));
            }
        };
        let loader = Rc::clone(&self.loader);
        let context = Rc::clone(&self.context);
        let seed = self.seed;

        let span = tracing::info_span!("puppet_load", %source);
        Box::pin(
            async move {
                let loaded = loader.fetch(&source).await.map_err(|e| {
                    tracing::warn!("puppet fetch failed: {e}");
                    as_load_error(e)
                })?;

                let instance = {
                    let mut ctx = context
                        .try_borrow_mut()
                        .map_err(|_| PuppetError::context("drawing context is busy"))?;
                    PuppetInstance::build(loaded, &mut **ctx, seed).map_err(|e| {
                        tracing::warn!("puppet build failed: {e}");
                        as_load_error(e)
                    })?
                };

                guard.commit(instance, &context)
            }
            .instrument(span),
        )
    }

    /// Release the active instance. Safe to call with nothing loaded.
    pub fn release(&self) {
        let Ok(mut ctx) = self.context.try_borrow_mut() else {
            tracing::warn!("drawing context busy; release skipped");
            return;
        };
        let Ok(mut slot) = self.slot.try_borrow_mut() else {
            tracing::warn!("puppet slot busy; release skipped");
            return;
        };
        match std::mem::take(&mut *slot) {
            PuppetSlot::Active(i) => i.release(&mut **ctx),
            PuppetSlot::Loading { previous } => {
                if let Some(i) = previous {
                    i.release(&mut **ctx);
                }
                *slot = PuppetSlot::Loading { previous: None };
            }
            other => *slot = other,
        }
    }

    /// Release everything and refuse further loads.
    pub fn destroy(&self) {
        self.release();
        if let Ok(mut slot) = self.slot.try_borrow_mut() {
            *slot = PuppetSlot::Destroyed;
        }
        tracing::debug!("puppet lifecycle destroyed");
    }

    /// Run `f` on the drawable instance: the active one, or the previous one while loading.
    ///
    /// Returns `None` when nothing is drawable or the slot is already borrowed (mid-update).
    pub fn with_drawable<R>(&self, f: impl FnOnce(&mut PuppetInstance) -> R) -> Option<R> {
        let mut slot = self.slot.try_borrow_mut().ok()?;
        slot.drawable_mut().map(f)
    }

    /// Native canvas size of the drawable instance.
    pub fn model_canvas_size(&self) -> Option<PixelSize> {
        let slot = self.slot.try_borrow().ok()?;
        slot.drawable().map(PuppetInstance::canvas_size)
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }
}

fn as_load_error(e: PuppetError) -> PuppetError {
    if e.is_load() {
        e
    } else {
        PuppetError::load(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/puppet/lifecycle.rs"]
mod tests;
