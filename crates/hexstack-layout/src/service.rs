//! Host entry points: lifecycle, event intake, and maintenance.
//!
//! # Lifecycle
//!
//! [`LayoutService::initialize`] drops any earlier subscription, clears all
//! tables, subscribes afresh, and seeds occupancy from the scene without
//! touching a single entity. [`LayoutService::cleanup`] unsubscribes and
//! clears. Both are idempotent.
//!
//! # Intake
//!
//! Notifications are routed synchronously by [`notify`](LayoutService::notify)
//! (the host may deliver them from inside one of our writes) and the layout
//! work they produce is queued. [`drain`](LayoutService::drain) runs that
//! queue to completion.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use hexstack_topology::GridBackend;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::engine::{LayoutEngine, LayoutTask};
use crate::error::{Error, MutationError, Result};
use crate::guard::Guarded;
use crate::host::{EntityPatch, HostContext, HostEvent, Listener, SubscriptionId};
use crate::router::EventRouter;
use crate::scale::{approximate_scale, scale_differs, BASELINE_SCALE};
use crate::state::LayoutState;

/// Outcome of [`LayoutService::reset_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    /// Entities rescaled to baseline.
    pub reset: usize,
    /// Entities already at baseline, vanished, or busy.
    pub skipped: usize,
    /// Entities whose write the host rejected.
    pub failed: usize,
}

pub struct LayoutService<G> {
    host: HostContext<G>,
    state: LayoutState,
    queue: RefCell<VecDeque<LayoutTask>>,
    subscription: Cell<Option<SubscriptionId>>,
}

impl<G: GridBackend + 'static> LayoutService<G> {
    pub fn new(host: HostContext<G>) -> Rc<Self> {
        Rc::new(Self {
            host,
            state: LayoutState::new(),
            queue: RefCell::new(VecDeque::new()),
            subscription: Cell::new(None),
        })
    }

    /// Reset state, subscribe, and seed occupancy from the scene.
    ///
    /// Returns the number of entities seeded. Issues no mutations.
    pub fn initialize(self: &Rc<Self>) -> usize {
        self.unsubscribe();
        self.state.clear();
        self.queue.borrow_mut().clear();

        let weak = Rc::downgrade(self);
        let listener: Listener = Rc::new(move |event: &HostEvent| {
            if let Some(service) = weak.upgrade() {
                service.notify(event);
            }
        });
        self.subscription.set(Some(self.host.notifications.subscribe(listener)));

        let settings = self.host.settings.current();
        let router = self.router();
        let entities = self.host.directory.entities();
        for snapshot in &entities {
            let cell = router.cell_of_snapshot(snapshot, &settings);
            self.state.occupancy_mut().place(cell, snapshot.id);
        }

        info!(
            entities = entities.len(),
            cells = self.state.occupancy().len(),
            grid_api = ?self.host.grid.api(),
            "Layout initialized"
        );
        entities.len()
    }

    /// Unsubscribe and clear all state.
    pub fn cleanup(&self) {
        let was_active = self.unsubscribe();
        self.state.clear();
        self.queue.borrow_mut().clear();
        if was_active {
            info!("Layout cleaned up");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.subscription.get().is_some()
    }

    pub fn state(&self) -> &LayoutState {
        &self.state
    }

    pub fn host(&self) -> &HostContext<G> {
        &self.host
    }

    /// Tasks waiting for [`drain`](Self::drain).
    pub fn queued(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Route one notification. Returns true if it produced layout work.
    pub fn notify(&self, event: &HostEvent) -> bool {
        if !self.is_initialized() {
            trace!(?event, "Notification before initialize, ignoring");
            return false;
        }
        match self.router().accept(event) {
            Some(task) => {
                self.queue.borrow_mut().push_back(task);
                true
            }
            None => false,
        }
    }

    /// Run queued layout work, including work queued while draining.
    ///
    /// Every task runs even if an earlier one fails; the first failure is
    /// returned. Returns the number of tasks run otherwise.
    pub async fn drain(&self) -> Result<usize> {
        let engine = LayoutEngine::new(&self.state, &self.host);
        let mut ran = 0;
        let mut first_error = None;

        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(task) = next else {
                break;
            };
            ran += 1;
            if let Err(e) = engine.run(task).await {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(ran),
        }
    }

    /// [`notify`](Self::notify) followed by [`drain`](Self::drain).
    pub async fn handle(&self, event: &HostEvent) -> Result<usize> {
        if !self.is_initialized() {
            return Err(Error::NotInitialized);
        }
        self.notify(event);
        self.drain().await
    }

    /// Put every entity in the scene back at baseline scale.
    ///
    /// Positions are left alone. Failures are logged and counted, never
    /// propagated.
    pub async fn reset_all(&self) -> ResetReport {
        let settings = self.host.settings.current();
        let mut report = ResetReport::default();

        for snapshot in self.host.directory.entities() {
            let id = snapshot.id;
            let current = approximate_scale(&snapshot, &settings.scale_fields);
            if !scale_differs(current, BASELINE_SCALE) {
                report.skipped += 1;
                continue;
            }

            let sink = &self.host.sink;
            let patch = EntityPatch::default().with_scale(BASELINE_SCALE);
            let outcome = self
                .state
                .guard()
                .guarded_update(id, || sink.update(id, patch))
                .await;

            match outcome {
                Ok(Guarded::Applied(())) => report.reset += 1,
                Ok(Guarded::Skipped) | Err(MutationError::Gone(_)) => report.skipped += 1,
                Err(e) => {
                    warn!(entity = %id, error = %e, "Scale reset failed");
                    report.failed += 1;
                }
            }
        }

        self.state.guard().clear_arranged();
        info!(
            reset = report.reset,
            skipped = report.skipped,
            failed = report.failed,
            "Scale reset complete"
        );
        report
    }

    fn router(&self) -> EventRouter<'_, G> {
        EventRouter::new(&self.state, &self.host)
    }

    fn unsubscribe(&self) -> bool {
        match self.subscription.take() {
            Some(id) => {
                debug!(subscription = id.0, "Unsubscribing");
                self.host.notifications.unsubscribe(id);
                true
            }
            None => false,
        }
    }
}

impl<G> Drop for LayoutService<G> {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.host.notifications.unsubscribe(id);
        }
    }
}
