#![forbid(unsafe_code)]

//! Wires gesture output to the state store and the overlay host.
//!
//! The [`Coordinator`] owns one [`GestureEngine`] per live instance and routes
//! each pointer to the surface it first landed on. Engine output splits into
//! two paths:
//!
//! - **feedback** (`MoveDelta`, `ResizeFeedback`, `Cancel`) only touches the
//!   overlay host;
//! - **commits** (`MoveFinal`, `ResizeFinal`, taps, `LockToggle`) go through
//!   [`InstanceStateStore::update`] and are then reconciled on the host.
//!
//! # Pointer routing
//!
//! A pointer-down is hit-tested against the host's z-order and the hit
//! surface is raised. A down that misses every surface goes to the single
//! surface with an open session, if exactly one exists; otherwise it passes
//! through. Later events of the same pointer follow its down.
//!
//! # Lock-all
//!
//! If any live instance of the type is unlocked, every unlocked one is locked
//! and marked `locked_by_bulk`. Otherwise exactly the bulk-marked instances
//! are unlocked, so a manual lock survives a bulk unlock.

use std::sync::Arc;

use ahash::AHashMap;
use flotilla_core::{
    ControlAction, FeatureType, GestureConfig, GestureEngine, HotZone, InstanceId, InstanceKey,
    InstanceState, InteractionEvent, PointerEvent, PointerEventKind, PointerId, Rect, Size,
    SurfaceContext, TapTarget,
};

use crate::config::{ConfigError, FlotillaConfig};
use crate::error::CoordinatorError;
use crate::overlay_host::{HostContainer, OverlayHost, resolve_frame};
use crate::registry::InstanceRegistry;
use crate::state_store::{ChangeFeed, InstanceStateStore};
use crate::storage::StoredRecord;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// External settings UI. Edits flow back through [`InstanceStateStore::update`].
pub trait SettingsCollaborator {
    fn open_settings(&mut self, key: InstanceKey, state: &InstanceState);
}

/// Settings collaborator that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSettings;

impl SettingsCollaborator for NoopSettings {
    fn open_settings(&mut self, _key: InstanceKey, _state: &InstanceState) {}
}

/// Control hot zones drawn on each surface.
pub trait ControlLayout {
    /// Zones relative to the surface origin for a surface of `size`.
    fn hot_zones(&self, feature: FeatureType, size: Size) -> Vec<HotZone>;
}

/// A row of square buttons centred along the top edge
/// (lock, highlight, settings, close) and a controls toggle centred on the
/// bottom edge. Lock and the controls toggle stay active while hidden.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultControls {
    pub button: f32,
}

impl Default for DefaultControls {
    fn default() -> Self {
        Self { button: 32.0 }
    }
}

impl ControlLayout for DefaultControls {
    fn hot_zones(&self, _feature: FeatureType, size: Size) -> Vec<HotZone> {
        const TOP_ROW: [ControlAction; 4] = [
            ControlAction::ToggleLock,
            ControlAction::ToggleHighlight,
            ControlAction::OpenSettings,
            ControlAction::Close,
        ];
        let b = self.button;
        let row_x = (size.width - b * TOP_ROW.len() as f32) / 2.0;
        let mut zones: Vec<HotZone> = TOP_ROW
            .iter()
            .enumerate()
            .map(|(i, action)| {
                let zone = HotZone::new(Rect::new(row_x + b * i as f32, 0.0, b, b), *action);
                if *action == ControlAction::ToggleLock {
                    zone.always_active()
                } else {
                    zone
                }
            })
            .collect();
        zones.push(
            HotZone::new(
                Rect::new((size.width - b) / 2.0, size.height - b, b, b),
                ControlAction::ToggleControls,
            )
            .always_active(),
        );
        zones
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What happened to a dispatched pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handled by a surface.
    Consumed,
    /// Not for any surface, or a generic tap on a surface body.
    PassThrough,
    /// A tap on an embedder-defined control.
    Custom { key: InstanceKey, action: u16 },
}

/// Direction taken by [`Coordinator::toggle_lock_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAllOutcome {
    Locked(usize),
    Unlocked(usize),
}

/// A record not restored at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub feature: FeatureType,
    pub id: Option<InstanceId>,
    pub reason: String,
}

/// Result of [`Coordinator::restore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: Vec<InstanceKey>,
    pub skipped: Vec<SkippedRecord>,
}

fn skipped(feature: FeatureType, id: Option<InstanceId>, reason: String) -> SkippedRecord {
    tracing::warn!(%feature, id = ?id.map(InstanceId::get), %reason, "record skipped");
    SkippedRecord {
        feature,
        id,
        reason,
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Lifecycle and interaction entry point for every overlay instance.
pub struct Coordinator<C: HostContainer> {
    registry: Arc<InstanceRegistry>,
    store: Arc<InstanceStateStore>,
    host: OverlayHost<C>,
    gesture: GestureConfig,
    engines: AHashMap<InstanceKey, GestureEngine>,
    routes: AHashMap<PointerId, InstanceKey>,
    changes: Arc<ChangeFeed>,
    settings: Box<dyn SettingsCollaborator>,
    controls: Box<dyn ControlLayout>,
}

impl<C: HostContainer> std::fmt::Debug for Coordinator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("live", &self.engines.len())
            .field("routes", &self.routes.len())
            .field("gesture", &self.gesture)
            .finish_non_exhaustive()
    }
}

impl<C: HostContainer> Coordinator<C> {
    /// Assemble a coordinator around an existing store.
    pub fn new(store: Arc<InstanceStateStore>, container: C, gesture: GestureConfig) -> Self {
        let changes = store.subscribe();
        Self {
            registry: Arc::clone(store.registry()),
            store,
            host: OverlayHost::new(container),
            gesture,
            engines: AHashMap::new(),
            routes: AHashMap::new(),
            changes,
            settings: Box::new(NoopSettings),
            controls: Box::new(DefaultControls::default()),
        }
    }

    /// Build storage, registry and store from configuration.
    pub fn from_config(config: &FlotillaConfig, container: C) -> Result<Self, ConfigError> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }
        let storage = config.open_storage()?;
        let registry = Arc::new(InstanceRegistry::new(config.capacities(), storage));
        let store = Arc::new(InstanceStateStore::new(registry)?);
        Ok(Self::new(store, container, config.to_gesture_config()))
    }

    #[must_use]
    pub fn with_settings(mut self, settings: impl SettingsCollaborator + 'static) -> Self {
        self.settings = Box::new(settings);
        self
    }

    #[must_use]
    pub fn with_controls(mut self, controls: impl ControlLayout + 'static) -> Self {
        self.controls = Box::new(controls);
        self
    }

    // -- lifecycle ----------------------------------------------------------

    /// Re-create every instance found in durable storage.
    ///
    /// Malformed and out-of-range records are skipped, deleted and their
    /// slots left free; ledger entries without a record are reported too.
    /// Ids that are already live are left untouched, so a repeated restore
    /// only adopts what is missing.
    pub fn restore(&mut self) -> RestoreReport {
        let mut report = RestoreReport::default();
        let storage = Arc::clone(self.registry.storage());
        // Pending records and ledgers must be on disk before they are read.
        self.store.flush();

        for feature in FeatureType::ALL {
            let live = self.registry.active_ids(feature);
            // Read the ledger first: adopting records rewrites it.
            let ledger = match storage.read_slots(feature) {
                Ok(ledger) => ledger,
                Err(err) => {
                    report.skipped.push(skipped(feature, None, err.to_string()));
                    Vec::new()
                }
            };
            let records = match storage.read_all(feature) {
                Ok(records) => records,
                Err(err) => {
                    report.skipped.push(skipped(feature, None, err.to_string()));
                    continue;
                }
            };

            let mut seen = Vec::new();
            for record in records {
                let record_id = match &record {
                    StoredRecord::Valid { id, .. } => Some(*id),
                    StoredRecord::Malformed { id, .. } => *id,
                };
                if let Some(id) = record_id.filter(|id| live.contains(id)) {
                    seen.push(id);
                    report
                        .skipped
                        .push(skipped(feature, Some(id), "already live".into()));
                    continue;
                }
                let (id, state) = match record {
                    StoredRecord::Valid { id, state } => (id, state),
                    StoredRecord::Malformed { id, reason } => {
                        if let Some(id) = id {
                            seen.push(id);
                            self.store.delete(InstanceKey::new(feature, id));
                        }
                        report.skipped.push(skipped(feature, id, reason));
                        continue;
                    }
                };
                seen.push(id);
                match self.adopt_record(InstanceKey::new(feature, id), &state) {
                    Ok(key) => report.restored.push(key),
                    Err(reason) => report.skipped.push(skipped(feature, Some(id), reason)),
                }
            }

            for id in ledger
                .into_iter()
                .filter(|id| !seen.contains(id) && !live.contains(id))
            {
                report
                    .skipped
                    .push(skipped(feature, Some(id), "missing record".into()));
            }
        }

        tracing::info!(
            restored = report.restored.len(),
            skipped = report.skipped.len(),
            "restore complete"
        );
        report
    }

    fn adopt_record(
        &mut self,
        key: InstanceKey,
        state: &InstanceState,
    ) -> Result<InstanceKey, String> {
        if !self.registry.register_existing(key.feature, key.id) {
            // Live ids were filtered out before, so this is out of range.
            self.store.delete(key);
            return Err("slot out of range".into());
        }
        // A refused surface keeps its record for the next restore.
        if let Err(err) = self.host.ensure_surface(key, state) {
            self.registry.release(key.feature, key.id);
            return Err(err.to_string());
        }
        if let Err(err) = self.store.adopt(key, state.clone()) {
            self.host.teardown_surface(key);
            self.registry.release(key.feature, key.id);
            return Err(err.to_string());
        }
        self.engines.insert(key, GestureEngine::new(self.gesture));
        Ok(key)
    }

    /// Allocate a slot, seed its state and create its surface.
    pub fn add_instance(&mut self, feature: FeatureType) -> Result<InstanceKey, CoordinatorError> {
        let Some(id) = self.registry.allocate(feature) else {
            let capacity = self.registry.capacity(feature);
            tracing::info!(%feature, capacity, "capacity reached");
            return Err(CoordinatorError::CapacityReached { feature, capacity });
        };
        let key = InstanceKey::new(feature, id);

        // The surface must exist before anything is persisted, so a refusal
        // leaves no record behind.
        if let Err(err) = self.host.ensure_surface(key, &InstanceState::seeded(key)) {
            self.registry.release(feature, id);
            return Err(err.into());
        }
        if let Err(err) = self.store.load(key) {
            self.host.teardown_surface(key);
            self.registry.release(feature, id);
            return Err(err.into());
        }

        self.engines.insert(key, GestureEngine::new(self.gesture));
        tracing::info!(%key, "instance added");
        Ok(key)
    }

    /// Cancel any open gesture, remove the surface, the record and the slot.
    pub fn close_instance(&mut self, key: InstanceKey) -> Result<(), CoordinatorError> {
        if !self.registry.contains(key.feature, key.id) {
            return Err(CoordinatorError::UnknownInstance(key));
        }
        if let Some(mut engine) = self.engines.remove(&key) {
            let _ = engine.cancel();
        }
        self.routes.retain(|_, routed| *routed != key);
        self.host.teardown_surface(key);
        self.store.delete(key);
        self.registry.release(key.feature, key.id);
        tracing::info!(%key, "instance closed");
        Ok(())
    }

    /// Hand the instance to the settings collaborator.
    pub fn request_settings(&mut self, key: InstanceKey) -> Result<(), CoordinatorError> {
        let state = self.store.load(key)?;
        self.settings.open_settings(key, &state);
        Ok(())
    }

    /// Lock or unlock every live instance of `feature` (see module docs).
    pub fn toggle_lock_all(
        &mut self,
        feature: FeatureType,
    ) -> Result<LockAllOutcome, CoordinatorError> {
        let mut states = Vec::new();
        for id in self.registry.active_ids(feature) {
            let key = InstanceKey::new(feature, id);
            states.push((key, self.store.load(key)?));
        }

        let lock = states.iter().any(|(_, state)| !state.locked);
        let targets: Vec<InstanceKey> = states
            .iter()
            .filter(|(_, state)| {
                if lock {
                    !state.locked
                } else {
                    state.locked_by_bulk
                }
            })
            .map(|(key, _)| *key)
            .collect();

        for key in &targets {
            if lock {
                self.cancel_session(*key);
            }
            let state = self.store.update(*key, |state| {
                state.locked = lock;
                state.locked_by_bulk = lock;
            })?;
            self.host.apply_state(*key, &state);
        }

        tracing::info!(%feature, lock, changed = targets.len(), "lock-all");
        Ok(if lock {
            LockAllOutcome::Locked(targets.len())
        } else {
            LockAllOutcome::Unlocked(targets.len())
        })
    }

    /// Cancel every open gesture (platform-forced interruption).
    pub fn cancel_all(&mut self) {
        let keys: Vec<InstanceKey> = self.engines.keys().copied().collect();
        for key in keys {
            self.cancel_session(key);
        }
        self.routes.clear();
    }

    fn cancel_session(&mut self, key: InstanceKey) {
        let cancelled = self
            .engines
            .get_mut(&key)
            .and_then(GestureEngine::cancel)
            .is_some();
        if cancelled {
            self.host.restore_committed(key);
        }
        self.routes.retain(|_, routed| *routed != key);
    }

    /// Re-render surfaces changed through the store by other parties.
    ///
    /// Returns the number of changes applied.
    pub fn sync_state_changes(&mut self) -> usize {
        let mut applied = 0;
        for change in self.changes.drain() {
            let Some(state) = change.state else {
                continue;
            };
            let in_gesture = self
                .engines
                .get(&change.key)
                .is_some_and(|engine| engine.feedback().is_some());
            if in_gesture {
                self.host.set_committed(change.key, &state);
            } else {
                self.host.apply_state(change.key, &state);
            }
            applied += 1;
        }
        applied
    }

    /// Instances with a store change not yet synced.
    #[must_use]
    pub fn pending_changes(&self) -> usize {
        self.changes.len()
    }

    /// Re-read the container extent and re-clamp every surface.
    pub fn container_resized(&mut self) -> usize {
        self.host.container_resized()
    }

    /// Flush every pending durable write.
    pub fn shutdown(&mut self) {
        self.cancel_all();
        self.store.flush();
        tracing::info!("coordinator shut down");
    }

    // -- pointer dispatch ---------------------------------------------------

    /// Route one pointer event to its surface and apply the result.
    pub fn dispatch_pointer(
        &mut self,
        event: &PointerEvent,
    ) -> Result<DispatchOutcome, CoordinatorError> {
        let Some(key) = self.route(event) else {
            return Ok(DispatchOutcome::PassThrough);
        };
        let Some(state) = self.store.peek(key) else {
            self.routes.remove(&event.pointer_id);
            return Ok(DispatchOutcome::PassThrough);
        };

        let committed = self
            .host
            .committed_frame(key)
            .unwrap_or_else(|| resolve_frame(state.frame(), self.host.bounds()));
        let zones = self.controls.hot_zones(key.feature, committed.size());
        let ctx = SurfaceContext {
            frame: committed,
            bounds: self.host.bounds(),
            aspect_locked: state.payload.aspect_locked(),
            locked: state.locked,
            controls_visible: state.controls_visible,
            hot_zones: &zones,
        };

        let events = match self.engines.get_mut(&key) {
            Some(engine) => {
                let events = engine.process(event, &ctx);
                if !engine.is_active() {
                    self.routes.retain(|_, routed| *routed != key);
                }
                events
            }
            None => Vec::new(),
        };
        if matches!(event.kind, PointerEventKind::Up) {
            self.routes.remove(&event.pointer_id);
        }

        let mut outcome = DispatchOutcome::Consumed;
        for interaction in events {
            if let Some(result) = self.apply(key, interaction)? {
                outcome = result;
            }
        }
        Ok(outcome)
    }

    fn route(&mut self, event: &PointerEvent) -> Option<InstanceKey> {
        if let Some(key) = self.routes.get(&event.pointer_id) {
            return Some(*key);
        }
        if event.kind != PointerEventKind::Down {
            return None;
        }
        let key = match self.host.hit_test(event.position) {
            Some(key) => {
                self.host.raise(key);
                key
            }
            None => {
                let mut open = self
                    .engines
                    .iter()
                    .filter(|(_, engine)| engine.is_active())
                    .map(|(key, _)| *key);
                match (open.next(), open.next()) {
                    (Some(key), None) => key,
                    _ => return None,
                }
            }
        };
        self.routes.insert(event.pointer_id, key);
        Some(key)
    }

    fn apply(
        &mut self,
        key: InstanceKey,
        event: InteractionEvent,
    ) -> Result<Option<DispatchOutcome>, CoordinatorError> {
        match event {
            InteractionEvent::MoveDelta { frame, .. }
            | InteractionEvent::ResizeFeedback { frame, .. } => {
                self.host.apply_feedback(key, frame);
            }
            InteractionEvent::MoveFinal { frame } | InteractionEvent::ResizeFinal { frame, .. } => {
                let state = self.store.update(key, |state| {
                    if !state.locked {
                        state.set_frame(frame);
                    }
                })?;
                self.host.apply_state(key, &state);
            }
            InteractionEvent::Cancel => {
                self.host.restore_committed(key);
            }
            InteractionEvent::LockToggle => self.toggle_lock(key)?,
            InteractionEvent::Tap { target, .. } => return self.tap(key, target),
        }
        Ok(None)
    }

    fn toggle_lock(&mut self, key: InstanceKey) -> Result<(), CoordinatorError> {
        let state = self.store.update(key, |state| {
            state.locked = !state.locked;
            state.locked_by_bulk = false;
        })?;
        self.host.apply_state(key, &state);
        Ok(())
    }

    fn tap(
        &mut self,
        key: InstanceKey,
        target: TapTarget,
    ) -> Result<Option<DispatchOutcome>, CoordinatorError> {
        let action = match target {
            TapTarget::Surface => return Ok(Some(DispatchOutcome::PassThrough)),
            TapTarget::Control(action) => action,
        };
        let locked = self.store.peek(key).is_some_and(|state| state.locked);
        if locked && action != ControlAction::ToggleLock {
            return Ok(None);
        }
        match action {
            ControlAction::ToggleLock => self.toggle_lock(key)?,
            ControlAction::ToggleControls => {
                let state = self
                    .store
                    .update(key, |state| state.controls_visible = !state.controls_visible)?;
                self.host.apply_flags(key, &state);
            }
            ControlAction::ToggleHighlight => {
                let state = self
                    .store
                    .update(key, |state| state.highlighted = !state.highlighted)?;
                self.host.apply_flags(key, &state);
            }
            ControlAction::OpenSettings => self.request_settings(key)?,
            ControlAction::Close => self.close_instance(key)?,
            ControlAction::Custom(action) => {
                return Ok(Some(DispatchOutcome::Custom { key, action }));
            }
        }
        Ok(None)
    }

    // -- accessors ----------------------------------------------------------

    #[must_use]
    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    /// Shared store handle, e.g. for a settings collaborator.
    #[must_use]
    pub fn store(&self) -> &Arc<InstanceStateStore> {
        &self.store
    }

    #[must_use]
    pub fn host(&self) -> &OverlayHost<C> {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut OverlayHost<C> {
        &mut self.host
    }

    /// Live instances of `feature`, ascending by id.
    #[must_use]
    pub fn live(&self, feature: FeatureType) -> Vec<InstanceKey> {
        self.registry
            .active_ids(feature)
            .into_iter()
            .map(|id| InstanceKey::new(feature, id))
            .collect()
    }

    /// Gesture engine of a live instance.
    #[must_use]
    pub fn engine(&self, key: InstanceKey) -> Option<&GestureEngine> {
        self.engines.get(&key)
    }
}
