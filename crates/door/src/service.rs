//! A simulated host running one security door instance per door.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use statetrack_core::{
    BookmarkSet, BookmarkSource, InstanceState, RecordStore, StateMachineDefinition, StateTracker,
    TraceRecord, TraceRecordBuilder,
};
use statetrack_storage::{
    load_tracker, open_store, promote_tracker, save_tracker, InstanceStore, MemoryInstanceStore,
};
use statetrack_tracking::{
    ExtensionProvider, InstanceContext, InstanceTracking, StateMachineTrackingBehavior,
    TrackingConfig, TrackingHost,
};
use uuid::Uuid;

use crate::definition::{activities::*, activity_id, bookmarks_for, definition, states::*};
use crate::error::DoorError;
use crate::messages::{AuthorizeKey, AuthorizeKeyResponse, DoorStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    Unlocked,
    Open,
}

/// One door's workflow instance.
struct Door {
    id: Uuid,
    instance_id: Uuid,
    bookmarks: BookmarkSet,
    /// `None` while the instance is unloaded.
    extensions: Option<Vec<InstanceTracking>>,
    state: &'static str,
    next_sequence: u64,
    timeout: Duration,
    intrusion_threshold: u32,
    invalid_attempts: u32,
    deadline: Option<(Duration, Timer)>,
}

impl Door {
    fn record(&mut self, name: &str, state: InstanceState) -> TraceRecordBuilder {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let builder = TraceRecord::builder(self.instance_id, sequence, name, state);
        match activity_id(name) {
            Some(id) => builder.activity_id(id),
            None => builder,
        }
    }

    fn track(&self, record: TraceRecord) {
        for tracking in self.extensions.iter().flatten() {
            tracking.track(&record);
        }
    }

    fn ensure_loaded(&self) -> Result<(), DoorError> {
        if self.extensions.is_none() {
            return Err(DoorError::Unloaded(self.id));
        }
        Ok(())
    }

    fn expect_bookmark(&self, operation: &str) -> Result<(), DoorError> {
        if self.bookmarks.bookmarks().contains(operation) {
            Ok(())
        } else {
            Err(DoorError::NoBookmark {
                door: self.id,
                state: self.state.to_string(),
                operation: operation.to_string(),
            })
        }
    }

    /// Run the state activity for `state`. Its bookmarks are in place before
    /// the activity closes.
    fn enter(&mut self, state: &'static str) {
        let executing = self.record(state, InstanceState::Executing).build();
        self.track(executing);
        self.state = state;
        self.bookmarks.replace(bookmarks_for(state).iter().copied());
        let closed = self.record(state, InstanceState::Closed).build();
        self.track(closed);
        tracing::info!(
            door = %self.id,
            instance_id = %self.instance_id,
            state,
            "door entered state"
        );

        if state == ALERT {
            let done = self.record(crate::STATE_MACHINE, InstanceState::Closed).build();
            self.track(done);
        }
    }

    /// Run transition activity `name`, then enter `to`.
    fn transition(&mut self, name: &'static str, to: &'static str, arguments: Vec<(&str, Value)>) {
        self.bookmarks.clear();
        self.deadline = None;
        let executing = self.record(name, InstanceState::Executing).build();
        self.track(executing);
        let mut closed = self
            .record(name, InstanceState::Closed)
            .variable("InvalidAttempts", self.invalid_attempts);
        for (key, value) in arguments {
            closed = closed.argument(key, value);
        }
        self.track(closed.build());
        tracing::debug!(
            door = %self.id,
            transition = name,
            from = self.state,
            to,
            "door transition"
        );
        self.enter(to);
    }
}

/// Hosts security door instances and drives them through the door state
/// machine.
///
/// Register tracking with [`StateMachineTrackingBehavior::apply`] (or use
/// [`DoorService::from_config`]) before sending the first message; instances
/// only get the extensions that were registered when they started.
pub struct DoorService {
    definition: Arc<StateMachineDefinition>,
    providers: Vec<Arc<dyn ExtensionProvider>>,
    store: Arc<dyn InstanceStore>,
    now: Duration,
    doors: BTreeMap<Uuid, Door>,
}

impl TrackingHost for DoorService {
    fn add_extension_provider(&mut self, provider: Arc<dyn ExtensionProvider>) {
        self.providers.push(provider);
    }
}

impl DoorService {
    pub fn new(store: Arc<dyn InstanceStore>) -> Self {
        DoorService {
            definition: Arc::new(definition()),
            providers: Vec::new(),
            store,
            now: Duration::ZERO,
            doors: BTreeMap::new(),
        }
    }

    /// A service with tracking attached and an in-memory instance store.
    pub fn in_memory(max_history: usize) -> Result<Self, DoorError> {
        let mut service = Self::new(Arc::new(MemoryInstanceStore::new()));
        StateMachineTrackingBehavior::new(max_history).apply(&mut service)?;
        Ok(service)
    }

    /// Open the configured instance store and attach tracking as configured.
    pub async fn from_config(config: &TrackingConfig) -> Result<Self, DoorError> {
        let store = open_store(&config.store.connection_string).await?;
        let mut service = Self::new(store);
        StateMachineTrackingBehavior::from_config(config).apply(&mut service)?;
        Ok(service)
    }

    pub fn definition(&self) -> &Arc<StateMachineDefinition> {
        &self.definition
    }

    pub fn store(&self) -> &Arc<dyn InstanceStore> {
        &self.store
    }

    /// Time elapsed on the manual clock.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn doors(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.doors.keys().copied()
    }

    pub fn instance_id(&self, door: Uuid) -> Option<Uuid> {
        self.doors.get(&door).map(|d| d.instance_id)
    }

    /// The state the host believes the door is in.
    pub fn current_state(&self, door: Uuid) -> Option<&'static str> {
        self.doors.get(&door).map(|d| d.state)
    }

    /// Tracking extensions of a loaded door, from the first registered provider.
    pub fn tracking(&self, door: Uuid) -> Option<&InstanceTracking> {
        self.doors.get(&door)?.extensions.as_ref()?.first()
    }

    pub fn records(&self, door: Uuid) -> Option<RecordStore> {
        self.tracking(door).map(InstanceTracking::record_snapshot)
    }

    pub fn tracker(&self, door: Uuid) -> Option<StateTracker> {
        self.tracking(door).map(InstanceTracking::tracker_snapshot)
    }

    fn create_extensions(
        &self,
        instance_id: Uuid,
        bookmarks: &BookmarkSet,
    ) -> Result<Vec<InstanceTracking>, DoorError> {
        let context = InstanceContext {
            instance_id,
            definition: self.definition.clone(),
            bookmarks: Arc::new(bookmarks.clone()),
        };
        self.providers
            .iter()
            .map(|p| p.create(&context).map_err(DoorError::from))
            .collect()
    }

    fn start(&mut self, id: Uuid) -> Result<(), DoorError> {
        let instance_id = Uuid::new_v4();
        let bookmarks = BookmarkSet::new();
        let extensions = self.create_extensions(instance_id, &bookmarks)?;
        let mut door = Door {
            id,
            instance_id,
            bookmarks,
            extensions: Some(extensions),
            state: CLOSED_LOCKED,
            next_sequence: 0,
            timeout: Duration::ZERO,
            intrusion_threshold: 0,
            invalid_attempts: 0,
            deadline: None,
        };
        let root = door
            .record(crate::STATE_MACHINE, InstanceState::Executing)
            .build();
        door.track(root);
        door.enter(CLOSED_LOCKED);
        tracing::info!(door = %id, %instance_id, "door instance started");
        self.doors.insert(id, door);
        Ok(())
    }

    fn loaded_door(&mut self, id: Uuid) -> Result<&mut Door, DoorError> {
        let door = self.doors.get_mut(&id).ok_or(DoorError::UnknownDoor(id))?;
        door.ensure_loaded()?;
        Ok(door)
    }

    /// Present a key. Starts an instance for the door on first contact.
    pub fn authorize_key(
        &mut self,
        request: &AuthorizeKey,
    ) -> Result<AuthorizeKeyResponse, DoorError> {
        if !self.doors.contains_key(&request.id) {
            self.start(request.id)?;
        }
        let now = self.now;
        let door = self.loaded_door(request.id)?;
        door.expect_bookmark(AUTHORIZE_KEY)?;
        door.timeout = request.timeout;
        door.intrusion_threshold = request.intrusion_threshold;

        let arguments = || {
            vec![
                ("DoorId", Value::from(request.id.to_string())),
                ("Key", Value::from(request.key.to_string())),
            ]
        };
        if request.is_valid() {
            door.invalid_attempts = 0;
            door.transition(AUTHORIZE_VALID_KEY, CLOSED_UNLOCKED, arguments());
            door.deadline = Some((now + door.timeout, Timer::Unlocked));
            return Ok(AuthorizeKeyResponse { authorized: true });
        }

        door.invalid_attempts += 1;
        tracing::warn!(
            door = %request.id,
            attempts = door.invalid_attempts,
            threshold = door.intrusion_threshold,
            "invalid key presented"
        );
        door.transition(AUTHORIZE_INVALID_KEY, INTRUSION_DETECT, arguments());
        if door.invalid_attempts >= door.intrusion_threshold {
            door.transition(INTRUSION_ALERT, ALERT, Vec::new());
        } else {
            door.transition(INTRUSION_CLEARED, CLOSED_LOCKED, Vec::new());
        }
        Ok(AuthorizeKeyResponse { authorized: false })
    }

    /// Report what the door sensors see.
    pub fn notify_door_status(&mut self, status: &DoorStatus) -> Result<(), DoorError> {
        let now = self.now;
        let door = self.loaded_door(status.id)?;
        door.expect_bookmark(NOTIFY_DOOR_STATUS)?;

        let arguments = vec![
            ("IsOpen", Value::from(status.is_open)),
            ("IsLocked", Value::from(status.is_locked)),
        ];
        match (door.state, status.is_open) {
            (CLOSED_UNLOCKED, true) => {
                door.transition(DOOR_OPENED, OPEN, arguments);
                door.deadline = Some((now + door.timeout, Timer::Open));
            }
            (OPEN, false) => door.transition(DOOR_CLOSED, CLOSED_LOCKED, arguments),
            _ => tracing::debug!(door = %status.id, state = door.state, "door status unchanged"),
        }
        Ok(())
    }

    /// Move the manual clock forward and fire every timeout that is now due.
    /// Returns the number of timeouts fired. Unloaded doors keep their
    /// deadlines until they are loaded again.
    pub fn advance(&mut self, by: Duration) -> usize {
        self.now += by;
        let now = self.now;
        let mut fired = 0;
        for door in self.doors.values_mut() {
            if door.extensions.is_none() {
                continue;
            }
            let Some((deadline, timer)) = door.deadline else {
                continue;
            };
            if deadline > now {
                continue;
            }
            match (timer, door.state) {
                (Timer::Unlocked, CLOSED_UNLOCKED) => {
                    door.transition(UNLOCKED_TIMEOUT, CLOSED_LOCKED, Vec::new())
                }
                (Timer::Open, OPEN) => door.transition(OPEN_TIMEOUT, ALERT, Vec::new()),
                _ => {
                    door.deadline = None;
                    continue;
                }
            }
            fired += 1;
        }
        fired
    }

    /// Persist the door's tracker and drop its in-memory extensions.
    pub async fn unload(&mut self, id: Uuid) -> Result<(), DoorError> {
        let door = self.doors.get_mut(&id).ok_or(DoorError::UnknownDoor(id))?;
        let Some(extensions) = &door.extensions else {
            return Err(DoorError::Unloaded(id));
        };
        if let Some(tracker) = extensions.first().map(InstanceTracking::tracker_snapshot) {
            save_tracker(self.store.as_ref(), &tracker).await?;
            promote_tracker(self.store.as_ref(), &tracker).await?;
        }
        door.extensions = None;
        tracing::info!(door = %id, instance_id = %door.instance_id, "door instance unloaded");
        Ok(())
    }

    /// Reload an unloaded door. The persisted tracker is restored into every
    /// new extension; returns `false` if none was persisted and the trackers
    /// start fresh.
    pub async fn load(&mut self, id: Uuid) -> Result<bool, DoorError> {
        let door = self.doors.get(&id).ok_or(DoorError::UnknownDoor(id))?;
        if door.extensions.is_some() {
            return Ok(true);
        }
        let instance_id = door.instance_id;
        let extensions = self.create_extensions(instance_id, &door.bookmarks)?;

        let restored =
            match load_tracker(self.store.as_ref(), instance_id, self.definition.clone()).await? {
                Some(tracker) => {
                    for tracking in &extensions {
                        tracking.restore_tracker(tracker.clone());
                    }
                    true
                }
                None => false,
            };

        let door = self.doors.get_mut(&id).ok_or(DoorError::UnknownDoor(id))?;
        door.extensions = Some(extensions);
        tracing::info!(door = %id, %instance_id, restored, "door instance loaded");
        Ok(restored)
    }
}
