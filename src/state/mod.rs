/*! The manager and its three state machines.

The [`Manager`] owns everything mutable: the registered local entities,
the advertise schedule, the discovery table and the inflight command
tables.  One reentrant lock protects the lot; observer callbacks and
command completion handlers are invoked while the lock is held (but
outside the interior borrow, so a callback may call straight back into
the manager).  A ticker thread wakes every 5 ms to drive advertises,
discovery expiry and command timeouts.

Inbound frames reach the manager through [`EndpointSink`]; they are
decoded by [`crate::dispatch`] and routed here:

```text
ADP        -> advertise (ENTITY_DISCOVER) + discovery (AVAILABLE/DEPARTING)
AECP cmd   -> observer (if targeted at a local entity)
AECP resp  -> command state machine (or unsolicited/identify hooks)
ACMP cmd   -> observer
ACMP resp  -> command state machine + observer (sniffed)
```
*/

mod advertise;
mod commands;
mod discovery;
#[cfg(test)]
mod testutil;

pub use self::commands::{AcmpResultHandler, AecpResultHandler};

use crate::dispatch::parse_message;
use crate::endpoint::{EndpointSink, FrameEndpoint};
use crate::entity::Entity;
use crate::error::{RegistrationError, TransportError};
use crate::executor::Executors;
use crate::pdu::*;
use crate::types::*;
use bytes::Bytes;
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tracing::*;

/// Cadence of the ticker thread.
const TICK_INTERVAL: Duration = Duration::from_millis(5);

/// Callbacks out of the manager.  All methods default to no-ops;
/// implement the ones you care about.
///
/// Callbacks run with the manager lock held: they may call back into
/// the manager from the same thread, but must not block on another
/// thread that needs the lock.  Long work belongs on an executor.
#[allow(unused_variables)]
pub trait ManagerObserver: Send + Sync {
    fn on_local_entity_online(&self, entity_id: UniqueIdentifier) {}
    fn on_local_entity_offline(&self, entity_id: UniqueIdentifier) {}

    fn on_remote_entity_online(&self, entity: &Entity) {}
    fn on_remote_entity_updated(&self, entity: &Entity) {}
    fn on_remote_entity_offline(&self, entity_id: UniqueIdentifier) {}

    /// An AECP command addressed to one of our local entities.
    fn on_aecp_command(&self, local_entity_id: UniqueIdentifier, pdu: &Aecpdu) {}
    /// An unsolicited AEM response from a registered target.
    fn on_aecp_unsolicited_response(&self, local_entity_id: UniqueIdentifier, pdu: &Aecpdu) {}
    /// An IDENTIFY_NOTIFICATION (multicast unsolicited response).
    fn on_aecp_aem_identify_notification(&self, pdu: &Aecpdu) {}

    /// An ACMP command observed on the segment.
    fn on_acmp_command(&self, pdu: &Acmpdu) {}
    /// An ACMP response not matching any of our inflight commands.
    fn on_acmp_response(&self, pdu: &Acmpdu) {}

    fn on_aecp_retry(&self, target_entity_id: UniqueIdentifier) {}
    fn on_aecp_timeout(&self, target_entity_id: UniqueIdentifier) {}
    fn on_aecp_unexpected_response(&self, target_entity_id: UniqueIdentifier) {}
    /// Time between sending an AECP command and its response.
    fn on_aecp_response_time(&self, target_entity_id: UniqueIdentifier, elapsed: Duration) {}

    fn on_transport_error(&self) {}
}

/// A named executor on a registry, used to move inbound frame
/// processing off the endpoint's capture thread.
#[derive(Clone)]
pub struct ExecutorRef {
    pub registry: Executors,
    pub name: String,
}

/// Manager tunables.
#[derive(Clone)]
pub struct ManagerConfig {
    /// Per-(local, target) cap on concurrently inflight AECP commands;
    /// excess commands queue and are promoted as responses arrive.
    pub max_inflight_aecp: usize,
    /// Interval between automatic global ENTITY_DISCOVER probes.
    /// `None` disables automatic discovery.
    pub discovery_delay: Option<Duration>,
    /// Command timeout per Vendor Unique protocol; protocols not
    /// listed use the 250 ms default.
    pub vu_timeouts: HashMap<ProtocolIdentifier, Duration>,
    /// Process inbound frames on this executor instead of the
    /// endpoint's delivery thread.  The executor must stay registered
    /// for the manager's lifetime.
    pub inbound_executor: Option<ExecutorRef>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            max_inflight_aecp: 1,
            discovery_delay: Some(Duration::from_secs(10)),
            vu_timeouts: HashMap::new(),
            inbound_executor: None,
        }
    }
}

/// A discovered remote entity and its per-interface expiry clocks.
struct DiscoveredEntity {
    entity: Entity,
    timeouts: BTreeMap<AvbInterfaceIndex, Instant>,
}

/// Per-local-entity mutable state across all three state machines.
pub(crate) struct LocalEntityState {
    pub(crate) entity: Entity,
    /// Interfaces currently advertising, with their next advertise due
    /// time.  Absent key = advertising disabled on that interface.
    pub(crate) next_advertise: BTreeMap<AvbInterfaceIndex, Instant>,
    pub(crate) next_aecp_sequence_id: AecpSequenceId,
    pub(crate) inflight_aecp: HashMap<UniqueIdentifier, VecDeque<commands::AecpCommandEntry>>,
    pub(crate) queued_aecp: HashMap<UniqueIdentifier, VecDeque<commands::AecpCommandEntry>>,
    pub(crate) next_acmp_sequence_id: AcmpSequenceId,
    pub(crate) inflight_acmp: HashMap<AcmpSequenceId, commands::AcmpCommandEntry>,
    /// Send failures whose handlers are called from the next tick, so
    /// every completion happens asynchronously to the submitter.
    pub(crate) scheduled_errors: Vec<Action>,
}

impl LocalEntityState {
    fn new(entity: Entity) -> LocalEntityState {
        LocalEntityState {
            entity,
            next_advertise: BTreeMap::new(),
            next_aecp_sequence_id: 0,
            inflight_aecp: HashMap::new(),
            queued_aecp: HashMap::new(),
            next_acmp_sequence_id: 0,
            inflight_acmp: HashMap::new(),
            scheduled_errors: Vec::new(),
        }
    }
}

/// Everything behind the lock.
pub(crate) struct ManagerState {
    pub(crate) locals: HashMap<UniqueIdentifier, LocalEntityState>,
    discovered: HashMap<UniqueIdentifier, DiscoveredEntity>,
    /// When the last ENTITY_DISCOVER went out (manual or automatic).
    last_discovery: Option<Instant>,
    discovery_delay: Option<Duration>,
}

/// A deferred effect, run once the interior borrow is released (lock
/// still held).  Kept in one ordered list so that, e.g., an entity's
/// offline notification precedes the completions it caused.
pub(crate) enum Action {
    Notify(Notify),
    CompleteAecp(AecpResultHandler, Option<Aecpdu>, crate::error::CommandStatus),
    CompleteAcmp(AcmpResultHandler, Option<Acmpdu>, crate::error::CommandStatus),
}

/// Observer notifications, see [`ManagerObserver`].
pub(crate) enum Notify {
    LocalEntityOnline(UniqueIdentifier),
    LocalEntityOffline(UniqueIdentifier),
    RemoteEntityOnline(Entity),
    RemoteEntityUpdated(Entity),
    RemoteEntityOffline(UniqueIdentifier),
    AecpCommand(UniqueIdentifier, Aecpdu),
    AecpUnsolicitedResponse(UniqueIdentifier, Aecpdu),
    AecpIdentifyNotification(Aecpdu),
    AcmpCommand(Acmpdu),
    AcmpResponse(Acmpdu),
    AecpRetry(UniqueIdentifier),
    AecpTimeout(UniqueIdentifier),
    AecpUnexpectedResponse(UniqueIdentifier),
    AecpResponseTime(UniqueIdentifier, Duration),
    TransportError,
}

/// Ordered list of deferred effects collected during a state mutation.
#[derive(Default)]
pub(crate) struct Outbox {
    actions: Vec<Action>,
}

impl Outbox {
    pub(crate) fn notify(&mut self, n: Notify) {
        self.actions.push(Action::Notify(n));
    }

    pub(crate) fn push(&mut self, action: Action) {
        self.actions.push(action);
    }
}

/// The reentrant manager lock, tracking its owner so that
/// [`Manager::is_self_locked`] works.
struct StateLock {
    mutex: ReentrantMutex<RefCell<ManagerState>>,
    owner: Mutex<(Option<ThreadId>, usize)>,
}

struct StateGuard<'a> {
    guard: ReentrantMutexGuard<'a, RefCell<ManagerState>>,
    lock: &'a StateLock,
}

impl StateLock {
    fn new(state: ManagerState) -> StateLock {
        StateLock {
            mutex: ReentrantMutex::new(RefCell::new(state)),
            owner: Mutex::new((None, 0)),
        }
    }

    fn lock(&self) -> StateGuard<'_> {
        let guard = self.mutex.lock();
        let mut owner = self.owner.lock();
        if owner.1 == 0 {
            owner.0 = Some(std::thread::current().id());
        }
        owner.1 += 1;
        drop(owner);
        StateGuard { guard, lock: self }
    }

    fn is_self_locked(&self) -> bool {
        self.owner.lock().0 == Some(std::thread::current().id())
    }
}

impl std::ops::Deref for StateGuard<'_> {
    type Target = RefCell<ManagerState>;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        let mut owner = self.lock.owner.lock();
        owner.1 -= 1;
        if owner.1 == 0 {
            owner.0 = None;
        }
    }
}

struct ManagerShared {
    endpoint: Arc<dyn FrameEndpoint>,
    lock: StateLock,
    observers: Mutex<Vec<Weak<dyn ManagerObserver>>>,
    config: ManagerConfig,
    stop: AtomicBool,
    /// Back-reference for jobs queued onto the inbound executor.
    self_weak: std::sync::OnceLock<Weak<ManagerShared>>,
}

/// The coordinator: owns the state machines, the ticker thread and the
/// endpoint sink registration.
pub struct Manager {
    shared: Arc<ManagerShared>,
    ticker: Option<JoinHandle<()>>,
}

impl Manager {
    /// Build a manager over `endpoint` and start the ticker thread.
    /// The manager registers itself as the endpoint's sink.
    pub fn new(endpoint: Arc<dyn FrameEndpoint>, config: ManagerConfig) -> Arc<Manager> {
        let state = ManagerState {
            locals: HashMap::new(),
            discovered: HashMap::new(),
            last_discovery: None,
            discovery_delay: config.discovery_delay,
        };
        let shared = Arc::new(ManagerShared {
            endpoint: endpoint.clone(),
            lock: StateLock::new(state),
            observers: Mutex::new(Vec::new()),
            config,
            stop: AtomicBool::new(false),
            self_weak: std::sync::OnceLock::new(),
        });
        let _ = shared.self_weak.set(Arc::downgrade(&shared));
        endpoint.register_sink(Arc::downgrade(&shared) as Weak<dyn EndpointSink>);

        let ticker_shared = Arc::downgrade(&shared);
        let ticker = std::thread::Builder::new()
            .name("avdecc-ticker".into())
            .spawn(move || loop {
                let Some(shared) = ticker_shared.upgrade() else {
                    return;
                };
                if shared.stop.load(Ordering::SeqCst) {
                    return;
                }
                let started = Instant::now();
                shared.tick(started);
                let elapsed = started.elapsed();
                if elapsed > Duration::from_secs(1) {
                    warn!("manager tick took {elapsed:?}; possible deadlock in an observer");
                }
                drop(shared);
                std::thread::sleep(TICK_INTERVAL);
            })
            .expect("failed to spawn ticker thread");

        Arc::new(Manager {
            shared,
            ticker: Some(ticker),
        })
    }

    /// Register an observer.  Held weakly: dropping the observer
    /// unregisters it.
    pub fn add_observer(&self, observer: Weak<dyn ManagerObserver>) {
        self.shared.observers.lock().push(observer);
    }

    /// Whether the calling thread currently holds the manager lock.
    pub fn is_self_locked(&self) -> bool {
        self.shared.lock.is_self_locked()
    }

    /// Register a local entity.  It starts offline (not advertising).
    pub fn register_local_entity(&self, entity: Entity) -> Result<(), RegistrationError> {
        let entity_id = entity.entity_id();
        if !entity_id.is_valid() {
            return Err(RegistrationError::InvalidParameters);
        }
        let guard = self.shared.lock.lock();
        let mut out = Outbox::default();
        {
            let mut st = guard.borrow_mut();
            if st.locals.contains_key(&entity_id) {
                return Err(RegistrationError::DuplicateLocalEntityId);
            }
            st.locals.insert(entity_id, LocalEntityState::new(entity));
            out.notify(Notify::LocalEntityOnline(entity_id));
        }
        self.shared.deliver(out);
        Ok(())
    }

    /// Unregister a local entity, sending ENTITY_DEPARTING on every
    /// interface it was advertising on.
    pub fn unregister_local_entity(
        &self,
        entity_id: UniqueIdentifier,
    ) -> Result<(), RegistrationError> {
        let guard = self.shared.lock.lock();
        let mut out = Outbox::default();
        {
            let mut st = guard.borrow_mut();
            if !st.locals.contains_key(&entity_id) {
                return Err(RegistrationError::UnknownLocalEntity);
            }
            st.disable_advertising(entity_id, None, self.shared.endpoint.as_ref());
            st.locals.remove(&entity_id);
            out.notify(Notify::LocalEntityOffline(entity_id));
        }
        self.shared.deliver(out);
        Ok(())
    }

    /// Start advertising `entity_id` on one interface (or all).
    pub fn enable_entity_advertising(
        &self,
        entity_id: UniqueIdentifier,
        interface_index: Option<AvbInterfaceIndex>,
    ) -> Result<(), RegistrationError> {
        let guard = self.shared.lock.lock();
        let mut st = guard.borrow_mut();
        st.enable_advertising(entity_id, interface_index)
    }

    /// Stop advertising, sending ENTITY_DEPARTING where it was active.
    pub fn disable_entity_advertising(
        &self,
        entity_id: UniqueIdentifier,
        interface_index: Option<AvbInterfaceIndex>,
    ) -> Result<(), RegistrationError> {
        let guard = self.shared.lock.lock();
        let mut st = guard.borrow_mut();
        if !st.locals.contains_key(&entity_id) {
            return Err(RegistrationError::UnknownLocalEntity);
        }
        st.disable_advertising(entity_id, interface_index, self.shared.endpoint.as_ref());
        Ok(())
    }

    /// Schedule a prompt re-advertise after a mutable field of the
    /// entity changed (capabilities, association id, gPTP info).
    pub fn set_entity_needs_advertise(
        &self,
        entity_id: UniqueIdentifier,
        interface_index: Option<AvbInterfaceIndex>,
    ) -> Result<(), RegistrationError> {
        let guard = self.shared.lock.lock();
        let mut st = guard.borrow_mut();
        st.set_needs_advertise(entity_id, interface_index)
    }

    /// Mutate a registered local entity's advertised information.
    pub fn update_local_entity(
        &self,
        entity_id: UniqueIdentifier,
        update: impl FnOnce(&mut Entity),
    ) -> Result<(), RegistrationError> {
        let guard = self.shared.lock.lock();
        let mut st = guard.borrow_mut();
        {
            let local = st
                .locals
                .get_mut(&entity_id)
                .ok_or(RegistrationError::UnknownLocalEntity)?;
            update(&mut local.entity);
        }
        st.set_needs_advertise(entity_id, None)
    }

    /// Probe the segment for every entity.
    pub fn discover_remote_entities(&self) -> Result<(), TransportError> {
        self.discover_remote_entity(UniqueIdentifier::NULL)
    }

    /// Probe for one entity (null id probes all).  Also re-arms the
    /// automatic discovery delay.
    pub fn discover_remote_entity(
        &self,
        entity_id: UniqueIdentifier,
    ) -> Result<(), TransportError> {
        let guard = self.shared.lock.lock();
        let mut st = guard.borrow_mut();
        st.send_discover(entity_id, Instant::now(), self.shared.endpoint.as_ref())
    }

    /// Change the automatic discovery interval (`None` disables).
    pub fn set_automatic_discovery_delay(&self, delay: Option<Duration>) {
        let guard = self.shared.lock.lock();
        guard.borrow_mut().discovery_delay = delay;
    }

    /// Submit an AECP command.  The sequence id, source MAC and (when
    /// left zero) the destination MAC are filled in; `handler` fires
    /// exactly once with the outcome.
    pub fn send_aecp_command(
        &self,
        pdu: Aecpdu,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let guard = self.shared.lock.lock();
        let mut st = guard.borrow_mut();
        st.send_aecp_command(
            pdu,
            handler,
            Instant::now(),
            self.shared.endpoint.as_ref(),
            &self.shared.config,
        )
    }

    /// Submit an ACMP command; `handler` fires exactly once.
    pub fn send_acmp_command(
        &self,
        pdu: Acmpdu,
        handler: AcmpResultHandler,
    ) -> Result<(), RegistrationError> {
        let guard = self.shared.lock.lock();
        let mut st = guard.borrow_mut();
        st.send_acmp_command(pdu, handler, Instant::now(), self.shared.endpoint.as_ref())
    }

    /// Send a pre-built message without inflight tracking (responses,
    /// unsolicited notifications from a local entity application).
    pub fn send_message(&self, message: &Message) -> Result<(), TransportError> {
        let frame = message.serialize().map_err(|_| TransportError::Internal)?;
        self.shared.endpoint.send_frame(frame)
    }

    /// Snapshot of currently known remote entities.
    pub fn discovered_entities(&self) -> Vec<Entity> {
        let guard = self.shared.lock.lock();
        let st = guard.borrow();
        st.discovered.values().map(|d| d.entity.clone()).collect()
    }

    /// Inflight + queued AECP commands from a local entity to a target.
    pub fn pending_aecp_commands(
        &self,
        local_entity_id: UniqueIdentifier,
        target_entity_id: UniqueIdentifier,
    ) -> usize {
        let guard = self.shared.lock.lock();
        let st = guard.borrow();
        st.locals
            .get(&local_entity_id)
            .map(|l| {
                l.inflight_aecp.get(&target_entity_id).map_or(0, |q| q.len())
                    + l.queued_aecp.get(&target_entity_id).map_or(0, |q| q.len())
            })
            .unwrap_or(0)
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.join();
        }
        // Inflight work is discarded; handlers still pending are
        // dropped without completion.
    }
}

impl ManagerShared {
    /// One ticker pass: advertises due, discovery probe + expiry,
    /// command timeouts, scheduled send errors.
    fn tick(&self, now: Instant) {
        let guard = self.lock.lock();
        let mut out = Outbox::default();
        {
            let mut st = guard.borrow_mut();
            st.advertise_tick(now, self.endpoint.as_ref());
            st.check_discovery(now, self.endpoint.as_ref());
            st.expire_remote_entities(now, &mut out);
            st.command_tick(now, self.endpoint.as_ref(), &self.config, &mut out);
        }
        self.deliver(out);
    }

    /// Run deferred effects.  The interior borrow must already be
    /// released; the reentrant lock stays held so handlers can call
    /// back in.
    fn deliver(&self, out: Outbox) {
        if out.actions.is_empty() {
            return;
        }
        // Snapshot so an observer may deregister (drop) from within a
        // callback.
        let observers: Vec<Arc<dyn ManagerObserver>> = {
            let mut list = self.observers.lock();
            list.retain(|w| w.strong_count() > 0);
            list.iter().filter_map(Weak::upgrade).collect()
        };
        for action in out.actions {
            match action {
                Action::Notify(n) => {
                    for obs in &observers {
                        notify_one(obs.as_ref(), &n);
                    }
                }
                Action::CompleteAecp(handler, pdu, status) => handler(pdu.as_ref(), status),
                Action::CompleteAcmp(handler, pdu, status) => handler(pdu.as_ref(), status),
            }
        }
    }

    fn process_frame(&self, frame: Bytes) {
        let message = match parse_message(&frame) {
            Ok(Some(message)) => message,
            Ok(None) => return,
            Err(e) => {
                debug!("dropping undecodable frame: {e}");
                return;
            }
        };
        let now = Instant::now();
        let guard = self.lock.lock();
        let mut out = Outbox::default();
        {
            let mut st = guard.borrow_mut();
            match message {
                Message::Adp(pdu) => match pdu.message_type {
                    AdpMessageType::EntityAvailable => {
                        st.handle_entity_available(&pdu, now, &mut out)
                    }
                    AdpMessageType::EntityDeparting => st.handle_entity_departing(&pdu, &mut out),
                    AdpMessageType::EntityDiscover => {
                        st.handle_entity_discover(&pdu, now, self.endpoint.mac_address())
                    }
                    AdpMessageType::Unknown(n) => trace!("ignoring ADP message type {n}"),
                },
                Message::Aecp(pdu) => {
                    if pdu.message_type.is_response() {
                        if pdu.is_unsolicited_response()
                            && pdu.aem_command_type() == Some(AemCommandType::IdentifyNotification)
                            && pdu.dest_address == MacAddress::IDENTIFY_MULTICAST
                        {
                            out.notify(Notify::AecpIdentifyNotification(pdu));
                        } else {
                            st.handle_aecp_response(
                                pdu,
                                now,
                                self.endpoint.as_ref(),
                                &self.config,
                                &mut out,
                            );
                        }
                    } else if st.locals.contains_key(&pdu.target_entity_id) {
                        if undersized_aem_command(&pdu) {
                            self.reject_aem_command(&pdu, AemStatus::BadArguments);
                        } else {
                            out.notify(Notify::AecpCommand(pdu.target_entity_id, pdu));
                        }
                    }
                }
                Message::Acmp(pdu) => {
                    if pdu.message_type.is_response() {
                        st.handle_acmp_response(pdu, now, &mut out);
                    } else {
                        out.notify(Notify::AcmpCommand(pdu));
                    }
                }
            }
        }
        self.deliver(out);
    }

    /// Answer a malformed AEM command on behalf of the local entity.
    fn reject_aem_command(&self, command: &Aecpdu, status: AemStatus) {
        warn!(
            "rejecting undersized {} command from {}",
            command
                .aem_command_type()
                .unwrap_or(AemCommandType::Unknown(0xffff)),
            command.controller_entity_id
        );
        let mut response = command.clone();
        response.message_type = AecpMessageType::AemResponse;
        response.status = status.as_u8();
        response.dest_address = command.src_address;
        response.src_address = self.endpoint.mac_address();
        if let Ok(frame) = response.serialize() {
            let _ = self.endpoint.send_frame(frame);
        }
    }
}

/// An AEM command whose payload is shorter than the clause 7.4 minimum
/// for its command type.
fn undersized_aem_command(pdu: &Aecpdu) -> bool {
    match (&pdu.payload, pdu.aem_command_type()) {
        (AecpPayload::Aem { body, .. }, Some(command_type)) => command_type
            .min_command_payload_size()
            .is_some_and(|min| body.len() < min),
        _ => false,
    }
}

fn notify_one(obs: &dyn ManagerObserver, n: &Notify) {
    match n {
        Notify::LocalEntityOnline(id) => obs.on_local_entity_online(*id),
        Notify::LocalEntityOffline(id) => obs.on_local_entity_offline(*id),
        Notify::RemoteEntityOnline(e) => obs.on_remote_entity_online(e),
        Notify::RemoteEntityUpdated(e) => obs.on_remote_entity_updated(e),
        Notify::RemoteEntityOffline(id) => obs.on_remote_entity_offline(*id),
        Notify::AecpCommand(local, pdu) => obs.on_aecp_command(*local, pdu),
        Notify::AecpUnsolicitedResponse(local, pdu) => {
            obs.on_aecp_unsolicited_response(*local, pdu)
        }
        Notify::AecpIdentifyNotification(pdu) => obs.on_aecp_aem_identify_notification(pdu),
        Notify::AcmpCommand(pdu) => obs.on_acmp_command(pdu),
        Notify::AcmpResponse(pdu) => obs.on_acmp_response(pdu),
        Notify::AecpRetry(id) => obs.on_aecp_retry(*id),
        Notify::AecpTimeout(id) => obs.on_aecp_timeout(*id),
        Notify::AecpUnexpectedResponse(id) => obs.on_aecp_unexpected_response(*id),
        Notify::AecpResponseTime(id, elapsed) => obs.on_aecp_response_time(*id, *elapsed),
        Notify::TransportError => obs.on_transport_error(),
    }
}

impl EndpointSink for ManagerShared {
    fn on_frame(&self, frame: Bytes) {
        match &self.config.inbound_executor {
            Some(executor) => {
                // The executor queue is FIFO, so arrival order holds.
                let weak = self.self_weak.get().cloned().unwrap_or_default();
                executor.registry.push_job(&executor.name, move || {
                    if let Some(shared) = weak.upgrade() {
                        shared.process_frame(frame);
                    }
                });
            }
            None => self.process_frame(frame),
        }
    }

    fn on_transport_error(&self) {
        let guard = self.lock.lock();
        let mut out = Outbox::default();
        {
            let mut st = guard.borrow_mut();
            out.notify(Notify::TransportError);
            st.flush_all_commands(
                crate::error::CommandStatus::TransportError(TransportError::NotAvailable),
                &mut out,
            );
        }
        self.deliver(out);
    }
}
