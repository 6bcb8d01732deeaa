/*! The discovery state machine.

Tracks remote entities from their ENTITY_AVAILABLE announcements.  Each
announcement refreshes a per-interface expiry clock of twice the
advertised valid_time.  Fields that must never change between
announcements (model id, capabilities, stream counts) or a
non-increasing available_index mark the sender as misbehaving: the
entity is reported offline then online again with the fresh data.
*/

use super::{DiscoveredEntity, ManagerState, Notify, Outbox};
use crate::endpoint::FrameEndpoint;
use crate::entity::*;
use crate::error::TransportError;
use crate::pdu::Adpdu;
use crate::types::*;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::*;

/// What one merged announcement means for the upper layers.
enum UpdateAction {
    /// Nothing observable changed; only the expiry clock moved.
    NoNotify,
    /// Mutable fields changed or a new interface appeared.
    NotifyUpdate,
    /// An illegal change: simulate offline then online.
    NotifyOfflineOnline,
}

/// Build the entity snapshot one ADPDU describes.
fn make_entity(pdu: &Adpdu) -> (Entity, AvbInterfaceIndex) {
    let caps = pdu.entity_capabilities;
    let (gptp_grandmaster_id, gptp_domain_number) =
        if caps.contains(EntityCapabilities::GPTP_SUPPORTED) {
            (Some(pdu.gptp_grandmaster_id), Some(pdu.gptp_domain_number))
        } else {
            (None, None)
        };
    let identify_control_index = caps
        .contains(EntityCapabilities::AEM_IDENTIFY_CONTROL_INDEX_VALID)
        .then_some(pdu.identify_control_index);
    let association_id = caps
        .contains(EntityCapabilities::ASSOCIATION_ID_VALID)
        .then_some(pdu.association_id);
    let interface_index = if caps.contains(EntityCapabilities::AEM_INTERFACE_INDEX_VALID) {
        pdu.interface_index
    } else {
        GLOBAL_AVB_INTERFACE_INDEX
    };

    let common = CommonInformation {
        entity_id: pdu.entity_id,
        entity_model_id: pdu.entity_model_id,
        entity_capabilities: caps,
        talker_stream_sources: pdu.talker_stream_sources,
        talker_capabilities: pdu.talker_capabilities,
        listener_stream_sinks: pdu.listener_stream_sinks,
        listener_capabilities: pdu.listener_capabilities,
        controller_capabilities: pdu.controller_capabilities,
        identify_control_index,
        association_id,
    };
    let interface = InterfaceInformation {
        mac_address: pdu.src_address,
        valid_time: pdu.valid_time,
        available_index: pdu.available_index,
        gptp_grandmaster_id,
        gptp_domain_number,
    };
    (
        Entity::single_interface(common, interface_index, interface),
        interface_index,
    )
}

/// Merge a fresh single-interface snapshot into the known entity.
fn update_entity(entity: &mut Entity, new_entity: Entity) -> UpdateAction {
    let new_common = new_entity.common_information();
    let common = entity.common_information();

    // Fields that may not change between announcements.
    if common.entity_model_id != new_common.entity_model_id
        || common.talker_capabilities != new_common.talker_capabilities
        || common.talker_stream_sources != new_common.talker_stream_sources
        || common.listener_capabilities != new_common.listener_capabilities
        || common.listener_stream_sinks != new_common.listener_stream_sinks
        || common.controller_capabilities != new_common.controller_capabilities
        || common.identify_control_index != new_common.identify_control_index
    {
        *entity = new_entity;
        return UpdateAction::NotifyOfflineOnline;
    }

    let (interface_index, new_interface) = new_entity
        .interfaces()
        .iter()
        .map(|(index, info)| (*index, info.clone()))
        .next()
        .expect("snapshot has exactly one interface");

    let mut action = UpdateAction::NoNotify;
    match entity.interfaces_mut().get_mut(&interface_index) {
        Some(interface) => {
            // The MAC may not change, and the available_index must
            // strictly increase.
            if interface.mac_address != new_interface.mac_address
                || interface.available_index >= new_interface.available_index
            {
                *entity = new_entity;
                return UpdateAction::NotifyOfflineOnline;
            }
            if interface.gptp_grandmaster_id != new_interface.gptp_grandmaster_id
                || interface.gptp_domain_number != new_interface.gptp_domain_number
            {
                interface.gptp_grandmaster_id = new_interface.gptp_grandmaster_id;
                interface.gptp_domain_number = new_interface.gptp_domain_number;
                action = UpdateAction::NotifyUpdate;
            }
            interface.available_index = new_interface.available_index;
            interface.valid_time = new_interface.valid_time;
        }
        None => {
            // A new interface of a known entity.
            entity
                .interfaces_mut()
                .insert(interface_index, new_interface);
            action = UpdateAction::NotifyUpdate;
        }
    }

    let common = entity.common_information_mut();
    if common.entity_capabilities != new_common.entity_capabilities
        || common.association_id != new_common.association_id
    {
        common.entity_capabilities = new_common.entity_capabilities;
        common.association_id = new_common.association_id;
        action = UpdateAction::NotifyUpdate;
    }

    action
}

impl ManagerState {
    pub(crate) fn handle_entity_available(
        &mut self,
        pdu: &Adpdu,
        now: Instant,
        out: &mut Outbox,
    ) {
        // Our own announcements come back through the multicast.
        if self.locals.contains_key(&pdu.entity_id) {
            return;
        }
        if pdu
            .entity_capabilities
            .contains(EntityCapabilities::ENTITY_NOT_READY)
        {
            return;
        }

        let entity_id = pdu.entity_id;
        let (entity, interface_index) = make_entity(pdu);
        let timeout = now + Duration::from_secs(2 * u64::from(pdu.valid_time));

        match self.discovered.get_mut(&entity_id) {
            Some(known) => {
                let action = update_entity(&mut known.entity, entity);
                known.timeouts.insert(interface_index, timeout);
                match action {
                    UpdateAction::NoNotify => {}
                    UpdateAction::NotifyUpdate => {
                        let snapshot = known.entity.clone();
                        out.notify(Notify::RemoteEntityUpdated(snapshot));
                    }
                    UpdateAction::NotifyOfflineOnline => {
                        debug!("misbehaving announcement from {entity_id}, simulating offline");
                        let snapshot = known.entity.clone();
                        // Only the freshly announced interface is
                        // trustworthy; drop stale expiry clocks.
                        known.timeouts.retain(|index, _| *index == interface_index);
                        out.notify(Notify::RemoteEntityOffline(entity_id));
                        self.flush_commands_for_entity(entity_id, out);
                        out.notify(Notify::RemoteEntityOnline(snapshot));
                    }
                }
            }
            None => {
                let mut timeouts = BTreeMap::new();
                timeouts.insert(interface_index, timeout);
                let snapshot = entity.clone();
                self.discovered
                    .insert(entity_id, DiscoveredEntity { entity, timeouts });
                debug!("remote entity {entity_id} online");
                out.notify(Notify::RemoteEntityOnline(snapshot));
            }
        }
    }

    pub(crate) fn handle_entity_departing(&mut self, pdu: &Adpdu, out: &mut Outbox) {
        if self.locals.contains_key(&pdu.entity_id) {
            return;
        }
        if self.discovered.remove(&pdu.entity_id).is_some() {
            debug!("remote entity {} departing", pdu.entity_id);
            out.notify(Notify::RemoteEntityOffline(pdu.entity_id));
            self.flush_commands_for_entity(pdu.entity_id, out);
        }
    }

    /// Ticker entry: expire interfaces whose announcements lapsed; an
    /// entity with no live interface left goes offline.
    pub(crate) fn expire_remote_entities(&mut self, now: Instant, out: &mut Outbox) {
        let mut offline = Vec::new();
        let mut updated = Vec::new();
        self.discovered.retain(|entity_id, known| {
            let before = known.timeouts.len();
            known.timeouts.retain(|_, timeout| now <= *timeout);
            if known.timeouts.len() == before {
                return true;
            }
            let live: Vec<AvbInterfaceIndex> = known.timeouts.keys().copied().collect();
            known
                .entity
                .interfaces_mut()
                .retain(|index, _| live.contains(index));
            if known.timeouts.is_empty() {
                offline.push(*entity_id);
                false
            } else {
                updated.push(known.entity.clone());
                true
            }
        });
        for entity in updated {
            out.notify(Notify::RemoteEntityUpdated(entity));
        }
        for entity_id in offline {
            debug!("remote entity {entity_id} expired");
            out.notify(Notify::RemoteEntityOffline(entity_id));
            self.flush_commands_for_entity(entity_id, out);
        }
    }

    /// Ticker entry: automatic periodic global discovery.
    pub(crate) fn check_discovery(&mut self, now: Instant, endpoint: &dyn FrameEndpoint) {
        let Some(delay) = self.discovery_delay else {
            return;
        };
        let due = match self.last_discovery {
            Some(last) => now.duration_since(last) >= delay,
            None => true,
        };
        if due {
            let _ = self.send_discover(UniqueIdentifier::NULL, now, endpoint);
        }
    }

    /// Send one ENTITY_DISCOVER probe and stamp the discovery clock.
    pub(crate) fn send_discover(
        &mut self,
        entity_id: UniqueIdentifier,
        now: Instant,
        endpoint: &dyn FrameEndpoint,
    ) -> Result<(), TransportError> {
        self.last_discovery = Some(now);
        let pdu = Adpdu::entity_discover(endpoint.mac_address(), entity_id);
        let frame = pdu.serialize().map_err(|_| TransportError::Internal)?;
        endpoint.send_frame(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::super::*;
    use crate::entity::EntityCapabilities;

    fn announce(
        endpoint: &crate::endpoint::LoopbackEndpoint,
        entity_id: u64,
        available_index: u32,
        mutate: impl FnOnce(&mut Adpdu),
    ) {
        let mut pdu = Adpdu {
            src_address: endpoint.mac_address(),
            message_type: AdpMessageType::EntityAvailable,
            valid_time: 10,
            entity_id: UniqueIdentifier::new(entity_id),
            entity_model_id: UniqueIdentifier::new(0x0000_1122_3344_5566),
            available_index,
            ..Default::default()
        };
        mutate(&mut pdu);
        endpoint.send_frame(pdu.serialize().unwrap()).unwrap();
    }

    #[test]
    fn online_then_updated_on_mutable_change() {
        let (manager, _endpoint, recorder) =
            controller_setup("disco-update", ManagerConfig::default());
        let peer = crate::endpoint::LoopbackEndpoint::attach("disco-update", TARGET_MAC);

        announce(&peer, TARGET_EID, 1, |_| {});
        assert!(recorder.wait_for("remote-online", 1, Duration::from_secs(1)));

        // Higher index, mutable change only (gPTP info appears).
        announce(&peer, TARGET_EID, 2, |pdu| {
            pdu.entity_capabilities |= EntityCapabilities::GPTP_SUPPORTED;
            pdu.gptp_grandmaster_id = UniqueIdentifier::new(0x1111_2222_3333_4444);
        });
        assert!(recorder.wait_for("remote-updated", 1, Duration::from_secs(1)));
        assert_eq!(recorder.count("remote-online"), 1);
        assert_eq!(recorder.count("remote-offline"), 0);
        assert_eq!(manager.discovered_entities().len(), 1);
    }

    #[test]
    fn refresh_without_changes_is_silent() {
        let (_manager, _endpoint, recorder) =
            controller_setup("disco-silent", ManagerConfig::default());
        let peer = crate::endpoint::LoopbackEndpoint::attach("disco-silent", TARGET_MAC);

        announce(&peer, TARGET_EID, 1, |_| {});
        announce(&peer, TARGET_EID, 2, |_| {});
        announce(&peer, TARGET_EID, 3, |_| {});
        assert!(recorder.wait_for("remote-online", 1, Duration::from_secs(1)));
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(recorder.count("remote-online"), 1);
        assert_eq!(recorder.count("remote-updated"), 0);
    }

    #[test]
    fn stale_available_index_simulates_offline_online() {
        let (_manager, _endpoint, recorder) =
            controller_setup("disco-stale", ManagerConfig::default());
        let peer = crate::endpoint::LoopbackEndpoint::attach("disco-stale", TARGET_MAC);

        announce(&peer, TARGET_EID, 5, |_| {});
        assert!(recorder.wait_for("remote-online", 1, Duration::from_secs(1)));

        // Same index again: misbehavior.
        announce(&peer, TARGET_EID, 5, |_| {});
        assert!(recorder.wait_for("remote-offline", 1, Duration::from_secs(1)));
        assert!(recorder.wait_for("remote-online", 2, Duration::from_secs(1)));

        let log = recorder.log.lock().clone();
        let offline_at = log.iter().position(|l| l.starts_with("remote-offline"));
        let second_online = log
            .iter()
            .enumerate()
            .filter(|(_, l)| l.starts_with("remote-online"))
            .nth(1)
            .map(|(i, _)| i);
        assert!(offline_at < second_online);
    }

    #[test]
    fn immutable_change_simulates_offline_online() {
        let (_manager, _endpoint, recorder) =
            controller_setup("disco-immutable", ManagerConfig::default());
        let peer = crate::endpoint::LoopbackEndpoint::attach("disco-immutable", TARGET_MAC);

        announce(&peer, TARGET_EID, 1, |_| {});
        assert!(recorder.wait_for("remote-online", 1, Duration::from_secs(1)));

        announce(&peer, TARGET_EID, 2, |pdu| {
            pdu.entity_model_id = UniqueIdentifier::new(0xDEAD_BEEF_0000_0001);
        });
        assert!(recorder.wait_for("remote-offline", 1, Duration::from_secs(1)));
        assert!(recorder.wait_for("remote-online", 2, Duration::from_secs(1)));
    }

    #[test]
    fn departing_removes_the_entity() {
        let (manager, _endpoint, recorder) =
            controller_setup("disco-departing", ManagerConfig::default());
        let peer = crate::endpoint::LoopbackEndpoint::attach("disco-departing", TARGET_MAC);

        announce(&peer, TARGET_EID, 1, |_| {});
        assert!(recorder.wait_for("remote-online", 1, Duration::from_secs(1)));

        let pdu = Adpdu {
            src_address: peer.mac_address(),
            message_type: AdpMessageType::EntityDeparting,
            valid_time: 0,
            entity_id: UniqueIdentifier::new(TARGET_EID),
            ..Default::default()
        };
        peer.send_frame(pdu.serialize().unwrap()).unwrap();
        assert!(recorder.wait_for("remote-offline", 1, Duration::from_secs(1)));
        assert!(manager.discovered_entities().is_empty());
    }

    #[test]
    fn not_ready_entities_are_ignored() {
        let (manager, _endpoint, recorder) =
            controller_setup("disco-notready", ManagerConfig::default());
        let peer = crate::endpoint::LoopbackEndpoint::attach("disco-notready", TARGET_MAC);

        announce(&peer, TARGET_EID, 1, |pdu| {
            pdu.entity_capabilities |= EntityCapabilities::ENTITY_NOT_READY;
        });
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(recorder.count("remote-online"), 0);
        assert!(manager.discovered_entities().is_empty());
    }

    #[test]
    fn advertisement_expires_after_twice_valid_time() {
        let (manager, _endpoint, recorder) =
            controller_setup("disco-expiry", ManagerConfig::default());
        let peer = crate::endpoint::LoopbackEndpoint::attach("disco-expiry", TARGET_MAC);

        // valid_time 1 => expiry two seconds after receipt.
        announce(&peer, TARGET_EID, 1, |pdu| pdu.valid_time = 1);
        assert!(recorder.wait_for("remote-online", 1, Duration::from_secs(1)));
        assert_eq!(manager.discovered_entities().len(), 1);

        // Still alive well before the deadline.
        std::thread::sleep(Duration::from_millis(1000));
        assert_eq!(recorder.count("remote-offline"), 0);

        assert!(recorder.wait_for("remote-offline", 1, Duration::from_secs(2)));
        assert!(manager.discovered_entities().is_empty());
    }
}
