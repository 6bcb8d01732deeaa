/*! The advertise state machine.

Per (local entity, interface): periodic ENTITY_AVAILABLE with a
post-incremented available_index, prompt re-announce on entity changes
or on a matching ENTITY_DISCOVER, and ENTITY_DEPARTING when advertising
stops.  The re-announce cadence derives from the interface's
valid_time: `max(1 s, valid_time/2 s)` plus a random share of up to a
fifth of the advertised validity period, to spread announcements from
many entities apart.
*/

use super::ManagerState;
use crate::endpoint::FrameEndpoint;
use crate::entity::Entity;
use crate::error::RegistrationError;
use crate::pdu::Adpdu;
use crate::types::*;
use rand::Rng;
use std::time::{Duration, Instant};
use tracing::*;

fn random_delay(valid_time: u8) -> Duration {
    // Up to 1/5 of the validity period (2 * valid_time seconds).
    let max_ms = u64::from(valid_time) * 2000 / 5;
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms.max(1)))
}

fn next_advertise_at(now: Instant, valid_time: u8) -> Instant {
    let base = Duration::from_millis(u64::from(valid_time) * 1000 / 2);
    now + base.max(Duration::from_secs(1)) + random_delay(valid_time)
}

fn send_available(
    entity: &mut Entity,
    interface_index: AvbInterfaceIndex,
    endpoint: &dyn FrameEndpoint,
) {
    let available_index = match entity.interface(interface_index) {
        Some(itf) => itf.available_index,
        None => return,
    };
    let Some(pdu) = Adpdu::entity_available(entity, interface_index, available_index) else {
        return;
    };
    // Post-increment: recipients require each announcement to carry a
    // strictly greater index.
    if let Some(itf) = entity.interfaces_mut().get_mut(&interface_index) {
        itf.available_index = itf.available_index.wrapping_add(1);
    }
    match pdu.serialize() {
        Ok(frame) => {
            if let Err(e) = endpoint.send_frame(frame) {
                debug!("failed to send ENTITY_AVAILABLE: {e}");
            }
        }
        Err(e) => debug!("failed to serialize ENTITY_AVAILABLE: {e}"),
    }
}

impl ManagerState {
    pub(crate) fn enable_advertising(
        &mut self,
        entity_id: UniqueIdentifier,
        interface_index: Option<AvbInterfaceIndex>,
    ) -> Result<(), RegistrationError> {
        let local = self
            .locals
            .get_mut(&entity_id)
            .ok_or(RegistrationError::UnknownLocalEntity)?;
        let now = Instant::now();
        match interface_index {
            Some(index) => {
                if local.entity.interface(index).is_none() {
                    return Err(RegistrationError::InvalidParameters);
                }
                // Advertise ASAP.
                local.next_advertise.insert(index, now);
            }
            None => {
                let indexes: Vec<_> = local.entity.interfaces().keys().copied().collect();
                for index in indexes {
                    local.next_advertise.insert(index, now);
                }
            }
        }
        Ok(())
    }

    /// Stop advertising, sending one ENTITY_DEPARTING per interface
    /// where advertising was active.
    pub(crate) fn disable_advertising(
        &mut self,
        entity_id: UniqueIdentifier,
        interface_index: Option<AvbInterfaceIndex>,
        endpoint: &dyn FrameEndpoint,
    ) {
        let Some(local) = self.locals.get_mut(&entity_id) else {
            return;
        };
        let stopped: Vec<AvbInterfaceIndex> = match interface_index {
            Some(index) => local.next_advertise.remove(&index).map(|_| index).into_iter().collect(),
            None => {
                let all = local.next_advertise.keys().copied().collect();
                local.next_advertise.clear();
                all
            }
        };
        for index in stopped {
            if let Some(pdu) = Adpdu::entity_departing(&local.entity, index) {
                match pdu.serialize() {
                    Ok(frame) => {
                        if let Err(e) = endpoint.send_frame(frame) {
                            debug!("failed to send ENTITY_DEPARTING: {e}");
                        }
                    }
                    Err(e) => debug!("failed to serialize ENTITY_DEPARTING: {e}"),
                }
            }
        }
    }

    /// Schedule a prompt (randomly delayed) re-announce.
    pub(crate) fn set_needs_advertise(
        &mut self,
        entity_id: UniqueIdentifier,
        interface_index: Option<AvbInterfaceIndex>,
    ) -> Result<(), RegistrationError> {
        let local = self
            .locals
            .get_mut(&entity_id)
            .ok_or(RegistrationError::UnknownLocalEntity)?;
        let now = Instant::now();
        let targets: Vec<AvbInterfaceIndex> = match interface_index {
            Some(index) => local
                .next_advertise
                .contains_key(&index)
                .then_some(index)
                .into_iter()
                .collect(),
            None => local.next_advertise.keys().copied().collect(),
        };
        for index in targets {
            let valid_time = local
                .entity
                .interface(index)
                .map(|itf| itf.valid_time)
                .unwrap_or(1);
            local
                .next_advertise
                .insert(index, now + random_delay(valid_time));
        }
        Ok(())
    }

    /// Ticker entry: send every due ENTITY_AVAILABLE and re-arm it.
    pub(crate) fn advertise_tick(&mut self, now: Instant, endpoint: &dyn FrameEndpoint) {
        for local in self.locals.values_mut() {
            let due: Vec<AvbInterfaceIndex> = local
                .next_advertise
                .iter()
                .filter(|(_, at)| now >= **at)
                .map(|(index, _)| *index)
                .collect();
            for index in due {
                send_available(&mut local.entity, index, endpoint);
                let valid_time = local
                    .entity
                    .interface(index)
                    .map(|itf| itf.valid_time)
                    .unwrap_or(1);
                local
                    .next_advertise
                    .insert(index, next_advertise_at(now, valid_time));
            }
        }
    }

    /// Inbound ENTITY_DISCOVER: if it targets us (or everyone) and was
    /// received on an interface we advertise on, schedule a delayed
    /// re-announce on that interface only, never on the others.  The
    /// receiving interface is the one whose MAC the probe was sent to,
    /// or the endpoint's own interface for multicast probes.
    pub(crate) fn handle_entity_discover(
        &mut self,
        pdu: &Adpdu,
        now: Instant,
        local_mac: MacAddress,
    ) {
        for local in self.locals.values_mut() {
            if !pdu.entity_id.is_null() && pdu.entity_id != local.entity.entity_id() {
                continue;
            }
            let matching: Vec<(AvbInterfaceIndex, u8)> = local
                .next_advertise
                .keys()
                .filter_map(|index| {
                    let itf = local.entity.interface(*index)?;
                    let received_here = itf.mac_address == pdu.dest_address
                        || (pdu.dest_address.is_multicast() && itf.mac_address == local_mac);
                    received_here.then_some((*index, itf.valid_time))
                })
                .collect();
            for (index, valid_time) in matching {
                trace!(
                    "answering ENTITY_DISCOVER for {} on interface {index}",
                    local.entity.entity_id()
                );
                local
                    .next_advertise
                    .insert(index, now + random_delay(valid_time));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::super::*;
    use crate::endpoint::{EndpointSink, LoopbackEndpoint};
    use parking_lot::Mutex as PlMutex;

    /// Records every ADP frame seen on the wire.
    #[derive(Default)]
    struct Sniffer {
        adp: PlMutex<Vec<Adpdu>>,
    }

    impl Sniffer {
        fn attach(interface: &str) -> (Arc<LoopbackEndpoint>, Arc<Sniffer>) {
            let endpoint = LoopbackEndpoint::attach(interface, TARGET_MAC);
            let sniffer = Arc::new(Sniffer::default());
            endpoint.register_sink(Arc::downgrade(&sniffer) as Weak<dyn EndpointSink>);
            (endpoint, sniffer)
        }

        fn availables(&self) -> Vec<Adpdu> {
            self.adp
                .lock()
                .iter()
                .filter(|p| p.message_type == AdpMessageType::EntityAvailable)
                .cloned()
                .collect()
        }

        fn count(&self, message_type: AdpMessageType) -> usize {
            self.adp
                .lock()
                .iter()
                .filter(|p| p.message_type == message_type)
                .count()
        }

        fn wait_for(
            &self,
            message_type: AdpMessageType,
            want: usize,
            timeout: Duration,
        ) -> bool {
            let deadline = Instant::now() + timeout;
            while Instant::now() < deadline {
                if self.count(message_type) >= want {
                    return true;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            false
        }
    }

    impl EndpointSink for Sniffer {
        fn on_frame(&self, frame: Bytes) {
            if let Ok(Some(Message::Adp(pdu))) = crate::dispatch::parse_message(&frame) {
                self.adp.lock().push(pdu);
            }
        }

        fn on_transport_error(&self) {}
    }

    fn advertising_controller(
        interface: &str,
        valid_time: u8,
    ) -> (Arc<Manager>, Arc<LoopbackEndpoint>, Arc<Recorder>) {
        let (manager, endpoint, recorder) = controller_setup(interface, ManagerConfig::default());
        manager
            .update_local_entity(UniqueIdentifier::new(CONTROLLER_EID), |entity| {
                for itf in entity.interfaces_mut().values_mut() {
                    itf.valid_time = valid_time;
                }
            })
            .unwrap();
        manager
            .enable_entity_advertising(UniqueIdentifier::new(CONTROLLER_EID), None)
            .unwrap();
        (manager, endpoint, recorder)
    }

    #[test]
    fn periodic_available_with_increasing_index() {
        let (sniffer_ep, sniffer) = Sniffer::attach("adv-periodic");
        let (_manager, _endpoint, _recorder) = advertising_controller("adv-periodic", 1);
        let _keep = sniffer_ep;

        // valid_time 1: re-announce every ~1.0-1.4 s.
        assert!(sniffer.wait_for(AdpMessageType::EntityAvailable, 2, Duration::from_secs(3)));
        let availables = sniffer.availables();
        assert_eq!(availables[0].entity_id.as_u64(), CONTROLLER_EID);
        for pair in availables.windows(2) {
            assert!(pair[1].available_index > pair[0].available_index);
        }
    }

    #[test]
    fn needs_advertise_reannounces_promptly() {
        let (sniffer_ep, sniffer) = Sniffer::attach("adv-dirty");
        let (manager, _endpoint, _recorder) = advertising_controller("adv-dirty", 1);
        let _keep = sniffer_ep;

        assert!(sniffer.wait_for(AdpMessageType::EntityAvailable, 1, Duration::from_secs(2)));
        let seen = sniffer.count(AdpMessageType::EntityAvailable);
        manager
            .set_entity_needs_advertise(UniqueIdentifier::new(CONTROLLER_EID), None)
            .unwrap();
        // Delayed advertise is at most valid_time * 400 ms away.
        assert!(sniffer.wait_for(
            AdpMessageType::EntityAvailable,
            seen + 1,
            Duration::from_millis(900)
        ));
    }

    #[test]
    fn discover_triggers_a_reannounce() {
        let (sniffer_ep, sniffer) = Sniffer::attach("adv-discover");
        let (_manager, _endpoint, _recorder) = advertising_controller("adv-discover", 1);

        assert!(sniffer.wait_for(AdpMessageType::EntityAvailable, 1, Duration::from_secs(2)));
        let seen = sniffer.count(AdpMessageType::EntityAvailable);

        let probe = Adpdu::entity_discover(TARGET_MAC, UniqueIdentifier::new(CONTROLLER_EID));
        sniffer_ep.send_frame(probe.serialize().unwrap()).unwrap();
        assert!(sniffer.wait_for(
            AdpMessageType::EntityAvailable,
            seen + 1,
            Duration::from_millis(900)
        ));
    }

    #[test]
    fn disable_sends_departing() {
        let (sniffer_ep, sniffer) = Sniffer::attach("adv-departing");
        let (manager, _endpoint, _recorder) = advertising_controller("adv-departing", 1);
        let _keep = sniffer_ep;

        assert!(sniffer.wait_for(AdpMessageType::EntityAvailable, 1, Duration::from_secs(2)));
        manager
            .disable_entity_advertising(UniqueIdentifier::new(CONTROLLER_EID), None)
            .unwrap();
        assert!(sniffer.wait_for(AdpMessageType::EntityDeparting, 1, Duration::from_secs(1)));

        let departing: Vec<Adpdu> = sniffer
            .adp
            .lock()
            .iter()
            .filter(|p| p.message_type == AdpMessageType::EntityDeparting)
            .cloned()
            .collect();
        assert_eq!(departing.len(), 1);
        assert_eq!(departing[0].valid_time, 0);
        assert_eq!(departing[0].entity_id.as_u64(), CONTROLLER_EID);
    }
}
