/*! Entities as seen by the discovery protocol.

An [`Entity`] is a snapshot of what a device advertises about itself:
one set of common fields plus one [`InterfaceInformation`] per AVB
interface it announces on.  Local entities (the ones this host
registers with the [`Manager`](crate::state::Manager)) and remote
entities (the ones discovered on the wire) share the representation.
*/

use crate::types::*;
use bitflags::bitflags;
use std::collections::BTreeMap;

bitflags! {
    /// ADPDU entity_capabilities field (clause 6.2.1.10).
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct EntityCapabilities: u32 {
        const EFU_MODE = 0x0000_0001;
        const ADDRESS_ACCESS_SUPPORTED = 0x0000_0002;
        const GATEWAY_ENTITY = 0x0000_0004;
        const AEM_SUPPORTED = 0x0000_0008;
        const LEGACY_AVC = 0x0000_0010;
        const ASSOCIATION_ID_SUPPORTED = 0x0000_0020;
        const ASSOCIATION_ID_VALID = 0x0000_0040;
        const VENDOR_UNIQUE_SUPPORTED = 0x0000_0080;
        const CLASS_A_SUPPORTED = 0x0000_0100;
        const CLASS_B_SUPPORTED = 0x0000_0200;
        const GPTP_SUPPORTED = 0x0000_0400;
        const AEM_AUTHENTICATION_SUPPORTED = 0x0000_0800;
        const AEM_AUTHENTICATION_REQUIRED = 0x0000_1000;
        const AEM_PERSISTENT_ACQUIRE_SUPPORTED = 0x0000_2000;
        const AEM_IDENTIFY_CONTROL_INDEX_VALID = 0x0000_4000;
        const AEM_INTERFACE_INDEX_VALID = 0x0000_8000;
        const GENERAL_CONTROLLER_IGNORE = 0x0001_0000;
        const ENTITY_NOT_READY = 0x0002_0000;
    }
}

bitflags! {
    /// ADPDU talker_capabilities field (clause 6.2.1.12).
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct TalkerCapabilities: u16 {
        const IMPLEMENTED = 0x0001;
        const OTHER_SOURCE = 0x0200;
        const CONTROL_SOURCE = 0x0400;
        const MEDIA_CLOCK_SOURCE = 0x0800;
        const SMPTE_SOURCE = 0x1000;
        const MIDI_SOURCE = 0x2000;
        const AUDIO_SOURCE = 0x4000;
        const VIDEO_SOURCE = 0x8000;
    }
}

bitflags! {
    /// ADPDU listener_capabilities field (clause 6.2.1.14).
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct ListenerCapabilities: u16 {
        const IMPLEMENTED = 0x0001;
        const OTHER_SINK = 0x0200;
        const CONTROL_SINK = 0x0400;
        const MEDIA_CLOCK_SINK = 0x0800;
        const SMPTE_SINK = 0x1000;
        const MIDI_SINK = 0x2000;
        const AUDIO_SINK = 0x4000;
        const VIDEO_SINK = 0x8000;
    }
}

bitflags! {
    /// ADPDU controller_capabilities field (clause 6.2.1.15).
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct ControllerCapabilities: u32 {
        const IMPLEMENTED = 0x0000_0001;
    }
}

/// The fields of an advertisement that do not depend on the interface it
/// was received on.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct CommonInformation {
    pub entity_id: UniqueIdentifier,
    pub entity_model_id: UniqueIdentifier,
    pub entity_capabilities: EntityCapabilities,
    pub talker_stream_sources: u16,
    pub talker_capabilities: TalkerCapabilities,
    pub listener_stream_sinks: u16,
    pub listener_capabilities: ListenerCapabilities,
    pub controller_capabilities: ControllerCapabilities,
    /// Only present when AEM_IDENTIFY_CONTROL_INDEX_VALID is advertised.
    pub identify_control_index: Option<ControlIndex>,
    /// Only present when ASSOCIATION_ID_VALID is advertised.
    pub association_id: Option<UniqueIdentifier>,
}

/// The per-interface half of an advertisement.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct InterfaceInformation {
    pub mac_address: MacAddress,
    /// 1..=31; the advertisement expires `2 * valid_time` seconds after
    /// receipt.
    pub valid_time: u8,
    pub available_index: u32,
    /// Only present when GPTP_SUPPORTED is advertised.
    pub gptp_grandmaster_id: Option<UniqueIdentifier>,
    pub gptp_domain_number: Option<u8>,
}

impl Default for InterfaceInformation {
    fn default() -> Self {
        InterfaceInformation {
            mac_address: MacAddress::default(),
            valid_time: 31,
            available_index: 0,
            gptp_grandmaster_id: None,
            gptp_domain_number: None,
        }
    }
}

/// An AVDECC entity: common fields plus one entry per AVB interface.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Entity {
    common: CommonInformation,
    interfaces: BTreeMap<AvbInterfaceIndex, InterfaceInformation>,
}

impl Entity {
    pub fn new(
        common: CommonInformation,
        interfaces: BTreeMap<AvbInterfaceIndex, InterfaceInformation>,
    ) -> Entity {
        Entity { common, interfaces }
    }

    /// An entity announcing on a single interface.
    pub fn single_interface(
        common: CommonInformation,
        interface_index: AvbInterfaceIndex,
        interface: InterfaceInformation,
    ) -> Entity {
        let mut interfaces = BTreeMap::new();
        interfaces.insert(interface_index, interface);
        Entity { common, interfaces }
    }

    pub fn entity_id(&self) -> UniqueIdentifier {
        self.common.entity_id
    }

    pub fn common_information(&self) -> &CommonInformation {
        &self.common
    }

    pub fn common_information_mut(&mut self) -> &mut CommonInformation {
        &mut self.common
    }

    pub fn interfaces(&self) -> &BTreeMap<AvbInterfaceIndex, InterfaceInformation> {
        &self.interfaces
    }

    pub fn interfaces_mut(&mut self) -> &mut BTreeMap<AvbInterfaceIndex, InterfaceInformation> {
        &mut self.interfaces
    }

    pub fn interface(&self, index: AvbInterfaceIndex) -> Option<&InterfaceInformation> {
        self.interfaces.get(&index)
    }

    pub fn remove_interface(&mut self, index: AvbInterfaceIndex) {
        self.interfaces.remove(&index);
    }

    pub fn has_controller_capabilities(&self) -> bool {
        self.common
            .controller_capabilities
            .contains(ControllerCapabilities::IMPLEMENTED)
    }
}

/// Builder for the entity a host registers locally.
///
/// Defaults to a controller-capable, AEM-less entity on interface 0.
#[derive(Clone, Debug)]
pub struct LocalEntityBuilder {
    common: CommonInformation,
    interfaces: BTreeMap<AvbInterfaceIndex, InterfaceInformation>,
}

impl LocalEntityBuilder {
    pub fn controller(entity_id: UniqueIdentifier, mac_address: MacAddress) -> LocalEntityBuilder {
        let common = CommonInformation {
            entity_id,
            controller_capabilities: ControllerCapabilities::IMPLEMENTED,
            ..Default::default()
        };
        let mut interfaces = BTreeMap::new();
        interfaces.insert(
            0,
            InterfaceInformation {
                mac_address,
                ..Default::default()
            },
        );
        LocalEntityBuilder { common, interfaces }
    }

    pub fn entity_model_id(mut self, id: UniqueIdentifier) -> Self {
        self.common.entity_model_id = id;
        self.common.entity_capabilities |= EntityCapabilities::AEM_SUPPORTED;
        self
    }

    pub fn entity_capabilities(mut self, caps: EntityCapabilities) -> Self {
        self.common.entity_capabilities = caps;
        self
    }

    pub fn talker(mut self, stream_sources: u16, caps: TalkerCapabilities) -> Self {
        self.common.talker_stream_sources = stream_sources;
        self.common.talker_capabilities = caps;
        self
    }

    pub fn listener(mut self, stream_sinks: u16, caps: ListenerCapabilities) -> Self {
        self.common.listener_stream_sinks = stream_sinks;
        self.common.listener_capabilities = caps;
        self
    }

    pub fn association_id(mut self, id: UniqueIdentifier) -> Self {
        self.common.association_id = Some(id);
        self.common.entity_capabilities |=
            EntityCapabilities::ASSOCIATION_ID_SUPPORTED | EntityCapabilities::ASSOCIATION_ID_VALID;
        self
    }

    pub fn valid_time(mut self, seconds_halved: u8) -> Self {
        for itf in self.interfaces.values_mut() {
            itf.valid_time = seconds_halved.clamp(1, 31);
        }
        self
    }

    pub fn interface(
        mut self,
        index: AvbInterfaceIndex,
        interface: InterfaceInformation,
    ) -> Self {
        self.interfaces.insert(index, interface);
        self
    }

    pub fn build(self) -> Entity {
        Entity::new(self.common, self.interfaces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_builder_defaults() {
        let eid = UniqueIdentifier::new(0x0011223355667788);
        let mac = MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let entity = LocalEntityBuilder::controller(eid, mac).build();
        assert_eq!(entity.entity_id(), eid);
        assert!(entity.has_controller_capabilities());
        assert_eq!(entity.interface(0).unwrap().mac_address, mac);
        assert_eq!(entity.interface(0).unwrap().valid_time, 31);
    }
}
