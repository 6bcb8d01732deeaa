/*! The controller facade: typed senders for the commands a controller
issues, over one registered local controller entity.

Each sender builds the command payload per clause 7.4 (or Milan 7.4 for
MVU), submits it through the manager's command state machine and hands
the raw response to the completion callback.  Small parse helpers are
provided for the common responses.
*/

use crate::endpoint::FrameEndpoint;
use crate::entity::LocalEntityBuilder;
use crate::error::RegistrationError;
use crate::model::DescriptorType;
use crate::model::{AemString, AudioMapping, SamplingRate, StreamFormat};
use crate::pdu::*;
use crate::state::{AcmpResultHandler, AecpResultHandler, ExecutorRef, Manager, ManagerConfig};
use crate::types::*;
use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

bitflags! {
    /// ACQUIRE_ENTITY flags (clause 7.4.1.1).
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct AcquireEntityFlags: u32 {
        const PERSISTENT = 0x0000_0001;
        const RELEASE = 0x8000_0000;
    }
}

bitflags! {
    /// LOCK_ENTITY flags (clause 7.4.2.1).
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct LockEntityFlags: u32 {
        const UNLOCK = 0x0000_0001;
    }
}

/// Controller construction options.
#[derive(Clone)]
pub struct ControllerConfig {
    /// 16-bit program id folded into the EntityID.
    pub prog_id: u16,
    /// Which EntityID derivation to use (see [`EidAlgorithm`]).
    pub entity_id_algorithm: EidAlgorithm,
    /// See [`ManagerConfig::max_inflight_aecp`].
    pub max_inflight_aecp: usize,
    /// See [`ManagerConfig::discovery_delay`].
    pub discovery_delay: Option<Duration>,
    /// Per-protocol Vendor Unique command timeouts.
    pub vu_timeouts: HashMap<ProtocolIdentifier, Duration>,
    /// Process inbound frames on a named executor instead of the
    /// endpoint's delivery thread.
    pub inbound_executor: Option<ExecutorRef>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            prog_id: 0x0001,
            entity_id_algorithm: EidAlgorithm::MacFirst,
            max_inflight_aecp: 1,
            discovery_delay: Some(Duration::from_secs(10)),
            vu_timeouts: HashMap::new(),
            inbound_executor: None,
        }
    }
}

/// An AVDECC controller on one network interface.
pub struct Controller {
    manager: Arc<Manager>,
    entity_id: UniqueIdentifier,
}

impl Controller {
    /// Register a controller entity over `endpoint` and start the
    /// state machines.  The EntityID derives from the endpoint's MAC
    /// and `config.prog_id`.
    pub fn new(
        endpoint: Arc<dyn FrameEndpoint>,
        config: ControllerConfig,
    ) -> Result<Controller, RegistrationError> {
        let mac = endpoint.mac_address();
        let entity_id =
            UniqueIdentifier::from_mac_and_prog_id(mac, config.prog_id, config.entity_id_algorithm);
        let manager = Manager::new(
            endpoint,
            ManagerConfig {
                max_inflight_aecp: config.max_inflight_aecp,
                discovery_delay: config.discovery_delay,
                vu_timeouts: config.vu_timeouts,
                inbound_executor: config.inbound_executor,
            },
        );
        let entity = LocalEntityBuilder::controller(entity_id, mac).build();
        manager.register_local_entity(entity)?;
        Ok(Controller { manager, entity_id })
    }

    pub fn entity_id(&self) -> UniqueIdentifier {
        self.entity_id
    }

    /// The manager, for observer registration and advanced use.
    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    /// Announce this controller on the segment.
    pub fn enable_advertising(&self) -> Result<(), RegistrationError> {
        self.manager.enable_entity_advertising(self.entity_id, None)
    }

    pub fn disable_advertising(&self) -> Result<(), RegistrationError> {
        self.manager
            .disable_entity_advertising(self.entity_id, None)
    }

    pub fn discover_remote_entities(&self) -> Result<(), crate::error::TransportError> {
        self.manager.discover_remote_entities()
    }

    fn send_aem(
        &self,
        target: UniqueIdentifier,
        command_type: AemCommandType,
        body: Bytes,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let pdu = Aecpdu::aem_command(target, self.entity_id, command_type, body);
        self.manager.send_aecp_command(pdu, handler)
    }

    // Entity-level commands

    pub fn acquire_entity(
        &self,
        target: UniqueIdentifier,
        flags: AcquireEntityFlags,
        descriptor_type: DescriptorType,
        descriptor_index: DescriptorIndex,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let mut body = BytesMut::with_capacity(16);
        body.put_u32(flags.bits());
        body.put_u64(UniqueIdentifier::NULL.as_u64()); // owner_id: filled by the target
        body.put_u16(descriptor_type.as_u16());
        body.put_u16(descriptor_index);
        self.send_aem(target, AemCommandType::AcquireEntity, body.freeze(), handler)
    }

    pub fn lock_entity(
        &self,
        target: UniqueIdentifier,
        flags: LockEntityFlags,
        descriptor_type: DescriptorType,
        descriptor_index: DescriptorIndex,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let mut body = BytesMut::with_capacity(16);
        body.put_u32(flags.bits());
        body.put_u64(UniqueIdentifier::NULL.as_u64()); // locked_id: filled by the target
        body.put_u16(descriptor_type.as_u16());
        body.put_u16(descriptor_index);
        self.send_aem(target, AemCommandType::LockEntity, body.freeze(), handler)
    }

    pub fn entity_available(
        &self,
        target: UniqueIdentifier,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        self.send_aem(target, AemCommandType::EntityAvailable, Bytes::new(), handler)
    }

    pub fn controller_available(
        &self,
        target: UniqueIdentifier,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        self.send_aem(
            target,
            AemCommandType::ControllerAvailable,
            Bytes::new(),
            handler,
        )
    }

    pub fn read_descriptor(
        &self,
        target: UniqueIdentifier,
        configuration_index: ConfigurationIndex,
        descriptor_type: DescriptorType,
        descriptor_index: DescriptorIndex,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let mut body = BytesMut::with_capacity(8);
        body.put_u16(configuration_index);
        body.put_u16(0);
        body.put_u16(descriptor_type.as_u16());
        body.put_u16(descriptor_index);
        self.send_aem(target, AemCommandType::ReadDescriptor, body.freeze(), handler)
    }

    pub fn set_configuration(
        &self,
        target: UniqueIdentifier,
        configuration_index: ConfigurationIndex,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let mut body = BytesMut::with_capacity(4);
        body.put_u16(0);
        body.put_u16(configuration_index);
        self.send_aem(target, AemCommandType::SetConfiguration, body.freeze(), handler)
    }

    pub fn get_configuration(
        &self,
        target: UniqueIdentifier,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        self.send_aem(target, AemCommandType::GetConfiguration, Bytes::new(), handler)
    }

    // Stream commands

    pub fn set_stream_format(
        &self,
        target: UniqueIdentifier,
        descriptor_type: DescriptorType,
        stream_index: StreamIndex,
        format: StreamFormat,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let mut body = BytesMut::with_capacity(12);
        body.put_u16(descriptor_type.as_u16());
        body.put_u16(stream_index);
        body.put_u64(format.as_u64());
        self.send_aem(target, AemCommandType::SetStreamFormat, body.freeze(), handler)
    }

    pub fn get_stream_format(
        &self,
        target: UniqueIdentifier,
        descriptor_type: DescriptorType,
        stream_index: StreamIndex,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let mut body = BytesMut::with_capacity(4);
        body.put_u16(descriptor_type.as_u16());
        body.put_u16(stream_index);
        self.send_aem(target, AemCommandType::GetStreamFormat, body.freeze(), handler)
    }

    pub fn start_streaming(
        &self,
        target: UniqueIdentifier,
        descriptor_type: DescriptorType,
        stream_index: StreamIndex,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let mut body = BytesMut::with_capacity(4);
        body.put_u16(descriptor_type.as_u16());
        body.put_u16(stream_index);
        self.send_aem(target, AemCommandType::StartStreaming, body.freeze(), handler)
    }

    pub fn stop_streaming(
        &self,
        target: UniqueIdentifier,
        descriptor_type: DescriptorType,
        stream_index: StreamIndex,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let mut body = BytesMut::with_capacity(4);
        body.put_u16(descriptor_type.as_u16());
        body.put_u16(stream_index);
        self.send_aem(target, AemCommandType::StopStreaming, body.freeze(), handler)
    }

    // Names, rates, clocking

    pub fn set_name(
        &self,
        target: UniqueIdentifier,
        descriptor_type: DescriptorType,
        descriptor_index: DescriptorIndex,
        name_index: u16,
        configuration_index: ConfigurationIndex,
        name: &AemString,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let mut body = BytesMut::with_capacity(72);
        body.put_u16(descriptor_type.as_u16());
        body.put_u16(descriptor_index);
        body.put_u16(name_index);
        body.put_u16(configuration_index);
        body.put_slice(name.as_raw());
        self.send_aem(target, AemCommandType::SetName, body.freeze(), handler)
    }

    pub fn get_name(
        &self,
        target: UniqueIdentifier,
        descriptor_type: DescriptorType,
        descriptor_index: DescriptorIndex,
        name_index: u16,
        configuration_index: ConfigurationIndex,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let mut body = BytesMut::with_capacity(8);
        body.put_u16(descriptor_type.as_u16());
        body.put_u16(descriptor_index);
        body.put_u16(name_index);
        body.put_u16(configuration_index);
        self.send_aem(target, AemCommandType::GetName, body.freeze(), handler)
    }

    pub fn set_sampling_rate(
        &self,
        target: UniqueIdentifier,
        descriptor_type: DescriptorType,
        descriptor_index: DescriptorIndex,
        rate: SamplingRate,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let mut body = BytesMut::with_capacity(8);
        body.put_u16(descriptor_type.as_u16());
        body.put_u16(descriptor_index);
        body.put_u32(rate.as_u32());
        self.send_aem(target, AemCommandType::SetSamplingRate, body.freeze(), handler)
    }

    pub fn get_sampling_rate(
        &self,
        target: UniqueIdentifier,
        descriptor_type: DescriptorType,
        descriptor_index: DescriptorIndex,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let mut body = BytesMut::with_capacity(4);
        body.put_u16(descriptor_type.as_u16());
        body.put_u16(descriptor_index);
        self.send_aem(target, AemCommandType::GetSamplingRate, body.freeze(), handler)
    }

    pub fn set_clock_source(
        &self,
        target: UniqueIdentifier,
        clock_domain_index: ClockDomainIndex,
        clock_source_index: ClockSourceIndex,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let mut body = BytesMut::with_capacity(8);
        body.put_u16(DescriptorType::ClockDomain.as_u16());
        body.put_u16(clock_domain_index);
        body.put_u16(clock_source_index);
        body.put_u16(0);
        self.send_aem(target, AemCommandType::SetClockSource, body.freeze(), handler)
    }

    pub fn get_clock_source(
        &self,
        target: UniqueIdentifier,
        clock_domain_index: ClockDomainIndex,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let mut body = BytesMut::with_capacity(4);
        body.put_u16(DescriptorType::ClockDomain.as_u16());
        body.put_u16(clock_domain_index);
        self.send_aem(target, AemCommandType::GetClockSource, body.freeze(), handler)
    }

    // Notifications, info, counters

    pub fn register_unsolicited_notifications(
        &self,
        target: UniqueIdentifier,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        self.send_aem(
            target,
            AemCommandType::RegisterUnsolicitedNotification,
            Bytes::new(),
            handler,
        )
    }

    pub fn deregister_unsolicited_notifications(
        &self,
        target: UniqueIdentifier,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        self.send_aem(
            target,
            AemCommandType::DeregisterUnsolicitedNotification,
            Bytes::new(),
            handler,
        )
    }

    pub fn get_avb_info(
        &self,
        target: UniqueIdentifier,
        avb_interface_index: AvbInterfaceIndex,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let mut body = BytesMut::with_capacity(4);
        body.put_u16(DescriptorType::AvbInterface.as_u16());
        body.put_u16(avb_interface_index);
        self.send_aem(target, AemCommandType::GetAvbInfo, body.freeze(), handler)
    }

    pub fn get_counters(
        &self,
        target: UniqueIdentifier,
        descriptor_type: DescriptorType,
        descriptor_index: DescriptorIndex,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let mut body = BytesMut::with_capacity(4);
        body.put_u16(descriptor_type.as_u16());
        body.put_u16(descriptor_index);
        self.send_aem(target, AemCommandType::GetCounters, body.freeze(), handler)
    }

    // Audio mapping

    pub fn get_audio_map(
        &self,
        target: UniqueIdentifier,
        descriptor_type: DescriptorType,
        stream_port_index: StreamPortIndex,
        map_index: MapIndex,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let mut body = BytesMut::with_capacity(8);
        body.put_u16(descriptor_type.as_u16());
        body.put_u16(stream_port_index);
        body.put_u16(map_index);
        body.put_u16(0);
        self.send_aem(target, AemCommandType::GetAudioMap, body.freeze(), handler)
    }

    pub fn add_audio_mappings(
        &self,
        target: UniqueIdentifier,
        descriptor_type: DescriptorType,
        stream_port_index: StreamPortIndex,
        mappings: &[AudioMapping],
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let body = mappings_body(descriptor_type, stream_port_index, mappings);
        self.send_aem(target, AemCommandType::AddAudioMappings, body, handler)
    }

    pub fn remove_audio_mappings(
        &self,
        target: UniqueIdentifier,
        descriptor_type: DescriptorType,
        stream_port_index: StreamPortIndex,
        mappings: &[AudioMapping],
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let body = mappings_body(descriptor_type, stream_port_index, mappings);
        self.send_aem(target, AemCommandType::RemoveAudioMappings, body, handler)
    }

    /// The largest mapping list a single ADD/REMOVE_AUDIO_MAPPINGS
    /// frame can carry; longer lists must be split by the caller.
    pub const MAX_AUDIO_MAPPINGS_PER_COMMAND: usize =
        (AVTP_MAX_PAYLOAD_LENGTH - 12 - 2 - 8) / 8;

    // Address access

    /// Send an Address Access command carrying `tlvs` verbatim.
    pub fn address_access(
        &self,
        target: UniqueIdentifier,
        tlvs: Vec<AccessTlv>,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let pdu = Aecpdu::address_access_command(target, self.entity_id, tlvs);
        self.manager.send_aecp_command(pdu, handler)
    }

    /// Read `length` octets from the target's address space.
    pub fn read_memory(
        &self,
        target: UniqueIdentifier,
        address: u64,
        length: usize,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        self.address_access(target, vec![AccessTlv::read(address, length)], handler)
    }

    /// Write `data` into the target's address space.
    pub fn write_memory(
        &self,
        target: UniqueIdentifier,
        address: u64,
        data: Bytes,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        self.address_access(target, vec![AccessTlv::write(address, data)], handler)
    }

    /// Execute at `address` with `data` as the argument.
    pub fn execute_memory_command(
        &self,
        target: UniqueIdentifier,
        address: u64,
        data: Bytes,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        self.address_access(target, vec![AccessTlv::execute(address, data)], handler)
    }

    // Milan

    pub fn get_milan_info(
        &self,
        target: UniqueIdentifier,
        handler: AecpResultHandler,
    ) -> Result<(), RegistrationError> {
        let pdu = Aecpdu::get_milan_info(target, self.entity_id);
        self.manager.send_aecp_command(pdu, handler)
    }

    // Connection management

    pub fn connect_stream(
        &self,
        talker: UniqueIdentifier,
        talker_unique_id: u16,
        listener: UniqueIdentifier,
        listener_unique_id: u16,
        handler: AcmpResultHandler,
    ) -> Result<(), RegistrationError> {
        self.send_acmp(
            AcmpMessageType::ConnectRxCommand,
            talker,
            talker_unique_id,
            listener,
            listener_unique_id,
            0,
            handler,
        )
    }

    pub fn disconnect_stream(
        &self,
        talker: UniqueIdentifier,
        talker_unique_id: u16,
        listener: UniqueIdentifier,
        listener_unique_id: u16,
        handler: AcmpResultHandler,
    ) -> Result<(), RegistrationError> {
        self.send_acmp(
            AcmpMessageType::DisconnectRxCommand,
            talker,
            talker_unique_id,
            listener,
            listener_unique_id,
            0,
            handler,
        )
    }

    pub fn get_talker_stream_state(
        &self,
        talker: UniqueIdentifier,
        talker_unique_id: u16,
        handler: AcmpResultHandler,
    ) -> Result<(), RegistrationError> {
        self.send_acmp(
            AcmpMessageType::GetTxStateCommand,
            talker,
            talker_unique_id,
            UniqueIdentifier::NULL,
            0,
            0,
            handler,
        )
    }

    pub fn get_listener_stream_state(
        &self,
        listener: UniqueIdentifier,
        listener_unique_id: u16,
        handler: AcmpResultHandler,
    ) -> Result<(), RegistrationError> {
        self.send_acmp(
            AcmpMessageType::GetRxStateCommand,
            UniqueIdentifier::NULL,
            0,
            listener,
            listener_unique_id,
            0,
            handler,
        )
    }

    pub fn get_talker_stream_connection(
        &self,
        talker: UniqueIdentifier,
        talker_unique_id: u16,
        connection_index: u16,
        handler: AcmpResultHandler,
    ) -> Result<(), RegistrationError> {
        self.send_acmp(
            AcmpMessageType::GetTxConnectionCommand,
            talker,
            talker_unique_id,
            UniqueIdentifier::NULL,
            0,
            connection_index,
            handler,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn send_acmp(
        &self,
        message_type: AcmpMessageType,
        talker: UniqueIdentifier,
        talker_unique_id: u16,
        listener: UniqueIdentifier,
        listener_unique_id: u16,
        connection_count: u16,
        handler: AcmpResultHandler,
    ) -> Result<(), RegistrationError> {
        let pdu = Acmpdu {
            message_type,
            controller_entity_id: self.entity_id,
            talker_entity_id: talker,
            talker_unique_id,
            listener_entity_id: listener,
            listener_unique_id,
            connection_count,
            ..Default::default()
        };
        self.manager.send_acmp_command(pdu, handler)
    }
}

fn mappings_body(
    descriptor_type: DescriptorType,
    stream_port_index: StreamPortIndex,
    mappings: &[AudioMapping],
) -> Bytes {
    let mut body = BytesMut::with_capacity(8 + mappings.len() * 8);
    body.put_u16(descriptor_type.as_u16());
    body.put_u16(stream_port_index);
    body.put_u16(mappings.len() as u16);
    body.put_u16(0);
    for mapping in mappings {
        body.put_u16(mapping.stream_index);
        body.put_u16(mapping.stream_channel);
        body.put_u16(mapping.cluster_offset);
        body.put_u16(mapping.cluster_channel);
    }
    body.freeze()
}

/// Decode a GET_CONFIGURATION response body.
pub fn parse_get_configuration_response(pdu: &Aecpdu) -> Option<ConfigurationIndex> {
    match &pdu.payload {
        AecpPayload::Aem { body, .. } if body.len() >= 4 => {
            let mut buf = body.clone();
            buf.advance(2); // reserved
            Some(buf.get_u16())
        }
        _ => None,
    }
}

/// Decode a GET_STREAM_FORMAT (or SET_STREAM_FORMAT) response body.
pub fn parse_stream_format_response(pdu: &Aecpdu) -> Option<(StreamIndex, StreamFormat)> {
    match &pdu.payload {
        AecpPayload::Aem { body, .. } if body.len() >= 12 => {
            let mut buf = body.clone();
            buf.advance(2); // descriptor_type
            let stream_index = buf.get_u16();
            Some((stream_index, StreamFormat::new(buf.get_u64())))
        }
        _ => None,
    }
}

/// Decode an ADDRESS_ACCESS response's TLV list.
pub fn parse_address_access_response(pdu: &Aecpdu) -> Option<&[AccessTlv]> {
    match &pdu.payload {
        AecpPayload::AddressAccess { tlvs }
            if pdu.message_type == AecpMessageType::AddressAccessResponse =>
        {
            Some(tlvs)
        }
        _ => None,
    }
}

/// What a Milan device reports in GET_MILAN_INFO.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MilanInfo {
    pub protocol_version: u32,
    pub features_flags: u32,
    pub certification_version: u32,
}

/// Decode a GET_MILAN_INFO response body.
pub fn parse_milan_info_response(pdu: &Aecpdu) -> Option<MilanInfo> {
    match &pdu.payload {
        AecpPayload::VendorUnique { protocol_id, body }
            if *protocol_id == MILAN_PROTOCOL_ID && body.len() >= 16 =>
        {
            let mut buf = body.clone();
            let command_type = MvuCommandType::from_u16(buf.get_u16());
            if command_type != MvuCommandType::GetMilanInfo {
                return None;
            }
            buf.advance(2); // reserved
            Some(MilanInfo {
                protocol_version: buf.get_u32(),
                features_flags: buf.get_u32(),
                certification_version: buf.get_u32(),
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milan_info_response_parses() {
        let mut body = BytesMut::new();
        body.put_u16(MvuCommandType::GetMilanInfo.as_u16());
        body.put_u16(0);
        body.put_u32(1); // protocol_version
        body.put_u32(0x0000_0001); // redundancy
        body.put_u32(0x0001_0000);
        let pdu = Aecpdu {
            dest_address: MacAddress::default(),
            src_address: MacAddress::default(),
            message_type: AecpMessageType::VendorUniqueResponse,
            status: 0,
            target_entity_id: UniqueIdentifier::new(1),
            controller_entity_id: UniqueIdentifier::new(2),
            sequence_id: 0,
            payload: AecpPayload::VendorUnique {
                protocol_id: MILAN_PROTOCOL_ID,
                body: body.freeze(),
            },
        };
        let info = parse_milan_info_response(&pdu).unwrap();
        assert_eq!(info.protocol_version, 1);
        assert_eq!(info.certification_version, 0x0001_0000);
    }

    #[test]
    fn address_access_response_parses() {
        let mut pdu = Aecpdu::address_access_command(
            UniqueIdentifier::new(1),
            UniqueIdentifier::new(2),
            vec![AccessTlv::read(0x4000, 4)],
        );
        // Commands are not responses.
        assert!(parse_address_access_response(&pdu).is_none());

        pdu.message_type = AecpMessageType::AddressAccessResponse;
        pdu.payload = AecpPayload::AddressAccess {
            tlvs: vec![AccessTlv {
                mode: AaMode::Read,
                address: 0x4000,
                data: Bytes::from_static(&[0xDE, 0xAD, 0xBE, 0xEF]),
            }],
        };
        let tlvs = parse_address_access_response(&pdu).unwrap();
        assert_eq!(tlvs.len(), 1);
        assert_eq!(&tlvs[0].data[..], &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn get_configuration_response_parses() {
        let pdu = Aecpdu {
            dest_address: MacAddress::default(),
            src_address: MacAddress::default(),
            message_type: AecpMessageType::AemResponse,
            status: 0,
            target_entity_id: UniqueIdentifier::new(1),
            controller_entity_id: UniqueIdentifier::new(2),
            sequence_id: 0,
            payload: AecpPayload::Aem {
                unsolicited: false,
                command_type: AemCommandType::GetConfiguration,
                body: Bytes::from_static(&[0x00, 0x00, 0x00, 0x02]),
            },
        };
        assert_eq!(parse_get_configuration_response(&pdu), Some(2));
    }
}
