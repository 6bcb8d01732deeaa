use crate::entity::*;
use crate::pdu::avtp::{AvtpHeader, AvtpSubtype};
use crate::pdu::ethernet::{pad_frame, EtherHeader};
use crate::pdu::util::*;
use crate::pdu::PduError;
use crate::types::*;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// ADP message type, carried in the AVTP `control_data` nibble
/// (clause 6.2.1.5).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AdpMessageType {
    EntityAvailable,
    EntityDeparting,
    EntityDiscover,
    Unknown(u8),
}

impl AdpMessageType {
    pub fn from_u8(value: u8) -> AdpMessageType {
        match value {
            0 => AdpMessageType::EntityAvailable,
            1 => AdpMessageType::EntityDeparting,
            2 => AdpMessageType::EntityDiscover,
            n => AdpMessageType::Unknown(n),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            AdpMessageType::EntityAvailable => 0,
            AdpMessageType::EntityDeparting => 1,
            AdpMessageType::EntityDiscover => 2,
            AdpMessageType::Unknown(n) => n,
        }
    }
}

/// An ADPDU: the discovery protocol's only message shape.
///
/// The payload is a fixed 56 bytes following the entity_id field
/// (clause 6.2.1):
///
/// ```text
/// entity_model_id (8)        entity_capabilities (4)
/// talker_stream_sources (2)  talker_capabilities (2)
/// listener_stream_sinks (2)  listener_capabilities (2)
/// controller_capabilities (4)
/// available_index (4)
/// gptp_grandmaster_id (8)    gptp_domain_number (1)  reserved (3)
/// identify_control_index (2) interface_index (2)
/// association_id (8)         reserved (4)
/// ```
///
/// `valid_time` rides in the AVTP header's status bits; the advertised
/// entity is considered alive for `2 * valid_time` seconds.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Adpdu {
    pub dest_address: MacAddress,
    pub src_address: MacAddress,
    pub message_type: AdpMessageType,
    pub valid_time: u8,
    pub entity_id: UniqueIdentifier,
    pub entity_model_id: UniqueIdentifier,
    pub entity_capabilities: EntityCapabilities,
    pub talker_stream_sources: u16,
    pub talker_capabilities: TalkerCapabilities,
    pub listener_stream_sinks: u16,
    pub listener_capabilities: ListenerCapabilities,
    pub controller_capabilities: ControllerCapabilities,
    pub available_index: u32,
    pub gptp_grandmaster_id: UniqueIdentifier,
    pub gptp_domain_number: u8,
    pub identify_control_index: ControlIndex,
    pub interface_index: AvbInterfaceIndex,
    pub association_id: UniqueIdentifier,
}

impl Default for Adpdu {
    fn default() -> Self {
        Adpdu {
            dest_address: MacAddress::ADP_ACMP_MULTICAST,
            src_address: MacAddress::default(),
            message_type: AdpMessageType::EntityAvailable,
            valid_time: 31,
            entity_id: UniqueIdentifier::NULL,
            entity_model_id: UniqueIdentifier::NULL,
            entity_capabilities: EntityCapabilities::default(),
            talker_stream_sources: 0,
            talker_capabilities: TalkerCapabilities::default(),
            listener_stream_sinks: 0,
            listener_capabilities: ListenerCapabilities::default(),
            controller_capabilities: ControllerCapabilities::default(),
            available_index: 0,
            gptp_grandmaster_id: UniqueIdentifier::NULL,
            gptp_domain_number: 0,
            identify_control_index: 0,
            interface_index: 0,
            association_id: UniqueIdentifier::NULL,
        }
    }
}

impl Adpdu {
    /// control_data_length: everything following the entity_id field.
    pub const PAYLOAD_LENGTH: u16 = 56;

    /// Serialize the full Ethernet frame, padded to the wire minimum.
    pub fn serialize(&self) -> Result<Bytes, PduError> {
        let mut buf = BytesMut::with_capacity(82);
        EtherHeader::avtp(self.dest_address, self.src_address).serialize(&mut buf);
        AvtpHeader::new(
            AvtpSubtype::Adp,
            self.message_type.as_u8(),
            self.valid_time & 0x1F,
            Self::PAYLOAD_LENGTH,
        )
        .serialize(&mut buf);
        put_eui64(&mut buf, self.entity_id);
        put_eui64(&mut buf, self.entity_model_id);
        buf.put_u32(self.entity_capabilities.bits());
        buf.put_u16(self.talker_stream_sources);
        buf.put_u16(self.talker_capabilities.bits());
        buf.put_u16(self.listener_stream_sinks);
        buf.put_u16(self.listener_capabilities.bits());
        buf.put_u32(self.controller_capabilities.bits());
        buf.put_u32(self.available_index);
        put_eui64(&mut buf, self.gptp_grandmaster_id);
        buf.put_u8(self.gptp_domain_number);
        buf.put_slice(&[0u8; 3]);
        buf.put_u16(self.identify_control_index);
        buf.put_u16(self.interface_index);
        put_eui64(&mut buf, self.association_id);
        buf.put_u32(0);
        pad_frame(&mut buf);
        Ok(buf.freeze())
    }

    /// Parse the PDU that follows an already-consumed Ethernet header.
    pub fn parse<T: Buf>(eth: &EtherHeader, buf: &mut T) -> Result<Adpdu, PduError> {
        let header = AvtpHeader::parse(buf)?.ok_or(PduError::BadFrame)?;
        ensure_remaining!(buf, 8 + usize::from(Self::PAYLOAD_LENGTH));
        let entity_id = read_eui64(buf);
        let entity_model_id = read_eui64(buf);
        let entity_capabilities = EntityCapabilities::from_bits_retain(buf.get_u32());
        let talker_stream_sources = buf.get_u16();
        let talker_capabilities = TalkerCapabilities::from_bits_retain(buf.get_u16());
        let listener_stream_sinks = buf.get_u16();
        let listener_capabilities = ListenerCapabilities::from_bits_retain(buf.get_u16());
        let controller_capabilities = ControllerCapabilities::from_bits_retain(buf.get_u32());
        let available_index = buf.get_u32();
        let gptp_grandmaster_id = read_eui64(buf);
        let gptp_domain_number = buf.get_u8();
        buf.advance(3);
        let identify_control_index = buf.get_u16();
        let interface_index = buf.get_u16();
        let association_id = read_eui64(buf);
        buf.advance(4);
        Ok(Adpdu {
            dest_address: eth.dest_address,
            src_address: eth.src_address,
            message_type: AdpMessageType::from_u8(header.control_data),
            valid_time: header.status,
            entity_id,
            entity_model_id,
            entity_capabilities,
            talker_stream_sources,
            talker_capabilities,
            listener_stream_sinks,
            listener_capabilities,
            controller_capabilities,
            available_index,
            gptp_grandmaster_id,
            gptp_domain_number,
            identify_control_index,
            interface_index,
            association_id,
        })
    }

    /// Build the per-interface ENTITY_AVAILABLE advertisement for `entity`.
    pub fn entity_available(
        entity: &Entity,
        interface_index: AvbInterfaceIndex,
        available_index: u32,
    ) -> Option<Adpdu> {
        let itf = entity.interface(interface_index)?;
        let common = entity.common_information();
        let mut caps = common.entity_capabilities;

        let (gptp_grandmaster_id, gptp_domain_number) = match itf.gptp_grandmaster_id {
            Some(gm) => {
                caps |= EntityCapabilities::GPTP_SUPPORTED;
                (gm, itf.gptp_domain_number.unwrap_or(0))
            }
            None => {
                caps -= EntityCapabilities::GPTP_SUPPORTED;
                (UniqueIdentifier::NULL, 0)
            }
        };
        let identify_control_index = match common.identify_control_index {
            Some(idx) => {
                caps |= EntityCapabilities::AEM_IDENTIFY_CONTROL_INDEX_VALID;
                idx
            }
            None => 0,
        };
        let association_id = match common.association_id {
            Some(id) => {
                caps |= EntityCapabilities::ASSOCIATION_ID_VALID;
                id
            }
            None => UniqueIdentifier::NULL,
        };
        let interface_index_field = if interface_index != GLOBAL_AVB_INTERFACE_INDEX {
            caps |= EntityCapabilities::AEM_INTERFACE_INDEX_VALID;
            interface_index
        } else {
            0
        };

        Some(Adpdu {
            dest_address: MacAddress::ADP_ACMP_MULTICAST,
            src_address: itf.mac_address,
            message_type: AdpMessageType::EntityAvailable,
            valid_time: itf.valid_time,
            entity_id: common.entity_id,
            entity_model_id: common.entity_model_id,
            entity_capabilities: caps,
            talker_stream_sources: common.talker_stream_sources,
            talker_capabilities: common.talker_capabilities,
            listener_stream_sinks: common.listener_stream_sinks,
            listener_capabilities: common.listener_capabilities,
            controller_capabilities: common.controller_capabilities,
            available_index,
            gptp_grandmaster_id,
            gptp_domain_number,
            identify_control_index,
            interface_index: interface_index_field,
            association_id,
        })
    }

    /// Build the per-interface ENTITY_DEPARTING message for `entity`.
    pub fn entity_departing(entity: &Entity, interface_index: AvbInterfaceIndex) -> Option<Adpdu> {
        let itf = entity.interface(interface_index)?;
        let mut caps = EntityCapabilities::empty();
        let interface_index_field = if interface_index != GLOBAL_AVB_INTERFACE_INDEX {
            caps |= EntityCapabilities::AEM_INTERFACE_INDEX_VALID;
            interface_index
        } else {
            0
        };
        Some(Adpdu {
            dest_address: MacAddress::ADP_ACMP_MULTICAST,
            src_address: itf.mac_address,
            message_type: AdpMessageType::EntityDeparting,
            valid_time: 0,
            entity_id: entity.entity_id(),
            entity_capabilities: caps,
            interface_index: interface_index_field,
            ..Default::default()
        })
    }

    /// Build an ENTITY_DISCOVER probe.  A null `entity_id` asks every
    /// entity on the segment to re-announce.
    pub fn entity_discover(src_address: MacAddress, entity_id: UniqueIdentifier) -> Adpdu {
        Adpdu {
            dest_address: MacAddress::ADP_ACMP_MULTICAST,
            src_address,
            message_type: AdpMessageType::EntityDiscover,
            valid_time: 0,
            entity_id,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Adpdu {
        Adpdu {
            dest_address: MacAddress::ADP_ACMP_MULTICAST,
            src_address: MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
            message_type: AdpMessageType::EntityAvailable,
            valid_time: 10,
            entity_id: UniqueIdentifier::new(0x0011223355667788),
            entity_model_id: UniqueIdentifier::new(0x00112233AABBCCDD),
            entity_capabilities: EntityCapabilities::AEM_SUPPORTED
                | EntityCapabilities::GPTP_SUPPORTED,
            talker_stream_sources: 2,
            talker_capabilities: TalkerCapabilities::IMPLEMENTED
                | TalkerCapabilities::AUDIO_SOURCE,
            listener_stream_sinks: 4,
            listener_capabilities: ListenerCapabilities::IMPLEMENTED
                | ListenerCapabilities::AUDIO_SINK,
            controller_capabilities: ControllerCapabilities::empty(),
            available_index: 42,
            gptp_grandmaster_id: UniqueIdentifier::new(0x1122334455667788),
            gptp_domain_number: 3,
            identify_control_index: 0,
            interface_index: 1,
            association_id: UniqueIdentifier::NULL,
        }
    }

    #[test]
    fn round_trip() {
        let pdu = sample();
        let frame = pdu.serialize().unwrap();
        let mut buf = frame.clone();
        let eth = EtherHeader::parse(&mut buf).unwrap();
        let parsed = Adpdu::parse(&eth, &mut buf).unwrap();
        assert_eq!(parsed, pdu);
    }

    #[test]
    fn frame_length() {
        // 14 (eth) + 4 (avtp) + 8 (entity_id) + 56 (payload) = 82
        let frame = sample().serialize().unwrap();
        assert_eq!(frame.len(), 82);
    }

    #[test]
    fn control_data_length_is_payload_size() {
        let frame = sample().serialize().unwrap();
        let cdl = (u16::from(frame[16]) << 8 | u16::from(frame[17])) & 0x07FF;
        assert_eq!(cdl, Adpdu::PAYLOAD_LENGTH);
    }

    #[test]
    fn truncated_payload_is_short_frame() {
        let frame = sample().serialize().unwrap();
        let mut buf = frame.slice(..40);
        let eth = EtherHeader::parse(&mut buf).unwrap();
        assert_eq!(Adpdu::parse(&eth, &mut buf), Err(PduError::ShortFrame));
    }

    #[test]
    fn departing_message_is_scrubbed() {
        let eid = UniqueIdentifier::new(0x0011223355667788);
        let mac = MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let entity = crate::entity::LocalEntityBuilder::controller(eid, mac).build();
        let pdu = Adpdu::entity_departing(&entity, 0).unwrap();
        assert_eq!(pdu.message_type, AdpMessageType::EntityDeparting);
        assert_eq!(pdu.valid_time, 0);
        assert_eq!(pdu.entity_model_id, UniqueIdentifier::NULL);
        assert_eq!(pdu.available_index, 0);
        assert_eq!(pdu.entity_id, eid);
    }
}
