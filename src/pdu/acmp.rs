use crate::pdu::avtp::{AvtpHeader, AvtpSubtype};
use crate::pdu::ethernet::{pad_frame, EtherHeader};
use crate::pdu::util::*;
use crate::pdu::PduError;
use crate::types::*;
use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// ACMP message type (clause 8.2.1.5).  Responses are always
/// `command + 1`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AcmpMessageType {
    ConnectTxCommand,
    ConnectTxResponse,
    DisconnectTxCommand,
    DisconnectTxResponse,
    GetTxStateCommand,
    GetTxStateResponse,
    ConnectRxCommand,
    ConnectRxResponse,
    DisconnectRxCommand,
    DisconnectRxResponse,
    GetRxStateCommand,
    GetRxStateResponse,
    GetTxConnectionCommand,
    GetTxConnectionResponse,
    Unknown(u8),
}

impl AcmpMessageType {
    pub fn from_u8(value: u8) -> AcmpMessageType {
        use AcmpMessageType::*;
        match value {
            0 => ConnectTxCommand,
            1 => ConnectTxResponse,
            2 => DisconnectTxCommand,
            3 => DisconnectTxResponse,
            4 => GetTxStateCommand,
            5 => GetTxStateResponse,
            6 => ConnectRxCommand,
            7 => ConnectRxResponse,
            8 => DisconnectRxCommand,
            9 => DisconnectRxResponse,
            10 => GetRxStateCommand,
            11 => GetRxStateResponse,
            12 => GetTxConnectionCommand,
            13 => GetTxConnectionResponse,
            n => Unknown(n),
        }
    }

    pub fn as_u8(self) -> u8 {
        use AcmpMessageType::*;
        match self {
            ConnectTxCommand => 0,
            ConnectTxResponse => 1,
            DisconnectTxCommand => 2,
            DisconnectTxResponse => 3,
            GetTxStateCommand => 4,
            GetTxStateResponse => 5,
            ConnectRxCommand => 6,
            ConnectRxResponse => 7,
            DisconnectRxCommand => 8,
            DisconnectRxResponse => 9,
            GetRxStateCommand => 10,
            GetRxStateResponse => 11,
            GetTxConnectionCommand => 12,
            GetTxConnectionResponse => 13,
            Unknown(n) => n,
        }
    }

    /// Odd message types are responses (clause 8.2.1.5).
    pub fn is_response(self) -> bool {
        self.as_u8() % 2 == 1
    }

    /// The response type that resolves this command.
    pub fn expected_response(self) -> AcmpMessageType {
        AcmpMessageType::from_u8(self.as_u8() + 1)
    }
}

/// ACMP status (clause 8.2.1.6).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AcmpStatus {
    Success,
    ListenerUnknownId,
    TalkerUnknownId,
    TalkerDestMacFail,
    TalkerNoStreamIndex,
    TalkerNoBandwidth,
    TalkerExclusive,
    ListenerTalkerTimeout,
    ListenerExclusive,
    StateUnavailable,
    NotConnected,
    NoSuchConnection,
    CouldNotSendMessage,
    TalkerMisbehaving,
    ListenerMisbehaving,
    ControllerNotAuthorized,
    IncompatibleRequest,
    NotSupported,
    Unknown(u8),
}

impl AcmpStatus {
    pub fn from_u8(value: u8) -> AcmpStatus {
        use AcmpStatus::*;
        match value {
            0 => Success,
            1 => ListenerUnknownId,
            2 => TalkerUnknownId,
            3 => TalkerDestMacFail,
            4 => TalkerNoStreamIndex,
            5 => TalkerNoBandwidth,
            6 => TalkerExclusive,
            7 => ListenerTalkerTimeout,
            8 => ListenerExclusive,
            9 => StateUnavailable,
            10 => NotConnected,
            11 => NoSuchConnection,
            12 => CouldNotSendMessage,
            13 => TalkerMisbehaving,
            14 => ListenerMisbehaving,
            16 => ControllerNotAuthorized,
            17 => IncompatibleRequest,
            31 => NotSupported,
            n => Unknown(n),
        }
    }

    pub fn as_u8(self) -> u8 {
        use AcmpStatus::*;
        match self {
            Success => 0,
            ListenerUnknownId => 1,
            TalkerUnknownId => 2,
            TalkerDestMacFail => 3,
            TalkerNoStreamIndex => 4,
            TalkerNoBandwidth => 5,
            TalkerExclusive => 6,
            ListenerTalkerTimeout => 7,
            ListenerExclusive => 8,
            StateUnavailable => 9,
            NotConnected => 10,
            NoSuchConnection => 11,
            CouldNotSendMessage => 12,
            TalkerMisbehaving => 13,
            ListenerMisbehaving => 14,
            ControllerNotAuthorized => 16,
            IncompatibleRequest => 17,
            NotSupported => 31,
            Unknown(n) => n,
        }
    }
}

bitflags! {
    /// ACMP flags field (clause 8.2.1.17).
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct AcmpFlags: u16 {
        const CLASS_B = 0x0001;
        const FAST_CONNECT = 0x0002;
        const SAVED_STATE = 0x0004;
        const STREAMING_WAIT = 0x0008;
        const SUPPORTS_ENCRYPTED = 0x0010;
        const ENCRYPTED_PDU = 0x0020;
        const TALKER_FAILED = 0x0040;
    }
}

/// An ACMPDU (clause 8.2.1): fixed 44-byte payload past the stream_id.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Acmpdu {
    pub dest_address: MacAddress,
    pub src_address: MacAddress,
    pub message_type: AcmpMessageType,
    pub status: AcmpStatus,
    pub stream_id: UniqueIdentifier,
    pub controller_entity_id: UniqueIdentifier,
    pub talker_entity_id: UniqueIdentifier,
    pub listener_entity_id: UniqueIdentifier,
    pub talker_unique_id: u16,
    pub listener_unique_id: u16,
    pub stream_dest_address: MacAddress,
    pub connection_count: u16,
    pub sequence_id: AcmpSequenceId,
    pub flags: AcmpFlags,
    pub stream_vlan_id: u16,
}

impl Default for Acmpdu {
    fn default() -> Self {
        Acmpdu {
            dest_address: MacAddress::ADP_ACMP_MULTICAST,
            src_address: MacAddress::default(),
            message_type: AcmpMessageType::ConnectRxCommand,
            status: AcmpStatus::Success,
            stream_id: UniqueIdentifier::NULL,
            controller_entity_id: UniqueIdentifier::NULL,
            talker_entity_id: UniqueIdentifier::NULL,
            listener_entity_id: UniqueIdentifier::NULL,
            talker_unique_id: 0,
            listener_unique_id: 0,
            stream_dest_address: MacAddress::default(),
            connection_count: 0,
            sequence_id: 0,
            flags: AcmpFlags::empty(),
            stream_vlan_id: 0,
        }
    }
}

impl Acmpdu {
    /// control_data_length: everything following the stream_id field.
    pub const PAYLOAD_LENGTH: u16 = 44;

    /// Serialize the full Ethernet frame, padded to the wire minimum.
    pub fn serialize(&self) -> Result<Bytes, PduError> {
        let mut buf = BytesMut::with_capacity(70);
        EtherHeader::avtp(self.dest_address, self.src_address).serialize(&mut buf);
        AvtpHeader::new(
            AvtpSubtype::Acmp,
            self.message_type.as_u8(),
            self.status.as_u8(),
            Self::PAYLOAD_LENGTH,
        )
        .serialize(&mut buf);
        put_eui64(&mut buf, self.stream_id);
        put_eui64(&mut buf, self.controller_entity_id);
        put_eui64(&mut buf, self.talker_entity_id);
        put_eui64(&mut buf, self.listener_entity_id);
        buf.put_u16(self.talker_unique_id);
        buf.put_u16(self.listener_unique_id);
        put_mac(&mut buf, self.stream_dest_address);
        buf.put_u16(self.connection_count);
        buf.put_u16(self.sequence_id);
        buf.put_u16(self.flags.bits());
        buf.put_u16(self.stream_vlan_id);
        buf.put_u16(0); // reserved
        pad_frame(&mut buf);
        Ok(buf.freeze())
    }

    /// Parse the PDU that follows an already-consumed Ethernet header.
    pub fn parse<T: Buf>(eth: &EtherHeader, buf: &mut T) -> Result<Acmpdu, PduError> {
        let header = AvtpHeader::parse(buf)?.ok_or(PduError::BadFrame)?;
        ensure_remaining!(buf, 8 + usize::from(Self::PAYLOAD_LENGTH));
        let stream_id = read_eui64(buf);
        let controller_entity_id = read_eui64(buf);
        let talker_entity_id = read_eui64(buf);
        let listener_entity_id = read_eui64(buf);
        let talker_unique_id = buf.get_u16();
        let listener_unique_id = buf.get_u16();
        let stream_dest_address = read_mac(buf);
        let connection_count = buf.get_u16();
        let sequence_id = buf.get_u16();
        let flags = AcmpFlags::from_bits_retain(buf.get_u16());
        let stream_vlan_id = buf.get_u16();
        buf.advance(2);
        Ok(Acmpdu {
            dest_address: eth.dest_address,
            src_address: eth.src_address,
            message_type: AcmpMessageType::from_u8(header.control_data),
            status: AcmpStatus::from_u8(header.status),
            stream_id,
            controller_entity_id,
            talker_entity_id,
            listener_entity_id,
            talker_unique_id,
            listener_unique_id,
            stream_dest_address,
            connection_count,
            sequence_id,
            flags,
            stream_vlan_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Acmpdu {
        Acmpdu {
            dest_address: MacAddress::ADP_ACMP_MULTICAST,
            src_address: MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
            message_type: AcmpMessageType::ConnectRxCommand,
            status: AcmpStatus::Success,
            stream_id: UniqueIdentifier::new(0x00112233_44556677),
            controller_entity_id: UniqueIdentifier::new(0x0011223355667788),
            talker_entity_id: UniqueIdentifier::new(0x1111111111111111),
            listener_entity_id: UniqueIdentifier::new(0x2222222222222222),
            talker_unique_id: 1,
            listener_unique_id: 2,
            stream_dest_address: MacAddress([0x91, 0xE0, 0xF0, 0x00, 0x12, 0x34]),
            connection_count: 0,
            sequence_id: 99,
            flags: AcmpFlags::STREAMING_WAIT,
            stream_vlan_id: 2,
        }
    }

    #[test]
    fn round_trip() {
        let pdu = sample();
        let frame = pdu.serialize().unwrap();
        let mut buf = frame.clone();
        let eth = EtherHeader::parse(&mut buf).unwrap();
        assert_eq!(Acmpdu::parse(&eth, &mut buf).unwrap(), pdu);
    }

    #[test]
    fn frame_length() {
        // 14 (eth) + 4 (avtp) + 8 (stream_id) + 44 (payload) = 70
        assert_eq!(sample().serialize().unwrap().len(), 70);
    }

    #[test]
    fn response_pairing() {
        assert_eq!(
            AcmpMessageType::ConnectRxCommand.expected_response(),
            AcmpMessageType::ConnectRxResponse
        );
        assert!(!AcmpMessageType::ConnectRxCommand.is_response());
        assert!(AcmpMessageType::GetTxConnectionResponse.is_response());
    }

    #[test]
    fn status_codes() {
        assert_eq!(AcmpStatus::from_u8(31), AcmpStatus::NotSupported);
        assert_eq!(AcmpStatus::from_u8(15), AcmpStatus::Unknown(15));
        for code in 0..32 {
            assert_eq!(AcmpStatus::from_u8(code).as_u8(), code);
        }
    }
}
