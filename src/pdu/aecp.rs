/*! AECPDU: the enumeration and control protocol.

One common header serves four sub-protocols; this crate decodes the AEM
(entity model) payload, the Address Access TLV list and the Vendor
Unique framing (through which Milan runs), and keeps anything else as
raw bytes so a sniffed frame still round-trips.
*/

use crate::pdu::avtp::{AvtpHeader, AvtpSubtype};
use crate::pdu::ethernet::{pad_frame, EtherHeader, AVTP_MAX_PAYLOAD_LENGTH};
use crate::pdu::util::*;
use crate::pdu::PduError;
use crate::types::*;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

/// AECP message type (clause 9.2.1.1.5).  Odd values are responses.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AecpMessageType {
    AemCommand,
    AemResponse,
    AddressAccessCommand,
    AddressAccessResponse,
    AvcCommand,
    AvcResponse,
    VendorUniqueCommand,
    VendorUniqueResponse,
    HdcpAemCommand,
    HdcpAemResponse,
    ExtendedCommand,
    ExtendedResponse,
    Unknown(u8),
}

impl AecpMessageType {
    pub fn from_u8(value: u8) -> AecpMessageType {
        match value {
            0 => AecpMessageType::AemCommand,
            1 => AecpMessageType::AemResponse,
            2 => AecpMessageType::AddressAccessCommand,
            3 => AecpMessageType::AddressAccessResponse,
            4 => AecpMessageType::AvcCommand,
            5 => AecpMessageType::AvcResponse,
            6 => AecpMessageType::VendorUniqueCommand,
            7 => AecpMessageType::VendorUniqueResponse,
            8 => AecpMessageType::HdcpAemCommand,
            9 => AecpMessageType::HdcpAemResponse,
            14 => AecpMessageType::ExtendedCommand,
            15 => AecpMessageType::ExtendedResponse,
            n => AecpMessageType::Unknown(n),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            AecpMessageType::AemCommand => 0,
            AecpMessageType::AemResponse => 1,
            AecpMessageType::AddressAccessCommand => 2,
            AecpMessageType::AddressAccessResponse => 3,
            AecpMessageType::AvcCommand => 4,
            AecpMessageType::AvcResponse => 5,
            AecpMessageType::VendorUniqueCommand => 6,
            AecpMessageType::VendorUniqueResponse => 7,
            AecpMessageType::HdcpAemCommand => 8,
            AecpMessageType::HdcpAemResponse => 9,
            AecpMessageType::ExtendedCommand => 14,
            AecpMessageType::ExtendedResponse => 15,
            AecpMessageType::Unknown(n) => n,
        }
    }

    /// Odd message types are responses (clause 9.2.1.1.5).
    pub fn is_response(self) -> bool {
        self.as_u8() % 2 == 1
    }
}

/// AEM command status (clause 7.4.1.6 and following).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AemStatus {
    Success,
    NotImplemented,
    NoSuchDescriptor,
    EntityLocked,
    EntityAcquired,
    NotAuthenticated,
    AuthenticationDisabled,
    BadArguments,
    NoResources,
    InProgress,
    EntityMisbehaving,
    NotSupported,
    StreamIsRunning,
    Unknown(u8),
}

impl AemStatus {
    pub fn from_u8(value: u8) -> AemStatus {
        match value {
            0 => AemStatus::Success,
            1 => AemStatus::NotImplemented,
            2 => AemStatus::NoSuchDescriptor,
            3 => AemStatus::EntityLocked,
            4 => AemStatus::EntityAcquired,
            5 => AemStatus::NotAuthenticated,
            6 => AemStatus::AuthenticationDisabled,
            7 => AemStatus::BadArguments,
            8 => AemStatus::NoResources,
            9 => AemStatus::InProgress,
            10 => AemStatus::EntityMisbehaving,
            11 => AemStatus::NotSupported,
            12 => AemStatus::StreamIsRunning,
            n => AemStatus::Unknown(n),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            AemStatus::Success => 0,
            AemStatus::NotImplemented => 1,
            AemStatus::NoSuchDescriptor => 2,
            AemStatus::EntityLocked => 3,
            AemStatus::EntityAcquired => 4,
            AemStatus::NotAuthenticated => 5,
            AemStatus::AuthenticationDisabled => 6,
            AemStatus::BadArguments => 7,
            AemStatus::NoResources => 8,
            AemStatus::InProgress => 9,
            AemStatus::EntityMisbehaving => 10,
            AemStatus::NotSupported => 11,
            AemStatus::StreamIsRunning => 12,
            AemStatus::Unknown(n) => n,
        }
    }
}

/// Address Access status (clause 9.2.1.3.4).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AaStatus {
    Success,
    NotImplemented,
    AddressTooLow,
    AddressTooHigh,
    AddressInvalid,
    TlvInvalid,
    DataInvalid,
    Unsupported,
    Unknown(u8),
}

impl AaStatus {
    pub fn from_u8(value: u8) -> AaStatus {
        match value {
            0 => AaStatus::Success,
            1 => AaStatus::NotImplemented,
            2 => AaStatus::AddressTooLow,
            3 => AaStatus::AddressTooHigh,
            4 => AaStatus::AddressInvalid,
            5 => AaStatus::TlvInvalid,
            6 => AaStatus::DataInvalid,
            7 => AaStatus::Unsupported,
            n => AaStatus::Unknown(n),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            AaStatus::Success => 0,
            AaStatus::NotImplemented => 1,
            AaStatus::AddressTooLow => 2,
            AaStatus::AddressTooHigh => 3,
            AaStatus::AddressInvalid => 4,
            AaStatus::TlvInvalid => 5,
            AaStatus::DataInvalid => 6,
            AaStatus::Unsupported => 7,
            AaStatus::Unknown(n) => n,
        }
    }
}

/// Milan Vendor Unique status (Milan clause 7.2.3).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MvuStatus {
    Success,
    NotImplemented,
    Unknown(u8),
}

impl MvuStatus {
    pub fn from_u8(value: u8) -> MvuStatus {
        match value {
            0 => MvuStatus::Success,
            1 => MvuStatus::NotImplemented,
            n => MvuStatus::Unknown(n),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            MvuStatus::Success => 0,
            MvuStatus::NotImplemented => 1,
            MvuStatus::Unknown(n) => n,
        }
    }
}

/// AEM command type (clause 7.4).
///
/// You can find the full table in clause 7.4.1 of IEEE 1722.1-2013.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AemCommandType {
    AcquireEntity,
    LockEntity,
    EntityAvailable,
    ControllerAvailable,
    ReadDescriptor,
    WriteDescriptor,
    SetConfiguration,
    GetConfiguration,
    SetStreamFormat,
    GetStreamFormat,
    SetVideoFormat,
    GetVideoFormat,
    SetSensorFormat,
    GetSensorFormat,
    SetStreamInfo,
    GetStreamInfo,
    SetName,
    GetName,
    SetAssociationId,
    GetAssociationId,
    SetSamplingRate,
    GetSamplingRate,
    SetClockSource,
    GetClockSource,
    SetControl,
    GetControl,
    IncrementControl,
    DecrementControl,
    SetSignalSelector,
    GetSignalSelector,
    SetMixer,
    GetMixer,
    SetMatrix,
    GetMatrix,
    StartStreaming,
    StopStreaming,
    RegisterUnsolicitedNotification,
    DeregisterUnsolicitedNotification,
    IdentifyNotification,
    GetAvbInfo,
    GetAsPath,
    GetCounters,
    Reboot,
    GetAudioMap,
    AddAudioMappings,
    RemoveAudioMappings,
    GetVideoMap,
    AddVideoMappings,
    RemoveVideoMappings,
    GetSensorMap,
    AddSensorMappings,
    RemoveSensorMappings,
    StartOperation,
    AbortOperation,
    OperationStatus,
    SetMemoryObjectLength,
    GetMemoryObjectLength,
    SetStreamBackup,
    GetStreamBackup,
    Expansion,
    Unknown(u16),
}

impl AemCommandType {
    pub fn from_u16(value: u16) -> AemCommandType {
        use AemCommandType::*;
        match value {
            0x0000 => AcquireEntity,
            0x0001 => LockEntity,
            0x0002 => EntityAvailable,
            0x0003 => ControllerAvailable,
            0x0004 => ReadDescriptor,
            0x0005 => WriteDescriptor,
            0x0006 => SetConfiguration,
            0x0007 => GetConfiguration,
            0x0008 => SetStreamFormat,
            0x0009 => GetStreamFormat,
            0x000a => SetVideoFormat,
            0x000b => GetVideoFormat,
            0x000c => SetSensorFormat,
            0x000d => GetSensorFormat,
            0x000e => SetStreamInfo,
            0x000f => GetStreamInfo,
            0x0010 => SetName,
            0x0011 => GetName,
            0x0012 => SetAssociationId,
            0x0013 => GetAssociationId,
            0x0014 => SetSamplingRate,
            0x0015 => GetSamplingRate,
            0x0016 => SetClockSource,
            0x0017 => GetClockSource,
            0x0018 => SetControl,
            0x0019 => GetControl,
            0x001a => IncrementControl,
            0x001b => DecrementControl,
            0x001c => SetSignalSelector,
            0x001d => GetSignalSelector,
            0x001e => SetMixer,
            0x001f => GetMixer,
            0x0020 => SetMatrix,
            0x0021 => GetMatrix,
            0x0022 => StartStreaming,
            0x0023 => StopStreaming,
            0x0024 => RegisterUnsolicitedNotification,
            0x0025 => DeregisterUnsolicitedNotification,
            0x0026 => IdentifyNotification,
            0x0027 => GetAvbInfo,
            0x0028 => GetAsPath,
            0x0029 => GetCounters,
            0x002a => Reboot,
            0x002b => GetAudioMap,
            0x002c => AddAudioMappings,
            0x002d => RemoveAudioMappings,
            0x002e => GetVideoMap,
            0x002f => AddVideoMappings,
            0x0030 => RemoveVideoMappings,
            0x0031 => GetSensorMap,
            0x0032 => AddSensorMappings,
            0x0033 => RemoveSensorMappings,
            0x0034 => StartOperation,
            0x0035 => AbortOperation,
            0x0036 => OperationStatus,
            0x0047 => SetMemoryObjectLength,
            0x0048 => GetMemoryObjectLength,
            0x0049 => SetStreamBackup,
            0x004a => GetStreamBackup,
            0x7fff => Expansion,
            n => Unknown(n),
        }
    }

    pub fn as_u16(self) -> u16 {
        use AemCommandType::*;
        match self {
            AcquireEntity => 0x0000,
            LockEntity => 0x0001,
            EntityAvailable => 0x0002,
            ControllerAvailable => 0x0003,
            ReadDescriptor => 0x0004,
            WriteDescriptor => 0x0005,
            SetConfiguration => 0x0006,
            GetConfiguration => 0x0007,
            SetStreamFormat => 0x0008,
            GetStreamFormat => 0x0009,
            SetVideoFormat => 0x000a,
            GetVideoFormat => 0x000b,
            SetSensorFormat => 0x000c,
            GetSensorFormat => 0x000d,
            SetStreamInfo => 0x000e,
            GetStreamInfo => 0x000f,
            SetName => 0x0010,
            GetName => 0x0011,
            SetAssociationId => 0x0012,
            GetAssociationId => 0x0013,
            SetSamplingRate => 0x0014,
            GetSamplingRate => 0x0015,
            SetClockSource => 0x0016,
            GetClockSource => 0x0017,
            SetControl => 0x0018,
            GetControl => 0x0019,
            IncrementControl => 0x001a,
            DecrementControl => 0x001b,
            SetSignalSelector => 0x001c,
            GetSignalSelector => 0x001d,
            SetMixer => 0x001e,
            GetMixer => 0x001f,
            SetMatrix => 0x0020,
            GetMatrix => 0x0021,
            StartStreaming => 0x0022,
            StopStreaming => 0x0023,
            RegisterUnsolicitedNotification => 0x0024,
            DeregisterUnsolicitedNotification => 0x0025,
            IdentifyNotification => 0x0026,
            GetAvbInfo => 0x0027,
            GetAsPath => 0x0028,
            GetCounters => 0x0029,
            Reboot => 0x002a,
            GetAudioMap => 0x002b,
            AddAudioMappings => 0x002c,
            RemoveAudioMappings => 0x002d,
            GetVideoMap => 0x002e,
            AddVideoMappings => 0x002f,
            RemoveVideoMappings => 0x0030,
            GetSensorMap => 0x0031,
            AddSensorMappings => 0x0032,
            RemoveSensorMappings => 0x0033,
            StartOperation => 0x0034,
            AbortOperation => 0x0035,
            OperationStatus => 0x0036,
            SetMemoryObjectLength => 0x0047,
            GetMemoryObjectLength => 0x0048,
            SetStreamBackup => 0x0049,
            GetStreamBackup => 0x004a,
            Expansion => 0x7fff,
            Unknown(n) => n,
        }
    }

    /// Minimum command payload length (clause 7.4), used to reject
    /// undersized commands with BAD_ARGUMENTS.  `None` when we have no
    /// tabulated value (vendor expansion, video/sensor operations).
    pub fn min_command_payload_size(self) -> Option<usize> {
        use AemCommandType::*;
        Some(match self {
            AcquireEntity | LockEntity => 16,
            EntityAvailable | ControllerAvailable => 0,
            ReadDescriptor => 8,
            SetConfiguration => 4,
            GetConfiguration => 0,
            SetStreamFormat => 12,
            GetStreamFormat => 4,
            SetStreamInfo => 48,
            GetStreamInfo => 4,
            SetName => 72,
            GetName => 8,
            SetAssociationId => 8,
            GetAssociationId => 0,
            SetSamplingRate => 8,
            GetSamplingRate => 4,
            SetClockSource => 8,
            GetClockSource => 4,
            SetControl | GetControl => 4,
            StartStreaming | StopStreaming => 4,
            RegisterUnsolicitedNotification | DeregisterUnsolicitedNotification => 0,
            GetAvbInfo | GetAsPath | GetCounters | Reboot => 4,
            GetAudioMap => 8,
            AddAudioMappings | RemoveAudioMappings => 8,
            StartOperation | AbortOperation | OperationStatus => 8,
            SetMemoryObjectLength => 12,
            GetMemoryObjectLength => 4,
            _ => return None,
        })
    }
}

impl fmt::Display for AemCommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use AemCommandType::*;
        let name = match self {
            AcquireEntity => "ACQUIRE_ENTITY",
            LockEntity => "LOCK_ENTITY",
            EntityAvailable => "ENTITY_AVAILABLE",
            ControllerAvailable => "CONTROLLER_AVAILABLE",
            ReadDescriptor => "READ_DESCRIPTOR",
            WriteDescriptor => "WRITE_DESCRIPTOR",
            SetConfiguration => "SET_CONFIGURATION",
            GetConfiguration => "GET_CONFIGURATION",
            SetStreamFormat => "SET_STREAM_FORMAT",
            GetStreamFormat => "GET_STREAM_FORMAT",
            SetVideoFormat => "SET_VIDEO_FORMAT",
            GetVideoFormat => "GET_VIDEO_FORMAT",
            SetSensorFormat => "SET_SENSOR_FORMAT",
            GetSensorFormat => "GET_SENSOR_FORMAT",
            SetStreamInfo => "SET_STREAM_INFO",
            GetStreamInfo => "GET_STREAM_INFO",
            SetName => "SET_NAME",
            GetName => "GET_NAME",
            SetAssociationId => "SET_ASSOCIATION_ID",
            GetAssociationId => "GET_ASSOCIATION_ID",
            SetSamplingRate => "SET_SAMPLING_RATE",
            GetSamplingRate => "GET_SAMPLING_RATE",
            SetClockSource => "SET_CLOCK_SOURCE",
            GetClockSource => "GET_CLOCK_SOURCE",
            SetControl => "SET_CONTROL",
            GetControl => "GET_CONTROL",
            IncrementControl => "INCREMENT_CONTROL",
            DecrementControl => "DECREMENT_CONTROL",
            SetSignalSelector => "SET_SIGNAL_SELECTOR",
            GetSignalSelector => "GET_SIGNAL_SELECTOR",
            SetMixer => "SET_MIXER",
            GetMixer => "GET_MIXER",
            SetMatrix => "SET_MATRIX",
            GetMatrix => "GET_MATRIX",
            StartStreaming => "START_STREAMING",
            StopStreaming => "STOP_STREAMING",
            RegisterUnsolicitedNotification => "REGISTER_UNSOLICITED_NOTIFICATION",
            DeregisterUnsolicitedNotification => "DEREGISTER_UNSOLICITED_NOTIFICATION",
            IdentifyNotification => "IDENTIFY_NOTIFICATION",
            GetAvbInfo => "GET_AVB_INFO",
            GetAsPath => "GET_AS_PATH",
            GetCounters => "GET_COUNTERS",
            Reboot => "REBOOT",
            GetAudioMap => "GET_AUDIO_MAP",
            AddAudioMappings => "ADD_AUDIO_MAPPINGS",
            RemoveAudioMappings => "REMOVE_AUDIO_MAPPINGS",
            GetVideoMap => "GET_VIDEO_MAP",
            AddVideoMappings => "ADD_VIDEO_MAPPINGS",
            RemoveVideoMappings => "REMOVE_VIDEO_MAPPINGS",
            GetSensorMap => "GET_SENSOR_MAP",
            AddSensorMappings => "ADD_SENSOR_MAPPINGS",
            RemoveSensorMappings => "REMOVE_SENSOR_MAPPINGS",
            StartOperation => "START_OPERATION",
            AbortOperation => "ABORT_OPERATION",
            OperationStatus => "OPERATION_STATUS",
            SetMemoryObjectLength => "SET_MEMORY_OBJECT_LENGTH",
            GetMemoryObjectLength => "GET_MEMORY_OBJECT_LENGTH",
            SetStreamBackup => "SET_STREAM_BACKUP",
            GetStreamBackup => "GET_STREAM_BACKUP",
            Expansion => "EXPANSION",
            Unknown(n) => return write!(f, "UNKNOWN({n:#06x})"),
        };
        f.write_str(name)
    }
}

/// Address Access TLV mode (clause 9.2.1.3.3).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AaMode {
    Read,
    Write,
    Execute,
    Unknown(u8),
}

impl AaMode {
    pub fn from_u8(value: u8) -> AaMode {
        match value {
            0 => AaMode::Read,
            1 => AaMode::Write,
            2 => AaMode::Execute,
            n => AaMode::Unknown(n),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            AaMode::Read => 0,
            AaMode::Write => 1,
            AaMode::Execute => 2,
            AaMode::Unknown(n) => n,
        }
    }
}

/// One Address Access TLV: mode (4 bits), length (12 bits), a 64-bit
/// address, then `length` bytes of data.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AccessTlv {
    pub mode: AaMode,
    pub address: u64,
    pub data: Bytes,
}

impl AccessTlv {
    const MAX_DATA_LENGTH: usize = 0x0FFF;

    /// A READ request for `length` octets at `address`.  The command
    /// carries a zero-filled data field of that length; the response
    /// TLV carries the octets read.
    pub fn read(address: u64, length: usize) -> AccessTlv {
        AccessTlv {
            mode: AaMode::Read,
            address,
            data: Bytes::from(vec![0u8; length]),
        }
    }

    /// A WRITE of `data` at `address`.
    pub fn write(address: u64, data: Bytes) -> AccessTlv {
        AccessTlv {
            mode: AaMode::Write,
            address,
            data,
        }
    }

    /// An EXECUTE at `address` with `data` as its argument.
    pub fn execute(address: u64, data: Bytes) -> AccessTlv {
        AccessTlv {
            mode: AaMode::Execute,
            address,
            data,
        }
    }

    fn serialize(&self, buf: &mut BytesMut) -> Result<(), PduError> {
        if self.data.len() > Self::MAX_DATA_LENGTH {
            return Err(PduError::OverMaxLength);
        }
        buf.put_u16((u16::from(self.mode.as_u8()) << 12) | self.data.len() as u16);
        buf.put_u64(self.address);
        buf.put_slice(&self.data);
        Ok(())
    }

    fn parse<T: Buf>(buf: &mut T) -> Result<AccessTlv, PduError> {
        ensure_remaining!(buf, 10);
        let w = buf.get_u16();
        let length = usize::from(w & 0x0FFF);
        let address = buf.get_u64();
        ensure_remaining!(buf, length);
        Ok(AccessTlv {
            mode: AaMode::from_u8((w >> 12) as u8),
            address,
            data: buf.copy_to_bytes(length),
        })
    }
}

/// The 6-byte protocol identifier fronting every Vendor Unique payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ProtocolIdentifier(pub [u8; 6]);

/// Milan's Vendor Unique protocol identifier (Milan clause 7.2.1).
pub const MILAN_PROTOCOL_ID: ProtocolIdentifier =
    ProtocolIdentifier([0x00, 0x1B, 0xC5, 0x0A, 0xC1, 0x00]);

impl fmt::Display for ProtocolIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            p[0], p[1], p[2], p[3], p[4], p[5]
        )
    }
}

/// Milan Vendor Unique command type (Milan clause 7.2.2.3).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MvuCommandType {
    GetMilanInfo,
    Unknown(u16),
}

impl MvuCommandType {
    pub fn from_u16(value: u16) -> MvuCommandType {
        match value {
            0 => MvuCommandType::GetMilanInfo,
            n => MvuCommandType::Unknown(n),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            MvuCommandType::GetMilanInfo => 0,
            MvuCommandType::Unknown(n) => n,
        }
    }
}

/// The sub-protocol payload of an AECPDU.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AecpPayload {
    /// AEM: `unsolicited` bit, command type, command-specific bytes.
    Aem {
        unsolicited: bool,
        command_type: AemCommandType,
        body: Bytes,
    },
    /// Address Access: a list of TLVs.
    AddressAccess { tlvs: Vec<AccessTlv> },
    /// Vendor Unique: protocol identifier plus protocol-defined bytes.
    VendorUnique {
        protocol_id: ProtocolIdentifier,
        body: Bytes,
    },
    /// AVC, HDCP and extended messages are carried verbatim.
    Opaque { body: Bytes },
}

const UNSOLICITED_BIT: u16 = 0x8000;

/// An AECPDU (clause 9.2.1).
///
/// The common part is 10 bytes past the target_entity_id:
/// controller_entity_id (8) and sequence_id (2); `control_data_length`
/// counts those plus the sub-protocol payload.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Aecpdu {
    pub dest_address: MacAddress,
    pub src_address: MacAddress,
    pub message_type: AecpMessageType,
    /// Raw 5-bit status; interpret with [`AemStatus`], [`AaStatus`] or
    /// [`MvuStatus`] depending on the message type.
    pub status: u8,
    pub target_entity_id: UniqueIdentifier,
    pub controller_entity_id: UniqueIdentifier,
    pub sequence_id: AecpSequenceId,
    pub payload: AecpPayload,
}

impl Aecpdu {
    pub const COMMON_LENGTH: u16 = 10;

    /// Build an AEM command addressed to `target_entity_id`.
    pub fn aem_command(
        target_entity_id: UniqueIdentifier,
        controller_entity_id: UniqueIdentifier,
        command_type: AemCommandType,
        body: Bytes,
    ) -> Aecpdu {
        Aecpdu {
            dest_address: MacAddress::default(),
            src_address: MacAddress::default(),
            message_type: AecpMessageType::AemCommand,
            status: AemStatus::Success.as_u8(),
            target_entity_id,
            controller_entity_id,
            sequence_id: 0,
            payload: AecpPayload::Aem {
                unsolicited: false,
                command_type,
                body,
            },
        }
    }

    /// Build an Address Access command addressed to `target_entity_id`.
    pub fn address_access_command(
        target_entity_id: UniqueIdentifier,
        controller_entity_id: UniqueIdentifier,
        tlvs: Vec<AccessTlv>,
    ) -> Aecpdu {
        Aecpdu {
            dest_address: MacAddress::default(),
            src_address: MacAddress::default(),
            message_type: AecpMessageType::AddressAccessCommand,
            status: AaStatus::Success.as_u8(),
            target_entity_id,
            controller_entity_id,
            sequence_id: 0,
            payload: AecpPayload::AddressAccess { tlvs },
        }
    }

    /// Build the Milan GET_MILAN_INFO command.
    pub fn get_milan_info(
        target_entity_id: UniqueIdentifier,
        controller_entity_id: UniqueIdentifier,
    ) -> Aecpdu {
        let mut body = BytesMut::with_capacity(4);
        body.put_u16(MvuCommandType::GetMilanInfo.as_u16());
        body.put_u16(0); // reserved
        Aecpdu {
            dest_address: MacAddress::default(),
            src_address: MacAddress::default(),
            message_type: AecpMessageType::VendorUniqueCommand,
            status: MvuStatus::Success.as_u8(),
            target_entity_id,
            controller_entity_id,
            sequence_id: 0,
            payload: AecpPayload::VendorUnique {
                protocol_id: MILAN_PROTOCOL_ID,
                body: body.freeze(),
            },
        }
    }

    /// The AEM command type, if this is an AEM message.
    pub fn aem_command_type(&self) -> Option<AemCommandType> {
        match &self.payload {
            AecpPayload::Aem { command_type, .. } => Some(*command_type),
            _ => None,
        }
    }

    /// The unsolicited bit of an AEM response (clause 9.2.2.3.1.2.4).
    pub fn is_unsolicited_response(&self) -> bool {
        matches!(
            (&self.message_type, &self.payload),
            (
                AecpMessageType::AemResponse,
                AecpPayload::Aem {
                    unsolicited: true,
                    ..
                }
            )
        )
    }

    /// The Vendor Unique protocol identifier, if this is a VU message.
    pub fn vendor_protocol_id(&self) -> Option<ProtocolIdentifier> {
        match &self.payload {
            AecpPayload::VendorUnique { protocol_id, .. } => Some(*protocol_id),
            _ => None,
        }
    }

    fn payload_length(&self) -> usize {
        match &self.payload {
            AecpPayload::Aem { body, .. } => 2 + body.len(),
            AecpPayload::AddressAccess { tlvs } => {
                2 + tlvs.iter().map(|t| 10 + t.data.len()).sum::<usize>()
            }
            AecpPayload::VendorUnique { body, .. } => 6 + body.len(),
            AecpPayload::Opaque { body } => body.len(),
        }
    }

    /// Serialize the full Ethernet frame, padded to the wire minimum.
    pub fn serialize(&self) -> Result<Bytes, PduError> {
        let control_data_length = usize::from(Self::COMMON_LENGTH) + self.payload_length();
        // subtype header (4) + target_entity_id (8) + the rest
        if 4 + 8 + control_data_length > AVTP_MAX_PAYLOAD_LENGTH {
            return Err(PduError::OverMaxLength);
        }
        let mut buf = BytesMut::with_capacity(EtherHeader::LENGTH + 12 + control_data_length);
        EtherHeader::avtp(self.dest_address, self.src_address).serialize(&mut buf);
        AvtpHeader::new(
            AvtpSubtype::Aecp,
            self.message_type.as_u8(),
            self.status,
            control_data_length as u16,
        )
        .serialize(&mut buf);
        put_eui64(&mut buf, self.target_entity_id);
        put_eui64(&mut buf, self.controller_entity_id);
        buf.put_u16(self.sequence_id);
        match &self.payload {
            AecpPayload::Aem {
                unsolicited,
                command_type,
                body,
            } => {
                let mut word = command_type.as_u16() & 0x7FFF;
                if *unsolicited {
                    word |= UNSOLICITED_BIT;
                }
                buf.put_u16(word);
                buf.put_slice(body);
            }
            AecpPayload::AddressAccess { tlvs } => {
                buf.put_u16(tlvs.len() as u16);
                for tlv in tlvs {
                    tlv.serialize(&mut buf)?;
                }
            }
            AecpPayload::VendorUnique { protocol_id, body } => {
                buf.put_slice(&protocol_id.0);
                buf.put_slice(body);
            }
            AecpPayload::Opaque { body } => buf.put_slice(body),
        }
        pad_frame(&mut buf);
        Ok(buf.freeze())
    }

    /// Parse the PDU that follows an already-consumed Ethernet header.
    pub fn parse<T: Buf>(eth: &EtherHeader, buf: &mut T) -> Result<Aecpdu, PduError> {
        let header = AvtpHeader::parse(buf)?.ok_or(PduError::BadFrame)?;
        let message_type = AecpMessageType::from_u8(header.control_data);
        let control_data_length = usize::from(header.control_data_length);
        if control_data_length < usize::from(Self::COMMON_LENGTH) {
            return Err(PduError::BadFrame);
        }
        ensure_remaining!(buf, 8 + control_data_length);
        let target_entity_id = read_eui64(buf);
        let controller_entity_id = read_eui64(buf);
        let sequence_id = buf.get_u16();
        let mut body = buf.copy_to_bytes(control_data_length - usize::from(Self::COMMON_LENGTH));

        let payload = match message_type {
            AecpMessageType::AemCommand | AecpMessageType::AemResponse => {
                ensure_remaining!(body, 2);
                let word = body.get_u16();
                AecpPayload::Aem {
                    unsolicited: word & UNSOLICITED_BIT != 0,
                    command_type: AemCommandType::from_u16(word & 0x7FFF),
                    body,
                }
            }
            AecpMessageType::AddressAccessCommand | AecpMessageType::AddressAccessResponse => {
                ensure_remaining!(body, 2);
                let count = body.get_u16();
                let mut tlvs = Vec::with_capacity(usize::from(count.min(64)));
                for _ in 0..count {
                    tlvs.push(AccessTlv::parse(&mut body)?);
                }
                AecpPayload::AddressAccess { tlvs }
            }
            AecpMessageType::VendorUniqueCommand | AecpMessageType::VendorUniqueResponse => {
                ensure_remaining!(body, 6);
                let mut pid = [0u8; 6];
                body.copy_to_slice(&mut pid);
                AecpPayload::VendorUnique {
                    protocol_id: ProtocolIdentifier(pid),
                    body,
                }
            }
            _ => AecpPayload::Opaque { body },
        };

        Ok(Aecpdu {
            dest_address: eth.dest_address,
            src_address: eth.src_address,
            message_type,
            status: header.status,
            target_entity_id,
            controller_entity_id,
            sequence_id,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(pdu: &Aecpdu) -> Aecpdu {
        let frame = pdu.serialize().unwrap();
        let mut buf = frame.clone();
        let eth = EtherHeader::parse(&mut buf).unwrap();
        Aecpdu::parse(&eth, &mut buf).unwrap()
    }

    #[test]
    fn aem_round_trip() {
        let pdu = Aecpdu {
            dest_address: MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
            src_address: MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
            message_type: AecpMessageType::AemResponse,
            status: AemStatus::EntityAcquired.as_u8(),
            target_entity_id: UniqueIdentifier::new(0xAABBCCDDEEFF0011),
            controller_entity_id: UniqueIdentifier::new(0x0011223355667788),
            sequence_id: 0x1234,
            payload: AecpPayload::Aem {
                unsolicited: false,
                command_type: AemCommandType::GetConfiguration,
                body: Bytes::from_static(&[0x00, 0x00, 0x00, 0x02]),
            },
        };
        assert_eq!(round_trip(&pdu), pdu);
    }

    #[test]
    fn unsolicited_bit_survives() {
        let mut pdu = Aecpdu::aem_command(
            UniqueIdentifier::new(0xAABBCCDDEEFF0011),
            UniqueIdentifier::new(0x0011223355667788),
            AemCommandType::GetCounters,
            Bytes::new(),
        );
        pdu.message_type = AecpMessageType::AemResponse;
        pdu.payload = AecpPayload::Aem {
            unsolicited: true,
            command_type: AemCommandType::GetCounters,
            body: Bytes::new(),
        };
        let parsed = round_trip(&pdu);
        assert!(parsed.is_unsolicited_response());
    }

    #[test]
    fn address_access_round_trip() {
        let pdu = Aecpdu {
            dest_address: MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
            src_address: MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
            message_type: AecpMessageType::AddressAccessCommand,
            status: 0,
            target_entity_id: UniqueIdentifier::new(0xAABBCCDDEEFF0011),
            controller_entity_id: UniqueIdentifier::new(0x0011223355667788),
            sequence_id: 7,
            payload: AecpPayload::AddressAccess {
                tlvs: vec![
                    AccessTlv {
                        mode: AaMode::Read,
                        address: 0x1000,
                        data: Bytes::new(),
                    },
                    AccessTlv {
                        mode: AaMode::Write,
                        address: 0x2000,
                        data: Bytes::from_static(&[1, 2, 3, 4]),
                    },
                ],
            },
        };
        assert_eq!(round_trip(&pdu), pdu);
    }

    #[test]
    fn address_access_command_builder() {
        let pdu = Aecpdu::address_access_command(
            UniqueIdentifier::new(0xAABBCCDDEEFF0011),
            UniqueIdentifier::new(0x0011223355667788),
            vec![
                AccessTlv::read(0x4000, 8),
                AccessTlv::write(0x2000, Bytes::from_static(&[1, 2])),
            ],
        );
        assert_eq!(pdu.message_type, AecpMessageType::AddressAccessCommand);
        let parsed = round_trip(&pdu);
        match parsed.payload {
            AecpPayload::AddressAccess { tlvs } => {
                assert_eq!(tlvs.len(), 2);
                assert_eq!(tlvs[0].mode, AaMode::Read);
                assert_eq!(tlvs[0].address, 0x4000);
                assert_eq!(tlvs[0].data.len(), 8);
                assert_eq!(tlvs[1].mode, AaMode::Write);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn milan_round_trip() {
        let pdu = Aecpdu::get_milan_info(
            UniqueIdentifier::new(0xAABBCCDDEEFF0011),
            UniqueIdentifier::new(0x0011223355667788),
        );
        let parsed = round_trip(&pdu);
        assert_eq!(parsed.vendor_protocol_id(), Some(MILAN_PROTOCOL_ID));
        match parsed.payload {
            AecpPayload::VendorUnique { mut body, .. } => {
                assert_eq!(
                    MvuCommandType::from_u16(body.get_u16()),
                    MvuCommandType::GetMilanInfo
                );
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn control_data_length_counts_payload() {
        let pdu = Aecpdu::aem_command(
            UniqueIdentifier::new(1),
            UniqueIdentifier::new(2),
            AemCommandType::GetConfiguration,
            Bytes::new(),
        );
        let frame = pdu.serialize().unwrap();
        let cdl = (u16::from(frame[16]) << 8 | u16::from(frame[17])) & 0x07FF;
        // common (10) + command_type word (2)
        assert_eq!(cdl, 12);
    }

    #[test]
    fn oversize_command_is_rejected() {
        let pdu = Aecpdu::aem_command(
            UniqueIdentifier::new(1),
            UniqueIdentifier::new(2),
            AemCommandType::AddAudioMappings,
            Bytes::from(vec![0u8; 1600]),
        );
        assert_eq!(pdu.serialize(), Err(PduError::OverMaxLength));
    }

    #[test]
    fn command_type_code_table() {
        assert_eq!(AemCommandType::from_u16(0x0007), AemCommandType::GetConfiguration);
        assert_eq!(AemCommandType::from_u16(0x0026), AemCommandType::IdentifyNotification);
        assert_eq!(AemCommandType::from_u16(0x0100), AemCommandType::Unknown(0x0100));
        for code in 0..0x60u16 {
            assert_eq!(AemCommandType::from_u16(code).as_u16(), code);
        }
        assert_eq!(AemCommandType::GetConfiguration.to_string(), "GET_CONFIGURATION");
    }

    #[test]
    fn minimum_payload_table() {
        assert_eq!(AemCommandType::AcquireEntity.min_command_payload_size(), Some(16));
        assert_eq!(AemCommandType::ReadDescriptor.min_command_payload_size(), Some(8));
        assert_eq!(AemCommandType::GetConfiguration.min_command_payload_size(), Some(0));
        assert_eq!(AemCommandType::SetName.min_command_payload_size(), Some(72));
        assert_eq!(AemCommandType::Expansion.min_command_payload_size(), None);
    }
}
