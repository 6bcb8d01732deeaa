/*! The dynamic half of each descriptor: live values that change at
runtime (names, formats, connection state, counters). */

use super::{
    AemString, AudioMapping, ControlValues, SamplingRate, StreamFormat, StreamIdentification,
};
use crate::pdu::AcmpStatus;
use crate::types::*;
use bitflags::bitflags;
use std::collections::{BTreeMap, BTreeSet};

bitflags! {
    /// ENTITY counters valid flags (clause 7.4.42, table 7.107).
    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
    pub struct EntityCounterFlag: u32 {
        const GPTP_GRANDMASTER_CHANGED = 0x0000_0001;
    }
}

bitflags! {
    /// AVB_INTERFACE counters valid flags.
    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
    pub struct AvbInterfaceCounterFlag: u32 {
        const LINK_UP = 0x0000_0001;
        const LINK_DOWN = 0x0000_0002;
        const FRAMES_TX = 0x0000_0004;
        const FRAMES_RX = 0x0000_0008;
        const RX_CRC_ERROR = 0x0000_0010;
        const GPTP_GM_CHANGED = 0x0000_0020;
    }
}

bitflags! {
    /// CLOCK_DOMAIN counters valid flags.
    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
    pub struct ClockDomainCounterFlag: u32 {
        const LOCKED = 0x0000_0001;
        const UNLOCKED = 0x0000_0002;
    }
}

bitflags! {
    /// STREAM_INPUT counters valid flags.
    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
    pub struct StreamInputCounterFlag: u32 {
        const MEDIA_LOCKED = 0x0000_0001;
        const MEDIA_UNLOCKED = 0x0000_0002;
        const STREAM_RESET = 0x0000_0004;
        const STREAM_INTERRUPTED = 0x0000_0008;
        const SEQ_NUM_MISMATCH = 0x0000_0010;
        const MEDIA_RESET = 0x0000_0020;
        const TIMESTAMP_UNCERTAIN = 0x0000_0040;
        const TIMESTAMP_VALID = 0x0000_0080;
        const TIMESTAMP_NOT_VALID = 0x0000_0100;
        const UNSUPPORTED_FORMAT = 0x0000_0200;
        const LATE_TIMESTAMP = 0x0000_0400;
        const EARLY_TIMESTAMP = 0x0000_0800;
        const FRAMES_RX = 0x0000_1000;
        const FRAMES_TX = 0x0000_2000;
    }
}

bitflags! {
    /// STREAM_OUTPUT counters valid flags, Milan 1.2 set.
    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
    pub struct StreamOutputCounterFlagMilan: u32 {
        const STREAM_START = 0x0000_0001;
        const STREAM_STOP = 0x0000_0002;
        const MEDIA_RESET = 0x0000_0004;
        const TIMESTAMP_UNCERTAIN = 0x0000_0008;
        const FRAMES_TX = 0x0000_0010;
    }
}

bitflags! {
    /// STREAM_OUTPUT counters valid flags, IEEE 1722.1-2021 set.
    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
    pub struct StreamOutputCounterFlagIeee: u32 {
        const FRAMES_TX = 0x0000_0001;
        const STREAM_START = 0x0000_0002;
        const STREAM_INTERRUPTED = 0x0000_0004;
        const MEDIA_RESET = 0x0000_0008;
        const TIMESTAMP_UNCERTAIN = 0x0000_0010;
    }
}

pub type EntityCounters = BTreeMap<EntityCounterFlag, super::DescriptorCounter>;
pub type AvbInterfaceCounters = BTreeMap<AvbInterfaceCounterFlag, super::DescriptorCounter>;
pub type ClockDomainCounters = BTreeMap<ClockDomainCounterFlag, super::DescriptorCounter>;
pub type StreamInputCounters = BTreeMap<StreamInputCounterFlag, super::DescriptorCounter>;

/// STREAM_OUTPUT counters: the flag layout differs between Milan 1.2
/// and IEEE 1722.1-2021, so the set records which dialect it is.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum StreamOutputCounters {
    Milan(BTreeMap<StreamOutputCounterFlagMilan, super::DescriptorCounter>),
    Ieee(BTreeMap<StreamOutputCounterFlagIeee, super::DescriptorCounter>),
}

/// Listener-side connection state (fast connect is Milan).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum StreamInputConnectionState {
    #[default]
    NotConnected,
    FastConnecting,
    Connected,
}

/// What a STREAM_INPUT is currently bound to.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct StreamInputConnectionInfo {
    pub state: StreamInputConnectionState,
    /// Only meaningful when `state != NotConnected`.
    pub talker_stream: StreamIdentification,
}

/// A subset of GET_STREAM_INFO, cached per stream.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct StreamDynamicInfo {
    pub is_class_b: bool,
    pub has_saved_state: bool,
    pub supports_encrypted: bool,
    pub pdus_encrypted: bool,
    pub talker_failed: bool,
    pub stream_id: Option<UniqueIdentifier>,
    pub msrp_accumulated_latency: Option<u32>,
    pub stream_dest_address: Option<MacAddress>,
    pub msrp_failure_code: Option<u8>,
    pub msrp_failure_bridge_id: Option<u64>,
    pub stream_vlan_id: Option<u16>,
    // Milan additions
    pub probing_status: Option<u8>,
    pub acmp_status: Option<AcmpStatus>,
}

/// ENTITY descriptor, dynamic half.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct EntityDynamicModel {
    pub entity_name: AemString,
    pub group_name: AemString,
    pub firmware_version: AemString,
    pub serial_number: AemString,
    pub current_configuration: ConfigurationIndex,
    pub counters: Option<EntityCounters>,
}

/// CONFIGURATION descriptor, dynamic half.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ConfigurationDynamicModel {
    pub object_name: AemString,
    pub is_active_configuration: bool,
    /// Localized strings of the selected locale, aggregated across its
    /// STRINGS descriptors.
    pub localized_strings: BTreeMap<StringsIndex, AemString>,
}

/// AUDIO_UNIT descriptor, dynamic half.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct AudioUnitDynamicModel {
    pub object_name: AemString,
    pub current_sampling_rate: SamplingRate,
}

/// STREAM_INPUT descriptor, dynamic half.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct StreamInputDynamicModel {
    pub object_name: AemString,
    pub stream_format: StreamFormat,
    pub is_stream_running: Option<bool>,
    pub stream_dynamic_info: Option<StreamDynamicInfo>,
    pub connection_info: StreamInputConnectionInfo,
    pub counters: Option<StreamInputCounters>,
}

/// STREAM_OUTPUT descriptor, dynamic half.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct StreamOutputDynamicModel {
    pub object_name: AemString,
    pub stream_format: StreamFormat,
    pub is_stream_running: Option<bool>,
    pub stream_dynamic_info: Option<StreamDynamicInfo>,
    /// Listener sinks currently connected to this output.
    pub connections: BTreeSet<StreamIdentification>,
    pub counters: Option<StreamOutputCounters>,
}

/// JACK descriptor, dynamic half.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct JackDynamicModel {
    pub object_name: AemString,
}

/// AVB_INTERFACE descriptor, dynamic half.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct AvbInterfaceDynamicModel {
    pub object_name: AemString,
    pub mac_address: MacAddress,
    pub clock_identity: UniqueIdentifier,
    pub priority1: u8,
    pub clock_class: u8,
    pub offset_scaled_log_variance: u16,
    pub clock_accuracy: u8,
    pub priority2: u8,
    pub domain_number: u8,
    pub log_sync_interval: u8,
    pub log_announce_interval: u8,
    pub log_pdelay_interval: u8,
    pub gptp_grandmaster_id: UniqueIdentifier,
    pub gptp_domain_number: u8,
    pub propagation_delay: Option<u32>,
    pub counters: Option<AvbInterfaceCounters>,
}

/// CLOCK_SOURCE descriptor, dynamic half.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ClockSourceDynamicModel {
    pub object_name: AemString,
    pub clock_source_identifier: UniqueIdentifier,
}

/// MEMORY_OBJECT descriptor, dynamic half.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct MemoryObjectDynamicModel {
    pub object_name: AemString,
    pub length: u64,
}

/// STREAM_PORT descriptor, dynamic half.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct StreamPortDynamicModel {
    /// The live audio map, for ports with `has_dynamic_audio_map`.
    pub dynamic_audio_map: Vec<AudioMapping>,
}

/// AUDIO_CLUSTER descriptor, dynamic half.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct AudioClusterDynamicModel {
    pub object_name: AemString,
}

/// CONTROL descriptor, dynamic half.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct ControlDynamicModel {
    pub object_name: AemString,
    pub values: ControlValues,
}

/// CLOCK_DOMAIN descriptor, dynamic half.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ClockDomainDynamicModel {
    pub object_name: AemString,
    pub clock_source_index: ClockSourceIndex,
    pub counters: Option<ClockDomainCounters>,
}

/// TIMING descriptor, dynamic half.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct TimingDynamicModel {
    pub object_name: AemString,
}

/// PTP_INSTANCE descriptor, dynamic half.
///
/// Only the object name for now: the remaining dynamic info comes from
/// GET_PTP_INSTANCE_INFO (clause 7.4.82), which this library does not
/// decode yet.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct PtpInstanceDynamicModel {
    pub object_name: AemString,
}

/// PTP_PORT descriptor, dynamic half.
///
/// Only the object name for now; see GET_PTP_PORT_INFO (clause 7.4.95).
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct PtpPortDynamicModel {
    pub object_name: AemString,
}
