/*! Descriptor types and the static half of each descriptor.

The static half is invariant for a given EntityModelID: counts and base
indices of children, supported formats and rates, localized-string
references.  Everything live goes in the dynamic half
([`super::dynamic`]).
*/

use super::{AemString, AudioMapping, LocalizedStringReference, SamplingRate, StreamFormat};
use crate::types::*;
use bitflags::bitflags;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// AEM descriptor type (clause 7.2, table 7.1).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum DescriptorType {
    Entity,
    Configuration,
    AudioUnit,
    VideoUnit,
    SensorUnit,
    StreamInput,
    StreamOutput,
    JackInput,
    JackOutput,
    AvbInterface,
    ClockSource,
    MemoryObject,
    Locale,
    Strings,
    StreamPortInput,
    StreamPortOutput,
    ExternalPortInput,
    ExternalPortOutput,
    InternalPortInput,
    InternalPortOutput,
    AudioCluster,
    VideoCluster,
    SensorCluster,
    AudioMap,
    VideoMap,
    SensorMap,
    Control,
    SignalSelector,
    Mixer,
    Matrix,
    MatrixSignal,
    SignalSplitter,
    SignalCombiner,
    SignalDemultiplexer,
    SignalMultiplexer,
    SignalTranscoder,
    ClockDomain,
    ControlBlock,
    Timing,
    PtpInstance,
    PtpPort,
    Invalid,
    Unknown(u16),
}

impl DescriptorType {
    pub fn from_u16(value: u16) -> DescriptorType {
        use DescriptorType::*;
        match value {
            0x0000 => Entity,
            0x0001 => Configuration,
            0x0002 => AudioUnit,
            0x0003 => VideoUnit,
            0x0004 => SensorUnit,
            0x0005 => StreamInput,
            0x0006 => StreamOutput,
            0x0007 => JackInput,
            0x0008 => JackOutput,
            0x0009 => AvbInterface,
            0x000a => ClockSource,
            0x000b => MemoryObject,
            0x000c => Locale,
            0x000d => Strings,
            0x000e => StreamPortInput,
            0x000f => StreamPortOutput,
            0x0010 => ExternalPortInput,
            0x0011 => ExternalPortOutput,
            0x0012 => InternalPortInput,
            0x0013 => InternalPortOutput,
            0x0014 => AudioCluster,
            0x0015 => VideoCluster,
            0x0016 => SensorCluster,
            0x0017 => AudioMap,
            0x0018 => VideoMap,
            0x0019 => SensorMap,
            0x001a => Control,
            0x001b => SignalSelector,
            0x001c => Mixer,
            0x001d => Matrix,
            0x001e => MatrixSignal,
            0x001f => SignalSplitter,
            0x0020 => SignalCombiner,
            0x0021 => SignalDemultiplexer,
            0x0022 => SignalMultiplexer,
            0x0023 => SignalTranscoder,
            0x0024 => ClockDomain,
            0x0025 => ControlBlock,
            0x0026 => Timing,
            0x0027 => PtpInstance,
            0x0028 => PtpPort,
            0xffff => Invalid,
            n => Unknown(n),
        }
    }

    pub fn as_u16(self) -> u16 {
        use DescriptorType::*;
        match self {
            Entity => 0x0000,
            Configuration => 0x0001,
            AudioUnit => 0x0002,
            VideoUnit => 0x0003,
            SensorUnit => 0x0004,
            StreamInput => 0x0005,
            StreamOutput => 0x0006,
            JackInput => 0x0007,
            JackOutput => 0x0008,
            AvbInterface => 0x0009,
            ClockSource => 0x000a,
            MemoryObject => 0x000b,
            Locale => 0x000c,
            Strings => 0x000d,
            StreamPortInput => 0x000e,
            StreamPortOutput => 0x000f,
            ExternalPortInput => 0x0010,
            ExternalPortOutput => 0x0011,
            InternalPortInput => 0x0012,
            InternalPortOutput => 0x0013,
            AudioCluster => 0x0014,
            VideoCluster => 0x0015,
            SensorCluster => 0x0016,
            AudioMap => 0x0017,
            VideoMap => 0x0018,
            SensorMap => 0x0019,
            Control => 0x001a,
            SignalSelector => 0x001b,
            Mixer => 0x001c,
            Matrix => 0x001d,
            MatrixSignal => 0x001e,
            SignalSplitter => 0x001f,
            SignalCombiner => 0x0020,
            SignalDemultiplexer => 0x0021,
            SignalMultiplexer => 0x0022,
            SignalTranscoder => 0x0023,
            ClockDomain => 0x0024,
            ControlBlock => 0x0025,
            Timing => 0x0026,
            PtpInstance => 0x0027,
            PtpPort => 0x0028,
            Invalid => 0xffff,
            Unknown(n) => n,
        }
    }
}

impl fmt::Display for DescriptorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorType::Unknown(n) => write!(f, "UNKNOWN({n:#06x})"),
            other => write!(f, "{other:?}"),
        }
    }
}

impl Default for DescriptorType {
    fn default() -> Self {
        DescriptorType::Invalid
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum JackType {
    #[default]
    Speaker,
    Headphone,
    AnalogMicrophone,
    Spdif,
    Adat,
    Tdif,
    Madi,
    UnbalancedAnalog,
    BalancedAnalog,
    Digital,
    Midi,
    AesEbu,
    CompositeVideo,
    SVhsVideo,
    ComponentVideo,
    Dvi,
    Hdmi,
    Udi,
    DisplayPort,
    Antenna,
    AnalogTuner,
    Ethernet,
    Wifi,
    Usb,
    Pci,
    PciE,
    Scsi,
    Ata,
    Imager,
    Ir,
    Thunderbolt,
    Sata,
    SmpteLtc,
    DigitalMicrophone,
    AudioMediaClock,
    VideoMediaClock,
    GnssClock,
    Pps,
    Unknown(u16),
}

impl JackType {
    pub fn from_u16(value: u16) -> JackType {
        use JackType::*;
        match value {
            0x0000 => Speaker,
            0x0001 => Headphone,
            0x0002 => AnalogMicrophone,
            0x0003 => Spdif,
            0x0004 => Adat,
            0x0005 => Tdif,
            0x0006 => Madi,
            0x0007 => UnbalancedAnalog,
            0x0008 => BalancedAnalog,
            0x0009 => Digital,
            0x000a => Midi,
            0x000b => AesEbu,
            0x000c => CompositeVideo,
            0x000d => SVhsVideo,
            0x000e => ComponentVideo,
            0x000f => Dvi,
            0x0010 => Hdmi,
            0x0011 => Udi,
            0x0012 => DisplayPort,
            0x0013 => Antenna,
            0x0014 => AnalogTuner,
            0x0015 => Ethernet,
            0x0016 => Wifi,
            0x0017 => Usb,
            0x0018 => Pci,
            0x0019 => PciE,
            0x001a => Scsi,
            0x001b => Ata,
            0x001c => Imager,
            0x001d => Ir,
            0x001e => Thunderbolt,
            0x001f => Sata,
            0x0020 => SmpteLtc,
            0x0021 => DigitalMicrophone,
            0x0022 => AudioMediaClock,
            0x0023 => VideoMediaClock,
            0x0024 => GnssClock,
            0x0025 => Pps,
            n => Unknown(n),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ClockSourceType {
    #[default]
    Internal,
    External,
    InputStream,
    Expansion,
    Unknown(u16),
}

impl ClockSourceType {
    pub fn from_u16(value: u16) -> ClockSourceType {
        match value {
            0x0000 => ClockSourceType::Internal,
            0x0001 => ClockSourceType::External,
            0x0002 => ClockSourceType::InputStream,
            0xffff => ClockSourceType::Expansion,
            n => ClockSourceType::Unknown(n),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum MemoryObjectType {
    #[default]
    FirmwareImage,
    VendorSpecific,
    CrashDump,
    LogObject,
    AutostartSettings,
    SnapshotSettings,
    SvgManufacturer,
    SvgEntity,
    SvgGeneric,
    PngManufacturer,
    PngEntity,
    PngGeneric,
    DaeManufacturer,
    DaeEntity,
    DaeGeneric,
    Unknown(u16),
}

impl MemoryObjectType {
    pub fn from_u16(value: u16) -> MemoryObjectType {
        use MemoryObjectType::*;
        match value {
            0x0000 => FirmwareImage,
            0x0001 => VendorSpecific,
            0x0002 => CrashDump,
            0x0003 => LogObject,
            0x0004 => AutostartSettings,
            0x0005 => SnapshotSettings,
            0x0006 => SvgManufacturer,
            0x0007 => SvgEntity,
            0x0008 => SvgGeneric,
            0x0009 => PngManufacturer,
            0x000a => PngEntity,
            0x000b => PngGeneric,
            0x000c => DaeManufacturer,
            0x000d => DaeEntity,
            0x000e => DaeGeneric,
            n => Unknown(n),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum AudioClusterFormat {
    #[default]
    Iec60958,
    Mbla,
    Midi,
    Smpte,
    Unknown(u8),
}

impl AudioClusterFormat {
    pub fn from_u8(value: u8) -> AudioClusterFormat {
        match value {
            0x00 => AudioClusterFormat::Iec60958,
            0x40 => AudioClusterFormat::Mbla,
            0x80 => AudioClusterFormat::Midi,
            0x88 => AudioClusterFormat::Smpte,
            n => AudioClusterFormat::Unknown(n),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TimingAlgorithm {
    #[default]
    Single,
    Fallback,
    Combined,
    Unknown(u16),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PtpPortType {
    #[default]
    P2pLinkLayer,
    P2pMulticastUdpV4,
    P2pMulticastUdpV6,
    TimingMeasurement,
    FineTimingMeasurement,
    E2eLinkLayer,
    E2eMulticastUdpV4,
    E2eMulticastUdpV6,
    P2pUnicastUdpV4,
    P2pUnicastUdpV6,
    E2eUnicastUdpV4,
    E2eUnicastUdpV6,
    Unknown(u16),
}

bitflags! {
    /// STREAM descriptor stream_flags (clause 7.2.6.1).
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct StreamFlags: u16 {
        const CLOCK_SYNC_SOURCE = 0x0001;
        const CLASS_A = 0x0002;
        const CLASS_B = 0x0004;
        const SUPPORTS_ENCRYPTED = 0x0008;
        const PRIMARY_BACKUP_SUPPORTED = 0x0010;
        const PRIMARY_BACKUP_VALID = 0x0020;
        const SECONDARY_BACKUP_SUPPORTED = 0x0040;
        const SECONDARY_BACKUP_VALID = 0x0080;
        const TERTIARY_BACKUP_SUPPORTED = 0x0100;
        const TERTIARY_BACKUP_VALID = 0x0200;
    }
}

bitflags! {
    /// JACK descriptor jack_flags (clause 7.2.7.1).
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct JackFlags: u16 {
        const CLOCK_SYNC_SOURCE = 0x0001;
        const CAPTIVE = 0x0002;
    }
}

bitflags! {
    /// AVB_INTERFACE descriptor interface_flags (clause 7.2.8.1).
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct AvbInterfaceFlags: u16 {
        const GPTP_GRANDMASTER_SUPPORTED = 0x0001;
        const GPTP_SUPPORTED = 0x0002;
        const SRP_SUPPORTED = 0x0004;
        const FQTSS_NOT_SUPPORTED = 0x0008;
        const SCHEDULED_TRAFFIC_SUPPORTED = 0x0010;
        const CAN_LISTEN_TO_SELF = 0x0020;
        const CAN_LISTEN_TO_OTHER_SELF = 0x0040;
    }
}

bitflags! {
    /// STREAM_PORT descriptor port_flags (clause 7.2.13.1).
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct PortFlags: u16 {
        const CLOCK_SYNC_SOURCE = 0x0001;
        const ASYNC_SAMPLE_RATE_CONV = 0x0002;
        const SYNC_SAMPLE_RATE_CONV = 0x0004;
    }
}

bitflags! {
    /// PTP_INSTANCE descriptor flags.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct PtpInstanceFlags: u32 {
        const GRANDMASTER_CAPABLE = 0x0000_0001;
        const GPTP = 0x0000_0002;
        const SRP = 0x0000_0004;
    }
}

bitflags! {
    /// PTP_PORT descriptor flags.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct PtpPortFlags: u16 {
        const CAN_ENABLE = 0x0001;
        const LINK_LOCAL = 0x0002;
        const DELAY_ASYMMETRY = 0x0004;
        const PROFILE_IDENTIFIER_VALID = 0x0008;
    }
}

/// ENTITY descriptor, static half (clause 7.2.1).
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct EntityStaticModel {
    pub vendor_name_string: LocalizedStringReference,
    pub model_name_string: LocalizedStringReference,
}

/// CONFIGURATION descriptor, static half (clause 7.2.2).
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ConfigurationStaticModel {
    pub localized_description: LocalizedStringReference,
    /// How many descriptors of each type this configuration holds.
    pub descriptor_counts: BTreeMap<DescriptorType, u16>,
}

/// AUDIO_UNIT descriptor, static half (clause 7.2.3).
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct AudioUnitStaticModel {
    pub localized_description: LocalizedStringReference,
    pub clock_domain_index: ClockDomainIndex,
    pub number_of_stream_input_ports: u16,
    pub base_stream_input_port: StreamPortIndex,
    pub number_of_stream_output_ports: u16,
    pub base_stream_output_port: StreamPortIndex,
    pub number_of_external_input_ports: u16,
    pub base_external_input_port: ExternalPortIndex,
    pub number_of_external_output_ports: u16,
    pub base_external_output_port: ExternalPortIndex,
    pub number_of_internal_input_ports: u16,
    pub base_internal_input_port: InternalPortIndex,
    pub number_of_internal_output_ports: u16,
    pub base_internal_output_port: InternalPortIndex,
    pub number_of_controls: u16,
    pub base_control: ControlIndex,
    pub sampling_rates: BTreeSet<SamplingRate>,
}

/// STREAM_INPUT / STREAM_OUTPUT descriptor, static half (clause 7.2.6).
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct StreamStaticModel {
    pub localized_description: LocalizedStringReference,
    pub clock_domain_index: ClockDomainIndex,
    pub stream_flags: StreamFlags,
    pub backup_talker_entity_id_0: UniqueIdentifier,
    pub backup_talker_unique_id_0: u16,
    pub backup_talker_entity_id_1: UniqueIdentifier,
    pub backup_talker_unique_id_1: u16,
    pub backup_talker_entity_id_2: UniqueIdentifier,
    pub backup_talker_unique_id_2: u16,
    pub backedup_talker_entity_id: UniqueIdentifier,
    pub backedup_talker_unique: u16,
    /// Which AVB_INTERFACE this stream runs on (same configuration).
    pub avb_interface_index: AvbInterfaceIndex,
    pub buffer_length: u32,
    pub formats: BTreeSet<StreamFormat>,
}

/// JACK_INPUT / JACK_OUTPUT descriptor, static half (clause 7.2.7).
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct JackStaticModel {
    pub localized_description: LocalizedStringReference,
    pub jack_flags: JackFlags,
    pub jack_type: JackType,
    pub number_of_controls: u16,
    pub base_control: ControlIndex,
}

/// AVB_INTERFACE descriptor, static half (clause 7.2.8).
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct AvbInterfaceStaticModel {
    pub localized_description: LocalizedStringReference,
    pub mac_address: MacAddress,
    pub interface_flags: AvbInterfaceFlags,
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
    pub port_number: u16,
}

/// CLOCK_SOURCE descriptor, static half (clause 7.2.9).
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ClockSourceStaticModel {
    pub localized_description: LocalizedStringReference,
    pub clock_source_type: ClockSourceType,
    pub clock_source_location_type: DescriptorType,
    pub clock_source_location_index: DescriptorIndex,
}

/// MEMORY_OBJECT descriptor, static half (clause 7.2.10).
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct MemoryObjectStaticModel {
    pub localized_description: LocalizedStringReference,
    pub memory_object_type: MemoryObjectType,
    pub target_descriptor_type: DescriptorType,
    pub target_descriptor_index: DescriptorIndex,
    pub start_address: u64,
    pub maximum_length: u64,
}

/// LOCALE descriptor, static half (clause 7.2.11).
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct LocaleStaticModel {
    /// IETF language tag, e.g. "en-US".
    pub locale_id: AemString,
    pub number_of_string_descriptors: u16,
    pub base_string_descriptor_index: StringsIndex,
}

/// STRINGS descriptor, static half (clause 7.2.12): seven strings.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct StringsStaticModel {
    pub strings: [AemString; 7],
}

/// STREAM_PORT descriptor, static half (clause 7.2.13).
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct StreamPortStaticModel {
    pub clock_domain_index: ClockDomainIndex,
    pub port_flags: PortFlags,
    pub number_of_controls: u16,
    pub base_control: ControlIndex,
    pub number_of_clusters: u16,
    pub base_cluster: ClusterIndex,
    pub number_of_maps: u16,
    pub base_map: MapIndex,
    /// number_of_maps == 0: mappings are dynamic, fetched with
    /// GET_AUDIO_MAP and edited with ADD/REMOVE_AUDIO_MAPPINGS.
    pub has_dynamic_audio_map: bool,
}

/// AUDIO_CLUSTER descriptor, static half (clause 7.2.16).
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct AudioClusterStaticModel {
    pub localized_description: LocalizedStringReference,
    pub signal_type: DescriptorType,
    pub signal_index: DescriptorIndex,
    pub signal_output: u16,
    pub path_latency: u32,
    pub block_latency: u32,
    pub channel_count: u16,
    pub format: AudioClusterFormat,
}

/// AUDIO_MAP descriptor, static half (clause 7.2.19).
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct AudioMapStaticModel {
    pub mappings: Vec<AudioMapping>,
}

/// CONTROL descriptor, static half (clause 7.2.22).
#[derive(Clone, PartialEq, Debug, Default)]
pub struct ControlStaticModel {
    pub localized_description: LocalizedStringReference,
    pub block_latency: u32,
    pub control_latency: u32,
    pub control_domain: u16,
    pub control_type: UniqueIdentifier,
    pub reset_time: u32,
    pub signal_type: DescriptorType,
    pub signal_index: DescriptorIndex,
    pub signal_output: u16,
    pub control_value_type: super::ControlValueType,
    pub number_of_values: u16,
    /// Static (min/max/default) halves of the control's values.
    pub values: super::ControlValues,
}

/// CLOCK_DOMAIN descriptor, static half (clause 7.2.32).
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ClockDomainStaticModel {
    pub localized_description: LocalizedStringReference,
    pub clock_sources: Vec<ClockSourceIndex>,
}

/// TIMING descriptor, static half (clause 7.2.34).
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct TimingStaticModel {
    pub localized_description: LocalizedStringReference,
    pub algorithm: TimingAlgorithm,
    pub ptp_instances: Vec<PtpInstanceIndex>,
}

/// PTP_INSTANCE descriptor, static half (clause 7.2.35).
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct PtpInstanceStaticModel {
    pub localized_description: LocalizedStringReference,
    pub clock_identity: UniqueIdentifier,
    pub flags: PtpInstanceFlags,
    pub number_of_controls: u16,
    pub base_control: ControlIndex,
    pub number_of_ptp_ports: u16,
    pub base_ptp_port: PtpPortIndex,
}

/// PTP_PORT descriptor, static half (clause 7.2.36).
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct PtpPortStaticModel {
    pub localized_description: LocalizedStringReference,
    pub port_number: u16,
    pub port_type: PtpPortType,
    pub flags: PtpPortFlags,
    pub avb_interface_index: AvbInterfaceIndex,
    pub profile_identifier: MacAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_type_codes() {
        assert_eq!(DescriptorType::from_u16(0x0005), DescriptorType::StreamInput);
        assert_eq!(DescriptorType::from_u16(0x0028), DescriptorType::PtpPort);
        assert_eq!(DescriptorType::from_u16(0xffff), DescriptorType::Invalid);
        for code in 0..0x29u16 {
            assert_eq!(DescriptorType::from_u16(code).as_u16(), code);
        }
    }
}
