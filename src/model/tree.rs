/*! Composition of the static and dynamic halves into the entity tree.

Parents own their children outright; a child is addressed by its
descriptor index within the owning CONFIGURATION.  Cross-references
(e.g. a stream's `avb_interface_index`) stay indices and are resolved
with the lookup helpers on [`ConfigurationTree`].
*/

use super::*;
use crate::types::*;
use std::collections::BTreeMap;

/// Static + dynamic halves of one STREAM_INPUT.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct StreamInputModel {
    pub static_model: StreamStaticModel,
    pub dynamic_model: StreamInputDynamicModel,
}

/// Static + dynamic halves of one STREAM_OUTPUT.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct StreamOutputModel {
    pub static_model: StreamStaticModel,
    pub dynamic_model: StreamOutputDynamicModel,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct AvbInterfaceModel {
    pub static_model: AvbInterfaceStaticModel,
    pub dynamic_model: AvbInterfaceDynamicModel,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct ClockSourceModel {
    pub static_model: ClockSourceStaticModel,
    pub dynamic_model: ClockSourceDynamicModel,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct MemoryObjectModel {
    pub static_model: MemoryObjectStaticModel,
    pub dynamic_model: MemoryObjectDynamicModel,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct StringsModel {
    pub static_model: StringsStaticModel,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct AudioClusterModel {
    pub static_model: AudioClusterStaticModel,
    pub dynamic_model: AudioClusterDynamicModel,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct AudioMapModel {
    pub static_model: AudioMapStaticModel,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct ControlModel {
    pub static_model: ControlStaticModel,
    pub dynamic_model: ControlDynamicModel,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct ClockDomainModel {
    pub static_model: ClockDomainStaticModel,
    pub dynamic_model: ClockDomainDynamicModel,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct TimingModel {
    pub static_model: TimingStaticModel,
    pub dynamic_model: TimingDynamicModel,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct PtpPortModel {
    pub static_model: PtpPortStaticModel,
    pub dynamic_model: PtpPortDynamicModel,
}

/// A PTP_INSTANCE with its CONTROL and PTP_PORT children.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct PtpInstanceTree {
    pub control_models: BTreeMap<ControlIndex, ControlModel>,
    pub ptp_port_models: BTreeMap<PtpPortIndex, PtpPortModel>,
    pub static_model: PtpInstanceStaticModel,
    pub dynamic_model: PtpInstanceDynamicModel,
}

/// A JACK with its CONTROL children.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct JackTree {
    pub control_models: BTreeMap<ControlIndex, ControlModel>,
    pub static_model: JackStaticModel,
    pub dynamic_model: JackDynamicModel,
}

/// A LOCALE with its STRINGS children.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct LocaleTree {
    pub strings_models: BTreeMap<StringsIndex, StringsModel>,
    pub static_model: LocaleStaticModel,
}

/// A STREAM_PORT with its cluster, map and control children.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct StreamPortTree {
    pub audio_cluster_models: BTreeMap<ClusterIndex, AudioClusterModel>,
    pub audio_map_models: BTreeMap<MapIndex, AudioMapModel>,
    pub control_models: BTreeMap<ControlIndex, ControlModel>,
    pub static_model: StreamPortStaticModel,
    pub dynamic_model: StreamPortDynamicModel,
}

/// An AUDIO_UNIT with its stream-port and control children.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct AudioUnitTree {
    pub stream_port_input_trees: BTreeMap<StreamPortIndex, StreamPortTree>,
    pub stream_port_output_trees: BTreeMap<StreamPortIndex, StreamPortTree>,
    pub control_models: BTreeMap<ControlIndex, ControlModel>,
    pub static_model: AudioUnitStaticModel,
    pub dynamic_model: AudioUnitDynamicModel,
}

/// One CONFIGURATION and every descriptor it owns.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct ConfigurationTree {
    pub audio_unit_trees: BTreeMap<AudioUnitIndex, AudioUnitTree>,
    pub stream_input_models: BTreeMap<StreamIndex, StreamInputModel>,
    pub stream_output_models: BTreeMap<StreamIndex, StreamOutputModel>,
    pub jack_input_trees: BTreeMap<JackIndex, JackTree>,
    pub jack_output_trees: BTreeMap<JackIndex, JackTree>,
    pub avb_interface_models: BTreeMap<AvbInterfaceIndex, AvbInterfaceModel>,
    pub clock_source_models: BTreeMap<ClockSourceIndex, ClockSourceModel>,
    pub memory_object_models: BTreeMap<MemoryObjectIndex, MemoryObjectModel>,
    pub locale_trees: BTreeMap<LocaleIndex, LocaleTree>,
    pub control_models: BTreeMap<ControlIndex, ControlModel>,
    pub clock_domain_models: BTreeMap<ClockDomainIndex, ClockDomainModel>,
    pub timing_models: BTreeMap<TimingIndex, TimingModel>,
    pub ptp_instance_trees: BTreeMap<PtpInstanceIndex, PtpInstanceTree>,
    pub static_model: ConfigurationStaticModel,
    pub dynamic_model: ConfigurationDynamicModel,
}

impl ConfigurationTree {
    /// Resolve a stream's AVB_INTERFACE cross-reference.
    pub fn avb_interface_for_stream_input(
        &self,
        stream_index: StreamIndex,
    ) -> Option<&AvbInterfaceModel> {
        let stream = self.stream_input_models.get(&stream_index)?;
        self.avb_interface_models
            .get(&stream.static_model.avb_interface_index)
    }

    /// Resolve a CLOCK_DOMAIN's currently selected CLOCK_SOURCE.
    pub fn clock_source_for_domain(
        &self,
        domain_index: ClockDomainIndex,
    ) -> Option<&ClockSourceModel> {
        let domain = self.clock_domain_models.get(&domain_index)?;
        self.clock_source_models
            .get(&domain.dynamic_model.clock_source_index)
    }

    /// Look up a localized string by its reference, against the
    /// aggregated strings of the selected locale.
    pub fn localized_string(&self, reference: LocalizedStringReference) -> Option<&AemString> {
        let (group_offset, string_offset) = reference.offsets()?;
        let index = group_offset * 7 + u16::from(string_offset);
        self.dynamic_model.localized_strings.get(&index)
    }
}

/// The whole model of one entity: the ENTITY descriptor plus its
/// CONFIGURATION trees.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct EntityTree {
    pub configuration_trees: BTreeMap<ConfigurationIndex, ConfigurationTree>,
    pub static_model: EntityStaticModel,
    pub dynamic_model: EntityDynamicModel,
}

impl EntityTree {
    /// The configuration the entity currently runs.
    pub fn current_configuration(&self) -> Option<&ConfigurationTree> {
        self.configuration_trees
            .get(&self.dynamic_model.current_configuration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_with_streams() -> ConfigurationTree {
        let mut tree = ConfigurationTree::default();
        tree.avb_interface_models.insert(1, AvbInterfaceModel::default());
        tree.stream_input_models.insert(
            0,
            StreamInputModel {
                static_model: StreamStaticModel {
                    avb_interface_index: 1,
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        tree
    }

    #[test]
    fn stream_interface_cross_reference() {
        let tree = model_with_streams();
        assert!(tree.avb_interface_for_stream_input(0).is_some());
        assert!(tree.avb_interface_for_stream_input(1).is_none());
    }

    #[test]
    fn localized_string_lookup() {
        let mut tree = ConfigurationTree::default();
        tree.dynamic_model
            .localized_strings
            .insert(10, AemString::new("Output 3"));
        // group 1, string 3 -> aggregated index 10
        let reference = LocalizedStringReference((1 << 3) | 3);
        assert_eq!(
            tree.localized_string(reference).map(|s| s.as_str()),
            Some("Output 3")
        );
        assert_eq!(tree.localized_string(LocalizedStringReference::NONE), None);
    }

    #[test]
    fn current_configuration_lookup() {
        let mut entity = EntityTree::default();
        entity.configuration_trees.insert(0, ConfigurationTree::default());
        let mut active = ConfigurationTree::default();
        active.dynamic_model.is_active_configuration = true;
        entity.configuration_trees.insert(1, active);
        entity.dynamic_model.current_configuration = 1;
        assert!(entity
            .current_configuration()
            .unwrap()
            .dynamic_model
            .is_active_configuration);
    }
}
