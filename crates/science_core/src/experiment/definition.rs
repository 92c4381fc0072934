use serde::{Deserialize, Serialize};

use crate::{ConditionRegistry, ConditionSet, ConfigNode, LoadError, Modifiers};

/// Static description of an experiment, shared by every instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentDefinition {
    pub name: String,
    pub title: String,
    pub description: String,
    pub discipline: String,
    /// Data needed to finish research. Zero or less means continuous mode.
    pub required_data: f32,
    /// Zero or less means uncapped.
    pub maximum_data: f32,
    pub analysis_time: f32,
    pub research_data_rate: f32,
    pub data_size: f32,
    pub data_per_packet: f32,
    pub science_value: f32,
    pub science_value_per_data: f32,
    pub auto_analyze: bool,
    pub auto_transmit: bool,
    pub can_fail_at_any_time: bool,
    /// Share of packet value awarded on transmission; the rest waits for recovery.
    pub transmit_value: f32,
    pub conditions: ConditionSet,
}

impl Default for ExperimentDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            title: String::new(),
            description: String::new(),
            discipline: String::new(),
            required_data: 0.0,
            maximum_data: 0.0,
            analysis_time: 0.0,
            research_data_rate: 1.0,
            data_size: 0.0,
            data_per_packet: 1.0,
            science_value: 0.0,
            science_value_per_data: 0.0,
            auto_analyze: true,
            auto_transmit: true,
            can_fail_at_any_time: false,
            transmit_value: 1.0,
            conditions: ConditionSet::Empty,
        }
    }
}

impl ExperimentDefinition {
    pub fn is_continuous(&self) -> bool {
        self.required_data <= 0.0
    }

    /// Science value of one unit of data.
    pub fn value_per_data(&self) -> f32 {
        if self.science_value_per_data > 0.0 {
            self.science_value_per_data
        } else if self.data_size > 0.0 {
            self.science_value / self.data_size
        } else {
            0.0
        }
    }

    /// Packet size, never zero.
    pub fn packet_size(&self) -> f32 {
        if self.data_per_packet > 0.0 {
            self.data_per_packet
        } else {
            1.0
        }
    }

    /// Effective data cap under `modifiers`, or `None` when uncapped.
    pub fn effective_cap(&self, modifiers: Modifiers) -> Option<f32> {
        (self.maximum_data > 0.0)
            .then(|| self.maximum_data * modifiers.max_data_cap + modifiers.max_data_bonus)
    }

    /// Data queued when a fixed transmission starts.
    pub fn transmission_payload(&self, current_data: f32) -> f32 {
        if self.data_size > 0.0 {
            self.data_size
        } else {
            current_data
        }
    }

    /// Reads a definition block. Condition blocks that fail to load are
    /// skipped and returned alongside the definition.
    pub fn from_node(node: &ConfigNode, registry: &ConditionRegistry) -> (Self, Vec<LoadError>) {
        let d = Self::default();
        let mut diagnostics = Vec::new();
        let conditions = ConditionSet::load(node, registry, &mut diagnostics);
        let definition = Self {
            name: node.string_or("name", &d.name),
            title: node.string_or("title", &d.title),
            description: node.string_or("description", &d.description),
            discipline: node.string_or("discipline", &d.discipline),
            required_data: node.parse_or("requiredData", d.required_data),
            maximum_data: node.parse_or("maximumData", d.maximum_data),
            analysis_time: node.parse_or("analysisTime", d.analysis_time),
            research_data_rate: node.parse_or("researchDataRate", d.research_data_rate),
            data_size: node.parse_or("dataSize", d.data_size),
            data_per_packet: node.parse_or("dataPerPacket", d.data_per_packet),
            science_value: node.parse_or("scienceValue", d.science_value),
            science_value_per_data: node.parse_or("scienceValuePerData", d.science_value_per_data),
            auto_analyze: node.bool_or("autoAnalyze", d.auto_analyze),
            auto_transmit: node.bool_or("autoTransmit", d.auto_transmit),
            can_fail_at_any_time: node.bool_or("canFailAtAnyTime", d.can_fail_at_any_time),
            transmit_value: node
                .parse_or("transmitValue", d.transmit_value)
                .clamp(0.0, 1.0),
            conditions,
        };
        (definition, diagnostics)
    }
}
