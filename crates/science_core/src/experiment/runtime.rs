use serde::{Deserialize, Serialize};

use super::ExperimentDefinition;
use crate::ConfigNode;

/// Experiment lifecycle states. Ordinals are persisted and must not move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExperimentStatus {
    #[default]
    Unknown,
    Idle,
    ConditionsNotMet,
    Paused,
    PausedConnection,
    Researching,
    ResearchComplete,
    ResearchPausedConditionsNotMet,
    Analyzing,
    AnalysisComplete,
    ReadyToTransmit,
    StartTransmit,
    Transmitting,
    TransmitComplete,
    Failed,
    DataCapReached,
    Completed,
}

impl ExperimentStatus {
    pub const ALL: [ExperimentStatus; 17] = [
        ExperimentStatus::Unknown,
        ExperimentStatus::Idle,
        ExperimentStatus::ConditionsNotMet,
        ExperimentStatus::Paused,
        ExperimentStatus::PausedConnection,
        ExperimentStatus::Researching,
        ExperimentStatus::ResearchComplete,
        ExperimentStatus::ResearchPausedConditionsNotMet,
        ExperimentStatus::Analyzing,
        ExperimentStatus::AnalysisComplete,
        ExperimentStatus::ReadyToTransmit,
        ExperimentStatus::StartTransmit,
        ExperimentStatus::Transmitting,
        ExperimentStatus::TransmitComplete,
        ExperimentStatus::Failed,
        ExperimentStatus::DataCapReached,
        ExperimentStatus::Completed,
    ];

    pub fn ordinal(self) -> i32 {
        self as i32
    }

    /// `-1` is the legacy marker for "not yet loaded".
    pub fn from_ordinal(ordinal: i32) -> Option<ExperimentStatus> {
        if ordinal == -1 {
            return Some(ExperimentStatus::Unknown);
        }
        usize::try_from(ordinal)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ExperimentStatus::Failed | ExperimentStatus::Completed)
    }

    pub fn label(self) -> &'static str {
        match self {
            ExperimentStatus::Unknown => "Unknown",
            ExperimentStatus::Idle => "Idle",
            ExperimentStatus::ConditionsNotMet => "Conditions Not Met",
            ExperimentStatus::Paused => "Research Paused",
            ExperimentStatus::PausedConnection => "Lost Connection",
            ExperimentStatus::Researching => "Researching",
            ExperimentStatus::ResearchComplete => "Research Complete",
            ExperimentStatus::ResearchPausedConditionsNotMet => "Waiting For Conditions",
            ExperimentStatus::Analyzing => "Analyzing",
            ExperimentStatus::AnalysisComplete => "Analysis Complete",
            ExperimentStatus::ReadyToTransmit => "Ready to Transmit",
            ExperimentStatus::StartTransmit => "Starting Transmission",
            ExperimentStatus::Transmitting => "Transmitting",
            ExperimentStatus::TransmitComplete => "Transmission Complete",
            ExperimentStatus::Failed => "Failed",
            ExperimentStatus::DataCapReached => "Data Cap Reached",
            ExperimentStatus::Completed => "Complete",
        }
    }
}

/// Operator-triggered transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperimentAction {
    StartResearch,
    PauseResearch,
    StartAnalysis,
    TransmitResults,
}

impl ExperimentAction {
    /// States from which the action is accepted.
    pub fn accepts(self, status: ExperimentStatus) -> bool {
        use ExperimentStatus as S;
        match self {
            ExperimentAction::StartResearch => matches!(status, S::Idle | S::Paused),
            ExperimentAction::PauseResearch => matches!(
                status,
                S::Researching | S::ResearchPausedConditionsNotMet | S::DataCapReached
            ),
            ExperimentAction::StartAnalysis => status == S::ResearchComplete,
            ExperimentAction::TransmitResults => status == S::ReadyToTransmit,
        }
    }
}

/// Mutable per-instance progress. Every field persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRuntime {
    pub status: ExperimentStatus,
    pub current_data: f32,
    pub analysis_time_remaining: f32,
    pub last_tick_time: f32,
    pub transmitted_packets: f32,
    pub queued_packets: f32,
    pub data_to_send: f32,
    pub transmission_rate: f32,
    pub transmission_resource_cost_per_packet: f32,
    /// Value withheld from transmission, paid out on recovery.
    pub recovery_value: f32,
}

impl ExperimentRuntime {
    pub fn new(def: &ExperimentDefinition, now: f32) -> Self {
        Self {
            status: ExperimentStatus::Idle,
            current_data: 0.0,
            analysis_time_remaining: def.analysis_time,
            last_tick_time: now,
            transmitted_packets: 0.0,
            queued_packets: 0.0,
            data_to_send: 0.0,
            transmission_rate: 1.0,
            transmission_resource_cost_per_packet: 1.0,
            recovery_value: 0.0,
        }
    }

    /// Drops collected and queued data.
    pub(crate) fn clear_data(&mut self) {
        self.current_data = 0.0;
        self.data_to_send = 0.0;
        self.queued_packets = 0.0;
    }

    pub(crate) fn sync_queue(&mut self, def: &ExperimentDefinition) {
        self.queued_packets = self.data_to_send / def.packet_size();
    }

    pub fn save(&self, node: &mut ConfigNode) {
        node.add_value("state", self.status.ordinal());
        node.add_value("currentData", self.current_data);
        node.add_value("analysisTimeRemaining", self.analysis_time_remaining);
        node.add_value("lastTickTime", self.last_tick_time);
        node.add_value("transmittedPackets", self.transmitted_packets);
        node.add_value("transmissionRate", self.transmission_rate);
        node.add_value(
            "transmissionResourceCostPerPacket",
            self.transmission_resource_cost_per_packet,
        );
        node.add_value("queuedPackets", self.queued_packets);
        node.add_value("recoveryValue", self.recovery_value);
        node.add_value("dataToSend", self.data_to_send);
    }

    /// Missing fields take defaults; a missing or unreadable state is `Idle`.
    pub fn load(node: &ConfigNode, def: &ExperimentDefinition, now: f32) -> Self {
        let status = node
            .get_value("state")
            .and_then(|raw| raw.trim().parse::<i32>().ok())
            .and_then(ExperimentStatus::from_ordinal)
            .unwrap_or(ExperimentStatus::Idle);
        Self {
            status,
            current_data: node.parse_or("currentData", 0.0),
            analysis_time_remaining: node.parse_or("analysisTimeRemaining", def.analysis_time),
            last_tick_time: node.parse_or("lastTickTime", now),
            transmitted_packets: node.parse_or("transmittedPackets", 0.0),
            queued_packets: node.parse_or("queuedPackets", 0.0),
            data_to_send: node.parse_or("dataToSend", 0.0),
            transmission_rate: node.parse_or("transmissionRate", 1.0),
            transmission_resource_cost_per_packet: node
                .parse_or("transmissionResourceCostPerPacket", 1.0),
            recovery_value: node.parse_or("recoveryValue", 0.0),
        }
    }
}
