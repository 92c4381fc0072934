use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ExperimentContext, ExperimentDefinition, ExperimentInstance, ExperimentStatus};
use crate::{AwardReason, ChannelId, Event, ExperimentId, ValueSink};

/// Data left below this counts as fully sent.
const DATA_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelPreference {
    #[default]
    LowestCost,
    HighestRate,
}

/// One transmitter on a vessel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    /// Packets per second.
    pub rate: f32,
    pub resource_cost_per_packet: f32,
    pub resource_name: String,
    #[serde(default = "default_online")]
    pub online: bool,
    #[serde(default)]
    pub claimed_by: Option<ExperimentId>,
}

fn default_online() -> bool {
    true
}

impl Channel {
    pub fn new(id: &str, rate: f32, resource_cost_per_packet: f32, resource_name: &str) -> Self {
        Self {
            id: ChannelId(id.to_string()),
            rate,
            resource_cost_per_packet,
            resource_name: resource_name.to_string(),
            online: true,
            claimed_by: None,
        }
    }

    /// True when a different instance holds the claim.
    pub fn is_busy_for(&self, experiment: &ExperimentId) -> bool {
        self.claimed_by
            .as_ref()
            .is_some_and(|owner| owner != experiment)
    }
}

/// Preferred online channel with a positive rate and a positive cost,
/// ignoring claims. Ties keep the earlier channel.
pub fn select_channel(channels: &[Channel], preference: ChannelPreference) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (index, channel) in channels.iter().enumerate() {
        let usable =
            channel.online && channel.rate > 0.0 && channel.resource_cost_per_packet > 0.0;
        if !usable {
            continue;
        }
        let better = best.map_or(true, |current| {
            let current = &channels[current];
            match preference {
                ChannelPreference::LowestCost => {
                    channel.resource_cost_per_packet < current.resource_cost_per_packet
                }
                ChannelPreference::HighestRate => channel.rate > current.rate,
            }
        });
        if better {
            best = Some(index);
        }
    }
    best
}

/// Guard for the periodic transmission task. At most one task per instance;
/// starting twice and stopping twice are both no-ops.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransmissionScheduler {
    pub running: bool,
    /// Channel currently claimed by this task.
    pub channel: Option<ChannelId>,
}

impl TransmissionScheduler {
    /// Returns false if the task was already running.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        true
    }

    pub fn stop(&mut self, channels: &mut [Channel], owner: &ExperimentId) {
        self.running = false;
        self.release(channels, owner);
    }

    pub(super) fn claim(&mut self, channel: &mut Channel, owner: &ExperimentId) {
        channel.claimed_by = Some(owner.clone());
        self.channel = Some(channel.id.clone());
    }

    fn release(&mut self, channels: &mut [Channel], owner: &ExperimentId) {
        let Some(id) = self.channel.take() else {
            return;
        };
        for channel in channels
            .iter_mut()
            .filter(|channel| channel.id == id && channel.claimed_by.as_ref() == Some(owner))
        {
            channel.claimed_by = None;
        }
    }
}

impl ExperimentInstance {
    /// One invocation of the periodic transmission task, covering `period`
    /// seconds. Does nothing unless the scheduler is running.
    pub fn transmit_step(
        &mut self,
        def: &ExperimentDefinition,
        ctx: &mut ExperimentContext<'_>,
        period: f32,
        sink: &mut dyn ValueSink,
        events: &mut Vec<Event>,
    ) {
        if !self.scheduler.running {
            return;
        }
        if self.runtime.data_to_send > DATA_EPSILON {
            let Some(index) = self.ensure_channel(ctx) else {
                if self.runtime.status == ExperimentStatus::Transmitting {
                    self.lose_connection(ctx, events);
                }
                return;
            };
            self.deliver(def, index, ctx, period, sink, events);
        }
        self.check_transmission_complete(def, ctx, events);
    }

    /// Index of the claimed channel, claiming the preferred free one when
    /// the cached channel is gone or offline.
    fn ensure_channel(&mut self, ctx: &mut ExperimentContext<'_>) -> Option<usize> {
        let cached = self.scheduler.channel.as_ref().and_then(|id| {
            ctx.channels
                .iter()
                .position(|channel| &channel.id == id && channel.online)
        });
        if cached.is_some() {
            return cached;
        }
        self.scheduler.release(ctx.channels, &self.id);

        let index = select_channel(ctx.channels, ctx.preference)?;
        let channel = &mut ctx.channels[index];
        if channel.is_busy_for(&self.id) {
            return None;
        }
        self.runtime.transmission_rate = channel.rate;
        self.runtime.transmission_resource_cost_per_packet = channel.resource_cost_per_packet;
        self.scheduler.claim(channel, &self.id);
        Some(index)
    }

    fn deliver(
        &mut self,
        def: &ExperimentDefinition,
        index: usize,
        ctx: &mut ExperimentContext<'_>,
        period: f32,
        sink: &mut dyn ValueSink,
        events: &mut Vec<Event>,
    ) {
        let packet_size = def.packet_size();
        let packets = (self.runtime.data_to_send / packet_size)
            .min(self.runtime.transmission_rate * period);
        if packets <= 0.0 {
            return;
        }

        let requested = self.runtime.transmission_resource_cost_per_packet * packets;
        let withdrawn = ctx
            .resources
            .withdraw(&ctx.channels[index].resource_name, requested);
        let delivered_fraction = if requested > 0.0 {
            (withdrawn / requested).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let delivered_data = packets * packet_size * delivered_fraction;
        let value = delivered_data * def.value_per_data();
        let awarded = value * def.transmit_value;
        let deferred = value * (1.0 - def.transmit_value);
        sink.award(awarded, AwardReason::Transmission);
        self.runtime.recovery_value += deferred;

        self.runtime.data_to_send = (self.runtime.data_to_send - delivered_data).max(0.0);
        self.runtime.transmitted_packets += packets * delivered_fraction;
        self.runtime.sync_queue(def);
        if def.is_continuous() {
            self.runtime.current_data = (self.runtime.current_data - delivered_data).max(0.0);
        }

        debug!(
            experiment = %self.id,
            packets,
            delivered_fraction,
            value = awarded,
            remaining = self.runtime.data_to_send,
            "transmission step"
        );
        events.push(Event::ScienceTransmitted {
            vessel_id: ctx.vessel_id.clone(),
            experiment_id: self.id.clone(),
            packets,
            value: awarded,
            deferred,
            delivered_fraction,
        });
    }

    fn check_transmission_complete(
        &mut self,
        def: &ExperimentDefinition,
        ctx: &ExperimentContext<'_>,
        events: &mut Vec<Event>,
    ) {
        let drained = self.runtime.data_to_send <= DATA_EPSILON;
        let collected = !def.is_continuous() && self.runtime.current_data >= def.required_data;
        if drained && collected && self.runtime.status == ExperimentStatus::Transmitting {
            self.set_status(ExperimentStatus::TransmitComplete, ctx.vessel_id, events);
        }
    }
}
