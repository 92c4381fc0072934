use serde::{Deserialize, Serialize};

use super::EvalContext;
use crate::{ConfigNode, ResourcePool};

/// Relative shortfall a resource draw may have and still count as fully met.
const SHORTFALL_TOLERANCE: f32 = 1e-4;

/// Type-specific predicate parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConditionKind {
    Altitude { min: f32, max: f32 },
    Biome { biome: String },
    Crew { minimum: u32, maximum: u32 },
    GeeForce { min: f32, max: f32 },
    Orbit(OrbitBounds),
    Part { part_name: String },
    Situation { situation: String },
    SurfaceSpeed { min: f32, max: f32 },
    Resource(ResourceDraw),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrbitBounds {
    pub eccentricity_min: f32,
    pub eccentricity_max: f32,
    pub apoapsis_min: f32,
    pub apoapsis_max: f32,
    pub periapsis_min: f32,
    pub periapsis_max: f32,
    pub inclination_min: f32,
    pub inclination_max: f32,
    pub speed_min: f32,
    pub speed_max: f32,
    /// When set, the vessel must be orbiting this body.
    pub body: Option<String>,
}

impl Default for OrbitBounds {
    fn default() -> Self {
        Self {
            eccentricity_min: 0.0,
            eccentricity_max: 1.0,
            apoapsis_min: f32::MIN,
            apoapsis_max: f32::MAX,
            periapsis_min: f32::MIN,
            periapsis_max: f32::MAX,
            inclination_min: 0.0,
            inclination_max: 180.0,
            speed_min: 0.0,
            speed_max: f32::MAX,
            body: None,
        }
    }
}

/// Per-tick resource consumption. The first evaluation draws
/// `initial_consumption`; later ones draw `usage_per_second * dt` unless
/// `initial_only` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDraw {
    pub resource_name: String,
    pub initial_consumption: f32,
    pub usage_per_second: f32,
    pub initial_only: bool,
    pub valid_if_empty: bool,
    /// True until the initial draw has happened. Persisted.
    pub initial_update: bool,
}

impl Default for ResourceDraw {
    fn default() -> Self {
        Self {
            resource_name: "ElectricCharge".to_string(),
            initial_consumption: 1.0,
            usage_per_second: 1.0,
            initial_only: false,
            valid_if_empty: false,
            initial_update: true,
        }
    }
}

impl ResourceDraw {
    fn consume(&mut self, pool: &mut dyn ResourcePool, delta_time: f32) -> bool {
        let requested = if self.initial_update {
            self.initial_update = false;
            self.initial_consumption
        } else if self.initial_only {
            return true;
        } else {
            self.usage_per_second * delta_time.max(0.0)
        };
        if requested <= 0.0 {
            return true;
        }
        let withdrawn = pool.withdraw(&self.resource_name, requested);
        withdrawn >= requested * (1.0 - SHORTFALL_TOLERANCE) || self.valid_if_empty
    }
}

fn within(value: f32, min: f32, max: f32) -> bool {
    value >= min && value <= max
}

/// `None` when both ends sit at the loosest bound.
fn describe_range(min: f32, max: f32, loosest: (f32, f32), unit: &str) -> Option<String> {
    let open_min = min <= loosest.0;
    let open_max = max >= loosest.1;
    match (open_min, open_max) {
        (true, true) => None,
        (true, false) => Some(format!("<= {max}{unit}")),
        (false, true) => Some(format!(">= {min}{unit}")),
        (false, false) => Some(format!("{min}-{max}{unit}")),
    }
}

fn bounded(name: &str, range: Option<String>) -> String {
    match range {
        Some(range) => format!("{name} {range}"),
        None => name.to_string(),
    }
}

impl ConditionKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ConditionKind::Altitude { .. } => "Altitude",
            ConditionKind::Biome { .. } => "Biome",
            ConditionKind::Crew { .. } => "Crew",
            ConditionKind::GeeForce { .. } => "GeeForce",
            ConditionKind::Orbit(_) => "Orbit",
            ConditionKind::Part { .. } => "Part",
            ConditionKind::Situation { .. } => "Situation",
            ConditionKind::SurfaceSpeed { .. } => "SurfaceSpeed",
            ConditionKind::Resource(_) => "Resource",
        }
    }

    /// Short human-readable requirement, e.g. `Altitude 0-70000 m`.
    pub fn describe(&self) -> String {
        let name = self.type_name();
        match self {
            ConditionKind::Altitude { min, max } => {
                bounded(name, describe_range(*min, *max, (0.0, f32::MAX), " m"))
            }
            ConditionKind::GeeForce { min, max } => {
                bounded(name, describe_range(*min, *max, (0.0, f32::MAX), " g"))
            }
            ConditionKind::SurfaceSpeed { min, max } => {
                bounded(name, describe_range(*min, *max, (0.0, f32::MAX), " m/s"))
            }
            ConditionKind::Crew { minimum, maximum } => format!("{name} {minimum}-{maximum}"),
            ConditionKind::Biome { biome } => format!("{name}: {biome}"),
            ConditionKind::Part { part_name } => format!("{name}: {part_name}"),
            ConditionKind::Situation { situation } => format!("{name}: {situation}"),
            ConditionKind::Orbit(bounds) => {
                let mut parts = Vec::new();
                if let Some(body) = &bounds.body {
                    parts.push(format!("around {body}"));
                }
                let ranges = [
                    ("ecc", bounds.eccentricity_min, bounds.eccentricity_max, (0.0, 1.0), ""),
                    ("ap", bounds.apoapsis_min, bounds.apoapsis_max, (f32::MIN, f32::MAX), " m"),
                    ("pe", bounds.periapsis_min, bounds.periapsis_max, (f32::MIN, f32::MAX), " m"),
                    ("inc", bounds.inclination_min, bounds.inclination_max, (0.0, 180.0), " deg"),
                    ("speed", bounds.speed_min, bounds.speed_max, (0.0, f32::MAX), " m/s"),
                ];
                for (label, min, max, loosest, unit) in ranges {
                    if let Some(range) = describe_range(min, max, loosest, unit) {
                        parts.push(format!("{label} {range}"));
                    }
                }
                if parts.is_empty() {
                    name.to_string()
                } else {
                    format!("{name} {}", parts.join(", "))
                }
            }
            ConditionKind::Resource(draw) => {
                let rate = if draw.initial_only {
                    format!("{} once", draw.initial_consumption)
                } else {
                    format!("{}/s", draw.usage_per_second)
                };
                format!("{name} {} {rate}", draw.resource_name)
            }
        }
    }

    /// Raw predicate, before restriction semantics.
    pub(crate) fn holds(&mut self, ctx: &mut EvalContext<'_>, delta_time: f32) -> bool {
        let env = ctx.env;
        match self {
            ConditionKind::Altitude { min, max } => within(env.altitude, *min, *max),
            ConditionKind::Biome { biome } => env.biome.eq_ignore_ascii_case(biome.trim()),
            ConditionKind::Crew { minimum, maximum } => {
                env.crew_count >= *minimum && env.crew_count <= *maximum
            }
            ConditionKind::GeeForce { min, max } => within(env.g_force, *min, *max),
            ConditionKind::Orbit(bounds) => {
                let orbit = &env.orbit;
                within(orbit.eccentricity, bounds.eccentricity_min, bounds.eccentricity_max)
                    && within(orbit.apoapsis, bounds.apoapsis_min, bounds.apoapsis_max)
                    && within(orbit.periapsis, bounds.periapsis_min, bounds.periapsis_max)
                    && within(orbit.inclination, bounds.inclination_min, bounds.inclination_max)
                    && within(orbit.speed, bounds.speed_min, bounds.speed_max)
                    && bounds
                        .body
                        .as_deref()
                        .map_or(true, |body| env.body.eq_ignore_ascii_case(body))
            }
            ConditionKind::Part { part_name } => env
                .part_names
                .iter()
                .any(|part| part.eq_ignore_ascii_case(part_name.trim())),
            ConditionKind::Situation { situation } => {
                env.situation.label().eq_ignore_ascii_case(situation.trim())
            }
            ConditionKind::SurfaceSpeed { min, max } => within(env.surface_speed, *min, *max),
            ConditionKind::Resource(draw) => draw.consume(ctx.resources, delta_time),
        }
    }

    pub(crate) fn save_params(&self, node: &mut ConfigNode) {
        match self {
            ConditionKind::Altitude { min, max } => {
                node.add_value("altitudeMin", min);
                node.add_value("altitudeMax", max);
            }
            ConditionKind::Biome { biome } => node.add_value("biome", biome),
            ConditionKind::Crew { minimum, maximum } => {
                node.add_value("minimumCrew", minimum);
                node.add_value("maximumCrew", maximum);
            }
            ConditionKind::GeeForce { min, max } => {
                node.add_value("gMin", min);
                node.add_value("gMax", max);
            }
            ConditionKind::Orbit(bounds) => {
                node.add_value("eccentricityMin", bounds.eccentricity_min);
                node.add_value("eccentricityMax", bounds.eccentricity_max);
                node.add_value("apoapsisMin", bounds.apoapsis_min);
                node.add_value("apoapsisMax", bounds.apoapsis_max);
                node.add_value("periapsisMin", bounds.periapsis_min);
                node.add_value("periapsisMax", bounds.periapsis_max);
                node.add_value("inclinationMin", bounds.inclination_min);
                node.add_value("inclinationMax", bounds.inclination_max);
                node.add_value("speedMin", bounds.speed_min);
                node.add_value("speedMax", bounds.speed_max);
                if let Some(body) = &bounds.body {
                    node.add_value("body", body);
                }
            }
            ConditionKind::Part { part_name } => node.add_value("requiredPartName", part_name),
            ConditionKind::Situation { situation } => node.add_value("situation", situation),
            ConditionKind::SurfaceSpeed { min, max } => {
                node.add_value("velocityMin", min);
                node.add_value("velocityMax", max);
            }
            ConditionKind::Resource(draw) => {
                node.add_value("resourceName", &draw.resource_name);
                node.add_value("initialConsumption", draw.initial_consumption);
                node.add_value("usagePerSecond", draw.usage_per_second);
                node.add_value("initialOnly", draw.initial_only);
                node.add_value("validIfEmpty", draw.valid_if_empty);
                node.add_value("initialUpdate", draw.initial_update);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Constructors for the built-in registry
// ---------------------------------------------------------------------------

pub(super) fn altitude(node: &ConfigNode) -> ConditionKind {
    ConditionKind::Altitude {
        min: node.parse_or("altitudeMin", 0.0),
        max: node.parse_or("altitudeMax", f32::MAX),
    }
}

pub(super) fn biome(node: &ConfigNode) -> ConditionKind {
    ConditionKind::Biome {
        biome: node.string_or("biome", ""),
    }
}

pub(super) fn crew(node: &ConfigNode) -> ConditionKind {
    ConditionKind::Crew {
        minimum: node.parse_or("minimumCrew", 1),
        maximum: node.parse_or("maximumCrew", 20),
    }
}

pub(super) fn gee_force(node: &ConfigNode) -> ConditionKind {
    ConditionKind::GeeForce {
        min: node.parse_or("gMin", 0.0),
        max: node.parse_or("gMax", f32::MAX),
    }
}

pub(super) fn orbit(node: &ConfigNode) -> ConditionKind {
    let d = OrbitBounds::default();
    ConditionKind::Orbit(OrbitBounds {
        eccentricity_min: node.parse_or("eccentricityMin", d.eccentricity_min),
        eccentricity_max: node.parse_or("eccentricityMax", d.eccentricity_max),
        apoapsis_min: node.parse_or("apoapsisMin", d.apoapsis_min),
        apoapsis_max: node.parse_or("apoapsisMax", d.apoapsis_max),
        periapsis_min: node.parse_or("periapsisMin", d.periapsis_min),
        periapsis_max: node.parse_or("periapsisMax", d.periapsis_max),
        inclination_min: node.parse_or("inclinationMin", d.inclination_min),
        inclination_max: node.parse_or("inclinationMax", d.inclination_max),
        speed_min: node.parse_or("speedMin", d.speed_min),
        speed_max: node.parse_or("speedMax", d.speed_max),
        body: node.get_value("body").map(str::to_string),
    })
}

pub(super) fn part(node: &ConfigNode) -> ConditionKind {
    ConditionKind::Part {
        part_name: node.string_or("requiredPartName", ""),
    }
}

pub(super) fn situation(node: &ConfigNode) -> ConditionKind {
    ConditionKind::Situation {
        situation: node.string_or("situation", ""),
    }
}

pub(super) fn surface_speed(node: &ConfigNode) -> ConditionKind {
    ConditionKind::SurfaceSpeed {
        min: node.parse_or("velocityMin", 0.0),
        max: node.parse_or("velocityMax", f32::MAX),
    }
}

pub(super) fn resource(node: &ConfigNode) -> ConditionKind {
    let d = ResourceDraw::default();
    ConditionKind::Resource(ResourceDraw {
        resource_name: node.string_or("resourceName", &d.resource_name),
        initial_consumption: node.parse_or("initialConsumption", d.initial_consumption),
        usage_per_second: node.parse_or("usagePerSecond", d.usage_per_second),
        initial_only: node.bool_or("initialOnly", d.initial_only),
        valid_if_empty: node.bool_or("validIfEmpty", d.valid_if_empty),
        initial_update: node.bool_or("initialUpdate", d.initial_update),
    })
}
