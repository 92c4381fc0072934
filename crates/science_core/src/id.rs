use rand::Rng;
use uuid::Uuid;

use crate::ExperimentId;

/// Generate a deterministic v4-format UUID from a seeded RNG.
pub fn generate_uuid(rng: &mut impl Rng) -> Uuid {
    let bytes: [u8; 16] = rng.gen();
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

/// Fresh instance id of the form `exp_<uuid>`.
pub fn experiment_id(rng: &mut impl Rng) -> ExperimentId {
    ExperimentId(format!("exp_{}", generate_uuid(rng)))
}
