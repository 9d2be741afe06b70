//! Edge-dynamics behaviors layered around the base decision rule.
//!
//! A model carries a [`BehaviorSet`]. Before each agent's base turn the
//! enabled behaviors run in the fixed order of [`Behavior::ALL`]: mask
//! decision, quarantine, social distancing, isolation recovery. The order in
//! which a configuration lists them does not matter.
use log::trace;
use serde::{Deserialize, Serialize};

use crate::agent::{AgentId, DiseaseState, Turn};
use crate::define_rng;
use crate::error::SirError;
use crate::model::EpidemicModel;

define_rng!(MaskRng);
define_rng!(QuarantineRng);
define_rng!(DistancingRng);
define_rng!(RewiringRng);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    MaskWearing,
    Quarantine,
    SocialDistancing,
    IsolationRecovery,
}

impl Behavior {
    pub const ALL: [Behavior; 4] = [
        Behavior::MaskWearing,
        Behavior::Quarantine,
        Behavior::SocialDistancing,
        Behavior::IsolationRecovery,
    ];

    fn bit(self) -> u8 {
        match self {
            Behavior::MaskWearing => 1,
            Behavior::Quarantine => 1 << 1,
            Behavior::SocialDistancing => 1 << 2,
            Behavior::IsolationRecovery => 1 << 3,
        }
    }

    fn apply(self, model: &mut EpidemicModel, id: AgentId, turn: &mut Turn) -> Result<(), SirError> {
        match self {
            Behavior::MaskWearing => {
                if wear_mask(model, id) {
                    turn.infection_probability *= 1.0 - model.parameters().mask_effectiveness;
                }
            }
            Behavior::Quarantine => {
                let quarantine_probability = model.parameters().quarantine_probability;
                if model.state(id) == DiseaseState::Infected
                    && model
                        .random()
                        .sample_bool(QuarantineRng, quarantine_probability)
                {
                    quarantine(model, id)?;
                }
            }
            Behavior::SocialDistancing => {
                if model.state(id) == DiseaseState::Susceptible {
                    social_distance(model, id)?;
                }
            }
            Behavior::IsolationRecovery => isolation_recovery(model, id)?,
        }
        Ok(())
    }
}

/// A set of enabled behaviors. Serialized as a list of behavior names.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Behavior>", into = "Vec<Behavior>")]
pub struct BehaviorSet(u8);

impl BehaviorSet {
    /// The base SIR model: no edge dynamics.
    #[must_use]
    pub const fn empty() -> Self {
        BehaviorSet(0)
    }

    /// Every behavior enabled.
    #[must_use]
    pub fn edge_dynamics() -> Self {
        Behavior::ALL.into_iter().collect()
    }

    #[must_use]
    pub fn with(mut self, behavior: Behavior) -> Self {
        self.0 |= behavior.bit();
        self
    }

    #[must_use]
    pub fn contains(self, behavior: Behavior) -> bool {
        self.0 & behavior.bit() != 0
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Enabled behaviors in application order.
    pub fn iter(self) -> impl Iterator<Item = Behavior> {
        Behavior::ALL.into_iter().filter(move |b| self.contains(*b))
    }

    /// Runs every enabled behavior for `id`, in order.
    pub fn apply(self, model: &mut EpidemicModel, id: AgentId, turn: &mut Turn) -> Result<(), SirError> {
        for behavior in self.iter() {
            behavior.apply(model, id, turn)?;
        }
        Ok(())
    }
}

impl FromIterator<Behavior> for BehaviorSet {
    fn from_iter<I: IntoIterator<Item = Behavior>>(iter: I) -> Self {
        iter.into_iter().fold(BehaviorSet::empty(), BehaviorSet::with)
    }
}

impl From<Vec<Behavior>> for BehaviorSet {
    fn from(behaviors: Vec<Behavior>) -> Self {
        behaviors.into_iter().collect()
    }
}

impl From<BehaviorSet> for Vec<Behavior> {
    fn from(set: BehaviorSet) -> Self {
        set.iter().collect()
    }
}

/// Fraction of `id`'s neighbors that wear a mask; 0.0 with no neighbors.
fn fraction_neighbors_masked(model: &EpidemicModel, id: AgentId) -> f64 {
    let neighbors = model.graph().neighbors(id);
    if neighbors.is_empty() {
        return 0.0;
    }
    let masked = neighbors
        .iter()
        .filter(|&&n| model.agent(n).is_wearing_mask())
        .count();
    #[allow(clippy::cast_precision_loss)]
    let fraction = masked as f64 / neighbors.len() as f64;
    fraction
}

/// Mask decision. An agent puts a mask on out of fear (a uniform draw exceeds
/// the infected fraction) or from social influence (a uniform draw exceeds
/// the masked fraction of its neighbors). Masks are never taken off. Returns
/// whether the agent wears a mask for this turn.
pub fn wear_mask(model: &mut EpidemicModel, id: AgentId) -> bool {
    let fraction_infected = model.fraction_infected();
    let fraction_masked = fraction_neighbors_masked(model, id);

    let fear = model.random().sample_unit(MaskRng) > fraction_infected;
    let influence = model.random().sample_unit(MaskRng) > fraction_masked;
    if (fear || influence) && !model.agent(id).is_wearing_mask() {
        trace!("{id} put on a mask");
        model.put_on_mask(id);
    }
    model.agent(id).is_wearing_mask()
}

/// Removes every edge of `id`, one at a time, until it is isolated.
pub fn quarantine(model: &mut EpidemicModel, id: AgentId) -> Result<(), SirError> {
    trace!("{id} entering quarantine");
    while let Some(&other) = model.graph().neighbors(id).last() {
        let degree = model.graph().degree(id);
        model.remove_edge(id, other)?;
        if model.graph().degree(id) >= degree {
            return Err(SirError::InternalInvariantError(format!(
                "quarantine of {id} did not reduce its degree from {degree}"
            )));
        }
    }
    Ok(())
}

/// With probability equal to the infected fraction of the population, drops
/// one uniformly chosen contact of `id`.
pub fn social_distance(model: &mut EpidemicModel, id: AgentId) -> Result<(), SirError> {
    let fraction_infected = model.fraction_infected();
    if !model.random().sample_bool(DistancingRng, fraction_infected) {
        return Ok(());
    }
    if model.graph().degree(id) == 0 {
        return Ok(());
    }
    let other = model
        .random()
        .sample(DistancingRng, |rng| model.graph().sample_neighbor(rng, id))?;
    trace!("{id} distanced from {other}");
    model.remove_edge(id, other)
}

/// An isolated susceptible or recovered agent reconnects to one uniformly
/// chosen other agent. Populations of one have no one to reconnect to.
pub fn isolation_recovery(model: &mut EpidemicModel, id: AgentId) -> Result<(), SirError> {
    if model.graph().degree(id) > 0 || model.population() < 2 {
        return Ok(());
    }
    if !matches!(
        model.state(id),
        DiseaseState::Susceptible | DiseaseState::Recovered
    ) {
        return Ok(());
    }
    let other = model
        .random()
        .sample(RewiringRng, |rng| model.graph().sample_other_node(rng, id))?;
    trace!("{id} reconnected to {other}");
    model.add_edge(id, other)
}
