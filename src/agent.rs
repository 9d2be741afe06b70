//! Agents and the base per-turn decision rule.
//!
//! A turn is: one recovery check, then (if the agent has any contacts) an
//! interaction with one uniformly sampled neighbor, then the mutation step.
//! That order is part of the model's behavior and must not be rearranged.
use std::fmt::{self, Display};

use log::trace;
use serde::{Deserialize, Serialize};

use crate::define_rng;
use crate::error::SirError;
use crate::model::EpidemicModel;

define_rng!(RecoveryRng);
define_rng!(ContactRng);
define_rng!(TransmissionRng);
define_rng!(MutationRng);

/// Stable identifier of an agent, equal to its node index in the contact graph.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(usize);

impl AgentId {
    #[must_use]
    pub const fn new(index: usize) -> Self {
        AgentId(index)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "agent {}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiseaseState {
    #[serde(rename = "S")]
    Susceptible,
    #[serde(rename = "I")]
    Infected,
    #[serde(rename = "R")]
    Recovered,
    /// Absorbing: no rule moves an agent out of this state.
    #[serde(rename = "V")]
    Vaccinated,
}

impl DiseaseState {
    pub const ALL: [DiseaseState; 4] = [
        DiseaseState::Susceptible,
        DiseaseState::Infected,
        DiseaseState::Recovered,
        DiseaseState::Vaccinated,
    ];

    /// Single-letter compartment label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            DiseaseState::Susceptible => "S",
            DiseaseState::Infected => "I",
            DiseaseState::Recovered => "R",
            DiseaseState::Vaccinated => "V",
        }
    }
}

impl Display for DiseaseState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Agent {
    id: AgentId,
    state: DiseaseState,
    wearing_mask: bool,
}

impl Agent {
    #[must_use]
    pub fn new(id: AgentId) -> Self {
        Agent {
            id,
            state: DiseaseState::Susceptible,
            wearing_mask: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> AgentId {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> DiseaseState {
        self.state
    }

    #[must_use]
    pub fn is_wearing_mask(&self) -> bool {
        self.wearing_mask
    }

    pub(crate) fn set_state(&mut self, state: DiseaseState) {
        self.state = state;
    }

    pub(crate) fn put_on_mask(&mut self) {
        self.wearing_mask = true;
    }
}

/// Per-turn values handed to the decision rule. Behaviors adjust the turn's
/// copy of the infection probability; the model's parameters never change.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Turn {
    pub infection_probability: f64,
}

impl Turn {
    #[must_use]
    pub fn new(infection_probability: f64) -> Self {
        Turn {
            infection_probability,
        }
    }
}

/// Runs the base decision rule for `id`.
pub fn step(model: &mut EpidemicModel, id: AgentId, turn: &Turn) -> Result<(), SirError> {
    let recovery_probability = model.parameters().recovery_probability;
    if model.state(id) == DiseaseState::Infected
        && model.random().sample_bool(RecoveryRng, recovery_probability)
    {
        trace!("{id} recovered");
        model.set_state(id, DiseaseState::Recovered);
    }

    if model.graph().degree(id) > 0 {
        let other = model
            .random()
            .sample(ContactRng, |rng| model.graph().sample_neighbor(rng, id))?;
        interact(model, id, other, turn);
    }

    mutate(model, id);
    Ok(())
}

/// Transmission between `id` and its sampled contact `other`. Only S-I pairs
/// interact; the recovery check already happened at the start of the turn.
fn interact(model: &mut EpidemicModel, id: AgentId, other: AgentId, turn: &Turn) {
    match (model.state(id), model.state(other)) {
        (DiseaseState::Infected, DiseaseState::Susceptible) => {
            if model
                .random()
                .sample_bool(TransmissionRng, turn.infection_probability)
            {
                trace!("{id} infected {other}");
                model.set_state(other, DiseaseState::Infected);
            }
        }
        (DiseaseState::Susceptible, DiseaseState::Infected) => {
            if model
                .random()
                .sample_bool(TransmissionRng, turn.infection_probability)
            {
                trace!("{id} was infected by {other}");
                model.set_state(id, DiseaseState::Infected);
            }
        }
        _ => {}
    }
}

/// Spontaneous reintroduction (S -> I) and waning immunity (R -> S).
fn mutate(model: &mut EpidemicModel, id: AgentId) {
    let mutation_probability = model.parameters().mutation_probability;
    if !model.random().sample_bool(MutationRng, mutation_probability) {
        return;
    }
    let next = match model.state(id) {
        DiseaseState::Susceptible => DiseaseState::Infected,
        DiseaseState::Recovered => DiseaseState::Susceptible,
        DiseaseState::Infected | DiseaseState::Vaccinated => return,
    };
    trace!("{id} mutated to {next}");
    model.set_state(id, next);
}
