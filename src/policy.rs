//! Model-wide adjustments applied after every agent has acted.
use log::trace;

use crate::agent::DiseaseState;
use crate::behavior::social_distance;
use crate::define_rng;
use crate::error::SirError;
use crate::model::EpidemicModel;
use crate::parameters::Parameters;

define_rng!(VaccinationRng);

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GlobalDynamicsPolicy {
    /// Run every agent's social-distancing rule once more, whatever its state.
    pub uniform_social_distancing: bool,
}

impl GlobalDynamicsPolicy {
    #[must_use]
    pub fn from_parameters(parameters: &Parameters) -> Self {
        GlobalDynamicsPolicy {
            uniform_social_distancing: parameters.social_limit > 0.0,
        }
    }

    /// Applies uniform social distancing if enabled, then one vaccination if
    /// the model has discovered a vaccine.
    pub fn apply(self, model: &mut EpidemicModel) -> Result<(), SirError> {
        if self.uniform_social_distancing {
            let ids: Vec<_> = model.graph().nodes().collect();
            for id in ids {
                social_distance(model, id)?;
            }
        }
        if model.vaccine_discovered() {
            vaccinate_random(model)?;
        }
        Ok(())
    }
}

/// Picks one agent uniformly; anyone not currently infected is vaccinated.
pub fn vaccinate_random(model: &mut EpidemicModel) -> Result<(), SirError> {
    let id = model
        .random()
        .sample(VaccinationRng, |rng| model.graph().sample_random_node(rng))?;
    if model.state(id) != DiseaseState::Infected {
        trace!("{id} vaccinated");
        model.set_state(id, DiseaseState::Vaccinated);
    }
    Ok(())
}
