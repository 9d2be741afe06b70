//! An agent-based SIR epidemic simulation on a contact network that changes
//! while the disease spreads.
//!
//! Every agent sits on a node of a [`ContactGraph`] and is Susceptible,
//! Infected, Recovered or Vaccinated. Each step the [`EpidemicModel`]
//! activates agents in a random order. An activated agent first runs the
//! enabled [`Behavior`]s, which may rewire the graph or change how likely it
//! is to be infected, then the base rule:
//! * An infected agent may recover.
//! * The agent meets one random neighbor; a susceptible/infected pair may
//!   transmit.
//! * The agent may spontaneously mutate (S to I, R to S).
//!
//! After every agent has acted, the [`GlobalDynamicsPolicy`] applies
//! model-wide rules such as uniform social distancing and vaccination.
//!
//! A run is driven either from code:
//!
//! ```rust
//! use sirnet::{BehaviorSet, EpidemicModel, ParametersBuilder};
//! use sirnet::generators::ring;
//!
//! let parameters = ParametersBuilder::default()
//!     .infection_probability(0.3)
//!     .build()
//!     .unwrap();
//! let mut model =
//!     EpidemicModel::new(ring(50).unwrap(), parameters, BehaviorSet::edge_dynamics(), 7).unwrap();
//! model.run(100, |_, _| Ok(())).unwrap();
//! assert_eq!(model.counts().total(), 50);
//! ```
//!
//! or from the `sirnet` binary, which reads a JSON [`SimulationConfig`] and
//! writes CSV reports (see [`runner`]).
pub mod agent;
pub mod behavior;
pub mod error;
pub mod generators;
pub mod graph;
pub mod log;
pub mod model;
pub mod parameters;
pub mod policy;
pub mod random;
pub mod reference;
pub mod report;
pub mod runner;

pub use agent::{Agent, AgentId, DiseaseState, Turn};
pub use behavior::{Behavior, BehaviorSet};
pub use error::SirError;
pub use graph::ContactGraph;
pub use crate::log::{debug, error, info, trace, warn};
pub use model::{EpidemicModel, StateCounts, StepReport};
pub use parameters::{load_config, Parameters, ParametersBuilder, SimulationConfig};
pub use policy::GlobalDynamicsPolicy;
pub use random::RngRegistry;

// Re-exported for use in `define_rng!`
pub use paste;
pub use rand;
