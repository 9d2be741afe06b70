//! The epidemic model: owns the contact graph and the population and drives
//! discrete time steps.
//!
//! In each step every agent acts exactly once, in an order shuffled afresh
//! for that step. The order is fixed before anyone acts, so edge changes and
//! infections made mid-step never change who acts or when. After the agent
//! pass, the [`GlobalDynamicsPolicy`] runs.
use std::collections::BTreeMap;

use log::{debug, info};
use serde::Serialize;

use crate::agent::{self, Agent, AgentId, DiseaseState, Turn};
use crate::behavior::BehaviorSet;
use crate::define_rng;
use crate::error::SirError;
use crate::graph::ContactGraph;
use crate::parameters::{Parameters, SimulationConfig};
use crate::policy::GlobalDynamicsPolicy;
use crate::random::{sample_multiple_from_known_length, RngRegistry};

define_rng!(ActivationRng);
define_rng!(SeedingRng);
define_rng!(GraphRng);

/// Number of agents in each compartment.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub susceptible: usize,
    pub infected: usize,
    pub recovered: usize,
    pub vaccinated: usize,
}

impl StateCounts {
    #[must_use]
    pub fn get(&self, state: DiseaseState) -> usize {
        match state {
            DiseaseState::Susceptible => self.susceptible,
            DiseaseState::Infected => self.infected,
            DiseaseState::Recovered => self.recovered,
            DiseaseState::Vaccinated => self.vaccinated,
        }
    }

    fn get_mut(&mut self, state: DiseaseState) -> &mut usize {
        match state {
            DiseaseState::Susceptible => &mut self.susceptible,
            DiseaseState::Infected => &mut self.infected,
            DiseaseState::Recovered => &mut self.recovered,
            DiseaseState::Vaccinated => &mut self.vaccinated,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.susceptible + self.infected + self.recovered + self.vaccinated
    }
}

/// What one call to [`EpidemicModel::step`] produced.
#[derive(Clone, Debug, PartialEq)]
pub struct StepReport {
    /// 1-based index of the completed step.
    pub step: usize,
    /// Counts after the step.
    pub counts: StateCounts,
    pub edge_count: usize,
    /// Agents whose state at the end of the step differs from the start,
    /// sorted by id.
    pub changed: Vec<AgentId>,
}

pub struct EpidemicModel {
    parameters: Parameters,
    graph: ContactGraph,
    agents: Vec<Agent>,
    behaviors: BehaviorSet,
    policy: GlobalDynamicsPolicy,
    random: RngRegistry,
    counts: StateCounts,
    step_count: usize,
    vaccine_discovered: bool,
    // State of every agent touched this step, as it was when the step began.
    touched: BTreeMap<AgentId, DiseaseState>,
    history: Vec<StateCounts>,
}

impl EpidemicModel {
    /// Creates a model over `graph` with one susceptible agent per node, then
    /// infects `parameters.initial_infected` distinct agents chosen uniformly.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if a probability lies outside `[0, 1]`,
    /// the graph is empty, or more agents are to be infected than exist.
    pub fn new(
        graph: ContactGraph,
        parameters: Parameters,
        behaviors: BehaviorSet,
        seed: u64,
    ) -> Result<Self, SirError> {
        parameters.validate()?;
        if graph.is_empty() {
            return Err(SirError::ConfigurationError(String::from(
                "The contact graph has no nodes",
            )));
        }
        let population = graph.node_count();
        if parameters.initial_infected > population {
            return Err(SirError::ConfigurationError(format!(
                "initial_infected ({}) exceeds the population ({population})",
                parameters.initial_infected
            )));
        }

        let agents = graph.nodes().map(Agent::new).collect();
        let mut model = EpidemicModel {
            parameters,
            policy: GlobalDynamicsPolicy::from_parameters(&parameters),
            agents,
            behaviors,
            random: RngRegistry::new(seed),
            counts: StateCounts {
                susceptible: population,
                ..StateCounts::default()
            },
            step_count: 0,
            vaccine_discovered: false,
            touched: BTreeMap::new(),
            history: Vec::new(),
            graph,
        };

        let seeded = model
            .random
            .sample(SeedingRng, |rng| {
                sample_multiple_from_known_length(rng, model.graph.nodes(), parameters.initial_infected)
            })
            .ok_or_else(|| {
                SirError::InternalInvariantError(String::from(
                    "could not seed initial infections after the population check",
                ))
            })?;
        for id in seeded {
            model.set_state(id, DiseaseState::Infected);
        }
        model.touched.clear();

        info!(
            "Created model: population={population}, edges={}, initial_infected={}, behaviors={:?}",
            model.graph.edge_count(),
            parameters.initial_infected,
            behaviors.iter().collect::<Vec<_>>()
        );
        Ok(model)
    }

    /// Builds the configured network from the config's seed and creates the model.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, SirError> {
        let graph = RngRegistry::new(config.seed).sample(GraphRng, |rng| config.network.build(rng))?;
        EpidemicModel::new(graph, config.parameters, config.behaviors, config.seed)
    }

    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    #[must_use]
    pub fn graph(&self) -> &ContactGraph {
        &self.graph
    }

    #[must_use]
    pub fn behaviors(&self) -> BehaviorSet {
        self.behaviors
    }

    #[must_use]
    pub fn policy(&self) -> GlobalDynamicsPolicy {
        self.policy
    }

    #[must_use]
    pub fn random(&self) -> &RngRegistry {
        &self.random
    }

    #[must_use]
    pub fn population(&self) -> usize {
        self.agents.len()
    }

    /// # Panics
    ///
    /// Panics if `id` is not part of the population.
    #[must_use]
    pub fn agent(&self, id: AgentId) -> &Agent {
        &self.agents[id.index()]
    }

    pub fn agents(&self) -> impl ExactSizeIterator<Item = &Agent> {
        self.agents.iter()
    }

    #[must_use]
    pub fn state(&self, id: AgentId) -> DiseaseState {
        self.agent(id).state()
    }

    /// Every agent's state, ordered by id.
    #[must_use]
    pub fn states(&self) -> Vec<DiseaseState> {
        self.agents.iter().map(Agent::state).collect()
    }

    #[must_use]
    pub fn counts(&self) -> StateCounts {
        self.counts
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Number of completed steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Counts recorded at the start of every step taken so far.
    #[must_use]
    pub fn history(&self) -> &[StateCounts] {
        &self.history
    }

    #[must_use]
    pub fn is_extinct(&self) -> bool {
        self.counts.infected == 0
    }

    #[must_use]
    pub fn fraction_infected(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let fraction = self.counts.infected as f64 / self.population() as f64;
        fraction
    }

    #[must_use]
    pub fn vaccine_discovered(&self) -> bool {
        self.vaccine_discovered
    }

    /// Makes the vaccine available; the rollout starts with the next policy pass.
    pub fn discover_vaccine(&mut self) {
        if !self.vaccine_discovered {
            info!("Vaccine discovered at step {}", self.step_count);
            self.vaccine_discovered = true;
        }
    }

    pub(crate) fn set_state(&mut self, id: AgentId, state: DiseaseState) {
        let previous = self.agents[id.index()].state();
        if previous == state {
            return;
        }
        self.touched.entry(id).or_insert(previous);
        *self.counts.get_mut(previous) -= 1;
        *self.counts.get_mut(state) += 1;
        self.agents[id.index()].set_state(state);
    }

    pub(crate) fn put_on_mask(&mut self, id: AgentId) {
        self.agents[id.index()].put_on_mask();
    }

    pub(crate) fn add_edge(&mut self, a: AgentId, b: AgentId) -> Result<(), SirError> {
        self.graph.add_edge(a, b)
    }

    pub(crate) fn remove_edge(&mut self, a: AgentId, b: AgentId) -> Result<(), SirError> {
        self.graph.remove_edge(a, b)
    }

    /// One agent's turn: behaviors first, then the base rule with whatever
    /// infection probability the behaviors left on the turn.
    fn activate(&mut self, id: AgentId) -> Result<(), SirError> {
        let mut turn = Turn::new(self.parameters.infection_probability);
        let behaviors = self.behaviors;
        behaviors.apply(self, id, &mut turn)?;
        agent::step(self, id, &turn)
    }

    /// Advances the model by one step.
    ///
    /// # Errors
    ///
    /// Any error aborts the step; an `InternalInvariantError` means the
    /// contact graph is corrupt and the run must stop.
    pub fn step(&mut self) -> Result<StepReport, SirError> {
        self.history.push(self.counts);
        self.touched.clear();

        // Steps are numbered from 1, so step `k` starts after `k - 1` completed steps.
        if let Some(discovery_step) = self.parameters.vaccine_discovery_step {
            if self.step_count + 1 >= discovery_step {
                self.discover_vaccine();
            }
        }

        let mut order: Vec<AgentId> = self.graph.nodes().collect();
        self.random.shuffle(ActivationRng, &mut order);
        for id in order {
            self.activate(id)?;
        }

        let policy = self.policy;
        policy.apply(self)?;

        self.step_count += 1;
        let changed: Vec<AgentId> = self
            .touched
            .iter()
            .filter(|(id, start)| self.agents[id.index()].state() != **start)
            .map(|(id, _)| *id)
            .collect();

        debug!(
            "step {}: S={} I={} R={} V={} edges={} changed={}",
            self.step_count,
            self.counts.susceptible,
            self.counts.infected,
            self.counts.recovered,
            self.counts.vaccinated,
            self.graph.edge_count(),
            changed.len()
        );

        Ok(StepReport {
            step: self.step_count,
            counts: self.counts,
            edge_count: self.graph.edge_count(),
            changed,
        })
    }

    /// Steps until no one is infected or `max_steps` steps have completed,
    /// handing every report to `on_step`. Returns the number of steps taken.
    ///
    /// Extinction is checked before each step, so a model that starts with no
    /// infections takes no steps even when mutation could reintroduce one.
    /// Call [`EpidemicModel::step`] directly to drive such a model.
    pub fn run<F>(&mut self, max_steps: usize, mut on_step: F) -> Result<usize, SirError>
    where
        F: FnMut(&EpidemicModel, &StepReport) -> Result<(), SirError>,
    {
        let mut taken = 0;
        while !self.is_extinct() && taken < max_steps {
            let report = self.step()?;
            on_step(self, &report)?;
            taken += 1;
        }
        info!(
            "Run finished after {taken} steps: S={} I={} R={} V={}",
            self.counts.susceptible,
            self.counts.infected,
            self.counts.recovered,
            self.counts.vaccinated
        );
        Ok(taken)
    }
}

#[cfg(test)]
mod test {
    use super::{EpidemicModel, StateCounts};
    use crate::agent::{AgentId, DiseaseState};
    use crate::behavior::BehaviorSet;
    use crate::error::SirError;
    use crate::generators::{complete, random_tree, ring};
    use crate::graph::ContactGraph;
    use crate::parameters::{ParametersBuilder, SimulationConfig};
    use crate::generators::NetworkConfig;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn tree(nodes: usize, seed: u64) -> ContactGraph {
        random_tree(nodes, &mut SmallRng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn empty_graph_is_rejected() {
        let result = EpidemicModel::new(
            ContactGraph::new(0),
            ParametersBuilder::default().initial_infected(0).build().unwrap(),
            BehaviorSet::empty(),
            0,
        );
        assert!(matches!(result, Err(SirError::ConfigurationError(_))));
    }

    #[test]
    fn too_many_initial_infected_is_rejected() {
        let result = EpidemicModel::new(
            ContactGraph::new(3),
            ParametersBuilder::default().initial_infected(4).build().unwrap(),
            BehaviorSet::empty(),
            0,
        );
        assert!(matches!(result, Err(SirError::ConfigurationError(_))));
    }

    #[test]
    fn bad_probability_is_rejected() {
        let result = EpidemicModel::new(
            ContactGraph::new(3),
            ParametersBuilder::default().mask_effectiveness(1.2).build().unwrap(),
            BehaviorSet::empty(),
            0,
        );
        assert!(matches!(result, Err(SirError::ConfigurationError(_))));
    }

    #[test]
    fn seeds_exactly_initial_infected() {
        let parameters = ParametersBuilder::default().initial_infected(10).build().unwrap();
        let model = EpidemicModel::new(tree(100, 1), parameters, BehaviorSet::empty(), 3).unwrap();
        assert_eq!(
            model.counts(),
            StateCounts {
                susceptible: 90,
                infected: 10,
                recovered: 0,
                vaccinated: 0
            }
        );
        assert_eq!(
            model.states().iter().filter(|&&s| s == DiseaseState::Infected).count(),
            10
        );
    }

    #[test]
    fn two_agents_deterministic_transmission() {
        let graph = ContactGraph::from_edges(2, &[(0, 1)]).unwrap();
        let parameters = ParametersBuilder::default()
            .initial_infected(1)
            .infection_probability(1.0)
            .recovery_probability(0.0)
            .mutation_probability(0.0)
            .build()
            .unwrap();
        let mut model = EpidemicModel::new(graph, parameters, BehaviorSet::empty(), 11).unwrap();
        let report = model.step().unwrap();
        assert_eq!(model.states(), vec![DiseaseState::Infected; 2]);
        assert_eq!(report.counts.infected, 2);
        assert_eq!(report.changed.len(), 1);
        assert_eq!(report.step, 1);
    }

    #[test]
    fn population_is_conserved() {
        let parameters = ParametersBuilder::default()
            .initial_infected(5)
            .infection_probability(0.6)
            .recovery_probability(0.2)
            .mutation_probability(0.05)
            .social_limit(0.5)
            .vaccine_discovery_step(3)
            .build()
            .unwrap();
        let mut model =
            EpidemicModel::new(tree(60, 2), parameters, BehaviorSet::edge_dynamics(), 8).unwrap();
        for _ in 0..40 {
            let report = model.step().unwrap();
            assert_eq!(report.counts.total(), 60);
            let recount = model.states();
            for state in DiseaseState::ALL {
                assert_eq!(
                    recount.iter().filter(|&&s| s == state).count(),
                    report.counts.get(state)
                );
            }
        }
    }

    #[test]
    fn saturation_is_monotone_without_recovery() {
        let parameters = ParametersBuilder::default()
            .initial_infected(1)
            .infection_probability(1.0)
            .recovery_probability(0.0)
            .mutation_probability(0.0)
            .build()
            .unwrap();
        let mut model = EpidemicModel::new(ring(30).unwrap(), parameters, BehaviorSet::empty(), 4).unwrap();
        let mut infected = model.counts().infected;
        for _ in 0..200 {
            let report = model.step().unwrap();
            assert!(report.counts.infected >= infected);
            infected = report.counts.infected;
        }
        assert_eq!(infected, 30);
    }

    #[test]
    fn disconnected_population_never_spreads() {
        let parameters = ParametersBuilder::default()
            .initial_infected(2)
            .infection_probability(1.0)
            .recovery_probability(0.1)
            .mutation_probability(0.0)
            .build()
            .unwrap();
        let mut model =
            EpidemicModel::new(ContactGraph::new(10), parameters, BehaviorSet::empty(), 6).unwrap();
        for _ in 0..50 {
            let report = model.step().unwrap();
            assert!(report.counts.infected <= 2);
            assert_eq!(report.edge_count, 0);
        }
    }

    #[test]
    fn recovered_stay_recovered_without_mutation() {
        let parameters = ParametersBuilder::default()
            .initial_infected(3)
            .infection_probability(0.8)
            .recovery_probability(0.3)
            .mutation_probability(0.0)
            .build()
            .unwrap();
        let mut model = EpidemicModel::new(complete(20).unwrap(), parameters, BehaviorSet::edge_dynamics(), 9)
            .unwrap();
        let mut recovered: Vec<AgentId> = Vec::new();
        for _ in 0..60 {
            model.step().unwrap();
            for id in &recovered {
                assert_eq!(model.state(*id), DiseaseState::Recovered);
            }
            recovered = model
                .agents()
                .filter(|a| a.state() == DiseaseState::Recovered)
                .map(|a| a.id())
                .collect();
        }
    }

    #[test]
    fn infection_probability_restored_after_masked_turns() {
        let parameters = ParametersBuilder::default()
            .initial_infected(2)
            .infection_probability(0.7)
            .build()
            .unwrap();
        let mut model =
            EpidemicModel::new(tree(30, 5), parameters, BehaviorSet::edge_dynamics(), 12).unwrap();
        for _ in 0..5 {
            model.step().unwrap();
        }
        assert!(model.agents().any(|a| a.is_wearing_mask()));
        assert!((model.parameters().infection_probability - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn history_records_pre_step_counts() {
        let parameters = ParametersBuilder::default().initial_infected(3).build().unwrap();
        let mut model = EpidemicModel::new(tree(20, 1), parameters, BehaviorSet::empty(), 1).unwrap();
        let initial = model.counts();
        let first = model.step().unwrap();
        model.step().unwrap();
        assert_eq!(model.history(), &[initial, first.counts]);
        assert_eq!(model.step_count(), 2);
    }

    #[test]
    fn changed_lists_only_net_changes() {
        let parameters = ParametersBuilder::default()
            .initial_infected(4)
            .infection_probability(0.5)
            .recovery_probability(0.3)
            .mutation_probability(0.2)
            .build()
            .unwrap();
        let mut model = EpidemicModel::new(tree(40, 3), parameters, BehaviorSet::empty(), 2).unwrap();
        for _ in 0..20 {
            let before = model.states();
            let report = model.step().unwrap();
            let after = model.states();
            let expected: Vec<AgentId> = (0..40)
                .filter(|&i| before[i] != after[i])
                .map(AgentId::new)
                .collect();
            assert_eq!(report.changed, expected);
        }
    }

    #[test]
    fn same_seed_same_run() {
        let config = SimulationConfig {
            seed: 77,
            network: NetworkConfig::RandomTree { nodes: 50 },
            parameters: ParametersBuilder::default()
                .initial_infected(5)
                .infection_probability(0.5)
                .recovery_probability(0.1)
                .build()
                .unwrap(),
            behaviors: BehaviorSet::edge_dynamics(),
            ..SimulationConfig::default()
        };
        let mut a = EpidemicModel::from_config(&config).unwrap();
        let mut b = EpidemicModel::from_config(&config).unwrap();
        for _ in 0..15 {
            assert_eq!(a.step().unwrap(), b.step().unwrap());
            assert_eq!(a.graph(), b.graph());
        }
    }

    #[test]
    fn run_stops_at_extinction() {
        let parameters = ParametersBuilder::default()
            .initial_infected(1)
            .recovery_probability(1.0)
            .build()
            .unwrap();
        let mut model = EpidemicModel::new(tree(10, 1), parameters, BehaviorSet::empty(), 1).unwrap();
        let mut seen = 0;
        let taken = model
            .run(100, |_, _| {
                seen += 1;
                Ok(())
            })
            .unwrap();
        assert!(model.is_extinct());
        assert_eq!(taken, seen);
        assert!(taken < 100);
    }

    #[test]
    fn run_without_infections_takes_no_steps() {
        let parameters = ParametersBuilder::default()
            .initial_infected(0)
            .recovery_probability(0.0)
            .mutation_probability(1.0)
            .build()
            .unwrap();
        let mut model = EpidemicModel::new(tree(10, 1), parameters, BehaviorSet::empty(), 1).unwrap();
        let taken = model.run(100, |_, _| Ok(())).unwrap();
        assert_eq!(taken, 0);
        assert_eq!(model.step_count(), 0);

        // Stepping by hand still lets mutation reintroduce the disease.
        model.step().unwrap();
        assert_eq!(model.counts().infected, 10);
    }

    #[test]
    fn vaccine_discovered_at_start_of_configured_step() {
        let parameters = ParametersBuilder::default()
            .initial_infected(1)
            .infection_probability(0.0)
            .recovery_probability(0.0)
            .vaccine_discovery_step(1)
            .build()
            .unwrap();
        let mut model =
            EpidemicModel::new(complete(5).unwrap(), parameters, BehaviorSet::empty(), 3).unwrap();
        assert!(!model.vaccine_discovered());
        let report = model.step().unwrap();
        assert_eq!(report.step, 1);
        assert!(model.vaccine_discovered());

        let parameters = ParametersBuilder::default()
            .vaccine_discovery_step(3)
            .build()
            .unwrap();
        let mut model =
            EpidemicModel::new(complete(5).unwrap(), parameters, BehaviorSet::empty(), 3).unwrap();
        model.step().unwrap();
        model.step().unwrap();
        assert!(!model.vaccine_discovered());
        let report = model.step().unwrap();
        assert_eq!(report.step, 3);
        assert!(model.vaccine_discovered());
    }
}
