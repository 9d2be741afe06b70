use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Command, FromArgMatches as _};

use crate::error::SirError;
use crate::log::{set_log_level, set_module_filters, LevelFilter};
use crate::model::{EpidemicModel, StateCounts};
use crate::parameters::{load_config, SimulationConfig};
use crate::report::ReportWriter;

/// Command line arguments for the `sirnet` binary
#[derive(Args, Debug, Default)]
pub struct BaseArgs {
    /// Random seed. Overrides the seed in the config file
    #[arg(short, long)]
    pub random_seed: Option<u64>,

    /// Optional path for a JSON simulation config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Optional directory for CSV report output
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Enable logging at a level (e.g. `info`) or per module (e.g. `sirnet::model=debug,warn`)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Maximum number of steps. Overrides the step limit in the config file
    #[arg(short, long)]
    pub max_steps: Option<usize>,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub steps: usize,
    pub counts: StateCounts,
}

impl RunSummary {
    /// The line printed to stdout when the binary finishes.
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "step={} S={} I={} R={} V={}",
            self.steps,
            self.counts.susceptible,
            self.counts.infected,
            self.counts.recovered,
            self.counts.vaccinated
        )
    }
}

fn create_sirnet_cli() -> Command {
    let cli = Command::new("sirnet");
    BaseArgs::augment_args(cli)
}

/// Parses the process arguments and runs one simulation.
///
/// # Errors
/// Returns an error if argument parsing, config loading, the run, or report
/// writing fails
pub fn run_with_args() -> Result<RunSummary, Box<dyn std::error::Error>> {
    let matches = create_sirnet_cli().get_matches();
    let args = BaseArgs::from_arg_matches(&matches)?;
    Ok(run_with_args_internal(args)?)
}

/// Parses `level` or `module=level,...` entries. An entry without `=` sets the global level.
fn parse_log_levels(levels: &str) -> Result<(Option<LevelFilter>, Vec<(String, LevelFilter)>), SirError> {
    let mut global = None;
    let mut modules = Vec::new();
    for entry in levels.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let parse = |level: &str| {
            LevelFilter::from_str(level.trim()).map_err(|_| {
                SirError::ConfigurationError(format!("invalid log level: {level}"))
            })
        };
        match entry.split_once('=') {
            Some((module, level)) => modules.push((module.trim().to_string(), parse(level)?)),
            None => global = Some(parse(entry)?),
        }
    }
    Ok((global, modules))
}

fn configure_logging(levels: &str) -> Result<(), SirError> {
    let (global, modules) = parse_log_levels(levels)?;
    // Module loggers are checked before the root, so they work with the root left off.
    if let Some(level) = global {
        println!("Logging enabled at level {level}");
        set_log_level(level);
    }
    for (module, level) in &modules {
        println!("Logging enabled for {module} at level {level}");
    }
    let filters: Vec<(&str, LevelFilter)> = modules
        .iter()
        .map(|(module, level)| (module.as_str(), *level))
        .collect();
    set_module_filters(&filters);
    Ok(())
}

fn resolve_config(args: &BaseArgs) -> Result<SimulationConfig, SirError> {
    let mut config = match &args.config {
        Some(path) => {
            println!("Loading simulation config from: {}", path.display());
            load_config(path)?
        }
        None => SimulationConfig::default(),
    };
    if let Some(seed) = args.random_seed {
        config.seed = seed;
    }
    if let Some(max_steps) = args.max_steps {
        config.max_steps = max_steps;
    }
    Ok(config)
}

pub(crate) fn run_with_args_internal(args: BaseArgs) -> Result<RunSummary, SirError> {
    if let Some(levels) = &args.log_level {
        configure_logging(levels)?;
    }

    let config = resolve_config(&args)?;
    let mut model = EpidemicModel::from_config(&config)?;

    let mut reports = match &args.output_dir {
        Some(dir) => {
            let mut writer = ReportWriter::for_directory(dir)?;
            writer.record_initial(&model)?;
            Some(writer)
        }
        None => None,
    };

    model.run(config.max_steps, |model, step| match reports.as_mut() {
        Some(writer) => writer.record_step(model, step),
        None => Ok(()),
    })?;

    let summary = RunSummary {
        steps: model.step_count(),
        counts: model.counts(),
    };
    println!("{}", summary.summary_line());
    Ok(summary)
}
