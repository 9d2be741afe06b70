use std::any::TypeId;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::{create_dir_all, File};
use std::path::Path;

use csv::Writer;
use serde::Serialize;

use crate::agent::DiseaseState;
use crate::error::SirError;
use crate::model::{EpidemicModel, StepReport};

pub const PREVALENCE_REPORT: &str = "prevalence.csv";
pub const TRANSITIONS_REPORT: &str = "transitions.csv";

pub trait Report: 'static {
    // Returns report type
    fn type_id(&self) -> TypeId;
    // Serializes the data with the correct writer
    fn serialize(&self, writer: &mut Writer<File>) -> Result<(), SirError>;
}

/// Use this macro to define a unique report type
#[macro_export]
macro_rules! create_report_trait {
    ($name:ident) => {
        impl $crate::report::Report for $name {
            fn type_id(&self) -> std::any::TypeId {
                std::any::TypeId::of::<$name>()
            }

            fn serialize(
                &self,
                writer: &mut csv::Writer<std::fs::File>,
            ) -> Result<(), $crate::error::SirError> {
                writer.serialize(self)?;
                Ok(())
            }
        }
    };
}

/// Compartment sizes and edge count after a step. Step 0 is the initial state.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct PrevalenceReport {
    pub step: usize,
    pub susceptible: usize,
    pub infected: usize,
    pub recovered: usize,
    pub vaccinated: usize,
    pub edges: usize,
}

create_report_trait!(PrevalenceReport);

/// One row per agent whose state changed during a step.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct TransitionReport {
    pub step: usize,
    pub agent_id: usize,
    pub state: DiseaseState,
}

create_report_trait!(TransitionReport);

// Checks that the path is valid. Creates the file and all parent directories if
// they do not exist. Returns the file if successful. Called by `add_report`
fn generate_validate_filepath(path: &Path) -> Result<File, SirError> {
    match path.extension().and_then(OsStr::to_str) {
        Some("csv") => {
            if let Some(parent) = path.parent() {
                create_dir_all(parent)?;
            }
            let file = File::create(path)?;
            Ok(file)
        }
        _ => Err(SirError::InvalidOperationError(
            "Report output files must be CSVs at this time".to_string(),
        )),
    }
}

/// Holds one CSV writer per report type.
#[derive(Default)]
pub struct ReportWriter {
    file_writers: HashMap<TypeId, Writer<File>>,
}

impl ReportWriter {
    #[must_use]
    pub fn new() -> Self {
        ReportWriter::default()
    }

    /// Opens the prevalence and transitions reports under `directory`.
    pub fn for_directory(directory: &Path) -> Result<Self, SirError> {
        let mut writer = ReportWriter::new();
        writer.add_report::<PrevalenceReport>(&directory.join(PREVALENCE_REPORT))?;
        writer.add_report::<TransitionReport>(&directory.join(TRANSITIONS_REPORT))?;
        Ok(writer)
    }

    /// Registers a report type and the file its rows go to.
    pub fn add_report<T: Report>(&mut self, path: &Path) -> Result<(), SirError> {
        let file = generate_validate_filepath(path)?;
        self.file_writers
            .insert(TypeId::of::<T>(), Writer::from_writer(file));
        Ok(())
    }

    /// Writes a new row to the file associated with the report's type.
    /// Rows for report types that were never added are dropped.
    pub fn send_report<T: Report>(&mut self, report: &T) -> Result<(), SirError> {
        let Some(writer) = self.file_writers.get_mut(&report.type_id()) else {
            return Ok(());
        };
        report.serialize(writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Writes the step-0 prevalence row.
    pub fn record_initial(&mut self, model: &EpidemicModel) -> Result<(), SirError> {
        let counts = model.counts();
        self.send_report(&PrevalenceReport {
            step: model.step_count(),
            susceptible: counts.susceptible,
            infected: counts.infected,
            recovered: counts.recovered,
            vaccinated: counts.vaccinated,
            edges: model.edge_count(),
        })
    }

    /// Writes the rows for one completed step.
    pub fn record_step(&mut self, model: &EpidemicModel, step: &StepReport) -> Result<(), SirError> {
        self.send_report(&PrevalenceReport {
            step: step.step,
            susceptible: step.counts.susceptible,
            infected: step.counts.infected,
            recovered: step.counts.recovered,
            vaccinated: step.counts.vaccinated,
            edges: step.edge_count,
        })?;
        for &id in &step.changed {
            self.send_report(&TransitionReport {
                step: step.step,
                agent_id: id.index(),
                state: model.state(id),
            })?;
        }
        Ok(())
    }
}
