// src/model/sample.rs

use thiserror::Error;

use crate::model::technology::Technology;

/// Identifier of a project a sample belongs to.
pub type ProjectRef = String;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SampleError {
    #[error("sample '{0}': Multiome samples must have is_nuclei set to true")]
    MultiomeRequiresNuclei(String),
}

/// A sample references its current project by id; the project owns the
/// sample list, not the other way round.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    sample_id: String,
    original_name: String,
    species: String,
    is_nuclei: bool,
    project: ProjectRef,
    past_projects: Vec<ProjectRef>,
    technology: Technology,
    flowcells: Vec<String>,
}

impl Sample {
    /// Construct a sample, rejecting Multiome samples that are not nuclei.
    pub fn new(
        sample_id: impl Into<String>,
        original_name: impl Into<String>,
        species: impl Into<String>,
        is_nuclei: bool,
        project: impl Into<ProjectRef>,
        technology: Technology,
    ) -> Result<Self, SampleError> {
        let sample_id = sample_id.into();
        if technology.is_multiome() && !is_nuclei {
            return Err(SampleError::MultiomeRequiresNuclei(sample_id));
        }

        Ok(Self {
            sample_id,
            original_name: original_name.into(),
            species: species.into(),
            is_nuclei,
            project: project.into(),
            past_projects: Vec::new(),
            technology,
            flowcells: Vec::new(),
        })
    }

    pub fn sample_id(&self) -> &str {
        &self.sample_id
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn species(&self) -> &str {
        &self.species
    }

    pub fn is_nuclei(&self) -> bool {
        self.is_nuclei
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn past_projects(&self) -> &[ProjectRef] {
        &self.past_projects
    }

    pub fn technology(&self) -> &Technology {
        &self.technology
    }

    pub fn flowcells(&self) -> &[String] {
        &self.flowcells
    }

    pub fn add_flowcell(&mut self, flowcell: impl Into<String>) {
        self.flowcells.push(flowcell.into());
    }

    /// Move the sample to a new project, keeping the old one in history.
    pub fn move_to_project(&mut self, new_project: impl Into<ProjectRef>) {
        let previous = std::mem::replace(&mut self.project, new_project.into());
        self.past_projects.push(previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn multiome() -> Technology {
        Technology::Multiome {
            metadata: Map::new(),
        }
    }

    #[test]
    fn multiome_without_nuclei_fails_construction() {
        let err = Sample::new("S1", "orig", "human", false, "P1", multiome()).unwrap_err();
        assert_eq!(err, SampleError::MultiomeRequiresNuclei("S1".to_string()));
    }

    #[test]
    fn multiome_with_nuclei_succeeds() {
        let sample = Sample::new("S1", "orig", "human", true, "P1", multiome()).unwrap();
        assert!(sample.is_nuclei());
        assert_eq!(sample.technology().name(), "Multiome");
    }

    #[test]
    fn other_technologies_do_not_require_nuclei() {
        let tech = Technology::Ss3 {
            barcode_set: "set-a".into(),
        };
        assert!(Sample::new("S2", "orig", "mouse", false, "P1", tech).is_ok());
    }

    #[test]
    fn moving_project_records_history() {
        let tech = Technology::GeneExpression {
            metadata: Map::new(),
        };
        let mut sample = Sample::new("S3", "orig", "human", false, "P1", tech).unwrap();
        sample.move_to_project("P2");
        sample.move_to_project("P3");

        assert_eq!(sample.project(), "P3");
        assert_eq!(sample.past_projects(), ["P1".to_string(), "P2".to_string()]);
    }
}
