// src/model/project.rs

use std::collections::BTreeMap;

use crate::model::sample::Sample;

/// `ngi_project_id -> ngi_subproject_id -> [flowcell_id]`.
pub type NgiProjects = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Project aggregate. Owns its ordered sample list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Project {
    pub ilabs_id: String,
    pub main_pi: String,
    pub main_contact: String,
    pub additional_pis: Vec<String>,
    pub additional_contacts: Vec<String>,
    ngi_projects: NgiProjects,
    samples: Vec<Sample>,
}

impl Project {
    pub fn new(
        ilabs_id: impl Into<String>,
        main_pi: impl Into<String>,
        main_contact: impl Into<String>,
    ) -> Self {
        Self {
            ilabs_id: ilabs_id.into(),
            main_pi: main_pi.into(),
            main_contact: main_contact.into(),
            ..Self::default()
        }
    }

    pub fn ngi_projects(&self) -> &NgiProjects {
        &self.ngi_projects
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn add_ngi_project(
        &mut self,
        ngi_project_id: impl Into<String>,
        ngi_subproject_id: impl Into<String>,
        flowcell_id: impl Into<String>,
    ) {
        self.ngi_projects
            .entry(ngi_project_id.into())
            .or_default()
            .entry(ngi_subproject_id.into())
            .or_default()
            .push(flowcell_id.into());
    }

    pub fn add_sample(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn remove_sample(&mut self, sample_id: &str) {
        self.samples.retain(|s| s.sample_id() != sample_id);
    }

    /// Replace the sample with the same id, if present.
    pub fn update_sample(&mut self, sample: Sample) {
        if let Some(slot) = self
            .samples
            .iter_mut()
            .find(|s| s.sample_id() == sample.sample_id())
        {
            *slot = sample;
        }
    }

    /// All flowcells across every NGI project / subproject.
    pub fn flowcells(&self) -> impl Iterator<Item = &str> {
        self.ngi_projects
            .values()
            .flat_map(|subs| subs.values())
            .flatten()
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::technology::Technology;

    fn ss3_sample(id: &str) -> Sample {
        let tech = Technology::Ss3 {
            barcode_set: "A".into(),
        };
        Sample::new(id, id, "human", false, "P1", tech).unwrap()
    }

    #[test]
    fn ngi_projects_group_flowcells() {
        let mut project = Project::new("P1", "pi", "contact");
        project.add_ngi_project("NGI1", "sub1", "FC1");
        project.add_ngi_project("NGI1", "sub1", "FC2");
        project.add_ngi_project("NGI1", "sub2", "FC3");

        assert_eq!(project.ngi_projects()["NGI1"]["sub1"], ["FC1", "FC2"]);
        assert_eq!(project.flowcells().count(), 3);
    }

    #[test]
    fn sample_list_operations() {
        let mut project = Project::new("P1", "pi", "contact");
        project.add_sample(ss3_sample("S1"));
        project.add_sample(ss3_sample("S2"));

        let mut updated = ss3_sample("S2");
        updated.add_flowcell("FC9");
        project.update_sample(updated);
        assert_eq!(project.samples()[1].flowcells(), ["FC9"]);

        project.remove_sample("S1");
        assert_eq!(project.samples().len(), 1);
        assert_eq!(project.samples()[0].sample_id(), "S2");
    }
}
