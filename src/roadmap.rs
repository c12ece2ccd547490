use crate::models::{RoadmapActivity, RoadmapDocument, RoadmapTask};

/// Produces a roadmap document for a goal.
pub trait RoadmapGenerator: Send + Sync {
    fn generate(&self, goal_text: &str) -> RoadmapDocument;
}

/// Placeholder generator returning a fixed plan. Only the goal is taken from
/// the input.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubGenerator;

impl RoadmapGenerator for StubGenerator {
    fn generate(&self, goal_text: &str) -> RoadmapDocument {
        make_stub_roadmap(goal_text)
    }
}

pub fn make_stub_roadmap(goal_text: &str) -> RoadmapDocument {
    RoadmapDocument {
        goal: goal_text.to_string(),
        activities: vec![
            activity(
                "Define Your Project Identity",
                "Clarify sound and audience",
                vec![
                    task("Write 3-sentence artist statement", ["Draft", "Edit", "Save"]),
                    task("Pick 3 reference artists", ["List", "Why each", "Notes"]),
                ],
            ),
            activity(
                "Establish Release Plan",
                "Sketch next 30 days",
                vec![
                    task("Choose single to promote", ["Shortlist", "Pick", "Metadata"]),
                    task("Outline content calendar", ["Frequency", "Formats", "Dates"]),
                ],
            ),
        ],
    }
}

fn activity(title: &str, description: &str, tasks: Vec<RoadmapTask>) -> RoadmapActivity {
    RoadmapActivity {
        title: title.to_string(),
        description: description.to_string(),
        tasks,
    }
}

fn task(title: &str, steps: [&str; 3]) -> RoadmapTask {
    RoadmapTask {
        title: title.to_string(),
        steps: steps.iter().map(ToString::to_string).collect(),
    }
}
