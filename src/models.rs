use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: i64,
    pub profile_id: i64,
    pub goal_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadmapTask {
    pub title: String,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadmapActivity {
    pub title: String,
    pub description: String,
    pub tasks: Vec<RoadmapTask>,
}

/// The planning document stored in `roadmaps.json` and returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadmapDocument {
    pub goal: String,
    pub activities: Vec<RoadmapActivity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadmapRecord {
    pub id: i64,
    pub profile_id: i64,
    pub goal_id: Option<i64>,
    pub document: RoadmapDocument,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateProfilePayload {
    #[serde(default)]
    pub name: Option<String>,
}

// `profile_id` stays loosely typed: clients send either a number or a
// numeric string, and falsy values count as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateGoalPayload {
    #[serde(default)]
    pub profile_id: Option<serde_json::Value>,
    #[serde(default)]
    pub goal_text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRoadmapPayload {
    #[serde(default)]
    pub profile_id: Option<serde_json::Value>,
    #[serde(default)]
    pub goal_text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatestRoadmapQuery {
    #[serde(default)]
    pub profile_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedRoadmapResponse {
    pub id: i64,
    pub roadmap: RoadmapDocument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
}
