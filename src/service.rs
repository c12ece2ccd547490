use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{
    CreateGoalPayload, CreateProfilePayload, GenerateRoadmapPayload, GeneratedRoadmapResponse, Goal,
    LatestRoadmapQuery, Profile, RoadmapDocument,
};
use crate::roadmap::{RoadmapGenerator, StubGenerator};
use std::sync::Arc;

const PROFILE_AND_GOAL_REQUIRED: &str = "profile_id and goal_text are required";

/// How a client-supplied profile reference resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProfileRef {
    Missing,
    /// Present but cannot name any stored profile.
    Unresolvable,
    Id(i64),
}

impl ProfileRef {
    fn from_json(value: Option<&serde_json::Value>) -> Self {
        match value {
            None | Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false)) => Self::Missing,
            Some(serde_json::Value::Number(number)) => match number.as_i64() {
                Some(0) => Self::Missing,
                Some(id) => Self::Id(id),
                None => match number.as_f64().map(integral_id) {
                    Some(Some(0)) => Self::Missing,
                    Some(Some(id)) => Self::Id(id),
                    _ => Self::Unresolvable,
                },
            },
            Some(serde_json::Value::String(raw)) => Self::from_text(raw),
            Some(_) => Self::Unresolvable,
        }
    }

    fn from_text(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::Missing;
        }
        let raw = raw.trim();
        if let Ok(id) = raw.parse::<i64>() {
            return Self::Id(id);
        }
        // "1.0" names row 1 under SQLite's integer affinity.
        raw.parse::<f64>()
            .ok()
            .and_then(integral_id)
            .map(Self::Id)
            .unwrap_or(Self::Unresolvable)
    }
}

fn integral_id(value: f64) -> Option<i64> {
    let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
    (value.is_finite() && value.fract() == 0.0 && in_range).then_some(value as i64)
}

/// Validates requests and drives the store. Every operation either fails a
/// check before writing anything or completes in full.
#[derive(Clone)]
pub struct PlannerCore {
    db: Arc<Database>,
    generator: Arc<dyn RoadmapGenerator>,
}

impl PlannerCore {
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_generator(db, Arc::new(StubGenerator))
    }

    pub fn with_generator(db: Arc<Database>, generator: Arc<dyn RoadmapGenerator>) -> Self {
        Self { db, generator }
    }

    pub fn create_profile(&self, payload: CreateProfilePayload) -> AppResult<Profile> {
        let name = non_empty(payload.name).ok_or_else(|| AppError::Validation("name is required".to_string()))?;
        let profile = self.db.insert_profile(&name)?;
        tracing::info!(profile_id = profile.id, "profile created");
        Ok(profile)
    }

    pub fn get_profile(&self, raw_id: &str) -> AppResult<Profile> {
        let not_found = || AppError::NotFound("not found".to_string());
        let profile_id = raw_id.trim().parse::<i64>().map_err(|_| not_found())?;
        self.db.get_profile_by_id(profile_id)?.ok_or_else(not_found)
    }

    pub fn create_goal(&self, payload: CreateGoalPayload) -> AppResult<Goal> {
        let (profile_ref, goal_text) = required_profile_and_goal(payload.profile_id, payload.goal_text)?;
        let profile_id = resolve_profile(profile_ref)?;
        let goal = self.db.insert_goal(profile_id, &goal_text)?;
        tracing::info!(goal_id = goal.id, profile_id, "goal created");
        Ok(goal)
    }

    pub fn generate_roadmap(&self, payload: GenerateRoadmapPayload) -> AppResult<GeneratedRoadmapResponse> {
        let (profile_ref, goal_text) = required_profile_and_goal(payload.profile_id, payload.goal_text)?;
        let profile_id = resolve_profile(profile_ref)?;
        let document = self.generator.generate(&goal_text);
        let record = self.db.insert_roadmap(profile_id, &document)?;
        tracing::info!(
            roadmap_id = record.id,
            profile_id,
            goal_id = ?record.goal_id,
            "roadmap generated"
        );

        // The freshly generated document is returned, not the stored copy.
        Ok(GeneratedRoadmapResponse {
            id: record.id,
            roadmap: document,
        })
    }

    pub fn latest_roadmap(&self, query: LatestRoadmapQuery) -> AppResult<RoadmapDocument> {
        let not_found = || AppError::NotFound("no roadmap for profile".to_string());
        let profile_id = match ProfileRef::from_text(query.profile_id.as_deref().unwrap_or_default()) {
            ProfileRef::Missing => return Err(AppError::Validation("profile_id required".to_string())),
            ProfileRef::Unresolvable => return Err(not_found()),
            ProfileRef::Id(id) => id,
        };
        self.db
            .latest_roadmap_for_profile(profile_id)?
            .map(|record| record.document)
            .ok_or_else(not_found)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.is_empty())
}

fn required_profile_and_goal(
    profile_id: Option<serde_json::Value>,
    goal_text: Option<String>,
) -> AppResult<(ProfileRef, String)> {
    let profile_ref = ProfileRef::from_json(profile_id.as_ref());
    match (profile_ref, non_empty(goal_text)) {
        (ProfileRef::Missing, _) | (_, None) => Err(AppError::Validation(PROFILE_AND_GOAL_REQUIRED.to_string())),
        (profile_ref, Some(goal_text)) => Ok((profile_ref, goal_text)),
    }
}

fn resolve_profile(profile_ref: ProfileRef) -> AppResult<i64> {
    match profile_ref {
        ProfileRef::Id(id) => Ok(id),
        ProfileRef::Missing => Err(AppError::Validation(PROFILE_AND_GOAL_REQUIRED.to_string())),
        ProfileRef::Unresolvable => Err(AppError::NotFound("profile not found".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::{PlannerCore, ProfileRef};
    use crate::clock::ManualClock;
    use crate::db::Database;
    use crate::errors::AppError;
    use crate::models::{
        CreateGoalPayload, CreateProfilePayload, GenerateRoadmapPayload, LatestRoadmapQuery, RoadmapDocument,
    };
    use crate::roadmap::RoadmapGenerator;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use std::sync::Arc;

    fn core() -> (PlannerCore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()));
        let db = Arc::new(Database::open_in_memory(clock.clone()).expect("db"));
        (PlannerCore::new(db), clock)
    }

    fn profile_payload(name: &str) -> CreateProfilePayload {
        CreateProfilePayload {
            name: Some(name.to_string()),
        }
    }

    fn roadmap_payload(profile_id: serde_json::Value, goal_text: &str) -> GenerateRoadmapPayload {
        GenerateRoadmapPayload {
            profile_id: Some(profile_id),
            goal_text: Some(goal_text.to_string()),
        }
    }

    #[test]
    fn profile_refs_follow_presence_rules() {
        assert_eq!(ProfileRef::from_json(None), ProfileRef::Missing);
        assert_eq!(ProfileRef::from_json(Some(&json!(null))), ProfileRef::Missing);
        assert_eq!(ProfileRef::from_json(Some(&json!(0))), ProfileRef::Missing);
        assert_eq!(ProfileRef::from_json(Some(&json!(""))), ProfileRef::Missing);
        assert_eq!(ProfileRef::from_json(Some(&json!(false))), ProfileRef::Missing);
        assert_eq!(ProfileRef::from_json(Some(&json!(12))), ProfileRef::Id(12));
        assert_eq!(ProfileRef::from_json(Some(&json!("12"))), ProfileRef::Id(12));
        assert_eq!(ProfileRef::from_json(Some(&json!("abc"))), ProfileRef::Unresolvable);
        assert_eq!(ProfileRef::from_json(Some(&json!(1.5))), ProfileRef::Unresolvable);
        assert_eq!(ProfileRef::from_json(Some(&json!(1.0))), ProfileRef::Id(1));
        assert_eq!(ProfileRef::from_json(Some(&json!(0.0))), ProfileRef::Missing);
        assert_eq!(ProfileRef::from_json(Some(&json!("1.0"))), ProfileRef::Id(1));
        assert_eq!(ProfileRef::from_json(Some(&json!("1.25"))), ProfileRef::Unresolvable);
        assert_eq!(ProfileRef::from_json(Some(&json!(1e300))), ProfileRef::Unresolvable);
        assert_eq!(ProfileRef::from_json(Some(&json!([1]))), ProfileRef::Unresolvable);
    }

    #[test]
    fn profile_ids_are_unique_and_increasing() {
        let (core, _) = core();
        let mut last = 0;
        for name in ["Ava", "Bo", "Cy"] {
            let profile = core.create_profile(profile_payload(name)).expect("create");
            assert_eq!(profile.name, name);
            assert!(profile.id > last);
            last = profile.id;
        }
    }

    #[test]
    fn blank_or_absent_name_is_rejected() {
        let (core, _) = core();
        for payload in [CreateProfilePayload::default(), profile_payload("")] {
            let error = core.create_profile(payload).expect_err("invalid");
            assert!(matches!(error, AppError::Validation(message) if message == "name is required"));
        }
        // nothing was stored, so the first real profile still gets id 1
        assert_eq!(core.create_profile(profile_payload("Ava")).expect("create").id, 1);
    }

    #[test]
    fn unknown_or_malformed_profile_id_is_not_found() {
        let (core, _) = core();
        for raw in ["1", "999", "abc", ""] {
            let error = core.get_profile(raw).expect_err("missing");
            assert!(matches!(error, AppError::NotFound(_)));
        }
        let created = core.create_profile(profile_payload("Ava")).expect("create");
        assert_eq!(core.get_profile(&created.id.to_string()).expect("get"), created);
    }

    #[test]
    fn goal_requires_both_fields() {
        let (core, _) = core();
        let payloads = [
            CreateGoalPayload::default(),
            CreateGoalPayload {
                profile_id: Some(json!(1)),
                goal_text: None,
            },
            CreateGoalPayload {
                profile_id: Some(json!(1)),
                goal_text: Some(String::new()),
            },
            CreateGoalPayload {
                profile_id: None,
                goal_text: Some("Release an EP".to_string()),
            },
        ];
        for payload in payloads {
            let error = core.create_goal(payload).expect_err("invalid");
            assert!(matches!(error, AppError::Validation(_)));
        }
    }

    #[test]
    fn goal_for_unknown_profile_is_not_found() {
        let (core, _) = core();
        for profile_id in [json!(5), json!("nope")] {
            let error = core
                .create_goal(CreateGoalPayload {
                    profile_id: Some(profile_id),
                    goal_text: Some("Release an EP".to_string()),
                })
                .expect_err("missing profile");
            assert!(matches!(error, AppError::NotFound(message) if message == "profile not found"));
        }
    }

    #[test]
    fn goal_accepts_numeric_string_profile_id() {
        let (core, _) = core();
        let profile = core.create_profile(profile_payload("Ava")).expect("profile");
        let goal = core
            .create_goal(CreateGoalPayload {
                profile_id: Some(json!(profile.id.to_string())),
                goal_text: Some("Release an EP".to_string()),
            })
            .expect("goal");
        assert_eq!(goal.profile_id, profile.id);
    }

    #[test]
    fn generated_roadmap_echoes_goal_text() {
        let (core, _) = core();
        let profile = core.create_profile(profile_payload("Ava")).expect("profile");
        let response = core
            .generate_roadmap(roadmap_payload(json!(profile.id), "Play 10 shows"))
            .expect("generate");
        assert_eq!(response.roadmap.goal, "Play 10 shows");
        assert_eq!(response.roadmap.activities.len(), 2);
    }

    #[test]
    fn latest_roadmap_returns_second_generation() {
        let (core, clock) = core();
        let profile = core.create_profile(profile_payload("Ava")).expect("profile");
        core.generate_roadmap(roadmap_payload(json!(profile.id), "first"))
            .expect("first");
        clock.advance(Duration::seconds(1));
        core.generate_roadmap(roadmap_payload(json!(profile.id), "second"))
            .expect("second");

        let latest = core
            .latest_roadmap(LatestRoadmapQuery {
                profile_id: Some(profile.id.to_string()),
            })
            .expect("latest");
        assert_eq!(latest.goal, "second");
    }

    #[test]
    fn latest_roadmap_validates_and_reports_absence() {
        let (core, _) = core();
        for query in [
            LatestRoadmapQuery::default(),
            LatestRoadmapQuery {
                profile_id: Some(String::new()),
            },
        ] {
            let error = core.latest_roadmap(query).expect_err("invalid");
            assert!(matches!(error, AppError::Validation(message) if message == "profile_id required"));
        }

        let profile = core.create_profile(profile_payload("Ava")).expect("profile");
        for raw in [profile.id.to_string(), "zzz".to_string()] {
            let error = core
                .latest_roadmap(LatestRoadmapQuery { profile_id: Some(raw) })
                .expect_err("none");
            assert!(matches!(error, AppError::NotFound(message) if message == "no roadmap for profile"));
        }
    }

    struct EchoGenerator;

    impl RoadmapGenerator for EchoGenerator {
        fn generate(&self, goal_text: &str) -> RoadmapDocument {
            RoadmapDocument {
                goal: goal_text.to_uppercase(),
                activities: Vec::new(),
            }
        }
    }

    #[test]
    fn generator_can_be_swapped() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()));
        let db = Arc::new(Database::open_in_memory(clock).expect("db"));
        let core = PlannerCore::with_generator(db, Arc::new(EchoGenerator));
        let profile = core.create_profile(profile_payload("Ava")).expect("profile");
        let response = core
            .generate_roadmap(roadmap_payload(json!(profile.id), "tour"))
            .expect("generate");
        assert_eq!(response.roadmap.goal, "TOUR");
        assert!(response.roadmap.activities.is_empty());
    }
}
