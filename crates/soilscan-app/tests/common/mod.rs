//! Shared fixtures for app integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use soilscan_store::{KeyValueStore, MemoryStore, keys};
use soilscan_upload::{AnalysisRequest, AnalysisTransport, TransportResponse, UploadError};

/// Full analysis body as returned by the service.
#[allow(dead_code)]
pub const FULL_RESULT: &str = r#"{
    "soil_type": "Loamy",
    "confidence": "92%",
    "health_score": 78,
    "texture": "Medium",
    "ph_min": 5.5,
    "ph_max": 6.8,
    "nitrogen": "Medium",
    "phosphorus": "Low",
    "potassium": "High",
    "organic_matter": "3.2%",
    "moisture": "Moderate",
    "water_retention": "Good",
    "salinity_ec": "0.4 dS/m",
    "cec": "15 meq/100g",
    "planting_season": "Spring",
    "optimal_temp": "18-24 C",
    "drainage_type": "Well drained",
    "compaction_level": "Low",
    "climate_zone": "Temperate",
    "possible_deficiencies": ["Phosphorus", "Zinc"],
    "recommended_fertilizer": "NPK 10-26-26",
    "micro_nutrients": {"Zinc": "Low", "Iron": "Adequate", "Boron": 0.5},
    "recommended_crops": ["Wheat", "Maize", "Soybean"]
}"#;

/// One scripted transport reply.
#[allow(dead_code)]
pub enum Reply {
    Status(u16, &'static str),
    Error(UploadError),
}

/// Transport that replays scripted replies and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<AnalysisRequest>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<AnalysisRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl AnalysisTransport for ScriptedTransport {
    fn submit(&self, request: &AnalysisRequest) -> Result<TransportResponse, UploadError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Status(status, body)) => Ok(TransportResponse {
                status,
                body: body.to_string(),
            }),
            Some(Reply::Error(error)) => Err(error),
            None => panic!("unexpected extra request"),
        }
    }
}

/// Guest store with `used` anonymous analyses recorded.
#[allow(dead_code)]
pub fn guest_store(used: u32) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_entries([(
        keys::GUEST_SCANS,
        used.to_string(),
    )]))
}

/// Store holding a credential for `farmer`.
#[allow(dead_code)]
pub fn signed_in_store(used: u32) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_entries([
        (keys::TOKEN, "tok-123".to_string()),
        (keys::USERNAME, "farmer".to_string()),
        (keys::GUEST_SCANS, used.to_string()),
    ]))
}

/// Small JPEG-typed candidate.
#[allow(dead_code)]
pub fn jpeg_candidate() -> soilscan_stager::Candidate {
    soilscan_stager::Candidate::new(
        "field.jpg",
        "image/jpeg",
        vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46],
    )
}

/// Reads the stored guest counter.
#[allow(dead_code)]
pub fn stored_count(store: &dyn KeyValueStore) -> Option<String> {
    store.get(keys::GUEST_SCANS)
}
