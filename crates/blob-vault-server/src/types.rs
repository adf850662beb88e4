//! Request and response types for the vault API

use file_blob_cache::CacheStats;
use object_store_client::Tags;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache: CacheStats,
}

/// Returned after a successful upload
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub name: String,
    pub size: usize,
    pub tags: Tags,
}

/// `GET /api/search` query
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub key: Option<String>,
    pub value: Option<String>,
}

/// `POST /api/sweep` query
#[derive(Debug, Default, Deserialize)]
pub struct SweepParams {
    /// Overrides the configured cold threshold for this sweep
    pub threshold_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "ok".to_string(),
            uptime_secs: 12,
            cache: CacheStats {
                entries: 2,
                total_size: 10,
                hits: 1,
                misses: 0,
            },
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["cache"]["entries"], 2);
    }

    #[test]
    fn test_upload_response_tags_are_a_map() {
        let mut tags = Tags::new();
        tags.insert("team".to_string(), "core".to_string());
        let response = UploadResponse {
            name: "a.txt".to_string(),
            size: 3,
            tags,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["tags"]["team"], "core");
    }
}
