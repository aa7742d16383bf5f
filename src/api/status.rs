/// Narrow projection of the cluster status document
///
/// The status endpoint returns a large, provider-specific document. Only the
/// parts the CLI shows are decoded here; everything else is dropped.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<StatusCluster>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusCluster {
    /// Newest first
    #[serde(default)]
    pub conditions: Vec<StatusClusterCondition>,
    #[serde(default)]
    pub nodes: Vec<StatusClusterNode>,
    #[serde(default)]
    pub scaling: StatusClusterScaling,
    #[serde(default)]
    pub versions: Vec<StatusClusterVersion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusClusterCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusClusterNode {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusClusterScaling {
    #[serde(default)]
    pub desired_capacity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusClusterVersion {
    pub semver: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl ClusterStatus {
    /// Decode the projection from an arbitrary status document
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Current phase: the newest condition whose status is "True"
    pub fn phase(&self) -> Option<&str> {
        self.cluster.as_ref()?.conditions.iter().find_map(|c| {
            if c.status.eq_ignore_ascii_case("true") {
                Some(c.condition_type.as_str())
            } else {
                None
            }
        })
    }

    /// Number of nodes reported in the status
    pub fn node_count(&self) -> usize {
        self.cluster.as_ref().map_or(0, |c| c.nodes.len())
    }

    /// Most recent release version the cluster has reached
    pub fn current_version(&self) -> Option<&str> {
        self.cluster
            .as_ref()?
            .versions
            .iter()
            .max_by_key(|v| v.last_transition_time.or(v.date))
            .map(|v| v.semver.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_document() -> serde_json::Value {
        json!({
            "aws": {"availabilityZones": [{"name": "eu-central-1a"}]},
            "cluster": {
                "conditions": [
                    {"type": "Created", "status": "True", "lastTransitionTime": "2019-08-01T10:00:00Z"},
                    {"type": "Creating", "status": "False", "lastTransitionTime": "2019-08-01T09:40:00Z"}
                ],
                "network": {"cidr": "10.1.0.0/24"},
                "nodes": [
                    {"name": "ip-10-1-0-1", "version": "2.2.0", "labels": {"role": "master"}},
                    {"name": "ip-10-1-0-2", "version": "2.2.0"}
                ],
                "resources": [{"name": "SomeResource", "conditions": []}],
                "scaling": {"desiredCapacity": 3},
                "versions": [
                    {"semver": "8.1.0", "date": "2019-07-01T00:00:00Z", "lastTransitionTime": "2019-07-01T00:00:00Z"},
                    {"semver": "8.2.0", "date": "2019-08-01T00:00:00Z", "lastTransitionTime": "2019-08-01T00:00:00Z"}
                ]
            }
        })
    }

    #[test]
    fn test_projection_keeps_phase() {
        let status = ClusterStatus::from_value(sample_document()).unwrap();
        assert_eq!(status.phase(), Some("Created"));
        assert_eq!(status.node_count(), 2);
        assert_eq!(status.current_version(), Some("8.2.0"));

        let cluster = status.cluster.as_ref().unwrap();
        assert_eq!(cluster.scaling.desired_capacity, 3);
    }

    #[test]
    fn test_projection_drops_unknown_fields() {
        let status = ClusterStatus::from_value(sample_document()).unwrap();
        let reencoded = serde_json::to_value(&status).unwrap();

        assert!(reencoded.get("aws").is_none());
        let cluster = &reencoded["cluster"];
        assert!(cluster.get("network").is_none());
        assert!(cluster.get("resources").is_none());
        assert_eq!(cluster["conditions"][0]["type"], "Created");

        // Decoding the re-encoded projection is stable
        let again = ClusterStatus::from_value(reencoded).unwrap();
        assert_eq!(again.phase(), Some("Created"));
    }

    #[test]
    fn test_empty_document() {
        let status = ClusterStatus::from_value(json!({})).unwrap();
        assert!(status.cluster.is_none());
        assert_eq!(status.phase(), None);
        assert_eq!(status.node_count(), 0);
    }
}
