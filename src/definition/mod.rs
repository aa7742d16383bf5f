/// Cluster definition files (v4 and v5 YAML formats)
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::api::models::{
    AddClusterRequest, AddNodePoolRequest, MasterDetails, NodePoolAvailabilityZones, NodePoolAws,
    NodePoolNodeSpec, Scaling, V5AddClusterRequest, WorkerAws, WorkerAzure, WorkerCpu,
    WorkerDetails, WorkerMemory, WorkerStorage,
};

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("could not read cluster definition {}: {source}", path.display())]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse cluster definition: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unsupported api_version '{0}', expected v4 or v5")]
    UnsupportedVersion(String),

    #[error("invalid cluster definition: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingDefinition {
    #[serde(default)]
    pub min: i64,
    #[serde(default)]
    pub max: i64,
}

impl ScalingDefinition {
    fn validate(&self, what: &str) -> Result<(), DefinitionError> {
        if self.min < 0 || self.max < 0 {
            return Err(DefinitionError::Invalid(format!(
                "{}: scaling limits must not be negative",
                what
            )));
        }
        if self.min > 0 && self.max > 0 && self.min > self.max {
            return Err(DefinitionError::Invalid(format!(
                "{}: scaling min ({}) is greater than max ({})",
                what, self.min, self.max
            )));
        }
        Ok(())
    }

    fn to_scaling(self) -> Option<Scaling> {
        if self == Self::default() {
            return None;
        }
        Some(Scaling {
            min: Some(self.min).filter(|v| *v > 0),
            max: Some(self.max).filter(|v| *v > 0),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryDefinition {
    #[serde(default)]
    pub size_gb: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuDefinition {
    #[serde(default)]
    pub cores: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageDefinition {
    #[serde(default)]
    pub size_gb: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AwsSpecificDefinition {
    #[serde(default)]
    pub instance_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AzureSpecificDefinition {
    #[serde(default)]
    pub vm_size: String,
}

/// Worker node in a v4 definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    #[serde(default)]
    pub memory: MemoryDefinition,
    #[serde(default)]
    pub cpu: CpuDefinition,
    #[serde(default)]
    pub storage: StorageDefinition,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub aws: AwsSpecificDefinition,
    #[serde(default)]
    pub azure: AzureSpecificDefinition,
}

impl NodeDefinition {
    fn to_worker(&self) -> WorkerDetails {
        WorkerDetails {
            memory: (self.memory.size_gb > 0.0).then(|| WorkerMemory {
                size_gb: f64::from(self.memory.size_gb),
            }),
            cpu: (self.cpu.cores > 0).then(|| WorkerCpu {
                cores: self.cpu.cores,
            }),
            storage: (self.storage.size_gb > 0.0).then(|| WorkerStorage {
                size_gb: f64::from(self.storage.size_gb),
            }),
            aws: (!self.aws.instance_type.is_empty()).then(|| WorkerAws {
                instance_type: self.aws.instance_type.clone(),
            }),
            azure: (!self.azure.vm_size.is_empty()).then(|| WorkerAzure {
                vm_size: self.azure.vm_size.clone(),
            }),
            labels: self.labels.clone(),
        }
    }
}

/// v4 cluster definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterDefinitionV4 {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub release_version: String,
    #[serde(default)]
    pub availability_zones: i64,
    #[serde(default)]
    pub scaling: ScalingDefinition,
    #[serde(default)]
    pub workers: Vec<NodeDefinition>,
}

impl ClusterDefinitionV4 {
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.availability_zones < 0 {
            return Err(DefinitionError::Invalid(
                "availability_zones must not be negative".to_string(),
            ));
        }
        self.scaling.validate("cluster")
    }

    /// Request body for creating this cluster
    pub fn to_add_cluster_request(&self) -> AddClusterRequest {
        AddClusterRequest {
            owner: self.owner.clone(),
            name: non_empty(&self.name),
            release_version: non_empty(&self.release_version),
            availability_zones: Some(self.availability_zones).filter(|n| *n > 0),
            scaling: self.scaling.to_scaling(),
            workers: self.workers.iter().map(NodeDefinition::to_worker).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MasterDefinition {
    #[serde(default)]
    pub availability_zone: String,
}

/// Either a number of zones or an explicit zone list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityZonesDefinition {
    #[serde(default)]
    pub number: i64,
    #[serde(default)]
    pub zones: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsSpecificDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePoolDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zones: Option<AvailabilityZonesDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<ScalingDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_spec: Option<NodeSpec>,
}

impl NodePoolDefinition {
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let what = if self.name.is_empty() {
            "node pool".to_string()
        } else {
            format!("node pool '{}'", self.name)
        };

        if let Some(azs) = &self.availability_zones {
            if azs.number != 0 && !azs.zones.is_empty() {
                return Err(DefinitionError::Invalid(format!(
                    "{}: set either availability_zones.number or availability_zones.zones, not both",
                    what
                )));
            }
            if azs.number < 0 {
                return Err(DefinitionError::Invalid(format!(
                    "{}: availability_zones.number must not be negative",
                    what
                )));
            }
        }

        if let Some(scaling) = &self.scaling {
            scaling.validate(&what)?;
        }
        Ok(())
    }

    /// Request body for creating this node pool
    pub fn to_add_node_pool_request(&self) -> AddNodePoolRequest {
        AddNodePoolRequest {
            name: non_empty(&self.name),
            availability_zones: self.availability_zones.as_ref().map(|azs| {
                NodePoolAvailabilityZones {
                    number: Some(azs.number).filter(|n| *n > 0),
                    zones: azs.zones.clone(),
                }
            }),
            scaling: self.scaling.and_then(ScalingDefinition::to_scaling),
            node_spec: self
                .node_spec
                .as_ref()
                .and_then(|spec| spec.aws.as_ref())
                .filter(|aws| !aws.instance_type.is_empty())
                .map(|aws| NodePoolNodeSpec {
                    aws: Some(NodePoolAws {
                        instance_type: aws.instance_type.clone(),
                    }),
                    volume_sizes_gb: None,
                }),
        }
    }
}

/// v5 cluster definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterDefinitionV5 {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub release_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<MasterDefinition>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub nodepools: Vec<NodePoolDefinition>,
}

impl ClusterDefinitionV5 {
    pub fn validate(&self) -> Result<(), DefinitionError> {
        self.nodepools.iter().try_for_each(NodePoolDefinition::validate)
    }

    /// Request body for creating the cluster itself, without node pools
    pub fn to_add_cluster_request(&self) -> V5AddClusterRequest {
        V5AddClusterRequest {
            owner: self.owner.clone(),
            name: non_empty(&self.name),
            release_version: non_empty(&self.release_version),
            master: self
                .master
                .as_ref()
                .filter(|m| !m.availability_zone.is_empty())
                .map(|m| MasterDetails {
                    availability_zone: m.availability_zone.clone(),
                }),
            labels: self.labels.clone(),
        }
    }
}

/// A parsed cluster definition of either format
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterDefinition {
    V4(ClusterDefinitionV4),
    V5(ClusterDefinitionV5),
}

impl ClusterDefinition {
    pub fn owner(&self) -> &str {
        match self {
            ClusterDefinition::V4(def) => &def.owner,
            ClusterDefinition::V5(def) => &def.owner,
        }
    }

    pub fn set_owner(&mut self, owner: impl Into<String>) {
        match self {
            ClusterDefinition::V4(def) => def.owner = owner.into(),
            ClusterDefinition::V5(def) => def.owner = owner.into(),
        }
    }

    pub fn validate(&self) -> Result<(), DefinitionError> {
        match self {
            ClusterDefinition::V4(def) => def.validate(),
            ClusterDefinition::V5(def) => def.validate(),
        }
    }
}

#[derive(Deserialize)]
struct VersionHeader {
    #[serde(default)]
    api_version: String,
}

/// Parse a definition, choosing the format from `api_version`.
/// A missing `api_version` means v4.
pub fn read_definition_from_yaml(data: &[u8]) -> Result<ClusterDefinition, DefinitionError> {
    let header: VersionHeader = serde_yaml::from_slice(data)?;

    let definition = match header.api_version.as_str() {
        "" | "v4" => ClusterDefinition::V4(serde_yaml::from_slice(data)?),
        "v5" => ClusterDefinition::V5(serde_yaml::from_slice(data)?),
        other => return Err(DefinitionError::UnsupportedVersion(other.to_string())),
    };

    definition.validate()?;
    Ok(definition)
}

/// Read and parse a definition file
pub fn read_definition_from_file<P: AsRef<Path>>(
    path: P,
) -> Result<ClusterDefinition, DefinitionError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| DefinitionError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    read_definition_from_yaml(&data)
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_v4(yaml: &str) -> ClusterDefinitionV4 {
        match read_definition_from_yaml(yaml.as_bytes()).unwrap() {
            ClusterDefinition::V4(def) => def,
            other => panic!("expected v4 definition, got {:?}", other),
        }
    }

    fn parse_v5(yaml: &str) -> ClusterDefinitionV5 {
        match read_definition_from_yaml(yaml.as_bytes()).unwrap() {
            ClusterDefinition::V5(def) => def,
            other => panic!("expected v5 definition, got {:?}", other),
        }
    }

    #[test]
    fn test_v4_minimal() {
        let def = parse_v4("owner: myorg");
        assert_eq!(
            def,
            ClusterDefinitionV4 {
                owner: "myorg".to_string(),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_v4_details() {
        let def = parse_v4(
            "owner: myorg
name: My cluster
release_version: 1.2.3
availability_zones: 3
scaling:
  min: 3
  max: 5",
        );
        assert_eq!(def.name, "My cluster");
        assert_eq!(def.release_version, "1.2.3");
        assert_eq!(def.availability_zones, 3);
        assert_eq!(def.scaling, ScalingDefinition { min: 3, max: 5 });
    }

    #[test]
    fn test_v4_workers() {
        let def = parse_v4(
            "owner: myorg
workers:
- memory:
    size_gb: 16.5
  cpu:
    cores: 4
  storage:
    size_gb: 100
- memory:
    size_gb: 32
  cpu:
    cores: 8
  storage:
    size_gb: 50
",
        );
        assert_eq!(def.workers.len(), 2);
        assert_eq!(def.workers[0].memory.size_gb, 16.5);
        assert_eq!(def.workers[0].cpu.cores, 4);
        assert_eq!(def.workers[1].storage.size_gb, 50.0);

        let request = def.to_add_cluster_request();
        assert_eq!(request.workers[1].cpu.as_ref().unwrap().cores, 8);
        assert!(request.workers[0].aws.is_none());
    }

    #[test]
    fn test_v5_node_pools() {
        let def = parse_v5(
            "api_version: v5
owner: myorg
master:
  availability_zone: my-zone-1a
nodepools:
- name: General purpose
  availability_zones:
    number: 2
- name: Database
  availability_zones:
    zones:
    - my-zone-1a
    - my-zone-1b
    - my-zone-1c
  scaling:
    min: 3
    max: 10
  node_spec:
    aws:
      instance_type: \"m5.superlarge\"
- name: Batch
",
        );

        assert_eq!(
            def.master,
            Some(MasterDefinition {
                availability_zone: "my-zone-1a".to_string()
            })
        );
        assert_eq!(def.nodepools.len(), 3);
        assert_eq!(
            def.nodepools[0].availability_zones,
            Some(AvailabilityZonesDefinition {
                number: 2,
                zones: vec![]
            })
        );
        assert_eq!(
            def.nodepools[1].scaling,
            Some(ScalingDefinition { min: 3, max: 10 })
        );
        assert_eq!(def.nodepools[2], NodePoolDefinition {
            name: "Batch".to_string(),
            ..Default::default()
        });

        let request = def.nodepools[1].to_add_node_pool_request();
        assert_eq!(request.availability_zones.unwrap().zones.len(), 3);
        assert_eq!(
            request.node_spec.unwrap().aws.unwrap().instance_type,
            "m5.superlarge"
        );

        let cluster = def.to_add_cluster_request();
        assert_eq!(cluster.master.unwrap().availability_zone, "my-zone-1a");
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let def = parse_v4("o: myorg");
        assert_eq!(def.owner, "");
    }

    #[test]
    fn test_conflicting_availability_zones() {
        let result = read_definition_from_yaml(
            b"api_version: v5
owner: myorg
nodepools:
- name: Mixed
  availability_zones:
    number: 2
    zones: [my-zone-1a]
",
        );
        assert!(matches!(result, Err(DefinitionError::Invalid(ref msg)) if msg.contains("Mixed")));
    }

    #[test]
    fn test_scaling_min_above_max() {
        let result = read_definition_from_yaml(b"owner: myorg\nscaling:\n  min: 5\n  max: 3\n");
        assert!(matches!(result, Err(DefinitionError::Invalid(_))));
    }

    #[test]
    fn test_unsupported_version() {
        let result = read_definition_from_yaml(b"api_version: v9\nowner: myorg\n");
        assert!(matches!(result, Err(DefinitionError::UnsupportedVersion(ref v)) if v == "v9"));
    }

    #[test]
    fn test_read_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "api_version: v5\nowner: acme\nname: From file\n").unwrap();

        let def = read_definition_from_file(file.path()).unwrap();
        assert_eq!(def.owner(), "acme");
        assert!(matches!(def, ClusterDefinition::V5(ref d) if d.name == "From file"));

        assert!(matches!(
            read_definition_from_file("/nonexistent/cluster.yaml"),
            Err(DefinitionError::Read { .. })
        ));
    }

    #[test]
    fn test_minimal_request_body() {
        let def = parse_v4("owner: myorg\nname: Tiny\n");
        let json = serde_json::to_value(def.to_add_cluster_request()).unwrap();
        assert_eq!(json, serde_json::json!({"owner": "myorg", "name": "Tiny"}));
    }
}
