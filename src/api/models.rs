/// Cluster management API data models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Generic response body, also used for API errors
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenericResponse {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Cluster list entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterListItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Scaling bounds for workers or node pools
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scaling {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerMemory {
    #[serde(default)]
    pub size_gb: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerCpu {
    #[serde(default)]
    pub cores: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerStorage {
    #[serde(default)]
    pub size_gb: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerAws {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instance_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerAzure {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vm_size: String,
}

/// Worker node details (v4)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<WorkerMemory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<WorkerCpu>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<WorkerStorage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<WorkerAws>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<WorkerAzure>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

/// Request body for creating a v4 cluster
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddClusterRequest {
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zones: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<Scaling>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workers: Vec<WorkerDetails>,
}

/// Master node placement (v5)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MasterDetails {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub availability_zone: String,
}

/// Request body for creating a v5 cluster
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct V5AddClusterRequest {
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<MasterDetails>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

/// Request body for modifying a v4 cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModifyClusterRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<Scaling>,
}

/// Details of a v4 cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V4ClusterDetails {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zones: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<Scaling>,
    #[serde(default)]
    pub workers: Vec<WorkerDetails>,
}

/// Lifecycle condition of a v5 cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterCondition {
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

/// Details of a v5 cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V5ClusterDetails {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<MasterDetails>,
    #[serde(default)]
    pub conditions: Vec<ClusterCondition>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

/// Result of a successful cluster creation
#[derive(Debug, Clone, Serialize)]
pub struct ClusterCreated {
    /// Cluster ID taken from the `Location` header
    pub id: Option<String>,
    pub location: Option<String>,
}

/// Availability zone selection for a new node pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePoolAvailabilityZones {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePoolAws {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instance_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePoolVolumeSizes {
    #[serde(default)]
    pub docker: i64,
    #[serde(default)]
    pub kubelet: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePoolNodeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<NodePoolAws>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_sizes_gb: Option<NodePoolVolumeSizes>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodePoolStatus {
    #[serde(default)]
    pub nodes: i64,
    #[serde(default)]
    pub nodes_ready: i64,
}

/// Node pool as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodePool {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub availability_zones: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<Scaling>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_spec: Option<NodePoolNodeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodePoolStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
}

/// Request body for creating a node pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddNodePoolRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zones: Option<NodePoolAvailabilityZones>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<Scaling>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_spec: Option<NodePoolNodeSpec>,
}

/// Key pair list entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPair {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ttl_hours: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_organizations: Option<String>,
}

/// Request body for creating a key pair
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddKeyPairRequest {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_hours: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cn_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_organizations: Option<String>,
}

/// Newly created key pair including the certificate material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddKeyPairResponse {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ttl_hours: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub certificate_authority_data: String,
    #[serde(default)]
    pub client_key_data: String,
    #[serde(default)]
    pub client_certificate_data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AwsRoles {
    #[serde(default)]
    pub admin: String,
    #[serde(default)]
    pub awsoperator: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AwsCredential {
    pub roles: AwsRoles,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AzureCredentialDetails {
    #[serde(default)]
    pub subscription_id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AzureCredential {
    pub credential: AzureCredentialDetails,
}

/// Provider credential set of an organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsCredential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureCredential>,
}

/// Request body for adding credentials to an organization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddCredentialsRequest {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsCredential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureCredential>,
}

/// Result of adding credentials
#[derive(Debug, Clone, Serialize)]
pub struct CredentialsCreated {
    pub id: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseChange {
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseComponent {
    pub name: String,
    pub version: String,
}

/// Release list entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub changelog: Vec<ReleaseChange>,
    #[serde(default)]
    pub components: Vec<ReleaseComponent>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfoAvailabilityZones {
    #[serde(default)]
    pub max: i64,
    #[serde(default)]
    pub default: i64,
    #[serde(default)]
    pub zones: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfoGeneral {
    #[serde(default)]
    pub installation_name: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub datacenter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zones: Option<InfoAvailabilityZones>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfoCountPerCluster {
    #[serde(default)]
    pub max: i64,
    #[serde(default)]
    pub default: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfoOptions {
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub default: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfoWorkers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_per_cluster: Option<InfoCountPerCluster>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<InfoOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_size: Option<InfoOptions>,
}

/// Installation information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Info {
    #[serde(default)]
    pub general: InfoGeneral,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<InfoWorkers>,
}

/// Request body for creating an auth token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuthTokenRequest {
    pub email: String,
    pub password_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuthTokenResponse {
    pub auth_token: String,
}
