/// Cluster management API client
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::LOCATION;
use reqwest::{Certificate, Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::error::{ClientError, ConfigurationError, Error};
use super::models::*;
use super::params::{
    apply_params, current_command_line, random_request_id, AuthorizedParamSetter,
    AuxiliaryParams, BaseParams, ParamSetter, RequestParams,
};
use super::status::ClusterStatus;

/// Request timeout used when the configuration does not set one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub const CA_FILE_ENV: &str = "GSCTL_CAFILE";
pub const CA_PATH_ENV: &str = "GSCTL_CAPATH";

/// Produces the Authorization header value for the next request
pub type AuthHeaderGetter = Arc<dyn Fn() -> anyhow::Result<String> + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;

/// Custom root certificates. When neither is set the built-in roots are used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    /// PEM bundle, takes precedence over `ca_path`
    pub ca_file: Option<PathBuf>,
    /// Directory of PEM files
    pub ca_path: Option<PathBuf>,
}

impl TlsSettings {
    /// Read CA overrides from GSCTL_CAFILE / GSCTL_CAPATH
    pub fn from_env() -> Self {
        let non_empty = |key: &str| {
            std::env::var_os(key)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };
        Self {
            ca_file: non_empty(CA_FILE_ENV),
            ca_path: non_empty(CA_PATH_ENV),
        }
    }

    fn load_certificates(&self) -> std::result::Result<Option<Vec<Certificate>>, ConfigurationError> {
        if let Some(file) = &self.ca_file {
            return load_pem_file(file).map(Some);
        }

        let Some(dir) = &self.ca_path else {
            return Ok(None);
        };

        let entries = std::fs::read_dir(dir).map_err(|source| ConfigurationError::CaRead {
            path: dir.clone(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ConfigurationError::CaRead {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut certificates = Vec::new();
        for path in paths {
            certificates.extend(load_pem_file(&path)?);
        }
        if certificates.is_empty() {
            return Err(ConfigurationError::CaParse {
                path: dir.clone(),
                reason: "no certificate files in directory".to_string(),
            });
        }
        Ok(Some(certificates))
    }
}

fn load_pem_file(path: &Path) -> std::result::Result<Vec<Certificate>, ConfigurationError> {
    let pem = std::fs::read(path).map_err(|source| ConfigurationError::CaRead {
        path: path.to_path_buf(),
        source,
    })?;

    let certificates =
        Certificate::from_pem_bundle(&pem).map_err(|e| ConfigurationError::CaParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if certificates.is_empty() {
        return Err(ConfigurationError::CaParse {
            path: path.to_path_buf(),
            reason: "no PEM certificates found".to_string(),
        });
    }

    Ok(certificates)
}

/// Client configuration, immutable once the wrapper is built
#[derive(Clone)]
pub struct Configuration {
    /// Base URL of the API
    pub endpoint: String,
    /// Maximum time to wait for a request
    pub timeout: Duration,
    pub user_agent: String,
    /// Sent as the activity header on every request
    pub activity_name: Option<String>,
    pub auth_header_getter: Option<AuthHeaderGetter>,
    pub tls: TlsSettings,
}

impl Configuration {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: default_user_agent(),
            activity_name: None,
            auth_header_getter: None,
            tls: TlsSettings::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_activity_name(mut self, activity_name: impl Into<String>) -> Self {
        self.activity_name = Some(activity_name.into());
        self
    }

    pub fn with_auth_header_getter<F>(mut self, getter: F) -> Self
    where
        F: Fn() -> anyhow::Result<String> + Send + Sync + 'static,
    {
        self.auth_header_getter = Some(Arc::new(getter));
        self
    }

    pub fn with_tls(mut self, tls: TlsSettings) -> Self {
        self.tls = tls;
        self
    }
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("activity_name", &self.activity_name)
            .field("auth_header_getter", &self.auth_header_getter.is_some())
            .field("tls", &self.tls)
            .finish()
    }
}

pub fn default_user_agent() -> String {
    format!("gsctl/{}", env!("CARGO_PKG_VERSION"))
}

/// Validate the endpoint and return it as a base URL
fn parse_endpoint(endpoint: &str) -> std::result::Result<Url, ConfigurationError> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(ConfigurationError::EndpointNotSpecified);
    }

    let invalid = |reason: String| ConfigurationError::EndpointInvalid {
        endpoint: endpoint.to_string(),
        reason,
    };

    let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().map_or(true, str::is_empty) || url.cannot_be_a_base() {
        return Err(invalid("missing host".to_string()));
    }

    Ok(url)
}

struct Inner {
    conf: Configuration,
    base_url: Url,
    http: Client,
    request_id: String,
    command_line: String,
}

/// Authenticated wrapper around the cluster management API.
///
/// Cheap to clone; holds no per-call state.
#[derive(Clone)]
pub struct Wrapper {
    inner: Arc<Inner>,
}

impl Wrapper {
    /// Create a wrapper with a random default request ID and the current
    /// process command line
    pub fn new(conf: Configuration) -> Result<Self> {
        let request_id = random_request_id(&mut rand::thread_rng());
        Self::with_defaults(conf, request_id, current_command_line())
    }

    /// Create a wrapper with explicit default request ID and command line
    pub fn with_defaults(
        conf: Configuration,
        request_id: impl Into<String>,
        command_line: impl Into<String>,
    ) -> Result<Self> {
        let base_url = parse_endpoint(&conf.endpoint)?;

        let timeout = if conf.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            conf.timeout
        };

        let mut builder = Client::builder()
            .user_agent(conf.user_agent.clone())
            .timeout(timeout);

        if let Some(certificates) = conf.tls.load_certificates()? {
            debug!("Using {} custom root certificate(s)", certificates.len());
            builder = builder.tls_built_in_root_certs(false);
            for certificate in certificates {
                builder = builder.add_root_certificate(certificate);
            }
        }

        let http = builder.build().map_err(ConfigurationError::HttpClient)?;

        Ok(Self {
            inner: Arc::new(Inner {
                conf,
                base_url,
                http,
                request_id: request_id.into(),
                command_line: command_line.into(),
            }),
        })
    }

    /// Fresh auxiliary parameters with a new request ID and the current
    /// command line
    pub fn default_auxiliary_params(&self) -> AuxiliaryParams {
        AuxiliaryParams {
            request_id: Some(random_request_id(&mut rand::thread_rng())),
            ..Default::default()
        }
        .with_command_line(current_command_line())
    }

    fn base_params(&self) -> BaseParams<'_> {
        let inner = &self.inner;
        BaseParams {
            timeout: Some(inner.conf.timeout),
            command_line: Some(inner.command_line.as_str()),
            activity_name: inner.conf.activity_name.as_deref(),
            request_id: Some(inner.request_id.as_str()),
        }
    }

    /// Apply wrapper defaults and per-call overrides
    pub fn set_params<P: ParamSetter>(&self, aux: Option<&AuxiliaryParams>, params: &mut P) {
        apply_params(&self.base_params(), aux, params);
    }

    /// Like `set_params`, but first sets the Authorization header from the
    /// configured provider
    pub fn set_params_with_authorization<P: AuthorizedParamSetter>(
        &self,
        aux: Option<&AuxiliaryParams>,
        params: &mut P,
    ) -> Result<()> {
        if let Some(getter) = &self.inner.conf.auth_header_getter {
            let header = getter().map_err(|e| Error::Authorization(format!("{:#}", e)))?;
            if !header.is_empty() {
                params.set_authorization(&header);
            }
        }

        self.set_params(aux, params);
        Ok(())
    }

    fn url_for(&self, segments: &[String]) -> Url {
        let mut url = self.inner.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments).push("");
        }
        url
    }

    /// Send a request and return the response if it has a 2xx status
    async fn execute(&self, operation: &'static str, params: RequestParams) -> Result<Response> {
        // Url drops "." and ".." segments, which would retarget the request
        if let Some(segment) = params
            .segments()
            .iter()
            .find(|s| matches!(s.trim(), "" | "." | ".."))
        {
            return Err(ClientError::invalid_segment(operation, segment).into());
        }

        let url = self.url_for(params.segments());
        debug!(
            "{} {} (request ID {})",
            params.method(),
            url,
            params.request_id().unwrap_or("-")
        );

        let mut request = self
            .inner
            .http
            .request(params.method().clone(), url)
            .headers(params.headers());
        if let Some(timeout) = params.timeout() {
            request = request.timeout(timeout);
        }
        if let Some(body) = params.body() {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::from_transport(operation, e))?;

        let status = response.status();
        debug!("{} returned {}", operation, status);
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ClientError::from_response(operation, status, &body).into())
    }

    /// Send a request and decode the JSON response body
    async fn call<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        params: RequestParams,
    ) -> Result<T> {
        let response = self.execute(operation, params).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::from_transport(operation, e))?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::from_decode(operation, e).into())
    }

    /// Build authorized parameters for `method` on `segments`
    fn authorized<I, S>(
        &self,
        method: Method,
        segments: I,
        aux: Option<&AuxiliaryParams>,
    ) -> Result<RequestParams>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut params = RequestParams::new(method, segments);
        self.set_params_with_authorization(aux, &mut params)?;
        Ok(params)
    }

    /// Create an auth token for the given credentials
    pub async fn create_auth_token(
        &self,
        email: &str,
        password: &str,
        aux: Option<&AuxiliaryParams>,
    ) -> Result<CreateAuthTokenResponse> {
        let body = CreateAuthTokenRequest {
            email: email.to_string(),
            password_base64: STANDARD.encode(password.as_bytes()),
        };
        let mut params = RequestParams::new(Method::POST, ["v4", "auth-tokens"])
            .with_body(encode("create auth token", &body)?);
        self.set_params(aux, &mut params);

        self.call("create auth token", params).await
    }

    /// Invalidate an auth token
    pub async fn delete_auth_token(
        &self,
        auth_token: &str,
        aux: Option<&AuxiliaryParams>,
    ) -> Result<GenericResponse> {
        let mut params = RequestParams::new(Method::DELETE, ["v4", "auth-tokens"]);
        params.set_authorization(&format!("giantswarm {}", auth_token));
        self.set_params(aux, &mut params);

        self.call("delete auth token", params).await
    }

    /// Create a v4 cluster
    pub async fn create_cluster(
        &self,
        request: &AddClusterRequest,
        aux: Option<&AuxiliaryParams>,
    ) -> Result<ClusterCreated> {
        let params = self
            .authorized(Method::POST, ["v4", "clusters"], aux)?
            .with_body(encode("create cluster", request)?);

        let response = self.execute("create cluster", params).await?;
        let location = location_header(&response);
        Ok(ClusterCreated {
            id: location.as_deref().and_then(last_path_segment),
            location,
        })
    }

    /// Create a v5 cluster (node pools are added separately)
    pub async fn create_cluster_v5(
        &self,
        request: &V5AddClusterRequest,
        aux: Option<&AuxiliaryParams>,
    ) -> Result<V5ClusterDetails> {
        const OPERATION: &str = "create cluster";

        let params = self
            .authorized(Method::POST, ["v5", "clusters"], aux)?
            .with_body(encode(OPERATION, request)?);

        self.call(OPERATION, params).await
    }

    /// Modify a v4 cluster
    pub async fn modify_cluster(
        &self,
        cluster_id: &str,
        request: &ModifyClusterRequest,
        aux: Option<&AuxiliaryParams>,
    ) -> Result<V4ClusterDetails> {
        let params = self
            .authorized(Method::PATCH, ["v4", "clusters", cluster_id], aux)?
            .with_body(encode("modify cluster", request)?);

        self.call("modify cluster", params).await
    }

    /// Delete a cluster
    pub async fn delete_cluster(
        &self,
        cluster_id: &str,
        aux: Option<&AuxiliaryParams>,
    ) -> Result<GenericResponse> {
        let params = self.authorized(Method::DELETE, ["v4", "clusters", cluster_id], aux)?;
        self.call("delete cluster", params).await
    }

    /// List all clusters visible to the caller
    pub async fn get_clusters(&self, aux: Option<&AuxiliaryParams>) -> Result<Vec<ClusterListItem>> {
        let params = self.authorized(Method::GET, ["v4", "clusters"], aux)?;
        self.call("list clusters", params).await
    }

    /// Fetch details of a v4 cluster
    pub async fn get_cluster_v4(
        &self,
        cluster_id: &str,
        aux: Option<&AuxiliaryParams>,
    ) -> Result<V4ClusterDetails> {
        let params = self.authorized(Method::GET, ["v4", "clusters", cluster_id], aux)?;
        self.call("get cluster", params).await
    }

    /// Fetch details of a v5 cluster
    pub async fn get_cluster_v5(
        &self,
        cluster_id: &str,
        aux: Option<&AuxiliaryParams>,
    ) -> Result<V5ClusterDetails> {
        let params = self.authorized(Method::GET, ["v5", "clusters", cluster_id], aux)?;
        self.call("get cluster", params).await
    }

    /// The only cluster visible to the caller, if there is exactly one
    pub async fn get_default_cluster(&self, aux: Option<&AuxiliaryParams>) -> Result<Option<String>> {
        let clusters = self.get_clusters(aux).await?;
        match clusters.as_slice() {
            [only] => Ok(Some(only.id.clone())),
            _ => {
                debug!("{} clusters visible, no default cluster", clusters.len());
                Ok(None)
            }
        }
    }

    /// Fetch the status document of a cluster, reduced to `ClusterStatus`
    pub async fn get_cluster_status(
        &self,
        cluster_id: &str,
        aux: Option<&AuxiliaryParams>,
    ) -> Result<ClusterStatus> {
        const OPERATION: &str = "get cluster status";

        let params = self.authorized(Method::GET, ["v4", "clusters", cluster_id, "status"], aux)?;
        let raw: serde_json::Value = self.call(OPERATION, params).await?;

        ClusterStatus::from_value(raw).map_err(|e| ClientError::from_decode(OPERATION, e).into())
    }

    /// Add a node pool to a v5 cluster
    pub async fn create_node_pool(
        &self,
        cluster_id: &str,
        request: &AddNodePoolRequest,
        aux: Option<&AuxiliaryParams>,
    ) -> Result<NodePool> {
        let params = self
            .authorized(Method::POST, ["v5", "clusters", cluster_id, "nodepools"], aux)?
            .with_body(encode("create node pool", request)?);

        self.call("create node pool", params).await
    }

    /// Fetch a single node pool
    pub async fn get_node_pool(
        &self,
        cluster_id: &str,
        node_pool_id: &str,
        aux: Option<&AuxiliaryParams>,
    ) -> Result<NodePool> {
        let params = self.authorized(
            Method::GET,
            ["v5", "clusters", cluster_id, "nodepools", node_pool_id],
            aux,
        )?;
        self.call("get node pool", params).await
    }

    /// List node pools of a cluster
    pub async fn get_node_pools(
        &self,
        cluster_id: &str,
        aux: Option<&AuxiliaryParams>,
    ) -> Result<Vec<NodePool>> {
        let params = self.authorized(Method::GET, ["v5", "clusters", cluster_id, "nodepools"], aux)?;
        self.call("list node pools", params).await
    }

    /// Delete a node pool
    pub async fn delete_node_pool(
        &self,
        cluster_id: &str,
        node_pool_id: &str,
        aux: Option<&AuxiliaryParams>,
    ) -> Result<GenericResponse> {
        let params = self.authorized(
            Method::DELETE,
            ["v5", "clusters", cluster_id, "nodepools", node_pool_id],
            aux,
        )?;
        self.call("delete node pool", params).await
    }

    /// Create a key pair for a cluster
    pub async fn create_key_pair(
        &self,
        cluster_id: &str,
        request: &AddKeyPairRequest,
        aux: Option<&AuxiliaryParams>,
    ) -> Result<AddKeyPairResponse> {
        let params = self
            .authorized(Method::POST, ["v4", "clusters", cluster_id, "key-pairs"], aux)?
            .with_body(encode("create key pair", request)?);

        self.call("create key pair", params).await
    }

    /// List key pairs of a cluster
    pub async fn get_key_pairs(
        &self,
        cluster_id: &str,
        aux: Option<&AuxiliaryParams>,
    ) -> Result<Vec<KeyPair>> {
        let params = self.authorized(Method::GET, ["v4", "clusters", cluster_id, "key-pairs"], aux)?;
        self.call("list key pairs", params).await
    }

    /// Fetch installation information
    pub async fn get_info(&self, aux: Option<&AuxiliaryParams>) -> Result<Info> {
        let params = self.authorized(Method::GET, ["v4", "info"], aux)?;
        self.call("get info", params).await
    }

    /// List releases
    pub async fn get_releases(&self, aux: Option<&AuxiliaryParams>) -> Result<Vec<Release>> {
        let params = self.authorized(Method::GET, ["v4", "releases"], aux)?;
        self.call("list releases", params).await
    }

    /// List organizations the caller belongs to
    pub async fn get_organizations(
        &self,
        aux: Option<&AuxiliaryParams>,
    ) -> Result<Vec<Organization>> {
        let params = self.authorized(Method::GET, ["v4", "organizations"], aux)?;
        self.call("list organizations", params).await
    }

    /// Fetch a credential set of an organization
    pub async fn get_credential(
        &self,
        organization_id: &str,
        credential_id: &str,
        aux: Option<&AuxiliaryParams>,
    ) -> Result<Credential> {
        let params = self.authorized(
            Method::GET,
            ["v4", "organizations", organization_id, "credentials", credential_id],
            aux,
        )?;
        self.call("get credential", params).await
    }

    /// Add a credential set to an organization
    pub async fn set_credentials(
        &self,
        organization_id: &str,
        request: &AddCredentialsRequest,
        aux: Option<&AuxiliaryParams>,
    ) -> Result<CredentialsCreated> {
        let params = self
            .authorized(
                Method::POST,
                ["v4", "organizations", organization_id, "credentials"],
                aux,
            )?
            .with_body(encode("set credentials", request)?);

        let response = self.execute("set credentials", params).await?;
        let location = location_header(&response);
        Ok(CredentialsCreated {
            id: location.as_deref().and_then(last_path_segment),
            location,
        })
    }
}

fn encode<T: Serialize>(operation: &'static str, value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| ClientError::from_encode(operation, e).into())
}

fn location_header(response: &Response) -> Option<String> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn last_path_segment(location: &str) -> Option<String> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
