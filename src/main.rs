/// gsctl - command line client for the cluster management API
///
/// Creates, inspects, scales and deletes Kubernetes clusters, node pools,
/// key pairs and organization credentials.
mod api;
mod config;
mod definition;
mod output;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::models::{
    AddCredentialsRequest, AddKeyPairRequest, AwsCredential, AwsRoles, ModifyClusterRequest,
    Scaling,
};
use crate::api::{Configuration, TlsSettings, Wrapper};
use crate::config::{CliConfig, CLI_TIMEOUT};
use crate::definition::{
    AvailabilityZonesDefinition, AwsSpecificDefinition, ClusterDefinition, ClusterDefinitionV4,
    NodePoolDefinition, NodeSpec, ScalingDefinition,
};
use crate::output::OutputFormat;

/// Node pool creation right after a cluster create can be slow to answer
const NODE_POOL_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "gsctl")]
#[command(about = "Manage Kubernetes clusters via the cluster management API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API endpoint URL
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Auth token to use instead of the stored one
    #[arg(long, global = true)]
    auth_token: Option<String>,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml, global = true)]
    output: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store an auth token
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,
    },

    /// Invalidate the stored auth token
    Logout,

    /// Show installation information
    Info,

    /// List resources
    List {
        #[command(subcommand)]
        resource: ListCommand,
    },

    /// Show details of a resource
    Show {
        #[command(subcommand)]
        resource: ShowCommand,
    },

    /// Show cluster status
    Status {
        /// Cluster ID (defaults to the only cluster)
        cluster: Option<String>,
    },

    /// Create resources
    Create {
        #[command(subcommand)]
        resource: CreateCommand,
    },

    /// Modify resources
    Update {
        #[command(subcommand)]
        resource: UpdateCommand,
    },

    /// Delete resources
    Delete {
        #[command(subcommand)]
        resource: DeleteCommand,
    },
}

#[derive(Subcommand)]
enum ListCommand {
    Clusters,
    Releases,
    Organizations,
    Nodepools { cluster: Option<String> },
    Keypairs { cluster: Option<String> },
}

#[derive(Subcommand)]
enum ShowCommand {
    Cluster {
        cluster: Option<String>,
    },
    Nodepool {
        cluster: String,
        nodepool: String,
    },
    Credential {
        organization: String,
        credential: String,
    },
}

#[derive(Subcommand)]
enum CreateCommand {
    /// Create a cluster from a definition file or from flags
    Cluster {
        /// Cluster definition file (v4 or v5 YAML)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Owning organization, overrides the definition
        #[arg(long)]
        owner: Option<String>,

        #[arg(long)]
        name: Option<String>,

        /// Release version
        #[arg(long)]
        release: Option<String>,
    },

    /// Create a key pair and print its credentials
    Keypair {
        cluster: Option<String>,

        #[arg(long, default_value = "Added by gsctl")]
        description: String,

        #[arg(long)]
        ttl_hours: Option<i64>,

        #[arg(long)]
        cn_prefix: Option<String>,

        #[arg(long)]
        certificate_organizations: Option<String>,
    },

    /// Add a node pool to a cluster
    Nodepool {
        cluster: String,

        #[arg(long)]
        name: String,

        #[arg(long, default_value_t = 0)]
        min: i64,

        #[arg(long, default_value_t = 0)]
        max: i64,

        #[arg(long, conflicts_with = "availability_zones")]
        num_availability_zones: Option<i64>,

        /// Explicit zone list, comma separated
        #[arg(long, value_delimiter = ',')]
        availability_zones: Vec<String>,

        #[arg(long)]
        instance_type: Option<String>,
    },
}

#[derive(Subcommand)]
enum UpdateCommand {
    /// Rename, upgrade or rescale a cluster
    Cluster {
        cluster: String,

        #[arg(long)]
        name: Option<String>,

        /// Release version to upgrade to
        #[arg(long)]
        release: Option<String>,

        #[arg(long)]
        workers_min: Option<i64>,

        #[arg(long)]
        workers_max: Option<i64>,
    },

    /// Set the AWS credentials of an organization
    Credentials {
        organization: String,

        #[arg(long)]
        aws_admin_role: String,

        #[arg(long)]
        aws_operator_role: String,
    },
}

#[derive(Subcommand)]
enum DeleteCommand {
    Cluster { cluster: String },
    Nodepool { cluster: String, nodepool: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so command output stays machine readable
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("gsctl={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match &cli.command {
        Commands::Login { email, password } => login(&cli, email, password).await,
        Commands::Logout => logout(&cli).await,
        Commands::Info => show_info(&cli).await,
        Commands::List { resource } => list(&cli, resource).await,
        Commands::Show { resource } => show(&cli, resource).await,
        Commands::Status { cluster } => show_status(&cli, cluster.as_deref()).await,
        Commands::Create { resource } => create(&cli, resource).await,
        Commands::Update { resource } => update(&cli, resource).await,
        Commands::Delete { resource } => delete(&cli, resource).await,
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        if let Some(details) = error_details(&e) {
            error!("Details: {}", details);
        }
        std::process::exit(1);
    }
}

/// Server-provided details attached to an API error, if any
fn error_details(err: &anyhow::Error) -> Option<&str> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<api::Error>())
        .and_then(|e| match e {
            api::Error::Client(client_error) => client_error.details.as_deref(),
            _ => None,
        })
}

fn config_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => CliConfig::default_path(),
    }
}

/// Build an authorized client for one command
fn client(cli: &Cli, activity: &str) -> Result<Wrapper> {
    let path = config_path(cli)?;
    let config = CliConfig::from_file(&path).context("Failed to load configuration")?;
    let endpoint = config.choose_endpoint(cli.endpoint.as_deref())?;

    let conf = config::client_configuration(&path, endpoint, cli.auth_token.clone(), activity);
    Wrapper::new(conf).context("Failed to create API client")
}

/// Use the given cluster ID or fall back to the only cluster the user has
async fn resolve_cluster(client: &Wrapper, cluster: Option<&str>) -> Result<String> {
    if let Some(id) = cluster.filter(|c| !c.is_empty()) {
        return Ok(id.to_string());
    }

    match client.get_default_cluster(None).await? {
        Some(id) => {
            info!("Using default cluster {}", id);
            Ok(id)
        }
        None => bail!("No cluster ID given and no default cluster could be determined"),
    }
}

async fn login(cli: &Cli, email: &str, password: &str) -> Result<()> {
    let path = config_path(cli)?;
    let mut config = CliConfig::from_file(&path).context("Failed to load configuration")?;
    let endpoint = config.choose_endpoint(cli.endpoint.as_deref())?;

    // No Authorization header on login
    let conf = Configuration::new(endpoint.clone())
        .with_timeout(CLI_TIMEOUT)
        .with_activity_name("login")
        .with_tls(TlsSettings::from_env());
    let client = Wrapper::new(conf).context("Failed to create API client")?;

    let response = client
        .create_auth_token(email, password, None)
        .await
        .context("Login failed")?;

    config.endpoint = Some(endpoint.clone());
    config.email = Some(email.to_string());
    config.token = Some(response.auth_token);
    config.save(&path)?;

    info!("Logged in as {} at {}", email, endpoint);
    Ok(())
}

async fn logout(cli: &Cli) -> Result<()> {
    let path = config_path(cli)?;
    let config = CliConfig::from_file(&path).context("Failed to load configuration")?;
    if cli.auth_token.is_none() && config.token.is_none() {
        info!("Not logged in");
        return Ok(());
    }

    let client = client(cli, "logout")?;
    revoke_token(&client, &path, cli.auth_token.as_deref()).await?;

    info!("Logged out");
    Ok(())
}

/// Delete a token on the server. The stored token is forgotten only when it
/// is the one that was deleted.
async fn revoke_token(client: &Wrapper, config_path: &Path, explicit_token: Option<&str>) -> Result<()> {
    let mut config = CliConfig::from_file(config_path).context("Failed to load configuration")?;
    let Some(token) = explicit_token
        .map(str::to_string)
        .or_else(|| config.token.clone())
    else {
        return Ok(());
    };

    match client.delete_auth_token(&token, None).await {
        Ok(_) => {}
        // An expired token is as good as a deleted one
        Err(api::Error::Client(e)) if e.status_code == Some(401) => {
            warn!("Token was already invalid");
        }
        Err(e) => return Err(e).context("Logout failed"),
    }

    if config.token.as_deref() == Some(token.as_str()) {
        config.token = None;
        config.save(config_path)?;
    }
    Ok(())
}

async fn show_info(cli: &Cli) -> Result<()> {
    let client = client(cli, "info")?;
    let info = client.get_info(None).await?;
    output::print(&info, cli.output)
}

async fn list(cli: &Cli, resource: &ListCommand) -> Result<()> {
    match resource {
        ListCommand::Clusters => {
            let client = client(cli, "list-clusters")?;
            let mut clusters = client.get_clusters(None).await?;
            clusters.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
            output::print(&clusters, cli.output)
        }
        ListCommand::Releases => {
            let client = client(cli, "list-releases")?;
            let releases = client.get_releases(None).await?;
            output::print(&releases, cli.output)
        }
        ListCommand::Organizations => {
            let client = client(cli, "list-organizations")?;
            let mut organizations = client.get_organizations(None).await?;
            organizations.sort_by(|a, b| a.id.cmp(&b.id));
            output::print(&organizations, cli.output)
        }
        ListCommand::Nodepools { cluster } => {
            let client = client(cli, "list-nodepools")?;
            let cluster_id = resolve_cluster(&client, cluster.as_deref()).await?;
            let mut node_pools = client.get_node_pools(&cluster_id, None).await?;
            node_pools.sort_by(|a, b| a.name.cmp(&b.name));
            output::print(&node_pools, cli.output)
        }
        ListCommand::Keypairs { cluster } => {
            let client = client(cli, "list-keypairs")?;
            let cluster_id = resolve_cluster(&client, cluster.as_deref()).await?;
            let key_pairs = client.get_key_pairs(&cluster_id, None).await?;
            output::print(&key_pairs, cli.output)
        }
    }
}

async fn show(cli: &Cli, resource: &ShowCommand) -> Result<()> {
    match resource {
        ShowCommand::Cluster { cluster } => {
            let client = client(cli, "show-cluster")?;
            let cluster_id = resolve_cluster(&client, cluster.as_deref()).await?;

            // Node pool clusters live under v5; everything else is v4
            match client.get_cluster_v5(&cluster_id, None).await {
                Ok(details) => output::print(&details, cli.output),
                Err(api::Error::Client(e)) if e.is_not_found() => {
                    let details = client.get_cluster_v4(&cluster_id, None).await?;
                    output::print(&details, cli.output)
                }
                Err(e) => Err(e.into()),
            }
        }
        ShowCommand::Nodepool { cluster, nodepool } => {
            let client = client(cli, "show-nodepool")?;
            let node_pool = client.get_node_pool(cluster, nodepool, None).await?;
            output::print(&node_pool, cli.output)
        }
        ShowCommand::Credential {
            organization,
            credential,
        } => {
            let client = client(cli, "show-credential")?;
            let credential = client
                .get_credential(organization, credential, None)
                .await?;
            output::print(&credential, cli.output)
        }
    }
}

#[derive(Debug, Serialize)]
struct StatusSummary {
    cluster_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    phase: Option<String>,
    nodes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    desired_capacity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

async fn show_status(cli: &Cli, cluster: Option<&str>) -> Result<()> {
    let client = client(cli, "cluster-status")?;
    let cluster_id = resolve_cluster(&client, cluster).await?;
    let status = client.get_cluster_status(&cluster_id, None).await?;

    let summary = StatusSummary {
        phase: status.phase().map(str::to_string),
        nodes: status.node_count(),
        desired_capacity: status.cluster.as_ref().map(|c| c.scaling.desired_capacity),
        version: status.current_version().map(str::to_string),
        cluster_id,
    };
    output::print(&summary, cli.output)
}

#[derive(Debug, Default, Serialize)]
struct CreatedCluster {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    node_pools: Vec<String>,
}

async fn create(cli: &Cli, resource: &CreateCommand) -> Result<()> {
    match resource {
        CreateCommand::Cluster {
            file,
            owner,
            name,
            release,
        } => {
            let mut definition = match file {
                Some(path) => definition::read_definition_from_file(path)?,
                None => ClusterDefinition::V4(ClusterDefinitionV4 {
                    name: name.clone().unwrap_or_default(),
                    release_version: release.clone().unwrap_or_default(),
                    ..Default::default()
                }),
            };
            if let Some(owner) = owner {
                definition.set_owner(owner.as_str());
            }
            if definition.owner().is_empty() {
                bail!("No owner organization given. Pass --owner or set 'owner' in the definition");
            }

            let client = client(cli, "create-cluster")?;
            let created = create_cluster(&client, &definition).await?;
            output::print(&created, cli.output)
        }
        CreateCommand::Keypair {
            cluster,
            description,
            ttl_hours,
            cn_prefix,
            certificate_organizations,
        } => {
            let client = client(cli, "create-keypair")?;
            let cluster_id = resolve_cluster(&client, cluster.as_deref()).await?;
            let request = AddKeyPairRequest {
                description: description.clone(),
                ttl_hours: *ttl_hours,
                cn_prefix: cn_prefix.clone(),
                certificate_organizations: certificate_organizations.clone(),
            };
            let key_pair = client.create_key_pair(&cluster_id, &request, None).await?;
            info!("Key pair {} created for cluster {}", key_pair.id, cluster_id);
            output::print(&key_pair, cli.output)
        }
        CreateCommand::Nodepool {
            cluster,
            name,
            min,
            max,
            num_availability_zones,
            availability_zones,
            instance_type,
        } => {
            let definition = NodePoolDefinition {
                name: name.clone(),
                availability_zones: (num_availability_zones.is_some()
                    || !availability_zones.is_empty())
                .then(|| AvailabilityZonesDefinition {
                    number: num_availability_zones.unwrap_or_default(),
                    zones: availability_zones.clone(),
                }),
                scaling: Some(ScalingDefinition {
                    min: *min,
                    max: *max,
                }),
                node_spec: instance_type.as_ref().map(|t| NodeSpec {
                    aws: Some(AwsSpecificDefinition {
                        instance_type: t.clone(),
                    }),
                }),
            };
            definition.validate()?;

            let client = client(cli, "create-nodepool")?;
            let node_pool = client
                .create_node_pool(cluster, &definition.to_add_node_pool_request(), None)
                .await?;
            info!("Node pool {} added to cluster {}", node_pool.id, cluster);
            output::print(&node_pool, cli.output)
        }
    }
}

/// Create a cluster, and for v5 definitions each of its node pools
async fn create_cluster(client: &Wrapper, definition: &ClusterDefinition) -> Result<CreatedCluster> {
    match definition {
        ClusterDefinition::V4(def) => {
            let created = client
                .create_cluster(&def.to_add_cluster_request(), None)
                .await?;
            if let Some(id) = &created.id {
                info!("Cluster {} is being created", id);
            }
            Ok(CreatedCluster {
                id: created.id,
                ..Default::default()
            })
        }
        ClusterDefinition::V5(def) => {
            let cluster = client
                .create_cluster_v5(&def.to_add_cluster_request(), None)
                .await?;
            info!("Cluster {} is being created", cluster.id);

            let mut node_pools = Vec::with_capacity(def.nodepools.len());
            for node_pool in &def.nodepools {
                let aux = client
                    .default_auxiliary_params()
                    .with_activity("create-cluster-nodepool")
                    .with_timeout(NODE_POOL_TIMEOUT);
                let created = client
                    .create_node_pool(&cluster.id, &node_pool.to_add_node_pool_request(), Some(&aux))
                    .await
                    .with_context(|| {
                        format!("Cluster {} created, but adding a node pool failed", cluster.id)
                    })?;
                info!("Node pool {} ({}) added", created.id, created.name);
                node_pools.push(created.id);
            }

            Ok(CreatedCluster {
                id: Some(cluster.id),
                node_pools,
            })
        }
    }
}

async fn update(cli: &Cli, resource: &UpdateCommand) -> Result<()> {
    match resource {
        UpdateCommand::Cluster {
            cluster,
            name,
            release,
            workers_min,
            workers_max,
        } => {
            let scaling = (workers_min.is_some() || workers_max.is_some()).then_some(Scaling {
                min: *workers_min,
                max: *workers_max,
            });
            if let (Some(min), Some(max)) = (workers_min, workers_max) {
                if min > max {
                    bail!("--workers-min ({}) must not exceed --workers-max ({})", min, max);
                }
            }
            let request = ModifyClusterRequest {
                name: name.clone(),
                owner: None,
                release_version: release.clone(),
                scaling,
            };
            if request == ModifyClusterRequest::default() {
                bail!("Nothing to update. Pass --name, --release, --workers-min or --workers-max");
            }

            let client = client(cli, "update-cluster")?;
            let details = client.modify_cluster(cluster, &request, None).await?;
            info!("Cluster {} updated", cluster);
            output::print(&details, cli.output)
        }
        UpdateCommand::Credentials {
            organization,
            aws_admin_role,
            aws_operator_role,
        } => {
            let request = AddCredentialsRequest {
                provider: "aws".to_string(),
                aws: Some(AwsCredential {
                    roles: AwsRoles {
                        admin: aws_admin_role.clone(),
                        awsoperator: aws_operator_role.clone(),
                    },
                }),
                azure: None,
            };

            let client = client(cli, "update-credentials")?;
            let created = client.set_credentials(organization, &request, None).await?;
            if let Some(id) = &created.id {
                info!("Credentials {} set for organization {}", id, organization);
            }
            output::print(&created, cli.output)
        }
    }
}

async fn delete(cli: &Cli, resource: &DeleteCommand) -> Result<()> {
    match resource {
        DeleteCommand::Cluster { cluster } => {
            let client = client(cli, "delete-cluster")?;
            client.delete_cluster(cluster, None).await?;
            info!("Cluster {} will be deleted", cluster);
            Ok(())
        }
        DeleteCommand::Nodepool { cluster, nodepool } => {
            let client = client(cli, "delete-nodepool")?;
            client.delete_node_pool(cluster, nodepool, None).await?;
            info!("Node pool {} of cluster {} will be deleted", nodepool, cluster);
            Ok(())
        }
    }
}
