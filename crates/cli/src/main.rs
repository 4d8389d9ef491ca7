use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use flotilla_core::features::FEATURE_GATES_ENV;
use flotilla_core::request::{display_group_version, parse_group_version};
use flotilla_core::{DaemonSet, FeatureGates, FieldError, RequestContext};
use flotilla_federation::{
    cluster_operations, DaemonSetAdapter, FederatedOperation, FederatedTypeAdapter, SecretAdapter, StaticAccessor,
};
use flotilla_registry::strategy::served_group_versions;
use flotilla_registry::{
    DaemonSetStatusStrategy, DaemonSetStrategy, ImmutabilityPolicy, RestStrategy, StandardRules,
};
use kube::ResourceExt;
use metrics::counter;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

mod input;

use input::{read_yaml, ClusterEntry};

#[derive(Parser, Debug)]
#[command(name = "flotillactl", version, about = "DaemonSet admission and federation planning")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Feature gates, e.g. "PodPriority=true,LocalStorageCapacityIsolation=false"
    #[arg(long = "feature-gates", global = true, env = FEATURE_GATES_ENV)]
    feature_gates: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Human,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Kind {
    Secret,
    Daemonset,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Normalize and validate a DaemonSet as if it were being created
    Create {
        /// DaemonSet manifest
        #[arg(short = 'f', long = "filename")]
        file: PathBuf,
    },
    /// Normalize and validate an update of a stored DaemonSet
    Update {
        /// Stored object
        #[arg(long = "old")]
        old: PathBuf,
        /// Incoming object
        #[arg(long = "new")]
        new: PathBuf,
        /// group/version the request arrived under; omitted means an internal caller
        #[arg(long = "api-version")]
        api_version: Option<String>,
        /// Go through the status subresource instead of the main path
        #[arg(long = "status", action = ArgAction::SetTrue)]
        status: bool,
    },
    /// Compute per-cluster operations for a desired object
    Plan {
        #[arg(long = "kind", value_enum)]
        kind: Kind,
        /// Desired object
        #[arg(long = "desired")]
        desired: PathBuf,
        /// Cluster list: name, ready, optional observed object
        #[arg(long = "clusters")]
        clusters: PathBuf,
        /// Object key; defaults to namespace/name of the desired object
        #[arg(long = "key")]
        key: Option<String>,
    },
}

fn init_tracing() {
    let env = std::env::var("FLOTILLA_LOG").unwrap_or_else(|_| "info".to_string());
    let filter =
        tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("FLOTILLA_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            warn!(addr = %addr, "invalid FLOTILLA_METRICS_ADDR; expected host:port");
        }
    }
}

fn feature_gates(raw: Option<&str>) -> Result<FeatureGates> {
    match raw {
        Some(s) if !s.trim().is_empty() => FeatureGates::from_str(s).context("parsing feature gates"),
        _ => Ok(FeatureGates::default()),
    }
}

fn strategy(gates: FeatureGates) -> Result<Arc<DaemonSetStrategy>> {
    let s = DaemonSetStrategy::new(
        Arc::new(gates),
        Arc::new(StandardRules),
        ImmutabilityPolicy::daemonset(),
        &served_group_versions(),
    )
    .context("building daemonset strategy")?;
    Ok(Arc::new(s))
}

#[derive(Serialize)]
struct AdmissionReport<'a> {
    object: &'a DaemonSet,
    errors: &'a [FieldError],
}

fn print_admission(output: Output, object: &DaemonSet, errors: &[FieldError]) -> Result<()> {
    match output {
        Output::Human => {
            print!("{}", serde_yaml::to_string(object)?);
            if errors.is_empty() {
                eprintln!("{}: valid", object.key());
            }
            for e in errors {
                eprintln!("error: {}", e);
            }
        }
        Output::Json => {
            println!("{}", serde_json::to_string_pretty(&AdmissionReport { object, errors })?);
        }
    }
    Ok(())
}

fn run_create(cli_output: Output, strategy: &DaemonSetStrategy, file: &Path) -> Result<bool> {
    let mut obj: DaemonSet = read_yaml(file)?;
    let ctx = RequestContext::internal().with_namespace(obj.metadata.namespace.as_deref().unwrap_or_default());
    strategy.prepare_for_create(&ctx, &mut obj);
    let errors = strategy.validate(&ctx, &obj);
    if errors.is_empty() {
        strategy.canonicalize(&mut obj);
    }
    info!(key = %obj.key(), errors = errors.len(), "create evaluated");
    print_admission(cli_output, &obj, &errors)?;
    Ok(errors.is_empty())
}

fn run_update(
    cli_output: Output,
    base: Arc<DaemonSetStrategy>,
    old: &Path,
    new: &Path,
    api_version: Option<&str>,
    status: bool,
) -> Result<bool> {
    let mut ctx = RequestContext::internal();
    if let Some(raw) = api_version {
        let gv = parse_group_version(raw).with_context(|| format!("invalid --api-version {raw:?}, expected group/version"))?;
        // the policy table panics on versions it has no rule for
        if base.policy().rule_for(&gv).is_none() {
            bail!("daemonsets are not served under {}", display_group_version(&gv));
        }
        ctx = RequestContext::for_group_version(&gv);
    }

    let mut old_obj: DaemonSet = read_yaml(old)?;
    let mut new_obj: DaemonSet = read_yaml(new)?;
    if let Some(ns) = old_obj.metadata.namespace.as_deref() {
        ctx = ctx.with_namespace(ns);
    }

    let strategy: Arc<dyn RestStrategy<DaemonSet>> =
        if status { Arc::new(DaemonSetStatusStrategy::new(base)) } else { base };
    strategy.prepare_for_update(&ctx, &mut new_obj, &mut old_obj);
    let errors = strategy.validate_update(&ctx, &new_obj, &old_obj);
    if errors.is_empty() {
        strategy.canonicalize(&mut new_obj);
    }
    info!(
        key = %new_obj.key(),
        status,
        generation = new_obj.generation(),
        template_generation = new_obj.spec.template_generation,
        errors = errors.len(),
        "update evaluated"
    );
    print_admission(cli_output, &new_obj, &errors)?;
    Ok(errors.is_empty())
}

async fn run_plan<A>(output: Output, adapter: A, desired: &Path, clusters: &Path, key: Option<String>) -> Result<()>
where
    A: FederatedTypeAdapter,
    A::Object: DeserializeOwned + Serialize,
{
    let desired: A::Object = read_yaml(desired)?;
    let entries: Vec<ClusterEntry> = read_yaml(clusters)?;
    let key = key.unwrap_or_else(|| match desired.namespace() {
        Some(ns) => format!("{}/{}", ns, desired.name_any()),
        None => desired.name_any(),
    });

    let mut accessor = StaticAccessor::new();
    let mut members = Vec::with_capacity(entries.len());
    for entry in &entries {
        if let Some(obj) = entry.observed_as::<A::Object>()? {
            accessor.insert(&entry.name, &key, obj);
        }
        members.push(entry.cluster());
    }

    let ops = cluster_operations(&adapter, &members, &desired, &key, &accessor).await?;
    info!(kind = adapter.kind(), key = %key, clusters = members.len(), operations = ops.len(), "plan computed");
    print_plan(output, &ops)
}

fn print_plan<T: Serialize>(output: Output, ops: &[FederatedOperation<T>]) -> Result<()> {
    match output {
        Output::Human => {
            if ops.is_empty() {
                println!("all ready clusters are in sync");
            }
            for op in ops {
                println!("{:<7} {:<20} {}", op.op_type.as_str().to_uppercase(), op.cluster_name, op.key);
            }
        }
        Output::Json => println!("{}", serde_json::to_string_pretty(ops)?),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let gates = feature_gates(cli.feature_gates.as_deref())?;
    info!(feature_gates = %gates, "starting");

    let ok = match cli.command {
        Commands::Create { file } => {
            counter!("flotillactl_commands_total", 1u64, "command" => "create");
            run_create(cli.output, &*strategy(gates)?, &file)?
        }
        Commands::Update { old, new, api_version, status } => {
            counter!("flotillactl_commands_total", 1u64, "command" => "update");
            run_update(cli.output, strategy(gates)?, &old, &new, api_version.as_deref(), status)?
        }
        Commands::Plan { kind, desired, clusters, key } => {
            counter!("flotillactl_commands_total", 1u64, "command" => "plan");
            match kind {
                Kind::Secret => run_plan(cli.output, SecretAdapter, &desired, &clusters, key).await?,
                Kind::Daemonset => run_plan(cli.output, DaemonSetAdapter, &desired, &clusters, key).await?,
            }
            true
        }
    };
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
