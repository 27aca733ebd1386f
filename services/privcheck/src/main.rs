// privcheck CLI: evaluates has-privileges requests against a role file.
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use privcheck::app::AppState;
use privcheck::config::PrivcheckConfig;
use privcheck::observability;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use warden_authz::{HasPrivilegesRequest, PrivilegeScope};

#[derive(Parser, Debug)]
#[command(name = "privcheck")]
#[command(about = "Evaluate Warden has-privileges requests against a role file")]
struct Cli {
    /// Role file (overrides WARDEN_ROLES_FILE)
    #[arg(long, global = true)]
    roles: Option<PathBuf>,

    /// Privilege table (overrides WARDEN_PRIVILEGES_FILE)
    #[arg(long, global = true)]
    privileges: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a JSON request and print the JSON response
    Check(CheckArgs),
    /// Load the privilege table and role file and report what was found
    Validate,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Request file, or `-` for stdin
    #[arg(long, default_value = "-")]
    request: String,

    /// Role resolution deadline in milliseconds (0 keeps the configured value)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print the Prometheus metrics snapshot to stderr when done
    #[arg(long)]
    print_metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let metrics_handle = observability::init_observability("privcheck")?;

    let mut config = PrivcheckConfig::from_env_or_yaml().context("privcheck config")?;
    if let Some(path) = cli.roles {
        config.roles_file = path;
    }
    if let Some(path) = cli.privileges {
        config.privileges_file = Some(path);
    }

    match cli.command {
        Command::Check(args) => {
            if let Some(millis) = args.timeout_ms
                && millis > 0
            {
                config.resolve_timeout = Duration::from_millis(millis);
            }
            let state = AppState::from_config(&config).await?;
            let request = read_request(&args.request)?;
            let response = state.check(&request).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&response).context("encode response")?
            );
            if args.print_metrics {
                eprintln!("{}", metrics_handle.render());
            }
        }
        Command::Validate => {
            let state = AppState::from_config(&config).await?;
            let roles = state.roles.role_names().await;
            tracing::info!(
                cluster_privileges = state.registry.names(PrivilegeScope::Cluster).count(),
                index_privileges = state.registry.names(PrivilegeScope::Index).count(),
                roles = roles.len(),
                path = %state.roles.path().display(),
                "configuration valid"
            );
            for role in roles {
                println!("{role}");
            }
        }
    }
    Ok(())
}

fn read_request(source: &str) -> Result<HasPrivilegesRequest> {
    let contents = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("read request file: {source}"))?
    };
    serde_json::from_str(&contents).context("parse has-privileges request")
}
