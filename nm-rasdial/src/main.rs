// rasdial-like command line front-end

use anyhow::{Context, Result};
use clap::{error::ErrorKind, CommandFactory, Parser};
use nm_rasdial::{
    config::{self, load_config, load_config_or_default},
    helper::VpnHelper,
    nm_service::DbusNetworkService,
    privilege::RootCapability,
    types::{ActiveConnection, Config},
};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nm-rasdial")]
#[command(about = "rasdial-like VPN control for NetworkManager", long_about = None)]
struct Args {
    /// The VPN name
    vpn: Option<String>,

    /// The user to log in as (needs a password when connecting)
    user: Option<String>,

    /// The password to log in with
    password: Option<String>,

    /// Disconnect all active VPN connections
    #[arg(short, long)]
    disconnect: bool,

    /// Restart NetworkManager and check internet access
    #[arg(long)]
    restart: bool,

    /// List stored VPN profiles
    #[arg(short, long)]
    list: bool,

    /// Return as soon as the activation is requested
    #[arg(long)]
    no_wait: bool,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// What one invocation does, in priority order
#[derive(Debug, PartialEq, Eq)]
enum Action {
    Disconnect,
    Restart,
    List,
    Connect {
        vpn: String,
        user: Option<String>,
        password: Option<String>,
    },
    Show,
}

impl Args {
    /// Pick the action; credentials are only checked when connecting
    fn action(&self) -> Result<Action, clap::Error> {
        if self.disconnect {
            return Ok(Action::Disconnect);
        }
        if self.restart {
            return Ok(Action::Restart);
        }
        if self.list {
            return Ok(Action::List);
        }
        let Some(vpn) = &self.vpn else {
            return Ok(Action::Show);
        };

        if self.user.is_some() && self.password.is_none() {
            return Err(Args::command().error(
                ErrorKind::MissingRequiredArgument,
                "the user parameter requires the password parameter",
            ));
        }
        Ok(Action::Connect {
            vpn: vpn.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
        })
    }
}

/// Rewrite rasdial-style `/d` and `/disconnect` into the flag clap knows
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator,
    I::Item: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            if arg == "/d" || arg == "/disconnect" {
                OsString::from("--disconnect")
            } else {
                arg
            }
        })
        .collect()
}

/// Summary printed when no action is requested
fn format_active(connections: &[ActiveConnection]) -> String {
    if connections.is_empty() {
        return "No active vpn connection\n".to_string();
    }

    let mut out = format!(
        "Active vpn connection{}:\n",
        if connections.len() > 1 { "s" } else { "" }
    );
    for conn in connections {
        out.push_str(&conn.id);
        out.push('\n');
    }
    out.push('\n');
    out
}

fn main() -> Result<()> {
    let args = Args::parse_from(normalize_args(std::env::args_os()));
    let action = args.action().unwrap_or_else(|e| e.exit());

    // Load configuration
    let config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => load_config_or_default(config::DEFAULT_CONFIG_PATH).with_context(|| {
            format!("Failed to load config from {}", config::DEFAULT_CONFIG_PATH)
        })?,
    };

    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.general.log_level),
    )
    .init();

    // One sequential flow: a single-threaded runtime is enough
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(action, args.no_wait, config))
}

async fn async_main(action: Action, no_wait: bool, config: Config) -> Result<()> {
    let root = RootCapability::acquire()?;
    let service = DbusNetworkService::new()
        .await
        .context("Failed to reach NetworkManager")?;
    let helper = VpnHelper::new(service, config, root);

    match action {
        Action::Disconnect => {
            let count = helper.disconnect().await?;
            log::info!("Deactivated {} VPN connection(s)", count);
        }

        Action::Restart => {
            if helper.restart_network_manager().await? {
                println!("Internet reachable");
            } else {
                println!("Internet unreachable");
            }
        }

        Action::List => {
            for profile in helper.list_vpn_connections().await? {
                println!("{}", profile.id);
            }
        }

        Action::Connect {
            vpn,
            user,
            password,
        } => {
            let settled = helper
                .connect(&vpn, user.as_deref(), password.as_deref(), !no_wait)
                .await?;
            if !settled {
                eprintln!("{} is still activating", vpn);
            }
        }

        Action::Show => {
            let active = helper.get_active_vpn_connections().await?;
            print!("{}", format_active(&active));
        }
    }

    Ok(())
}
