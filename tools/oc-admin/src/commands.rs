//! Subcommands and their execution against a [`ControllerService`].

use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::{json, Value};

use oc_01_network_controller::domain::{Identity, MemberUpdate, NetworkUpdate};
use oc_01_network_controller::{
    ConfigRequest, ControllerAdminApi, ControllerService, NetworkConfigApi, NetworkId, NodeAddress,
    RequestMetadata,
};

/// Top-level command groups.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage networks
    Network {
        #[command(subcommand)]
        command: NetworkCommand,
    },
    /// Manage members of a network
    Member {
        #[command(subcommand)]
        command: MemberCommand,
    },
    /// Run a configuration request without a live node
    Simulate {
        /// Network id (16 hex digits)
        network: NetworkId,
        /// Requesting node address
        member: NodeAddress,
        /// Requester public key as hex (defaults to the address bytes)
        #[arg(long)]
        public_key: Option<String>,
        /// Authorization token presented with the request
        #[arg(long)]
        token: Option<String>,
    },
}

/// Network subcommands.
#[derive(Subcommand, Debug)]
pub enum NetworkCommand {
    /// List network ids
    List,
    /// Create a network owned by this controller
    Create {
        /// Low 24 bits of the id as hex; random when omitted
        #[arg(long, value_parser = parse_suffix)]
        suffix: Option<u32>,
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Admit any node without authorization
        #[arg(long)]
        public: bool,
    },
    /// Show a network with membership counts
    Show {
        /// Network id
        network: NetworkId,
    },
    /// Apply a JSON partial update, e.g. '{"multicastLimit": 64}'
    Update {
        /// Network id
        network: NetworkId,
        /// Fields to change, as JSON
        changes: String,
    },
    /// Delete a network and all its members
    Delete {
        /// Network id
        network: NetworkId,
    },
}

/// Member subcommands.
#[derive(Subcommand, Debug)]
pub enum MemberCommand {
    /// List member addresses with their revisions
    List {
        /// Network id
        network: NetworkId,
    },
    /// Show a member record
    Show {
        /// Network id
        network: NetworkId,
        /// Member address
        member: NodeAddress,
    },
    /// Authorize a member, creating its record if needed
    Authorize {
        /// Network id
        network: NetworkId,
        /// Member address
        member: NodeAddress,
    },
    /// Deauthorize a member
    Deauthorize {
        /// Network id
        network: NetworkId,
        /// Member address
        member: NodeAddress,
    },
    /// Apply a JSON partial update, e.g. '{"activeBridge": true}'
    Update {
        /// Network id
        network: NetworkId,
        /// Member address
        member: NodeAddress,
        /// Fields to change, as JSON
        changes: String,
    },
    /// Delete a member record
    Delete {
        /// Network id
        network: NetworkId,
        /// Member address
        member: NodeAddress,
    },
}

fn parse_suffix(s: &str) -> Result<u32, String> {
    let value = u32::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|e| e.to_string())?;
    if value > 0x00ff_ffff {
        return Err(format!("suffix {:#x} exceeds 24 bits", value));
    }
    Ok(value)
}

/// Execute `command`, returning the JSON printed to stdout.
pub async fn run(service: &ControllerService, command: Command) -> Result<Value> {
    match command {
        Command::Network { command } => run_network(service, command).await,
        Command::Member { command } => run_member(service, command).await,
        Command::Simulate {
            network,
            member,
            public_key,
            token,
        } => {
            let public_key = match public_key {
                Some(key) => hex::decode(&key).context("public key is not valid hex")?,
                None => member.to_bytes().to_vec(),
            };
            let request = ConfigRequest::new(
                Identity::new(network.controller(), Vec::new()),
                Identity::new(member, public_key),
                network,
            )
            .with_metadata(RequestMetadata {
                auth_token: token,
                ..Default::default()
            });
            let (code, config) = service.resolve_network_config(request).await;
            Ok(json!({ "result": code.as_str(), "config": config }))
        }
    }
}

async fn run_network(service: &ControllerService, command: NetworkCommand) -> Result<Value> {
    let value = match command {
        NetworkCommand::List => json!(service.list_networks().await?),
        NetworkCommand::Create {
            suffix,
            name,
            public,
        } => {
            let nwid = suffix.map(|s| NetworkId::for_controller(service.controller_address(), s));
            let update = NetworkUpdate {
                name,
                private: public.then_some(false),
                ..Default::default()
            };
            json!(service.create_network(nwid, update).await?)
        }
        NetworkCommand::Show { network } => json!(service.get_network(network).await?),
        NetworkCommand::Update { network, changes } => {
            let update: NetworkUpdate =
                serde_json::from_str(&changes).context("changes are not a valid network update")?;
            json!(service.update_network(network, update).await?)
        }
        NetworkCommand::Delete { network } => {
            service.delete_network(network).await?;
            json!({ "deleted": network })
        }
    };
    Ok(value)
}

async fn run_member(service: &ControllerService, command: MemberCommand) -> Result<Value> {
    let value = match command {
        MemberCommand::List { network } => {
            let members = service.list_members(network).await?;
            let map: serde_json::Map<String, Value> = members
                .into_iter()
                .map(|(address, revision)| (address.to_string(), json!(revision)))
                .collect();
            Value::Object(map)
        }
        MemberCommand::Show { network, member } => {
            json!(service.get_member(network, member).await?)
        }
        MemberCommand::Authorize { network, member } => {
            let update = MemberUpdate {
                authorized: Some(true),
                ..Default::default()
            };
            json!(service.update_member(network, member, update).await?)
        }
        MemberCommand::Deauthorize { network, member } => {
            let update = MemberUpdate {
                authorized: Some(false),
                ..Default::default()
            };
            json!(service.update_member(network, member, update).await?)
        }
        MemberCommand::Update {
            network,
            member,
            changes,
        } => {
            let update: MemberUpdate =
                serde_json::from_str(&changes).context("changes are not a valid member update")?;
            json!(service.update_member(network, member, update).await?)
        }
        MemberCommand::Delete { network, member } => {
            service.delete_member(network, member).await?;
            json!({ "deleted": member })
        }
    };
    Ok(value)
}
