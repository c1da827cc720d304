//! Definitions of CLI arguments and commands for deploy scripts

use std::{path::PathBuf, str::FromStr};

use alloy::primitives::{Address, U256};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::{
    chain::Chain,
    config::{ConfigArgs, ConfigKey, DeployConfig},
    constants::OUTPUT_KEY_SUFFIX,
    errors::ScriptError,
    orchestrator::Orchestrator,
    plan::{BuiltinPlan, Plan},
    types::{ArgValue, InitArg},
    utils::write_deployments,
};

/// Deploy contract modules and wire them into the address book
#[derive(Parser)]
pub struct Cli {
    /// Private key of the deployer
    #[arg(short, long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub priv_key: String,

    /// Network RPC URL
    #[arg(short, long, env = "RPC_URL")]
    pub rpc_url: String,

    /// Addresses and paths the plans read
    #[command(flatten)]
    pub config: ConfigArgs,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// The available commands
#[derive(Subcommand)]
pub enum Command {
    /// Run a deployment plan
    Deploy(DeployArgs),
    /// Upgrade the implementation behind a registered proxy
    Upgrade(UpgradeArgs),
    /// Print the address registered under a name
    Lookup(LookupArgs),
    /// Register an address under a name
    Register(RegisterArgs),
}

impl Command {
    /// Check the command's inputs before connecting to the chain
    pub fn check(&self, config: &DeployConfig) -> Result<(), ScriptError> {
        match self {
            Command::Deploy(args) => args.plan()?.preflight(config),
            Command::Upgrade(_) | Command::Lookup(_) | Command::Register(_) => {
                config.require(ConfigKey::RegistryAddress).map(|_| ())
            }
        }
    }

    /// Run the command against the given chain
    pub async fn run(self, chain: &impl Chain, config: &DeployConfig) -> Result<(), ScriptError> {
        let orchestrator = Orchestrator::new(chain, config);
        match self {
            Command::Deploy(args) => {
                let plan = args.plan()?;
                let record = orchestrator.run(&plan).await?;
                info!(deployed = record.len(), "deployment complete");

                if let Some(path) = args.deployments_path {
                    write_deployments(&path, &record)?;
                }
                Ok(())
            }
            Command::Upgrade(args) => {
                let registry = orchestrator.existing_registry()?;
                let call = args.call.as_deref();
                let deployment = orchestrator
                    .upgrade(registry, &args.name, &args.artifact, call, &args.args)
                    .await?;
                println!(
                    "{} implementation deployed to: {}",
                    args.artifact, deployment.implementation
                );
                Ok(())
            }
            Command::Lookup(args) => {
                let registry = orchestrator.existing_registry()?;
                let address = orchestrator.lookup(registry, &args.name).await?;
                println!("{}", entry_line(&args.name, address));
                Ok(())
            }
            Command::Register(args) => {
                let registry = orchestrator.existing_registry()?;
                orchestrator.register(registry, &args.name, args.address).await?;
                println!("{}", entry_line(&args.name, args.address));
                Ok(())
            }
        }
    }
}

/// The `NAME=address` line printed for a registry entry
fn entry_line(name: &str, address: Address) -> String {
    format!("{}{}={}", name.to_uppercase(), OUTPUT_KEY_SUFFIX, address)
}

/// Run a deployment plan.
///
/// Each module is deployed (behind a
/// [`TransparentUpgradeableProxy`](https://docs.openzeppelin.com/contracts/5.x/api/proxy#transparent_proxy)
/// unless it is plain), handed the address book through `setAddressBook`, and
/// registered in the address book under its name.
#[derive(Args)]
pub struct DeployArgs {
    /// The built-in plan to run
    #[arg(short, long, required_unless_present = "plan_file", conflicts_with = "plan_file")]
    pub plan: Option<BuiltinPlan>,

    /// Path to a JSON plan to run instead of a built-in one
    #[arg(long)]
    pub plan_file: Option<PathBuf>,

    /// Path to a JSON file into which the deployed addresses are merged
    #[arg(short, long)]
    pub deployments_path: Option<PathBuf>,
}

impl DeployArgs {
    /// The plan selected by the arguments
    fn plan(&self) -> Result<Plan, ScriptError> {
        match (&self.plan, &self.plan_file) {
            (Some(builtin), _) => Ok(builtin.plan()),
            (None, Some(path)) => Plan::from_file(path),
            (None, None) => Err(ScriptError::InvalidPlan("no plan given".to_string())),
        }
    }
}

/// Upgrade the implementation behind a registered proxy
#[derive(Args)]
pub struct UpgradeArgs {
    /// Registry name of the proxy to upgrade
    #[arg(short, long)]
    pub name: String,

    /// Artifact of the new implementation contract
    #[arg(short, long)]
    pub artifact: String,

    /// Optional function to call through the proxy once upgraded
    #[arg(short, long)]
    pub call: Option<String>,

    /// Arguments of the upgrade call, as `address:0x…`, `string:…`,
    /// `uint256:…`, `bool:…`, `lookup:<name>` or `config:<key>`
    #[arg(long = "arg", requires = "call", value_parser = parse_init_arg)]
    pub args: Vec<InitArg>,
}

/// Print the address registered under a name
#[derive(Args)]
pub struct LookupArgs {
    /// The registry name
    #[arg(short, long)]
    pub name: String,
}

/// Register an address under a name
#[derive(Args)]
pub struct RegisterArgs {
    /// The registry name
    #[arg(short, long)]
    pub name: String,

    /// The address to register
    #[arg(short, long)]
    pub address: Address,
}

/// Parse a typed `<type>:<value>` argument
pub fn parse_init_arg(s: &str) -> Result<InitArg, String> {
    let (ty, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected `<type>:<value>`, got `{}`", s))?;

    match ty {
        "address" => Address::from_str(value)
            .map(InitArg::address)
            .map_err(|e| e.to_string()),
        "string" => Ok(InitArg::string(value)),
        "uint256" => U256::from_str(value)
            .map(|n| InitArg::Literal(ArgValue::Uint(n)))
            .map_err(|e| e.to_string()),
        "bool" => bool::from_str(value)
            .map(|b| InitArg::Literal(ArgValue::Bool(b)))
            .map_err(|e| e.to_string()),
        "lookup" => Ok(InitArg::lookup(value)),
        "config" => {
            serde_json::from_value::<ConfigKey>(serde_json::Value::String(value.to_string()))
                .map(InitArg::Config)
                .map_err(|e| e.to_string())
        }
        other => Err(format!("unknown argument type `{}`", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn typed_arguments_parse() {
        assert_eq!(parse_init_arg("lookup:token"), Ok(InitArg::lookup("token")));
        assert_eq!(parse_init_arg("uint256:1000000"), Ok(InitArg::uint(1_000_000)));
        assert_eq!(parse_init_arg("string:USD Coin"), Ok(InitArg::string("USD Coin")));
        assert_eq!(
            parse_init_arg("config:routerAddress"),
            Ok(InitArg::Config(ConfigKey::RouterAddress))
        );
        assert!(parse_init_arg("address:0x12").is_err());
        assert!(parse_init_arg("token").is_err());
        assert!(parse_init_arg("int8:1").is_err());
    }

    #[test]
    fn deploy_accepts_a_builtin_plan() {
        let cli = Cli::try_parse_from([
            "deploy",
            "--priv-key",
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
            "--rpc-url",
            "http://127.0.0.1:8545",
            "deploy",
            "--plan",
            "add-liquidity",
        ])
        .unwrap();

        match cli.command {
            Command::Deploy(args) => assert_eq!(args.plan, Some(BuiltinPlan::AddLiquidity)),
            _ => panic!("expected the deploy command"),
        }
    }

    fn parse(args: &[&str]) -> Cli {
        let base = [
            "deploy",
            "--priv-key",
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
            "--rpc-url",
            "http://127.0.0.1:8545",
        ];
        Cli::try_parse_from(base.iter().chain(args).copied()).unwrap()
    }

    #[test]
    fn missing_plan_file_fails_before_connecting() {
        let cli = parse(&["deploy", "--plan-file", "/nonexistent/plan.json"]);
        let err = cli.command.check(&DeployConfig::default()).unwrap_err();
        assert!(matches!(err, ScriptError::InvalidPlan(_)));
    }

    #[test]
    fn registry_commands_need_an_address_book() {
        let cli = parse(&["lookup", "--name", "router"]);
        let err = cli.command.check(&DeployConfig::default()).unwrap_err();
        assert!(matches!(err, ScriptError::Config(_)));

        let config = DeployConfig {
            registry_address: Some(Address::repeat_byte(0x01)),
            ..Default::default()
        };
        cli.command.check(&config).unwrap();
    }

    #[test]
    fn entry_line_matches_bulk_output() {
        let address = Address::repeat_byte(0xaa);
        assert_eq!(entry_line("router", address), format!("ROUTER_ADDRESS={}", address));
    }
}
