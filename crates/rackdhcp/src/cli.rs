//! Clap derive structures for the `rackdhcp` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// rackdhcp -- synthesize and push rack controller DHCP configuration
#[derive(Debug, Parser)]
#[command(
    name = "rackdhcp",
    version,
    about = "Synthesize, validate and apply DHCP configuration for rack controllers",
    long_about = "Builds the per-rack DHCP documents (failover peers, shared networks,\n\
        host reservations, snippets) from a network inventory, and pushes or\n\
        validates them against the rack controllers' DHCP services.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Inventory document (YAML, or JSON by extension)
    #[arg(long, short = 'i', env = "RACKDHCP_INVENTORY", global = true)]
    pub inventory: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "RACKDHCP_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Per-call rack timeout in seconds (overrides config)
    #[arg(long, env = "RACKDHCP_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

/// Address family selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Family {
    #[value(name = "4", alias = "v4", alias = "ipv4")]
    V4,
    #[value(name = "6", alias = "v6", alias = "ipv6")]
    V6,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the configuration a rack should run
    Render(RenderArgs),

    /// Push configuration to a rack and report service health
    Apply(ApplyArgs),

    /// Check a snippet or a rack's configuration with the rack's daemon
    Validate(ValidateArgs),

    /// Address range algebra over the command line
    #[command(alias = "ip")]
    Ipset(IpsetArgs),

    /// Inspect which rack interfaces serve which VLANs
    #[command(alias = "topo")]
    Topology(TopologyArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Render / Apply / Validate ────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Rack controller hostname or id
    #[arg(long, short = 'r')]
    pub rack: String,

    /// Only show one address family
    #[arg(long, short = 'f')]
    pub family: Option<Family>,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Rack controller hostname or id
    #[arg(long, short = 'r')]
    pub rack: String,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Snippet document (YAML or JSON) to check before saving it
    #[arg(long, short = 's', conflicts_with = "rack")]
    pub snippet: Option<PathBuf>,

    /// Check the current configuration of this rack instead
    #[arg(long, short = 'r')]
    pub rack: Option<String>,
}

// ── Ipset ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct IpsetArgs {
    #[command(subcommand)]
    pub command: IpsetCommand,
}

#[derive(Debug, Args)]
pub struct IpsetInput {
    /// Bounding network or range (CIDR or START-END)
    #[arg(long, short = 'b')]
    pub bound: String,

    /// Used addresses or ranges (ADDR, START-END, optionally @purpose)
    pub ranges: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum IpsetCommand {
    /// Usage statistics with gateway and dynamic range suggestions
    Stats {
        #[command(flatten)]
        input: IpsetInput,

        /// Include the full range listing in the report
        #[arg(long = "ranges", id = "show_ranges")]
        ranges: bool,
    },

    /// Unused ranges within the bound
    Unused {
        #[command(flatten)]
        input: IpsetInput,
    },

    /// Used and unused ranges covering the whole bound
    Full {
        #[command(flatten)]
        input: IpsetInput,
    },
}

// ── Topology ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TopologyArgs {
    #[command(subcommand)]
    pub command: TopologyCommand,
}

#[derive(Debug, Subcommand)]
pub enum TopologyCommand {
    /// VLANs a rack serves, directly or through relays
    Vlans {
        /// Rack controller hostname or id
        #[arg(long, short = 'r')]
        rack: String,
    },

    /// Rack interfaces holding an address on a VLAN, best first
    Interfaces {
        /// Rack controller hostname or id
        #[arg(long, short = 'r')]
        rack: String,

        /// VLAN id
        #[arg(long)]
        vlan: u64,

        /// Address family
        #[arg(long, short = 'f', default_value = "4")]
        family: Family,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration (secrets masked)
    Show,

    /// Print the config file path
    Path,

    /// Write a default configuration file
    Init,

    /// Store a rack token in the system keyring
    SetToken {
        /// Rack controller hostname
        rack: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
