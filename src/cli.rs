use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cdist")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Converge hosts from manifests and type scripts over ssh", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only report errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Configure hosts, skipping objects of install types
    Config(RunArgs),

    /// Configure hosts, including objects of install types
    Install(RunArgs),

    /// Declare an object from a manifest (invoked through the type shims)
    #[command(hide = true)]
    Emulator {
        /// Type name, e.g. `__file`
        type_name: String,

        /// Object id and parameters
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Configuration directory, may be given more than once
    #[arg(short = 'c', long = "conf-dir", value_name = "DIR")]
    pub conf_dirs: Vec<PathBuf>,

    /// Initial manifest (default: conf/manifest/init)
    #[arg(short = 'i', long = "initial-manifest", value_name = "MANIFEST")]
    pub initial_manifest: Option<PathBuf>,

    /// Worker threads per host for object passes
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Hosts configured in parallel
    #[arg(short, long, value_name = "N")]
    pub parallel: Option<usize>,

    /// Generate code without executing it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Archive directory transfers: none, tar or tgz
    #[arg(long, value_name = "MODE")]
    pub archiving: Option<String>,

    /// Command used to run scripts on the target
    #[arg(long, value_name = "CMD")]
    pub remote_exec: Option<String>,

    /// Command used to copy files to the target
    #[arg(long, value_name = "CMD")]
    pub remote_copy: Option<String>,

    /// Working directory on the target
    #[arg(long, value_name = "DIR")]
    pub remote_out_path: Option<PathBuf>,

    /// Local working directory root (default: a temporary directory)
    #[arg(long, value_name = "DIR")]
    pub out_path: Option<PathBuf>,

    /// Hosts to configure
    #[arg(required = true, value_name = "HOST")]
    pub hosts: Vec<String>,
}
