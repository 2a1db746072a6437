use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "tokenlens",
    version,
    about = "Infer the minimal CI token permissions a job actually needs"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Enable diagnostic tracing")]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mine permission reports from past successful runs of a workflow
    Mine {
        /// Workflow file name, e.g. ci.yml
        workflow: String,
        /// How many of the most recent successful runs to sample
        count: u32,
        owner: String,
        repo: String,
        branch: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Run one phase of the per-job observation lifecycle
    Observe {
        #[arg(long, help = "JSON configuration blob (falls back to TOKENLENS_CONFIG)")]
        config: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Yaml,
}
