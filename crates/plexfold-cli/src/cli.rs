use clap::Parser;
use std::path::PathBuf;

const ABOUT: &str = "plexfold - combinatorial assembly of large protein complexes \
from pairwise rigid-body predictions.";
const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(version, about = ABOUT, help_template = HELP_TEMPLATE)]
pub struct Cli {
    /// Path to the chain list: one subunit coordinate file per chain slot,
    /// in global slot order, with an optional group tag.
    pub chain_list: PathBuf,

    /// Prefix of the per-pair transform files (`<prefix><A>_plus_<B>`).
    pub trans_files_prefix: String,

    /// Number of top-scoring transforms considered per subunit pair.
    pub trans_num_per_pair: usize,

    /// Global number of assemblies retained per size band.
    pub best_k: usize,

    /// Path to the distance restraints file (may be empty).
    pub restraints_file: PathBuf,

    /// Minimum allowed pair clearance in Å; negative tolerates that much
    /// atom-sphere overlap.
    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true, value_name = "FLOAT")]
    pub penetration_thr: f64,

    /// Maximum violated-weight ratio over decided restraints.
    #[arg(long, default_value_t = 0.10, value_name = "FLOAT")]
    pub restraints_ratio: f64,

    /// Whole-complex RMSD radius for final clustering, in Å.
    #[arg(long, default_value_t = 5.0, value_name = "FLOAT")]
    pub cluster_rmsd: f64,

    /// Maximum fraction of a chain's atoms allowed in backbone collision.
    #[arg(long, default_value_t = 0.10, value_name = "FLOAT")]
    pub max_backbone_collision_per_chain: f64,

    /// Confidence floor below which atoms are not collidable.
    #[arg(long, default_value_t = 0.0, value_name = "FLOAT")]
    pub min_temperature_to_consider_collision: f64,

    /// Assemblies retained per identity (defaults to best-K).
    #[arg(long, value_name = "INT")]
    pub max_result_per_res_set: Option<usize>,

    /// Prefix of the output files (`<prefix>.res`,
    /// `<prefix>_clustered.res`, `<prefix>.log`).
    #[arg(long, default_value = "output", value_name = "PREFIX")]
    pub output_prefix: String,

    /// Wall-clock budget in seconds; on expiry the partial best is written.
    #[arg(long, value_name = "SECONDS")]
    pub timeout_seconds: Option<u64>,

    /// Path to the static algorithm configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to this file instead of `<output-prefix>.log`
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel composition.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, value_name = "NUM")]
    pub threads: Option<usize>,
}

impl Cli {
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.log", self.output_prefix)))
    }
}
