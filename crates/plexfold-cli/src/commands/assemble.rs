use std::path::PathBuf;
use std::time::Duration;

use plexfold::core::io::{chain_list, restraint_files, results, transform_files};
use plexfold::engine::config::FoldParams;
use plexfold::engine::progress::ProgressReporter;
use plexfold::workflows::assemble;
use tracing::{info, warn};

use crate::cli::Cli;
use crate::config::load_static_params;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;

pub fn run(args: &Cli) -> Result<()> {
    let statics = load_static_params(args.config.as_deref())?;

    info!(path = %args.chain_list.display(), "Loading chain list.");
    let def = chain_list::load_chain_list(&args.chain_list)?;

    info!(prefix = %args.trans_files_prefix, "Loading transform files.");
    let library = transform_files::load_transform_library(
        &args.trans_files_prefix,
        &def,
        args.trans_num_per_pair,
    )?;

    info!(path = %args.restraints_file.display(), "Loading restraints.");
    let user_restraints = restraint_files::load_restraints(&args.restraints_file)?;

    let params = fold_params(args);

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Assembling {} chains of {} subunit type(s)...",
        def.slots.len(),
        def.subunits.len()
    );
    let report = assemble::run(&def, &library, &user_restraints, &params, &statics, &reporter)?;

    let raw_path = PathBuf::from(format!("{}.res", args.output_prefix));
    let clustered_path = PathBuf::from(format!("{}_clustered.res", args.output_prefix));

    let raw_records: Vec<_> = report.survivors.iter().map(|a| a.to_record()).collect();
    results::write_results(&raw_path, &raw_records)?;

    let clustered_records: Vec<_> = report.clustered.iter().map(|a| a.to_record()).collect();
    results::write_results(&clustered_path, &clustered_records)?;

    info!(
        survivors = report.survivors.len(),
        clusters = report.clustered.len(),
        attempted = report.stats.attempted,
        accepted = report.stats.accepted,
        rejected = report.stats.rejected(),
        "Run complete."
    );

    if report.timed_out {
        warn!("Search timed out; results hold the partial best found so far.");
        println!("Warning: search timed out; wrote the partial best found so far.");
    }

    if report.clustered.is_empty() {
        println!("No assemblies to report.");
    } else {
        println!(
            "✓ Top assembly (score {:.2}) and {} cluster(s) written to: {}",
            report.clustered[0].score(),
            report.clustered.len(),
            clustered_path.display()
        );
        println!(
            "  All {} survivor(s) written to: {}",
            report.survivors.len(),
            raw_path.display()
        );
    }

    Ok(())
}

fn fold_params(args: &Cli) -> FoldParams {
    let mut params = FoldParams::new(args.best_k, args.trans_num_per_pair);
    params.max_result_per_res_set = args.max_result_per_res_set.unwrap_or(args.best_k);
    params.penetration_thr = args.penetration_thr;
    params.restraints_ratio = args.restraints_ratio;
    params.cluster_rmsd = args.cluster_rmsd;
    params.max_backbone_collision_per_chain = args.max_backbone_collision_per_chain;
    params.min_temperature_to_consider_collision = args.min_temperature_to_consider_collision;
    params.timeout = args.timeout_seconds.map(Duration::from_secs);
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn fold_params_mirror_the_cli_arguments() {
        let cli = Cli::parse_from([
            "plexfold",
            "c.list",
            "t/",
            "20",
            "100",
            "r.txt",
            "--penetration-thr",
            "-0.5",
            "--restraints-ratio",
            "0.2",
            "--max-result-per-res-set",
            "7",
            "--timeout-seconds",
            "3600",
        ]);

        let params = fold_params(&cli);

        assert_eq!(params.best_k, 100);
        assert_eq!(params.trans_num_per_pair, 20);
        assert_eq!(params.max_result_per_res_set, 7);
        assert!((params.penetration_thr + 0.5).abs() < 1e-12);
        assert!((params.restraints_ratio - 0.2).abs() < 1e-12);
        assert_eq!(params.timeout, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn max_result_per_res_set_defaults_to_best_k() {
        let cli = Cli::parse_from(["plexfold", "c.list", "t/", "20", "100", "r.txt"]);
        let params = fold_params(&cli);
        assert_eq!(params.max_result_per_res_set, 100);
    }
}
