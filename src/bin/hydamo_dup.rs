//! Direct invocation of the duplicate resolver.
//!
//! Usage: `hydamo-dup <src.gpkg> [dst.gpkg] [pointlayer] [tablelayer] [layerid]`
//!
//! Positional arguments only; unset ones fall back to the job defaults
//! (`hydamo_duplicates.gpkg`, `gemaal`, `pomp`, `gemaalid`).

use std::path::PathBuf;
use std::process::ExitCode;

use hydamo_duplicates::{DuplicateJob, materialize_duplicates};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(src) = args.next() else {
        eprintln!("usage: hydamo-dup <src.gpkg> [dst.gpkg] [pointlayer] [tablelayer] [layerid]");
        return ExitCode::from(2);
    };

    let mut job = DuplicateJob::new(src);
    if let Some(dst) = args.next() {
        job.dst_gpkg_path = PathBuf::from(dst);
    }
    if let Some(pointlayer) = args.next() {
        job.pointlayer = pointlayer;
    }
    if let Some(tablelayer) = args.next() {
        job.tablelayer = tablelayer;
    }
    if let Some(layerid) = args.next() {
        job.layerid = layerid;
    }

    match materialize_duplicates(&job) {
        Ok(report) => {
            println!("Output GeoPackage: {}", report.output_gpkg.display());
            println!("Number of duplicates created: {}", report.duplicates_created);
            if report.orphaned_groups > 0 {
                println!("Orphaned reference groups skipped: {}", report.orphaned_groups);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
