use std::{fs, process};

use clap::Parser;
use sdslite_cli::{App, Command};
use sdslite_testgen::replay::{replay, Outcome};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app = App::parse();
    match &app.command {
        Command::Generate(args) => generate(args),
        Command::Run(args) => run(args),
        Command::Schema => schema(),
    }
}

fn generate(args: &sdslite_cli::GenerateArgs) {
    if args.n_dataset == 0 || args.n_var == 0 || args.max_extent == 0 {
        eprintln!("--n-dataset, --n-var and --max-extent must be positive");
        process::exit(1);
    }

    fs::create_dir_all(&args.output_dir).unwrap_or_else(|e| {
        eprintln!("Failed to create output directory: {e}");
        process::exit(1);
    });

    let workloads = sdslite_testgen::generator::generate_mult_workloads(
        args.n_workload,
        args.n_dataset,
        args.n_var,
        args.n_step,
        args.max_extent,
    );

    for workload in &workloads {
        let path = args.output_dir.join(format!("{}.json", workload.get_id()));
        let file = fs::File::create(&path).unwrap_or_else(|e| {
            eprintln!("Failed to create {}: {e}", path.display());
            process::exit(1);
        });
        serde_json::to_writer_pretty(file, workload).unwrap_or_else(|e| {
            eprintln!("Failed to write {}: {e}", path.display());
            process::exit(1);
        });
    }

    println!(
        "Generated {} workloads to {}",
        workloads.len(),
        args.output_dir.display()
    );
}

fn run(args: &sdslite_cli::RunArgs) {
    let mut any_failed = false;

    let mut entries: Vec<_> = fs::read_dir(&args.input_dir)
        .unwrap_or_else(|e| {
            eprintln!("Failed to read input directory: {e}");
            process::exit(1);
        })
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
        .collect();

    entries.sort_by_key(fs::DirEntry::path);

    if entries.is_empty() {
        eprintln!("No .json files found in {}", args.input_dir.display());
        process::exit(1);
    }

    for entry in entries {
        let path = entry.path();
        let filename = path.file_name().unwrap_or_default().to_string_lossy();

        let file = fs::File::open(&path).unwrap_or_else(|e| {
            eprintln!("Failed to open {filename}: {e}");
            process::exit(1);
        });

        let workload: sdslite_testgen::generator::Workload = serde_json::from_reader(file)
            .unwrap_or_else(|e| {
                eprintln!("Failed to parse {filename}: {e}");
                process::exit(1);
            });

        let report = replay(workload.get_script());
        let inconsistent = report.inconsistent_dimensions();
        let ok = inconsistent.is_empty();
        any_failed |= !ok;

        let committed = report.count(|o| matches!(o, Outcome::Committed { .. }));
        let rejected = report.count(|o| matches!(o, Outcome::Rejected));
        let failed = report.count(|o| matches!(o, Outcome::Failed { .. }));

        if args.json {
            let result = serde_json::json!({
                "file": filename,
                "ok": ok,
                "committed": committed,
                "rejected": rejected,
                "failed": failed,
                "inconsistent_dimensions": inconsistent,
                "datasets": report.datasets,
            });
            println!("{result}");
            continue;
        }

        if ok {
            println!("{filename}: PASS ({committed} committed, {rejected} rejected, {failed} failed)");
        } else {
            println!("{filename}: FAIL (inconsistent dimensions {inconsistent:?})");
        }
        if args.verbose {
            for (index, outcome) in report.outcomes.iter().enumerate() {
                println!("  {index}: {outcome:?}");
            }
        }
    }

    if any_failed {
        process::exit(1);
    }
}

fn schema() {
    let schema = schemars::schema_for!(sdslite_testgen::script::Script);
    let json = serde_json::to_string_pretty(&schema).unwrap_or_else(|e| {
        eprintln!("Failed to serialize schema: {e}");
        process::exit(1);
    });
    println!("{json}");
}
