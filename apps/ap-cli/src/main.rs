use clap::{Args, Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use ap_batch::{
    Actual, AnalysisConfig, ArtifactKind, BulkLoadEvent, BulkLoadStage, Dataset,
    Frame, Interpolated, System, VectorSweep,
};
use ap_core::{ApError, ApResult};
use ap_io::{format_sci, write_table};
use nalgebra::{DMatrix, Vector3};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ap-cli")]
#[command(about = "Aeroelastic post-processing of parametric simulation batches", long_about = None)]
struct Cli {
    /// YAML analysis configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Glob pattern of case directories, or the library folder with --interpolated
    source: Option<String>,

    /// Treat SOURCE as an interpolated library holding pmor_summary.txt
    #[arg(long)]
    interpolated: bool,

    /// Load case directories in parallel
    #[arg(long)]
    parallel: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a dataset and list its cases
    Summary {
        #[command(flatten)]
        source: SourceArgs,
        /// Artifacts to load (eigs, bode, ss, deflection, beam_modal_analysis, forces, stability)
        #[arg(short, long, value_delimiter = ',')]
        artifacts: Vec<String>,
    },
    /// Concatenated eigenvalues of a system with their parameters
    Eigs {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, default_value = "aeroelastic")]
        system: String,
        /// Output table path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Wing tip deflection across the dataset
    TipDeflection {
        #[command(flatten)]
        source: SourceArgs,
        /// Frame: a (body) or g (global)
        #[arg(long, default_value = "a")]
        frame: String,
        /// Angle of attack used for the global frame rotation, degrees
        #[arg(long, default_value_t = 0.0)]
        alpha: f64,
    },
    /// Integrated aerodynamic forces or moments
    Forces {
        #[command(flatten)]
        source: SourceArgs,
        /// Frame: a (body) or g (global)
        #[arg(long, default_value = "g")]
        frame: String,
        /// Report moments instead of forces
        #[arg(long)]
        moments: bool,
    },
    /// Flutter speeds from the velocity sweeps of every aeroelastic case
    Flutter {
        #[command(flatten)]
        source: SourceArgs,
        /// Write stability_analysis.txt, flutter.txt and vel_eigs.txt per case
        #[arg(long)]
        save_dir: Option<PathBuf>,
    },
    /// Least stable damping ratio over a two-parameter plane
    DampingMap {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, default_value = "alpha")]
        x: String,
        #[arg(long, default_value = "u_inf")]
        y: String,
    },
}

fn main() -> ApResult<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => {
            let config = ap_batch::load_yaml(path)?;
            info!(path = %path.display(), "loaded analysis configuration");
            config
        }
        None => AnalysisConfig::default(),
    };

    match cli.command {
        Commands::Summary { source, artifacts } => {
            let kinds = artifacts
                .iter()
                .map(|a| a.parse::<ArtifactKind>())
                .collect::<Result<Vec<_>, _>>()?;
            cmd_summary(&config, &source, kinds)
        }
        Commands::Eigs {
            source,
            system,
            output,
        } => cmd_eigs(&config, &source, system.parse()?, output.as_deref()),
        Commands::TipDeflection {
            source,
            frame,
            alpha,
        } => cmd_tip_deflection(&config, &source, frame.parse()?, alpha),
        Commands::Forces {
            source,
            frame,
            moments,
        } => cmd_forces(&config, &source, frame.parse()?, moments),
        Commands::Flutter { source, save_dir } => {
            cmd_flutter(&config, &source, save_dir.as_deref())
        }
        Commands::DampingMap { source, x, y } => cmd_damping_map(&config, &source, &x, &y),
    }
}

fn load_dataset(
    config: &AnalysisConfig,
    args: &SourceArgs,
    required: &[ArtifactKind],
) -> ApResult<Box<dyn Dataset>> {
    let mut options = config.load.clone();
    options.artifacts.extend(required.iter().copied());
    options.parallel |= args.parallel;

    let source = args
        .source
        .clone()
        .or_else(|| config.source.clone())
        .ok_or_else(|| ApError::Configuration {
            what: "no case source given on the command line or in the configuration".into(),
        })?;

    let started = Instant::now();
    let mut last_emit = Instant::now();
    let mut on_event = |event: BulkLoadEvent| {
        if matches!(event.stage, BulkLoadStage::Completed { .. })
            || last_emit.elapsed().as_millis() >= 100
        {
            render_load_progress(&event);
            last_emit = Instant::now();
        }
    };

    let dataset: Box<dyn Dataset> = if args.interpolated {
        let mut library = Interpolated::open(&source)?;
        let loaded = library.load_bulk_cases_with_progress(&options, Some(&mut on_event));
        clear_progress_line();
        loaded?;
        Box::new(library)
    } else {
        let mut actual = Actual::new(source);
        let loaded = actual.load_bulk_cases_with_progress(&options, Some(&mut on_event));
        clear_progress_line();
        loaded?;
        Box::new(actual)
    };
    println!("✓ Dataset loaded in {:.2}s", started.elapsed().as_secs_f64());
    Ok(dataset)
}

fn cmd_summary(
    config: &AnalysisConfig,
    source: &SourceArgs,
    artifacts: Vec<ArtifactKind>,
) -> ApResult<()> {
    let dataset = load_dataset(config, source, &artifacts)?;
    for system in System::ALL {
        let set = dataset.cases(system);
        println!("{system}: {} cases", set.n_cases());
        for case in set {
            let id = case.case_id().map(|id| id.get()).unwrap_or_default();
            let loaded: Vec<&str> = [
                ("eigs", case.eigs.is_some()),
                ("bode", case.bode.is_some()),
                ("ss", case.ss.is_some()),
                ("deflection", case.deflection.is_some()),
                ("beam_modal_analysis", case.beam_eigs.is_some()),
                ("forces", case.aero_forces.is_some()),
                ("stability", case.stability.is_some()),
            ]
            .into_iter()
            .filter_map(|(name, present)| present.then_some(name))
            .collect();
            println!(
                "  {:>3}  {:<24} {}  [{}]",
                id,
                case.name,
                case.parameter_value,
                loaded.join(", ")
            );
        }
    }
    Ok(())
}

fn cmd_eigs(
    config: &AnalysisConfig,
    source: &SourceArgs,
    system: System,
    output: Option<&Path>,
) -> ApResult<()> {
    let dataset = load_dataset(config, source, &[ArtifactKind::Eigs])?;
    let sweep = dataset.eigs(system)?;

    let arity = sweep.parameters.ncols();
    let table = DMatrix::from_fn(sweep.eigs.nrows(), arity + 2, |i, j| {
        if j < arity {
            sweep.parameters[(i, j)]
        } else {
            sweep.eigs[(i, j - arity)]
        }
    });

    if let Some(path) = output {
        write_table(path, &table)?;
        println!("✓ Exported {} eigenvalues to {}", table.nrows(), path.display());
    } else {
        for row in table.row_iter() {
            let line: Vec<String> = row.iter().map(|v| format_sci(*v)).collect();
            println!("{}", line.join(" "));
        }
    }
    Ok(())
}

fn cmd_tip_deflection(
    config: &AnalysisConfig,
    source: &SourceArgs,
    frame: Frame,
    alpha: f64,
) -> ApResult<()> {
    let dataset = load_dataset(config, source, &[ArtifactKind::Deflection])?;
    let reference = Vector3::from(config.reference_line);
    let sweep = dataset.wing_tip_deflection(frame, alpha, &reference)?;
    print_vector_sweep(&sweep);
    Ok(())
}

fn cmd_forces(
    config: &AnalysisConfig,
    source: &SourceArgs,
    frame: Frame,
    moments: bool,
) -> ApResult<()> {
    let dataset = load_dataset(config, source, &[ArtifactKind::Forces])?;
    let sweep = if moments {
        dataset.moments(frame)?
    } else {
        dataset.forces(frame)?
    };
    print_vector_sweep(&sweep);
    Ok(())
}

fn cmd_flutter(
    config: &AnalysisConfig,
    source: &SourceArgs,
    save_dir: Option<&Path>,
) -> ApResult<()> {
    let dataset = load_dataset(config, source, &[ArtifactKind::Stability])?;
    let speeds = dataset.flutter_speeds(&config.mode_filter)?;
    for (parameter, speeds) in &speeds {
        if speeds.is_empty() {
            println!("{parameter}: no flutter in sweep");
        } else {
            let list: Vec<String> = speeds.iter().map(|s| format!("{s:.4}")).collect();
            println!("{parameter}: {} m/s", list.join(", "));
        }
    }

    if let Some(dir) = save_dir {
        for case in dataset.cases(System::Aeroelastic) {
            let Some(stability) = &case.stability else {
                continue;
            };
            let mut stability = stability.clone();
            stability.process(&config.mode_filter)?;
            let folder = dir.join(if case.name.is_empty() {
                format!("case_{}", case.case_id().map(|id| id.get()).unwrap_or_default())
            } else {
                case.name.clone()
            });
            std::fs::create_dir_all(&folder)?;
            stability.save_to_file(&folder)?;
            println!("✓ Saved stability results to {}", folder.display());
        }
    }
    Ok(())
}

fn cmd_damping_map(config: &AnalysisConfig, source: &SourceArgs, x: &str, y: &str) -> ApResult<()> {
    let dataset = load_dataset(config, source, &[ArtifactKind::Eigs])?;
    let points = dataset.damping_map(x, y, &config.damping)?;
    println!("{x} {y} max_damping");
    for p in &points {
        println!("{} {} {}", format_sci(p.x), format_sci(p.y), format_sci(p.max_damping));
    }
    Ok(())
}

fn print_vector_sweep(sweep: &VectorSweep) {
    for (parameter, value) in sweep.parameters.iter().zip(&sweep.values) {
        println!(
            "{parameter}  {} {} {}",
            format_sci(value.x),
            format_sci(value.y),
            format_sci(value.z)
        );
    }
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(120));
    let _ = io::stdout().flush();
}

fn render_load_progress(event: &BulkLoadEvent) {
    let spinner = ['|', '/', '-', '\\'];
    let spin_idx = ((event.elapsed_wall_s * 10.0) as usize) % spinner.len();
    let detail = match &event.stage {
        BulkLoadStage::ListingSources => "listing case directories".to_string(),
        BulkLoadStage::SourceDiscovered { source } => format!("reading {}", source.display()),
        BulkLoadStage::ManifestMissing { source } => format!("no manifest in {}", source.display()),
        BulkLoadStage::SourceRejected { source, .. } => format!("rejected {}", source.display()),
        BulkLoadStage::ArtifactUnavailable {
            system, artifact, ..
        } => format!("{system}: {artifact} unavailable"),
        BulkLoadStage::CaseLoaded {
            system, case_id, ..
        } => format!("{system} case {case_id}"),
        BulkLoadStage::CaseSkipped { system, parameter } => {
            format!("{system} {parameter} already loaded")
        }
        BulkLoadStage::Completed { loaded, .. } => format!("{loaded} case directories loaded"),
    };
    print!(
        "\r{} {:<90} elapsed={:.2}s",
        spinner[spin_idx], detail, event.elapsed_wall_s
    );
    let _ = io::stdout().flush();
}
