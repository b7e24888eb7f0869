#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::uninlined_format_args)]

mod csv_reader;
mod ml;
mod session;
mod structs;

use clap::{Parser, Subcommand};
use session::Session;
use std::path::{Path, PathBuf};
use structs::{
    GeoError, InterpolationMethod, Rendering, Result, SessionConfig, VisualizationType,
    DEFAULT_CLUSTERS, DEFAULT_COORDINATE_WEIGHT,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Geocluster - spatial clustering and field mapping for geochemical survey tables
#[derive(Parser, Debug)]
#[command(name = "geocluster")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Cluster survey samples on coordinates plus measured fields
    Cluster {
        /// Whitespace or comma separated table: x, y, field1, field2, ...
        #[arg(short, long)]
        input: PathBuf,

        /// Number of clusters (2-10)
        #[arg(short = 'k', long, default_value_t = DEFAULT_CLUSTERS)]
        clusters: usize,

        /// Weight of the coordinate columns relative to the fields
        #[arg(short = 'w', long, default_value_t = DEFAULT_COORDINATE_WEIGHT)]
        coordinate_weight: f64,

        /// Cluster label export, one label per input row
        #[arg(short, long)]
        output: PathBuf,

        /// Optional JSON summary of the run
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Interpolate one field onto a regular grid and render it
    Map {
        /// Whitespace or comma separated table: x, y, field1, field2, ...
        #[arg(short, long)]
        input: PathBuf,

        /// Field to map (1 = first field after the coordinates)
        #[arg(short, long)]
        field: usize,

        /// Rendering to produce
        #[arg(long, value_enum, default_value_t = VisualizationType::Heatmap)]
        visualization: VisualizationType,

        /// Scattered-data interpolation method
        #[arg(long, value_enum, default_value_t = InterpolationMethod::Cubic)]
        method: InterpolationMethod,

        /// Heatmap CSV or contour JSON output
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geocluster=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Some(Commands::Cluster {
            input,
            clusters,
            coordinate_weight,
            output,
            summary,
        }) => run_cluster(
            &input,
            SessionConfig {
                n_clusters: clusters,
                coordinate_weight,
                ..SessionConfig::default()
            },
            &output,
            summary.as_deref(),
        ),

        Some(Commands::Map {
            input,
            field,
            visualization,
            method,
            output,
        }) => run_map(&input, field, visualization, method, &output),

        None => {
            eprintln!("No subcommand provided. Use 'geocluster cluster' or 'geocluster map'.");
            eprintln!("Run 'geocluster --help' for usage information.");
            std::process::exit(1);
        }
    }
}

fn check_input(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(GeoError::Load(format!(
            "Input file not found: {}",
            path.display()
        )))
    }
}

/// Load, cluster and export labels
fn run_cluster(
    input: &Path,
    config: SessionConfig,
    output: &Path,
    summary: Option<&Path>,
) -> Result<()> {
    check_input(input)?;
    let mut session = Session::with_config(config)?;

    eprintln!("Loading: {}", input.display());
    session.load_file(input)?;

    let assignment = session.cluster()?;
    eprint!("{}", assignment.summary());

    let rows = session.export_clusters(output)?;
    eprintln!("Wrote {rows} labels to {}", output.display());

    if let Some(summary_path) = summary {
        if let (Some(table), Some(assignment)) = (session.table(), session.assignment()) {
            ml::output::write_summary_json(summary_path, table, assignment, session.config())?;
            eprintln!("Summary written to {}", summary_path.display());
        }
    }

    Ok(())
}

/// Load, interpolate one field and write the rendering
fn run_map(
    input: &Path,
    field: usize,
    visualization: VisualizationType,
    method: InterpolationMethod,
    output: &Path,
) -> Result<()> {
    check_input(input)?;
    let mut session = Session::new();

    eprintln!("Loading: {}", input.display());
    session.load_file(input)?;
    session.set_field_number(field)?;
    session.set_visualization_type(visualization);
    session.set_interpolation_method(method);

    let rendering = session.visualize()?;
    ml::output::write_rendering(output, &rendering)?;

    match &rendering {
        Rendering::Heatmap(grid) => eprintln!(
            "Heatmap of field {field}: {}x{} cells, {} without data",
            grid.xs.len(),
            grid.ys.len(),
            grid.no_data_count()
        ),
        Rendering::Contour(bands) => eprintln!(
            "Contour of field {field}: {} bands",
            bands.levels.len().saturating_sub(1)
        ),
    }
    eprintln!("Output written to {}", output.display());

    Ok(())
}
