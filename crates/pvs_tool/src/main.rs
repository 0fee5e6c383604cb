//! PVS grid inspection and post-processing.
//!
//! Every command reads a grid file plus its visibility file:
//! - info: grid layout and visibility totals
//! - query: resolve a position to a cell and report its visibility
//! - optimize: collapse agreeing octree subtrees
//! - compress: convert an octree into a hierarchical octree with promoted visibility
//! - analyze: occlusion statistics report

mod config;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use glam::DVec3;
use pvs_core::{
	Grid, GridOptimizer, HierarchicalOctreeGrid, ModelId, NodeId, OcclusionReport, PvsDatabase,
	PvsGrid, ViewCell,
};
use std::path::{Path, PathBuf};
use tracing::info;

use config::Config;

/// Potentially visible set tool.
#[derive(Parser, Debug)]
#[command(name = "pvs_tool")]
#[command(about = "Inspects and post-processes PVS grid and visibility files")]
struct Cli {
	/// Optional configuration TOML file.
	#[arg(short, long, global = true)]
	config: Option<PathBuf>,

	/// Log at debug level unless RUST_LOG says otherwise.
	#[arg(short, long, global = true)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Print grid layout and visibility totals.
	Info {
		#[command(flatten)]
		input: InputArgs,
	},
	/// Report the visibility of the cell containing a position.
	Query {
		#[command(flatten)]
		input: InputArgs,
		/// Viewer position as `x,y,z`.
		#[arg(short, long, value_parser = parse_position, allow_hyphen_values = true)]
		position: DVec3,
		/// Model of a single node to test.
		#[arg(short, long, requires = "node")]
		model: Option<ModelId>,
		/// Node to test; lists all visible nodes when omitted.
		#[arg(short, long, requires = "model")]
		node: Option<NodeId>,
	},
	/// Collapse octree subtrees whose cells mostly agree.
	Optimize {
		#[command(flatten)]
		input: InputArgs,
		#[command(flatten)]
		output: OutputArgs,
		/// Overrides `[optimizer] collapse_threshold`.
		#[arg(long)]
		threshold: Option<f64>,
	},
	/// Convert an octree into a hierarchical octree and promote shared visibility.
	Compress {
		#[command(flatten)]
		input: InputArgs,
		#[command(flatten)]
		output: OutputArgs,
		/// Overrides `[compression] num_allowed_unequal_elements`.
		#[arg(long)]
		allowed_unequal: Option<u8>,
	},
	/// Write an occlusion statistics report.
	Analyze {
		#[command(flatten)]
		input: InputArgs,
		/// Report file (default: stdout).
		#[arg(short, long)]
		output: Option<PathBuf>,
		/// Overrides `[analysis] buckets`.
		#[arg(long)]
		buckets: Option<usize>,
	},
}

#[derive(Args, Debug)]
struct InputArgs {
	/// Grid description file.
	#[arg(long)]
	grid: PathBuf,
	/// Packed visibility file.
	#[arg(long)]
	pvs: PathBuf,
}

#[derive(Args, Debug)]
struct OutputArgs {
	/// Output grid description file.
	#[arg(long)]
	out_grid: PathBuf,
	/// Output visibility file.
	#[arg(long)]
	out_pvs: PathBuf,
}

fn main() -> Result<()> {
	let cli = Cli::parse();
	init_logging(cli.verbose);

	let mut config = Config::load_or_default(cli.config.as_deref())?;

	match cli.command {
		Command::Info { input } => info_command(&input),
		Command::Query {
			input,
			position,
			model,
			node,
		} => query_command(&input, position, model.zip(node)),
		Command::Optimize {
			input,
			output,
			threshold,
		} => {
			if let Some(threshold) = threshold {
				config.optimizer.collapse_threshold = threshold;
			}
			config.validate()?;
			optimize_command(&input, &output, &config)
		}
		Command::Compress {
			input,
			output,
			allowed_unequal,
		} => {
			if let Some(allowed) = allowed_unequal {
				config.compression.num_allowed_unequal_elements = allowed;
			}
			config.validate()?;
			compress_command(&input, &output, &config)
		}
		Command::Analyze {
			input,
			output,
			buckets,
		} => {
			if let Some(buckets) = buckets {
				config.analysis.buckets = buckets;
			}
			config.validate()?;
			analyze_command(&input, output.as_deref(), &config)
		}
	}
}

fn init_logging(verbose: bool) {
	let level = if verbose { "debug" } else { "info" };
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Parse `x,y,z` into a position.
fn parse_position(value: &str) -> std::result::Result<DVec3, String> {
	let parts: Vec<&str> = value.split(',').map(str::trim).collect();
	let [x, y, z] = parts[..] else {
		return Err(format!("expected `x,y,z`, got `{value}`"));
	};
	let parse = |part: &str| {
		part
			.parse::<f64>()
			.map_err(|err| format!("invalid coordinate `{part}`: {err}"))
	};
	Ok(DVec3::new(parse(x)?, parse(y)?, parse(z)?))
}

fn load_grid(input: &InputArgs) -> Result<Grid> {
	Grid::load(&input.grid, &input.pvs).with_context(|| {
		format!(
			"Failed to load grid {} with visibility {}",
			input.grid.display(),
			input.pvs.display()
		)
	})
}

fn save_grid(grid: &Grid, output: &OutputArgs) -> Result<()> {
	grid.save(&output.out_grid, &output.out_pvs).with_context(|| {
		format!(
			"Failed to write grid {} with visibility {}",
			output.out_grid.display(),
			output.out_pvs.display()
		)
	})?;
	println!(
		"Written: {} + {}",
		output.out_grid.display(),
		output.out_pvs.display()
	);
	Ok(())
}

/// Visibility of a cell with promoted ancestor data merged in.
fn effective_cell(grid: &Grid, index: usize) -> ViewCell {
	match grid {
		Grid::HierarchicalOctree(hierarchical) => hierarchical.effective_cell(index),
		other => other.get_cell_at_index(index).clone(),
	}
}

fn info_command(input: &InputArgs) -> Result<()> {
	let grid = load_grid(input)?;
	let bounds = grid.bounds();
	let cell_count = grid.get_cell_count();
	let visible: usize = (0..cell_count)
		.map(|index| grid.count_cell_visible(index))
		.sum();

	println!("type:   {}", grid.grid_type());
	println!("cells:  {cell_count}");
	println!("bounds: {} .. {}", bounds.min, bounds.max);
	println!("models: {}", grid.get_num_models());
	for (model, count) in grid.ids().iter().enumerate() {
		println!("  model {model}: {count} nodes");
	}
	println!(
		"visible: {visible} of {} cell/node pairs",
		cell_count as u64 * grid.total_node_count()
	);
	Ok(())
}

fn query_command(
	input: &InputArgs,
	position: DVec3,
	single: Option<(ModelId, NodeId)>,
) -> Result<()> {
	if let Some((model, node)) = single {
		let database = PvsDatabase::new();
		database
			.load_pvs_from_file(&input.grid, &input.pvs)
			.with_context(|| format!("Failed to load grid {}", input.grid.display()))?;
		database.set_viewer_position(position);
		match database.current_cell_index() {
			Some(cell) => println!("cell {cell}"),
			None => println!("position is outside the grid, every node counts as visible"),
		}
		let visible = database.get_viewer_visibility(model, node);
		println!("model {model} node {node}: {}", if visible { "visible" } else { "hidden" });
		return Ok(());
	}

	let grid = load_grid(input)?;
	let Some(index) = grid.get_cell_index_at_position(position) else {
		println!("position is outside the grid, every node counts as visible");
		return Ok(());
	};
	let cell = effective_cell(&grid, index);
	println!(
		"cell {index}: center {} size {}",
		cell.get_position_center(),
		cell.get_size()
	);
	for (model, nodes) in cell.get_visible_indices() {
		let nodes: Vec<String> = nodes.iter().map(ToString::to_string).collect();
		println!("  model {model}: {}", nodes.join(" "));
	}
	Ok(())
}

fn optimize_command(input: &InputArgs, output: &OutputArgs, config: &Config) -> Result<()> {
	let mut grid = load_grid(input)?;
	let optimizer = GridOptimizer::new(config.optimizer_config());
	let stats = optimizer
		.optimize_grid(&mut grid)
		.context("Optimization failed")?;
	info!(
		collapses = stats.collapses,
		cells_before = stats.cells_before,
		cells_after = stats.cells_after,
		"optimized grid"
	);
	println!(
		"Collapsed {} subtrees: {} -> {} cells",
		stats.collapses, stats.cells_before, stats.cells_after
	);
	save_grid(&grid, output)
}

fn compress_command(input: &InputArgs, output: &OutputArgs, config: &Config) -> Result<()> {
	let octree = match load_grid(input)? {
		Grid::Octree(octree) => octree,
		other => anyhow::bail!(
			"compress needs an `octree` grid, {} is `{}`",
			input.grid.display(),
			other.grid_type()
		),
	};

	let allowed = config.compression.num_allowed_unequal_elements;
	let mut hierarchical = HierarchicalOctreeGrid::from_octree(octree);
	let promoted = hierarchical.combine_visibility(allowed);
	println!("Promoted {promoted} entries (allowed unequal: {allowed})");
	save_grid(&Grid::from(hierarchical), output)
}

fn analyze_command(input: &InputArgs, output: Option<&Path>, config: &Config) -> Result<()> {
	let grid = load_grid(input)?;
	let report = OcclusionReport::compute_with_buckets(&grid, config.analysis.buckets);
	match output {
		Some(path) => {
			report
				.save_to_file(path)
				.with_context(|| format!("Failed to write report: {}", path.display()))?;
			println!(
				"Average occlusion {:.2}%, report written to {}",
				report.average_occlusion * 100.0,
				path.display()
			);
		}
		None => report
			.write_to(std::io::stdout().lock())
			.context("Failed to write report to stdout")?,
	}
	Ok(())
}
