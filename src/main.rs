mod config;

use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{Parser, Subcommand};
use svao_geom::Resolution;
use svao_host::headless::{HeadlessGpu, HeadlessScene};
use svao_passes::{AoGraph, ExecuteOutcome};
use svao_sdmath::{DEFAULT_GUARD_BAND_BUDGET, GuardBandSpec, build_lookup_table, dispatch_extent};

use crate::config::GraphConfig;

#[derive(Parser, Debug)]
#[command(name = "svao", version, about = "Stochastic-depth VAO tooling on a headless backend")]
struct Cli {
    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the guard-banded stochastic depth map extent
    Size {
        #[arg(long, default_value_t = 1920)]
        width: u32,
        #[arg(long, default_value_t = 1080)]
        height: u32,
        #[arg(long, default_value_t = 4)]
        divisor: u32,
        #[arg(long, default_value_t = DEFAULT_GUARD_BAND_BUDGET)]
        budget: u32,
        /// Size the map without the guard band
        #[arg(long)]
        no_guard_band: bool,
    },
    /// Print the stratified index and lookup tables for a sample count
    Lut {
        #[arg(default_value_t = 4)]
        samples: u32,
    },
    /// Run a graph file for a number of frames and report each pass
    Simulate {
        #[arg(long, default_value = "assets/graphs/svao.toml")]
        config: PathBuf,
        #[arg(long, default_value_t = 3)]
        frames: u32,
    },
}

fn init_logging(log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    match log_file {
        Some(path) => {
            let file = File::create(path)?;
            simplelog::WriteLogger::init(log::LevelFilter::Debug, simplelog::Config::default(), file)?;
        }
        None => env_logger::init(),
    }
    Ok(())
}

fn print_size(full: Resolution, divisor: u32, budget: u32, guard: bool) -> Result<(), Box<dyn Error>> {
    let spec = GuardBandSpec::new(divisor, budget)?;
    let map = spec.map_size(full, guard)?;
    println!("target      {full}");
    println!("divisor     {divisor}");
    println!("guard band  {}", if guard { spec.extra_guard_band() } else { 0 });
    println!("map         {map}");
    println!("dispatch    {}", dispatch_extent(map)?);
    Ok(())
}

fn print_lut(samples: u32) -> Result<(), Box<dyn Error>> {
    let table = build_lookup_table(samples)?;
    println!("indices {:?}", table.indices());
    if table.len() <= 64 {
        println!("lookup  {:?}", table.lookup());
    } else {
        println!("lookup  {} entries", table.len());
    }
    Ok(())
}

fn simulate(config: &Path, frames: u32) -> Result<(), Box<dyn Error>> {
    let cfg = GraphConfig::load_from_path(config)?;
    let dims = cfg.resolution();
    let mut gpu = HeadlessGpu::new();
    let mut graph = AoGraph::build(&mut gpu, &cfg.graph_desc())?;
    graph.compile(&mut gpu, dims)?;
    log::info!(
        "{}: {} passes at {dims}: {}",
        config.display(),
        graph.len(),
        graph.execution_order().join(" -> ")
    );

    let scene = Rc::new(HeadlessScene::with_default_camera(
        dims.width as f32 / dims.height as f32,
    ));
    graph.set_scene(Some(scene.clone()));
    for frame in 0..frames {
        let outcomes = graph.execute(&mut gpu)?;
        let commands = gpu.take_commands().len();
        println!("frame {frame} ({commands} commands)");
        for (name, outcome) in outcomes {
            match outcome {
                ExecuteOutcome::Dispatched { frame_index, threads } => {
                    println!("  {name:<18} #{frame_index:<4} {threads}");
                }
                ExecuteOutcome::Detached => println!("  {name:<18} detached"),
                ExecuteOutcome::MissingResource(field) => println!("  {name:<18} skipped, missing {field}"),
            }
        }
        scene.end_frame();
    }
    log::info!(
        "{frames} frames, {} programs, {} textures",
        gpu.program_count(),
        gpu.texture_count()
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;
    match cli.command {
        Command::Size {
            width,
            height,
            divisor,
            budget,
            no_guard_band,
        } => print_size(Resolution::new(width, height), divisor, budget, !no_guard_band),
        Command::Lut { samples } => print_lut(samples),
        Command::Simulate { config, frames } => simulate(&config, frames),
    }
}
