use clap::Parser;
use log::{error, info, warn};
use simplelog::{LevelFilter, SimpleLogger};
use std::path::PathBuf;
use std::time::Instant;
use mislight::mission::model::ModelLibrary;
use mislight::mission::Mission;
use mislight::types::SoftnessMode;
use mislight::*;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input mission (JSON)
    #[arg(short, long)]
    input: PathBuf,

    /// Output path for the lit mission. Defaults to {input}_lit.json if not set
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory of object models (<name>.json). Objects without a model cast no shadow
    #[arg(long)]
    models: Option<PathBuf>,

    /// Per-light portal clipping instead of the fast cell-to-cell visibility
    #[arg(long, default_value_t = false)]
    exact_pvs: bool,

    /// Override the mission's multi-sample mode
    #[arg(long, value_enum)]
    softness: Option<SoftnessMode>,

    /// Override the weight of the center sample (0..1)
    #[arg(long)]
    center_weight: Option<f32>,

    /// Override the falloff exponent
    #[arg(long)]
    attenuation: Option<f32>,

    /// Override the saturation multiplier
    #[arg(long)]
    saturation: Option<f32>,

    /// Light water surfaces instead of leaving them full bright
    #[arg(long, default_value_t = false)]
    lightmap_water: bool,

    /// Ignore the mission's sunlight
    #[arg(long, default_value_t = false)]
    no_sun: bool,

    /// Worker threads. Defaults to one per core
    #[arg(long)]
    threads: Option<usize>,

    /// Verbose info for debugging
    #[arg(long, default_value_t = false)]
    verbose: bool,

    /// Bakes everything and dumps logs, but doesn't write any files to disk
    #[arg(long, default_value_t = false)]
    draft_run: bool,

    /// Dump the resolved light sources to the console for debugging
    #[arg(long, default_value_t = false)]
    dump_lights: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose)?;

    if !args.input.exists() {
        error!("Input file does not exist: {:?}", args.input);
        return Ok(());
    }

    info!("Loading mission {:?}", args.input);
    let mut mission = Mission::load(&args.input)?;

    let models = match &args.models {
        Some(dir) => ModelLibrary::load_dir(dir)?,
        None => {
            warn!("No model directory given: objects cast no shadows and lights use default anchors");
            ModelLibrary::new()
        }
    };

    let mut settings = mission.settings_with_saturation(args.saturation)?;
    settings.fast_pvs = !args.exact_pvs;
    if let Some(softness) = args.softness {
        settings.softness = softness;
    }
    if let Some(weight) = args.center_weight {
        settings.center_weight = weight.clamp(0.0, 1.0);
    }
    if let Some(att) = args.attenuation {
        settings.attenuation = att.max(0.0);
    }
    if args.lightmap_water {
        settings.lightmapped_water = true;
    }
    if args.no_sun {
        settings.sunlight.enabled = false;
    }
    info!("Settings: {:?}", settings);

    let mut pool = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = args.threads {
        pool = pool.num_threads(threads);
    }
    let pool = pool.build()?;
    info!("Baking with {} threads", pool.current_num_threads());

    let start = Instant::now();
    let report = pool.install(|| processing::bake_mission(&mut mission, &models, &settings))?;
    info!(
        "Baked {} lights into {} lit cells in {:.2?} ({} overlit, {} unassigned lights, {} animated cell entries)",
        report.lights.len(),
        report.lit_cells,
        start.elapsed(),
        report.overlit_cells,
        report.unassigned_lights,
        report.anim_cell_refs
    );

    if args.dump_lights {
        warn!("Dumping all resolved lights:");
        for light in &report.lights {
            println!("{:#?}", light);
        }
        println!("----------------------------------------------");
    }

    if args.draft_run {
        warn!("Draft run complete. No files written.");
        return Ok(());
    }

    let output = match args.output {
        Some(p) => p,
        None => {
            let mut p = args.input.clone();
            if let Some(stem) = p.file_stem() {
                let new_stem = format!("{}_lit", stem.to_string_lossy());
                p.set_file_name(new_stem);
            }
            p.set_extension("json");
            p
        }
    };

    mission.save(&output)?;
    info!("Saved lit mission to: {:?}", output);

    Ok(())
}

fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let config = simplelog::ConfigBuilder::default()
        .set_time_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .build();
    if simplelog::TermLogger::init(level, config.clone(), simplelog::TerminalMode::Mixed, simplelog::ColorChoice::Auto).is_err() {
        SimpleLogger::init(level, config)?;
    }

    Ok(())
}
