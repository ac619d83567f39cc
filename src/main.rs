use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use clap::Parser;

use petri::fitness::WeightedPixelSumFitness;
use petri::history::{read_best_entries, HistoryLog};
use petri::render::premultiply;
use petri::scheduler::{EngineUpdate, SceneRecipe, Scheduler};
use petri::settings::EvolveSettings;

/// Approximate a target image by evolving triangle scenes through a
/// hierarchical genetic algorithm. Runs until 'q' is entered (or stdin
/// closes); logs and exports land in the run directory.
#[derive(Parser)]
#[command(name = "petri", version)]
struct Cli {
    /// target image to approximate
    target: PathBuf,

    /// YAML settings file (defaults apply when absent)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// weight-mask image; pixels with a nonzero red channel weigh
    /// face_weight+1 times in the error sum
    #[arg(long)]
    mask: Option<PathBuf>,

    /// run directory for logs and exports (default: <target>.petri)
    #[arg(long)]
    out: Option<PathBuf>,

    /// master random seed (overrides the settings file)
    #[arg(long)]
    seed: Option<u64>,

    /// worker threads for fitness scoring (default: all cores)
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    // configure Rayon's global thread pool once at startup so worker
    // threads get nice names like "fitness-0"
    let mut pool_builder =
        rayon::ThreadPoolBuilder::new().thread_name(|i| format!("fitness-{i}"));
    if let Some(threads) = cli.threads {
        pool_builder = pool_builder.num_threads(threads);
    }
    pool_builder.build_global()?;

    let mut settings = match &cli.settings {
        Some(path) => EvolveSettings::load(path)?,
        None => EvolveSettings::default(),
    };
    if cli.seed.is_some() {
        settings.seed = cli.seed;
    }
    settings.validate()?;

    let target = image::open(&cli.target)?.to_rgba8();
    let (width, height) = (target.width(), target.height());
    log::info!("target {} ({width}x{height})", cli.target.display());
    let target_premul = premultiply(target.as_raw());

    let evaluator = match &cli.mask {
        Some(path) => {
            let mask = image::open(path)?.to_rgba8();
            if (mask.width(), mask.height()) != (width, height) {
                return Err("mask dimensions must match the target".into());
            }
            let weights = WeightedPixelSumFitness::mask_from_rgba(mask.as_raw());
            Arc::new(WeightedPixelSumFitness::with_weights(
                target_premul,
                width,
                height,
                weights,
                settings.face_weight,
            ))
        }
        None => Arc::new(WeightedPixelSumFitness::new(target_premul, width, height)),
    };

    let out_dir = cli.out.clone().unwrap_or_else(|| {
        let mut os = cli.target.clone().into_os_string();
        os.push(".petri");
        PathBuf::from(os)
    });
    let history = HistoryLog::create(&out_dir)?;
    let triangle_count = settings.triangle_count;

    let recipe = SceneRecipe::Triangles {
        triangle_count: settings.triangle_count,
        width,
        height,
        background: settings.background,
    };

    let stop = Arc::new(AtomicBool::new(false));
    let (update_tx, update_rx) = mpsc::channel();

    let mut scheduler = Scheduler::new(settings, recipe, evaluator, Arc::clone(&stop))?
        .with_history(history)
        .with_updates(update_tx);

    // background engine thread drives the state machine; the main thread
    // only watches progress
    let engine = thread::Builder::new()
        .name("engine".to_owned())
        .spawn(move || scheduler.run())?;

    // stdin watcher: 'q', 'stop' or end-of-input request a cooperative stop
    let stdin_stop = Arc::clone(&stop);
    thread::Builder::new()
        .name("stdin".to_owned())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(cmd)
                        if cmd.trim().eq_ignore_ascii_case("q")
                            || cmd.trim().eq_ignore_ascii_case("stop") =>
                    {
                        break
                    }
                    Ok(_) => continue,
                    Err(_) => break,
                }
            }
            log::info!("stop requested");
            stdin_stop.store(true, Ordering::Relaxed);
        })?;

    log::info!("running; enter 'q' to stop");

    // drain progress until the engine hangs up the channel
    while let Ok(update) = update_rx.recv() {
        print_update(&update);
    }

    let summary = engine
        .join()
        .map_err(|_| "engine thread panicked")??;

    if let Some(best) = &summary.best {
        let pixels = best.render()?;
        save_png(&out_dir.join("bestPicture.png"), &pixels, width, height)?;
        log::info!(
            "finished at age {} after {} cultures, best fitness {}",
            summary.final_age,
            summary.cultures_completed,
            summary
                .best_fitness
                .map_or("-".to_owned(), |f| format!("{f:.0}")),
        );
    }

    // replay the best-scenes log into one frame per global improvement
    let entries = read_best_entries(&out_dir.join("bestScenes.log"), triangle_count)?;
    if !entries.is_empty() {
        let frames_dir = out_dir.join("bestScenes");
        std::fs::create_dir_all(&frames_dir)?;
        for (count, entry) in entries.iter().enumerate() {
            let pixels = entry.scene.render()?;
            let name = format!("{count:07}.{}.png", entry.iteration);
            save_png(&frames_dir.join(name), &pixels, width, height)?;
        }
        log::info!("replayed {} improvements into bestScenes/", entries.len());
    }

    Ok(())
}

fn print_update(update: &EngineUpdate) {
    let fmt = |f: Option<f64>| f.map_or("-".to_owned(), |f| format!("{f:.0}"));
    log::info!(
        "age {} culture {}/{} iteration {}/{} fitness {} best {} accepted {} improvements {}",
        update.age,
        update.culture,
        update.max_cultures,
        update.iteration,
        update
            .max_iterations
            .map_or("∞".to_owned(), |n| n.to_string()),
        fmt(update.current_fitness),
        fmt(update.best_fitness),
        update.accept_count,
        update.improvements,
    );
}

fn save_png(
    path: &Path,
    premul_rgba: &[u8],
    width: u32,
    height: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    // scenes composite onto an opaque background, so the premultiplied
    // bytes double as straight RGBA
    let img = image::RgbaImage::from_raw(width, height, premul_rgba.to_vec())
        .ok_or("render buffer does not match the image dimensions")?;
    img.save(path)?;
    Ok(())
}
