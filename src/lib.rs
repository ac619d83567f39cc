//! petri approximates a target raster image by evolving a population of
//! procedurally rendered scenes toward minimal pixel-wise error.
//!
//! The search runs a genetic algorithm with hierarchical generations: a
//! fixed-size pool of scenes is bred and trimmed once per *generation*,
//! generations are grouped into *cultures* (one seeded run of the loop that
//! promotes a single survivor), and cultures into *ages* (earlier ages run
//! many short cultures for diversity, later ages run few long ones for
//! refinement).
//!
//! # Architecture
//!
//! - [`dna`]: triangle genes, uniform crossover, single-step mutations
//! - [`scene`]: the polymorphic [`scene::Scene`] individual over the two
//!   concrete variants ([`triangle_scene`], [`genome_scene`])
//! - [`fitness`]: weighted squared pixel error against the target image
//! - [`pool`]: per-generation breeding and parallel child scoring
//! - [`tournament`]: elitist survivor selection over a shrinking window
//! - [`scheduler`]: the age/culture state machine driving the whole run
//! - [`history`]: binary improvement logs and their replay
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::{atomic::AtomicBool, Arc};
//! use petri::{
//!     fitness::WeightedPixelSumFitness,
//!     scheduler::{SceneRecipe, Scheduler},
//!     settings::EvolveSettings,
//! };
//!
//! let target: Vec<u8> = vec![255; 64 * 64 * 4]; // premultiplied RGBA
//! let settings = EvolveSettings::default();
//! let evaluator = Arc::new(WeightedPixelSumFitness::new(target, 64, 64));
//! let recipe = SceneRecipe::Triangles {
//!     triangle_count: settings.triangle_count,
//!     width: 64,
//!     height: 64,
//!     background: settings.background,
//! };
//! let stop = Arc::new(AtomicBool::new(false));
//! let mut scheduler = Scheduler::new(settings, recipe, evaluator, stop).unwrap();
//! let summary = scheduler.run().unwrap();
//! println!("best fitness: {:?}", summary.best_fitness);
//! ```

pub mod dna;
pub mod error;
pub mod fitness;
pub mod genome_scene;
pub mod history;
pub mod pool;
pub mod render;
pub mod scene;
pub mod scheduler;
pub mod settings;
pub mod toolkit;
pub mod tournament;
pub mod triangle_scene;

pub use error::{EvolveError, RenderError};
pub use scene::Scene;
pub use scheduler::{EngineUpdate, RunSummary, Scheduler, SchedulerState};
pub use settings::EvolveSettings;
