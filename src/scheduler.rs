use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::error::EvolveError;
use crate::fitness::FitnessEvaluator;
use crate::genome_scene::GenomeScene;
use crate::history::HistoryLog;
use crate::pool::{sort_candidates, Pool};
use crate::scene::Scene;
use crate::settings::EvolveSettings;
use crate::toolkit::GenomeContext;
use crate::tournament::select_survivors;
use crate::triangle_scene::TriangleScene;

/// the control loop's states. `Stopped` is reachable from every state via
/// the external cancellation flag, sampled only between generations and
/// between cultures/ages; an in-flight generation always completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    SeedingCulture,
    RunningGeneration,
    CultureComplete,
    AgeComplete,
    Stopped,
}

/// how fresh scenes are created at culture-seed time
#[derive(Clone)]
pub enum SceneRecipe {
    Triangles {
        triangle_count: usize,
        width: u32,
        height: u32,
        background: [u8; 4],
    },
    Genome {
        context: Arc<GenomeContext>,
        width: u32,
        height: u32,
    },
}

impl SceneRecipe {
    fn create<R: Rng>(&self, rng: &mut R) -> Scene {
        match self {
            SceneRecipe::Triangles {
                triangle_count,
                width,
                height,
                background,
            } => Scene::Triangles(TriangleScene::new(
                *triangle_count,
                *width,
                *height,
                *background,
                rng,
            )),
            SceneRecipe::Genome {
                context,
                width,
                height,
            } => Scene::Genome(GenomeScene::new(Arc::clone(context), *width, *height, rng)),
        }
    }
}

/// throttled progress snapshot sent to whoever is watching the run
pub struct EngineUpdate {
    pub age: u32,
    pub culture: u64,
    pub max_cultures: u64,
    pub iteration: u64,
    pub max_iterations: Option<u64>,
    pub accept_count: u64,
    pub improvements: u64,
    pub current_fitness: Option<f64>,
    pub best_fitness: Option<f64>,
    /// rendered pixels of a new global best, present only on improvements
    pub best_rgba: Option<Arc<[u8]>>,
}

/// what a finished (stopped) run leaves behind
pub struct RunSummary {
    pub best: Option<Scene>,
    pub best_fitness: Option<f64>,
    pub final_age: u32,
    pub cultures_completed: u64,
}

/// iteration budget for one culture: `generation_count × 2^age`, unbounded
/// at the terminal age (the culture then runs until externally stopped)
pub fn iteration_budget(settings: &EvolveSettings, age: u32) -> Option<u64> {
    (age < settings.max_age)
        .then(|| settings.generation_count.saturating_mul(1u64 << age.min(63)))
}

/// culture budget for one age: `population_size × 4^(max_age − age)` below
/// the terminal age. earlier ages run far more, smaller cultures; the
/// terminal age collapses to a single unbounded culture.
pub fn culture_budget(settings: &EvolveSettings, age: u32) -> u64 {
    if age >= settings.max_age {
        1
    } else {
        (settings.population_size as u64).saturating_mul(4u64.saturating_pow(settings.max_age - age))
    }
}

/// The top-level control loop: repeated generations form cultures, cultures
/// form ages. Each culture runs from a freshly-seeded pool until its
/// iteration budget is exhausted and promotes its single fittest scene into
/// the next age's seed set; each completed age replaces the survivor set
/// and doubles the per-culture budget.
pub struct Scheduler {
    settings: EvolveSettings,
    recipe: SceneRecipe,
    evaluator: Arc<dyn FitnessEvaluator>,
    stop: Arc<AtomicBool>,
    rng: Pcg32,

    state: SchedulerState,
    age: u32,
    culture: u64,
    iterations: u64,
    accept_count: u64,
    improvements: u64,
    cultures_completed: u64,

    pool: Pool,
    previous_age: Vec<Scene>,
    next_age: Vec<Scene>,

    current_fitness: Option<f64>,
    best_fitness: Option<f64>,
    best: Option<Scene>,

    history: Option<HistoryLog>,
    updates: Option<mpsc::Sender<EngineUpdate>>,
}

impl Scheduler {
    pub fn new(
        settings: EvolveSettings,
        recipe: SceneRecipe,
        evaluator: Arc<dyn FitnessEvaluator>,
        stop: Arc<AtomicBool>,
    ) -> Result<Self, EvolveError> {
        settings.validate()?;
        let seed = settings.seed.unwrap_or_else(|| rand::rng().random());
        log::info!("master seed {seed}");
        Ok(Self {
            settings,
            recipe,
            evaluator,
            stop,
            rng: Pcg32::seed_from_u64(seed),
            state: SchedulerState::SeedingCulture,
            age: 0,
            culture: 0,
            iterations: 0,
            accept_count: 0,
            improvements: 0,
            cultures_completed: 0,
            pool: Pool::new(Vec::new()),
            previous_age: Vec::new(),
            next_age: Vec::new(),
            current_fitness: None,
            best_fitness: None,
            best: None,
            history: None,
            updates: None,
        })
    }

    pub fn with_history(mut self, history: HistoryLog) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_updates(mut self, updates: mpsc::Sender<EngineUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn culture(&self) -> u64 {
        self.culture
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn best_fitness(&self) -> Option<f64> {
        self.best_fitness
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// drive the state machine until stopped, then hand over the best scene
    pub fn run(&mut self) -> Result<RunSummary, EvolveError> {
        while self.state != SchedulerState::Stopped {
            self.step()?;
        }
        if let Some(h) = self.history.as_mut() {
            h.flush()?;
        }
        Ok(RunSummary {
            best: self.best.take(),
            best_fitness: self.best_fitness,
            final_age: self.age,
            cultures_completed: self.cultures_completed,
        })
    }

    /// advance the state machine by one transition
    pub fn step(&mut self) -> Result<(), EvolveError> {
        match self.state {
            SchedulerState::SeedingCulture => {
                if self.stop_requested() {
                    self.state = SchedulerState::Stopped;
                } else {
                    self.seed_culture()?;
                }
            }
            SchedulerState::RunningGeneration => {
                if self.stop_requested() {
                    // the culture still promotes its best before the run ends
                    self.state = SchedulerState::CultureComplete;
                } else {
                    self.run_generation()?;
                }
            }
            SchedulerState::CultureComplete => self.complete_culture()?,
            SchedulerState::AgeComplete => self.complete_age(),
            SchedulerState::Stopped => {}
        }
        Ok(())
    }

    fn seed_culture(&mut self) -> Result<(), EvolveError> {
        profiling::scope!("seed_culture");
        let max_cultures = culture_budget(&self.settings, self.age);
        let max_iterations = iteration_budget(&self.settings, self.age);
        log::info!(
            "seeding culture {}/{} of age {} (budget: {})",
            self.culture,
            max_cultures,
            self.age,
            max_iterations.map_or("unbounded".to_owned(), |n| n.to_string()),
        );

        if let Some(h) = self.history.as_mut() {
            h.open_culture_log(self.age, self.culture)?;
        }

        let population = self.settings.population_size;
        let mut scenes = Vec::with_capacity(population);
        if self.previous_age.is_empty() {
            // first age: fresh random scenes
            for _ in 0..population {
                scenes.push(self.recipe.create(&mut self.rng));
            }
        } else {
            // sample the previous age's survivors with replacement and clone
            for _ in 0..population {
                let idx = self.rng.random_range(0..self.previous_age.len());
                scenes.push(self.previous_age[idx].clone());
            }
        }
        let mut pool = Pool::new(scenes);
        pool.score_all(self.evaluator.as_ref(), &mut self.rng);

        // establish the culture's starting fitness; clones promoted from the
        // previous age may already beat the global best's bookkeeping
        self.current_fitness = None;
        for scene in &pool.scenes {
            let Some(f) = scene.fitness() else { continue };
            if self
                .current_fitness
                .is_none_or(|c| self.evaluator.is_better(f, c))
            {
                self.current_fitness = Some(f);
            }
            if self
                .best_fitness
                .is_none_or(|b| self.evaluator.is_better(f, b))
            {
                self.best_fitness = Some(f);
                self.best = Some(scene.clone());
            }
        }

        self.pool = pool;
        self.iterations = 0;
        self.accept_count = 0;
        self.improvements = 0;
        self.send_update(None);
        self.state = SchedulerState::RunningGeneration;
        Ok(())
    }

    fn run_generation(&mut self) -> Result<(), EvolveError> {
        profiling::scope!("run_generation");
        let mut record = self.pool.breed_generation(
            self.settings.mutation_strength,
            self.evaluator.as_ref(),
            &mut self.rng,
        );
        sort_candidates(&mut record, self.evaluator.as_ref());

        // compare the generation's best against the culture's running fitness
        let mut best_rgba = None;
        if let Some(f) = record.first().and_then(|c| c.scene.fitness()) {
            if self
                .current_fitness
                .is_none_or(|c| self.evaluator.is_better(f, c))
            {
                self.improvements += 1;
                self.current_fitness = Some(f);
                let generation_best = &record[0].scene;
                if let Some(h) = self.history.as_mut() {
                    h.log_culture_improvement(generation_best)?;
                }

                if self
                    .best_fitness
                    .is_none_or(|b| self.evaluator.is_better(f, b))
                {
                    self.best_fitness = Some(f);
                    self.best = Some(generation_best.clone());
                    if let Some(h) = self.history.as_mut() {
                        h.log_best(self.iterations, f, generation_best)?;
                    }
                    best_rgba = generation_best.render().ok().map(Arc::from);
                    log::info!(
                        "new best fitness {f:.0} (age {} culture {} iteration {})",
                        self.age,
                        self.culture,
                        self.iterations,
                    );
                }
            }
        }

        let outcome = select_survivors(
            record,
            self.settings.population_size,
            self.settings.tournament_size,
            self.evaluator.as_ref(),
            &mut self.rng,
        );
        self.accept_count += outcome.accepted_offspring;
        self.pool = outcome.pool;

        self.iterations += 1;
        if best_rgba.is_some() || self.iterations % self.settings.update_frequency == 0 {
            self.send_update(best_rgba);
        }

        if iteration_budget(&self.settings, self.age).is_some_and(|max| self.iterations >= max) {
            self.state = SchedulerState::CultureComplete;
        }
        Ok(())
    }

    fn complete_culture(&mut self) -> Result<(), EvolveError> {
        profiling::scope!("complete_culture");
        // promote the single fittest scene into the next age's seed set
        self.pool.sort(self.evaluator.as_ref());
        if !self.pool.is_empty() {
            let survivor = self.pool.scenes.remove(0);
            if let Some(h) = self.history.as_mut() {
                h.append_age_log(self.age, &survivor)?;
            }
            self.next_age.push(survivor);
        }
        self.pool = Pool::new(Vec::new());
        self.culture += 1;
        self.cultures_completed += 1;
        log::debug!(
            "culture {}/{} of age {} complete after {} iterations \
             ({} improvements, {} accepted offspring)",
            self.culture,
            culture_budget(&self.settings, self.age),
            self.age,
            self.iterations,
            self.improvements,
            self.accept_count,
        );

        self.state = if self.stop_requested() {
            SchedulerState::Stopped
        } else if self.culture >= culture_budget(&self.settings, self.age) {
            SchedulerState::AgeComplete
        } else {
            SchedulerState::SeedingCulture
        };
        Ok(())
    }

    fn complete_age(&mut self) {
        log::info!(
            "age {} complete, {} survivors seed the next age",
            self.age,
            self.next_age.len(),
        );
        self.previous_age = std::mem::take(&mut self.next_age);
        self.culture = 0;
        self.age += 1;
        self.state = SchedulerState::SeedingCulture;
    }

    fn send_update(&self, best_rgba: Option<Arc<[u8]>>) {
        if let Some(tx) = &self.updates {
            let _ = tx.send(EngineUpdate {
                age: self.age,
                culture: self.culture,
                max_cultures: culture_budget(&self.settings, self.age),
                iteration: self.iterations,
                max_iterations: iteration_budget(&self.settings, self.age),
                accept_count: self.accept_count,
                improvements: self.improvements,
                current_fitness: self.current_fitness,
                best_fitness: self.best_fitness,
                best_rgba,
            });
        }
    }
}
