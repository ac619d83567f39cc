use rand::Rng;

use crate::error::RenderError;
use crate::genome_scene::GenomeScene;
use crate::triangle_scene::TriangleScene;

/// mutation strength is a repeat probability in percent; 100 would loop
/// forever, so callers are clamped to this
pub const MAX_MUTATION_STRENGTH: u8 = 99;

/// number of single-step mutations one `mutate` call performs: always at
/// least one, then repeated with probability `strength/100` per round.
/// expected count for strength < 100 is `1 / (1 - strength/100)`.
pub fn mutation_rounds<R: Rng>(strength: u8, rng: &mut R) -> u32 {
    let strength = u32::from(strength.min(MAX_MUTATION_STRENGTH));
    let mut rounds = 1;
    while rng.random_range(0..100u32) < strength {
        rounds += 1;
    }
    rounds
}

/// One candidate solution in the population: an image-generating individual
/// exposing randomise/mutate/breed/render plus a cached fitness score.
///
/// The two concrete variants keep their strategy code in their own modules;
/// this enum only dispatches. Pools are homogeneous by construction, so
/// breeding across variants is a programmer error and fails loudly.
#[derive(Clone)]
pub enum Scene {
    Triangles(TriangleScene),
    Genome(GenomeScene),
}

impl Scene {
    /// (re)initialise all genetic material to a fresh random state.
    /// invalidates the cached fitness.
    pub fn randomise<R: Rng>(&mut self, rng: &mut R) {
        match self {
            Scene::Triangles(s) => s.randomise(rng),
            Scene::Genome(s) => s.randomise(rng),
        }
    }

    /// apply at least one single-step mutation, repeating with probability
    /// `strength/100` per round. invalidates the cached fitness.
    pub fn mutate<R: Rng>(&mut self, strength: u8, rng: &mut R) {
        self.clear_fitness();
        for _ in 0..mutation_rounds(strength, rng) {
            match self {
                Scene::Triangles(s) => s.mutate_once(rng),
                Scene::Genome(s) => s.mutate_once(rng),
            }
        }
    }

    /// cross-breed with another scene of the same variant, producing two
    /// children that are then independently mutated with `strength`.
    /// neither parent is modified.
    pub fn breed<R: Rng>(&self, other: &Scene, strength: u8, rng: &mut R) -> (Scene, Scene) {
        profiling::scope!("breed");
        let (mut left, mut right) = match (self, other) {
            (Scene::Triangles(a), Scene::Triangles(b)) => {
                let (l, r) = a.crossover(b, rng);
                (Scene::Triangles(l), Scene::Triangles(r))
            }
            (Scene::Genome(a), Scene::Genome(b)) => {
                let (l, r) = a.crossover(b, rng);
                (Scene::Genome(l), Scene::Genome(r))
            }
            _ => unreachable!("cannot breed scenes of different variants"),
        };
        left.mutate(strength, rng);
        right.mutate(strength, rng);
        (left, right)
    }

    /// render to premultiplied RGBA, deterministic for the current state.
    pub fn render(&self) -> Result<Vec<u8>, RenderError> {
        match self {
            Scene::Triangles(s) => s.render(),
            Scene::Genome(s) => s.render(),
        }
    }

    /// cached fitness; `None` means unscored (any mutation resets it)
    pub fn fitness(&self) -> Option<f64> {
        match self {
            Scene::Triangles(s) => s.fitness(),
            Scene::Genome(s) => s.fitness(),
        }
    }

    pub fn set_fitness(&mut self, fitness: f64) {
        match self {
            Scene::Triangles(s) => s.set_fitness(fitness),
            Scene::Genome(s) => s.set_fitness(fitness),
        }
    }

    pub fn clear_fitness(&mut self) {
        match self {
            Scene::Triangles(s) => s.clear_fitness(),
            Scene::Genome(s) => s.clear_fitness(),
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            Scene::Triangles(s) => s.width,
            Scene::Genome(s) => s.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Scene::Triangles(s) => s.height,
            Scene::Genome(s) => s.height(),
        }
    }
}
