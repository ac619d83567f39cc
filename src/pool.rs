use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use rayon::prelude::*;

use crate::fitness::{fitness_ordering, FitnessEvaluator};
use crate::scene::Scene;

/// how many times a failed render is retried (with a re-randomised scene)
/// before the individual is written off with worst-possible fitness
pub const MAX_RENDER_ATTEMPTS: u32 = 3;

/// one entry of a generation record. the `offspring` flag marks scenes that
/// were not in the pre-generation pool, feeding the selector's acceptance
/// count without relying on pointer identity.
pub struct Candidate {
    pub scene: Scene,
    pub offspring: bool,
}

/// The fixed-size working set of scenes for the current generation.
/// Re-created at every culture seed; its cardinality stays `population_size`
/// for the lifetime of one generation.
pub struct Pool {
    pub scenes: Vec<Scene>,
}

impl Pool {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// score every unscored member in parallel. each worker task gets its
    /// own generator seeded from the master sequence, so the render-failure
    /// re-randomise path never shares a generator across threads.
    pub fn score_all<R: Rng>(&mut self, evaluator: &dyn FitnessEvaluator, rng: &mut R) {
        profiling::scope!("score_pool");
        let seeds: Vec<u64> = self.scenes.iter().map(|_| rng.random()).collect();
        self.scenes
            .par_iter_mut()
            .zip(seeds)
            .for_each(|(scene, seed)| {
                if scene.fitness().is_none() {
                    let mut task_rng = Pcg32::seed_from_u64(seed);
                    score_scene(scene, evaluator, &mut task_rng);
                }
            });
    }

    /// run one generation's breeding: partition the pool into disjoint
    /// random pairs, breed each pair, and score all children concurrently.
    ///
    /// drains the pool and returns the generation record: parents plus
    /// offspring, 2x the population for even pool sizes. the parallel
    /// scoring is a hard barrier, no candidate leaves here unscored.
    pub fn breed_generation<R: Rng>(
        &mut self,
        strength: u8,
        evaluator: &dyn FitnessEvaluator,
        rng: &mut R,
    ) -> Vec<Candidate> {
        profiling::scope!("breed_generation");
        let mut remaining = std::mem::take(&mut self.scenes);
        let mut record = Vec::with_capacity(remaining.len() * 2);

        // take scenes at random from the pool, in pairs
        while remaining.len() >= 2 {
            let first = remaining.swap_remove(rng.random_range(0..remaining.len()));
            let second = remaining.swap_remove(rng.random_range(0..remaining.len()));
            let (child_a, child_b) = first.breed(&second, strength, rng);

            record.push(Candidate {
                scene: first,
                offspring: false,
            });
            record.push(Candidate {
                scene: second,
                offspring: false,
            });
            record.push(Candidate {
                scene: child_a,
                offspring: true,
            });
            record.push(Candidate {
                scene: child_b,
                offspring: true,
            });
        }
        // odd pool size: the unpaired leftover passes through unbred
        if let Some(last) = remaining.pop() {
            record.push(Candidate {
                scene: last,
                offspring: false,
            });
        }

        // parents carry their fitness from the previous generation; only the
        // children render here
        let seeds: Vec<u64> = record.iter().map(|_| rng.random()).collect();
        record
            .par_iter_mut()
            .zip(seeds)
            .for_each(|(candidate, seed)| {
                if candidate.scene.fitness().is_none() {
                    let mut task_rng = Pcg32::seed_from_u64(seed);
                    score_scene(&mut candidate.scene, evaluator, &mut task_rng);
                }
            });

        record
    }

    /// sort best-first under the evaluator's comparator
    pub fn sort(&mut self, evaluator: &dyn FitnessEvaluator) {
        self.scenes
            .sort_by(|a, b| fitness_ordering(evaluator, a.fitness(), b.fitness()));
    }
}

/// render and score one scene. a failed render is recovered by
/// re-randomising and retrying; when every attempt fails the scene gets the
/// worst-possible fitness so selection discards it naturally instead of
/// aborting the run.
pub fn score_scene<R: Rng>(scene: &mut Scene, evaluator: &dyn FitnessEvaluator, rng: &mut R) {
    profiling::scope!("score_scene");
    for attempt in 0..MAX_RENDER_ATTEMPTS {
        match scene.render() {
            Ok(pixels) => {
                scene.set_fitness(evaluator.score(&pixels));
                return;
            }
            Err(err) => {
                log::debug!("render attempt {attempt} failed ({err}); re-randomising scene");
                scene.randomise(rng);
            }
        }
    }
    log::warn!("scene never rendered after {MAX_RENDER_ATTEMPTS} attempts; assigning worst fitness");
    scene.set_fitness(evaluator.worst());
}

/// sort a generation record best-first under the evaluator's comparator
pub fn sort_candidates(record: &mut [Candidate], evaluator: &dyn FitnessEvaluator) {
    record.sort_by(|a, b| fitness_ordering(evaluator, a.scene.fitness(), b.scene.fitness()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitness::WeightedPixelSumFitness;
    use crate::toolkit::test_toolkit::StubToolkit;
    use crate::toolkit::GenomeContext;
    use crate::triangle_scene::TriangleScene;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use std::sync::Arc;

    fn white_eval(side: u32) -> WeightedPixelSumFitness {
        WeightedPixelSumFitness::new(
            [255u8, 255, 255, 255].repeat((side * side) as usize),
            side,
            side,
        )
    }

    fn triangle_pool(size: usize, rng: &mut Pcg32) -> Pool {
        Pool::new(
            (0..size)
                .map(|_| {
                    Scene::Triangles(TriangleScene::new(4, 8, 8, [255, 255, 255, 255], rng))
                })
                .collect(),
        )
    }

    #[test]
    fn generation_record_doubles_even_pools() {
        let mut rng = Pcg32::seed_from_u64(40);
        let eval = white_eval(8);
        let mut pool = triangle_pool(6, &mut rng);
        pool.score_all(&eval, &mut rng);

        let record = pool.breed_generation(10, &eval, &mut rng);
        assert_eq!(record.len(), 12);
        assert_eq!(record.iter().filter(|c| c.offspring).count(), 6);
        assert!(record.iter().all(|c| c.scene.fitness().is_some()));
        assert!(pool.is_empty());
    }

    #[test]
    fn odd_pool_passes_leftover_unbred() {
        let mut rng = Pcg32::seed_from_u64(41);
        let eval = white_eval(8);
        let mut pool = triangle_pool(5, &mut rng);
        pool.score_all(&eval, &mut rng);

        let record = pool.breed_generation(0, &eval, &mut rng);
        // 2 pairs bred into 8 candidates, plus the unpaired leftover
        assert_eq!(record.len(), 9);
        assert_eq!(record.iter().filter(|c| c.offspring).count(), 4);
    }

    #[test]
    fn parents_keep_their_scores() {
        let mut rng = Pcg32::seed_from_u64(42);
        let eval = white_eval(8);
        let mut pool = triangle_pool(4, &mut rng);
        pool.score_all(&eval, &mut rng);
        let mut parent_scores: Vec<f64> =
            pool.scenes.iter().filter_map(|s| s.fitness()).collect();
        parent_scores.sort_by(f64::total_cmp);

        let record = pool.breed_generation(0, &eval, &mut rng);
        let mut kept: Vec<f64> = record
            .iter()
            .filter(|c| !c.offspring)
            .filter_map(|c| c.scene.fitness())
            .collect();
        kept.sort_by(f64::total_cmp);
        assert_eq!(kept, parent_scores);
    }

    #[test]
    fn failed_renders_get_worst_fitness_without_aborting() {
        let mut rng = Pcg32::seed_from_u64(43);
        let eval = white_eval(8);
        let ctx = Arc::new(GenomeContext::new(Box::new(StubToolkit::failing()), 8));
        let mut scene = Scene::Genome(crate::genome_scene::GenomeScene::new(
            Arc::clone(&ctx),
            8,
            8,
            &mut rng,
        ));
        score_scene(&mut scene, &eval, &mut rng);
        assert_eq!(scene.fitness(), Some(eval.worst()));
    }
}
