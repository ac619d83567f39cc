use rand::Rng;

use crate::fitness::FitnessEvaluator;
use crate::pool::{sort_candidates, Candidate, Pool};
use crate::scene::Scene;

/// result of one selection pass
pub struct SelectionOutcome {
    pub pool: Pool,
    /// selected individuals that were genuinely new offspring, not
    /// carried-over parents. an observability metric, not a control input.
    pub accepted_offspring: u64,
}

/// Trim a generation record back to `population_size` survivors.
///
/// The record is sorted best-first; slot 0 always receives the single best
/// individual (elitism). Every remaining slot draws a uniformly random index
/// within `tournament_size` of the best-ranked remainder, without
/// replacement. This biases selection toward high fitness while the
/// shrinking window preserves diversity.
pub fn select_survivors<R: Rng>(
    mut record: Vec<Candidate>,
    population_size: usize,
    tournament_size: usize,
    evaluator: &dyn FitnessEvaluator,
    rng: &mut R,
) -> SelectionOutcome {
    profiling::scope!("select_survivors");
    sort_candidates(&mut record, evaluator);

    let mut survivors: Vec<Scene> = Vec::with_capacity(population_size);
    let mut accepted_offspring = 0;

    for slot in 0..population_size {
        if record.is_empty() {
            break;
        }
        let index = if slot == 0 {
            // always include the best candidate
            0
        } else {
            rng.random_range(0..tournament_size.min(record.len()))
        };
        let candidate = record.remove(index);
        if slot != 0 && candidate.offspring {
            accepted_offspring += 1;
        }
        survivors.push(candidate.scene);
    }

    SelectionOutcome {
        pool: Pool::new(survivors),
        accepted_offspring,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitness::WeightedPixelSumFitness;
    use crate::triangle_scene::TriangleScene;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn eval() -> WeightedPixelSumFitness {
        WeightedPixelSumFitness::new([255u8, 255, 255, 255].repeat(16), 4, 4)
    }

    fn candidate(fitness: f64, offspring: bool, rng: &mut Pcg32) -> Candidate {
        let mut scene =
            Scene::Triangles(TriangleScene::new(1, 4, 4, [255, 255, 255, 255], rng));
        scene.set_fitness(fitness);
        Candidate { scene, offspring }
    }

    #[test]
    fn selection_keeps_population_size_and_elite() {
        let mut rng = Pcg32::seed_from_u64(50);
        let eval = eval();
        for seed in 0..20 {
            let mut pick_rng = Pcg32::seed_from_u64(seed);
            // parents [10,20,30,40] bred into children [5,15,..,75]
            let mut record = Vec::new();
            for (i, f) in [5.0, 15.0, 25.0, 35.0, 45.0, 55.0, 65.0, 75.0]
                .into_iter()
                .enumerate()
            {
                record.push(candidate(f, i % 2 == 0, &mut rng));
            }
            let outcome = select_survivors(record, 4, 2, &eval, &mut pick_rng);

            assert_eq!(outcome.pool.len(), 4);
            // slot 0 is always the single best individual
            assert_eq!(outcome.pool.scenes[0].fitness(), Some(5.0));
        }
    }

    #[test]
    fn window_draws_only_from_best_ranked_remainder() {
        let mut rng = Pcg32::seed_from_u64(51);
        let eval = eval();
        let fitnesses = [5.0, 15.0, 25.0, 35.0, 45.0, 55.0, 65.0, 75.0];
        for seed in 0..50 {
            let mut pick_rng = Pcg32::seed_from_u64(1000 + seed);
            let record: Vec<Candidate> = fitnesses
                .into_iter()
                .map(|f| candidate(f, false, &mut rng))
                .collect();
            let outcome = select_survivors(record, 4, 2, &eval, &mut pick_rng);

            // after the elite takes 5.0, each following draw sees a sorted
            // remainder and a window of 2, so nothing beyond 45.0 can ever
            // be reached in three draws
            for scene in &outcome.pool.scenes[1..] {
                assert!(scene.fitness().unwrap() <= 45.0);
            }
        }
    }

    #[test]
    fn acceptance_counts_only_new_offspring() {
        let mut rng = Pcg32::seed_from_u64(52);
        let eval = eval();
        // all candidates are offspring: every non-elite slot must count
        let record: Vec<Candidate> = (0..8)
            .map(|i| candidate(10.0 + i as f64, true, &mut rng))
            .collect();
        let outcome = select_survivors(record, 4, 2, &eval, &mut rng);
        assert_eq!(outcome.accepted_offspring, 3);

        // all candidates are carried-over parents: nothing counts
        let record: Vec<Candidate> = (0..8)
            .map(|i| candidate(10.0 + i as f64, false, &mut rng))
            .collect();
        let outcome = select_survivors(record, 4, 2, &eval, &mut rng);
        assert_eq!(outcome.accepted_offspring, 0);
    }

    #[test]
    fn tournament_window_shrinks_with_the_remainder() {
        let mut rng = Pcg32::seed_from_u64(53);
        let eval = eval();
        // population as large as the record: the final draws have fewer
        // candidates left than the window size and must not panic
        let record: Vec<Candidate> = (0..4)
            .map(|i| candidate(10.0 + i as f64, false, &mut rng))
            .collect();
        let outcome = select_survivors(record, 4, 8, &eval, &mut rng);
        assert_eq!(outcome.pool.len(), 4);
    }
}
