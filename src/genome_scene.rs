use std::sync::Arc;

use rand::Rng;

use crate::error::{EvolveError, RenderError};
use crate::toolkit::{GenomeContext, GenomeParams};

/// structural operators are resampled at most this many times before the
/// operator gives up and keeps the last valid genome
pub const MAX_STRUCTURAL_RETRIES: u32 = 16;

/// The opaque-genome scene variant: a parameter vector whose structural
/// operators and rendering are delegated to an external toolkit through an
/// explicit [`GenomeContext`].
#[derive(Clone)]
pub struct GenomeScene {
    context: Arc<GenomeContext>,
    genome: GenomeParams,
    width: u32,
    height: u32,
    fitness: Option<f64>,
}

impl GenomeScene {
    /// a fresh randomised scene; resamples internally until the structural
    /// constraint is satisfied
    pub fn new<R: Rng>(context: Arc<GenomeContext>, width: u32, height: u32, rng: &mut R) -> Self {
        let mut scene = Self {
            genome: Vec::new(),
            context,
            width,
            height,
            fitness: None,
        };
        scene.randomise(rng);
        scene
    }

    pub fn randomise<R: Rng>(&mut self, rng: &mut R) {
        self.fitness = None;
        let sampled =
            resample_within_limit(&self.context, rng, |ctx, r| ctx.toolkit().randomise(r));
        match sampled {
            Ok(genome) => self.genome = genome,
            Err((genome, err)) => {
                // recoverable: keep the over-complex sample rather than no scene at all
                log::warn!("randomise exceeded the structural limit: {err}");
                self.genome = genome;
            }
        }
    }

    pub(crate) fn mutate_once<R: Rng>(&mut self, rng: &mut R) {
        let sampled = resample_within_limit(&self.context, rng, |ctx, r| {
            ctx.toolkit().mutate(&self.genome, r)
        });
        match sampled {
            Ok(genome) => self.genome = genome,
            // recoverable: the scene keeps its current, valid genome
            Err((_, err)) => log::warn!("mutation discarded: {err}"),
        }
    }

    /// structural crossover in both directions, like the toolkit's own
    /// breeding convention. children are unscored and unmutated.
    pub(crate) fn crossover<R: Rng>(&self, other: &GenomeScene, rng: &mut R) -> (Self, Self) {
        profiling::scope!("genome_crossover");
        let left = self.cross_into(other, rng);
        let right = other.cross_into(self, rng);
        (left, right)
    }

    fn cross_into<R: Rng>(&self, other: &GenomeScene, rng: &mut R) -> Self {
        let sampled = resample_within_limit(&self.context, rng, |ctx, r| {
            ctx.toolkit().cross(&self.genome, &other.genome, r)
        });
        let genome = match sampled {
            Ok(genome) => genome,
            Err((_, err)) => {
                // recoverable: fall back to a copy of the leading parent
                log::warn!("crossover discarded: {err}");
                self.genome.clone()
            }
        };
        Self {
            context: Arc::clone(&self.context),
            genome,
            width: self.width,
            height: self.height,
            fitness: None,
        }
    }

    /// render through the context's exclusive-device lock
    pub fn render(&self) -> Result<Vec<u8>, RenderError> {
        self.context.render_locked(&self.genome, self.width, self.height)
    }

    pub fn serialise(&self) -> String {
        self.context.toolkit().serialise(&self.genome)
    }

    pub fn from_serialised(
        context: Arc<GenomeContext>,
        text: &str,
        width: u32,
        height: u32,
    ) -> Result<Self, EvolveError> {
        let genome = context.toolkit().deserialise(text)?;
        Ok(Self {
            context,
            genome,
            width,
            height,
            fitness: None,
        })
    }

    pub fn genome(&self) -> &GenomeParams {
        &self.genome
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = Some(fitness);
    }

    pub fn clear_fitness(&mut self) {
        self.fitness = None;
    }
}

/// Run a structural operator, rejecting offspring whose element count
/// exceeds the context's maximum and resampling up to the retry cap.
///
/// On exhaustion the last (over-complex) sample is returned alongside the
/// error so callers can decide their own recovery; none of them surface the
/// failure to the scheduler.
fn resample_within_limit<R, F>(
    context: &GenomeContext,
    rng: &mut R,
    mut op: F,
) -> Result<GenomeParams, (GenomeParams, EvolveError)>
where
    R: Rng,
    F: FnMut(&GenomeContext, &mut dyn rand::RngCore) -> GenomeParams,
{
    let mut last = Vec::new();
    for _ in 0..MAX_STRUCTURAL_RETRIES {
        let genome = op(context, rng);
        if context.within_limit(&genome) {
            return Ok(genome);
        }
        last = genome;
    }
    Err((
        last,
        EvolveError::StructuralConstraintViolated {
            retries: MAX_STRUCTURAL_RETRIES,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::test_toolkit::StubToolkit;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use std::sync::atomic::Ordering;

    fn context(max_elements: usize) -> Arc<GenomeContext> {
        Arc::new(GenomeContext::new(Box::new(StubToolkit::new()), max_elements))
    }

    #[test]
    fn randomise_respects_structural_limit() {
        let mut rng = Pcg32::seed_from_u64(30);
        let ctx = context(4);
        for _ in 0..50 {
            let scene = GenomeScene::new(Arc::clone(&ctx), 8, 8, &mut rng);
            assert!(ctx.within_limit(scene.genome()));
        }
    }

    #[test]
    fn mutation_at_limit_keeps_last_valid_genome() {
        let mut rng = Pcg32::seed_from_u64(31);
        // the stub's mutate always grows the genome; with the limit at the
        // current size every mutation candidate is rejected
        let ctx = context(4);
        let mut scene = GenomeScene::new(Arc::clone(&ctx), 8, 8, &mut rng);
        // grow to exactly the limit first
        while scene.genome().len() < 4 {
            scene.mutate_once(&mut rng);
        }
        let before = scene.genome().clone();
        scene.mutate_once(&mut rng);
        assert_eq!(scene.genome(), &before);
    }

    #[test]
    fn crossover_children_respect_structural_limit() {
        let mut rng = Pcg32::seed_from_u64(32);
        let ctx = context(8);
        let a = GenomeScene::new(Arc::clone(&ctx), 8, 8, &mut rng);
        let b = GenomeScene::new(Arc::clone(&ctx), 8, 8, &mut rng);
        let (l, r) = a.crossover(&b, &mut rng);
        assert!(ctx.within_limit(l.genome()));
        assert!(ctx.within_limit(r.genome()));
        assert_eq!(l.fitness(), None);
        assert_eq!(r.fitness(), None);
    }

    #[test]
    fn render_reports_uninitialised_context() {
        let mut rng = Pcg32::seed_from_u64(33);
        let ctx = Arc::new(GenomeContext::new(Box::new(StubToolkit::failing()), 8));
        let scene = GenomeScene::new(Arc::clone(&ctx), 8, 8, &mut rng);
        assert!(matches!(
            scene.render(),
            Err(RenderError::ContextUninitialised)
        ));
    }

    #[test]
    fn render_goes_through_the_lock_once_per_call() {
        let mut rng = Pcg32::seed_from_u64(34);
        let stub = StubToolkit::new();
        let renders = std::sync::Arc::clone(&stub.renders);
        let ctx = Arc::new(GenomeContext::new(Box::new(stub), 8));
        let scene = GenomeScene::new(Arc::clone(&ctx), 4, 4, &mut rng);
        let img = scene.render().unwrap();
        assert_eq!(img.len(), 4 * 4 * 4);
        assert_eq!(renders.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn serialisation_round_trips() {
        let mut rng = Pcg32::seed_from_u64(35);
        let ctx = context(8);
        let scene = GenomeScene::new(Arc::clone(&ctx), 8, 8, &mut rng);
        let text = scene.serialise();
        let back = GenomeScene::from_serialised(Arc::clone(&ctx), &text, 8, 8).unwrap();
        assert_eq!(back.genome(), scene.genome());
        assert_eq!(back.render().unwrap(), scene.render().unwrap());
    }
}
