use std::sync::Mutex;

use rand::RngCore;

use crate::error::{EvolveError, RenderError};

/// opaque parameter vector owned by the external toolkit; the core never
/// interprets it beyond what the toolkit exposes
pub type GenomeParams = Vec<f64>;

/// The external structural-genetics toolkit behind the opaque-genome scene
/// variant. The core owns none of the genome's structure; it only needs the
/// operations required for breeding plus a structural-complexity probe for
/// the rejection-resampling policy.
pub trait GenomeToolkit: Send + Sync {
    /// a fresh random genome
    fn randomise(&self, rng: &mut dyn RngCore) -> GenomeParams;

    /// structural crossover of two genomes into one offspring
    fn cross(&self, a: &GenomeParams, b: &GenomeParams, rng: &mut dyn RngCore) -> GenomeParams;

    /// one structural mutation step
    fn mutate(&self, genome: &GenomeParams, rng: &mut dyn RngCore) -> GenomeParams;

    /// structural complexity of a genome (element/transform count), checked
    /// against the context's maximum after every structural operator
    fn element_count(&self, genome: &GenomeParams) -> usize;

    /// render a genome at the given dimensions to premultiplied RGBA.
    /// fails explicitly when the toolkit's device/context was never
    /// initialised or the render did not reach a completed state.
    fn render(&self, genome: &GenomeParams, width: u32, height: u32)
        -> Result<Vec<u8>, RenderError>;

    /// text serialization of a genome (the toolkit owns the format)
    fn serialise(&self, genome: &GenomeParams) -> String;

    fn deserialise(&self, text: &str) -> Result<GenomeParams, EvolveError>;
}

/// Explicit, caller-constructed context for the genome variant: the toolkit
/// handle, the structural limit, and the render lock.
///
/// The toolkit's renderer is an exclusive device, so every render call is
/// serialized through one mutex; effective parallelism for this variant is
/// one concurrent render regardless of worker-pool size. Construction and
/// teardown are the caller's responsibility (no process-wide statics).
pub struct GenomeContext {
    toolkit: Box<dyn GenomeToolkit>,
    render_lock: Mutex<()>,
    max_elements: usize,
}

impl GenomeContext {
    pub fn new(toolkit: Box<dyn GenomeToolkit>, max_elements: usize) -> Self {
        Self {
            toolkit,
            render_lock: Mutex::new(()),
            max_elements,
        }
    }

    pub fn toolkit(&self) -> &dyn GenomeToolkit {
        &*self.toolkit
    }

    pub fn max_elements(&self) -> usize {
        self.max_elements
    }

    /// true if the genome's structural complexity is within the limit
    pub fn within_limit(&self, genome: &GenomeParams) -> bool {
        self.toolkit.element_count(genome) <= self.max_elements
    }

    /// render under the exclusive-device lock
    pub(crate) fn render_locked(
        &self,
        genome: &GenomeParams,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, RenderError> {
        profiling::scope!("genome_render_locked");
        let _guard = self
            .render_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.toolkit.render(genome, width, height)
    }
}

/// deterministic stand-in toolkit for unit tests: genomes are plain value
/// vectors, mutation appends an element (so the structural limit is easy to
/// trip), and rendering paints a solid grey from the genome mean.
#[cfg(test)]
pub(crate) mod test_toolkit {
    use super::*;
    use rand::Rng;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    pub(crate) struct StubToolkit {
        /// render fails unconditionally, simulating a missing device
        pub fail_renders: bool,
        /// shared so tests keep a handle after the toolkit is boxed
        pub renders: Arc<AtomicU32>,
    }

    impl StubToolkit {
        pub fn new() -> Self {
            Self {
                fail_renders: false,
                renders: Arc::new(AtomicU32::new(0)),
            }
        }

        pub fn failing() -> Self {
            Self {
                fail_renders: true,
                renders: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    impl GenomeToolkit for StubToolkit {
        fn randomise(&self, rng: &mut dyn RngCore) -> GenomeParams {
            let len = rng.random_range(1..=4);
            (0..len).map(|_| rng.random::<f64>()).collect()
        }

        fn cross(
            &self,
            a: &GenomeParams,
            b: &GenomeParams,
            rng: &mut dyn RngCore,
        ) -> GenomeParams {
            let split = rng.random_range(0..=a.len());
            a[..split].iter().chain(b.get(split..).unwrap_or(&[]).iter()).copied().collect()
        }

        fn mutate(&self, genome: &GenomeParams, rng: &mut dyn RngCore) -> GenomeParams {
            // grows by one element per step so tests can exceed the limit
            let mut out = genome.clone();
            out.push(rng.random::<f64>());
            out
        }

        fn element_count(&self, genome: &GenomeParams) -> usize {
            genome.len()
        }

        fn render(
            &self,
            genome: &GenomeParams,
            width: u32,
            height: u32,
        ) -> Result<Vec<u8>, RenderError> {
            self.renders.fetch_add(1, Ordering::Relaxed);
            if self.fail_renders {
                return Err(RenderError::ContextUninitialised);
            }
            let mean = genome.iter().sum::<f64>() / genome.len().max(1) as f64;
            let level = (mean.clamp(0.0, 1.0) * 255.0) as u8;
            Ok([level, level, level, 255].repeat((width * height) as usize))
        }

        fn serialise(&self, genome: &GenomeParams) -> String {
            genome
                .iter()
                .map(f64::to_string)
                .collect::<Vec<_>>()
                .join(",")
        }

        fn deserialise(&self, text: &str) -> Result<GenomeParams, EvolveError> {
            text.split(',')
                .map(|v| {
                    v.parse::<f64>()
                        .map_err(|e| EvolveError::Toolkit(e.to_string()))
                })
                .collect()
        }
    }
}
