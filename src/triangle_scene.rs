use rand::Rng;

use crate::dna::{uniform_crossover, MutationKind, Triangle};
use crate::error::RenderError;
use crate::render::CpuRenderer;

/// The polygon-soup scene variant: an ordered list of triangles painted
/// back-to-front over an opaque background. Triangle order is genetic
/// material (z-order), so the list is position-significant.
#[derive(Clone, Debug)]
pub struct TriangleScene {
    pub triangles: Vec<Triangle>,
    pub background: [u8; 4],
    pub width: u32,
    pub height: u32,
    fitness: Option<f64>,
}

impl TriangleScene {
    /// randomly initialise a scene with a set number of triangles
    pub fn new<R: Rng>(
        triangle_count: usize,
        width: u32,
        height: u32,
        background: [u8; 4],
        rng: &mut R,
    ) -> Self {
        let triangles = (0..triangle_count)
            .map(|_| Triangle::random(rng, width, height))
            .collect();
        Self {
            triangles,
            background,
            width,
            height,
            fitness: None,
        }
    }

    /// assemble a scene from already-built parts (deserialization, tests)
    pub fn from_parts(
        triangles: Vec<Triangle>,
        background: [u8; 4],
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            triangles,
            background,
            width,
            height,
            fitness: None,
        }
    }

    /// re-roll every triangle; the scene keeps its cardinality and bounds
    pub fn randomise<R: Rng>(&mut self, rng: &mut R) {
        self.fitness = None;
        for tri in &mut self.triangles {
            *tri = Triangle::random(rng, self.width, self.height);
        }
    }

    /// one mutation step: pick a triangle uniformly, pick an operation by
    /// its probability band. z-order swaps move the triangle within the
    /// list; everything else mutates the triangle in place.
    pub(crate) fn mutate_once<R: Rng>(&mut self, rng: &mut R) {
        if self.triangles.is_empty() {
            return;
        }
        let idx = rng.random_range(0..self.triangles.len());
        let kind = MutationKind::pick(rng);
        if kind == MutationKind::SwapZ {
            let other = rng.random_range(0..self.triangles.len());
            self.triangles.swap(idx, other);
        } else {
            self.triangles[idx].mutate(kind, rng, self.width, self.height);
        }
    }

    /// uniform crossover against another scene of the same geometry.
    /// children are unscored and unmutated; the caller applies mutation.
    pub(crate) fn crossover<R: Rng>(&self, other: &TriangleScene, rng: &mut R) -> (Self, Self) {
        profiling::scope!("triangle_crossover");
        debug_assert_eq!(self.triangles.len(), other.triangles.len());
        debug_assert_eq!((self.width, self.height), (other.width, other.height));

        let mut left = Vec::with_capacity(self.triangles.len());
        let mut right = Vec::with_capacity(self.triangles.len());
        for (a, b) in self.triangles.iter().zip(&other.triangles) {
            let (l, r) = uniform_crossover(a, b, rng);
            left.push(l);
            right.push(r);
        }

        (
            Self::from_parts(left, self.background, self.width, self.height),
            Self::from_parts(right, self.background, self.width, self.height),
        )
    }

    pub fn render(&self) -> Result<Vec<u8>, RenderError> {
        CpuRenderer::render_premul(self)
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
