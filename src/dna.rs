use rand::Rng;
use serde::{Deserialize, Serialize};

/// every triangle carries a fixed number of vertices
pub const TRIANGLE_POINTS: usize = 3;

/// genes per triangle for crossover: 4 color channels + one gene per point
/// (a point is inherited as an atomic unit, both coordinates together)
pub const GENES_PER_TRIANGLE: usize = 4 + TRIANGLE_POINTS;

/// a single triangle gene bundle: ordered vertices and an RGBA color.
/// owned exclusively by its containing scene; z-order is the position in
/// the scene's triangle list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triangle {
    pub points: [(i32, i32); TRIANGLE_POINTS],
    pub rgba: [u8; 4],
}

/// single-step mutation operations, selected by cumulative probability
/// bands out of 100: 20/50/80/90/100.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationKind {
    /// swap z-order with another random triangle (applied at scene level)
    SwapZ,
    /// randomise the position of one vertex
    MoveCorner,
    /// randomise one of the four RGBA channels
    TweakChannel,
    /// randomise the position of every vertex
    Relocate,
    /// reinitialise vertices and color with random data
    Randomise,
}

impl MutationKind {
    pub fn pick<R: Rng>(rng: &mut R) -> Self {
        match rng.random_range(0..100u32) {
            0..=19 => MutationKind::SwapZ,
            20..=49 => MutationKind::MoveCorner,
            50..=79 => MutationKind::TweakChannel,
            80..=89 => MutationKind::Relocate,
            _ => MutationKind::Randomise,
        }
    }
}

impl Triangle {
    /// initialise a random triangle within a scene bounded by width and height
    pub fn random<R: Rng>(rng: &mut R, width: u32, height: u32) -> Self {
        let mut points = [(0, 0); TRIANGLE_POINTS];
        for p in &mut points {
            *p = random_point(rng, width, height);
        }
        Triangle {
            points,
            rgba: [
                rng.random::<u8>(),
                rng.random::<u8>(),
                rng.random::<u8>(),
                rng.random::<u8>(),
            ],
        }
    }

    /// apply one mutation step of the given kind. `SwapZ` touches the
    /// containing scene's triangle list, not the triangle itself, so it is
    /// handled by the caller and ignored here.
    pub fn mutate<R: Rng>(&mut self, kind: MutationKind, rng: &mut R, width: u32, height: u32) {
        match kind {
            MutationKind::SwapZ => {}
            MutationKind::MoveCorner => {
                let corner = rng.random_range(0..TRIANGLE_POINTS);
                self.points[corner] = random_point(rng, width, height);
            }
            MutationKind::TweakChannel => {
                let channel = rng.random_range(0..4);
                self.rgba[channel] = rng.random::<u8>();
            }
            MutationKind::Relocate => {
                for p in &mut self.points {
                    *p = random_point(rng, width, height);
                }
            }
            MutationKind::Randomise => {
                *self = Triangle::random(rng, width, height);
            }
        }
    }
}

fn random_point<R: Rng>(rng: &mut R, width: u32, height: u32) -> (i32, i32) {
    (
        rng.random_range(0..width.max(1) as i32),
        rng.random_range(0..height.max(1) as i32),
    )
}

/// uniform crossover over one triangle index of two parents.
///
/// for each gene, a fair coin routes parent A's value into one child and
/// parent B's value into the other: each gene is inherited as an atomic
/// unit from one parent into one child and from the other parent into the
/// other child.
pub fn uniform_crossover<R: Rng>(a: &Triangle, b: &Triangle, rng: &mut R) -> (Triangle, Triangle) {
    // both children start as copies; every gene is overwritten below
    let mut left = *a;
    let mut right = *a;

    for gene in 0..GENES_PER_TRIANGLE {
        let (x, y) = if rng.random_bool(0.5) {
            (&mut left, &mut right)
        } else {
            (&mut right, &mut left)
        };
        if gene < 4 {
            x.rgba[gene] = a.rgba[gene];
            y.rgba[gene] = b.rgba[gene];
        } else {
            let p = gene - 4;
            x.points[p] = a.points[p];
            y.points[p] = b.points[p];
        }
    }

    (left, right)
}
