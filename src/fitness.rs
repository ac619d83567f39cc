use rayon::prelude::*;

/// Scores a rendered candidate against the target image. Implementations
/// decide both the error metric and its comparison direction: scheduling
/// code only ever calls `is_better`, so a metric where higher is better
/// (structural similarity, say) plugs in without touching the scheduler.
pub trait FitnessEvaluator: Send + Sync {
    /// score a candidate's premultiplied RGBA buffer (same dimensions as
    /// the target)
    fn score(&self, candidate: &[u8]) -> f64;

    /// true if fitness `a` denotes a better match than `b`
    fn is_better(&self, a: f64, b: f64) -> bool {
        a < b
    }

    /// the worst score this metric can assign; used as the fallback for
    /// individuals whose render never completed
    fn worst(&self) -> f64 {
        f64::MAX
    }
}

/// total order over cached fitness values under an evaluator's comparator,
/// best first; unscored individuals rank as worst-possible
pub fn fitness_ordering(
    evaluator: &dyn FitnessEvaluator,
    a: Option<f64>,
    b: Option<f64>,
) -> std::cmp::Ordering {
    let a = a.unwrap_or_else(|| evaluator.worst());
    let b = b.unwrap_or_else(|| evaluator.worst());
    if evaluator.is_better(a, b) {
        std::cmp::Ordering::Less
    } else if evaluator.is_better(b, a) {
        std::cmp::Ordering::Greater
    } else {
        std::cmp::Ordering::Equal
    }
}

/// Weighted squared pixel error, lower is better.
///
/// For every pixel: the sum of squared differences across the three color
/// channels (alpha ignored), multiplied by `(region_weight × maskBit + 1)`,
/// accumulated over all pixels. The optional mask marks regions (faces,
/// typically) whose error should count more, steering the search toward
/// matching them first.
pub struct WeightedPixelSumFitness {
    target: Vec<u8>, // premultiplied RGBA
    width: u32,
    height: u32,
    weights: Option<Vec<u8>>, // one byte per pixel, nonzero = weighted region
    region_weight: u32,
}

impl WeightedPixelSumFitness {
    /// plain pixel-sum fitness: every pixel weighted equally
    pub fn new(target: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(target.len(), (width * height * 4) as usize);
        Self {
            target,
            width,
            height,
            weights: None,
            region_weight: 0,
        }
    }

    /// region-weighted fitness. `weights` holds one byte per pixel, nonzero
    /// marking pixels inside the weighted region; their squared error is
    /// multiplied by `region_weight + 1`.
    pub fn with_weights(
        target: Vec<u8>,
        width: u32,
        height: u32,
        weights: Vec<u8>,
        region_weight: u32,
    ) -> Self {
        debug_assert_eq!(weights.len(), (width * height) as usize);
        Self {
            target,
            width,
            height,
            weights: Some(weights),
            region_weight,
        }
    }

    /// build a per-pixel weight mask from a mask image's red channel
    /// (the face-detection collaborator paints detected regions white)
    pub fn mask_from_rgba(mask_rgba: &[u8]) -> Vec<u8> {
        mask_rgba
            .chunks_exact(4)
            .map(|px| u8::from(px[0] > 0))
            .collect()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl FitnessEvaluator for WeightedPixelSumFitness {
    fn score(&self, candidate: &[u8]) -> f64 {
        profiling::scope!("pixel_sum_score");
        debug_assert_eq!(candidate.len(), self.target.len());

        let row_px = self.width as usize;
        let row_bytes = row_px * 4;
        let face_weight = self.region_weight as f64;

        (0..self.height as usize)
            .into_par_iter()
            .map(|y| {
                let t_row = &self.target[y * row_bytes..(y + 1) * row_bytes];
                let c_row = &candidate[y * row_bytes..(y + 1) * row_bytes];
                let w_row = self
                    .weights
                    .as_deref()
                    .map(|w| &w[y * row_px..(y + 1) * row_px]);

                let mut sum = 0.0f64;
                for x in 0..row_px {
                    let i = x * 4;
                    let dr = t_row[i] as f64 - c_row[i] as f64;
                    let dg = t_row[i + 1] as f64 - c_row[i + 1] as f64;
                    let db = t_row[i + 2] as f64 - c_row[i + 2] as f64;

                    let mask_bit = w_row.map_or(0.0, |w| f64::from(w[x].min(1)));
                    sum += (dr * dr + dg * dg + db * db) * (face_weight * mask_bit + 1.0);
                }
                sum
            })
            .sum()
    }
}
