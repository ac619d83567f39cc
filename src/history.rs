//! Binary improvement logs, wire-compatible with the original tool's
//! big-endian stream format.
//!
//! Three logs live under one run directory:
//! - `bestScenes.log`: iteration index (i32) + fitness (f64) + scene record,
//!   appended whenever a new global best appears
//! - `culture.<age>.<culture>.log`: one scene record per within-culture
//!   improvement
//! - `age.<age>.log`: the promoted scene record per completed culture

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::dna::{Triangle, TRIANGLE_POINTS};
use crate::scene::Scene;
use crate::triangle_scene::TriangleScene;

fn write_i32<W: Write>(w: &mut W, v: i32) -> io::Result<()> {
    w.write_all(&v.to_be_bytes())
}

fn write_f64<W: Write>(w: &mut W, v: f64) -> io::Result<()> {
    w.write_all(&v.to_be_bytes())
}

fn read_i32<R: Read>(r: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

fn read_f64<R: Read>(r: &mut R) -> io::Result<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_be_bytes(buf))
}

/// scene record: background RGBA (4 bytes), width (i32), height (i32),
/// fitness (f64), then per triangle each point as two i32 coordinates
/// followed by 4 bytes RGBA. the triangle count is implied by the fixed
/// scene geometry, so it is not part of the record.
pub fn write_scene_record<W: Write>(w: &mut W, scene: &TriangleScene) -> io::Result<()> {
    w.write_all(&scene.background)?;
    write_i32(w, scene.width as i32)?;
    write_i32(w, scene.height as i32)?;
    write_f64(w, scene.fitness().unwrap_or(f64::MAX))?;
    for tri in &scene.triangles {
        for &(x, y) in &tri.points {
            write_i32(w, x)?;
            write_i32(w, y)?;
        }
        w.write_all(&tri.rgba)?;
    }
    Ok(())
}

pub fn read_scene_record<R: Read>(r: &mut R, triangle_count: usize) -> io::Result<TriangleScene> {
    let mut background = [0u8; 4];
    r.read_exact(&mut background)?;
    let width = read_i32(r)? as u32;
    let height = read_i32(r)? as u32;
    let fitness = read_f64(r)?;

    let mut triangles = Vec::with_capacity(triangle_count);
    for _ in 0..triangle_count {
        let mut points = [(0, 0); TRIANGLE_POINTS];
        for p in &mut points {
            *p = (read_i32(r)?, read_i32(r)?);
        }
        let mut rgba = [0u8; 4];
        r.read_exact(&mut rgba)?;
        triangles.push(Triangle { points, rgba });
    }

    let mut scene = TriangleScene::from_parts(triangles, background, width, height);
    scene.set_fitness(fitness);
    Ok(scene)
}

/// genome scene record: width (i32), height (i32), then the toolkit's text
/// serialization length-prefixed as i32 + UTF-8 bytes
pub fn write_genome_record<W: Write>(
    w: &mut W,
    width: u32,
    height: u32,
    serialised: &str,
) -> io::Result<()> {
    write_i32(w, width as i32)?;
    write_i32(w, height as i32)?;
    write_i32(w, serialised.len() as i32)?;
    w.write_all(serialised.as_bytes())
}

pub fn read_genome_record<R: Read>(r: &mut R) -> io::Result<(u32, u32, String)> {
    let width = read_i32(r)? as u32;
    let height = read_i32(r)? as u32;
    let len = read_i32(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    let text = String::from_utf8(buf)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok((width, height, text))
}

fn write_scene<W: Write>(w: &mut W, scene: &Scene) -> io::Result<()> {
    match scene {
        Scene::Triangles(s) => write_scene_record(w, s),
        Scene::Genome(s) => write_genome_record(w, s.width(), s.height(), &s.serialise()),
    }
}

/// one `bestScenes.log` entry
pub struct BestEntry {
    pub iteration: i32,
    pub fitness: f64,
    pub scene: TriangleScene,
}

/// read every entry of a best-scenes log written for triangle scenes
pub fn read_best_entries(path: &Path, triangle_count: usize) -> io::Result<Vec<BestEntry>> {
    let mut r = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    loop {
        let iteration = match read_i32(&mut r) {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        };
        let fitness = read_f64(&mut r)?;
        let scene = read_scene_record(&mut r, triangle_count)?;
        entries.push(BestEntry {
            iteration,
            fitness,
            scene,
        });
    }
    Ok(entries)
}

/// Writers for one run's log directory. The directory is wiped and
/// recreated on construction, matching the original tool.
pub struct HistoryLog {
    dir: PathBuf,
    best: BufWriter<File>,
    culture: Option<BufWriter<File>>,
}

impl HistoryLog {
    pub fn create(dir: &Path) -> io::Result<Self> {
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        fs::create_dir_all(dir)?;
        let best = BufWriter::new(File::create(dir.join("bestScenes.log"))?);
        Ok(Self {
            dir: dir.to_path_buf(),
            best,
            culture: None,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn best_scenes_path(&self) -> PathBuf {
        self.dir.join("bestScenes.log")
    }

    /// start the log for a new culture, truncating any previous attempt
    pub fn open_culture_log(&mut self, age: u32, culture: u64) -> io::Result<()> {
        if let Some(mut prev) = self.culture.take() {
            prev.flush()?;
        }
        let path = self.dir.join(format!("culture.{age}.{culture}.log"));
        self.culture = Some(BufWriter::new(File::create(path)?));
        Ok(())
    }

    /// a within-culture improvement: the new best-of-culture scene
    pub fn log_culture_improvement(&mut self, scene: &Scene) -> io::Result<()> {
        if let Some(w) = self.culture.as_mut() {
            write_scene(w, scene)?;
        }
        Ok(())
    }

    /// a new global best at the given within-culture iteration
    pub fn log_best(&mut self, iteration: u64, fitness: f64, scene: &Scene) -> io::Result<()> {
        write_i32(&mut self.best, iteration as i32)?;
        write_f64(&mut self.best, fitness)?;
        write_scene(&mut self.best, scene)?;
        self.best.flush()
    }

    /// append a completed culture's promoted scene to its age log
    pub fn append_age_log(&mut self, age: u32, scene: &Scene) -> io::Result<()> {
        let path = self.dir.join(format!("age.{age}.log"));
        let mut w = BufWriter::new(File::options().create(true).append(true).open(path)?);
        write_scene(&mut w, scene)?;
        w.flush()
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.best.flush()?;
        if let Some(w) = self.culture.as_mut() {
            w.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn scene_record_round_trips() {
        let mut rng = Pcg32::seed_from_u64(60);
        let mut scene = TriangleScene::new(7, 40, 30, [250, 251, 252, 255], &mut rng);
        scene.set_fitness(1234.5);

        let mut buf = Vec::new();
        write_scene_record(&mut buf, &scene).unwrap();
        // 4 bg + 4 w + 4 h + 8 fitness + 7 * (3 points * 8 + 4 rgba)
        assert_eq!(buf.len(), 20 + 7 * 28);

        let back = read_scene_record(&mut buf.as_slice(), 7).unwrap();
        assert_eq!(back.triangles, scene.triangles);
        assert_eq!(back.background, scene.background);
        assert_eq!(back.fitness(), Some(1234.5));
        // re-rendering reproduces the original pixels exactly
        assert_eq!(back.render().unwrap(), scene.render().unwrap());
    }

    #[test]
    fn genome_record_round_trips() {
        let mut buf = Vec::new();
        write_genome_record(&mut buf, 300, 200, "0.5,0.25").unwrap();
        let (w, h, text) = read_genome_record(&mut buf.as_slice()).unwrap();
        assert_eq!((w, h), (300, 200));
        assert_eq!(text, "0.5,0.25");
    }

    #[test]
    fn best_log_replays_in_order() {
        let mut rng = Pcg32::seed_from_u64(61);
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("run");
        let mut log = HistoryLog::create(&dir).unwrap();

        for (iteration, fitness) in [(3u64, 900.0), (17, 450.0), (90, 10.0)] {
            let mut scene = Scene::Triangles(TriangleScene::new(
                4,
                16,
                16,
                [255, 255, 255, 255],
                &mut rng,
            ));
            scene.set_fitness(fitness);
            log.log_best(iteration, fitness, &scene).unwrap();
        }
        log.flush().unwrap();

        let entries = read_best_entries(&log.best_scenes_path(), 4).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].iteration, 3);
        assert_eq!(entries[2].fitness, 10.0);
        // fitness improves monotonically across entries
        assert!(entries.windows(2).all(|w| w[1].fitness < w[0].fitness));
    }

    #[test]
    fn create_wipes_a_previous_run() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("run");
        {
            let mut log = HistoryLog::create(&dir).unwrap();
            log.open_culture_log(0, 0).unwrap();
        }
        assert!(dir.join("culture.0.0.log").exists());
        let _log = HistoryLog::create(&dir).unwrap();
        assert!(!dir.join("culture.0.0.log").exists());
        assert!(dir.join("bestScenes.log").exists());
    }
}
