use tiny_skia as sk;

use crate::error::RenderError;
use crate::triangle_scene::TriangleScene;

/// CPU rasterizer for the triangle-soup scene variant.
///
/// Rendering is deterministic given the scene's current state and
/// dimensions: the triangle list is painted back-to-front over an opaque
/// background. Output is tiny-skia's native premultiplied RGBA; with an
/// opaque background the final alpha is 255 everywhere, so the bytes double
/// as straight RGBA.
pub struct CpuRenderer;

impl CpuRenderer {
    /// full-frame render to premultiplied RGBA
    pub fn render_premul(scene: &TriangleScene) -> Result<Vec<u8>, RenderError> {
        profiling::scope!("render_premul");
        let mut pix = sk::Pixmap::new(scene.width, scene.height)
            .ok_or_else(|| RenderError::Failed("zero-sized pixmap".to_owned()))?;

        let [r, g, b, a] = scene.background;
        pix.fill(sk::Color::from_rgba8(r, g, b, a));

        for tri in &scene.triangles {
            draw_triangle(&mut pix, tri);
        }

        Ok(pix.data().to_vec())
    }
}

fn draw_triangle(pix: &mut sk::Pixmap, tri: &crate::dna::Triangle) {
    profiling::scope!("draw_triangle");

    // quick reject: integer bbox fully outside the pixmap
    let (w, h) = (pix.width() as i32, pix.height() as i32);
    let min_x = tri.points.iter().map(|p| p.0).min().unwrap_or(0);
    let min_y = tri.points.iter().map(|p| p.1).min().unwrap_or(0);
    let max_x = tri.points.iter().map(|p| p.0).max().unwrap_or(0);
    let max_y = tri.points.iter().map(|p| p.1).max().unwrap_or(0);
    if max_x < 0 || max_y < 0 || min_x >= w || min_y >= h {
        return;
    }

    let mut pb = sk::PathBuilder::new();
    pb.move_to(tri.points[0].0 as f32, tri.points[0].1 as f32);
    for &(x, y) in &tri.points[1..] {
        pb.line_to(x as f32, y as f32);
    }
    pb.close();
    let Some(path) = pb.finish() else {
        return; // degenerate (all points collinear/coincident): nothing to paint
    };

    let [r, g, b, a] = tri.rgba;
    let mut paint = sk::Paint::default();
    paint.anti_alias = true;
    paint.shader = sk::Shader::SolidColor(sk::Color::from_rgba8(r, g, b, a));

    pix.fill_path(
        &path,
        &paint,
        sk::FillRule::Winding,
        sk::Transform::identity(),
        None,
    );
}

/// Premultiply straight RGBA, used once on the loaded target image so it
/// compares against renders in the same color space.
pub fn premultiply(p: &[u8]) -> Vec<u8> {
    profiling::scope!("premultiply");

    let mut out = vec![0u8; p.len()];
    let mut i = 0usize;
    while i + 3 < p.len() {
        let a = p[i + 3] as u16;
        // (x * a + 127) / 255 is a fast rounded divide-by-255
        out[i] = ((p[i] as u16 * a + 127) / 255) as u8;
        out[i + 1] = ((p[i + 1] as u16 * a + 127) / 255) as u8;
        out[i + 2] = ((p[i + 2] as u16 * a + 127) / 255) as u8;
        out[i + 3] = a as u8;
        i += 4;
    }
    out
}
