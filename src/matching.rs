//! Grayscale template matching by zero-mean normalized cross-correlation.
//!
//! Every placement is scored and the maximum returned. Window statistics come
//! from summed-area tables; the cross term is computed directly for small
//! searches and through a 2-D FFT otherwise.

use image::GrayImage;
use serde::Serialize;

/// Above this many multiply-adds the FFT path is cheaper.
const DIRECT_WORK_LIMIT: u64 = 1 << 24;
const FLAT_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchResult {
    /// Correlation in [-1, 1].
    pub score: f64,
    pub x: u32,
    pub y: u32,
}

/// Summed-area tables for window sum and sum of squares.
struct Integral {
    stride: usize,
    sum: Vec<u64>,
    sq: Vec<u64>,
}

impl Integral {
    fn new(img: &GrayImage) -> Self {
        let (w, h) = (img.width() as usize, img.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0u64; stride * (h + 1)];
        let mut sq = vec![0u64; stride * (h + 1)];
        for y in 0..h {
            let mut row_sum = 0u64;
            let mut row_sq = 0u64;
            for x in 0..w {
                let v = img.get_pixel(x as u32, y as u32)[0] as u64;
                row_sum += v;
                row_sq += v * v;
                sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row_sum;
                sq[(y + 1) * stride + x + 1] = sq[y * stride + x + 1] + row_sq;
            }
        }
        Self { stride, sum, sq }
    }

    fn window(&self, table: &[u64], x: usize, y: usize, w: usize, h: usize) -> u64 {
        let s = self.stride;
        table[(y + h) * s + x + w] + table[y * s + x] - table[y * s + x + w] - table[(y + h) * s + x]
    }
}

/// Zero-mean template with its energy.
struct Prepared {
    width: u32,
    height: u32,
    centered: Vec<f64>,
    energy: f64,
}

impl Prepared {
    fn new(template: &GrayImage) -> Self {
        let n = (template.width() * template.height()) as f64;
        let mean = template.pixels().map(|p| p[0] as f64).sum::<f64>() / n;
        let centered: Vec<f64> = template.pixels().map(|p| p[0] as f64 - mean).collect();
        let energy = centered.iter().map(|v| v * v).sum();
        Self { width: template.width(), height: template.height(), centered, energy }
    }
}

struct Search<'a> {
    image: &'a GrayImage,
    integral: Integral,
    template: Prepared,
}

impl<'a> Search<'a> {
    fn new(image: &'a GrayImage, template: &GrayImage) -> Self {
        Self { image, integral: Integral::new(image), template: Prepared::new(template) }
    }

    fn positions(&self) -> (u32, u32) {
        (self.image.width() - self.template.width + 1, self.image.height() - self.template.height + 1)
    }

    /// Correlation from a precomputed cross term `sum(p * t_centered)`.
    fn normalize(&self, x: u32, y: u32, cross: f64) -> f64 {
        let t = &self.template;
        if t.energy < FLAT_EPSILON {
            return 0.0;
        }
        let (tw, th) = (t.width as usize, t.height as usize);
        let n = (tw * th) as f64;
        let sum = self.integral.window(&self.integral.sum, x as usize, y as usize, tw, th) as f64;
        let sq = self.integral.window(&self.integral.sq, x as usize, y as usize, tw, th) as f64;
        let window_energy = sq - sum * sum / n;
        if window_energy < FLAT_EPSILON {
            return 0.0;
        }
        (cross / (t.energy * window_energy).sqrt()).clamp(-1.0, 1.0)
    }

    fn cross_at(&self, x: u32, y: u32) -> f64 {
        let t = &self.template;
        let (tw, th) = (t.width as usize, t.height as usize);
        let raw = self.image.as_raw();
        let stride = self.image.width() as usize;
        let mut cross = 0.0;
        for ty in 0..th {
            let row = (y as usize + ty) * stride + x as usize;
            let pixels = &raw[row..row + tw];
            let weights = &t.centered[ty * tw..(ty + 1) * tw];
            for (p, w) in pixels.iter().zip(weights) {
                cross += *p as f64 * w;
            }
        }
        cross
    }

    fn score_at(&self, x: u32, y: u32) -> f64 {
        self.normalize(x, y, self.cross_at(x, y))
    }

    fn best_direct(&self) -> MatchResult {
        let (nx, ny) = self.positions();
        let mut best = MatchResult { score: f64::NEG_INFINITY, x: 0, y: 0 };
        for y in 0..ny {
            for x in 0..nx {
                let score = self.score_at(x, y);
                if score > best.score {
                    best = MatchResult { score, x, y };
                }
            }
        }
        best
    }

    fn best_fft(&self) -> MatchResult {
        let (nx, ny) = self.positions();
        let cross = fft::cross_correlate(self.image, &self.template.centered, self.template.width, self.template.height);
        let stride = cross.width;
        let mut best = MatchResult { score: f64::NEG_INFINITY, x: 0, y: 0 };
        for y in 0..ny {
            for x in 0..nx {
                let score = self.normalize(x, y, cross.values[y as usize * stride + x as usize]);
                if score > best.score {
                    best = MatchResult { score, x, y };
                }
            }
        }
        // Report the exact score at the chosen origin.
        best.score = self.score_at(best.x, best.y);
        best
    }
}

/// Best match of `template` inside `image`: the maximum correlation over
/// every placement.
///
/// Returns `None` when the template is empty or does not fit.
pub fn match_template(image: &GrayImage, template: &GrayImage) -> Option<MatchResult> {
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || tw > image.width() || th > image.height() {
        return None;
    }

    let search = Search::new(image, template);
    let (nx, ny) = search.positions();
    let work = nx as u64 * ny as u64 * tw as u64 * th as u64;
    let best = if work <= DIRECT_WORK_LIMIT { search.best_direct() } else { search.best_fft() };
    tracing::debug!(score = best.score, x = best.x, y = best.y, work, "template match");
    Some(best)
}

mod fft {
    //! Radix-2 complex FFT, just enough for 2-D cross-correlation.

    use image::GrayImage;
    use std::f64::consts::PI;
    use std::ops::{Add, Mul, Sub};

    #[derive(Debug, Clone, Copy, Default, PartialEq)]
    pub(super) struct Complex {
        re: f64,
        im: f64,
    }

    impl Complex {
        fn new(re: f64, im: f64) -> Self {
            Self { re, im }
        }

        fn conj(self) -> Self {
            Self::new(self.re, -self.im)
        }

        fn scale(self, k: f64) -> Self {
            Self::new(self.re * k, self.im * k)
        }

        /// Multiply by `-i`.
        fn times_neg_i(self) -> Self {
            Self::new(self.im, -self.re)
        }
    }

    impl Add for Complex {
        type Output = Self;
        fn add(self, o: Self) -> Self {
            Self::new(self.re + o.re, self.im + o.im)
        }
    }

    impl Sub for Complex {
        type Output = Self;
        fn sub(self, o: Self) -> Self {
            Self::new(self.re - o.re, self.im - o.im)
        }
    }

    impl Mul for Complex {
        type Output = Self;
        fn mul(self, o: Self) -> Self {
            Self::new(self.re * o.re - self.im * o.im, self.re * o.im + self.im * o.re)
        }
    }

    /// Plan for one power-of-two length.
    struct Plan {
        n: usize,
        twiddles: Vec<Complex>,
        reversed: Vec<usize>,
    }

    impl Plan {
        fn new(n: usize) -> Self {
            let bits = n.trailing_zeros();
            let reversed = (0..n)
                .map(|i| if bits == 0 { 0 } else { i.reverse_bits() >> (usize::BITS - bits) })
                .collect();
            let twiddles = (0..n / 2)
                .map(|k| {
                    let angle = -2.0 * PI * k as f64 / n as f64;
                    Complex::new(angle.cos(), angle.sin())
                })
                .collect();
            Self { n, twiddles, reversed }
        }

        fn run(&self, data: &mut [Complex], inverse: bool) {
            let n = self.n;
            for i in 0..n {
                let j = self.reversed[i];
                if i < j {
                    data.swap(i, j);
                }
            }
            let mut len = 2;
            while len <= n {
                let half = len / 2;
                let step = n / len;
                for start in (0..n).step_by(len) {
                    for k in 0..half {
                        let w = self.twiddles[k * step];
                        let w = if inverse { w.conj() } else { w };
                        let u = data[start + k];
                        let v = data[start + k + half] * w;
                        data[start + k] = u + v;
                        data[start + k + half] = u - v;
                    }
                }
                len <<= 1;
            }
            if inverse {
                let k = 1.0 / n as f64;
                data.iter_mut().for_each(|c| *c = c.scale(k));
            }
        }
    }

    fn transform_2d(data: &mut [Complex], width: usize, height: usize, inverse: bool) {
        let rows = Plan::new(width);
        for row in data.chunks_mut(width) {
            rows.run(row, inverse);
        }
        let cols = Plan::new(height);
        let mut column = vec![Complex::default(); height];
        for x in 0..width {
            for (y, c) in column.iter_mut().enumerate() {
                *c = data[y * width + x];
            }
            cols.run(&mut column, inverse);
            for (y, c) in column.iter().enumerate() {
                data[y * width + x] = *c;
            }
        }
    }

    pub(super) struct CrossMap {
        pub(super) width: usize,
        pub(super) values: Vec<f64>,
    }

    /// `out[y][x] = sum over (tx, ty) of image[y + ty][x + tx] * template[ty][tx]`.
    ///
    /// Both real signals share one forward transform (image in the real
    /// part, template in the imaginary part). Padding to at least the image
    /// size keeps every valid placement free of wrap-around.
    pub(super) fn cross_correlate(image: &GrayImage, template: &[f64], tw: u32, th: u32) -> CrossMap {
        let width = (image.width() as usize).next_power_of_two();
        let height = (image.height() as usize).next_power_of_two();
        let mut data = vec![Complex::default(); width * height];
        for (x, y, p) in image.enumerate_pixels() {
            data[y as usize * width + x as usize].re = p[0] as f64;
        }
        for ty in 0..th as usize {
            for tx in 0..tw as usize {
                data[ty * width + tx].im = template[ty * tw as usize + tx];
            }
        }

        transform_2d(&mut data, width, height, false);

        // Split Z = A + iB into the two spectra and form A * conj(B) in place.
        for v in 0..height {
            for u in 0..width {
                let k = v * width + u;
                let m = ((height - v) % height) * width + (width - u) % width;
                if m < k {
                    continue;
                }
                let (zk, zm) = (data[k], data[m]);
                let a_k = (zk + zm.conj()).scale(0.5);
                let b_k = (zk - zm.conj()).scale(0.5).times_neg_i();
                let a_m = (zm + zk.conj()).scale(0.5);
                let b_m = (zm - zk.conj()).scale(0.5).times_neg_i();
                data[k] = a_k * b_k.conj();
                data[m] = a_m * b_m.conj();
            }
        }

        transform_2d(&mut data, width, height, true);
        CrossMap { width, values: data.into_iter().map(|c| c.re).collect() }
    }

}
