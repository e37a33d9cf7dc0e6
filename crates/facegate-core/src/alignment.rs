//! Similarity transforms for face crops.
//!
//! Used twice per face: the recognizer needs a 112x112 crop aligned to the
//! canonical five-point template, and the landmark network needs a square
//! crop centred on the detection box.

/// Five-point template for a 112x112 aligned face.
const TEMPLATE_112: [(f32, f32); 5] = [
    (38.2946, 51.6963),
    (73.5318, 51.5014),
    (56.0252, 71.7366),
    (41.5493, 92.3655),
    (70.7299, 92.2041),
];

pub const ALIGNED_SIZE: usize = 112;

/// 4-DOF similarity: `dst = [[a, -b], [b, a]] * src + [tx, ty]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    pub a: f32,
    pub b: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Similarity {
    pub const IDENTITY: Similarity = Similarity { a: 1.0, b: 0.0, tx: 0.0, ty: 0.0 };

    /// Pure scale about `center`, then shift so `center` lands on `(out_c, out_c)`.
    pub fn scale_about(center: (f32, f32), scale: f32, out_c: f32) -> Self {
        Self {
            a: scale,
            b: 0.0,
            tx: out_c - scale * center.0,
            ty: out_c - scale * center.1,
        }
    }

    /// Least-squares fit mapping `src` points onto `dst` points.
    pub fn estimate(src: &[(f32, f32)], dst: &[(f32, f32)]) -> Self {
        // Normal equations for unknowns [a, b, tx, ty]:
        //   sx*a - sy*b + tx = dx
        //   sy*a + sx*b + ty = dy
        let mut ata = [[0.0f32; 4]; 4];
        let mut atb = [0.0f32; 4];
        for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
            for (row, rhs) in [([sx, -sy, 1.0, 0.0], dx), ([sy, sx, 0.0, 1.0], dy)] {
                for j in 0..4 {
                    for k in 0..4 {
                        ata[j][k] += row[j] * row[k];
                    }
                    atb[j] += row[j] * rhs;
                }
            }
        }

        match solve4(ata, atb) {
            Some([a, b, tx, ty]) => Self { a, b, tx, ty },
            None => Self::IDENTITY,
        }
    }

    pub fn apply(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (self.a * x - self.b * y + self.tx, self.b * x + self.a * y + self.ty)
    }

    /// Inverse transform, or `None` when degenerate.
    pub fn invert(&self) -> Option<Self> {
        let det = self.a * self.a + self.b * self.b;
        if det.abs() < 1e-12 {
            return None;
        }
        let a = self.a / det;
        let b = -self.b / det;
        Some(Self {
            a,
            b,
            tx: -(a * self.tx - b * self.ty),
            ty: -(b * self.tx + a * self.ty),
        })
    }
}

/// Gaussian elimination with partial pivoting.
fn solve4(mut m: [[f32; 4]; 4], mut rhs: [f32; 4]) -> Option<[f32; 4]> {
    for col in 0..4 {
        let pivot = (col..4).max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))?;
        m.swap(col, pivot);
        rhs.swap(col, pivot);
        if m[col][col].abs() < 1e-12 {
            return None;
        }
        for row in col + 1..4 {
            let f = m[row][col] / m[col][col];
            for k in col..4 {
                m[row][k] -= f * m[col][k];
            }
            rhs[row] -= f * rhs[col];
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        let tail: f32 = (i + 1..4).map(|j| m[i][j] * x[j]).sum();
        x[i] = (rhs[i] - tail) / m[i][i];
    }
    Some(x)
}

/// Warp a grayscale frame into an `out_size` square using `transform`
/// (frame → output). Pixels outside the frame are black.
pub fn warp(frame: &[u8], width: usize, height: usize, transform: &Similarity, out_size: usize) -> Vec<u8> {
    let mut out = vec![0u8; out_size * out_size];
    let Some(inverse) = transform.invert() else {
        return out;
    };

    let sample = |x: i64, y: i64| -> f32 {
        if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
            0.0
        } else {
            frame[y as usize * width + x as usize] as f32
        }
    };

    for oy in 0..out_size {
        for ox in 0..out_size {
            let (sx, sy) = inverse.apply((ox as f32, oy as f32));
            let (x0, y0) = (sx.floor(), sy.floor());
            let (fx, fy) = (sx - x0, sy - y0);
            let (x0, y0) = (x0 as i64, y0 as i64);

            let v = sample(x0, y0) * (1.0 - fx) * (1.0 - fy)
                + sample(x0 + 1, y0) * fx * (1.0 - fy)
                + sample(x0, y0 + 1) * (1.0 - fx) * fy
                + sample(x0 + 1, y0 + 1) * fx * fy;
            out[oy * out_size + ox] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Align a face to the canonical 112x112 template from its five landmarks.
pub fn align_face(frame: &[u8], width: u32, height: u32, landmarks: &[(f32, f32); 5]) -> Vec<u8> {
    let transform = Similarity::estimate(landmarks, &TEMPLATE_112);
    warp(frame, width as usize, height as usize, &transform, ALIGNED_SIZE)
}
