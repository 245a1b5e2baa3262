use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use ndarray::{Array2, Array3, ArrayView1, ArrayView2, ArrayView3, s};
use serde::{Deserialize, Serialize};

use super::{Detections, InferenceError, MaskGrid, RawDetection};

const LETTERBOX_FILL: u8 = 114;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeParams {
    pub input_size: u32,
    pub confidence_floor: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    pub mask_threshold: f32,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            confidence_floor: 0.25,
            iou_threshold: 0.7,
            max_detections: 300,
            mask_threshold: 0.5,
        }
    }
}

/// Placement of the source image inside the square network input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub size: u32,
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
    pub src_width: u32,
    pub src_height: u32,
}

impl Letterbox {
    pub fn new(src_width: u32, src_height: u32, size: u32) -> Self {
        let src_width = src_width.max(1);
        let src_height = src_height.max(1);
        let scale = (size as f32 / src_width as f32).min(size as f32 / src_height as f32);
        let (new_w, new_h) = Self::scaled(src_width, src_height, scale, size);
        Self {
            size,
            scale,
            pad_x: (size - new_w) / 2,
            pad_y: (size - new_h) / 2,
            src_width,
            src_height,
        }
    }

    fn scaled(width: u32, height: u32, scale: f32, size: u32) -> (u32, u32) {
        let w = ((width as f32 * scale).round() as u32).clamp(1, size.max(1));
        let h = ((height as f32 * scale).round() as u32).clamp(1, size.max(1));
        (w, h)
    }

    pub fn resized_dimensions(&self) -> (u32, u32) {
        Self::scaled(self.src_width, self.src_height, self.scale, self.size)
    }

    pub fn to_canvas(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.scale + self.pad_x as f32,
            y * self.scale + self.pad_y as f32,
        )
    }

    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_x as f32) / self.scale,
            (y - self.pad_y as f32) / self.scale,
        )
    }
}

/// Resizes `image` into a gray-padded `size`x`size` canvas and returns it as
/// a CHW tensor scaled to `[0, 1]`.
pub fn letterbox(image: &RgbImage, size: u32) -> (Array3<f32>, Letterbox) {
    let lb = Letterbox::new(image.width(), image.height(), size);
    let (new_w, new_h) = lb.resized_dimensions();
    let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let mut canvas = RgbImage::from_pixel(size, size, Rgb([LETTERBOX_FILL; 3]));
    imageops::replace(&mut canvas, &resized, lb.pad_x as i64, lb.pad_y as i64);

    let side = size as usize;
    let tensor = Array3::from_shape_fn((3, side, side), |(c, y, x)| {
        canvas.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    });
    (tensor, lb)
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    anchor: usize,
    class: usize,
    score: f32,
    // x1, y1, x2, y2 in canvas pixels
    bbox: [f32; 4],
}

/// Turns raw segmentation head outputs into detections in source-image space.
///
/// `preds` is `(4 + classes + coefficients, anchors)` with `cx, cy, w, h`
/// rows first; `protos` is `(coefficients, height, width)`.
pub fn decode(
    preds: ArrayView2<f32>,
    protos: ArrayView3<f32>,
    letterbox: &Letterbox,
    params: &DecodeParams,
) -> Result<Detections, InferenceError> {
    let (rows, anchors) = preds.dim();
    let (num_coeffs, _, _) = protos.dim();
    if rows <= 4 + num_coeffs {
        return Err(InferenceError::OutputShape(format!(
            "prediction rows {} leave no room for classes with {} mask coefficients",
            rows, num_coeffs
        )));
    }
    let num_classes = rows - 4 - num_coeffs;

    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let column = preds.column(anchor);
        let Some((class, score)) = best_class(column.slice(s![4..4 + num_classes])) else {
            continue;
        };
        if score < params.confidence_floor {
            continue;
        }
        let (cx, cy, w, h) = (column[0], column[1], column[2], column[3]);
        candidates.push(Candidate {
            anchor,
            class,
            score,
            bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
        });
    }

    let kept = non_max_suppression(candidates, params.iou_threshold, params.max_detections);
    log::debug!("Decoded {} detections from {} anchors", kept.len(), anchors);

    let detections = kept
        .iter()
        .map(|candidate| {
            let coeffs = preds.slice(s![4 + num_classes.., candidate.anchor]);
            let proto_mask = compose_mask(coeffs, protos);
            RawDetection {
                mask: project_mask(&proto_mask, candidate.bbox, letterbox, params.mask_threshold),
                confidence: candidate.score,
                class_index: candidate.class as i64,
            }
        })
        .collect::<Vec<_>>();

    Ok(Detections::from(detections))
}

fn best_class(scores: ArrayView1<f32>) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, score)| score.is_finite())
        .fold(None, |best, (idx, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((idx, score)),
        })
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = w * h;
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

// Greedy per-class suppression, highest score first.
fn non_max_suppression(
    mut candidates: Vec<Candidate>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept
            .iter()
            .any(|k| k.class == candidate.class && iou(&k.bbox, &candidate.bbox) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn compose_mask(coeffs: ArrayView1<f32>, protos: ArrayView3<f32>) -> Array2<f32> {
    let (_, height, width) = protos.dim();
    Array2::from_shape_fn((height, width), |(y, x)| {
        let logit: f32 = coeffs
            .iter()
            .zip(protos.slice(s![.., y, x]).iter())
            .map(|(c, p)| c * p)
            .sum();
        sigmoid(logit)
    })
}

// Samples the prototype-resolution mask at every source pixel whose center
// falls inside the detection box.
// The mask only covers the detection box; its origin places it in the
// source image.
fn project_mask(proto_mask: &Array2<f32>, bbox: [f32; 4], lb: &Letterbox, threshold: f32) -> MaskGrid {
    let (src_w, src_h) = (lb.src_width as usize, lb.src_height as usize);

    let (sx1, sy1) = lb.to_source(bbox[0], bbox[1]);
    let (sx2, sy2) = lb.to_source(bbox[2], bbox[3]);
    let x_start = (sx1.floor().max(0.0) as usize).min(src_w);
    let y_start = (sy1.floor().max(0.0) as usize).min(src_h);
    let x_end = (sx2.ceil().max(0.0) as usize).clamp(x_start, src_w);
    let y_end = (sy2.ceil().max(0.0) as usize).clamp(y_start, src_h);

    let mut mask = MaskGrid::zeros(y_end - y_start, x_end - x_start).with_origin(y_start, x_start);

    let (proto_h, proto_w) = proto_mask.dim();
    if proto_h == 0 || proto_w == 0 {
        return mask;
    }

    let size = lb.size as f32;
    for row in y_start..y_end {
        for col in x_start..x_end {
            let (cx, cy) = lb.to_canvas(col as f32 + 0.5, row as f32 + 0.5);
            if cx < bbox[0] || cx >= bbox[2] || cy < bbox[1] || cy >= bbox[3] {
                continue;
            }
            let px = ((cx / size * proto_w as f32) as usize).min(proto_w - 1);
            let py = ((cy / size * proto_h as f32) as usize).min(proto_h - 1);
            if proto_mask[[py, px]] > threshold {
                mask.set(row - y_start, col - x_start, 1.0);
            }
        }
    }
    mask
}
