//! Diagnostic overlay drawing

use camera_capture::VideoFrame;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::analysis::FrameAnalysis;
use crate::geometry::Point;
use crate::DmsError;

const FACE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const LANDMARK_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const CENTER_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const ALERT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const BORDER_WIDTH: u32 = 4;

/// Draw face box, eye/mouth points, stabilized eye center and, when drowsy,
/// a red border onto a copy of the frame.
pub fn annotate(frame: &VideoFrame, analysis: &FrameAnalysis) -> Result<RgbImage, DmsError> {
    let mut img = frame
        .to_rgb_image()
        .map_err(|e| DmsError::Overlay(e.to_string()))?;

    let face = analysis.face;
    if face.width >= 1.0 && face.height >= 1.0 {
        let rect = Rect::at(face.x as i32, face.y as i32)
            .of_size(face.width as u32, face.height as u32);
        draw_hollow_rect_mut(&mut img, rect, FACE_COLOR);
    }

    let eye_points = analysis.eye_points.iter().flatten();
    for p in eye_points.chain(analysis.mouth_points.iter()) {
        draw_filled_circle_mut(&mut img, pixel(p), 2, LANDMARK_COLOR);
    }

    if let Some(center) = &analysis.eye_center {
        draw_filled_circle_mut(&mut img, pixel(center), 3, CENTER_COLOR);
    }

    if analysis.verdict.is_drowsy {
        draw_border(&mut img, ALERT_COLOR);
    }

    Ok(img)
}

fn pixel(p: &Point) -> (i32, i32) {
    (p.x.round() as i32, p.y.round() as i32)
}

fn draw_border(img: &mut RgbImage, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    for inset in 0..BORDER_WIDTH {
        if w <= 2 * inset || h <= 2 * inset {
            break;
        }
        let rect = Rect::at(inset as i32, inset as i32).of_size(w - 2 * inset, h - 2 * inset);
        draw_hollow_rect_mut(img, rect, color);
    }
}
