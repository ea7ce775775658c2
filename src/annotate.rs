//! Display rendering: boxes with label tabs, a verdict bar and the wear
//! timer, JPEG-encoded.

use ab_glyph::{FontRef, PxScale};
use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::detect::{DetectionBox, FrameVerdict};

pub const JPEG_QUALITY: u8 = 85;
pub const HELMET_COLOR: Rgb<u8> = Rgb([34, 197, 94]);
pub const ALERT_COLOR: Rgb<u8> = Rgb([239, 68, 68]);
pub const TIMER_COLOR: Rgb<u8> = Rgb([0, 255, 255]);
const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const STROKE: i32 = 2;
const BAR_HEIGHT: u32 = 6;
const LABEL_SCALE: f32 = 14.0;
const TIMER_SCALE: f32 = 24.0;
const TIMER_ORIGIN: (i32, i32) = (12, BAR_HEIGHT as i32 + 8);

static FONT_BYTES: &[u8] = include_bytes!("../assets/fonts/DejaVuSansMono.ttf");

pub fn box_color(b: &DetectionBox) -> Rgb<u8> {
    if b.is_helmet {
        HELMET_COLOR
    } else {
        ALERT_COLOR
    }
}

/// `"{label} {percent}%"`, percent truncated.
pub fn label_text(b: &DetectionBox) -> String {
    format!("{} {}%", b.label, (b.confidence * 100.0) as u32)
}

/// Draw every box with its label tab, a bar along the top edge in the
/// verdict color, and `Time: {timer_display}` in the top-left corner.
pub fn draw_verdict(image: &mut RgbImage, verdict: &FrameVerdict, timer_display: &str) {
    let font = match FontRef::try_from_slice(FONT_BYTES) {
        Ok(font) => Some(font),
        Err(e) => {
            log::warn!("label font unavailable, drawing boxes only: {}", e);
            None
        }
    };

    for b in &verdict.boxes {
        let color = box_color(b);
        for inset in 0..STROKE {
            let w = b.w as i32 - 2 * inset;
            let h = b.h as i32 - 2 * inset;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(b.x as i32 + inset, b.y as i32 + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(image, rect, color);
        }

        if let Some(font) = font.as_ref() {
            let text = label_text(b);
            let scale = PxScale::from(LABEL_SCALE);
            let (tw, th) = text_size(scale, font, &text);
            let ly = (b.y as i32 - th as i32 - 6).max(0);
            let tab = Rect::at(b.x as i32, ly).of_size(tw + 10, th + 8);
            draw_filled_rect_mut(image, tab, color);
            draw_text_mut(image, LABEL_TEXT_COLOR, b.x as i32 + 5, ly + 4, scale, font, &text);
        }
    }

    let bar = Rect::at(0, 0).of_size(image.width(), BAR_HEIGHT.min(image.height()));
    let color = if verdict.helmet_present {
        HELMET_COLOR
    } else {
        ALERT_COLOR
    };
    draw_filled_rect_mut(image, bar, color);

    if let Some(font) = font.as_ref() {
        let (x, y) = TIMER_ORIGIN;
        let text = format!("Time: {}", timer_display);
        draw_text_mut(image, TIMER_COLOR, x, y, PxScale::from(TIMER_SCALE), font, &text);
    }
}

pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode_image(image)
        .context("failed to encode annotated frame")?;
    Ok(out)
}

/// Annotate a copy of `image` and encode it.
pub fn render(image: &RgbImage, verdict: &FrameVerdict, timer_display: &str) -> Result<Vec<u8>> {
    let mut canvas = image.clone();
    draw_verdict(&mut canvas, verdict, timer_display);
    encode_jpeg(&canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoxOrigin, HelmetClass};

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn helmet_box(x: u32, y: u32) -> DetectionBox {
        DetectionBox {
            x,
            y,
            w: 40,
            h: 30,
            label: "with helmet".to_string(),
            confidence: 0.9,
            class: HelmetClass::Helmet,
            is_helmet: true,
            origin: BoxOrigin::Detector,
        }
    }

    fn positive(boxes: Vec<DetectionBox>) -> FrameVerdict {
        FrameVerdict {
            helmet_present: true,
            confidence: 0.9,
            boxes,
            ..FrameVerdict::empty()
        }
    }

    fn any_pixel<F>(image: &RgbImage, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>, f: F) -> bool
    where
        F: Fn(&Rgb<u8>) -> bool,
    {
        ys.flat_map(|y| xs.clone().map(move |x| (x, y)))
            .any(|(x, y)| f(image.get_pixel(x, y)))
    }

    #[test]
    fn draws_box_edges_and_bar() {
        let mut image = RgbImage::from_pixel(160, 120, BLACK);
        draw_verdict(&mut image, &positive(vec![helmet_box(40, 60)]), "00:00");

        assert_eq!(image.get_pixel(40, 75), &HELMET_COLOR);
        assert_eq!(image.get_pixel(41, 75), &HELMET_COLOR);
        assert_eq!(image.get_pixel(60, 75), &BLACK);
        assert_eq!(image.get_pixel(150, 0), &HELMET_COLOR);
    }

    #[test]
    fn label_tab_sits_above_the_box() {
        let mut image = RgbImage::from_pixel(160, 120, BLACK);
        let b = helmet_box(40, 60);
        assert_eq!(label_text(&b), "with helmet 90%");
        draw_verdict(&mut image, &positive(vec![b]), "00:00");

        // Tab fill left of the text, just above the box edge.
        assert_eq!(image.get_pixel(41, 58), &HELMET_COLOR);
        // White glyph pixels inside the tab.
        assert!(any_pixel(&image, 45..159, 30..60, |p| p.0.iter().all(|&c| c > 150)));
    }

    #[test]
    fn tab_is_clamped_to_the_top_edge() {
        let mut image = RgbImage::from_pixel(160, 120, BLACK);
        draw_verdict(&mut image, &positive(vec![helmet_box(60, 2)]), "00:00");
        assert!(any_pixel(&image, 60..159, 0..30, |p| p.0.iter().all(|&c| c > 150)));
    }

    #[test]
    fn timer_is_painted_top_left() {
        let mut image = RgbImage::from_pixel(200, 80, BLACK);
        draw_verdict(&mut image, &FrameVerdict::empty(), "01:05");

        let (x, y) = (TIMER_ORIGIN.0 as u32, TIMER_ORIGIN.1 as u32);
        assert!(any_pixel(&image, x..x + 150, y..y + 30, |p| p.0[0] == 0 && p.0[2] > 200));
        assert_eq!(image.get_pixel(20, 0), &ALERT_COLOR);
        assert_eq!(image.get_pixel(199, 79), &BLACK);
    }

    #[test]
    fn render_produces_jpeg() {
        let image = RgbImage::from_pixel(32, 32, Rgb([90, 90, 90]));
        let bytes = render(&image, &FrameVerdict::empty(), "00:00").unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert!(crate::frame::decode_frame(&bytes).is_ok());
    }
}
