//! Re-encodes downloaded emotes into PNG (static) or looping GIF (animated).
//!
//! Conversion never fails the caller: anything that can't be decoded, or a
//! source/target combination we don't handle, comes back as
//! [`Conversion::Verbatim`] and the original bytes are kept instead.

use std::{fmt, io::Cursor};

use image::{
    codecs::{
        gif::{GifDecoder, GifEncoder, Repeat},
        png::{PngDecoder, PngEncoder},
        webp::WebPDecoder,
    },
    AnimationDecoder, Delay, ExtendedColorType, Frame, ImageEncoder, ImageError, ImageFormat,
    ImageResult, RgbaImage,
};
use thiserror::Error;

/// Used for frames whose source doesn't specify a delay.
pub const DEFAULT_FRAME_DELAY_MS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Png,
    Gif,
}

impl TargetFormat {
    pub fn for_animated(animated: bool) -> Self {
        if animated {
            TargetFormat::Gif
        } else {
            TargetFormat::Png
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Png => "png",
            TargetFormat::Gif => "gif",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(self.extension())
    }
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("could not decode image")]
    Decode(#[source] ImageError),

    #[error("{0:?} image has no animation")]
    NotAnimated(ImageFormat),

    #[error("image contained no frames")]
    NoFrames,

    #[error("cannot convert to {target} (animated: {animated})")]
    Unsupported { animated: bool, target: TargetFormat },

    #[error("could not encode {target}")]
    Encode {
        target: TargetFormat,
        source: ImageError,
    },
}

#[derive(Debug)]
pub enum Conversion {
    Converted {
        bytes: Vec<u8>,
        format: TargetFormat,
        frames: usize,
    },

    /// The input should be stored as-is; carries the reason.
    Verbatim(ConvertError),
}

pub fn convert(blob: &[u8], animated: bool, target: TargetFormat) -> Conversion {
    match try_convert(blob, animated, target) {
        Ok((bytes, frames)) => Conversion::Converted {
            bytes,
            format: target,
            frames,
        },
        Err(err) => Conversion::Verbatim(err),
    }
}

fn try_convert(
    blob: &[u8],
    animated: bool,
    target: TargetFormat,
) -> Result<(Vec<u8>, usize), ConvertError> {
    let format = image::guess_format(blob).map_err(ConvertError::Decode)?;

    match (animated, target) {
        (true, TargetFormat::Gif) => {
            let frames = decode_animation(blob, format)?;
            let count = frames.len();
            let durations: Vec<u32> = frames.iter().map(frame_duration_ms).collect();
            let buffers = frames.into_iter().map(Frame::into_buffer).collect();

            Ok((write_gif(buffers, &durations)?, count))
        }
        (false, TargetFormat::Png) => {
            let image = image::load_from_memory_with_format(blob, format)
                .map_err(ConvertError::Decode)?;

            Ok((write_png(&image.to_rgba8())?, 1))
        }
        (animated, target) => Err(ConvertError::Unsupported { animated, target }),
    }
}

/// Decodes every frame of an animated GIF, WebP or APNG, composited onto the
/// full canvas.
fn decode_animation(blob: &[u8], format: ImageFormat) -> Result<Vec<Frame>, ConvertError> {
    let cursor = Cursor::new(blob);

    let frames = match format {
        ImageFormat::Gif => GifDecoder::new(cursor)
            .map_err(ConvertError::Decode)?
            .into_frames(),
        ImageFormat::WebP => {
            let decoder = WebPDecoder::new(cursor).map_err(ConvertError::Decode)?;
            if !decoder.has_animation() {
                return Err(ConvertError::NotAnimated(format));
            }
            decoder.into_frames()
        }
        ImageFormat::Png => {
            let decoder = PngDecoder::new(cursor).map_err(ConvertError::Decode)?;
            if !decoder.is_apng().map_err(ConvertError::Decode)? {
                return Err(ConvertError::NotAnimated(format));
            }
            decoder.apng().map_err(ConvertError::Decode)?.into_frames()
        }
        other => return Err(ConvertError::NotAnimated(other)),
    };

    collect_frames(frames, format)
}

/// Drains a frame iterator. If a frame fails after the first one decoded,
/// the animation is cut down to just that first frame rather than failing.
/// A source that cleanly decodes to a single frame isn't an animation.
fn collect_frames<I>(frames: I, format: ImageFormat) -> Result<Vec<Frame>, ConvertError>
where
    I: IntoIterator<Item = ImageResult<Frame>>,
{
    let mut collected = Vec::new();
    let mut degraded = false;

    for frame in frames {
        match frame {
            Ok(frame) => collected.push(frame),
            Err(err) if collected.is_empty() => return Err(ConvertError::Decode(err)),
            Err(err) => {
                log::debug!(
                    "frame {} failed to decode ({}), keeping only the first frame",
                    collected.len(),
                    err
                );
                collected.truncate(1);
                degraded = true;
                break;
            }
        }
    }

    match collected.len() {
        0 => Err(ConvertError::NoFrames),
        1 if !degraded => Err(ConvertError::NotAnimated(format)),
        _ => Ok(collected),
    }
}

fn frame_duration_ms(frame: &Frame) -> u32 {
    let (numer, denom) = frame.delay().numer_denom_ms();
    let millis = if denom == 0 { 0 } else { numer / denom };

    if millis == 0 {
        DEFAULT_FRAME_DELAY_MS
    } else {
        millis
    }
}

/// Encodes an infinitely looping GIF. `durations` pairs up with `frames`;
/// if the lengths disagree every frame gets the default delay instead.
fn write_gif(frames: Vec<RgbaImage>, durations: &[u32]) -> Result<Vec<u8>, ConvertError> {
    let encode_error = |source| ConvertError::Encode {
        target: TargetFormat::Gif,
        source,
    };

    let uniform = durations.len() != frames.len();
    let mut bytes = Vec::new();

    {
        let mut encoder = GifEncoder::new(&mut bytes);
        encoder.set_repeat(Repeat::Infinite).map_err(encode_error)?;

        for (index, buffer) in frames.into_iter().enumerate() {
            let millis = if uniform {
                DEFAULT_FRAME_DELAY_MS
            } else {
                durations[index]
            };

            let frame = Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(millis, 1));
            encoder.encode_frame(frame).map_err(encode_error)?;
        }
    }

    Ok(bytes)
}

fn write_png(image: &RgbaImage) -> Result<Vec<u8>, ConvertError> {
    let mut bytes = Vec::new();

    PngEncoder::new(&mut bytes)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|source| ConvertError::Encode {
            target: TargetFormat::Png,
            source,
        })?;

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io;

    use image::{codecs::webp::WebPEncoder, Rgba};

    use crate::test_images::{animated_webp, apng};

    const RED: [u8; 4] = [255, 0, 0, 255];
    const GREEN: [u8; 4] = [0, 255, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn three_frames() -> Vec<RgbaImage> {
        vec![solid(RED), solid(GREEN), solid(BLUE)]
    }

    fn gif_first_pixels(bytes: &[u8]) -> Vec<[u8; 4]> {
        GifDecoder::new(Cursor::new(bytes))
            .unwrap()
            .into_frames()
            .map(|frame| frame.unwrap().buffer().get_pixel(0, 0).0)
            .collect()
    }

    fn checkerboard() -> RgbaImage {
        RgbaImage::from_fn(6, 4, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 0, 64, 255])
            } else {
                Rgba([10, 200, (x * 30) as u8, (y * 60) as u8])
            }
        })
    }

    fn solid(color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(8, 8, Rgba(color))
    }

    fn gif_delays(bytes: &[u8]) -> Vec<u32> {
        GifDecoder::new(Cursor::new(bytes))
            .unwrap()
            .into_frames()
            .map(|frame| frame.unwrap().delay().numer_denom_ms())
            .map(|(numer, denom)| numer / denom)
            .collect()
    }

    #[test]
    fn static_png_is_lossless() {
        let original = checkerboard();
        let source = write_png(&original).unwrap();

        match convert(&source, false, TargetFormat::Png) {
            Conversion::Converted { bytes, format, .. } => {
                assert_eq!(format, TargetFormat::Png);
                let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
                assert_eq!(decoded, original);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn lossless_webp_becomes_identical_png() {
        let original =
            RgbaImage::from_fn(5, 5, |x, y| Rgba([(x * 50) as u8, (y * 50) as u8, 7, 255]));

        let mut source = Vec::new();
        WebPEncoder::new_lossless(&mut source)
            .encode(original.as_raw(), 5, 5, ExtendedColorType::Rgba8)
            .unwrap();

        match convert(&source, false, TargetFormat::Png) {
            Conversion::Converted { bytes, .. } => {
                assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
                let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
                assert_eq!(decoded, original);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn animation_keeps_frames_and_timing() {
        let source = write_gif(
            vec![
                solid([255, 0, 0, 255]),
                solid([0, 255, 0, 255]),
                solid([0, 0, 255, 255]),
            ],
            &[80, 120, 80],
        )
        .unwrap();

        match convert(&source, true, TargetFormat::Gif) {
            Conversion::Converted { bytes, frames, .. } => {
                assert_eq!(frames, 3);
                assert_eq!(gif_delays(&bytes), vec![80, 120, 80]);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn missing_delays_use_default() {
        let source = write_gif(
            vec![solid([255, 0, 0, 255]), solid([0, 255, 0, 255])],
            &[0, 50],
        )
        .unwrap();

        match convert(&source, true, TargetFormat::Gif) {
            Conversion::Converted { bytes, .. } => {
                assert_eq!(gif_delays(&bytes), vec![DEFAULT_FRAME_DELAY_MS, 50]);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn mismatched_durations_apply_default_everywhere() {
        let bytes = write_gif(
            vec![solid([255, 0, 0, 255]), solid([0, 255, 0, 255])],
            &[40],
        )
        .unwrap();

        assert_eq!(
            gif_delays(&bytes),
            vec![DEFAULT_FRAME_DELAY_MS, DEFAULT_FRAME_DELAY_MS]
        );
    }

    #[test]
    fn mid_stream_failure_keeps_first_frame() {
        let frame = |color| {
            Ok(Frame::from_parts(
                solid(color),
                0,
                0,
                Delay::from_numer_denom_ms(80, 1),
            ))
        };
        let broken = || {
            Err(ImageError::IoError(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "truncated",
            )))
        };

        let frames = collect_frames(
            vec![
                frame([255, 0, 0, 255]),
                frame([0, 255, 0, 255]),
                broken(),
                frame([0, 0, 255, 255]),
            ],
            ImageFormat::WebP,
        )
        .unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].buffer().get_pixel(0, 0), &Rgba([255, 0, 0, 255]));

        assert!(matches!(
            collect_frames(vec![broken()], ImageFormat::WebP),
            Err(ConvertError::Decode(_))
        ));
    }

    #[test]
    fn single_frame_sources_are_not_animations() {
        let source = write_gif(vec![solid([255, 0, 0, 255])], &[80]).unwrap();
        assert!(matches!(
            convert(&source, true, TargetFormat::Gif),
            Conversion::Verbatim(ConvertError::NotAnimated(ImageFormat::Gif))
        ));

        let source = animated_webp(&[solid([255, 0, 0, 255])], &[80]);
        assert!(matches!(
            convert(&source, true, TargetFormat::Gif),
            Conversion::Verbatim(ConvertError::NotAnimated(ImageFormat::WebP))
        ));
    }

    #[test]
    fn animated_webp_keeps_frames_and_timing() {
        let source = animated_webp(&three_frames(), &[80, 120, 80]);

        match convert(&source, true, TargetFormat::Gif) {
            Conversion::Converted { bytes, frames, .. } => {
                assert_eq!(frames, 3);
                assert_eq!(gif_delays(&bytes), vec![80, 120, 80]);
                assert_eq!(gif_first_pixels(&bytes), vec![RED, GREEN, BLUE]);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn apng_keeps_frames_and_timing() {
        let source = apng(&three_frames(), &[80, 120, 80]);

        match convert(&source, true, TargetFormat::Gif) {
            Conversion::Converted { bytes, frames, .. } => {
                assert_eq!(frames, 3);
                assert_eq!(gif_delays(&bytes), vec![80, 120, 80]);
                assert_eq!(gif_first_pixels(&bytes), vec![RED, GREEN, BLUE]);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn garbage_is_kept_verbatim() {
        let result = convert(b"definitely not an image", false, TargetFormat::Png);
        assert!(matches!(result, Conversion::Verbatim(ConvertError::Decode(_))));
    }

    #[test]
    fn static_source_cannot_become_animation() {
        let source = write_png(&checkerboard()).unwrap();
        let result = convert(&source, true, TargetFormat::Gif);
        assert!(matches!(
            result,
            Conversion::Verbatim(ConvertError::NotAnimated(ImageFormat::Png))
        ));
    }

    #[test]
    fn unsupported_combinations_are_verbatim() {
        let source = write_png(&checkerboard()).unwrap();
        let result = convert(&source, true, TargetFormat::Png);
        assert!(matches!(
            result,
            Conversion::Verbatim(ConvertError::Unsupported {
                animated: true,
                target: TargetFormat::Png
            })
        ));
    }
}
