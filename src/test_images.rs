//! Builders for animated fixtures the `image` crate can read but not write.

use image::{codecs::webp::WebPEncoder, ExtendedColorType, RgbaImage};

/// Lossless animated WebP with one `ANMF` chunk per frame, looping forever.
pub fn animated_webp(frames: &[RgbaImage], delays_ms: &[u32]) -> Vec<u8> {
    let (width, height) = frames[0].dimensions();

    let mut vp8x = vec![0x10 | 0x02, 0, 0, 0];
    vp8x.extend_from_slice(&u24(width - 1));
    vp8x.extend_from_slice(&u24(height - 1));

    let mut body = b"WEBP".to_vec();
    push_chunk(&mut body, b"VP8X", &vp8x);
    push_chunk(&mut body, b"ANIM", &[0, 0, 0, 0, 0, 0]);

    for (frame, delay) in frames.iter().zip(delays_ms) {
        let mut anmf = Vec::new();
        anmf.extend_from_slice(&u24(0));
        anmf.extend_from_slice(&u24(0));
        anmf.extend_from_slice(&u24(frame.width() - 1));
        anmf.extend_from_slice(&u24(frame.height() - 1));
        anmf.extend_from_slice(&u24(*delay));
        // No blending, no disposal.
        anmf.push(0x02);
        anmf.extend_from_slice(&lossless_chunk(frame));

        push_chunk(&mut body, b"ANMF", &anmf);
    }

    let mut riff = b"RIFF".to_vec();
    riff.extend_from_slice(&(body.len() as u32).to_le_bytes());
    riff.extend_from_slice(&body);
    riff
}

/// Looping APNG where every frame, including the default image, is shown.
pub fn apng(frames: &[RgbaImage], delays_ms: &[u32]) -> Vec<u8> {
    let (width, height) = frames[0].dimensions();
    let mut bytes = Vec::new();

    {
        let mut encoder = png::Encoder::new(&mut bytes, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_animated(frames.len() as u32, 0).unwrap();

        let mut writer = encoder.write_header().unwrap();
        for (frame, delay) in frames.iter().zip(delays_ms) {
            writer.set_frame_delay(*delay as u16, 1000).unwrap();
            writer.write_image_data(frame.as_raw()).unwrap();
        }
        writer.finish().unwrap();
    }

    bytes
}

/// Encodes a still frame and pulls its `VP8L` chunk, header included, out of
/// the RIFF container.
fn lossless_chunk(frame: &RgbaImage) -> Vec<u8> {
    let mut still = Vec::new();
    WebPEncoder::new_lossless(&mut still)
        .encode(frame.as_raw(), frame.width(), frame.height(), ExtendedColorType::Rgba8)
        .unwrap();

    let mut offset = 12;
    while offset + 8 <= still.len() {
        let size = u32::from_le_bytes(still[offset + 4..offset + 8].try_into().unwrap()) as usize;
        let end = offset + 8 + size + size % 2;

        if &still[offset..offset + 4] == b"VP8L" {
            return still[offset..end.min(still.len())].to_vec();
        }
        offset = end;
    }

    panic!("encoder produced no VP8L chunk");
}

fn push_chunk(out: &mut Vec<u8>, fourcc: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(fourcc);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    if data.len() % 2 == 1 {
        out.push(0);
    }
}

fn u24(value: u32) -> [u8; 3] {
    let bytes = value.to_le_bytes();
    [bytes[0], bytes[1], bytes[2]]
}
