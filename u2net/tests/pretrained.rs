//! End-to-end checks against the published pretrained weights.
//!
//! These download (or reuse) the real weight files from the per-user
//! cache, so they are ignored by default. Run with
//! `cargo test --test pretrained -- --ignored`.

use burn::backend::NdArray;
use image::{DynamicImage, Rgb, RgbImage};

use u2net_burn::{PretrainedModel, Session};

type TestBackend = NdArray;

fn synthetic_scene(width: u32, height: u32) -> DynamicImage {
    let mut image = RgbImage::from_pixel(width, height, Rgb([240, 240, 240]));
    // A dark centered square on a light background.
    for y in height / 4..3 * height / 4 {
        for x in width / 4..3 * width / 4 {
            image.put_pixel(x, y, Rgb([30, 30, 60]));
        }
    }
    DynamicImage::ImageRgb8(image)
}

#[test]
#[ignore = "downloads pretrained weights"]
fn u2netp_produces_fixed_size_grayscale_mask() {
    let session =
        Session::<TestBackend>::open(PretrainedModel::U2NetP, Default::default()).unwrap();
    let mask = session.predict(&synthetic_scene(400, 300)).unwrap();

    // Output is always the network's input resolution, not the image's.
    assert_eq!(mask.dimensions(), (320, 320));
    for (_, _, pixel) in mask.enumerate_pixels() {
        assert_eq!(pixel.0[0], pixel.0[1]);
        assert_eq!(pixel.0[1], pixel.0[2]);
    }
}

#[test]
#[ignore = "downloads pretrained weights"]
fn u2netp_mask_spans_full_range() {
    let session =
        Session::<TestBackend>::open(PretrainedModel::U2NetP, Default::default()).unwrap();
    let mask = session.predict(&synthetic_scene(320, 320)).unwrap();

    let min = mask.pixels().map(|p| p.0[0]).min().unwrap();
    let max = mask.pixels().map(|p| p.0[0]).max().unwrap();
    assert_eq!(min, 0);
    assert_eq!(max, 255);
}
