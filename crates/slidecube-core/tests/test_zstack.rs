use std::fs::File;
use std::io::BufReader;

use image::{GrayImage, Rgb, RgbImage, Rgba, RgbaImage};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use slidecube_core::io::pyramid::Compression;
use slidecube_core::pipeline::zstack::{assemble_zstack, load_plane_rgb, ZStackOptions};

fn write_rgb(path: &std::path::Path, shade: u8) {
    let mut img = RgbImage::new(20, 12);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        *pixel = Rgb([shade, x as u8, y as u8]);
    }
    img.save(path).unwrap();
}

#[test]
fn test_rgb_plane_passes_through() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plane.png");
    write_rgb(&path, 77);
    let plane = load_plane_rgb(&path).unwrap();
    assert_eq!(plane.dim(), (12, 20, 3));
    assert_eq!(plane[[3, 5, 0]], 77);
    assert_eq!(plane[[3, 5, 1]], 5);
    assert_eq!(plane[[3, 5, 2]], 3);
}

#[test]
fn test_alpha_flattened_against_black() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plane.png");
    let mut img = RgbaImage::new(4, 4);
    for pixel in img.pixels_mut() {
        *pixel = Rgba([200, 100, 50, 128]);
    }
    img.save(&path).unwrap();

    let plane = load_plane_rgb(&path).unwrap();
    assert_eq!(plane.dim(), (4, 4, 3));
    assert_eq!(plane[[0, 0, 0]], 100); // 200 * 128 / 255
    assert_eq!(plane[[0, 0, 1]], 50);
    assert_eq!(plane[[0, 0, 2]], 25);
}

#[test]
fn test_single_channel_replicated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plane.png");
    let mut img = GrayImage::new(6, 4);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        pixel.0[0] = (x + y * 10) as u8;
    }
    img.save(&path).unwrap();

    let plane = load_plane_rgb(&path).unwrap();
    assert_eq!(plane.dim(), (4, 6, 3));
    for chan in 0..3 {
        assert_eq!(plane[[2, 3, chan]], 23);
    }
}

#[test]
fn test_zstack_assembles_planes_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("a.png");
    let second = dir.path().join("b.png");
    write_rgb(&first, 10);
    write_rgb(&second, 200);
    let output = dir.path().join("stack.tif");

    assemble_zstack(
        &[first.as_path(), second.as_path()],
        &output,
        &ZStackOptions {
            pixel_size: 0.25,
            tile_size: 16,
            compression: Compression::Deflate,
        },
    )
    .unwrap();

    let mut decoder = Decoder::new(BufReader::new(File::open(&output).unwrap())).unwrap();
    assert_eq!(decoder.dimensions().unwrap(), (20, 12));

    let description = decoder
        .get_tag_ascii_string(Tag::ImageDescription)
        .unwrap();
    assert!(description.contains("SizeZ=\"2\""));
    assert!(description.contains("SizeC=\"3\""));
    assert!(description.contains("stack.tif"));

    // Channel-fastest page order: R of plane 0 first.
    match decoder.read_image().unwrap() {
        DecodingResult::U8(samples) => assert!(samples.iter().all(|&v| v == 10)),
        other => panic!("expected 8-bit samples, got {other:?}"),
    }

    // 3 channels x 2 planes of top-level pages.
    let mut pages = 1;
    while decoder.more_images() {
        decoder.next_image().unwrap();
        pages += 1;
    }
    assert_eq!(pages, 6);

    // Fourth page is R of plane 1.
    decoder.seek_to_image(3).unwrap();
    match decoder.read_image().unwrap() {
        DecodingResult::U8(samples) => assert!(samples.iter().all(|&v| v == 200)),
        other => panic!("expected 8-bit samples, got {other:?}"),
    }
}

#[test]
fn test_empty_input_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("stack.tif");
    let result = assemble_zstack(
        &[],
        &output,
        &ZStackOptions {
            pixel_size: 1.0,
            tile_size: 16,
            compression: Compression::None,
        },
    );
    assert!(result.is_err());
}
