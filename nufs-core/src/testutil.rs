//! Test-only helpers shared across module test suites.

use crate::image::Image;

/// Builds a fresh, blank image backed by a throwaway file.
pub fn temp_image() -> Image {
    let file = tempfile::NamedTempFile::new().expect("create temp file");
    let path = file.into_temp_path();
    let image = Image::create(&path).expect("create image");
    // leaked on purpose: the test process exits shortly after and /tmp gets swept
    std::mem::forget(path);
    image
}
