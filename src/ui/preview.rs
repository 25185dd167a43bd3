/// Pattern preview
/// Renders a small sample of the first image a run would produce
use iced::widget::image::Handle;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rgb_generator::color::RgbColor;
use rgb_generator::generate::pattern::{ImageSize, Pattern};

/// Preview edge length in pixels
const PREVIEW_EDGE: u32 = 96;

/// Render `pattern` for `base` as an RGBA handle for the image widget
///
/// Seeded from the color so the preview does not flicker between redraws.
pub fn pattern_preview(pattern: Pattern, base: RgbColor) -> Handle {
    let size = ImageSize::new(PREVIEW_EDGE, PREVIEW_EDGE);
    let mut rng = ChaCha8Rng::seed_from_u64(base.index() as u64);
    let img = pattern.render(size, base, &mut rng);

    let rgba: Vec<u8> = img
        .pixels()
        .flat_map(|p| [p.0[0], p.0[1], p.0[2], u8::MAX])
        .collect();

    Handle::from_rgba(size.width, size.height, rgba)
}
