use std::path::PathBuf;

use crate::render::{FontHandle, Renderer};

/// Bold sans-serif face shipped with the crate; used when no override loads.
pub const HUD_FONT: &[u8] = include_bytes!("../fonts/DejaVuSans-Bold.ttf");

/// Well-known system faces, for games that prefer the platform font over the bundled one.
pub const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

/// System candidates as paths, ready for [`crate::Engine::with_font_paths`].
pub fn system_font_paths() -> Vec<PathBuf> {
    SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from).collect()
}

/// Try each override file in order, then fall back to [`HUD_FONT`].
pub(crate) fn load_hud_font(renderer: &mut Renderer, overrides: &[PathBuf]) -> Option<FontHandle> {
    for path in overrides {
        let Ok(bytes) = std::fs::read(path) else {
            continue;
        };
        match renderer.load_font_from_bytes(&bytes) {
            Ok(font) => {
                log::info!("HUD font: {}", path.display());
                return Some(font);
            }
            Err(err) => log::warn!("skipping font {}: {err:#}", path.display()),
        }
    }

    match renderer.load_font_from_bytes(HUD_FONT) {
        Ok(font) => {
            log::info!("HUD font: bundled DejaVu Sans Bold");
            Some(font)
        }
        Err(err) => {
            log::warn!("bundled font failed to load: {err:#}; HUD text will not be drawn");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{TextRenderer, TextureHandle};

    #[test]
    fn bundled_font_parses_and_lays_out() {
        let mut text = TextRenderer::new();
        let font = text.load_font_from_bytes(HUD_FONT).unwrap();
        assert!(text.has_font(font));

        // The space has no outline; every other glyph is rasterized once.
        let mut uploads = 0;
        let placed = text
            .layout(font, "Score: 0", 32.0, |_, _, _| {
                uploads += 1;
                Ok(TextureHandle::MISSING)
            })
            .unwrap();
        assert_eq!(placed.len(), 7);
        assert_eq!(uploads, 7);
    }

    #[test]
    fn system_candidates_come_back_in_order() {
        let paths = system_font_paths();
        assert_eq!(paths.len(), SYSTEM_FONT_CANDIDATES.len());
        assert_eq!(paths[0], PathBuf::from(SYSTEM_FONT_CANDIDATES[0]));
    }
}
