use std::path::Path;

use eyre::ensure;
use eyre::WrapErr;
use tracing::info;

pub const CHECKERBOARD_SIZE: u32 = 256;
pub const CHECKERBOARD_CELL: u32 = 32;

/// Tightly packed RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureImage {
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let image = image::open(path)
            .wrap_err_with(|| format!("loading texture {}", path.display()))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        ensure!(
            width > 0 && height > 0,
            "texture {} is empty",
            path.display()
        );
        info!("Loaded {width}x{height} texture from {}", path.display());
        Ok(Self {
            width,
            height,
            pixels: image.into_raw(),
        })
    }

    /// Light and dark grey squares.
    pub fn checkerboard(size: u32, cell: u32) -> Self {
        let cell = cell.max(1);
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let light = ((x / cell) + (y / cell)) % 2 == 0;
                let value = if light { 0xe0 } else { 0x40 };
                pixels.extend_from_slice(&[value, value, value, 0xff]);
            }
        }
        Self {
            width: size,
            height: size,
            pixels,
        }
    }

    /// The configured image, or a checkerboard when none is configured.
    /// A configured path that cannot be loaded is an error.
    pub fn from_config(path: Option<&Path>) -> eyre::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                info!("No texture configured, using a checkerboard");
                Ok(Self::checkerboard(CHECKERBOARD_SIZE, CHECKERBOARD_CELL))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(texture: &TextureImage, x: u32, y: u32) -> &[u8] {
        let start = ((y * texture.width + x) * 4) as usize;
        &texture.pixels[start..start + 4]
    }

    #[test]
    fn checkerboard_alternates_per_cell() {
        let texture = TextureImage::checkerboard(64, 16);
        assert_eq!(texture.pixels.len(), 64 * 64 * 4);
        assert_eq!(pixel(&texture, 0, 0), &[0xe0, 0xe0, 0xe0, 0xff]);
        assert_eq!(pixel(&texture, 15, 15), &[0xe0, 0xe0, 0xe0, 0xff]);
        assert_eq!(pixel(&texture, 16, 0), &[0x40, 0x40, 0x40, 0xff]);
        assert_eq!(pixel(&texture, 16, 16), &[0xe0, 0xe0, 0xe0, 0xff]);
    }

    #[test]
    fn no_path_falls_back_to_checkerboard() {
        let texture = TextureImage::from_config(None).unwrap();
        assert_eq!(texture.width, CHECKERBOARD_SIZE);
        assert_eq!(texture.height, CHECKERBOARD_SIZE);
    }

    #[test]
    fn missing_configured_file_is_an_error() {
        let path = std::env::temp_dir().join("textured_cube_no_such_texture.png");
        let error = TextureImage::from_config(Some(&path)).unwrap_err();
        assert!(format!("{error:#}").contains("textured_cube_no_such_texture.png"));
    }

    #[test]
    fn png_files_load_as_rgba() {
        let path = std::env::temp_dir().join(format!(
            "textured_cube_texture_{}.png",
            std::process::id()
        ));
        let mut source = image::RgbImage::new(3, 2);
        source.put_pixel(2, 1, image::Rgb([10, 20, 30]));
        source.save(&path).unwrap();

        let texture = TextureImage::load(&path).unwrap();
        assert_eq!((texture.width, texture.height), (3, 2));
        assert_eq!(pixel(&texture, 2, 1), &[10, 20, 30, 255]);
        assert_eq!(pixel(&texture, 0, 0), &[0, 0, 0, 255]);

        std::fs::remove_file(path).unwrap();
    }
}
