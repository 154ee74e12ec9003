use crate::MapError;

use image::imageops::FilterType;
use reqwest::blocking::Client;
use std::time::Duration;

/// Edge length of every tile texture, in pixels.
pub const TEXTURE_SIZE: u32 = 256;

/// Decoded RGBA8 imagery for one tile.
#[derive(Clone, Debug, PartialEq)]
pub struct TileTexture {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TileTexture {
    /// Opaque white.
    pub fn blank() -> Self {
        Self {
            width: TEXTURE_SIZE,
            height: TEXTURE_SIZE,
            rgba: vec![u8::MAX; (4 * TEXTURE_SIZE * TEXTURE_SIZE) as usize],
        }
    }

    /// Decodes any supported format and resamples to `TEXTURE_SIZE x TEXTURE_SIZE` if needed.
    pub fn decode(bytes: &[u8]) -> Result<Self, MapError> {
        let mut image =
            image::load_from_memory(bytes).map_err(|e| MapError::TextureFetchFailed(e.to_string()))?;
        if image.width() != TEXTURE_SIZE || image.height() != TEXTURE_SIZE {
            image = image.resize_exact(TEXTURE_SIZE, TEXTURE_SIZE, FilterType::Triangle);
        }

        Ok(Self {
            width: TEXTURE_SIZE,
            height: TEXTURE_SIZE,
            rgba: image.into_rgba8().into_raw(),
        })
    }
}

/// Fetches tile imagery. Implementations block.
pub trait ImageryService: Send + Sync {
    fn fetch_texture(&self, url: &str) -> Result<TileTexture, MapError>;
}

pub struct HttpImagery {
    client: Client,
}

impl HttpImagery {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

impl ImageryService for HttpImagery {
    fn fetch_texture(&self, url: &str) -> Result<TileTexture, MapError> {
        let bytes = self
            .client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.bytes())
            .map_err(|e| MapError::TextureFetchFailed(e.to_string()))?;

        TileTexture::decode(&bytes)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba(pixel));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn decode_keeps_tile_sized_image() {
        let texture = TileTexture::decode(&png(256, 256, [10, 20, 30, 255])).unwrap();
        assert_eq!((texture.width, texture.height), (256, 256));
        assert_eq!(texture.rgba.len(), 256 * 256 * 4);
        assert_eq!(&texture.rgba[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn decode_resamples_other_sizes() {
        let texture = TileTexture::decode(&png(512, 128, [200, 0, 0, 255])).unwrap();
        assert_eq!((texture.width, texture.height), (256, 256));
        assert_eq!(texture.rgba.len(), 256 * 256 * 4);
        assert_eq!(&texture.rgba[..4], &[200, 0, 0, 255]);
    }

    #[test]
    fn garbage_is_a_fetch_failure() {
        assert!(matches!(
            TileTexture::decode(b"<html>503</html>"),
            Err(MapError::TextureFetchFailed(_))
        ));
    }
}
