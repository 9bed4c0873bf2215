//! Test fixtures for integration tests
//!
//! Generated image payloads and pre-seeded in-memory backends, so tests
//! don't depend on files on disk.

use bytes::Bytes;
use image::{ImageBuffer, ImageOutputFormat, Rgb, Rgba};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::refresh::RouteRefresher;
use crate::state::AppState;
use crate::storage::InMemoryStorage;

/// Storage key of the seeded logo
pub const LOGO_KEY: &str = "images/logo.png";

/// A `width`×`height` RGBA gradient encoded as PNG
pub fn sample_png(width: u32, height: u32) -> Bytes {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgba([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128, 255])
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageOutputFormat::Png).unwrap();
    Bytes::from(buf.into_inner())
}

/// A `width`×`height` RGB gradient encoded as JPEG
pub fn sample_jpeg(width: u32, height: u32) -> Bytes {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, 64, (y * 255 / height.max(1)) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageOutputFormat::Jpeg(85)).unwrap();
    Bytes::from(buf.into_inner())
}

/// A roughly 10 KB PNG
///
/// Pixel noise from a fixed LCG keeps the encoder from compressing it
/// away while staying identical across runs.
pub fn logo_png() -> Bytes {
    let mut seed: u32 = 0x2545_f491;
    let img = ImageBuffer::from_fn(52, 52, |_, _| {
        let mut px = [0u8; 4];
        for channel in px.iter_mut() {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            *channel = (seed >> 24) as u8;
        }
        Rgba(px)
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageOutputFormat::Png).unwrap();
    Bytes::from(buf.into_inner())
}

/// In-memory backend holding the logo
pub fn seeded_storage() -> Arc<InMemoryStorage> {
    let storage = Arc::new(InMemoryStorage::new());
    storage.insert(LOGO_KEY, logo_png(), "image/png");
    storage
}

/// Run one scan cycle against `state`
pub async fn scan(state: &Arc<AppState>) -> usize {
    RouteRefresher::new(state.clone(), Duration::from_secs(60))
        .tick()
        .await
        .unwrap()
}

/// App state over [`seeded_storage`], scanned once
pub async fn seeded_state() -> (Arc<InMemoryStorage>, Arc<AppState>) {
    let storage = seeded_storage();
    let state = Arc::new(AppState::new(ServerConfig::default(), storage.clone()));
    scan(&state).await;
    (storage, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn test_logo_is_about_10kb() {
        let logo = logo_png();
        assert!(logo.len() > 8 * 1024 && logo.len() < 16 * 1024, "{}", logo.len());
        assert_eq!(image::load_from_memory(&logo).unwrap().dimensions(), (52, 52));
    }

    #[test]
    fn test_logo_is_stable() {
        assert_eq!(logo_png(), logo_png());
    }

    #[tokio::test]
    async fn test_seeded_state_has_logo_route() {
        let (_, state) = seeded_state().await;
        assert_eq!(state.routes.len(), 1);
        assert!(state.routes.has_path("/images/logo.png"));
    }
}
