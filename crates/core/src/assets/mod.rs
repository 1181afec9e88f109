use std::{
    collections::HashMap,
    path::Path,
    sync::{
        mpsc::{self, Receiver, TryRecvError},
        Arc,
    },
    thread,
};

use tracing::{debug, warn};

use crate::{scene::LayerId, surface::ImageData, Result, VisualiserError};

/// Load state of a layer's image as seen by the renderer.
#[derive(Debug, Clone)]
pub enum ImageState {
    Pending,
    Ready(Arc<ImageData>),
    Failed,
}

#[derive(Debug)]
enum Slot {
    Loading(Receiver<Result<ImageData>>),
    Ready(Arc<ImageData>),
    Failed,
}

#[derive(Debug)]
struct Entry {
    src: String,
    slot: Slot,
}

/// Decoded images keyed by layer. Decoding happens on a worker thread; the
/// render thread only polls, so a slow or broken file never stalls a frame.
#[derive(Debug, Default)]
pub struct ImageCache {
    entries: HashMap<LayerId, Entry>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of `layer`'s image. Starts a load when the layer has no
    /// entry yet or its source changed since the last request.
    pub fn request(&mut self, layer: LayerId, src: &str) -> ImageState {
        let stale = self.entries.get(&layer).map_or(true, |entry| entry.src != src);
        if stale {
            debug!(%layer, src, "loading image");
            self.entries.insert(
                layer,
                Entry {
                    src: src.to_string(),
                    slot: Slot::Loading(spawn_decode(src.to_string())),
                },
            );
        }
        let Some(entry) = self.entries.get_mut(&layer) else {
            return ImageState::Pending;
        };

        if let Slot::Loading(receiver) = &entry.slot {
            let next = match receiver.try_recv() {
                Ok(Ok(image)) => {
                    debug!(%layer, width = image.width(), height = image.height(), "image ready");
                    Slot::Ready(Arc::new(image))
                }
                Ok(Err(err)) => {
                    warn!(%layer, src = %entry.src, error = %err, "image failed to load");
                    Slot::Failed
                }
                Err(TryRecvError::Empty) => return ImageState::Pending,
                Err(TryRecvError::Disconnected) => {
                    warn!(%layer, src = %entry.src, "image loader exited without a result");
                    Slot::Failed
                }
            };
            entry.slot = next;
        }

        match &entry.slot {
            Slot::Loading(_) => ImageState::Pending,
            Slot::Ready(image) => ImageState::Ready(Arc::clone(image)),
            Slot::Failed => ImageState::Failed,
        }
    }

    /// Stores an already decoded image for `layer` under `src`.
    pub fn insert_ready(&mut self, layer: LayerId, src: impl Into<String>, image: ImageData) {
        self.entries.insert(
            layer,
            Entry {
                src: src.into(),
                slot: Slot::Ready(Arc::new(image)),
            },
        );
    }

    pub fn remove(&mut self, layer: LayerId) -> bool {
        self.entries.remove(&layer).is_some()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(LayerId) -> bool) {
        self.entries.retain(|layer, _| keep(*layer));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn spawn_decode(src: String) -> Receiver<Result<ImageData>> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        // The cache may have been dropped or the source replaced meanwhile.
        let _ = sender.send(decode(Path::new(&src)));
    });
    receiver
}

/// Reads and decodes an image file into premultiplied RGBA.
pub fn decode(path: &Path) -> Result<ImageData> {
    let rgba = image::open(path)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    ImageData::from_straight_rgba(width, height, rgba.into_raw())
        .ok_or_else(|| VisualiserError::msg(format!("image {} has no pixels", path.display())))
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn wait_for(cache: &mut ImageCache, layer: LayerId, src: &str) -> ImageState {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let state = cache.request(layer, src);
            if !matches!(state, ImageState::Pending) || Instant::now() > deadline {
                return state;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn loads_png_in_background() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.png");
        image::RgbaImage::from_pixel(3, 2, image::Rgba([255, 0, 0, 255]))
            .save(&path)
            .unwrap();
        let src = path.to_string_lossy().to_string();

        let mut cache = ImageCache::new();
        let ImageState::Ready(image) = wait_for(&mut cache, LayerId(1), &src) else {
            panic!("image did not load");
        };
        assert_eq!((image.width(), image.height()), (3, 2));
    }

    #[test]
    fn missing_file_fails_without_panicking() {
        let mut cache = ImageCache::new();
        let state = wait_for(&mut cache, LayerId(1), "/definitely/not/here.png");
        assert!(matches!(state, ImageState::Failed));
        // Stays failed until the source changes.
        assert!(matches!(
            cache.request(LayerId(1), "/definitely/not/here.png"),
            ImageState::Failed
        ));
    }

    #[test]
    fn source_change_restarts_loading() {
        let mut cache = ImageCache::new();
        let pixel = ImageData::from_straight_rgba(1, 1, vec![0, 0, 0, 255]).unwrap();
        cache.insert_ready(LayerId(4), "a.png", pixel);
        assert!(matches!(cache.request(LayerId(4), "a.png"), ImageState::Ready(_)));

        let state = cache.request(LayerId(4), "/missing/b.png");
        assert!(!matches!(state, ImageState::Ready(_)));
        assert!(cache.remove(LayerId(4)));
        assert!(cache.is_empty());
    }
}
