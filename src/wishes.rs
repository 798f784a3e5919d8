//! Wish records and the local key-value store they travel through

use crate::constants::storage;
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One slide of the celebration slideshow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wish {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_image: Option<String>,
}

impl Wish {
    fn new(text: &str, image: Option<&str>, header_image: Option<&str>) -> Self {
        Self {
            text: text.to_string(),
            image: image.map(str::to_string),
            header_image: header_image.map(str::to_string),
        }
    }
}

/// The built-in wishes shown when nothing usable is stored
pub fn default_wishes() -> Vec<Wish> {
    vec![
        Wish::new(
            "🎉 Happy birthday Flourish! 🥰 Thank you for always being there with laughter, advice, and premium gists. You make life sweeter just by being around. Enjoy your special day! 🎂✨",
            Some("img/IMG_1434.HEIC"),
            Some("img/IMG_1438.HEIC"),
        ),
        Wish::new(
            "🌟 Wishing you endless happiness, love, and magical moments that sparkle like stars in the night sky! May every dream you've ever had come true! 🌟💫",
            Some("img/IMG_0916.HEIC"),
            None,
        ),
        Wish::new(
            "💖 May this special moment bring you peace, prosperity, and beautiful memories to treasure forever! You deserve all the wonderful things life has to offer! 💖🌈",
            Some("img/IMG_0921.HEIC"),
            None,
        ),
        Wish::new(
            "🎭 Life is a beautiful journey filled with amazing adventures! May yours be overflowing with wonder, excitement, and countless reasons to smile every single day! 🎭🎪",
            Some("img/IMG_1471.HEIC"),
            None,
        ),
        Wish::new(
            "🌈 Sending you love, light, and all the good vibes in the universe! You are absolutely amazing and deserve every happiness that comes your way! 🌈✨💕",
            None,
            None,
        ),
        Wish::new(
            "🎊 Here's to another year of being fabulous, inspiring, and absolutely wonderful! May your birthday be as special as you are! 🎊🎉",
            Some("img/IMG_0978.HEIC"),
            None,
        ),
    ]
}

/// Make sure the slideshow opens on a wish with a picture
pub fn validate_wishes(mut wishes: Vec<Wish>) -> Vec<Wish> {
    if wishes.is_empty() {
        return default_wishes();
    }

    if wishes[0].image.is_none() {
        match wishes.iter().position(|w| w.image.is_some()) {
            Some(index) => {
                let wish = wishes.remove(index);
                wishes.insert(0, wish);
            }
            None => wishes[0].image = Some(storage::DEFAULT_IMAGE.to_string()),
        }
    }

    wishes
}

/// String-keyed blob storage
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> AppResult<()>;
}

/// A key-value store kept as one JSON object on disk
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store; a missing or unreadable file starts empty
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "discarding unreadable store");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };

        Self { path, entries }
    }

    /// The store used when no path is given
    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join(storage::DEFAULT_STORE_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, contents).map_err(|e| {
            AppError::Storage(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> AppResult<()> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }
}

/// Hand the wish list to the slideshow
pub fn store_wishes<S: KeyValueStore>(store: &mut S, wishes: &[Wish]) -> AppResult<()> {
    let blob = serde_json::to_string(wishes)?;
    store.set(storage::WISHES_KEY, blob)
}

/// Read the wish list back; anything absent or malformed yields the defaults
pub fn load_wishes<S: KeyValueStore>(store: &S) -> Vec<Wish> {
    let Some(blob) = store.get(storage::WISHES_KEY) else {
        return default_wishes();
    };

    match serde_json::from_str::<Vec<Wish>>(&blob) {
        Ok(wishes) if !wishes.is_empty() => wishes,
        Ok(_) => default_wishes(),
        Err(e) => {
            warn!(error = %e, "stored wishes are malformed, using defaults");
            default_wishes()
        }
    }
}
