//! Load front door.
//!
//! Turns a raw component image plus raw argument bytes into a dispatch:
//! check the caller, short-circuit once the barrier has fired, validate the
//! image and pull its name out, decode the arguments, then hand over to
//! [`LazyInit::dispatch`].

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::dispatch::{ClassificationMode, DispatchResult, LazyInit};
use crate::error::{Error, Result};

/// Magic bytes every component image starts with.
pub const IMAGE_MAGIC: &[u8; 4] = b"\x7fELF";

/// Structural problems with a submitted image.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("image is empty")]
    Empty,

    #[error("bad magic, not a component image")]
    BadMagic,

    #[error("no component name in image metadata")]
    MissingName,

    #[error("component name is not valid UTF-8")]
    InvalidName,
}

/// Whether the caller may submit load requests.
pub trait Capability: Send + Sync {
    /// `Err` with a reason when the caller lacks the privilege.
    fn check(&self) -> std::result::Result<(), String>;
}

/// Grants every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Capability for AllowAll {
    fn check(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Denies every request.
#[derive(Debug, Clone, Default)]
pub struct Deny(pub String);

impl Capability for Deny {
    fn check(&self) -> std::result::Result<(), String> {
        Err(if self.0.is_empty() {
            "caller may not load components".to_string()
        } else {
            self.0.clone()
        })
    }
}

/// A validated image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedImage {
    pub name: String,
}

/// Validates images and extracts the component name.
pub trait ImageLoader: Send + Sync {
    fn verify(&self, image: &[u8]) -> std::result::Result<VerifiedImage, ImageError>;
}

/// Reads the NUL-separated `key=value` metadata strings of an image.
///
/// The first `name=` entry wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModinfoLoader;

impl ModinfoLoader {
    fn find_name(image: &[u8]) -> Option<&[u8]> {
        image
            .split(|&b| b == 0)
            .find_map(|field| field.strip_prefix(b"name="))
            .filter(|name| !name.is_empty())
    }
}

impl ImageLoader for ModinfoLoader {
    fn verify(&self, image: &[u8]) -> std::result::Result<VerifiedImage, ImageError> {
        if image.is_empty() {
            return Err(ImageError::Empty);
        }
        if !image.starts_with(IMAGE_MAGIC) {
            return Err(ImageError::BadMagic);
        }

        let name = Self::find_name(&image[IMAGE_MAGIC.len()..]).ok_or(ImageError::MissingName)?;
        let name = std::str::from_utf8(name).map_err(|_| ImageError::InvalidName)?;
        Ok(VerifiedImage {
            name: name.to_string(),
        })
    }
}

/// Front door in front of a [`LazyInit`].
#[derive(Clone)]
pub struct Loader {
    core: LazyInit,
    images: Arc<dyn ImageLoader>,
    capability: Arc<dyn Capability>,
}

impl Loader {
    /// Loader using [`ModinfoLoader`] that lets every caller through.
    pub fn new(core: LazyInit) -> Self {
        Self {
            core,
            images: Arc::new(ModinfoLoader),
            capability: Arc::new(AllowAll),
        }
    }

    /// Replace the image validator.
    pub fn with_images(mut self, images: Arc<dyn ImageLoader>) -> Self {
        self.images = images;
        self
    }

    /// Replace the privilege check.
    pub fn with_capability(mut self, capability: Arc<dyn Capability>) -> Self {
        self.capability = capability;
        self
    }

    /// The core requests are dispatched to.
    pub fn core(&self) -> &LazyInit {
        &self.core
    }

    /// Serve a load request for an in-memory image.
    pub fn load_image(&self, image: &[u8], raw_args: Option<&[u8]>) -> Result<DispatchResult> {
        if let Some(done) = self.admit()? {
            return Ok(done);
        }
        self.dispatch_image(image, raw_args, None)
    }

    /// Serve a load request for an image on disk.
    ///
    /// When the image metadata carries no name, the file stem is used.
    pub fn load_file(&self, path: impl AsRef<Path>, raw_args: Option<&[u8]>) -> Result<DispatchResult> {
        if let Some(done) = self.admit()? {
            return Ok(done);
        }

        let path = path.as_ref();
        let image = std::fs::read(path)?;
        let fallback = path.file_stem().and_then(|s| s.to_str());
        self.dispatch_image(&image, raw_args, fallback)
    }

    /// Privilege check, then the post-completion short-circuit.
    fn admit(&self) -> Result<Option<DispatchResult>> {
        self.capability.check().map_err(Error::PermissionDenied)?;

        if self.core.is_completed() {
            debug!("load request after completion, skipping validation");
            return Ok(Some(DispatchResult::AlreadyCompleted));
        }
        Ok(None)
    }

    fn dispatch_image(
        &self,
        image: &[u8],
        raw_args: Option<&[u8]>,
        fallback: Option<&str>,
    ) -> Result<DispatchResult> {
        let name = match (self.images.verify(image), fallback) {
            (Ok(verified), _) => verified.name,
            (Err(ImageError::MissingName), Some(stem)) if !stem.is_empty() => {
                debug!("image has no name, using \"{}\"", stem);
                stem.to_string()
            }
            (Err(e), _) => return Err(e.into()),
        };

        let args = match raw_args.map(std::str::from_utf8).transpose() {
            Ok(args) => args,
            Err(e) => {
                warn!("{}: arguments are not valid UTF-8", name);
                return Ok(DispatchResult::ConfigurationError(format!(
                    "{}: arguments are not valid UTF-8: {}",
                    name, e
                )));
            }
        };

        match self.core.dispatch(&name, args) {
            DispatchResult::UnknownComponent if self.core.mode() == ClassificationMode::Strict => {
                Err(Error::UnknownComponent(name))
            }
            result => Ok(result),
        }
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader").field("core", &self.core).finish()
    }
}

/// Build a minimal image carrying `name` and extra metadata fields.
pub fn build_image(name: &str, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut image = IMAGE_MAGIC.to_vec();
    image.push(0);
    for (key, value) in fields {
        image.extend_from_slice(key.as_bytes());
        image.push(b'=');
        image.extend_from_slice(value.as_bytes());
        image.push(0);
    }
    image.extend_from_slice(b"name=");
    image.extend_from_slice(name.as_bytes());
    image.push(0);
    image
}
