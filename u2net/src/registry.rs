//! Catalog of the pretrained U²-Net models.
//!
//! The set is a closed enum rather than a string-keyed lookup, so an
//! unrecognized identifier fails with [`U2NetError::UnknownModel`] instead
//! of proceeding with an unbound model.

use std::path::PathBuf;

use crate::{
    error::{U2NetError, U2NetResult},
    models::{U2NetConfig, U2NetSize},
};

/// Directory under the user's home that holds downloaded weight files.
const CACHE_DIR_NAME: &str = ".u2net";

/// The fixed set of published pretrained models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PretrainedModel {
    /// Full-size U²-Net (~176 MB of weights).
    U2Net,
    /// Small U²-Net† variant (~4.7 MB of weights).
    U2NetP,
}

impl PretrainedModel {
    /// All catalog entries, in documentation order.
    pub const ALL: [Self; 2] = [Self::U2Net, Self::U2NetP];

    /// The identifier used in cache filenames and on the command line.
    pub const fn name(self) -> &'static str {
        match self {
            Self::U2Net => "u2net",
            Self::U2NetP => "u2netp",
        }
    }

    /// Fixed download URL of the published PyTorch weight file.
    pub const fn url(self) -> &'static str {
        match self {
            Self::U2Net => "https://www.dropbox.com/s/kdu5mhose1clds0/u2net.pth?dl=1",
            Self::U2NetP => "https://www.dropbox.com/s/usb1fyiuh8as5gi/u2netp.pth?dl=1",
        }
    }

    /// Filename of the weight file inside the cache directory.
    pub const fn weight_filename(self) -> &'static str {
        match self {
            Self::U2Net => "u2net.pth",
            Self::U2NetP => "u2netp.pth",
        }
    }

    /// Spatial resolution the network expects at its input.
    pub const fn input_size(self) -> usize {
        320
    }

    /// Architecture configuration matching the published weights.
    pub fn config(self) -> U2NetConfig {
        match self {
            Self::U2Net => U2NetConfig::new(U2NetSize::Full),
            Self::U2NetP => U2NetConfig::new(U2NetSize::Lite),
        }
    }

    /// Path of the weight file inside the per-user cache.
    ///
    /// # Errors
    ///
    /// Returns [`U2NetError::CacheDir`] if the home directory cannot be
    /// resolved.
    pub fn cache_path(self) -> U2NetResult<PathBuf> {
        Ok(cache_dir()?.join(self.weight_filename()))
    }
}

impl core::str::FromStr for PretrainedModel {
    type Err = U2NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "u2net" => Ok(Self::U2Net),
            "u2netp" => Ok(Self::U2NetP),
            _ => Err(U2NetError::UnknownModel {
                name: s.to_owned(),
                available: Self::ALL
                    .iter()
                    .map(|m| m.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

impl core::fmt::Display for PretrainedModel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-user cache directory for weight files (`~/.u2net`).
///
/// # Errors
///
/// Returns [`U2NetError::CacheDir`] if no home directory is available.
pub fn cache_dir() -> U2NetResult<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(CACHE_DIR_NAME))
        .ok_or_else(|| U2NetError::CacheDir {
            reason: "home directory could not be resolved".to_owned(),
        })
}
