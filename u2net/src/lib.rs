//! Salient-object segmentation with U²-Net on the Burn framework.
//!
//! The crate provisions the published pretrained weights into a per-user
//! cache on first use, loads them into a natively implemented U²-Net, and
//! produces grayscale saliency masks for arbitrary input images.
//!
//! ```no_run
//! use u2net_burn::{backend, PretrainedModel, Session};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session =
//!     Session::<backend::SelectedBackend>::open(PretrainedModel::U2NetP, backend::create_device())?;
//! let mask = session.predict_file("photo.jpg".as_ref())?;
//! mask.save("mask.png")?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod error;
pub mod inference;
pub mod models;
pub mod registry;
pub mod weights;

pub use error::{U2NetError, U2NetResult};
pub use inference::{mask_to_image, normalize_prediction, preprocess, Sample, Session};
pub use models::{U2Net, U2NetConfig, U2NetOutput, U2NetSize};
pub use registry::{cache_dir, PretrainedModel};
pub use weights::{fetch_weights, fetch_weights_into, load_model, load_model_from_file};
