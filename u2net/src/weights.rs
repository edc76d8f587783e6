//! Pretrained weight provisioning.
//!
//! Weight files live in `~/.u2net`; a file already present is trusted and
//! never re-fetched, so provisioning performs network I/O at most once per
//! model. Downloads stream into a `.part` sibling and are renamed on
//! completion, which keeps a killed transfer from masquerading as a cached
//! file. There is no checksum verification, no retry, and no resume.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use burn::{
    module::Module,
    record::{FullPrecisionSettings, Recorder},
    tensor::backend::Backend,
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    error::{U2NetError, U2NetResult},
    models::{U2Net, U2NetRecord},
    registry::{cache_dir, PretrainedModel},
};

/// Ensures the weight file for `model` exists in the per-user cache,
/// downloading it on first use, and returns its path.
///
/// # Errors
///
/// Returns an error if the cache directory cannot be prepared or the
/// download fails.
pub fn fetch_weights(model: PretrainedModel) -> U2NetResult<PathBuf> {
    fetch_weights_into(model, &cache_dir()?)
}

/// [`fetch_weights`] with an explicit cache directory.
pub fn fetch_weights_into(model: PretrainedModel, dir: &Path) -> U2NetResult<PathBuf> {
    let path = dir.join(model.weight_filename());
    if path.exists() {
        tracing::debug!(model = %model, path = %path.display(), "weight file cached");
        return Ok(path);
    }

    fs::create_dir_all(dir).map_err(|e| U2NetError::CacheDir {
        reason: format!("{}: {e}", dir.display()),
    })?;
    download(model.url(), &path)?;
    Ok(path)
}

/// Streams `url` to `dest`, reporting byte progress on stderr.
fn download(url: &str, dest: &Path) -> U2NetResult<()> {
    tracing::info!(url, path = %dest.display(), "downloading model weights");

    let response = reqwest::blocking::get(url)
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|source| U2NetError::Download {
            url: url.to_owned(),
            source,
        })?;

    let bar = match response.content_length() {
        Some(total) => ProgressBar::new(total),
        None => ProgressBar::new_spinner(),
    };
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let part = partial_path(dest);
    let mut writer = BufWriter::new(File::create(&part)?);
    let mut reader = bar.wrap_read(response);
    std::io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    bar.finish_and_clear();

    fs::rename(&part, dest)?;
    Ok(())
}

/// `<file>.part` sibling used while a download is in flight.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Remap rules translating the published PyTorch state-dict keys onto this
/// crate's record paths.
///
/// The PyTorch modules are named `rebnconvin`, `rebnconv1..7`,
/// `rebnconv1d..6d` with `conv_s1`/`bn_s1` leaves; here they are `conv_in`,
/// `encoders.N`, `decoders.N` with `conv`/`bn` leaves. Decoders are stored
/// shallowest-first, so `rebnconvNd` maps to `decoders.N-1` at every RSU
/// height.
fn key_remap_rules() -> Vec<(String, String)> {
    let mut rules = vec![("rebnconvin\\.".to_owned(), "conv_in.".to_owned())];
    for depth in 1..=6 {
        rules.push((
            format!("rebnconv{depth}d\\."),
            format!("decoders.{}.", depth - 1),
        ));
    }
    for depth in 1..=7 {
        rules.push((
            format!("rebnconv{depth}\\."),
            format!("encoders.{}.", depth - 1),
        ));
    }
    rules.push(("conv_s1\\.".to_owned(), "conv.".to_owned()));
    rules.push(("bn_s1\\.".to_owned(), "bn.".to_owned()));
    rules
}

/// Loads `model` onto `device`, provisioning the weight file first.
///
/// The returned network runs on whatever backend `B` is; inference
/// backends carry no autodiff state, so forward passes are free of
/// gradient bookkeeping.
///
/// # Errors
///
/// Returns an error if provisioning or deserialization fails.
pub fn load_model<B: Backend>(
    model: PretrainedModel,
    device: &B::Device,
) -> U2NetResult<U2Net<B>> {
    let path = fetch_weights(model)?;
    load_model_from_file(model, &path, device)
}

/// Loads `model` from a specific weight file.
///
/// # Errors
///
/// Returns [`U2NetError::WeightFileMissing`] if the file is absent and
/// [`U2NetError::WeightLoading`] if deserialization fails.
pub fn load_model_from_file<B: Backend>(
    model: PretrainedModel,
    path: &Path,
    device: &B::Device,
) -> U2NetResult<U2Net<B>> {
    if !path.exists() {
        return Err(U2NetError::WeightFileMissing {
            model: model.name().to_owned(),
            path: path.to_path_buf(),
        });
    }

    let mut load_args = LoadArgs::new(path.to_path_buf());
    for (pattern, replacement) in key_remap_rules() {
        load_args = load_args.with_key_remap(&pattern, &replacement);
    }

    let record: U2NetRecord<B> = PyTorchFileRecorder::<FullPrecisionSettings>::default()
        .load(load_args, device)
        .map_err(|e| U2NetError::WeightLoading {
            reason: e.to_string(),
        })?;

    tracing::info!(model = %model, path = %path.display(), "loaded model weights");
    Ok(model.config().init(device).load_record(record))
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;

    type TestBackend = NdArray;

    /// Applies the remap rules the way burn-import does, for literal keys.
    fn apply_rules(key: &str) -> String {
        let mut key = key.to_owned();
        for (pattern, replacement) in key_remap_rules() {
            let literal = pattern.replace("\\.", ".");
            key = key.replacen(&literal, replacement.as_str(), 1);
        }
        key
    }

    #[test]
    fn cached_file_short_circuits_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let cached = dir.path().join("u2netp.pth");
        fs::write(&cached, b"not real weights").unwrap();

        // The URL is never contacted when the file exists.
        let path = fetch_weights_into(PretrainedModel::U2NetP, dir.path()).unwrap();
        assert_eq!(path, cached);
        assert_eq!(fs::read(&path).unwrap(), b"not real weights");
    }

    #[test]
    fn fetch_is_idempotent_over_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cached = dir.path().join("u2net.pth");
        fs::write(&cached, b"seeded").unwrap();

        let first = fetch_weights_into(PretrainedModel::U2Net, dir.path()).unwrap();
        let second = fetch_weights_into(PretrainedModel::U2Net, dir.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read(&second).unwrap(), b"seeded");
    }

    #[test]
    fn missing_weight_file_names_the_model() {
        let device = Default::default();
        let err = load_model_from_file::<TestBackend>(
            PretrainedModel::U2NetP,
            Path::new("/nonexistent/u2netp.pth"),
            &device,
        )
        .unwrap_err();

        match err {
            U2NetError::WeightFileMissing { model, .. } => assert_eq!(model, "u2netp"),
            other => panic!("expected WeightFileMissing, got {other:?}"),
        }
    }

    #[test]
    fn remap_rules_translate_state_dict_keys() {
        assert_eq!(
            apply_rules("stage1.rebnconvin.conv_s1.weight"),
            "stage1.conv_in.conv.weight"
        );
        assert_eq!(
            apply_rules("stage2.rebnconv5.bn_s1.running_mean"),
            "stage2.encoders.4.bn.running_mean"
        );
        assert_eq!(
            apply_rules("stage1.rebnconv7.conv_s1.weight"),
            "stage1.encoders.6.conv.weight"
        );
        assert_eq!(
            apply_rules("stage1d.rebnconv6d.conv_s1.bias"),
            "stage1d.decoders.5.conv.bias"
        );
        // Side and fusion convolutions keep their names.
        assert_eq!(apply_rules("side3.weight"), "side3.weight");
        assert_eq!(apply_rules("outconv.bias"), "outconv.bias");
    }

    #[test]
    fn partial_path_appends_part_suffix() {
        assert_eq!(
            partial_path(Path::new("/tmp/cache/u2net.pth")),
            Path::new("/tmp/cache/u2net.pth.part")
        );
    }
}
