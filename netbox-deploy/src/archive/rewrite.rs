//! Streaming tar.gz rewrite
//!
//! decompress -> demux entries -> rewrite or pass through -> remux -> compress.
//! Entries are copied one at a time in archive order. Only the manifest entry
//! is buffered, because it has to be parsed as a whole before it can be
//! rewritten.

use std::io::{self, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_yaml::{Mapping, Value};
use tar::{Archive, Builder, Entry};
use tracing::{debug, info};

use crate::errors::DeployerError;

/// File name of the manifest inside the archive's top-level directory
pub const MANIFEST_NAME: &str = "heroku.yml";

/// Mappings enclosing the injected version inside the manifest
pub const VERSION_PARENTS: [&str; 2] = ["build", "config"];

/// Key of the injected version
pub const VERSION_KEY: &str = "VERSION";

/// Summary of one rewrite run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub entries: usize,
    pub manifest_path: Option<String>,
}

/// Whether an archive path names the manifest: its second `/`-separated
/// segment must be exactly `heroku.yml`
pub fn is_manifest_path(path: &str) -> bool {
    path.split('/').nth(1) == Some(MANIFEST_NAME)
}

/// Set `build.config.VERSION` in a manifest document and serialize it again.
/// Missing intermediate mappings are created.
pub fn rewrite_manifest(source: &[u8], version: &str) -> Result<Vec<u8>, DeployerError> {
    let mut document: Value = if source.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_yaml::from_slice(source).map_err(|e| DeployerError::ManifestParseError(e.to_string()))?
    };

    if document.is_null() {
        document = Value::Mapping(Mapping::new());
    }

    let mut mapping = document.as_mapping_mut().ok_or_else(|| {
        DeployerError::ManifestParseError("manifest is not a mapping".to_string())
    })?;
    for key in VERSION_PARENTS {
        mapping = child_mapping(mapping, key)?;
    }
    mapping.insert(Value::from(VERSION_KEY), Value::from(version));

    serde_yaml::to_string(&document)
        .map(String::into_bytes)
        .map_err(|e| DeployerError::ManifestParseError(e.to_string()))
}

fn child_mapping<'a>(mapping: &'a mut Mapping, key: &str) -> Result<&'a mut Mapping, DeployerError> {
    let missing = match mapping.get(key) {
        None => true,
        Some(value) => value.is_null(),
    };
    if missing {
        mapping.insert(Value::from(key), Value::Mapping(Mapping::new()));
    }

    mapping
        .get_mut(key)
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| DeployerError::ManifestParseError(format!("`{}` is not a mapping", key)))
}

fn format_error(stage: &str) -> impl Fn(io::Error) -> DeployerError + '_ {
    move |e| DeployerError::ArchiveFormatError(format!("{}: {}", stage, e))
}

/// Rewrite the manifest of the gzip-compressed tar read from `input` and write
/// the result, gzip-compressed, to `output`.
///
/// The sink is handed back only after the tar end marker and the gzip trailer
/// have been written. On error whatever was written so far is garbage.
pub fn transform_archive<R, W>(input: R, output: W, version: &str) -> Result<(W, RewriteStats), DeployerError>
where
    R: Read,
    W: Write,
{
    let mut archive = Archive::new(GzDecoder::new(input));
    let mut builder = Builder::new(GzEncoder::new(output, Compression::default()));
    let mut stats = RewriteStats::default();

    for entry in archive.entries().map_err(format_error("reading archive"))? {
        let mut entry = entry.map_err(format_error("reading entry header"))?;
        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        stats.entries += 1;

        let is_manifest = stats.manifest_path.is_none()
            && entry.header().entry_type().is_file()
            && is_manifest_path(&name);

        if is_manifest {
            debug!("Rewriting manifest {}", name);
            rewrite_entry(&mut builder, &mut entry, &name, version)?;
            stats.manifest_path = Some(name);
        } else {
            copy_entry(&mut builder, &mut entry, &name)?;
        }
    }

    let Some(manifest_path) = stats.manifest_path.as_deref() else {
        return Err(DeployerError::ManifestParseError(format!(
            "manifest {} not found below the archive root",
            MANIFEST_NAME
        )));
    };
    info!("Injected version {} into {}", version, manifest_path);

    // Drain the rest of the gzip stream so its trailer checksum is verified
    let mut decoder = archive.into_inner();
    io::copy(&mut decoder, &mut io::sink()).map_err(format_error("reading archive trailer"))?;

    let encoder = builder.into_inner().map_err(format_error("finishing tar"))?;
    let output = encoder.finish().map_err(format_error("finishing gzip"))?;

    Ok((output, stats))
}

fn rewrite_entry<R: Read, W: Write>(
    builder: &mut Builder<W>,
    entry: &mut Entry<'_, R>,
    name: &str,
    version: &str,
) -> Result<(), DeployerError> {
    // The declared size is not trusted as a buffer bound
    let mut source = Vec::new();
    entry
        .read_to_end(&mut source)
        .map_err(format_error("reading manifest"))?;

    let rewritten = rewrite_manifest(&source, version)?;

    let mut header = entry.header().clone();
    header.set_size(rewritten.len() as u64);
    builder
        .append_data(&mut header, Path::new(name), rewritten.as_slice())
        .map_err(format_error("writing manifest"))
}

fn copy_entry<R: Read, W: Write>(
    builder: &mut Builder<W>,
    entry: &mut Entry<'_, R>,
    name: &str,
) -> Result<(), DeployerError> {
    let mut header = entry.header().clone();
    let entry_type = header.entry_type();

    if entry_type.is_symlink() || entry_type.is_hard_link() {
        let target = entry
            .link_name()
            .map_err(format_error("reading link target"))?
            .map(|target| target.into_owned());
        if let Some(target) = target {
            return builder
                .append_link(&mut header, Path::new(name), target)
                .map_err(format_error("writing link"));
        }
    }

    builder
        .append_data(&mut header, Path::new(name), entry)
        .map_err(format_error("copying entry"))
}
