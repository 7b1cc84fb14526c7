//! In-process archive steps

use apkpipe_errors::Error;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MAX_DEFLATE_LEVEL: i64 = 9;

fn deflated() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(MAX_DEFLATE_LEVEL))
}

fn stored() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
}

async fn blocking<T, F>(what: &'static str, f: F) -> Result<T, Error>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, Error> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::internal(format!("{what} task failed: {e}")))?
}

/// Zip `source` into `zip`. Files of `max_deflate_size` bytes or more are
/// stored, smaller ones deflated at maximum compression.
///
/// Entry names are relative to `source`, `/`-separated and sorted.
///
/// # Errors
///
/// Returns an error if the directory cannot be walked or the zip written.
pub async fn zip_directory_with_max_deflate(
    source: &Path,
    zip: &Path,
    max_deflate_size: u64,
) -> Result<usize, Error> {
    let source = source.to_path_buf();
    let zip = zip.to_path_buf();
    blocking("zip", move || write_directory_zip(&source, &zip, max_deflate_size)).await
}

fn write_directory_zip(source: &Path, zip: &Path, max_deflate_size: u64) -> Result<usize, Error> {
    let file = File::create(zip).map_err(|e| Error::io_with_path(&e, zip))?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let mut written = 0;

    for entry in walkdir::WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::internal(format!("walk {}: {e}", source.display())))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry_name(source, entry.path())?;
        let size = entry
            .metadata()
            .map_err(|e| Error::internal(format!("stat {}: {e}", entry.path().display())))?
            .len();
        let options = if size >= max_deflate_size {
            stored()
        } else {
            deflated()
        };

        writer.start_file(name, options)?;
        let mut input = BufReader::new(
            File::open(entry.path()).map_err(|e| Error::io_with_path(&e, entry.path()))?,
        );
        std::io::copy(&mut input, &mut writer)?;
        written += 1;
    }

    writer.finish()?.flush()?;
    Ok(written)
}

fn entry_name(root: &Path, path: &Path) -> Result<String, Error> {
    let relative = path
        .strip_prefix(root)
        .map_err(|e| Error::internal(e.to_string()))?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

/// Copy `input` to `output`, rewriting the named entries at maximum
/// deflation and copying every other entry untouched.
///
/// # Errors
///
/// Returns an error if either archive cannot be read or written.
pub async fn repack_zip_entries(
    input: &Path,
    output: &Path,
    entries: &[String],
) -> Result<(), Error> {
    let input = input.to_path_buf();
    let output = output.to_path_buf();
    let entries: BTreeSet<String> = entries.iter().cloned().collect();
    blocking("repack", move || repack(&input, &output, &entries)).await
}

fn repack(input: &Path, output: &Path, entries: &BTreeSet<String>) -> Result<(), Error> {
    let source = File::open(input).map_err(|e| Error::io_with_path(&e, input))?;
    let mut archive = ZipArchive::new(BufReader::new(source))?;
    let target = File::create(output).map_err(|e| Error::io_with_path(&e, output))?;
    let mut writer = ZipWriter::new(BufWriter::new(target));

    for index in 0..archive.len() {
        let name = archive.name_for_index(index).map(str::to_string);
        match name {
            Some(name) if entries.contains(&name) => {
                let mut contents = Vec::new();
                archive.by_index(index)?.read_to_end(&mut contents)?;
                writer.start_file(name, deflated())?;
                writer.write_all(&contents)?;
            }
            _ => writer.raw_copy_file(archive.by_index_raw(index)?)?,
        }
    }

    writer.finish()?.flush()?;
    Ok(())
}
