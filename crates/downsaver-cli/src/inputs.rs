//! Expanding command-line inputs into the list of files to convert.

use std::path::{Path, PathBuf};

use downsaver_core::Config;
use walkdir::WalkDir;

/// One file to convert and where it sits relative to the input it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    /// Path below `--output-dir`: the file name for a file argument, `<dir name>/<sub path>`
    /// for a file found inside a directory argument.
    pub relative: PathBuf,
}

#[derive(Debug, Default)]
pub struct InputSet {
    pub files: Vec<InputFile>,
    /// Inputs that were not converted, one message each.
    pub skipped: Vec<String>,
}

fn accepts(config: &Config, path: &Path) -> bool {
    let accepted = config.accepted_extensions();
    accepted.is_empty()
        || path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| accepted.iter().any(|a| a.eq_ignore_ascii_case(ext)))
}

/// Files are taken as given; directories contribute their accepted files, sorted by name, one
/// level deep or the whole tree with `recursive`.
pub fn collect_inputs(inputs: &[PathBuf], recursive: bool, config: &Config) -> InputSet {
    let mut set = InputSet::default();

    for input in inputs {
        if input.is_dir() {
            let dir_name = input.file_name().map(PathBuf::from).unwrap_or_default();
            let max_depth = if recursive { usize::MAX } else { 1 };

            for entry in WalkDir::new(input)
                .min_depth(1)
                .max_depth(max_depth)
                .sort_by_file_name()
            {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!(
                            input = %input.display(),
                            error = %e,
                            "Skipping unreadable entry"
                        );
                        set.skipped.push(format!("Could not read {}: {}", input.display(), e));
                        continue;
                    }
                };
                if !entry.file_type().is_file() || !accepts(config, entry.path()) {
                    continue;
                }
                let below = entry.path().strip_prefix(input).unwrap_or(entry.path());
                set.files.push(InputFile {
                    path: entry.path().to_path_buf(),
                    relative: dir_name.join(below),
                });
            }
        } else if input.is_file() {
            if !accepts(config, input) {
                set.skipped
                    .push(format!("Skipping unsupported file: {}", input.display()));
                continue;
            }
            set.files.push(InputFile {
                path: input.clone(),
                relative: input.file_name().map(PathBuf::from).unwrap_or_default(),
            });
        } else {
            set.skipped.push(format!("Input not found: {}", input.display()));
        }
    }

    set
}
