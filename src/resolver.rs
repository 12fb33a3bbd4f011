//! Resolution of profile paths to concrete source files.
//!
//! A cover profile names files by import path (`example.com/mod/pkg/a.go`);
//! the source lives somewhere under one of the configured roots. Resolution
//! tries progressively shorter suffixes of the import directory under each
//! root until the file is found. Resolved directories are cached per
//! resolver instance, so the cache lives exactly as long as one run.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use crate::error::{CovError, Result};

#[derive(Debug, Clone)]
struct Resolved {
    dir: PathBuf,
    import_path: String,
}

/// Maps profile file paths to `(concrete path, import path)` pairs.
#[derive(Debug)]
pub struct Resolver {
    roots: Vec<PathBuf>,
    cache: HashMap<String, Resolved>,
}

impl Resolver {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            cache: HashMap::new(),
        }
    }

    /// Resolve a profile path such as `example.com/mod/pkg/a.go`.
    ///
    /// Returns the concrete source path and the import path of the package
    /// the file belongs to.
    pub fn resolve(&mut self, profile_path: &str) -> Result<(PathBuf, String)> {
        let (dir, file) = split_dir_file(profile_path);

        if let Some(hit) = self.cache.get(dir) {
            return Ok((hit.dir.join(file), hit.import_path.clone()));
        }

        let resolved = self.locate(dir, file)?;
        debug!(
            import_path = resolved.import_path,
            dir = %resolved.dir.display(),
            "resolved package directory"
        );
        let result = (resolved.dir.join(file), resolved.import_path.clone());
        self.cache.insert(dir.to_string(), resolved);
        Ok(result)
    }

    fn locate(&self, dir: &str, file: &str) -> Result<Resolved> {
        let components: Vec<&str> = dir.split('/').filter(|c| !c.is_empty()).collect();
        for root in &self.roots {
            // Longest existing suffix of the import directory under this
            // root; the leading components are the module prefix the
            // checkout does not reproduce on disk.
            for skip in 0..=components.len() {
                let mut candidate = root.clone();
                for part in &components[skip..] {
                    candidate.push(part);
                }
                if candidate.join(file).is_file() {
                    return Ok(Resolved {
                        dir: candidate,
                        import_path: dir.to_string(),
                    });
                }
            }
        }
        Err(CovError::Resolution {
            file: join_dir_file(dir, file),
        })
    }
}

fn split_dir_file(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    }
}

fn join_dir_file(dir: &str, file: &str) -> String {
    if dir.is_empty() {
        file.to_string()
    } else {
        format!("{dir}/{file}")
    }
}
