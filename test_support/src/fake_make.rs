//! Fake `make` executables.
//!
//! The script records its arguments, prints a canned database when invoked
//! with `-p`, and otherwise exits with a chosen status.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A fake `make` living in its own temporary directory.
pub struct FakeMake {
    dir: TempDir,
    path: PathBuf,
}

impl FakeMake {
    /// Create a fake `make` that prints `database` for `-p` and exits with
    /// `build_exit` for any other invocation.
    ///
    /// # Panics
    ///
    /// Panics if the script cannot be written.
    #[must_use]
    pub fn new(database: &str, build_exit: i32) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let db = dir.path().join("database");
        fs::write(&db, database).expect("write database");
        let log = dir.path().join("invocations");
        let path = dir.path().join("make");
        let mut file = File::create(&path).expect("script");
        writeln!(
            file,
            "#!/bin/sh\necho \"$@\" >> '{}'\nif [ \"$1\" = \"-p\" ]; then cat '{}'; exit 0; fi\nexit {build_exit}",
            log.display(),
            db.display()
        )
        .expect("write script");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&path).expect("meta").permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&path, perms).expect("perms");
        }
        Self { dir, path }
    }

    /// Path to the executable, suitable for [`make_env::MAKE_ENV`].
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Argument lists of every invocation so far, oldest first.
    #[must_use]
    pub fn invocations(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("invocations"))
            .map(|log| log.lines().map(str::to_owned).collect())
            .unwrap_or_default()
    }
}
