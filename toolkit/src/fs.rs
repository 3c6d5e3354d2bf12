use std::io::ErrorKind;
use std::path::Path;

use tokio::fs::DirBuilder;

use crate::Toolkit;
use crate::errors::Result;

const DIR_MODE: u32 = 0o755;

impl Toolkit {
    /// Creates `dir` and any missing parents. An existing path is left alone, so calling this
    /// repeatedly is fine.
    pub async fn create_dir_if_not_exists(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        match tokio::fs::metadata(dir).await {
            Ok(_) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(DIR_MODE);
        builder.create(dir).await?;

        tracing::debug!(dir = %dir.display(), "Created directory");
        Ok(())
    }
}
