use crate::error::PetResult;
use crate::snapshot::Snapshot;
use std::io;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Where snapshots live between sessions.
pub(crate) trait Store {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> PetResult<Option<Snapshot>>;
    fn save(&mut self, snapshot: &Snapshot) -> PetResult<()>;
}

/// Pretty-printed JSON, replaced atomically on every save.
pub(crate) struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Start over: the next load sees no save.
    pub(crate) fn reset(&self) -> PetResult<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

impl Store for JsonFileStore {
    fn load(&self) -> PetResult<Option<Snapshot>> {
        let s = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&s)?))
    }

    fn save(&mut self, snapshot: &Snapshot) -> PetResult<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(snapshot)?;
        fs::write(&tmp, data)?;
        atomic_rename(&tmp, &self.path)?;
        Ok(())
    }
}

pub(crate) fn atomic_rename(from: &Path, to: &Path) -> io::Result<()> {
    // rename() already replaces on unix; windows needs the old file gone first.
    if cfg!(windows) && to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to)
}

#[cfg(test)]
pub(crate) use memory::MemoryStore;

#[cfg(test)]
mod memory {
    use super::*;
    use crate::error::PetError;

    /// In-memory store that counts saves and can be told to fail.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub(crate) saved: Option<Snapshot>,
        pub(crate) saves: usize,
        pub(crate) fail_load: bool,
    }

    impl Store for MemoryStore {
        fn load(&self) -> PetResult<Option<Snapshot>> {
            if self.fail_load {
                return Err(PetError::Io(io::Error::new(io::ErrorKind::Other, "boom")));
            }
            Ok(self.saved.clone())
        }

        fn save(&mut self, snapshot: &Snapshot) -> PetResult<()> {
            self.saved = Some(snapshot.clone());
            self.saves += 1;
            Ok(())
        }
    }
}
