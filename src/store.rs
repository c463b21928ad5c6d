use std::{
    fs,
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};

use crate::{algo::Policy, error::Result};

/// Persists a [`Policy`] as a JSON file
#[derive(Debug, Clone)]
pub struct PolicyStore {
    path: PathBuf,
}

impl PolicyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `policy` to the store, replacing any previous contents
    pub fn save<S, A>(&self, policy: &Policy<S, A>) -> Result<()>
    where
        S: Serialize,
        A: Serialize,
    {
        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        // the previous file stays intact until the rename
        let tmp = self.tmp_path();
        let written = Self::write(&tmp, policy)
            .and_then(|()| fs::rename(&tmp, &self.path).map_err(Into::into));
        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written?;

        log::info!(
            "saved policy with {} states to {}",
            policy.table.len(),
            self.path.display()
        );
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        name.into()
    }

    fn write<S, A>(path: &Path, policy: &Policy<S, A>) -> Result<()>
    where
        S: Serialize,
        A: Serialize,
    {
        let file = fs::File::create(path)?;
        let mut writer = BufWriter::new(&file);
        serde_json::to_writer(&mut writer, policy)?;
        writer.flush()?;
        drop(writer);
        file.sync_all()?;
        Ok(())
    }

    /// Read the policy from the store
    pub fn load<S, A>(&self) -> Result<Policy<S, A>>
    where
        S: DeserializeOwned,
        A: DeserializeOwned,
    {
        let reader = BufReader::new(fs::File::open(&self.path)?);
        let policy: Policy<S, A> = serde_json::from_reader(reader)?;

        log::info!(
            "loaded policy with {} states from {}",
            policy.table.len(),
            self.path.display()
        );
        Ok(policy)
    }

    /// Read the policy, treating a missing or unreadable blob as "nothing learned yet"
    ///
    /// **Returns** `Ok(None)` if the file does not exist, does not decode, or holds an epsilon outside
    /// `[0, 1]`. Any other I/O failure is returned as an error.
    pub fn load_or_fresh<S, A>(&self) -> Result<Option<Policy<S, A>>>
    where
        S: DeserializeOwned,
        A: DeserializeOwned,
    {
        let reader = match fs::File::open(&self.path) {
            Ok(file) => BufReader::new(file),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!(
                    "no policy at {}, starting from an empty table",
                    self.path.display()
                );
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let policy: Policy<S, A> = match serde_json::from_reader(reader) {
            Ok(policy) => policy,
            Err(e) if e.is_io() => return Err(e.into()),
            Err(e) => {
                log::warn!(
                    "policy at {} is corrupt ({e}), starting from an empty table",
                    self.path.display()
                );
                return Ok(None);
            }
        };

        if !(0.0..=1.0).contains(&policy.epsilon) {
            log::warn!(
                "policy at {} has epsilon {} outside [0, 1], starting from an empty table",
                self.path.display(),
                policy.epsilon
            );
            return Ok(None);
        }

        log::info!(
            "loaded policy with {} states from {}",
            policy.table.len(),
            self.path.display()
        );
        Ok(Some(policy))
    }
}
