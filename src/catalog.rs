//! Defines the catalog of prompts and pools available to a session.
//!
//! Prompts are defined in JSON files anywhere under the prompt directory, each file containing an
//! array of prompt records. Pools are defined one per JSON file in the pool directory. The catalog
//! is read once when the library is opened and afterwards only changes through the explicit update
//! functions of [PromptCatalog], which keep the same guarantees as the loader: every pool can be
//! drawn from and every prompt it references exists.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use ustr::{Ustr, UstrMap};
use walkdir::WalkDir;

use crate::{
    data::{Pool, Prompt, PromptRecord},
    error::ConfigurationError,
};

/// The extension of definition files.
const DEFINITION_EXTENSION: &str = "json";

/// A trait that manages the prompts and pools known to sightkeys.
pub trait PromptCatalog {
    /// Returns the prompt with the given ID.
    fn get_prompt(&self, prompt_id: &Ustr) -> Option<Prompt>;

    /// Returns the pool with the given ID.
    fn get_pool(&self, pool_id: &Ustr) -> Option<Pool>;

    /// Returns the IDs of all the prompts, sorted.
    fn get_prompt_ids(&self) -> Vec<Ustr>;

    /// Returns the IDs of all the pools, sorted.
    fn get_pool_ids(&self) -> Vec<Ustr>;

    /// Adds a prompt, replacing any prompt with the same ID.
    fn add_prompt(&mut self, prompt: Prompt);

    /// Removes a prompt. Fails if a pool still references it.
    fn remove_prompt(&mut self, prompt_id: &Ustr) -> Result<Option<Prompt>, ConfigurationError>;

    /// Adds a pool, replacing any pool with the same ID. Fails if the pool cannot be drawn from or
    /// references an unknown prompt.
    fn set_pool(&mut self, pool: Pool) -> Result<(), ConfigurationError>;

    /// Removes a pool.
    fn remove_pool(&mut self, pool_id: &Ustr) -> Option<Pool>;
}

/// An implementation of [PromptCatalog] read from definition files on the local file system.
#[derive(Clone, Debug, Default)]
pub struct LocalPromptCatalog {
    /// A map of prompt IDs to prompts.
    prompts: UstrMap<Prompt>,

    /// A map of pool IDs to pools.
    pools: UstrMap<Pool>,
}

impl LocalPromptCatalog {
    /// Opens and parses the definition file at the given path.
    fn open_definition<T: DeserializeOwned>(path: &Path) -> Result<T> {
        let file = File::open(path)
            .with_context(|| format!("cannot open definition file {}", path.display()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("cannot parse definition file {}", path.display()))
    }

    /// Returns the paths of all the definition files under the given directory, sorted so that
    /// loading is deterministic.
    fn definition_files(directory: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
        let mut walker = WalkDir::new(directory).min_depth(1);
        if !recursive {
            walker = walker.max_depth(1);
        }

        let mut paths = Vec::new();
        for entry in walker {
            let entry = entry.with_context(|| {
                format!("cannot read definition directory {}", directory.display())
            })?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().is_some_and(|ext| ext == DEFINITION_EXTENSION)
            {
                paths.push(path.to_path_buf());
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Reads the prompts in the given directory and its subdirectories.
    fn scan_prompts(directory: &Path) -> Result<Vec<Prompt>, ConfigurationError> {
        let paths = Self::definition_files(directory, true)
            .map_err(|e| ConfigurationError::InvalidDefinition(directory.to_path_buf(), e))?;

        let mut prompts = Vec::new();
        for path in paths {
            let records: Vec<PromptRecord> = Self::open_definition(&path)
                .map_err(|e| ConfigurationError::InvalidDefinition(path.clone(), e))?;
            for record in records {
                let (id, kind) = (record.id.clone(), record.kind.clone());
                let prompt = record
                    .into_prompt()
                    .map_err(|e| ConfigurationError::InvalidDefinition(path.clone(), e.into()))?;
                match prompt {
                    Some(prompt) => prompts.push(prompt),
                    None => log::info!(
                        "skipping prompt {id} with unknown type {kind:?} in {}",
                        path.display()
                    ),
                }
            }
        }
        Ok(prompts)
    }

    /// Reads the pools in the given directory.
    fn scan_pools(directory: &Path) -> Result<Vec<Pool>, ConfigurationError> {
        let paths = Self::definition_files(directory, false)
            .map_err(|e| ConfigurationError::InvalidDefinition(directory.to_path_buf(), e))?;
        paths
            .into_iter()
            .map(|path| {
                Self::open_definition(&path)
                    .map_err(|e| ConfigurationError::InvalidDefinition(path.clone(), e))
            })
            .collect()
    }

    /// Creates a catalog from the definitions in the given directories.
    pub fn open(
        prompt_directory: &Path,
        pool_directory: &Path,
    ) -> Result<LocalPromptCatalog, ConfigurationError> {
        let catalog = Self::from_parts(
            Self::scan_prompts(prompt_directory)?,
            Self::scan_pools(pool_directory)?,
        )?;
        log::info!(
            "loaded {} prompts and {} pools",
            catalog.prompts.len(),
            catalog.pools.len()
        );
        Ok(catalog)
    }

    /// Returns the IDs of the prompts in the pool that a session cannot present, in entry order.
    pub fn unpresentable_prompts(&self, pool: &Pool) -> Vec<Ustr> {
        pool.entries
            .iter()
            .filter(|e| {
                self.prompts
                    .get(&e.prompt_id)
                    .is_some_and(|prompt| !prompt.is_presentable())
            })
            .map(|e| e.prompt_id)
            .collect()
    }

    /// Creates a catalog from the given prompts and pools. Fails on duplicate IDs, on pools that
    /// cannot be drawn from, and on pools referencing unknown prompts.
    pub fn from_parts(
        prompts: Vec<Prompt>,
        pools: Vec<Pool>,
    ) -> Result<LocalPromptCatalog, ConfigurationError> {
        let mut catalog = LocalPromptCatalog::default();
        for prompt in prompts {
            let id = prompt.id();
            if catalog.prompts.insert(id, prompt).is_some() {
                return Err(ConfigurationError::DuplicateId(id));
            }
        }
        for pool in pools {
            if catalog.pools.contains_key(&pool.id) {
                return Err(ConfigurationError::DuplicateId(pool.id));
            }
            catalog.set_pool(pool)?;
        }
        Ok(catalog)
    }
}

impl PromptCatalog for LocalPromptCatalog {
    fn get_prompt(&self, prompt_id: &Ustr) -> Option<Prompt> {
        self.prompts.get(prompt_id).cloned()
    }

    fn get_pool(&self, pool_id: &Ustr) -> Option<Pool> {
        self.pools.get(pool_id).cloned()
    }

    fn get_prompt_ids(&self) -> Vec<Ustr> {
        let mut ids: Vec<Ustr> = self.prompts.keys().copied().collect();
        ids.sort();
        ids
    }

    fn get_pool_ids(&self) -> Vec<Ustr> {
        let mut ids: Vec<Ustr> = self.pools.keys().copied().collect();
        ids.sort();
        ids
    }

    fn add_prompt(&mut self, prompt: Prompt) {
        self.prompts.insert(prompt.id(), prompt);
    }

    fn remove_prompt(&mut self, prompt_id: &Ustr) -> Result<Option<Prompt>, ConfigurationError> {
        let referencing_pool = self
            .pools
            .values()
            .find(|pool| pool.entries.iter().any(|e| e.prompt_id == *prompt_id));
        if let Some(pool) = referencing_pool {
            return Err(ConfigurationError::PromptInUse(*prompt_id, pool.id));
        }
        Ok(self.prompts.remove(prompt_id))
    }

    fn set_pool(&mut self, pool: Pool) -> Result<(), ConfigurationError> {
        pool.validate()?;
        if let Some(entry) = pool
            .entries
            .iter()
            .find(|e| !self.prompts.contains_key(&e.prompt_id))
        {
            return Err(ConfigurationError::UnknownPrompt(pool.id, entry.prompt_id));
        }
        for prompt_id in self.unpresentable_prompts(&pool) {
            log::warn!(
                "pool {} contains prompt {prompt_id}, which cannot be presented yet",
                pool.id
            );
        }
        self.pools.insert(pool.id, pool);
        Ok(())
    }

    fn remove_pool(&mut self, pool_id: &Ustr) -> Option<Pool> {
        self.pools.remove(pool_id)
    }
}
