//! Puppet definition sources.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use anyhow::Context;

use crate::assets::decode::{PreparedImage, decode_image};
use crate::foundation::error::{PuppetError, PuppetResult};
use crate::puppet::definition::PuppetDefinition;

/// Boxed, non-`Send` future; everything here runs on one thread.
pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Where a puppet comes from: a filesystem path or a key understood by a custom loader.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PuppetSource(String);

impl PuppetSource {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self(path.as_ref().to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PuppetSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fetched definition with its decoded textures, in definition order.
#[derive(Clone, Debug)]
pub struct LoadedPuppet {
    pub definition: PuppetDefinition,
    pub images: Vec<PreparedImage>,
}

/// Asynchronous puppet source.
///
/// Fetching is the only suspension point of a load; implementations may do network or file IO.
pub trait PuppetLoader {
    fn fetch<'a>(&'a self, source: &'a PuppetSource) -> LocalBoxFuture<'a, PuppetResult<LoadedPuppet>>;
}

/// Loads `<definition>.json` from disk and decodes the textures next to it.
#[derive(Clone, Debug, Default)]
pub struct FsPuppetLoader {
    root: Option<PathBuf>,
}

impl FsPuppetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative sources against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, source: &PuppetSource) -> PathBuf {
        let p = PathBuf::from(source.as_str());
        match &self.root {
            Some(root) if p.is_relative() => root.join(p),
            _ => p,
        }
    }

    fn load_sync(&self, source: &PuppetSource) -> PuppetResult<LoadedPuppet> {
        let path = self.resolve(source);
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("read puppet definition '{}'", path.display()))?;
        let definition = PuppetDefinition::from_json_str(&json)?;

        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut images = Vec::with_capacity(definition.textures.len());
        for rel in &definition.textures {
            let tex_path = base.join(rel);
            let bytes = std::fs::read(&tex_path)
                .with_context(|| format!("read texture '{}'", tex_path.display()))?;
            images.push(decode_image(&bytes)?);
        }
        Ok(LoadedPuppet { definition, images })
    }
}

impl PuppetLoader for FsPuppetLoader {
    fn fetch<'a>(&'a self, source: &'a PuppetSource) -> LocalBoxFuture<'a, PuppetResult<LoadedPuppet>> {
        Box::pin(async move {
            self.load_sync(source)
                .map_err(|e| PuppetError::load(format!("'{source}': {e}")))
        })
    }
}

/// In-memory loader for embedding hosts that ship puppets inside the binary.
#[derive(Clone, Debug, Default)]
pub struct MemoryPuppetLoader {
    puppets: HashMap<PuppetSource, LoadedPuppet>,
}

impl MemoryPuppetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: PuppetSource, puppet: LoadedPuppet) {
        self.puppets.insert(source, puppet);
    }

    pub fn with(mut self, source: impl Into<String>, puppet: LoadedPuppet) -> Self {
        self.insert(PuppetSource::new(source), puppet);
        self
    }
}

impl PuppetLoader for MemoryPuppetLoader {
    fn fetch<'a>(&'a self, source: &'a PuppetSource) -> LocalBoxFuture<'a, PuppetResult<LoadedPuppet>> {
        let found = self
            .puppets
            .get(source)
            .cloned()
            .ok_or_else(|| PuppetError::load(format!("no puppet registered for '{source}'")));
        Box::pin(std::future::ready(found))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/puppet/loader.rs"]
mod tests;
