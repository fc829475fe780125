/*
 * cache.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compiled-template cache.
//!
//! [`TemplateCache`] sits between the evaluator and a [`TemplateResolver`].
//! Each name gets a slot holding the last compiled artifact together with
//! the SHA-256 hash of the source it was compiled from. A lookup re-resolves
//! the source and recompiles when the hash changed.
//!
//! At most one compile per name runs at a time. A reader that finds a
//! compile in flight gets the previous artifact when there is one, and
//! otherwise waits for the compile to finish.

use crate::error::{TemplateError, TemplateResult};
use crate::options::CompileOptions;
use crate::parser::Template;
use crate::resolver::{TemplateLoader, TemplateResolver};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, TryLockError};
use tracing::{debug, warn};
use weft_source_map::{FileId, SourceContext};

/// Content hash of a template source.
///
/// Format: "sha256:<hex-digest>"
pub fn sha256_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    format!("sha256:{:x}", digest)
}

#[derive(Debug)]
struct Artifact {
    hash: String,
    template: Arc<Template>,
}

#[derive(Debug)]
struct CacheSlot {
    file_id: FileId,
    compile_lock: Mutex<()>,
    artifact: RwLock<Option<Artifact>>,
}

/// Thread-safe cache of compiled templates.
#[derive(Debug)]
pub struct TemplateCache<R> {
    resolver: R,
    options: CompileOptions,
    slots: Mutex<HashMap<String, Arc<CacheSlot>>>,
    /// `FileId(0)` stays free for the template that drives the evaluation.
    next_file_id: AtomicUsize,
}

impl<R: TemplateResolver> TemplateCache<R> {
    pub fn new(resolver: R) -> Self {
        Self::with_options(resolver, CompileOptions::default())
    }

    pub fn with_options(resolver: R, options: CompileOptions) -> Self {
        Self {
            resolver,
            options,
            slots: Mutex::new(HashMap::new()),
            next_file_id: AtomicUsize::new(1),
        }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compiled template for `name`, compiling when the source changed.
    pub fn get_or_compile(&self, name: &str) -> TemplateResult<Arc<Template>> {
        let source = self
            .resolver
            .resolve(name)
            .ok_or_else(|| TemplateError::TemplateNotFound {
                name: name.to_string(),
            })?;
        let hash = sha256_hash(&source);
        let slot = self.slot(name)?;

        if let Some(template) = current(&slot, &hash, name)? {
            return Ok(template);
        }

        let _guard = match slot.compile_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                if let Some(stale) = latest(&slot, name)? {
                    warn!(template = name, "compile in flight, serving previous artifact");
                    return Ok(stale);
                }
                lock(&slot.compile_lock, name)?
            }
            Err(TryLockError::Poisoned(_)) => return Err(poisoned(name)),
        };

        // Another reader may have compiled while this one waited.
        if let Some(template) = current(&slot, &hash, name)? {
            return Ok(template);
        }

        debug!(template = name, %hash, "compiling template");
        let template = Arc::new(Template::compile_with(
            &source,
            name,
            slot.file_id,
            &self.options,
        ));
        let mut artifact = slot.artifact.write().map_err(|_| poisoned(name))?;
        *artifact = Some(Artifact {
            hash,
            template: Arc::clone(&template),
        });
        Ok(template)
    }

    /// Drop the artifact for `name`; the next lookup recompiles.
    pub fn invalidate(&self, name: &str) -> TemplateResult<()> {
        let slot = lock(&self.slots, name)?.get(name).cloned();
        if let Some(slot) = slot {
            *slot.artifact.write().map_err(|_| poisoned(name))? = None;
        }
        Ok(())
    }

    /// Drop every artifact.
    pub fn clear(&self) -> TemplateResult<()> {
        lock(&self.slots, "<all>")?.clear();
        Ok(())
    }

    /// Number of names with a slot.
    pub fn len(&self) -> usize {
        self.slots.lock().map_or(0, |slots| slots.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Source context covering every cached artifact, for rendering
    /// diagnostics raised inside `#parse`d templates.
    pub fn source_context(&self) -> SourceContext {
        let mut context = SourceContext::new();
        let Ok(slots) = self.slots.lock() else {
            return context;
        };
        let mut entries: Vec<_> = slots.values().collect();
        entries.sort_by_key(|slot| slot.file_id.0);
        for slot in entries {
            if let Ok(artifact) = slot.artifact.read() {
                if let Some(artifact) = artifact.as_ref() {
                    let template = &artifact.template;
                    context.add_file_with_id(
                        slot.file_id,
                        template.name().to_string(),
                        Some(template.source().to_string()),
                    );
                }
            }
        }
        context
    }

    fn slot(&self, name: &str) -> TemplateResult<Arc<CacheSlot>> {
        let mut slots = lock(&self.slots, name)?;
        let slot = slots.entry(name.to_string()).or_insert_with(|| {
            Arc::new(CacheSlot {
                file_id: FileId(self.next_file_id.fetch_add(1, Ordering::Relaxed)),
                compile_lock: Mutex::new(()),
                artifact: RwLock::new(None),
            })
        });
        Ok(Arc::clone(slot))
    }
}

impl<R: TemplateResolver> TemplateLoader for TemplateCache<R> {
    fn resolve(&self, name: &str) -> Option<String> {
        self.resolver.resolve(name)
    }

    fn get_compiled(&self, name: &str) -> TemplateResult<Arc<Template>> {
        self.get_or_compile(name)
    }
}

fn poisoned(name: &str) -> TemplateError {
    TemplateError::CachePoisoned {
        name: name.to_string(),
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> TemplateResult<MutexGuard<'a, T>> {
    mutex.lock().map_err(|_| poisoned(name))
}

/// The artifact when it was compiled from source with this hash.
fn current(slot: &CacheSlot, hash: &str, name: &str) -> TemplateResult<Option<Arc<Template>>> {
    let artifact = slot.artifact.read().map_err(|_| poisoned(name))?;
    Ok(artifact
        .as_ref()
        .filter(|artifact| artifact.hash == hash)
        .map(|artifact| Arc::clone(&artifact.template)))
}

/// The artifact regardless of its hash.
fn latest(slot: &CacheSlot, name: &str) -> TemplateResult<Option<Arc<Template>>> {
    let artifact = slot.artifact.read().map_err(|_| poisoned(name))?;
    Ok(artifact.as_ref().map(|artifact| Arc::clone(&artifact.template)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::MemoryResolver;
    use pretty_assertions::assert_eq;

    /// Resolver whose content can be swapped between lookups.
    #[derive(Default)]
    struct Editable {
        content: Mutex<String>,
    }

    impl Editable {
        fn set(&self, content: &str) {
            *self.content.lock().expect("lock") = content.to_string();
        }
    }

    impl TemplateResolver for Editable {
        fn resolve(&self, name: &str) -> Option<String> {
            (name == "page").then(|| self.content.lock().expect("lock").clone())
        }
    }

    #[test]
    fn test_hash_format() {
        let hash = sha256_hash("Hello, world!");
        assert!(hash.starts_with("sha256:"));
        assert_eq!(hash.len(), "sha256:".len() + 64);
        assert_eq!(hash, sha256_hash("Hello, world!"));
        assert_ne!(hash, sha256_hash("Hello, world?"));
    }

    #[test]
    fn test_compiles_once_per_source() {
        let cache = TemplateCache::new(MemoryResolver::with_templates([("a", "$x")]));
        let first = cache.get_or_compile("a").expect("compile");
        let second = cache.get_or_compile("a").expect("compile");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_changed_source_recompiles() {
        let cache = TemplateCache::new(Editable::default());
        cache.resolver().set("one");
        let first = cache.get_or_compile("page").expect("compile");
        cache.resolver().set("two");
        let second = cache.get_or_compile("page").expect("compile");
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.source(), "two");
        assert_eq!(first.file_id(), second.file_id());
    }

    #[test]
    fn test_missing_template() {
        let cache = TemplateCache::new(MemoryResolver::new());
        let err = cache.get_or_compile("nope").expect_err("missing");
        assert!(matches!(err, TemplateError::TemplateNotFound { name } if name == "nope"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = TemplateCache::new(MemoryResolver::with_templates([("a", "A"), ("b", "B")]));
        let first = cache.get_or_compile("a").expect("compile");
        cache.invalidate("a").expect("invalidate");
        let second = cache.get_or_compile("a").expect("compile");
        assert!(!Arc::ptr_eq(&first, &second));

        cache.get_or_compile("b").expect("compile");
        assert_eq!(cache.len(), 2);
        cache.clear().expect("clear");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_source_context_lists_artifacts() {
        let cache = TemplateCache::new(MemoryResolver::with_templates([("a", "A"), ("b", "B")]));
        let a = cache.get_or_compile("a").expect("compile");
        let b = cache.get_or_compile("b").expect("compile");
        let context = cache.source_context();
        assert_eq!(context.len(), 2);
        assert!(context.get_file(a.file_id()).is_some());
        assert!(context.get_file(b.file_id()).is_some());
    }

    #[test]
    fn test_concurrent_readers_share_one_artifact() {
        let cache = TemplateCache::new(MemoryResolver::with_templates([("a", "#foreach(x in xs)$x#end")]));
        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| cache.get_or_compile("a").expect("compile")))
                .collect();
            handles.into_iter().map(|h| h.join().expect("join")).collect()
        });
        for template in &results[1..] {
            assert!(Arc::ptr_eq(&results[0], template));
        }
    }
}
