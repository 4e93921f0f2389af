// src/session.rs

//! Client session
//!
//! A [`Session`] owns everything a match depends on: the settings, the
//! lazily opened repository stores, the object cache and the selection
//! policy. It is passed explicitly to whatever needs it.

use crate::cache::ObjectCache;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::repository::{INSTALLED_REPOSITORY_ID, RepositoryStore, SqliteRepository};
use crate::resolver::{Matcher, PackageMasks, SelectionPolicy, policy_for};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info};

pub struct Session {
    settings: Settings,
    stores: RefCell<HashMap<String, Rc<dyn RepositoryStore>>>,
    cache: ObjectCache,
    policy: Box<dyn SelectionPolicy>,
    masks: PackageMasks,
}

impl Session {
    /// Start a session; stores are opened on first use
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let cache = Self::open_cache(&settings)?;
        let policy = policy_for(settings.selection);
        let masks = PackageMasks::from_settings(&settings)?;
        info!(
            "Session started: branch {}, {} enabled repositories, {} selection",
            settings.branch,
            settings.enabled_repositories().len(),
            policy.name()
        );
        Ok(Self {
            settings,
            stores: RefCell::new(HashMap::new()),
            cache,
            policy,
            masks,
        })
    }

    fn open_cache(settings: &Settings) -> Result<ObjectCache> {
        ObjectCache::new(
            &settings.cache_dir,
            settings.live_cache_capacity,
            settings.write_buffer_capacity,
        )
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &ObjectCache {
        &self.cache
    }

    pub fn policy(&self) -> &dyn SelectionPolicy {
        self.policy.as_ref()
    }

    /// Parsed `package_mask` and `package_unmask` rules
    pub fn masks(&self) -> &PackageMasks {
        &self.masks
    }

    /// Replace the selection policy
    pub fn set_policy(&mut self, policy: Box<dyn SelectionPolicy>) {
        debug!("Selection policy set to {}", policy.name());
        self.policy = policy;
    }

    pub fn matcher(&self) -> Matcher<'_> {
        Matcher::new(self)
    }

    /// Enabled repository identifiers in priority order
    pub fn repository_order(&self) -> Vec<String> {
        self.settings.repository_order()
    }

    /// Make `store` the store for its id, replacing any open one
    pub fn register_store(&self, store: Rc<dyn RepositoryStore>) {
        let id = store.id().to_string();
        debug!("Registered store for {}", id);
        self.stores.borrow_mut().insert(id, store);
    }

    /// The store for `id`, opening it on first use
    ///
    /// Fails with [`Error::StoreUnavailable`] when the repository is not
    /// configured or its database cannot be opened.
    pub fn store(&self, id: &str) -> Result<Rc<dyn RepositoryStore>> {
        if let Some(store) = self.stores.borrow().get(id) {
            return Ok(Rc::clone(store));
        }

        let path = if id == INSTALLED_REPOSITORY_ID {
            self.settings.installed.as_deref()
        } else {
            self.settings.repository(id).map(|r| r.path.as_path())
        };
        let path = path.ok_or_else(|| Error::StoreUnavailable {
            repository: id.to_string(),
            reason: "not configured".to_string(),
        })?;

        let store: Rc<dyn RepositoryStore> = Rc::new(open_store(id, path)?);
        self.stores
            .borrow_mut()
            .insert(id.to_string(), Rc::clone(&store));
        Ok(store)
    }

    pub fn installed_store(&self) -> Result<Rc<dyn RepositoryStore>> {
        self.store(INSTALLED_REPOSITORY_ID)
    }

    /// Close every open store
    pub fn close_stores(&self) {
        let count = self.stores.borrow().len();
        self.stores.borrow_mut().clear();
        debug!("Closed {} repository store(s)", count);
    }

    /// Swap in new settings
    ///
    /// Open stores are closed. The cache is reopened when its location or
    /// sizing changed.
    pub fn reload_settings(&mut self, settings: Settings) -> Result<()> {
        settings.validate()?;
        self.close_stores();

        let cache_changed = settings.cache_dir != self.settings.cache_dir
            || settings.live_cache_capacity != self.settings.live_cache_capacity
            || settings.write_buffer_capacity != self.settings.write_buffer_capacity;
        if cache_changed {
            self.cache.sync(true);
            self.cache = Self::open_cache(&settings)?;
        }

        self.masks = PackageMasks::from_settings(&settings)?;
        self.policy = policy_for(settings.selection);
        self.settings = settings;
        info!("Settings reloaded");
        Ok(())
    }

    /// Flush pending cache writes and close stores
    pub fn shutdown(&self) {
        self.cache.sync(true);
        self.close_stores();
    }
}

fn open_store(id: &str, path: &Path) -> Result<SqliteRepository> {
    SqliteRepository::open(id, &path.to_string_lossy()).map_err(|e| Error::StoreUnavailable {
        repository: id.to_string(),
        reason: e.to_string(),
    })
}
