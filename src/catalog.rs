use std::sync::Arc;

use crate::backend::{BackendError, FileStorage, StoredFile};
use crate::cache::{CacheStats, TtlCache};
use crate::models::{Disease, MediaDescriptor};

/// Resolves disease categories to education media, caching each listing.
pub struct CatalogService {
    storage: Arc<dyn FileStorage>,
    cache: TtlCache<Vec<MediaDescriptor>>,
    root_folder_id: String,
}

pub fn preview_url(file_id: &str) -> String {
    format!("https://drive.google.com/file/d/{file_id}/preview")
}

fn cache_key(disease: Disease) -> String {
    format!("videos_{}", disease.id())
}

fn describe(file: StoredFile) -> Option<MediaDescriptor> {
    let kind = file.media_kind()?;
    Some(MediaDescriptor {
        url: preview_url(&file.id),
        size_bytes: file.size.unwrap_or(0),
        id: file.id,
        name: file.name,
        kind,
    })
}

impl CatalogService {
    pub fn new(
        storage: Arc<dyn FileStorage>,
        root_folder_id: impl Into<String>,
        cache: TtlCache<Vec<MediaDescriptor>>,
    ) -> Self {
        Self {
            storage,
            cache,
            root_folder_id: root_folder_id.into(),
        }
    }

    /// Media for `category`, in storage order. Unknown categories and
    /// missing folders give an empty list.
    pub async fn media_for_category(&self, category: &str) -> Result<Vec<MediaDescriptor>, BackendError> {
        let Some(disease) = Disease::from_id(category) else {
            tracing::warn!(category, "Invalid disease requested");
            return Ok(Vec::new());
        };

        let key = cache_key(disease);
        if let Some(cached) = self.cache.get(&key) {
            tracing::info!(category, "Cache hit");
            return Ok(cached);
        }

        let media = self.fetch(disease).await?;
        self.cache.set(key, media.clone());

        tracing::info!(category, count = media.len(), "Retrieved media");
        Ok(media)
    }

    async fn fetch(&self, disease: Disease) -> Result<Vec<MediaDescriptor>, BackendError> {
        let folder = match self
            .storage
            .find_folder(&self.root_folder_id, disease.folder_name())
            .await
        {
            Ok(Some(folder)) => folder,
            Ok(None) => return Ok(Vec::new()),
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let files = match self.storage.list_files(&folder).await {
            Ok(files) => files,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        Ok(files.into_iter().filter_map(describe).collect())
    }

    pub fn invalidate(&self, category: &str) {
        if let Some(disease) = Disease::from_id(category) {
            self.cache.delete(&cache_key(disease));
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
