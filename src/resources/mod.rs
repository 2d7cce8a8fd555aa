//! Loading of everything a room is made of.
//!
//! The [`LoadOrchestrator`] issues one load per manifest entry against the
//! engine, all of them in parallel, and yields each [`LoadTask`] as soon as it
//! settles. `fetch` and `gltf` hold the file access and glTF decoding used by
//! the wgpu backend.

use std::collections::HashMap;

use futures::{
    future::{Either, select},
    stream::{FuturesUnordered, LocalBoxStream, StreamExt},
};
use instant::Duration;

use crate::{
    engine::{Engine, LoadedResource, Texture},
    events::ProgressSink,
    manifest::{AssetEntry, AssetManifest, ResourceKind},
};

pub mod fetch;
pub(crate) mod gltf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadStatus {
    Pending,
    Loading,
    Loaded,
    Failed,
}

/// Bookkeeping for one manifest entry while it loads.
#[derive(Debug)]
pub struct LoadTask {
    pub name: String,
    pub kind: ResourceKind,
    pub status: LoadStatus,
    pub handle: Option<LoadedResource>,
    /// 1 for the primary path, 2 once the fallback was tried.
    pub attempts: u32,
    pub mandatory: bool,
    pub error: Option<anyhow::Error>,
}

impl LoadTask {
    fn pending(entry: &AssetEntry) -> Self {
        Self {
            name: entry.name.clone(),
            kind: entry.kind,
            status: LoadStatus::Pending,
            handle: None,
            attempts: 0,
            mandatory: entry.mandatory,
            error: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.status == LoadStatus::Loaded
    }
}

pub struct LoadOrchestrator<'a, E: Engine> {
    engine: &'a E,
    media_deadline: Duration,
}

impl<'a, E: Engine> LoadOrchestrator<'a, E> {
    pub fn new(engine: &'a E, media_deadline: Duration) -> Self {
        Self {
            engine,
            media_deadline,
        }
    }

    /**
     * Loads every manifest entry in parallel and yields the tasks in the order
     * they settle.
     *
     * After each settled task `progress.on_progress` is called with the number
     * of settled tasks so far. A failed mandatory task is reported through
     * `progress.on_error`; optional failures are only logged.
     */
    pub fn stream<'s>(
        &'s self,
        manifest: &'s AssetManifest,
        progress: &'s dyn ProgressSink,
    ) -> LocalBoxStream<'s, LoadTask> {
        let total = manifest.entries().len();
        let pending: FuturesUnordered<_> = manifest
            .entries()
            .iter()
            .map(|entry| self.load_entry(entry))
            .collect();

        let mut settled = 0;
        pending
            .map(move |task| {
                settled += 1;
                progress.on_progress(&task.name, settled, total);
                if let Some(error) = &task.error {
                    if task.mandatory {
                        log::error!("Mandatory asset {} failed: {:#}", task.name, error);
                        progress.on_error(&task.name, &format!("{error:#}"));
                    } else {
                        log::warn!(
                            "Optional asset {} failed after {} attempt(s), its feature is skipped: {:#}",
                            task.name,
                            task.attempts,
                            error
                        );
                    }
                }
                task
            })
            .boxed_local()
    }

    /// Loads the whole manifest. Failed entries map to `None`.
    pub async fn load_all(
        &self,
        manifest: &AssetManifest,
        progress: &dyn ProgressSink,
    ) -> HashMap<String, Option<LoadedResource>> {
        self.stream(manifest, progress)
            .map(|task| (task.name, task.handle))
            .collect()
            .await
    }

    async fn load_entry(&self, entry: &AssetEntry) -> LoadTask {
        let mut task = LoadTask::pending(entry);
        task.status = LoadStatus::Loading;
        task.attempts = 1;

        let result = match (
            self.load_path(entry.kind, &entry.path).await,
            entry.fallback.as_deref(),
        ) {
            (Err(e), Some(fallback)) => {
                log::warn!(
                    "{} could not be loaded from {} ({:#}), trying {}",
                    entry.name,
                    entry.path,
                    e,
                    fallback
                );
                task.attempts += 1;
                self.load_path(entry.kind, fallback).await
            }
            (result, _) => result,
        };

        match result {
            Ok(resource) => {
                log::debug!("Loaded {} ({:?})", entry.name, entry.kind);
                task.status = LoadStatus::Loaded;
                task.handle = Some(resource);
            }
            Err(e) => {
                task.status = LoadStatus::Failed;
                task.error = Some(e);
            }
        }
        task
    }

    async fn load_path(&self, kind: ResourceKind, path: &str) -> anyhow::Result<LoadedResource> {
        let resource = self.engine.load(kind, path).await?;
        if let LoadedResource::Video(texture) = &resource {
            self.await_media(texture).await;
        }
        Ok(resource)
    }

    /// Waits until the video can present a frame or the deadline passes, whichever comes first.
    async fn await_media(&self, texture: &Texture) {
        let Some(media) = texture.media.clone() else {
            return;
        };
        match select(media.ready(), self.engine.sleep(self.media_deadline)).await {
            Either::Left(_) => log::debug!("Video {} is ready", texture.label),
            Either::Right(_) => log::debug!(
                "Video {} gave no ready signal within {:?}, using it anyway",
                texture.label,
                self.media_deadline
            ),
        }
    }
}
