//! Photo catalog use-case service.
//!
//! # Responsibility
//! - Create, retag and delete photos, keeping rows and JPEG files in step.
//! - Serve point lookups and list snapshots.
//! - Publish a change after every committed write and refresh live queries.
//!
//! # Invariants
//! - Tag input is never rejected; it normalizes to zero or more names.
//! - Tag sync is a full replace; the tag vocabulary only grows unless
//!   `delete_tag`/`prune_orphan_tags` are called explicitly.
//! - Create: the file is written first; if the row/tag transaction fails the
//!   file is removed again.
//! - Delete: rows go first, the file second, so a crash leaves at worst an
//!   unreferenced file (see `sweep_orphan_files`).

use crate::events::{CatalogChange, CatalogTable, ChangeBus, Publisher, Subscription};
use crate::model::image::{Image, ImageId, ImageWithTags, TagWithImages};
use crate::model::tag::{normalize_tag, parse_tag_string, Tag, TagId};
use crate::repo::{CatalogRepository, RepoError};
use crate::storage::{path_to_string, PhotoStore, StorageError};
use image::DynamicImage;
use log::{error, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::ffi::{OsStr, OsString};
use std::fmt::{Display, Formatter};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

const ALL_TABLES: &[CatalogTable] = &[
    CatalogTable::Images,
    CatalogTable::Tags,
    CatalogTable::ImageTags,
];
const TAG_TABLES: &[CatalogTable] = &[CatalogTable::Tags, CatalogTable::ImageTags];

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Service error for catalog use-cases.
#[derive(Debug)]
pub enum CatalogError {
    /// Target image does not exist.
    ImageNotFound(ImageId),
    /// Target tag does not exist.
    TagNotFound(TagId),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Photo file failure.
    Storage(StorageError),
    /// Write succeeded but the read-back disagrees.
    InconsistentState(&'static str),
    /// Stored photo paths lie outside the current photo directory, so file
    /// ownership cannot be decided.
    ForeignPhotoPaths { count: usize },
    /// The background worker has shut down.
    WorkerStopped,
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ImageNotFound(id) => write!(f, "image not found: {id}"),
            Self::TagNotFound(id) => write!(f, "tag not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent catalog state: {details}"),
            Self::ForeignPhotoPaths { count } => write!(
                f,
                "{count} stored photo path(s) lie outside the photo directory"
            ),
            Self::WorkerStopped => write!(f, "catalog worker is not running"),
        }
    }
}

impl Error for CatalogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CatalogError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(image_id) => Self::ImageNotFound(image_id),
            other => Self::Repo(other),
        }
    }
}

impl From<StorageError> for CatalogError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

/// One picker entry for batch import.
pub struct ImportItem<R: Read> {
    pub reader: R,
    /// Raw comma-separated tags for this photo.
    pub raw_tags: String,
}

/// Outcome of a batch import; failures do not abort the batch.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Created image ids, in input order.
    pub created: Vec<ImageId>,
    /// `(input index, error)` for every item that failed.
    pub failed: Vec<(usize, CatalogError)>,
}

/// Catalog service facade over a repository and the photo directory.
pub struct CatalogService<R: CatalogRepository> {
    repo: R,
    store: PhotoStore,
    changes: ChangeBus,
    image_watchers: Publisher<Vec<ImageWithTags>>,
    tag_watchers: Publisher<Vec<TagWithImages>>,
}

impl<R: CatalogRepository> CatalogService<R> {
    pub fn new(repo: R, store: PhotoStore) -> Self {
        Self {
            repo,
            store,
            changes: ChangeBus::new(),
            image_watchers: Publisher::new(),
            tag_watchers: Publisher::new(),
        }
    }

    /// Stores raw image bytes as a new photo tagged with `raw_tags`.
    ///
    /// The bytes may be any format the decoder understands; they are
    /// re-encoded as JPEG.
    pub fn create_image(&mut self, bytes: &[u8], raw_tags: &str) -> CatalogResult<ImageWithTags> {
        let started_at = Instant::now();
        let path = self.store.write_bytes(bytes).map_err(|err| {
            error!(
                "event=image_create module=service status=error error_code=photo_write_failed error={}",
                err
            );
            err
        })?;
        self.register_photo(path, raw_tags, started_at)
    }

    /// Stores a decoded camera capture as a new photo tagged with `raw_tags`.
    pub fn create_image_from_bitmap(
        &mut self,
        bitmap: &DynamicImage,
        raw_tags: &str,
    ) -> CatalogResult<ImageWithTags> {
        let started_at = Instant::now();
        let path = self.store.write_bitmap(bitmap)?;
        self.register_photo(path, raw_tags, started_at)
    }

    /// Imports picker streams one by one, each with its own tags.
    pub fn import_images<I, Rd>(&mut self, items: I) -> ImportReport
    where
        I: IntoIterator<Item = ImportItem<Rd>>,
        Rd: Read,
    {
        let mut report = ImportReport::default();
        for (index, mut item) in items.into_iter().enumerate() {
            let mut bytes = Vec::new();
            let outcome = match item.reader.read_to_end(&mut bytes) {
                Ok(_) => self.create_image(&bytes, item.raw_tags.as_str()),
                Err(err) => Err(CatalogError::Storage(StorageError::Io(err))),
            };
            match outcome {
                Ok(created) => report.created.push(created.image_id()),
                Err(err) => {
                    warn!(
                        "event=image_import module=service status=item_failed index={} error={}",
                        index, err
                    );
                    report.failed.push((index, err));
                }
            }
        }

        info!(
            "event=image_import module=service status=ok created={} failed={}",
            report.created.len(),
            report.failed.len()
        );
        report
    }

    /// Replaces the full tag set of one image with the tags in `raw_tags`.
    pub fn sync_tags(&mut self, image_id: ImageId, raw_tags: &str) -> CatalogResult<ImageWithTags> {
        let tags = parse_tag_string(raw_tags);
        self.repo.replace_image_tags(image_id, &tags)?;
        info!(
            "event=tags_sync module=service status=ok image_id={} tag_count={}",
            image_id,
            tags.len()
        );
        self.publish(TAG_TABLES);

        self.repo
            .get_image(image_id)?
            .ok_or(CatalogError::InconsistentState(
                "image missing after tag replacement",
            ))
    }

    /// Deletes the image rows, then the backing file.
    ///
    /// Deleting an image whose row is already gone still removes the file.
    pub fn delete_image(&mut self, image: &Image) -> CatalogResult<()> {
        let existed = self.repo.delete_image(image.image_id)?;
        if existed {
            self.publish(&[CatalogTable::Images, CatalogTable::ImageTags]);
        }

        let file_removed = self.store.remove(image.path())?;
        info!(
            "event=image_delete module=service status=ok image_id={} row_existed={} file_removed={}",
            image.image_id, existed, file_removed
        );
        Ok(())
    }

    /// Resolves `image_id` and deletes it. Returns the deleted record.
    pub fn delete_image_by_id(&mut self, image_id: ImageId) -> CatalogResult<Image> {
        let target = self
            .repo
            .get_image(image_id)?
            .ok_or(CatalogError::ImageNotFound(image_id))?;
        self.delete_image(&target.image)?;
        Ok(target.image)
    }

    pub fn get_image(&self, image_id: ImageId) -> CatalogResult<Option<ImageWithTags>> {
        Ok(self.repo.get_image(image_id)?)
    }

    /// Every image with its tags, newest first.
    pub fn list_images(&self) -> CatalogResult<Vec<ImageWithTags>> {
        Ok(self.repo.list_images()?)
    }

    /// Tags linked to at least one image, name ascending.
    pub fn list_tags_in_use(&self) -> CatalogResult<Vec<TagWithImages>> {
        Ok(self.repo.list_tags_in_use()?)
    }

    /// Whole tag vocabulary, orphans included.
    pub fn list_tags(&self) -> CatalogResult<Vec<Tag>> {
        Ok(self.repo.list_tags()?)
    }

    /// Finds a tag by name; the name is normalized before lookup.
    pub fn find_tag_by_name(&self, name: &str) -> CatalogResult<Option<Tag>> {
        match normalize_tag(name) {
            Some(normalized) => Ok(self.repo.find_tag_by_name(normalized.as_str())?),
            None => Ok(None),
        }
    }

    /// Live image list: current snapshot now, a fresh one after every write.
    pub fn watch_images(&mut self) -> CatalogResult<Subscription<Vec<ImageWithTags>>> {
        let snapshot = self.repo.list_images()?;
        Ok(self.image_watchers.subscribe(Some(snapshot)))
    }

    /// Live in-use tag list: current snapshot now, a fresh one after every write.
    pub fn watch_tags_in_use(&mut self) -> CatalogResult<Subscription<Vec<TagWithImages>>> {
        let snapshot = self.repo.list_tags_in_use()?;
        Ok(self.tag_watchers.subscribe(Some(snapshot)))
    }

    /// Raw table-change notifications, one per committed write.
    pub fn watch_changes(&mut self) -> Subscription<CatalogChange> {
        self.changes.subscribe(None)
    }

    /// Deletes one tag and its links.
    pub fn delete_tag(&mut self, tag_id: TagId) -> CatalogResult<()> {
        if !self.repo.delete_tag(tag_id)? {
            return Err(CatalogError::TagNotFound(tag_id));
        }
        info!("event=tag_delete module=service status=ok tag_id={tag_id}");
        self.publish(TAG_TABLES);
        Ok(())
    }

    /// Deletes tags no image references. Returns how many were removed.
    pub fn prune_orphan_tags(&mut self) -> CatalogResult<usize> {
        let removed = self.repo.prune_orphan_tags()?;
        info!("event=tag_prune module=service status=ok removed={removed}");
        if removed > 0 {
            self.publish(&[CatalogTable::Tags]);
        }
        Ok(removed)
    }

    /// Removes managed photo files that no image row references.
    ///
    /// Files are matched to rows by file name. If any row points outside the
    /// photo directory nothing is removed and `ForeignPhotoPaths` is returned.
    pub fn sweep_orphan_files(&mut self) -> CatalogResult<Vec<PathBuf>> {
        let stored_paths = self.repo.list_file_paths()?;
        let foreign = stored_paths
            .iter()
            .filter(|stored| Path::new(stored.as_str()).parent() != Some(self.store.dir()))
            .count();
        if foreign > 0 {
            warn!(
                "event=file_sweep module=service status=refused error_code=foreign_paths count={}",
                foreign
            );
            return Err(CatalogError::ForeignPhotoPaths { count: foreign });
        }

        let referenced: HashSet<OsString> = stored_paths
            .iter()
            .filter_map(|stored| Path::new(stored.as_str()).file_name())
            .map(OsStr::to_os_string)
            .collect();

        let mut removed = Vec::new();
        for path in self.store.managed_files()? {
            let is_referenced = path
                .file_name()
                .map_or(false, |name| referenced.contains(name));
            if is_referenced {
                continue;
            }
            if self.store.remove(&path)? {
                removed.push(path);
            }
        }

        info!(
            "event=file_sweep module=service status=ok removed={}",
            removed.len()
        );
        Ok(removed)
    }

    /// Decodes the photo of `image`; `None` when the file is missing.
    pub fn load_bitmap(&self, image: &Image) -> Option<DynamicImage> {
        self.store.load_bitmap(image.path())
    }

    fn register_photo(
        &mut self,
        path: PathBuf,
        raw_tags: &str,
        started_at: Instant,
    ) -> CatalogResult<ImageWithTags> {
        let tags = parse_tag_string(raw_tags);
        let inserted = path_to_string(&path)
            .map_err(CatalogError::from)
            .and_then(|file_path| {
                self.repo
                    .insert_image_with_tags(file_path.as_str(), &tags)
                    .map_err(CatalogError::from)
            });

        let image_id = match inserted {
            Ok(image_id) => image_id,
            Err(err) => {
                self.discard_file(&path);
                error!(
                    "event=image_create module=service status=error error_code=row_insert_failed error={}",
                    err
                );
                return Err(err);
            }
        };

        info!(
            "event=image_create module=service status=ok image_id={} tag_count={} duration_ms={}",
            image_id,
            tags.len(),
            started_at.elapsed().as_millis()
        );
        self.publish(ALL_TABLES);

        self.repo
            .get_image(image_id)?
            .ok_or(CatalogError::InconsistentState(
                "created image not found in read-back",
            ))
    }

    fn discard_file(&self, path: &Path) {
        if let Err(err) = self.store.remove(path) {
            warn!(
                "event=image_create module=service status=cleanup_failed error={}",
                err
            );
        }
    }

    fn publish(&mut self, tables: &[CatalogTable]) {
        self.changes.publish(&CatalogChange::new(tables));

        if self.image_watchers.has_subscribers() {
            match self.repo.list_images() {
                Ok(snapshot) => {
                    self.image_watchers.publish(&snapshot);
                }
                Err(err) => error!(
                    "event=live_query_refresh module=service status=error query=images error={}",
                    err
                ),
            }
        }

        if self.tag_watchers.has_subscribers() {
            match self.repo.list_tags_in_use() {
                Ok(snapshot) => {
                    self.tag_watchers.publish(&snapshot);
                }
                Err(err) => error!(
                    "event=live_query_refresh module=service status=error query=tags_in_use error={}",
                    err
                ),
            }
        }
    }
}
