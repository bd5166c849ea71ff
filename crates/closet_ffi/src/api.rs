//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose photo and tag use-cases to Dart via FRB.
//! - Convert catalog errors into response envelopes.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Every DB-backed call opens its own connection and runs under one
//!   process-wide gate, so catalog writes stay serialized.
//! - Tag strings are passed through unchanged; normalization happens in core.

use closet_core::db::open_db;
use closet_core::{
    core_version as core_version_inner, filter_by_tag_name, init_logging as init_logging_inner,
    normalize_tag, ping as ping_inner, CatalogConfig, CatalogError, CatalogResult,
    CatalogService, ImageWithTags, PhotoStore, SqliteCatalogRepository, Tag,
    TagWithImages,
};
use log::error;
use std::sync::{Mutex, OnceLock};

static CATALOG_CONFIG: OnceLock<CatalogConfig> = OnceLock::new();
static CATALOG_GATE: Mutex<()> = Mutex::new(());

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts with different level or directory return error.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// One stored photo as seen by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoItem {
    pub image_id: i64,
    /// Absolute path of the JPEG on device storage.
    pub file_path: String,
    /// Tag names, ascending.
    pub tags: Vec<String>,
    /// Tags joined with `", "` for an edit field.
    pub tag_string: String,
}

/// One in-use tag with the photos carrying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagItem {
    pub tag_id: i64,
    pub name: String,
    /// Newest first; empty for `tags_all`.
    pub image_ids: Vec<i64>,
}

/// Response envelope for single-photo calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// The photo, when the call produced or found one.
    pub photo: Option<PhotoItem>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl PhotoResponse {
    fn success(message: impl Into<String>, photo: Option<PhotoItem>) -> Self {
        Self {
            ok: true,
            photo,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            photo: None,
            message: message.into(),
        }
    }
}

/// Response envelope for photo list calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoListResponse {
    pub ok: bool,
    pub items: Vec<PhotoItem>,
    pub message: String,
}

/// Response envelope for tag list calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagListResponse {
    pub ok: bool,
    pub items: Vec<TagItem>,
    pub message: String,
}

/// Creates a photo from encoded image bytes and a comma-separated tag string.
///
/// # FFI contract
/// - Sync call, DB-backed and file-writing execution.
/// - Never panics.
/// - Returns the stored photo (with normalized tags) on success.
#[flutter_rust_bridge::frb(sync)]
pub fn photo_create(bytes: Vec<u8>, tags: String) -> PhotoResponse {
    match with_catalog_service(|service| service.create_image(&bytes, tags.as_str())) {
        Ok(created) => PhotoResponse::success("Photo saved.", Some(to_photo_item(&created))),
        Err(err) => PhotoResponse::failure(format!("photo_create failed: {err}")),
    }
}

/// Replaces every tag of one photo with the tags in `tags`.
///
/// # FFI contract
/// - Never panics.
/// - Unknown `image_id` yields `ok=false`.
#[flutter_rust_bridge::frb(sync)]
pub fn photo_update_tags(image_id: i64, tags: String) -> PhotoResponse {
    match with_catalog_service(|service| service.sync_tags(image_id, tags.as_str())) {
        Ok(updated) => PhotoResponse::success("Tags updated.", Some(to_photo_item(&updated))),
        Err(err) => PhotoResponse::failure(format!("photo_update_tags failed: {err}")),
    }
}

/// Deletes one photo row and its JPEG file.
///
/// # FFI contract
/// - Never panics.
/// - Unknown `image_id` yields `ok=false`; tags stay in the vocabulary.
#[flutter_rust_bridge::frb(sync)]
pub fn photo_delete(image_id: i64) -> PhotoResponse {
    match with_catalog_service(|service| service.delete_image_by_id(image_id)) {
        Ok(_) => PhotoResponse::success("Photo deleted.", None),
        Err(err) => PhotoResponse::failure(format!("photo_delete failed: {err}")),
    }
}

/// Loads one photo with its tags.
///
/// # FFI contract
/// - Missing photo is not an error: `ok=true`, `photo=None`.
#[flutter_rust_bridge::frb(sync)]
pub fn photo_get(image_id: i64) -> PhotoResponse {
    match with_catalog_service(|service| service.get_image(image_id)) {
        Ok(Some(found)) => PhotoResponse::success("Photo found.", Some(to_photo_item(&found))),
        Ok(None) => PhotoResponse::success("Photo not found.", None),
        Err(err) => PhotoResponse::failure(format!("photo_get failed: {err}")),
    }
}

/// Lists photos newest first, optionally narrowed to one tag name.
///
/// # FFI contract
/// - `tag=None` or a blank tag lists everything.
/// - A tag name that does not exist yields an empty list, not an error.
#[flutter_rust_bridge::frb(sync)]
pub fn photos_list(tag: Option<String>) -> PhotoListResponse {
    let tag = tag.as_deref().and_then(normalize_tag);
    match with_catalog_service(|service| service.list_images()) {
        Ok(images) => {
            let items = filter_by_tag_name(&images, tag.as_deref())
                .into_iter()
                .map(to_photo_item)
                .collect::<Vec<_>>();
            PhotoListResponse {
                ok: true,
                message: list_message(items.len(), "photo"),
                items,
            }
        }
        Err(err) => PhotoListResponse {
            ok: false,
            items: Vec::new(),
            message: format!("photos_list failed: {err}"),
        },
    }
}

/// Lists tags attached to at least one photo, name ascending.
#[flutter_rust_bridge::frb(sync)]
pub fn tags_in_use() -> TagListResponse {
    tag_list_response(
        "tags_in_use",
        with_catalog_service(|service| service.list_tags_in_use())
            .map(|tags| tags.iter().map(to_tag_item).collect()),
    )
}

/// Lists the whole tag vocabulary, including tags no photo carries anymore.
#[flutter_rust_bridge::frb(sync)]
pub fn tags_all() -> TagListResponse {
    tag_list_response(
        "tags_all",
        with_catalog_service(|service| service.list_tags())
            .map(|tags| tags.into_iter().map(to_bare_tag_item).collect()),
    )
}

fn tag_list_response(call: &str, result: Result<Vec<TagItem>, String>) -> TagListResponse {
    match result {
        Ok(items) => TagListResponse {
            ok: true,
            message: list_message(items.len(), "tag"),
            items,
        },
        Err(err) => TagListResponse {
            ok: false,
            items: Vec::new(),
            message: format!("{call} failed: {err}"),
        },
    }
}

fn list_message(count: usize, noun: &str) -> String {
    if count == 0 {
        "No results.".to_string()
    } else {
        format!("Found {count} {noun}(s).")
    }
}

fn resolve_catalog_config() -> &'static CatalogConfig {
    CATALOG_CONFIG.get_or_init(CatalogConfig::from_env)
}

fn with_catalog_service<T>(
    f: impl FnOnce(&mut CatalogService<SqliteCatalogRepository<'_>>) -> CatalogResult<T>,
) -> Result<T, String> {
    let _gate = CATALOG_GATE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let config = resolve_catalog_config();
    config
        .ensure_dirs()
        .map_err(|err| format!("catalog directory setup failed: {err}"))?;
    let mut conn = open_db(config.db_path()).map_err(|err| {
        error!("event=ffi_db_open module=ffi status=error error={err}");
        format!("catalog DB open failed: {err}")
    })?;
    let repo = SqliteCatalogRepository::try_new(&mut conn)
        .map_err(|err| format!("catalog repo init failed: {err}"))?;
    let store = PhotoStore::open(config.photos_dir())
        .map_err(|err| format!("photo store init failed: {err}"))?;
    let mut service = CatalogService::new(repo, store);
    f(&mut service).map_err(|err: CatalogError| err.to_string())
}

fn to_photo_item(image: &ImageWithTags) -> PhotoItem {
    PhotoItem {
        image_id: image.image_id(),
        file_path: image.image.file_path.clone(),
        tags: image.tag_names().into_iter().map(str::to_owned).collect(),
        tag_string: image.tag_string(),
    }
}

fn to_tag_item(entry: &TagWithImages) -> TagItem {
    TagItem {
        tag_id: entry.tag.tag_id,
        name: entry.tag.name.clone(),
        image_ids: entry.images.iter().map(|image| image.image_id).collect(),
    }
}

fn to_bare_tag_item(tag: Tag) -> TagItem {
    TagItem {
        tag_id: tag.tag_id,
        name: tag.name,
        image_ids: Vec::new(),
    }
}
