use closet_core::db::open_db_in_memory;
use closet_core::{
    filter_by_tag, CatalogError, CatalogService, PhotoStore, SqliteCatalogRepository, Tag,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

fn sample_png() -> Vec<u8> {
    let bitmap = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([180, 40, 40])));
    let mut bytes = Cursor::new(Vec::new());
    bitmap.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

fn names(tags: &[Tag]) -> Vec<&str> {
    tags.iter().map(|tag| tag.name.as_str()).collect()
}

#[test]
fn sync_tags_replaces_full_set() {
    let mut conn = open_db_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let repo = SqliteCatalogRepository::try_new(&mut conn).unwrap();
    let mut service = CatalogService::new(repo, PhotoStore::open(dir.path()).unwrap());

    let created = service.create_image(&sample_png(), "Red, Dress").unwrap();
    assert_eq!(names(&created.tags), vec!["dress", "red"]);

    let synced = service.sync_tags(created.image_id(), "blue").unwrap();
    assert_eq!(names(&synced.tags), vec!["blue"]);

    let reloaded = service.get_image(created.image_id()).unwrap().unwrap();
    assert_eq!(names(&reloaded.tags), vec!["blue"]);
}

#[test]
fn sync_tags_is_idempotent_including_tag_identities() {
    let mut conn = open_db_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let repo = SqliteCatalogRepository::try_new(&mut conn).unwrap();
    let mut service = CatalogService::new(repo, PhotoStore::open(dir.path()).unwrap());
    let created = service.create_image(&sample_png(), "").unwrap();

    let first = service
        .sync_tags(created.image_id(), "Red, summer,  Dress")
        .unwrap();
    let vocabulary_after_first = service.list_tags().unwrap();
    let second = service
        .sync_tags(created.image_id(), "Red, summer,  Dress")
        .unwrap();

    assert_eq!(first.tags, second.tags);
    assert_eq!(service.list_tags().unwrap(), vocabulary_after_first);
    assert_eq!(names(&second.tags), vec!["dress", "red", "summer"]);
}

#[test]
fn duplicate_spellings_collapse_to_one_tag_row() {
    let mut conn = open_db_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let repo = SqliteCatalogRepository::try_new(&mut conn).unwrap();
    let mut service = CatalogService::new(repo, PhotoStore::open(dir.path()).unwrap());

    let created = service.create_image(&sample_png(), "Red, red, RED").unwrap();
    assert_eq!(names(&created.tags), vec!["red"]);
    assert_eq!(service.list_tags().unwrap().len(), 1);
}

#[test]
fn blank_and_empty_pieces_never_create_tags() {
    let mut conn = open_db_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let repo = SqliteCatalogRepository::try_new(&mut conn).unwrap();
    let mut service = CatalogService::new(repo, PhotoStore::open(dir.path()).unwrap());

    let created = service.create_image(&sample_png(), " , ,, \t").unwrap();
    assert!(created.tags.is_empty());
    assert!(service.list_tags().unwrap().is_empty());
}

#[test]
fn existing_tags_are_reused_across_images() {
    let mut conn = open_db_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let repo = SqliteCatalogRepository::try_new(&mut conn).unwrap();
    let mut service = CatalogService::new(repo, PhotoStore::open(dir.path()).unwrap());

    let first = service.create_image(&sample_png(), "coat").unwrap();
    let second = service.create_image(&sample_png(), "Coat , winter").unwrap();

    let coat = service.find_tag_by_name(" COAT ").unwrap().unwrap();
    assert!(first.has_tag(coat.tag_id));
    assert!(second.has_tag(coat.tag_id));
    assert_eq!(service.list_tags().unwrap().len(), 2);
}

#[test]
fn sync_tags_never_deletes_tag_rows() {
    let mut conn = open_db_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let repo = SqliteCatalogRepository::try_new(&mut conn).unwrap();
    let mut service = CatalogService::new(repo, PhotoStore::open(dir.path()).unwrap());

    let created = service.create_image(&sample_png(), "red, dress").unwrap();
    service.sync_tags(created.image_id(), "").unwrap();

    assert_eq!(names(&service.list_tags().unwrap()), vec!["dress", "red"]);
    assert!(service.list_tags_in_use().unwrap().is_empty());
}

#[test]
fn sync_tags_on_missing_image_reports_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let repo = SqliteCatalogRepository::try_new(&mut conn).unwrap();
    let mut service = CatalogService::new(repo, PhotoStore::open(dir.path()).unwrap());

    let err = service.sync_tags(404, "red").unwrap_err();
    assert!(matches!(err, CatalogError::ImageNotFound(404)));
    assert!(service.list_tags().unwrap().is_empty());
}

#[test]
fn find_tag_by_name_handles_blank_and_unknown_names() {
    let mut conn = open_db_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let repo = SqliteCatalogRepository::try_new(&mut conn).unwrap();
    let service = CatalogService::new(repo, PhotoStore::open(dir.path()).unwrap());

    assert!(service.find_tag_by_name("   ").unwrap().is_none());
    assert!(service.find_tag_by_name("coat").unwrap().is_none());
}

#[test]
fn filtering_full_list_by_tag_selects_matching_images() {
    let mut conn = open_db_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let repo = SqliteCatalogRepository::try_new(&mut conn).unwrap();
    let mut service = CatalogService::new(repo, PhotoStore::open(dir.path()).unwrap());

    let plain = service.create_image(&sample_png(), "coat").unwrap();
    let winter = service.create_image(&sample_png(), "coat, winter").unwrap();
    let all = service.list_images().unwrap();
    let coat = service.find_tag_by_name("coat").unwrap().unwrap();
    let winter_tag = service.find_tag_by_name("winter").unwrap().unwrap();

    let by_coat: Vec<_> = filter_by_tag(&all, Some(coat.tag_id))
        .into_iter()
        .map(|item| item.image_id())
        .collect();
    assert_eq!(by_coat, vec![winter.image_id(), plain.image_id()]);

    let by_winter: Vec<_> = filter_by_tag(&all, Some(winter_tag.tag_id))
        .into_iter()
        .map(|item| item.image_id())
        .collect();
    assert_eq!(by_winter, vec![winter.image_id()]);
}
