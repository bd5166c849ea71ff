//! Image records and their tag projections.
//!
//! # Responsibility
//! - Define the photo row and the joined image/tag read models.
//! - Provide the pure tag filter the browse grid applies to fetched lists.
//!
//! # Invariants
//! - `image_id` is stable for the record lifetime and never reused.
//! - `file_path` is absolute and never changes after creation.
//! - Filtering never touches storage; it works on already-fetched snapshots.

use crate::model::tag::{format_tag_string, normalize_tag, Tag, TagId};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Storage-assigned image identifier.
pub type ImageId = i64;

/// One cataloged photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub image_id: ImageId,
    /// Absolute path of the backing JPEG.
    pub file_path: String,
}

impl Image {
    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        Path::new(self.file_path.as_str())
    }
}

/// Image plus its tag set, ordered by tag name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageWithTags {
    pub image: Image,
    pub tags: Vec<Tag>,
}

impl ImageWithTags {
    pub fn image_id(&self) -> ImageId {
        self.image.image_id
    }

    /// Returns whether the image is linked to `tag_id`.
    pub fn has_tag(&self, tag_id: TagId) -> bool {
        self.tags.iter().any(|tag| tag.tag_id == tag_id)
    }

    /// Returns whether the image is linked to a tag with this name.
    ///
    /// The name is normalized first, so `" Coat"` matches `coat`.
    pub fn has_tag_named(&self, name: &str) -> bool {
        match normalize_tag(name) {
            Some(normalized) => self.tags.iter().any(|tag| tag.name == normalized),
            None => false,
        }
    }

    /// Tag names as a comma-separated string for the edit field.
    pub fn tag_string(&self) -> String {
        format_tag_string(&self.tags)
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|tag| tag.name.as_str()).collect()
    }
}

/// Tag plus every image currently linked to it, newest image first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagWithImages {
    pub tag: Tag,
    pub images: Vec<Image>,
}

/// Selects images linked to `tag_id`; `None` keeps every image.
pub fn filter_by_tag(images: &[ImageWithTags], tag_id: Option<TagId>) -> Vec<&ImageWithTags> {
    match tag_id {
        Some(tag_id) => images.iter().filter(|item| item.has_tag(tag_id)).collect(),
        None => images.iter().collect(),
    }
}

/// Selects images linked to a tag with this name; `None` keeps every image.
///
/// A name that normalizes to nothing matches no image.
pub fn filter_by_tag_name<'a>(
    images: &'a [ImageWithTags],
    name: Option<&str>,
) -> Vec<&'a ImageWithTags> {
    match name {
        Some(name) => images
            .iter()
            .filter(|item| item.has_tag_named(name))
            .collect(),
        None => images.iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::{filter_by_tag, filter_by_tag_name, Image, ImageWithTags};
    use crate::model::tag::Tag;

    fn tag(tag_id: i64, name: &str) -> Tag {
        Tag {
            tag_id,
            name: name.to_string(),
        }
    }

    fn item(image_id: i64, tags: Vec<Tag>) -> ImageWithTags {
        ImageWithTags {
            image: Image {
                image_id,
                file_path: format!("/photos/IMG_{image_id}.jpg"),
            },
            tags,
        }
    }

    #[test]
    fn filter_by_tag_selects_every_image_carrying_the_tag() {
        let coat = tag(1, "coat");
        let winter = tag(2, "winter");
        let images = vec![
            item(2, vec![coat.clone(), winter.clone()]),
            item(1, vec![coat.clone()]),
        ];

        let by_coat = filter_by_tag(&images, Some(coat.tag_id));
        assert_eq!(by_coat.len(), 2);

        let by_winter = filter_by_tag(&images, Some(winter.tag_id));
        assert_eq!(by_winter.len(), 1);
        assert_eq!(by_winter[0].image_id(), 2);

        assert_eq!(filter_by_tag(&images, None).len(), 2);
    }

    #[test]
    fn filter_by_tag_name_normalizes_the_query() {
        let images = vec![item(1, vec![tag(1, "coat")]), item(2, vec![])];
        assert_eq!(filter_by_tag_name(&images, Some("  COAT ")).len(), 1);
        assert!(filter_by_tag_name(&images, Some("   ")).is_empty());
        assert_eq!(filter_by_tag_name(&images, None).len(), 2);
    }

    #[test]
    fn tag_string_round_trips_through_edit_field() {
        let image = item(1, vec![tag(1, "coat"), tag(2, "winter")]);
        assert_eq!(image.tag_string(), "coat, winter");
        assert_eq!(image.tag_names(), vec!["coat", "winter"]);
    }
}
