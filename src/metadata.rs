//! Embedded image metadata (EXIF and friends).
//!
//! Reading and writing metadata is delegated to a [`MetadataHandler`] that
//! callers inject explicitly; there is no global registry. The thumbnail
//! service uses only [`MetadataHandler::get_orientation`], to auto-rotate
//! sources before resizing.
//!
//! [`UnsupportedMetadataHandler`] is the default: every method fails with
//! [`MetadataError::NotImplemented`], which the thumbnail service treats as
//! "no orientation known".

use crate::imaging::is_image_file;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Metadata operation not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Commonly used metadata fields. Everything is optional; handlers fill in
/// what the file carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub software: Option<String>,
    pub description: Option<String>,
    /// EXIF orientation tag, 1–8.
    pub orientation: Option<u16>,
    pub date_taken: Option<NaiveDateTime>,
    pub keywords: Vec<String>,
}

/// Source of embedded metadata.
pub trait MetadataHandler: Send + Sync {
    fn get_metadata(&self, image: &Path) -> Result<ImageMetadata, MetadataError>;

    fn copy_metadata(&self, source: &Path, destination: &Path) -> Result<(), MetadataError>;

    fn remove_metadata(&self, image: &Path) -> Result<(), MetadataError>;

    fn set_date_taken(&self, image: &Path, date: NaiveDateTime) -> Result<(), MetadataError>;

    fn get_date_taken(&self, image: &Path) -> Result<Option<NaiveDateTime>, MetadataError> {
        Ok(self.get_metadata(image)?.date_taken)
    }

    /// EXIF orientation (1–8), if the file records one.
    fn get_orientation(&self, image: &Path) -> Result<Option<u16>, MetadataError> {
        Ok(self.get_metadata(image)?.orientation)
    }

    /// Capture dates of every image file directly inside `folder`. Files
    /// without a date are left out.
    fn get_dates_taken_in_folder(
        &self,
        folder: &Path,
    ) -> Result<BTreeMap<PathBuf, NaiveDateTime>, MetadataError> {
        let mut dates = BTreeMap::new();
        for entry in std::fs::read_dir(folder)? {
            let path = entry?.path();
            if !path.is_file() || !is_image_file(&path) {
                continue;
            }
            if let Some(date) = self.get_date_taken(&path)? {
                dates.insert(path, date);
            }
        }
        Ok(dates)
    }
}

/// Handler used when no metadata backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedMetadataHandler;

impl MetadataHandler for UnsupportedMetadataHandler {
    fn get_metadata(&self, _image: &Path) -> Result<ImageMetadata, MetadataError> {
        Err(MetadataError::NotImplemented("get_metadata"))
    }

    fn copy_metadata(&self, _source: &Path, _destination: &Path) -> Result<(), MetadataError> {
        Err(MetadataError::NotImplemented("copy_metadata"))
    }

    fn remove_metadata(&self, _image: &Path) -> Result<(), MetadataError> {
        Err(MetadataError::NotImplemented("remove_metadata"))
    }

    fn set_date_taken(&self, _image: &Path, _date: NaiveDateTime) -> Result<(), MetadataError> {
        Err(MetadataError::NotImplemented("set_date_taken"))
    }

    fn get_date_taken(&self, _image: &Path) -> Result<Option<NaiveDateTime>, MetadataError> {
        Err(MetadataError::NotImplemented("get_date_taken"))
    }

    fn get_orientation(&self, _image: &Path) -> Result<Option<u16>, MetadataError> {
        Err(MetadataError::NotImplemented("get_orientation"))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::test_helpers::write_png;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Handler serving canned metadata by file name.
    #[derive(Default)]
    pub struct FixedMetadataHandler {
        pub by_name: Mutex<HashMap<String, ImageMetadata>>,
    }

    impl FixedMetadataHandler {
        pub fn with(name: &str, metadata: ImageMetadata) -> Self {
            let handler = Self::default();
            handler
                .by_name
                .lock()
                .unwrap()
                .insert(name.to_string(), metadata);
            handler
        }

        fn name(image: &Path) -> String {
            image.file_name().unwrap().to_string_lossy().to_string()
        }
    }

    impl MetadataHandler for FixedMetadataHandler {
        fn get_metadata(&self, image: &Path) -> Result<ImageMetadata, MetadataError> {
            Ok(self
                .by_name
                .lock()
                .unwrap()
                .get(&Self::name(image))
                .cloned()
                .unwrap_or_default())
        }

        fn copy_metadata(&self, source: &Path, destination: &Path) -> Result<(), MetadataError> {
            let meta = self.get_metadata(source)?;
            self.by_name
                .lock()
                .unwrap()
                .insert(Self::name(destination), meta);
            Ok(())
        }

        fn remove_metadata(&self, image: &Path) -> Result<(), MetadataError> {
            self.by_name.lock().unwrap().remove(&Self::name(image));
            Ok(())
        }

        fn set_date_taken(&self, image: &Path, date: NaiveDateTime) -> Result<(), MetadataError> {
            self.by_name
                .lock()
                .unwrap()
                .entry(Self::name(image))
                .or_default()
                .date_taken = Some(date);
            Ok(())
        }
    }

    fn date(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y:%m:%d %H:%M:%S").unwrap()
    }

    #[test]
    fn unsupported_handler_fails_everything() {
        let h = UnsupportedMetadataHandler;
        let p = Path::new("/x.jpg");
        assert!(matches!(h.get_metadata(p), Err(MetadataError::NotImplemented(_))));
        assert!(matches!(h.get_orientation(p), Err(MetadataError::NotImplemented(_))));
        assert!(matches!(h.get_date_taken(p), Err(MetadataError::NotImplemented(_))));
        assert!(h.set_date_taken(p, date("2016:10:01 14:23:25")).is_err());
        assert!(h.copy_metadata(p, p).is_err());
        assert!(h.remove_metadata(p).is_err());
    }

    #[test]
    fn provided_methods_read_from_metadata() {
        let h = FixedMetadataHandler::with(
            "a.jpg",
            ImageMetadata {
                orientation: Some(6),
                date_taken: Some(date("2016:10:01 14:23:25")),
                ..Default::default()
            },
        );
        assert_eq!(h.get_orientation(Path::new("/p/a.jpg")).unwrap(), Some(6));
        assert_eq!(
            h.get_date_taken(Path::new("/p/a.jpg")).unwrap(),
            Some(date("2016:10:01 14:23:25"))
        );
        assert_eq!(h.get_orientation(Path::new("/p/b.jpg")).unwrap(), None);
    }

    #[test]
    fn set_copy_remove_round_trip() {
        let h = FixedMetadataHandler::default();
        let a = Path::new("a.jpg");
        let b = Path::new("b.jpg");
        h.set_date_taken(a, date("2020:01:02 03:04:05")).unwrap();
        h.copy_metadata(a, b).unwrap();
        assert_eq!(h.get_date_taken(b).unwrap(), Some(date("2020:01:02 03:04:05")));
        h.remove_metadata(b).unwrap();
        assert_eq!(h.get_date_taken(b).unwrap(), None);
    }

    #[test]
    fn folder_dates_skip_non_images_and_undated_files() {
        let tmp = TempDir::new().unwrap();
        write_png(&tmp.path().join("dated.png"), 2, 2);
        write_png(&tmp.path().join("undated.png"), 2, 2);
        std::fs::write(tmp.path().join("notes.txt"), b"x").unwrap();

        let h = FixedMetadataHandler::default();
        h.set_date_taken(Path::new("dated.png"), date("2019:05:06 07:08:09"))
            .unwrap();
        h.set_date_taken(Path::new("notes.txt"), date("2019:05:06 07:08:09"))
            .unwrap();

        let dates = h.get_dates_taken_in_folder(tmp.path()).unwrap();
        assert_eq!(dates.len(), 1);
        assert_eq!(
            dates.get(&tmp.path().join("dated.png")),
            Some(&date("2019:05:06 07:08:09"))
        );
    }
}
