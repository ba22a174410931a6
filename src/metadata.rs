//! Tag and file-date propagation onto the delivered file

use filetime::FileTime;
use lofty::config::WriteOptions;
use lofty::error::{ErrorKind, LoftyError};
use lofty::file::FileType;
use lofty::prelude::*;
use lofty::probe::Probe;
use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::Path;

use crate::error::{ExtendError, MetadataCopyError};

pub trait MetadataCopier {
    /// Copy descriptive tags. Fails with `UnsupportedFormat` when either
    /// file's container or tag format is not understood.
    fn copy_tags(&self, source: &Path, destination: &Path) -> Result<(), MetadataCopyError>;
}

pub trait FileDateCopier {
    fn copy_dates(&self, source: &Path, destination: &Path) -> io::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyMetadataCopier;

impl LoftyMetadataCopier {
    fn file_type(path: &Path) -> Result<FileType, MetadataCopyError> {
        let probe = Probe::open(path)
            .map_err(|e| classify(path, e))?
            .guess_file_type()
            .map_err(|source| MetadataCopyError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        probe.file_type().ok_or_else(|| MetadataCopyError::UnsupportedFormat {
            path: path.to_path_buf(),
            reason: "unrecognized container".to_string(),
        })
    }
}

impl MetadataCopier for LoftyMetadataCopier {
    fn copy_tags(&self, source: &Path, destination: &Path) -> Result<(), MetadataCopyError> {
        let tagged = Probe::open(source)
            .map_err(|e| classify(source, e))?
            .guess_file_type()
            .map_err(|e| MetadataCopyError::Io {
                path: source.to_path_buf(),
                source: e,
            })?
            .read()
            .map_err(|e| classify(source, e))?;

        let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) else {
            debug!("'{}' has no tags to copy", source.display());
            return Ok(());
        };

        let destination_type = Self::file_type(destination)?;
        let tag_type = destination_type.primary_tag_type();
        if !destination_type.supports_tag_type(tag_type) {
            return Err(MetadataCopyError::UnsupportedFormat {
                path: destination.to_path_buf(),
                reason: format!("{tag_type:?} tags cannot be written"),
            });
        }

        let mut tag = tag.clone();
        tag.re_map(tag_type);
        debug!(
            "Writing {} tag items as {:?} to '{}'",
            tag.len(),
            tag_type,
            destination.display()
        );
        tag.save_to_path(destination, WriteOptions::default())
            .map_err(|e| classify(destination, e))
    }
}

fn classify(path: &Path, err: LoftyError) -> MetadataCopyError {
    match err.kind() {
        ErrorKind::UnknownFormat | ErrorKind::UnsupportedTag => MetadataCopyError::UnsupportedFormat {
            path: path.to_path_buf(),
            reason: err.to_string(),
        },
        _ => MetadataCopyError::Tag {
            path: path.to_path_buf(),
            reason: err.to_string(),
        },
    }
}

/// Copies access and modification times; creation time too on Windows.
#[derive(Debug, Default, Clone, Copy)]
pub struct FiletimeDateCopier;

impl FileDateCopier for FiletimeDateCopier {
    fn copy_dates(&self, source: &Path, destination: &Path) -> io::Result<()> {
        let meta = fs::metadata(source)?;
        let atime = FileTime::from_last_access_time(&meta);
        let mtime = FileTime::from_last_modification_time(&meta);
        filetime::set_file_times(destination, atime, mtime)?;

        #[cfg(windows)]
        copy_creation_time(&meta, destination)?;

        Ok(())
    }
}

#[cfg(windows)]
fn copy_creation_time(meta: &fs::Metadata, destination: &Path) -> io::Result<()> {
    use std::os::windows::fs::FileTimesExt;

    let created = meta.created()?;
    let file = fs::OpenOptions::new().write(true).open(destination)?;
    file.set_times(fs::FileTimes::new().set_created(created))
}

/// Copy tags, then file dates, from the input onto the delivered file.
/// Only an unsupported tag format is tolerated.
pub fn propagate(
    input: &Path,
    destination: &Path,
    tags: &dyn MetadataCopier,
    dates: &dyn FileDateCopier,
) -> Result<(), ExtendError> {
    info!(
        "Attempting to copy metadata from '{}' to '{}'",
        input.display(),
        destination.display()
    );
    match tags.copy_tags(input, destination) {
        Ok(()) => {}
        Err(e @ MetadataCopyError::UnsupportedFormat { .. }) => warn!("Failed to copy metadata: {e}"),
        Err(e) => return Err(e.into()),
    }

    info!(
        "Copying file dates from '{}' to '{}'",
        input.display(),
        destination.display()
    );
    dates
        .copy_dates(input, destination)
        .map_err(|source| ExtendError::TimestampCopy {
            source_path: input.to_path_buf(),
            path: destination.to_path_buf(),
            source,
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::path::PathBuf;

    pub(crate) enum TagOutcome {
        Copied,
        Unsupported,
        Broken,
    }

    pub(crate) struct FakeTags {
        pub outcome: TagOutcome,
        pub calls: RefCell<Vec<(PathBuf, PathBuf)>>,
    }

    impl FakeTags {
        pub(crate) fn new(outcome: TagOutcome) -> Self {
            Self {
                outcome,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl MetadataCopier for FakeTags {
        fn copy_tags(&self, source: &Path, destination: &Path) -> Result<(), MetadataCopyError> {
            self.calls
                .borrow_mut()
                .push((source.to_path_buf(), destination.to_path_buf()));
            match self.outcome {
                TagOutcome::Copied => Ok(()),
                TagOutcome::Unsupported => Err(MetadataCopyError::UnsupportedFormat {
                    path: source.to_path_buf(),
                    reason: "unknown".into(),
                }),
                TagOutcome::Broken => Err(MetadataCopyError::Tag {
                    path: destination.to_path_buf(),
                    reason: "corrupt".into(),
                }),
            }
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeDates {
        pub fail: bool,
        pub calls: RefCell<Vec<(PathBuf, PathBuf)>>,
    }

    impl FileDateCopier for FakeDates {
        fn copy_dates(&self, source: &Path, destination: &Path) -> io::Result<()> {
            self.calls
                .borrow_mut()
                .push((source.to_path_buf(), destination.to_path_buf()));
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
            }
            Ok(())
        }
    }

    #[test]
    fn unsupported_tags_still_copy_dates() {
        let tags = FakeTags::new(TagOutcome::Unsupported);
        let dates = FakeDates::default();

        propagate(Path::new("x.wav"), Path::new("x.m4a"), &tags, &dates).unwrap();
        assert_eq!(tags.calls.borrow().len(), 1);
        assert_eq!(
            dates.calls.borrow().as_slice(),
            &[(PathBuf::from("x.wav"), PathBuf::from("x.m4a"))]
        );
    }

    #[test]
    fn other_tag_errors_are_fatal() {
        let tags = FakeTags::new(TagOutcome::Broken);
        let dates = FakeDates::default();

        let err = propagate(Path::new("x.wav"), Path::new("x.m4a"), &tags, &dates).unwrap_err();
        assert!(matches!(err, ExtendError::Metadata(MetadataCopyError::Tag { .. })));
        assert!(dates.calls.borrow().is_empty());
    }

    #[test]
    fn date_copy_failure_is_fatal() {
        let tags = FakeTags::new(TagOutcome::Copied);
        let dates = FakeDates {
            fail: true,
            ..Default::default()
        };

        let err = propagate(Path::new("x.wav"), Path::new("x.m4a"), &tags, &dates).unwrap_err();
        assert!(matches!(err, ExtendError::TimestampCopy { .. }));
    }

    #[test]
    fn filetime_copier_copies_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.bin");
        let destination = dir.path().join("destination.bin");
        fs::write(&source, b"a").unwrap();
        fs::write(&destination, b"b").unwrap();

        let old = FileTime::from_unix_time(1_000_000_000, 0);
        filetime::set_file_times(&source, old, old).unwrap();

        FiletimeDateCopier.copy_dates(&source, &destination).unwrap();
        let meta = fs::metadata(&destination).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta), old);
    }

    #[test]
    fn filetime_copier_fails_for_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("destination.bin");
        fs::write(&destination, b"b").unwrap();
        assert!(FiletimeDateCopier
            .copy_dates(&dir.path().join("missing.bin"), &destination)
            .is_err());
    }

    #[test]
    fn lofty_rejects_unknown_container() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("notes.xyz");
        let destination = dir.path().join("out.xyz");
        fs::write(&source, b"plain text, no audio").unwrap();
        fs::write(&destination, b"plain text, no audio").unwrap();

        let err = LoftyMetadataCopier.copy_tags(&source, &destination).unwrap_err();
        assert!(matches!(err, MetadataCopyError::UnsupportedFormat { .. }), "{err}");
    }

    fn write_tone(path: &Path) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..800 {
            writer.write_sample((i % 64) as i16 * 100).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn read_title(path: &Path) -> Option<String> {
        let tagged = Probe::open(path).unwrap().guess_file_type().unwrap().read().unwrap();
        tagged
            .tags()
            .iter()
            .find_map(|tag| tag.title().map(|title| title.into_owned()))
    }

    #[test]
    fn lofty_copies_title_between_wavs() {
        use lofty::tag::{Tag, TagType};

        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("tagged.wav");
        let destination = dir.path().join("tagged-extended-60s.wav");
        write_tone(&source);
        write_tone(&destination);

        let mut tag = Tag::new(TagType::RiffInfo);
        tag.set_title("Night Drive".to_string());
        tag.save_to_path(&source, WriteOptions::default()).unwrap();
        assert_eq!(read_title(&destination), None);

        LoftyMetadataCopier.copy_tags(&source, &destination).unwrap();
        assert_eq!(read_title(&destination).as_deref(), Some("Night Drive"));
    }

    #[test]
    fn untagged_source_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("plain.wav");
        let destination = dir.path().join("copy.wav");
        write_tone(&source);
        fs::copy(&source, &destination).unwrap();

        LoftyMetadataCopier.copy_tags(&source, &destination).unwrap();
        assert_eq!(fs::read(&source).unwrap(), fs::read(&destination).unwrap());
    }
}
