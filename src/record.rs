//! Shared media records and the factories that build them.

use crate::constants::ShareKind;

/// A song or video in an audio share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvRecord {
    pub location: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub format: String,
    /// Duration in seconds
    pub duration: u32,
}

/// A photo in an image share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub location: String,
    pub filename: String,
    pub format: String,
    pub width: u32,
    pub height: u32,
}

/// A single shared item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Av(AvRecord),
    Image(ImageRecord),
}

impl Record {
    pub fn location(&self) -> &str {
        match self {
            Record::Av(r) => &r.location,
            Record::Image(r) => &r.location,
        }
    }

    pub fn kind(&self) -> ShareKind {
        match self {
            Record::Av(_) => ShareKind::Audio,
            Record::Image(_) => ShareKind::Image,
        }
    }
}

/// A playlist or album grouping shared items by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    pub id: u32,
    pub name: String,
    pub entries: Vec<u32>,
}

impl ContainerRecord {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn add_entry(&mut self, key: u32) {
        if !self.entries.contains(&key) {
            self.entries.push(key);
        }
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Builds records of one media kind.
pub trait RecordFactory {
    /// Create a record at `location`, or the factory's default item when `None`.
    fn create(&self, location: Option<&str>) -> Record;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AvRecordFactory;

impl RecordFactory for AvRecordFactory {
    fn create(&self, location: Option<&str>) -> Record {
        Record::Av(AvRecord {
            location: location.unwrap_or("file:///tmp/test.mp3").to_string(),
            title: "Test Title".to_string(),
            artist: "Test Artist".to_string(),
            album: "Test Album".to_string(),
            format: "mp3".to_string(),
            duration: 1800,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageRecordFactory;

impl RecordFactory for ImageRecordFactory {
    fn create(&self, location: Option<&str>) -> Record {
        let location = location.unwrap_or("file:///tmp/test.jpeg");
        let filename = location.rsplit('/').next().unwrap_or(location);
        Record::Image(ImageRecord {
            location: location.to_string(),
            filename: filename.to_string(),
            format: "JPEG".to_string(),
            width: 640,
            height: 480,
        })
    }
}

/// The factory matching a share kind.
pub fn factory_for(kind: ShareKind) -> Box<dyn RecordFactory> {
    match kind {
        ShareKind::Audio => Box::new(AvRecordFactory),
        ShareKind::Image => Box::new(ImageRecordFactory),
    }
}
