//! Format versions, scoped per resource type.

use crate::resources::ResourceType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Packed `major.minor.patch` format version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u32);

impl Version {
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self(((major as u32) << 16) | ((minor as u32) << 8) | patch as u32)
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn major(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn minor(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn patch(self) -> u8 {
        self.0 as u8
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())
    }
}

/// Oldest version of `resource` this build can still read.
const fn minimum_version(resource: ResourceType) -> Version {
    match resource {
        ResourceType::Config => Version::new(1, 0, 0),
        ResourceType::Snapshot => Version::new(1, 0, 0),
        ResourceType::Vfs => Version::new(1, 0, 0),
        ResourceType::Directory => Version::new(1, 0, 0),
        ResourceType::Filename => Version::new(1, 0, 0),
        ResourceType::FileSummary => Version::new(1, 0, 0),
        ResourceType::Object => Version::new(1, 0, 0),
    }
}

/// Version written for new resources of this type.
pub const fn current_version(resource: ResourceType) -> Version {
    match resource {
        ResourceType::Config => Version::new(1, 0, 0),
        ResourceType::Snapshot => Version::new(1, 1, 0),
        ResourceType::Vfs => Version::new(1, 0, 0),
        ResourceType::Directory => Version::new(1, 0, 0),
        ResourceType::Filename => Version::new(1, 0, 0),
        ResourceType::FileSummary => Version::new(1, 0, 0),
        ResourceType::Object => Version::new(1, 0, 0),
    }
}

/// Whether `version` lies inside the registered range of `resource`.
pub fn is_supported(resource: ResourceType, version: Version) -> bool {
    (minimum_version(resource)..=current_version(resource)).contains(&version)
}
