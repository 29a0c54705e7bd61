use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Invalid release {0:?}: expected <major>.<minor>, e.g. 7.4")]
pub struct ReleaseError(pub String);

/// An OpenBSD release, e.g. `7.4`.
///
/// The short form (`74`) is what appears in set file names and key names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    version: String,
    short: String,
}

impl Release {
    pub fn parse(version: &str) -> Result<Self, ReleaseError> {
        let version = version.trim();
        let valid = match version.split_once('.') {
            Some((major, minor)) => {
                !major.is_empty()
                    && !minor.is_empty()
                    && major.chars().all(|c| c.is_ascii_digit())
                    && minor.chars().all(|c| c.is_ascii_digit())
            }
            None => false,
        };
        if !valid {
            return Err(ReleaseError(version.to_string()));
        }

        Ok(Self {
            version: version.to_string(),
            short: version.replace('.', ""),
        })
    }

    /// Dotted version, as used in mirror paths.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Version with the dot removed, as used in file and key names.
    pub fn short(&self) -> &str {
        &self.short
    }

    /// File name of the release's base signing key.
    pub fn signing_key_name(&self) -> String {
        format!("openbsd-{}-base.pub", self.short)
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.version)
    }
}
