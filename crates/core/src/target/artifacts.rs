use super::Release;

/// Detached signature over [`CHECKSUM_FILE`]; always re-downloaded.
pub const SIGNATURE_FILE: &str = "SHA256.sig";
pub const CHECKSUM_FILE: &str = "SHA256";
pub const INDEX_FILE: &str = "index.txt";

const VERSION_MARKER: &str = "{v}";

const SET_TEMPLATES: &[&str] = &[
    SIGNATURE_FILE,
    CHECKSUM_FILE,
    "bsd",
    "bsd.mp",
    "bsd.rd",
    INDEX_FILE,
    "base{v}.tgz",
    "comp{v}.tgz",
    "man{v}.tgz",
    "xbase{v}.tgz",
    "miniroot{v}.img",
];

/// Ordered list of files needed to install one release on one architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    files: Vec<String>,
    miniroot: String,
}

impl ArtifactSet {
    pub fn for_release(release: &Release) -> Self {
        let files = SET_TEMPLATES
            .iter()
            .map(|t| t.replace(VERSION_MARKER, release.short()))
            .collect();
        Self {
            files,
            miniroot: format!("miniroot{}.img", release.short()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Installer image overlaid onto the boot disk.
    pub fn miniroot(&self) -> &str {
        &self.miniroot
    }

    /// Files that are checked against the signed checksum list.
    pub fn verifiable(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|f| !Self::is_metadata(f))
    }

    pub fn is_metadata(file: &str) -> bool {
        matches!(file, SIGNATURE_FILE | CHECKSUM_FILE | INDEX_FILE)
    }
}
