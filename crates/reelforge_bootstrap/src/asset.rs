//! A resolved release binary.

/// One platform's release asset and where it is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryAsset {
    /// `{os}-{arch}`
    pub platform_key: String,
    /// Release filename
    pub filename: String,
    /// Download URL
    pub url: String,
    /// Expected lowercase hex SHA-256; `None` means unverified
    pub sha256: Option<String>,
    /// Whether the download is a tar.gz holding the executable
    pub archive: bool,
    /// Final executable path
    pub install_path: std::path::PathBuf,
}

impl BinaryAsset {
    /// The file-existence check that stands in for an install database.
    pub fn is_installed(&self) -> bool {
        self.install_path.is_file()
    }
}
