//! Options shared by the export and import pipelines.

use bon::Builder;

use crate::types::Encode;

/// Upper bound for numbered sidecar backups.
pub const MAX_SAVE_VERSIONS: u32 = 32;

#[derive(Builder, Debug, Clone)]
pub struct Options {
    /// Text encoding of written PMX files.
    #[builder(default = Encode::Utf16Le)]
    pub encoding: Encode,
    /// Primary (Japanese) name column vs secondary (English) one. Also picks the default sidecar template.
    #[builder(default = true)]
    pub use_japanese_name: bool,
    /// How many `modelN.xml` backups to keep when the sidecar is rewritten.
    #[builder(default = 0)]
    pub save_versions: u32,
    #[builder(default = true)]
    pub write_sidecar: bool,
}

impl Options {
    pub fn backups(&self) -> u32 {
        self.save_versions.min(MAX_SAVE_VERSIONS)
    }
}

impl Default for Options {
    fn default() -> Self {
        Options::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = Options::default();
        assert_eq!(options.encoding, Encode::Utf16Le);
        assert!(options.use_japanese_name);
        assert_eq!(options.backups(), 0);
        assert!(options.write_sidecar);
    }

    #[test]
    fn backups_are_clamped() {
        let options = Options::builder().save_versions(100).build();
        assert_eq!(options.backups(), MAX_SAVE_VERSIONS);
    }
}
