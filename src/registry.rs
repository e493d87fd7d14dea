//! Extension → converter lookup.
//!
//! Populated once at startup ([`ConverterRegistry::init`] then
//! [`ConverterRegistry::register`] per converter) and read-only afterwards.
//! Registration fails fast: an extension may be claimed by exactly one
//! converter, so a conflicting descriptor is a configuration error rather
//! than a silent override.

use crate::converters::passthrough::BUILTIN_EXTENSIONS;
use crate::converters::{self, Converter, ConverterInfo, PassthroughConverter};
use crate::error::ConvertError;
use crate::file::{extension_of, SourceFile};
use crate::service::RenderService;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Central lookup from file extension to converter.
#[derive(Default)]
pub struct ConverterRegistry {
    by_extension: HashMap<String, Arc<dyn Converter>>,
    loaded: Vec<Arc<dyn Converter>>,
    initialized: bool,
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("converters", &self.loaded.iter().map(|c| &c.info().slug).collect::<Vec<_>>())
            .field("extensions", &self.by_extension.len())
            .finish()
    }
}

impl ConverterRegistry {
    /// An empty registry. Call [`init`](Self::init) before registering.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the passthrough set and every rendering converter
    /// over `service`.
    pub fn with_rendering(service: Arc<dyn RenderService>) -> Result<Self, ConvertError> {
        let mut registry = Self::new();
        registry.init();
        for converter in converters::rendering(service) {
            registry.register(converter)?;
        }
        Ok(registry)
    }

    /// Claim the extensions the upload target accepts natively.
    pub fn init(&mut self) {
        if self.initialized {
            debug!("Registry already initialised");
            return;
        }
        let passthrough: Arc<dyn Converter> = Arc::new(PassthroughConverter::new());
        for ext in BUILTIN_EXTENSIONS {
            self.by_extension.insert(ext.to_string(), passthrough.clone());
        }
        self.loaded.push(passthrough);
        self.initialized = true;
    }

    /// Add a converter, claiming every extension it declares.
    ///
    /// Nothing is claimed unless every extension is free.
    pub fn register(&mut self, converter: Arc<dyn Converter>) -> Result<(), ConvertError> {
        let info = converter.info();
        validate(info)?;

        if self.loaded.iter().any(|c| c.info().slug == info.slug) {
            return Err(ConvertError::DuplicateSlug {
                slug: info.slug.clone(),
            });
        }

        let mut claimed = Vec::with_capacity(info.extensions.len());
        for ext in &info.extensions {
            let ext = ext.to_ascii_lowercase();
            if self.by_extension.contains_key(&ext) || claimed.contains(&ext) {
                return Err(ConvertError::ExtensionConflict {
                    module: info.name.clone(),
                    extension: ext,
                });
            }
            claimed.push(ext);
        }

        for ext in claimed {
            self.by_extension.insert(ext, converter.clone());
        }
        info!(
            "Loaded converter '{}' ({} extensions)",
            info.slug,
            info.extensions.len()
        );
        self.loaded.push(converter);
        Ok(())
    }

    /// The converter claiming `filename`'s extension, if any.
    pub fn converter_for(&self, filename: &str) -> Option<&Arc<dyn Converter>> {
        extension_of(filename).and_then(|ext| self.by_extension.get(&ext))
    }

    /// Convert `file` with the converter claiming its extension.
    ///
    /// Converter failures propagate unchanged.
    pub async fn convert(&self, file: SourceFile) -> Result<SourceFile, ConvertError> {
        let extension = file.extension().unwrap_or_default();
        let converter = self
            .by_extension
            .get(&extension)
            .ok_or_else(|| ConvertError::UnsupportedFileType {
                extension: extension.clone(),
            })?;
        debug!("'{}' → {}", file.name(), converter.info().slug);
        converter.convert(file).await
    }

    /// Claimed extensions, sorted. For user-facing messages only.
    pub fn supported_extensions(&self, exclude_builtins: bool, include_dot: bool) -> Vec<String> {
        let mut out: Vec<String> = self
            .by_extension
            .keys()
            .filter(|ext| !(exclude_builtins && BUILTIN_EXTENSIONS.contains(&ext.as_str())))
            .map(|ext| {
                if include_dot {
                    ext.clone()
                } else {
                    ext.trim_start_matches('.').to_string()
                }
            })
            .collect();
        out.sort();
        out
    }

    /// Descriptor metadata in registration order.
    pub fn converter_infos(&self) -> Vec<ConverterInfo> {
        self.loaded.iter().map(|c| c.info().clone()).collect()
    }
}

fn validate(info: &ConverterInfo) -> Result<(), ConvertError> {
    let invalid = |reason: &str| ConvertError::InvalidDescriptor {
        module: if info.name.is_empty() {
            info.slug.clone()
        } else {
            info.name.clone()
        },
        reason: reason.to_string(),
    };

    if info.slug.trim().is_empty() {
        return Err(invalid("slug is empty"));
    }
    if info.extensions.is_empty() {
        return Err(invalid("declares no extensions"));
    }
    if let Some(bad) = info
        .extensions
        .iter()
        .find(|e| !e.starts_with('.') || e.len() < 2 || e[1..].contains('.'))
    {
        return Err(invalid(&format!(
            "extension '{bad}' must be a single dot-prefixed suffix"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::testing::RecordingService;
    use async_trait::async_trait;

    struct Fake(ConverterInfo);

    #[async_trait]
    impl Converter for Fake {
        fn info(&self) -> &ConverterInfo {
            &self.0
        }
        async fn convert(&self, file: SourceFile) -> Result<SourceFile, ConvertError> {
            Ok(SourceFile::new(format!("{}.fake", file.name()), Vec::new()))
        }
    }

    fn fake(slug: &str, exts: &[&str]) -> Arc<dyn Converter> {
        Arc::new(Fake(ConverterInfo::new(slug, exts)))
    }

    fn initialised() -> ConverterRegistry {
        let mut r = ConverterRegistry::new();
        r.init();
        r
    }

    #[test]
    fn conflicting_extension_is_rejected_with_module_and_extension() {
        let mut r = initialised();
        r.register(fake("a", &[".x"])).unwrap();
        let err = r.register(fake("b", &[".y", ".x"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to load module b. Conflicting extension .x"
        );
        // Nothing from the failed descriptor was claimed.
        assert!(r.converter_for("f.y").is_none());
        assert_eq!(r.converter_infos().len(), 2);
    }

    #[test]
    fn builtin_extensions_cannot_be_claimed() {
        let mut r = initialised();
        let err = r.register(fake("pdf-render", &[".pdf"])).unwrap_err();
        assert!(matches!(err, ConvertError::ExtensionConflict { ref extension, .. } if extension == ".pdf"));
    }

    #[test]
    fn duplicate_slug_is_rejected() {
        let mut r = initialised();
        r.register(fake("a", &[".x"])).unwrap();
        assert!(matches!(
            r.register(fake("a", &[".z"])),
            Err(ConvertError::DuplicateSlug { .. })
        ));
    }

    #[test]
    fn malformed_descriptors_are_rejected() {
        let mut r = initialised();
        for exts in [&[][..], &["md"][..], &["."][..], &[".tar.gz"][..]] {
            assert!(matches!(
                r.register(fake("bad", exts)),
                Err(ConvertError::InvalidDescriptor { .. })
            ));
        }
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive_on_final_suffix() {
        let mut r = initialised();
        r.register(fake("md", &[".md"])).unwrap();
        let out = r.convert(SourceFile::new("a.b.MD", Vec::new())).await.unwrap();
        assert_eq!(out.name(), "a.b.MD.fake");
    }

    #[tokio::test]
    async fn unknown_extension_is_unsupported() {
        let r = initialised();
        let err = r
            .convert(SourceFile::new("setup.exe", Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedFileType { ref extension } if extension == ".exe"));
    }

    #[test]
    fn supported_extensions_filtering() {
        let mut r = initialised();
        r.register(fake("md", &[".md"])).unwrap();

        let all = r.supported_extensions(false, true);
        assert!(all.contains(&".pdf".to_string()));
        assert!(all.contains(&".md".to_string()));
        assert!(all.windows(2).all(|w| w[0] <= w[1]));

        assert_eq!(r.supported_extensions(true, true), vec![".md"]);
        assert_eq!(r.supported_extensions(true, false), vec!["md"]);
    }

    #[test]
    fn infos_are_in_registration_order() {
        let mut r = initialised();
        r.register(fake("first", &[".a"])).unwrap();
        r.register(fake("second", &[".b"])).unwrap();
        let slugs: Vec<_> = r.converter_infos().into_iter().map(|i| i.slug).collect();
        assert_eq!(slugs, ["bypass", "first", "second"]);
    }

    #[test]
    fn init_twice_keeps_one_passthrough() {
        let mut r = initialised();
        r.init();
        assert_eq!(r.converter_infos().len(), 1);
    }

    #[test]
    fn rendering_converters_do_not_conflict() {
        let r = ConverterRegistry::with_rendering(Arc::new(RecordingService::default())).unwrap();
        let slugs: Vec<_> = r.converter_infos().into_iter().map(|i| i.slug).collect();
        assert_eq!(
            slugs,
            ["bypass", "code-syntax-highlighter", "markdown", "svg", "text"]
        );
        assert!(r.converter_for("x.rs").is_some());
        assert!(r.converter_for("x.exe").is_none());
    }
}
