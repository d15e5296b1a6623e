use crate::errors::{FilterError, FilterResult};
use crate::record::Record;

/// Resolves an image for a record. Implementations may be slow; the store
/// calls them sequentially.
pub trait ImageSource {
    fn image_for(&self, record: &Record) -> FilterResult<String>;
}

/// Builds image URLs from a template containing `{id}` and/or `{name}`.
///
/// Works offline: the URL is derived from the record alone and no service is
/// contacted, so the image it points at is never checked. Implement
/// [`ImageSource`] to resolve images against a remote API instead.
#[derive(Debug, Clone)]
pub struct UrlTemplateImageSource {
    template: String,
}

impl UrlTemplateImageSource {
    pub fn new(template: impl Into<String>) -> FilterResult<Self> {
        let template = template.into();
        if !template.contains("{id}") && !template.contains("{name}") {
            return Err(FilterError::config_error(format!(
                "image url template {:?} has no {{id}} or {{name}} placeholder",
                template
            )));
        }
        Ok(Self { template })
    }
}

impl ImageSource for UrlTemplateImageSource {
    fn image_for(&self, record: &Record) -> FilterResult<String> {
        let name = record.name.trim().to_lowercase();
        if name.is_empty() && self.template.contains("{name}") {
            return Err(FilterError::enrichment(record.id, "record has no name"));
        }
        Ok(self
            .template
            .replace("{id}", &record.id.to_string())
            .replace("{name}", &name))
    }
}
