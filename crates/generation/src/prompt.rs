//! Prompt templates for product imagery.

use std::collections::HashMap;

use creative_core::brief::Product;

pub const DEFAULT_TEMPLATE: &str = "product_hero";

/// Named prompt templates with `{product_name}` and
/// `{product_description}` placeholders.
pub struct PromptLibrary {
    templates: HashMap<String, String>,
}

impl PromptLibrary {
    /// Library seeded with the configured template as `product_hero`.
    pub fn new(default_template: &str) -> Self {
        let mut templates = HashMap::new();
        templates.insert(DEFAULT_TEMPLATE.to_string(), default_template.to_string());
        templates.insert(
            "lifestyle".to_string(),
            "Lifestyle photo of {product_name} in everyday use, {product_description}, \
             natural light, candid composition, advertising quality"
                .to_string(),
        );
        Self { templates }
    }

    pub fn insert(&mut self, name: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(name.into(), template.into());
    }

    /// Build a prompt for `product` from the named template, falling
    /// back to `product_hero` when the name is unknown.
    pub fn build(&self, template: &str, product: &Product) -> String {
        let template = self
            .templates
            .get(template)
            .or_else(|| self.templates.get(DEFAULT_TEMPLATE))
            .map(String::as_str)
            .unwrap_or("{product_name}, {product_description}");

        let description = if product.description.is_empty() {
            format!("high-quality {}", product.name)
        } else {
            product.description.clone()
        };

        template
            .replace("{product_name}", &product.name)
            .replace("{product_description}", &description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use creative_core::config::GenerationConfig;

    fn product(name: &str, description: &str) -> Product {
        Product {
            name: name.to_string(),
            description: description.to_string(),
        }
    }

    #[test]
    fn test_placeholders_substituted() {
        let library = PromptLibrary::new(&GenerationConfig::default().prompt_template);
        let prompt = library.build(
            DEFAULT_TEMPLATE,
            &product("Solar Lamp", "a warm outdoor light"),
        );
        assert!(prompt.contains("Solar Lamp"));
        assert!(prompt.contains("a warm outdoor light"));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn test_empty_description_gets_default() {
        let library = PromptLibrary::new(&GenerationConfig::default().prompt_template);
        let prompt = library.build(DEFAULT_TEMPLATE, &product("Trail Pack", ""));
        assert!(prompt.contains("high-quality Trail Pack"));
    }

    #[test]
    fn test_unknown_template_falls_back() {
        let library = PromptLibrary::new("Hero shot of {product_name}");
        let prompt = library.build("nonexistent", &product("Trail Pack", ""));
        assert!(prompt.starts_with("Hero shot of Trail Pack"));
    }
}
