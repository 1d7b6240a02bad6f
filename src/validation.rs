use std::collections::HashSet;

use crate::types::{AttributeKind, AttributeSchema, fold_name};

const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 30;
const MIN_PASSWORD_LEN: usize = 8;
const MIN_NAME_LEN: usize = 2;
const MAX_CATEGORY_NAME_LEN: usize = 50;
const MAX_ATTRIBUTE_NAME_LEN: usize = 50;
const MAX_COLLECTION_NAME_LEN: usize = 100;
const MAX_ITEM_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 500;

fn is_valid_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn validate_length(value: &str, entity: &str, min: usize, max: usize) -> Result<(), String> {
    let len = value.trim().chars().count();
    if len < min {
        return Err(format!("{entity} must be at least {min} characters"));
    }
    if len > max {
        return Err(format!("{entity} cannot exceed {max} characters"));
    }
    Ok(())
}

/// Returns true for absolute `http`/`https` URLs with a host.
#[must_use]
pub fn is_http_url(value: &str) -> bool {
    url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

pub fn validate_username(username: &str) -> Result<(), String> {
    if username.len() < MIN_USERNAME_LEN || username.len() > MAX_USERNAME_LEN {
        return Err(format!(
            "Username must be between {MIN_USERNAME_LEN} and {MAX_USERNAME_LEN} characters"
        ));
    }
    if !username.chars().all(is_valid_username_char) {
        return Err(
            "Username can only contain alphanumeric characters, hyphens, and underscores"
                .to_string(),
        );
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err("Invalid email format".to_string())
    }
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    Ok(())
}

pub fn validate_description(description: Option<&str>) -> Result<(), String> {
    match description {
        Some(d) if d.chars().count() > MAX_DESCRIPTION_LEN => Err(format!(
            "Description cannot exceed {MAX_DESCRIPTION_LEN} characters"
        )),
        _ => Ok(()),
    }
}

/// Checks a category definition, collecting every problem.
pub fn validate_category(
    name: &str,
    description: Option<&str>,
    attributes: &[AttributeSchema],
    display_attribute_index: Option<usize>,
) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if let Err(e) = validate_length(name, "Category name", MIN_NAME_LEN, MAX_CATEGORY_NAME_LEN) {
        errors.push(e);
    }
    if let Err(e) = validate_description(description) {
        errors.push(e);
    }

    let mut names = HashSet::new();
    for attribute in attributes {
        let label = format!("Attribute '{}'", attribute.name.trim());
        if let Err(e) = validate_length(
            &attribute.name,
            "Attribute name",
            MIN_NAME_LEN,
            MAX_ATTRIBUTE_NAME_LEN,
        ) {
            errors.push(e);
        }
        if !names.insert(fold_name(&attribute.name)) {
            errors.push(format!("{label} is declared more than once"));
        }

        let is_select = attribute.kind == AttributeKind::Select;
        if is_select && attribute.options.is_empty() {
            errors.push(format!("{label} of kind 'select' requires options"));
        }
        if !is_select && !attribute.options.is_empty() {
            errors.push(format!("{label} only 'select' attributes may declare options"));
        }
        if attribute.options.iter().any(|o| o.trim().is_empty()) {
            errors.push(format!("{label} has an empty option"));
        }
        let distinct: HashSet<String> = attribute
            .options
            .iter()
            .map(|o| o.to_ascii_lowercase())
            .collect();
        if distinct.len() != attribute.options.len() {
            errors.push(format!("{label} has duplicate options"));
        }
    }

    if let Some(index) = display_attribute_index {
        if index >= attributes.len() {
            errors.push(format!(
                "Display attribute index {index} is out of range for {} attributes",
                attributes.len()
            ));
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

pub fn validate_collection_name(name: &str) -> Result<(), String> {
    validate_length(name, "Collection name", MIN_NAME_LEN, MAX_COLLECTION_NAME_LEN)
}

pub fn validate_cover_image(cover_image: Option<&str>) -> Result<(), String> {
    match cover_image {
        Some(url) if !url.is_empty() && !is_http_url(url) => {
            Err("Cover image must be an http(s) URL".to_string())
        }
        _ => Ok(()),
    }
}

/// Item names are mandatory only when the category asks for them.
pub fn validate_item_name(name: &str, required: bool) -> Result<(), String> {
    if name.trim().is_empty() && !required {
        return Ok(());
    }
    validate_length(name, "Item name", MIN_NAME_LEN, MAX_ITEM_NAME_LEN)
}

pub fn validate_images(images: &[String]) -> Result<(), String> {
    match images.iter().find(|url| !is_http_url(url)) {
        Some(bad) => Err(format!("Invalid image URL: {bad}")),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(name: &str, kind: AttributeKind, options: &[&str]) -> AttributeSchema {
        AttributeSchema {
            name: name.to_string(),
            kind,
            required: false,
            options: options.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_username_rules() {
        assert!(validate_username("alice_01").is_ok());
        assert!(validate_username("al").is_err());
        assert!(validate_username("bad name").is_err());
    }

    #[test]
    fn test_email_rules() {
        assert!(validate_email("a@example.com").is_ok());
        assert!(validate_email("a@example").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("a b@example.com").is_err());
    }

    #[test]
    fn test_category_collects_every_error() {
        let attrs = vec![
            attr("Title", AttributeKind::Text, &[]),
            attr("title", AttributeKind::Text, &[]),
            attr("format", AttributeKind::Select, &[]),
            attr("pages", AttributeKind::Number, &["1"]),
        ];
        let errors = validate_category("B", None, &attrs, Some(9)).unwrap_err();
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_category_valid() {
        let attrs = vec![
            attr("isbn", AttributeKind::Text, &[]),
            attr("format", AttributeKind::Select, &["hardcover", "paperback"]),
        ];
        assert!(validate_category("Books", Some("Printed"), &attrs, Some(0)).is_ok());
    }

    #[test]
    fn test_item_name_optional_unless_required() {
        assert!(validate_item_name("", false).is_ok());
        assert!(validate_item_name("", true).is_err());
        assert!(validate_item_name("Dune", true).is_ok());
    }

    #[test]
    fn test_http_urls() {
        assert!(is_http_url("https://example.com/a.png"));
        assert!(!is_http_url("javascript:alert(1)"));
        assert!(!is_http_url("example.com"));
    }
}
