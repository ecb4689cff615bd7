//! Tag and repository URL template rendering
//!
//! Templates carry `{namespace}`, `{module}`, `{provider}` placeholders
//! (browse/base templates additionally `{tag}` and `{path}`); the tag format
//! carries `{version}`. Substitution is verbatim string replacement, and a
//! template with unknown placeholders is rejected rather than passed through.

use crate::core::config::RepositoryConfig;
use crate::core::error::ExtractError;
use crate::core::metadata::ModuleKey;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Any placeholder left over after substitution
    static ref LEFTOVER_PLACEHOLDER: Regex = Regex::new(r"\{[^{}]*\}").unwrap();
    /// Scheme, host and a non-empty path
    static ref REPOSITORY_URL: Regex = Regex::new(r"^(ssh|git|http|https)://[^/\s]+/\S+$").unwrap();
}

/// Placeholders accepted in clone URL templates
const CLONE_PLACEHOLDERS: &[&str] = &["namespace", "module", "provider"];

/// Placeholders accepted in base/browse URL templates
const DISPLAY_PLACEHOLDERS: &[&str] = &["namespace", "module", "provider", "tag", "path"];

/// Compute the git ref for a version from the tag format template
///
/// The template must contain the `{version}` placeholder; a format without
/// it would produce the same ref for every version.
pub fn render_tag(tag_format: &str, version: &semver::Version) -> Result<String, ExtractError> {
    if !tag_format.contains("{version}") {
        return Err(ExtractError::InvalidGitTagFormat {
            tag_format: tag_format.to_string(),
        });
    }

    Ok(tag_format.replace("{version}", &version.to_string()))
}

/// Substitute module identity into a clone URL template and validate the result
pub fn render_clone_url(
    template: &str,
    key: &ModuleKey,
    field: &str,
) -> Result<String, ExtractError> {
    let rendered = template
        .replace("{namespace}", &key.namespace)
        .replace("{module}", &key.module)
        .replace("{provider}", &key.provider);

    if let Some(leftover) = LEFTOVER_PLACEHOLDER.find(&rendered) {
        return Err(ExtractError::InvalidRepositoryUrlTemplate {
            field: field.to_string(),
            message: format!("未知のプレースホルダです: {}", leftover.as_str()),
        });
    }

    if !REPOSITORY_URL.is_match(&rendered) {
        return Err(ExtractError::InvalidRepositoryUrlTemplate {
            field: field.to_string(),
            message: format!(
                "スキーム付きURL（ssh:// git:// http:// https://）ではありません: {}",
                rendered
            ),
        });
    }

    Ok(rendered)
}

/// Validate a base/browse URL template without rendering it
///
/// Used for manifest-supplied overrides, which are stored as templates and
/// rendered later by the display layer.
pub fn validate_url_template(template: &str, field: &str) -> Result<(), ExtractError> {
    let mut probe = template.to_string();
    let placeholders = if field.contains("clone") || field.contains("Clone") {
        CLONE_PLACEHOLDERS
    } else {
        DISPLAY_PLACEHOLDERS
    };

    for name in placeholders {
        probe = probe.replace(&format!("{{{}}}", name), "x");
    }

    if let Some(leftover) = LEFTOVER_PLACEHOLDER.find(&probe) {
        return Err(ExtractError::InvalidRepositoryUrlTemplate {
            field: field.to_string(),
            message: format!("未知のプレースホルダです: {}", leftover.as_str()),
        });
    }

    if !REPOSITORY_URL.is_match(&probe) {
        return Err(ExtractError::InvalidRepositoryUrlTemplate {
            field: field.to_string(),
            message: format!(
                "スキーム付きURL（ssh:// git:// http:// https://）ではありません: {}",
                template
            ),
        });
    }

    Ok(())
}

/// Resolve the effective clone URL for a module
///
/// An explicit template on the module provider takes precedence over the
/// shared git provider's template; with neither configured the module
/// cannot be cloned.
pub fn resolve_clone_url(
    repository: &RepositoryConfig,
    key: &ModuleKey,
) -> Result<String, ExtractError> {
    if let Some(template) = &repository.clone_url_template {
        return render_clone_url(template, key, "cloneUrlTemplate");
    }

    if let Some(provider) = &repository.git_provider {
        return render_clone_url(
            &provider.clone_url_template,
            key,
            "gitProvider.cloneUrlTemplate",
        );
    }

    Err(ExtractError::MissingCloneUrl)
}
