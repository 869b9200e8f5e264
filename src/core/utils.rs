//! String transformation utilities for template and project naming

use chrono::Utc;

/// Converts a template location into its display-safe slug.
///
/// Locations are directory names and use underscores; slugs are the
/// hyphenated form shown to users and accepted by `--template`.
///
/// # Examples
/// ```
/// use dsforge::core::utils::slugify;
///
/// assert_eq!(slugify("ds_monorepo"), "ds-monorepo");
/// assert_eq!(slugify("pkg_core"), "pkg-core");
/// ```
pub fn slugify(location: &str) -> String {
    location.replace('_', "-")
}

/// Normalizes a human project name into a directory name.
///
/// Lower-cases the input and replaces runs of whitespace with single
/// hyphens; this is the default output-directory policy when a template
/// does not override naming.
///
/// # Examples
/// ```
/// use dsforge::core::utils::sanitize_directory_name;
///
/// assert_eq!(sanitize_directory_name("My Sales Project"), "my-sales-project");
/// assert_eq!(sanitize_directory_name("demo"), "demo");
/// ```
pub fn sanitize_directory_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

/// Converts a package or project name into a Python module name.
///
/// Hyphens and whitespace become underscores and the result is
/// lower-cased, matching what generated `pyproject.toml` files expect
/// for `src/<module>` layouts.
///
/// # Examples
/// ```
/// use dsforge::core::utils::module_name;
///
/// assert_eq!(module_name("my-sales-core"), "my_sales_core");
/// assert_eq!(module_name("Demo Project"), "demo_project");
/// ```
pub fn module_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .replace('-', "_")
        .to_lowercase()
}

/// Fallback directory name when the context has no project name:
/// `<prefix>-<UTC timestamp>`.
pub fn timestamp_directory_name(prefix: &str) -> String {
    format!(
        "{}-{}",
        sanitize_directory_name(prefix),
        Utc::now().format("%Y%m%d-%H%M%S")
    )
}
