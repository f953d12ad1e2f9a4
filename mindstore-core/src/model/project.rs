/// Normalize a project path into the dispatcher's project-id key: lowercased,
/// backslashes turned into forward slashes, trailing slash trimmed.
///
/// `None` is the global namespace and is never normalized.
pub fn normalize_project_id(raw: &str) -> String {
    let forward = raw.replace('\\', "/");
    let trimmed = forward.trim_end_matches('/');
    trimmed.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_normalizes_separators() {
        assert_eq!(normalize_project_id(r"C:\Code\MyApp\"), "c:/code/myapp");
        assert_eq!(normalize_project_id("/srv/App/"), "/srv/app");
    }

    #[test]
    fn idempotent() {
        let once = normalize_project_id("Foo/Bar");
        let twice = normalize_project_id(&once);
        assert_eq!(once, twice);
    }
}
