//! Object naming for uploads.

/// Extension of the last path segment, including the leading dot.
///
/// Everything from the final `.` of the file name onward; empty when the
/// name has no dot.  `"a/b.tar.gz"` gives `".gz"`.
pub fn extension(path: &str) -> &str {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match name.rfind('.') {
        Some(idx) => &name[idx..],
        None => "",
    }
}

/// Last path segment.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Build the stored object name for an upload.
///
/// `{save_path}{stem}{ext}` where `ext` comes from `original_name`, and
/// `stem` is `save_name` or, when that is empty, a hyphen-less UUID v4.
/// A non-empty `save_path` gets a trailing `/` if it lacks one.
pub fn upload_object_name(original_name: &str, save_path: &str, save_name: &str) -> String {
    let ext = extension(original_name);
    let stem = if save_name.is_empty() {
        uuid::Uuid::new_v4().simple().to_string()
    } else {
        save_name.to_string()
    };

    let mut name = String::with_capacity(save_path.len() + stem.len() + ext.len() + 1);
    name.push_str(save_path);
    if !save_path.is_empty() && !save_path.ends_with('/') {
        name.push('/');
    }
    name.push_str(&stem);
    name.push_str(ext);
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension() {
        assert_eq!(extension("b.txt"), ".txt");
        assert_eq!(extension("a/b.tar.gz"), ".gz");
        assert_eq!(extension("a.dir/README"), "");
        assert_eq!(extension("noext"), "");
        assert_eq!(extension("trailing."), ".");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("a/b/c.png"), "c.png");
        assert_eq!(file_name("c.png"), "c.png");
    }

    #[test]
    fn test_upload_name_with_save_name() {
        assert_eq!(upload_object_name("cat.PNG", "img/", "kitty"), "img/kitty.PNG");
        assert_eq!(upload_object_name("cat.png", "img", "kitty"), "img/kitty.png");
        assert_eq!(upload_object_name("notes", "", "n1"), "n1");
    }

    #[test]
    fn test_upload_name_generated_stem() {
        let name = upload_object_name("photo.jpg", "2024/", "");
        assert!(name.starts_with("2024/"));
        assert!(name.ends_with(".jpg"));
        let stem = &name["2024/".len()..name.len() - ".jpg".len()];
        assert_eq!(stem.len(), 32);
        assert!(!stem.contains('-'));
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
