//! Test utilities for MathTutor
//!
//! This module provides common test utilities including temporary directory
//! management, fixture file creation, and assertion helpers.

use crate::config::Config;
use std::fmt::Display;
use std::path::PathBuf;
use tempfile::TempDir;

/// Create a temporary directory for testing
///
/// # Returns
///
/// Returns a TempDir that will be cleaned up when dropped
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Create a test file with the given content
///
/// # Arguments
///
/// * `dir` - Directory to create the file in
/// * `name` - Name of the file
/// * `content` - Content to write to the file
///
/// # Returns
///
/// Returns the path to the created file
///
/// # Panics
///
/// Panics if file creation or writing fails
pub fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Create a real PNG image of the given size
///
/// The format is chosen from the file name's extension, so `name` should end
/// in `.png` for a PNG.
///
/// # Panics
///
/// Panics if the image cannot be encoded or written
pub fn create_test_png(dir: &TempDir, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.path().join(name);
    let image = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 40) as u8, (y * 40) as u8, 128])
    });
    image
        .save_with_format(&path, image::ImageFormat::Png)
        .expect("Failed to write test image");
    path
}

/// Assert that an error contains the expected message
///
/// Works with typed errors and with `anyhow` results alike.
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T, E: Display>(result: Result<T, E>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = format!("{:#}", e);
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// Create a valid test configuration
///
/// Same as the defaults except for a short request timeout.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.provider.gemini.timeout_seconds = 5;
    config
}

/// Create a test configuration YAML string
///
/// Sets every field away from its default so parsing can be checked.
pub fn test_config_yaml() -> String {
    r#"
provider:
  type: gemini
  gemini:
    model: gemini-2.5-pro
    api_base: http://localhost:8080
    thinking_budget: 0
    timeout_seconds: 30

tutor:
  follow_up_prompt: "Can you explain that step?"
  max_image_bytes: 1048576
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TutorError;

    #[test]
    fn test_temp_dir_creation() {
        let dir = temp_dir();
        assert!(dir.path().exists());
    }

    #[test]
    fn test_create_test_file() {
        let dir = temp_dir();
        let path = create_test_file(&dir, "test.txt", "content");
        assert!(path.exists());
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "content");
    }

    #[test]
    fn test_create_test_png() {
        let dir = temp_dir();
        let path = create_test_png(&dir, "photo.png", 5, 3);
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"\x89PNG"));
        assert_eq!(image::image_dimensions(&path).unwrap(), (5, 3));
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        let result: Result<(), TutorError> = Ok(());
        assert_error_contains(result, "error");
    }

    #[test]
    #[should_panic(expected = "does not contain")]
    fn test_assert_error_contains_wrong_message() {
        let result: Result<(), TutorError> =
            Err(TutorError::Config("different error".to_string()));
        assert_error_contains(result, "not present");
    }
}
