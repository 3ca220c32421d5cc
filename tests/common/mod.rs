use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Writes a small real PNG into `dir`
#[allow(dead_code)]
pub fn write_png(dir: &TempDir, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.path().join(name);
    image::RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]))
        .save_with_format(&path, image::ImageFormat::Png)
        .expect("failed to write png");
    path
}

#[allow(dead_code)]
pub fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("failed to write file");
    path
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
