use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::OcrSettings;
use crate::error::ExtractError;
use crate::log;
use crate::paths::get_local_tesseract_dir;

/// Where the Tesseract executable and (optionally) its language data live.
#[derive(Debug, Clone)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    /// `None` lets Tesseract fall back to its compiled-in tessdata location
    pub tessdata: Option<PathBuf>,
}

const WINDOWS_INSTALL_DIRS: [&str; 3] = [
    r"C:\Program Files\Tesseract-OCR",
    r"C:\Program Files (x86)\Tesseract-OCR",
    r"C:\tesseract",
];

/// Finds Tesseract or explains how to install it.
pub fn locate_tesseract(settings: &OcrSettings) -> Result<TesseractPaths, ExtractError> {
    let executable = find_tesseract_executable(settings.tesseract_path.as_deref()).ok_or_else(
        || ExtractError::TesseractNotFound {
            hint: install_hint(),
        },
    )?;
    let tessdata = find_tessdata_dir(settings.tessdata_dir.as_deref(), &settings.language);

    log(&format!("Found Tesseract at: {}", executable.display()));
    if let Some(dir) = &tessdata {
        log(&format!("Using tessdata from: {}", dir.display()));
    }

    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

/// Verifies the OCR engine is usable and returns its version line.
pub fn check_dependencies(settings: &OcrSettings) -> Result<String, ExtractError> {
    let paths = locate_tesseract(settings)?;
    tesseract_version(&paths.executable).ok_or_else(|| ExtractError::TesseractNotFound {
        hint: format!(
            "{} exists but did not report a version. {}",
            paths.executable.display(),
            install_hint()
        ),
    })
}

/// Runs `tesseract --version` and returns the first line it prints.
pub fn tesseract_version(executable: &Path) -> Option<String> {
    let output = Command::new(executable).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    // Older releases print the version on stderr
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    stdout
        .lines()
        .chain(stderr.lines())
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Installation instructions for the current platform.
pub fn install_hint() -> String {
    match std::env::consts::OS {
        "windows" => "Please install Tesseract OCR:\n\
             1. Download from: https://github.com/UB-Mannheim/tesseract/wiki\n\
             2. Run the installer (choose to add to PATH)\n\
             3. Or set ocr_settings.tesseract_path in config.json"
            .to_string(),
        "macos" => "Install with: brew install tesseract".to_string(),
        "linux" => "Install with: sudo apt-get install tesseract-ocr".to_string(),
        other => format!("Install Tesseract OCR for {} and make sure it is on PATH", other),
    }
}

/// Checks the configured path, then PATH, then common install locations.
fn find_tesseract_executable(configured: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = configured {
        let p = PathBuf::from(path);
        return p.exists().then_some(p);
    }

    let exe_name = if cfg!(windows) { "tesseract.exe" } else { "tesseract" };

    let local_exe = get_local_tesseract_dir().join(exe_name);
    if local_exe.exists() {
        return Some(local_exe);
    }

    if tesseract_version(Path::new("tesseract")).is_some() {
        return Some(PathBuf::from("tesseract"));
    }

    if cfg!(windows) {
        let per_user = dirs::data_local_dir()
            .map(|d| d.join("Programs").join("Tesseract-OCR").join(exe_name));
        return WINDOWS_INSTALL_DIRS
            .iter()
            .map(|dir| PathBuf::from(dir).join(exe_name))
            .chain(per_user)
            .find(|p| p.exists());
    }

    None
}

/// Finds a tessdata directory holding `<language>.traineddata`.
fn find_tessdata_dir(configured: Option<&str>, language: &str) -> Option<PathBuf> {
    let traineddata = format!("{}.traineddata", language);
    let has_language = |dir: &Path| dir.join(&traineddata).exists();

    if let Some(dir) = configured {
        let p = PathBuf::from(dir);
        if has_language(&p) {
            return Some(p);
        }
        log(&format!(
            "Warning: {} not found in configured tessdata_dir {}",
            traineddata, dir
        ));
    }

    let mut candidates = vec![get_local_tesseract_dir().join("tessdata")];
    if cfg!(windows) {
        candidates.extend(
            WINDOWS_INSTALL_DIRS
                .iter()
                .map(|dir| PathBuf::from(dir).join("tessdata")),
        );
    }
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let prefix = PathBuf::from(prefix);
        candidates.push(prefix.join("tessdata"));
        candidates.push(prefix);
    }

    candidates.into_iter().find(|dir| has_language(dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_configured_executable_must_exist() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("tesseract");
        assert_eq!(find_tesseract_executable(missing.to_str()), None);

        std::fs::write(&missing, "").unwrap();
        assert_eq!(find_tesseract_executable(missing.to_str()), Some(missing));
    }

    #[test]
    fn test_configured_tessdata_dir() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("eng.traineddata"), "").unwrap();

        let found = find_tessdata_dir(dir.path().to_str(), "eng");
        assert_eq!(found, Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_locate_reports_install_hint() {
        let dir = tempdir().unwrap();
        let settings = OcrSettings {
            tesseract_path: Some(dir.path().join("missing").to_string_lossy().to_string()),
            ..OcrSettings::default()
        };

        match locate_tesseract(&settings) {
            Err(ExtractError::TesseractNotFound { hint }) => assert!(!hint.is_empty()),
            other => panic!("expected TesseractNotFound, got {:?}", other),
        }
    }
}
