// src/engine/io.rs
//
// I/O operations: Source enum, file loading, atomic writes and the
// sticker-directory conventions (input selection, prompt metadata).

use crate::engine::decoder::decode_rgba;
use crate::engine::encoder::encode_png;
use crate::engine::firewall::FirewallConfig;
use crate::engine::raster::{Color, RasterImage};
use crate::error::{Result, StampcutError};
use memmap2::Mmap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::debug;

/// Generation metadata written next to the stickers.
pub const PROMPTS_FILE: &str = "_prompts.json";
/// Number of sticker slots in a full package.
pub const PACKAGE_SLOTS: u32 = 24;

fn display(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Image source - in-memory data, memory-mapped files, or file paths (lazy loading)
#[derive(Clone, Debug)]
pub enum Source {
    Memory(Arc<Vec<u8>>),
    /// Zero-copy access to an open file
    Mapped(Arc<Mmap>),
    /// Read only when needed
    Path(PathBuf),
}

impl Source {
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Source::Memory(Arc::new(data))
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Source::Path(path.into())
    }

    /// Memory-map `path`.
    pub fn map_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StampcutError::file_not_found(display(path))
            } else {
                StampcutError::file_read_failed(display(path), e)
            }
        })?;
        // Safety: the file must not be truncated while mapped. Sticker
        // directories are owned by a single run.
        let mmap = unsafe { Mmap::map(&file).map_err(|e| StampcutError::mmap_failed(display(path), e))? };
        Ok(Source::Mapped(Arc::new(mmap)))
    }

    /// Load the bytes. Mapped sources are copied; prefer [`Source::as_bytes`].
    pub fn load(&self) -> Result<Arc<Vec<u8>>> {
        match self {
            Source::Memory(data) => Ok(data.clone()),
            Source::Mapped(mmap) => Ok(Arc::new(mmap.as_ref().to_vec())),
            Source::Path(path) => {
                let data = std::fs::read(path).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        StampcutError::file_not_found(display(path))
                    } else {
                        StampcutError::file_read_failed(display(path), e)
                    }
                })?;
                Ok(Arc::new(data))
            }
        }
    }

    pub fn as_path(&self) -> Option<&PathBuf> {
        match self {
            Source::Path(p) => Some(p),
            Source::Memory(_) | Source::Mapped(_) => None,
        }
    }

    /// Bytes without copying. `None` for Path sources.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Source::Memory(data) => Some(data.as_slice()),
            Source::Mapped(mmap) => Some(mmap.as_ref()),
            Source::Path(_) => None,
        }
    }

    /// Byte length; 0 for Path sources until loaded.
    pub fn len(&self) -> usize {
        match self {
            Source::Memory(data) => data.len(),
            Source::Mapped(mmap) => mmap.len(),
            Source::Path(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn decode(&self, firewall: &FirewallConfig) -> Result<RasterImage> {
        match self.as_bytes() {
            Some(bytes) => decode_rgba(bytes, firewall),
            None => decode_rgba(&self.load()?, firewall),
        }
    }
}

/// Map and decode an image file into RGBA.
pub fn read_image(path: &Path, firewall: &FirewallConfig) -> Result<RasterImage> {
    let img = Source::map_file(path)?.decode(firewall)?;
    debug!(path = %path.display(), width = img.width(), height = img.height(), "loaded");
    Ok(img)
}

/// Write `data` to `path` through a temp file in the same directory.
///
/// The target is either fully replaced or left untouched.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut temp_file =
        NamedTempFile::new_in(dir).map_err(|e| StampcutError::file_write_failed(display(dir), e))?;
    temp_file
        .write_all(data)
        .map_err(|e| StampcutError::file_write_failed(display(path), e))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| StampcutError::file_write_failed(display(path), e))?;
    temp_file
        .persist(path)
        .map_err(|e| StampcutError::file_write_failed(display(path), e.error))?;
    Ok(())
}

/// Encode `img` with oxipng and write it atomically. Returns bytes written.
pub fn write_png(path: &Path, img: &RasterImage, preset: u8) -> Result<usize> {
    let data = encode_png(img, preset)?;
    write_atomic(path, &data)?;
    Ok(data.len())
}

/// Which files of a sticker directory a repair run touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum InputMode {
    /// `01.png`..`24.png`, `main.png`, `tab.png`
    #[default]
    Package,
    /// Every PNG except `_*` and `grid_*`
    Eco,
    All,
}

impl FromStr for InputMode {
    type Err = StampcutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "package" => Ok(InputMode::Package),
            "eco" => Ok(InputMode::Eco),
            "all" => Ok(InputMode::All),
            other => Err(StampcutError::invalid_config(
                "mode",
                other.to_string(),
                "expected package, eco or all",
            )),
        }
    }
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

/// PNG files directly inside `dir`, sorted by name.
fn list_pngs(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StampcutError::file_not_found(display(dir))
        } else {
            StampcutError::file_read_failed(display(dir), e)
        }
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| StampcutError::file_read_failed(display(dir), e))?.path();
        if path.is_file() && is_png(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| file_name(a).cmp(file_name(b)));
    Ok(files)
}

/// Files of `dir` selected by `mode`.
pub fn select_inputs(dir: &Path, mode: InputMode) -> Result<Vec<PathBuf>> {
    let files = match mode {
        InputMode::Package => {
            let mut names: Vec<String> = (1..=PACKAGE_SLOTS).map(|i| format!("{i:02}.png")).collect();
            names.push("main.png".to_string());
            names.push("tab.png".to_string());
            if !dir.is_dir() {
                return Err(StampcutError::file_not_found(display(dir)));
            }
            names
                .into_iter()
                .map(|n| dir.join(n))
                .filter(|p| p.is_file())
                .collect()
        }
        InputMode::Eco => list_pngs(dir)?
            .into_iter()
            .filter(|p| {
                let name = file_name(p);
                !name.starts_with('_') && !name.starts_with("grid_")
            })
            .collect(),
        InputMode::All => list_pngs(dir)?,
    };
    debug!(dir = %dir.display(), ?mode, count = files.len(), "selected inputs");
    Ok(files)
}

/// `grid_*.png` composites inside `dir`, sorted by name.
pub fn grid_inputs(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(list_pngs(dir)?
        .into_iter()
        .filter(|p| file_name(p).starts_with("grid_"))
        .collect())
}

/// Background color recorded in `dir/_prompts.json`, if any.
///
/// The `background_color` entry is free text; the first `#RRGGBB` in it wins.
pub fn prompts_background(dir: &Path) -> Result<Option<Color>> {
    let path = dir.join(PROMPTS_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path).map_err(|e| StampcutError::file_read_failed(display(&path), e))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| StampcutError::config_parse_failed(display(&path), e.to_string()))?;
    Ok(value
        .get("background_color")
        .and_then(|v| v.as_str())
        .and_then(Color::find_in_text))
}
