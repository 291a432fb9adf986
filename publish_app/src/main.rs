//! Command line publisher
//!
//! Reads an export config and a texture export manifest, builds the publish
//! plan and writes it to disk. Layers are dumped as RON next to the copied
//! textures; everything is staged first and moved into place on commit.
//!
//! ```text
//! publish_app <config.toml|config.ron> <manifest.ron>
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use asset_publish::config::{Config, ConfigError};
use asset_publish::error::{BackendCause, ExportError};
use asset_publish::foundation::logging;
use asset_publish::prelude::*;
use asset_publish::publish::{LayerContent, TextureCopyRequest};
use image::imageops::FilterType;
use thiserror::Error;

const UDIM_TOKEN: &str = "<UDIM>";

#[derive(Error, Debug)]
enum AppError {
    #[error("usage: publish_app <config> <manifest>")]
    Usage,

    #[error("Failed to load config: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read manifest {path:?}: {source}")]
    ManifestIo { path: PathBuf, source: io::Error },

    #[error("Invalid manifest: {0}")]
    Manifest(#[from] ron::error::SpannedError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Writes layers as RON and places texture files, staged under a scratch
/// directory until commit
///
/// Commit moves staged files into the publish one by one and remembers what
/// it replaced, so a rollback after a failed move restores the publish as it
/// was before the export.
struct PlanDumpBackend {
    staging: PathBuf,
    /// Staged file and its final destination, in write order
    staged: Vec<(PathBuf, PathBuf)>,
    /// Destinations moved in by the current commit, with the backup of the
    /// file they replaced
    committed: Vec<(PathBuf, Option<PathBuf>)>,
    /// Directories the current commit created, outermost first
    created_dirs: Vec<PathBuf>,
}

impl PlanDumpBackend {
    fn new(staging: impl Into<PathBuf>) -> Self {
        Self {
            staging: staging.into(),
            staged: Vec::new(),
            committed: Vec::new(),
            created_dirs: Vec::new(),
        }
    }

    fn stage_path(&self, destination: &Path) -> PathBuf {
        let name = destination
            .file_name()
            .map_or_else(|| "unnamed".into(), |name| name.to_string_lossy().into_owned());
        self.staging.join(format!("{:04}_{name}", self.staged.len()))
    }

    fn place_texture(&mut self, source: &Path, destination: &Path, request: &TextureCopyRequest) -> Result<(), BackendCause> {
        let staged = self.stage_path(destination);
        match request.preview {
            Some(preview) => {
                let (max_width, max_height) = preview.max_resolution;
                let img = image::open(source)?;
                let img = if img.width() > max_width || img.height() > max_height {
                    img.resize(max_width, max_height, FilterType::Lanczos3)
                } else {
                    img
                };
                // JPEG has no alpha channel
                img.to_rgb8().save_with_format(&staged, image_format(destination)?)?;
                log::debug!("Resampled {source:?} to {}x{}", img.width(), img.height());
            }
            None => {
                fs::copy(source, &staged)?;
            }
        }
        self.staged.push((staged, destination.to_path_buf()));
        Ok(())
    }

    /// Create `dir` and its missing parents, remembering which were new
    fn create_dirs(&mut self, dir: &Path) -> io::Result<()> {
        let missing: Vec<PathBuf> = dir
            .ancestors()
            .take_while(|ancestor| !ancestor.as_os_str().is_empty() && !ancestor.exists())
            .map(Path::to_path_buf)
            .collect();
        fs::create_dir_all(dir)?;
        self.created_dirs.extend(missing.into_iter().rev());
        Ok(())
    }

    fn move_into_place(&mut self, staged: &Path, destination: &Path) -> io::Result<()> {
        if let Some(parent) = destination.parent() {
            self.create_dirs(parent)?;
        }
        let backup = if destination.is_file() {
            let name = destination.file_name().unwrap_or_default().to_string_lossy();
            let backup = destination.with_file_name(format!(".{name}.backup"));
            fs::rename(destination, &backup)?;
            Some(backup)
        } else {
            None
        };
        // Recorded before the move so a rollback also restores the backup
        self.committed.push((destination.to_path_buf(), backup));

        // rename fails across file systems
        if fs::rename(staged, destination).is_err() {
            fs::copy(staged, destination)?;
            fs::remove_file(staged)?;
        }
        Ok(())
    }
}

impl SerializationBackend for PlanDumpBackend {
    fn write_layer(&mut self, path: &Path, layer: &LayerContent) -> Result<(), BackendCause> {
        fs::create_dir_all(&self.staging)?;
        let text = ron::ser::to_string_pretty(layer, ron::ser::PrettyConfig::default())?;
        let staged = self.stage_path(path);
        fs::write(&staged, text)?;
        self.staged.push((staged, path.to_path_buf()));
        Ok(())
    }

    fn relocate_texture(&mut self, request: &TextureCopyRequest) -> Result<(), BackendCause> {
        fs::create_dir_all(&self.staging)?;
        let tiles = expand_udim(&request.source, &request.destination)?;
        if tiles.is_empty() {
            return Err(format!("no UDIM tiles found for {:?}", request.source).into());
        }
        for (source, destination) in tiles {
            self.place_texture(&source, &destination, request)?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), BackendCause> {
        let staged = std::mem::take(&mut self.staged);
        for (staged_file, destination) in &staged {
            self.move_into_place(staged_file, destination)?;
            log::info!("Wrote {destination:?}");
        }

        for (_, backup) in self.committed.drain(..) {
            if let Some(backup) = backup {
                if let Err(e) = fs::remove_file(&backup) {
                    log::warn!("Failed to remove backup {backup:?}: {e}");
                }
            }
        }
        self.created_dirs.clear();
        if self.staging.exists() {
            fs::remove_dir_all(&self.staging)?;
        }
        Ok(())
    }

    fn rollback(&mut self) {
        self.staged.clear();
        for (destination, backup) in self.committed.drain(..).rev() {
            if let Err(e) = fs::remove_file(&destination) {
                if e.kind() != io::ErrorKind::NotFound {
                    log::warn!("Failed to remove {destination:?}: {e}");
                }
            }
            if let Some(backup) = backup {
                if let Err(e) = fs::rename(&backup, &destination) {
                    log::warn!("Failed to restore {destination:?}: {e}");
                }
            }
        }
        for dir in self.created_dirs.drain(..).rev() {
            // Only empty directories go; anything else was not ours
            fs::remove_dir(&dir).ok();
        }
        if let Err(e) = fs::remove_dir_all(&self.staging) {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!("Failed to clean staging directory {:?}: {e}", self.staging);
            }
        }
    }
}

fn image_format(path: &Path) -> Result<image::ImageFormat, BackendCause> {
    image::ImageFormat::from_path(path).map_err(|e| BackendCause::from(format!("unsupported texture format for {path:?}: {e}")))
}

/// Tile number when `name` is `prefix` + four digits + `suffix`
fn udim_tile<'a>(name: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    let tile = name.strip_prefix(prefix)?.strip_suffix(suffix)?;
    (tile.len() == 4 && tile.bytes().all(|b| b.is_ascii_digit())).then_some(tile)
}

/// Every concrete `(source, destination)` pair behind a possibly tiled path
fn expand_udim(source: &Path, destination: &Path) -> io::Result<Vec<(PathBuf, PathBuf)>> {
    let name = source.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let Some((prefix, suffix)) = name.split_once(UDIM_TOKEN) else {
        return Ok(vec![(source.to_path_buf(), destination.to_path_buf())]);
    };

    let dir = source.parent().unwrap_or_else(|| Path::new("."));
    let destination = destination.to_string_lossy();
    let mut tiles: Vec<(PathBuf, PathBuf)> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let tile = udim_tile(&file_name, prefix, suffix)?;
            Some((entry.path(), PathBuf::from(destination.replace(UDIM_TOKEN, tile))))
        })
        .collect();
    tiles.sort();
    Ok(tiles)
}

fn run(config_path: &Path, manifest_path: &Path) -> Result<(), AppError> {
    let config = ExportConfig::load_from_file(config_path)?;
    let manifest = fs::read_to_string(manifest_path).map_err(|source| AppError::ManifestIo {
        path: manifest_path.to_path_buf(),
        source,
    })?;
    let export: TextureExport = ron::from_str(&manifest)?;

    log::info!(
        "Publishing '{}' from {} texture(s) to {:?}",
        config.asset_name,
        export.textures.len(),
        config.resolved_publish_root()
    );

    let staging = std::env::temp_dir().join(format!("asset_publish-{}", std::process::id()));
    let mut backend = PlanDumpBackend::new(staging);
    let plan = publish(&export, &config, &mut backend)?;

    log::info!(
        "Published {} material(s), {} texture file(s) at {:?}",
        plan.material_layer.materials.len(),
        plan.texture_relocation_map.len(),
        plan.entry_file.path
    );
    Ok(())
}

fn main() -> ExitCode {
    logging::init_with_level(log::LevelFilter::Info);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.as_slice() {
        [config, manifest] => run(Path::new(config), Path::new(manifest)),
        _ => Err(AppError::Usage),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fresh directory under the system temp dir
    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("publish_app_{name}_{}", std::process::id()));
        fs::remove_dir_all(&dir).ok();
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn roughness_export(root: &Path) -> TextureExport {
        let source = root.join("Body_Roughness.png");
        fs::write(&source, b"not really a png").unwrap();
        TextureExport::new(vec![RawTexture::new("Body", "", source)])
    }

    fn arnold_only(root: &Path) -> ExportConfig {
        ExportConfig::new("Asset", root.join("publish")).with_backends(BackendFlags::ARNOLD)
    }

    #[test]
    fn test_failed_commit_leaves_no_partial_publish() {
        let root = scratch("failed_commit");
        let asset_dir = root.join("publish/Asset");
        fs::create_dir_all(asset_dir.join("mtl.usdc/keep")).unwrap();

        let mut backend = PlanDumpBackend::new(root.join("staging"));
        let result = publish(&roughness_export(&root), &arnold_only(&root), &mut backend);

        assert!(matches!(result, Err(ExportError::SerializationBackend { .. })));
        assert!(!asset_dir.join("textures/Body_Roughness.png").exists());
        assert!(!asset_dir.join("textures").exists());
        assert!(asset_dir.join("mtl.usdc/keep").exists());
        assert!(!root.join("staging").exists());
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_failed_commit_restores_replaced_files() {
        let root = scratch("restore");
        let asset_dir = root.join("publish/Asset");
        fs::create_dir_all(asset_dir.join("payload.usdc/keep")).unwrap();
        fs::write(asset_dir.join("mtl.usdc"), "previous").unwrap();

        let mut backend = PlanDumpBackend::new(root.join("staging"));
        assert!(publish(&roughness_export(&root), &arnold_only(&root), &mut backend).is_err());

        assert_eq!(fs::read_to_string(asset_dir.join("mtl.usdc")).unwrap(), "previous");
        assert!(!asset_dir.join(".mtl.usdc.backup").exists());
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_successful_publish_writes_every_file() {
        let root = scratch("success");
        let asset_dir = root.join("publish/Asset");
        fs::create_dir_all(&asset_dir).unwrap();
        fs::write(asset_dir.join("mtl.usdc"), "previous").unwrap();

        let mut backend = PlanDumpBackend::new(root.join("staging"));
        publish(&roughness_export(&root), &arnold_only(&root), &mut backend).unwrap();

        for file in ["Asset.usd", "payload.usdc", "mtl.usdc", "textures/Body_Roughness.png"] {
            assert!(asset_dir.join(file).is_file(), "missing {file}");
        }
        assert_ne!(fs::read_to_string(asset_dir.join("mtl.usdc")).unwrap(), "previous");
        assert!(!asset_dir.join(".mtl.usdc.backup").exists());
        assert!(!root.join("staging").exists());
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_preview_copy_of_tga_is_downscaled() {
        let root = scratch("preview_tga");
        let source = root.join("Body_BaseColor.tga");
        image::RgbImage::from_pixel(4, 4, image::Rgb([200, 40, 40])).save(&source).unwrap();

        let mut config = ExportConfig::new("Asset", root.join("publish")).with_backends(BackendFlags::PREVIEW);
        config.preview_texture_max_resolution = (2, 2);
        let export = TextureExport::new(vec![RawTexture::new("Body", "", &source)]);

        let mut backend = PlanDumpBackend::new(root.join("staging"));
        publish(&export, &config, &mut backend).unwrap();

        let textures = root.join("publish/Asset/textures");
        assert!(textures.join("Body_BaseColor.tga").is_file());
        let preview = textures.join("previewTextures/Body_BaseColor.jpg");
        assert_eq!(image::image_dimensions(&preview).unwrap(), (2, 2));
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_udim_tile_matching() {
        assert_eq!(udim_tile("skin_BaseColor.1001.png", "skin_BaseColor.", ".png"), Some("1001"));
        assert_eq!(udim_tile("skin_BaseColor.101.png", "skin_BaseColor.", ".png"), None);
        assert_eq!(udim_tile("skin_BaseColor.abcd.png", "skin_BaseColor.", ".png"), None);
        assert_eq!(udim_tile("other.1001.png", "skin_BaseColor.", ".png"), None);
    }

    #[test]
    fn test_plain_path_is_not_expanded() {
        let pairs = expand_udim(Path::new("/tmp/a.png"), Path::new("/out/a.png")).unwrap();
        assert_eq!(pairs, vec![(PathBuf::from("/tmp/a.png"), PathBuf::from("/out/a.png"))]);
    }
}
