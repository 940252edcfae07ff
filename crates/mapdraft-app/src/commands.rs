//! Command implementations.

use crate::cli::RenderArgs;
use crate::error::{AppError, AppResult};
use crate::host::HeadlessHost;
use chrono::Utc;
use kurbo::Size;
use mapdraft_core::storage::{DocumentStore, FileStore, StoredMap};
use mapdraft_core::{
    Composition, Document, DocumentError, HeadlessSurface, ImportReport, export_document,
    import_json,
};
use mapdraft_render::{ExportConfig, MapExporter, SettleStrategy, decode_raster, encode_png};
use std::fs;
use std::path::Path;

fn read(path: &Path) -> AppResult<String> {
    fs::read_to_string(path).map_err(|e| AppError::io(path, e))
}

/// Import a document file into a fresh composition.
fn load(path: &Path) -> AppResult<(Composition, ImportReport, String)> {
    let json = read(path)?;
    let mut comp = Composition::new();
    let mut surface = HeadlessSurface::new();
    let report = import_json(&mut comp, &json, &mut surface)?;
    log::info!(
        "Imported {} geometries from {} ({} skipped)",
        report.imported.len(),
        path.display(),
        report.skipped.len()
    );
    Ok((comp, report, json))
}

fn load_config(path: Option<&Path>) -> AppResult<ExportConfig> {
    match path {
        Some(path) => serde_json::from_str(&read(path)?).map_err(AppError::Config),
        None => Ok(ExportConfig::default()),
    }
}

pub fn render(args: &RenderArgs) -> AppResult<()> {
    let (mut comp, _, _) = load(&args.document)?;

    let mut config = load_config(args.config.as_deref())?;
    // Nothing to snapshot and nothing to wait for without a live map.
    config.cors_safe_tiles.clear();
    config.settle = SettleStrategy::Callback;

    if args.width.is_some() || args.height.is_some() {
        let current = comp.view().size;
        let size = Size::new(
            args.width.unwrap_or(current.width),
            args.height.unwrap_or(current.height),
        );
        let view = comp.view().clone().with_size(size);
        comp.set_view(view)?;
    }

    let capture_size = comp
        .view()
        .clone()
        .with_pixel_ratio(config.pixel_ratio)
        .capture_size();
    let mut host = HeadlessHost::new(capture_size, config.background_color);
    if let Some(base) = &args.base {
        let bytes = fs::read(base).map_err(|e| AppError::io(base, e))?;
        host = host.with_base(decode_raster(&bytes)?);
    }

    let exporter = MapExporter::new(config);
    let pixmap = exporter.export(&mut comp, &mut host)?;
    let png = encode_png(&pixmap)?;
    fs::write(&args.output, png).map_err(|e| AppError::io(&args.output, e))?;
    println!(
        "Wrote {}x{} map to {}",
        pixmap.width(),
        pixmap.height(),
        args.output.display()
    );
    Ok(())
}

/// Outcome of `check`.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckSummary {
    pub imported: usize,
    pub skipped: usize,
    pub warnings: usize,
    /// Re-exporting reproduces the input, timestamps aside.
    pub matches_input: Option<bool>,
    /// A second import/export cycle changes nothing.
    pub stable: bool,
}

pub fn check(document: &Path) -> AppResult<CheckSummary> {
    let (comp, report, json) = load(document)?;
    for skipped in &report.skipped {
        println!(
            "skipped geometry #{} (id {}): {}",
            skipped.index,
            skipped
                .id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "?".to_string()),
            skipped.reason
        );
    }
    for warning in &report.warnings {
        println!("warning: {}", warning);
    }

    let exported = export_document(&comp, Utc::now());
    let matches_input = match Document::from_json(&json) {
        Ok(original) => Some(original.without_timestamp() == exported.without_timestamp()),
        Err(e) => {
            log::info!("Input is not a strict document ({}), skipping comparison", e);
            None
        }
    };

    let mut again = Composition::new();
    let mut surface = HeadlessSurface::new();
    let json = exported.to_json().map_err(DocumentError::from)?;
    let second = import_json(&mut again, &json, &mut surface)?;
    let reexported = export_document(&again, Utc::now());
    let stable = second.is_complete() && reexported.without_timestamp() == exported.without_timestamp();

    let summary = CheckSummary {
        imported: report.imported.len(),
        skipped: report.skipped.len(),
        warnings: report.warnings.len(),
        matches_input,
        stable,
    };
    println!(
        "{} imported, {} skipped, {} warnings; round-trip {}",
        summary.imported,
        summary.skipped,
        summary.warnings,
        if stable { "stable" } else { "NOT stable" }
    );
    match matches_input {
        Some(true) => println!("re-export matches the input"),
        Some(false) => println!("re-export differs from the input"),
        None => {}
    }
    if stable { Ok(summary) } else { Err(AppError::Unstable) }
}

fn open_store(store: Option<&Path>) -> AppResult<FileStore> {
    Ok(match store {
        Some(dir) => FileStore::new(dir.to_path_buf())?,
        None => FileStore::default_location()?,
    })
}

/// Normalize a document through an import and save it. Returns its id.
pub fn save(document: &Path, store: Option<&Path>) -> AppResult<String> {
    let (comp, report, _) = load(document)?;
    if !report.is_complete() {
        log::warn!("{} geometries were dropped while importing", report.skipped.len());
    }
    let doc = export_document(&comp, Utc::now());
    let store = open_store(store)?;
    let id = pollster::block_on(store.save(&doc))?;
    println!("Saved {} to {}", id, store.base_path().display());
    Ok(id)
}

pub fn list(store: Option<&Path>) -> AppResult<Vec<StoredMap>> {
    let store = open_store(store)?;
    let maps = pollster::block_on(store.list())?;
    for map in &maps {
        println!(
            "{}\t{}\t{} geometries\t{}",
            map.id,
            if map.title.is_empty() { "(untitled)" } else { map.title.as_str() },
            map.geometry_count,
            map.export_date
        );
    }
    Ok(maps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapdraft_core::{ArrowType, DrawAction, LatLng, MarkerShape, Meters};
    use std::path::PathBuf;

    fn sample_document(dir: &Path) -> PathBuf {
        let mut surface = HeadlessSurface::new();
        let mut comp = Composition::new();
        let view = comp.view().clone().with_size(Size::new(120.0, 80.0));
        comp.set_view(view).unwrap();
        let center = comp.view().center;
        comp.draw(
            DrawAction::Marker {
                position: center,
                shape: MarkerShape::Hexagon,
                size: None,
            },
            &mut surface,
        )
        .unwrap();
        comp.draw(
            DrawAction::Polyline {
                vertices: vec![center, LatLng::new(center.lat + 0.5, center.lng + 0.5)],
                arrow: ArrowType::Both,
            },
            &mut surface,
        )
        .unwrap();
        comp.draw(
            DrawAction::Circle {
                center,
                radius: Meters(20_000.0),
            },
            &mut surface,
        )
        .unwrap();
        comp.set_title("Sortie").unwrap();
        let part = comp.add_part("Points").unwrap();
        comp.assign_to_part(mapdraft_core::GeometryId(1), Some(&part))
            .unwrap();

        let path = dir.join("map.json");
        let json = export_document(&comp, Utc::now()).to_json().unwrap();
        fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn test_render_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let document = sample_document(dir.path());
        let output = dir.path().join("map.png");
        let config = dir.path().join("config.json");
        fs::write(&config, r#"{"pixel_ratio": 1.0}"#).unwrap();

        render(&RenderArgs {
            document,
            output: output.clone(),
            width: None,
            height: None,
            config: Some(config),
            base: None,
        })
        .unwrap();

        let bytes = fs::read(&output).unwrap();
        let pixmap = decode_raster(&bytes).unwrap();
        // 120 x 80 view plus the 80 px title band.
        assert_eq!((pixmap.width(), pixmap.height()), (120, 160));
    }

    #[test]
    fn test_render_size_override() {
        let dir = tempfile::tempdir().unwrap();
        let document = sample_document(dir.path());
        let output = dir.path().join("wide.png");
        render(&RenderArgs {
            document,
            output: output.clone(),
            width: Some(200.0),
            height: None,
            config: None,
            base: None,
        })
        .unwrap();
        let pixmap = decode_raster(&fs::read(&output).unwrap()).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (400, 240));
    }

    #[test]
    fn test_bad_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let document = sample_document(dir.path());
        let config = dir.path().join("config.json");
        fs::write(&config, "{ not json").unwrap();
        let err = render(&RenderArgs {
            document,
            output: dir.path().join("x.png"),
            width: None,
            height: None,
            config: Some(config),
            base: None,
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_check_exported_document_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let document = sample_document(dir.path());
        let summary = check(&document).unwrap();
        assert_eq!(summary.imported, 3);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.matches_input, Some(true));
        assert!(summary.stable);
    }

    #[test]
    fn test_missing_document() {
        let err = check(Path::new("/nonexistent/mapdraft/doc.json")).unwrap_err();
        assert!(matches!(err, AppError::Io { .. }));
    }

    #[test]
    fn test_save_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let document = sample_document(dir.path());
        let store_dir = dir.path().join("store");
        let id = save(&document, Some(&store_dir)).unwrap();
        assert!(id.starts_with("carte_Sortie_"));
        assert!(store_dir.join(format!("{}.json", id)).exists());
        let maps = list(Some(&store_dir)).unwrap();
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].id, id);
        assert_eq!(maps[0].title, "Sortie");
        assert_eq!(maps[0].geometry_count, 3);
    }
}
