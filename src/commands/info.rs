use super::Result;
use mapsend_lib::{Config, Layer, LayerMode};
use std::path::Path;

/// Layer summary followed by the header format version.
pub fn summary(dir: &Path, filename: &str) -> Result<String> {
    let layer = Layer::open(dir, filename, LayerMode::Read, Config::default())?;
    let mut text = layer.to_string();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    match layer.check() {
        Ok(version) => text.push_str(&format!("Header format version: {version}\n")),
        Err(e) => {
            tracing::warn!("Layer {filename}: {e}");
            text.push_str("Header format version: none (inconsistent boxes)\n");
        }
    }
    Ok(text)
}

pub fn run(dir: &Path, filename: &str) -> Result<()> {
    print!("{}", summary(dir, filename)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ToolError;
    use geo::{Rect, coord};
    use mapsend_lib::{Element, LayerType, MapError, PointElement};
    use tempfile::TempDir;

    #[test]
    fn test_summary_of_written_layer() {
        let dir = TempDir::new().unwrap();
        let area = Rect::new(coord! { x: 5.0, y: 45.0 }, coord! { x: 6.0, y: 46.0 });
        let mut layer =
            Layer::create(dir.path(), "Peaks", "peaks", LayerType::Point, Some(area), Config::default())
                .unwrap();
        layer
            .add_element(Element::Point(PointElement::new(coord! { x: 5.5, y: 45.5 })))
            .unwrap();
        layer.close().unwrap();

        let text = summary(dir.path(), "peaks").unwrap();
        assert!(text.contains("Name: peaks"));
        assert!(text.ends_with("Header format version: 1\n"));
    }

    #[test]
    fn test_summary_of_missing_layer() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            summary(dir.path(), "none"),
            Err(ToolError::Map(MapError::Io(_)))
        ));
    }
}
