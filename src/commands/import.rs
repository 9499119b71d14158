use super::{Result, ToolError};
use geo::{Coord, LineString};
use mapsend_lib::codec::chain::{self, MAX_VERTICES};
use mapsend_lib::{
    Config, CoordinateSystem, Element, Layer, LayerType, MemoryTextTable, PointElement,
    PolylineElement, TextTable,
};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

pub const TRACKS_FILENAME: &str = "tracks";
pub const WAYPOINTS_FILENAME: &str = "wpts";
pub const NAMES_FILENAME: &str = "names.txt";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub polylines: usize,
    pub waypoints: usize,
    pub names: usize,
}

fn read_gpx(path: &Path) -> Result<gpx::Gpx> {
    let reader = BufReader::new(File::open(path)?);
    gpx::read(reader).map_err(|source| ToolError::Gpx {
        path: path.display().to_string(),
        source,
    })
}

/// Steps between two track points once discretised.
fn steps(coords: &CoordinateSystem, a: Coord<f64>, b: Coord<f64>) -> usize {
    chain::step_count(coords.to_discrete(b) - coords.to_discrete(a))
}

/// Add evenly spaced points to gaps too long for a single chain.
fn fill_gaps(points: &[Coord<f64>], coords: &CoordinateSystem) -> Vec<Coord<f64>> {
    let mut out = Vec::with_capacity(points.len());
    for (i, &p) in points.iter().enumerate() {
        if let Some(&prev) = i.checked_sub(1).and_then(|j| points.get(j)) {
            let pieces = steps(coords, prev, p).div_ceil(MAX_VERTICES / 2);
            out.extend((1..pieces).map(|k| prev + (p - prev) * (k as f64 / pieces as f64)));
        }
        out.push(p);
    }
    out
}

/// Split a segment into polylines whose stored chains, synthetic vertices included, fit in
/// one record. Consecutive parts share a vertex.
fn split_segment(points: &[Coord<f64>], coords: &CoordinateSystem) -> Vec<LineString<f64>> {
    if points.len() < 2 {
        return Vec::new();
    }
    let points = fill_gaps(points, coords);
    let mut parts = Vec::new();
    let (mut start, mut nvertices) = (0, 1);
    for i in 1..points.len() {
        let n = steps(coords, points[i - 1], points[i]);
        if nvertices + n > MAX_VERTICES && i - 1 > start {
            parts.push(LineString::from(points[start..i].to_vec()));
            (start, nvertices) = (i - 1, 1);
        }
        nvertices += n;
    }
    parts.push(LineString::from(points[start..].to_vec()));
    parts
}

fn write_layer(
    dir: &Path,
    name: &str,
    filename: &str,
    kind: LayerType,
    elements: Vec<Element>,
    config: &Config,
) -> Result<()> {
    let mut layer = Layer::create(dir, name, filename, kind, None, config.clone())?;
    for element in elements {
        layer.add_element(element)?;
    }
    let remap = layer.optimize()?;
    tracing::info!(
        "Layer {name}: {} elements re-bucketed into {} cells over {} levels",
        remap.len(),
        layer.ncells(),
        layer.nlevels()
    );
    layer.close()?;
    Ok(())
}

pub fn import(paths: &[impl AsRef<Path>], out: &Path, config: &Config) -> Result<ImportSummary> {
    let coords = CoordinateSystem::new(config.refpoint, config.scale);
    let mut names = MemoryTextTable::new(0);
    let mut tracks = Vec::new();
    let mut waypoints = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let data = read_gpx(path)?;
        tracing::debug!(
            "{}: {} tracks, {} waypoints",
            path.display(),
            data.tracks.len(),
            data.waypoints.len()
        );
        for track in &data.tracks {
            let textslot = match &track.name {
                Some(name) => Some(names.append_text(name)?),
                None => None,
            };
            for segment in &track.segments {
                let points: Vec<Coord<f64>> = segment.points.iter().map(|w| w.point().0).collect();
                for line in split_segment(&points, &coords) {
                    let mut polyline = PolylineElement::new(line)?;
                    polyline.textslot = textslot;
                    tracks.push(Element::Polyline(polyline));
                }
            }
        }
        for waypoint in &data.waypoints {
            let mut point = PointElement::new(waypoint.point().0);
            if let Some(name) = &waypoint.name {
                point.textslot = Some(names.append_text(name)?);
            }
            waypoints.push(Element::Point(point));
        }
    }

    if tracks.is_empty() && waypoints.is_empty() {
        return Err(ToolError::NothingToImport);
    }
    fs::create_dir_all(out)?;
    let summary = ImportSummary {
        polylines: tracks.len(),
        waypoints: waypoints.len(),
        names: names.len(),
    };
    if !tracks.is_empty() {
        write_layer(out, "Tracks", TRACKS_FILENAME, LayerType::Polyline, tracks, config)?;
    }
    if !waypoints.is_empty() {
        write_layer(out, "Waypoints", WAYPOINTS_FILENAME, LayerType::Point, waypoints, config)?;
    }

    let mut listing = String::new();
    for i in 0..names.len() as u32 {
        if let Some(text) = names.lookup_text(mapsend_lib::TextSlot::new(0, i)?) {
            listing.push_str(&format!("{i}\t{text}\n"));
        }
    }
    fs::write(out.join(NAMES_FILENAME), listing)?;
    Ok(summary)
}

pub fn run(paths: &[impl AsRef<Path>], out: &Path, config: &Config) -> Result<()> {
    let summary = import(paths, out, config)?;
    tracing::info!(
        "Imported {} polylines and {} waypoints with {} names into {}",
        summary.polylines,
        summary.waypoints,
        summary.names,
        out.display()
    );
    Ok(())
}
