use super::Result;
use geo::Coord;
use mapsend_lib::{Config, Element, Layer, LayerMode, TextSlot};
use std::path::Path;

fn at(c: Coord<f64>) -> String {
    format!("({:.6}, {:.6})", c.x, c.y)
}

fn text(slot: Option<TextSlot>) -> String {
    match slot {
        Some(s) => format!(" text {}:{}", s.offset(), s.index()),
        None => String::new(),
    }
}

/// One line describing an element.
pub fn describe(element: &Element) -> String {
    match element {
        Element::Point(p) => format!("point {} type {}{}", at(p.coord), p.objtype, text(p.textslot)),
        Element::Label(l) => format!("label {}{}", at(l.coord), text(l.textslot)),
        Element::Poi(p) => format!(
            "poi {} category {}/{}{}",
            at(p.coord),
            p.category,
            p.subcategory,
            text(p.textslot)
        ),
        Element::Area(a) => format!(
            "area of {} rings, {} vertices, type {}{}",
            a.rings.len(),
            element.vertex_count(),
            a.objtype,
            text(a.textslot)
        ),
        Element::Polyline(p) => format!(
            "polyline of {} vertices from {} type {}{}",
            p.line.0.len(),
            p.line.0.first().copied().map(at).unwrap_or_default(),
            p.objtype,
            text(p.textslot)
        ),
        Element::RoutingEdge(e) => format!(
            "edge {} -> {} distance {} via ({}, {}) vertices {}..{}",
            at(e.start),
            at(e.end),
            e.distance,
            e.cellnum_ref,
            e.index_ref,
            e.vertices.0,
            e.vertices.1
        ),
    }
}

pub fn lines(dir: &Path, filename: &str, limit: Option<usize>) -> Result<Vec<String>> {
    let mut layer = Layer::open(dir, filename, LayerMode::Read, Config::default())?;
    let entries = layer.elements_and_refs()?;
    let limit = limit.unwrap_or(entries.len());
    Ok(entries
        .iter()
        .take(limit)
        .map(|(cellref, element)| format!("{cellref} {}", describe(element)))
        .collect())
}

pub fn run(dir: &Path, filename: &str, limit: Option<usize>) -> Result<()> {
    for line in lines(dir, filename, limit)? {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Rect, coord, line_string};
    use mapsend_lib::{LayerType, PolylineElement};
    use tempfile::TempDir;

    #[test]
    fn test_dump_lists_references_in_cell_order() {
        let dir = TempDir::new().unwrap();
        let area = Rect::new(coord! { x: 5.0, y: 45.0 }, coord! { x: 6.0, y: 46.0 });
        let mut layer =
            Layer::create(dir.path(), "roads", "roads", LayerType::Polyline, Some(area), Config::default())
                .unwrap();
        layer.set_nlevels(2).unwrap();
        for i in 0..3 {
            let x = 5.1 + i as f64 * 0.3;
            let line = PolylineElement::new(line_string![(x: x, y: 45.1), (x: x + 0.0005, y: 45.1005)]).unwrap();
            layer.add_element(Element::Polyline(line)).unwrap();
        }
        layer.close().unwrap();

        let all = lines(dir.path(), "roads", None).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|l| l.contains("polyline of 2 vertices")));
        assert_eq!(lines(dir.path(), "roads", Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_describe_point_text() {
        let mut p = mapsend_lib::PointElement::new(coord! { x: 1.5, y: -2.25 });
        p.textslot = Some(TextSlot::new(1, 42).unwrap());
        assert_eq!(
            describe(&Element::Point(p)),
            "point (1.500000, -2.250000) type 0 text 1:42"
        );
    }
}
