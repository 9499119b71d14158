//! Storage strategies backing a [`Cell`](super::Cell)

use crate::codec::{self, ByteWriter, CellFrame};
use crate::element::{Element, LayerType};
use crate::{MapError, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

/// Ordered record storage of one cell.
///
/// Indices are positions in insertion order; `pop` shifts later records down by one.
pub trait CellStore: std::fmt::Debug {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a record and return its index
    fn append(&mut self, element: Element) -> Result<usize>;

    fn get(&self, index: usize) -> Result<Element>;

    fn update(&mut self, index: usize, element: Element) -> Result<()>;

    /// Remove and return the record at `index`
    fn pop(&mut self, index: usize) -> Result<Element>;

    fn all(&self) -> Result<Vec<Element>>;

    /// Append the framed records of this store to `out`.
    fn write_records(&self, frame: &CellFrame, out: &mut ByteWriter) -> Result<()> {
        for element in self.all()? {
            codec::write_record(&element, frame, out)?;
        }
        Ok(())
    }
}

fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(MapError::IndexOutOfRange { index, len })
    }
}

/// Records kept as values in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    elements: Vec<Element>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CellStore for InMemoryStore {
    fn len(&self) -> usize {
        self.elements.len()
    }

    fn append(&mut self, element: Element) -> Result<usize> {
        self.elements.push(element);
        Ok(self.elements.len() - 1)
    }

    fn get(&self, index: usize) -> Result<Element> {
        self.elements
            .get(index)
            .cloned()
            .ok_or(MapError::IndexOutOfRange {
                index,
                len: self.elements.len(),
            })
    }

    fn update(&mut self, index: usize, element: Element) -> Result<()> {
        check_index(index, self.elements.len())?;
        self.elements[index] = element;
        Ok(())
    }

    fn pop(&mut self, index: usize) -> Result<Element> {
        check_index(index, self.elements.len())?;
        Ok(self.elements.remove(index))
    }

    fn all(&self) -> Result<Vec<Element>> {
        Ok(self.elements.clone())
    }
}

/// Framed records spooled to an anonymous temporary file.
///
/// The file is removed by the OS when the store is dropped. Records are encoded on
/// append, so the cell frame must be final; updating in place is not supported.
#[derive(Debug)]
pub struct TempFileStore {
    file: File,
    frame: CellFrame,
    kind: LayerType,
    count: usize,
}

impl TempFileStore {
    pub fn new(frame: CellFrame, kind: LayerType) -> Result<Self> {
        Ok(Self {
            file: tempfile::tempfile()?,
            frame,
            kind,
            count: 0,
        })
    }

    fn read_all_bytes(&self) -> Result<Vec<u8>> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(0))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Framed records of the spool, size field included.
    fn records<'a>(&self, data: &'a [u8]) -> Result<Vec<&'a [u8]>> {
        let mut r = self.frame.reader(data);
        (0..self.count)
            .map(|_| -> Result<&'a [u8]> {
                let start = data.len() - r.remaining();
                codec::read_record(&mut r)?;
                Ok(&data[start..data.len() - r.remaining()])
            })
            .collect()
    }

    fn decode_framed(&self, framed: &[u8]) -> Result<Element> {
        let mut r = self.frame.reader(framed);
        codec::decode_element(self.kind, &self.frame, codec::read_record(&mut r)?)
    }
}

impl CellStore for TempFileStore {
    fn len(&self) -> usize {
        self.count
    }

    fn append(&mut self, element: Element) -> Result<usize> {
        let mut w = self.frame.writer();
        codec::write_record(&element, &self.frame, &mut w)?;
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&w.into_inner())?;
        self.count += 1;
        Ok(self.count - 1)
    }

    fn get(&self, index: usize) -> Result<Element> {
        check_index(index, self.count)?;
        let data = self.read_all_bytes()?;
        let records = self.records(&data)?;
        self.decode_framed(records[index])
    }

    fn update(&mut self, _index: usize, _element: Element) -> Result<()> {
        Err(MapError::UnsupportedOperation(
            "updating a record of a spooled cell",
        ))
    }

    fn pop(&mut self, index: usize) -> Result<Element> {
        check_index(index, self.count)?;
        let data = self.read_all_bytes()?;
        let records = self.records(&data)?;
        let popped = self.decode_framed(records[index])?;
        // The spool is only replaced once every remaining record is copied
        let mut file = tempfile::tempfile()?;
        for (_, framed) in records.iter().enumerate().filter(|&(i, _)| i != index) {
            file.write_all(framed)?;
        }
        file.flush()?;
        self.file = file;
        self.count -= 1;
        Ok(popped)
    }

    fn all(&self) -> Result<Vec<Element>> {
        let data = self.read_all_bytes()?;
        let mut r = self.frame.reader(&data);
        (0..self.count)
            .map(|_| codec::decode_element(self.kind, &self.frame, codec::read_record(&mut r)?))
            .collect()
    }

    fn write_records(&self, _frame: &CellFrame, out: &mut ByteWriter) -> Result<()> {
        out.bytes(&self.read_all_bytes()?);
        Ok(())
    }
}

/// Key namespace of a [`KeyedStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpace {
    /// The store owns its database
    Own,
    /// Keys are `"cellnum/n"` inside a database shared by the layer
    Shared(u32),
}

/// Records serialized into a `sled` key-value store.
#[derive(Debug)]
pub struct KeyedStore {
    db: sled::Db,
    space: KeySpace,
    keys: Vec<u64>,
    next_key: u64,
}

impl KeyedStore {
    /// Store with its own temporary database, removed on drop.
    pub fn per_cell() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self::with_db(db, KeySpace::Own))
    }

    /// Store inside a layer-wide database.
    pub fn shared(db: sled::Db, cellnum: u32) -> Self {
        Self::with_db(db, KeySpace::Shared(cellnum))
    }

    fn with_db(db: sled::Db, space: KeySpace) -> Self {
        Self {
            db,
            space,
            keys: Vec::new(),
            next_key: 0,
        }
    }

    fn key(&self, n: u64) -> String {
        match self.space {
            KeySpace::Own => n.to_string(),
            KeySpace::Shared(cellnum) => format!("{cellnum}/{n}"),
        }
    }

    fn load(&self, n: u64) -> Result<Element> {
        let key = self.key(n);
        let value = self
            .db
            .get(key.as_bytes())?
            .ok_or_else(|| MapError::InvalidIndex(format!("missing store key {key}")))?;
        Ok(serde_json::from_slice(&value)?)
    }

    fn store(&self, n: u64, element: &Element) -> Result<()> {
        self.db
            .insert(self.key(n).as_bytes(), serde_json::to_vec(element)?)?;
        Ok(())
    }
}

impl CellStore for KeyedStore {
    fn len(&self) -> usize {
        self.keys.len()
    }

    fn append(&mut self, element: Element) -> Result<usize> {
        let n = self.next_key;
        self.store(n, &element)?;
        self.next_key += 1;
        self.keys.push(n);
        Ok(self.keys.len() - 1)
    }

    fn get(&self, index: usize) -> Result<Element> {
        check_index(index, self.keys.len())?;
        self.load(self.keys[index])
    }

    fn update(&mut self, index: usize, element: Element) -> Result<()> {
        check_index(index, self.keys.len())?;
        self.store(self.keys[index], &element)
    }

    fn pop(&mut self, index: usize) -> Result<Element> {
        check_index(index, self.keys.len())?;
        let element = self.load(self.keys[index])?;
        let n = self.keys.remove(index);
        self.db.remove(self.key(n).as_bytes())?;
        Ok(element)
    }

    fn all(&self) -> Result<Vec<Element>> {
        self.keys.iter().map(|&n| self.load(n)).collect()
    }
}

impl Drop for KeyedStore {
    fn drop(&mut self) {
        if let KeySpace::Shared(cellnum) = self.space {
            for &n in &self.keys {
                if let Err(e) = self.db.remove(self.key(n).as_bytes()) {
                    tracing::warn!("Failed to release record {n} of cell {cellnum}: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Endian;
    use crate::coords::CoordinateSystem;
    use crate::element::PointElement;
    use geo::{Rect, coord};

    fn frame() -> CellFrame {
        CellFrame::new(
            Rect::new(coord! { x: 0, y: -10_000_000 }, coord! { x: 4_000_000, y: 0 }),
            CoordinateSystem::default(),
            Endian::Little,
        )
    }

    fn point(i: usize) -> Element {
        let mut p = PointElement::new(coord! { x: 10.0 + i as f64 * 0.01, y: 55.0 });
        p.objtype = i as u8;
        Element::Point(p)
    }

    fn objtype(e: &Element) -> u8 {
        match e {
            Element::Point(p) => p.objtype,
            _ => panic!("expected a point"),
        }
    }

    /// Contract shared by every strategy except for update support
    fn exercise(store: &mut dyn CellStore) {
        for i in 0..5 {
            assert_eq!(store.append(point(i)).unwrap(), i);
        }
        assert_eq!(store.len(), 5);
        assert_eq!(objtype(&store.get(4).unwrap()), 4);
        assert_eq!(objtype(&store.get(1).unwrap()), 1);
        assert_eq!(objtype(&store.pop(1).unwrap()), 1);
        assert_eq!(store.len(), 4);
        let kinds: Vec<u8> = store.all().unwrap().iter().map(objtype).collect();
        assert_eq!(kinds, vec![0, 2, 3, 4]);
        assert!(matches!(
            store.get(9),
            Err(MapError::IndexOutOfRange { index: 9, len: 4 })
        ));
    }

    #[test]
    fn test_in_memory_store() {
        let mut store = InMemoryStore::new();
        exercise(&mut store);
        store.update(0, point(7)).unwrap();
        assert_eq!(objtype(&store.get(0).unwrap()), 7);
    }

    #[test]
    fn test_temp_file_store() {
        let mut store = TempFileStore::new(frame(), LayerType::Point).unwrap();
        exercise(&mut store);
        assert!(matches!(
            store.update(0, point(7)),
            Err(MapError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_temp_file_store_pop_keeps_order() {
        let mut store = TempFileStore::new(frame(), LayerType::Point).unwrap();
        for i in 0..6 {
            store.append(point(i)).unwrap();
        }
        assert_eq!(objtype(&store.pop(2).unwrap()), 2);
        assert_eq!(objtype(&store.pop(0).unwrap()), 0);
        assert_eq!(store.len(), 4);
        let kinds: Vec<u8> = store.all().unwrap().iter().map(objtype).collect();
        assert_eq!(kinds, vec![1, 3, 4, 5]);
        // The rewritten spool still takes appends at the end
        assert_eq!(store.append(point(6)).unwrap(), 4);
        assert_eq!(objtype(&store.get(4).unwrap()), 6);
        assert_eq!(objtype(&store.pop(4).unwrap()), 6);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_temp_file_store_returns_decoded_copies() {
        let mut store = TempFileStore::new(frame(), LayerType::Point).unwrap();
        let off_grid = Element::Point(PointElement::new(coord! { x: 10.123456789, y: 55.987654321 }));
        store.append(off_grid.clone()).unwrap();
        let latest = store.get(0).unwrap();
        assert_ne!(latest, off_grid);
        store.append(point(1)).unwrap();
        assert_eq!(store.get(0).unwrap(), latest);
        assert_eq!(store.all().unwrap()[0], latest);
    }

    #[test]
    fn test_temp_file_store_writes_raw_records() {
        let frame = frame();
        let mut spooled = TempFileStore::new(frame, LayerType::Point).unwrap();
        let mut memory = InMemoryStore::new();
        for i in 0..3 {
            spooled.append(point(i)).unwrap();
            memory.append(point(i)).unwrap();
        }
        let mut a = frame.writer();
        let mut b = frame.writer();
        spooled.write_records(&frame, &mut a).unwrap();
        memory.write_records(&frame, &mut b).unwrap();
        assert_eq!(a.into_inner(), b.into_inner());
    }

    #[test]
    fn test_per_cell_keyed_store() {
        let mut store = KeyedStore::per_cell().unwrap();
        exercise(&mut store);
        store.update(2, point(9)).unwrap();
        assert_eq!(objtype(&store.get(2).unwrap()), 9);
    }

    #[test]
    fn test_shared_keyed_store_releases_keys() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        {
            let mut a = KeyedStore::shared(db.clone(), 1);
            let mut b = KeyedStore::shared(db.clone(), 2);
            exercise(&mut a);
            b.append(point(3)).unwrap();
            assert!(db.get("2/0").unwrap().is_some());
            assert_eq!(objtype(&a.get(0).unwrap()), 0);
        }
        assert!(db.is_empty());
    }
}
