//! HeapPage - a slotted page of fixed-width tuples.
//!
//! A [`HeapPage`] is the decoded form of one fixed-size page of a heap file.
//! It is the unit cached by the buffer pool.

use std::sync::Arc;

use crate::common::{Error, PageId, RecordId, Result};
use crate::storage::tuple::{Tuple, TupleDesc};

/// A page of fixed-width tuple slots plus an occupancy bitmap.
///
/// # Layout
/// ```text
/// ┌──────────────────┬────────┬────────┬─────┬──────────┬─────────┐
/// │ header bitmap    │ slot 0 │ slot 1 │ ... │ slot N-1 │ padding │
/// │ ceil(N/8) bytes  │        │        │     │          │ (zeros) │
/// └──────────────────┴────────┴────────┴─────┴──────────┴─────────┘
/// ```
///
/// `N = floor(page_size * 8 / (tuple_size * 8 + 1))`: every slot costs its
/// tuple bytes plus one header bit. Slot `i` is occupied when bit `i % 8` of
/// header byte `i / 8` is set (least significant bit first).
///
/// Free slots and padding are always encoded as zeros, so an all-zero image is
/// an empty page and [`HeapPage::empty_page_data`] is the template for newly
/// allocated pages.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use heapdb::{Field, HeapPage, PageId, TableId, Tuple, TupleDesc, Type};
///
/// let td = Arc::new(TupleDesc::new(&[Type::Int]));
/// let mut page = HeapPage::empty(PageId::new(TableId(1), 0), td.clone(), 4096);
/// assert_eq!(page.num_slots(), 992);
///
/// let t = Tuple::new(td, vec![Field::Int(7)]).unwrap();
/// let rid = page.insert_tuple(&t).unwrap();
/// assert_eq!(rid.slot, 0);
/// assert!(page.is_slot_used(0));
/// ```
#[derive(Debug, Clone)]
pub struct HeapPage {
    id: PageId,
    desc: Arc<TupleDesc>,
    page_size: usize,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
}

impl HeapPage {
    /// Number of slots a page of `page_size` bytes holds for tuples of
    /// `tuple_size` bytes.
    pub fn slots_for(page_size: usize, tuple_size: usize) -> usize {
        if tuple_size == 0 {
            return 0;
        }
        (page_size * 8) / (tuple_size * 8 + 1)
    }

    /// Bytes of header bitmap for `num_slots` slots.
    pub fn header_size_for(num_slots: usize) -> usize {
        num_slots.div_ceil(8)
    }

    /// Image of an empty page. Identical on every call.
    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0u8; page_size]
    }

    /// A page with every slot free.
    pub fn empty(id: PageId, desc: Arc<TupleDesc>, page_size: usize) -> Self {
        let num_slots = Self::slots_for(page_size, desc.byte_size());
        Self {
            id,
            desc,
            page_size,
            header: vec![0u8; Self::header_size_for(num_slots)],
            tuples: vec![None; num_slots],
        }
    }

    /// Decode a page image.
    ///
    /// # Errors
    /// - `Error::InvalidPageImage` if `data` is not exactly `page_size` bytes
    /// - `Error::InvalidRecord` if an occupied slot does not decode
    pub fn new(id: PageId, desc: Arc<TupleDesc>, data: &[u8], page_size: usize) -> Result<Self> {
        if data.len() != page_size {
            return Err(Error::InvalidPageImage {
                expected: page_size,
                actual: data.len(),
            });
        }

        let mut page = Self::empty(id, desc, page_size);
        let header_size = page.header.len();
        page.header.copy_from_slice(&data[..header_size]);

        let tuple_size = page.desc.byte_size();
        for slot in 0..page.tuples.len() {
            if !page.is_slot_used(slot) {
                continue;
            }
            let start = header_size + slot * tuple_size;
            let mut tuple = Tuple::decode(page.desc.clone(), &data[start..start + tuple_size])?;
            tuple.set_record_id(Some(RecordId::new(id, slot)));
            page.tuples[slot] = Some(tuple);
        }

        Ok(page)
    }

    /// Encode this page into a `page_size`-byte image.
    pub fn page_data(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.page_size);
        out.extend_from_slice(&self.header);

        let tuple_size = self.desc.byte_size();
        for tuple in &self.tuples {
            match tuple {
                Some(t) => out.extend_from_slice(&t.encode()),
                None => out.resize(out.len() + tuple_size, 0),
            }
        }

        out.resize(self.page_size, 0);
        out
    }

    #[inline]
    pub fn id(&self) -> PageId {
        self.id
    }

    #[inline]
    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[inline]
    pub fn num_slots(&self) -> usize {
        self.tuples.len()
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.num_slots())
            .filter(|&slot| !self.is_slot_used(slot))
            .count()
    }

    /// Whether `slot` is marked occupied. Out-of-range slots are free.
    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.num_slots() && self.header[slot / 8] & (1 << (slot % 8)) != 0
    }

    fn mark_slot_used(&mut self, slot: usize, used: bool) {
        let mask = 1u8 << (slot % 8);
        if used {
            self.header[slot / 8] |= mask;
        } else {
            self.header[slot / 8] &= !mask;
        }
    }

    /// The tuple stored in `slot`, if occupied.
    pub fn tuple(&self, slot: usize) -> Option<&Tuple> {
        self.tuples.get(slot)?.as_ref()
    }

    /// Occupied tuples in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> + '_ {
        self.tuples.iter().flatten()
    }

    /// Store `tuple` in the first free slot and return its record id.
    ///
    /// # Errors
    /// - `Error::SchemaMismatch` if the tuple's schema differs from the page's
    /// - `Error::PageFull` if no slot is free
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> Result<RecordId> {
        if **tuple.tuple_desc() != *self.desc {
            return Err(Error::SchemaMismatch);
        }

        let slot = (0..self.num_slots())
            .find(|&slot| !self.is_slot_used(slot))
            .ok_or(Error::PageFull(self.id))?;

        let rid = RecordId::new(self.id, slot);
        let mut stored = tuple.clone();
        stored.set_record_id(Some(rid));
        self.tuples[slot] = Some(stored);
        self.mark_slot_used(slot, true);

        Ok(rid)
    }

    /// Replace the tuple at `rid` with `tuple`'s fields.
    ///
    /// # Errors
    /// Same conditions as [`delete_tuple`](Self::delete_tuple), plus
    /// `Error::SchemaMismatch`.
    pub fn update_tuple(&mut self, rid: RecordId, tuple: &Tuple) -> Result<()> {
        if **tuple.tuple_desc() != *self.desc {
            return Err(Error::SchemaMismatch);
        }
        self.check_occupied(rid)?;

        let mut stored = tuple.clone();
        stored.set_record_id(Some(rid));
        self.tuples[rid.slot] = Some(stored);
        Ok(())
    }

    /// Free the slot addressed by `rid`.
    ///
    /// # Errors
    /// `Error::InvalidRecord` if `rid` belongs to another page, is out of
    /// range, or addresses a free slot.
    pub fn delete_tuple(&mut self, rid: RecordId) -> Result<()> {
        self.check_occupied(rid)?;

        self.tuples[rid.slot] = None;
        self.mark_slot_used(rid.slot, false);
        Ok(())
    }

    /// Check that `rid` addresses an occupied slot of this page.
    ///
    /// # Errors
    /// Same as [`delete_tuple`](Self::delete_tuple).
    pub fn check_occupied(&self, rid: RecordId) -> Result<()> {
        if rid.page_id != self.id {
            return Err(Error::InvalidRecord(format!(
                "{} is not on {}",
                rid, self.id
            )));
        }
        if rid.slot >= self.num_slots() {
            return Err(Error::InvalidRecord(format!(
                "slot {} out of range for {} slots",
                rid.slot,
                self.num_slots()
            )));
        }
        if !self.is_slot_used(rid.slot) {
            return Err(Error::InvalidRecord(format!("{} is already empty", rid)));
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TableId;
    use crate::storage::tuple::{Field, Type};
    use proptest::prelude::*;

    fn pid() -> PageId {
        PageId::new(TableId(1), 0)
    }

    fn int_desc(n: usize) -> Arc<TupleDesc> {
        Arc::new(TupleDesc::new(&vec![Type::Int; n]))
    }

    fn int_tuple(desc: &Arc<TupleDesc>, v: i32) -> Tuple {
        let fields = (0..desc.num_fields()).map(|_| Field::Int(v)).collect();
        Tuple::new(desc.clone(), fields).unwrap()
    }

    #[test]
    fn test_slot_math() {
        // Two ints: 8 bytes per tuple, 65 bits per slot.
        assert_eq!(HeapPage::slots_for(4096, 8), 504);
        assert_eq!(HeapPage::header_size_for(504), 63);
        assert_eq!(HeapPage::slots_for(4096, 0), 0);
        // One 4-byte tuple plus its header byte fill a 5-byte page.
        assert_eq!(HeapPage::slots_for(5, 4), 1);
    }

    #[test]
    fn test_empty_page_decodes_to_no_tuples() {
        let desc = int_desc(2);
        let data = HeapPage::empty_page_data(4096);
        let page = HeapPage::new(pid(), desc, &data, 4096).unwrap();

        assert_eq!(page.iter().count(), 0);
        assert_eq!(page.num_empty_slots(), page.num_slots());
    }

    #[test]
    fn test_empty_page_data_is_stable() {
        assert_eq!(
            HeapPage::empty_page_data(4096),
            HeapPage::empty_page_data(4096)
        );
        let page = HeapPage::empty(pid(), int_desc(3), 4096);
        assert_eq!(page.page_data(), HeapPage::empty_page_data(4096));
    }

    #[test]
    fn test_wrong_image_size() {
        let err = HeapPage::new(pid(), int_desc(1), &[0u8; 100], 4096).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidPageImage {
                expected: 4096,
                actual: 100
            }
        ));
    }

    #[test]
    fn test_insert_sets_bitmap_and_record_id() {
        let desc = int_desc(2);
        let mut page = HeapPage::empty(pid(), desc.clone(), 4096);

        let rid0 = page.insert_tuple(&int_tuple(&desc, 1)).unwrap();
        let rid1 = page.insert_tuple(&int_tuple(&desc, 2)).unwrap();

        assert_eq!(rid0, RecordId::new(pid(), 0));
        assert_eq!(rid1, RecordId::new(pid(), 1));
        assert_eq!(page.page_data()[0], 0b0000_0011);
        assert_eq!(page.tuple(1).unwrap().record_id(), Some(rid1));
    }

    #[test]
    fn test_insert_reuses_freed_slot() {
        let desc = int_desc(1);
        let mut page = HeapPage::empty(pid(), desc.clone(), 4096);
        for v in 0..3 {
            page.insert_tuple(&int_tuple(&desc, v)).unwrap();
        }

        page.delete_tuple(RecordId::new(pid(), 1)).unwrap();
        let rid = page.insert_tuple(&int_tuple(&desc, 9)).unwrap();
        assert_eq!(rid.slot, 1);
    }

    #[test]
    fn test_insert_into_full_page() {
        let desc = int_desc(1);
        let mut page = HeapPage::empty(pid(), desc.clone(), 5);
        page.insert_tuple(&int_tuple(&desc, 1)).unwrap();

        let err = page.insert_tuple(&int_tuple(&desc, 2)).unwrap_err();
        assert!(matches!(err, Error::PageFull(p) if p == pid()));
    }

    #[test]
    fn test_insert_schema_mismatch() {
        let mut page = HeapPage::empty(pid(), int_desc(2), 4096);
        let other = int_desc(1);
        assert!(matches!(
            page.insert_tuple(&int_tuple(&other, 1)),
            Err(Error::SchemaMismatch)
        ));
    }

    #[test]
    fn test_delete_twice_is_invalid_record() {
        let desc = int_desc(1);
        let mut page = HeapPage::empty(pid(), desc.clone(), 4096);
        let rid = page.insert_tuple(&int_tuple(&desc, 1)).unwrap();

        page.delete_tuple(rid).unwrap();
        assert!(!page.is_slot_used(rid.slot));
        assert!(matches!(
            page.delete_tuple(rid),
            Err(Error::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_delete_foreign_or_out_of_range() {
        let desc = int_desc(1);
        let mut page = HeapPage::empty(pid(), desc, 4096);

        let foreign = RecordId::new(PageId::new(TableId(1), 7), 0);
        assert!(matches!(
            page.delete_tuple(foreign),
            Err(Error::InvalidRecord(_))
        ));
        let out_of_range = RecordId::new(pid(), 100_000);
        assert!(matches!(
            page.delete_tuple(out_of_range),
            Err(Error::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_update_tuple() {
        let desc = int_desc(1);
        let mut page = HeapPage::empty(pid(), desc.clone(), 4096);
        let rid = page.insert_tuple(&int_tuple(&desc, 10)).unwrap();

        page.update_tuple(rid, &int_tuple(&desc, 99)).unwrap();
        assert_eq!(page.tuple(rid.slot).unwrap().field(0), Some(&Field::Int(99)));
        assert!(page.update_tuple(RecordId::new(pid(), 5), &int_tuple(&desc, 1)).is_err());
    }

    #[test]
    fn test_decode_restores_record_ids() {
        let desc = int_desc(2);
        let mut page = HeapPage::empty(pid(), desc.clone(), 4096);
        for v in 0..10 {
            page.insert_tuple(&int_tuple(&desc, v)).unwrap();
        }
        page.delete_tuple(RecordId::new(pid(), 4)).unwrap();

        let decoded = HeapPage::new(pid(), desc, &page.page_data(), 4096).unwrap();
        let slots: Vec<usize> = decoded
            .iter()
            .map(|t| t.record_id().unwrap().slot)
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 3, 5, 6, 7, 8, 9]);
        assert_eq!(decoded.tuple(9).unwrap().field(0), Some(&Field::Int(9)));
    }

    proptest! {
        #[test]
        fn prop_image_roundtrip(values in proptest::collection::vec(proptest::option::of(any::<i32>()), 0..120)) {
            let desc = int_desc(2);
            let mut page = HeapPage::empty(pid(), desc.clone(), 1024);
            for v in values.iter().take(page.num_slots()) {
                let rid = page.insert_tuple(&int_tuple(&desc, v.unwrap_or(0))).unwrap();
                if v.is_none() {
                    page.delete_tuple(rid).unwrap();
                }
            }

            let image = page.page_data();
            prop_assert_eq!(image.len(), 1024);
            let decoded = HeapPage::new(pid(), desc, &image, 1024).unwrap();
            prop_assert_eq!(decoded.page_data(), image);
        }
    }
}
