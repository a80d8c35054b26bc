//! Translation of numeric block ids between two palettes.

use std::collections::{BTreeSet, HashMap};

use crate::blocktypes::{AIR_ID, BlockType, BlockTypeSet};

/// Maps (id, meta) in a source palette to (id, meta) in a destination palette
/// by matching internal names.
///
/// Source blocks with no counterpart go to `fallback` when one was given,
/// otherwise to air. Every such source key is remembered in `unknown`.
#[derive(Debug)]
pub struct BlockConverter {
    identity: bool,
    table: HashMap<(u16, u8), (u16, u8)>,
    fallback: (u16, u8),
    unknown: BTreeSet<(u16, u8)>,
}

impl BlockConverter {
    /// Pass ids through untouched.
    pub fn identity() -> Self {
        Self {
            identity: true,
            table: HashMap::new(),
            fallback: (AIR_ID, 0),
            unknown: BTreeSet::new(),
        }
    }

    pub fn between(source: &BlockTypeSet, dest: &BlockTypeSet, replace_unknown_with: Option<&BlockType>) -> Self {
        if std::ptr::eq(source, dest) || source.same_numbering(dest) {
            return Self::identity();
        }

        let mut table = HashMap::with_capacity(source.types().len());
        for t in source.types() {
            if let Some(d) = dest.by_name(&t.internal_name) {
                table.insert(t.key(), d.key());
            }
        }
        log::debug!(
            "Converter {} -> {}: {} of {} block types matched",
            source.name(),
            dest.name(),
            table.len(),
            source.types().len()
        );

        Self {
            identity: false,
            table,
            fallback: replace_unknown_with.map(|b| b.key()).unwrap_or((AIR_ID, 0)),
            unknown: BTreeSet::new(),
        }
    }

    /// Force a mapping, overriding whatever name matching produced.
    pub fn with_override(mut self, from: (u16, u8), to: (u16, u8)) -> Self {
        self.table.insert(from, to);
        self
    }

    pub fn is_identity(&self) -> bool {
        self.identity && self.table.is_empty()
    }

    pub fn convert(&mut self, id: u16, meta: u8) -> (u16, u8) {
        if let Some(&to) = self.table.get(&(id, meta)) {
            return to;
        }
        if self.identity {
            return (id, meta);
        }
        // unlisted meta variants take the default variant's mapping
        if let Some(&to) = self.table.get(&(id, 0)) {
            return to;
        }
        if id == AIR_ID {
            return (AIR_ID, 0);
        }
        if self.unknown.insert((id, meta)) {
            log::warn!("No destination block for {}:{}, using {}:{}", id, meta, self.fallback.0, self.fallback.1);
        }
        self.fallback
    }

    pub fn convert_arrays(&mut self, blocks: &mut [u16], data: &mut [u8]) {
        if self.is_identity() {
            return;
        }
        for (b, d) in blocks.iter_mut().zip(data.iter_mut()) {
            let (nb, nd) = self.convert(*b, *d);
            *b = nb;
            *d = nd;
        }
    }

    /// Source keys that had no destination equivalent.
    pub fn unknown(&self) -> &BTreeSet<(u16, u8)> {
        &self.unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renumbered() -> BlockTypeSet {
        BlockTypeSet::from_json(
            "renumbered",
            r#"[
                { "id": 0, "internal_name": "minecraft:air" },
                { "id": 7, "internal_name": "minecraft:stone", "opacity": 15 },
                { "id": 8, "meta": 0, "internal_name": "minecraft:wool", "opacity": 15 },
                { "id": 9, "internal_name": "minecraft:sponge", "opacity": 15 }
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_same_palette_is_identity() {
        let a = BlockTypeSet::classic();
        let mut c = BlockConverter::between(&a, &a, None);
        assert!(c.is_identity());
        assert_eq!(c.convert(1234, 5), (1234, 5));
    }

    #[test]
    fn test_translates_by_internal_name() {
        let src = BlockTypeSet::classic();
        let dst = renumbered();
        let mut c = BlockConverter::between(&src, &dst, None);
        assert_eq!(c.convert(1, 0), (7, 0));
        assert_eq!(c.convert(0, 0), (0, 0));
        assert!(c.unknown().is_empty());
    }

    #[test]
    fn test_unlisted_meta_uses_default_variant() {
        let src = BlockTypeSet::classic();
        let dst = renumbered();
        let mut c = BlockConverter::between(&src, &dst, None);
        // wool:5 is not in the classic palette, wool:0 maps to 8:0
        assert_eq!(c.convert(35, 5), (8, 0));
        assert!(c.unknown().is_empty());
    }

    #[test]
    fn test_same_numbering_keeps_variants() {
        let a = BlockTypeSet::classic();
        let b = BlockTypeSet::classic();
        let stone = b.by_name("stone").unwrap().clone();
        let mut c = BlockConverter::between(&a, &b, Some(&stone));
        assert!(c.is_identity());
        assert_eq!(c.convert(35, 14), (35, 14));
    }

    #[test]
    fn test_unknown_goes_to_fallback_or_air() {
        let src = BlockTypeSet::classic();
        let dst = renumbered();

        let mut to_air = BlockConverter::between(&src, &dst, None);
        assert_eq!(to_air.convert(89, 0), (0, 0));
        assert!(to_air.unknown().contains(&(89, 0)));

        let sponge = dst.by_name("sponge").unwrap().clone();
        let mut to_sponge = BlockConverter::between(&src, &dst, Some(&sponge));
        assert_eq!(to_sponge.convert(89, 0), (9, 0));
    }

    #[test]
    fn test_override_and_arrays() {
        let src = BlockTypeSet::classic();
        let mut c = BlockConverter::between(&src, &src, None).with_override((1, 0), (4, 0));
        let mut blocks = vec![1, 2, 1];
        let mut data = vec![0, 0, 0];
        c.convert_arrays(&mut blocks, &mut data);
        assert_eq!(blocks, vec![4, 2, 4]);
    }
}
