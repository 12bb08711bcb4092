use std::{
    mem::size_of,
    sync::atomic::{AtomicU8, AtomicU64, Ordering},
    time::Instant,
};

use crate::{
    chess::chessmove::Move,
    util::{MEGABYTE, MINIMUM_MATE_SCORE, VALUE_NONE, depth::CompactDepthStorage},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    None = 0,
    Upper = 1,
    Lower = 2,
    Exact = 3,
}

impl Bound {
    pub const fn is_lower(self) -> bool {
        self as u8 & 0b10 != 0
    }

    pub const fn is_upper(self) -> bool {
        self as u8 & 0b01 != 0
    }

    const fn from_bits(bits: u64) -> Self {
        match bits & 0b11 {
            0 => Self::None,
            1 => Self::Upper,
            2 => Self::Lower,
            _ => Self::Exact,
        }
    }
}

const GENERATION_MASK: u8 = 0b11_1111;
const KEY_BITS: u64 = 48;
const KEY_MASK: u64 = (1 << KEY_BITS) - 1;

/// The unpacked contents of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TTHit {
    pub mov: Option<Move>,
    pub depth: i32,
    pub bound: Bound,
    pub value: i32,
    pub static_value: i32,
    pub static_margin: i32,
}

/// Packing of an entry into two words.
/// `data` holds the move, value, static value, and static margin, sixteen bits each.
/// `meta` holds the depth byte, two bits of bound, six of generation, and 48 bits of key,
/// and is stored xor-ed with `data` so that a torn write fails the key check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PackedEntry {
    meta: u64,
    data: u64,
}

impl PackedEntry {
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn pack(key: u64, hit: &TTHit, generation: u8) -> Self {
        let clamp16 = |v: i32| u64::from(v.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16 as u16);
        let data = u64::from(hit.mov.map_or(0, Move::inner))
            | clamp16(hit.value) << 16
            | clamp16(hit.static_value) << 32
            | clamp16(hit.static_margin) << 48;
        let meta = u64::from(CompactDepthStorage::from(hit.depth).inner())
            | (hit.bound as u64) << 8
            | u64::from(generation & GENERATION_MASK) << 10
            | (key & KEY_MASK) << 16;
        Self { meta, data }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn unpack(self) -> TTHit {
        let field16 = |shift: u32| i32::from((self.data >> shift) as u16 as i16);
        TTHit {
            mov: Move::from_u16(self.data as u16),
            depth: CompactDepthStorage::from_inner(self.meta as u8).into(),
            bound: Bound::from_bits(self.meta >> 8),
            value: field16(16),
            static_value: field16(32),
            static_margin: field16(48),
        }
    }

    const fn key_matches(self, key: u64) -> bool {
        self.meta >> 16 == key & KEY_MASK
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn generation(self) -> u8 {
        (self.meta >> 10) as u8 & GENERATION_MASK
    }

    const fn bound(self) -> Bound {
        Bound::from_bits(self.meta >> 8)
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn depth_byte(self) -> u8 {
        self.meta as u8
    }

    const fn is_empty(self) -> bool {
        self.meta == 0 && self.data == 0
    }
}

const CLUSTER_SIZE: usize = 4;

/// Four entries of two lockless words each.
#[derive(Debug, Default)]
#[repr(C, align(64))]
struct Cluster {
    slots: [[AtomicU64; 2]; CLUSTER_SIZE],
}

const _CLUSTER_SIZE: () = assert!(size_of::<Cluster>() == 64, "TT cluster should fill one cache line.");

impl Cluster {
    fn load(&self, idx: usize) -> PackedEntry {
        let stored_meta = self.slots[idx][0].load(Ordering::Relaxed);
        let data = self.slots[idx][1].load(Ordering::Relaxed);
        PackedEntry { meta: stored_meta ^ data, data }
    }

    fn store(&self, idx: usize, entry: PackedEntry) {
        self.slots[idx][0].store(entry.meta ^ entry.data, Ordering::Relaxed);
        self.slots[idx][1].store(entry.data, Ordering::Relaxed);
    }

    fn clear(&self) {
        for slot in &self.slots {
            slot[0].store(0, Ordering::Relaxed);
            slot[1].store(0, Ordering::Relaxed);
        }
    }
}

fn divide_into_chunks<T>(slice: &[T], chunks: usize) -> impl Iterator<Item = &[T]> {
    let chunk_size = slice.len() / chunks.max(1) + 1;
    slice.chunks(chunk_size)
}

#[derive(Debug)]
pub struct TT {
    table: Vec<Cluster>,
    generation: AtomicU8,
}

/// A shared handle to the table for the duration of one search.
#[derive(Debug, Clone, Copy)]
pub struct TTView<'a> {
    table: &'a [Cluster],
    generation: u8,
}

impl TT {
    pub const fn new() -> Self {
        Self { table: Vec::new(), generation: AtomicU8::new(0) }
    }

    pub fn resize(&mut self, bytes: usize) {
        let start = Instant::now();
        let new_len = (bytes / size_of::<Cluster>()).max(1);
        self.table = Vec::new();
        self.table = (0..new_len).map(|_| Cluster::default()).collect();
        log::info!(
            "hash initialisation of {}mb complete in {}us",
            bytes / MEGABYTE,
            start.elapsed().as_micros()
        );
    }

    /// Zero the table, splitting the work over `threads` scoped threads.
    pub fn clear(&self, threads: usize) {
        std::thread::scope(|s| {
            for chunk in divide_into_chunks(&self.table, threads) {
                s.spawn(move || {
                    for cluster in chunk {
                        cluster.clear();
                    }
                });
            }
        });
        self.generation.store(0, Ordering::Relaxed);
    }

    pub fn view(&self) -> TTView<'_> {
        TTView { table: &self.table, generation: self.generation.load(Ordering::Relaxed) }
    }

    /// Start a new search: entries from earlier searches become preferred victims.
    pub fn increase_age(&self) {
        let next = (self.generation.load(Ordering::Relaxed) + 1) & GENERATION_MASK;
        self.generation.store(next, Ordering::Relaxed);
    }
}

impl Default for TT {
    fn default() -> Self {
        Self::new()
    }
}

impl TTView<'_> {
    fn wrap_key(&self, key: u64) -> usize {
        #![allow(clippy::cast_possible_truncation)]
        let key = u128::from(key);
        let len = self.table.len() as u128;
        // fixed-point multiplication trick!
        ((key * len) >> 64) as usize
    }

    /// Store a search result. Mate scores are given relative to the root and
    /// converted here to be relative to this node, `ply` plies from the root.
    #[allow(clippy::too_many_arguments)]
    pub fn store(
        &self,
        key: u64,
        ply: usize,
        mut mov: Option<Move>,
        value: i32,
        bound: Bound,
        depth: i32,
        static_value: i32,
        static_margin: i32,
    ) {
        let cluster = &self.table[self.wrap_key(key)];
        let mut replace_idx = 0;
        let mut replace = cluster.load(0);
        for idx in 0..CLUSTER_SIZE {
            let entry = cluster.load(idx);
            if entry.is_empty() || entry.key_matches(key) {
                // keep the old move if we don't have one.
                if mov.is_none() && entry.key_matches(key) {
                    mov = entry.unpack().mov;
                }
                replace_idx = idx;
                break;
            }
            if idx == 0 {
                continue;
            }
            // prefer to keep entries from this search, exact entries, and deep entries.
            let c1 = if replace.generation() == self.generation { 2 } else { 0 };
            let c2 = if entry.generation() == self.generation || entry.bound() == Bound::Exact { -2 } else { 0 };
            let c3 = i32::from(entry.depth_byte() < replace.depth_byte());
            if c1 + c2 + c3 > 0 {
                replace_idx = idx;
                replace = entry;
            }
        }

        let hit = TTHit { mov, depth, bound, value: value_to_tt(value, ply), static_value, static_margin };
        cluster.store(replace_idx, PackedEntry::pack(key, &hit, self.generation));
    }

    pub fn probe(&self, key: u64, ply: usize) -> Option<TTHit> {
        let cluster = &self.table[self.wrap_key(key)];
        for idx in 0..CLUSTER_SIZE {
            let entry = cluster.load(idx);
            if entry.is_empty() || !entry.key_matches(key) {
                continue;
            }
            let mut hit = entry.unpack();
            hit.value = value_from_tt(hit.value, ply);
            return Some(hit);
        }
        None
    }

    pub fn probe_move(&self, key: u64) -> Option<Move> {
        self.probe(key, 0).and_then(|hit| hit.mov)
    }

    pub fn prefetch(&self, key: u64) {
        // SAFETY: The pointer we construct is in-bounds, and _mm_prefetch
        // doesn't really do anything particularly dangerous anyway.
        #[cfg(target_arch = "x86_64")]
        unsafe {
            use std::arch::x86_64::{_MM_HINT_T0, _mm_prefetch};

            let entry = &self.table[self.wrap_key(key)];
            _mm_prefetch(std::ptr::from_ref::<Cluster>(entry).cast::<i8>(), _MM_HINT_T0);
        }
    }

    /// Permille of sampled entries written during the current search.
    pub fn hashfull(&self) -> usize {
        let clusters = self.table.len().min(1000 / CLUSTER_SIZE);
        let mut hit = 0;
        for cluster in &self.table[..clusters] {
            for idx in 0..CLUSTER_SIZE {
                let entry = cluster.load(idx);
                if !entry.is_empty() && entry.generation() == self.generation {
                    hit += 1;
                }
            }
        }
        hit * 1000 / (clusters * CLUSTER_SIZE).max(1)
    }
}

/// Mate scores are stored as distance from the node rather than from the root.
pub const fn value_to_tt(value: i32, ply: usize) -> i32 {
    #![allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    if value == VALUE_NONE {
        value
    } else if value >= MINIMUM_MATE_SCORE {
        value + ply as i32
    } else if value <= -MINIMUM_MATE_SCORE {
        value - ply as i32
    } else {
        value
    }
}

pub const fn value_from_tt(value: i32, ply: usize) -> i32 {
    #![allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    if value == VALUE_NONE {
        value
    } else if value >= MINIMUM_MATE_SCORE {
        value - ply as i32
    } else if value <= -MINIMUM_MATE_SCORE {
        value + ply as i32
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chess::types::Square,
        util::{depth::DEPTH_NONE, mate_in},
    };

    fn small_tt() -> TT {
        let mut tt = TT::new();
        tt.resize(MEGABYTE);
        tt
    }

    #[test]
    fn store_then_probe() {
        let tt = small_tt();
        let view = tt.view();
        let key = 0xDEAD_BEEF_1234_5678;
        let m = Move::new(Square::E2, Square::E4);
        view.store(key, 0, Some(m), 150, Bound::Lower, 12, -40, 18);
        let hit = view.probe(key, 0).unwrap();
        assert_eq!(hit.mov, Some(m));
        assert_eq!(hit.value, 150);
        assert_eq!(hit.bound, Bound::Lower);
        assert_eq!(hit.depth, 12);
        assert_eq!(hit.static_value, -40);
        assert_eq!(hit.static_margin, 18);
        assert!(view.probe(key ^ 1, 0).is_none());
    }

    #[test]
    fn eval_only_entries_round_trip() {
        let tt = small_tt();
        let view = tt.view();
        let key = 0x0123_4567_89AB_CDEF;
        view.store(key, 3, None, VALUE_NONE, Bound::None, DEPTH_NONE, 77, 0);
        let hit = view.probe(key, 3).unwrap();
        assert_eq!(hit.value, VALUE_NONE);
        assert_eq!(hit.depth, DEPTH_NONE);
        assert_eq!(hit.bound, Bound::None);
        assert_eq!(hit.static_value, 77);
        assert_eq!(hit.mov, None);
    }

    #[test]
    fn mate_scores_are_ply_adjusted() {
        let tt = small_tt();
        let view = tt.view();
        let key = 0x5555_AAAA_5555_AAAA;
        // a mate found 5 plies below the root, stored at ply 3.
        view.store(key, 3, None, mate_in(5), Bound::Exact, 4, 0, 0);
        // reached again at ply 7, the mate is 4 plies further away from the root.
        assert_eq!(view.probe(key, 7).unwrap().value, mate_in(9));
        assert_eq!(value_from_tt(value_to_tt(-mate_in(8), 2), 2), -mate_in(8));
    }

    #[test]
    fn same_position_keeps_its_move() {
        let tt = small_tt();
        let view = tt.view();
        let key = 0x0F0F_0F0F_0F0F_0F0F;
        let m = Move::new(Square::G1, Square::F3);
        view.store(key, 0, Some(m), 10, Bound::Exact, 8, 0, 0);
        view.store(key, 0, None, -20, Bound::Upper, 10, 0, 0);
        let hit = view.probe(key, 0).unwrap();
        assert_eq!(hit.mov, Some(m));
        assert_eq!(hit.value, -20);
    }

    #[test]
    fn clear_and_hashfull() {
        let tt = small_tt();
        assert_eq!(tt.view().hashfull(), 0);
        let view = tt.view();
        for i in 0..100_000u64 {
            view.store(i.wrapping_mul(0x9E37_79B9_7F4A_7C15), 0, None, 0, Bound::Exact, 2, 0, 0);
        }
        assert!(view.hashfull() > 0);
        tt.clear(3);
        assert_eq!(tt.view().hashfull(), 0);
    }
}
