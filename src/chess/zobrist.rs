//! Zobrist hashing keys, generated at compile time.

const SEED: u128 = 0x246C_CB2D_3B40_2853_9918_0A6D_BC3A_F444;

/// A xorshift generator over 128 bits of state, usable in const contexts.
struct KeyStream {
    state: u128,
}

impl KeyStream {
    const fn new() -> Self {
        Self { state: SEED }
    }

    const fn next(mut self) -> (u64, Self) {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        #[allow(clippy::cast_possible_truncation)]
        let key = x as u64 ^ (x >> 64) as u64;
        (key, self)
    }
}

pub struct Keys {
    pub pieces: [[u64; 64]; 12],
    pub ep: [u64; 8],
    pub castling: [u64; 16],
    pub side: u64,
    /// Mixed into the position key while a move is excluded from search,
    /// so that verification results never alias full-search entries.
    pub exclusion: u64,
}

const fn generate_keys() -> Keys {
    let mut stream = KeyStream::new();
    let mut keys = Keys {
        pieces: [[0; 64]; 12],
        ep: [0; 8],
        castling: [0; 16],
        side: 0,
        exclusion: 0,
    };
    cfor!(let mut piece = 0; piece < 12; piece += 1; {
        cfor!(let mut sq = 0; sq < 64; sq += 1; {
            let key;
            (key, stream) = stream.next();
            keys.pieces[piece][sq] = key;
        });
    });
    cfor!(let mut file = 0; file < 8; file += 1; {
        let key;
        (key, stream) = stream.next();
        keys.ep[file] = key;
    });
    // castling keys are composed from the four single-right keys,
    // so that the key of a rights set is the xor of its members.
    let mut single = [0; 4];
    cfor!(let mut i = 0; i < 4; i += 1; {
        let key;
        (key, stream) = stream.next();
        single[i] = key;
    });
    cfor!(let mut rights = 0; rights < 16; rights += 1; {
        let mut key = 0;
        cfor!(let mut i = 0; i < 4; i += 1; {
            if rights & (1 << i) != 0 {
                key ^= single[i];
            }
        });
        keys.castling[rights] = key;
    });
    let key;
    (key, stream) = stream.next();
    keys.side = key;
    let (key, _) = stream.next();
    keys.exclusion = key;
    keys
}

pub static KEYS: Keys = generate_keys();

#[cfg(test)]
mod tests {
    use super::KEYS;

    #[test]
    fn piece_keys_are_distinct() {
        let mut keys = KEYS.pieces.iter().flatten().copied().collect::<Vec<u64>>();
        keys.sort_unstable();
        let len_before = keys.len();
        keys.dedup();
        assert_eq!(len_before, keys.len());
    }

    #[test]
    fn castling_keys_compose() {
        assert_eq!(KEYS.castling[0], 0);
        assert_eq!(KEYS.castling[0b0011], KEYS.castling[0b0001] ^ KEYS.castling[0b0010]);
        assert_ne!(KEYS.exclusion, KEYS.side);
    }
}
