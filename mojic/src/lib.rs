//! mojic — password-seeded emoji obfuscation of C source.
//!
//! A `.mojic` file is UTF-8 text, whitespace-oblivious between its framing
//! lines:
//!
//!   `<HEADER: 72 moon/clock glyphs>` `'\n'`
//!   `<BODY: keyword glyphs and 4-glyph base-1024 blocks, wrapped ~300 bytes>` `'\n'`
//!   `<FOOTER: 64 moon/clock glyphs carrying the payload's HMAC-SHA256 hex>`
//!
//! - scrypt(password, salt) yields 80 bytes: an AES-256-CTR key + IV for the
//!   keystream and an HMAC-SHA256 key for the seal. The first 4 bytes of the
//!   MAC key ride in the header so a wrong password is rejected before any
//!   stream work.
//! - One keystream drives everything: it Fisher–Yates-shuffles the
//!   pictographic alphabet into a 38-glyph keyword ring plus a 1024-glyph
//!   data alphabet, then supplies a shift per keyword occurrence and a
//!   5-byte XOR mask per data block. Encode and decode must draw from it in
//!   identical order.
//! - C keywords encode polymorphically: a fresh shift per occurrence picks
//!   the glyph out of the ring, so the same keyword lands on a different
//!   glyph almost every time. Everything between keywords is whitened and
//!   packed as base-1024 digits.

use std::collections::{HashMap, VecDeque};

use aes::Aes256;
use cipher::generic_array::GenericArray as Ga;
use cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;
use hmac::{Hmac, Mac};
use log::debug;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rand::RngCore;
use regex::bytes::Regex;
use scrypt::{scrypt, Params as ScryptParams};
use sha2::Sha256;
use zeroize::Zeroize;

pub mod error;
pub use error::MojicError;

type HmacSha256 = Hmac<Sha256>;

/// Salt length emitted by `init` when none is supplied.
pub const SALT_LEN: usize = 32;
/// Auth-check length carried in the header (prefix of the MAC key).
pub const AUTH_CHECK_LEN: usize = 4;

const KEY_MATERIAL_LEN: usize = 80;
const SCRYPT_LOG_N: u8 = 14; // N = 16384
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

const BLOCK_LEN: usize = 5;
const DIGITS_PER_BLOCK: usize = 4;
const DATA_BASE: u64 = 1024;
const DATA_ALPHABET_LEN: usize = 1024;
const MIN_RAW_ALPHABET: usize = 1080;
const LINE_WRAP_BYTES: usize = 300;
const FOOTER_GLYPHS: usize = 64;

/// Token vocabulary, bound positionally to the keyword ring. The 32 C89
/// keywords plus the preprocessor/runtime names C sources lean on. The `#`
/// forms must stay distinct entries so the tokenizer can anchor them.
pub const KEYWORDS: [&str; 38] = [
    "auto", "break", "case", "char", "const", "continue", "default", "do",
    "double", "else", "enum", "extern", "float", "for", "goto", "if",
    "int", "long", "register", "return", "short", "signed", "sizeof",
    "static", "struct", "switch", "typedef", "union", "unsigned", "void",
    "volatile", "while", "include", "define", "main", "printf",
    "#include", "#define",
];

// ============================================================
// Header alphabet (moon phases + clock faces, one per nibble)
// ============================================================

const MOON_RUN: (u32, u32) = (0x1F311, 0x1F318); // new moon .. waning crescent
const CLOCK_RUN: (u32, u32) = (0x1F550, 0x1F557); // one o'clock .. eight o'clock

fn build_codepoint_run(lo: u32, hi: u32) -> Vec<char> {
    (lo..=hi).filter_map(char::from_u32).collect()
}

static HEADER_ALPHABET: Lazy<Vec<char>> = Lazy::new(|| {
    let mut h = build_codepoint_run(MOON_RUN.0, MOON_RUN.1);
    h.extend(build_codepoint_run(CLOCK_RUN.0, CLOCK_RUN.1));
    h
});

fn header_glyph(nibble: u8) -> char {
    HEADER_ALPHABET[nibble as usize & 0x0F]
}

fn header_nibble(g: char) -> Option<u8> {
    HEADER_ALPHABET.iter().position(|&h| h == g).map(|n| n as u8)
}

fn is_header_codepoint(cp: u32) -> bool {
    (MOON_RUN.0..=MOON_RUN.1).contains(&cp) || (CLOCK_RUN.0..=CLOCK_RUN.1).contains(&cp)
}

/// Renders `bytes` as moon/clock glyphs, one glyph per hex nibble.
fn header_encode(bytes: &[u8], out: &mut String) {
    for c in hex::encode(bytes).chars() {
        let n = c.to_digit(16).expect("hex digit") as u8;
        out.push(header_glyph(n));
    }
}

// ============================================================
// Raw pictographic alphabet
// ============================================================

// The four blocks in ascending code-point order, header glyphs excluded.
// Unassigned code points are kept: both sides iterate the closed intervals,
// so the mapping stays stable across Unicode versions.
static RAW_ALPHABET: Lazy<Vec<char>> = Lazy::new(|| {
    const RUNS: [(u32, u32); 4] = [
        (0x1F300, 0x1F5FF), // misc symbols and pictographs
        (0x1F600, 0x1F64F), // emoticons
        (0x1F680, 0x1F6FF), // transport and map
        (0x1F900, 0x1F9FF), // supplemental symbols
    ];
    let mut u = Vec::with_capacity(1232);
    for (lo, hi) in RUNS {
        u.extend((lo..=hi).filter(|cp| !is_header_codepoint(*cp)).filter_map(char::from_u32));
    }
    u
});

// ============================================================
// Key derivation
// ============================================================

struct KeyMaterial {
    rng_key: [u8; 32],
    rng_iv: [u8; 16],
    auth_key: [u8; 32],
}

impl KeyMaterial {
    fn auth_check(&self) -> [u8; AUTH_CHECK_LEN] {
        let mut check = [0u8; AUTH_CHECK_LEN];
        check.copy_from_slice(&self.auth_key[..AUTH_CHECK_LEN]);
        check
    }
}

fn derive_key_material(password: &[u8], salt: &[u8]) -> Result<KeyMaterial, MojicError> {
    // The params `len` field only matters to the PHC-string API (and must
    // stay within its 10..=64 window); the raw call sizes its output from
    // the buffer.
    let params =
        ScryptParams::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, ScryptParams::RECOMMENDED_LEN)
            .map_err(|_| MojicError::KdfFailure)?;
    let mut derived = [0u8; KEY_MATERIAL_LEN];
    scrypt(password, salt, &params, &mut derived).map_err(|_| MojicError::KdfFailure)?;

    let mut rng_key = [0u8; 32];
    rng_key.copy_from_slice(&derived[0..32]);
    let mut rng_iv = [0u8; 16];
    rng_iv.copy_from_slice(&derived[32..48]);
    let mut auth_key = [0u8; 32];
    auth_key.copy_from_slice(&derived[48..80]);
    derived.zeroize();

    Ok(KeyMaterial { rng_key, rng_iv, auth_key })
}

// ============================================================
// Keystream (AES-256-CTR)
// ============================================================

/// Append-only AES-256-CTR keystream shared by the shuffle phase and the
/// payload phase. Never rewound: every draw advances the one stream both
/// sides of the codec rely on.
struct KeyStream {
    ctr: Ctr128BE<Aes256>,
}

impl KeyStream {
    fn new(key: &[u8; 32], iv: &[u8; 16]) -> Self {
        let ctr = Ctr128BE::<Aes256>::new(Ga::from_slice(key), Ga::from_slice(iv));
        KeyStream { ctr }
    }

    fn next_bytes(&mut self, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        self.ctr.apply_keystream(&mut buf);
        buf
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.ctr.apply_keystream(&mut buf);
        u64::from_be_bytes(buf)
    }

    /// 53-bit-precision float in `[0, 1)`.
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }
}

/// Fisher–Yates, high index down, one float per step.
fn keystream_shuffle(glyphs: &mut [char], rng: &mut KeyStream) {
    for i in (1..glyphs.len()).rev() {
        let j = (rng.next_f64() * (i as f64 + 1.0)) as usize;
        glyphs.swap(i, j);
    }
}

// ============================================================
// Base-1024 block codec
// ============================================================

/// 5 bytes as a little-endian 40-bit integer, split into 4 base-1024
/// digits, least significant first. 1024^4 > 2^40, so no digit overflows.
fn block_to_digits(block: &[u8; BLOCK_LEN]) -> [usize; DIGITS_PER_BLOCK] {
    let mut v = 0u64;
    for (i, &b) in block.iter().enumerate() {
        v |= (b as u64) << (8 * i);
    }
    let mut digits = [0usize; DIGITS_PER_BLOCK];
    for d in digits.iter_mut() {
        *d = (v % DATA_BASE) as usize;
        v /= DATA_BASE;
    }
    digits
}

fn digits_to_block(digits: &[usize; DIGITS_PER_BLOCK]) -> [u8; BLOCK_LEN] {
    let mut v = 0u64;
    for &d in digits.iter().rev() {
        v = v * DATA_BASE + d as u64;
    }
    let mut block = [0u8; BLOCK_LEN];
    for (i, b) in block.iter_mut().enumerate() {
        *b = (v >> (8 * i)) as u8;
    }
    block
}

// ============================================================
// Keyword tokenizer
// ============================================================

fn is_word_token(w: &str) -> bool {
    w.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

// One alternation over the whole vocabulary. The `#`-anchored forms come
// first so `#include` wins at the `#` rather than leaking it into a data
// run; word-like forms sit inside ASCII word boundaries, longest first.
static KEYWORD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let mut symbolic: Vec<&str> = Vec::new();
    let mut wordy: Vec<&str> = Vec::new();
    for &w in KEYWORDS.iter() {
        if is_word_token(w) {
            wordy.push(w);
        } else {
            symbolic.push(w);
        }
    }
    wordy.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut alts: Vec<String> = symbolic.iter().map(|w| regex::escape(w)).collect();
    alts.push(format!("(?-u:\\b)(?:{})(?-u:\\b)", wordy.join("|")));
    Regex::new(&alts.join("|")).expect("keyword pattern compiles")
});

static KEYWORD_INDEX: Lazy<HashMap<&'static [u8], usize>> =
    Lazy::new(|| KEYWORDS.iter().enumerate().map(|(i, w)| (w.as_bytes(), i)).collect());

// ============================================================
// Header line
// ============================================================

/// Fields parsed out of a `.mojic` header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub salt: Vec<u8>,
    pub auth_check: [u8; AUTH_CHECK_LEN],
}

/// Parses the header line of `text` (everything before the first `'\n'`).
/// Pure: no engine state, usable before deciding whether to derive keys.
///
/// The salt hex is whatever precedes the final 8 hex chars, so legacy
/// headers with shorter salts still parse.
pub fn decode_header(text: &str) -> Result<Header, MojicError> {
    let line = text.split('\n').next().unwrap_or("").trim_end_matches('\r');

    let mut hex_chars = String::new();
    for g in line.chars() {
        match header_nibble(g) {
            Some(n) => hex_chars.push(char::from_digit(n as u32, 16).expect("nibble")),
            None => return Err(MojicError::InvalidHeader),
        }
    }
    if hex_chars.len() < 2 * AUTH_CHECK_LEN + 1 {
        return Err(MojicError::InvalidHeader);
    }

    let (salt_hex, check_hex) = hex_chars.split_at(hex_chars.len() - 2 * AUTH_CHECK_LEN);
    let salt = hex::decode(salt_hex).map_err(|_| MojicError::InvalidHeader)?;
    let check = hex::decode(check_hex).map_err(|_| MojicError::InvalidHeader)?;
    let mut auth_check = [0u8; AUTH_CHECK_LEN];
    auth_check.copy_from_slice(&check);

    Ok(Header { salt, auth_check })
}

// ============================================================
// Encode pass
// ============================================================

struct EncodeState<'a> {
    rng: &'a mut KeyStream,
    ring: &'a [char],
    data: &'a [char],
    mac: HmacSha256,
    out: String,
    pending: Vec<u8>,
    wrapped: usize, // payload bytes since the last forced newline
}

impl EncodeState<'_> {
    fn emit_glyph(&mut self, g: char) {
        let mut buf = [0u8; 4];
        let bytes = g.encode_utf8(&mut buf).as_bytes();
        self.mac.update(bytes);
        self.out.push(g);
        self.wrapped += bytes.len();
        if self.wrapped > LINE_WRAP_BYTES {
            // Cosmetic wrap only: the newline is invisible to the seal and
            // to the decoder.
            self.out.push('\n');
            self.wrapped = 0;
        }
    }

    fn emit_block(&mut self, block: [u8; BLOCK_LEN]) {
        let mask = self.rng.next_bytes(BLOCK_LEN);
        let mut whitened = block;
        for (b, m) in whitened.iter_mut().zip(&mask) {
            *b ^= m;
        }
        for d in block_to_digits(&whitened) {
            self.emit_glyph(self.data[d]);
        }
    }

    fn push_data(&mut self, run: &[u8]) {
        self.pending.extend_from_slice(run);
        while self.pending.len() >= BLOCK_LEN {
            let mut block = [0u8; BLOCK_LEN];
            block.copy_from_slice(&self.pending[..BLOCK_LEN]);
            self.pending.drain(..BLOCK_LEN);
            self.emit_block(block);
        }
    }

    /// Zero-pads whatever is buffered out to a full block. Runs at
    /// end-of-input and before every keyword glyph; the decoder strips the
    /// padding again.
    fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let mut block = [0u8; BLOCK_LEN];
        block[..self.pending.len()].copy_from_slice(&self.pending);
        self.pending.clear();
        self.emit_block(block);
    }

    fn emit_keyword(&mut self, base: usize) {
        self.flush_pending();
        let shift = (self.rng.next_u64() % KEYWORDS.len() as u64) as usize;
        let slot = (base + shift) % KEYWORDS.len();
        self.emit_glyph(self.ring[slot]);
    }

    fn finish(mut self) -> String {
        self.flush_pending();
        let tag = self.mac.finalize().into_bytes();
        self.out.push('\n');
        header_encode(&tag, &mut self.out);
        self.out
    }
}

// ============================================================
// Decode pass
// ============================================================

struct DecodeState<'a> {
    rng: &'a mut KeyStream,
    keyword_slot: &'a HashMap<char, usize>,
    data_digit: &'a HashMap<char, usize>,
    mac: HmacSha256,
    out: Vec<u8>,
    digits: Vec<usize>,
    window: VecDeque<char>,
}

impl DecodeState<'_> {
    /// Runs every non-whitespace atom through the 64-slot reservation
    /// window: an atom is only classified once 64 newer atoms stand behind
    /// it, so whatever remains at end-of-stream is the footer.
    fn push_atom(&mut self, g: char) -> Result<(), MojicError> {
        if self.window.len() == FOOTER_GLYPHS {
            if let Some(released) = self.window.pop_front() {
                self.consume(released)?;
            }
        }
        self.window.push_back(g);
        Ok(())
    }

    fn consume(&mut self, g: char) -> Result<(), MojicError> {
        let mut buf = [0u8; 4];
        self.mac.update(g.encode_utf8(&mut buf).as_bytes());

        if let Some(&slot) = self.keyword_slot.get(&g) {
            // A keyword glyph cuts off any partial block; the encoder never
            // leaves one here, so stale digits mean corruption the seal
            // will catch.
            self.digits.clear();
            let shift = (self.rng.next_u64() % KEYWORDS.len() as u64) as usize;
            let base = (slot + KEYWORDS.len() - shift) % KEYWORDS.len();
            self.out.extend_from_slice(KEYWORDS[base].as_bytes());
        } else if let Some(&d) = self.data_digit.get(&g) {
            self.digits.push(d);
            if self.digits.len() == DIGITS_PER_BLOCK {
                let mut digits = [0usize; DIGITS_PER_BLOCK];
                digits.copy_from_slice(&self.digits);
                self.digits.clear();

                let whitened = digits_to_block(&digits);
                let mask = self.rng.next_bytes(BLOCK_LEN);
                let mut plain = whitened;
                for (b, m) in plain.iter_mut().zip(&mask) {
                    *b ^= m;
                }
                // Trailing NULs are flush padding, not plaintext.
                let mut len = BLOCK_LEN;
                while len > 0 && plain[len - 1] == 0 {
                    len -= 1;
                }
                self.out.extend_from_slice(&plain[..len]);
            }
        } else {
            return Err(MojicError::InvalidGlyph(g));
        }
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, MojicError> {
        if self.window.len() < FOOTER_GLYPHS {
            return Err(MojicError::FileTruncated(self.window.len()));
        }
        let mut given = String::with_capacity(FOOTER_GLYPHS);
        for &g in &self.window {
            match header_nibble(g) {
                Some(n) => given.push(char::from_digit(n as u32, 16).expect("nibble")),
                None => return Err(MojicError::InvalidFooter(g)),
            }
        }
        let tag = self.mac.finalize().into_bytes();
        if given != hex::encode(tag) {
            return Err(MojicError::FileTampered);
        }
        Ok(self.out)
    }
}

// ============================================================
// Engine
// ============================================================

/// Per-pass state built by [`MojicEngine::init`]. The keystream and the
/// MAC are monotonic, so a session drives exactly one pass.
struct Session {
    salt: Vec<u8>,
    auth_check: [u8; AUTH_CHECK_LEN],
    rng: KeyStream,
    mac: Option<HmacSha256>,
    keyword_ring: Vec<char>,
    data_alphabet: Vec<char>,
    keyword_slot: HashMap<char, usize>,
    data_digit: HashMap<char, usize>,
}

/// Symmetric streaming codec between C source and emoji glyph streams.
///
/// Lifecycle: [`new`](Self::new) with a password, [`init`](Self::init)
/// once, then exactly one of the encode pair
/// ([`encode_header`](Self::encode_header) +
/// [`encode_stream`](Self::encode_stream)) or
/// [`decode_stream`](Self::decode_stream). The integrity state is consumed
/// at finalization; a second stream on the same engine fails with
/// [`MojicError::EngineNotInitialized`].
pub struct MojicEngine {
    password: String,
    session: Option<Session>,
}

impl MojicEngine {
    /// Construction never fails; key derivation happens in `init`.
    pub fn new(password: &str) -> Self {
        MojicEngine { password: password.to_owned(), session: None }
    }

    /// Derives key material and binds the glyph alphabets.
    ///
    /// Encode passes leave `salt` as `None` to draw a fresh 32-byte salt.
    /// Decode passes supply the salt and auth check parsed from the header;
    /// a mismatched auth check fails with [`MojicError::WrongPassword`]
    /// before any stream work.
    pub fn init(
        &mut self,
        salt: Option<&[u8]>,
        auth_check: Option<[u8; AUTH_CHECK_LEN]>,
    ) -> Result<(), MojicError> {
        let raw = RAW_ALPHABET.as_slice();
        if raw.len() < MIN_RAW_ALPHABET {
            return Err(MojicError::AlphabetUnderflow(raw.len()));
        }

        let salt: Vec<u8> = match salt {
            Some(s) => s.to_vec(),
            None => {
                let mut s = [0u8; SALT_LEN];
                OsRng.fill_bytes(&mut s);
                s.to_vec()
            }
        };

        let km = derive_key_material(self.password.as_bytes(), &salt)?;
        let check = km.auth_check();
        if let Some(expected) = auth_check {
            if expected != check {
                return Err(MojicError::WrongPassword);
            }
        }

        let mut rng = KeyStream::new(&km.rng_key, &km.rng_iv);
        let mut shuffled = raw.to_vec();
        keystream_shuffle(&mut shuffled, &mut rng);

        let keyword_ring: Vec<char> = shuffled[..KEYWORDS.len()].to_vec();
        let data_alphabet: Vec<char> =
            shuffled[KEYWORDS.len()..KEYWORDS.len() + DATA_ALPHABET_LEN].to_vec();
        let keyword_slot: HashMap<char, usize> =
            keyword_ring.iter().enumerate().map(|(i, &g)| (g, i)).collect();
        let data_digit: HashMap<char, usize> =
            data_alphabet.iter().enumerate().map(|(i, &g)| (g, i)).collect();

        let mac = HmacSha256::new_from_slice(&km.auth_key).expect("HMAC accepts any key length");

        debug!(
            "session bound: {} ring glyphs, {} data glyphs, salt {} bytes",
            keyword_ring.len(),
            data_alphabet.len(),
            salt.len()
        );

        self.session = Some(Session {
            salt,
            auth_check: check,
            rng,
            mac: Some(mac),
            keyword_ring,
            data_alphabet,
            keyword_slot,
            data_digit,
        });
        Ok(())
    }

    /// The header line: hex(salt) then hex(auth check), one moon/clock
    /// glyph per nibble, newline-terminated.
    pub fn encode_header(&self) -> Result<String, MojicError> {
        let s = self.session.as_ref().ok_or(MojicError::EngineNotInitialized)?;
        let mut out = String::new();
        header_encode(&s.salt, &mut out);
        header_encode(&s.auth_check, &mut out);
        out.push('\n');
        Ok(out)
    }

    /// Encodes `plaintext` into the body and footer of a `.mojic` file.
    ///
    /// Keywords become single ring glyphs with a per-occurrence shift;
    /// everything else is buffered, whitened in 5-byte blocks, and packed
    /// as base-1024 data glyphs. The footer seals the emitted glyph bytes
    /// (line wraps excluded) with HMAC-SHA256.
    pub fn encode_stream(&mut self, plaintext: &[u8]) -> Result<String, MojicError> {
        let s = self.session.as_mut().ok_or(MojicError::EngineNotInitialized)?;
        let mac = s.mac.take().ok_or(MojicError::EngineNotInitialized)?;

        let mut st = EncodeState {
            rng: &mut s.rng,
            ring: &s.keyword_ring,
            data: &s.data_alphabet,
            mac,
            out: String::new(),
            pending: Vec::new(),
            wrapped: 0,
        };

        let mut last = 0;
        for m in KEYWORD_PATTERN.find_iter(plaintext) {
            st.push_data(&plaintext[last..m.start()]);
            let base = *KEYWORD_INDEX.get(m.as_bytes()).expect("match is a vocabulary token");
            st.emit_keyword(base);
            last = m.end();
        }
        st.push_data(&plaintext[last..]);

        debug!("encoded {} plaintext bytes", plaintext.len());
        Ok(st.finish())
    }

    /// Decodes the body + footer of a `.mojic` file (everything after the
    /// header line) back into plaintext, verifying the integrity seal.
    pub fn decode_stream(&mut self, payload: &str) -> Result<Vec<u8>, MojicError> {
        let s = self.session.as_mut().ok_or(MojicError::EngineNotInitialized)?;
        let mac = s.mac.take().ok_or(MojicError::EngineNotInitialized)?;

        let mut st = DecodeState {
            rng: &mut s.rng,
            keyword_slot: &s.keyword_slot,
            data_digit: &s.data_digit,
            mac,
            out: Vec::new(),
            digits: Vec::new(),
            window: VecDeque::with_capacity(FOOTER_GLYPHS + 1),
        };

        for ch in payload.chars() {
            // Whitespace is transparent; everything else is one atom, even
            // when a renderer would have clustered it with a neighbor.
            if ch.is_whitespace() {
                continue;
            }
            st.push_atom(ch)?;
        }

        let out = st.finish()?;
        debug!("decoded {} plaintext bytes", out.len());
        Ok(out)
    }
}

// ============================================================
// Tests
// ============================================================
