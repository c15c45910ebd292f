//! End-to-end behavior of the emoji codec: round trips, polymorphic
//! keyword emission, whitening, and every failure verdict a damaged or
//! mis-keyed file can produce.

use mojic::{decode_header, MojicEngine, MojicError};

const SALT: [u8; 32] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E,
    0x0F, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C, 0x1D,
    0x1E, 0x1F,
];

fn encode_with_salt(password: &str, salt: &[u8; 32], plain: &[u8]) -> String {
    let mut engine = MojicEngine::new(password);
    engine.init(Some(salt), None).unwrap();
    let mut file = engine.encode_header().unwrap();
    file.push_str(&engine.encode_stream(plain).unwrap());
    file
}

fn encode_fresh(password: &str, plain: &[u8]) -> String {
    let mut engine = MojicEngine::new(password);
    engine.init(None, None).unwrap();
    let mut file = engine.encode_header().unwrap();
    file.push_str(&engine.encode_stream(plain).unwrap());
    file
}

fn decode(password: &str, file: &str) -> Result<Vec<u8>, MojicError> {
    let header = decode_header(file)?;
    let mut engine = MojicEngine::new(password);
    engine.init(Some(&header.salt), Some(header.auth_check))?;
    let payload = file.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    engine.decode_stream(payload)
}

/// Non-whitespace glyphs after the header line: body then 64 footer glyphs.
fn payload_glyphs(file: &str) -> Vec<char> {
    let payload = file.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    payload.chars().filter(|c| !c.is_whitespace()).collect()
}

fn body_glyphs(file: &str) -> Vec<char> {
    let mut glyphs = payload_glyphs(file);
    assert!(glyphs.len() >= 64, "file too short to hold a seal");
    glyphs.truncate(glyphs.len() - 64);
    glyphs
}

fn is_seal_glyph(g: char) -> bool {
    let cp = g as u32;
    (0x1F311..=0x1F318).contains(&cp) || (0x1F550..=0x1F557).contains(&cp)
}

#[test]
fn minimal_program_has_the_expected_shape() {
    let file = encode_with_salt("hunter2", &SALT, b"int x;\n");

    let header_line = file.split_once('\n').unwrap().0;
    assert_eq!(header_line.chars().count(), 72);
    assert!(header_line.chars().all(is_seal_glyph));

    // `int` is one ring glyph; " x;\n" pads to one 5-byte block = 4 glyphs.
    let body = body_glyphs(&file);
    assert_eq!(body.len(), 5);

    let glyphs = payload_glyphs(&file);
    assert!(glyphs[glyphs.len() - 64..].iter().all(|&g| is_seal_glyph(g)));

    assert_eq!(decode("hunter2", &file).unwrap(), b"int x;\n");
}

#[test]
fn encode_is_deterministic_for_a_fixed_salt() {
    let plain = b"for (int i = 0; i < n; i++) { printf(\"%d\\n\", i); }\n";
    let a = encode_with_salt("hunter2", &SALT, plain);
    let b = encode_with_salt("hunter2", &SALT, plain);
    assert_eq!(a, b);
}

#[test]
fn repeated_keywords_land_on_different_glyphs() {
    // Body layout: ring glyph, 4-glyph block, ring glyph, 4-glyph block,
    // ring glyph, 4-glyph block, so the `int`s sit at 0, 5, 10.
    let file = encode_with_salt("hunter2", &SALT, b"int a; int b; int c;\n");
    let body = body_glyphs(&file);
    assert_eq!(body.len(), 15);

    let ints = [body[0], body[5], body[10]];
    assert!(
        ints[0] != ints[1] || ints[1] != ints[2],
        "three occurrences all mapped to {:?}",
        ints[0]
    );

    assert_eq!(decode("hunter2", &file).unwrap(), b"int a; int b; int c;\n");
}

#[test]
fn keyword_emission_walks_the_whole_ring() {
    let plain = "int ".repeat(200);
    let file = encode_with_salt("hunter2", &SALT, plain.as_bytes());
    let body = body_glyphs(&file);
    assert_eq!(body.len(), 1 + 199 * 5 + 4);

    let mut seen = std::collections::HashSet::new();
    for k in 0..200 {
        seen.insert(body[k * 5]);
    }
    assert!(
        seen.len() >= 25,
        "200 occurrences only reached {} ring glyphs",
        seen.len()
    );

    assert_eq!(decode("hunter2", &file).unwrap(), plain.as_bytes());
}

#[test]
fn identical_blocks_whiten_differently() {
    // Three identical 5-byte groups; the rotating mask must separate them.
    let file = encode_with_salt("hunter2", &SALT, b"    \n    \n    \n");
    let body = body_glyphs(&file);
    assert_eq!(body.len(), 12);

    let blocks: Vec<&[char]> = body.chunks(4).collect();
    assert_ne!(blocks[0], blocks[1]);
    assert_ne!(blocks[1], blocks[2]);
    assert_ne!(blocks[0], blocks[2]);
}

#[test]
fn whitened_output_spreads_over_the_data_alphabet() {
    let plain = vec![b' '; 10_000];
    let file = encode_with_salt("hunter2", &SALT, &plain);
    let body = body_glyphs(&file);
    assert_eq!(body.len(), 4 * 2_000);

    let distinct: std::collections::HashSet<char> = body.iter().copied().collect();
    assert!(
        distinct.len() > 900,
        "8000 digits covered only {} of 1024 glyphs",
        distinct.len()
    );

    assert_eq!(decode("hunter2", &file).unwrap(), plain);
}

#[test]
fn swapped_payload_glyphs_break_the_seal() {
    let file = encode_with_salt("hunter2", &SALT, b"int x;\n");
    let (header_line, payload) = file.split_once('\n').unwrap();

    // Swap the first two distinct payload glyphs; both stay inside the
    // bound alphabets, so only the seal can notice.
    let mut chars: Vec<char> = payload.chars().collect();
    let a = 0;
    let b = (1..chars.len()).find(|&i| chars[i] != chars[a]).unwrap();
    chars.swap(a, b);
    let tampered: String = format!("{}\n{}", header_line, chars.into_iter().collect::<String>());

    assert_eq!(decode("hunter2", &tampered), Err(MojicError::FileTampered));
}

#[test]
fn foreign_glyph_is_rejected_outright() {
    let file = encode_with_salt("hunter2", &SALT, b"int x;\n");
    let (header_line, payload) = file.split_once('\n').unwrap();

    let mut chars: Vec<char> = payload.chars().collect();
    chars[0] = '\u{2764}'; // heavy black heart: outside every bound range
    let corrupted: String = format!("{}\n{}", header_line, chars.into_iter().collect::<String>());

    assert_eq!(
        decode("hunter2", &corrupted),
        Err(MojicError::InvalidGlyph('\u{2764}'))
    );
}

#[test]
fn wrong_password_fails_before_the_body() {
    let file = encode_with_salt("hunter2", &SALT, b"int x;\n");
    assert_eq!(decode("hunter3", &file), Err(MojicError::WrongPassword));
}

#[test]
fn short_stream_is_reported_as_truncated() {
    let file = encode_with_salt("hunter2", &SALT, b"int x;\n");
    let header_line = file.split_once('\n').unwrap().0;

    let stub: String = payload_glyphs(&file).into_iter().take(10).collect();
    let truncated = format!("{}\n{}", header_line, stub);
    assert_eq!(decode("hunter2", &truncated), Err(MojicError::FileTruncated(10)));
}

#[test]
fn dropping_the_final_glyph_corrupts_the_footer() {
    let file = encode_with_salt("hunter2", &SALT, b"int x;\n");
    let mut chopped: Vec<char> = file.chars().collect();
    chopped.pop();
    let chopped: String = chopped.into_iter().collect();

    // The reservation window slides one payload glyph into the footer.
    assert!(matches!(
        decode("hunter2", &chopped),
        Err(MojicError::InvalidFooter(_))
    ));
}

#[test]
fn decode_ignores_inserted_whitespace() {
    let file = encode_with_salt("hunter2", &SALT, b"int x;\n");
    let (header_line, payload) = file.split_once('\n').unwrap();

    let mut spaced = String::new();
    for (i, g) in payload.chars().enumerate() {
        spaced.push(g);
        if i % 3 == 0 {
            spaced.push_str("\n \t");
        }
    }
    let reflowed = format!("{}\n{}", header_line, spaced);
    assert_eq!(decode("hunter2", &reflowed).unwrap(), b"int x;\n");
}

#[test]
fn fresh_salts_give_distinct_files_with_equal_plaintext() {
    let plain = b"while (1) { break; }\n";
    let a = encode_fresh("hunter2", plain);
    let b = encode_fresh("hunter2", plain);
    assert_ne!(a, b);
    assert_eq!(decode("hunter2", &a).unwrap(), plain);
    assert_eq!(decode("hunter2", &b).unwrap(), plain);
}

#[test]
fn password_rotation_locks_out_the_old_password() {
    let plain = b"static const char *tag = \"v1\";\n";
    let original = encode_fresh("hunter2", plain);

    let recovered = decode("hunter2", &original).unwrap();
    let rotated = encode_fresh("correct horse", &recovered);

    assert_eq!(decode("correct horse", &rotated).unwrap(), plain);
    assert_eq!(decode("hunter2", &rotated), Err(MojicError::WrongPassword));
}

#[test]
fn a_realistic_source_file_survives_the_trip() {
    let plain = br#"#include <stdio.h>
#include <stdlib.h>
#define LIMIT 64

struct counter {
    unsigned long hits;
    double mean;
};

static int bump(struct counter *c, double sample) {
    if (c == 0) {
        return -1;
    }
    c->hits++;
    c->mean += (sample - c->mean) / (double)c->hits;
    return 0;
}

int main(void) {
    struct counter c = {0, 0.0};
    for (int i = 0; i < LIMIT; i++) {
        switch (i % 3) {
        case 0:
            bump(&c, (double)i);
            break;
        default:
            continue;
        }
    }
    while (c.hits > 0 && c.mean < 100.0) {
        printf("hits=%lu mean=%f\n", c.hits, c.mean);
        break;
    }
    return 0;
}
"#;

    let file = encode_with_salt("correct horse", &SALT, plain);
    // Long enough to force cosmetic line wraps into the body.
    assert!(file.split_once('\n').unwrap().1.lines().count() > 2);
    assert_eq!(decode("correct horse", &file).unwrap(), plain.to_vec());
}

#[test]
fn empty_input_round_trips_to_empty() {
    let file = encode_with_salt("hunter2", &SALT, b"");
    assert_eq!(body_glyphs(&file).len(), 0);
    assert_eq!(decode("hunter2", &file).unwrap(), b"");
}
