//! End-to-end envelope tests: seal → open across text and file payloads,
//! plus tamper, truncation, and reordering detection.

use std::io::Cursor;

use ephem_core::EphemError;
use ephem_crypto::{generate_note_key, NoteKey, NONCE_SIZE, TAG_SIZE};
use ephem_envelope::{seal, EnvelopeReader, NotePayload, OpenedPayload, SealOptions};
use rand::rngs::OsRng;

fn seal_to_vec(payload: &NotePayload, key: &NoteKey, chunk_size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    seal(
        payload,
        key,
        &SealOptions { chunk_size },
        &mut OsRng,
        &mut out,
    )
    .unwrap();
    out
}

#[test]
fn text_note_roundtrip() {
    let key = generate_note_key(&mut OsRng).unwrap();
    let envelope = seal_to_vec(&NotePayload::text("hello world"), &key, 1024);

    let reader = EnvelopeReader::new(Cursor::new(&envelope), &key).unwrap();
    assert_eq!(reader.payload(), OpenedPayload::Text);
    assert_eq!(reader.read_text().unwrap(), "hello world");
}

#[test]
fn empty_text_note_roundtrip() {
    let key = generate_note_key(&mut OsRng).unwrap();
    let envelope = seal_to_vec(&NotePayload::text(""), &key, 1024);

    let reader = EnvelopeReader::new(Cursor::new(&envelope), &key).unwrap();
    assert_eq!(reader.read_text().unwrap(), "");
}

#[test]
fn wrong_key_fails_at_header() {
    let key = generate_note_key(&mut OsRng).unwrap();
    let other = generate_note_key(&mut OsRng).unwrap();
    let envelope = seal_to_vec(&NotePayload::text("secret"), &key, 1024);

    let result = EnvelopeReader::new(Cursor::new(&envelope), &other);
    assert!(matches!(result, Err(EphemError::Decryption)));
}

#[test]
fn unknown_version_is_explicit() {
    let key = generate_note_key(&mut OsRng).unwrap();
    let mut envelope = seal_to_vec(&NotePayload::text("x"), &key, 1024);
    envelope[0] = 9;

    let result = EnvelopeReader::new(Cursor::new(&envelope), &key);
    assert!(matches!(result, Err(EphemError::UnsupportedFormat(9))));
}

#[test]
fn multi_chunk_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.bin");
    // 10_000 bytes in 1 KiB chunks -> 10 chunks
    let content: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, &content).unwrap();

    let key = generate_note_key(&mut OsRng).unwrap();
    let payload = NotePayload::from_files(&[&path]).unwrap();
    let mut envelope = Vec::new();
    let summary = seal(
        &payload,
        &key,
        &SealOptions { chunk_size: 1024 },
        &mut OsRng,
        &mut envelope,
    )
    .unwrap();
    assert_eq!(summary.body_chunks, 10, "ceil(10000/1024) chunks");
    assert_eq!(summary.envelope_bytes, envelope.len() as u64);

    let reader = EnvelopeReader::new(Cursor::new(&envelope), &key).unwrap();
    let OpenedPayload::Files(metas) = reader.payload() else {
        panic!("expected files");
    };
    assert_eq!(metas.len(), 1);
    assert_eq!(metas[0].name, "data.bin");
    assert_eq!(metas[0].size, 10_000);

    reader
        .extract_files(|meta| {
            Ok(std::fs::File::create(dir.path().join(format!("out-{}", meta.name)))?)
        })
        .unwrap();
    let restored = std::fs::read(dir.path().join("out-data.bin")).unwrap();
    assert_eq!(restored, content, "byte-identical after roundtrip");
}

#[test]
fn multiple_files_preserve_order_and_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.png");
    std::fs::write(&a, b"first file").unwrap();
    std::fs::write(&b, vec![0xEEu8; 3000]).unwrap();

    let key = generate_note_key(&mut OsRng).unwrap();
    let payload = NotePayload::from_files(&[&a, &b]).unwrap();
    let envelope = seal_to_vec(&payload, &key, 512);

    let reader = EnvelopeReader::new(Cursor::new(&envelope), &key).unwrap();
    let mut seen = Vec::new();
    reader
        .extract_files(|meta| {
            seen.push(meta.name.clone());
            Ok(std::fs::File::create(dir.path().join(format!("out-{}", meta.name)))?)
        })
        .unwrap();

    assert_eq!(seen, vec!["a.txt", "b.png"], "descriptor order preserved");
    assert_eq!(
        std::fs::read(dir.path().join("out-a.txt")).unwrap(),
        b"first file"
    );
    assert_eq!(
        std::fs::read(dir.path().join("out-b.png")).unwrap(),
        vec![0xEEu8; 3000]
    );
}

/// Offset of the first body chunk's length prefix within an envelope.
fn first_body_chunk_offset(envelope: &[u8]) -> usize {
    let header_len = u32::from_be_bytes(
        envelope[1 + NONCE_SIZE..1 + NONCE_SIZE + 4]
            .try_into()
            .unwrap(),
    ) as usize;
    1 + NONCE_SIZE + 4 + header_len
}

#[test]
fn bit_flip_in_body_chunk_is_detected() {
    let key = generate_note_key(&mut OsRng).unwrap();
    let mut envelope = seal_to_vec(&NotePayload::text("hello world"), &key, 1024);

    let body = first_body_chunk_offset(&envelope);
    envelope[body + 4 + 2] ^= 0x01;

    let reader = EnvelopeReader::new(Cursor::new(&envelope), &key).unwrap();
    assert!(matches!(reader.read_text(), Err(EphemError::Decryption)));
}

#[test]
fn truncating_final_chunk_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("f.bin");
    std::fs::write(&path, vec![7u8; 2048]).unwrap();

    let key = generate_note_key(&mut OsRng).unwrap();
    let payload = NotePayload::from_files(&[&path]).unwrap();
    // 2048 bytes in 1024-byte chunks -> 2 chunks
    let envelope = seal_to_vec(&payload, &key, 1024);

    // Drop the entire final chunk (length prefix + ciphertext)
    let body = first_body_chunk_offset(&envelope);
    let first_ct_len =
        u32::from_be_bytes(envelope[body..body + 4].try_into().unwrap()) as usize;
    let truncated = &envelope[..body + 4 + first_ct_len];

    let reader = EnvelopeReader::new(Cursor::new(truncated), &key).unwrap();
    let result = reader.extract_files(|_| Ok(std::io::sink()));
    assert!(
        matches!(result, Err(EphemError::CorruptEnvelope(_))),
        "dropping the final chunk must not yield a silently short file"
    );
}

#[test]
fn reordering_chunks_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("f.bin");
    std::fs::write(&path, vec![3u8; 2048]).unwrap();

    let key = generate_note_key(&mut OsRng).unwrap();
    let payload = NotePayload::from_files(&[&path]).unwrap();
    let envelope = seal_to_vec(&payload, &key, 1024);

    // Swap the two body chunks wholesale
    let body = first_body_chunk_offset(&envelope);
    let len1 = u32::from_be_bytes(envelope[body..body + 4].try_into().unwrap()) as usize;
    let c1_end = body + 4 + len1;
    let chunk1 = envelope[body..c1_end].to_vec();
    let chunk2 = envelope[c1_end..].to_vec();
    let mut swapped = envelope[..body].to_vec();
    swapped.extend_from_slice(&chunk2);
    swapped.extend_from_slice(&chunk1);

    let reader = EnvelopeReader::new(Cursor::new(&swapped), &key).unwrap();
    let result = reader.extract_files(|_| Ok(std::io::sink()));
    assert!(
        matches!(
            result,
            Err(EphemError::Decryption) | Err(EphemError::CorruptEnvelope(_))
        ),
        "reordered chunks must fail authentication"
    );
}

#[test]
fn trailing_garbage_is_detected() {
    let key = generate_note_key(&mut OsRng).unwrap();
    let mut envelope = seal_to_vec(&NotePayload::text("tail"), &key, 1024);
    envelope.extend_from_slice(b"junk");

    let reader = EnvelopeReader::new(Cursor::new(&envelope), &key).unwrap();
    assert!(matches!(
        reader.read_text(),
        Err(EphemError::CorruptEnvelope(_))
    ));
}

#[test]
fn envelope_overhead_is_tag_per_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("f.bin");
    std::fs::write(&path, vec![1u8; 4096]).unwrap();

    let key = generate_note_key(&mut OsRng).unwrap();
    let payload = NotePayload::from_files(&[&path]).unwrap();
    let mut envelope = Vec::new();
    let summary = seal(
        &payload,
        &key,
        &SealOptions { chunk_size: 1024 },
        &mut OsRng,
        &mut envelope,
    )
    .unwrap();

    assert_eq!(summary.body_chunks, 4);
    // version + base nonce + 4 length-prefixed body chunks with one tag
    // each + length-prefixed header; no per-chunk nonce on the wire.
    let body_bytes: u64 = 4 * (4 + 1024 + TAG_SIZE as u64);
    assert!(summary.envelope_bytes > body_bytes);
    assert!(summary.envelope_bytes < body_bytes + 1024, "header stays small");
}
