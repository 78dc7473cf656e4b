#[path = "common/mod.rs"]
mod common;

use common::*;
use reviewetl::{Compression, LineReassembler, ReassembledLines};
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn collect<R: std::io::Read>(lines: ReassembledLines<R>) -> Vec<String> {
    lines.map(|l| l.unwrap()).collect()
}

/// The same logical content split at every chunk size from 1 byte up yields the same lines.
#[test]
fn chunk_boundaries_do_not_change_lines() {
    let lines: Vec<String> = (0..40).map(|i| review_line(&format!("U{i}"), "A1", AFTER_CUTOFF_MS)).collect();
    let raw = jsonl(&lines);

    let reference = collect(ReassembledLines::with_chunk_size(Cursor::new(raw.clone()), 64 * 1024));
    assert_eq!(reference, lines);

    for chunk in [1, 2, 3, 7, 13, 64, 255, 4096] {
        let got = collect(ReassembledLines::with_chunk_size(Cursor::new(raw.clone()), chunk));
        assert_eq!(got, reference, "chunk size {chunk}");

        // Short reads from the transport must not matter either.
        let trickled = Trickle { inner: Cursor::new(raw.clone()), step: chunk };
        let got = collect(ReassembledLines::with_chunk_size(trickled, 8192));
        assert_eq!(got, reference, "trickle step {chunk}");
    }
}

#[test]
fn final_unterminated_line_is_emitted() {
    let got = collect(ReassembledLines::with_chunk_size(Cursor::new(b"a\nb\nlast".to_vec()), 3));
    assert_eq!(got, vec!["a", "b", "last"]);

    let got = collect(ReassembledLines::new(Cursor::new(b"a\nb\n".to_vec())));
    assert_eq!(got, vec!["a", "b"], "trailing newline adds no empty line");

    assert!(collect(ReassembledLines::new(Cursor::new(Vec::new()))).is_empty());
}

#[test]
fn crlf_and_blank_lines() {
    let got = collect(ReassembledLines::with_chunk_size(Cursor::new(b"x\r\n\r\ny\r\n".to_vec()), 1));
    assert_eq!(got, vec!["x", "", "y"]);
}

#[test]
fn invalid_utf8_is_replaced_not_fatal() {
    let mut raw = b"ok\n".to_vec();
    raw.extend_from_slice(&[b'b', 0xff, 0xfe, b'd', b'\n']);
    raw.extend_from_slice(b"after\n");
    let got = collect(ReassembledLines::with_chunk_size(Cursor::new(raw), 2));
    assert_eq!(got.len(), 3);
    assert_eq!(got[0], "ok");
    assert!(got[1].starts_with('b') && got[1].ends_with('d'));
    assert!(got[1].contains('\u{FFFD}'));
    assert_eq!(got[2], "after");
}

/// Multi-byte characters split across chunks are reassembled before decoding.
#[test]
fn multibyte_split_across_chunks() {
    let text = "caf\u{e9} \u{1F600}\nnext\n";
    let got = collect(ReassembledLines::with_chunk_size(Cursor::new(text.as_bytes().to_vec()), 1));
    assert_eq!(got, vec!["caf\u{e9} \u{1F600}", "next"]);
}

/// Stopping after a few lines leaves most of a large source unread.
#[test]
fn early_abandon_reads_little() {
    let lines: Vec<String> = (0..20_000).map(|i| review_line(&format!("U{i}"), "A1", AFTER_CUTOFF_MS)).collect();
    let raw = jsonl(&lines);
    let total = raw.len() as u64;

    let served = Arc::new(AtomicU64::new(0));
    let reader = MeteredReader { inner: Cursor::new(raw), served: served.clone(), pos: 0, fail_after: None };
    let first: Vec<String> = ReassembledLines::with_chunk_size(reader, 4096).take(5).map(|l| l.unwrap()).collect();

    assert_eq!(first.len(), 5);
    assert_eq!(first[4], lines[4]);
    let read = served.load(Ordering::Relaxed);
    assert!(read <= 4096, "read {read} of {total} bytes for five lines");
}

#[test]
fn read_error_is_yielded_once_then_ends() {
    let raw = jsonl(&["one".to_string(), "two".to_string(), "three".to_string()]);
    let reader = MeteredReader { inner: Cursor::new(raw), served: Arc::new(AtomicU64::new(0)), pos: 0, fail_after: Some(6) };
    let mut it = ReassembledLines::with_chunk_size(reader, 4);

    assert_eq!(it.next().unwrap().unwrap(), "one");
    assert!(it.next().unwrap().is_err());
    assert!(it.next().is_none());
}

#[test]
fn reassembler_state_is_explicit() {
    let mut r = LineReassembler::new();
    r.push(b"{\"a\":");
    assert_eq!(r.next_line(), None);
    assert_eq!(r.pending_len(), 5);
    r.push(b"1}\n{\"b\"");
    assert_eq!(r.next_line().as_deref(), Some("{\"a\":1}"));
    assert_eq!(r.next_line(), None);
    r.push(b":2}");
    assert_eq!(r.finish().as_deref(), Some("{\"b\":2}"));
    assert_eq!(r.pending_len(), 0);
    assert_eq!(r.finish(), None);
}

/// Gzip (including concatenated members) and zstd decode into the same lines.
#[test]
fn compressed_sources_decode_to_lines() {
    let lines: Vec<String> = (0..100).map(|i| review_line(&format!("U{i}"), "A1", AFTER_CUTOFF_MS)).collect();
    let (head, tail) = lines.split_at(37);

    let mut multi = gzip_bytes(&jsonl(head));
    multi.extend(gzip_bytes(&jsonl(tail)));
    let dec = Compression::from_name("x/Books.jsonl.gz").decoder(Box::new(Cursor::new(multi))).unwrap();
    assert_eq!(collect(ReassembledLines::with_chunk_size(dec, 333)), lines);

    let dir = tempfile::tempdir().unwrap();
    let zst = dir.path().join("Books.jsonl.zst");
    write_zst_lines(&zst, &lines);
    let f = std::fs::File::open(&zst).unwrap();
    let dec = Compression::from_name(&zst.to_string_lossy()).decoder(Box::new(f)).unwrap();
    assert_eq!(collect(ReassembledLines::new(dec)), lines);
}

#[test]
fn compression_from_name() {
    assert_eq!(Compression::from_name("https://h/x/All_Beauty.jsonl.gz"), Compression::Gzip);
    assert_eq!(Compression::from_name("https://h/x/All_Beauty.jsonl.GZ?download=1"), Compression::Gzip);
    assert_eq!(Compression::from_name("/data/Books.jsonl.zst"), Compression::Zstd);
    assert_eq!(Compression::from_name("/data/Books.jsonl"), Compression::Plain);
}
