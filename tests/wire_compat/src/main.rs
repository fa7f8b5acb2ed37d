fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use peerdrop_protocol::{FrameHeader, MessageKind, TransferMessage, decode_frame, encode_frame};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent comparison).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  ours:    {reserialized}"
        );
        parsed
    }

    /// Builds a frame by hand from a fixture header and a payload.
    fn raw_frame(name: &str, payload: &[u8]) -> Vec<u8> {
        let header = serde_json::to_vec(&load_fixture(name)).unwrap();
        let mut frame = (header.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(&header);
        frame.extend_from_slice(payload);
        frame
    }

    // --- Header tests ---

    #[test]
    fn fixture_announce_header() {
        let header: FrameHeader = roundtrip_test("announce.json");
        let FrameHeader::Announce(meta) = &header else {
            panic!("expected announce, got {header:?}");
        };
        assert_eq!(meta.file_name, "holiday photo.jpg");
        assert_eq!(meta.total_size_bytes, 40_000);
        assert_eq!(meta.mime_type, "image/jpeg");
    }

    #[test]
    fn fixture_ack_header() {
        let header: FrameHeader = roundtrip_test("ack.json");
        assert_eq!(header.kind(), MessageKind::Ack);
    }

    #[test]
    fn fixture_chunk_header() {
        let header: FrameHeader = roundtrip_test("chunk_header.json");
        assert_eq!(header.kind(), MessageKind::Chunk);
    }

    #[test]
    fn fixture_finish_header() {
        let header: FrameHeader = roundtrip_test("finish.json");
        assert_eq!(header.kind(), MessageKind::Finish);
    }

    // --- Frame tests ---

    #[test]
    fn hand_built_chunk_frame_decodes() {
        let msg = decode_frame(raw_frame("chunk_header.json", b"payload")).unwrap();
        assert_eq!(
            msg,
            TransferMessage::chunk(
                "3f2b8c1e-5a47-4d0e-9c61-7e1f0a2b9d44".into(),
                2,
                b"payload".to_vec()
            )
        );
    }

    #[test]
    fn encoded_frames_match_fixture_headers() {
        for name in ["announce.json", "ack.json", "finish.json"] {
            let msg = decode_frame(raw_frame(name, &[])).unwrap();
            let frame = encode_frame(&msg).unwrap();

            let header_len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
            assert_eq!(frame.len(), 4 + header_len, "{name}: unexpected payload");
            let header: serde_json::Value = serde_json::from_slice(&frame[4..]).unwrap();
            assert_eq!(header, load_fixture(name), "{name}");
        }
    }

    #[test]
    fn payload_on_announce_rejected() {
        assert!(decode_frame(raw_frame("announce.json", b"extra")).is_err());
    }

    #[test]
    fn unknown_message_type_rejected() {
        let mut fixture = load_fixture("ack.json");
        fixture["type"] = serde_json::json!("offer");
        let header = serde_json::to_vec(&fixture).unwrap();
        let mut frame = (header.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(&header);
        assert!(decode_frame(frame).is_err());
    }
}
