#![cfg(feature = "monolith")]

use std::io::Write;

use multisample::monolith::{read_dictionary, read_dictionary_file, ReferenceKind};
use multisample::{CodecConfig, CodecError, CodecVariant, FormatSniffer};

fn directory(count: u32) -> Vec<u8> {
    let mut data = vec![0x54, 0xAC, 0x70, 0x5E];
    data.extend_from_slice(&[0u8; 10]);
    data.extend_from_slice(&count.to_le_bytes());
    data.extend_from_slice(&[0u8; 4]);
    data
}

fn entry(kind: u16, offset: u32, name: &str) -> Vec<u8> {
    let mut content: Vec<u8> = name.encode_utf16().flat_map(u16::to_le_bytes).collect();
    content.extend_from_slice(&[0, 0]);
    let mut data = Vec::new();
    data.extend_from_slice(&(content.len() as u16 + 8).to_le_bytes());
    data.extend_from_slice(&offset.to_le_bytes());
    data.extend_from_slice(&kind.to_le_bytes());
    data.extend_from_slice(&content);
    data
}

#[test]
fn declared_count_beyond_input_fails() {
    let mut data = directory(3);
    data.extend_from_slice(&entry(2, 0x100, "one.wav"));
    data.extend_from_slice(&entry(2, 0x200, "two.wav"));
    assert_eq!(
        FormatSniffer::sniff_bytes(&data).unwrap().variant,
        CodecVariant::Monolith
    );

    let err = read_dictionary(&data, &CodecConfig::default()).unwrap_err();
    assert!(
        matches!(
            err,
            CodecError::UnexpectedEof { .. } | CodecError::MalformedContainer(_)
        ),
        "{err}"
    );
}

#[test]
fn mutually_referencing_directories_are_rejected() {
    // Directory A at 0 points to B, B points back to A
    let mut data = directory(1);
    let b_offset = (data.len() + entry(1, 0, "b").len()) as u32;
    data.extend_from_slice(&entry(1, b_offset, "b"));
    data.extend_from_slice(&directory(1));
    data.extend_from_slice(&entry(1, 0, "a"));

    let err = read_dictionary(&data, &CodecConfig::default()).unwrap_err();
    assert!(matches!(err, CodecError::MalformedContainer(_)), "{err}");
}

#[test]
fn depth_limit_applies_to_chains() {
    let levels = 5;
    let mut data = Vec::new();
    for level in 0..levels {
        data.extend_from_slice(&directory(1));
        let name = format!("d{level}");
        let next = (data.len() + entry(1, 0, &name).len()) as u32;
        data.extend_from_slice(&entry(1, next, &name));
    }
    data.extend_from_slice(&directory(1));
    data.extend_from_slice(&entry(2, 0x10, "leaf.wav"));

    let dictionary = read_dictionary(&data, &CodecConfig::default()).unwrap();
    let resources = dictionary.resources();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].path, "d0/d1/d2/d3/d4/leaf.wav");
    assert_eq!(resources[0].kind, ReferenceKind::Sample);

    let shallow = CodecConfig {
        max_depth: 3,
        ..CodecConfig::default()
    };
    assert!(read_dictionary(&data, &shallow).is_err());
}

#[test]
fn dictionary_file_is_read_from_disk() {
    let mut data = directory(2);
    data.extend_from_slice(&entry(3, 0x40, "Main.nki"));
    data.extend_from_slice(&entry(4, 0x80, "wallpaper"));
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();
    file.flush().unwrap();

    let dictionary = read_dictionary_file(file.path(), &CodecConfig::default()).unwrap();
    let kinds: Vec<ReferenceKind> = dictionary.resources().iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![ReferenceKind::Preset, ReferenceKind::Wallpaper]);
}
