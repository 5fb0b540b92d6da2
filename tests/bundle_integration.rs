use human_hand_detect::assets::{
    GESTURE_RECOGNIZER_DIR, HAND_LANDMARKER_DIR, unpack_task_bundle, verify_gesture_layout,
};
use std::fs;
use std::io::{Cursor, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

fn archive(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[test]
fn unpacks_gesture_recognizer_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let landmarker = archive(&[
        ("hand_detector.tflite", b"TFL3palm".to_vec()),
        ("hand_landmarks_detector.tflite", b"TFL3landmarks".to_vec()),
    ]);
    let recognizer = archive(&[
        ("gesture_embedder.tflite", b"TFL3embedder".to_vec()),
        ("canned_gesture_classifier.tflite", b"TFL3classifier".to_vec()),
    ]);
    let bundle = dir.path().join("gesture_recognizer.task");
    fs::write(
        &bundle,
        archive(&[
            ("hand_landmarker.task", landmarker),
            ("hand_gesture_recognizer.task", recognizer),
        ]),
    )
    .unwrap();

    let out = dir.path().join("gesture_recognizer");
    let layout = unpack_task_bundle(&bundle, &out).unwrap();
    assert_eq!(layout.root, out);
    assert_eq!(layout.subdirectories.len(), 2);
    assert_eq!(layout.tflite_files.len(), 4);

    let files = verify_gesture_layout(&out).unwrap();
    assert!(files.hand_detector.starts_with(out.join(HAND_LANDMARKER_DIR)));
    assert!(
        files
            .canned_gesture_classifier
            .starts_with(out.join(GESTURE_RECOGNIZER_DIR))
    );
    assert_eq!(fs::read(files.hand_landmarks_detector).unwrap(), b"TFL3landmarks");
}

#[test]
fn flat_archive_fails_layout_check() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("flat.task");
    fs::write(
        &bundle,
        archive(&[("hand_detector.tflite", b"TFL3".to_vec())]),
    )
    .unwrap();

    let out = dir.path().join("flat");
    let layout = unpack_task_bundle(&bundle, &out).unwrap();
    assert!(layout.subdirectories.is_empty());

    let err = verify_gesture_layout(&out).unwrap_err().to_string();
    assert!(err.contains("gesture_embedder.tflite"));
}
